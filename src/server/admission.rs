//! Producer admission
//!
//! The transport does not stop a second capture device from connecting, so
//! the server decides explicitly what happens via [`ProducerPolicy`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::registry::RegistryError;

/// Handling of additional producer connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerPolicy {
    /// The newest producer wins; the active one is cancelled
    Replace,
    /// Refuse new producers while one is active
    Reject,
    /// Allow up to `max` producers whose frames interleave
    Interleave { max: usize },
}

/// Tracks the producers currently allowed to publish
#[derive(Debug)]
pub struct ProducerAdmission {
    policy: ProducerPolicy,
    active: Mutex<HashMap<u64, CancellationToken>>,
}

impl ProducerAdmission {
    pub fn new(policy: ProducerPolicy) -> Self {
        Self {
            policy,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> ProducerPolicy {
        self.policy
    }

    /// Number of admitted producers
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Try to admit a producer session
    ///
    /// The returned lease keeps the slot until dropped. Its token is a child
    /// of `parent` and also fires when a newer producer replaces this one.
    pub fn admit(
        self: &Arc<Self>,
        session_id: u64,
        parent: &CancellationToken,
    ) -> Result<ProducerLease, RegistryError> {
        let mut active = self.lock();

        match self.policy {
            ProducerPolicy::Replace => {
                for (replaced, token) in active.drain() {
                    tracing::info!(
                        session_id = replaced,
                        replaced_by = session_id,
                        "Replacing active producer"
                    );
                    token.cancel();
                }
            }
            ProducerPolicy::Reject => {
                if let Some(&existing) = active.keys().next() {
                    return Err(RegistryError::ProducerActive { active: existing });
                }
            }
            ProducerPolicy::Interleave { max } => {
                if active.len() >= max {
                    return Err(RegistryError::ProducerLimitReached { max });
                }
            }
        }

        let cancel = parent.child_token();
        active.insert(session_id, cancel.clone());

        Ok(ProducerLease {
            admission: Arc::clone(self),
            session_id,
            cancel,
        })
    }

    fn release(&self, session_id: u64) {
        self.lock().remove(&session_id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, CancellationToken>> {
        // Critical sections never panic; recover the map if one somehow did
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An admitted producer's slot
#[derive(Debug)]
pub struct ProducerLease {
    admission: Arc<ProducerAdmission>,
    session_id: u64,
    cancel: CancellationToken,
}

impl ProducerLease {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Fires on shutdown or when this producer has been replaced
    pub fn cancelled_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for ProducerLease {
    fn drop(&mut self) {
        self.admission.release(self.session_id);
    }
}
