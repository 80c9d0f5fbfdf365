//! Admission error types

use thiserror::Error;

/// Reasons a connection is refused at accept time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another producer is active and the policy rejects newcomers
    #[error("a producer is already active (session {active})")]
    ProducerActive { active: u64 },

    /// Concurrent producer limit reached
    #[error("producer limit of {max} reached")]
    ProducerLimitReached { max: usize },

    /// Concurrent consumer limit reached
    #[error("consumer limit of {max} reached")]
    ConsumerLimitReached { max: usize },
}
