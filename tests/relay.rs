//! End-to-end relay behaviour over loopback sockets

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use ar_relay::client::{ClientConfig, ProducerClient};
use ar_relay::protocol::{encode_envelope, ArFrame, Quaternion, Vector3};
use ar_relay::stats::RelayStats;
use ar_relay::{ConsumerRegistry, ProducerPolicy, RelayServer, ServerConfig};

type Viewer = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Harness {
    producer_addr: SocketAddr,
    consumer_addr: SocketAddr,
    registry: Arc<ConsumerRegistry>,
    stats: Arc<RelayStats>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<ar_relay::Result<()>>,
}

impl Harness {
    async fn start(config: ServerConfig) -> Self {
        let config = config
            .bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .producer_port(0)
            .consumer_port(0)
            .stats_interval(Duration::ZERO);
        let server = RelayServer::bind(config).await.unwrap();

        let producer_addr = server.producer_addr().unwrap();
        let consumer_addr = server.consumer_addr().unwrap();
        let registry = Arc::clone(server.registry());
        let stats = Arc::clone(server.stats());

        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(server.run_until(async move {
            let _ = rx.await;
        }));

        Self {
            producer_addr,
            consumer_addr,
            registry,
            stats,
            shutdown: Some(tx),
            task,
        }
    }

    async fn viewer(&self) -> Viewer {
        let (ws, _) = connect_async(format!("ws://{}", self.consumer_addr))
            .await
            .unwrap();
        ws
    }

    /// Connect `count` viewers and wait until all are registered
    async fn viewers(&self, count: usize) -> Vec<Viewer> {
        let before = self.registry.len().await;
        let mut viewers = Vec::new();
        for _ in 0..count {
            viewers.push(self.viewer().await);
        }
        let registry = Arc::clone(&self.registry);
        wait_for(|| {
            let registry = Arc::clone(&registry);
            async move { registry.len().await == before + count }
        })
        .await;
        viewers
    }

    fn client(&self) -> ProducerClient {
        ProducerClient::new(ClientConfig::new(self.producer_addr.to_string())).0
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("relay did not shut down")
            .unwrap()
            .unwrap();
    }
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn next_text(viewer: &mut Viewer) -> String {
    let message = tokio::time::timeout(Duration::from_secs(5), viewer.next())
        .await
        .expect("no message in time")
        .expect("viewer stream ended")
        .expect("viewer read failed");
    match message {
        Message::Text(text) => text,
        other => panic!("expected text message, got {:?}", other),
    }
}

fn frame(timestamp: i64) -> ArFrame {
    ArFrame::new(
        Vector3::new(timestamp as f32, 0.0, 0.0),
        Quaternion::IDENTITY,
        &[0xFF, 0xD8, timestamp as u8],
        timestamp,
    )
}

#[tokio::test]
async fn frames_fan_out_to_every_viewer_in_order() {
    let relay = Harness::start(ServerConfig::default()).await;
    let mut viewers = relay.viewers(3).await;
    let mut client = relay.client();

    for ts in 0..10 {
        client.send_frame(&frame(ts)).await.unwrap();
    }

    for viewer in &mut viewers {
        for ts in 0..10 {
            let text = next_text(viewer).await;
            assert_eq!(ArFrame::parse(text.as_bytes()).unwrap(), frame(ts));
        }
    }

    relay.stop().await;
}

#[tokio::test]
async fn late_viewer_gets_only_later_frames() {
    let relay = Harness::start(ServerConfig::default()).await;
    let mut early = relay.viewers(1).await.remove(0);
    let mut client = relay.client();

    client.send_payload(b"before").await.unwrap();
    assert_eq!(next_text(&mut early).await, "before");

    let mut late = relay.viewers(1).await.remove(0);
    client.send_payload(b"after").await.unwrap();

    assert_eq!(next_text(&mut early).await, "after");
    assert_eq!(next_text(&mut late).await, "after");

    relay.stop().await;
}

#[tokio::test]
async fn closed_viewer_does_not_affect_others() {
    let relay = Harness::start(ServerConfig::default()).await;
    let mut viewers = relay.viewers(3).await;
    let mut client = relay.client();

    let mut gone = viewers.remove(1);
    gone.close(None).await.unwrap();
    drop(gone);
    client.send_payload(b"still here").await.unwrap();

    for viewer in &mut viewers {
        assert_eq!(next_text(viewer).await, "still here");
    }
    let registry = Arc::clone(&relay.registry);
    wait_for(|| {
        let registry = Arc::clone(&registry);
        async move { registry.len().await == 2 }
    })
    .await;

    relay.stop().await;
}

#[tokio::test]
async fn reconnecting_producer_starts_with_fresh_decoder() {
    let relay = Harness::start(ServerConfig::default()).await;
    let mut viewer = relay.viewers(1).await.remove(0);

    // Half an envelope, then the device drops off
    let mut first = TcpStream::connect(relay.producer_addr).await.unwrap();
    first.write_all(&[0x20, 0x00, 0x00, 0x00, b'x', b'x']).await.unwrap();
    drop(first);

    let mut second = TcpStream::connect(relay.producer_addr).await.unwrap();
    second.write_all(&encode_envelope(b"clean").unwrap()).await.unwrap();

    assert_eq!(next_text(&mut viewer).await, "clean");

    relay.stop().await;
}

#[tokio::test]
async fn oversized_prefix_closes_only_that_producer() {
    let relay = Harness::start(ServerConfig::default().max_payload_size(1024)).await;
    let mut viewer = relay.viewers(1).await.remove(0);

    let mut bad = TcpStream::connect(relay.producer_addr).await.unwrap();
    bad.write_all(&1025u32.to_le_bytes()).await.unwrap();

    // The relay hangs up on the violating producer
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(5), bad.read(&mut buf))
        .await
        .expect("producer not closed");
    assert!(matches!(read, Ok(0) | Err(_)));

    let stats = Arc::clone(&relay.stats);
    wait_for(|| {
        let stats = Arc::clone(&stats);
        async move { stats.snapshot().protocol_violations == 1 }
    })
    .await;

    // Existing viewer and the listener are unaffected
    let mut client = relay.client();
    client.send_payload(b"recovered").await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "recovered");
    assert_eq!(relay.registry.len().await, 1);

    relay.stop().await;
}

#[tokio::test]
async fn reject_policy_refuses_second_producer() {
    let relay = Harness::start(ServerConfig::default().producer_policy(ProducerPolicy::Reject)).await;
    let mut viewer = relay.viewers(1).await.remove(0);

    let mut first = relay.client();
    first.send_payload(b"one").await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "one");

    let mut second = TcpStream::connect(relay.producer_addr).await.unwrap();
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(5), second.read(&mut buf))
        .await
        .expect("second producer not closed");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert_eq!(relay.stats.snapshot().producers_rejected, 1);

    first.send_payload(b"two").await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "two");

    relay.stop().await;
}

#[tokio::test]
async fn consumer_limit_rejects_at_accept() {
    let relay = Harness::start(ServerConfig::default().max_consumers(1)).await;
    let _viewer = relay.viewers(1).await;

    let rejected = connect_async(format!("ws://{}", relay.consumer_addr)).await;

    assert!(rejected.is_err());
    assert_eq!(relay.registry.len().await, 1);
    assert_eq!(relay.stats.snapshot().consumers_rejected, 1);

    relay.stop().await;
}

#[tokio::test]
async fn shutdown_closes_viewers() {
    let relay = Harness::start(ServerConfig::default()).await;
    let mut viewer = relay.viewers(1).await.remove(0);
    let registry = Arc::clone(&relay.registry);

    relay.stop().await;

    let message = tokio::time::timeout(Duration::from_secs(5), viewer.next())
        .await
        .expect("viewer not closed");
    assert!(matches!(message, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn stalled_handshake_times_out_and_frees_its_slot() {
    let relay = Harness::start(
        ServerConfig::default()
            .handshake_timeout(Duration::from_millis(200))
            .max_consumers(1),
    )
    .await;

    // Connects but never sends an upgrade request
    let mut silent = TcpStream::connect(relay.consumer_addr).await.unwrap();
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(5), silent.read(&mut buf))
        .await
        .expect("stalled handshake not closed");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert!(relay.registry.is_empty().await);

    // The slot is released right after the socket, so retry briefly
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut viewer = loop {
        match connect_async(format!("ws://{}", relay.consumer_addr)).await {
            Ok((ws, _)) => break ws,
            Err(_) => {
                assert!(tokio::time::Instant::now() < deadline, "slot never freed");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    };
    let registry = Arc::clone(&relay.registry);
    wait_for(|| {
        let registry = Arc::clone(&registry);
        async move { registry.len().await == 1 }
    })
    .await;

    let mut client = relay.client();
    client.send_payload(b"after timeout").await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "after timeout");

    relay.stop().await;
}

#[tokio::test]
async fn newer_producer_replaces_active_one() {
    let relay = Harness::start(ServerConfig::default()).await;
    let mut viewer = relay.viewers(1).await.remove(0);

    let mut first = TcpStream::connect(relay.producer_addr).await.unwrap();
    first.write_all(&encode_envelope(b"first-1").unwrap()).await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "first-1");

    let mut second = TcpStream::connect(relay.producer_addr).await.unwrap();

    // The relay hangs up on the replaced device
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(5), first.read(&mut buf))
        .await
        .expect("replaced producer not closed");
    assert!(matches!(read, Ok(0) | Err(_)));

    // Anything the old device still writes goes nowhere
    let _ = first.write_all(&encode_envelope(b"first-2").unwrap()).await;
    second.write_all(&encode_envelope(b"second-1").unwrap()).await.unwrap();
    second.write_all(&encode_envelope(b"second-2").unwrap()).await.unwrap();

    assert_eq!(next_text(&mut viewer).await, "second-1");
    assert_eq!(next_text(&mut viewer).await, "second-2");
    assert_eq!(relay.stats.snapshot().producers_connected, 2);

    relay.stop().await;
}

#[tokio::test]
async fn interleave_policy_admits_up_to_max_producers() {
    let relay =
        Harness::start(ServerConfig::default().producer_policy(ProducerPolicy::Interleave { max: 2 }))
            .await;
    let mut viewer = relay.viewers(1).await.remove(0);

    let mut a = TcpStream::connect(relay.producer_addr).await.unwrap();
    a.write_all(&encode_envelope(b"a-1").unwrap()).await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "a-1");

    let mut b = TcpStream::connect(relay.producer_addr).await.unwrap();
    b.write_all(&encode_envelope(b"b-1").unwrap()).await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "b-1");

    let mut third = TcpStream::connect(relay.producer_addr).await.unwrap();
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(5), third.read(&mut buf))
        .await
        .expect("third producer not closed");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert_eq!(relay.stats.snapshot().producers_rejected, 1);

    // Both admitted producers keep publishing
    a.write_all(&encode_envelope(b"a-2").unwrap()).await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "a-2");
    b.write_all(&encode_envelope(b"b-2").unwrap()).await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "b-2");

    relay.stop().await;
}
