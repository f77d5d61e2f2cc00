// SPDX-License-Identifier: MIT OR Apache-2.0
//! Queue, filter, keepalive, and watchdog behavior of the transceiver core.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use utk_proto::{MessageKind, TransactionMessage};
use utk_transport::{Polled, TransceiverCore, WATCH_DOG_TIMEOUT_MS};

/// Install an emitter that records every outgoing message.
fn with_recording_emitter(core: &TransceiverCore) -> Arc<Mutex<Vec<TransactionMessage>>> {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&sink);
    core.set_emitter(move |message| {
        recorder.lock().unwrap().push(message);
    });
    sink
}

#[tokio::test]
async fn emitted_message_content() {
    let core = TransceiverCore::new();
    let sink = with_recording_emitter(&core);

    core.emit_call("payload");
    {
        let sent = sink.lock().unwrap();
        assert_eq!(sent[0].kind, MessageKind::Call);
        assert_eq!(sent[0].payload, "payload");
    }

    let mut request = TransactionMessage::call("x");
    request.id = 1234;
    core.emit_reply(&request, "result");
    {
        let sent = sink.lock().unwrap();
        let reply = sent.last().unwrap();
        assert_eq!(reply.kind, MessageKind::Reply);
        // The calling id is kept in the reply.
        assert_eq!(reply.id, 1234);
        assert_eq!(reply.payload, "result");
    }

    let mut probe = TransactionMessage::handshake();
    probe.id = 5678;
    core.emit_ack(&probe);
    let sent = sink.lock().unwrap();
    let ack = sent.last().unwrap();
    assert_eq!(ack.kind, MessageKind::Ack);
    assert_eq!(ack.id, 5678);
}

#[tokio::test]
async fn poll_delivers_and_times_out() {
    let core = Arc::new(TransceiverCore::new());
    with_recording_emitter(&core);

    // Empty queue: the poll waits out its timeout.
    let start = Instant::now();
    let polled = core.poll(Duration::from_millis(20)).await;
    assert_eq!(polled, Polled::AbortWaitTimeout);
    assert!(start.elapsed() >= Duration::from_millis(20));

    // Queued message: immediate delivery.
    let mut message = TransactionMessage::call("m");
    message.id = 1234;
    core.on_receive_message(message.clone());
    match core.poll(Duration::from_millis(20)).await {
        Polled::Success(delivered) => assert_eq!(delivered.id, 1234),
        other => panic!("unexpected poll outcome: {other:?}"),
    }

    // Message arriving mid-wait ends the poll early.
    let late_core = Arc::clone(&core);
    let waker = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        late_core.on_receive_message(TransactionMessage::call("late"));
    });
    let start = Instant::now();
    let polled = core.poll(Duration::from_millis(500)).await;
    assert!(matches!(polled, Polled::Success(_)));
    assert!(start.elapsed() < Duration::from_millis(400));
    waker.await.unwrap();
}

#[tokio::test]
async fn filter_drops_unwanted_kinds() {
    let core = TransceiverCore::new();
    with_recording_emitter(&core);
    core.set_message_filter(Some(Box::new(|kind| kind == MessageKind::Reply)));

    core.on_receive_message(TransactionMessage::call("dropped"));
    assert_eq!(
        core.poll(Duration::from_millis(10)).await,
        Polled::AbortWaitTimeout
    );

    let request = TransactionMessage::call("x");
    core.on_receive_message(TransactionMessage::reply_to(&request, "kept"));
    assert!(matches!(
        core.poll(Duration::from_millis(10)).await,
        Polled::Success(_)
    ));
}

#[tokio::test]
async fn handshakes_are_acked_and_not_enqueued() {
    let core = TransceiverCore::new();
    let sink = with_recording_emitter(&core);

    let mut probe = TransactionMessage::handshake();
    probe.id = 42;
    core.on_receive_message(probe);

    let sent = sink.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, MessageKind::Ack);
    assert_eq!(sent[0].id, 42);
    drop(sent);

    assert_eq!(
        core.poll(Duration::from_millis(10)).await,
        Polled::AbortWaitTimeout
    );
}

#[tokio::test]
async fn exit_short_circuits_pending_polls() {
    let core = Arc::new(TransceiverCore::new());
    with_recording_emitter(&core);

    let poller = Arc::clone(&core);
    let pending = tokio::spawn(async move { poller.poll(Duration::from_secs(5)).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    core.on_receive_message(TransactionMessage::exit());
    assert_eq!(pending.await.unwrap(), Polled::AbortRequestExit);

    // The flag is sticky: later polls abort immediately.
    assert_eq!(
        core.poll(Duration::from_secs(5)).await,
        Polled::AbortRequestExit
    );
}

#[tokio::test]
async fn transport_death_short_circuits_pending_polls() {
    let core = Arc::new(TransceiverCore::new());
    let poller = Arc::clone(&core);
    let pending = tokio::spawn(async move { poller.poll(Duration::from_secs(5)).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    core.mark_connection_died();
    assert_eq!(pending.await.unwrap(), Polled::AbortConnectionDied);
}

#[tokio::test]
async fn watchdog_detects_silent_peer() {
    let core = Arc::new(TransceiverCore::new());
    with_recording_emitter(&core);
    TransceiverCore::schedule_check_connection(&core, false);

    let start = Instant::now();
    let polled = core
        .poll(Duration::from_millis(WATCH_DOG_TIMEOUT_MS * 2))
        .await;
    assert_eq!(polled, Polled::AbortConnectionDied);
    let elapsed = start.elapsed().as_millis() as u64;
    assert!(elapsed >= WATCH_DOG_TIMEOUT_MS - 100);
    assert!(elapsed < WATCH_DOG_TIMEOUT_MS + 500);
    core.finalize().await;
}

#[tokio::test]
async fn incoming_traffic_keeps_the_connection_alive() {
    let core = Arc::new(TransceiverCore::new());
    with_recording_emitter(&core);
    TransceiverCore::schedule_check_connection(&core, false);

    // Feed acks for longer than the watchdog window; the link must stay up.
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(WATCH_DOG_TIMEOUT_MS / 4)).await;
        let probe = TransactionMessage::handshake();
        core.on_receive_message(TransactionMessage::ack(&probe));
    }
    assert!(!core.connection_died());
    core.finalize().await;
}

#[tokio::test]
async fn auto_handshake_probes_idle_links() {
    let core = Arc::new(TransceiverCore::new());
    let sink = with_recording_emitter(&core);
    TransceiverCore::schedule_check_connection(&core, true);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let probes = sink
        .lock()
        .unwrap()
        .iter()
        .filter(|m| m.kind == MessageKind::Handshake)
        .count();
    assert!(probes > 0, "idle link should have been probed");
    core.finalize().await;
}

#[tokio::test]
async fn discover_peer_sees_an_answering_peer() {
    let core = Arc::new(TransceiverCore::new());
    // Loop outgoing handshakes back as acks, like a live peer would.
    let loopback = Arc::clone(&core);
    core.set_emitter(move |message| {
        if message.kind == MessageKind::Handshake {
            loopback.on_receive_message(TransactionMessage::ack(&message));
        }
    });
    assert!(core.discover_peer(Duration::from_millis(500)).await);

    let silent = Arc::new(TransceiverCore::new());
    silent.set_emitter(|_| {});
    assert!(!silent.discover_peer(Duration::from_millis(100)).await);
}
