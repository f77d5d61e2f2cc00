// SPDX-License-Identifier: MIT OR Apache-2.0
//! Backend-independent transceiver machinery: the incoming queue with its
//! poll contract, liveness clocks, and the connection watchdog.

use crate::{Polled, TransportError, WATCH_DOG_TIMEOUT_MS};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use utk_proto::{MessageKind, TransactionMessage};

/// Predicate deciding whether an incoming message kind is accepted.
pub type MessageFilter = Box<dyn Fn(MessageKind) -> bool + Send + Sync>;

/// Backend hook that physically moves one message to the peer. Must not
/// block; backends queue internally.
pub type Emitter = Arc<dyn Fn(TransactionMessage) + Send + Sync>;

const FLAG_CONNECT_DIED: u32 = 1 << 0;
const FLAG_REQUEST_EXIT: u32 = 1 << 1;

/// Interval of one watchdog check slice.
const WATCH_DOG_SLICES: u64 = 100;
/// Outgoing idleness beyond this emits a keepalive handshake.
const SECURE_DURATION_MS: u64 = WATCH_DOG_TIMEOUT_MS * 9 / 10;
/// Cadence of peer-discovery handshake probes.
const DISCOVER_INTERVAL_MS: u64 = 20;

/// Shared state of one transceiver: incoming queue, abort flags, liveness
/// clocks, and the emission hook of the owning backend.
pub struct TransceiverCore {
    queue: Mutex<VecDeque<TransactionMessage>>,
    notify: Notify,
    flags: AtomicU32,
    filter: Mutex<Option<MessageFilter>>,
    emitter: Mutex<Option<Emitter>>,
    last_incoming_ms: AtomicU64,
    last_outgoing_ms: AtomicU64,
    auto_handshaking: AtomicBool,
    watchdog: Mutex<Option<JoinHandle<()>>>,
    epoch: Instant,
}

impl Default for TransceiverCore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransceiverCore {
    /// A core with no filter, no emitter, and empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            flags: AtomicU32::new(0),
            filter: Mutex::new(None),
            emitter: Mutex::new(None),
            last_incoming_ms: AtomicU64::new(0),
            last_outgoing_ms: AtomicU64::new(0),
            auto_handshaking: AtomicBool::new(false),
            watchdog: Mutex::new(None),
            epoch: Instant::now(),
        }
    }

    /// Milliseconds on the core's monotonic clock.
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Install the incoming-message filter.
    pub fn set_message_filter(&self, filter: Option<MessageFilter>) {
        *self.filter.lock().expect("filter lock") = filter;
    }

    /// Install the backend's emission hook.
    pub fn set_emitter<F>(&self, emitter: F)
    where
        F: Fn(TransactionMessage) + Send + Sync + 'static,
    {
        *self.emitter.lock().expect("emitter lock") = Some(Arc::new(emitter));
    }

    fn emit(&self, message: TransactionMessage) {
        self.last_outgoing_ms.store(self.now_ms(), Ordering::Relaxed);
        // Clone the hook out so emission never runs under the lock.
        let emitter = self.emitter.lock().expect("emitter lock").clone();
        match emitter {
            Some(emitter) => emitter(message),
            None => warn!("no emitter installed, message dropped"),
        }
    }

    /// Emit a call message.
    pub fn emit_call(&self, payload: impl Into<String>) {
        self.emit(TransactionMessage::call(payload));
    }

    /// Emit a reply, keeping the calling id.
    pub fn emit_reply(&self, request: &TransactionMessage, payload: impl Into<String>) {
        self.emit(TransactionMessage::reply_to(request, payload));
    }

    /// Emit a keepalive handshake.
    pub fn emit_handshake(&self) {
        self.emit(TransactionMessage::handshake());
    }

    /// Emit the answer to a handshake.
    pub fn emit_ack(&self, handshake: &TransactionMessage) {
        self.emit(TransactionMessage::ack(handshake));
    }

    /// Emit an orderly-shutdown request.
    pub fn emit_exit(&self) {
        self.emit(TransactionMessage::exit());
    }

    /// Deliver one incoming message.
    ///
    /// Calls and replies are enqueued for [`TransceiverCore::poll`]; an exit
    /// latches the exit flag; a handshake is answered with an ack and, like
    /// acks, never reaches the queue.
    pub fn on_receive_message(&self, message: TransactionMessage) {
        if message.kind == MessageKind::Invalid {
            return;
        }
        if let Some(filter) = &*self.filter.lock().expect("filter lock") {
            if !filter(message.kind) {
                return;
            }
        }
        self.last_incoming_ms.store(self.now_ms(), Ordering::Relaxed);
        match message.kind {
            MessageKind::Call | MessageKind::Reply => {
                self.queue.lock().expect("queue lock").push_back(message);
            }
            MessageKind::Exit => {
                self.flags.fetch_or(FLAG_REQUEST_EXIT, Ordering::Relaxed);
            }
            MessageKind::Handshake => {
                self.emit_ack(&message);
                return;
            }
            _ => return,
        }
        self.notify.notify_waiters();
    }

    fn check(&self) -> Option<Polled> {
        let flags = self.flags.load(Ordering::Relaxed);
        if flags & FLAG_REQUEST_EXIT != 0 {
            return Some(Polled::AbortRequestExit);
        }
        if flags & FLAG_CONNECT_DIED != 0 {
            return Some(Polled::AbortConnectionDied);
        }
        self.queue
            .lock()
            .expect("queue lock")
            .pop_front()
            .map(Polled::Success)
    }

    /// Wait for the next call/reply, an abort flag, or the timeout.
    pub async fn poll(&self, timeout: Duration) -> Polled {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(polled) = self.check() {
                return polled;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Polled::AbortWaitTimeout;
            }
        }
    }

    /// Force the connection-died state, waking all pollers. Used by
    /// transports with their own death signal.
    pub fn mark_connection_died(&self) {
        if self.flags.fetch_or(FLAG_CONNECT_DIED, Ordering::Relaxed) & FLAG_CONNECT_DIED == 0 {
            debug!("connection dead detected");
        }
        self.notify.notify_waiters();
    }

    /// `true` once the watchdog or the transport declared the peer dead.
    pub fn connection_died(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & FLAG_CONNECT_DIED != 0
    }

    /// Emit handshakes until the peer answers or `timeout` elapses.
    /// Any incoming message satisfies the probe.
    pub async fn discover_peer(&self, timeout: Duration) -> bool {
        let prev_incoming = self.last_incoming_ms.load(Ordering::Relaxed);
        let attempts = timeout.as_millis() as u64 / DISCOVER_INTERVAL_MS;
        for _ in 0..attempts {
            if self.last_incoming_ms.load(Ordering::Relaxed) > prev_incoming {
                return true;
            }
            self.emit_handshake();
            tokio::time::sleep(Duration::from_millis(DISCOVER_INTERVAL_MS)).await;
        }
        false
    }

    /// Start the periodic liveness check; idempotent.
    ///
    /// Every slice the task compares the incoming clock against the
    /// watchdog window, latching the died flag and waking pollers when the
    /// peer has been silent too long. With `emit_handshake`, idle links are
    /// kept warm with handshake probes so that handshake/ack pairs form the
    /// minimum keepalive traffic.
    pub fn schedule_check_connection(core: &Arc<Self>, emit_handshake: bool) {
        if core.auto_handshaking.swap(true, Ordering::Relaxed) {
            return;
        }
        core.last_outgoing_ms.store(0, Ordering::Relaxed);
        core.last_incoming_ms.store(core.now_ms(), Ordering::Relaxed);
        let interval = Duration::from_millis(SECURE_DURATION_MS / WATCH_DOG_SLICES);
        let watched = Arc::clone(core);
        let task = tokio::spawn(async move {
            while watched.auto_handshaking.load(Ordering::Relaxed) {
                let now = watched.now_ms();
                let incoming_idle =
                    now.saturating_sub(watched.last_incoming_ms.load(Ordering::Relaxed));
                let outgoing_idle =
                    now.saturating_sub(watched.last_outgoing_ms.load(Ordering::Relaxed));
                if emit_handshake
                    && (outgoing_idle > SECURE_DURATION_MS || incoming_idle > SECURE_DURATION_MS)
                {
                    watched.emit_handshake();
                }
                if incoming_idle > WATCH_DOG_TIMEOUT_MS {
                    watched.mark_connection_died();
                }
                tokio::time::sleep(interval).await;
            }
            debug!("connection check exited");
        });
        *core.watchdog.lock().expect("watchdog lock") = Some(task);
        info!(auto_handshake = emit_handshake, "connection check scheduled");
    }

    /// Stop the watchdog task, if running.
    pub async fn finalize(&self) {
        self.auto_handshaking.store(false, Ordering::Relaxed);
        let task = self.watchdog.lock().expect("watchdog lock").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// A message transceiver: one physical backend plus the shared core.
#[async_trait]
pub trait MessageTransceiver: Send + Sync {
    /// The queue/liveness core this backend feeds.
    fn core(&self) -> &Arc<TransceiverCore>;

    /// Bring up the backend: establish the shared medium and start its
    /// reader/writer activities.
    async fn initialize(&mut self) -> Result<(), TransportError>;

    /// Tear down the backend and release its resources.
    async fn finalize(&mut self);
}
