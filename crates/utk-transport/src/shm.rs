// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared-memory fallback backend.
//!
//! The client creates an 8 KiB backing file named by the session token,
//! zero-fills it, and maps it; the server polls for the file to appear and
//! maps the same bytes. The mapping is split into two single-producer/
//! single-consumer slots, one per direction. The `ready` byte is the only
//! synchronization on a slot: producers publish it last, consumers clear it
//! after copying the message out.

use crate::transceiver::{MessageTransceiver, TransceiverCore};
use crate::TransportError;
use async_trait::async_trait;
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use utk_proto::{MessageKind, TransactionMessage};

/// Payload capacity of one slot.
pub const CHAR_BUF_SIZE: usize = 4000;
/// Total mapped bytes: two slots.
pub const MMAP_SIZE: usize = 8192;
const SLOT_SIZE: usize = MMAP_SIZE / 2;

const CHECK_SHARED_FILE_INTERVAL_MS: u64 = 50;
const CHECK_SHARED_FILE_ATTEMPTS: u32 = 100;
const POLL_MSG_INTERVAL_MS: u64 = 1;

// Field offsets inside a slot. The layout is POD: a ready byte, the message
// id, the kind tag, the payload length, then the payload bytes.
const OFF_READY: usize = 0;
const OFF_ID: usize = 4;
const OFF_KIND: usize = 8;
const OFF_LEN: usize = 16;
const OFF_DATA: usize = 24;

/// Slot indices: calls flow client→server, replies server→client.
const SLOT_CALL: usize = 0;
const SLOT_REPLY: usize = 1;

/// The mapped region with volatile slot accessors.
struct RingMap {
    base: *mut u8,
    // Keeps the mapping alive; all access goes through `base`.
    _map: MmapMut,
}

// The two slots are disjoint and each is touched by exactly one producer and
// one consumer task; the ready byte is the handoff.
unsafe impl Send for RingMap {}
unsafe impl Sync for RingMap {}

impl RingMap {
    fn new(mut map: MmapMut) -> Self {
        Self {
            base: map.as_mut_ptr(),
            _map: map,
        }
    }

    fn slot(&self, index: usize) -> *mut u8 {
        debug_assert!(index < 2);
        // SAFETY: index is 0 or 1 and the mapping spans MMAP_SIZE bytes.
        unsafe { self.base.add(index * SLOT_SIZE) }
    }

    /// Consume the message in `index` if one is published.
    fn try_read(&self, index: usize) -> Option<TransactionMessage> {
        let slot = self.slot(index);
        // SAFETY: all offsets stay inside the slot; the ready byte is read
        // first and cleared last, matching the producer's publication order.
        unsafe {
            if ptr::read_volatile(slot.add(OFF_READY)) == 0 {
                return None;
            }
            let id = ptr::read_volatile(slot.add(OFF_ID).cast::<u32>());
            let kind_tag = ptr::read_volatile(slot.add(OFF_KIND));
            let len = ptr::read_volatile(slot.add(OFF_LEN).cast::<u64>()) as usize;
            let len = len.min(CHAR_BUF_SIZE);
            let mut data = vec![0u8; len];
            ptr::copy_nonoverlapping(slot.add(OFF_DATA), data.as_mut_ptr(), len);
            ptr::write_volatile(slot.add(OFF_READY), 0);
            let kind = MessageKind::from_u8(kind_tag).unwrap_or(MessageKind::Invalid);
            Some(TransactionMessage {
                id,
                kind,
                payload: String::from_utf8_lossy(&data).into_owned(),
            })
        }
    }

    /// Publish `message` into `index` if the slot is free.
    fn try_write(&self, index: usize, message: &TransactionMessage) -> bool {
        let slot = self.slot(index);
        let data = message.payload.as_bytes();
        // SAFETY: offsets stay inside the slot; the ready byte is checked
        // first and stored last so the consumer never sees a torn message.
        unsafe {
            if ptr::read_volatile(slot.add(OFF_READY)) != 0 {
                return false;
            }
            ptr::write_volatile(slot.add(OFF_ID).cast::<u32>(), message.id);
            ptr::write_volatile(slot.add(OFF_KIND), message.kind as u8);
            ptr::write_volatile(slot.add(OFF_LEN).cast::<u64>(), data.len() as u64);
            ptr::copy_nonoverlapping(data.as_ptr(), slot.add(OFF_DATA), data.len());
            ptr::write_volatile(slot.add(OFF_READY), 1);
        }
        true
    }
}

/// Shared-memory transceiver over a token-named backing file.
pub struct ShmTransceiver {
    token: PathBuf,
    as_server: bool,
    core: Arc<TransceiverCore>,
    shutdown: Arc<AtomicBool>,
    writer_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
    initialized: bool,
}

impl ShmTransceiver {
    /// A transceiver for the given backing-file token. Nothing is mapped
    /// until [`MessageTransceiver::initialize`].
    pub fn new(token: impl Into<PathBuf>, as_server: bool) -> Self {
        Self {
            token: token.into(),
            as_server,
            core: Arc::new(TransceiverCore::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            writer_task: None,
            reader_task: None,
            initialized: false,
        }
    }

}

/// Open (client: create and zero-fill; server: wait for) the backing file
/// and map it. Runs on a blocking thread since the server side sleeps
/// while the file is still missing.
fn open_mapping(token: &PathBuf, as_server: bool) -> Result<MmapMut, TransportError> {
    let file = if as_server {
        // The client creates the file; wait for it to appear with data.
        let mut attempts = 0;
        loop {
            match OpenOptions::new().read(true).write(true).open(token) {
                Ok(file) if file.metadata()?.len() >= MMAP_SIZE as u64 => break file,
                _ if attempts < CHECK_SHARED_FILE_ATTEMPTS => {
                    attempts += 1;
                    std::thread::sleep(Duration::from_millis(CHECK_SHARED_FILE_INTERVAL_MS));
                }
                _ => {
                    return Err(TransportError::SharedFileUnavailable(
                        token.display().to_string(),
                    ));
                }
            }
        }
    } else {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o666)
            .open(token)?;
        file.write_all(&[0u8; MMAP_SIZE])?;
        file
    };
    // SAFETY: the mapping is private to this link; both sides follow the
    // slot protocol and never remap or resize the file while mapped.
    let map = unsafe { MmapMut::map_mut(&file)? };
    Ok(map)
}

#[async_trait]
impl MessageTransceiver for ShmTransceiver {
    fn core(&self) -> &Arc<TransceiverCore> {
        &self.core
    }

    async fn initialize(&mut self) -> Result<(), TransportError> {
        if self.initialized {
            return Ok(());
        }
        let token = self.token.clone();
        let as_server = self.as_server;
        let map = tokio::task::spawn_blocking(move || open_mapping(&token, as_server))
            .await
            .map_err(|err| TransportError::Io(std::io::Error::other(err)))??;
        let ring = Arc::new(RingMap::new(map));
        let (in_slot, out_slot) = if self.as_server {
            (SLOT_CALL, SLOT_REPLY)
        } else {
            (SLOT_REPLY, SLOT_CALL)
        };

        // Outgoing path: the emitter enqueues, the writer task spins the
        // slot free and publishes.
        let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<TransactionMessage>();
        self.core.set_emitter(move |message| {
            if outbox_tx.send(message).is_err() {
                warn!("shared-memory writer gone, message dropped");
            }
        });
        let writer_ring = Arc::clone(&ring);
        let writer_shutdown = Arc::clone(&self.shutdown);
        self.writer_task = Some(tokio::spawn(async move {
            while let Some(message) = outbox_rx.recv().await {
                if message.payload.len() > CHAR_BUF_SIZE {
                    error!(
                        len = message.payload.len(),
                        "message exceeds shared buffer capacity, dropped"
                    );
                    continue;
                }
                while !writer_shutdown.load(Ordering::Relaxed) {
                    if writer_ring.try_write(out_slot, &message) {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(POLL_MSG_INTERVAL_MS)).await;
                }
                if writer_shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
        }));

        // Incoming path: drain the inbound slot into the core.
        let reader_ring = Arc::clone(&ring);
        let reader_core = Arc::clone(&self.core);
        let reader_shutdown = Arc::clone(&self.shutdown);
        self.reader_task = Some(tokio::spawn(async move {
            while !reader_shutdown.load(Ordering::Relaxed) {
                match reader_ring.try_read(in_slot) {
                    Some(message) => reader_core.on_receive_message(message),
                    None => tokio::time::sleep(Duration::from_millis(POLL_MSG_INTERVAL_MS)).await,
                }
            }
        }));

        debug!(token = %self.token.display(), as_server = self.as_server, "shared memory mapped");
        self.initialized = true;
        Ok(())
    }

    async fn finalize(&mut self) {
        self.core.finalize().await;
        // Closing the outbox lets the writer flush queued messages (such as
        // the final exit) and end on its own; a peer that stopped consuming
        // would stall that, so the drain is bounded.
        self.core.set_emitter(|message| {
            warn!(kind = ?message.kind, "transceiver finalized, message dropped");
        });
        if let Some(mut writer) = self.writer_task.take() {
            if tokio::time::timeout(Duration::from_millis(500), &mut writer)
                .await
                .is_err()
            {
                writer.abort();
                let _ = writer.await;
            }
        }
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader_task.take() {
            reader.abort();
            let _ = reader.await;
        }
        // The creating side also removes the backing file.
        if self.initialized && !self.as_server {
            if let Err(err) = std::fs::remove_file(&self.token) {
                warn!(error = %err, "failed to remove shared backing file");
            }
        }
        self.initialized = false;
    }
}

impl Drop for ShmTransceiver {
    fn drop(&mut self) {
        if let Some(writer) = self.writer_task.take() {
            writer.abort();
        }
        if let Some(reader) = self.reader_task.take() {
            reader.abort();
        }
    }
}
