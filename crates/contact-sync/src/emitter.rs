//! # Sync Emitter
//!
//! Writes `SyncEvent` frames to the output sink.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emit Sequence                                    │
//! │                                                                         │
//! │  SyncEvent ──► encode_frame() ──► Vec<u8> (whole frame in memory)      │
//! │                                        │                                │
//! │                                        ▼                                │
//! │                           lock sink ──► write_all ──► flush            │
//! │                                                                         │
//! │  • No await point between the first and last byte of a frame           │
//! │  • A serialization failure writes nothing                              │
//! │  • At most one frame is buffered                                       │
//! │  • After a partial write the next frame opens with a terminator, so    │
//! │    the fragment is closed off as its own (invalid) frame               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::protocol::{decode_frames, encode_frame, SyncEvent, FRAME_TERMINATOR};

// =============================================================================
// Sync Emitter
// =============================================================================

/// Serializes events and writes each as one frame.
pub struct SyncEmitter {
    sink: Mutex<Box<dyn Write + Send>>,
    pretty: bool,
    frames_emitted: AtomicU64,

    /// Set when a failed write left part of a frame behind.
    torn: AtomicBool,
}

impl SyncEmitter {
    /// Creates an emitter over an arbitrary sink.
    pub fn new(sink: impl Write + Send + 'static, pretty: bool) -> Self {
        SyncEmitter {
            sink: Mutex::new(Box::new(sink)),
            pretty,
            frames_emitted: AtomicU64::new(0),
            torn: AtomicBool::new(false),
        }
    }

    /// Creates an emitter writing to the process stdout.
    pub fn stdout(pretty: bool) -> Self {
        Self::new(std::io::stdout(), pretty)
    }

    /// Writes one event as a complete frame.
    pub fn emit(&self, event: &SyncEvent) -> SyncResult<()> {
        let encoded = encode_frame(event, self.pretty)?;

        let mut sink = self
            .sink
            .lock()
            .map_err(|_| SyncError::Internal("output sink lock poisoned".into()))?;

        let frame = if self.torn.load(Ordering::Acquire) {
            debug!("Closing off partial frame from a failed write");
            let mut frame = FRAME_TERMINATOR.as_bytes().to_vec();
            frame.extend_from_slice(&encoded);
            frame
        } else {
            encoded
        };

        let mut written = 0;
        if let Err(e) = write_frame(&mut **sink, &frame, &mut written) {
            warn!(event = event.type_name(), error = %e, written, "Failed to write frame");
            if written > 0 {
                self.torn.store(true, Ordering::Release);
            }
            return Err(SyncError::EmitFailed(e.to_string()));
        }
        self.torn.store(false, Ordering::Release);

        let total = self.frames_emitted.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            event = event.type_name(),
            contacts = event.contact_count(),
            bytes = frame.len(),
            total,
            "Frame emitted"
        );

        Ok(())
    }

    /// Number of frames written successfully.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted.load(Ordering::Relaxed)
    }
}

/// `write_all` + `flush`, counting the bytes that reached the sink.
fn write_frame(sink: &mut dyn Write, frame: &[u8], written: &mut usize) -> std::io::Result<()> {
    while *written < frame.len() {
        match sink.write(&frame[*written..]) {
            Ok(0) => return Err(std::io::ErrorKind::WriteZero.into()),
            Ok(n) => *written += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    sink.flush()
}

impl std::fmt::Debug for SyncEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEmitter")
            .field("pretty", &self.pretty)
            .field("frames_emitted", &self.frames_emitted())
            .finish()
    }
}

// =============================================================================
// Memory Sink
// =============================================================================

/// Clonable in-memory sink with write failure injection.
///
/// Used when embedding the engine in-process and throughout the tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
    failing_writes: Arc<AtomicUsize>,
    /// Bytes the next write accepts before the write after it fails.
    cut_after: Arc<Mutex<Option<usize>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` writes fail with `BrokenPipe`.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Lets the next write through for only `bytes` bytes, then fails the
    /// following write, leaving a partial frame behind.
    pub fn cut_next_write(&self, bytes: usize) {
        if let Ok(mut cut) = self.cut_after.lock() {
            *cut = Some(bytes);
        }
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Decodes everything written so far.
    pub fn events(&self) -> SyncResult<Vec<SyncEvent>> {
        decode_frames(&self.contents())
    }
}

impl Write for MemorySink {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        let should_fail = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected write failure",
            ));
        }

        let cut = self.cut_after.lock().ok().and_then(|mut cut| cut.take());
        let accepted = match cut {
            Some(bytes) => {
                self.failing_writes.fetch_add(1, Ordering::SeqCst);
                bytes.min(data.len())
            }
            None => data.len(),
        };

        let mut buf = self
            .buf
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "sink lock poisoned"))?;
        buf.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TaggedRecord;
    use contact_core::{ChangeTag, Record};

    #[test]
    fn test_emit_writes_one_frame() {
        let sink = MemorySink::new();
        let emitter = SyncEmitter::new(sink.clone(), false);

        emitter.emit(&SyncEvent::initial(vec![Record::new("1")])).unwrap();

        let contents = sink.contents();
        assert!(contents.starts_with("{\"type\":\"initial\""));
        assert!(contents.ends_with("\n\n"));
        assert_eq!(emitter.frames_emitted(), 1);
    }

    #[test]
    fn test_emit_sequence_decodes() {
        let sink = MemorySink::new();
        let emitter = SyncEmitter::new(sink.clone(), true);

        emitter.emit(&SyncEvent::initial(vec![])).unwrap();
        emitter
            .emit(&SyncEvent::update(
                vec![TaggedRecord::new(Record::new("2"), ChangeTag::Added)],
                vec!["1".into()],
            ))
            .unwrap();

        let events = sink.events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].contact_count(), 1);
    }

    #[test]
    fn test_failed_write_leaves_sink_untouched() {
        let sink = MemorySink::new();
        let emitter = SyncEmitter::new(sink.clone(), false);

        sink.fail_next_writes(1);
        let err = emitter.emit(&SyncEvent::initial(vec![])).unwrap_err();

        assert!(matches!(err, SyncError::EmitFailed(_)));
        assert!(sink.contents().is_empty());
        assert_eq!(emitter.frames_emitted(), 0);

        emitter.emit(&SyncEvent::initial(vec![])).unwrap();
        assert!(sink.contents().starts_with('{'));
        assert_eq!(sink.events().unwrap().len(), 1);
    }

    #[test]
    fn test_partial_write_is_closed_off() {
        let sink = MemorySink::new();
        let emitter = SyncEmitter::new(sink.clone(), false);

        sink.cut_next_write(10);
        let err = emitter
            .emit(&SyncEvent::update(vec![], vec!["1".into()]))
            .unwrap_err();
        assert!(matches!(err, SyncError::EmitFailed(_)));
        assert_eq!(sink.contents().len(), 10);

        emitter.emit(&SyncEvent::initial(vec![Record::new("2")])).unwrap();
        emitter.emit(&SyncEvent::initial(vec![])).unwrap();

        let contents = sink.contents();
        let (fragment, rest) = contents.split_once(FRAME_TERMINATOR).unwrap();
        assert_eq!(fragment, "{\"type\":\"u");

        let events = decode_frames(rest).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].contact_count(), 1);
        assert!(!rest.contains("\n\n\n\n"));
    }
}
