//! # Wire Protocol
//!
//! Event types and framing for the single output stream.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Output Stream                                    │
//! │                                                                         │
//! │  STARTUP / RECOVERY                                                    │
//! │  ──────────────────                                                    │
//! │  {"type":"initial","timestamp":1718000000.25,"contacts":[...]}         │
//! │  <blank line>                                                          │
//! │                                                                         │
//! │  INCREMENTAL                                                           │
//! │  ───────────                                                           │
//! │  {"type":"update","contacts":[{...,"changeTag":"added"},               │
//! │                               {...,"changeTag":"modified"}],           │
//! │   "deleted_contacts":["id-1"]}                                         │
//! │  <blank line>                                                          │
//! │                                                                         │
//! │  FRAME = JSON document + "\n" + "\n"                                   │
//! │  Consumers split the stream on blank lines.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Events are serialized as internally tagged JSON (`"type"` field). A
//! pretty-printed document never contains an empty line, so pretty output
//! keeps the framing intact.

use serde::{Deserialize, Serialize};

use contact_core::{ChangeTag, Record, RecordId};

use crate::error::{SyncError, SyncResult};

/// Frame terminator: ends the JSON line and adds one blank line.
pub const FRAME_TERMINATOR: &str = "\n\n";

// =============================================================================
// Sync Event (Tagged Union)
// =============================================================================

/// One unit of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncEvent {
    /// Full snapshot. Sent at startup and after recovery to re-anchor
    /// consumers to ground truth.
    Initial {
        /// Unix time in seconds (fractional).
        timestamp: f64,
        contacts: Vec<Record>,
    },

    /// Incremental change set.
    Update {
        contacts: Vec<TaggedRecord>,
        #[serde(rename = "deleted_contacts")]
        deleted_ids: Vec<RecordId>,
    },
}

/// A record in an update together with why it is there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedRecord {
    #[serde(flatten)]
    pub record: Record,

    #[serde(rename = "changeTag")]
    pub change_tag: ChangeTag,
}

impl TaggedRecord {
    pub fn new(record: Record, change_tag: ChangeTag) -> Self {
        TaggedRecord { record, change_tag }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Current Unix time as fractional seconds.
pub fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

impl SyncEvent {
    /// Creates an `Initial` event stamped with the current time.
    pub fn initial(contacts: Vec<Record>) -> Self {
        SyncEvent::Initial {
            timestamp: unix_timestamp(),
            contacts,
        }
    }

    /// Creates an `Update` event.
    pub fn update(contacts: Vec<TaggedRecord>, deleted_ids: Vec<RecordId>) -> Self {
        SyncEvent::Update {
            contacts,
            deleted_ids,
        }
    }

    /// Returns the wire type name (for logging).
    pub fn type_name(&self) -> &'static str {
        match self {
            SyncEvent::Initial { .. } => "initial",
            SyncEvent::Update { .. } => "update",
        }
    }

    /// Number of records carried by the event.
    pub fn contact_count(&self) -> usize {
        match self {
            SyncEvent::Initial { contacts, .. } => contacts.len(),
            SyncEvent::Update { contacts, .. } => contacts.len(),
        }
    }

    /// Serializes to a JSON document (no terminator).
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    /// Deserializes from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// =============================================================================
// Framing
// =============================================================================

/// Encodes an event as one complete frame.
pub fn encode_frame(event: &SyncEvent, pretty: bool) -> SyncResult<Vec<u8>> {
    let mut frame = event.to_json(pretty)?.into_bytes();
    frame.extend_from_slice(FRAME_TERMINATOR.as_bytes());
    Ok(frame)
}

/// Decodes every complete frame in `input`.
///
/// Trailing bytes without a terminator are rejected; use [`FrameDecoder`]
/// for streams that may end mid-frame.
pub fn decode_frames(input: &str) -> SyncResult<Vec<SyncEvent>> {
    let mut decoder = FrameDecoder::new();
    let events = decoder.push(input)?;

    if !decoder.pending().trim().is_empty() {
        return Err(SyncError::DeserializationFailed(
            "trailing data without frame terminator".into(),
        ));
    }

    Ok(events)
}

/// Incremental frame splitter for a consumer reading the output stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &str) -> SyncResult<Vec<SyncEvent>> {
        self.buf.push_str(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.buf.find(FRAME_TERMINATOR) {
            let document: String = self.buf.drain(..end + FRAME_TERMINATOR.len()).collect();
            let document = document.trim();
            if document.is_empty() {
                continue;
            }
            let event = SyncEvent::from_json(document)
                .map_err(|e| SyncError::DeserializationFailed(e.to_string()))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Bytes received after the last complete frame.
    pub fn pending(&self) -> &str {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(id: &str) -> Record {
        Record::new(id)
            .with_name("Ada", "Lovelace")
            .with_phone(None, "+44 20 7946 0000")
    }

    #[test]
    fn test_initial_serialization() {
        let event = SyncEvent::Initial {
            timestamp: 1_700_000_000.5,
            contacts: vec![sample_record("1")],
        };
        let json = event.to_json(false).unwrap();

        assert!(json.starts_with("{\"type\":\"initial\""));
        assert!(json.contains("\"timestamp\":1700000000.5"));
        assert!(json.contains("\"givenName\":\"Ada\""));
        assert!(json.contains("\"label\":null"));
    }

    #[test]
    fn test_update_serialization() {
        let event = SyncEvent::update(
            vec![
                TaggedRecord::new(sample_record("2"), ChangeTag::Added),
                TaggedRecord::new(Record::new("3"), ChangeTag::Modified),
            ],
            vec!["1".to_string()],
        );
        let value: serde_json::Value = serde_json::from_str(&event.to_json(false).unwrap()).unwrap();

        assert_eq!(value["type"], "update");
        assert_eq!(value["contacts"][0]["identifier"], "2");
        assert_eq!(value["contacts"][0]["changeTag"], "added");
        assert_eq!(value["contacts"][1]["changeTag"], "modified");
        assert!(value["contacts"][1]["note"].is_null());
        assert_eq!(value["deleted_contacts"][0], "1");
    }

    #[test]
    fn test_update_round_trip() {
        let event = SyncEvent::update(
            vec![TaggedRecord::new(
                Record::new("9").with_email(Some("work"), "a@example.com"),
                ChangeTag::Modified,
            )],
            vec![],
        );
        let parsed = SyncEvent::from_json(&event.to_json(false).unwrap()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_frame_terminator() {
        let frame = encode_frame(&SyncEvent::initial(vec![]), false).unwrap();
        let text = String::from_utf8(frame).unwrap();

        assert!(text.ends_with("}\n\n"));
        assert_eq!(text.matches('\n').count(), 2);
    }

    #[test]
    fn test_pretty_frame_has_single_blank_line() {
        let event = SyncEvent::initial(vec![sample_record("1"), Record::new("2")]);
        let text = String::from_utf8(encode_frame(&event, true).unwrap()).unwrap();

        assert_eq!(text.matches("\n\n").count(), 1);
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_decode_frames() {
        let mut stream = encode_frame(&SyncEvent::initial(vec![sample_record("1")]), true).unwrap();
        stream.extend(encode_frame(&SyncEvent::update(vec![], vec!["1".into()]), false).unwrap());

        let events = decode_frames(std::str::from_utf8(&stream).unwrap()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].type_name(), "initial");
        assert_eq!(events[1].type_name(), "update");
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let frame = encode_frame(&SyncEvent::update(vec![], vec!["x".into()]), false).unwrap();
        let text = String::from_utf8(frame).unwrap();
        let (head, tail) = text.split_at(text.len() - 1);

        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(head).unwrap().is_empty());
        assert_eq!(decoder.push(tail).unwrap().len(), 1);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn test_decode_rejects_unterminated_frame() {
        assert!(decode_frames("{\"type\":\"update\",\"contacts\":[],\"deleted_contacts\":[]}").is_err());
    }
}
