//! # Domain Types
//!
//! The plain record shape shared by the store adapters, the coordinator and
//! the wire protocol.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌─────────────────┐   ┌─────────────────┐  │
//! │  │       Record         │   │  LabeledValue   │   │   ChangeTag     │  │
//! │  │  ──────────────────  │   │  ─────────────  │   │  ─────────────  │  │
//! │  │  identifier          │   │  label?         │   │  Added          │  │
//! │  │  givenName?          │   │  value          │   │  Modified       │  │
//! │  │  familyName?         │   └─────────────────┘   └─────────────────┘  │
//! │  │  organizationName?   │                                              │
//! │  │  note?               │                                              │
//! │  │  phoneNumbers[]      │                                              │
//! │  │  emailAddresses[]    │                                              │
//! │  └──────────────────────┘                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `Record` is an immutable value: every fetch produces a fresh one and
//! nothing mutates it after it leaves the formatter.

use serde::{Deserialize, Serialize};

use crate::NO_NAME;

/// Stable identifier of a record within its store.
pub type RecordId = String;

// =============================================================================
// Labeled Value
// =============================================================================

/// A phone number or email address with its optional label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledValue {
    /// Store-provided label (`"_$!<Mobile>!$_"`, `"work"`, ...). May be absent.
    pub label: Option<String>,

    /// The phone number or address itself.
    pub value: String,
}

impl LabeledValue {
    /// Creates a labeled value.
    pub fn new(label: Option<&str>, value: &str) -> Self {
        LabeledValue {
            label: label.map(str::to_string),
            value: value.to_string(),
        }
    }
}

// =============================================================================
// Record
// =============================================================================

/// One directory entry in its plain, store-independent shape.
///
/// Serializes to the wire record shape:
/// `{"identifier", "givenName", "familyName", "organizationName", "note",
///   "phoneNumbers", "emailAddresses"}` with absent text fields as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable, unique identifier.
    pub identifier: RecordId,

    pub given_name: Option<String>,

    pub family_name: Option<String>,

    pub organization_name: Option<String>,

    pub note: Option<String>,

    /// Ordered as the store returned them.
    #[serde(default)]
    pub phone_numbers: Vec<LabeledValue>,

    /// Ordered as the store returned them.
    #[serde(default)]
    pub email_addresses: Vec<LabeledValue>,
}

impl Record {
    /// Creates a record carrying only its identifier.
    pub fn new(identifier: impl Into<RecordId>) -> Self {
        Record {
            identifier: identifier.into(),
            given_name: None,
            family_name: None,
            organization_name: None,
            note: None,
            phone_numbers: Vec::new(),
            email_addresses: Vec::new(),
        }
    }

    /// Sets given and family name.
    pub fn with_name(mut self, given: &str, family: &str) -> Self {
        self.given_name = Some(given.to_string());
        self.family_name = Some(family.to_string());
        self
    }

    /// Sets the organization name.
    pub fn with_organization(mut self, organization: &str) -> Self {
        self.organization_name = Some(organization.to_string());
        self
    }

    /// Sets the note.
    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    /// Appends a phone number.
    pub fn with_phone(mut self, label: Option<&str>, value: &str) -> Self {
        self.phone_numbers.push(LabeledValue::new(label, value));
        self
    }

    /// Appends an email address.
    pub fn with_email(mut self, label: Option<&str>, value: &str) -> Self {
        self.email_addresses.push(LabeledValue::new(label, value));
        self
    }

    /// Human-readable name for diagnostics.
    ///
    /// "given family" when either is non-empty, otherwise the organization,
    /// otherwise `[No Name]`.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if !parts.is_empty() {
            return parts.join(" ");
        }

        match self.organization_name.as_deref().map(str::trim) {
            Some(org) if !org.is_empty() => org.to_string(),
            _ => NO_NAME.to_string(),
        }
    }
}

// =============================================================================
// Change Tag
// =============================================================================

/// Why a record appears in an update.
///
/// There is no "unchanged" tag: a record retained across a change signal is
/// always reported as `Modified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTag {
    /// The identifier was not in the previous snapshot.
    Added,
    /// The identifier was in both snapshots.
    Modified,
}

impl std::fmt::Display for ChangeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeTag::Added => write!(f, "added"),
            ChangeTag::Modified => write!(f, "modified"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_person_name() {
        let record = Record::new("1").with_name("Ada", "Lovelace").with_organization("ACME");
        assert_eq!(record.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_display_name_falls_back() {
        let org_only = Record::new("2").with_organization("ACME");
        assert_eq!(org_only.display_name(), "ACME");

        let mut blank = Record::new("3");
        blank.given_name = Some("  ".into());
        assert_eq!(blank.display_name(), NO_NAME);
    }

    #[test]
    fn test_record_wire_shape() {
        let record = Record::new("abc").with_phone(None, "+1 555 0100");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["identifier"], "abc");
        assert!(json["givenName"].is_null());
        assert!(json["organizationName"].is_null());
        assert!(json["phoneNumbers"][0]["label"].is_null());
        assert_eq!(json["phoneNumbers"][0]["value"], "+1 555 0100");
        assert_eq!(json["emailAddresses"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_record_round_trip() {
        let record = Record::new("xyz")
            .with_name("Grace", "Hopper")
            .with_note("line one\nline two")
            .with_phone(Some("work"), "555-0199")
            .with_email(None, "grace@example.com");

        let json = serde_json::to_string(&record).unwrap();
        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_bare_record_round_trip() {
        let record = Record::new("bare");

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"identifier":"bare","givenName":null,"familyName":null,"organizationName":null,"note":null,"phoneNumbers":[],"emailAddresses":[]}"#
        );

        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
        assert!(parsed.given_name.is_none() && parsed.note.is_none());
        assert!(parsed.phone_numbers.is_empty() && parsed.email_addresses.is_empty());
    }

    #[test]
    fn test_change_tag_serialization() {
        assert_eq!(serde_json::to_string(&ChangeTag::Added).unwrap(), "\"added\"");
        assert_eq!(ChangeTag::Modified.to_string(), "modified");
    }
}
