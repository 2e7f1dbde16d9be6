//! # Record Formatter
//!
//! Turns a store-native contact into a plain [`Record`].
//!
//! A store hands the coordinator records that have already been formatted.
//! A formatter failure is scoped to one record: the store logs it, skips the
//! record and keeps building the rest of the result.

use serde::Deserialize;
use tracing::warn;

use contact_core::validation::validate_record;
use contact_core::{CoreError, CoreResult, LabeledValue, Record};

/// Converts one native record into its plain form.
pub trait RecordFormatter<N>: Send + Sync {
    fn format(&self, native: &N) -> CoreResult<Record>;
}

// =============================================================================
// Native Contact Document
// =============================================================================

/// A contact as stored on disk, before formatting.
///
/// Unknown keys (`middleName`, `nickname`, `namePrefix`, ...) are accepted
/// and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeContact {
    #[serde(default)]
    pub identifier: Option<String>,

    #[serde(default)]
    pub given_name: Option<String>,

    #[serde(default)]
    pub family_name: Option<String>,

    #[serde(default)]
    pub organization_name: Option<String>,

    #[serde(default)]
    pub note: Option<String>,

    #[serde(default)]
    pub phone_numbers: Vec<NativeLabeledValue>,

    #[serde(default)]
    pub email_addresses: Vec<NativeLabeledValue>,
}

/// A labeled value as stored on disk. `value` may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NativeLabeledValue {
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub value: Option<String>,
}

impl NativeContact {
    /// Parses a native document. A document without an identifier takes
    /// `fallback_id`.
    pub fn from_json(json: &str, fallback_id: &str) -> CoreResult<Self> {
        let mut native: NativeContact = serde_json::from_str(json)
            .map_err(|e| CoreError::invalid(fallback_id, format!("malformed document: {}", e)))?;

        if native
            .identifier
            .as_deref()
            .map_or(true, |id| id.trim().is_empty())
        {
            native.identifier = Some(fallback_id.to_string());
        }

        Ok(native)
    }
}

// =============================================================================
// JSON Contact Formatter
// =============================================================================

/// Formatter for [`NativeContact`] documents.
///
/// Empty text fields become `None`; labels pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContactFormatter;

fn non_empty(field: &Option<String>) -> Option<String> {
    field.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

fn labeled_values(
    identifier: &str,
    field: &str,
    values: &[NativeLabeledValue],
) -> CoreResult<Vec<LabeledValue>> {
    values
        .iter()
        .enumerate()
        .map(|(index, native)| {
            let value = native.value.clone().ok_or_else(|| {
                CoreError::invalid(identifier, format!("{}[{}] has no value", field, index))
            })?;
            Ok(LabeledValue {
                label: native.label.clone(),
                value,
            })
        })
        .collect()
}

impl RecordFormatter<NativeContact> for JsonContactFormatter {
    fn format(&self, native: &NativeContact) -> CoreResult<Record> {
        let identifier = native
            .identifier
            .clone()
            .ok_or_else(|| CoreError::invalid("unknown", "record has no identifier"))?;

        let record = Record {
            phone_numbers: labeled_values(&identifier, "phoneNumbers", &native.phone_numbers)?,
            email_addresses: labeled_values(
                &identifier,
                "emailAddresses",
                &native.email_addresses,
            )?,
            given_name: non_empty(&native.given_name),
            family_name: non_empty(&native.family_name),
            organization_name: non_empty(&native.organization_name),
            note: non_empty(&native.note),
            identifier,
        };

        validate_record(&record).map_err(|e| CoreError::invalid(&record.identifier, e.to_string()))?;
        Ok(record)
    }
}

/// Formats a batch, skipping and logging records that fail.
pub fn format_all<N, F>(formatter: &F, natives: &[N]) -> Vec<Record>
where
    F: RecordFormatter<N> + ?Sized,
{
    natives
        .iter()
        .filter_map(|native| match formatter.format(native) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Skipping record that could not be formatted");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignores_extra_keys() {
        let json = r#"{
            "identifier": "abc",
            "givenName": "Grace",
            "middleName": "Brewster",
            "nickname": "Amazing",
            "phoneNumbers": [{"label": "_$!<Mobile>!$_", "value": "555-0100"}]
        }"#;
        let native = NativeContact::from_json(json, "file-stem").unwrap();
        let record = JsonContactFormatter.format(&native).unwrap();

        assert_eq!(record.identifier, "abc");
        assert_eq!(record.given_name.as_deref(), Some("Grace"));
        assert_eq!(record.family_name, None);
        assert_eq!(record.phone_numbers[0].label.as_deref(), Some("_$!<Mobile>!$_"));
    }

    #[test]
    fn test_missing_identifier_uses_fallback() {
        let native = NativeContact::from_json(r#"{"familyName": "Hopper"}"#, "grace").unwrap();
        assert_eq!(native.identifier.as_deref(), Some("grace"));

        let native = NativeContact::from_json(r#"{"identifier": "  "}"#, "blank").unwrap();
        assert_eq!(native.identifier.as_deref(), Some("blank"));
    }

    #[test]
    fn test_malformed_document() {
        let err = NativeContact::from_json("[1, 2", "broken").unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_empty_text_becomes_null() {
        let native = NativeContact {
            identifier: Some("1".into()),
            note: Some("".into()),
            organization_name: Some("Navy".into()),
            ..Default::default()
        };
        let record = JsonContactFormatter.format(&native).unwrap();
        assert_eq!(record.note, None);
        assert_eq!(record.organization_name.as_deref(), Some("Navy"));
    }

    #[test]
    fn test_value_required() {
        let native = NativeContact {
            identifier: Some("1".into()),
            email_addresses: vec![NativeLabeledValue {
                label: Some("work".into()),
                value: None,
            }],
            ..Default::default()
        };
        assert!(JsonContactFormatter.format(&native).is_err());

        let native = NativeContact {
            identifier: Some("2".into()),
            phone_numbers: vec![NativeLabeledValue {
                label: None,
                value: Some(" ".into()),
            }],
            ..Default::default()
        };
        assert!(JsonContactFormatter.format(&native).is_err());
    }

    #[test]
    fn test_format_all_skips_failures() {
        let natives = vec![
            NativeContact {
                identifier: Some("ok".into()),
                ..Default::default()
            },
            NativeContact::default(),
        ];
        let records = format_all(&JsonContactFormatter, &natives);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier, "ok");
    }
}
