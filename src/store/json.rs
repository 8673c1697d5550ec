//! JSON import/export of the batch table.
//!
//! Import accepts a JSON array or JSON Lines; each item is either a bare
//! transcript string or an object with a `transcript` field.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::StoreError;
use crate::triage::TriageCase;

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportItem {
    Text(String),
    Record {
        #[serde(default)]
        transcript: Option<String>,
    },
}

impl ImportItem {
    fn into_transcript(self) -> Option<String> {
        match self {
            Self::Text(t) => Some(t),
            Self::Record { transcript } => transcript,
        }
    }
}

/// Parse transcripts from JSON array or JSON Lines text.
pub fn parse_transcripts(text: &str) -> Result<Vec<Option<String>>, StoreError> {
    let trimmed = text.trim_start();

    let items: Vec<ImportItem> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?
    };

    Ok(items.into_iter().map(ImportItem::into_transcript).collect())
}

pub fn read_transcripts(path: &Path) -> Result<Vec<Option<String>>, StoreError> {
    parse_transcripts(&fs::read_to_string(path)?)
}

/// Write every case, with its full audit trail, as pretty JSON.
pub fn write_export(path: &Path, cases: &[TriageCase]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(cases)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::{TraumaLevel, Verdict};

    #[test]
    fn parses_json_array_of_mixed_items() {
        let text = r#"["GCS 15, fall", {"transcript": "HR 140"}, {"transcript": null}, {"id": 7}]"#;
        let parsed = parse_transcripts(text).unwrap();
        assert_eq!(
            parsed,
            vec![Some("GCS 15, fall".into()), Some("HR 140".into()), None, None]
        );
    }

    #[test]
    fn parses_json_lines() {
        let text = "{\"transcript\": \"a\"}\n\n\"b\"\n";
        assert_eq!(
            parse_transcripts(text).unwrap(),
            vec![Some("a".into()), Some("b".into())]
        );
    }

    #[test]
    fn malformed_input_is_json_error() {
        assert!(matches!(parse_transcripts("{not json"), Err(StoreError::Json(_))));
    }

    #[test]
    fn export_contains_audit_trail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut case = TriageCase::new(0, "HR 140");
        case.hybrid_level = Some(TraumaLevel::One);
        case.conservative = Some(Verdict::new(TraumaLevel::Two, "L2"));
        case.aggressive = Some(Verdict::new(TraumaLevel::One, "L1"));

        write_export(&path, &[case]).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["hybrid_level"], "1");
        assert_eq!(value[0]["conservative"]["level"], "2");
        assert_eq!(value[0]["aggressive"]["summary"], "L1");
        assert!(value[0]["tiebreak"].is_null());
    }
}
