//! Oracle output parsing for the two-line verdict contract.
//!
//! Line 1 is the level token, everything after it is the summary page.
//! Anything other than an exact "1" or "2" on line 1 is a parse failure.

use std::sync::LazyLock;

use regex::Regex;

use super::error::TriageError;
use super::types::{TraumaLevel, Verdict};

/// Strip model artifacts from raw oracle output.
///
/// Handles thinking blocks (`<think>...</think>`, `<unusedN>thought\n...`),
/// stray `<unusedN>` tokens and surrounding markdown code fences.
pub fn sanitize_oracle_output(raw: &str) -> String {
    static THINK_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
    static UNUSED_TOKEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

    let mut text = raw.replace("\r\n", "\n");

    if let Some(idx) = text.find("<unused") {
        if let Some(thought_offset) = text[idx..].find("thought\n") {
            text = text[idx + thought_offset + "thought\n".len()..].to_string();
        }
    }

    text = THINK_BLOCK_RE.replace_all(&text, "").to_string();
    text = UNUSED_TOKEN_RE.replace_all(&text, "").to_string();

    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
        .map(|inner| {
            // Drop an optional language tag on the opening fence line.
            match inner.split_once('\n') {
                Some((tag, body)) if !tag.trim().contains(' ') && tag.trim().len() < 16 => body,
                _ => inner,
            }
        })
        .unwrap_or(trimmed);

    unfenced.trim().to_string()
}

/// Parse one stage's response into a verdict.
pub fn parse_verdict(raw: &str) -> Result<Verdict, TriageError> {
    let text = sanitize_oracle_output(raw);
    let mut lines = text.lines();

    let first = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| TriageError::Parse("empty oracle response".into()))?;

    let level: TraumaLevel = first
        .parse()
        .map_err(|e| TriageError::Parse(format!("bad level line: {e}")))?;

    let summary = lines
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Verdict { level, summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_line_contract() {
        let v = parse_verdict("2\nL2, 14 y/o, Vitals(118/76, 88, 16), GCS: 15, MOI (fall), ETA: 8").unwrap();
        assert_eq!(v.level, TraumaLevel::Two);
        assert_eq!(v.summary, "L2, 14 y/o, Vitals(118/76, 88, 16), GCS: 15, MOI (fall), ETA: 8");
    }

    #[test]
    fn level_line_is_trimmed_and_extra_lines_joined() {
        let v = parse_verdict("  1  \nL1, 9 y/o\n\nGCS: 8\r\nMOI (MVC)").unwrap();
        assert_eq!(v.level, TraumaLevel::One);
        assert_eq!(v.summary, "L1, 9 y/o GCS: 8 MOI (MVC)");
    }

    #[test]
    fn level_only_gives_empty_summary() {
        let v = parse_verdict("1").unwrap();
        assert_eq!(v.level, TraumaLevel::One);
        assert!(v.summary.is_empty());
    }

    #[test]
    fn rejects_non_token_level_lines() {
        for raw in ["Level 1\nL1", "L2, 14 y/o", "3\nL3", "1 or 2\n", "Line 1: 2\nL2"] {
            let err = parse_verdict(raw).unwrap_err();
            assert!(matches!(err, TriageError::Parse(_)), "accepted {raw:?}");
        }
    }

    #[test]
    fn rejects_empty_output() {
        assert!(matches!(parse_verdict(""), Err(TriageError::Parse(_))));
        assert!(matches!(parse_verdict(" \n \n"), Err(TriageError::Parse(_))));
    }

    #[test]
    fn strips_code_fence() {
        let v = parse_verdict("```\n2\nL2, 10 y/o\n```").unwrap();
        assert_eq!(v.level, TraumaLevel::Two);
        assert_eq!(v.summary, "L2, 10 y/o");

        let v = parse_verdict("```text\n1\nL1, 6 y/o\n```").unwrap();
        assert_eq!(v.level, TraumaLevel::One);
    }

    #[test]
    fn strips_thinking_artifacts() {
        let v = parse_verdict("<unused94>thought\n1\nL1, 4 y/o").unwrap();
        assert_eq!(v.level, TraumaLevel::One);

        let v = parse_verdict("<think>GCS unknown, HR 140...</think>\n1\nL1, 12 y/o").unwrap();
        assert_eq!(v.level, TraumaLevel::One);
        assert_eq!(v.summary, "L1, 12 y/o");
    }

    #[test]
    fn clean_text_unchanged_by_sanitizer() {
        let text = "2\nL2, 14 y/o";
        assert_eq!(sanitize_oracle_output(text), text);
    }
}
