//! Strict extraction of structured output from agent text.
//!
//! The agent may wrap its JSON in a fenced block or surround it with prose.
//! Extraction accepts either form; anything that does not decode against the
//! phase schema becomes `AgentError::MalformedOutput`.

use super::outputs::AgentOutput;
use crate::errors::AgentError;
use crate::phase::PhaseId;
use regex::Regex;
use std::sync::LazyLock;

static FENCED_JSON_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// Locate the JSON object in `text`: fenced block first, then the outermost braces.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(cap) = FENCED_JSON_REGEX.captures(text)
        && let Some(body) = cap.get(1)
    {
        return Some(body.as_str());
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode agent text into the typed output for `phase`.
pub fn parse_output(phase: PhaseId, text: &str) -> Result<AgentOutput, AgentError> {
    let json = extract_json(text).ok_or_else(|| AgentError::MalformedOutput {
        phase,
        reason: "no JSON object found in agent output".to_string(),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| AgentError::MalformedOutput {
            phase,
            reason: format!("invalid JSON: {}", e),
        })?;
    AgentOutput::from_value(phase, value)
        .map_err(|reason| AgentError::MalformedOutput { phase, reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_fenced_block() {
        let text = "분석 결과입니다.\n```json\n{\"quality_score\": 0.8}\n```\n끝.";
        assert_eq!(extract_json(text), Some("{\"quality_score\": 0.8}"));
    }

    #[test]
    fn test_extracts_bare_object_with_braces_in_strings() {
        let text = r#"Result: {"critique": "uses {placeholders}", "quality_score": 0.5} trailing"#;
        assert_eq!(
            extract_json(text),
            Some(r#"{"critique": "uses {placeholders}", "quality_score": 0.5}"#)
        );
    }

    #[test]
    fn test_no_json_is_malformed() {
        let err = parse_output(PhaseId::Critique, "I could not review the draft.").unwrap_err();
        match err {
            AgentError::MalformedOutput { phase, reason } => {
                assert_eq!(phase, PhaseId::Critique);
                assert!(reason.contains("no JSON"));
            }
            other => panic!("Expected MalformedOutput, got {other:?}"),
        }
    }

    #[test]
    fn test_schema_mismatch_is_malformed() {
        let err = parse_output(PhaseId::Critique, r#"{"quality_score": "high"}"#).unwrap_err();
        assert!(matches!(err, AgentError::MalformedOutput { .. }));
    }

    #[test]
    fn test_parses_plan_output() {
        let text = r#"{"core_message": "안정적 전환", "win_themes": ["AWS 전문성"]}"#;
        match parse_output(PhaseId::Plan, text).unwrap() {
            AgentOutput::Plan(plan) => assert_eq!(plan.win_themes, vec!["AWS 전문성"]),
            other => panic!("Expected plan output, got {other:?}"),
        }
    }
}
