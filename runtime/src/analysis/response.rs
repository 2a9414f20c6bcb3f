//! Normalization of summarization responses.
//!
//! The backend is asked for `{ summary, score }` but may wrap it in an
//! envelope, fence it in a markdown code block, bury it in prose or ignore
//! the format entirely. [`parse_response`] accepts all of these and always
//! returns a well-formed [`AnalysisResult`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::warn;

/// Number of summary points a complete analysis carries.
pub const EXPECTED_SUMMARY_POINTS: usize = 7;

/// Score used when the response carries none.
pub const DEFAULT_RISK_SCORE: u8 = 5;

const FALLBACK_SUMMARY: &str = "The analysis service returned no readable summary for this document.";

/// A normalized policy analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary_points: Vec<String>,
    /// Risk on a 1 (benign) to 10 (invasive) scale.
    pub risk_score: u8,
}

impl AnalysisResult {
    /// Whether the result has exactly the expected number of summary points.
    pub fn is_complete(&self) -> bool {
        self.summary_points.len() == EXPECTED_SUMMARY_POINTS
    }
}

/// Request body sent to the backend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest<'a> {
    pub policy_text: &'a str,
}

/// What a backend body says, before normalization.
#[derive(Debug, PartialEq)]
pub enum ResponseBody {
    /// An explicit `success: false` envelope with its error message.
    Failure(String),
    Result(AnalysisResult),
}

/// Parse a raw response body into an [`AnalysisResult`].
///
/// Envelope failures are folded into the fallback result; use
/// [`interpret_response`] to tell them apart.
pub fn parse_response(raw: &str) -> AnalysisResult {
    match interpret_response(raw) {
        ResponseBody::Result(result) => result,
        ResponseBody::Failure(_) => build_result(Vec::new(), None),
    }
}

/// Interpret a raw response body, distinguishing envelope failures.
pub fn interpret_response(raw: &str) -> ResponseBody {
    let stripped = strip_code_blocks(raw);

    let value = serde_json::from_str::<Value>(stripped)
        .ok()
        .or_else(|| embedded_object(stripped));

    match value {
        Some(value) => from_value(&value),
        None => {
            warn!("analysis response is not JSON, salvaging summary from text");
            ResponseBody::Result(salvage(raw))
        }
    }
}

fn from_value(value: &Value) -> ResponseBody {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("error")
            .map(|e| match e {
                Value::String(s) => s.clone(),
                Value::Object(o) => o
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "unknown error".to_string());
        return ResponseBody::Failure(message);
    }

    let payload = value.get("data").filter(|d| d.is_object()).unwrap_or(value);

    let points = match payload.get("summary") {
        Some(Value::String(s)) => summary_points(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(clean_point)
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    let score = match payload.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    ResponseBody::Result(build_result(points, score))
}

/// Split a summary string into points: bullet lines if there are any,
/// otherwise non-empty lines.
fn summary_points(summary: &str) -> Vec<String> {
    let bullets: Vec<String> = summary
        .lines()
        .filter_map(|line| bullet_re().and_then(|re| re.captures(line)))
        .filter_map(|c| c.get(1).map(|m| clean_point(m.as_str())))
        .filter(|p| !p.is_empty())
        .collect();
    if !bullets.is_empty() {
        return bullets;
    }
    summary
        .lines()
        .map(clean_point)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Best-effort extraction from free text: bullet lines plus a "score: N" hint.
fn salvage(raw: &str) -> AnalysisResult {
    let points: Vec<String> = raw
        .lines()
        .filter_map(|line| bullet_re().and_then(|re| re.captures(line)))
        .filter_map(|c| c.get(1).map(|m| clean_point(m.as_str())))
        .filter(|p| !p.is_empty())
        .collect();

    let score = score_re()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    build_result(points, score)
}

fn build_result(mut points: Vec<String>, score: Option<f64>) -> AnalysisResult {
    if points.is_empty() {
        points.push(FALLBACK_SUMMARY.to_string());
    }
    let risk_score = match score {
        Some(s) if s.is_finite() => s.round().clamp(1.0, 10.0) as u8,
        _ => DEFAULT_RISK_SCORE,
    };
    AnalysisResult {
        summary_points: points,
        risk_score,
    }
}

/// The first balanced-looking `{ ... }` span that parses as JSON.
fn embedded_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Strip markdown code fences from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn clean_point(s: &str) -> String {
    let s = s.trim();
    let s = bullet_re()
        .and_then(|re| re.captures(s))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(s);
    s.trim().to_string()
}

fn bullet_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*•]|\d{1,2}[.)])\s+(.+)$").ok())
        .as_ref()
}

fn score_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:risk\s+)?(?:score|rating)\D{0,20}?(\d{1,2})\b").ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seven_bullets() -> String {
        (1..=7).map(|i| format!("- point {i}")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_envelope() {
        let raw = serde_json::json!({
            "success": true,
            "data": { "summary": seven_bullets(), "score": 7 }
        })
        .to_string();
        let r = parse_response(&raw);
        assert!(r.is_complete());
        assert_eq!(r.summary_points[0], "point 1");
        assert_eq!(r.risk_score, 7);
    }

    #[test]
    fn test_bare_object_in_code_fence() {
        let raw = format!(
            "```json\n{}\n```",
            serde_json::json!({ "summary": seven_bullets(), "score": "3" })
        );
        let r = parse_response(&raw);
        assert_eq!(r.summary_points.len(), 7);
        assert_eq!(r.risk_score, 3);
    }

    #[test]
    fn test_object_wrapped_in_prose() {
        let raw = r#"Sure! Here is the analysis: {"summary": ["a", "b"], "score": 12} Hope this helps."#;
        let r = parse_response(raw);
        assert_eq!(r.summary_points, vec!["a", "b"]);
        assert_eq!(r.risk_score, 10);
        assert!(!r.is_complete());
    }

    #[test]
    fn test_salvage_from_free_text() {
        let raw = "Summary of the policy:\n* Collects location data\n2. Shares with advertisers\nOverall risk score: 8/10";
        let r = parse_response(raw);
        assert_eq!(
            r.summary_points,
            vec!["Collects location data", "Shares with advertisers"]
        );
        assert_eq!(r.risk_score, 8);
    }

    #[test]
    fn test_unusable_response_gets_defaults() {
        let r = parse_response("I cannot help with that.");
        assert_eq!(r.summary_points, vec![FALLBACK_SUMMARY]);
        assert_eq!(r.risk_score, DEFAULT_RISK_SCORE);
        let r = parse_response(r#"{"summary": "", "score": 0}"#);
        assert_eq!(r.summary_points.len(), 1);
        assert_eq!(r.risk_score, 1);
    }

    #[test]
    fn test_failure_envelope() {
        let body = interpret_response(r#"{"success": false, "error": "Rate limit exceeded"}"#);
        assert_eq!(body, ResponseBody::Failure("Rate limit exceeded".to_string()));
        let body =
            interpret_response(r#"{"success": false, "error": {"message": "model overloaded"}}"#);
        assert_eq!(body, ResponseBody::Failure("model overloaded".to_string()));
    }

    #[test]
    fn test_plain_line_summary() {
        let r = parse_response(r#"{"summary": "First thing.\n\nSecond thing.", "score": 4.6}"#);
        assert_eq!(r.summary_points, vec!["First thing.", "Second thing."]);
        assert_eq!(r.risk_score, 5);
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn test_request_is_camel_case() {
        let body = serde_json::to_string(&AnalysisRequest { policy_text: "x" }).unwrap();
        assert_eq!(body, r#"{"policyText":"x"}"#);
    }
}
