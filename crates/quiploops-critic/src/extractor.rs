use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::{Feedback, MaturityTier};

/// Most `{` positions tried as an object start
const MAX_CANDIDATES: usize = 64;

/// Only this many bytes of model output are scanned for an object
const MAX_SCAN_BYTES: usize = 64 * 1024;

/// Deeper brace nesting abandons the candidate
const MAX_DEPTH: usize = 8;

/// Length of the raw text kept in a diagnostic (characters)
const RAW_PREFIX_CHARS: usize = 500;

const SCORE_KEYS: &[&str] = &["score", "laughability_score"];
const TIER_KEYS: &[&str] = &["maturityTier", "maturity_tier", "age_appropriateness"];
const VERDICT_KEYS: &[&str] = &["verdict", "overall_verdict"];

/// Values used when evaluator output cannot be turned into feedback
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
    pub score: u8,
    pub maturity_tier: MaturityTier,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub verdict: String,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            score: 50,
            maturity_tier: MaturityTier::Teen,
            strengths: vec!["artifact was generated".to_string()],
            weaknesses: vec!["could not parse evaluator output".to_string()],
            suggestions: vec!["retry evaluation or switch provider/model".to_string()],
            verdict: "evaluation incomplete — parsing failed".to_string(),
        }
    }
}

impl FallbackPolicy {
    /// The degraded feedback this policy produces
    pub fn feedback(&self) -> Feedback {
        Feedback::new(
            self.score as i64,
            self.maturity_tier,
            self.strengths.clone(),
            self.weaknesses.clone(),
            self.suggestions.clone(),
            self.verdict.clone(),
        )
        .into_degraded()
    }
}

/// Why an extraction fell back, for logs
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionDiagnostic {
    pub reason: String,
    /// Start of the raw model text
    pub raw_prefix: String,
}

/// Outcome of [`FeedbackExtractor::extract`]
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub feedback: Feedback,
    /// Present exactly when `feedback` is degraded
    pub diagnostic: Option<ExtractionDiagnostic>,
}

impl Extraction {
    pub fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }
}

#[derive(Error, Debug, PartialEq)]
enum ParseError {
    #[error("no JSON object found in output")]
    NoObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Turns loosely formatted evaluator text into validated feedback
#[derive(Debug, Clone, Default)]
pub struct FeedbackExtractor {
    policy: FallbackPolicy,
}

impl FeedbackExtractor {
    pub fn new(policy: FallbackPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Extract feedback from raw model text. Never fails: unparseable input
    /// yields the policy's degraded feedback plus a diagnostic.
    pub fn extract(&self, raw: &str) -> Extraction {
        match parse(raw) {
            Ok(feedback) => Extraction {
                feedback,
                diagnostic: None,
            },
            Err(e) => {
                debug!(error = %e, raw_len = raw.len(), "Falling back to degraded feedback");
                Extraction {
                    feedback: self.policy.feedback(),
                    diagnostic: Some(ExtractionDiagnostic {
                        reason: e.to_string(),
                        raw_prefix: raw.chars().take(RAW_PREFIX_CHARS).collect(),
                    }),
                }
            }
        }
    }
}

/// Extract with the default fallback policy
pub fn extract_feedback(raw: &str) -> Feedback {
    FeedbackExtractor::default().extract(raw).feedback
}

fn parse(raw: &str) -> Result<Feedback, ParseError> {
    let text = strip_code_fence(raw);
    let object = find_object(text).ok_or(ParseError::NoObject)?;
    feedback_from_object(&object)
}

/// Remove a surrounding ``` fence (with optional language tag)
fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.trim_end().strip_suffix("```") else {
        return text;
    };
    match body.split_once('\n') {
        Some((first, rest)) if is_language_tag(first) => rest.trim(),
        _ => body.trim(),
    }
}

/// `json`, `JSON5`, `text` and the like, or nothing at all
fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

/// Has a score or tier key of its own
fn looks_like_record(object: &Map<String, Value>) -> bool {
    lookup(object, SCORE_KEYS).is_some() || lookup(object, TIER_KEYS).is_some()
}

/// The object itself when it looks like a record, else the first object
/// value one level down that does
fn record_in(value: Value) -> Option<Map<String, Value>> {
    let Value::Object(object) = value else {
        return None;
    };
    if looks_like_record(&object) {
        return Some(object);
    }
    object.into_iter().find_map(|(_, inner)| match inner {
        Value::Object(inner) if looks_like_record(&inner) => Some(inner),
        _ => None,
    })
}

fn find_object(text: &str) -> Option<Map<String, Value>> {
    if let Some(record) = serde_json::from_str::<Value>(text).ok().and_then(record_in) {
        return Some(record);
    }

    let window = &text[..floor_char_boundary(text, MAX_SCAN_BYTES)];
    let bytes = window.as_bytes();

    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'{')
        .take(MAX_CANDIDATES)
        .find_map(|(start, _)| {
            let end = matching_brace(bytes, start)?;
            serde_json::from_str::<Value>(&window[start..=end])
                .ok()
                .and_then(record_in)
        })
}

/// Index of the `}` closing the `{` at `start`, honouring string literals
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return None;
                }
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn floor_char_boundary(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}

fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| object.get(*k))
}

fn feedback_from_object(object: &Map<String, Value>) -> Result<Feedback, ParseError> {
    let score = parse_score(lookup(object, SCORE_KEYS))?;
    let tier = parse_tier(lookup(object, TIER_KEYS))?;
    let strengths = parse_list("strengths", object.get("strengths"))?;
    let weaknesses = parse_list("weaknesses", object.get("weaknesses"))?;
    let suggestions = parse_list("suggestions", object.get("suggestions"))?;
    let verdict = parse_verdict(lookup(object, VERDICT_KEYS))?;

    Ok(Feedback::new(
        score,
        tier,
        strengths,
        weaknesses,
        suggestions,
        verdict,
    ))
}

fn parse_score(value: Option<&Value>) -> Result<i64, ParseError> {
    let invalid = |reason: &str| ParseError::InvalidField {
        field: "score",
        reason: reason.to_string(),
    };

    let number = match value.ok_or(ParseError::MissingField("score"))? {
        Value::Number(n) => match n.as_i64() {
            Some(i) => return Ok(i),
            None => n.as_f64().ok_or_else(|| invalid("not a finite number"))?,
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => return Ok(i),
                Err(_) => s
                    .parse::<f64>()
                    .map_err(|_| invalid("not a number"))?,
            }
        }
        other => return Err(invalid(&format!("expected a number, got {}", other))),
    };

    if !number.is_finite() {
        return Err(invalid("not a finite number"));
    }
    // Saturating cast, the result is clamped to the score range anyway
    Ok(number.round() as i64)
}

fn parse_tier(value: Option<&Value>) -> Result<MaturityTier, ParseError> {
    match value.ok_or(ParseError::MissingField("maturityTier"))? {
        Value::String(s) => s
            .parse()
            .map_err(|reason| ParseError::InvalidField {
                field: "maturityTier",
                reason,
            }),
        other => Err(ParseError::InvalidField {
            field: "maturityTier",
            reason: format!("expected a string, got {}", other),
        }),
    }
}

fn parse_list(field: &'static str, value: Option<&Value>) -> Result<Vec<String>, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ParseError::InvalidField {
                    field,
                    reason: format!("non-string element {}", other),
                }),
            })
            .collect(),
        Some(other) => Err(ParseError::InvalidField {
            field,
            reason: format!("expected a list, got {}", other),
        }),
    }
}

fn parse_verdict(value: Option<&Value>) -> Result<String, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ParseError::InvalidField {
            field: "verdict",
            reason: format!("expected a string, got {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::NO_VERDICT;

    fn genuine() -> Feedback {
        Feedback::new(
            64,
            MaturityTier::Adult,
            vec!["tight setup".into(), "good twist".into()],
            vec!["predictable ending".into()],
            vec!["cut the first clause".into()],
            "Clever but familiar.",
        )
    }

    #[test]
    fn test_plain_json_object() {
        let raw = r#"{"score": 80, "maturityTier": "Child", "strengths": ["cute"],
            "weaknesses": [], "suggestions": ["add a tag"], "verdict": "Sweet."}"#;
        let extraction = FeedbackExtractor::default().extract(raw);
        assert!(!extraction.is_degraded());
        assert_eq!(extraction.feedback.score(), 80);
        assert_eq!(extraction.feedback.maturity_tier(), MaturityTier::Child);
        assert_eq!(extraction.feedback.suggestions(), ["add a tag"]);
        assert_eq!(extraction.feedback.verdict(), "Sweet.");
    }

    #[test]
    fn test_fenced_with_prose_and_promotion() {
        let raw = "Here is my evaluation:\n```json\n{\"score\": 150, \"maturityTier\": \"TEEN\", \"strengths\": \"Good pun\", \"weaknesses\": [\"long\"], \"suggestions\": [], \"verdict\": \"Fun\"}\n```";
        let extraction = FeedbackExtractor::default().extract(raw);
        assert!(!extraction.is_degraded());
        let fb = extraction.feedback;
        assert_eq!(fb.score(), 100);
        assert_eq!(fb.maturity_tier(), MaturityTier::Teen);
        assert_eq!(fb.strengths(), ["Good pun"]);
        assert!(!fb.is_degraded());
    }

    #[test]
    fn test_score_clamping() {
        let high = extract_feedback(r#"{"score": 999, "maturityTier": "Teen", "verdict": "x"}"#);
        assert_eq!(high.score(), 100);
        let low = extract_feedback(r#"{"score": -10, "maturityTier": "Teen", "verdict": "x"}"#);
        assert_eq!(low.score(), 0);
        assert!(!low.is_degraded());
    }

    #[test]
    fn test_score_accepts_float_and_numeric_string() {
        let fb = extract_feedback(r#"{"score": 72.6, "maturityTier": "teen"}"#);
        assert_eq!(fb.score(), 73);
        let fb = extract_feedback(r#"{"score": " 41 ", "maturityTier": "adult"}"#);
        assert_eq!(fb.score(), 41);
        let fb = extract_feedback(r#"{"score": "12.4", "maturityTier": "adult"}"#);
        assert_eq!(fb.score(), 12);
    }

    #[test]
    fn test_never_fails_on_garbage() {
        let extractor = FeedbackExtractor::default();
        for raw in [
            "",
            "   ",
            "This joke is great, I'd give it an 8.",
            "{ not json at all",
            "}{",
            "{\"score\": }",
            "[1, 2, 3]",
            "```json\n```",
        ] {
            let extraction = extractor.extract(raw);
            assert!(extraction.is_degraded(), "expected fallback for {:?}", raw);
            assert!(extraction.feedback.is_degraded());
        }
    }

    #[test]
    fn test_fallback_uses_policy() {
        let extraction = FeedbackExtractor::default().extract("no braces here");
        let fb = extraction.feedback;
        assert_eq!(fb.score(), 50);
        assert_eq!(fb.maturity_tier(), MaturityTier::Teen);
        assert_eq!(fb.strengths(), ["artifact was generated"]);
        assert_eq!(fb.weaknesses(), ["could not parse evaluator output"]);
        assert_eq!(fb.suggestions(), ["retry evaluation or switch provider/model"]);
        assert_eq!(fb.verdict(), "evaluation incomplete — parsing failed");

        let custom = FeedbackExtractor::new(FallbackPolicy {
            score: 0,
            verdict: "unrated".into(),
            ..FallbackPolicy::default()
        });
        let fb = custom.extract("nope").feedback;
        assert_eq!(fb.score(), 0);
        assert_eq!(fb.verdict(), "unrated");
    }

    #[test]
    fn test_diagnostic_prefix_is_bounded() {
        let raw = "é".repeat(2000);
        let diagnostic = FeedbackExtractor::default().extract(&raw).diagnostic.unwrap();
        assert_eq!(diagnostic.raw_prefix.chars().count(), 500);
        assert_eq!(diagnostic.reason, "no JSON object found in output");
    }

    #[test]
    fn test_missing_required_fields_degrade() {
        let extraction = FeedbackExtractor::default().extract(r#"{"maturityTier": "Teen"}"#);
        assert_eq!(extraction.diagnostic.unwrap().reason, "missing field 'score'");

        let extraction = FeedbackExtractor::default().extract(r#"{"score": 10}"#);
        assert_eq!(
            extraction.diagnostic.unwrap().reason,
            "missing field 'maturityTier'"
        );

        let extraction =
            FeedbackExtractor::default().extract(r#"{"score": 10, "maturityTier": "Senior"}"#);
        assert!(extraction.is_degraded());
    }

    #[test]
    fn test_non_string_list_element_degrades() {
        let extraction = FeedbackExtractor::default()
            .extract(r#"{"score": 10, "maturityTier": "Teen", "strengths": ["ok", 3]}"#);
        assert!(extraction.is_degraded());
    }

    #[test]
    fn test_null_lists_and_missing_verdict() {
        let fb = extract_feedback(
            r#"{"score": 30, "maturityTier": "Child", "strengths": null, "verdict": "  "}"#,
        );
        assert!(!fb.is_degraded());
        assert!(fb.strengths().is_empty());
        assert!(fb.weaknesses().is_empty());
        assert_eq!(fb.verdict(), NO_VERDICT);
    }

    #[test]
    fn test_legacy_field_names() {
        let fb = extract_feedback(
            r#"{"laughability_score": 55, "age_appropriateness": "Adult",
               "strengths": ["dry"], "weaknesses": ["slow"], "suggestions": ["trim"],
               "overall_verdict": "Decent."}"#,
        );
        assert!(!fb.is_degraded());
        assert_eq!(fb.score(), 55);
        assert_eq!(fb.maturity_tier(), MaturityTier::Adult);
        assert_eq!(fb.verdict(), "Decent.");
    }

    #[test]
    fn test_degraded_flag_is_not_read_from_text() {
        let fb = extract_feedback(r#"{"score": 70, "maturityTier": "Teen", "degraded": true}"#);
        assert!(!fb.is_degraded());
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let raw = r#"Sure! {"score": 61, "maturityTier": "Teen", "verdict": "Uses a } and a \" nicely {"} trailing"#;
        let fb = extract_feedback(raw);
        assert!(!fb.is_degraded());
        assert_eq!(fb.verdict(), "Uses a } and a \" nicely {");
    }

    #[test]
    fn test_skips_unparseable_candidates() {
        let raw = r#"{oops} then {"score": 20, "maturityTier": "Child"}"#;
        let fb = extract_feedback(raw);
        assert!(!fb.is_degraded());
        assert_eq!(fb.score(), 20);
    }

    #[test]
    fn test_skips_objects_without_record_keys() {
        let raw = r#"Format used: {} as asked, e.g. {"example": true}. {"score": 80, "maturityTier": "Teen", "strengths": ["pun"], "verdict": "ok"}"#;
        let extraction = FeedbackExtractor::default().extract(raw);
        assert!(!extraction.is_degraded());
        assert_eq!(extraction.feedback.score(), 80);
        assert_eq!(extraction.feedback.strengths(), ["pun"]);
    }

    #[test]
    fn test_record_wrapped_one_level_deep() {
        let raw = r#"{"evaluation": {"score": 80, "maturityTier": "Adult", "verdict": "Sharp."}}"#;
        let extraction = FeedbackExtractor::default().extract(raw);
        assert!(!extraction.is_degraded());
        assert_eq!(extraction.feedback.score(), 80);
        assert_eq!(extraction.feedback.maturity_tier(), MaturityTier::Adult);

        let fenced = format!("Result:\n```json\n{}\n```", raw);
        assert_eq!(extract_feedback(&fenced).score(), 80);
    }

    #[test]
    fn test_object_without_record_is_no_object() {
        let extraction = FeedbackExtractor::default().extract(r#"{"joke": "knock knock"}"#);
        assert_eq!(
            extraction.diagnostic.unwrap().reason,
            "no JSON object found in output"
        );
    }

    #[test]
    fn test_fence_without_language_tag() {
        let raw = "```{\"score\": 80, \"maturityTier\": \"Teen\",\n\"verdict\": \"ok\"}\n```";
        let extraction = FeedbackExtractor::default().extract(raw);
        assert!(!extraction.is_degraded());
        assert_eq!(extraction.feedback.score(), 80);

        let raw = "```\n{\"score\": 35, \"maturityTier\": \"Child\"}\n```";
        assert_eq!(extract_feedback(raw).score(), 35);
    }

    #[test]
    fn test_language_tag_detection() {
        assert!(is_language_tag("json"));
        assert!(is_language_tag(" JSON5 "));
        assert!(is_language_tag(""));
        assert!(!is_language_tag("{\"score\": 1,"));
    }

    #[test]
    fn test_deep_nesting_is_abandoned() {
        let raw = format!("{}{}", "{\"a\":".repeat(20), "1");
        assert!(FeedbackExtractor::default().extract(&raw).is_degraded());
    }

    #[test]
    fn test_round_trip_through_noise() {
        let original = genuine();
        let json = serde_json::to_string_pretty(&original).unwrap();
        let raw = format!("\n  Here you go:\n```json\n{}\n```\n  ", json);
        assert_eq!(extract_feedback(&raw), original);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
        assert_eq!(strip_code_fence("```json\n{}"), "```json\n{}");
    }
}
