//! Best-effort structured decoding of model output.
//!
//! The model is told to answer with a JSON object, but it drifts: prose before
//! the object, code fences, truncated strings. [`extract`] runs an ordered list
//! of strategies (`&str -> Option<ResponseSchema>`), first success wins, and
//! ends in a total fallback so callers always get a usable reply.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::types::ResponseSchema;

/// Shown when nothing readable can be recovered from the model output.
pub const FALLBACK_REPLY: &str = "No pude procesar la respuesta. ¿Podés repetir?";

/// Which strategy produced the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// The whole text is the JSON object.
    Direct,
    /// A ```json fenced block.
    JsonFence,
    /// Any fenced block.
    AnyFence,
    /// A brace-delimited object containing `"reply"` somewhere in the text.
    BraceScan,
    /// Only the `"reply": "..."` literal could be recovered.
    ReplyField,
    /// JSON scaffolding stripped, remaining text used as-is.
    Residue,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::Direct => "direct",
            ExtractionStrategy::JsonFence => "json_fence",
            ExtractionStrategy::AnyFence => "any_fence",
            ExtractionStrategy::BraceScan => "brace_scan",
            ExtractionStrategy::ReplyField => "reply_field",
            ExtractionStrategy::Residue => "residue",
        }
    }

    /// Degraded result: structure was lost, only text survived.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            ExtractionStrategy::ReplyField | ExtractionStrategy::Residue
        )
    }
}

type Strategy = fn(&str) -> Option<ResponseSchema>;

const STRATEGIES: &[(ExtractionStrategy, Strategy)] = &[
    (ExtractionStrategy::Direct, parse_direct),
    (ExtractionStrategy::JsonFence, parse_json_fence),
    (ExtractionStrategy::AnyFence, parse_any_fence),
    (ExtractionStrategy::BraceScan, parse_brace_scan),
    (ExtractionStrategy::ReplyField, parse_reply_field),
];

// ============================================================================
// Entry points
// ============================================================================

/// Coerce raw model text into a [`ResponseSchema`]. Never fails.
pub fn extract(raw: &str) -> ResponseSchema {
    extract_with_strategy(raw).0
}

/// Like [`extract`], also reporting which strategy won.
pub fn extract_with_strategy(raw: &str) -> (ResponseSchema, ExtractionStrategy) {
    for (kind, strategy) in STRATEGIES {
        if let Some(schema) = strategy(raw) {
            if kind.is_fallback() {
                tracing::warn!(
                    strategy = kind.as_str(),
                    raw_len = raw.len(),
                    "Model output was not valid JSON; recovered reply text only",
                );
            }
            return (schema, *kind);
        }
    }

    tracing::warn!(
        strategy = ExtractionStrategy::Residue.as_str(),
        raw_len = raw.len(),
        "Could not parse JSON from model output; using cleaned text",
    );
    (residue(raw), ExtractionStrategy::Residue)
}

// ============================================================================
// Field helpers
// ============================================================================

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|s| s.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn bool_field(v: &Value, key: &str) -> bool {
    v.get(key).and_then(|b| b.as_bool()).unwrap_or(false)
}

/// String elements of an array field; non-string elements are skipped.
fn str_array_field(v: &Value, key: &str) -> Option<Vec<String>> {
    let arr = v.get(key)?.as_array()?;
    Some(
        arr.iter()
            .filter_map(|item| item.as_str())
            .map(String::from)
            .collect(),
    )
}

/// Validate a parsed value against the response contract.
///
/// Accepts only objects whose `reply` is a string with visible content. The
/// solution list is kept only for solution turns; icon keys are de-duplicated
/// in first-seen order.
fn schema_from_value(v: &Value) -> Option<ResponseSchema> {
    if !v.is_object() {
        return None;
    }
    let reply = v.get("reply")?.as_str()?;
    if reply.trim().is_empty() {
        return None;
    }

    let is_solution = bool_field(v, "isSolution");
    let solution = if is_solution {
        str_array_field(v, "solution")
    } else {
        None
    };

    let mut icons: Vec<String> = Vec::new();
    for key in str_array_field(v, "icons").unwrap_or_default() {
        let key = key.trim();
        if !key.is_empty() && !icons.iter().any(|k| k == key) {
            icons.push(key.to_string());
        }
    }

    Some(ResponseSchema {
        reply: reply.to_string(),
        needs_image: bool_field(v, "needsImage"),
        is_solution,
        solution,
        icons,
        generate_image: str_field(v, "generateImage"),
    })
}

fn parse_candidate(text: &str) -> Option<ResponseSchema> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    schema_from_value(&value)
}

// ============================================================================
// Strategies
// ============================================================================

fn json_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("valid regex"))
}

fn any_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)\s*```").expect("valid regex"))
}

fn reply_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)"reply"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
    })
}

/// 1. The whole text is the object.
fn parse_direct(raw: &str) -> Option<ResponseSchema> {
    parse_candidate(raw)
}

/// 2. A fenced block tagged `json`.
fn parse_json_fence(raw: &str) -> Option<ResponseSchema> {
    json_fence_re()
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .find_map(|m| parse_candidate(m.as_str()))
}

/// 3. Any fenced block, with or without a language tag.
fn parse_any_fence(raw: &str) -> Option<ResponseSchema> {
    any_fence_re()
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .find_map(|m| parse_candidate(m.as_str()))
}

/// 4. A brace-delimited object mentioning `"reply"`.
///
/// The loosest span (first `{` to last `}`) is tried first, then every
/// balanced object in order of appearance.
fn parse_brace_scan(raw: &str) -> Option<ResponseSchema> {
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            let span = &raw[start..=end];
            if span.contains("\"reply\"") {
                if let Some(schema) = parse_candidate(span) {
                    return Some(schema);
                }
            }
        }
    }

    let bytes = raw.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'{' {
            continue;
        }
        if let Some(end) = find_matching_brace(bytes, i) {
            let candidate = &raw[i..=end];
            if candidate.contains("\"reply\"") {
                if let Some(schema) = parse_candidate(candidate) {
                    return Some(schema);
                }
            }
        }
    }

    None
}

/// 5. Only the literal `"reply": "..."` value, up to the next unescaped quote.
fn parse_reply_field(raw: &str) -> Option<ResponseSchema> {
    let captured = reply_field_re().captures(raw)?.get(1)?.as_str();
    // Undo JSON escapes when they are well-formed; keep the raw capture otherwise.
    let reply = serde_json::from_str::<String>(&format!("\"{}\"", captured))
        .unwrap_or_else(|_| captured.to_string());
    if reply.trim().is_empty() {
        return None;
    }
    Some(ResponseSchema::reply_only(reply))
}

/// Index of the brace closing the one at `start`. Braces inside strings are ignored.
///
/// Works on bytes: the delimiters are ASCII, and UTF-8 continuation bytes never
/// collide with ASCII values.
fn find_matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escape_next {
            escape_next = false;
            continue;
        }
        if b == b'\\' && in_string {
            escape_next = true;
            continue;
        }
        if b == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if b == b'{' {
            depth += 1;
        } else if b == b'}' {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }

    None
}

// ============================================================================
// Total fallback
// ============================================================================

fn scaffolding_res() -> &'static [Regex; 4] {
    static RES: OnceLock<[Regex; 4]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"(?i)```json\s*").expect("valid regex"),
            Regex::new(r"```\s*").expect("valid regex"),
            Regex::new(r#"(?m)^\s*\{\s*"reply"\s*:\s*""#).expect("valid regex"),
            Regex::new(
                r#"(?s)",?\s*"(?:needsImage|isSolution|solution|icons|generateImage)".*$"#,
            )
            .expect("valid regex"),
        ]
    })
}

/// 6. Strip fences and the `reply` key scaffolding; whatever remains is the reply.
fn residue(raw: &str) -> ResponseSchema {
    let [json_fence, any_fence, reply_prefix, trailing_keys] = scaffolding_res();

    let cleaned = json_fence.replace_all(raw, "");
    let cleaned = any_fence.replace_all(&cleaned, "");
    let cleaned = reply_prefix.replace(&cleaned, "");
    let cleaned = trailing_keys.replace(&cleaned, "");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        ResponseSchema::reply_only(FALLBACK_REPLY)
    } else {
        ResponseSchema::reply_only(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_json() {
        let (schema, strategy) = extract_with_strategy(r#"{"reply":"hola","needsImage":false}"#);
        assert_eq!(strategy, ExtractionStrategy::Direct);
        assert_eq!(schema, ResponseSchema::reply_only("hola"));
    }

    #[test]
    fn test_json_fence_after_prose() {
        let raw = "Claro, acá va:\n```json\n{\"reply\":\"ok\",\"isSolution\":true,\"solution\":[\"a\",\"b\"]}\n```";
        let (schema, strategy) = extract_with_strategy(raw);
        assert_eq!(strategy, ExtractionStrategy::JsonFence);
        assert_eq!(schema.reply, "ok");
        assert!(schema.is_solution);
        assert_eq!(schema.solution, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(!schema.needs_image);
    }

    #[test]
    fn test_untagged_fence() {
        let raw = "```\n{\"reply\":\"Mirá el engranaje\",\"icons\":[\"settings\"]}\n```";
        let (schema, strategy) = extract_with_strategy(raw);
        assert_eq!(strategy, ExtractionStrategy::AnyFence);
        assert_eq!(schema.icons, vec!["settings".to_string()]);
    }

    #[test]
    fn test_bare_object_inside_prose() {
        let raw = "Respuesta: {\"reply\":\"Intentemos apagar y prender\",\"needsImage\":true} espero que sirva";
        let (schema, strategy) = extract_with_strategy(raw);
        assert_eq!(strategy, ExtractionStrategy::BraceScan);
        assert!(schema.needs_image);
    }

    #[test]
    fn test_brace_scan_falls_back_to_balanced_object() {
        // Loosest span is invalid because of the trailing stray brace.
        let raw = "{\"reply\":\"uno\"} y después }";
        let (schema, strategy) = extract_with_strategy(raw);
        assert_eq!(strategy, ExtractionStrategy::BraceScan);
        assert_eq!(schema.reply, "uno");
    }

    #[test]
    fn test_reply_field_from_broken_json() {
        let raw = r#"{"reply": "Probá reiniciar", "needsImage": fals"#;
        let (schema, strategy) = extract_with_strategy(raw);
        assert_eq!(strategy, ExtractionStrategy::ReplyField);
        assert_eq!(schema.reply, "Probá reiniciar");
        assert!(!schema.needs_image);
        assert!(!schema.is_solution);
    }

    #[test]
    fn test_reply_field_unescapes() {
        let raw = r#"garbage "reply": "Dijo \"hola\"\nchau" more garbage {"#;
        let schema = extract(raw);
        assert_eq!(schema.reply, "Dijo \"hola\"\nchau");
    }

    #[test]
    fn test_residue_truncated_json() {
        let raw = "```json\n{\"reply\": \"Apretá el botón de encendido";
        let (schema, strategy) = extract_with_strategy(raw);
        assert_eq!(strategy, ExtractionStrategy::Residue);
        assert_eq!(schema.reply, "Apretá el botón de encendido");
    }

    #[test]
    fn test_residue_plain_prose() {
        let schema = extract("Hola, ¿qué aparato te está dando problemas?");
        assert_eq!(schema.reply, "Hola, ¿qué aparato te está dando problemas?");
    }

    #[test]
    fn test_empty_input_uses_fallback_message() {
        assert_eq!(extract("").reply, FALLBACK_REPLY);
        assert_eq!(extract("```json\n```").reply, FALLBACK_REPLY);
    }

    #[test]
    fn test_blank_reply_rejected() {
        // Structurally valid but the reply is blank; falls through to cleaned text.
        let schema = extract(r#"{"reply":"   "}"#);
        assert!(!schema.reply.trim().is_empty());
    }

    #[test]
    fn test_solution_dropped_when_not_solution_turn() {
        let schema = extract(r#"{"reply":"x","solution":["a"]}"#);
        assert!(schema.solution.is_none());
    }

    #[test]
    fn test_icons_deduplicated_in_order() {
        let schema = extract(r#"{"reply":"x","icons":["wifi","settings","wifi",3," "]}"#);
        assert_eq!(schema.icons, vec!["wifi".to_string(), "settings".to_string()]);
    }

    #[test]
    fn test_generate_image_directive() {
        let schema = extract(r#"{"reply":"x","generateImage":"  ícono de WiFi tachado  "}"#);
        assert_eq!(schema.generate_image.as_deref(), Some("ícono de WiFi tachado"));
    }

    #[test]
    fn test_wrong_field_types_are_lenient() {
        let schema = extract(r#"{"reply":"x","needsImage":"yes","isSolution":1}"#);
        assert_eq!(schema.reply, "x");
        assert!(!schema.needs_image);
        assert!(!schema.is_solution);
    }

    #[test]
    fn test_deterministic() {
        let raw = "algo {\"reply\": \"a\" roto";
        assert_eq!(extract(raw), extract(raw));
    }

    #[test]
    fn test_find_matching_brace_ignores_strings() {
        let s = br#"{"a":"}{","b":{"c":1}} tail"#;
        assert_eq!(find_matching_brace(s, 0), Some(21));
        assert_eq!(find_matching_brace(b"{ unclosed", 0), None);
    }
}
