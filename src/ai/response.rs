use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Completion envelope returned by the OpenAI-compatible endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub error: Option<VendorError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VendorError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Normalized result of one AI call. Decided here, once; callers only map
/// variants to a response and never re-inspect the payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum AiOutcome {
    /// Parsed structured data, or a plain-text answer wrapped as a string.
    Success(Value),
    /// Truncated output that could not be repaired; possibly incomplete.
    Partial(String),
    /// Vendor-level failure reported inside the envelope.
    Failure { kind: String, message: String },
}

pub fn normalize(completion: ChatCompletion) -> AiOutcome {
    if let Some(error) = completion.error {
        return vendor_failure(error);
    }

    let Some(choice) = completion.choices.into_iter().next() else {
        return AiOutcome::Failure {
            kind: "EMPTY_RESPONSE".into(),
            message: "upstream returned no choices".into(),
        };
    };

    let content = choice.message.content.unwrap_or_default();
    let truncated = choice.finish_reason.as_deref() == Some("length");

    match serde_json::from_str::<Value>(&content) {
        Ok(value) => AiOutcome::Success(value),
        Err(_) if truncated => match repair_truncated_json(&content) {
            Some(value) => AiOutcome::Success(value),
            None => {
                warn!("truncated completion could not be repaired, returning raw text");
                AiOutcome::Partial(content)
            }
        },
        // Prose answers (the Q&A intent) are valid results, not failures
        Err(_) => AiOutcome::Success(Value::String(content)),
    }
}

fn vendor_failure(error: VendorError) -> AiOutcome {
    let base = error
        .message
        .unwrap_or_else(|| "upstream API error".to_string());
    let (kind, message) = match error.code.as_deref() {
        Some("invalid_request_error") => (
            "INVALID_REQUEST".to_string(),
            format!("Invalid request: {base}. Check the request parameters."),
        ),
        Some("authentication_error") => (
            "AUTHENTICATION".to_string(),
            format!("Authentication failed: {base}. Check the API key."),
        ),
        Some("rate_limit_error") => (
            "RATE_LIMIT".to_string(),
            format!("Rate limit exceeded: {base}. Try again later."),
        ),
        Some(code) => (code.to_uppercase(), base),
        None => ("API_ERROR".to_string(), base),
    };
    AiOutcome::Failure { kind, message }
}

/// Best-effort close of a JSON document cut off mid-stream: terminate an
/// open string, then unwind the open-bracket stack in reverse nesting
/// order. Balanced output is not guaranteed to mean what the model
/// intended; callers treat a failed re-parse as unrepairable.
pub fn repair_truncated_json(raw: &str) -> Option<Value> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in raw.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' => {
                if stack.pop() != Some('{') {
                    return None;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return None;
                }
            }
            _ => {}
        }
    }

    if escaped {
        // Cut in the middle of an escape sequence; nothing sensible to append
        return None;
    }

    let mut repaired = raw.to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(open) = stack.pop() {
        repaired.push(if open == '{' { '}' } else { ']' });
    }
    serde_json::from_str(&repaired).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(content: &str, finish_reason: &str) -> ChatCompletion {
        ChatCompletion {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some(content.to_string()),
                },
                finish_reason: Some(finish_reason.to_string()),
            }],
            error: None,
        }
    }

    #[test]
    fn valid_json_content_parses_to_success() {
        let outcome = normalize(completion(r#"{"days": 3, "city": "Rome"}"#, "stop"));
        assert_eq!(
            outcome,
            AiOutcome::Success(serde_json::json!({ "days": 3, "city": "Rome" }))
        );
    }

    #[test]
    fn prose_content_is_success_as_string() {
        let outcome = normalize(completion("May is a great month for Iceland.", "stop"));
        assert_eq!(
            outcome,
            AiOutcome::Success(Value::String(
                "May is a great month for Iceland.".to_string()
            ))
        );
    }

    #[test]
    fn truncated_json_is_repaired() {
        let outcome = normalize(completion(r#"{"a":1,"b":[1,2"#, "length"));
        assert_eq!(
            outcome,
            AiOutcome::Success(serde_json::json!({ "a": 1, "b": [1, 2] }))
        );
    }

    #[test]
    fn unrepairable_truncation_returns_partial() {
        // Cut mid-token: appending brackets cannot make this parse
        let outcome = normalize(completion(r#"{"a":tr"#, "length"));
        assert_eq!(outcome, AiOutcome::Partial(r#"{"a":tr"#.to_string()));
    }

    #[test]
    fn repair_closes_open_string_before_brackets() {
        let value = repair_truncated_json(r#"{"city":"Ro"#).expect("repairable");
        assert_eq!(value, serde_json::json!({ "city": "Ro" }));
    }

    #[test]
    fn repair_handles_escaped_quotes() {
        let value = repair_truncated_json(r#"{"note":"say \"hi\"","tags":["a""#).expect("repairable");
        assert_eq!(
            value,
            serde_json::json!({ "note": "say \"hi\"", "tags": ["a"] })
        );
    }

    #[test]
    fn repair_rejects_mismatched_nesting() {
        assert!(repair_truncated_json(r#"{"a":1]"#).is_none());
    }

    #[test]
    fn repair_rejects_cut_mid_escape() {
        assert!(repair_truncated_json(r#"{"note":"ab\"#).is_none());
    }

    #[test]
    fn vendor_error_codes_are_enriched() {
        let cases = [
            ("invalid_request_error", "INVALID_REQUEST"),
            ("authentication_error", "AUTHENTICATION"),
            ("rate_limit_error", "RATE_LIMIT"),
        ];
        for (code, expected_kind) in cases {
            let outcome = normalize(ChatCompletion {
                choices: vec![],
                error: Some(VendorError {
                    code: Some(code.to_string()),
                    message: Some("boom".to_string()),
                }),
            });
            match outcome {
                AiOutcome::Failure { kind, message } => {
                    assert_eq!(kind, expected_kind);
                    assert!(message.contains("boom"));
                }
                other => panic!("expected failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_choices_is_a_failure() {
        let outcome = normalize(ChatCompletion {
            choices: vec![],
            error: None,
        });
        assert!(matches!(outcome, AiOutcome::Failure { .. }));
    }

    #[test]
    fn completion_envelope_deserializes() {
        let raw = serde_json::json!({
            "id": "cmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "hello" }, "finish_reason": "stop" }
            ],
            "usage": { "total_tokens": 12 }
        });
        let completion: ChatCompletion = serde_json::from_value(raw).unwrap();
        assert_eq!(completion.choices.len(), 1);
        assert_eq!(completion.choices[0].message.content.as_deref(), Some("hello"));
        assert!(completion.error.is_none());
    }
}
