use serde_json::Value;

use crate::engine::types::{AnalysisRequest, ConversationMessage, ImagePayload};
use crate::error::AppError;

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub fn require_base64_image(field: &str, image: &ImagePayload) -> Result<(), AppError> {
    image
        .decode()
        .map(|_| ())
        .map_err(|_| AppError::Validation(format!("{field} is not valid base64 image data")))
}

/// Turn an untyped `/api/analyze` body into an [`AnalysisRequest`].
///
/// An empty message is accepted when an image accompanies it.
pub fn validate_analysis_request(raw: &Value) -> Result<AnalysisRequest, AppError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| AppError::Validation("Request body must be a JSON object".into()))?;

    let message = match obj.get("message") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(AppError::Validation("Message not provided".into())),
    };

    let image = match obj.get("image") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => {
            let image = ImagePayload::new(s.clone());
            require_base64_image("image", &image)?;
            Some(image)
        }
        Some(_) => return Err(AppError::Validation("image must be a string".into())),
    };

    if message.trim().is_empty() && image.is_none() {
        return Err(AppError::Validation("Message not provided".into()));
    }

    let conversation_history = match obj.get("conversationHistory") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .enumerate()
            .map(|(i, entry)| parse_history_entry(i, entry))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(AppError::Validation(
                "Conversation history must be an array".into(),
            ))
        }
    };

    Ok(AnalysisRequest {
        message,
        image,
        conversation_history,
    })
}

fn parse_history_entry(index: usize, entry: &Value) -> Result<ConversationMessage, AppError> {
    let msg: ConversationMessage = serde_json::from_value(entry.clone()).map_err(|e| {
        AppError::Validation(format!("Conversation history entry {index} is malformed: {e}"))
    })?;
    if let Some(ref image) = msg.image {
        require_base64_image(&format!("conversationHistory[{index}].image"), image)?;
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Role;
    use serde_json::json;

    fn validation_text(result: Result<AnalysisRequest, AppError>) -> String {
        match result {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("text", "hola").is_ok());
        assert!(require_non_empty("text", "  ").is_err());
    }

    #[test]
    fn test_accepts_minimal_request() {
        let req = validate_analysis_request(&json!({ "message": "No anda el wifi" })).unwrap();
        assert_eq!(req.message, "No anda el wifi");
        assert!(req.image.is_none());
        assert!(req.conversation_history.is_empty());
    }

    #[test]
    fn test_missing_message_rejected() {
        assert_eq!(validation_text(validate_analysis_request(&json!({}))), "Message not provided");
        assert_eq!(
            validation_text(validate_analysis_request(&json!({ "message": "   " }))),
            "Message not provided"
        );
        assert_eq!(
            validation_text(validate_analysis_request(&json!({ "message": 42 }))),
            "Message not provided"
        );
    }

    #[test]
    fn test_image_only_request_accepted() {
        let req = validate_analysis_request(&json!({
            "message": "",
            "image": "data:image/png;base64,aGVsbG8="
        }))
        .unwrap();
        assert!(req.message.is_empty());
        assert_eq!(req.image.unwrap().mime_type(), "image/png");
    }

    #[test]
    fn test_history_must_be_array() {
        assert_eq!(
            validation_text(validate_analysis_request(&json!({
                "message": "hola",
                "conversationHistory": "nope"
            }))),
            "Conversation history must be an array"
        );
    }

    #[test]
    fn test_history_entries_parsed() {
        let req = validate_analysis_request(&json!({
            "message": "¿Y ahora?",
            "conversationHistory": [
                { "role": "user", "content": "No tengo internet", "timestamp": 1 },
                { "role": "assistant", "content": "¿Ves las rayitas?", "icons": ["wifi"], "timestamp": 2 }
            ]
        }))
        .unwrap();
        assert_eq!(req.conversation_history.len(), 2);
        assert_eq!(req.conversation_history[1].role, Role::Assistant);
        assert_eq!(req.conversation_history[1].icons, vec!["wifi".to_string()]);
    }

    #[test]
    fn test_malformed_history_entry_rejected() {
        let msg = validation_text(validate_analysis_request(&json!({
            "message": "hola",
            "conversationHistory": [{ "role": "robot", "content": "beep" }]
        })));
        assert!(msg.contains("entry 0"));
    }

    #[test]
    fn test_bad_base64_image_rejected() {
        let msg = validation_text(validate_analysis_request(&json!({
            "message": "mirá",
            "image": "data:image/jpeg;base64,@@not-base64@@"
        })));
        assert!(msg.contains("base64"));
    }

    #[test]
    fn test_non_object_body_rejected() {
        assert!(validate_analysis_request(&json!(["hola"])).is_err());
    }
}
