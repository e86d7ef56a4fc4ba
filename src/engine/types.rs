use base64::Engine as _;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Base64 prefix every PNG file starts with (`\x89PNG\r\n\x1a\n`).
const PNG_BASE64_MAGIC: &str = "iVBORw0KGgo";

// ============================================================================
// Image payload
// ============================================================================

/// Inline image as exchanged with the browser: either a `data:<mime>;base64,<data>`
/// URL or bare base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct ImagePayload(String);

impl ImagePayload {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Wrap upstream inline data into a data URL the browser can render directly.
    pub fn from_inline(mime_type: &str, base64_data: &str) -> Self {
        Self(format!("data:{};base64,{}", mime_type, base64_data))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base64 body without any data-URL header.
    pub fn base64_data(&self) -> &str {
        match self.0.split_once(',') {
            Some((_, data)) => data,
            None => &self.0,
        }
    }

    /// PNG when the data-URL header (or, for bare base64, the file magic) says so;
    /// JPEG otherwise.
    pub fn mime_type(&self) -> &'static str {
        let is_png = match self.0.split_once(',') {
            Some((header, _)) => header.contains("image/png"),
            None => self.0.trim_start().starts_with(PNG_BASE64_MAGIC),
        };
        if is_png {
            "image/png"
        } else {
            "image/jpeg"
        }
    }

    /// Decode the embedded base64 body into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.base64_data().trim())
    }
}

// ============================================================================
// Transcript
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when flattening the transcript into model input.
    pub fn speaker_label(&self) -> &'static str {
        match self {
            Role::User => "Usuario",
            Role::Assistant => "Asistente",
        }
    }
}

/// One turn in the visible transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub image: Option<ImagePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub generated_image: Option<ImagePayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub icons: Vec<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    #[ts(type = "number")]
    pub timestamp: i64,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>, image: Option<ImagePayload>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image,
            generated_image: None,
            icons: Vec::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            image: None,
            generated_image: None,
            icons: Vec::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// ============================================================================
// Turn request / response
// ============================================================================

/// Outbound unit of one turn. `conversation_history` never contains `message` itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub image: Option<ImagePayload>,
    #[serde(default)]
    pub conversation_history: Vec<ConversationMessage>,
}

/// Normalized assistant turn as produced by the extractor.
///
/// `generate_image` is an internal directive for the orchestrator and never
/// reaches the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSchema {
    pub reply: String,
    pub needs_image: bool,
    pub is_solution: bool,
    pub solution: Option<Vec<String>>,
    pub icons: Vec<String>,
    pub generate_image: Option<String>,
}

impl ResponseSchema {
    /// A schema carrying only reply text, all flags off.
    pub fn reply_only(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Default::default()
        }
    }
}

/// Client-visible assistant turn, the success body of `POST /api/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AssistantTurn {
    pub reply: String,
    #[serde(default)]
    pub needs_image: bool,
    #[serde(default)]
    pub is_solution: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub solution: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub icons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub generated_image: Option<ImagePayload>,
}

impl AssistantTurn {
    /// Finalize a schema: the image directive is dropped, only its result survives.
    pub fn from_schema(schema: ResponseSchema, generated_image: Option<ImagePayload>) -> Self {
        Self {
            reply: schema.reply,
            needs_image: schema.needs_image,
            is_solution: schema.is_solution,
            solution: schema.solution,
            icons: schema.icons,
            generated_image,
        }
    }

    /// Transcript entry for this turn.
    pub fn to_message(&self) -> ConversationMessage {
        let mut message = ConversationMessage::assistant(self.reply.clone());
        message.generated_image = self.generated_image.clone();
        message.icons = self.icons.clone();
        message
    }
}

// ============================================================================
// Client-visible error state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    General,
    Connection,
}

/// Error banner state. `retry_after_seconds` is only set for `RateLimit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ErrorState {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, as = "Option<u32>")]
    pub retry_after_seconds: Option<u64>,
}

impl ErrorState {
    pub fn rate_limit(retry_after_seconds: u64) -> Self {
        Self {
            kind: ErrorKind::RateLimit,
            retry_after_seconds: Some(retry_after_seconds),
        }
    }

    pub fn general() -> Self {
        Self {
            kind: ErrorKind::General,
            retry_after_seconds: None,
        }
    }

    pub fn connection() -> Self {
        Self {
            kind: ErrorKind::Connection,
            retry_after_seconds: None,
        }
    }

    /// Short localized banner text. `seconds_remaining` feeds the live countdown.
    pub fn banner(&self, seconds_remaining: Option<u64>) -> String {
        match self.kind {
            ErrorKind::RateLimit => {
                let secs = seconds_remaining.or(self.retry_after_seconds).unwrap_or(0);
                format!(
                    "Estoy atendiendo muchas consultas. Esperá {} segundos y probá de nuevo.",
                    secs
                )
            }
            ErrorKind::General => {
                "No se pudo procesar tu mensaje. Por favor, intentá de nuevo.".to_string()
            }
            ErrorKind::Connection => {
                "No me pude conectar. Revisá que tengas internet y probá de nuevo.".to_string()
            }
        }
    }
}
