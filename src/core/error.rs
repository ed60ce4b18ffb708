use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoryError>;

/// Which part of a prompt template is absent or empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart {
    System,
    User,
    Both,
}

impl std::fmt::Display for TemplatePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplatePart::System => write!(f, "system"),
            TemplatePart::User => write!(f, "user"),
            TemplatePart::Both => write!(f, "system and user"),
        }
    }
}

/// Coarse classification used by callers to pick messaging and retry affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Template,
    Upstream,
    Parse,
    Persistence,
    Precondition,
}

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("service credential is not configured: {0}")]
    MissingCredential(String),

    #[error("promptName is required")]
    MissingPromptName,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("prompt \"{name}\" not found. Available prompts: {}", available.join(", "))]
    TemplateNotFound { name: String, available: Vec<String> },

    #[error("prompt \"{name}\" is missing required fields: {missing}")]
    MalformedTemplate { name: String, missing: TemplatePart },

    #[error("failed to load prompt templates: {0}")]
    TemplateSource(String),

    #[error("completion service error: {0}")]
    Service(String),

    // Raw model text is kept for logging only and stays out of Display.
    #[error("malformed model output: {reason}")]
    MalformedOutput { reason: String, raw: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("no session record exists yet")]
    NoSessionRecord,

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoryError::MissingCredential(_)
            | StoryError::MissingPromptName
            | StoryError::Config(_) => ErrorKind::Configuration,
            StoryError::TemplateNotFound { .. }
            | StoryError::MalformedTemplate { .. }
            | StoryError::TemplateSource(_) => ErrorKind::Template,
            StoryError::Service(_) => ErrorKind::Upstream,
            StoryError::MalformedOutput { .. } | StoryError::Serialization(_) => ErrorKind::Parse,
            StoryError::Persistence(_) => ErrorKind::Persistence,
            StoryError::NoSessionRecord | StoryError::MissingInput(_) => ErrorKind::Precondition,
        }
    }

    /// Whether a fresh user-initiated attempt may succeed. Nothing retries automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Upstream | ErrorKind::Parse | ErrorKind::Persistence
        )
    }

    /// HTTP status for the generation endpoint contract.
    pub fn status_code(&self) -> u16 {
        match self {
            StoryError::MissingPromptName | StoryError::MissingInput(_) => 400,
            _ => 500,
        }
    }

    /// Generic message safe to show an end user.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Configuration => self.to_string(),
            ErrorKind::Template => "Failed to generate content".to_string(),
            ErrorKind::Upstream => {
                "The writing assistant is unavailable right now. Please try again.".to_string()
            }
            ErrorKind::Parse => {
                "The writing assistant returned an unreadable answer. Please try again."
                    .to_string()
            }
            ErrorKind::Persistence => "Save failed. Your changes are still unsaved.".to_string(),
            ErrorKind::Precondition => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for StoryError {
    fn from(err: reqwest::Error) -> Self {
        StoryError::Service(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_errors_are_distinguishable() {
        let not_found = StoryError::TemplateNotFound {
            name: "nope".to_string(),
            available: vec!["create_logline".to_string(), "extract_structure".to_string()],
        };
        let malformed = StoryError::MalformedTemplate {
            name: "create_logline".to_string(),
            missing: TemplatePart::User,
        };
        let service = StoryError::Service("502 Bad Gateway".to_string());

        assert!(matches!(not_found, StoryError::TemplateNotFound { .. }));
        assert!(!matches!(malformed, StoryError::TemplateNotFound { .. }));
        assert_eq!(service.kind(), ErrorKind::Upstream);
        assert!(not_found
            .to_string()
            .contains("Available prompts: create_logline, extract_structure"));
        assert!(malformed.to_string().contains("user"));
    }

    #[test]
    fn test_malformed_output_hides_raw_text() {
        let err = StoryError::MalformedOutput {
            reason: "expected value at line 1 column 1".to_string(),
            raw: "Sure! Here is your story".to_string(),
        };
        assert!(!err.to_string().contains("Sure!"));
        assert!(!err.user_message().contains("Sure!"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StoryError::MissingPromptName.status_code(), 400);
        assert_eq!(StoryError::MissingCredential("OPENAI_API_KEY".into()).status_code(), 500);
        assert_eq!(StoryError::Service("boom".into()).status_code(), 500);
        assert!(!StoryError::MissingPromptName.is_retryable());
    }
}
