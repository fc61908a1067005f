use std::time::Duration;
use thiserror::Error;

/// Failures talking to the model backend
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Empty response body from model backend")]
    EmptyBody,

    #[error("Invalid response body from model backend: {0}")]
    InvalidBody(String),

    #[error("Model round trip timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures turning raw model output into an envelope
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed JSON in model output ({source}): {text}")]
    MalformedJson {
        text: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid user envelope: {0}")]
    InvalidUserEnvelope(String),

    #[error("Invalid capability envelope: {0}")]
    InvalidCapabilityEnvelope(String),

    #[error("Invalid envelope tag: {0}")]
    InvalidEnvelopeTag(String),
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Capability execution failed: {0}")]
    ExecutionFailed(String),
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Which model round trip an error happened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    Initial,
    FollowUp,
}

/// Terminal failures of one orchestrated exchange
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model backend failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Unparseable model output on {round:?} round: {source}")]
    UnparseableModelOutput {
        round: Round,
        #[source]
        source: DecodeError,
    },

    #[error("Model requested an unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Unexpected second turn from model: {0}")]
    UnexpectedSecondTurn(String),

    #[error("Failed to render prompt: {0}")]
    Prompt(String),
}

impl AgentError {
    /// Full internal detail, for logs only
    pub fn diagnostic(&self) -> String {
        self.to_string()
    }

    /// Short description of what went wrong that is safe to return to the caller
    pub fn summary(&self) -> String {
        match self {
            AgentError::Transport(_) => {
                "The AI agent could not be reached. Please try again.".to_string()
            }
            AgentError::UnparseableModelOutput { round, source } => match (round, source) {
                (Round::FollowUp, DecodeError::MalformedJson { .. }) => {
                    "The AI agent provided an unparseable follow-up response. Please try again."
                        .to_string()
                }
                (_, DecodeError::MalformedJson { .. }) => {
                    "The AI agent provided an unparseable response. Please try again.".to_string()
                }
                (_, DecodeError::InvalidUserEnvelope(_)) => {
                    "The AI agent provided an invalid message for the user.".to_string()
                }
                (_, DecodeError::InvalidCapabilityEnvelope(_)) => {
                    "The AI agent tried to call a function but provided an invalid function call structure."
                        .to_string()
                }
                (_, DecodeError::InvalidEnvelopeTag(_)) => {
                    "The AI agent provided an invalid 'to' field in its response.".to_string()
                }
            },
            AgentError::UnknownCapability(name) => {
                format!("The AI tried to call an unknown function: {}.", name)
            }
            AgentError::UnexpectedSecondTurn(_) => {
                "The AI agent made an unexpected turn after performing an action or provided an invalid user message."
                    .to_string()
            }
            AgentError::Prompt(_) => "An unexpected error occurred on the server.".to_string(),
        }
    }

    /// The reply shown to the end user in place of a model answer
    pub fn user_message(&self) -> &'static str {
        match self {
            AgentError::Transport(_) | AgentError::Prompt(_) => {
                "I'm sorry, I encountered an internal error. Please try again later."
            }
            AgentError::UnparseableModelOutput { round, source } => match (round, source) {
                (Round::FollowUp, DecodeError::MalformedJson { .. }) => {
                    "Apologies, I encountered an issue processing my thoughts after an action. Could you please rephrase your request?"
                }
                (_, DecodeError::MalformedJson { .. }) => {
                    "Apologies, I encountered an issue processing my thoughts. Could you please rephrase your request?"
                }
                (_, DecodeError::InvalidUserEnvelope(_)) => {
                    "I received an unclear message from the AI. Can you please repeat your request?"
                }
                (_, DecodeError::InvalidCapabilityEnvelope(_)) => {
                    "I received an unclear instruction from the AI regarding an action. Can you please repeat your request?"
                }
                (_, DecodeError::InvalidEnvelopeTag(_)) => {
                    "I received an unclear instruction from the AI. Can you please repeat your request?"
                }
            },
            AgentError::UnknownCapability(_) => {
                "Apologies, I tried to perform an action but encountered an unknown command. Could you please clarify?"
            }
            AgentError::UnexpectedSecondTurn(_) => {
                "I've completed an action, but there was an unexpected follow-up. How can I assist you further?"
            }
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, AgentError::Transport(_))
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn malformed(text: &str) -> DecodeError {
        let source = serde_json::from_str::<serde_json::Value>(text).unwrap_err();
        DecodeError::MalformedJson {
            text: text.to_string(),
            source,
        }
    }

    #[test]
    fn test_user_facing_text_never_contains_model_output() {
        let error = AgentError::UnparseableModelOutput {
            round: Round::Initial,
            source: malformed("{\"to\": secret-model-text"),
        };

        assert!(error.diagnostic().contains("secret-model-text"));
        assert!(!error.summary().contains("secret-model-text"));
        assert!(!error.user_message().contains("secret-model-text"));
    }

    #[test]
    fn test_follow_up_parse_failure_has_its_own_message() {
        let initial = AgentError::UnparseableModelOutput {
            round: Round::Initial,
            source: malformed("nope"),
        };
        let follow_up = AgentError::UnparseableModelOutput {
            round: Round::FollowUp,
            source: malformed("nope"),
        };

        assert_ne!(initial.user_message(), follow_up.user_message());
        assert!(follow_up.user_message().contains("after an action"));
    }

    #[test]
    fn test_transport_errors_are_flagged() {
        let error = AgentError::from(TransportError::EmptyBody);
        assert!(error.is_transport());
        assert!(!AgentError::UnknownCapability("x".into()).is_transport());
    }
}
