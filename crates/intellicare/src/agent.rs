use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::capabilities::CapabilityRegistry;
use crate::envelope::{decode, Envelope, FunctionCall};
use crate::errors::{AgentError, AgentResult, DecodeError, Round, TransportError};
use crate::models::message::Message;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::{ChatOptions, Provider};
use crate::providers::ollama::OLLAMA_CHAT_MODEL;

const LOCALE_ACKNOWLEDGEMENT: &str =
    "Okay, I understand. I will use the user's timezone for all time-related inquiries.";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub temperature: Option<f32>,
    /// Upper bound on each model round trip
    pub round_trip_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: OLLAMA_CHAT_MODEL.to_string(),
            temperature: Some(0.7),
            round_trip_timeout: Duration::from_secs(120),
        }
    }
}

/// Where and when the user is, as reported by their client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleContext {
    pub time_zone: String,
    pub current_time: String,
}

/// One entry of the reasoning trace returned with every exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThinkingStep {
    pub step: String,
    pub details: Value,
}

impl ThinkingStep {
    fn new(step: impl Into<String>, details: Value) -> Self {
        Self {
            step: step.into(),
            details,
        }
    }
}

/// The result of one user turn, with the trace of how it was reached.
/// The trace is kept on failure too, up to the step that failed.
#[derive(Debug)]
pub struct Exchange {
    pub trace: Vec<ThinkingStep>,
    pub outcome: AgentResult<String>,
}

impl Exchange {
    pub fn into_result(self) -> AgentResult<String> {
        self.outcome
    }
}

/// Drives the reply-or-call protocol for one user turn: at most one capability
/// call and at most two model round trips.
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: Arc<CapabilityRegistry>,
    config: AgentConfig,
    system_prompt: String,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<CapabilityRegistry>,
        config: AgentConfig,
    ) -> AgentResult<Self> {
        let context = json!({ "capabilities": registry.descriptors() });
        let system_prompt = load_prompt_file("system.md", &context)
            .map_err(|e| AgentError::Prompt(e.to_string()))?;

        Ok(Self {
            provider,
            registry,
            config,
            system_prompt,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Answer one user message given the earlier conversation
    pub async fn converse(
        &self,
        input: &str,
        history: &[Message],
        locale: &LocaleContext,
    ) -> Exchange {
        let mut trace = Vec::new();
        let outcome = self.run(input, history, locale, &mut trace).await;

        if let Err(e) = &outcome {
            error!(diagnostic = %e.diagnostic(), "agent exchange failed");
        }

        Exchange { trace, outcome }
    }

    async fn run(
        &self,
        input: &str,
        history: &[Message],
        locale: &LocaleContext,
        trace: &mut Vec<ThinkingStep>,
    ) -> AgentResult<String> {
        let mut messages = self.opening_messages(locale)?;
        messages.extend_from_slice(history);
        messages.push(Message::user(input));

        let first_output = self.round_trip(&messages).await?;
        let envelope =
            decode(&first_output).map_err(|source| AgentError::UnparseableModelOutput {
                round: Round::Initial,
                source,
            })?;
        trace.push(ThinkingStep::new("AI's Raw Decision", envelope.to_value()));

        let call = match envelope {
            Envelope::UserReply { message } => {
                trace.push(ThinkingStep::new(
                    "AI decided to respond directly to user",
                    json!(message),
                ));
                return Ok(message);
            }
            Envelope::CapabilityRequest(call) => call,
        };

        let result = self.invoke(&call, trace).await?;

        messages.push(Message::assistant(first_output));
        messages.push(Message::user(self.follow_up_prompt(&call.name, &result)?));

        let second_output = self.round_trip(&messages).await?;
        let message = match decode(&second_output) {
            Ok(Envelope::UserReply { message }) => {
                trace.push(ThinkingStep::new(
                    "AI's Follow-up Decision",
                    Envelope::user_reply(message.as_str()).to_value(),
                ));
                message
            }
            Ok(other) => {
                trace.push(ThinkingStep::new("AI's Follow-up Decision", other.to_value()));
                return Err(AgentError::UnexpectedSecondTurn(format!(
                    "model asked for another action: {}",
                    other.to_value()
                )));
            }
            Err(source @ DecodeError::MalformedJson { .. }) => {
                return Err(AgentError::UnparseableModelOutput {
                    round: Round::FollowUp,
                    source,
                })
            }
            Err(e) => return Err(AgentError::UnexpectedSecondTurn(e.to_string())),
        };

        Ok(message)
    }

    /// Run the requested capability and record its outcome. Failures of the
    /// capability itself become text for the model to explain.
    async fn invoke(
        &self,
        call: &FunctionCall,
        trace: &mut Vec<ThinkingStep>,
    ) -> AgentResult<String> {
        if !self.registry.contains(&call.name) {
            return Err(AgentError::UnknownCapability(call.name.clone()));
        }

        trace.push(ThinkingStep::new(
            format!("Executing Function: {}", call.name),
            json!({ "arguments": call.arguments }),
        ));
        info!(capability = %call.name, arguments = ?call.arguments, "executing capability");

        let result = match self.registry.execute(&call.name, &call.arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(capability = %call.name, error = %e, "capability failed");
                format!("Error: {}", e)
            }
        };

        trace.push(ThinkingStep::new(
            format!("Function Result: {}", call.name),
            json!(result),
        ));
        Ok(result)
    }

    fn opening_messages(&self, locale: &LocaleContext) -> AgentResult<Vec<Message>> {
        let locale_prompt =
            load_prompt_file("locale.md", locale).map_err(|e| AgentError::Prompt(e.to_string()))?;

        Ok(vec![
            Message::system(self.system_prompt.as_str()),
            Message::user(locale_prompt.trim()),
            Message::assistant(LOCALE_ACKNOWLEDGEMENT),
        ])
    }

    fn follow_up_prompt(&self, name: &str, result: &str) -> AgentResult<String> {
        let context = json!({ "name": name, "result": result });
        load_prompt_file("follow_up.md", &context)
            .map(|prompt| prompt.trim().to_string())
            .map_err(|e| AgentError::Prompt(e.to_string()))
    }

    async fn round_trip(&self, messages: &[Message]) -> AgentResult<String> {
        let options = ChatOptions::envelope(self.config.temperature);
        let deadline = self.config.round_trip_timeout;

        let output = timeout(
            deadline,
            self.provider.chat(&self.config.model, messages, &options),
        )
        .await
        .map_err(|_| TransportError::Timeout(deadline))??;

        debug!(%output, "raw model output");
        Ok(output)
    }
}
