use anyhow::Result;
use intellicare::agent::{Agent, LocaleContext};
use intellicare::envelope::{encode, Envelope};
use intellicare::models::message::Message;

use crate::prompt::{InputType, Prompt};

/// One interactive conversation. History lives only as long as the session.
pub struct Session<'a> {
    agent: Agent,
    prompt: Box<dyn Prompt + 'a>,
    history: Vec<Message>,
    time_zone: Option<String>,
}

impl<'a> Session<'a> {
    pub fn new(agent: Agent, prompt: Box<dyn Prompt + 'a>, time_zone: Option<String>) -> Self {
        Session {
            agent,
            prompt,
            history: Vec::new(),
            time_zone,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.ready();

        loop {
            let input = self.prompt.get_input()?;
            let content = match input.input_type {
                InputType::Message => match input.content {
                    Some(content) => content,
                    None => continue,
                },
                InputType::Exit => break,
                InputType::AskAgain => continue,
            };

            tokio::select! {
                _ = self.send(&content) => {}
                _ = tokio::signal::ctrl_c() => {
                    self.prompt.hide_busy();
                    self.prompt
                        .render_notice("Interrupt: the last message was discarded.");
                }
            }
        }

        self.prompt.close();
        Ok(())
    }

    /// Send one message; the turn joins the history only once it has a reply
    pub async fn send(&mut self, content: &str) {
        let locale = self.locale();

        self.prompt.show_busy();
        let exchange = self.agent.converse(content, &self.history, &locale).await;
        self.prompt.hide_busy();

        self.prompt.render_trace(&exchange.trace);
        match exchange.outcome {
            Ok(reply) => {
                self.prompt.render_reply(&reply);
                self.history.push(Message::user(content));
                // Replayed in the same shape the model is asked to answer in
                self.history
                    .push(Message::assistant(encode(&Envelope::user_reply(reply))));
            }
            Err(e) => self.prompt.render_error(e.user_message()),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    fn locale(&self) -> LocaleContext {
        let now = chrono::Local::now();
        LocaleContext {
            time_zone: self
                .time_zone
                .clone()
                .unwrap_or_else(|| format!("UTC{}", now.format("%:z"))),
            current_time: now.to_rfc3339(),
        }
    }
}
