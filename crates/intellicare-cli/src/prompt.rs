use anyhow::Result;
use intellicare::agent::ThinkingStep;

pub mod cliclack;

pub trait Prompt {
    fn get_input(&mut self) -> Result<Input>;
    fn render_reply(&mut self, reply: &str);
    fn render_trace(&mut self, trace: &[ThinkingStep]);
    fn render_error(&mut self, message: &str);
    fn render_notice(&mut self, notice: &str);
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn ready(&self) {
        println!("\n");
        println!("Intellicare is ready. Ask about appointments or patient records.");
        println!("\n");
    }
    fn close(&self) {}
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Only set for messages
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}

pub enum Theme {
    Light,
    Dark,
}
