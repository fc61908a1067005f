use anyhow::Result;
use bat::WrappingMode;
use cliclack::{input, spinner};
use console::style;
use intellicare::agent::ThinkingStep;

use super::{Input, InputType, Prompt, Theme};

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
    theme: Theme,
    show_thinking: bool,
}

impl CliclackPrompt {
    pub fn new(show_thinking: bool) -> Self {
        CliclackPrompt {
            spinner: spinner(),
            theme: Theme::Dark,
            show_thinking,
        }
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

fn print_step(step: &ThinkingStep, theme: &str) {
    let details = match &step.details {
        serde_json::Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    let language = if details.starts_with('{') {
        "JSON"
    } else {
        "Markdown"
    };

    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(details.as_bytes()).name(step.step.as_str()))
        .theme(theme)
        .language(language)
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print();
    if let Err(e) = printed {
        eprintln!("Failed to render step: {}", e);
    }
}

pub fn print_markdown(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if let Err(e) = printed {
        eprintln!("Failed to render reply: {}", e);
        println!("{}", content);
    }
}

impl Prompt for CliclackPrompt {
    fn get_input(&mut self) -> Result<Input> {
        let message_text: String = input("Intellicare:         [Help: /?]")
            .placeholder("")
            .interact()?;
        let message_text = message_text.trim().to_string();

        if message_text.eq_ignore_ascii_case("/exit") || message_text.eq_ignore_ascii_case("/quit")
        {
            Ok(Input {
                input_type: InputType::Exit,
                content: None,
            })
        } else if message_text.eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => {
                    println!("Switching to Dark theme");
                    Theme::Dark
                }
                Theme::Dark => {
                    println!("Switching to Light theme");
                    Theme::Light
                }
            };
            self.get_input()
        } else if message_text.eq_ignore_ascii_case("/thinking") {
            self.show_thinking = !self.show_thinking;
            println!(
                "Thinking process {}",
                if self.show_thinking { "shown" } else { "hidden" }
            );
            self.get_input()
        } else if message_text.eq_ignore_ascii_case("/?") {
            println!("Commands:");
            println!("/exit - Exit the session");
            println!("/t - Toggle Light/Dark theme");
            println!("/thinking - Show or hide how each reply was reached");
            println!("/? - Display this help message");
            println!("Ctrl+C - Interrupt the assistant (the interrupted message is forgotten)");
            self.get_input()
        } else if message_text.is_empty() {
            Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            })
        } else {
            Ok(Input {
                input_type: InputType::Message,
                content: Some(message_text),
            })
        }
    }

    fn render_reply(&mut self, reply: &str) {
        print_markdown(reply, self.theme_name());
        println!();
    }

    fn render_trace(&mut self, trace: &[ThinkingStep]) {
        if !self.show_thinking {
            return;
        }
        let theme = self.theme_name();
        for step in trace {
            print_step(step, theme);
        }
    }

    fn render_error(&mut self, message: &str) {
        println!("{}\n", style(message).red());
    }

    fn render_notice(&mut self, notice: &str) {
        println!("{}\n", style(notice).dim());
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("awaiting reply");
    }

    fn hide_busy(&mut self) {
        self.spinner.stop("");
    }
}
