use anyhow::Result;
use console::style;
use futures::StreamExt;
use intellicare::providers::base::Generator;
use intellicare::providers::configs::OllamaProviderConfig;
use intellicare::providers::ollama::OllamaProvider;
use intellicare::relay::{relay, strip_reasoning};
use std::io::{self, Write};
use tokio_util::sync::CancellationToken;

use crate::prompt::cliclack::print_markdown;

pub async fn run(host: String, model: String, prompt: String, stream: bool) -> Result<()> {
    let provider = OllamaProvider::new(OllamaProviderConfig {
        host,
        ..OllamaProviderConfig::default()
    })?;

    if !stream {
        let text = provider.generate(&model, &prompt).await?;
        print_markdown(strip_reasoning(&text).trim(), "zenburn");
        println!();
        return Ok(());
    }

    let upstream = provider.generate_stream(&model, &prompt).await?;
    let cancel = CancellationToken::new();
    let mut chunks = relay(upstream, cancel.clone());
    let mut stdout = io::stdout();

    loop {
        tokio::select! {
            next = chunks.next() => match next {
                Some(chunk) => {
                    write!(stdout, "{}", chunk?.chunk)?;
                    stdout.flush()?;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                eprintln!("\n{}", style("Interrupted").dim());
                break;
            }
        }
    }

    println!();
    Ok(())
}
