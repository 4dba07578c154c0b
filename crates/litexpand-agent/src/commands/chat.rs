//! `litexpand chat`: interactive questions over the corpus.
//!
//! The conversation is kept as history for follow-up questions and the full
//! transcript is rewritten after every turn.

use std::path::Path;

use anyhow::Context;
use litexpand_llm::{Message, CHAT_SYSTEM_PROMPT};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use super::{build_copilot, echo};
use crate::config::Config;

const PROMPT: &str = "Please ask a question: ";

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let copilot = build_copilot(config, CHAT_SYSTEM_PROMPT)?;
    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        echo(PROMPT);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if is_quit(question) {
            break;
        }

        let answer = match copilot.ask(question, &history).await {
            Ok((_, answer)) => answer.collect_with(echo).await,
            Err(e) => Err(e),
        };
        println!();

        let answer = match answer {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Question failed");
                continue;
            }
        };

        history.push(Message::user(question));
        history.push(Message::assistant(answer));
        write_transcript(&config.output.transcript_path, &history)?;
    }

    info!(turns = history.len() / 2, "Chat ended");
    Ok(())
}

fn is_quit(input: &str) -> bool {
    input.is_empty() || input.eq_ignore_ascii_case("exit")
}

/// One `role: content` line per message.
pub fn render_transcript(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}\n", m.role, m.content))
        .collect()
}

fn write_transcript(path: &Path, history: &[Message]) -> anyhow::Result<()> {
    std::fs::write(path, render_transcript(history))
        .with_context(|| format!("Cannot write transcript to {}", path.display()))
}
