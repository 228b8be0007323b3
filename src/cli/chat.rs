use std::io::{self, Write};

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use crate::client::{Reconstruction, stream_chat};
use crate::openai::{Message, Role};

/// Prints only the part of the display buffer that is new since the
/// last update. The buffer only grows while a response streams, and
/// shrinking means it was reset.
struct TerminalView {
    printed: usize,
}

impl TerminalView {
    fn update(&mut self, text: &str) {
        if text.len() < self.printed {
            self.printed = 0;
            return;
        }
        print!("{}", &text[self.printed..]);
        let _ = io::stdout().flush();
        self.printed = text.len();
    }
}

pub async fn run(url: &str) -> Result<()> {
    // Keep logs off stdout so they don't interleave with the reply
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let mut rl = DefaultEditor::new()?;
    let client = reqwest::Client::new();
    let mut buffer = Reconstruction::new();
    let mut history: Vec<Message> = Vec::new();

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                history.push(Message::new(Role::User, line));

                // The prompt is not shown again until the reply has
                // finished, so only one response streams at a time
                let mut view = TerminalView { printed: 0 };
                let result =
                    stream_chat(&client, url, &history, &mut buffer, |t| view.update(t)).await;
                println!();

                match result {
                    Ok(reply) if !reply.is_empty() => {
                        history.push(Message::new(Role::Assistant, &reply));
                    }
                    Ok(_) => {
                        history.pop();
                    }
                    Err(err) => {
                        println!("Error: {:#}", err);
                        history.pop();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
