//! Terminal front-end: one command per stdin line.
//!
//! Accepts the same JSON as the GUI bridge, or plain words:
//! `submit [uplift|trance|dissonance] <text>`, `play`, `stop`, `reset`, `quit`.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::generation::types::SonicGoal;
use crate::protocol::UiCommand;

#[derive(Debug, PartialEq)]
pub enum ConsoleInput {
    Command(UiCommand),
    Quit,
}

pub fn parse_line(line: &str) -> Result<ConsoleInput, String> {
    let line = line.trim();
    if line.starts_with('{') {
        return serde_json::from_str(line)
            .map(ConsoleInput::Command)
            .map_err(|e| format!("invalid command JSON: {}", e));
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match word.to_ascii_lowercase().as_str() {
        "play" => Ok(ConsoleInput::Command(UiCommand::Play)),
        "stop" => Ok(ConsoleInput::Command(UiCommand::Stop)),
        "reset" => Ok(ConsoleInput::Command(UiCommand::Reset)),
        "quit" | "exit" => Ok(ConsoleInput::Quit),
        "submit" => {
            let rest = rest.trim();
            let (first, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let (goal, text) = match SonicGoal::parse(first) {
                Some(goal) => (goal, tail.trim()),
                None => (SonicGoal::default(), rest),
            };
            if text.is_empty() {
                return Err("submit needs some text".to_string());
            }
            Ok(ConsoleInput::Command(UiCommand::Submit {
                text: text.to_string(),
                goal,
            }))
        }
        "" => Err("empty line".to_string()),
        other => Err(format!("unknown command: {}", other)),
    }
}

/// Read stdin until EOF or `quit`. Dropping `tx` on return tells the core to shut down.
pub async fn run(tx: mpsc::Sender<ConsoleInput>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(input) => {
                let quit = input == ConsoleInput::Quit;
                if tx.send(input).await.is_err() || quit {
                    break;
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }
    Ok(())
}
