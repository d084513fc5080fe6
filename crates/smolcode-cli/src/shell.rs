//! Terminal input and rendering for the interactive session.

use std::io::Write as _;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use smolcode_agent::agent::{InputSource, Ui};

/// Line reader over stdin with a prompt. End of stream (ctrl-d) ends the
/// session.
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn read_line(&mut self) -> Option<String> {
        print!("> ");
        let _ = std::io::stdout().flush();
        self.lines.next_line().await.ok().flatten()
    }
}

/// Plain-text renderer. Model output goes to stdout; diagnostics and
/// traces go to stderr so they never mix into piped output.
pub struct TerminalUi;

impl Ui for TerminalUi {
    fn model_text(&mut self, text: &str) {
        println!("{text}");
    }

    fn tool_call(&mut self, name: &str, args: &Map<String, Value>) {
        let rendered = serde_json::to_string(args).unwrap_or_default();
        eprintln!("* {name} {rendered}");
    }

    fn tool_error(&mut self, _name: &str, message: &str) {
        eprintln!("! {message}");
    }

    fn notice(&mut self, message: &str) {
        eprintln!("{message}");
    }

    fn trace(&mut self, label: &str, payload: &Value) {
        let rendered =
            serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        eprintln!("--- {label} ---\n{rendered}\n---");
    }
}
