//! Line console parsing and rendering.
//!
//! `sudo <command> args...` sends a control-plane notification; any other
//! line `<method> args...` invokes a function. Arguments are whitespace
//! separated words; digit-only words travel as integers.

use conclave_protocol::Envelope;
use serde_json::Value;

use crate::client::Inbound;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Invoke { method: String, params: Value },
    Notify { method: String, params: Value },
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines and a bare `sudo` yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let first = words.next()?;

        if first.eq_ignore_ascii_case("sudo") {
            let method = words.next()?.to_string();
            return Some(ConsoleCommand::Notify {
                method,
                params: words_to_params(words),
            });
        }

        Some(ConsoleCommand::Invoke {
            method: first.to_lowercase(),
            params: words_to_params(words),
        })
    }
}

fn words_to_params<'a>(words: impl Iterator<Item = &'a str>) -> Value {
    Value::Array(words.map(|w| Value::String(w.to_string())).collect())
}

/// Text printed for one inbound frame.
pub fn render(inbound: &Inbound) -> String {
    match inbound {
        Inbound::Response(envelope) => match envelope {
            Envelope::Result(res) => format!("--> {}", res.result),
            Envelope::Error(err) => format!("--> error {}", err.error),
            other => format!("--> {:?}", other),
        },
        Inbound::Push(message) => match &message.message {
            Value::String(text) => format!("--> {}", text),
            other => format!("--> {}", other),
        },
        Inbound::Malformed(raw) => format!("--> (unreadable) {}", raw),
    }
}
