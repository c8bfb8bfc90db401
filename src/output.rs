// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports human-readable and JSON-lines output modes.

use serde::Serialize;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly text
    Normal,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    /// Print a line of text, or a JSON record carrying the same information.
    pub fn record<T: Serialize>(&self, text: &str, record: &T) {
        match self.mode {
            OutputMode::Normal => println!("{text}"),
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(record) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print a success message.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => println!("{message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "success",
                    message,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print the output of one command, with its exit status when known.
    pub fn command(&self, lines: &[String], exit_code: Option<u32>) {
        match self.mode {
            OutputMode::Normal => {
                for line in lines {
                    println!("{line}");
                }
                if let Some(code) = exit_code {
                    println!("[exit status {code}]");
                }
            }
            OutputMode::Json => {
                let record = CommandRecord { lines, exit_code };
                if let Ok(json) = serde_json::to_string(&record) {
                    println!("{json}");
                }
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct CommandRecord<'a> {
    lines: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<u32>,
}
