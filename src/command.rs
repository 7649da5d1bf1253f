// ABOUTME: AT command descriptors and classification of terminal response lines
// ABOUTME: A command knows its timeout, whether it expects a prompt and which reply prefix it claims

use std::time::Duration;

/// A command to send to the modem
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub text: String,
    /// Overrides the session's default command timeout
    pub timeout: Option<Duration>,
    /// First stage of a two-stage exchange: completes on the `> ` prompt
    pub expect_prompt: bool,
    /// Reply prefix (e.g. `+CLCC:`) treated as response content even when
    /// the same prefix is also a notification route
    pub claims: Option<String>,
}

impl Command {
    /// Builds a command, claiming the reply prefix derived from its name:
    /// `AT+CLCC` claims `+CLCC:`, `AT^DTMF=1,2` claims `^DTMF:`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let claims = reply_prefix(&text);
        Command {
            text,
            timeout: None,
            expect_prompt: false,
            claims,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn expecting_prompt(mut self) -> Self {
        self.expect_prompt = true;
        self
    }

    pub fn claims_line(&self, line: &str) -> bool {
        self.claims
            .as_deref()
            .is_some_and(|prefix| line.starts_with(prefix))
    }
}

fn reply_prefix(text: &str) -> Option<String> {
    let rest = text.strip_prefix("AT").or_else(|| text.strip_prefix("at"))?;
    if !rest.starts_with(['+', '^']) {
        return None;
    }
    let end = rest.find(['=', '?']).unwrap_or(rest.len());
    (end > 1).then(|| format!("{}:", &rest[..end]))
}

/// How a response ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    Ok,
    Error,
    CmeError(u16),
    CmsError(u16),
    /// Vendor reply for unknown commands (ZTE devices)
    NotSupported,
    /// The `> ` data-entry prompt
    Prompt,
}

impl Terminal {
    pub fn is_success(self) -> bool {
        matches!(self, Terminal::Ok | Terminal::Prompt)
    }
}

/// Classifies a text line that ends a command response
pub fn classify_terminal(line: &str) -> Option<Terminal> {
    let line = line.trim();
    match line {
        "OK" => return Some(Terminal::Ok),
        "ERROR" => return Some(Terminal::Error),
        "COMMAND NOT SUPPORT" => return Some(Terminal::NotSupported),
        _ => {}
    }
    if let Some(code) = line.strip_prefix("+CME ERROR:") {
        return Some(parse_code(code).map_or(Terminal::Error, Terminal::CmeError));
    }
    if let Some(code) = line.strip_prefix("+CMS ERROR:") {
        return Some(parse_code(code).map_or(Terminal::Error, Terminal::CmsError));
    }
    None
}

fn parse_code(code: &str) -> Option<u16> {
    code.trim().parse().ok()
}
