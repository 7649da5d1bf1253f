// ABOUTME: Modem session error types covering transport, command and SIM failures
// ABOUTME: Maps modem error reply codes onto structured variants with automatic conversions

use crate::codec::PduError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Error type for all modem operations
///
/// Command-level failures carry the command text so callers can tell which
/// step of a multi-command operation failed.
#[derive(Debug, Error)]
pub enum ModemError {
    /// No terminal response arrived within the command timeout
    #[error("Timed out waiting for a response to {command}")]
    Timeout { command: String },

    /// Generic `ERROR` or a vendor "not supported" reply
    #[error("Command {command} failed")]
    Command {
        command: String,
        /// Lines received before the error terminal
        response: Vec<String>,
    },

    /// `+CME ERROR: <code>` (equipment error)
    #[error("Command {command} failed with CME error {code}")]
    Cme { command: String, code: u16 },

    /// `+CMS ERROR: <code>` (message service error)
    #[error("Command {command} failed with CMS error {code}")]
    Cms { command: String, code: u16 },

    /// The SIM is locked and no PIN was configured (or CME 11)
    #[error("SIM PIN required")]
    PinRequired,

    /// The SIM is blocked and needs its PUK (CME 12)
    #[error("SIM PUK required")]
    PukRequired,

    /// The configured PIN was rejected (CME 16)
    #[error("Incorrect SIM PIN")]
    IncorrectPin,

    /// The operation does not fit the current call or session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Text could not be represented in the selected alphabet
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Argument outside its defined domain (status filter, delete flag, ...)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The message was sent but no status report arrived in time
    #[error("No delivery report within {0:?}")]
    DeliveryTimeout(Duration),

    /// The session was closed or the stream ended
    #[error("Modem connection closed")]
    Closed,

    /// I/O error on the byte stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A PDU could not be encoded or decoded
    #[error("PDU error: {0}")]
    Pdu(#[from] PduError),

    /// A successful reply did not have the expected shape
    #[error("Unexpected response to {command}: {response:?}")]
    UnexpectedResponse {
        command: String,
        response: Vec<String>,
    },
}

/// Result type alias for modem operations
pub type ModemResult<T> = Result<T, ModemError>;

impl ModemError {
    /// Classifies a `+CME ERROR` code
    pub fn from_cme(command: &str, code: u16) -> Self {
        match code {
            11 => ModemError::PinRequired,
            12 => ModemError::PukRequired,
            16 => ModemError::IncorrectPin,
            _ => ModemError::Cme {
                command: command.to_string(),
                code,
            },
        }
    }

    /// True for CME 14, "SIM busy", which is worth retrying
    pub fn is_sim_busy(&self) -> bool {
        matches!(self, ModemError::Cme { code: 14, .. })
    }

    /// True when the modem answered, just not successfully. Optional
    /// handshake steps downgrade these (and timeouts) to disabled features.
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            ModemError::Command { .. }
                | ModemError::Cme { .. }
                | ModemError::Cms { .. }
                | ModemError::Timeout { .. }
                | ModemError::UnexpectedResponse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cme_codes_map_to_sim_errors() {
        assert!(matches!(ModemError::from_cme("AT", 11), ModemError::PinRequired));
        assert!(matches!(ModemError::from_cme("AT", 12), ModemError::PukRequired));
        assert!(matches!(ModemError::from_cme("AT", 16), ModemError::IncorrectPin));
        let err = ModemError::from_cme("AT+CMGR=1", 22);
        assert!(matches!(&err, ModemError::Cme { code: 22, command } if command == "AT+CMGR=1"));
        assert_eq!(err.to_string(), "Command AT+CMGR=1 failed with CME error 22");
    }

    #[test]
    fn sim_busy_is_retryable() {
        assert!(ModemError::from_cme("AT+CPIN?", 14).is_sim_busy());
        assert!(!ModemError::Closed.is_sim_busy());
        assert!(!ModemError::Closed.is_command_failure());
    }
}
