// ABOUTME: Modem session traits using native async functions, split by concern
// ABOUTME: Session management, call control, SMS sending and SMS storage operations

use crate::client::call::Call;
use crate::client::error::ModemResult;
use crate::client::types::{Capabilities, ReceivedSms, SentSms, Sms, SmsStatus};
use std::time::Duration;

/// Session lifecycle and device queries
///
/// Provides operations every modem session supports once the connect
/// handshake has completed.
pub trait ModemSession {
    /// Stop the read, dispatcher and polling tasks
    ///
    /// Commands still waiting for a reply fail with `ModemError::Closed`.
    async fn close(&self);

    /// True once the session was closed or the byte stream ended
    fn is_closed(&self) -> bool;

    /// Features detected during connect
    fn capabilities(&self) -> Capabilities;

    /// Send a raw AT command and return its response lines
    ///
    /// Escape hatch for commands the session has no dedicated operation for.
    async fn write(&self, command: &str) -> ModemResult<Vec<String>>;

    /// Received signal strength (0-31), `None` when the modem does not know
    async fn signal_strength(&self) -> ModemResult<Option<u8>>;

    /// Wait until the modem is registered and has a usable signal
    ///
    /// Returns the signal strength once coverage is available. Fails with
    /// `InvalidState` when registration was denied or the modem is not
    /// searching, and with `Timeout` when `timeout` elapses first.
    async fn wait_for_network_coverage(&self, timeout: Duration) -> ModemResult<u8>;

    async fn manufacturer(&self) -> ModemResult<String>;

    async fn model(&self) -> ModemResult<String>;

    async fn revision(&self) -> ModemResult<String>;

    async fn imei(&self) -> ModemResult<String>;

    async fn imsi(&self) -> ModemResult<String>;

    /// Name of the network operator, if registered
    async fn network_name(&self) -> ModemResult<Option<String>>;

    /// Service centre number stored on the SIM
    async fn smsc(&self) -> ModemResult<Option<String>>;

    /// Store a new service centre number on the SIM
    async fn set_smsc(&self, number: &str) -> ModemResult<()>;
}

/// Voice call operations
///
/// Incoming calls are reported through the incoming-call callback; the
/// returned and reported `Call` handles carry answer, hangup and DTMF.
pub trait CallControl: ModemSession {
    /// Dial `number` and wait for the modem to confirm the call
    ///
    /// The returned call is ringing (`CallState::ActiveUnanswered`).
    async fn dial(&self, number: &str) -> ModemResult<Call>;

    /// Calls that have not ended yet
    fn active_calls(&self) -> Vec<Call>;
}

/// SMS sending operations
pub trait SmsTransmitter: ModemSession {
    /// Send a text message
    ///
    /// With `wait_for_report` the call returns only after the matching status
    /// report arrived, or fails with `DeliveryTimeout` after
    /// `delivery_timeout` (the configured default when `None`).
    async fn send_sms(
        &self,
        number: &str,
        text: &str,
        wait_for_report: bool,
        delivery_timeout: Option<Duration>,
    ) -> ModemResult<SentSms>;

    /// Send `text` back to the sender of `received`
    async fn reply(&self, received: &ReceivedSms, text: &str) -> ModemResult<SentSms>;
}

/// Operations on messages stored in the modem or SIM memory
pub trait SmsStore: ModemSession {
    /// List stored messages with the given status
    ///
    /// `memory` switches the message storage first (`"SM"`, `"ME"`, ...).
    /// With `delete` the listed messages are removed afterwards.
    async fn list_stored_sms(
        &self,
        status: SmsStatus,
        memory: Option<&str>,
        delete: bool,
    ) -> ModemResult<Vec<Sms>>;

    async fn read_stored_sms(&self, index: u32, memory: Option<&str>) -> ModemResult<Sms>;

    async fn delete_stored_sms(&self, index: u32, memory: Option<&str>) -> ModemResult<()>;

    /// Delete by category: 1 read, 2 read and sent, 3 read, sent and unsent,
    /// 4 everything. Other values fail with `InvalidValue`.
    async fn delete_multiple_stored_sms(&self, flag: u8, memory: Option<&str>)
    -> ModemResult<()>;

    /// Hand stored messages to the receive callback and delete them
    ///
    /// Reads already-read messages (unless `unread_only`) and then unread
    /// ones. Returns how many messages were processed.
    async fn process_stored_sms(&self, unread_only: bool) -> ModemResult<usize>;
}
