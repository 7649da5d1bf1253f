pub mod client;
pub mod codec;
pub mod command;
pub mod connection;
pub mod datatypes;
pub mod dispatcher;
pub mod pdu;
pub mod transceiver;

#[cfg(test)]
mod tests;

// Re-export codec types for direct access
pub use codec::{Decodable, Encodable, PduError, decode_pdu, decode_pdu_hex};

// Re-export the main session API for easy access
pub use client::{
    Call, CallControl, ModemBuilder, ModemConfig, ModemError, ModemResult, ModemSession,
    ReceivedSms, SentSms, Sms, SmsStatus, SmsStore, SmsTransmitter, StatusReport,
};

/// Error returned by the demo programs and other glue code.
///
/// The library itself reports [`ModemError`] and [`PduError`]; this boxed
/// form is for callers that mix them with their own errors.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for application code.
///
/// # Examples
///
/// ## Sending a message
///
/// ```rust,no_run
/// use gsmmodem::{ModemBuilder, ModemSession, SmsTransmitter};
///
/// #[tokio::main]
/// async fn main() -> gsmmodem::Result<()> {
///     // Connect to a modem behind a serial-to-TCP bridge and run the handshake
///     let modem = ModemBuilder::new().connect_tcp("localhost:7000").await?;
///
///     // Send and wait for the status report
///     let sent = modem.send_sms("+27820000000", "Hello, World!", true, None).await?;
///     println!("Message {} is {:?}", sent.reference, sent.status);
///
///     modem.close().await;
///     Ok(())
/// }
/// ```
///
/// ## Decoding a stored PDU
///
/// ```rust
/// use gsmmodem::pdu::DecodedPdu;
///
/// let pdu = gsmmodem::decode_pdu_hex(
///     "07917248014000F3240B917247587706F400003110824115248012C8329BFD06C9C373B8B82C97E741F034",
/// )?;
/// let DecodedPdu::Deliver(deliver) = pdu else {
///     panic!("expected a deliver PDU");
/// };
/// assert_eq!(deliver.text(), "Hello raspberry pi");
/// # Ok::<(), gsmmodem::PduError>(())
/// ```
pub type Result<T> = std::result::Result<T, Error>;
