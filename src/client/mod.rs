// ABOUTME: Modem session module providing trait-based interfaces over an AT command transceiver
// ABOUTME: Exports the session handle, builder, configuration, call handles, message types and errors

//! Modem Session Module
//!
//! This module drives a GSM modem over any async byte stream:
//!
//! * **Native async traits** - Uses async fn in traits (no async_trait dependency)
//! * **Layered design** - Separate traits for session queries, calls, sending and storage
//! * **Capability detection** - Optional features are probed during connect and
//!   degrade quietly when a modem does not support them
//! * **Push delivery** - Incoming messages, status reports and calls arrive
//!   through callbacks registered on the builder
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gsmmodem::client::{ModemBuilder, ModemSession, SmsTransmitter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let modem = ModemBuilder::new()
//!     .on_sms_received(|sms| println!("{}: {}", sms.sender, sms.text))
//!     .connect_tcp("localhost:7000")
//!     .await?;
//!
//! let signal = modem.wait_for_network_coverage(std::time::Duration::from_secs(30)).await?;
//! println!("Signal strength {signal}");
//!
//! let sent = modem.send_sms("+27820000000", "Hello!", false, None).await?;
//! println!("Sent with reference {}", sent.reference);
//!
//! modem.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Calls
//!
//! ```rust,no_run
//! use gsmmodem::client::{CallControl, Modem};
//! use std::time::Duration;
//!
//! # async fn example(modem: Modem) -> Result<(), Box<dyn std::error::Error>> {
//! let call = modem.dial("+27820000000").await?;
//! if call.wait_until_answered(Duration::from_secs(30)).await? {
//!     call.send_dtmf("1234#").await?;
//! }
//! call.hangup().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! * `ModemSession` - Lifecycle, raw commands, identity and network queries
//! * `CallControl` - Dialling and the list of active calls
//! * `SmsTransmitter` - Sending and replying, optionally waiting for a status report
//! * `SmsStore` - Listing, reading and deleting stored messages

pub mod builder;
pub mod call;
pub mod config;
pub mod error;
mod handshake;
mod info;
mod modem;
mod poller;
mod response;
mod sms;
pub mod traits;
pub mod types;

pub use builder::ModemBuilder;
pub use call::Call;
pub use config::ModemConfig;
pub use error::{ModemError, ModemResult};
pub use modem::Modem;
pub use traits::{CallControl, ModemSession, SmsStore, SmsTransmitter};
pub use types::{
    CallDirection, CallEventProfile, CallState, Capabilities, DeleteFlag, EndReason,
    ReceivedSms, SentSms, SentStatus, Sms, SmsStatus, StatusReport, VendorShape,
};
