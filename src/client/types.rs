// ABOUTME: Value types for the modem session: calls, stored and sent messages, capabilities
// ABOUTME: Converts decoded TPDUs into the session's message types and defines wire-coded enums

use crate::datatypes::{ConcatInfo, DeliveryStatus, SmsTimestamp};
use crate::pdu::{Concatenated, DecodedPdu, SmsDeliver, SmsStatusReport, SmsSubmit};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Who placed a call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// Why a call ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// Hung up from this side
    Local,
    /// The remote party hung up an established call
    Remote,
    /// The remote party declined or never answered an outgoing call
    Rejected,
}

/// Lifecycle of a call.
///
/// States only move forward: `Initiating` → `ActiveUnanswered` →
/// `ActiveAnswered` → `Ended`. An unanswered call may end directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallState {
    Initiating,
    /// Dialled and ringing, or an incoming call that is ringing
    ActiveUnanswered,
    ActiveAnswered,
    Ended(EndReason),
}

impl CallState {
    fn rank(self) -> u8 {
        match self {
            CallState::Initiating => 0,
            CallState::ActiveUnanswered => 1,
            CallState::ActiveAnswered => 2,
            CallState::Ended(_) => 3,
        }
    }

    pub fn is_ended(self) -> bool {
        matches!(self, CallState::Ended(_))
    }

    pub fn is_answered(self) -> bool {
        matches!(self, CallState::ActiveAnswered)
    }

    /// Whether moving to `next` is a legal forward transition
    pub fn can_transition_to(self, next: CallState) -> bool {
        next.rank() > self.rank()
    }
}

/// Storage status of a message, as used by `AT+CMGL` and `AT+CMGR`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SmsStatus {
    ReceivedUnread = 0,
    ReceivedRead = 1,
    StoredUnsent = 2,
    StoredSent = 3,
    /// Listing filter only
    All = 4,
}

impl SmsStatus {
    /// Name used in text mode
    pub fn text_name(self) -> &'static str {
        match self {
            SmsStatus::ReceivedUnread => "REC UNREAD",
            SmsStatus::ReceivedRead => "REC READ",
            SmsStatus::StoredUnsent => "STO UNSENT",
            SmsStatus::StoredSent => "STO SENT",
            SmsStatus::All => "ALL",
        }
    }

    pub fn from_text_name(name: &str) -> Option<Self> {
        match name.trim().trim_matches('"') {
            "REC UNREAD" => Some(SmsStatus::ReceivedUnread),
            "REC READ" => Some(SmsStatus::ReceivedRead),
            "STO UNSENT" => Some(SmsStatus::StoredUnsent),
            "STO SENT" => Some(SmsStatus::StoredSent),
            "ALL" => Some(SmsStatus::All),
            _ => None,
        }
    }

    /// Parses either the numeric (PDU mode) or the quoted (text mode) form
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().parse::<u8>() {
            Ok(code) => SmsStatus::try_from(code).ok(),
            Err(_) => SmsStatus::from_text_name(value),
        }
    }

    pub fn is_stored_outgoing(self) -> bool {
        matches!(self, SmsStatus::StoredUnsent | SmsStatus::StoredSent)
    }
}

/// Which messages `AT+CMGD=1,<flag>` removes
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DeleteFlag {
    /// All read messages
    Read = 1,
    /// Read and sent messages
    ReadAndSent = 2,
    /// Read, sent and unsent messages
    ReadSentAndUnsent = 3,
    /// Everything, unread included
    All = 4,
}

/// An incoming message, read from storage or delivered directly
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedSms {
    pub sender: String,
    /// Service centre timestamp, carrying the sender's UTC offset
    pub timestamp: SmsTimestamp,
    pub text: String,
    pub status: SmsStatus,
    /// Storage slot; `None` for directly delivered messages
    pub index: Option<u32>,
    pub memory: Option<String>,
    pub smsc: Option<String>,
    /// Set while this is one part of a concatenated message
    pub concat: Option<ConcatInfo>,
}

impl ReceivedSms {
    pub(crate) fn from_deliver(
        deliver: SmsDeliver,
        status: SmsStatus,
        index: Option<u32>,
        memory: Option<String>,
    ) -> Self {
        let concat = deliver.concat_info();
        ReceivedSms {
            sender: deliver.originator.to_string(),
            timestamp: deliver.timestamp,
            text: deliver.user_data.text,
            status,
            index,
            memory,
            smsc: deliver.smsc.map(|smsc| smsc.to_string()),
            concat,
        }
    }
}

impl Concatenated for ReceivedSms {
    fn sender(&self) -> &str {
        &self.sender
    }

    fn concat_info(&self) -> Option<ConcatInfo> {
        self.concat
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn with_text(mut self, text: String) -> Self {
        self.text = text;
        self.concat = None;
        self
    }
}

/// Delivery outcome for a sent message
#[derive(Clone, Debug, PartialEq)]
pub struct StatusReport {
    /// Reference of the message this report is about
    pub reference: u8,
    pub recipient: String,
    pub time_sent: SmsTimestamp,
    pub time_finalized: SmsTimestamp,
    pub delivery_status: DeliveryStatus,
    /// Raw TP-Status value
    pub status_code: u8,
    pub status: SmsStatus,
    pub index: Option<u32>,
    pub memory: Option<String>,
    pub smsc: Option<String>,
}

impl StatusReport {
    pub(crate) fn from_pdu(
        report: SmsStatusReport,
        status: SmsStatus,
        index: Option<u32>,
        memory: Option<String>,
    ) -> Self {
        StatusReport {
            reference: report.reference,
            recipient: report.recipient.to_string(),
            time_sent: report.time_sent,
            time_finalized: report.discharge_time,
            delivery_status: report.status,
            status_code: report.status_code,
            status,
            index,
            memory,
            smsc: report.smsc.map(|smsc| smsc.to_string()),
        }
    }
}

/// Delivery state of a sent message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SentStatus {
    /// Accepted by the network, no final report yet
    Enroute,
    Delivered,
    Failed,
}

/// A message sent by this session (or a stored outgoing message)
#[derive(Clone, Debug, PartialEq)]
pub struct SentSms {
    pub number: String,
    pub text: String,
    /// Message reference the modem reported for the send
    pub reference: u8,
    pub status: SentStatus,
    pub report: Option<StatusReport>,
}

impl SentSms {
    pub fn new(number: impl Into<String>, text: impl Into<String>, reference: u8) -> Self {
        SentSms {
            number: number.into(),
            text: text.into(),
            reference,
            status: SentStatus::Enroute,
            report: None,
        }
    }

    /// Links `report` and updates the status from it
    pub fn apply_report(&mut self, report: StatusReport) {
        self.status = if report.delivery_status.is_delivered() {
            SentStatus::Delivered
        } else if report.delivery_status.is_final() {
            SentStatus::Failed
        } else {
            SentStatus::Enroute
        };
        self.report = Some(report);
    }

    pub(crate) fn from_submit(submit: SmsSubmit) -> Self {
        SentSms::new(
            submit.destination.to_string(),
            submit.user_data.text,
            submit.reference,
        )
    }
}

/// Any message the modem hands back
#[derive(Clone, Debug, PartialEq)]
pub enum Sms {
    Sent(SentSms),
    Received(ReceivedSms),
    StatusReport(StatusReport),
}

impl Sms {
    pub(crate) fn from_pdu(
        pdu: DecodedPdu,
        status: SmsStatus,
        index: Option<u32>,
        memory: Option<String>,
    ) -> Self {
        match pdu {
            DecodedPdu::Deliver(deliver) => {
                Sms::Received(ReceivedSms::from_deliver(deliver, status, index, memory))
            }
            DecodedPdu::Submit(submit) => Sms::Sent(SentSms::from_submit(submit)),
            DecodedPdu::StatusReport(report) => {
                Sms::StatusReport(StatusReport::from_pdu(report, status, index, memory))
            }
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Sms::Sent(sms) => Some(&sms.text),
            Sms::Received(sms) => Some(&sms.text),
            Sms::StatusReport(_) => None,
        }
    }
}

/// How the modem answered `AT+CLAC`, resolved once during connect
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VendorShape {
    /// `+CLAC: a,b,c`
    StructuredList,
    /// Bare command names, comma separated and/or one per line
    UnprefixedLines,
    /// No usable list; commands were probed one by one
    #[default]
    TrialProbe,
}

/// Where call progress events come from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CallEventProfile {
    /// `^ORIG`, `^CONF`, `^CONN`, `^CEND`
    Huawei,
    /// `+WIND` indications, with `AT+CLCC` polling for answer detection
    Wavecom,
    /// `AT+CLCC` polling only
    #[default]
    Polling,
}

impl CallEventProfile {
    pub fn needs_polling(self) -> bool {
        !matches!(self, CallEventProfile::Huawei)
    }
}

/// Features detected during the connect handshake.
///
/// Each flag is false when the corresponding optional command failed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `AT+CFUN` is understood
    pub functionality_mode: bool,
    /// `AT+CLIP=1` succeeded
    pub caller_id: bool,
    /// `AT+CRC=1` succeeded
    pub extended_ring: bool,
    /// New-message indications (`AT+CNMI`) are enabled
    pub sms_push: bool,
    /// `AT+CPMS=?` answered
    pub storage_query: bool,
    pub dtmf: bool,
    pub vendor_shape: VendorShape,
    pub call_events: CallEventProfile,
    pub commands: Vec<String>,
    /// Message memories reported by `AT+CPMS=?`
    pub memories: Vec<String>,
}

impl Capabilities {
    pub fn supports(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Initiating => write!(f, "initiating"),
            CallState::ActiveUnanswered => write!(f, "ringing"),
            CallState::ActiveAnswered => write!(f, "answered"),
            CallState::Ended(reason) => write!(f, "ended ({reason:?})"),
        }
    }
}
