// ABOUTME: SMS TPDU codec - separates the octet-level wire format from the message models
// ABOUTME: Defines PduError, the Encodable/Decodable traits, cursor helpers and hex conversion

use crate::datatypes::{Address, AddressError, FirstOctet, MessageTypeIndicator, TimestampError};
use crate::pdu::{DecodedPdu, SmsDeliver, SmsStatusReport, SmsSubmit};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Leading fields common to every PDU exchanged with a modem: the optional
/// SMSC prefix and the TPDU first octet.
#[derive(Debug, Clone, PartialEq)]
pub struct TpduHeader {
    pub smsc: Option<Address>,
    pub first_octet: FirstOctet,
}

impl TpduHeader {
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, PduError> {
        let smsc = Address::decode_smsc(buf)?;
        let first_octet = FirstOctet::from_byte(decode_u8(buf)?);
        Ok(TpduHeader { smsc, first_octet })
    }
}

/// Trait for messages that can be written as a PDU
pub trait Encodable {
    /// Encode the full PDU (SMSC prefix included) to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), PduError>;

    /// Convert to bytes (convenience method)
    fn to_bytes(&self) -> Result<Bytes, PduError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Trait for messages that can be decoded after the common header
pub trait Decodable: Sized {
    /// Decode the TPDU body that follows the first octet
    fn decode(header: TpduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, PduError>;

    /// Message type this model decodes
    fn message_type() -> MessageTypeIndicator;

    fn validate_header(header: &TpduHeader) -> Result<(), PduError> {
        if header.first_octet.mti != Self::message_type() {
            return Err(PduError::UnexpectedMessageType {
                expected: Self::message_type(),
                actual: header.first_octet.mti,
            });
        }
        Ok(())
    }
}

/// Codec errors with enough context to tell which field was malformed
#[derive(Debug, Error)]
pub enum PduError {
    #[error("Incomplete PDU: need more data")]
    Incomplete,

    #[error("Invalid hex data: {0}")]
    InvalidHex(String),

    #[error("Unsupported message type indicator: {0:#04b}")]
    UnsupportedMessageType(u8),

    #[error("Unexpected message type: expected {expected:?}, got {actual:?}")]
    UnexpectedMessageType {
        expected: MessageTypeIndicator,
        actual: MessageTypeIndicator,
    },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("Message needs {0} segments, at most 255 are possible")]
    TooManySegments(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode a single octet
pub fn decode_u8(buf: &mut Cursor<&[u8]>) -> Result<u8, PduError> {
    if buf.remaining() < 1 {
        return Err(PduError::Incomplete);
    }
    Ok(buf.get_u8())
}

/// Decode exactly `len` octets, naming the field on shortfall
pub fn decode_bytes(
    buf: &mut Cursor<&[u8]>,
    len: usize,
    field: &'static str,
) -> Result<Vec<u8>, PduError> {
    if buf.remaining() < len {
        return Err(PduError::FieldValidation {
            field,
            reason: format!("need {len} octets, {} left", buf.remaining()),
        });
    }
    let mut out = vec![0; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Encode a single octet
pub fn encode_u8(buf: &mut BytesMut, value: u8) {
    buf.put_u8(value);
}

/// Upper-case hex, the form modems expect after AT+CMGS
pub fn to_hex(octets: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(octets.len() * 2);
    for &octet in octets {
        out.push(DIGITS[(octet >> 4) as usize] as char);
        out.push(DIGITS[(octet & 0x0F) as usize] as char);
    }
    out
}

/// Parses hex of either case; surrounding whitespace is ignored
pub fn from_hex(text: &str) -> Result<Vec<u8>, PduError> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return Err(PduError::InvalidHex(format!("odd length {}", text.len())));
    }
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16);
            let lo = (pair[1] as char).to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                _ => Err(PduError::InvalidHex(String::from_utf8_lossy(pair).into_owned())),
            }
        })
        .collect()
}

/// Decodes a PDU as read from the modem, SMSC prefix included, dispatching
/// on the message type indicator.
pub fn decode_pdu(octets: &[u8]) -> Result<DecodedPdu, PduError> {
    let mut cursor = Cursor::new(octets);
    let header = TpduHeader::decode(&mut cursor)?;
    match header.first_octet.mti {
        MessageTypeIndicator::Deliver => {
            SmsDeliver::decode(header, &mut cursor).map(DecodedPdu::Deliver)
        }
        MessageTypeIndicator::Submit => {
            SmsSubmit::decode(header, &mut cursor).map(DecodedPdu::Submit)
        }
        MessageTypeIndicator::StatusReport => {
            SmsStatusReport::decode(header, &mut cursor).map(DecodedPdu::StatusReport)
        }
        MessageTypeIndicator::Reserved => Err(PduError::UnsupportedMessageType(
            header.first_octet.mti as u8,
        )),
    }
}

/// [`decode_pdu`] for the hex form found in `+CMGL:`/`+CMGR:` responses
pub fn decode_pdu_hex(text: &str) -> Result<DecodedPdu, PduError> {
    decode_pdu(&from_hex(text)?)
}

pub use crate::pdu::encode_submit;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{DeliveryStatus, SmsTimestamp};

    #[test]
    fn hex_roundtrip_uses_upper_case() {
        assert_eq!(to_hex(&[0x00, 0x21, 0xab]), "0021AB");
        assert_eq!(from_hex("0021ab").unwrap(), vec![0x00, 0x21, 0xab]);
        assert_eq!(from_hex(" 0A \r").unwrap(), vec![0x0a]);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(matches!(from_hex("ABC"), Err(PduError::InvalidHex(_))));
        assert!(matches!(from_hex("ZZ"), Err(PduError::InvalidHex(_))));
        assert!(matches!(from_hex("+CMGL: 1,0,,29"), Err(PduError::InvalidHex(_))));
    }

    #[test]
    fn decodes_deliver_with_smsc() {
        let pdu = decode_pdu_hex(
            "06917228195339040A9110325476980000313080512061800CC8329BFD06DDDF72363904",
        )
        .unwrap();
        let DecodedPdu::Deliver(deliver) = pdu else {
            panic!("expected deliver, got {pdu:?}");
        };
        assert_eq!(deliver.smsc.as_ref().unwrap().as_str(), "+2782913593");
        assert_eq!(deliver.originator.as_str(), "+0123456789");
        assert_eq!(deliver.text(), "Hello world!");
        assert_eq!(
            deliver.timestamp,
            SmsTimestamp::new(2013, 3, 8, 15, 2, 16, 8).unwrap()
        );
    }

    #[test]
    fn decodes_stored_deliver() {
        let pdu = decode_pdu_hex(
            "07917248014000F3240B917247587706F400003110824115248012C8329BFD06C9C373B8B82C97E741F034",
        )
        .unwrap();
        let DecodedPdu::Deliver(deliver) = pdu else {
            panic!("expected deliver");
        };
        assert_eq!(deliver.originator.as_str(), "+27748577604");
        assert_eq!(deliver.text(), "Hello raspberry pi");
        assert_eq!(deliver.timestamp.to_string(), "2013-01-28 14:51:42 +02:00");
    }

    #[test]
    fn decodes_status_report_national_recipient() {
        let pdu = decode_pdu_hex(
            "07917248014000F506B70AA18092020000317071518590803170715185418000",
        )
        .unwrap();
        let DecodedPdu::StatusReport(report) = pdu else {
            panic!("expected status report");
        };
        assert_eq!(report.reference, 183);
        assert_eq!(report.recipient.as_str(), "0829200000");
        assert_eq!(report.status, DeliveryStatus::Delivered);
    }

    #[test]
    fn decodes_status_report_without_smsc() {
        let pdu =
            decode_pdu_hex("0006230E9126983575169498610103409544C26101034095448200").unwrap();
        let DecodedPdu::StatusReport(report) = pdu else {
            panic!("expected status report");
        };
        assert!(report.smsc.is_none());
        assert_eq!(report.reference, 35);
        assert_eq!(report.recipient.as_str(), "+62895357614989");
        assert_eq!(report.time_sent.utc_offset_minutes(), 8 * 60);
        assert_eq!(report.discharge_time.utc_offset_minutes(), 7 * 60);
        assert_eq!(report.status, DeliveryStatus::Delivered);
    }

    #[test]
    fn reserved_message_type_is_unsupported() {
        assert!(matches!(
            decode_pdu(&[0x00, 0x03]),
            Err(PduError::UnsupportedMessageType(3))
        ));
    }

    #[test]
    fn truncated_pdu_is_an_error() {
        assert!(decode_pdu(&[]).is_err());
        assert!(decode_pdu_hex("0791724801").is_err());
        assert!(decode_pdu_hex("06917228195339040A91103254").is_err());
    }
}
