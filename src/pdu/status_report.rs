// ABOUTME: SMS-STATUS-REPORT model: delivery outcome for a previously submitted message
// ABOUTME: Correlated with the sent message through the TP-MR reference it echoes

use crate::codec::{Decodable, Encodable, PduError, TpduHeader, decode_u8};
use crate::datatypes::{Address, DeliveryStatus, FirstOctet, MessageTypeIndicator, SmsTimestamp};
use bytes::{BufMut, BytesMut};
use std::io::Cursor;

#[derive(Clone, Debug, PartialEq)]
pub struct SmsStatusReport {
    pub smsc: Option<Address>,
    /// TP-MR of the submit this report is about
    pub reference: u8,
    pub recipient: Address,
    /// When the service centre accepted the message
    pub time_sent: SmsTimestamp,
    /// When the final (or current) status was reached
    pub discharge_time: SmsTimestamp,
    pub status_code: u8,
    pub status: DeliveryStatus,
}

impl Encodable for SmsStatusReport {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), PduError> {
        Address::encode_smsc(self.smsc.as_ref(), buf);
        let first = FirstOctet {
            mti: MessageTypeIndicator::StatusReport,
            bit2: true,
            validity_format: Default::default(),
            status_report: false,
            udhi: false,
            reply_path: false,
        };
        buf.put_u8(first.to_byte());
        buf.put_u8(self.reference);
        self.recipient.encode(buf);
        self.time_sent.encode(buf);
        self.discharge_time.encode(buf);
        buf.put_u8(self.status_code);
        Ok(())
    }
}

impl Decodable for SmsStatusReport {
    fn message_type() -> MessageTypeIndicator {
        MessageTypeIndicator::StatusReport
    }

    /// Optional trailing parameters (TP-PI and what it announces) are ignored.
    fn decode(header: TpduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, PduError> {
        Self::validate_header(&header)?;
        let reference = decode_u8(buf)?;
        let recipient = Address::decode(buf)?;
        let time_sent = SmsTimestamp::decode(buf)?;
        let discharge_time = SmsTimestamp::decode(buf)?;
        let status_code = decode_u8(buf)?;

        Ok(SmsStatusReport {
            smsc: header.smsc,
            reference,
            recipient,
            time_sent,
            discharge_time,
            status_code,
            status: DeliveryStatus::from_code(status_code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_pdu;
    use crate::pdu::DecodedPdu;

    #[test]
    fn failure_status_survives_encoding() {
        let report = SmsStatusReport {
            smsc: None,
            reference: 9,
            recipient: Address::parse("+27820000000").unwrap(),
            time_sent: SmsTimestamp::new(2024, 5, 1, 10, 0, 0, 8).unwrap(),
            discharge_time: SmsTimestamp::new(2024, 5, 1, 10, 5, 0, 8).unwrap(),
            status_code: 0x41,
            status: DeliveryStatus::from_code(0x41),
        };
        let octets = report.to_bytes().unwrap();
        let DecodedPdu::StatusReport(decoded) = decode_pdu(&octets).unwrap() else {
            panic!("expected status report");
        };
        assert_eq!(decoded, report);
        assert!(!decoded.status.is_delivered());
        assert!(decoded.status.is_final());
    }

    #[test]
    fn missing_status_octet_is_incomplete() {
        let hex = "0006230E9126983575169498610103409544C261010340954482";
        assert!(crate::codec::decode_pdu_hex(hex).is_err());
    }
}
