// ABOUTME: SMS-DELIVER model: an incoming message as pushed or stored by the modem
// ABOUTME: Decodes originator, timestamp and user data; encodes too so fakes can produce inbound traffic

use crate::codec::{Decodable, Encodable, PduError, TpduHeader, decode_u8};
use crate::datatypes::{
    Address, ConcatInfo, DataCoding, FirstOctet, MessageTypeIndicator, SmsTimestamp,
};
use crate::pdu::UserData;
use bytes::{BufMut, BytesMut};
use std::io::Cursor;

#[derive(Clone, Debug, PartialEq)]
pub struct SmsDeliver {
    pub smsc: Option<Address>,
    pub originator: Address,
    pub protocol_id: u8,
    pub data_coding: DataCoding,
    /// Service centre timestamp
    pub timestamp: SmsTimestamp,
    /// TP-SRI: the sender asked for a status report
    pub status_report_indication: bool,
    pub user_data: UserData,
}

impl SmsDeliver {
    pub fn text(&self) -> &str {
        &self.user_data.text
    }

    pub fn concat_info(&self) -> Option<ConcatInfo> {
        self.user_data.concat_info()
    }
}

impl Encodable for SmsDeliver {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), PduError> {
        Address::encode_smsc(self.smsc.as_ref(), buf);
        let first = FirstOctet {
            mti: MessageTypeIndicator::Deliver,
            // No more messages waiting
            bit2: true,
            validity_format: Default::default(),
            status_report: self.status_report_indication,
            udhi: self.user_data.header.is_some(),
            reply_path: false,
        };
        buf.put_u8(first.to_byte());
        self.originator.encode(buf);
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.data_coding.to_byte());
        self.timestamp.encode(buf);
        self.user_data.encode(buf, self.data_coding.alphabet)
    }
}

impl Decodable for SmsDeliver {
    fn message_type() -> MessageTypeIndicator {
        MessageTypeIndicator::Deliver
    }

    fn decode(header: TpduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, PduError> {
        Self::validate_header(&header)?;
        let originator = Address::decode(buf)?;
        let protocol_id = decode_u8(buf)?;
        let data_coding = DataCoding::from_byte(decode_u8(buf)?);
        let timestamp = SmsTimestamp::decode(buf)?;
        let user_data = UserData::decode(buf, data_coding.alphabet, header.first_octet.udhi)?;

        Ok(SmsDeliver {
            smsc: header.smsc,
            originator,
            protocol_id,
            data_coding,
            timestamp,
            status_report_indication: header.first_octet.status_report,
            user_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_pdu, decode_pdu_hex};
    use crate::datatypes::{Alphabet, UserDataHeader};
    use crate::pdu::DecodedPdu;

    fn deliver(text: &str, alphabet: Alphabet, header: Option<UserDataHeader>) -> SmsDeliver {
        let mut user_data = UserData::new(text);
        user_data.header = header;
        SmsDeliver {
            smsc: Some(Address::parse("+2782913593").unwrap()),
            originator: Address::parse("+27748577604").unwrap(),
            protocol_id: 0,
            data_coding: DataCoding::new(alphabet),
            timestamp: SmsTimestamp::new(2013, 1, 28, 14, 51, 42, 8).unwrap(),
            status_report_indication: false,
            user_data,
        }
    }

    #[test]
    fn alphanumeric_originator() {
        let pdu = decode_pdu_hex(
            "07917248014000F3040BD0C7F7FBCC2E0300003110824115248005C8329BFD06",
        )
        .unwrap();
        let DecodedPdu::Deliver(deliver) = pdu else {
            panic!("expected deliver");
        };
        assert!(deliver.originator.type_of_address().is_alphanumeric());
        assert_eq!(deliver.originator.as_str(), "Google");
        assert_eq!(deliver.text(), "Hello");
    }

    #[test]
    fn encoded_deliver_decodes_back() {
        let original = deliver(
            "part one",
            Alphabet::Gsm7,
            Some(UserDataHeader::concat(7, 2, 1)),
        );
        let octets = original.to_bytes().unwrap();
        let DecodedPdu::Deliver(decoded) = decode_pdu(&octets).unwrap() else {
            panic!("expected deliver");
        };
        assert_eq!(decoded, original);
        assert_eq!(decoded.concat_info().map(|c| c.sequence), Some(1));
    }

    #[test]
    fn ucs2_deliver() {
        let original = deliver("Привет", Alphabet::Ucs2, None);
        let octets = original.to_bytes().unwrap();
        let DecodedPdu::Deliver(decoded) = decode_pdu(&octets).unwrap() else {
            panic!("expected deliver");
        };
        assert_eq!(decoded.text(), "Привет");
    }

    #[test]
    fn submit_header_is_rejected_by_deliver_decoder() {
        let header = TpduHeader {
            smsc: None,
            first_octet: FirstOctet::submit(),
        };
        let bytes = [0u8; 4];
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(
            SmsDeliver::decode(header, &mut cursor),
            Err(PduError::UnexpectedMessageType { .. })
        ));
    }
}
