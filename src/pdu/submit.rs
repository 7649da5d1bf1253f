// ABOUTME: SMS-SUBMIT model plus text segmentation into concatenated submit PDUs
// ABOUTME: Picks the alphabet, splits without breaking escapes or surrogate pairs, and encodes each part

use crate::codec::{Decodable, Encodable, PduError, TpduHeader, decode_bytes, decode_u8};
use crate::datatypes::{
    Address, Alphabet, DataCoding, FirstOctet, MessageClass,
    MessageTypeIndicator, SmsTimestamp, UserDataHeader, ValidityPeriod, ValidityPeriodFormat,
    gsm7, relative_duration,
};
use crate::pdu::UserData;
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// An SMS-SUBMIT TPDU, either built for sending or read back from storage
#[derive(Clone, Debug, PartialEq)]
pub struct SmsSubmit {
    pub smsc: Option<Address>,
    pub reference: u8,
    pub destination: Address,
    pub protocol_id: u8,
    pub data_coding: DataCoding,
    pub validity: Option<ValidityPeriod>,
    pub request_status_report: bool,
    pub reject_duplicates: bool,
    pub user_data: UserData,
}

impl SmsSubmit {
    pub fn text(&self) -> &str {
        &self.user_data.text
    }

    pub fn first_octet(&self) -> FirstOctet {
        let mut first = FirstOctet::submit();
        if self.request_status_report {
            first = first.with_status_report_request();
        }
        if self.reject_duplicates {
            first = first.with_reject_duplicates();
        }
        if self.user_data.header.is_some() {
            first = first.with_udhi();
        }
        if let Some(validity) = &self.validity {
            first = first.with_validity_format(validity.format());
        }
        first
    }
}

impl Encodable for SmsSubmit {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), PduError> {
        Address::encode_smsc(self.smsc.as_ref(), buf);
        buf.put_u8(self.first_octet().to_byte());
        buf.put_u8(self.reference);
        self.destination.encode(buf);
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.data_coding.to_byte());
        if let Some(validity) = &self.validity {
            validity.encode(buf)?;
        }
        self.user_data.encode(buf, self.data_coding.alphabet)
    }
}

impl Decodable for SmsSubmit {
    fn message_type() -> MessageTypeIndicator {
        MessageTypeIndicator::Submit
    }

    fn decode(header: TpduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, PduError> {
        Self::validate_header(&header)?;
        let first = header.first_octet;

        let reference = decode_u8(buf)?;
        let destination = Address::decode(buf)?;
        let protocol_id = decode_u8(buf)?;
        let data_coding = DataCoding::from_byte(decode_u8(buf)?);
        let validity = match first.validity_format {
            ValidityPeriodFormat::NotPresent => None,
            ValidityPeriodFormat::Relative => {
                Some(ValidityPeriod::Relative(relative_duration(decode_u8(buf)?)))
            }
            ValidityPeriodFormat::Absolute => {
                Some(ValidityPeriod::Absolute(SmsTimestamp::decode(buf)?))
            }
            ValidityPeriodFormat::Enhanced => {
                let mut raw = [0u8; 7];
                raw.copy_from_slice(&decode_bytes(buf, 7, "validity_period")?);
                Some(ValidityPeriod::Enhanced(raw))
            }
        };
        let user_data = UserData::decode(buf, data_coding.alphabet, first.udhi)?;

        Ok(SmsSubmit {
            smsc: header.smsc,
            reference,
            destination,
            protocol_id,
            data_coding,
            validity,
            request_status_report: first.status_report,
            reject_duplicates: first.bit2,
            user_data,
        })
    }
}

/// Knobs for [`encode_submit`]
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitOptions {
    /// SMSC to prefix; `None` leaves the modem to use the SIM's
    pub smsc: Option<String>,
    pub validity: Option<ValidityPeriod>,
    /// Class 0 message, displayed and not stored
    pub flash: bool,
    pub request_status_report: bool,
    pub reject_duplicates: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            smsc: None,
            validity: None,
            flash: false,
            request_status_report: true,
            reject_duplicates: false,
        }
    }
}

/// One ready-to-send PDU
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPdu {
    pub octets: Bytes,
    /// Length excluding the SMSC prefix, the value given to `AT+CMGS=`
    pub tpdu_length: usize,
    /// TP-MR written into this PDU
    pub reference: u8,
}

impl EncodedPdu {
    pub fn to_hex(&self) -> String {
        crate::codec::to_hex(&self.octets)
    }
}

/// Encodes `text` for `number` as one or more SMS-SUBMIT PDUs.
///
/// The default alphabet is used when every character fits, UCS2 otherwise.
/// Multipart messages share `reference` both as concatenation reference and
/// as TP-MR.
pub fn encode_submit(
    number: &str,
    text: &str,
    reference: u8,
    options: &SubmitOptions,
) -> Result<Vec<EncodedPdu>, PduError> {
    let destination = Address::parse(number)?;
    let smsc = options.smsc.as_deref().map(Address::parse).transpose()?;

    let alphabet = if gsm7::is_representable(text) {
        Alphabet::Gsm7
    } else {
        Alphabet::Ucs2
    };
    let mut data_coding = DataCoding::new(alphabet);
    if options.flash {
        data_coding = data_coding.with_class(MessageClass::Flash);
    }

    let segments = split_text(text, alphabet);
    let total = u8::try_from(segments.len()).map_err(|_| PduError::TooManySegments(segments.len()))?;

    segments
        .into_iter()
        .enumerate()
        .map(|(index, segment)| {
            let mut user_data = UserData::new(segment);
            if total > 1 {
                user_data = user_data.with_header(UserDataHeader::concat(
                    reference,
                    total,
                    index as u8 + 1,
                ));
            }
            let submit = SmsSubmit {
                smsc: smsc.clone(),
                reference,
                destination: destination.clone(),
                protocol_id: 0,
                data_coding,
                validity: options.validity,
                request_status_report: options.request_status_report,
                reject_duplicates: options.reject_duplicates,
                user_data,
            };
            let octets = submit.to_bytes()?;
            let smsc_len = octets.first().map_or(1, |&len| len as usize + 1);
            Ok(EncodedPdu {
                tpdu_length: octets.len() - smsc_len,
                octets,
                reference,
            })
        })
        .collect()
}

/// Capacity units a character takes: septets for the default alphabet,
/// octets for UCS2.
fn unit_width(c: char, alphabet: Alphabet) -> usize {
    match alphabet {
        Alphabet::Gsm7 => gsm7::char_width(c).unwrap_or(1),
        Alphabet::EightBit => 1,
        Alphabet::Ucs2 => c.len_utf16() * 2,
    }
}

/// Splits `text` into segment texts. Whole characters are never divided, so
/// escape pairs and surrogate pairs stay together.
pub fn split_text(text: &str, alphabet: Alphabet) -> Vec<String> {
    let total: usize = text.chars().map(|c| unit_width(c, alphabet)).sum();
    if total <= alphabet.single_capacity() {
        return vec![text.to_string()];
    }

    let capacity = alphabet.segment_capacity();

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut used = 0;
    for c in text.chars() {
        let width = unit_width(c, alphabet);
        if used + width > capacity {
            segments.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += width;
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_pdu, to_hex};
    use crate::pdu::DecodedPdu;
    use std::time::Duration;

    #[test]
    fn encodes_default_alphabet_submit() {
        let pdus = encode_submit("+0123456789", "Hellò wor£d!", 0x8E, &SubmitOptions::default())
            .unwrap();
        assert_eq!(pdus.len(), 1);
        assert_eq!(
            pdus[0].to_hex(),
            "00218E0A91103254769800000CC8329B8D00DDDFF2003904"
        );
        assert_eq!(pdus[0].tpdu_length, 23);
        assert_eq!(pdus[0].reference, 142);
    }

    #[test]
    fn encodes_ucs2_submit() {
        let pdus =
            encode_submit("+0123456789", "Helló worłd!", 0x8D, &SubmitOptions::default()).unwrap();
        assert_eq!(
            to_hex(&pdus[0].octets),
            "00218D0A91103254769800081800480065006C006C00F300200077006F0072014200640021"
        );
        assert_eq!(pdus[0].tpdu_length, 36);
    }

    #[test]
    fn submit_decodes_back_to_what_was_sent() {
        let pdus = encode_submit("+0123456789", "Hello world!", 1, &SubmitOptions::default())
            .unwrap();
        let DecodedPdu::Submit(submit) = decode_pdu(&pdus[0].octets).unwrap() else {
            panic!("expected submit");
        };
        assert_eq!(submit.destination.as_str(), "+0123456789");
        assert_eq!(submit.text(), "Hello world!");
        assert_eq!(submit.reference, 1);
        assert_eq!(submit.data_coding.alphabet, Alphabet::Gsm7);
    }

    #[test]
    fn ucs2_submit_decodes_back_to_what_was_sent() {
        let text = "Привет, мир! \u{1F600}";
        let pdus = encode_submit("+27820001111", text, 200, &SubmitOptions::default()).unwrap();
        assert_eq!(pdus.len(), 1);
        let DecodedPdu::Submit(submit) = decode_pdu(&pdus[0].octets).unwrap() else {
            panic!("expected submit");
        };
        assert_eq!(submit.destination.as_str(), "+27820001111");
        assert_eq!(submit.text(), text);
        assert_eq!(submit.reference, 200);
        assert_eq!(submit.data_coding.alphabet, Alphabet::Ucs2);
    }

    #[test]
    fn multipart_shares_reference() {
        let text = "a".repeat(200);
        let pdus = encode_submit("+0123456789", &text, 0x8F, &SubmitOptions::default()).unwrap();
        assert_eq!(pdus.len(), 2);
        for (index, pdu) in pdus.iter().enumerate() {
            let hex = pdu.to_hex();
            // First octet carries UDHI, TP-MR is the shared reference
            assert_eq!(&hex[2..6], "618F");
            assert!(hex.contains(&format!("0500038F020{}", index + 1)));
        }

        let DecodedPdu::Submit(first) = decode_pdu(&pdus[0].octets).unwrap() else {
            panic!("expected submit");
        };
        assert_eq!(first.text().len(), 153);
        let DecodedPdu::Submit(second) = decode_pdu(&pdus[1].octets).unwrap() else {
            panic!("expected submit");
        };
        assert_eq!(second.text().len(), 47);
    }

    #[test]
    fn split_never_breaks_escape_pairs() {
        // 152 plain septets then a two-septet euro sign
        let text = format!("{}€{}", "a".repeat(152), "b".repeat(10));
        let segments = split_text(&text, Alphabet::Gsm7);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "a".repeat(152));
        assert!(segments[1].starts_with('€'));
    }

    #[test]
    fn split_never_breaks_surrogate_pairs() {
        let text = format!("{}\u{1F600}{}", "ж".repeat(66), "ж".repeat(3));
        let segments = split_text(&text, Alphabet::Ucs2);
        assert_eq!(segments, vec!["ж".repeat(66), "\u{1F600}жжж".to_string()]);
    }

    #[test]
    fn boundary_lengths_stay_single() {
        assert_eq!(split_text(&"a".repeat(160), Alphabet::Gsm7).len(), 1);
        assert_eq!(split_text(&"a".repeat(161), Alphabet::Gsm7).len(), 2);
        assert_eq!(split_text(&"ж".repeat(70), Alphabet::Ucs2).len(), 1);
        assert_eq!(split_text(&"ж".repeat(71), Alphabet::Ucs2).len(), 2);
        assert_eq!(split_text("", Alphabet::Gsm7), vec![String::new()]);
    }

    #[test]
    fn options_shape_first_octet_and_dcs() {
        let options = SubmitOptions {
            validity: Some(ValidityPeriod::Relative(Duration::from_secs(12 * 3600))),
            flash: true,
            reject_duplicates: true,
            smsc: Some("+2782913593".to_string()),
            ..SubmitOptions::default()
        };
        let pdus = encode_submit("+0123456789", "hi", 1, &options).unwrap();
        let DecodedPdu::Submit(submit) = decode_pdu(&pdus[0].octets).unwrap() else {
            panic!("expected submit");
        };
        assert_eq!(submit.first_octet().to_byte(), 0x35);
        assert_eq!(submit.data_coding.class, Some(MessageClass::Flash));
        assert_eq!(submit.smsc.unwrap().as_str(), "+2782913593");
        assert_eq!(
            submit.validity,
            Some(ValidityPeriod::Relative(Duration::from_secs(12 * 3600)))
        );
        // 07 91 + 5 octets of SMSC are not counted
        assert_eq!(pdus[0].tpdu_length, pdus[0].octets.len() - 7);
    }

    #[test]
    fn rejects_bad_destination() {
        assert!(matches!(
            encode_submit("", "hi", 0, &SubmitOptions::default()),
            Err(PduError::Address(_))
        ));
    }
}
