// ABOUTME: TP-UDL / TP-UD handling shared by every message type
// ABOUTME: Splits off the user data header and converts the body to text per alphabet

use crate::codec::{PduError, decode_bytes, decode_u8};
use crate::datatypes::{Alphabet, ConcatInfo, UserDataHeader, gsm7};
use bytes::{BufMut, BytesMut};
use std::io::Cursor;

/// Decoded user data: optional header plus the message text
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserData {
    pub header: Option<UserDataHeader>,
    pub text: String,
}

impl UserData {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            header: None,
            text: text.into(),
        }
    }

    pub fn with_header(mut self, header: UserDataHeader) -> Self {
        self.header = Some(header);
        self
    }

    pub fn concat_info(&self) -> Option<ConcatInfo> {
        self.header.as_ref().and_then(UserDataHeader::concat_info)
    }

    /// Reads TP-UDL and TP-UD.
    pub fn decode(
        buf: &mut Cursor<&[u8]>,
        alphabet: Alphabet,
        has_header: bool,
    ) -> Result<Self, PduError> {
        let udl = decode_u8(buf)? as usize;
        let octet_len = match alphabet {
            Alphabet::Gsm7 => (udl * 7).div_ceil(8),
            Alphabet::EightBit | Alphabet::Ucs2 => udl,
        };
        let octets = decode_bytes(buf, octet_len, "user_data")?;

        let (header, header_len) = if has_header && !octets.is_empty() {
            let (header, consumed) = UserDataHeader::decode(&octets)?;
            (Some(header), consumed)
        } else {
            (None, 0)
        };

        let text = match alphabet {
            Alphabet::Gsm7 => {
                let septets = gsm7::unpack(&octets, udl);
                let skip = (header_len * 8).div_ceil(7).min(septets.len());
                gsm7::decode(&septets[skip..])
            }
            Alphabet::Ucs2 => decode_ucs2(&octets[header_len..]),
            // Latin-1 view of the raw octets
            Alphabet::EightBit => octets[header_len..].iter().map(|&b| b as char).collect(),
        };

        Ok(Self { header, text })
    }

    /// Writes TP-UDL and TP-UD in the given alphabet
    pub fn encode(&self, buf: &mut BytesMut, alphabet: Alphabet) -> Result<(), PduError> {
        let mut header_bytes = BytesMut::new();
        if let Some(header) = &self.header {
            header.encode(&mut header_bytes);
        }
        let header_len = header_bytes.len();

        match alphabet {
            Alphabet::Gsm7 => {
                let septets = gsm7::encode(&self.text).map_err(|c| PduError::FieldValidation {
                    field: "user_data",
                    reason: format!("{c:?} is not in the GSM 7-bit alphabet"),
                })?;
                let header_septets = (header_len * 8).div_ceil(7);
                let fill_bits = (header_septets * 7 - header_len * 8) as u8;
                check_length(header_septets + septets.len(), 160)?;
                buf.put_u8((header_septets + septets.len()) as u8);
                buf.put_slice(&header_bytes);
                buf.put_slice(&gsm7::pack(&septets, fill_bits));
            }
            Alphabet::Ucs2 => {
                let body = encode_ucs2(&self.text);
                check_length(header_len + body.len(), 140)?;
                buf.put_u8((header_len + body.len()) as u8);
                buf.put_slice(&header_bytes);
                buf.put_slice(&body);
            }
            Alphabet::EightBit => {
                let body = self
                    .text
                    .chars()
                    .map(|c| u8::try_from(c as u32))
                    .collect::<Result<Vec<u8>, _>>()
                    .map_err(|_| PduError::FieldValidation {
                        field: "user_data",
                        reason: "8-bit data must be Latin-1".to_string(),
                    })?;
                check_length(header_len + body.len(), 140)?;
                buf.put_u8((header_len + body.len()) as u8);
                buf.put_slice(&header_bytes);
                buf.put_slice(&body);
            }
        }
        Ok(())
    }
}

fn check_length(len: usize, max: usize) -> Result<(), PduError> {
    if len > max {
        return Err(PduError::FieldValidation {
            field: "user_data",
            reason: format!("{len} units exceed the {max} unit limit"),
        });
    }
    Ok(())
}

/// UTF-16 big endian; a trailing odd octet is ignored
pub fn decode_ucs2(octets: &[u8]) -> String {
    let units: Vec<u16> = octets
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

pub fn encode_ucs2(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}
