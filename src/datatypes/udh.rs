// ABOUTME: User data header parsing and building, with typed access to concatenation elements
// ABOUTME: Supports the 8-bit (IEI 0x00) and 16-bit (IEI 0x08) reference concatenation forms

use crate::codec::PduError;
use bytes::{BufMut, BytesMut};

/// IEI for concatenated short messages, 8-bit reference
pub const IEI_CONCAT_8BIT: u8 = 0x00;
/// IEI for concatenated short messages, 16-bit reference
pub const IEI_CONCAT_16BIT: u8 = 0x08;

/// Octets taken by a UDHL plus one 8-bit concatenation element
pub const CONCAT_HEADER_LEN: usize = 6;

/// One information element inside a user data header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InformationElement {
    pub id: u8,
    pub data: Vec<u8>,
}

/// Position of one segment inside a multipart message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConcatInfo {
    pub reference: u16,
    pub total: u8,
    /// 1-based
    pub sequence: u8,
}

/// User data header: the information elements found before the text
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserDataHeader {
    pub elements: Vec<InformationElement>,
}

impl UserDataHeader {
    /// Header holding just an 8-bit reference concatenation element
    pub fn concat(reference: u8, total: u8, sequence: u8) -> Self {
        Self {
            elements: vec![InformationElement {
                id: IEI_CONCAT_8BIT,
                data: vec![reference, total, sequence],
            }],
        }
    }

    /// Length including the UDHL octet itself
    pub fn encoded_len(&self) -> usize {
        1 + self.elements.iter().map(|ie| 2 + ie.data.len()).sum::<usize>()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8((self.encoded_len() - 1) as u8);
        for ie in &self.elements {
            buf.put_u8(ie.id);
            buf.put_u8(ie.data.len() as u8);
            buf.put_slice(&ie.data);
        }
    }

    /// Parses the header at the start of `user_data`, returning it with the
    /// number of octets consumed (UDHL included).
    pub fn decode(user_data: &[u8]) -> Result<(Self, usize), PduError> {
        let Some(&udhl) = user_data.first() else {
            return Err(PduError::Incomplete);
        };
        let end = 1 + udhl as usize;
        if user_data.len() < end {
            return Err(PduError::FieldValidation {
                field: "udh",
                reason: format!("header length {udhl} exceeds user data"),
            });
        }

        let mut elements = Vec::new();
        let mut pos = 1;
        while pos + 2 <= end {
            let id = user_data[pos];
            let len = user_data[pos + 1] as usize;
            let start = pos + 2;
            if start + len > end {
                return Err(PduError::FieldValidation {
                    field: "udh",
                    reason: format!("element {id:#04x} overruns header"),
                });
            }
            elements.push(InformationElement {
                id,
                data: user_data[start..start + len].to_vec(),
            });
            pos = start + len;
        }

        Ok((Self { elements }, end))
    }

    /// Concatenation info from the first well-formed concatenation element
    pub fn concat_info(&self) -> Option<ConcatInfo> {
        self.elements.iter().find_map(|ie| match (ie.id, ie.data.as_slice()) {
            (IEI_CONCAT_8BIT, &[reference, total, sequence]) => Some(ConcatInfo {
                reference: reference as u16,
                total,
                sequence,
            }),
            (IEI_CONCAT_16BIT, &[hi, lo, total, sequence]) => Some(ConcatInfo {
                reference: u16::from_be_bytes([hi, lo]),
                total,
                sequence,
            }),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_header_bytes() {
        let udh = UserDataHeader::concat(0x8F, 2, 1);
        let mut buf = BytesMut::new();
        udh.encode(&mut buf);
        assert_eq!(buf.to_vec(), vec![0x05, 0x00, 0x03, 0x8F, 0x02, 0x01]);
        assert_eq!(udh.encoded_len(), CONCAT_HEADER_LEN);
    }

    #[test]
    fn decodes_concat_info() {
        let data = [0x05, 0x00, 0x03, 0x72, 0x02, 0x01, 0xAA];
        let (udh, consumed) = UserDataHeader::decode(&data).unwrap();
        assert_eq!(consumed, 6);
        assert_eq!(
            udh.concat_info(),
            Some(ConcatInfo {
                reference: 0x72,
                total: 2,
                sequence: 1
            })
        );
    }

    #[test]
    fn decodes_sixteen_bit_reference() {
        let data = [0x06, 0x08, 0x04, 0x12, 0x34, 0x03, 0x02];
        let (udh, _) = UserDataHeader::decode(&data).unwrap();
        assert_eq!(udh.concat_info().unwrap().reference, 0x1234);
    }

    #[test]
    fn skips_unrelated_elements() {
        // Port addressing element followed by concatenation
        let data = [0x0B, 0x05, 0x04, 0x0B, 0x84, 0x23, 0xF0, 0x00, 0x03, 0x01, 0x01, 0x01];
        let (udh, consumed) = UserDataHeader::decode(&data).unwrap();
        assert_eq!(consumed, 12);
        assert_eq!(udh.elements.len(), 2);
        assert_eq!(udh.concat_info().unwrap().total, 1);
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(UserDataHeader::decode(&[0x05, 0x00, 0x03]).is_err());
        assert!(UserDataHeader::decode(&[]).is_err());
    }
}
