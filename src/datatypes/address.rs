// ABOUTME: TPDU address fields: BCD semi-octet phone numbers and 7-bit packed alphanumeric senders
// ABOUTME: Handles the destination/originator form and the SMSC form, which count length differently

use crate::codec::{PduError, decode_bytes, decode_u8};
use crate::datatypes::gsm7;
use crate::datatypes::{NumberingPlan, TypeOfAddress, TypeOfNumber};
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

/// Longest alphanumeric sender the address field can carry
pub const MAX_ALPHANUMERIC_LEN: usize = 11;
/// Longest numeric address (20 semi-octets)
pub const MAX_DIGITS: usize = 20;

/// A phone number or alphanumeric sender as carried inside a TPDU
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Display form; international numbers keep their leading `+`
    value: String,
    toa: TypeOfAddress,
}

impl Address {
    /// Classifies `value` and picks the matching type-of-address:
    /// `+digits` is international, digits are national, anything else is an
    /// alphanumeric sender that must fit the default alphabet.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        if value.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(digits) = value.strip_prefix('+') {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                check_digit_count(digits)?;
                return Ok(Self {
                    value: value.to_string(),
                    toa: TypeOfAddress::INTERNATIONAL,
                });
            }
        } else if value.chars().all(|c| c.is_ascii_digit()) {
            check_digit_count(value)?;
            return Ok(Self {
                value: value.to_string(),
                toa: TypeOfAddress::NATIONAL,
            });
        } else if value.chars().all(|c| c.is_ascii_digit() || c == '*' || c == '#') {
            check_digit_count(value)?;
            return Ok(Self {
                value: value.to_string(),
                toa: TypeOfAddress::new(TypeOfNumber::Unknown, NumberingPlan::Isdn),
            });
        }

        if value.chars().count() > MAX_ALPHANUMERIC_LEN {
            return Err(AddressError::TooLong {
                max_len: MAX_ALPHANUMERIC_LEN,
                actual_len: value.chars().count(),
            });
        }
        if let Some(c) = value.chars().find(|&c| gsm7::char_width(c).is_none()) {
            return Err(AddressError::InvalidCharacter(c));
        }

        Ok(Self {
            value: value.to_string(),
            toa: TypeOfAddress::ALPHANUMERIC,
        })
    }

    /// Builds an address from parts already validated by a decoder
    fn from_parts(value: String, toa: TypeOfAddress) -> Self {
        Self { value, toa }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn type_of_address(&self) -> TypeOfAddress {
        self.toa
    }

    pub fn is_international(&self) -> bool {
        self.toa.ton == TypeOfNumber::International
    }

    /// Digits or characters without the display `+`
    fn payload(&self) -> &str {
        if self.is_international() {
            self.value.trim_start_matches('+')
        } else {
            &self.value
        }
    }

    /// Encodes the destination/originator form: the length octet counts
    /// useful semi-octets.
    pub fn encode(&self, buf: &mut BytesMut) {
        if self.toa.is_alphanumeric() {
            let septets = gsm7::encode(&self.value).unwrap_or_default();
            let packed = gsm7::pack(&septets, 0);
            buf.put_u8((septets.len() * 7).div_ceil(4) as u8);
            buf.put_u8(self.toa.to_byte());
            buf.put_slice(&packed);
        } else {
            let payload = self.payload();
            buf.put_u8(payload.len() as u8);
            buf.put_u8(self.toa.to_byte());
            buf.put_slice(&encode_semi_octets(payload));
        }
    }

    /// Encodes the SMSC form: the length octet counts octets including the
    /// type-of-address. `None` encodes the single `00` octet meaning "use
    /// the SMSC stored on the SIM".
    pub fn encode_smsc(smsc: Option<&Address>, buf: &mut BytesMut) {
        match smsc {
            Some(address) => {
                let bcd = encode_semi_octets(address.payload());
                buf.put_u8(bcd.len() as u8 + 1);
                buf.put_u8(address.toa.to_byte());
                buf.put_slice(&bcd);
            }
            None => buf.put_u8(0x00),
        }
    }

    /// Decodes the destination/originator form
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, PduError> {
        let semi_octets = decode_u8(buf)? as usize;
        let toa = TypeOfAddress::from_byte(decode_u8(buf)?);
        let octets = decode_bytes(buf, semi_octets.div_ceil(2), "address")?;

        if toa.is_alphanumeric() {
            let chars = semi_octets * 4 / 7;
            let septets = gsm7::unpack(&octets, chars);
            return Ok(Self::from_parts(gsm7::decode(&septets), toa));
        }

        let digits = decode_semi_octets(&octets, Some(semi_octets));
        Ok(Self::with_prefix(digits, toa))
    }

    /// Decodes the SMSC form; a zero length yields `None`
    pub fn decode_smsc(buf: &mut Cursor<&[u8]>) -> Result<Option<Self>, PduError> {
        let length = decode_u8(buf)? as usize;
        if length == 0 {
            return Ok(None);
        }
        let toa = TypeOfAddress::from_byte(decode_u8(buf)?);
        let octets = decode_bytes(buf, length - 1, "smsc")?;
        let digits = decode_semi_octets(&octets, None);
        Ok(Some(Self::with_prefix(digits, toa)))
    }

    fn with_prefix(digits: String, toa: TypeOfAddress) -> Self {
        let value = if toa.ton == TypeOfNumber::International {
            format!("+{digits}")
        } else {
            digits
        };
        Self::from_parts(value, toa)
    }
}

fn check_digit_count(digits: &str) -> Result<(), AddressError> {
    if digits.len() > MAX_DIGITS {
        return Err(AddressError::TooLong {
            max_len: MAX_DIGITS,
            actual_len: digits.len(),
        });
    }
    Ok(())
}

fn digit_nibble(c: char) -> u8 {
    match c {
        '*' => 0x0A,
        '#' => 0x0B,
        'a' | 'A' => 0x0C,
        'b' | 'B' => 0x0D,
        'c' | 'C' => 0x0E,
        d => d.to_digit(10).map(|v| v as u8).unwrap_or(0x0F),
    }
}

fn nibble_digit(n: u8) -> Option<char> {
    match n {
        0..=9 => Some((b'0' + n) as char),
        0x0A => Some('*'),
        0x0B => Some('#'),
        0x0C => Some('a'),
        0x0D => Some('b'),
        0x0E => Some('c'),
        _ => None,
    }
}

/// Packs digits two per octet, low nibble first, padding an odd tail with `F`
pub fn encode_semi_octets(digits: &str) -> Vec<u8> {
    let nibbles: Vec<u8> = digits.chars().map(digit_nibble).collect();
    nibbles
        .chunks(2)
        .map(|pair| {
            let low = pair[0];
            let high = pair.get(1).copied().unwrap_or(0x0F);
            (high << 4) | low
        })
        .collect()
}

/// Unpacks swapped semi-octets, stopping at the `F` pad or after `limit` digits
pub fn decode_semi_octets(octets: &[u8], limit: Option<usize>) -> String {
    let mut digits = String::with_capacity(octets.len() * 2);
    for octet in octets {
        for nibble in [octet & 0x0F, octet >> 4] {
            if limit.is_some_and(|l| digits.len() >= l) {
                return digits;
            }
            match nibble_digit(nibble) {
                Some(d) => digits.push(d),
                None => return digits,
            }
        }
    }
    digits
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:?}, {})", self.value, self.toa)
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

/// Errors raised when building an address from user input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Address is empty")]
    Empty,

    #[error("Address too long: {actual_len} characters (max {max_len})")]
    TooLong { max_len: usize, actual_len: usize },

    #[error("Character {0:?} cannot be encoded in an alphanumeric address")]
    InvalidCharacter(char),
}
