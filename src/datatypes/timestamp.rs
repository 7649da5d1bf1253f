// ABOUTME: Service-centre timestamps: seven octets of nibble-swapped BCD with a quarter-hour zone
// ABOUTME: Also parses the "yy/MM/dd,hh:mm:ss+zz" form modems print in text mode

use crate::codec::{PduError, decode_bytes};
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

/// A timestamp as carried in SMS-DELIVER, SMS-STATUS-REPORT and absolute
/// validity periods. The zone is kept in quarter hours, as on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SmsTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Offset from UTC in units of 15 minutes
    pub tz_quarter_hours: i8,
}

impl SmsTimestamp {
    pub const ENCODED_LEN: usize = 7;

    /// Creates a timestamp with range validation
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        tz_quarter_hours: i8,
    ) -> Result<Self, TimestampError> {
        let ts = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            tz_quarter_hours,
        };
        ts.validate()?;
        Ok(ts)
    }

    fn validate(&self) -> Result<(), TimestampError> {
        check_range("year", self.year as u32, 2000, 2099)?;
        check_range("month", self.month as u32, 1, 12)?;
        check_range("day", self.day as u32, 1, 31)?;
        check_range("hour", self.hour as u32, 0, 23)?;
        check_range("minute", self.minute as u32, 0, 59)?;
        check_range("second", self.second as u32, 0, 59)?;
        if !(-79..=79).contains(&self.tz_quarter_hours) {
            return Err(TimestampError::InvalidRange {
                field: "timezone",
                value: self.tz_quarter_hours.unsigned_abs() as u32,
                min: 0,
                max: 79,
            });
        }
        Ok(())
    }

    /// UTC offset in minutes
    pub fn utc_offset_minutes(&self) -> i32 {
        self.tz_quarter_hours as i32 * 15
    }

    /// Decodes the seven-octet wire form
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, PduError> {
        let octets = decode_bytes(buf, Self::ENCODED_LEN, "timestamp")?;

        let mut fields = [0u8; 6];
        for (field, &octet) in fields.iter_mut().zip(octets.iter()) {
            *field = swapped_bcd(octet).ok_or_else(|| PduError::FieldValidation {
                field: "timestamp",
                reason: format!("octet {octet:#04x} is not BCD"),
            })?;
        }

        // The zone octet reads as a hex value once swapped, with the sign in
        // the top bit. Some devices put a non-decimal digit in the low nibble;
        // adding 6 carries it back into decimal range before the BCD read.
        let raw = octets[6];
        let zone = (raw << 4) | (raw >> 4);
        let negative = zone & 0x80 != 0;
        let mut magnitude = zone & 0x7F;
        if magnitude & 0x0F > 9 {
            magnitude = magnitude
                .checked_add(0x06)
                .filter(|carried| *carried <= 0x79)
                .ok_or(TimestampError::InvalidRange {
                    field: "timezone",
                    value: u32::from(raw),
                    min: 0,
                    max: 79,
                })?;
        }
        let quarters = ((magnitude >> 4) * 10 + (magnitude & 0x0F)) as i8;
        let tz_quarter_hours = if negative { -quarters } else { quarters };

        let ts = Self {
            year: 2000 + fields[0] as u16,
            month: fields[1],
            day: fields[2],
            hour: fields[3],
            minute: fields[4],
            second: fields[5],
            tz_quarter_hours,
        };
        ts.validate()?;
        Ok(ts)
    }

    /// Encodes the seven-octet wire form
    pub fn encode(&self, buf: &mut BytesMut) {
        let year = (self.year % 100) as u8;
        for value in [year, self.month, self.day, self.hour, self.minute, self.second] {
            buf.put_u8(to_swapped_bcd(value));
        }
        let quarters = self.tz_quarter_hours.unsigned_abs();
        let mut zone = to_swapped_bcd(quarters);
        if self.tz_quarter_hours < 0 {
            zone |= 0x08;
        }
        buf.put_u8(zone);
    }

    /// Parses the text-mode form, e.g. `13/01/28,14:51:42+08`, where the
    /// trailing zone is in quarter hours.
    pub fn parse_text(value: &str) -> Result<Self, TimestampError> {
        let value = value.trim().trim_matches('"');
        if value.len() < 20 || !value.is_ascii() {
            return Err(TimestampError::InvalidFormat(value.to_string()));
        }
        let (clock, zone) = value.split_at(17);
        let number = |range: std::ops::Range<usize>| -> Result<u8, TimestampError> {
            clock[range]
                .parse::<u8>()
                .map_err(|_| TimestampError::InvalidFormat(value.to_string()))
        };
        let tz_quarter_hours = zone
            .parse::<i8>()
            .map_err(|_| TimestampError::InvalidFormat(value.to_string()))?;

        Self::new(
            2000 + number(0..2)? as u16,
            number(3..5)?,
            number(6..8)?,
            number(9..11)?,
            number(12..14)?,
            number(15..17)?,
            tz_quarter_hours,
        )
    }
}

fn swapped_bcd(octet: u8) -> Option<u8> {
    let (tens, units) = (octet & 0x0F, octet >> 4);
    (tens <= 9 && units <= 9).then_some(tens * 10 + units)
}

fn to_swapped_bcd(value: u8) -> u8 {
    ((value % 10) << 4) | (value / 10 % 10)
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), TimestampError> {
    if value < min || value > max {
        return Err(TimestampError::InvalidRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl fmt::Display for SmsTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offset = self.utc_offset_minutes();
        let sign = if offset < 0 { '-' } else { '+' };
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} {}{:02}:{:02}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            sign,
            offset.abs() / 60,
            offset.abs() % 60
        )
    }
}

/// Errors from building or parsing timestamps
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("Invalid timestamp {0:?}")]
    InvalidFormat(String),

    #[error("Timestamp {field} {value} out of range {min}-{max}")]
    InvalidRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}
