// ABOUTME: TP-VP validity period in its relative, absolute and enhanced forms
// ABOUTME: Relative periods use the stepped 5 minute / 30 minute / day / week octet scale

use crate::codec::PduError;
use crate::datatypes::SmsTimestamp;
use crate::datatypes::ValidityPeriodFormat;
use bytes::{BufMut, BytesMut};
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// How long the service centre keeps trying to deliver a message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidityPeriod {
    Relative(Duration),
    Absolute(SmsTimestamp),
    /// Enhanced format, kept as the raw seven octets
    Enhanced([u8; 7]),
}

impl ValidityPeriod {
    pub fn format(&self) -> ValidityPeriodFormat {
        match self {
            ValidityPeriod::Relative(_) => ValidityPeriodFormat::Relative,
            ValidityPeriod::Absolute(_) => ValidityPeriodFormat::Absolute,
            ValidityPeriod::Enhanced(_) => ValidityPeriodFormat::Enhanced,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), PduError> {
        match self {
            ValidityPeriod::Relative(duration) => buf.put_u8(relative_octet(*duration)?),
            ValidityPeriod::Absolute(ts) => ts.encode(buf),
            ValidityPeriod::Enhanced(raw) => buf.put_slice(raw),
        }
        Ok(())
    }
}

/// Converts a duration to the relative octet, rounding down to the scale step
pub fn relative_octet(duration: Duration) -> Result<u8, PduError> {
    let seconds = duration.as_secs();
    let value = if seconds < 5 * MINUTE {
        return Err(PduError::FieldValidation {
            field: "validity_period",
            reason: "shorter than 5 minutes".to_string(),
        });
    } else if seconds <= 12 * HOUR {
        seconds / (5 * MINUTE) - 1
    } else if seconds <= DAY {
        (seconds - 12 * HOUR) / (30 * MINUTE) + 143
    } else if seconds <= 30 * DAY {
        seconds / DAY + 166
    } else if seconds <= 63 * WEEK {
        seconds / WEEK + 192
    } else {
        return Err(PduError::FieldValidation {
            field: "validity_period",
            reason: "longer than 63 weeks".to_string(),
        });
    };
    Ok(value as u8)
}

/// Converts a relative octet back to its duration
pub fn relative_duration(octet: u8) -> Duration {
    let value = octet as u64;
    let seconds = match octet {
        0..=143 => (value + 1) * 5 * MINUTE,
        144..=167 => 12 * HOUR + (value - 143) * 30 * MINUTE,
        168..=196 => (value - 166) * DAY,
        _ => (value - 192) * WEEK,
    };
    Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_scale_steps() {
        assert_eq!(relative_octet(Duration::from_secs(5 * MINUTE)).unwrap(), 0);
        assert_eq!(relative_octet(Duration::from_secs(12 * HOUR)).unwrap(), 143);
        assert_eq!(relative_octet(Duration::from_secs(DAY)).unwrap(), 167);
        assert_eq!(relative_octet(Duration::from_secs(2 * DAY)).unwrap(), 168);
        assert_eq!(relative_octet(Duration::from_secs(5 * WEEK)).unwrap(), 197);
        assert_eq!(relative_octet(Duration::from_secs(63 * WEEK)).unwrap(), 255);
    }

    #[test]
    fn out_of_range_durations() {
        assert!(relative_octet(Duration::from_secs(60)).is_err());
        assert!(relative_octet(Duration::from_secs(64 * WEEK)).is_err());
    }

    #[test]
    fn octet_to_duration() {
        assert_eq!(relative_duration(0), Duration::from_secs(5 * MINUTE));
        assert_eq!(relative_duration(167), Duration::from_secs(DAY));
        assert_eq!(relative_duration(170), Duration::from_secs(4 * DAY));
        assert_eq!(relative_duration(255), Duration::from_secs(63 * WEEK));
    }
}
