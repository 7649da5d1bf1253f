// ABOUTME: First octet of a TPDU: message type indicator and the per-message flag bits
// ABOUTME: Bit layout follows 3GPP TS 23.040 section 9.2.3; flag meaning depends on the message type

use num_enum::TryFromPrimitive;

/// TP-MTI, bits 1-0, as seen by the mobile station
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageTypeIndicator {
    Deliver = 0b00,
    Submit = 0b01,
    StatusReport = 0b10,
    Reserved = 0b11,
}

/// TP-VPF, bits 4-3 of an SMS-SUBMIT
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ValidityPeriodFormat {
    #[default]
    NotPresent = 0b00,
    Enhanced = 0b01,
    Relative = 0b10,
    Absolute = 0b11,
}

impl ValidityPeriodFormat {
    /// Octets the validity period field occupies
    pub fn field_len(self) -> usize {
        match self {
            ValidityPeriodFormat::NotPresent => 0,
            ValidityPeriodFormat::Relative => 1,
            ValidityPeriodFormat::Enhanced | ValidityPeriodFormat::Absolute => 7,
        }
    }
}

/// Decoded first octet
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FirstOctet {
    pub mti: MessageTypeIndicator,
    /// Bit 2: TP-RD on SUBMIT, inverted TP-MMS on DELIVER / STATUS-REPORT
    pub bit2: bool,
    /// Bits 4-3, SUBMIT only
    pub validity_format: ValidityPeriodFormat,
    /// Bit 5: TP-SRR on SUBMIT, TP-SRI on DELIVER, TP-SRQ on STATUS-REPORT
    pub status_report: bool,
    /// Bit 6: TP-UDHI
    pub udhi: bool,
    /// Bit 7: TP-RP
    pub reply_path: bool,
}

impl FirstOctet {
    /// First octet of an outgoing SMS-SUBMIT
    pub fn submit() -> Self {
        Self {
            mti: MessageTypeIndicator::Submit,
            bit2: false,
            validity_format: ValidityPeriodFormat::NotPresent,
            status_report: false,
            udhi: false,
            reply_path: false,
        }
    }

    pub fn with_status_report_request(mut self) -> Self {
        self.status_report = true;
        self
    }

    pub fn with_udhi(mut self) -> Self {
        self.udhi = true;
        self
    }

    pub fn with_validity_format(mut self, format: ValidityPeriodFormat) -> Self {
        self.validity_format = format;
        self
    }

    /// Sets TP-RD: the SMSC rejects a submit duplicating a pending one
    pub fn with_reject_duplicates(mut self) -> Self {
        self.bit2 = true;
        self
    }

    pub fn to_byte(&self) -> u8 {
        let mut value = self.mti as u8;
        if self.bit2 {
            value |= 0x04;
        }
        value |= (self.validity_format as u8) << 3;
        if self.status_report {
            value |= 0x20;
        }
        if self.udhi {
            value |= 0x40;
        }
        if self.reply_path {
            value |= 0x80;
        }
        value
    }

    pub fn from_byte(value: u8) -> Self {
        let mti = MessageTypeIndicator::try_from(value & 0x03).unwrap_or(MessageTypeIndicator::Reserved);
        let validity_format = if mti == MessageTypeIndicator::Submit {
            ValidityPeriodFormat::try_from((value >> 3) & 0x03).unwrap_or_default()
        } else {
            ValidityPeriodFormat::NotPresent
        };
        Self {
            mti,
            bit2: value & 0x04 != 0,
            validity_format,
            status_report: value & 0x20 != 0,
            udhi: value & 0x40 != 0,
            reply_path: value & 0x80 != 0,
        }
    }
}
