// ABOUTME: Type-of-address octet for TPDU addresses: extension bit, type of number, numbering plan
// ABOUTME: Wire values follow 3GPP TS 23.040 section 9.1.2.5

use num_enum::TryFromPrimitive;
use std::fmt;

/// Type of number, bits 6-4 of the type-of-address octet
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum TypeOfNumber {
    #[default]
    Unknown = 0b000,
    International = 0b001,
    National = 0b010,
    NetworkSpecific = 0b011,
    Subscriber = 0b100,
    Alphanumeric = 0b101,
    Abbreviated = 0b110,
    Reserved = 0b111,
}

/// Numbering plan identification, bits 3-0 of the type-of-address octet
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum NumberingPlan {
    #[default]
    Unknown = 0b0000,
    Isdn = 0b0001,
    Data = 0b0011,
    Telex = 0b0100,
    ServiceCentre = 0b0101,
    National = 0b1000,
    Private = 0b1001,
    Ermes = 0b1010,
    Reserved = 0b1111,
}

/// Decoded type-of-address octet
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeOfAddress {
    pub ton: TypeOfNumber,
    pub npi: NumberingPlan,
}

impl TypeOfAddress {
    /// `+` prefixed numbers: 0x91
    pub const INTERNATIONAL: Self = Self {
        ton: TypeOfNumber::International,
        npi: NumberingPlan::Isdn,
    };

    /// Bare digit strings: 0xA1
    pub const NATIONAL: Self = Self {
        ton: TypeOfNumber::National,
        npi: NumberingPlan::Isdn,
    };

    /// Sender names packed with the default alphabet: 0xD0
    pub const ALPHANUMERIC: Self = Self {
        ton: TypeOfNumber::Alphanumeric,
        npi: NumberingPlan::Unknown,
    };

    pub fn new(ton: TypeOfNumber, npi: NumberingPlan) -> Self {
        Self { ton, npi }
    }

    /// Parses the wire octet. Unassigned numbering plans decode as `Unknown`
    /// since devices are known to emit them for short codes.
    pub fn from_byte(value: u8) -> Self {
        let ton = TypeOfNumber::try_from((value >> 4) & 0x07).unwrap_or_default();
        let npi = NumberingPlan::try_from(value & 0x0F).unwrap_or_default();
        Self { ton, npi }
    }

    /// Wire octet, always with the extension bit set
    pub fn to_byte(&self) -> u8 {
        0x80 | ((self.ton as u8) << 4) | (self.npi as u8)
    }

    pub fn is_alphanumeric(&self) -> bool {
        self.ton == TypeOfNumber::Alphanumeric
    }
}

impl fmt::Display for TypeOfAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x} ({:?}/{:?})", self.to_byte(), self.ton, self.npi)
    }
}
