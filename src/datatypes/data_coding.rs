// ABOUTME: TP-DCS data coding scheme: user data alphabet, message class and compression flag
// ABOUTME: Covers the general coding groups and the 0xF0 data coding/message class group

use std::fmt;

/// Alphabet the user data is encoded with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Alphabet {
    /// GSM 03.38 default alphabet, packed 7-bit
    #[default]
    Gsm7,
    /// Raw 8-bit data
    EightBit,
    /// UCS2 / UTF-16 big endian
    Ucs2,
}

impl Alphabet {
    /// Bits 3-2 of a general-group DCS octet
    fn to_bits(self) -> u8 {
        match self {
            Alphabet::Gsm7 => 0x00,
            Alphabet::EightBit => 0x04,
            Alphabet::Ucs2 => 0x08,
        }
    }

    /// Single-message capacity in characters of this alphabet's native unit
    /// (septets for 7-bit, octets otherwise)
    pub fn single_capacity(self) -> usize {
        match self {
            Alphabet::Gsm7 => 160,
            Alphabet::EightBit | Alphabet::Ucs2 => 140,
        }
    }

    /// Capacity per segment once the six-octet concatenation header is present
    pub fn segment_capacity(self) -> usize {
        match self {
            Alphabet::Gsm7 => 153,
            Alphabet::EightBit | Alphabet::Ucs2 => 134,
        }
    }
}

/// Message class, bits 1-0 when class is meaningful
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageClass {
    /// Class 0: shown immediately, not stored ("flash")
    Flash = 0,
    /// Class 1: mobile equipment specific
    MobileEquipment = 1,
    /// Class 2: SIM specific
    SimSpecific = 2,
    /// Class 3: terminal equipment specific
    TerminalEquipment = 3,
}

impl MessageClass {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageClass::Flash,
            1 => MessageClass::MobileEquipment,
            2 => MessageClass::SimSpecific,
            _ => MessageClass::TerminalEquipment,
        }
    }
}

/// Decoded TP-DCS octet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct DataCoding {
    pub alphabet: Alphabet,
    pub class: Option<MessageClass>,
    pub compressed: bool,
}

impl DataCoding {
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            class: None,
            compressed: false,
        }
    }

    pub fn with_class(mut self, class: MessageClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Interprets a raw DCS octet. Reserved coding groups fall back to the
    /// default alphabet so the text still decodes.
    pub fn from_byte(value: u8) -> Self {
        match value >> 4 {
            // General data coding and automatic deletion groups
            0x0..=0x7 => {
                let alphabet = match value & 0x0C {
                    0x04 => Alphabet::EightBit,
                    0x08 => Alphabet::Ucs2,
                    _ => Alphabet::Gsm7,
                };
                Self {
                    alphabet,
                    class: (value & 0x10 != 0).then(|| MessageClass::from_bits(value)),
                    compressed: value & 0x20 != 0,
                }
            }
            // Message waiting groups
            0xC | 0xD => Self::new(Alphabet::Gsm7),
            0xE => Self::new(Alphabet::Ucs2),
            // Data coding / message class group
            0xF => {
                let alphabet = if value & 0x04 != 0 {
                    Alphabet::EightBit
                } else {
                    Alphabet::Gsm7
                };
                Self::new(alphabet).with_class(MessageClass::from_bits(value))
            }
            _ => Self::default(),
        }
    }

    /// Encodes in the general data coding group
    pub fn to_byte(&self) -> u8 {
        let mut value = self.alphabet.to_bits();
        if let Some(class) = self.class {
            value |= 0x10 | class as u8;
        }
        if self.compressed {
            value |= 0x20;
        }
        value
    }
}

impl fmt::Display for DataCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.alphabet)?;
        if let Some(class) = self.class {
            write!(f, " ({class:?})")?;
        }
        Ok(())
    }
}

impl From<u8> for DataCoding {
    fn from(value: u8) -> Self {
        Self::from_byte(value)
    }
}

impl From<DataCoding> for u8 {
    fn from(data_coding: DataCoding) -> Self {
        data_coding.to_byte()
    }
}
