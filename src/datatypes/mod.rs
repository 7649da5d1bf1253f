// ABOUTME: Strongly-typed TPDU field types shared by the PDU encoders and decoders
// ABOUTME: Re-exports addresses, coding schemes, timestamps, headers and status values

mod address;
mod data_coding;
mod delivery_status;
mod first_octet;
pub mod gsm7;
mod timestamp;
mod type_of_address;
mod udh;
mod validity;

pub use address::{Address, AddressError, decode_semi_octets, encode_semi_octets};
pub use data_coding::{Alphabet, DataCoding, MessageClass};
pub use delivery_status::DeliveryStatus;
pub use first_octet::{FirstOctet, MessageTypeIndicator, ValidityPeriodFormat};
pub use timestamp::{SmsTimestamp, TimestampError};
pub use type_of_address::{NumberingPlan, TypeOfAddress, TypeOfNumber};
pub use udh::{CONCAT_HEADER_LEN, ConcatInfo, InformationElement, UserDataHeader};
pub use validity::{ValidityPeriod, relative_duration, relative_octet};
