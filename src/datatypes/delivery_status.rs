// ABOUTME: TP-Status of an SMS-STATUS-REPORT mapped onto a small closed set of outcomes
// ABOUTME: Ranges follow 3GPP TS 23.040 section 9.2.3.15

/// Outcome reported by the service centre for a submitted message
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    /// 0x00: received by the recipient
    Delivered,
    /// 0x01: forwarded, delivery not confirmed
    Forwarded,
    /// 0x02: replaced by the service centre
    Replaced,
    /// 0x20-0x3F: temporary error, the service centre is still trying
    Pending,
    /// 0x40-0x5F: permanent error, no further attempts
    PermanentFailure,
    /// 0x60-0x7F: temporary error, the service centre gave up
    TemporaryFailure,
    /// Reserved or service-centre specific values
    Unknown,
}

impl DeliveryStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => DeliveryStatus::Delivered,
            0x01 => DeliveryStatus::Forwarded,
            0x02 => DeliveryStatus::Replaced,
            0x20..=0x3F => DeliveryStatus::Pending,
            0x40..=0x5F => DeliveryStatus::PermanentFailure,
            0x60..=0x7F => DeliveryStatus::TemporaryFailure,
            _ => DeliveryStatus::Unknown,
        }
    }

    /// The transaction completed successfully
    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Forwarded | DeliveryStatus::Replaced
        )
    }

    /// No further report is expected for this message
    pub fn is_final(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}
