// ABOUTME: Session configuration with timing knobs, SIM credentials and SMS mode selection
// ABOUTME: Builder-style setters over sensible defaults, convertible into transceiver settings

use crate::pdu::SubmitOptions;
use crate::transceiver::TransceiverSettings;
use std::time::Duration;

/// Configuration for a modem session
///
/// All timeouts have defaults that suit common USB modems. Slow devices
/// mostly need a longer `command_timeout`; networks with slow service
/// centres need a longer `sms_send_timeout`.
///
/// # Example
///
/// ```rust
/// use gsmmodem::client::ModemConfig;
/// use std::time::Duration;
///
/// let config = ModemConfig::default()
///     .with_pin("1234")
///     .with_command_timeout(Duration::from_secs(5))
///     .with_text_mode(true);
/// assert_eq!(config.pin.as_deref(), Some("1234"));
/// ```
#[derive(Debug, Clone)]
pub struct ModemConfig {
    /// Wait for the terminal line of an ordinary command (default: 10 seconds)
    pub command_timeout: Duration,

    /// Wait for `+CMGS` after an SMS payload has been written (default: 35 seconds)
    ///
    /// The modem only answers once the network has accepted the message.
    pub sms_send_timeout: Duration,

    /// Default wait for a status report when sending with a report requested
    /// (default: 15 seconds)
    pub delivery_timeout: Duration,

    /// Interval of the `AT+CLCC` call poller (default: 500 ms)
    pub polling_interval: Duration,

    /// Pause between `ATD` and the first call list poll on modems without call
    /// events (default: 1 second)
    pub dial_settle_delay: Duration,

    /// Longest wait for a dialled call to show up (default: 10 seconds)
    pub dial_timeout: Duration,

    /// After a timeout, how long the next command waits for the late reply
    /// to drain (default: 1 second)
    pub resync_window: Duration,

    /// Capacity of the notification queue (default: 64)
    ///
    /// Notifications arriving while the queue is full are dropped.
    pub notification_queue: usize,

    /// Retries for commands answered with "SIM busy" (default: 3)
    pub sim_busy_retries: u32,

    /// Delay before the first SIM-busy retry; later retries wait longer
    /// (default: 1 second)
    pub sim_busy_delay: Duration,

    /// SIM PIN, sent when the SIM asks for one
    pub pin: Option<String>,

    /// Service centre number written to the SIM during connect. When unset
    /// the number already stored on the SIM is used.
    pub smsc: Option<String>,

    /// Send and list messages in text mode instead of PDU mode (default: false)
    pub sms_text_mode: bool,

    /// Options applied to every PDU-mode submit
    pub submit: SubmitOptions,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(10),
            sms_send_timeout: Duration::from_secs(35),
            delivery_timeout: Duration::from_secs(15),
            polling_interval: Duration::from_millis(500),
            dial_settle_delay: Duration::from_secs(1),
            dial_timeout: Duration::from_secs(10),
            resync_window: Duration::from_secs(1),
            notification_queue: 64,
            sim_busy_retries: 3,
            sim_busy_delay: Duration::from_secs(1),
            pin: None,
            smsc: None,
            sms_text_mode: false,
            submit: SubmitOptions::default(),
        }
    }
}

impl ModemConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_sms_send_timeout(mut self, timeout: Duration) -> Self {
        self.sms_send_timeout = timeout;
        self
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Sets both the settle delay before the first poll and the overall
    /// wait for a dialled call
    pub fn with_dial_timing(mut self, settle_delay: Duration, timeout: Duration) -> Self {
        self.dial_settle_delay = settle_delay;
        self.dial_timeout = timeout;
        self
    }

    pub fn with_resync_window(mut self, window: Duration) -> Self {
        self.resync_window = window;
        self
    }

    pub fn with_notification_queue(mut self, capacity: usize) -> Self {
        self.notification_queue = capacity.max(1);
        self
    }

    pub fn with_sim_busy_retry(mut self, retries: u32, delay: Duration) -> Self {
        self.sim_busy_retries = retries;
        self.sim_busy_delay = delay;
        self
    }

    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    pub fn with_smsc(mut self, smsc: impl Into<String>) -> Self {
        self.smsc = Some(smsc.into());
        self
    }

    pub fn with_text_mode(mut self, text_mode: bool) -> Self {
        self.sms_text_mode = text_mode;
        self
    }

    /// Options for PDU-mode submits: validity period, flash, explicit SMSC
    /// and whether to request status reports
    pub fn with_submit_options(mut self, options: SubmitOptions) -> Self {
        self.submit = options;
        self
    }

    pub(crate) fn transceiver_settings(&self) -> TransceiverSettings {
        TransceiverSettings {
            command_timeout: self.command_timeout,
            resync_window: self.resync_window,
            sim_busy_retries: self.sim_busy_retries,
            sim_busy_delay: self.sim_busy_delay,
        }
    }
}
