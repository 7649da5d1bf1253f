// ABOUTME: The connect handshake: reset, SIM unlock, SMS setup and feature detection
// ABOUTME: Optional steps degrade to disabled capabilities instead of failing the connect

use crate::client::error::{ModemError, ModemResult};
use crate::client::modem::Modem;
use crate::client::response::{
    leading_numbers, parse_cfun, parse_clac, parse_csca, parse_first_group, prefixed,
};
use crate::client::types::{CallEventProfile, Capabilities, VendorShape};
use tracing::{debug, info, warn};

/// Commands probed one by one when `AT+CLAC` gives no usable list
const PROBED_COMMANDS: &[&str] = &[
    "^CVOICE", "+VTS", "^DTMF", "^USSDMODE", "+WIND", "+ZPAS", "+CSCS", "+CNUM",
];

/// Parameters for text-mode sends: status report requested, 24h validity
const TEXT_MODE_PARAMETERS: &str = "AT+CSMP=49,167,0,0";

/// `+WIND` indication mask that includes call progress events
const WIND_CALL_EVENTS: u32 = 50;

/// Turns a command failure into `None`, logging which feature is lost.
/// Transport errors still abort the handshake.
fn tolerate<T>(result: ModemResult<T>, feature: &str) -> ModemResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_command_failure() => {
            warn!(feature, error = %e, "Optional modem feature unavailable");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl Modem {
    /// Brings a freshly opened modem into a known state and records what it
    /// supports
    pub(crate) async fn handshake(&self) -> ModemResult<()> {
        info!("Initializing modem");
        self.execute("ATZ").await?;
        self.execute("ATE0").await?;
        tolerate(self.execute("AT+CMEE=1").await, "extended errors")?;

        self.unlock_sim().await?;

        let mut caps = Capabilities::default();
        self.check_functionality(&mut caps).await?;
        self.setup_sms().await?;
        self.detect_commands(&mut caps).await?;
        self.setup_calls(&mut caps).await?;
        self.setup_notifications(&mut caps).await?;

        info!(
            shape = ?caps.vendor_shape,
            call_events = ?caps.call_events,
            sms_push = caps.sms_push,
            "Modem initialized"
        );
        self.state().capabilities = caps;
        Ok(())
    }

    async fn unlock_sim(&self) -> ModemResult<()> {
        let status = match self.execute("AT+CPIN?").await {
            Ok(lines) => prefixed(&lines, "+CPIN:").map(|status| status.trim().to_string()),
            Err(ModemError::PinRequired) => Some("SIM PIN".to_string()),
            Err(ModemError::PukRequired) => Some("SIM PUK".to_string()),
            Err(e) if e.is_command_failure() => {
                warn!(error = %e, "SIM status unavailable, assuming ready");
                None
            }
            Err(e) => return Err(e),
        };

        match status.as_deref() {
            Some("SIM PIN") => {
                let Some(pin) = self.config().pin.as_deref() else {
                    return Err(ModemError::PinRequired);
                };
                info!("Unlocking SIM");
                self.execute(format!("AT+CPIN=\"{pin}\"")).await?;
            }
            Some("SIM PUK") => return Err(ModemError::PukRequired),
            Some("READY") | None => {}
            Some(other) => debug!(status = other, "Unrecognized SIM status"),
        }
        Ok(())
    }

    async fn check_functionality(&self, caps: &mut Capabilities) -> ModemResult<()> {
        let Some(lines) = tolerate(self.execute("AT+CFUN?").await, "functionality mode")? else {
            return Ok(());
        };
        caps.functionality_mode = true;
        if parse_cfun(&lines) != Some(1) {
            info!("Enabling full modem functionality");
            tolerate(self.execute("AT+CFUN=1").await, "full functionality")?;
        }
        Ok(())
    }

    async fn setup_sms(&self) -> ModemResult<()> {
        let preset = self.state().smsc.clone();
        let smsc = match preset {
            Some(number) => {
                tolerate(self.execute(format!("AT+CSCA=\"{number}\"")).await, "SMSC")?;
                Some(number)
            }
            None => tolerate(self.execute("AT+CSCA?").await, "SMSC")?
                .and_then(|lines| parse_csca(&lines)),
        };

        let text_mode = self.state().text_mode;
        let mode = if text_mode { "AT+CMGF=1" } else { "AT+CMGF=0" };
        tolerate(self.execute(mode).await, "SMS mode")?;
        if text_mode {
            tolerate(self.execute(TEXT_MODE_PARAMETERS).await, "text mode parameters")?;
        }

        // Some modems reset the service centre when the SMS mode changes
        if let Some(expected) = smsc.as_deref() {
            let current = tolerate(self.execute("AT+CSCA?").await, "SMSC")?
                .and_then(|lines| parse_csca(&lines));
            if current.as_deref() != Some(expected) {
                debug!(smsc = expected, "Restoring service centre number");
                tolerate(self.execute(format!("AT+CSCA=\"{expected}\"")).await, "SMSC")?;
            }
        }
        self.state().smsc = smsc;
        Ok(())
    }

    async fn detect_commands(&self, caps: &mut Capabilities) -> ModemResult<()> {
        let listed = tolerate(self.execute("AT+CLAC").await, "command list")?
            .and_then(|lines| parse_clac(&lines));
        match listed {
            Some((shape, commands)) => {
                caps.vendor_shape = shape;
                caps.commands = commands;
            }
            None => {
                caps.vendor_shape = VendorShape::TrialProbe;
                // Some modems need a plain AT after a rejected AT+CLAC
                tolerate(self.execute("AT").await, "attention")?;
                for command in PROBED_COMMANDS {
                    if tolerate(self.execute(format!("AT{command}=?")).await, command)?.is_some() {
                        caps.commands.push(command.to_string());
                    }
                }
            }
        }
        debug!(count = caps.commands.len(), shape = ?caps.vendor_shape, "Detected commands");
        Ok(())
    }

    async fn setup_calls(&self, caps: &mut Capabilities) -> ModemResult<()> {
        caps.dtmf = caps.supports("+VTS") || caps.supports("^DTMF");
        caps.call_events = if caps.supports("^DTMF") || caps.supports("^CVOICE") {
            CallEventProfile::Huawei
        } else if caps.supports("+WIND") {
            self.enable_wind_calls().await?;
            CallEventProfile::Wavecom
        } else {
            CallEventProfile::Polling
        };

        caps.caller_id = tolerate(self.execute("AT+CLIP=1").await, "caller id")?.is_some();
        if caps.caller_id {
            caps.extended_ring =
                tolerate(self.execute("AT+CRC=1").await, "extended ring")?.is_some();
        }
        Ok(())
    }

    async fn enable_wind_calls(&self) -> ModemResult<()> {
        let current = tolerate(self.execute("AT+WIND?").await, "wavecom indications")?
            .and_then(|lines| {
                prefixed(&lines, "+WIND:").and_then(|body| leading_numbers(body).first().copied())
            });
        if current != Some(WIND_CALL_EVENTS) {
            tolerate(
                self.execute(format!("AT+WIND={WIND_CALL_EVENTS}")).await,
                "wavecom indications",
            )?;
        }
        Ok(())
    }

    async fn setup_notifications(&self, caps: &mut Capabilities) -> ModemResult<()> {
        caps.sms_push = match self.execute("AT+CNMI=2,1,0,2").await {
            Ok(_) => true,
            Err(e) if e.is_command_failure() => {
                debug!(error = %e, "Falling back to basic message indications");
                tolerate(self.execute("AT+CNMI=2,1,0,1,0").await, "message indications")?
                    .is_some()
            }
            Err(e) => return Err(e),
        };

        if let Some(lines) = tolerate(self.execute("AT+CPMS=?").await, "message storage")? {
            caps.storage_query = true;
            caps.memories = parse_first_group(&lines, "+CPMS:");
        }
        Ok(())
    }
}
