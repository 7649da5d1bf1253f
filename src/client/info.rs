// ABOUTME: Session lifecycle and device queries: close, raw commands, identity and network state
// ABOUTME: Implements the ModemSession trait for the modem handle

use crate::client::error::{ModemError, ModemResult};
use crate::client::modem::Modem;
use crate::client::response::{parse_cops, parse_creg, parse_csca, parse_csq};
use crate::client::traits::ModemSession;
use crate::client::types::Capabilities;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Pause between registration and signal checks while waiting for coverage
const COVERAGE_POLL: Duration = Duration::from_secs(1);

/// Network registration as reported by `AT+CREG?`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Registration {
    Registered,
    Searching,
    /// Not searching (0) or denied (3)
    Unavailable(u8),
}

impl Registration {
    fn from_stat(stat: u8) -> Self {
        match stat {
            1 | 5 => Registration::Registered,
            0 | 3 => Registration::Unavailable(stat),
            _ => Registration::Searching,
        }
    }
}

impl Modem {
    /// Runs an identity command and returns its value without any echoed
    /// `+CMD:` prefix
    async fn identity(&self, command: &str) -> ModemResult<String> {
        let lines = self.execute(command).await?;
        let prefix = command
            .strip_prefix("AT")
            .map(|name| format!("{name}:"))
            .unwrap_or_default();
        lines
            .iter()
            .map(|line| line.strip_prefix(prefix.as_str()).unwrap_or(line).trim())
            .find(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ModemError::UnexpectedResponse {
                command: command.to_string(),
                response: lines.clone(),
            })
    }

    /// `true` once registered; `false` while still searching or when the
    /// modem cannot report registration at all
    async fn check_registration(&self) -> ModemResult<bool> {
        let lines = match self.execute("AT+CREG?").await {
            Ok(lines) => lines,
            Err(e) if e.is_command_failure() => {
                debug!(error = %e, "Registration query failed, relying on signal strength");
                return Ok(true);
            }
            Err(e) => return Err(e),
        };
        match parse_creg(&lines).map(Registration::from_stat) {
            Some(Registration::Registered) => Ok(true),
            Some(Registration::Searching) | None => Ok(false),
            Some(Registration::Unavailable(stat)) => Err(ModemError::InvalidState(format!(
                "network registration unavailable (status {stat})"
            ))),
        }
    }

    async fn await_coverage(&self) -> ModemResult<u8> {
        while !self.check_registration().await? {
            tokio::time::sleep(COVERAGE_POLL).await;
        }
        loop {
            if let Some(signal) = self.signal_strength().await?.filter(|signal| *signal > 0) {
                return Ok(signal);
            }
            tokio::time::sleep(COVERAGE_POLL).await;
        }
    }
}

impl ModemSession for Modem {
    async fn close(&self) {
        info!("Closing modem session");
        self.inner.transceiver.close().await;
        let poller = {
            let mut state = self.state();
            state.pending_reports.clear();
            state.pending_dial = None;
            state.poller.take()
        };
        if let Some(poller) = poller {
            poller.abort();
        }
        if let Some(dispatcher) = self.take_dispatcher() {
            dispatcher.abort();
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.transceiver.is_closed()
    }

    fn capabilities(&self) -> Capabilities {
        self.state().capabilities.clone()
    }

    async fn write(&self, command: &str) -> ModemResult<Vec<String>> {
        self.execute(command).await
    }

    async fn signal_strength(&self) -> ModemResult<Option<u8>> {
        let lines = self.execute("AT+CSQ").await?;
        Ok(parse_csq(&lines))
    }

    async fn wait_for_network_coverage(&self, timeout: Duration) -> ModemResult<u8> {
        let started = Instant::now();
        let signal = tokio::time::timeout(timeout, self.await_coverage())
            .await
            .map_err(|_| ModemError::Timeout {
                command: "AT+CREG?".to_string(),
            })??;
        info!(signal, waited = ?started.elapsed(), "Network coverage available");
        Ok(signal)
    }

    async fn manufacturer(&self) -> ModemResult<String> {
        self.identity("AT+CGMI").await
    }

    async fn model(&self) -> ModemResult<String> {
        self.identity("AT+CGMM").await
    }

    async fn revision(&self) -> ModemResult<String> {
        self.identity("AT+CGMR").await
    }

    async fn imei(&self) -> ModemResult<String> {
        self.identity("AT+CGSN").await
    }

    async fn imsi(&self) -> ModemResult<String> {
        self.identity("AT+CIMI").await
    }

    async fn network_name(&self) -> ModemResult<Option<String>> {
        let lines = self.execute("AT+COPS?").await?;
        Ok(parse_cops(&lines))
    }

    async fn smsc(&self) -> ModemResult<Option<String>> {
        let lines = self.execute("AT+CSCA?").await?;
        let smsc = parse_csca(&lines);
        self.state().smsc = smsc.clone();
        Ok(smsc)
    }

    async fn set_smsc(&self, number: &str) -> ModemResult<()> {
        if self.state().smsc.as_deref() == Some(number) {
            return Ok(());
        }
        self.execute(format!("AT+CSCA=\"{number}\"")).await?;
        self.state().smsc = Some(number.to_string());
        Ok(())
    }
}
