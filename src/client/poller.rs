// ABOUTME: Call list polling for modems without call progress events
// ABOUTME: Periodically issues AT+CLCC while calls are active and diffs the result against the call table

use crate::client::error::ModemError;
use crate::client::modem::{Inner, Modem};
use crate::client::response::{CallListEntry, parse_clcc};
use crate::client::types::CallState;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

impl Modem {
    /// Starts the call poller unless it is already running, the modem reports
    /// call events itself, or there are no calls to watch
    pub(crate) fn ensure_poller(&self) {
        let mut state = self.state();
        if !state.capabilities.call_events.needs_polling() || state.calls.is_empty() {
            return;
        }
        if state.poller.as_ref().is_some_and(|poller| !poller.is_finished()) {
            return;
        }
        let interval = self.config().polling_interval;
        state.poller = Some(tokio::spawn(poll_calls(self.downgrade(), interval)));
        debug!(?interval, "Call poller started");
    }

    /// Applies one `AT+CLCC` snapshot: an active entry means answered, a
    /// missing entry means the call is over
    pub(crate) fn apply_call_list(&self, entries: &[CallListEntry]) {
        let calls: Vec<_> = self.state().calls.values().cloned().collect();
        for call in calls {
            match entries.iter().find(|entry| entry.id == call.id()) {
                Some(entry) if entry.stat == 0 => {
                    call.advance(CallState::ActiveAnswered);
                }
                Some(_) => {}
                None if call.state() == CallState::Initiating => {}
                None => self.end_call_remotely(&call),
            }
        }
    }
}

async fn poll_calls(session: Weak<Inner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(modem) = Modem::upgrade(&session) else {
            break;
        };
        if modem.inner.transceiver.is_closed() {
            break;
        }
        {
            let mut state = modem.state();
            if state.calls.is_empty() {
                state.poller = None;
                break;
            }
        }

        match modem.execute("AT+CLCC").await {
            Ok(lines) => modem.apply_call_list(&parse_clcc(&lines)),
            Err(ModemError::Closed) => break,
            Err(e) => warn!(error = %e, "Call list poll failed"),
        }
    }
    debug!("Call poller stopped");
}
