// ABOUTME: Voice call handles and the call state machine driven by dialling, rings and vendor events
// ABOUTME: Implements call control for the session, including incoming call announcement and DTMF

use crate::client::error::{ModemError, ModemResult};
use crate::client::modem::{Callbacks, Modem};
use crate::client::response::{leading_numbers, parse_clcc, parse_clip};
use crate::client::traits::CallControl;
use crate::client::types::{CallDirection, CallEventProfile, CallState, EndReason};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DTMF_TONES: &str = "0123456789*#ABCD";

/// A dial waiting for the modem's call-created event
pub(crate) struct PendingDial {
    pub number: String,
    pub reply: oneshot::Sender<Arc<CallShared>>,
}

#[derive(Debug, Default)]
struct CallDetails {
    number: Option<String>,
    ring_count: u32,
    announced: bool,
    hanging_up: bool,
}

/// State shared between the session's call table and every `Call` handle
pub(crate) struct CallShared {
    id: u32,
    direction: CallDirection,
    state: watch::Sender<CallState>,
    details: Mutex<CallDetails>,
}

impl CallShared {
    pub(crate) fn new(id: u32, direction: CallDirection, number: Option<String>) -> Arc<Self> {
        let (state, _) = watch::channel(CallState::Initiating);
        Arc::new(CallShared {
            id,
            direction,
            state,
            details: Mutex::new(CallDetails {
                number,
                ..Default::default()
            }),
        })
    }

    fn details(&self) -> MutexGuard<'_, CallDetails> {
        self.details.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn state(&self) -> CallState {
        *self.state.borrow()
    }

    /// Moves to `next` if that is a forward transition
    pub(crate) fn advance(&self, next: CallState) -> bool {
        let moved = self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(id = self.id, state = %next, "Call state changed");
        }
        moved
    }

    fn ring(&self) -> u32 {
        let mut details = self.details();
        details.ring_count += 1;
        details.ring_count
    }

    /// True the first time only
    fn mark_announced(&self) -> bool {
        !std::mem::replace(&mut self.details().announced, true)
    }

    fn is_hanging_up(&self) -> bool {
        self.details().hanging_up
    }

    /// Reason to record when the modem reports this call gone
    fn remote_end_reason(&self) -> EndReason {
        if self.is_hanging_up() {
            EndReason::Local
        } else if self.state().is_answered() || self.direction == CallDirection::Incoming {
            EndReason::Remote
        } else {
            EndReason::Rejected
        }
    }
}

/// Handle to one voice call.
///
/// Handles are cheap to clone and stay valid after the call ended; actions
/// on an ended call fail with `InvalidState`.
#[derive(Clone)]
pub struct Call {
    shared: Arc<CallShared>,
    modem: Modem,
}

impl Call {
    pub(crate) fn new(shared: Arc<CallShared>, modem: Modem) -> Self {
        Call { shared, modem }
    }

    pub fn id(&self) -> u32 {
        self.shared.id
    }

    pub fn direction(&self) -> CallDirection {
        self.shared.direction
    }

    /// Remote number, when known. Incoming calls learn it from `+CLIP`.
    pub fn number(&self) -> Option<String> {
        self.shared.details().number.clone()
    }

    /// Rings seen so far for an incoming call
    pub fn ring_count(&self) -> u32 {
        self.shared.details().ring_count
    }

    pub fn state(&self) -> CallState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        !self.state().is_ended()
    }

    pub fn dtmf_supported(&self) -> bool {
        self.modem.state().capabilities.dtmf
    }

    /// Answer a ringing incoming call
    pub async fn answer(&self) -> ModemResult<()> {
        if self.direction() != CallDirection::Incoming
            || self.state() != CallState::ActiveUnanswered
        {
            return Err(ModemError::InvalidState(format!(
                "call {} cannot be answered while {}",
                self.id(),
                self.state()
            )));
        }
        self.modem.execute("ATA").await?;
        self.shared.advance(CallState::ActiveAnswered);
        info!(id = self.id(), "Call answered");
        Ok(())
    }

    /// Hang up; the call ends with `EndReason::Local`
    pub async fn hangup(&self) -> ModemResult<()> {
        if self.state().is_ended() {
            return Err(ModemError::InvalidState(format!(
                "call {} already ended",
                self.id()
            )));
        }
        self.shared.details().hanging_up = true;
        let result = self.modem.execute("ATH").await;
        if let Err(e) = result {
            self.shared.details().hanging_up = false;
            return Err(e);
        }
        self.modem.end_call(&self.shared, EndReason::Local);
        Ok(())
    }

    /// Send DTMF tones (`0-9`, `*`, `#`, `A-D`) on an answered call
    pub async fn send_dtmf(&self, tones: &str) -> ModemResult<()> {
        if !self.state().is_answered() {
            return Err(ModemError::InvalidState(format!(
                "DTMF needs an answered call, call {} is {}",
                self.id(),
                self.state()
            )));
        }
        let (supported, vendor_command) = {
            let state = self.modem.state();
            let capabilities = &state.capabilities;
            (
                capabilities.dtmf,
                capabilities.call_events == CallEventProfile::Huawei
                    && capabilities.supports("^DTMF"),
            )
        };
        if !supported {
            return Err(ModemError::InvalidState(
                "DTMF is not supported by this modem".to_string(),
            ));
        }
        if let Some(tone) = tones
            .chars()
            .find(|tone| !DTMF_TONES.contains(tone.to_ascii_uppercase()))
        {
            return Err(ModemError::InvalidValue(format!("DTMF tone {tone:?}")));
        }

        for tone in tones.chars().map(|tone| tone.to_ascii_uppercase()) {
            if self.state().is_ended() {
                return Err(ModemError::InvalidState(format!(
                    "call {} ended while sending DTMF",
                    self.id()
                )));
            }
            let command = if vendor_command {
                format!("AT^DTMF={},{}", self.id(), tone)
            } else {
                format!("AT+VTS={tone}")
            };
            self.modem.execute(command).await?;
        }
        Ok(())
    }

    /// Wait until the call is answered (`true`) or ends unanswered (`false`)
    pub async fn wait_until_answered(&self, timeout: Duration) -> ModemResult<bool> {
        let state = self
            .wait_for(timeout, |state| state.is_answered() || state.is_ended())
            .await?;
        Ok(state.is_answered())
    }

    /// Wait until the call ends
    pub async fn wait_until_ended(&self, timeout: Duration) -> ModemResult<EndReason> {
        match self.wait_for(timeout, |state| state.is_ended()).await? {
            CallState::Ended(reason) => Ok(reason),
            other => Err(ModemError::InvalidState(format!("call is {other}"))),
        }
    }

    async fn wait_for(
        &self,
        timeout: Duration,
        done: impl FnMut(&CallState) -> bool,
    ) -> ModemResult<CallState> {
        let mut done = done;
        let mut states = self.shared.state.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            states.wait_for(|state| done(state)).await.map(|state| *state)
        })
        .await;
        match waited {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(_)) => Err(ModemError::Closed),
            Err(_) => Err(ModemError::Timeout {
                command: format!("call {} state change", self.id()),
            }),
        }
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id())
            .field("direction", &self.direction())
            .field("number", &self.number())
            .field("state", &self.state())
            .finish()
    }
}

impl Modem {
    /// Marks `call` ended and drops it from the call table
    pub(crate) fn end_call(&self, call: &Arc<CallShared>, reason: EndReason) {
        let mut state = self.state();
        if call.advance(CallState::Ended(reason)) {
            info!(id = call.id, ?reason, "Call ended");
        }
        if state
            .calls
            .get(&call.id)
            .is_some_and(|listed| Arc::ptr_eq(listed, call))
        {
            state.calls.remove(&call.id);
        }
    }

    /// Ends a call the modem reported gone
    pub(crate) fn end_call_remotely(&self, call: &Arc<CallShared>) {
        let reason = call.remote_end_reason();
        self.end_call(call, reason);
    }

    fn ringing_call(&self) -> Option<Arc<CallShared>> {
        self.state()
            .calls
            .values()
            .find(|call| {
                call.direction == CallDirection::Incoming
                    && call.state() == CallState::ActiveUnanswered
            })
            .cloned()
    }

    fn announce_call(&self, call: Arc<CallShared>) {
        info!(id = call.id, number = ?call.details().number, "Incoming call");
        Callbacks::invoke(
            "incoming_call",
            self.inner.callbacks.incoming_call.as_ref(),
            Call::new(call, self.clone()),
        );
    }

    /// `RING` / `+CRING`: a new incoming call, or another ring of the
    /// current one
    pub(crate) fn on_ring(&self) {
        let (call, announce, poll) = {
            let mut state = self.state();
            let existing = state
                .calls
                .values()
                .find(|call| {
                    call.direction == CallDirection::Incoming
                        && call.state() == CallState::ActiveUnanswered
                })
                .cloned();
            let call = match existing {
                Some(call) => call,
                None => {
                    let id = state.lowest_free_call_id();
                    let call = CallShared::new(id, CallDirection::Incoming, None);
                    call.advance(CallState::ActiveUnanswered);
                    state.calls.insert(id, call.clone());
                    call
                }
            };
            let rings = call.ring();
            // Without caller id the second ring is as good as it gets
            let announce = (!state.capabilities.caller_id || rings >= 2) && call.mark_announced();
            (call, announce, state.capabilities.call_events.needs_polling())
        };
        debug!(id = call.id, rings = call.details().ring_count, "Ring");
        if poll {
            self.ensure_poller();
        }
        if announce {
            self.announce_call(call);
        }
    }

    /// `+CLIP`: caller number for the ringing call
    pub(crate) fn on_caller_id(&self, body: &str) {
        let Some(call) = self.ringing_call() else {
            debug!(body, "Caller id without a ringing call");
            return;
        };
        if let Some(number) = parse_clip(body) {
            call.details().number = Some(number);
        }
        if call.mark_announced() {
            self.announce_call(call);
        }
    }

    /// Creates the outgoing call a pending dial is waiting for
    fn confirm_dial(&self, id: u32) {
        let mut state = self.state();
        let Some(pending) = state.pending_dial.take() else {
            debug!(id, "Call created without a pending dial");
            return;
        };
        let call = CallShared::new(id, CallDirection::Outgoing, Some(pending.number));
        call.advance(CallState::ActiveUnanswered);
        state.calls.insert(id, call.clone());
        if pending.reply.send(call).is_err() {
            // The dial gave up waiting
            state.calls.remove(&id);
        }
    }

    fn listed_call(&self, id: u32) -> Option<Arc<CallShared>> {
        self.state().calls.get(&id).cloned()
    }

    /// Huawei `^ORIG: <id>,<type>`
    pub(crate) fn on_call_originated(&self, body: &str) {
        match leading_numbers(body).first() {
            Some(&id) => self.confirm_dial(id),
            None => warn!(body, "Malformed call origination event"),
        }
    }

    /// Huawei `^CONN: <id>,<type>`
    pub(crate) fn on_call_connected(&self, body: &str) {
        let call = leading_numbers(body)
            .first()
            .and_then(|&id| self.listed_call(id));
        match call {
            Some(call) => {
                call.advance(CallState::ActiveAnswered);
            }
            None => debug!(body, "Connect event for an unknown call"),
        }
    }

    /// Huawei `^CEND: <id>,<duration>,<end status>,<cause>`
    pub(crate) fn on_call_ended(&self, body: &str) {
        let call = leading_numbers(body)
            .first()
            .and_then(|&id| self.listed_call(id));
        match call {
            Some(call) => self.end_call_remotely(&call),
            None => debug!(body, "End event for an unknown call"),
        }
    }

    /// Wavecom `+WIND: <event>[,<id>]`
    pub(crate) fn on_wavecom_indication(&self, body: &str) {
        match leading_numbers(body).as_slice() {
            [5, id, ..] => self.confirm_dial(*id),
            [6, id, ..] => {
                if let Some(call) = self.listed_call(*id) {
                    self.end_call_remotely(&call);
                }
            }
            _ => debug!(body, "Wavecom indication"),
        }
    }

    pub(crate) async fn dial_number(&self, number: &str) -> ModemResult<Call> {
        let profile = self.state().capabilities.call_events;
        let confirmation = match profile {
            CallEventProfile::Polling => None,
            CallEventProfile::Huawei | CallEventProfile::Wavecom => {
                let (reply, confirmation) = oneshot::channel();
                self.state().pending_dial = Some(PendingDial {
                    number: number.to_string(),
                    reply,
                });
                Some(confirmation)
            }
        };

        let command = format!("ATD{number};");
        info!(number, "Dialling");
        if let Err(e) = self.execute(command.clone()).await {
            self.state().pending_dial = None;
            return Err(e);
        }

        let call = match confirmation {
            Some(confirmation) => {
                match tokio::time::timeout(self.config().dial_timeout, confirmation).await {
                    Ok(Ok(call)) => call,
                    Ok(Err(_)) => return Err(ModemError::Closed),
                    Err(_) => {
                        self.state().pending_dial = None;
                        return Err(ModemError::Timeout { command });
                    }
                }
            }
            None => self.find_dialled_call(number, command).await?,
        };

        if profile.needs_polling() {
            self.ensure_poller();
        }
        Ok(Call::new(call, self.clone()))
    }

    /// Polls the call list after a dial until a new outgoing call shows up
    async fn find_dialled_call(&self, number: &str, command: String) -> ModemResult<Arc<CallShared>> {
        let deadline = Instant::now() + self.config().dial_timeout;
        tokio::time::sleep(self.config().dial_settle_delay).await;
        loop {
            let entries = parse_clcc(&self.execute("AT+CLCC").await?);
            {
                let mut state = self.state();
                let dialled = entries
                    .iter()
                    .find(|entry| entry.outgoing && !state.calls.contains_key(&entry.id));
                if let Some(entry) = dialled {
                    let call = CallShared::new(entry.id, CallDirection::Outgoing, Some(number.to_string()));
                    call.advance(CallState::ActiveUnanswered);
                    if entry.stat == 0 {
                        call.advance(CallState::ActiveAnswered);
                    }
                    state.calls.insert(entry.id, call.clone());
                    return Ok(call);
                }
            }
            if Instant::now() >= deadline {
                return Err(ModemError::Timeout { command });
            }
            tokio::time::sleep(self.config().polling_interval).await;
        }
    }
}

impl CallControl for Modem {
    async fn dial(&self, number: &str) -> ModemResult<Call> {
        self.dial_number(number).await
    }

    fn active_calls(&self) -> Vec<Call> {
        let calls: Vec<_> = self.state().calls.values().cloned().collect();
        let mut calls: Vec<Call> = calls
            .into_iter()
            .map(|call| Call::new(call, self.clone()))
            .collect();
        calls.sort_by_key(Call::id);
        calls
    }
}
