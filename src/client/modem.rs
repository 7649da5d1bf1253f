// ABOUTME: The modem session handle: shared per-session state, callbacks and notification routing
// ABOUTME: Wires the transceiver's notification queue to the dispatcher task and the session handlers

use crate::client::call::{Call, CallShared, PendingDial};
use crate::client::config::ModemConfig;
use crate::client::error::ModemResult;
use crate::client::types::{Capabilities, ReceivedSms, StatusReport};
use crate::command::Command;
use crate::dispatcher::{Notification, NotificationKind, RouteTable, spawn_dispatcher};
use crate::pdu::Reassembler;
use crate::transceiver::Transceiver;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Status reports kept for sends that have not started waiting yet
const UNCLAIMED_REPORTS: usize = 32;

pub(crate) type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Application callbacks; they run on the dispatcher task
#[derive(Clone, Default)]
pub(crate) struct Callbacks {
    pub sms: Option<Callback<ReceivedSms>>,
    pub status_report: Option<Callback<StatusReport>>,
    pub incoming_call: Option<Callback<Call>>,
}

impl Callbacks {
    /// Runs `callback`, logging instead of unwinding if it panics
    pub(crate) fn invoke<T>(name: &'static str, callback: Option<&Callback<T>>, value: T) {
        let Some(callback) = callback else { return };
        if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
            error!(callback = name, "Callback panicked");
        }
    }
}

/// Everything a session tracks between commands.
///
/// Guarded by one mutex that is never held across an `.await`.
#[derive(Default)]
pub(crate) struct SessionState {
    pub capabilities: Capabilities,
    /// Calls that have not ended, by modem call id
    pub calls: HashMap<u32, Arc<CallShared>>,
    next_reference: u8,
    /// Sends waiting for their status report, by message reference
    pub pending_reports: HashMap<u8, oneshot::Sender<StatusReport>>,
    unclaimed_reports: VecDeque<StatusReport>,
    pub reassembler: Reassembler<ReceivedSms>,
    pub text_mode: bool,
    pub smsc: Option<String>,
    /// Character sets from `AT+CSCS=?`, once queried
    pub charsets: Option<Vec<String>>,
    pub charset: Option<String>,
    /// Message memory last selected with `AT+CPMS`
    pub memory: Option<String>,
    pub poller: Option<JoinHandle<()>>,
    pub pending_dial: Option<PendingDial>,
}

impl SessionState {
    /// Reference for the next outgoing message; wraps from 255 to 0
    pub fn next_reference(&mut self) -> u8 {
        let reference = self.next_reference;
        self.next_reference = reference.wrapping_add(1);
        reference
    }

    #[cfg(test)]
    pub fn set_next_reference(&mut self, reference: u8) {
        self.next_reference = reference;
    }

    /// Takes a report that arrived before anyone waited for it
    pub fn claim_report(&mut self, reference: u8) -> Option<StatusReport> {
        let position = self
            .unclaimed_reports
            .iter()
            .position(|report| report.reference == reference)?;
        self.unclaimed_reports.remove(position)
    }

    /// Hands `report` to the send waiting for it, or keeps it for later
    pub fn route_report(&mut self, report: StatusReport) {
        let report = match self.pending_reports.remove(&report.reference) {
            Some(waiter) => match waiter.send(report) {
                Ok(()) => return,
                Err(report) => report,
            },
            None => report,
        };
        if self.unclaimed_reports.len() >= UNCLAIMED_REPORTS {
            self.unclaimed_reports.pop_front();
        }
        self.unclaimed_reports.push_back(report);
    }

    pub fn lowest_free_call_id(&self) -> u32 {
        (1..u32::MAX)
            .find(|id| !self.calls.contains_key(id))
            .unwrap_or(u32::MAX)
    }
}

pub(crate) struct Inner {
    pub transceiver: Transceiver,
    pub config: ModemConfig,
    pub callbacks: Callbacks,
    state: Mutex<SessionState>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// A connected modem session.
///
/// Cheap to clone; all clones drive the same session. Operations are grouped
/// into the [`ModemSession`](crate::client::ModemSession),
/// [`CallControl`](crate::client::CallControl),
/// [`SmsTransmitter`](crate::client::SmsTransmitter) and
/// [`SmsStore`](crate::client::SmsStore) traits.
#[derive(Clone)]
pub struct Modem {
    pub(crate) inner: Arc<Inner>,
}

impl Modem {
    /// Starts the read and dispatcher tasks over `stream` without running the
    /// connect handshake
    pub(crate) fn spawn<S>(
        stream: S,
        config: ModemConfig,
        callbacks: Callbacks,
        routes: RouteTable,
    ) -> Modem
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (queue, notifications) = mpsc::channel(config.notification_queue.max(1));
        let transceiver =
            Transceiver::spawn(stream, routes, queue, config.transceiver_settings());
        let state = SessionState {
            text_mode: config.sms_text_mode,
            smsc: config.smsc.clone(),
            ..Default::default()
        };
        let inner = Arc::new(Inner {
            transceiver,
            config,
            callbacks,
            state: Mutex::new(state),
            dispatcher: Mutex::new(None),
        });

        let session = Arc::downgrade(&inner);
        let handle = spawn_dispatcher(notifications, move |notification| {
            let session = session.clone();
            async move {
                if let Some(modem) = Modem::upgrade(&session) {
                    modem.handle_notification(notification).await;
                }
            }
        });
        *inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Modem { inner }
    }

    pub(crate) fn upgrade(session: &Weak<Inner>) -> Option<Modem> {
        session.upgrade().map(|inner| Modem { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn config(&self) -> &ModemConfig {
        &self.inner.config
    }

    pub(crate) async fn execute(&self, command: impl Into<String>) -> ModemResult<Vec<String>> {
        self.inner.transceiver.execute(&Command::new(command)).await
    }

    pub(crate) fn take_dispatcher(&self) -> Option<JoinHandle<()>> {
        self.inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn handle_notification(&self, notification: Notification) {
        use NotificationKind::*;
        match notification.kind {
            Ring => self.on_ring(),
            CallerId => self.on_caller_id(notification.body()),
            CallList => debug!(line = %notification.line, "Unsolicited call list entry"),
            SmsStored => self.on_sms_stored(notification.body()).await,
            StatusReportStored => self.on_report_stored(notification.body()).await,
            SmsDelivered => self.on_sms_delivered(&notification),
            StatusReportDelivered => self.on_report_delivered(&notification),
            Network => debug!(line = %notification.line, "Network indication"),
            CallOriginated => self.on_call_originated(notification.body()),
            CallAlerting => debug!(line = %notification.line, "Remote party alerting"),
            CallConnected => self.on_call_connected(notification.body()),
            CallEnded => self.on_call_ended(notification.body()),
            WavecomIndication => self.on_wavecom_indication(notification.body()),
        }
    }
}

impl fmt::Debug for Modem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modem")
            .field("closed", &self.inner.transceiver.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{DeliveryStatus, SmsTimestamp};
    use crate::client::types::SmsStatus;

    fn report(reference: u8) -> StatusReport {
        let ts = SmsTimestamp::new(2016, 10, 30, 4, 59, 44, 32).unwrap();
        StatusReport {
            reference,
            recipient: "+62895357614989".into(),
            time_sent: ts,
            time_finalized: ts,
            delivery_status: DeliveryStatus::Delivered,
            status_code: 0,
            status: SmsStatus::ReceivedRead,
            index: Some(1),
            memory: None,
            smsc: None,
        }
    }

    #[test]
    fn reference_wraps_after_255() {
        let mut state = SessionState::default();
        assert_eq!(state.next_reference(), 0);
        assert_eq!(state.next_reference(), 1);
        state.set_next_reference(255);
        assert_eq!(state.next_reference(), 255);
        assert_eq!(state.next_reference(), 0);
        assert_eq!(state.next_reference(), 1);
    }

    #[test]
    fn reports_reach_waiters_or_wait_for_them() {
        let mut state = SessionState::default();
        let (tx, mut rx) = oneshot::channel();
        state.pending_reports.insert(35, tx);
        state.route_report(report(35));
        assert_eq!(rx.try_recv().unwrap().reference, 35);

        state.route_report(report(36));
        assert_eq!(state.claim_report(36).map(|r| r.reference), Some(36));
        assert!(state.claim_report(36).is_none());
    }

    #[test]
    fn unclaimed_reports_are_bounded() {
        let mut state = SessionState::default();
        for reference in 0..=UNCLAIMED_REPORTS as u8 {
            state.route_report(report(reference));
        }
        assert!(state.claim_report(0).is_none());
        assert!(state.claim_report(UNCLAIMED_REPORTS as u8).is_some());
    }

    #[test]
    fn callback_panics_are_contained() {
        let callback: Callback<u8> = Arc::new(|_| panic!("callback failure"));
        Callbacks::invoke("test", Some(&callback), 1);
        Callbacks::invoke::<u8>("test", None, 1);
    }
}
