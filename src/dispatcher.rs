// ABOUTME: Routes unsolicited modem lines to typed notifications by line prefix
// ABOUTME: Runs handlers on a dedicated task fed by a bounded queue, isolating handler panics

use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// What an unsolicited line announces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// `RING` or `+CRING:`
    Ring,
    /// `+CLIP:` caller number for a ringing call
    CallerId,
    /// `+CLCC:` call list entry
    CallList,
    /// `+CMTI:` a message was stored
    SmsStored,
    /// `+CDSI:` a status report was stored
    StatusReportStored,
    /// `+CMT:` a message delivered directly, PDU on the next line
    SmsDelivered,
    /// `+CDS:` a status report delivered directly, PDU on the next line
    StatusReportDelivered,
    /// Registration, signal and SIM state indications
    Network,
    /// Huawei `^ORIG:` outgoing call originated
    CallOriginated,
    /// Huawei `^CONF:` remote party alerting
    CallAlerting,
    /// Huawei `^CONN:` call connected
    CallConnected,
    /// Huawei `^CEND:` call ended
    CallEnded,
    /// Wavecom `+WIND:` indication
    WavecomIndication,
}

/// A routed unsolicited line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub line: String,
    /// Lines that belong to the notification (the PDU after `+CMT:`)
    pub payload: Vec<String>,
}

impl Notification {
    pub fn new(kind: NotificationKind, line: impl Into<String>) -> Self {
        Notification {
            kind,
            line: line.into(),
            payload: Vec::new(),
        }
    }

    /// The text after the `PREFIX:` part, trimmed
    pub fn body(&self) -> &str {
        self.line
            .split_once(':')
            .map_or("", |(_, rest)| rest.trim())
    }
}

/// One prefix route
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub prefix: &'static str,
    pub kind: NotificationKind,
    /// Lines following the matched one that belong to it
    pub trailing_lines: usize,
}

impl Route {
    /// Trailing lines `line` needs. A text-mode `+CDS:` carries the whole
    /// report inline, while the PDU form is just a length.
    pub fn trailing_for(&self, line: &str) -> usize {
        if self.kind == NotificationKind::StatusReportDelivered && line.contains(',') {
            return 0;
        }
        self.trailing_lines
    }
}

/// Prefix → kind lookup consulted by the read loop for every line
#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Routes understood by the session
    pub fn standard() -> Self {
        use NotificationKind::*;
        let mut table = RouteTable { routes: Vec::new() };
        for (prefix, kind) in [
            ("RING", Ring),
            ("+CRING:", Ring),
            ("+CLIP:", CallerId),
            ("+CLCC:", CallList),
            ("+CMTI:", SmsStored),
            ("+CDSI:", StatusReportStored),
            ("^ORIG:", CallOriginated),
            ("^CONF:", CallAlerting),
            ("^CONN:", CallConnected),
            ("^CEND:", CallEnded),
            ("+WIND:", WavecomIndication),
        ] {
            table = table.with_route(prefix, kind, 0);
        }
        for prefix in [
            "+CREG:", "+CGREG:", "+CSQ:", "^RSSI:", "^BOOT:", "^MODE:", "^SRVST:", "^SIMST:",
            "+ZDONR", "+ZPASR", "+ZUSIMR:", "+ZEND",
        ] {
            table = table.with_route(prefix, Network, 0);
        }
        table
            .with_route("+CMT:", SmsDelivered, 1)
            .with_route("+CDS:", StatusReportDelivered, 1)
    }

    pub fn with_route(
        mut self,
        prefix: &'static str,
        kind: NotificationKind,
        trailing_lines: usize,
    ) -> Self {
        self.routes.push(Route {
            prefix,
            kind,
            trailing_lines,
        });
        self
    }

    /// The route whose prefix `line` starts with; the longest prefix wins
    pub fn classify(&self, line: &str) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|route| line.starts_with(route.prefix))
            .max_by_key(|route| route.prefix.len())
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Spawns the task that hands notifications to `handler`, one at a time and
/// in arrival order.
///
/// Each notification is handled on its own child task so a panicking handler
/// is logged and the next notification still gets processed.
pub fn spawn_dispatcher<F, Fut>(mut queue: mpsc::Receiver<Notification>, handler: F) -> JoinHandle<()>
where
    F: Fn(Notification) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(notification) = queue.recv().await {
            let kind = notification.kind;
            if let Err(e) = tokio::spawn(handler(notification)).await {
                if e.is_panic() {
                    error!(?kind, "Notification handler panicked");
                }
            }
        }
        debug!("Notification queue closed, dispatcher stopping");
    })
}
