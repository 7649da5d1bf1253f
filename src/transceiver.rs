// ABOUTME: Command/response transceiver: one read task multiplexing replies and unsolicited lines
// ABOUTME: Serializes commands, classifies every line, enforces timeouts and resyncs after them

use crate::client::{ModemError, ModemResult};
use crate::command::{Command, Terminal, classify_terminal};
use crate::connection::{self, BoxedWriter, CommandWriter, Line, LineReader};
use crate::dispatcher::{Notification, RouteTable};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Timing knobs for the transceiver
#[derive(Clone, Debug)]
pub struct TransceiverSettings {
    /// Default wait for a terminal line
    pub command_timeout: Duration,
    /// After a timeout, how long the next command waits for the abandoned
    /// one's terminal line before writing anyway
    pub resync_window: Duration,
    /// Retries for a `+CME ERROR: 14` (SIM busy) reply
    pub sim_busy_retries: u32,
    /// Delay before the first SIM-busy retry; later retries wait longer
    pub sim_busy_delay: Duration,
}

impl Default for TransceiverSettings {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(10),
            resync_window: Duration::from_secs(1),
            sim_busy_retries: 3,
            sim_busy_delay: Duration::from_secs(1),
        }
    }
}

/// Lines and terminal collected for one command
struct Reply {
    lines: Vec<String>,
    terminal: Terminal,
}

impl Reply {
    fn into_result(self, command: &str) -> ModemResult<Vec<String>> {
        match self.terminal {
            Terminal::Ok | Terminal::Prompt => Ok(self.lines),
            Terminal::Error | Terminal::NotSupported => Err(ModemError::Command {
                command: command.to_string(),
                response: self.lines,
            }),
            Terminal::CmeError(code) => Err(ModemError::from_cme(command, code)),
            Terminal::CmsError(code) => Err(ModemError::Cms {
                command: command.to_string(),
                code,
            }),
        }
    }
}

struct PendingCommand {
    claims: Option<String>,
    expect_prompt: bool,
    lines: Vec<String>,
    reply: oneshot::Sender<Reply>,
}

/// What the read loop does with lines that are not notifications
enum Slot {
    Idle,
    Pending(PendingCommand),
    /// A command timed out; discard until a terminal-looking line
    Draining(Option<oneshot::Sender<()>>),
    Closed,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the modem stream: a background task reads lines while callers send
/// commands one at a time.
pub struct Transceiver {
    writer: tokio::sync::Mutex<CommandWriter<BoxedWriter>>,
    slot: Arc<Mutex<Slot>>,
    settings: TransceiverSettings,
    shutdown: watch::Sender<bool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Transceiver {
    /// Splits `stream` and starts the read task. Notification lines are
    /// pushed to `notifications` without ever blocking the reader.
    pub fn spawn<S>(
        stream: S,
        routes: RouteTable,
        notifications: mpsc::Sender<Notification>,
        settings: TransceiverSettings,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = connection::split(stream);
        let slot = Arc::new(Mutex::new(Slot::Idle));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(read_loop(
            reader,
            slot.clone(),
            routes,
            notifications,
            shutdown_rx,
        ));

        Transceiver {
            writer: tokio::sync::Mutex::new(writer),
            slot,
            settings,
            shutdown,
            reader: Mutex::new(Some(handle)),
        }
    }

    pub fn settings(&self) -> &TransceiverSettings {
        &self.settings
    }

    /// Sends one command and waits for its response lines
    pub async fn execute(&self, command: &Command) -> ModemResult<Vec<String>> {
        self.exchange().await.execute(command).await
    }

    /// Locks the command channel for a multi-stage exchange
    pub async fn exchange(&self) -> Exchange<'_> {
        Exchange {
            transceiver: self,
            writer: self.writer.lock().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(*lock(&self.slot), Slot::Closed)
    }

    /// Stops the read task and fails any pending command with `Closed`.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        close_slot(&self.slot);
        if let Ok(mut writer) = self.writer.try_lock() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Shutting down modem writer failed");
            }
        }
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Waits, bounded by the resync window, for an abandoned command's
    /// terminal line
    async fn resync(&self) {
        let waiter = {
            let mut slot = lock(&self.slot);
            match &mut *slot {
                Slot::Draining(waiter) => {
                    let (tx, rx) = oneshot::channel();
                    *waiter = Some(tx);
                    Some(rx)
                }
                _ => None,
            }
        };
        let Some(rx) = waiter else { return };

        if tokio::time::timeout(self.settings.resync_window, rx)
            .await
            .is_err()
        {
            debug!("Resync window elapsed without a terminal line");
        }
        let mut slot = lock(&self.slot);
        if matches!(*slot, Slot::Draining(_)) {
            *slot = Slot::Idle;
        }
    }

    fn abandon(&self, drain: bool) {
        let mut slot = lock(&self.slot);
        if matches!(*slot, Slot::Pending(_)) {
            *slot = if drain {
                Slot::Draining(None)
            } else {
                Slot::Idle
            };
        }
    }
}

/// Exclusive use of the command channel.
///
/// Holding an `Exchange` keeps other callers from writing, so a prompt
/// stage and its payload stage cannot be interleaved with another command.
pub struct Exchange<'a> {
    transceiver: &'a Transceiver,
    writer: tokio::sync::MutexGuard<'a, CommandWriter<BoxedWriter>>,
}

impl Exchange<'_> {
    /// Sends `command` and waits for its terminal. SIM-busy replies are
    /// retried with an increasing delay.
    pub async fn execute(&mut self, command: &Command) -> ModemResult<Vec<String>> {
        let settings = self.transceiver.settings.clone();
        let mut attempt = 0;
        loop {
            match self.round_trip(command, None).await {
                Err(e) if e.is_sim_busy() && attempt < settings.sim_busy_retries => {
                    attempt += 1;
                    let delay = settings.sim_busy_delay * attempt;
                    warn!(command = %command.text, attempt, ?delay, "SIM busy, retrying");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Second stage after a prompt: writes `payload` plus Ctrl-Z and waits
    /// for the terminal, reporting errors against `command`.
    pub async fn send_payload(
        &mut self,
        command: &Command,
        payload: &str,
    ) -> ModemResult<Vec<String>> {
        self.round_trip(command, Some(payload)).await
    }

    async fn round_trip(
        &mut self,
        command: &Command,
        payload: Option<&str>,
    ) -> ModemResult<Vec<String>> {
        let transceiver = self.transceiver;
        transceiver.resync().await;

        let expect_prompt = command.expect_prompt && payload.is_none();
        let (tx, rx) = oneshot::channel();
        {
            let mut slot = lock(&transceiver.slot);
            if matches!(*slot, Slot::Closed) {
                return Err(ModemError::Closed);
            }
            *slot = Slot::Pending(PendingCommand {
                claims: command.claims.clone(),
                expect_prompt,
                lines: Vec::new(),
                reply: tx,
            });
        }

        debug!(command = %command.text, payload = payload.is_some(), "Sending command");
        let written = match payload {
            Some(payload) => self.writer.write_payload(payload).await,
            None => self.writer.write_command(&command.text).await,
        };
        if let Err(e) = written {
            transceiver.abandon(false);
            return Err(e.into());
        }

        let timeout = command
            .timeout
            .unwrap_or(transceiver.settings.command_timeout);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply.into_result(&command.text),
            Ok(Err(_)) => Err(ModemError::Closed),
            Err(_) => {
                warn!(command = %command.text, ?timeout, "Command timed out");
                transceiver.abandon(true);
                if expect_prompt {
                    let _ = self.writer.cancel_input().await;
                }
                Err(ModemError::Timeout {
                    command: command.text.clone(),
                })
            }
        }
    }
}

fn close_slot(slot: &Mutex<Slot>) {
    // Dropping a pending reply sender wakes its caller with `Closed`
    let previous = std::mem::replace(&mut *lock(slot), Slot::Closed);
    if matches!(previous, Slot::Pending(_)) {
        debug!("Failing pending command, transceiver closed");
    }
}

async fn read_loop<R>(
    mut reader: LineReader<R>,
    slot: Arc<Mutex<Slot>>,
    routes: RouteTable,
    queue: mpsc::Sender<Notification>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    // A notification still collecting its trailing lines
    let mut partial: Option<(Notification, usize)> = None;

    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => {
                debug!("Read task stopping");
                break;
            }
            line = reader.read_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Modem stream ended");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Reading from modem failed");
                break;
            }
        };

        if let Some((mut notification, remaining)) = partial.take() {
            if let Line::Text(text) = &line {
                notification.payload.push(text.clone());
                if remaining > 1 {
                    partial = Some((notification, remaining - 1));
                } else {
                    forward(&queue, notification);
                }
                continue;
            }
            forward(&queue, notification);
        }

        if let Some((notification, trailing)) = classify_line(&slot, &routes, line) {
            if trailing > 0 {
                partial = Some((notification, trailing));
            } else {
                forward(&queue, notification);
            }
        }
    }

    close_slot(&slot);
}

/// Applies one line to the pending command, or returns it as a notification
/// with the number of trailing lines it still needs.
fn classify_line(
    slot: &Mutex<Slot>,
    routes: &RouteTable,
    line: Line,
) -> Option<(Notification, usize)> {
    let mut slot = lock(slot);
    let text = match line {
        Line::Prompt => {
            if matches!(&*slot, Slot::Pending(p) if p.expect_prompt) {
                complete(&mut slot, Terminal::Prompt);
            } else {
                debug!("Discarding unexpected prompt");
            }
            return None;
        }
        Line::Text(text) => text,
    };

    if let Slot::Pending(pending) = &mut *slot {
        if pending
            .claims
            .as_deref()
            .is_some_and(|prefix| text.starts_with(prefix))
        {
            pending.lines.push(text);
            return None;
        }
    }

    if let Some(route) = routes.classify(&text) {
        let trailing = route.trailing_for(&text);
        return Some((Notification::new(route.kind, text), trailing));
    }

    let terminal = classify_terminal(&text);
    match &mut *slot {
        Slot::Pending(pending) => match terminal {
            Some(terminal) => complete(&mut slot, terminal),
            None => pending.lines.push(text),
        },
        Slot::Draining(_) if terminal.is_some() => {
            debug!(line = %text, "Resynchronized after timeout");
            if let Slot::Draining(Some(waiter)) = std::mem::replace(&mut *slot, Slot::Idle) {
                let _ = waiter.send(());
            }
        }
        Slot::Draining(_) => debug!(line = %text, "Discarding late line"),
        Slot::Idle | Slot::Closed => {
            debug!(line = %text, "Discarding line with no pending command")
        }
    }
    None
}

fn complete(slot: &mut Slot, terminal: Terminal) {
    if let Slot::Pending(pending) = std::mem::replace(slot, Slot::Idle) {
        let _ = pending.reply.send(Reply {
            lines: pending.lines,
            terminal,
        });
    }
}

fn forward(queue: &mpsc::Sender<Notification>, notification: Notification) {
    match queue.try_send(notification) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(line = %dropped.line, "Notification queue full, dropping line")
        }
        Err(mpsc::error::TrySendError::Closed(dropped)) => {
            debug!(line = %dropped.line, "No dispatcher, dropping line")
        }
    }
}
