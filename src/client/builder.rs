// ABOUTME: Builder for modem sessions: configuration, application callbacks and notification routes
// ABOUTME: Connects over any async byte stream or TCP and runs the connect handshake

use crate::client::call::Call;
use crate::client::config::ModemConfig;
use crate::client::error::ModemResult;
use crate::client::modem::{Callbacks, Modem};
use crate::client::traits::ModemSession;
use crate::client::types::{ReceivedSms, StatusReport};
use crate::dispatcher::{NotificationKind, RouteTable};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::error;

/// Builder for a [`Modem`] session
///
/// Callbacks run on the session's dispatcher task, one notification at a
/// time. A callback that panics is logged and does not stop the session.
#[derive(Default)]
pub struct ModemBuilder {
    config: ModemConfig,
    callbacks: Callbacks,
    routes: RouteTable,
}

impl ModemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ModemConfig) -> Self {
        self.config = config;
        self
    }

    /// Called for every received message, once all parts of a
    /// concatenated message have arrived
    pub fn on_sms_received<F>(mut self, callback: F) -> Self
    where
        F: Fn(ReceivedSms) + Send + Sync + 'static,
    {
        self.callbacks.sms = Some(Arc::new(callback));
        self
    }

    pub fn on_status_report<F>(mut self, callback: F) -> Self
    where
        F: Fn(StatusReport) + Send + Sync + 'static,
    {
        self.callbacks.status_report = Some(Arc::new(callback));
        self
    }

    /// Called once per incoming call, after the caller number is known when
    /// the modem reports one
    pub fn on_incoming_call<F>(mut self, callback: F) -> Self
    where
        F: Fn(Call) + Send + Sync + 'static,
    {
        self.callbacks.incoming_call = Some(Arc::new(callback));
        self
    }

    /// Routes an extra unsolicited line prefix, e.g. a vendor indication
    /// that would otherwise end up in a command response
    pub fn with_route(
        mut self,
        prefix: &'static str,
        kind: NotificationKind,
        trailing_lines: usize,
    ) -> Self {
        self.routes = self.routes.with_route(prefix, kind, trailing_lines);
        self
    }

    /// Starts a session over `stream` and runs the connect handshake
    ///
    /// On failure the session is closed before the error is returned.
    pub async fn connect<S>(self, stream: S) -> ModemResult<Modem>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let modem = Modem::spawn(stream, self.config, self.callbacks, self.routes);
        if let Err(e) = modem.handshake().await {
            error!(error = %e, "Modem initialization failed");
            modem.close().await;
            return Err(e);
        }
        Ok(modem)
    }

    /// Connects to a modem exposed over TCP, e.g. by a serial-to-network bridge
    pub async fn connect_tcp<A: ToSocketAddrs>(self, addr: A) -> ModemResult<Modem> {
        let stream = TcpStream::connect(addr).await?;
        self.connect(stream).await
    }
}
