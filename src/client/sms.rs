// ABOUTME: SMS sending, stored message access and the push receive pipeline for the session
// ABOUTME: Handles text and PDU mode replies, status report correlation and multipart reassembly

use crate::client::error::{ModemError, ModemResult};
use crate::client::modem::{Callbacks, Modem};
use crate::client::response::{
    parse_cmgs, parse_first_group, parse_storage_indication, split_fields,
};
use crate::client::traits::{SmsStore, SmsTransmitter};
use crate::client::types::{
    DeleteFlag, ReceivedSms, SentSms, Sms, SmsStatus, StatusReport,
};
use crate::codec::decode_pdu_hex;
use crate::command::Command;
use crate::datatypes::{DeliveryStatus, SmsTimestamp, gsm7};
use crate::dispatcher::Notification;
use crate::pdu::encode_submit;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A listing header whose message body is still to come
enum PendingEntry {
    Pdu {
        index: u32,
        status: SmsStatus,
    },
    Text {
        index: u32,
        status: SmsStatus,
        number: String,
        timestamp: Option<SmsTimestamp>,
        body: Vec<String>,
    },
}

/// Parses `AT+CMGL` / `AT+CMGR` replies in either mode.
///
/// `index` is given for `AT+CMGR`, whose header has no index field. Lines
/// that fit neither a header nor a body are skipped.
pub(crate) fn parse_stored(
    lines: &[String],
    prefix: &str,
    text_mode: bool,
    index: Option<u32>,
    memory: Option<&str>,
) -> Vec<(u32, Sms)> {
    let mut entries = Vec::new();
    let mut pending: Option<PendingEntry> = None;

    for line in lines {
        if let Some(body) = line.strip_prefix(prefix) {
            finish_entry(pending.take(), memory, &mut entries);
            let mut fields = split_fields(body);
            if let Some(index) = index {
                fields.insert(0, index.to_string());
            }
            pending = if text_mode {
                text_header(&fields, memory, &mut entries)
            } else {
                pdu_header(&fields)
            };
            if pending.is_none() {
                debug!(line = %line, "Skipping unparseable message header");
            }
            continue;
        }

        match pending.as_mut() {
            Some(PendingEntry::Pdu { index, status }) => {
                match decode_pdu_hex(line) {
                    Ok(pdu) => entries.push((
                        *index,
                        Sms::from_pdu(pdu, *status, Some(*index), memory.map(str::to_string)),
                    )),
                    Err(e) => warn!(index = *index, error = %e, "Skipping undecodable PDU"),
                }
                pending = None;
            }
            Some(PendingEntry::Text { body, .. }) => body.push(line.clone()),
            None => debug!(line = %line, "Skipping stray line in message listing"),
        }
    }
    finish_entry(pending, memory, &mut entries);
    entries
}

fn pdu_header(fields: &[String]) -> Option<PendingEntry> {
    Some(PendingEntry::Pdu {
        index: fields.first()?.parse().ok()?,
        status: SmsStatus::parse(fields.get(1)?)?,
    })
}

/// A text-mode header. Status reports are complete on their header line and
/// go straight into `entries`.
fn text_header(
    fields: &[String],
    memory: Option<&str>,
    entries: &mut Vec<(u32, Sms)>,
) -> Option<PendingEntry> {
    let index: u32 = fields.first()?.parse().ok()?;
    let status = SmsStatus::parse(fields.get(1)?)?;

    // idx,stat,fo,mr,"ra",tora,"scts","dt",st
    if fields.len() >= 9 && fields[2].parse::<u8>().is_ok() {
        let report = text_report(&fields[2..], status, Some(index), memory)?;
        entries.push((index, Sms::StatusReport(report)));
        return None;
    }

    Some(PendingEntry::Text {
        index,
        status,
        number: fields.get(2)?.clone(),
        timestamp: fields
            .get(4)
            .and_then(|ts| SmsTimestamp::parse_text(ts).ok()),
        body: Vec::new(),
    })
}

/// Status report fields starting at the first octet:
/// `fo,mr,"ra",tora,"scts","dt",st`
fn text_report(
    fields: &[String],
    status: SmsStatus,
    index: Option<u32>,
    memory: Option<&str>,
) -> Option<StatusReport> {
    let status_code: u8 = fields.get(6)?.parse().ok()?;
    Some(StatusReport {
        reference: fields.get(1)?.parse().ok()?,
        recipient: fields.get(2)?.clone(),
        time_sent: SmsTimestamp::parse_text(fields.get(4)?).ok()?,
        time_finalized: SmsTimestamp::parse_text(fields.get(5)?).ok()?,
        delivery_status: DeliveryStatus::from_code(status_code),
        status_code,
        status,
        index,
        memory: memory.map(str::to_string),
        smsc: None,
    })
}

fn finish_entry(entry: Option<PendingEntry>, memory: Option<&str>, entries: &mut Vec<(u32, Sms)>) {
    let Some(PendingEntry::Text {
        index,
        status,
        number,
        timestamp,
        body,
    }) = entry
    else {
        return;
    };
    let text = body.join("\n");
    if status.is_stored_outgoing() {
        // Text mode does not show the reference of stored outgoing messages
        entries.push((index, Sms::Sent(SentSms::new(number, text, 0))));
        return;
    }
    let Some(timestamp) = timestamp else {
        warn!(index, "Skipping message without a readable timestamp");
        return;
    };
    entries.push((
        index,
        Sms::Received(ReceivedSms {
            sender: number,
            timestamp,
            text,
            status,
            index: Some(index),
            memory: memory.map(str::to_string),
            smsc: None,
            concat: None,
        }),
    ));
}

impl Modem {
    /// Switches the message memory with `AT+CPMS` when it differs
    async fn select_memory(&self, memory: Option<&str>) -> ModemResult<()> {
        let Some(memory) = memory else {
            return Ok(());
        };
        let current = self.state().memory.clone();
        if current.as_deref() == Some(memory) {
            return Ok(());
        }
        self.execute(format!("AT+CPMS=\"{memory}\"")).await?;
        self.state().memory = Some(memory.to_string());
        Ok(())
    }

    /// Picks the character set the text needs, once per change. The list of
    /// supported sets is queried on first use and cached.
    async fn select_charset(&self, text: &str) -> ModemResult<()> {
        let wanted = if gsm7::is_representable(text) {
            "GSM"
        } else {
            "UCS2"
        };
        let known = self.state().charsets.clone();
        let supported = match known {
            Some(supported) => supported,
            None => {
                let supported = match self.execute("AT+CSCS=?").await {
                    Ok(lines) => parse_first_group(&lines, "+CSCS:"),
                    Err(e) if e.is_command_failure() => {
                        debug!(error = %e, "Character set query failed");
                        Vec::new()
                    }
                    Err(e) => return Err(e),
                };
                self.state().charsets = Some(supported.clone());
                supported
            }
        };

        let current = self.state().charset.clone();
        if !supported.iter().any(|charset| charset == wanted)
            || current.as_deref() == Some(wanted)
        {
            return Ok(());
        }
        match self.execute(format!("AT+CSCS=\"{wanted}\"")).await {
            Ok(_) => self.state().charset = Some(wanted.to_string()),
            Err(e) if e.is_command_failure() => {
                warn!(charset = wanted, error = %e, "Selecting character set failed")
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// One `AT+CMGS` exchange: command, prompt, payload, `+CMGS: <mr>`
    async fn submit(&self, command: Command, payload: &str) -> ModemResult<u8> {
        let payload_stage = command.clone().with_timeout(self.config().sms_send_timeout);
        let lines = {
            let mut exchange = self.inner.transceiver.exchange().await;
            exchange.execute(&command).await?;
            exchange.send_payload(&payload_stage, payload).await?
        };
        parse_cmgs(&lines).ok_or_else(|| ModemError::Command {
            command: command.text,
            response: lines,
        })
    }

    async fn send_text_mode(&self, number: &str, text: &str) -> ModemResult<u8> {
        let command = Command::new(format!("AT+CMGS=\"{number}\"")).expecting_prompt();
        self.submit(command, text).await
    }

    async fn send_pdu_mode(&self, number: &str, text: &str) -> ModemResult<u8> {
        self.select_charset(text).await?;
        let reference = self.state().next_reference();
        let pdus = encode_submit(number, text, reference, &self.config().submit)?;
        let mut modem_reference = reference;
        for (part, pdu) in pdus.iter().enumerate() {
            debug!(part = part + 1, total = pdus.len(), reference, "Sending PDU");
            let command =
                Command::new(format!("AT+CMGS={}", pdu.tpdu_length)).expecting_prompt();
            modem_reference = self.submit(command, &pdu.to_hex()).await?;
        }
        Ok(modem_reference)
    }

    async fn wait_for_report(&self, reference: u8, timeout: Duration) -> ModemResult<StatusReport> {
        let report = {
            let mut state = self.state();
            match state.claim_report(reference) {
                Some(report) => Ok(report),
                None => {
                    let (waiter, report) = tokio::sync::oneshot::channel();
                    state.pending_reports.insert(reference, waiter);
                    Err(report)
                }
            }
        };
        let report = match report {
            Ok(report) => return Ok(report),
            Err(report) => report,
        };

        match tokio::time::timeout(timeout, report).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(_)) => Err(ModemError::Closed),
            Err(_) => {
                self.state().pending_reports.remove(&reference);
                Err(ModemError::DeliveryTimeout(timeout))
            }
        }
    }

    /// Hands a received message or report to the application
    pub(crate) fn deliver(&self, sms: Sms) {
        match sms {
            Sms::Received(sms) => {
                let complete = self.state().reassembler.push(sms);
                if let Some(sms) = complete {
                    info!(sender = %sms.sender, "SMS received");
                    Callbacks::invoke("sms", self.inner.callbacks.sms.as_ref(), sms);
                }
            }
            Sms::StatusReport(report) => {
                info!(
                    reference = report.reference,
                    status = ?report.delivery_status,
                    "Status report received"
                );
                self.state().route_report(report.clone());
                Callbacks::invoke(
                    "status_report",
                    self.inner.callbacks.status_report.as_ref(),
                    report,
                );
            }
            Sms::Sent(sent) => debug!(number = %sent.number, "Ignoring stored outgoing message"),
        }
    }

    /// `+CMTI: "<mem>",<index>`: read, hand over, delete
    pub(crate) async fn on_sms_stored(&self, body: &str) {
        let Some((memory, index)) = parse_storage_indication(body) else {
            warn!(body, "Malformed new message indication");
            return;
        };
        if self.inner.callbacks.sms.is_none() {
            debug!(index, %memory, "No SMS callback, leaving message stored");
            return;
        }
        self.fetch_pushed(index, &memory).await;
    }

    /// `+CDSI: "<mem>",<index>`: read, correlate, hand over, delete
    pub(crate) async fn on_report_stored(&self, body: &str) {
        match parse_storage_indication(body) {
            Some((memory, index)) => self.fetch_pushed(index, &memory).await,
            None => warn!(body, "Malformed status report indication"),
        }
    }

    async fn fetch_pushed(&self, index: u32, memory: &str) {
        match self.read_stored_sms(index, Some(memory)).await {
            Ok(sms) => {
                self.deliver(sms);
                if let Err(e) = self.delete_stored_sms(index, None).await {
                    warn!(index, error = %e, "Deleting pushed message failed");
                }
            }
            Err(e) => warn!(index, memory, error = %e, "Reading pushed message failed"),
        }
    }

    /// `+CMT:` direct delivery; the message is on the trailing line
    pub(crate) fn on_sms_delivered(&self, notification: &Notification) {
        let Some(payload) = notification.payload.first() else {
            warn!(line = %notification.line, "Direct delivery without payload");
            return;
        };
        let text_mode = self.state().text_mode;
        let sms = if text_mode {
            let fields = split_fields(notification.body());
            let timestamp = fields.get(2).and_then(|ts| SmsTimestamp::parse_text(ts).ok());
            match (fields.first(), timestamp) {
                (Some(sender), Some(timestamp)) => Sms::Received(ReceivedSms {
                    sender: sender.clone(),
                    timestamp,
                    text: notification.payload.join("\n"),
                    status: SmsStatus::ReceivedUnread,
                    index: None,
                    memory: None,
                    smsc: None,
                    concat: None,
                }),
                _ => {
                    warn!(line = %notification.line, "Malformed direct delivery header");
                    return;
                }
            }
        } else {
            match decode_pdu_hex(payload) {
                Ok(pdu) => Sms::from_pdu(pdu, SmsStatus::ReceivedUnread, None, None),
                Err(e) => {
                    warn!(error = %e, "Undecodable directly delivered PDU");
                    return;
                }
            }
        };
        self.deliver(sms);
    }

    /// `+CDS:` direct status report, inline in text mode or as a PDU on the
    /// trailing line
    pub(crate) fn on_report_delivered(&self, notification: &Notification) {
        let sms = match notification.payload.first() {
            Some(payload) => decode_pdu_hex(payload)
                .map(|pdu| Sms::from_pdu(pdu, SmsStatus::ReceivedUnread, None, None))
                .map_err(|e| e.to_string()),
            None => text_report(
                &split_fields(notification.body()),
                SmsStatus::ReceivedUnread,
                None,
                None,
            )
            .map(Sms::StatusReport)
            .ok_or_else(|| "malformed report".to_string()),
        };
        match sms {
            Ok(sms) => self.deliver(sms),
            Err(e) => warn!(line = %notification.line, error = %e, "Unusable status report"),
        }
    }

    /// Lists stored messages together with their storage indices
    async fn list_entries(
        &self,
        status: SmsStatus,
        memory: Option<&str>,
    ) -> ModemResult<Vec<(u32, Sms)>> {
        self.select_memory(memory).await?;
        let text_mode = self.state().text_mode;
        let command = if text_mode {
            format!("AT+CMGL=\"{}\"", status.text_name())
        } else {
            format!("AT+CMGL={}", u8::from(status))
        };
        let lines = self.execute(command).await?;
        let memory = self.state().memory.clone();
        let entries = parse_stored(&lines, "+CMGL:", text_mode, None, memory.as_deref());
        debug!(count = entries.len(), ?status, "Listed stored messages");
        Ok(entries)
    }
}

impl SmsTransmitter for Modem {
    async fn send_sms(
        &self,
        number: &str,
        text: &str,
        wait_for_report: bool,
        delivery_timeout: Option<Duration>,
    ) -> ModemResult<SentSms> {
        let mut text_mode = self.state().text_mode;
        if text_mode && !gsm7::is_representable(text) {
            info!("Message needs UCS2, switching to PDU mode");
            self.execute("AT+CMGF=0").await?;
            self.state().text_mode = false;
            text_mode = false;
        }

        let reference = if text_mode {
            self.send_text_mode(number, text).await?
        } else {
            self.send_pdu_mode(number, text).await?
        };
        info!(number, reference, "SMS sent");

        let mut sent = SentSms::new(number, text, reference);
        if wait_for_report {
            let timeout = delivery_timeout.unwrap_or(self.config().delivery_timeout);
            let report = self.wait_for_report(reference, timeout).await?;
            sent.apply_report(report);
        }
        Ok(sent)
    }

    async fn reply(&self, received: &ReceivedSms, text: &str) -> ModemResult<SentSms> {
        self.send_sms(&received.sender, text, false, None).await
    }
}

impl SmsStore for Modem {
    async fn list_stored_sms(
        &self,
        status: SmsStatus,
        memory: Option<&str>,
        delete: bool,
    ) -> ModemResult<Vec<Sms>> {
        let entries = self.list_entries(status, memory).await?;
        if delete {
            if status == SmsStatus::All {
                self.execute(format!("AT+CMGD=1,{}", u8::from(DeleteFlag::All)))
                    .await?;
            } else {
                for (index, _) in &entries {
                    self.delete_stored_sms(*index, None).await?;
                }
            }
        }
        Ok(entries.into_iter().map(|(_, sms)| sms).collect())
    }

    async fn read_stored_sms(&self, index: u32, memory: Option<&str>) -> ModemResult<Sms> {
        self.select_memory(memory).await?;
        let command = format!("AT+CMGR={index}");
        let lines = self.execute(command.clone()).await?;
        let (text_mode, memory) = {
            let state = self.state();
            (state.text_mode, state.memory.clone())
        };
        let sms = parse_stored(&lines, "+CMGR:", text_mode, Some(index), memory.as_deref())
            .into_iter()
            .next()
            .map(|(_, sms)| sms);
        sms.ok_or(ModemError::UnexpectedResponse {
            command,
            response: lines,
        })
    }

    async fn delete_stored_sms(&self, index: u32, memory: Option<&str>) -> ModemResult<()> {
        self.select_memory(memory).await?;
        self.execute(format!("AT+CMGD={index},0")).await?;
        Ok(())
    }

    async fn delete_multiple_stored_sms(
        &self,
        flag: u8,
        memory: Option<&str>,
    ) -> ModemResult<()> {
        let flag = DeleteFlag::try_from(flag)
            .map_err(|_| ModemError::InvalidValue(format!("delete flag {flag}, expected 1-4")))?;
        self.select_memory(memory).await?;
        self.execute(format!("AT+CMGD=1,{}", u8::from(flag))).await?;
        Ok(())
    }

    async fn process_stored_sms(&self, unread_only: bool) -> ModemResult<usize> {
        let mut statuses = vec![SmsStatus::ReceivedUnread];
        if !unread_only {
            statuses.insert(0, SmsStatus::ReceivedRead);
        }
        let mut processed = 0;
        for status in statuses {
            let entries = self.list_entries(status, None).await?;
            let mut fetched = Vec::with_capacity(entries.len());
            for (index, sms) in entries {
                processed += 1;
                fetched.push(index);
                self.deliver(sms);
            }
            for index in fetched {
                match self.delete_stored_sms(index, None).await {
                    Ok(()) => {}
                    Err(e) if e.is_command_failure() => {
                        warn!(index, error = %e, "Processed message left in storage")
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(processed)
    }
}
