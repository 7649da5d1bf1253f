//! Session tests against a scripted modem on the far end of an in-memory stream

use crate::client::{
    CallControl, CallDirection, CallEventProfile, CallState, EndReason, ModemBuilder,
    ModemConfig, ModemError, ModemSession, SentStatus, Sms, SmsStatus, SmsStore,
    SmsTransmitter, VendorShape,
};
use crate::pdu::{SubmitOptions, encode_submit};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

const SMSC: &str = "+CSCA: \"+27829100000\",145";
const STORED_DELIVER: &str =
    "07917248014000F3240B917247587706F400003110824115248012C8329BFD06C9C373B8B82C97E741F034";
const STORED_REPORT: &str = "07917248014000F506B70AA18092020000317071518590803170715185418000";

/// `AT+CLAC` reply of a Huawei stick
const HUAWEI_COMMANDS: &[&str] = &["^CVOICE", "^DTMF", "+CLCC", "+CMGS", "+CSCS"];
/// `AT+CLAC` reply of a modem without call events
const PLAIN_COMMANDS: &[&str] = &["+CLAC: +CLCC,+VTS,+CMGS,+CSCS"];

/// The modem side of the stream
struct FakeModem {
    stream: DuplexStream,
}

impl FakeModem {
    async fn read_until(&mut self, end: u8) -> String {
        let mut bytes = Vec::new();
        loop {
            let byte = tokio::time::timeout(Duration::from_secs(2), self.stream.read_u8())
                .await
                .expect("session went quiet")
                .expect("session hung up");
            if byte == end {
                break;
            }
            bytes.push(byte);
        }
        String::from_utf8(bytes).unwrap()
    }

    async fn expect(&mut self, command: &str) {
        assert_eq!(self.read_until(b'\r').await, command);
    }

    async fn expect_payload(&mut self, payload: &str) {
        assert_eq!(self.read_until(0x1A).await, payload);
    }

    async fn send(&mut self, lines: &[&str]) {
        for line in lines {
            let framed = format!("\r\n{line}\r\n");
            self.stream.write_all(framed.as_bytes()).await.unwrap();
        }
    }

    async fn prompt(&mut self) {
        self.stream.write_all(b"\r\n> ").await.unwrap();
    }

    async fn respond(&mut self, command: &str, lines: &[&str]) {
        self.expect(command).await;
        self.send(lines).await;
    }

    async fn ok(&mut self, command: &str) {
        self.respond(command, &["OK"]).await;
    }

    /// A handshake where every optional step succeeds
    async fn handshake(&mut self, commands: &[&str]) {
        self.ok("ATZ").await;
        self.ok("ATE0").await;
        self.ok("AT+CMEE=1").await;
        self.respond("AT+CPIN?", &["+CPIN: READY", "OK"]).await;
        self.respond("AT+CFUN?", &["+CFUN: 1", "OK"]).await;
        self.respond("AT+CSCA?", &[SMSC, "OK"]).await;
        self.ok("AT+CMGF=0").await;
        self.respond("AT+CSCA?", &[SMSC, "OK"]).await;
        self.finish_handshake(commands).await;
    }

    async fn finish_handshake(&mut self, commands: &[&str]) {
        let mut reply = commands.to_vec();
        reply.push("OK");
        self.respond("AT+CLAC", &reply).await;
        self.ok("AT+CLIP=1").await;
        self.ok("AT+CRC=1").await;
        self.ok("AT+CNMI=2,1,0,2").await;
        self.respond(
            "AT+CPMS=?",
            &["+CPMS: (\"ME\",\"SM\",\"SR\"),(\"ME\",\"SM\"),(\"ME\",\"SM\")", "OK"],
        )
        .await;
    }
}

fn test_config() -> ModemConfig {
    ModemConfig::default()
        .with_command_timeout(Duration::from_millis(500))
        .with_delivery_timeout(Duration::from_millis(500))
        .with_polling_interval(Duration::from_millis(20))
        .with_dial_timing(Duration::from_millis(10), Duration::from_millis(500))
        .with_resync_window(Duration::from_millis(50))
}

fn pair() -> (DuplexStream, FakeModem) {
    let (host, device) = tokio::io::duplex(4096);
    (host, FakeModem { stream: device })
}

async fn connect(builder: ModemBuilder, commands: &[&str]) -> (crate::client::Modem, FakeModem) {
    let (host, mut fake) = pair();
    let connecting = tokio::spawn(builder.with_config(test_config()).connect(host));
    fake.handshake(commands).await;
    let modem = connecting.await.unwrap().unwrap();
    (modem, fake)
}

/// Polls `check` until it holds or a second has passed
async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn handshake_detects_huawei_features() {
    let (modem, _fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;
    let caps = modem.capabilities();
    assert_eq!(caps.vendor_shape, VendorShape::UnprefixedLines);
    assert_eq!(caps.call_events, CallEventProfile::Huawei);
    assert!(caps.functionality_mode);
    assert!(caps.caller_id);
    assert!(caps.extended_ring);
    assert!(caps.sms_push);
    assert!(caps.dtmf);
    assert_eq!(caps.memories, vec!["ME", "SM", "SR"]);
    assert!(!modem.is_closed());
}

#[tokio::test]
async fn handshake_survives_unsupported_optional_commands() {
    let (host, mut fake) = pair();
    let connecting = tokio::spawn(ModemBuilder::new().with_config(test_config()).connect(host));

    fake.ok("ATZ").await;
    fake.ok("ATE0").await;
    fake.respond("AT+CMEE=1", &["ERROR"]).await;
    fake.respond("AT+CPIN?", &["+CPIN: READY", "OK"]).await;
    fake.respond("AT+CFUN?", &["ERROR"]).await;
    fake.respond("AT+CSCA?", &["ERROR"]).await;
    fake.respond("AT+CMGF=0", &["ERROR"]).await;
    fake.respond("AT+CLAC", &["ERROR"]).await;
    fake.ok("AT").await;
    for command in [
        "^CVOICE", "+VTS", "^DTMF", "^USSDMODE", "+WIND", "+ZPAS", "+CSCS", "+CNUM",
    ] {
        let supported = matches!(command, "+VTS" | "+CSCS");
        let reply = if supported { "OK" } else { "ERROR" };
        fake.respond(&format!("AT{command}=?"), &[reply]).await;
    }
    fake.respond("AT+CLIP=1", &["+CME ERROR: 3"]).await;
    fake.respond("AT+CNMI=2,1,0,2", &["+CMS ERROR: 303"]).await;
    fake.respond("AT+CNMI=2,1,0,1,0", &["ERROR"]).await;
    fake.respond("AT+CPMS=?", &["ERROR"]).await;

    let modem = connecting.await.unwrap().unwrap();
    let caps = modem.capabilities();
    assert_eq!(caps.vendor_shape, VendorShape::TrialProbe);
    assert_eq!(caps.commands, vec!["+VTS", "+CSCS"]);
    assert_eq!(caps.call_events, CallEventProfile::Polling);
    assert!(caps.dtmf);
    assert!(!caps.functionality_mode);
    assert!(!caps.caller_id);
    assert!(!caps.extended_ring);
    assert!(!caps.sms_push);
    assert!(!caps.storage_query);
}

#[tokio::test]
async fn handshake_unlocks_sim_with_configured_pin() {
    let (host, mut fake) = pair();
    let connecting = tokio::spawn(
        ModemBuilder::new()
            .with_config(test_config().with_pin("1234"))
            .connect(host),
    );
    fake.ok("ATZ").await;
    fake.ok("ATE0").await;
    fake.ok("AT+CMEE=1").await;
    fake.respond("AT+CPIN?", &["+CPIN: SIM PIN", "OK"]).await;
    fake.ok("AT+CPIN=\"1234\"").await;
    fake.respond("AT+CFUN?", &["+CFUN: 0", "OK"]).await;
    fake.ok("AT+CFUN=1").await;
    fake.respond("AT+CSCA?", &[SMSC, "OK"]).await;
    fake.ok("AT+CMGF=0").await;
    fake.respond("AT+CSCA?", &["+CSCA: \"\",129", "OK"]).await;
    fake.ok("AT+CSCA=\"+27829100000\"").await;
    fake.finish_handshake(PLAIN_COMMANDS).await;

    let modem = connecting.await.unwrap().unwrap();
    assert_eq!(modem.capabilities().call_events, CallEventProfile::Polling);
}

#[tokio::test]
async fn handshake_continues_when_full_functionality_is_refused() {
    let (host, mut fake) = pair();
    let connecting = tokio::spawn(ModemBuilder::new().with_config(test_config()).connect(host));
    fake.ok("ATZ").await;
    fake.ok("ATE0").await;
    fake.ok("AT+CMEE=1").await;
    fake.respond("AT+CPIN?", &["+CPIN: READY", "OK"]).await;
    fake.respond("AT+CFUN?", &["+CFUN: 0", "OK"]).await;
    fake.respond("AT+CFUN=1", &["ERROR"]).await;
    fake.respond("AT+CSCA?", &[SMSC, "OK"]).await;
    fake.ok("AT+CMGF=0").await;
    fake.respond("AT+CSCA?", &[SMSC, "OK"]).await;
    fake.finish_handshake(HUAWEI_COMMANDS).await;

    let modem = connecting.await.unwrap().unwrap();
    assert!(!modem.is_closed());
    assert!(modem.capabilities().functionality_mode);
}

#[tokio::test]
async fn handshake_fails_without_pin() {
    let (host, mut fake) = pair();
    let connecting = tokio::spawn(ModemBuilder::new().with_config(test_config()).connect(host));
    fake.ok("ATZ").await;
    fake.ok("ATE0").await;
    fake.ok("AT+CMEE=1").await;
    fake.respond("AT+CPIN?", &["+CME ERROR: 11"]).await;

    assert!(matches!(
        connecting.await.unwrap(),
        Err(ModemError::PinRequired)
    ));
}

#[tokio::test]
async fn notifications_interleaved_with_responses() {
    let (modem, mut fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;

    let m = modem.clone();
    let query = tokio::spawn(async move { m.manufacturer().await });
    fake.respond("AT+CGMI", &["huawei", "RING", "OK"]).await;
    assert_eq!(query.await.unwrap().unwrap(), "huawei");

    let m = modem.clone();
    eventually(move || !m.active_calls().is_empty()).await;
    let call = &modem.active_calls()[0];
    assert_eq!(call.direction(), CallDirection::Incoming);
    assert_eq!(call.state(), CallState::ActiveUnanswered);
}

#[tokio::test]
async fn huawei_outgoing_call_lifecycle() {
    let (modem, mut fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;

    let m = modem.clone();
    let dialling = tokio::spawn(async move { m.dial("+27820001111").await });
    fake.respond("ATD+27820001111;", &["OK", "^ORIG:1,0"]).await;
    let call = dialling.await.unwrap().unwrap();
    assert_eq!(call.id(), 1);
    assert_eq!(call.state(), CallState::ActiveUnanswered);
    assert!(matches!(
        call.send_dtmf("1").await,
        Err(ModemError::InvalidState(_))
    ));

    fake.send(&["^CONF:1", "^CONN:1,0"]).await;
    assert!(call.wait_until_answered(Duration::from_secs(1)).await.unwrap());

    let c = call.clone();
    let tones = tokio::spawn(async move { c.send_dtmf("1#").await });
    fake.ok("AT^DTMF=1,1").await;
    fake.ok("AT^DTMF=1,#").await;
    tones.await.unwrap().unwrap();
    assert!(matches!(
        call.send_dtmf("X").await,
        Err(ModemError::InvalidValue(_))
    ));

    let c = call.clone();
    let hangup = tokio::spawn(async move { c.hangup().await });
    fake.ok("ATH").await;
    hangup.await.unwrap().unwrap();
    fake.send(&["^CEND:1,5,104,16"]).await;

    assert_eq!(call.state(), CallState::Ended(EndReason::Local));
    assert!(modem.active_calls().is_empty());
}

#[tokio::test]
async fn unanswered_outgoing_call_is_rejected() {
    let (modem, mut fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;

    let m = modem.clone();
    let dialling = tokio::spawn(async move { m.dial("+27820001111").await });
    fake.respond("ATD+27820001111;", &["^ORIG:1,0", "OK"]).await;
    let call = dialling.await.unwrap().unwrap();

    fake.send(&["^CEND:1,0,104,17"]).await;
    let reason = call.wait_until_ended(Duration::from_secs(1)).await.unwrap();
    assert_eq!(reason, EndReason::Rejected);
    assert!(!call.is_active());
}

#[tokio::test]
async fn incoming_call_is_announced_with_caller_id() {
    let (calls, mut incoming) = mpsc::unbounded_channel();
    let builder = ModemBuilder::new().on_incoming_call(move |call| {
        let _ = calls.send(call);
    });
    let (modem, mut fake) = connect(builder, HUAWEI_COMMANDS).await;

    fake.send(&["RING", "+CLIP: \"+27825551234\",145,,,,0"]).await;
    let call = tokio::time::timeout(Duration::from_secs(1), incoming.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(call.number().as_deref(), Some("+27825551234"));
    assert_eq!(call.ring_count(), 1);

    // Further rings belong to the same call and are not announced again
    fake.send(&["RING"]).await;
    let c = call.clone();
    eventually(move || c.ring_count() == 2).await;
    assert!(incoming.try_recv().is_err());

    let c = call.clone();
    let answering = tokio::spawn(async move { c.answer().await });
    fake.ok("ATA").await;
    answering.await.unwrap().unwrap();
    assert_eq!(call.state(), CallState::ActiveAnswered);

    fake.send(&[format!("^CEND:{},12,104,16", call.id()).as_str()]).await;
    let reason = call.wait_until_ended(Duration::from_secs(1)).await.unwrap();
    assert_eq!(reason, EndReason::Remote);
    assert!(modem.active_calls().is_empty());
}

#[tokio::test]
async fn polled_call_follows_call_list() {
    let (modem, mut fake) = connect(ModemBuilder::new(), PLAIN_COMMANDS).await;

    let m = modem.clone();
    let dialling = tokio::spawn(async move { m.dial("+27820001111").await });
    fake.ok("ATD+27820001111;").await;
    // The call list can lag behind the dial
    fake.ok("AT+CLCC").await;
    fake.respond(
        "AT+CLCC",
        &["+CLCC: 1,0,2,0,0,\"+27820001111\",145", "OK"],
    )
    .await;
    let call = dialling.await.unwrap().unwrap();
    assert_eq!(call.state(), CallState::ActiveUnanswered);

    fake.respond(
        "AT+CLCC",
        &["+CLCC: 1,0,3,0,0,\"+27820001111\",145", "OK"],
    )
    .await;
    fake.respond(
        "AT+CLCC",
        &["+CLCC: 1,0,0,0,0,\"+27820001111\",145", "OK"],
    )
    .await;
    assert!(call.wait_until_answered(Duration::from_secs(1)).await.unwrap());

    fake.ok("AT+CLCC").await;
    let reason = call.wait_until_ended(Duration::from_secs(1)).await.unwrap();
    assert_eq!(reason, EndReason::Remote);
    assert!(modem.active_calls().is_empty());
}

#[tokio::test]
async fn send_waits_for_status_report() {
    let (modem, mut fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;
    let pdu = encode_submit("+27820001111", "Hi there", 0, &SubmitOptions::default())
        .unwrap()
        .remove(0);

    let m = modem.clone();
    let sending = tokio::spawn(async move {
        m.send_sms("+27820001111", "Hi there", true, Some(Duration::from_secs(1)))
            .await
    });
    fake.respond("AT+CSCS=?", &["+CSCS: (\"IRA\",\"GSM\",\"UCS2\")", "OK"])
        .await;
    fake.ok("AT+CSCS=\"GSM\"").await;
    fake.expect(&format!("AT+CMGS={}", pdu.tpdu_length)).await;
    fake.prompt().await;
    fake.expect_payload(&pdu.to_hex()).await;
    fake.send(&["+CMGS: 183", "OK", "+CDSI: \"SM\",2"]).await;

    fake.ok("AT+CPMS=\"SM\"").await;
    fake.respond("AT+CMGR=2", &["+CMGR: 0,,24", STORED_REPORT, "OK"])
        .await;
    fake.ok("AT+CMGD=2,0").await;

    let sent = sending.await.unwrap().unwrap();
    assert_eq!(sent.reference, 183);
    assert_eq!(sent.status, SentStatus::Delivered);
    assert_eq!(sent.report.map(|report| report.recipient).as_deref(), Some("0829200000"));
}

#[tokio::test]
async fn send_times_out_without_report() {
    let (modem, mut fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;
    let pdu = encode_submit("+27820001111", "Hi", 0, &SubmitOptions::default())
        .unwrap()
        .remove(0);

    let m = modem.clone();
    let sending = tokio::spawn(async move {
        m.send_sms("+27820001111", "Hi", true, Some(Duration::from_millis(100)))
            .await
    });
    fake.respond("AT+CSCS=?", &["+CSCS: (\"GSM\",\"UCS2\")", "OK"]).await;
    fake.ok("AT+CSCS=\"GSM\"").await;
    fake.expect(&format!("AT+CMGS={}", pdu.tpdu_length)).await;
    fake.prompt().await;
    fake.expect_payload(&pdu.to_hex()).await;
    fake.send(&["+CMGS: 12", "OK"]).await;

    assert!(matches!(
        sending.await.unwrap(),
        Err(ModemError::DeliveryTimeout(_))
    ));
}

#[tokio::test]
async fn message_reference_wraps() {
    let (modem, mut fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;
    modem.state().set_next_reference(255);

    let m = modem.clone();
    let sending = tokio::spawn(async move {
        let first = m.send_sms("+27820001111", "one", false, None).await?;
        let second = m.send_sms("+27820001111", "two", false, None).await?;
        Ok::<_, ModemError>((first, second))
    });

    fake.respond("AT+CSCS=?", &["+CSCS: (\"GSM\",\"UCS2\")", "OK"]).await;
    fake.ok("AT+CSCS=\"GSM\"").await;
    for (text, reference) in [("one", 255u8), ("two", 0u8)] {
        let pdu = encode_submit("+27820001111", text, reference, &SubmitOptions::default())
            .unwrap()
            .remove(0);
        fake.expect(&format!("AT+CMGS={}", pdu.tpdu_length)).await;
        fake.prompt().await;
        fake.expect_payload(&pdu.to_hex()).await;
        fake.send(&[format!("+CMGS: {reference}").as_str(), "OK"]).await;
    }

    let (first, second) = sending.await.unwrap().unwrap();
    assert_eq!(first.reference, 255);
    assert_eq!(second.reference, 0);
    assert_eq!(first.status, SentStatus::Enroute);
}

#[tokio::test]
async fn text_mode_send() {
    let (host, mut fake) = pair();
    let connecting = tokio::spawn(
        ModemBuilder::new()
            .with_config(test_config().with_text_mode(true))
            .connect(host),
    );
    fake.ok("ATZ").await;
    fake.ok("ATE0").await;
    fake.ok("AT+CMEE=1").await;
    fake.respond("AT+CPIN?", &["+CPIN: READY", "OK"]).await;
    fake.respond("AT+CFUN?", &["+CFUN: 1", "OK"]).await;
    fake.respond("AT+CSCA?", &[SMSC, "OK"]).await;
    fake.ok("AT+CMGF=1").await;
    fake.ok("AT+CSMP=49,167,0,0").await;
    fake.respond("AT+CSCA?", &[SMSC, "OK"]).await;
    fake.finish_handshake(HUAWEI_COMMANDS).await;
    let modem = connecting.await.unwrap().unwrap();

    let m = modem.clone();
    let sending =
        tokio::spawn(async move { m.send_sms("+27820001111", "Hello", false, None).await });
    fake.expect("AT+CMGS=\"+27820001111\"").await;
    fake.prompt().await;
    fake.expect_payload("Hello").await;
    fake.send(&["+CMGS: 7", "OK"]).await;

    let sent = sending.await.unwrap().unwrap();
    assert_eq!(sent.reference, 7);
    assert_eq!(sent.text, "Hello");
}

#[tokio::test]
async fn list_and_delete_stored_messages() {
    let (modem, mut fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;

    let m = modem.clone();
    let listing = tokio::spawn(async move { m.list_stored_sms(SmsStatus::All, None, true).await });
    fake.respond(
        "AT+CMGL=4",
        &[
            "+CMGL: 1,1,,35",
            STORED_DELIVER,
            "+CMGL: 2,0,,24",
            STORED_REPORT,
            "OK",
        ],
    )
    .await;
    fake.ok("AT+CMGD=1,4").await;

    let messages = listing.await.unwrap().unwrap();
    assert_eq!(messages.len(), 2);
    match &messages[0] {
        Sms::Received(sms) => {
            assert_eq!(sms.sender, "+27748577604");
            assert_eq!(sms.status, SmsStatus::ReceivedRead);
            assert_eq!(sms.index, Some(1));
        }
        other => panic!("expected a received message, got {other:?}"),
    }
    assert!(matches!(&messages[1], Sms::StatusReport(report) if report.reference == 183));

    let m = modem.clone();
    let deleting = tokio::spawn(async move { m.delete_multiple_stored_sms(2, Some("ME")).await });
    fake.ok("AT+CPMS=\"ME\"").await;
    fake.ok("AT+CMGD=1,2").await;
    deleting.await.unwrap().unwrap();

    assert!(matches!(
        modem.delete_multiple_stored_sms(7, None).await,
        Err(ModemError::InvalidValue(_))
    ));
}

#[tokio::test]
async fn read_missing_message_is_unexpected() {
    let (modem, mut fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;
    let m = modem.clone();
    let reading = tokio::spawn(async move { m.read_stored_sms(9, None).await });
    fake.ok("AT+CMGR=9").await;
    assert!(matches!(
        reading.await.unwrap(),
        Err(ModemError::UnexpectedResponse { .. })
    ));
}

#[tokio::test]
async fn stored_message_indication_reaches_callback() {
    let (messages, mut received) = mpsc::unbounded_channel();
    let builder = ModemBuilder::new().on_sms_received(move |sms| {
        let _ = messages.send(sms);
    });
    let (_modem, mut fake) = connect(builder, HUAWEI_COMMANDS).await;

    fake.send(&["+CMTI: \"SM\",5"]).await;
    fake.ok("AT+CPMS=\"SM\"").await;
    fake.respond("AT+CMGR=5", &["+CMGR: 0,,35", STORED_DELIVER, "OK"])
        .await;
    fake.ok("AT+CMGD=5,0").await;

    let sms = tokio::time::timeout(Duration::from_secs(1), received.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sms.sender, "+27748577604");
    assert_eq!(sms.text, "Hello raspberry pi");
    assert_eq!(sms.index, Some(5));
    assert_eq!(sms.memory.as_deref(), Some("SM"));
}

#[tokio::test]
async fn direct_delivery_reaches_callback() {
    let (messages, mut received) = mpsc::unbounded_channel();
    let builder = ModemBuilder::new().on_sms_received(move |sms| {
        let _ = messages.send(sms);
    });
    let (_modem, mut fake) = connect(builder, HUAWEI_COMMANDS).await;

    fake.send(&["+CMT: ,35", STORED_DELIVER]).await;
    let sms = tokio::time::timeout(Duration::from_secs(1), received.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sms.text, "Hello raspberry pi");
    assert_eq!(sms.index, None);
}

#[tokio::test]
async fn process_stored_hands_over_read_then_unread() {
    let (messages, mut received) = mpsc::unbounded_channel();
    let builder = ModemBuilder::new().on_sms_received(move |sms| {
        let _ = messages.send(sms);
    });
    let (modem, mut fake) = connect(builder, HUAWEI_COMMANDS).await;

    let m = modem.clone();
    let processing = tokio::spawn(async move { m.process_stored_sms(false).await });
    fake.respond("AT+CMGL=1", &["+CMGL: 3,1,,35", STORED_DELIVER, "OK"])
        .await;
    fake.ok("AT+CMGD=3,0").await;
    fake.respond("AT+CMGL=0", &["OK"]).await;

    assert_eq!(processing.await.unwrap().unwrap(), 1);
    let sms = received.try_recv().unwrap();
    assert_eq!(sms.status, SmsStatus::ReceivedRead);
}

#[tokio::test]
async fn process_stored_delivers_before_deleting() {
    let (messages, mut received) = mpsc::unbounded_channel();
    let builder = ModemBuilder::new().on_sms_received(move |sms| {
        let _ = messages.send(sms);
    });
    let (modem, mut fake) = connect(builder, HUAWEI_COMMANDS).await;

    let m = modem.clone();
    let processing = tokio::spawn(async move { m.process_stored_sms(true).await });
    fake.respond(
        "AT+CMGL=0",
        &[
            "+CMGL: 3,0,,35",
            STORED_DELIVER,
            "+CMGL: 4,0,,35",
            STORED_DELIVER,
            "OK",
        ],
    )
    .await;
    fake.ok("AT+CMGD=3,0").await;
    fake.respond("AT+CMGD=4,0", &["ERROR"]).await;

    assert_eq!(processing.await.unwrap().unwrap(), 2);
    for _ in 0..2 {
        let sms = received.try_recv().unwrap();
        assert_eq!(sms.sender, "+27748577604");
    }
    assert!(!modem.is_closed());
}

#[tokio::test]
async fn network_coverage_and_registration_denied() {
    let (modem, mut fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;

    let m = modem.clone();
    let waiting =
        tokio::spawn(async move { m.wait_for_network_coverage(Duration::from_secs(1)).await });
    fake.respond("AT+CREG?", &["+CREG: 0,5", "OK"]).await;
    fake.respond("AT+CSQ", &["+CSQ: 18,99", "OK"]).await;
    assert_eq!(waiting.await.unwrap().unwrap(), 18);

    let m = modem.clone();
    let waiting =
        tokio::spawn(async move { m.wait_for_network_coverage(Duration::from_secs(1)).await });
    fake.respond("AT+CREG?", &["+CREG: 0,3", "OK"]).await;
    assert!(matches!(
        waiting.await.unwrap(),
        Err(ModemError::InvalidState(_))
    ));
}

#[tokio::test]
async fn close_fails_later_commands() {
    let (modem, _fake) = connect(ModemBuilder::new(), HUAWEI_COMMANDS).await;
    modem.close().await;
    assert!(modem.is_closed());
    assert!(matches!(modem.write("AT").await, Err(ModemError::Closed)));
}
