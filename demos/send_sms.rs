// ABOUTME: Example application sending one SMS through a modem exposed over TCP
// ABOUTME: Shows the builder, waiting for network coverage and waiting for the status report

use argh::FromArgs;
use gsmmodem::client::{ModemBuilder, ModemConfig, ModemSession, SmsTransmitter};
use std::error::Error;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Send an SMS message through a GSM modem behind a serial-to-TCP bridge
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the hostname or IP address of the bridge (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// the port of the bridge (default: 7000)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// the SIM PIN, if the SIM is locked
    #[argh(option)]
    pin: Option<String>,

    /// send in text mode instead of PDU mode
    #[argh(switch)]
    text_mode: bool,

    /// wait for the delivery report
    #[argh(switch, short = 'r')]
    report: bool,

    /// the message to send
    #[argh(option, short = 'm')]
    message: String,

    /// the recipient telephone number
    #[argh(option, short = 't')]
    to: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_owned());
    let port = cli_args.port.unwrap_or(7000);

    let mut config = ModemConfig::default().with_text_mode(cli_args.text_mode);
    if let Some(pin) = cli_args.pin {
        config = config.with_pin(pin);
    }

    let modem = ModemBuilder::new()
        .with_config(config)
        .on_status_report(|report| {
            println!("Status report for {}: {:?}", report.reference, report.delivery_status)
        })
        .connect_tcp(format!("{host}:{port}"))
        .await
        .map_err(|e| {
            eprintln!("Modem initialization failed: {e}");
            e
        })?;

    let signal = modem
        .wait_for_network_coverage(Duration::from_secs(30))
        .await?;
    println!("Network coverage available, signal strength {signal}");

    let result = modem
        .send_sms(&cli_args.to, &cli_args.message, cli_args.report, None)
        .await;
    modem.close().await;

    match result {
        Ok(sent) => {
            println!(
                "Message sent! Reference {}, status {:?}",
                sent.reference, sent.status
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to send message: {e}");
            Err(e.into())
        }
    }
}
