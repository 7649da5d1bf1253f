// ABOUTME: Example application printing incoming messages, status reports and calls
// ABOUTME: Processes messages already stored on the SIM, then listens until interrupted

use argh::FromArgs;
use gsmmodem::client::{ModemBuilder, ModemConfig, ModemSession, SmsStore};
use std::error::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Listen for SMS messages and calls on a GSM modem behind a serial-to-TCP bridge
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
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging {
        Level::TRACE
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_owned());
    let port = cli_args.port.unwrap_or(7000);
    let mut config = ModemConfig::default();
    if let Some(pin) = cli_args.pin {
        config = config.with_pin(pin);
    }

    let modem = ModemBuilder::new()
        .with_config(config)
        .on_sms_received(|sms| {
            println!("== SMS from {} at {} ==\n{}", sms.sender, sms.timestamp, sms.text)
        })
        .on_status_report(|report| {
            println!(
                "== Status report for message {}: {:?} ==",
                report.reference, report.delivery_status
            )
        })
        .on_incoming_call(|call| {
            println!(
                "== Incoming call {} from {} ==",
                call.id(),
                call.number().as_deref().unwrap_or("unknown number")
            )
        })
        .connect_tcp(format!("{host}:{port}"))
        .await?;

    println!(
        "Connected to {} {}",
        modem.manufacturer().await?,
        modem.model().await?
    );
    let processed = modem.process_stored_sms(false).await?;
    println!("Processed {processed} stored messages, waiting for more (Ctrl-C to stop)");

    tokio::signal::ctrl_c().await?;
    modem.close().await;
    Ok(())
}
