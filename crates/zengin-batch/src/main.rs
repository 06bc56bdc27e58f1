//! zengin-batch: run one Zengin flow against the configured bank host.

use anyhow::{Context, Result};

use zengin_client::{
    CommunicationError, CommunicationService, ServiceSettings, TransportChannel, TransportError,
};
use zengin_core::config::ZenginConfig;
use zengin_core::Message;
use zengin_services::{AmountField, IntegrityGuard, IntegrityStore};

mod records;
mod setup;

const DEFAULT_HISTORY_DAYS: i64 = 7;

enum Flow<'a> {
    Transfer { receiver: &'a str, records_file: &'a str },
    Inquiry { receiver: &'a str, records_file: &'a str },
    Notification,
}

fn print_usage() {
    eprintln!("usage: zengin-batch <command>");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  transfer <receiver-id> <records-file>   send a transfer");
    eprintln!("  inquiry <receiver-id> <records-file>    send an inquiry and print the response");
    eprintln!("  notification                            wait for one notification and print it");
    eprintln!("  history [days]                          list recent integrity records");
    eprintln!();
    eprintln!("records files hold one 120-byte record per line");
}

fn print_message(message: &Message) {
    println!(
        "{:?} {} from {} to {} at {} ({} records)",
        message.message_type(),
        message.file_id(),
        message.sender_id(),
        message.receiver_id(),
        message.transmitted_at(),
        message.data_records().len(),
    );
    for record in message.data_records() {
        println!("  {}", String::from_utf8_lossy(record.as_bytes()).trim_end());
    }
}

fn load_config() -> ZenginConfig {
    if let Err(e) = ZenginConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    ZenginConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        ZenginConfig::default()
    })
}

fn run_flow(config: &ZenginConfig, flow: Flow<'_>) -> Result<()> {
    let store = setup::open_store(&config.store)?;
    let guard = IntegrityGuard::new(store, AmountField::from(&config.integrity));
    let channel = TransportChannel::new(setup::connector(config)?);
    let mut service = CommunicationService::new(channel, guard, ServiceSettings::from(config));
    tracing::info!(
        host = %config.bank.host,
        port = config.bank.port,
        sender = %config.sender.id,
        "zengin-batch starting"
    );

    let outcome = match flow {
        Flow::Transfer { receiver, records_file } => {
            let records = records::read_file(records_file)?;
            if service.send_transfer(receiver, records)? {
                println!("transfer acknowledged");
                Ok(())
            } else {
                Err(anyhow::anyhow!("transfer was not acknowledged"))
            }
        }
        Flow::Inquiry { receiver, records_file } => {
            let records = records::read_file(records_file)?;
            let response = service.send_inquiry(receiver, records)?;
            print_message(&response);
            Ok(())
        }
        Flow::Notification => {
            let notification = service.receive_notification()?;
            print_message(&notification);
            Ok(())
        }
    };

    if let Err(e) = service.close() {
        tracing::warn!(code = e.code(), error = %e, "disconnect failed");
    }
    outcome
}

fn history(config: &ZenginConfig, days: Option<&str>) -> Result<()> {
    let days = match days {
        Some(d) => d.parse().context("days must be a number")?,
        None => DEFAULT_HISTORY_DAYS,
    };
    let store = setup::open_store(&config.store)?;
    let mut records = store.list_recent(days)?;
    records.sort_by_key(|r| r.created_at);

    if records.is_empty() {
        println!("no integrity records in the last {days} days");
    }
    for r in records {
        println!(
            "{}  {}  records={:<6} amount={:<14} verified={}  {}",
            r.created_at.format("%Y-%m-%d %H:%M:%S"),
            r.message_id,
            r.record_count,
            r.total_amount,
            r.verified,
            r.hash_value,
        );
    }
    Ok(())
}

/// Error code for the exit message, when the failure carries one.
fn error_code(e: &anyhow::Error) -> Option<&'static str> {
    if let Some(comm) = e.downcast_ref::<CommunicationError>() {
        return Some(comm.code());
    }
    e.downcast_ref::<TransportError>().map(TransportError::code)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let result = match args.as_slice() {
        &["transfer", receiver, records_file] => run_flow(
            &load_config(),
            Flow::Transfer { receiver, records_file },
        ),
        &["inquiry", receiver, records_file] => run_flow(
            &load_config(),
            Flow::Inquiry { receiver, records_file },
        ),
        &["notification"] => run_flow(&load_config(), Flow::Notification),
        &["history"] => history(&load_config(), None),
        &["history", days] => history(&load_config(), Some(days)),
        &["help"] | &["--help"] | &["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        match error_code(&e) {
            Some(code) => eprintln!("error [{code}]: {e:#}"),
            None => eprintln!("error: {e:#}"),
        }
        std::process::exit(1);
    }
}
