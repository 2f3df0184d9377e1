//! CLI for iothub-http
//!
//! Subcommands:
//! - `run`: poll for cloud-to-device messages and settle them until interrupted
//! - `send`: send one event and wait for its confirmation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use iothub_http::DeviceClient;
use iothub_http::config::{Settings, load_config};
use iothub_http::message::{ConfirmationResult, Disposition, OutgoingMessage};
use iothub_http::transport::TransportConfig;
use iothub_http::utils::logging;
use tracing::{error, info, warn};

type SharedClient = Arc<Mutex<DeviceClient>>;
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Answer {
    Accept,
    Reject,
    Abandon,
}

impl From<Answer> for Disposition {
    fn from(answer: Answer) -> Self {
        match answer {
            Answer::Accept => Disposition::Accepted,
            Answer::Reject => Disposition::Rejected,
            Answer::Abandon => Disposition::Abandoned,
        }
    }
}

#[derive(Parser)]
#[command(name = "iothub-http")]
enum Command {
    /// Poll for cloud-to-device messages until interrupted
    Run {
        /// Disposition given to every received message
        #[arg(long, value_enum, default_value = "accept")]
        answer: Answer,
    },
    /// Send one event and wait until the hub confirms it
    Send {
        /// Event body, sent as text
        body: String,
        /// Application property, as `name=value` (repeatable)
        #[arg(long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,
        #[arg(long)]
        message_id: Option<String>,
        /// Give up after this many ticks
        #[arg(long, default_value_t = 30)]
        max_ticks: u32,
    },
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return;
        }
    };
    logging::init(&settings.logging.level);

    let result = match cmd {
        Command::Run { answer } => run(settings, answer.into()).await,
        Command::Send {
            body,
            properties,
            message_id,
            max_ticks,
        } => {
            let mut message = OutgoingMessage::from_text(body);
            for (name, value) in properties {
                message = message.with_property(name, value);
            }
            if let Some(id) = message_id {
                message = message.with_message_id(id);
            }
            send(settings, message, max_ticks).await
        }
    };
    if let Err(e) = result {
        error!("Device failed: {}", e);
    }
}

/// Builds the client on the blocking pool, where the HTTP engine lives.
async fn connect(settings: &Settings) -> Result<SharedClient, BoxError> {
    let config = TransportConfig::from_settings(settings);
    let mut options = settings.x509_options()?;
    options.extend(settings.transport_options());
    let client = tokio::task::spawn_blocking(move || -> Result<DeviceClient, BoxError> {
        let mut client = DeviceClient::create(&config)?;
        for (name, value) in &options {
            client.set_option(name, value)?;
        }
        Ok(client)
    })
    .await??;
    info!(host = client.transport().host_name(), "device client ready");
    Ok(Arc::new(Mutex::new(client)))
}

async fn tick(client: &SharedClient) -> Result<(), BoxError> {
    let client = client.clone();
    tokio::task::spawn_blocking(move || match client.lock() {
        Ok(mut client) => client.do_work(),
        Err(e) => error!("device client lock poisoned: {}", e),
    })
    .await?;
    Ok(())
}

/// The blocking HTTP engine must not be dropped on the async runtime.
async fn shutdown(client: SharedClient) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(client)).await {
        warn!("unable to release device client: {}", e);
    }
}

/// Runs `work` on the client, then releases the client whatever `work`
/// returned.
async fn with_client<F, Fut>(client: SharedClient, work: F) -> Result<(), BoxError>
where
    F: FnOnce(SharedClient) -> Fut,
    Fut: Future<Output = Result<(), BoxError>>,
{
    let outcome = work(client.clone()).await;
    shutdown(client).await;
    outcome
}

async fn run(settings: Settings, answer: Disposition) -> Result<(), BoxError> {
    let client = connect(&settings).await?;
    if let Ok(mut guard) = client.lock() {
        guard.set_message_callback(move |message| {
            info!(
                etag = message.etag(),
                bytes = message.body().len(),
                "cloud-to-device message: {}",
                String::from_utf8_lossy(message.body())
            );
            answer
        });
    }

    let period = Duration::from_millis(settings.transport.tick_interval_ms);
    with_client(client, |client| async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = tick(&client).await {
                        error!("tick failed: {}", e);
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received. Exiting gracefully.");
                    break;
                }
            }
        }
        Ok(())
    })
    .await
}

async fn send(settings: Settings, message: OutgoingMessage, max_ticks: u32) -> Result<(), BoxError> {
    let client = connect(&settings).await?;
    let done = Arc::new(AtomicBool::new(false));
    if let Ok(mut guard) = client.lock() {
        let done = done.clone();
        guard.set_confirmation_callback(move |message, result| {
            match result {
                ConfirmationResult::Ok => info!(tracking_id = %message.tracking_id(), "event confirmed"),
                ConfirmationResult::Error => error!(tracking_id = %message.tracking_id(), "event rejected"),
            }
            done.store(true, Ordering::SeqCst);
        });
        let id = guard.send_event(message);
        info!(tracking_id = %id, "event queued");
    }

    let period = Duration::from_millis(settings.transport.tick_interval_ms);
    with_client(client, |client| async move {
        let mut interval = tokio::time::interval(period);
        for _ in 0..max_ticks {
            tokio::select! {
                _ = interval.tick() => tick(&client).await?,
                _ = tokio::signal::ctrl_c() => break,
            }
            if done.load(Ordering::SeqCst) {
                break;
            }
        }
        if !done.load(Ordering::SeqCst) {
            warn!("event still queued after {} ticks", max_ticks);
        }
        Ok(())
    })
    .await
}
