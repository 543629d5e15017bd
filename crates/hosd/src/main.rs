//! hosd - The hours-of-service background service
//!
//! This is the main entry point for hosd. It wires together:
//! - Configuration loading
//! - Store initialization
//! - The HOS engine
//! - IPC server and event fan-out

use anyhow::{Context, Result};
use clap::Parser;
use hos_api::{ErrorCode, ErrorInfo, Event, EventPayload, Response};
use hos_config::{load_config, Settings};
use hos_core::{EngineConfig, HosEngine};
use hos_ipc::{IpcServer, ServerMessage};
use hos_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use hos_util::{default_config_path, MonotonicInstant, RateLimiter, SystemClock};
use hosd::RequestHandler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// hosd - Hours-of-service compliance service for dispatch
#[derive(Parser, Debug)]
#[command(name = "hosd")]
#[command(about = "Hours-of-service compliance service for dispatch", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/hosd/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set HOS_SOCKET env var)
    #[arg(short, long, env = "HOS_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set HOS_DATA_DIR env var)
    #[arg(short, long, env = "HOS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    handler: RequestHandler,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    rate_limiter: RateLimiter,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        // A missing config file means defaults
        let settings = if args.config.exists() {
            load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?
        } else {
            info!(config_path = %args.config.display(), "No config file, using defaults");
            Settings::default()
        };

        info!(
            config_path = %args.config.display(),
            default_cycle = ?settings.default_cycle,
            driver_overrides = settings.driver_cycles.len(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| settings.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("hosd.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;
        let _ = store.append_audit(AuditEvent::new(AuditEventType::ConfigLoaded {
            driver_overrides: settings.driver_cycles.len(),
        }));

        let engine = HosEngine::new(
            store.clone(),
            Arc::new(SystemClock),
            EngineConfig::from_settings(&settings),
        );

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        let rate_limiter = RateLimiter::new(
            settings.service.rate_limit_per_second,
            Duration::from_secs(1),
        );

        Ok(Self {
            handler: RequestHandler::new(Arc::new(engine)),
            ipc: Arc::new(ipc),
            store,
            rate_limiter,
        })
    }

    async fn run(mut self) -> Result<()> {
        let mut ipc_messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                msg = ipc_messages.recv() => {
                    let Some(msg) = msg else {
                        warn!("IPC message channel closed");
                        break;
                    };
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        info!("Shutting down hosd");

        self.ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        self.ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                if !self.rate_limiter.check(&client_id, MonotonicInstant::now()) {
                    let response = Response::error(
                        request.request_id,
                        ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                    );
                    let _ = self.ipc.send_response(&client_id, response).await;
                    return;
                }

                let Some(info) = self.ipc.get_client_info(&client_id).await else {
                    debug!(client_id = %client_id, "Request from departed client dropped");
                    return;
                };

                let handled = self.handler.handle(&info, request);
                let _ = self.ipc.send_response(&client_id, handled.response).await;
                for event in handled.events {
                    self.ipc.broadcast_event(event);
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(
                    client_id = %client_id,
                    role = ?info.role,
                    uid = ?info.uid,
                    "Client connected"
                );

                let _ = self.store.append_audit(AuditEvent::new(AuditEventType::ClientConnected {
                    client_id: client_id.to_string(),
                    role: format!("{:?}", info.role),
                    uid: info.uid,
                }));
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let _ = self.store.append_audit(AuditEvent::new(
                    AuditEventType::ClientDisconnected {
                        client_id: client_id.to_string(),
                    },
                ));

                self.rate_limiter.remove_client(&client_id);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "hosd starting"
    );

    let service = Service::new(&args).await?;
    service.run().await
}
