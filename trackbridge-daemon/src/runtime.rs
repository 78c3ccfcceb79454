use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use trackbridge_core::config::{bridge_root, DaemonSettings};
use trackbridge_core::BridgeConfig;
use trackbridge_sync::{pipeline, RunSummary};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse, UNAUTHORIZED};

/// One reconciliation run, as invoked by the processor task.
///
/// Errors are flattened to strings so they can cross the reply channel and
/// land in the status payload.
pub type SyncRunner = Arc<dyn Fn() -> Result<RunSummary, String> + Send + Sync>;

struct SyncJob {
    source: &'static str,
    respond_to: oneshot::Sender<Result<RunSummary, String>>,
}

/// Outcome of the most recent run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counters and timestamps reported by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonState {
    pub started_at: DateTime<Utc>,
    pub runs: u64,
    pub failures: u64,
    pub last_run: Option<RunRecord>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl DaemonState {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            runs: 0,
            failures: 0,
            last_run: None,
            last_success_at: None,
            last_error: None,
        }
    }

    fn record(&mut self, record: RunRecord) {
        self.runs += 1;
        match &record.error {
            Some(error) => {
                self.failures += 1;
                self.last_error = Some(error.clone());
            }
            None => {
                self.last_success_at = Some(record.finished_at);
                self.last_error = None;
            }
        }
        self.last_run = Some(record);
    }
}

type SharedState = Arc<RwLock<DaemonState>>;

/// Blocking entry point used by `trackbridge daemon start`.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let config = BridgeConfig::from_env_at(home)?;
    if let Err(err) = config.sync_config() {
        tracing::warn!(error = %err, "sync is not configured yet; runs will fail until it is");
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(
        home.to_path_buf(),
        config.daemon,
        pipeline_runner(home.to_path_buf()),
    ))
}

/// Runner that reloads configuration and performs a full pipeline run.
///
/// Configuration is re-read for every run so edits to `config.yaml` apply
/// without a restart.
pub fn pipeline_runner(home: PathBuf) -> SyncRunner {
    Arc::new(move || {
        let config = BridgeConfig::from_env_at(&home).map_err(|err| err.to_string())?;
        pipeline::run(&home, &config).map_err(|err| err.to_string())
    })
}

/// Run the daemon until `stop`, ctrl-c, or a task failure.
pub async fn run(
    home: PathBuf,
    settings: DaemonSettings,
    runner: SyncRunner,
) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let state: SharedState = Arc::new(RwLock::new(DaemonState::new(Utc::now())));
    let settings = Arc::new(settings);

    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let poll_handle = {
        let shutdown = shutdown_tx.clone();
        let sync_tx = sync_tx.clone();
        let interval = settings.poll_interval_secs;
        tokio::spawn(async move {
            let result = poll_task(interval, sync_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = sync_processor_task(runner, state, sync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let state = state.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                settings,
                state,
                sync_tx,
                shutdown.clone(),
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    tracing::info!(
        socket = %socket_path(&home).display(),
        poll_interval_secs = settings.poll_interval_secs,
        token_required = settings.trigger_token.is_some(),
        "daemon started"
    );

    let (poll_result, processor_result, socket_result, signal_result) =
        tokio::join!(poll_handle, processor_handle, socket_handle, signal_handle);

    handle_join("poll", poll_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn poll_task(
    interval_secs: u64,
    sync_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if interval_secs == 0 {
        tracing::info!("scheduled sync disabled");
        let _ = shutdown_rx.recv().await;
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                // Failures are logged and recorded by the processor.
                if let Err(DaemonError::ChannelClosed(_)) = enqueue_sync(&sync_tx, "poll").await {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn sync_processor_task(
    runner: SyncRunner,
    state: SharedState,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started_at = Utc::now();
                let started = Instant::now();

                let runner = runner.clone();
                let outcome = tokio::task::spawn_blocking(move || runner())
                    .await
                    .unwrap_or_else(|err| Err(format!("sync task join error: {err}")));
                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &outcome {
                    Ok(summary) => tracing::info!(
                        source = job.source,
                        duration_ms,
                        scanned = summary.scanned,
                        mapped = summary.mapped,
                        changes = summary.total_changes(),
                        "sync finished"
                    ),
                    Err(error) => tracing::error!(
                        source = job.source,
                        duration_ms,
                        error = %error,
                        "sync failed"
                    ),
                }

                state.write().await.record(RunRecord {
                    source: job.source.to_string(),
                    started_at,
                    finished_at: Utc::now(),
                    duration_ms,
                    summary: outcome.as_ref().ok().copied(),
                    error: outcome.as_ref().err().cloned(),
                });

                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    settings: Arc<DaemonSettings>,
    state: SharedState,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let settings = settings.clone();
                let state = state.clone();
                let sync_tx = sync_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        home,
                        settings,
                        state,
                        sync_tx,
                        shutdown_tx,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    settings: Arc<DaemonSettings>,
    state: SharedState,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            "status" => {
                let snapshot = state.read().await.clone();
                DaemonResponse::ok(build_status_payload(&home, &settings, &snapshot))
            }
            "sync" => {
                if !is_authorized(settings.trigger_token.as_deref(), request.token.as_deref()) {
                    tracing::warn!("rejected sync request with missing or wrong token");
                    DaemonResponse::error(UNAUTHORIZED)
                } else {
                    match enqueue_sync(&sync_tx, "socket").await {
                        Ok(summary) => DaemonResponse::ok(json!(summary)),
                        Err(err) => DaemonResponse::error(err.to_string()),
                    }
                }
            }
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

fn is_authorized(expected: Option<&str>, presented: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => presented == Some(expected),
    }
}

fn build_status_payload(home: &Path, settings: &DaemonSettings, state: &DaemonState) -> Value {
    json!({
        "running": true,
        "pid": std::process::id(),
        "socket": socket_path(home).display().to_string(),
        "poll_interval_secs": settings.poll_interval_secs,
        "token_required": settings.trigger_token.is_some(),
        "started_at": state.started_at,
        "runs": state.runs,
        "failures": state.failures,
        "last_success_at": state.last_success_at,
        "last_error": state.last_error,
        "last_run": state.last_run,
    })
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    source: &'static str,
) -> Result<RunSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = bridge_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
