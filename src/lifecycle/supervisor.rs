//! Daemon supervision and node startup.
//!
//! # Responsibilities
//! - Bring up the spawned daemon (config checks, stale pid, spawn, wait) and
//!   every connect-only node, registering each in the pool
//! - Attach a real-time event source per node
//! - Respawn the daemon when it exits unexpectedly
//! - Stop the daemon on shutdown within a bounded time
//!
//! # Data Flow
//! ```text
//! start()
//!     spawn configured:
//!         SpawnPending     alterdot.conf checks → stale pid → spawn child
//!         WaitingForTip    getbestblockhash + getblock, fixed retry budget
//!         CheckingReindex  poll getblockchaininfo until 100% (reindex=1 only)
//!         SubscribingEvents register node → EventBridge::attach
//!     each connect entry: WaitingForTip → SubscribingEvents
//!     init_chain (best height, genesis block) → Running
//!
//! child exits while running → backoff → SpawnPending again (errors → Fault event)
//! stop() → Stopping → SIGINT child, bounded wait → Stopped
//! ```
//!
//! # Design Decisions
//! - Configuration problems are fatal and never retried
//! - A respawned daemon keeps its pool slot; ZMQ subscribers reconnect on their own
//! - Respawn failures have no caller; they surface on the event bus

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::config::daemon_conf::{DaemonConf, DaemonSettings};
use crate::config::{ConfigError, ConnectConfig, SpawnConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::events::{EventBridge, PollingSource, ServiceEvent};
use crate::lifecycle::process::{daemon_args, stop_stale, DaemonProcess};
use crate::observability::metrics;
use crate::pool::Node;
use crate::resilience::{respawn_delay, retry_fixed, RetryError, RetryPolicy};
use crate::rpc::{ChainRpc, HttpRpcClient, RpcClient, RpcEndpoint, RpcError};
use crate::service::blocks::{self, BlockRef};
use crate::service::core::ServiceCore;

/// Supervisor lifecycle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SupervisorState {
    NotStarted = 0,
    SpawnPending = 1,
    WaitingForTip = 2,
    CheckingReindex = 3,
    SubscribingEvents = 4,
    Running = 5,
    Stopping = 6,
    Stopped = 7,
}

impl SupervisorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::SpawnPending,
            2 => Self::WaitingForTip,
            3 => Self::CheckingReindex,
            4 => Self::SubscribingEvents,
            5 => Self::Running,
            6 => Self::Stopping,
            7 => Self::Stopped,
            _ => Self::NotStarted,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::SpawnPending => "spawn_pending",
            Self::WaitingForTip => "waiting_for_tip",
            Self::CheckingReindex => "checking_reindex",
            Self::SubscribingEvents => "subscribing_events",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// Settings for one spawned daemon run.
struct Launch {
    settings: DaemonSettings,
    process: Arc<DaemonProcess>,
    client: Arc<dyn RpcClient>,
}

pub struct Supervisor {
    core: Arc<ServiceCore>,
    bridge: Arc<EventBridge>,
    state: AtomicU8,
    daemon: Mutex<Option<Arc<DaemonProcess>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    crashes: AtomicU32,
}

impl Supervisor {
    pub fn new(core: Arc<ServiceCore>) -> Arc<Self> {
        let bridge = EventBridge::new(core.clone());
        Arc::new(Self {
            core,
            bridge,
            state: AtomicU8::new(SupervisorState::NotStarted as u8),
            daemon: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            crashes: AtomicU32::new(0),
        })
    }

    pub fn state(&self) -> SupervisorState {
        SupervisorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SupervisorState) {
        let previous = self.state.swap(state as u8, Ordering::SeqCst);
        if previous != state as u8 {
            tracing::debug!(from = SupervisorState::from_u8(previous).name(), to = state.name(), "Supervisor state");
        }
    }

    pub fn bridge(&self) -> &Arc<EventBridge> {
        &self.bridge
    }

    /// Pid of the supervised daemon, while one is alive.
    pub fn daemon_pid(&self) -> Option<u32> {
        self.daemon
            .lock()
            .as_ref()
            .filter(|p| p.exit_status().is_none())
            .map(|p| p.pid())
    }

    /// Bring up every configured node, then load the chain.
    pub async fn start(self: &Arc<Self>) -> ServiceResult<()> {
        let config = &self.core.config;
        if config.spawn.is_none() && config.connect.is_empty() {
            return Err(ConfigError::NoNodes.into());
        }
        if self.core.shutdown.is_stopping() {
            return Err(ServiceError::Stopping("Stopping while trying to start".to_string()));
        }

        if let Some(spawn) = &config.spawn {
            self.start_spawned(spawn).await?;
        }
        for connect in &config.connect {
            self.connect(connect).await?;
        }

        init_chain(&self.core).await?;
        self.set_state(SupervisorState::Running);
        tracing::info!(nodes = self.core.pool.len(), height = self.core.tip.height(), "Chain proxy running");
        Ok(())
    }

    async fn start_spawned(self: &Arc<Self>, spawn: &SpawnConfig) -> ServiceResult<Arc<Node>> {
        let launch = self.launch(spawn).await?;
        let node = self.core.pool.register(
            launch.client,
            Some(launch.settings.zmq_endpoint.clone()),
            true,
        );
        self.attach_events(&node)?;
        self.watch_daemon(launch.process);
        Ok(node)
    }

    /// Config checks, stale pid, spawn, then wait for a responsive daemon.
    async fn launch(&self, spawn: &SpawnConfig) -> ServiceResult<Launch> {
        self.set_state(SupervisorState::SpawnPending);
        let network = self.core.config.network;
        let settings = load_daemon_settings(spawn, network)?;

        stop_stale(
            &spawn.pid_file(network),
            self.core.config.timing.spawn_stop_interval(),
            &self.core.shutdown,
        )
        .await?;
        if self.core.shutdown.is_stopping() {
            return Err(ServiceError::Stopping(
                "Stopping while trying to spawn alterdotd".to_string(),
            ));
        }

        let process = Arc::new(DaemonProcess::spawn(&spawn.exec, &daemon_args(spawn, network))?);
        *self.daemon.lock() = Some(process.clone());

        let client: Arc<dyn RpcClient> = Arc::new(HttpRpcClient::new(RpcEndpoint {
            protocol: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port: settings.rpc_port,
            user: settings.rpc_user.clone(),
            password: settings.rpc_password.clone(),
            timeout_secs: spawn.rpc_timeout_secs,
        })?);

        self.wait_for_tip(client.as_ref()).await?;
        if settings.reindex {
            self.set_state(SupervisorState::CheckingReindex);
            check_reindex(&self.core, client.as_ref()).await?;
        }
        Ok(Launch { settings, process, client })
    }

    /// Wait for an externally managed daemon and register it.
    async fn connect(self: &Arc<Self>, connect: &ConnectConfig) -> ServiceResult<Arc<Node>> {
        if self.core.shutdown.is_stopping() {
            return Err(ServiceError::Stopping(
                "Stopping while trying to connect to alterdotd".to_string(),
            ));
        }
        let client: Arc<dyn RpcClient> = Arc::new(HttpRpcClient::new(RpcEndpoint {
            protocol: connect.rpc_protocol.clone(),
            host: connect.rpc_host.clone(),
            port: connect.rpc_port,
            user: connect.rpc_user.clone(),
            password: connect.rpc_password.clone(),
            timeout_secs: connect.timeout_secs,
        })?);

        self.wait_for_tip(client.as_ref()).await?;
        let node = self
            .core
            .pool
            .register(client, connect.zmq_pub_raw_tx.clone(), false);
        self.attach_events(&node)?;
        Ok(node)
    }

    async fn wait_for_tip(&self, client: &dyn RpcClient) -> ServiceResult<()> {
        self.set_state(SupervisorState::WaitingForTip);
        let timing = &self.core.config.timing;
        let policy = RetryPolicy::new(timing.start_retry_count, timing.start_retry_interval());
        let result = retry_fixed(policy, &self.core.shutdown, |_| {
            load_tip_from_node(&self.core, client)
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(RetryError::Stopping) => Err(ServiceError::Stopping(
                "Stopping while trying to connect to alterdotd".to_string(),
            )),
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::error!(attempts, endpoint = %client.endpoint(), "Daemon never became responsive");
                Err(last.map(ServiceError::from).unwrap_or_else(|| {
                    ServiceError::Timeout(format!("no response from {}", client.endpoint()))
                }))
            }
        }
    }

    fn attach_events(&self, node: &Arc<Node>) -> ServiceResult<()> {
        self.set_state(SupervisorState::SubscribingEvents);
        let handle = match node.zmq_endpoint.as_deref() {
            #[cfg(feature = "zmq")]
            Some(endpoint) => {
                let source = crate::events::source::connect_zmq(endpoint)
                    .map_err(|e| ServiceError::Process(format!("ZMQ connect to {} failed: {}", endpoint, e)))?;
                self.bridge.attach(node.clone(), source)
            }
            _ => {
                let interval = self.core.config.timing.tip_update_interval();
                self.bridge
                    .attach(node.clone(), PollingSource::new(node.client(), interval))
            }
        };
        self.tasks.lock().push(handle);
        Ok(())
    }

    /// Follow the daemon through exits and respawns until shutdown.
    fn watch_daemon(self: &Arc<Self>, process: Arc<DaemonProcess>) {
        let supervisor = self.clone();
        let handle = tokio::spawn(async move {
            let mut process = process;
            let mut started = Instant::now();
            loop {
                let shutdown = &supervisor.core.shutdown;
                let exit = tokio::select! {
                    exit = process.exited() => exit,
                    _ = shutdown.cancelled() => return,
                };
                if shutdown.is_stopping() {
                    return;
                }
                tracing::warn!(pid = process.pid(), exit = ?exit, "alterdotd process exited unexpectedly");

                let timing = &supervisor.core.config.timing;
                if started.elapsed() > timing.spawn_restart_max() {
                    supervisor.crashes.store(0, Ordering::SeqCst);
                }
                let crashes = supervisor.crashes.fetch_add(1, Ordering::SeqCst) + 1;
                let delay = respawn_delay(crashes, timing.spawn_restart(), timing.spawn_restart_max());
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => return,
                }

                let Some(spawn) = supervisor.core.config.spawn.as_ref() else {
                    return;
                };
                metrics::record_respawn();
                started = Instant::now();
                match supervisor.launch(spawn).await {
                    Ok(launch) => {
                        tracing::info!(pid = launch.process.pid(), crashes, "Respawned alterdotd");
                        supervisor.set_state(SupervisorState::Running);
                        process = launch.process;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to respawn alterdotd");
                        supervisor.core.events.fault(e);
                        // Keep following a child that started but never answered.
                        match supervisor.daemon.lock().clone() {
                            Some(current) if !Arc::ptr_eq(&current, &process) => process = current,
                            _ => return,
                        }
                    }
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Stop event processing and the spawned daemon.
    ///
    /// Without a spawned daemon this succeeds immediately.
    pub async fn stop(&self) -> ServiceResult<()> {
        self.set_state(SupervisorState::Stopping);
        self.core.shutdown.trigger();

        let daemon = self.daemon.lock().take();
        let result = match daemon {
            Some(process) => process.stop(self.core.config.timing.shutdown_timeout()).await,
            None => Ok(()),
        };

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.set_state(SupervisorState::Stopped);
        result
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.state())
            .field("daemon_pid", &self.daemon_pid())
            .finish()
    }
}

/// Read `alterdot.conf` (writing a default when absent), overlay the network
/// specific file and check the indexes and ZMQ publishers.
pub fn load_daemon_settings(
    spawn: &SpawnConfig,
    network: crate::config::Network,
) -> Result<DaemonSettings, ConfigError> {
    let mut conf = DaemonConf::load_or_create(&spawn.conf_file())?;
    if let Some(relative) = network.config_path() {
        let path = spawn.datadir.join(relative);
        if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
            conf.merge(DaemonConf::parse(&text));
        }
    }
    conf.validate(network)
}

/// Record the node's best block as the tip.
///
/// A warming-up daemon (code -28) is logged as a warning; the caller retries.
pub async fn load_tip_from_node(core: &ServiceCore, client: &dyn RpcClient) -> Result<(), RpcError> {
    let loaded = async {
        let hash = client.best_block_hash().await?;
        let block = client.verbose_block(&hash).await?;
        Ok::<_, RpcError>((block.height, hash))
    }
    .await;

    match loaded {
        Ok((height, hash)) => {
            core.tip.set(height, hash);
            core.events.emit(ServiceEvent::Tip(height));
            Ok(())
        }
        Err(e) => {
            if e.is_warmup() {
                tracing::warn!(endpoint = %client.endpoint(), error = %e, "Daemon is warming up");
            }
            Err(e)
        }
    }
}

/// Poll verification progress at the reindex interval until it reaches 100%.
pub async fn check_reindex(core: &ServiceCore, client: &dyn RpcClient) -> ServiceResult<()> {
    let interval = core.config.timing.reindex_wait();
    loop {
        let info = client.blockchain_info().await?;
        let percentage = info.verificationprogress * 100.0;
        if percentage.round() >= 100.0 {
            tracing::info!("Alterdot daemon reindex complete");
            return Ok(());
        }
        tracing::info!(progress = format!("{:.2}%", percentage), "Alterdot daemon reindex progress");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = core.shutdown.cancelled() => {
                return Err(ServiceError::Stopping("Stopping while waiting for reindex".to_string()));
            }
        }
    }
}

/// Load the current height and the genesis block.
pub async fn init_chain(core: &ServiceCore) -> ServiceResult<()> {
    let best: String = core.pool.request("getbestblockhash", Vec::new()).await?;
    let block = blocks::block_overview(core, BlockRef::Hash(best.clone())).await?;
    let genesis_hash: String = core
        .pool
        .request("getblockhash", vec![serde_json::json!(0)])
        .await?;
    let genesis = blocks::raw_block(core, BlockRef::Hash(genesis_hash.clone())).await?;

    core.tip.set(block.header.height, best);
    core.tip.set_genesis(genesis);
    tracing::info!(height = block.header.height, genesis = %genesis_hash, "Alterdot daemon chain loaded");
    Ok(())
}
