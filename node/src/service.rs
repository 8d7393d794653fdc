//! Link service lifecycle: wiring, start, background loops, shutdown.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use link_network::{ExchangeClient, PeerDirectory, Transport};
use link_protocol::ProtocolId;
use link_store::{RecordStore, StoreError};
use link_store_lmdb::LmdbEnvironment;

use crate::config::LinkConfig;
use crate::content::ContentCache;
use crate::handlers::{hash_announce_handler, peer_exchange_handler, HandlerContext};
use crate::pinning::{PinSource, PinningTracker};
use crate::shutdown::{ShutdownController, ShutdownSignal};
use crate::subscription::Subscriber;
use crate::NodeError;

/// The four record stores the service persists to.
#[derive(Clone)]
pub struct StoreSet {
    /// Content hash records.
    pub records: Arc<dyn RecordStore>,
    /// Peer directory backup.
    pub peers: Arc<dyn RecordStore>,
    /// Subscription bookkeeping.
    pub channels: Arc<dyn RecordStore>,
    /// Pin snapshot backup.
    pub pins: Arc<dyn RecordStore>,
}

impl StoreSet {
    pub fn from_lmdb(env: &LmdbEnvironment) -> Self {
        Self {
            records: Arc::new(env.records().clone()),
            peers: Arc::new(env.peers().clone()),
            channels: Arc::new(env.channels().clone()),
            pins: Arc::new(env.pins().clone()),
        }
    }

    fn close(&self) -> Result<(), StoreError> {
        self.records.close()?;
        self.peers.close()?;
        self.channels.close()?;
        self.pins.close()
    }
}

/// Everything handlers and loops share, built once per service.
pub struct ServiceContext {
    pub config: LinkConfig,
    pub stores: StoreSet,
    pub transport: Arc<dyn Transport>,
    pub directory: Arc<PeerDirectory>,
    pub content: Arc<ContentCache>,
    pub tracker: Arc<PinningTracker>,
    pub exchange: Arc<ExchangeClient>,
    pub subscriber: Arc<Subscriber>,
}

pub struct LinkService {
    ctx: Arc<ServiceContext>,
}

impl LinkService {
    /// Open the service rooted at `repo`.
    ///
    /// Without an explicit `config`, the one in `<repo>/linker.toml` is
    /// loaded (or defaulted) and written back. Failing to open the store is
    /// fatal.
    pub fn open(
        repo: &Path,
        config: Option<LinkConfig>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NodeError> {
        let config = match config {
            Some(config) => config,
            None => LinkConfig::init(repo)?,
        };
        let env = LmdbEnvironment::open(&config.data_dir(repo), config.map_size_bytes())?;
        Ok(Self::new(config, StoreSet::from_lmdb(&env), transport))
    }

    pub fn new(config: LinkConfig, stores: StoreSet, transport: Arc<dyn Transport>) -> Self {
        let directory = Arc::new(PeerDirectory::new(config.max_attempts));
        let content = Arc::new(ContentCache::new(Arc::clone(&stores.records)));
        let tracker = Arc::new(PinningTracker::new(
            Arc::clone(&content) as Arc<dyn PinSource>
        ));
        let exchange = Arc::new(ExchangeClient::new(
            Arc::clone(&transport),
            Arc::clone(&directory),
            config.stream_timeout(),
        ));
        let subscriber = Arc::new(Subscriber::new(
            Arc::clone(&transport),
            Arc::clone(&directory),
            Arc::clone(&stores.channels),
        ));
        Self {
            ctx: Arc::new(ServiceContext {
                config,
                stores,
                transport,
                directory,
                content,
                tracker,
                exchange,
                subscriber,
            }),
        }
    }

    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.ctx
    }

    /// Restore persisted state, register both protocol handlers, and start
    /// the background loops.
    ///
    /// If either handler cannot be registered, neither stays registered and
    /// no loop is started.
    pub async fn start(self) -> Result<RunningService, NodeError> {
        let ctx = self.ctx;

        let restored = ctx.directory.restore_from(ctx.stores.peers.as_ref())?;
        match ctx.tracker.restore(ctx.stores.pins.as_ref()) {
            Ok(_) => {}
            Err(StoreError::Serialization(e)) => {
                tracing::warn!(error = %e, "discarding undecodable pin snapshot");
            }
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = ctx.tracker.refresh() {
            tracing::warn!(error = %e, "initial pin refresh failed, serving restored snapshot");
        }

        let shutdown = ShutdownController::new();
        let handler_ctx = HandlerContext {
            timeout: ctx.config.stream_timeout(),
            shutdown: shutdown.signal(),
        };
        register_handlers(&ctx, handler_ctx)?;

        let tasks = spawn_loops(&ctx, &shutdown);
        tracing::info!(
            local = %ctx.transport.local_peer(),
            peers = restored,
            pins = ctx.tracker.get().len(),
            "link service running"
        );
        Ok(RunningService {
            ctx,
            shutdown,
            tasks,
        })
    }
}

fn register_handlers(ctx: &ServiceContext, handler_ctx: HandlerContext) -> Result<(), NodeError> {
    let peers = ProtocolId::peers();
    let hash = ProtocolId::hash();
    ctx.transport.set_stream_handler(
        &peers,
        peer_exchange_handler(Arc::clone(&ctx.directory), handler_ctx.clone()),
    )?;
    if let Err(e) = ctx
        .transport
        .set_stream_handler(&hash, hash_announce_handler(Arc::clone(&ctx.tracker), handler_ctx))
    {
        ctx.transport.remove_stream_handler(&peers);
        return Err(e.into());
    }
    tracing::debug!(%peers, %hash, "registered stream handlers");
    Ok(())
}

fn spawn_loops(ctx: &Arc<ServiceContext>, shutdown: &ShutdownController) -> Vec<JoinHandle<()>> {
    let config = &ctx.config;
    let mut tasks = Vec::with_capacity(4);

    let c = Arc::clone(ctx);
    tasks.push(spawn_periodic(
        "pin-refresh",
        config.pin_refresh_interval(),
        shutdown.signal(),
        move || {
            if let Err(e) = c.tracker.refresh() {
                tracing::warn!(error = %e, "pin refresh failed, keeping last snapshot");
            }
            async {}
        },
    ));

    let c = Arc::clone(ctx);
    tasks.push(spawn_periodic(
        "pin-backup",
        config.pin_backup_interval(),
        shutdown.signal(),
        move || {
            if let Err(e) = c.tracker.persist(c.stores.pins.as_ref()) {
                tracing::warn!(error = %e, "pin snapshot backup failed");
            }
            async {}
        },
    ));

    let c = Arc::clone(ctx);
    tasks.push(spawn_periodic(
        "peer-backup",
        config.peer_backup_interval(),
        shutdown.signal(),
        move || {
            if let Err(e) = c.directory.flush_to(c.stores.peers.as_ref()) {
                tracing::warn!(error = %e, "peer directory backup failed");
            }
            async {}
        },
    ));

    let c = Arc::clone(ctx);
    tasks.push(spawn_periodic(
        "discovery",
        config.discovery_interval(),
        shutdown.signal(),
        move || sync_connected_peers(Arc::clone(&c)),
    ));

    tasks
}

/// Upsert every connected transport peer, then ask each for the peers it
/// knows.
async fn sync_connected_peers(ctx: Arc<ServiceContext>) {
    let connected = ctx.transport.connected_peers();
    for info in &connected {
        ctx.directory.upsert(info.clone());
    }
    for info in &connected {
        // Failures are counted against the peer by the exchange client.
        let _ = ctx.exchange.fetch_peers(&info.id).await;
    }
    tracing::debug!(
        connected = connected.len(),
        known = ctx.directory.len(),
        "synced connected peers"
    );
}

/// Run `job` every `every` until shutdown. The first run is one period
/// after spawning.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    every: Duration,
    mut shutdown: ShutdownSignal,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    tracing::debug!(task = name, "periodic task shutting down");
                    break;
                }
                _ = interval.tick() => job().await,
            }
        }
    })
}

/// A started service. Dropping it stops the loops and cancels new sessions
/// but skips the final backup; call [`RunningService::shutdown`] instead.
pub struct RunningService {
    ctx: Arc<ServiceContext>,
    shutdown: ShutdownController,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningService {
    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.ctx
    }

    /// Signal shutdown, join the loops, unregister handlers, write a final
    /// backup, and close the stores.
    pub async fn shutdown(self) -> Result<(), NodeError> {
        let Self {
            ctx,
            shutdown,
            tasks,
        } = self;

        shutdown.shutdown();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        ctx.transport.remove_stream_handler(&ProtocolId::peers());
        ctx.transport.remove_stream_handler(&ProtocolId::hash());

        let flushed = ctx.directory.flush_to(ctx.stores.peers.as_ref());
        let persisted = ctx.tracker.persist(ctx.stores.pins.as_ref());
        let closed = ctx.stores.close();
        let peers = flushed?;
        let pins = persisted?;
        closed?;
        tracing::info!(peers, pins, "link service stopped");
        Ok(())
    }

    /// Run until SIGINT/SIGTERM, then shut down.
    pub async fn run_until_signal(self) -> Result<(), NodeError> {
        ShutdownController::new().wait_for_signal().await;
        self.shutdown().await
    }
}
