//! Multi-tenant browser automation broker: multiplexes many concurrent
//! automation clients onto a single running browser via the Chrome
//! DevTools Protocol, through a Session/Worker/Target registry, a
//! Master/Worker IPC fabric, and a hybrid backend router.

pub mod browser_pool;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod guard;
pub mod ipc;
pub mod page_pool;
pub mod queue;
pub mod refs;
pub mod router;
pub mod session;
pub mod stats;
pub mod storage_state;

pub use config::{BrokerConfig, BrokerConfigBuilder, CircuitBreakerConfig, StorageStateConfig};
pub use dispatcher::Dispatcher;
pub use driver::Driver;
pub use error::{BrokerError, Result};
pub use guard::{DomainGuard, PidRegistry};
pub use page_pool::PagePool;
pub use queue::CommandQueue;
pub use refs::RefManager;
pub use router::HybridRouter;
pub use session::{SessionRegistry, SessionId, WorkerId, TargetId};
pub use storage_state::StorageStateManager;

use std::sync::Arc;

/// Everything the broker needs wired together and running: the attached
/// debug-protocol driver, the session registry with its background reaper,
/// the hybrid router, and the IPC server accepting worker connections.
pub struct Broker {
    pub config: BrokerConfig,
    pub driver: Arc<Driver>,
    pub registry: Arc<SessionRegistry>,
    pub router: Arc<HybridRouter>,
    pub refs: Arc<RefManager>,
    pub storage_state: Arc<StorageStateManager>,
    pub domain_guard: Arc<DomainGuard>,
    _reaper: session::Reaper,
}

impl Broker {
    /// Connect to the debug protocol, build every subsystem, and start the
    /// background reaper. Does not start the IPC server — call
    /// [`Broker::serve`] for that once the caller is ready to accept worker
    /// connections.
    pub async fn start(config: BrokerConfig) -> Result<Self> {
        let pid_registry = PidRegistry::new();
        pid_registry.sweep_stale();
        pid_registry.claim(config.debug_port())?;

        let domain_guard = Arc::new(DomainGuard::default());

        let driver = Driver::connect(config.debug_port()).await?;
        let page_pool = PagePool::new(Arc::clone(&driver), config.max_sessions());
        let registry = SessionRegistry::new(config.clone(), Arc::clone(&driver), page_pool);
        let router = Arc::new(HybridRouter::new(&config, Arc::clone(&domain_guard)));
        let storage_state = Arc::new(StorageStateManager::new(
            config.storage_state().dir().to_path_buf(),
            Arc::clone(&domain_guard),
        ));

        let reaper = session::Reaper::spawn(
            Arc::clone(&registry),
            config.cleanup_interval(),
            config.cleanup_interval(),
        );

        Ok(Self {
            config,
            driver,
            registry,
            router,
            refs: Arc::new(RefManager::new()),
            storage_state,
            domain_guard,
            _reaper: reaper,
        })
    }

    /// Run the IPC server until it errors or the process is terminated.
    pub async fn serve(&self) -> Result<()> {
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&self.registry), Arc::clone(&self.refs), None));
        let server = ipc::IpcServer::new(self.config.ipc_socket_path().to_path_buf());
        server.serve(dispatcher).await
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        PidRegistry::new().release(self.config.debug_port());
    }
}
