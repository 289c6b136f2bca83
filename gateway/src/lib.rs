pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod routes;
pub mod upstream;

pub use config::Config;
pub use dispatch::{
    AdmissionPolicy, DispatchError, Dispatcher, LocalExecutor, TaskRequest, TaskTicket, WorkFn,
};
pub use error::ApiError;
pub use upstream::UpstreamClient;

use std::sync::Arc;

use dispatch::TaskExecutor;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// The single dispatcher instance, owned by the composition root and
    /// injected into route handlers.
    pub dispatcher: Arc<Dispatcher>,
    /// Client for the upstream model provider.
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let executor: Arc<dyn TaskExecutor> =
            Arc::new(LocalExecutor::new(config.dispatch.timeouts.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            AdmissionPolicy::from_config(&config.dispatch),
            executor,
        ));
        let upstream = Arc::new(UpstreamClient::new(config.upstream.clone()));
        Self {
            config,
            dispatcher,
            upstream,
        }
    }
}
