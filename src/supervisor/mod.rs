//! Top-level supervision.
//!
//! Fans out one worker task per enabled streamer and keeps siblings isolated:
//! a panicking worker is logged, the rest keep running. The supervisor
//! returns once every worker ended, which under normal operation only
//! happens after the shared token is cancelled.

pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::Streamer;
use crate::pipeline::ActionDispatcher;
use crate::platform::PluginRegistry;
use self::worker::StreamerWorker;

pub struct Supervisor {
    streamers: Vec<Streamer>,
    registry: Arc<PluginRegistry>,
    dispatcher: Arc<ActionDispatcher>,
    max_retries: u32,
    retry_delay: Duration,
    token: CancellationToken,
}

impl Supervisor {
    pub fn new(
        streamers: Vec<Streamer>,
        registry: Arc<PluginRegistry>,
        dispatcher: Arc<ActionDispatcher>,
        max_retries: u32,
        retry_delay: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            streamers,
            registry,
            dispatcher,
            max_retries,
            retry_delay,
            token,
        }
    }

    /// Spawns the workers and blocks until all of them terminate.
    pub async fn run(&self) {
        let mut workers = JoinSet::new();

        for streamer in self
            .streamers
            .iter()
            .filter(|s| s.activated && !s.is_live)
        {
            let plugin = match self.registry.create(streamer) {
                Ok(plugin) => plugin,
                Err(e) => {
                    // Fatal to this streamer only.
                    error!(streamer = %streamer.name, "cannot supervise: {}", e);
                    continue;
                }
            };
            let worker = StreamerWorker::new(
                streamer.clone(),
                plugin,
                self.dispatcher.clone(),
                self.max_retries,
                self.retry_delay,
                self.token.child_token(),
            );
            workers.spawn(worker.run());
        }

        if workers.is_empty() {
            warn!("no streamers to supervise");
            return;
        }
        info!(count = workers.len(), "supervising streamers");

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(id) => debug!(streamer_id = %id, "worker exited"),
                Err(e) if e.is_panic() => {
                    // Isolation: a crashed worker never takes siblings down.
                    error!("worker panicked: {}", e);
                }
                Err(e) => error!("worker task failed: {}", e),
            }
        }
    }
}
