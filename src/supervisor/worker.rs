//! Per-streamer worker.
//!
//! Owns the full lifecycle of one streamer: probe liveness, capture while
//! live, accumulate the produced files, fire end-of-session actions once the
//! retry window closes, back off, repeat. Workers share no mutable state and
//! terminate only through cancellation.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::capture::SegmentHook;
use crate::domain::{StreamData, Streamer};
use crate::pipeline::ActionDispatcher;
use crate::platform::PlatformPlugin;

/// Delay between liveness probes while no session is in progress.
const IDLE_POLL_DELAY: Duration = Duration::from_secs(60);
/// Cooldown after an end-of-session action cycle.
const SESSION_COOLDOWN: Duration = Duration::from_secs(60);

/// Mutable per-streamer state. Owned by the worker, never shared.
#[derive(Debug, Default)]
struct RecorderState {
    is_live: bool,
    /// Consecutive non-live polls since the last successful capture.
    retry_count: u32,
    /// Files produced during the current live session.
    collected: Vec<StreamData>,
}

/// What the loop does after one iteration.
enum Step {
    /// Re-enter immediately.
    Continue,
    /// Sleep before the next iteration; raced against cancellation.
    Sleep(Duration),
}

pub struct StreamerWorker {
    streamer: Streamer,
    plugin: Box<dyn PlatformPlugin>,
    dispatcher: Arc<ActionDispatcher>,
    max_retries: u32,
    retry_delay: Duration,
    token: CancellationToken,
    state: RecorderState,
}

impl StreamerWorker {
    pub fn new(
        streamer: Streamer,
        plugin: Box<dyn PlatformPlugin>,
        dispatcher: Arc<ActionDispatcher>,
        max_retries: u32,
        retry_delay: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            streamer,
            plugin,
            dispatcher,
            max_retries,
            retry_delay,
            token,
            state: RecorderState::default(),
        }
    }

    /// Supervise the streamer until cancellation. Returns the streamer id.
    pub async fn run(mut self) -> String {
        if self.streamer.is_live {
            warn!(
                streamer = %self.streamer.name,
                "already marked live; refusing double supervision"
            );
            return self.streamer.id;
        }

        let hook = self.parted_hook();
        info!(streamer = %self.streamer.name, "worker started");

        while !self.token.is_cancelled() {
            match self.iteration(hook.as_ref()).await {
                Step::Continue => {}
                Step::Sleep(delay) => {
                    tokio::select! {
                        _ = self.token.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(streamer = %self.streamer.name, "worker stopped");
        self.streamer.id
    }

    /// Segment hook dispatching the enabled parted actions, one segment at a
    /// time. Handed to `download()` so its lifetime is the capture call.
    fn parted_hook(&self) -> Option<SegmentHook> {
        let actions = self.streamer.download_config().on_parted_download;
        if actions.is_empty() {
            return None;
        }
        let dispatcher = self.dispatcher.clone();
        let token = self.token.clone();
        Some(Arc::new(move |data: StreamData| {
            let dispatcher = dispatcher.clone();
            let actions = actions.clone();
            let token = token.clone();
            async move {
                dispatcher.dispatch_all(&actions, &[data], &token).await;
            }
            .boxed()
        }))
    }

    /// One pass of the poll/capture/back-off state machine.
    async fn iteration(&mut self, hook: Option<&SegmentHook>) -> Step {
        if self.state.retry_count > self.max_retries {
            return self.finish_session().await;
        }

        // A capture that just ended must not suppress this probe.
        self.state.is_live = false;

        let live = match self.plugin.should_download().await {
            Ok(live) => live,
            Err(e) => {
                error!(streamer = %self.streamer.name, "liveness probe failed: {}", e);
                false
            }
        };

        if live {
            self.state.is_live = true;
            info!(streamer = %self.streamer.name, "live; starting capture");

            let files = match self.plugin.download(hook.cloned(), &self.token).await {
                Ok(files) => files,
                Err(e) => {
                    error!(streamer = %self.streamer.name, "capture failed: {}", e);
                    Vec::new()
                }
            };
            self.state.retry_count = 0;

            if files.is_empty() {
                warn!(streamer = %self.streamer.name, "capture produced no files");
            } else {
                self.state.collected.extend(files);
            }
        } else {
            debug!(streamer = %self.streamer.name, "not live");
        }

        self.state.retry_count += 1;

        // Asymmetric back-off: probe fast while a session is merely paused,
        // slowly at rest.
        let delay = if self.state.collected.is_empty() {
            IDLE_POLL_DELAY
        } else {
            self.retry_delay
        };
        Step::Sleep(delay)
    }

    /// The retry window closed. With nothing collected this was a false
    /// alarm; otherwise fire the end-of-stream actions exactly once against
    /// a snapshot of the session's files.
    async fn finish_session(&mut self) -> Step {
        if self.state.collected.is_empty() {
            debug!(streamer = %self.streamer.name, "retry window ended without captures");
            self.state.retry_count = 0;
            self.state.is_live = false;
            return Step::Continue;
        }

        let snapshot = self.state.collected.clone();
        let actions = self.streamer.download_config().on_streaming_finished;
        info!(
            streamer = %self.streamer.name,
            files = snapshot.len(),
            "stream ended; dispatching completion actions"
        );
        self.dispatcher
            .dispatch_all(&actions, &snapshot, &self.token)
            .await;

        self.state.retry_count = 0;
        self.state.is_live = false;
        self.state.collected.clear();
        Step::Sleep(SESSION_COOLDOWN)
    }
}
