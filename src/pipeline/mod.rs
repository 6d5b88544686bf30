//! Completion-action dispatch.

pub mod upload;

use std::sync::Arc;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::{Action, ActionKind, StreamData};
use crate::{Error, Result};
use self::upload::{UploadConfig, UploadJob, UploadService};

/// Resolves configured actions into side effects.
///
/// Dispatch is sequential within one batch; batches from different workers
/// run independently.
pub struct ActionDispatcher {
    upload_service: Arc<dyn UploadService>,
}

impl ActionDispatcher {
    pub fn new(upload_service: Arc<dyn UploadService>) -> Self {
        Self { upload_service }
    }

    /// Runs every enabled action against the file list, one after another.
    ///
    /// Individual failures are logged and do not stop the rest of the batch.
    /// Cancellation stops the batch and destroys any running subprocess.
    pub async fn dispatch_all(
        &self,
        actions: &[Action],
        items: &[StreamData],
        token: &CancellationToken,
    ) {
        for action in actions.iter().filter(|a| a.enabled) {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("action dispatch cancelled");
                    return;
                }
                result = self.dispatch(action, items) => {
                    if let Err(e) = result {
                        error!("action failed: {}", e);
                    }
                }
            }
        }
    }

    /// Performs one action's effect.
    pub async fn dispatch(&self, action: &Action, items: &[StreamData]) -> Result<()> {
        match &action.kind {
            ActionKind::Upload { remote_path, args } => {
                let job = UploadJob::new(
                    items.to_vec(),
                    UploadConfig {
                        remote_path: remote_path.clone(),
                        args: args.clone(),
                    },
                );
                self.upload_service.submit(job).await
            }
            ActionKind::Command { program } => run_command(program).await,
            ActionKind::Unknown => Err(Error::UnsupportedAction(
                "unrecognized action variant".to_string(),
            )),
        }
    }
}

/// Runs a command action to completion.
///
/// The program string is split on spaces; there is no shell and no quoting,
/// so arguments cannot contain whitespace. Cancellation of the surrounding
/// dispatch drops this future and the child is killed.
async fn run_command(program: &str) -> Result<()> {
    let mut parts = split_program(program).into_iter();
    let executable = parts
        .next()
        .ok_or_else(|| Error::config("empty command action program"))?;

    let mut cmd = Command::new(executable);
    cmd.args(parts);
    cmd.kill_on_drop(true);

    let status = cmd
        .status()
        .await
        .map_err(|e| Error::Other(format!("failed to spawn '{}': {}", executable, e)))?;
    info!(
        program = %program,
        code = status.code().unwrap_or(-1),
        "command action finished"
    );
    Ok(())
}

fn split_program(program: &str) -> Vec<&str> {
    program.split(' ').filter(|part| !part.is_empty()).collect()
}
