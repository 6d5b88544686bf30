//! Capture invoker.
//!
//! Translates a download request into a supervised child-process run of the
//! capture engine (ffmpeg-family), stream-parses its stderr for segment and
//! progress events, and finalizes produced files into [`StreamData`] records.

pub mod args;
pub mod parser;
pub mod record_reader;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{DownloadConfig, StreamData};
use crate::{Error, Result};
use self::record_reader::RecordLines;

/// Callback invoked with each finalized segment. Invocations are awaited one
/// at a time, so dispatch is serialized per capture.
pub type SegmentHook = Arc<dyn Fn(StreamData) -> BoxFuture<'static, ()> + Send + Sync>;

/// One capture run against a resolved stream URL.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub streamer_id: String,
    /// Resolved stream URL handed to the engine.
    pub url: String,
    /// Output path; in segmented mode it may carry strftime patterns for the
    /// engine to expand.
    pub output_path: String,
    pub config: DownloadConfig,
}

/// Events parsed off the engine's stderr by the reader task.
enum EngineEvent {
    SegmentOpened(String),
    Progress(parser::ProgressSample),
}

/// Grace period between the stop request and a forced kill.
const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// The external capture engine.
pub struct CaptureEngine {
    binary: String,
    version: Option<String>,
}

impl CaptureEngine {
    /// Create an engine wrapper around the given binary.
    pub fn new(binary: impl Into<String>) -> Self {
        let binary = binary.into();
        let version = Self::detect_version(&binary);
        Self { binary, version }
    }

    fn detect_version(path: &str) -> Option<String> {
        std::process::Command::new(path)
            .arg("-version")
            .output()
            .ok()
            .and_then(|output| {
                String::from_utf8(output.stdout)
                    .ok()
                    .and_then(|s| s.lines().next().map(|l| l.to_string()))
            })
    }

    /// Whether the engine binary responded to a version probe.
    pub fn is_available(&self) -> bool {
        self.version.is_some()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Run one capture to completion.
    ///
    /// Blocks until the engine exits or the token is cancelled. Cancellation
    /// asks the engine to stop gracefully and kills it after
    /// [`GRACEFUL_STOP_TIMEOUT`]. A non-zero exit is logged, not retried; the
    /// files finalized so far are still returned.
    pub async fn capture(
        &self,
        request: &CaptureRequest,
        hook: Option<&SegmentHook>,
        token: &CancellationToken,
    ) -> Result<Vec<StreamData>> {
        crate::utils::ensure_parent_dir(&request.output_path).await?;

        let argv = args::build_args(request, tracing::enabled!(tracing::Level::DEBUG));
        info!(
            streamer_id = %request.streamer_id,
            engine = %self.binary,
            ?argv,
            "starting capture"
        );

        let mut child = Command::new(&self.binary)
            .args(&argv)
            .env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::capture(format!("failed to spawn {}: {}", self.binary, e)))?;

        let mut stdin = child.stdin.take();
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::capture("failed to attach to engine stderr"))?;

        // Waits for the child, handling the graceful-then-forced stop on
        // cancellation. Completion is reported through the oneshot so the
        // event loop below can drain stderr first.
        let (exit_tx, exit_rx) = oneshot::channel::<Option<i32>>();
        let stop_token = token.clone();
        tokio::spawn(async move {
            let exit_code = tokio::select! {
                status = child.wait() => match status {
                    Ok(exit) => exit.code(),
                    Err(e) => {
                        error!("error waiting for capture engine: {}", e);
                        Some(-1)
                    }
                },
                _ = stop_token.cancelled() => {
                    debug!("capture stop requested, asking engine to finish");
                    if let Some(mut stdin) = stdin.take() {
                        let _ = stdin.write_all(b"q").await;
                        let _ = stdin.shutdown().await;
                    }
                    match tokio::time::timeout(GRACEFUL_STOP_TIMEOUT, child.wait()).await {
                        Ok(Ok(exit)) => exit.code(),
                        Ok(Err(e)) => {
                            error!("error waiting for stopped capture engine: {}", e);
                            Some(-1)
                        }
                        Err(_) => {
                            warn!("capture engine did not stop in time; killing it");
                            let _ = child.kill().await;
                            child.wait().await.ok().and_then(|exit| exit.code())
                        }
                    }
                }
            };
            let _ = exit_tx.send(exit_code);
        });

        // The reader task only parses and forwards; segment finalization and
        // hook dispatch happen in the loop below so a slow hook can never
        // stall stderr consumption.
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let reader_id = request.streamer_id.clone();
        tokio::spawn(async move {
            let mut lines = RecordLines::new(stderr);
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(name) = parser::parse_segment_open(&line) {
                            let _ = event_tx.send(EngineEvent::SegmentOpened(name.to_string()));
                        } else if let Some(sample) = parser::parse_progress(&line) {
                            let _ = event_tx.send(EngineEvent::Progress(sample));
                        } else {
                            debug!(streamer_id = %reader_id, "engine: {}", line);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!(streamer_id = %reader_id, "error reading engine output: {}", e);
                        break;
                    }
                }
            }
        });

        let mut produced: Vec<StreamData> = Vec::new();
        let mut active: Option<(PathBuf, DateTime<Utc>)> = None;
        let mut last_size_kb = 0u64;

        if !request.config.segmented {
            active = Some((PathBuf::from(&request.output_path), Utc::now()));
        }

        while let Some(event) = event_rx.recv().await {
            match event {
                EngineEvent::SegmentOpened(name) => {
                    if let Some(open) = active.take() {
                        let data = finalize_segment(open, &request.streamer_id).await;
                        fire_hook(hook, &data).await;
                        produced.push(data);
                    }
                    info!(streamer_id = %request.streamer_id, segment = %name, "segment opened");
                    active = Some((PathBuf::from(name), Utc::now()));
                }
                EngineEvent::Progress(sample) => {
                    let delta_kb = sample.size_kb.saturating_sub(last_size_kb);
                    last_size_kb = sample.size_kb;
                    debug!(
                        streamer_id = %request.streamer_id,
                        size_kb = sample.size_kb,
                        delta_kb,
                        bitrate = %sample.bitrate,
                        "capture progress"
                    );
                }
            }
        }

        if let Some(open) = active.take() {
            let data = finalize_segment(open, &request.streamer_id).await;
            fire_hook(hook, &data).await;
            produced.push(data);
        }

        match exit_rx.await.ok().flatten() {
            Some(0) => info!(
                streamer_id = %request.streamer_id,
                files = produced.len(),
                "capture finished"
            ),
            Some(code) => warn!(
                streamer_id = %request.streamer_id,
                code,
                "capture engine exited with non-zero status"
            ),
            None => warn!(
                streamer_id = %request.streamer_id,
                "capture engine exited without an exit code"
            ),
        }

        Ok(produced)
    }
}

async fn finalize_segment(
    (path, start_time): (PathBuf, DateTime<Utc>),
    streamer_id: &str,
) -> StreamData {
    let size_bytes = tokio::fs::metadata(&path)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    StreamData::new(path, size_bytes, start_time, Utc::now(), streamer_id)
}

async fn fire_hook(hook: Option<&SegmentHook>, data: &StreamData) {
    if let Some(hook) = hook {
        hook(data.clone()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VideoFormat;
    use std::sync::Mutex;

    fn request(url: &str, output: &str, config: DownloadConfig) -> CaptureRequest {
        CaptureRequest {
            streamer_id: "s1".to_string(),
            url: url.to_string(),
            output_path: output.to_string(),
            config,
        }
    }

    #[cfg(unix)]
    async fn write_fake_engine(dir: &std::path::Path, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-engine.sh");
        tokio::fs::write(&path, format!("#!/bin/sh\n{}", script))
            .await
            .unwrap();
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .await
            .unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn segmented_capture_finalizes_each_segment_and_fires_hook() {
        let dir = tempfile::tempdir().unwrap();
        let seg_a = dir.path().join("a.mp4");
        let seg_b = dir.path().join("b.mp4");
        let script = format!(
            concat!(
                "printf 'data-a' > {a}\n",
                "printf 'data-bb' > {b}\n",
                "echo \"[segment @ 0x1] Opening '{a}' for writing\" >&2\n",
                "echo 'size=    10kB time=00:00:01.00 bitrate=80.0kbits/s speed=1.00x' >&2\n",
                "echo \"[segment @ 0x1] Opening '{b}' for writing\" >&2\n",
                "exit 0\n",
            ),
            a = seg_a.display(),
            b = seg_b.display(),
        );
        let engine = CaptureEngine::new(write_fake_engine(dir.path(), &script).await);

        let config = DownloadConfig {
            segmented: true,
            format: VideoFormat::Mp4,
            ..Default::default()
        };
        let out = dir.path().join("out.mp4").to_string_lossy().to_string();

        let seen: Arc<Mutex<Vec<StreamData>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook: SegmentHook = Arc::new(move |data| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().unwrap().push(data);
            })
        });

        let token = CancellationToken::new();
        let produced = engine
            .capture(&request("http://x/live", &out, config), Some(&hook), &token)
            .await
            .unwrap();

        assert_eq!(produced.len(), 2);
        assert_eq!(produced[0].path, seg_a);
        assert_eq!(produced[0].size_bytes, 6);
        assert_eq!(produced[1].path, seg_b);
        assert_eq!(produced[1].size_bytes, 7);
        assert!(produced.iter().all(|d| d.streamer_id == "s1"));
        assert!(produced.iter().all(|d| d.start_time <= d.end_time));

        // The hook fired exactly once per finalized segment, in order.
        assert_eq!(*seen.lock().unwrap(), produced);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn single_file_capture_finalizes_output_at_exit() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("single.flv");
        let script = format!(
            concat!(
                "printf 'single-file' > {out}\n",
                "echo 'size=     5kB time=00:00:01.00 bitrate=40.0kbits/s speed=1.00x' >&2\n",
            ),
            out = out.display(),
        );
        let engine = CaptureEngine::new(write_fake_engine(dir.path(), &script).await);

        let token = CancellationToken::new();
        let produced = engine
            .capture(
                &request(
                    "http://x/live",
                    &out.to_string_lossy(),
                    DownloadConfig::default(),
                ),
                None,
                &token,
            )
            .await
            .unwrap();

        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].path, out);
        assert_eq!(produced[0].size_bytes, 11);
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let engine = CaptureEngine::new("/nonexistent/capture-engine");
        let token = CancellationToken::new();
        let result = engine
            .capture(
                &request("http://x", "/tmp/out.flv", DownloadConfig::default()),
                None,
                &token,
            )
            .await;
        assert!(matches!(result, Err(Error::Capture(_))));
    }
}
