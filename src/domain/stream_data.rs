//! Capture artifacts.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A finalized media file produced during a capture session.
///
/// Created by the capture invoker when a segment is finalized, then handed
/// through the worker to the action dispatcher. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamData {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Owning streamer id.
    pub streamer_id: String,
}

impl StreamData {
    pub fn new(
        path: impl Into<PathBuf>,
        size_bytes: u64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        streamer_id: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            start_time,
            end_time,
            streamer_id: streamer_id.into(),
        }
    }
}
