//! Streamer configuration entities.

use serde::{Deserialize, Serialize};

use super::actions::Action;

/// Streaming platform tag.
///
/// Closed set for now; adding a platform requires registering a plugin
/// constructor for the new tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Huya,
    Douyin,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Huya => write!(f, "huya"),
            Platform::Douyin => write!(f, "douyin"),
        }
    }
}

/// Output container format for captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    #[default]
    Flv,
    Mp4,
    Ts,
    Mkv,
    Avi,
    Mov,
}

impl VideoFormat {
    /// ffmpeg muxer name for this container.
    pub fn muxer(&self) -> &'static str {
        match self {
            VideoFormat::Flv => "flv",
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Ts => "mpegts",
            VideoFormat::Mkv => "matroska",
            VideoFormat::Avi => "avi",
            VideoFormat::Mov => "mov",
        }
    }

    /// File extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Flv => "flv",
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Ts => "ts",
            VideoFormat::Mkv => "mkv",
            VideoFormat::Avi => "avi",
            VideoFormat::Mov => "mov",
        }
    }
}

/// Per-streamer download configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// HTTP headers forwarded to the capture engine, in order.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Cookie string forwarded to the capture engine.
    #[serde(default)]
    pub cookies: Option<String>,
    /// Output container format.
    #[serde(default)]
    pub format: VideoFormat,
    /// Whether the capture is split into parted segments.
    #[serde(default)]
    pub segmented: bool,
    /// Segment duration in seconds. In segmented mode defaults to 7200
    /// when unset; in single-file mode acts as a stop time.
    #[serde(default)]
    pub segment_time_seconds: Option<i64>,
    /// Maximum output size in bytes for single-file captures. Ignored in
    /// segmented mode (segment time wins).
    #[serde(default)]
    pub segment_part_bytes: Option<i64>,
    /// Output path template. Supports `{streamer}` and strftime patterns.
    #[serde(default = "default_output_template")]
    pub output_template: String,
    /// Actions fired once per finalized segment.
    #[serde(default)]
    pub on_parted_download: Vec<Action>,
    /// Actions fired once per live session, against all collected files.
    #[serde(default)]
    pub on_streaming_finished: Vec<Action>,
}

fn default_output_template() -> String {
    "recordings/{streamer}/%Y%m%d-%H%M%S".to_string()
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            cookies: None,
            format: VideoFormat::default(),
            segmented: false,
            segment_time_seconds: None,
            segment_part_bytes: None,
            output_template: default_output_template(),
            on_parted_download: Vec::new(),
            on_streaming_finished: Vec::new(),
        }
    }
}

/// A configured broadcaster. Read-only to the recorder core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Streamer {
    pub id: String,
    /// Display name, also used in output path templates.
    pub name: String,
    pub platform: Platform,
    /// Room URL on the platform.
    pub url: String,
    /// Disabled streamers are never supervised.
    #[serde(default = "default_true")]
    pub activated: bool,
    /// Externally observed live flag. A streamer already marked live is
    /// assumed to be under another supervisor and is skipped.
    #[serde(default)]
    pub is_live: bool,
    /// Download configuration; falls back to defaults when absent.
    #[serde(default)]
    pub download: Option<DownloadConfig>,
}

impl Streamer {
    /// Download configuration with defaults applied.
    pub fn download_config(&self) -> DownloadConfig {
        self.download.clone().unwrap_or_default()
    }
}

fn default_true() -> bool {
    true
}
