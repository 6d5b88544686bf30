//! Domain entities shared across the recorder.

pub mod actions;
pub mod stream_data;
pub mod streamer;

pub use actions::{Action, ActionKind};
pub use stream_data::StreamData;
pub use streamer::{DownloadConfig, Platform, Streamer, VideoFormat};
