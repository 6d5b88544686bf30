//! Platform plugins.
//!
//! A plugin answers two questions for one streamer: is the room live, and,
//! when it is, run the capture to completion. Construction goes through the
//! [`PluginRegistry`], which maps platform tags to constructors.

pub mod douyin;
pub mod huya;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureEngine, CaptureRequest, SegmentHook};
use crate::domain::{Platform, StreamData, Streamer};
use crate::{Error, Result};

/// User agent sent with liveness probes.
pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Platform-specific behavior consumed by a streamer worker.
#[async_trait]
pub trait PlatformPlugin: Send + Sync {
    /// Liveness probe. May perform network I/O and fail; a failure is
    /// treated as offline by the caller.
    async fn should_download(&self) -> Result<bool>;

    /// Capture the stream until it ends or the token is cancelled.
    ///
    /// The hook, when given, is invoked once per finalized segment; its
    /// lifetime is exactly this call.
    async fn download(
        &self,
        hook: Option<SegmentHook>,
        token: &CancellationToken,
    ) -> Result<Vec<StreamData>>;
}

/// Shared handles passed to plugin constructors.
#[derive(Clone)]
pub struct PluginContext {
    pub client: reqwest::Client,
    pub engine: Arc<CaptureEngine>,
}

/// Thread-safe plugin constructor function.
pub type PluginConstructor =
    Arc<dyn Fn(&Streamer, &PluginContext) -> Result<Box<dyn PlatformPlugin>> + Send + Sync>;

/// Maps platform tags to plugin constructors.
pub struct PluginRegistry {
    constructors: HashMap<Platform, PluginConstructor>,
    context: PluginContext,
}

impl PluginRegistry {
    /// Registry with no platforms registered.
    pub fn empty(context: PluginContext) -> Self {
        Self {
            constructors: HashMap::new(),
            context,
        }
    }

    /// Registry with every built-in platform.
    pub fn builtin(context: PluginContext) -> Self {
        let mut registry = Self::empty(context);
        registry.register(Platform::Huya, Arc::new(huya::HuyaPlugin::create));
        registry.register(Platform::Douyin, Arc::new(douyin::DouyinPlugin::create));
        registry
    }

    /// Registers (or replaces) the constructor for a platform tag.
    pub fn register(&mut self, platform: Platform, constructor: PluginConstructor) {
        self.constructors.insert(platform, constructor);
    }

    /// Constructs the plugin for a streamer's platform tag.
    pub fn create(&self, streamer: &Streamer) -> Result<Box<dyn PlatformPlugin>> {
        let constructor = self
            .constructors
            .get(&streamer.platform)
            .ok_or_else(|| Error::UnsupportedPlatform(streamer.platform.to_string()))?;
        constructor(streamer, &self.context)
    }
}

/// Runs the capture engine against a streamer's configured URL.
///
/// Output path: expanded template plus the container extension. strftime
/// patterns are expanded up-front for single-file captures and left for the
/// engine in segmented mode.
pub(crate) async fn run_capture(
    streamer: &Streamer,
    engine: &CaptureEngine,
    hook: Option<SegmentHook>,
    token: &CancellationToken,
) -> Result<Vec<StreamData>> {
    let config = streamer.download_config();
    let template =
        crate::utils::expand_template(&config.output_template, &streamer.name, !config.segmented);
    let output_path = format!("{}.{}", template, config.format.extension());
    let request = CaptureRequest {
        streamer_id: streamer.id.clone(),
        url: streamer.url.clone(),
        output_path,
        config,
    };
    engine.capture(&request, hook.as_ref(), token).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streamer(platform: Platform, url: &str) -> Streamer {
        Streamer {
            id: "s1".to_string(),
            name: "Some Streamer".to_string(),
            platform,
            url: url.to_string(),
            activated: true,
            is_live: false,
            download: None,
        }
    }

    fn context() -> PluginContext {
        PluginContext {
            client: reqwest::Client::new(),
            engine: Arc::new(CaptureEngine::new("ffmpeg")),
        }
    }

    #[test]
    fn test_builtin_registry_covers_all_platforms() {
        let registry = PluginRegistry::builtin(context());
        assert!(registry
            .create(&streamer(Platform::Huya, "https://www.huya.com/123456"))
            .is_ok());
        assert!(registry
            .create(&streamer(Platform::Douyin, "https://live.douyin.com/987654"))
            .is_ok());
    }

    #[test]
    fn test_unregistered_platform_is_an_error() {
        let registry = PluginRegistry::empty(context());
        let result = registry.create(&streamer(Platform::Huya, "https://www.huya.com/1"));
        assert!(matches!(result, Err(Error::UnsupportedPlatform(_))));
    }

    #[test]
    fn test_bad_room_url_fails_construction() {
        let registry = PluginRegistry::builtin(context());
        let result = registry.create(&streamer(Platform::Huya, "https://example.com/nope"));
        assert!(result.is_err());
    }
}
