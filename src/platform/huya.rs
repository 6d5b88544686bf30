//! Huya liveness probe.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{run_capture, PlatformPlugin, PluginContext, DEFAULT_UA};
use crate::capture::{CaptureEngine, SegmentHook};
use crate::domain::{StreamData, Streamer};
use crate::{Error, Result};

const PROFILE_ROOM_API: &str = "https://mp.huya.com/cache.php";

static ROOM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"huya\.com/([A-Za-z0-9_-]+)").unwrap());

pub struct HuyaPlugin {
    streamer: Streamer,
    room_id: String,
    client: reqwest::Client,
    engine: Arc<CaptureEngine>,
}

impl HuyaPlugin {
    pub(crate) fn create(
        streamer: &Streamer,
        context: &PluginContext,
    ) -> Result<Box<dyn PlatformPlugin>> {
        let room_id = parse_room_id(&streamer.url)
            .ok_or_else(|| Error::config(format!("not a Huya room URL: {}", streamer.url)))?;
        Ok(Box::new(Self {
            streamer: streamer.clone(),
            room_id,
            client: context.client.clone(),
            engine: context.engine.clone(),
        }))
    }
}

fn parse_room_id(url: &str) -> Option<String> {
    ROOM_URL.captures(url).map(|caps| caps[1].to_string())
}

#[async_trait]
impl PlatformPlugin for HuyaPlugin {
    async fn should_download(&self) -> Result<bool> {
        let json: serde_json::Value = self
            .client
            .get(PROFILE_ROOM_API)
            .header(reqwest::header::USER_AGENT, DEFAULT_UA)
            .query(&[
                ("m", "Live"),
                ("do", "profileRoom"),
                ("key", self.room_id.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        let status = json.get("status").and_then(|v| v.as_i64()).unwrap_or(0);
        if status != 200 {
            return Err(Error::probe(format!(
                "profileRoom returned status {} for room {}",
                status, self.room_id
            )));
        }

        let data = json
            .get("data")
            .ok_or_else(|| Error::probe("profileRoom response has no data"))?;
        let real_status = data
            .get("realLiveStatus")
            .and_then(|v| v.as_str())
            .unwrap_or("OFF");
        let live_status = data
            .get("liveStatus")
            .and_then(|v| v.as_str())
            .unwrap_or("OFF");
        trace!(room = %self.room_id, real_status, live_status, "huya probe");

        Ok(real_status == "ON" && live_status == "ON")
    }

    async fn download(
        &self,
        hook: Option<SegmentHook>,
        token: &CancellationToken,
    ) -> Result<Vec<StreamData>> {
        run_capture(&self.streamer, &self.engine, hook, token).await
    }
}
