//! Douyin liveness probe.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{run_capture, PlatformPlugin, PluginContext, DEFAULT_UA};
use crate::capture::{CaptureEngine, SegmentHook};
use crate::domain::{StreamData, Streamer};
use crate::{Error, Result};

const WEBCAST_ENTER_API: &str = "https://live.douyin.com/webcast/room/web/enter/";

/// Room status value reported while a broadcast is running.
const STATUS_LIVE: i64 = 2;

static ROOM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:live\.)?douyin\.com/([0-9]+)").unwrap());

pub struct DouyinPlugin {
    streamer: Streamer,
    web_rid: String,
    client: reqwest::Client,
    engine: Arc<CaptureEngine>,
}

impl DouyinPlugin {
    pub(crate) fn create(
        streamer: &Streamer,
        context: &PluginContext,
    ) -> Result<Box<dyn PlatformPlugin>> {
        let web_rid = parse_web_rid(&streamer.url)
            .ok_or_else(|| Error::config(format!("not a Douyin room URL: {}", streamer.url)))?;
        Ok(Box::new(Self {
            streamer: streamer.clone(),
            web_rid,
            client: context.client.clone(),
            engine: context.engine.clone(),
        }))
    }
}

fn parse_web_rid(url: &str) -> Option<String> {
    ROOM_URL.captures(url).map(|caps| caps[1].to_string())
}

#[async_trait]
impl PlatformPlugin for DouyinPlugin {
    async fn should_download(&self) -> Result<bool> {
        let json: serde_json::Value = self
            .client
            .get(WEBCAST_ENTER_API)
            .header(reqwest::header::USER_AGENT, DEFAULT_UA)
            .header(reqwest::header::REFERER, &self.streamer.url)
            .query(&[("aid", "6383"), ("web_rid", self.web_rid.as_str())])
            .send()
            .await?
            .json()
            .await?;

        let room = json
            .get("data")
            .and_then(|d| d.get("data"))
            .and_then(|rooms| rooms.get(0))
            .ok_or_else(|| Error::probe("webcast enter response has no room data"))?;
        let status = room.get("status").and_then(|v| v.as_i64()).unwrap_or(0);
        trace!(web_rid = %self.web_rid, status, "douyin probe");

        Ok(status == STATUS_LIVE)
    }

    async fn download(
        &self,
        hook: Option<SegmentHook>,
        token: &CancellationToken,
    ) -> Result<Vec<StreamData>> {
        run_capture(&self.streamer, &self.engine, hook, token).await
    }
}
