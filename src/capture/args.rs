//! Capture-engine argv construction.
//!
//! The argv layout is wire-compatible with ffmpeg and deterministic: the same
//! request always produces a byte-identical argument vector, so the engine
//! stays swappable for any ffmpeg-family binary.

use tracing::debug;

use super::CaptureRequest;
use crate::domain::VideoFormat;

/// Segment duration used when segmentation is on but no duration is set.
pub const DEFAULT_SEGMENT_TIME_SECS: i64 = 7200;

/// Network read/write timeout handed to the engine, in microseconds.
const RW_TIMEOUT_MICROS: &str = "20000000";

/// Builds the full engine argv for a capture request.
pub fn build_args(request: &CaptureRequest, debug_log: bool) -> Vec<String> {
    let config = &request.config;
    let mut args = Vec::new();

    for (name, value) in &config.headers {
        let flag = if name == "User-Agent" {
            "-user_agent"
        } else {
            "-headers"
        };
        args.push(flag.to_string());
        args.push(format!("{}: {}", name, value));
    }
    if !config.headers.is_empty() {
        // Terminates the engine's header block.
        args.push("-headers".to_string());
        args.push("\r\n".to_string());
    }

    if let Some(cookies) = config.cookies.as_deref() {
        if !cookies.is_empty() {
            args.push("-cookies".to_string());
            args.push(cookies.to_string());
        }
    }

    args.push("-rw_timeout".to_string());
    args.push(RW_TIMEOUT_MICROS.to_string());

    if debug_log {
        args.push("-loglevel".to_string());
        args.push("debug".to_string());
    }

    args.push("-i".to_string());
    args.push(request.url.clone());

    if config.format == VideoFormat::Avi {
        args.push("-bsf:v".to_string());
        args.push("h264_mp4toannexb".to_string());
    }

    if config.segmented {
        let segment_time = config
            .segment_time_seconds
            .unwrap_or(DEFAULT_SEGMENT_TIME_SECS);
        args.push("-f".to_string());
        args.push("segment".to_string());
        args.push("-segment_time".to_string());
        args.push(segment_time.to_string());

        if matches!(config.format, VideoFormat::Mp4 | VideoFormat::Mov) {
            args.push("-segment_format_options".to_string());
            args.push("movflags=+faststart".to_string());
        }

        args.push("-reset_timestamps".to_string());
        args.push("1".to_string());
        args.push("-strftime".to_string());
        args.push("1".to_string());

        if config.segment_part_bytes.is_some() {
            debug!(
                streamer_id = %request.streamer_id,
                "segment_part_bytes ignored: segment time takes precedence in segmented mode"
            );
        }
    } else if let Some(stop_secs) = config.segment_time_seconds {
        args.push("-to".to_string());
        args.push(stop_secs.to_string());
    } else if let Some(max_bytes) = config.segment_part_bytes {
        args.push("-fs".to_string());
        args.push(max_bytes.to_string());
    }

    args.push("-c".to_string());
    args.push("copy".to_string());

    if !config.segmented {
        args.push("-f".to_string());
        args.push(config.format.muxer().to_string());
    }

    args.push(request.output_path.clone());

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DownloadConfig;

    fn request(config: DownloadConfig) -> CaptureRequest {
        CaptureRequest {
            streamer_id: "s1".to_string(),
            url: "u".to_string(),
            output_path: "o.mp4".to_string(),
            config,
        }
    }

    #[test]
    fn test_argv_golden_segmented_mp4() {
        let config = DownloadConfig {
            headers: vec![
                ("User-Agent".to_string(), "UA".to_string()),
                ("Referer".to_string(), "R".to_string()),
            ],
            cookies: Some("c=1".to_string()),
            format: VideoFormat::Mp4,
            segmented: true,
            segment_time_seconds: Some(60),
            ..Default::default()
        };

        let args = build_args(&request(config), false);
        let expected: Vec<String> = [
            "-user_agent",
            "User-Agent: UA",
            "-headers",
            "Referer: R",
            "-headers",
            "\r\n",
            "-cookies",
            "c=1",
            "-rw_timeout",
            "20000000",
            "-i",
            "u",
            "-f",
            "segment",
            "-segment_time",
            "60",
            "-segment_format_options",
            "movflags=+faststart",
            "-reset_timestamps",
            "1",
            "-strftime",
            "1",
            "-c",
            "copy",
            "o.mp4",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_argv_is_deterministic() {
        let config = DownloadConfig {
            headers: vec![("Referer".to_string(), "R".to_string())],
            segmented: true,
            ..Default::default()
        };
        let req = request(config);
        assert_eq!(build_args(&req, false), build_args(&req, false));
    }

    #[test]
    fn test_no_headers_omits_sentinel_and_cookies() {
        let args = build_args(&request(DownloadConfig::default()), false);
        assert!(!args.iter().any(|a| a == "-headers"));
        assert!(!args.iter().any(|a| a == "-cookies"));
        assert!(!args.iter().any(|a| a == "-user_agent"));
        assert_eq!(args[0], "-rw_timeout");
    }

    #[test]
    fn test_empty_cookie_string_is_omitted() {
        let config = DownloadConfig {
            cookies: Some(String::new()),
            ..Default::default()
        };
        let args = build_args(&request(config), false);
        assert!(!args.iter().any(|a| a == "-cookies"));
    }

    #[test]
    fn test_segment_time_defaults_to_two_hours() {
        let config = DownloadConfig {
            segmented: true,
            ..Default::default()
        };
        let args = build_args(&request(config), false);
        let at = args.iter().position(|a| a == "-segment_time").unwrap();
        assert_eq!(args[at + 1], "7200");
    }

    #[test]
    fn test_segmented_ignores_part_bytes() {
        let config = DownloadConfig {
            segmented: true,
            segment_time_seconds: Some(300),
            segment_part_bytes: Some(1_000_000),
            ..Default::default()
        };
        let args = build_args(&request(config), false);
        assert!(!args.iter().any(|a| a == "-fs"));
        let at = args.iter().position(|a| a == "-segment_time").unwrap();
        assert_eq!(args[at + 1], "300");
    }

    #[test]
    fn test_single_file_stop_time_wins_over_size() {
        let config = DownloadConfig {
            segment_time_seconds: Some(90),
            segment_part_bytes: Some(1_000_000),
            ..Default::default()
        };
        let args = build_args(&request(config), false);
        let at = args.iter().position(|a| a == "-to").unwrap();
        assert_eq!(args[at + 1], "90");
        assert!(!args.iter().any(|a| a == "-fs"));
    }

    #[test]
    fn test_single_file_size_cap_and_muxer_tail() {
        let config = DownloadConfig {
            format: VideoFormat::Mkv,
            segment_part_bytes: Some(4_000_000_000),
            ..Default::default()
        };
        let args = build_args(&request(config), false);
        let fs_at = args.iter().position(|a| a == "-fs").unwrap();
        assert_eq!(args[fs_at + 1], "4000000000");
        // Single-file mode carries the explicit muxer before the output path.
        let tail: Vec<_> = args[args.len() - 3..].to_vec();
        assert_eq!(tail, vec!["-f", "matroska", "o.mp4"]);
    }

    #[test]
    fn test_avi_gets_bitstream_filter() {
        let config = DownloadConfig {
            format: VideoFormat::Avi,
            ..Default::default()
        };
        let args = build_args(&request(config), false);
        let at = args.iter().position(|a| a == "-bsf:v").unwrap();
        assert_eq!(args[at + 1], "h264_mp4toannexb");
    }

    #[test]
    fn test_debug_loglevel_flag() {
        let args = build_args(&request(DownloadConfig::default()), true);
        let at = args.iter().position(|a| a == "-loglevel").unwrap();
        assert_eq!(args[at + 1], "debug");
        assert!(args[at] == "-loglevel" && args[at - 1] == "20000000");
    }
}
