//! Capture-engine stderr grammar.
//!
//! Two line shapes matter while a capture runs:
//!
//! - `[segment @ 0x...] Opening 'file.mp4' for writing` marks a new parted
//!   segment.
//! - `... size=    1024kB time=00:00:04.00 bitrate=2097.2kbits/s speed=1.00x`
//!   reports progress.
//!
//! Everything else is informational and never fails a capture.

/// Progress sample parsed from one stderr line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSample {
    /// Downloaded size in kilobytes.
    pub size_kb: u64,
    /// Bitrate substring as reported by the engine, e.g. `2097.2kbits/s`.
    pub bitrate: String,
}

/// Returns the filename of a newly opened segment, if the line announces one.
pub fn parse_segment_open(line: &str) -> Option<&str> {
    if !line.starts_with("[segment @") || !line.contains("Opening") {
        return None;
    }
    let start = line.find('\'')? + 1;
    let end = start + line[start..].find('\'')?;
    Some(&line[start..end])
}

/// Parses a progress line into a [`ProgressSample`].
pub fn parse_progress(line: &str) -> Option<ProgressSample> {
    if !line.contains("size=") || !line.contains("time=") {
        return None;
    }

    let size_section = {
        let from = line.find("size=")? + "size=".len();
        let to = from + line[from..].find("time")?;
        &line[from..to]
    };
    let digits: String = size_section.chars().filter(|c| c.is_ascii_digit()).collect();
    let size_kb: u64 = digits.parse().ok()?;

    let bitrate = match line.find("bitrate=") {
        Some(at) => {
            let from = at + "bitrate=".len();
            let to = line[from..]
                .find("speed")
                .map(|i| from + i)
                .unwrap_or(line.len());
            line[from..to].trim().to_string()
        }
        None => String::new(),
    };

    Some(ProgressSample { size_kb, bitrate })
}
