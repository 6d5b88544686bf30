//! Filesystem and filename helpers.

use std::path::Path;

use chrono::Local;

use crate::Result;

/// Creates the parent directory of an output path if it does not exist.
pub async fn ensure_parent_dir(path: impl AsRef<Path>) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Expands an output path template.
///
/// `{streamer}` is replaced with the streamer's name. strftime patterns are
/// expanded here only when `expand_strftime` is set; segmented captures leave
/// them for the engine, which stamps each segment as it opens.
pub fn expand_template(template: &str, streamer_name: &str, expand_strftime: bool) -> String {
    let named = template.replace("{streamer}", streamer_name);
    if expand_strftime {
        Local::now().format(&named).to_string()
    } else {
        named
    }
}
