//! Artifact persistence and output-file naming.

use anyhow::Result;
use chrono::Local;
use std::path::{Path, PathBuf};

use crate::reference::VideoId;
use crate::strategies::Granularity;

const MAX_TITLE_CHARS: usize = 200;

/// Strip filesystem-hostile characters, collapse whitespace runs, and cap
/// the length.
pub fn sanitize_filename(name: &str) -> String {
    const INVALID: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let cleaned: String = name
        .chars()
        .filter(|c| !INVALID.contains(c) && !c.is_control())
        .collect();
    let mut collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_TITLE_CHARS {
        collapsed = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    }
    collapsed.trim().to_string()
}

/// `{date}_{title}_{granularity}.txt`, falling back to the video id when no
/// usable title is known.
pub fn auto_filename(title: Option<&str>, id: &VideoId, granularity: Granularity) -> String {
    let date = Local::now().format("%Y%m%d");
    match title.map(sanitize_filename).filter(|t| !t.is_empty()) {
        Some(title) => format!("{date}_{title}_{granularity}.txt"),
        None => format!("{date}_youtube_{id}_{granularity}.txt"),
    }
}

/// An explicit path wins; otherwise auto-name inside the output directory.
pub fn resolve_output_path(
    explicit: Option<PathBuf>,
    output_dir: Option<&Path>,
    title: Option<&str>,
    id: &VideoId,
    granularity: Granularity,
) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    let name = auto_filename(title, id, granularity);
    match output_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Write the artifact, creating parent directories as needed.
pub fn save_artifact(path: &Path, artifact: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    fs_err::write(path, artifact)?;
    Ok(())
}
