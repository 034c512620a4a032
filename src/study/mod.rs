use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

pub mod categorize;
pub mod clean;
pub mod measure;
pub mod report;

pub const STUDY_PREFIX: &str = "MTBLS";

/// Study directories (`MTBLS*`) directly under `root`, sorted by name and
/// limited to `max_files` entries when it is positive.
pub fn study_dirs(root: &Path, max_files: i64) -> anyhow::Result<Vec<PathBuf>> {
    let mut dirs = vec![];
    for entry in std::fs::read_dir(root).with_context(|| format!("reading {}", root.display()))? {
        let path = entry?.path();
        let is_study = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(STUDY_PREFIX));
        if is_study && path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    if max_files > 0 {
        dirs.truncate(max_files as usize);
    }
    Ok(dirs)
}

pub fn study_progress(len: usize, action: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} studies {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message(action.to_string());
    Ok(pb)
}

pub fn study_id(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
