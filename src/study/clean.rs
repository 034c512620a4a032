use crate::ingest::isatab;
use crate::study::{study_dirs, study_id, study_progress};
use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub struct CleanConfig {
    /// Non-positive means no limit.
    pub max_files: i64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self { max_files: -1 }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub copied: u64,
    pub excluded: u64,
    pub skipped: bool,
}

pub fn clean(input: &Path, output: &Path, cfg: &CleanConfig) -> anyhow::Result<CleanStats> {
    let mut stats = CleanStats::default();
    if output.is_dir() && !study_dirs(output, -1)?.is_empty() {
        info!(
            "Output directory {} already contains studies, skipping. Clean it first if this is not expected.",
            output.display()
        );
        stats.skipped = true;
        return Ok(stats);
    }
    if cfg.max_files > 0 {
        info!("limiting to {} study folders", cfg.max_files);
    }
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;

    let dirs = study_dirs(input, cfg.max_files)?;
    let progress = study_progress(dirs.len(), "cleaning")?;
    for dir in progress.wrap_iter(dirs.into_iter()) {
        match isatab::load(&dir) {
            Ok(investigation) => {
                debug!(study = %study_id(&dir), studies = investigation.studies.len(), "loaded");
                copy_dir(&dir, &output.join(study_id(&dir)))?;
                stats.copied += 1;
            }
            Err(e) => {
                info!("Excluding {}: {e}", dir.display());
                stats.excluded += 1;
            }
        }
    }

    progress.finish_with_message(format!("{} copied, {} excluded", stats.copied, stats.excluded));
    info!(copied = stats.copied, excluded = stats.excluded, "clean finished");
    Ok(stats)
}

fn copy_dir(from: &Path, to: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(to).with_context(|| format!("creating {}", to.display()))?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copying {}", entry.path().display()))?;
        }
    }
    Ok(())
}
