use crate::core::heap::HeapBuilder;
use crate::core::memory::Estimator;
use crate::core::shape::{RecordFields, ShapeKind};
use crate::ingest::isatab;
use crate::ingest::table::{self, FRAME_TYPE};
use crate::study::{study_dirs, study_id, study_progress};
use anyhow::Context;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info, warn};

pub const HEADER: [&str; 5] = ["studyid", "fname", "disk_size", "df_size", "isa_size"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureRow {
    pub study_id: String,
    pub fname: String,
    pub disk_size: u64,
    pub df_size: u128,
    pub isa_size: u128,
}

pub struct MeasureConfig {
    /// Non-positive means no limit.
    pub max_files: i64,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self { max_files: -1 }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MeasureStats {
    pub studies: u64,
    pub rows: u64,
    pub failed: u64,
    pub skipped: bool,
}

pub fn study_estimator() -> Estimator {
    isatab::record_types().into_iter().fold(
        Estimator::new().register(ShapeKind::structured(FRAME_TYPE), RecordFields),
        |estimator, type_name| estimator.register(ShapeKind::structured(type_name), RecordFields),
    )
}

pub fn measure_table(
    dir: &Path,
    study_id: &str,
    fname: &str,
    estimator: &Estimator,
) -> anyhow::Result<MeasureRow> {
    let path = dir.join(fname);
    let disk_size = fs::metadata(&path)
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len();

    let mut hb = HeapBuilder::new();
    let (frame, ingest) = table::load_frame(File::open(&path)?, b'\t', &mut hb)?;
    if ingest.skipped > 0 {
        debug!(table = %path.display(), skipped = ingest.skipped, "ragged rows skipped");
    }
    let df_size = estimator.estimate(&hb.freeze(), frame)?;

    let mut hb = HeapBuilder::new();
    let sequence = isatab::build_process_sequence(File::open(&path)?, &mut hb)?;
    let isa_size = estimator.estimate(&hb.freeze(), sequence)?;

    Ok(MeasureRow {
        study_id: study_id.to_string(),
        fname: fname.to_string(),
        disk_size,
        df_size,
        isa_size,
    })
}

/// Measures every table of one study directory. Any failure fails the whole
/// study.
pub fn measure_study(dir: &Path, estimator: &Estimator) -> anyhow::Result<Vec<MeasureRow>> {
    let investigation = isatab::load(dir)?;
    investigation
        .tables()
        .map(|(sid, fname)| {
            measure_table(dir, sid, fname, estimator).with_context(|| format!("measuring {fname}"))
        })
        .collect()
}

pub fn measure(input: &Path, output: &Path, cfg: &MeasureConfig) -> anyhow::Result<MeasureStats> {
    let mut stats = MeasureStats::default();
    if fs::metadata(output).is_ok_and(|m| m.len() > 0) {
        info!(
            "Output file {} already contains data, skipping. Clean it first if this is not expected.",
            output.display()
        );
        stats.skipped = true;
        return Ok(stats);
    }
    if cfg.max_files > 0 {
        info!("limiting to {} study folders", cfg.max_files);
    }

    let estimator = study_estimator();
    let mut writer =
        csv::Writer::from_path(output).with_context(|| format!("creating {}", output.display()))?;
    writer.write_record(HEADER)?;

    let dirs = study_dirs(input, cfg.max_files)?;
    let progress = study_progress(dirs.len(), "measuring")?;
    for dir in progress.wrap_iter(dirs.into_iter()) {
        stats.studies += 1;
        match measure_study(&dir, &estimator) {
            Ok(rows) => {
                for row in &rows {
                    write_row(&mut writer, row)?;
                }
                writer.flush()?;
                stats.rows += rows.len() as u64;
            }
            Err(e) => {
                warn!(study = %study_id(&dir), "excluding study: {e:#}");
                stats.failed += 1;
            }
        }
    }

    writer.flush()?;
    progress.finish_with_message(format!("{} rows, {} studies failed", stats.rows, stats.failed));
    info!(
        studies = stats.studies,
        rows = stats.rows,
        failed = stats.failed,
        "measure finished"
    );
    Ok(stats)
}

fn write_row<W: std::io::Write>(writer: &mut csv::Writer<W>, row: &MeasureRow) -> anyhow::Result<()> {
    writer.write_record([
        row.study_id.as_str(),
        row.fname.as_str(),
        row.disk_size.to_string().as_str(),
        row.df_size.to_string().as_str(),
        row.isa_size.to_string().as_str(),
    ])?;
    Ok(())
}

pub fn read_rows<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<MeasureRow>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("missing column `{name}`"))
    };
    let [sid, fname, disk, df, isa] = [
        column(HEADER[0])?,
        column(HEADER[1])?,
        column(HEADER[2])?,
        column(HEADER[3])?,
        column(HEADER[4])?,
    ];

    let mut rows = vec![];
    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        let number = |i: usize| {
            record[i]
                .parse::<u128>()
                .with_context(|| format!("row {}: bad number `{}`", line + 1, &record[i]))
        };
        rows.push(MeasureRow {
            study_id: record[sid].to_string(),
            fname: record[fname].to_string(),
            disk_size: u64::try_from(number(disk)?)?,
            df_size: number(df)?,
            isa_size: number(isa)?,
        });
    }
    Ok(rows)
}
