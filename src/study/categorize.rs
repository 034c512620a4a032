use crate::study::measure::read_rows;
use anyhow::Context;
use std::fmt;
use std::str::FromStr;
use tracing::info;

pub const HEADER: [&str; 6] = ["study_id", "fname", "disk_size", "size", "log_size", "category"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    DataFrame,
    Isa,
}

impl Category {
    pub const ALL: [Self; 2] = [Self::DataFrame, Self::Isa];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DataFrame => "DataFrame",
            Self::Isa => "ISA",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .with_context(|| format!("unknown category `{s}`"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorizedRow {
    pub study_id: String,
    pub fname: String,
    pub disk_size: u64,
    pub size: u128,
    pub log_size: f64,
    pub category: Category,
}

/// Splits every measured row into one row per category, ordered by
/// category. Rows of the same category keep their input order.
pub fn categorize<R: std::io::Read, W: std::io::Write>(input: R, output: W) -> anyhow::Result<usize> {
    info!("transforming dataset to categorized table");
    let mut rows = vec![];
    for measured in read_rows(input)? {
        for (category, size) in [
            (Category::DataFrame, measured.df_size),
            (Category::Isa, measured.isa_size),
        ] {
            rows.push(CategorizedRow {
                study_id: measured.study_id.clone(),
                fname: measured.fname.clone(),
                disk_size: measured.disk_size,
                size,
                log_size: (size as f64).ln(),
                category,
            });
        }
    }
    rows.sort_by_key(|r| r.category);

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(HEADER)?;
    for row in &rows {
        writer.write_record([
            row.study_id.as_str(),
            row.fname.as_str(),
            row.disk_size.to_string().as_str(),
            row.size.to_string().as_str(),
            row.log_size.to_string().as_str(),
            row.category.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(rows.len())
}

pub fn read_categorized<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<CategorizedRow>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    if headers.iter().ne(HEADER) {
        anyhow::bail!("unexpected header {:?}", headers.iter().collect::<Vec<_>>());
    }

    let mut rows = vec![];
    for record in csv_reader.records() {
        let record = record?;
        rows.push(CategorizedRow {
            study_id: record[0].to_string(),
            fname: record[1].to_string(),
            disk_size: record[2].parse().context("disk_size")?,
            size: record[3].parse().context("size")?,
            log_size: record[4].parse().context("log_size")?,
            category: record[5].parse()?,
        });
    }
    Ok(rows)
}
