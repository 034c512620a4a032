use crate::core::heap::{HeapBuilder, Value};
use crate::core::ids::NodeId;
use std::io::BufReader;

pub const FRAME_TYPE: &str = "DataFrame";
pub const INDEX_TYPE: &str = "Index";
pub const SERIES_TYPE: &str = "Series";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub parsed: u64,
    pub skipped: u64,
}

/// Loads a delimited table as a `DataFrame` record. Empty cells share one
/// `None` node and ragged rows are skipped.
pub fn load_frame<R: std::io::Read>(
    reader: R,
    delimiter: u8,
    builder: &mut HeapBuilder,
) -> anyhow::Result<(NodeId, IngestStats)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(BufReader::new(reader));
    let mut stats = IngestStats::default();

    let headers = csv_reader.headers()?.clone();
    let mut columns: Vec<Vec<NodeId>> = vec![vec![]; headers.len()];
    let missing = builder.alloc(Value::None);

    for maybe_record in csv_reader.records() {
        match maybe_record {
            Ok(record) if record.len() == headers.len() => {
                for (column, cell) in columns.iter_mut().zip(record.iter()) {
                    let id = match parse_cell(cell) {
                        Some(value) => builder.alloc(value),
                        None => missing,
                    };
                    column.push(id);
                }
                stats.parsed += 1;
            }
            _ => stats.skipped += 1,
        }
    }

    let names: Vec<NodeId> = headers.iter().map(|h| builder.alloc_str(h)).collect();
    let data: Vec<(NodeId, NodeId)> = names
        .iter()
        .zip(columns)
        .map(|(name, cells)| (*name, builder.alloc_typed(SERIES_TYPE, Value::Seq(cells))))
        .collect();

    let index = builder.alloc_typed(INDEX_TYPE, Value::Seq(names));
    let data = builder.alloc(Value::Map(data));
    let frame = builder.alloc_typed(
        FRAME_TYPE,
        Value::Record(vec![("columns".to_string(), index), ("data".to_string(), data)]),
    );

    anyhow::Ok((frame, stats))
}

fn parse_cell(cell: &str) -> Option<Value> {
    if cell.is_empty() {
        return None;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Some(Value::Int(i));
    }
    if let Ok(f) = cell.parse::<f64>() {
        return Some(Value::Float(f));
    }
    Some(Value::Str(cell.to_string()))
}
