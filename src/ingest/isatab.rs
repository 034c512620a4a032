use crate::core::heap::{HeapBuilder, Node, Value};
use crate::core::ids::{NodeId, NodeRegistry};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PROCESS_TYPE: &str = "Process";
pub const PROTOCOL_TYPE: &str = "Protocol";

#[derive(Error, Debug)]
pub enum IsaTabError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no investigation file (i_*.txt) in {0}")]
    NoInvestigation(PathBuf),

    #[error("investigation declares no studies")]
    NoStudies,

    #[error("study `{identifier}` has no study file name")]
    MissingStudyFile { identifier: String },

    #[error("table {0} does not exist")]
    MissingTable(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyEntry {
    pub identifier: String,
    pub filename: String,
    pub assays: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Investigation {
    pub studies: Vec<StudyEntry>,
}

impl Investigation {
    pub fn tables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.studies.iter().flat_map(|s| {
            std::iter::once(s.filename.as_str())
                .chain(s.assays.iter().map(String::as_str))
                .map(move |f| (s.identifier.as_str(), f))
        })
    }
}

pub fn load(dir: &Path) -> Result<Investigation, IsaTabError> {
    let path = find_investigation(dir)?;
    let investigation = parse_investigation(File::open(path)?)?;
    for (_, fname) in investigation.tables() {
        let table = dir.join(fname);
        if !table.is_file() {
            return Err(IsaTabError::MissingTable(table));
        }
    }
    Ok(investigation)
}

pub fn find_investigation(dir: &Path) -> Result<PathBuf, IsaTabError> {
    let mut candidates = vec![];
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_investigation = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("i_") && n.ends_with(".txt"));
        if is_investigation && path.is_file() {
            candidates.push(path);
        }
    }
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| IsaTabError::NoInvestigation(dir.to_path_buf()))
}

pub fn parse_investigation<R: std::io::Read>(reader: R) -> Result<Investigation, IsaTabError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(reader));
    let mut studies: Vec<StudyEntry> = vec![];

    for record in csv_reader.records() {
        let record = record?;
        let value = || record.get(1).unwrap_or_default().trim().to_string();
        match record.get(0).map(str::trim) {
            Some("STUDY") => studies.push(StudyEntry::default()),
            Some("Study Identifier") => current(&mut studies).identifier = value(),
            Some("Study File Name") => current(&mut studies).filename = value(),
            Some("Study Assay File Name") => {
                current(&mut studies).assays = record
                    .iter()
                    .skip(1)
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    if studies.is_empty() {
        return Err(IsaTabError::NoStudies);
    }
    if let Some(study) = studies.iter().find(|s| s.filename.is_empty()) {
        return Err(IsaTabError::MissingStudyFile {
            identifier: study.identifier.clone(),
        });
    }
    Ok(Investigation { studies })
}

fn current(studies: &mut Vec<StudyEntry>) -> &mut StudyEntry {
    if studies.is_empty() {
        studies.push(StudyEntry::default());
    }
    let last = studies.len() - 1;
    &mut studies[last]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaterialKind {
    Source,
    Sample,
    Material,
    DataFile,
}

impl MaterialKind {
    const fn type_name(self) -> &'static str {
        match self {
            Self::Source => "Source",
            Self::Sample => "Sample",
            Self::Material => "Material",
            Self::DataFile => "DataFile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Material(MaterialKind),
    Protocol,
    ProcessName,
    Qualifier,
}

fn classify(header: &str) -> Column {
    match header {
        "Protocol REF" => Column::Protocol,
        "Source Name" => Column::Material(MaterialKind::Source),
        "Sample Name" => Column::Material(MaterialKind::Sample),
        "Scan Name" | "Normalization Name" | "Data Transformation Name" => Column::ProcessName,
        h if h.ends_with("Assay Name") => Column::ProcessName,
        h if h.ends_with(" Name") => Column::Material(MaterialKind::Material),
        h if h.ends_with(" File") => Column::Material(MaterialKind::DataFile),
        _ => Column::Qualifier,
    }
}

struct MaterialDraft {
    kind: MaterialKind,
    name: String,
    annotations: Vec<String>,
}

struct ProcessDraft {
    protocol: NodeId,
    name: Option<String>,
    parameters: Vec<String>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

struct Pending {
    column: usize,
    protocol: NodeId,
    name: Option<String>,
    parameters: Vec<String>,
    input: Option<NodeId>,
}

enum Attach {
    Nothing,
    Material(NodeId),
    Process,
}

struct SequenceBuilder<'b> {
    builder: &'b mut HeapBuilder,
    registry: NodeRegistry,
    materials: HashMap<NodeId, MaterialDraft>,
    processes: HashMap<NodeId, ProcessDraft>,
    order: Vec<NodeId>,
}

impl<'b> SequenceBuilder<'b> {
    fn new(builder: &'b mut HeapBuilder) -> Self {
        Self {
            builder,
            registry: NodeRegistry::new(),
            materials: HashMap::new(),
            processes: HashMap::new(),
            order: vec![],
        }
    }

    fn row(&mut self, columns: &[(String, Column)], cells: &csv::StringRecord) {
        let mut last_material = None;
        let mut last_process = None;
        let mut pending: Option<Pending> = None;
        let mut attach = Attach::Nothing;

        for (column, ((header, role), cell)) in columns.iter().zip(cells.iter()).enumerate() {
            let cell = cell.trim();
            match role {
                Column::Material(kind) => {
                    if cell.is_empty() {
                        attach = Attach::Nothing;
                        continue;
                    }
                    let (id, created) = self.material(*kind, cell);
                    if let Some(p) = pending.take() {
                        last_process = Some(self.close(p, Some(id), last_process));
                    }
                    last_material = Some(id);
                    attach = if created {
                        Attach::Material(id)
                    } else {
                        Attach::Nothing
                    };
                }
                Column::Protocol => {
                    if cell.is_empty() {
                        continue;
                    }
                    if let Some(p) = pending.take() {
                        last_process = Some(self.close(p, None, last_process));
                    }
                    pending = Some(Pending {
                        column,
                        protocol: self.protocol(cell),
                        name: None,
                        parameters: vec![],
                        input: last_material,
                    });
                    attach = Attach::Process;
                }
                Column::ProcessName => {
                    if let Some(p) = pending.as_mut().filter(|_| !cell.is_empty()) {
                        p.name = Some(cell.to_string());
                    }
                }
                Column::Qualifier => {
                    if cell.is_empty() {
                        continue;
                    }
                    let annotation = format!("{header}={cell}");
                    match attach {
                        Attach::Material(id) => {
                            if let Some(m) = self.materials.get_mut(&id) {
                                m.annotations.push(annotation);
                            }
                        }
                        Attach::Process => {
                            if let Some(p) = pending.as_mut() {
                                p.parameters.push(annotation);
                            }
                        }
                        Attach::Nothing => {}
                    }
                }
            }
        }

        if let Some(p) = pending.take() {
            self.close(p, None, last_process);
        }
    }

    fn material(&mut self, kind: MaterialKind, name: &str) -> (NodeId, bool) {
        let key = format!("{}:{name}", kind.type_name());
        let builder = &mut *self.builder;
        let (id, created) = self.registry.get_or_insert_with(&key, || builder.reserve());
        if created {
            self.materials.insert(
                id,
                MaterialDraft {
                    kind,
                    name: name.to_string(),
                    annotations: vec![],
                },
            );
        }
        (id, created)
    }

    fn protocol(&mut self, name: &str) -> NodeId {
        let key = format!("{PROTOCOL_TYPE}:{name}");
        let builder = &mut *self.builder;
        let (id, _) = self.registry.get_or_insert_with(&key, || {
            let name = builder.alloc_str(name);
            builder.alloc_typed(
                PROTOCOL_TYPE,
                Value::Record(vec![("name".to_string(), name)]),
            )
        });
        id
    }

    fn close(&mut self, p: Pending, output: Option<NodeId>, prev: Option<NodeId>) -> NodeId {
        let key = format!(
            "{PROCESS_TYPE}:{}:{}:{:?}:{:?}:{:?}",
            p.column, p.protocol, p.name, p.input, output
        );
        let builder = &mut *self.builder;
        let (id, created) = self.registry.get_or_insert_with(&key, || builder.reserve());
        if created {
            self.processes.insert(
                id,
                ProcessDraft {
                    protocol: p.protocol,
                    name: p.name,
                    parameters: p.parameters,
                    inputs: p.input.into_iter().collect(),
                    outputs: output.into_iter().collect(),
                    prev: None,
                    next: None,
                },
            );
            self.order.push(id);
        }
        if let Some(prev) = prev.filter(|prev| *prev != id) {
            if let Some(draft) = self.processes.get_mut(&prev) {
                draft.next = Some(id);
            }
            if let Some(draft) = self.processes.get_mut(&id) {
                draft.prev = Some(prev);
            }
        }
        id
    }

    fn finish(self) -> NodeId {
        let Self {
            builder,
            materials,
            processes,
            order,
            ..
        } = self;
        let none = builder.alloc(Value::None);

        for (id, m) in materials {
            let name = builder.alloc_str(&m.name);
            let annotations = m.annotations.iter().map(|a| builder.alloc_str(a)).collect::<Vec<_>>();
            let annotations = builder.alloc(Value::Seq(annotations));
            builder.fill(
                id,
                Node::typed(
                    m.kind.type_name(),
                    Value::Record(vec![
                        ("name".to_string(), name),
                        ("annotations".to_string(), annotations),
                    ]),
                ),
            );
        }

        for (id, p) in processes {
            let name = match &p.name {
                Some(name) => builder.alloc_str(name),
                None => none,
            };
            let parameters = p.parameters.iter().map(|a| builder.alloc_str(a)).collect::<Vec<_>>();
            let parameters = builder.alloc(Value::Seq(parameters));
            let inputs = builder.alloc(Value::Seq(p.inputs));
            let outputs = builder.alloc(Value::Seq(p.outputs));
            builder.fill(
                id,
                Node::typed(
                    PROCESS_TYPE,
                    Value::Record(vec![
                        ("name".to_string(), name),
                        ("executes_protocol".to_string(), p.protocol),
                        ("parameter_values".to_string(), parameters),
                        ("inputs".to_string(), inputs),
                        ("outputs".to_string(), outputs),
                        ("prev_process".to_string(), p.prev.unwrap_or(none)),
                        ("next_process".to_string(), p.next.unwrap_or(none)),
                    ]),
                ),
            );
        }

        builder.alloc(Value::Seq(order))
    }
}

pub fn record_types() -> [&'static str; 6] {
    [
        PROCESS_TYPE,
        PROTOCOL_TYPE,
        MaterialKind::Source.type_name(),
        MaterialKind::Sample.type_name(),
        MaterialKind::Material.type_name(),
        MaterialKind::DataFile.type_name(),
    ]
}

/// Builds the process sequence described by a study or assay table and
/// returns the id of the list holding its processes.
pub fn build_process_sequence<R: std::io::Read>(
    reader: R,
    builder: &mut HeapBuilder,
) -> Result<NodeId, IsaTabError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(BufReader::new(reader));
    let columns: Vec<(String, Column)> = csv_reader
        .headers()?
        .iter()
        .map(|h| (h.trim().to_string(), classify(h.trim())))
        .collect();

    let mut sequence = SequenceBuilder::new(builder);
    for record in csv_reader.records() {
        sequence.row(&columns, &record?);
    }
    Ok(sequence.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::heap::Heap;

    const INVESTIGATION: &str = "\
ONTOLOGY SOURCE REFERENCE
Term Source Name\t\"OBI\"
INVESTIGATION
Investigation Identifier\t\"MTBLS1\"
STUDY
Study Identifier\t\"MTBLS1\"
Study File Name\t\"s_MTBLS1.txt\"
STUDY ASSAYS
Study Assay File Name\t\"a_nmr.txt\"\t\"a_ms.txt\"
";

    const STUDY: &str = "\
Source Name\tCharacteristics[Organism]\tProtocol REF\tParameter Value[Volume]\tSample Name\tFactor Value[Dose]
s1\tHomo sapiens\tsample collection\t5\tsample-1\thigh
s1\tHomo sapiens\tsample collection\t5\tsample-2\tlow
s2\tMus musculus\tsample collection\t7\tsample-3\thigh
";

    fn build(text: &str) -> (Heap, NodeId) {
        let mut hb = HeapBuilder::new();
        let root = build_process_sequence(text.as_bytes(), &mut hb).unwrap();
        (hb.freeze(), root)
    }

    fn field(heap: &Heap, record: NodeId, name: &str) -> NodeId {
        match heap.node(record).unwrap().value() {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == name).unwrap().1,
            other => panic!("not a record: {other:?}"),
        }
    }

    fn type_of(heap: &Heap, id: NodeId) -> &str {
        heap.node(id).unwrap().type_name()
    }

    #[test]
    fn test_parse_investigation() {
        let investigation = parse_investigation(INVESTIGATION.as_bytes()).unwrap();
        assert_eq!(
            vec![StudyEntry {
                identifier: "MTBLS1".to_string(),
                filename: "s_MTBLS1.txt".to_string(),
                assays: vec!["a_nmr.txt".to_string(), "a_ms.txt".to_string()],
            }],
            investigation.studies
        );
        assert_eq!(
            vec![
                ("MTBLS1", "s_MTBLS1.txt"),
                ("MTBLS1", "a_nmr.txt"),
                ("MTBLS1", "a_ms.txt")
            ],
            investigation.tables().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_investigation_without_studies() {
        let err = parse_investigation("INVESTIGATION\nInvestigation Identifier\tx\n".as_bytes());
        assert!(matches!(err, Err(IsaTabError::NoStudies)));
    }

    #[test]
    fn test_study_without_file_name() {
        let err = parse_investigation("STUDY\nStudy Identifier\tMTBLS9\n".as_bytes());
        assert!(matches!(
            err,
            Err(IsaTabError::MissingStudyFile { identifier }) if identifier == "MTBLS9"
        ));
    }

    #[test]
    fn test_one_process_per_distinct_application() {
        let (heap, root) = build(STUDY);
        let processes: Vec<NodeId> = heap.edges_from(root).collect();
        assert_eq!(3, processes.len());
        assert!(processes.iter().all(|p| type_of(&heap, *p) == PROCESS_TYPE));
    }

    #[test]
    fn test_materials_and_protocols_shared_across_rows() {
        let (heap, root) = build(STUDY);
        let processes: Vec<NodeId> = heap.edges_from(root).collect();

        let protocols: Vec<NodeId> = processes
            .iter()
            .map(|p| field(&heap, *p, "executes_protocol"))
            .collect();
        assert!(protocols.iter().all(|p| *p == protocols[0]));
        assert_eq!(PROTOCOL_TYPE, type_of(&heap, protocols[0]));

        let first_inputs: Vec<NodeId> = processes
            .iter()
            .map(|p| heap.edges_from(field(&heap, *p, "inputs")).next().unwrap())
            .collect();
        assert_eq!(first_inputs[0], first_inputs[1]);
        assert_ne!(first_inputs[0], first_inputs[2]);
        assert_eq!("Source", type_of(&heap, first_inputs[0]));
    }

    #[test]
    fn test_qualifiers_attach_to_nearest_node() {
        let (heap, root) = build(STUDY);
        let process = heap.edges_from(root).next().unwrap();

        let params: Vec<NodeId> = heap
            .edges_from(field(&heap, process, "parameter_values"))
            .collect();
        assert_eq!(
            Some(&Value::Str("Parameter Value[Volume]=5".to_string())),
            heap.node(params[0]).map(Node::value)
        );

        let sample = heap.edges_from(field(&heap, process, "outputs")).next().unwrap();
        assert_eq!("Sample", type_of(&heap, sample));
        let annotations: Vec<NodeId> = heap.edges_from(field(&heap, sample, "annotations")).collect();
        assert_eq!(
            Some(&Value::Str("Factor Value[Dose]=high".to_string())),
            heap.node(annotations[0]).map(Node::value)
        );
    }

    #[test]
    fn test_chained_processes_link_both_ways() {
        let table = "\
Source Name\tProtocol REF\tSample Name\tProtocol REF\tExtract Name\tProtocol REF\tMS Assay Name\tRaw Spectral Data File
s1\tcollection\tsample-1\textraction\tex-1\tmass spectrometry\trun-1\trun1.mzML
";
        let (heap, root) = build(table);
        let processes: Vec<NodeId> = heap.edges_from(root).collect();
        assert_eq!(3, processes.len());

        assert_eq!(processes[1], field(&heap, processes[0], "next_process"));
        assert_eq!(processes[0], field(&heap, processes[1], "prev_process"));
        assert_eq!(processes[2], field(&heap, processes[1], "next_process"));

        let ms = processes[2];
        assert_eq!(
            Some(&Value::Str("run-1".to_string())),
            heap.node(field(&heap, ms, "name")).map(Node::value)
        );
        let output = heap.edges_from(field(&heap, ms, "outputs")).next().unwrap();
        assert_eq!("DataFile", type_of(&heap, output));
        let prev = field(&heap, processes[0], "prev_process");
        assert_eq!(&Value::None, heap.node(prev).unwrap().value());
    }

    #[test]
    fn test_every_reserved_slot_is_filled() {
        let (heap, _) = build(STUDY);
        for id in 0..heap.node_count() as NodeId {
            assert!(heap.node(id).is_some(), "slot {id} left vacant");
        }
    }

    #[test]
    fn test_header_only_table() {
        let (heap, root) = build("Source Name\tProtocol REF\tSample Name\n");
        assert_eq!(0, heap.edges_from(root).count());
    }
}
