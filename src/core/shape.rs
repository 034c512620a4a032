use crate::core::error::EnumeratorError;
use crate::core::heap::{Node, Value};
use crate::core::ids::NodeId;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Lazy stream of child references, consumed once per node visit. An item
/// may fail once some children were already produced.
pub type Children<'a> = Box<dyn Iterator<Item = Result<NodeId, EnumeratorError>> + 'a>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Sequence,
    Set,
    Mapping,
    /// Nodes whose runtime type name equals the given name, whatever their
    /// payload.
    Structured(Cow<'static, str>),
}

impl ShapeKind {
    pub fn structured(type_name: impl Into<Cow<'static, str>>) -> Self {
        Self::Structured(type_name.into())
    }

    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Self::Sequence => matches!(node.value(), Value::Seq(_)),
            Self::Set => matches!(node.value(), Value::Set(_)),
            Self::Mapping => matches!(node.value(), Value::Map(_)),
            Self::Structured(name) => node.type_name() == name.as_ref(),
        }
    }

    pub const fn is_builtin(&self) -> bool {
        !matches!(self, Self::Structured(_))
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Set => write!(f, "set"),
            Self::Mapping => write!(f, "mapping"),
            Self::Structured(name) => write!(f, "structured({name})"),
        }
    }
}

pub trait Enumerator: Send + Sync {
    fn children<'a>(&self, node: &'a Node) -> Result<Children<'a>, EnumeratorError>;
}

pub struct SequenceItems;

impl Enumerator for SequenceItems {
    fn children<'a>(&self, node: &'a Node) -> Result<Children<'a>, EnumeratorError> {
        match node.value() {
            Value::Seq(items) => Ok(Box::new(items.iter().copied().map(Ok))),
            _ => Err(mismatch("sequence", node)),
        }
    }
}

pub struct SetMembers;

impl Enumerator for SetMembers {
    fn children<'a>(&self, node: &'a Node) -> Result<Children<'a>, EnumeratorError> {
        match node.value() {
            Value::Set(members) => Ok(Box::new(members.iter().copied().map(Ok))),
            _ => Err(mismatch("set", node)),
        }
    }
}

pub struct MappingEntries;

impl Enumerator for MappingEntries {
    fn children<'a>(&self, node: &'a Node) -> Result<Children<'a>, EnumeratorError> {
        match node.value() {
            Value::Map(entries) => Ok(Box::new(entries.iter().flat_map(|&(k, v)| [Ok(k), Ok(v)]))),
            _ => Err(mismatch("mapping", node)),
        }
    }
}

/// Field values of a record. Field names are part of the record's shallow
/// cost, not separate nodes.
pub struct RecordFields;

impl Enumerator for RecordFields {
    fn children<'a>(&self, node: &'a Node) -> Result<Children<'a>, EnumeratorError> {
        match node.value() {
            Value::Record(fields) => Ok(Box::new(fields.iter().map(|(_, id)| Ok(*id)))),
            _ => Err(mismatch("record", node)),
        }
    }
}

fn mismatch(expected: &'static str, node: &Node) -> EnumeratorError {
    EnumeratorError::ShapeMismatch {
        expected,
        type_name: node.type_name().to_string(),
    }
}

/// Ordered shape-kind bindings. Structured kinds sit ahead of the built-in
/// container kinds.
#[derive(Clone, Default)]
pub struct EnumeratorTable {
    entries: Vec<(ShapeKind, Arc<dyn Enumerator>)>,
}

impl EnumeratorTable {
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    pub fn builtin() -> Self {
        let mut table = Self::new();
        table
            .register(ShapeKind::Sequence, SequenceItems)
            .register(ShapeKind::Set, SetMembers)
            .register(ShapeKind::Mapping, MappingEntries);
        table
    }

    pub fn register(&mut self, kind: ShapeKind, enumerator: impl Enumerator + 'static) -> &mut Self {
        self.insert(kind, Arc::new(enumerator))
    }

    fn insert(&mut self, kind: ShapeKind, enumerator: Arc<dyn Enumerator>) -> &mut Self {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = enumerator;
        } else if kind.is_builtin() {
            self.entries.push((kind, enumerator));
        } else {
            let at = self
                .entries
                .iter()
                .position(|(k, _)| k.is_builtin())
                .unwrap_or(self.entries.len());
            self.entries.insert(at, (kind, enumerator));
        }
        self
    }

    pub fn merged(&self, extra: &Self) -> Self {
        let mut table = self.clone();
        for (kind, enumerator) in &extra.entries {
            table.insert(kind.clone(), Arc::clone(enumerator));
        }
        table
    }

    pub fn classify(&self, node: &Node) -> Option<(&ShapeKind, &dyn Enumerator)> {
        self.entries
            .iter()
            .find(|(k, _)| k.matches(node))
            .map(|(k, e)| (k, e.as_ref()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ShapeKind> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for EnumeratorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}
