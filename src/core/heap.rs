use crate::core::ids::NodeId;
use std::borrow::Cow;

/// Runtime payload of a node. Container variants hold references to other
/// nodes; everything else is a scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<NodeId>),
    Set(Vec<NodeId>),
    Map(Vec<(NodeId, NodeId)>),
    Record(Vec<(String, NodeId)>),
}

impl Value {
    pub const fn default_type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Seq(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "dict",
            Self::Record(_) => "object",
        }
    }

    pub fn owned_bytes(&self) -> usize {
        match self {
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) => 0,
            Self::Str(s) => s.capacity(),
            Self::Seq(items) | Self::Set(items) => items.capacity() * size_of::<NodeId>(),
            Self::Map(entries) => entries.capacity() * size_of::<(NodeId, NodeId)>(),
            Self::Record(fields) => {
                fields.capacity() * size_of::<(String, NodeId)>()
                    + fields.iter().map(|(name, _)| name.capacity()).sum::<usize>()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    type_name: Cow<'static, str>,
    value: Value,
}

impl Node {
    pub fn new(value: Value) -> Self {
        Self {
            type_name: Cow::Borrowed(value.default_type_name()),
            value,
        }
    }

    pub fn typed(type_name: impl Into<Cow<'static, str>>, value: Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn type_name_bytes(&self) -> usize {
        match &self.type_name {
            Cow::Borrowed(_) => 0,
            Cow::Owned(s) => s.capacity(),
        }
    }
}

pub struct HeapBuilder {
    heap: Heap,
}

impl HeapBuilder {
    pub fn new() -> Self {
        Self { heap: Heap::new() }
    }

    pub fn reserve(&mut self) -> NodeId {
        let next = self.heap.slots.len();
        if next == u32::MAX as usize {
            panic!("Nodes count exceeds the limit")
        }
        self.heap.slots.push(None);
        next as NodeId
    }

    pub fn fill(&mut self, id: NodeId, node: Node) {
        self.heap.slots[id as usize] = Some(node);
    }

    pub fn alloc(&mut self, value: Value) -> NodeId {
        self.push(Node::new(value))
    }

    pub fn alloc_typed(&mut self, type_name: impl Into<Cow<'static, str>>, value: Value) -> NodeId {
        self.push(Node::typed(type_name, value))
    }

    pub fn alloc_str(&mut self, s: &str) -> NodeId {
        self.alloc(Value::Str(s.to_string()))
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = self.reserve();
        self.fill(id, node);
        id
    }

    pub fn node_count(&self) -> usize {
        self.heap.node_count()
    }

    pub fn freeze(self) -> Heap {
        self.heap
    }
}

impl Default for HeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable arena holding an object graph. A `NodeId` is the identity of a
/// node: two slots with equal values are still two distinct nodes.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    slots: Vec<Option<Node>>,
}

impl Heap {
    fn new() -> Self {
        Self { slots: vec![] }
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// `None` if `id` was never handed out, `Some(None)` if it was reserved
    /// but never filled.
    pub fn slot(&self, id: NodeId) -> Option<Option<&Node>> {
        self.slots.get(id as usize).map(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slot(id).flatten()
    }
}

#[cfg(test)]
impl Heap {
    pub(crate) fn edges_from(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let refs: Box<dyn Iterator<Item = NodeId> + '_> = match self.node(id).map(Node::value) {
            Some(Value::Seq(items)) | Some(Value::Set(items)) => Box::new(items.iter().copied()),
            Some(Value::Map(entries)) => Box::new(entries.iter().flat_map(|&(k, v)| [k, v])),
            Some(Value::Record(fields)) => Box::new(fields.iter().map(|(_, v)| *v)),
            _ => Box::new(std::iter::empty()),
        };
        refs
    }
}
