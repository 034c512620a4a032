use crate::core::error::OracleError;
use crate::core::heap::{Heap, Node};
use crate::core::ids::NodeId;
use std::collections::HashMap;

/// Shallow storage cost of a single node, excluding everything it references.
pub trait SizeOracle {
    fn shallow_cost(&self, heap: &Heap, id: NodeId) -> Result<u64, OracleError>;
}

pub fn resolve(heap: &Heap, id: NodeId) -> Result<&Node, OracleError> {
    match heap.slot(id) {
        None => Err(OracleError::Dangling(id)),
        Some(None) => Err(OracleError::Vacant(id)),
        Some(Some(node)) => Ok(node),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutOracle;

impl SizeOracle for LayoutOracle {
    fn shallow_cost(&self, heap: &Heap, id: NodeId) -> Result<u64, OracleError> {
        let node = resolve(heap, id)?;
        let bytes = size_of::<Node>() + node.type_name_bytes() + node.value().owned_bytes();
        Ok(bytes as u64)
    }
}

/// Unknown type names cost `fallback`, or fail when none is set.
#[derive(Debug, Clone, Default)]
pub struct FixedOracle {
    costs: HashMap<String, u64>,
    fallback: Option<u64>,
}

impl FixedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cost(mut self, type_name: &str, bytes: u64) -> Self {
        self.costs.insert(type_name.to_string(), bytes);
        self
    }

    pub fn fallback(mut self, bytes: u64) -> Self {
        self.fallback = Some(bytes);
        self
    }
}

impl SizeOracle for FixedOracle {
    fn shallow_cost(&self, heap: &Heap, id: NodeId) -> Result<u64, OracleError> {
        let node = resolve(heap, id)?;
        self.costs
            .get(node.type_name())
            .copied()
            .or(self.fallback)
            .ok_or_else(|| OracleError::Unpriced {
                type_name: node.type_name().to_string(),
            })
    }
}

impl<O: SizeOracle + ?Sized> SizeOracle for &O {
    fn shallow_cost(&self, heap: &Heap, id: NodeId) -> Result<u64, OracleError> {
        (**self).shallow_cost(heap, id)
    }
}
