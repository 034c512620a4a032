use crate::core::error::EstimateError;
use crate::core::heap::Heap;
use crate::core::ids::{NodeId, VisitedSet};
use crate::core::oracle::{LayoutOracle, SizeOracle, resolve};
use crate::core::shape::{Children, Enumerator, EnumeratorTable, ShapeKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FootprintStats {
    pub nodes: usize,
    pub bytes: u128,
    pub max_depth: usize,
}

/// Estimates the footprint of `root` with the built-in enumerators plus the
/// bindings in `extra`.
pub fn estimate<O: SizeOracle + ?Sized>(
    heap: &Heap,
    root: NodeId,
    extra: &EnumeratorTable,
    oracle: &O,
) -> Result<u128, EstimateError> {
    estimate_stats(heap, root, extra, oracle).map(|stats| stats.bytes)
}

pub fn estimate_stats<O: SizeOracle + ?Sized>(
    heap: &Heap,
    root: NodeId,
    extra: &EnumeratorTable,
    oracle: &O,
) -> Result<FootprintStats, EstimateError> {
    walk(heap, root, &EnumeratorTable::builtin().merged(extra), oracle)
}

// Depth-first over an explicit stack of child streams; `table` must already
// hold the built-in kinds.
fn walk<O: SizeOracle + ?Sized>(
    heap: &Heap,
    root: NodeId,
    table: &EnumeratorTable,
    oracle: &O,
) -> Result<FootprintStats, EstimateError> {
    let mut state = Walk {
        heap,
        table,
        oracle,
        visited: VisitedSet::with_capacity(heap.node_count()),
        stats: FootprintStats::default(),
    };

    let mut stack: Vec<(NodeId, Children<'_>)> = Vec::new();
    if let Some(children) = state.price(root)? {
        stack.push((root, children));
    }
    state.stats.max_depth = stack.len();

    while let Some((parent, top)) = stack.last_mut() {
        match top.next() {
            Some(Ok(child)) => {
                if let Some(children) = state.price(child)? {
                    stack.push((child, children));
                    state.stats.max_depth = state.stats.max_depth.max(stack.len());
                }
            }
            Some(Err(source)) => {
                return Err(EstimateError::Enumerator {
                    node: *parent,
                    source,
                });
            }
            None => {
                stack.pop();
            }
        }
    }

    state.stats.nodes = state.visited.len();
    Ok(state.stats)
}

struct Walk<'a, O: ?Sized> {
    heap: &'a Heap,
    table: &'a EnumeratorTable,
    oracle: &'a O,
    visited: VisitedSet,
    stats: FootprintStats,
}

impl<'a, O: SizeOracle + ?Sized> Walk<'a, O> {
    fn price(&mut self, id: NodeId) -> Result<Option<Children<'a>>, EstimateError> {
        if !self.visited.insert(id) {
            return Ok(None);
        }
        let cost = self.oracle.shallow_cost(self.heap, id)?;
        self.stats.bytes += u128::from(cost);

        let node = resolve(self.heap, id)?;
        match self.table.classify(node) {
            Some((_, enumerator)) => enumerator
                .children(node)
                .map(Some)
                .map_err(|source| EstimateError::Enumerator { node: id, source }),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Estimator<O = LayoutOracle> {
    table: EnumeratorTable,
    oracle: O,
}

impl Estimator<LayoutOracle> {
    pub fn new() -> Self {
        Self::with_oracle(LayoutOracle)
    }
}

impl Default for Estimator<LayoutOracle> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: SizeOracle> Estimator<O> {
    pub fn with_oracle(oracle: O) -> Self {
        Self {
            table: EnumeratorTable::builtin(),
            oracle,
        }
    }

    pub fn register(mut self, kind: ShapeKind, enumerator: impl Enumerator + 'static) -> Self {
        self.table.register(kind, enumerator);
        self
    }

    pub fn table(&self) -> &EnumeratorTable {
        &self.table
    }

    pub fn estimate(&self, heap: &Heap, root: NodeId) -> Result<u128, EstimateError> {
        self.estimate_stats(heap, root).map(|stats| stats.bytes)
    }

    pub fn estimate_stats(&self, heap: &Heap, root: NodeId) -> Result<FootprintStats, EstimateError> {
        walk(heap, root, &self.table, &self.oracle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{EnumeratorError, OracleError};
    use crate::core::heap::{HeapBuilder, Node, Value};
    use crate::core::oracle::FixedOracle;
    use crate::core::shape::RecordFields;

    fn oracle() -> FixedOracle {
        FixedOracle::new()
            .cost("dict", 64)
            .cost("list", 56)
            .cost("set", 216)
            .cost("int", 28)
            .cost("str", 50)
            .cost("NoneType", 16)
            .cost("Process", 48)
            .cost("Sample", 40)
    }

    fn none() -> EnumeratorTable {
        EnumeratorTable::new()
    }

    fn records() -> EnumeratorTable {
        let mut table = EnumeratorTable::new();
        table
            .register(ShapeKind::structured("Process"), RecordFields)
            .register(ShapeKind::structured("Sample"), RecordFields);
        table
    }

    #[test]
    fn test_leaf_scalar() {
        let mut hb = HeapBuilder::new();
        let leaf = hb.alloc(Value::Int(42));
        let heap = hb.freeze();

        assert_eq!(Ok(28), estimate(&heap, leaf, &none(), &oracle()));
    }

    #[test]
    fn test_mapping_counts_keys_and_values() {
        // {"a": 1, "b": [2, 3]} with every scalar priced at 28
        let oracle = FixedOracle::new().cost("dict", 64).cost("list", 56).fallback(28);
        let mut hb = HeapBuilder::new();
        let a = hb.alloc_str("a");
        let one = hb.alloc(Value::Int(1));
        let b = hb.alloc_str("b");
        let two = hb.alloc(Value::Int(2));
        let three = hb.alloc(Value::Int(3));
        let list = hb.alloc(Value::Seq(vec![two, three]));
        let m = hb.alloc(Value::Map(vec![(a, one), (b, list)]));
        let heap = hb.freeze();

        assert_eq!(Ok(260), estimate(&heap, m, &none(), &oracle));
    }

    #[test]
    fn test_shared_child_counted_once() {
        let mut hb = HeapBuilder::new();
        let x = hb.alloc(Value::Int(1));
        let b = hb.alloc(Value::Seq(vec![x]));
        let a = hb.alloc(Value::Seq(vec![b, b]));
        let heap = hb.freeze();

        assert_eq!(Ok(56 + 56 + 28), estimate(&heap, a, &none(), &oracle()));
    }

    #[test]
    fn test_equal_values_in_distinct_slots_counted_twice() {
        let mut hb = HeapBuilder::new();
        let x = hb.alloc(Value::Int(1));
        let y = hb.alloc(Value::Int(1));
        let a = hb.alloc(Value::Seq(vec![x, y]));
        let heap = hb.freeze();

        assert_eq!(Ok(56 + 28 + 28), estimate(&heap, a, &none(), &oracle()));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut hb = HeapBuilder::new();
        let a = hb.reserve();
        let b = hb.alloc(Value::Seq(vec![a]));
        hb.fill(a, Node::new(Value::Seq(vec![b])));
        let heap = hb.freeze();

        assert_eq!(Ok(56 + 56), estimate(&heap, a, &none(), &oracle()));
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut hb = HeapBuilder::new();
        let a = hb.reserve();
        hb.fill(a, Node::new(Value::Map(vec![(a, a)])));
        let heap = hb.freeze();

        assert_eq!(Ok(64), estimate(&heap, a, &none(), &oracle()));
    }

    #[test]
    fn test_additive_over_disjoint_children() {
        let mut hb = HeapBuilder::new();
        let x = hb.alloc(Value::Int(1));
        let y = hb.alloc_str("y");
        let c1 = hb.alloc(Value::Seq(vec![x]));
        let c2 = hb.alloc(Value::Set(vec![y]));
        let root = hb.alloc(Value::Seq(vec![c1, c2]));
        let heap = hb.freeze();

        let o = oracle();
        let whole = estimate(&heap, root, &none(), &o).unwrap();
        let left = estimate(&heap, c1, &none(), &o).unwrap();
        let right = estimate(&heap, c2, &none(), &o).unwrap();
        assert_eq!(56 + left + right, whole);
    }

    #[test]
    fn test_unregistered_record_is_leaf() {
        let mut hb = HeapBuilder::new();
        let name = hb.alloc_str("sample-1");
        let sample = hb.alloc_typed("Sample", Value::Record(vec![("name".to_string(), name)]));
        let heap = hb.freeze();

        assert_eq!(Ok(40), estimate(&heap, sample, &none(), &oracle()));
        assert_eq!(Ok(40 + 50), estimate(&heap, sample, &records(), &oracle()));
    }

    #[test]
    fn test_extension_leaves_builtin_graphs_unchanged() {
        let mut hb = HeapBuilder::new();
        let x = hb.alloc(Value::Int(1));
        let s = hb.alloc_str("k");
        let inner = hb.alloc(Value::Set(vec![x]));
        let root = hb.alloc(Value::Map(vec![(s, inner)]));
        let heap = hb.freeze();

        let before = estimate(&heap, root, &none(), &oracle());
        let after = estimate(&heap, root, &records(), &oracle());
        assert_eq!(before, after);
        assert_eq!(Ok(64 + 50 + 216 + 28), after);
    }

    #[test]
    fn test_record_graph_with_back_references() {
        // process -> outputs -> sample -> derives_from -> process
        let mut hb = HeapBuilder::new();
        let process = hb.reserve();
        let sample = hb.alloc_typed(
            "Sample",
            Value::Record(vec![("derives_from".to_string(), process)]),
        );
        let outputs = hb.alloc(Value::Seq(vec![sample]));
        let nothing = hb.alloc(Value::None);
        hb.fill(
            process,
            Node::typed(
                "Process",
                Value::Record(vec![
                    ("outputs".to_string(), outputs),
                    ("prev_process".to_string(), nothing),
                    ("next_process".to_string(), nothing),
                ]),
            ),
        );
        let heap = hb.freeze();

        let stats = estimate_stats(&heap, process, &records(), &oracle()).unwrap();
        assert_eq!(4, stats.nodes);
        assert_eq!(48 + 56 + 40 + 16, stats.bytes);
    }

    #[test]
    fn test_override_builtin_last_registration_wins() {
        struct KeysOnly;
        impl Enumerator for KeysOnly {
            fn children<'a>(&self, node: &'a Node) -> Result<Children<'a>, EnumeratorError> {
                match node.value() {
                    Value::Map(entries) => Ok(Box::new(entries.iter().map(|(k, _)| Ok(*k)))),
                    _ => Err(EnumeratorError::Custom("not a map".to_string())),
                }
            }
        }

        let mut hb = HeapBuilder::new();
        let k = hb.alloc_str("k");
        let v = hb.alloc(Value::Int(1));
        let m = hb.alloc(Value::Map(vec![(k, v)]));
        let heap = hb.freeze();

        let mut extra = EnumeratorTable::new();
        extra.register(ShapeKind::Mapping, KeysOnly);
        assert_eq!(Ok(64 + 50), estimate(&heap, m, &extra, &oracle()));
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let mut hb = HeapBuilder::new();
        let f = hb.alloc(Value::Float(0.5));
        let root = hb.alloc(Value::Seq(vec![f]));
        let heap = hb.freeze();

        assert_eq!(
            Err(EstimateError::Oracle(OracleError::Unpriced {
                type_name: "float".to_string()
            })),
            estimate(&heap, root, &none(), &oracle())
        );
    }

    #[test]
    fn test_dangling_and_vacant_children_fail() {
        let mut hb = HeapBuilder::new();
        let vacant = hb.reserve();
        let root = hb.alloc(Value::Seq(vec![vacant]));
        let dangling = hb.alloc(Value::Seq(vec![99]));
        let heap = hb.freeze();

        assert_eq!(
            Err(EstimateError::Oracle(OracleError::Vacant(vacant))),
            estimate(&heap, root, &none(), &LayoutOracle)
        );
        assert_eq!(
            Err(EstimateError::Oracle(OracleError::Dangling(99))),
            estimate(&heap, dangling, &none(), &LayoutOracle)
        );
    }

    #[test]
    fn test_enumerator_failure_propagates() {
        let mut hb = HeapBuilder::new();
        let leaf = hb.alloc_typed("Process", Value::Int(1));
        let root = hb.alloc(Value::Seq(vec![leaf]));
        let heap = hb.freeze();

        assert_eq!(
            Err(EstimateError::Enumerator {
                node: leaf,
                source: EnumeratorError::ShapeMismatch {
                    expected: "record",
                    type_name: "Process".to_string()
                }
            }),
            estimate(&heap, root, &records(), &oracle())
        );
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let depth = 200_000;
        let mut hb = HeapBuilder::new();
        let mut tail = hb.alloc(Value::Int(0));
        for _ in 0..depth {
            tail = hb.alloc(Value::Seq(vec![tail]));
        }
        let heap = hb.freeze();

        let stats = estimate_stats(&heap, tail, &none(), &oracle()).unwrap();
        assert_eq!(depth + 1, stats.nodes);
        assert_eq!(depth, stats.max_depth);
        assert_eq!(56 * depth as u128 + 28, stats.bytes);
    }

    #[test]
    fn test_estimator_reuse() {
        let mut hb = HeapBuilder::new();
        let name = hb.alloc_str("p");
        let p = hb.alloc_typed("Process", Value::Record(vec![("name".to_string(), name)]));
        let heap = hb.freeze();

        let estimator = Estimator::with_oracle(oracle())
            .register(ShapeKind::structured("Process"), RecordFields);
        assert_eq!(Ok(48 + 50), estimator.estimate(&heap, p));
        assert_eq!(Ok(48 + 50), estimator.estimate(&heap, p));
        assert_eq!(4, estimator.table().len());
    }

    #[test]
    fn test_layout_estimate_counts_every_node() {
        let mut hb = HeapBuilder::new();
        let x = hb.alloc(Value::Int(1));
        let root = hb.alloc(Value::Seq(vec![x, x]));
        let heap = hb.freeze();

        let stats = Estimator::new().estimate_stats(&heap, root).unwrap();
        assert_eq!(2, stats.nodes);
        assert!(stats.bytes >= 2 * size_of::<Node>() as u128);
    }

    #[test]
    fn test_stats_keep_builtin_kinds_with_extra_only_table() {
        let mut hb = HeapBuilder::new();
        let x = hb.alloc(Value::Int(1));
        let root = hb.alloc(Value::Seq(vec![x]));
        let heap = hb.freeze();

        let mut extra = EnumeratorTable::new();
        extra.register(ShapeKind::structured("Process"), RecordFields);
        let stats = estimate_stats(&heap, root, &extra, &oracle()).unwrap();
        assert_eq!(estimate(&heap, root, &extra, &oracle()), Ok(stats.bytes));
        assert_eq!(56 + 28, stats.bytes);
        assert_eq!(2, stats.nodes);
    }

    #[test]
    fn test_enumerator_failure_mid_stream() {
        struct FailsAfterFirst;
        impl Enumerator for FailsAfterFirst {
            fn children<'a>(&self, node: &'a Node) -> Result<Children<'a>, EnumeratorError> {
                match node.value() {
                    Value::Seq(items) => Ok(Box::new(items.iter().enumerate().map(|(i, id)| {
                        if i == 0 {
                            Ok(*id)
                        } else {
                            Err(EnumeratorError::Custom(format!("item {i} unreadable")))
                        }
                    }))),
                    _ => Err(EnumeratorError::Custom("not a list".to_string())),
                }
            }
        }

        let mut hb = HeapBuilder::new();
        let x = hb.alloc(Value::Int(1));
        let y = hb.alloc(Value::Int(2));
        let inner = hb.alloc(Value::Seq(vec![x, y]));
        let root = hb.alloc(Value::Seq(vec![inner]));
        let heap = hb.freeze();

        let estimator = Estimator::with_oracle(oracle()).register(ShapeKind::Sequence, FailsAfterFirst);
        assert_eq!(
            Err(EstimateError::Enumerator {
                node: inner,
                source: EnumeratorError::Custom("item 1 unreadable".to_string())
            }),
            estimator.estimate(&heap, root)
        );
    }
}
