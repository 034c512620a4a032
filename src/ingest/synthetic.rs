use crate::core::heap::{Heap, HeapBuilder, Node, Value};
use crate::core::ids::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct SyntheticConfig {
    pub node_count: u32,
    pub fanout: u32,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            node_count: 100_000,
            fanout: 8,
            seed: 42,
        }
    }
}

pub fn generate(cfg: &SyntheticConfig) -> (Heap, NodeId) {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut hb = HeapBuilder::new();
    let node_count = cfg.node_count.max(1);
    let ids: Vec<NodeId> = (0..node_count).map(|_| hb.reserve()).collect();

    let refs = |rng: &mut StdRng| -> Vec<NodeId> {
        let n = rng.random_range(0..=cfg.fanout);
        (0..n).map(|_| rng.random_range(0..node_count)).collect()
    };

    for &id in &ids {
        // keep the root a container so the walk reaches the rest of the graph
        let kind = if id == 0 { 5 } else { rng.random_range(0..8) };
        let value = match kind {
            0 => Value::None,
            1 => Value::Int(rng.random_range(-1_000_000..1_000_000)),
            2 => Value::Float(rng.random_range(0.0..1.0)),
            3 => Value::Str("x".repeat(rng.random_range(0..64))),
            4 => Value::Set(refs(&mut rng)),
            5 => Value::Seq(refs(&mut rng)),
            6 => {
                let keys = refs(&mut rng);
                let values = refs(&mut rng);
                Value::Map(keys.into_iter().zip(values).collect())
            }
            _ => Value::Record(
                refs(&mut rng)
                    .into_iter()
                    .enumerate()
                    .map(|(i, r)| (format!("field{i}"), r))
                    .collect(),
            ),
        };
        let node = match value {
            Value::Record(_) => Node::typed("Synthetic", value),
            _ => Node::new(value),
        };
        hb.fill(id, node);
    }

    (hb.freeze(), 0)
}
