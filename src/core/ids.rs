use std::collections::HashMap;

pub type NodeId = u32;

pub struct NodeRegistry {
    map: HashMap<String, NodeId>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn get_or_insert_with(
        &mut self,
        key: &str,
        alloc: impl FnOnce() -> NodeId,
    ) -> (NodeId, bool) {
        if let Some(id) = self.map.get(key) {
            return (*id, false);
        }
        let id = alloc();
        self.map.insert(key.to_string(), id);
        (id, true)
    }

    pub fn get(&self, key: &str) -> Option<NodeId> {
        self.map.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct VisitedSet {
    bits: Vec<u64>,
    len: usize,
}

impl VisitedSet {
    pub fn with_capacity(node_count: usize) -> Self {
        Self {
            bits: vec![0; node_count.div_ceil(64)],
            len: 0,
        }
    }

    /// Marks `id` as visited. Returns `false` if it already was.
    pub fn insert(&mut self, id: NodeId) -> bool {
        let (word, mask) = Self::slot(id);
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        if self.bits[word] & mask != 0 {
            return false;
        }
        self.bits[word] |= mask;
        self.len += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot(id: NodeId) -> (usize, u64) {
        (id as usize / 64, 1 << (id % 64))
    }
}
