//! Node pool and open list for the corridor search
//!
//! The pool is the bounded working memory of a query: it never grows past
//! the node budget given at construction.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{PolyRef, Result, Status};

/// Node index type
pub type NodeIndex = u16;

/// Null node index
pub const NULL_IDX: NodeIndex = NodeIndex::MAX;

/// Largest node budget a pool accepts
pub const MAX_POOL_NODES: usize = NULL_IDX as usize;

bitflags::bitflags! {
    /// Search state of a node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        const OPEN = 0x01;
        const CLOSED = 0x02;
    }
}

/// Search node attached to one polygon
#[derive(Debug, Clone)]
pub struct Node {
    /// Position the polygon was entered at
    pub pos: [f32; 3],
    /// Cost from the start node
    pub cost: f32,
    /// Cost plus heuristic
    pub total: f32,
    /// Parent node, [`NULL_IDX`] for the start node
    pub parent: NodeIndex,
    pub flags: NodeFlags,
    /// Polygon the node corresponds to
    pub id: PolyRef,
}

impl Node {
    fn new(id: PolyRef) -> Self {
        Self {
            pos: [0.0; 3],
            cost: 0.0,
            total: 0.0,
            parent: NULL_IDX,
            flags: NodeFlags::empty(),
            id,
        }
    }
}

/// Hashed, fixed-budget node storage
#[derive(Debug)]
pub struct NodePool {
    nodes: Vec<Node>,
    first: Vec<NodeIndex>,
    next: Vec<NodeIndex>,
    max_nodes: usize,
}

impl NodePool {
    /// Creates a pool holding at most `max_nodes` nodes
    pub fn new(max_nodes: usize) -> Result<Self> {
        if max_nodes == 0 || max_nodes > MAX_POOL_NODES {
            return Err(Status::InvalidParam);
        }
        let hash_size = (max_nodes / 4).max(1).next_power_of_two();

        let mut nodes = Vec::new();
        let mut first = Vec::new();
        let mut next = Vec::new();
        nodes
            .try_reserve_exact(max_nodes)
            .map_err(|_| Status::OutOfMemory)?;
        first
            .try_reserve_exact(hash_size)
            .map_err(|_| Status::OutOfMemory)?;
        next.try_reserve_exact(max_nodes)
            .map_err(|_| Status::OutOfMemory)?;
        first.resize(hash_size, NULL_IDX);

        Ok(Self {
            nodes,
            first,
            next,
            max_nodes,
        })
    }

    /// Forgets every node, keeping the allocation
    pub fn clear(&mut self) {
        self.first.fill(NULL_IDX);
        self.next.clear();
        self.nodes.clear();
    }

    /// Node budget
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Number of nodes in use
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Finds the node of a polygon
    pub fn find_node(&self, id: PolyRef) -> Option<NodeIndex> {
        let mut idx = self.first[self.bucket(id)];
        while idx != NULL_IDX {
            if self.nodes[idx as usize].id == id {
                return Some(idx);
            }
            idx = self.next[idx as usize];
        }
        None
    }

    /// Finds the node of a polygon, allocating it if needed
    ///
    /// Returns `None` once the budget is exhausted.
    pub fn get_node(&mut self, id: PolyRef) -> Option<NodeIndex> {
        if let Some(idx) = self.find_node(id) {
            return Some(idx);
        }
        if self.nodes.len() >= self.max_nodes {
            return None;
        }

        let idx = self.nodes.len() as NodeIndex;
        let bucket = self.bucket(id);
        self.nodes.push(Node::new(id));
        self.next.push(self.first[bucket]);
        self.first[bucket] = idx;
        Some(idx)
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx as usize]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut Node {
        &mut self.nodes[idx as usize]
    }

    fn bucket(&self, id: PolyRef) -> usize {
        hash_ref(id) as usize & (self.first.len() - 1)
    }
}

fn hash_ref(id: PolyRef) -> u32 {
    let mut a = id.id();
    a = a.wrapping_add(!(a << 15));
    a ^= a >> 10;
    a = a.wrapping_add(a << 3);
    a ^= a >> 6;
    a = a.wrapping_add(!(a << 11));
    a ^= a >> 16;
    a
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    total: f32,
    node: NodeIndex,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Reversed so the heap pops the cheapest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .total
            .total_cmp(&self.total)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Open list ordered by node total cost
///
/// Re-pushing a node with a lower total leaves the old entry behind; the
/// search skips entries whose total no longer matches the node.
#[derive(Debug, Default)]
pub struct NodeQueue {
    heap: BinaryHeap<QueueEntry>,
}

impl NodeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn push(&mut self, node: NodeIndex, total: f32) {
        self.heap.push(QueueEntry { total, node });
    }

    /// Pops the cheapest entry as `(node, total at push time)`
    pub fn pop(&mut self) -> Option<(NodeIndex, f32)> {
        self.heap.pop().map(|entry| (entry.node, entry.total))
    }
}
