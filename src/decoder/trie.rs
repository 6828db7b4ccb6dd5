//! Arena-backed prefix trie of collapsed CTC hypotheses.
//!
//! Every node is one collapsed output prefix. Raw paths that collapse to the
//! same prefix share a node, which is where their probability mass merges.
//! Nodes are addressed by [`NodeId`] handles into a slot arena; freed slots
//! go on a free list and are reused by later extensions.

use std::collections::BTreeMap;

use super::prune::{has_mass, log_sum_exp, NO_MASS};

/// Stable handle to a trie node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Log-probability mass for the previous and the current timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mass {
    pub prev: f32,
    pub cur: f32,
}

impl Mass {
    pub const EMPTY: Mass = Mass {
        prev: NO_MASS,
        cur: NO_MASS,
    };

    pub fn accumulate(&mut self, log_prob: f32) {
        self.cur = log_sum_exp(self.cur, log_prob);
    }

    /// Moves the current timestep's mass into `prev` and clears `cur`.
    pub fn roll(&mut self) {
        self.prev = self.cur;
        self.cur = NO_MASS;
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    /// `None` only for the root sentinel, which sorts before every symbol.
    pub last_symbol: Option<usize>,
    pub last_timestep: usize,
    pub blank: Mass,
    pub nonblank: Mass,
    pub score: f32,
    parent: Option<NodeId>,
    children: BTreeMap<usize, NodeId>,
    peak_log_prob: f32,
    live: bool,
}

impl Node {
    fn root() -> Self {
        Self {
            last_symbol: None,
            last_timestep: 0,
            blank: Mass {
                prev: 0.0,
                cur: NO_MASS,
            },
            nonblank: Mass::EMPTY,
            score: 0.0,
            parent: None,
            children: BTreeMap::new(),
            peak_log_prob: NO_MASS,
            live: true,
        }
    }

    fn child(parent: NodeId, symbol: usize, timestep: usize, log_prob: f32) -> Self {
        Self {
            last_symbol: Some(symbol),
            last_timestep: timestep,
            blank: Mass::EMPTY,
            nonblank: Mass::EMPTY,
            score: NO_MASS,
            parent: Some(parent),
            children: BTreeMap::new(),
            peak_log_prob: log_prob,
            live: true,
        }
    }

    fn vacant() -> Self {
        Self {
            last_symbol: None,
            last_timestep: 0,
            blank: Mass::EMPTY,
            nonblank: Mass::EMPTY,
            score: NO_MASS,
            parent: None,
            children: BTreeMap::new(),
            peak_log_prob: NO_MASS,
            live: false,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    fn roll(&mut self) {
        self.score = log_sum_exp(self.blank.cur, self.nonblank.cur);
        self.blank.roll();
        self.nonblank.roll();
    }
}

#[derive(Debug, Clone)]
pub struct PrefixTrie {
    nodes: Vec<Node>,
    free: Vec<usize>,
}

impl Default for PrefixTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixTrie {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new() -> Self {
        Self {
            nodes: vec![Node::root()],
            free: Vec::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Number of allocated (not freed) nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn child(&self, parent: NodeId, symbol: usize) -> Option<NodeId> {
        self.nodes[parent.0].children.get(&symbol).copied()
    }

    /// Returns the child of `parent` for `symbol`, creating it on first use.
    ///
    /// An existing child keeps the timestep of its most probable emission. A
    /// child that was dropped from the beam comes back with empty mass.
    pub fn extend_or_get(
        &mut self,
        parent: NodeId,
        symbol: usize,
        timestep: usize,
        log_prob: f32,
    ) -> NodeId {
        if let Some(id) = self.child(parent, symbol) {
            let node = &mut self.nodes[id.0];
            if log_prob > node.peak_log_prob {
                node.peak_log_prob = log_prob;
                node.last_timestep = timestep;
            }
            if !node.live {
                node.live = true;
                node.blank = Mass::EMPTY;
                node.nonblank = Mass::EMPTY;
                node.score = NO_MASS;
            }
            return id;
        }

        let node = Node::child(parent, symbol, timestep, log_prob);
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                NodeId(slot)
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        };
        self.nodes[parent.0].children.insert(symbol, id);
        id
    }

    /// Closes the current timestep on every live node.
    ///
    /// Returns the nodes that carry probability mass into the next timestep,
    /// in pre-order, and separately the live nodes that received none.
    pub fn flatten(&mut self) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut beam = Vec::new();
        let mut exhausted = Vec::new();
        let mut stack = vec![Self::ROOT];

        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id.0];
            if node.live {
                node.roll();
                if has_mass(node.score) {
                    beam.push(id);
                } else {
                    exhausted.push(id);
                }
            }
            stack.extend(node.children.values().rev().copied());
        }

        (beam, exhausted)
    }

    /// Drops `id` from the beam and frees every node left without a live
    /// descendant. The root is never freed.
    pub fn remove(&mut self, id: NodeId) {
        self.nodes[id.0].live = false;

        let mut current = id;
        while current != Self::ROOT {
            let node = &self.nodes[current.0];
            if node.live || !node.children.is_empty() {
                break;
            }
            let (Some(parent), Some(symbol)) = (node.parent, node.last_symbol) else {
                break;
            };
            self.nodes[parent.0].children.remove(&symbol);
            self.nodes[current.0] = Node::vacant();
            self.free.push(current.0);
            current = parent;
        }
    }

    /// Emitted symbols and their timesteps from the root down to `id`.
    pub fn reconstruct(&self, id: NodeId) -> (Vec<usize>, Vec<usize>) {
        let mut tokens = Vec::new();
        let mut timesteps = Vec::new();
        let mut current = Some(id);

        while let Some(node) = current.map(|id| &self.nodes[id.0]) {
            let Some(symbol) = node.last_symbol else {
                break;
            };
            tokens.push(symbol);
            timesteps.push(node.last_timestep);
            current = node.parent;
        }

        tokens.reverse();
        timesteps.reverse();
        (tokens, timesteps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_merged_per_symbol() {
        let mut trie = PrefixTrie::new();
        let a = trie.extend_or_get(PrefixTrie::ROOT, 3, 0, -0.5);
        let again = trie.extend_or_get(PrefixTrie::ROOT, 3, 1, -1.0);
        let b = trie.extend_or_get(PrefixTrie::ROOT, 4, 1, -1.0);

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(trie.len(), 3);
        assert_eq!(trie.node(PrefixTrie::ROOT).child_count(), 2);
    }

    #[test]
    fn timestep_follows_peak_emission() {
        let mut trie = PrefixTrie::new();
        let a = trie.extend_or_get(PrefixTrie::ROOT, 1, 0, -2.0);
        trie.extend_or_get(PrefixTrie::ROOT, 1, 1, -3.0);
        assert_eq!(trie.node(a).last_timestep, 0);
        trie.extend_or_get(PrefixTrie::ROOT, 1, 2, -0.1);
        assert_eq!(trie.node(a).last_timestep, 2);
    }

    #[test]
    fn flatten_rolls_buffers_and_splits_exhausted() {
        let mut trie = PrefixTrie::new();
        let a = trie.extend_or_get(PrefixTrie::ROOT, 1, 0, 0.0);
        let b = trie.extend_or_get(PrefixTrie::ROOT, 2, 0, 0.0);
        trie.node_mut(a).nonblank.accumulate(-0.25);
        trie.node_mut(b).blank.accumulate(-1.0);

        let (beam, exhausted) = trie.flatten();

        assert_eq!(beam, vec![a, b]);
        assert_eq!(exhausted, vec![PrefixTrie::ROOT]);
        let node = trie.node(a);
        assert!((node.score + 0.25).abs() < 1e-6);
        assert!((node.nonblank.prev + 0.25).abs() < 1e-6);
        assert_eq!(node.nonblank.cur, NO_MASS);
    }

    #[test]
    fn remove_frees_dead_ancestors() {
        let mut trie = PrefixTrie::new();
        let a = trie.extend_or_get(PrefixTrie::ROOT, 1, 0, 0.0);
        let ab = trie.extend_or_get(a, 2, 1, 0.0);

        trie.remove(a);
        assert_eq!(trie.len(), 3, "a still has a live child");

        trie.remove(ab);
        assert_eq!(trie.len(), 1);
        assert_eq!(trie.node(PrefixTrie::ROOT).child_count(), 0);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut trie = PrefixTrie::new();
        let a = trie.extend_or_get(PrefixTrie::ROOT, 1, 0, 0.0);
        trie.remove(a);
        let b = trie.extend_or_get(PrefixTrie::ROOT, 5, 1, 0.0);
        assert_eq!(a.index(), b.index());
        assert_eq!(trie.node(b).last_symbol, Some(5));
        assert_eq!(trie.child(PrefixTrie::ROOT, 1), None);
    }

    #[test]
    fn dropped_node_with_children_is_revived_empty() {
        let mut trie = PrefixTrie::new();
        let a = trie.extend_or_get(PrefixTrie::ROOT, 1, 0, 0.0);
        let _ab = trie.extend_or_get(a, 2, 1, 0.0);
        trie.node_mut(a).blank.accumulate(-1.0);
        trie.remove(a);
        assert!(!trie.node(a).is_live());

        let revived = trie.extend_or_get(PrefixTrie::ROOT, 1, 2, -5.0);
        assert_eq!(revived, a);
        assert!(trie.node(a).is_live());
        assert_eq!(trie.node(a).blank, Mass::EMPTY);
    }

    #[test]
    fn reconstruct_walks_to_root() {
        let mut trie = PrefixTrie::new();
        let a = trie.extend_or_get(PrefixTrie::ROOT, 4, 0, 0.0);
        let ab = trie.extend_or_get(a, 2, 3, 0.0);
        let aba = trie.extend_or_get(ab, 4, 7, 0.0);

        assert_eq!(trie.reconstruct(aba), (vec![4, 2, 4], vec![0, 3, 7]));
        assert_eq!(trie.reconstruct(PrefixTrie::ROOT), (vec![], vec![]));
    }
}
