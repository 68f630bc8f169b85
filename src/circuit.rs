//! Compiled circuits.
//!
//! Knowledge compilation itself happens elsewhere. This module fixes the shape a
//! compiled circuit must expose to be evaluated ([`Circuit`]) and provides an
//! in-memory d-DNNF, [`NnfCircuit`], built with [`NnfBuilder`] or read from the
//! `.nnf` text format (see [`crate::nnf`]).
//!
//! A circuit is one smooth, deterministic, decomposable DAG over all labelled
//! variables of a ground program: probabilistic facts, decisions and named derived
//! atoms. Nodes are stored bottom-up, so children always precede their parents and
//! a single forward pass evaluates the whole DAG.
//!
//! ```
//! use meu_rs::circuit::{Circuit, NnfBuilder};
//! use meu_rs::weight::RawWeight;
//!
//! let mut b = NnfBuilder::new();
//! let rain = b.atom("rain", 1, RawWeight::Prob(0.3));
//! let x = b.literal(rain);
//! let nx = b.literal(-rain);
//! let root = b.or([x, nx]);
//! let circuit = b.finish(root);
//!
//! assert_eq!(circuit.get_node_by_name("rain"), Some(rain));
//! assert_eq!(circuit.size(), 3);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;

use crate::error::{Error, Result};
use crate::key::Key;
use crate::weight::RawWeight;

/// Index of a node inside a circuit.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    True,
    False,
    Literal(Key),
    And(Vec<NodeId>),
    Or(Vec<NodeId>),
}

impl NodeKind {
    pub fn children(&self) -> &[NodeId] {
        match self {
            NodeKind::And(cs) | NodeKind::Or(cs) => cs,
            _ => &[],
        }
    }
}

/// What an evaluator needs from a compiled circuit.
pub trait Circuit {
    /// The node representing the whole theory.
    fn root(&self) -> NodeId;

    /// Node `id`. Children of a node have smaller ids than the node itself.
    fn node(&self, id: NodeId) -> &NodeKind;

    /// Number of nodes.
    fn size(&self) -> usize;

    /// Variables mentioned below the root.
    fn variables(&self) -> &BTreeSet<u32>;

    /// Key of a named atom. The name `"true"` always maps to [`Key::TRUE`].
    fn get_node_by_name(&self, name: &str) -> Option<Key>;

    /// Raw weight of every weighted variable.
    fn get_weights(&self) -> &BTreeMap<u32, RawWeight>;

    /// All named atoms with their keys.
    fn names(&self) -> Vec<(&str, Key)>;

    fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    /// Named positive atoms whose raw weight is the decision indicator.
    fn decisions(&self) -> Vec<(String, Key)> {
        let weights = self.get_weights();
        self.names()
            .into_iter()
            .filter(|(_, key)| !key.is_negated() && !key.is_true())
            .filter(|(_, key)| matches!(weights.get(&key.var()), Some(RawWeight::Decision)))
            .map(|(name, key)| (name.to_string(), key))
            .collect()
    }
}

/// In-memory d-DNNF circuit.
#[derive(Debug, Clone)]
pub struct NnfCircuit {
    nodes: Vec<NodeKind>,
    root: NodeId,
    variables: BTreeSet<u32>,
    names: BTreeMap<String, Key>,
    weights: BTreeMap<u32, RawWeight>,
}

impl NnfCircuit {
    /// Creates a circuit from bottom-up ordered nodes.
    pub fn from_nodes(nodes: Vec<NodeKind>, root: NodeId) -> Result<Self> {
        if root >= nodes.len() {
            return Err(Error::Schema(format!(
                "root {} is out of range for {} nodes",
                root,
                nodes.len()
            )));
        }
        for (id, node) in nodes.iter().enumerate() {
            if let Some(&c) = node.children().iter().find(|&&c| c >= id) {
                return Err(Error::Schema(format!(
                    "node {} refers to child {} which does not precede it",
                    id, c
                )));
            }
            if let NodeKind::Literal(k) = node {
                if k.is_true() {
                    return Err(Error::Schema(format!("node {} is a literal of variable 0", id)));
                }
            }
        }
        let variables = collect_variables(&nodes, root);
        Ok(Self {
            nodes,
            root,
            variables,
            names: BTreeMap::new(),
            weights: BTreeMap::new(),
        })
    }

    pub fn nodes(&self) -> &[NodeKind] {
        &self.nodes
    }

    /// Largest variable index mentioned by any node or weight.
    pub fn num_vars(&self) -> u32 {
        let in_nodes = self.nodes.iter().filter_map(|n| match n {
            NodeKind::Literal(k) => Some(k.var()),
            _ => None,
        });
        in_nodes.chain(self.weights.keys().copied()).max().unwrap_or(0)
    }

    pub fn set_name(&mut self, name: impl Into<String>, key: Key) {
        self.names.insert(name.into(), key);
    }

    /// Attaches a raw weight to variable `var`.
    pub fn set_weight(&mut self, var: u32, weight: RawWeight) -> Result<()> {
        if var == 0 {
            return Err(Error::Schema("variable 0 cannot carry a weight".into()));
        }
        Key::try_from(var)?;
        self.weights.insert(var, weight);
        Ok(())
    }

    /// Returns an equivalent circuit in which every OR node is smooth: all children
    /// of an OR node mention the same variables.
    ///
    /// A child missing variable `v` is conjoined with the gadget `(v ∨ ¬v)`.
    pub fn smooth(&self) -> NnfCircuit {
        let vars = variables_per_node(&self.nodes);
        let mut b = NnfBuilder::new();
        let mut map: Vec<NodeId> = Vec::with_capacity(self.nodes.len());
        let mut gadgets: HashMap<u32, NodeId> = HashMap::new();

        for (id, node) in self.nodes.iter().enumerate() {
            let new_id = match node {
                NodeKind::True => b.constant(true),
                NodeKind::False => b.constant(false),
                NodeKind::Literal(k) => b.literal(*k),
                NodeKind::And(cs) => b.and(cs.iter().map(|&c| map[c])),
                NodeKind::Or(cs) => {
                    let mut children = Vec::with_capacity(cs.len());
                    for &c in cs {
                        let missing: Vec<u32> = vars[id].difference(&vars[c]).copied().collect();
                        if missing.is_empty() {
                            children.push(map[c]);
                        } else {
                            debug!("smooth: node {} child {} misses {:?}", id, c, missing);
                            let mut conj = vec![map[c]];
                            for v in missing {
                                let g = *gadgets.entry(v).or_insert_with(|| {
                                    let pos = b.literal(Key::literal(v, true));
                                    let neg = b.literal(Key::literal(v, false));
                                    b.or([pos, neg])
                                });
                                conj.push(g);
                            }
                            children.push(b.and(conj));
                        }
                    }
                    b.or(children)
                }
            };
            map.push(new_id);
        }

        let mut result = b.finish(map[self.root]);
        result.names = self.names.clone();
        result.weights = self.weights.clone();
        result
    }

    /// Whether every OR node reachable from the root is smooth.
    pub fn is_smooth(&self) -> bool {
        let vars = variables_per_node(&self.nodes);
        reachable(&self.nodes, self.root).into_iter().all(|id| match &self.nodes[id] {
            NodeKind::Or(cs) => cs.iter().all(|&c| vars[c] == vars[id]),
            _ => true,
        })
    }
}

impl Circuit for NnfCircuit {
    fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id]
    }

    fn size(&self) -> usize {
        self.nodes.len()
    }

    fn variables(&self) -> &BTreeSet<u32> {
        &self.variables
    }

    fn get_node_by_name(&self, name: &str) -> Option<Key> {
        if name == "true" {
            return Some(Key::TRUE);
        }
        self.names.get(name).copied()
    }

    fn get_weights(&self) -> &BTreeMap<u32, RawWeight> {
        &self.weights
    }

    fn names(&self) -> Vec<(&str, Key)> {
        self.names.iter().map(|(n, &k)| (n.as_str(), k)).collect()
    }
}

/// Incremental constructor of [`NnfCircuit`]s.
///
/// Every constructor returns the id of the new node, so nodes are always created
/// bottom-up. Literal and constant nodes are shared.
#[derive(Debug, Default)]
pub struct NnfBuilder {
    nodes: Vec<NodeKind>,
    literals: HashMap<Key, NodeId>,
    constants: [Option<NodeId>; 2],
    names: BTreeMap<String, Key>,
    weights: BTreeMap<u32, RawWeight>,
}

impl NnfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: NodeKind) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn constant(&mut self, value: bool) -> NodeId {
        if let Some(id) = self.constants[value as usize] {
            return id;
        }
        let id = self.push(if value { NodeKind::True } else { NodeKind::False });
        self.constants[value as usize] = Some(id);
        id
    }

    /// Panics on key 0, which is not a literal.
    pub fn literal(&mut self, key: Key) -> NodeId {
        assert!(!key.is_true(), "Literal of variable 0");
        if let Some(&id) = self.literals.get(&key) {
            return id;
        }
        let id = self.push(NodeKind::Literal(key));
        self.literals.insert(key, id);
        id
    }

    /// Conjunction of earlier nodes of this builder.
    ///
    /// # Panics
    ///
    /// Panics if a child id was not returned by this builder.
    pub fn and(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        let children: Vec<NodeId> = children.into_iter().collect();
        assert!(children.iter().all(|&c| c < self.nodes.len()), "Unknown child node");
        self.push(NodeKind::And(children))
    }

    pub fn or(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        let children: Vec<NodeId> = children.into_iter().collect();
        assert!(children.iter().all(|&c| c < self.nodes.len()), "Unknown child node");
        self.push(NodeKind::Or(children))
    }

    /// Names variable `var` and gives it a raw weight. Returns its positive key.
    pub fn atom(&mut self, name: impl Into<String>, var: u32, weight: RawWeight) -> Key {
        let key = Key::positive(var);
        self.name(name, key);
        self.weight(var, weight);
        key
    }

    pub fn name(&mut self, name: impl Into<String>, key: Key) {
        self.names.insert(name.into(), key);
    }

    /// Panics on variable 0.
    pub fn weight(&mut self, var: u32, weight: RawWeight) {
        assert_ne!(var, 0, "Variable 0 cannot carry a weight");
        self.weights.insert(var, weight);
    }

    pub fn finish(self, root: NodeId) -> NnfCircuit {
        assert!(root < self.nodes.len(), "Unknown root node");
        let variables = collect_variables(&self.nodes, root);
        NnfCircuit {
            nodes: self.nodes,
            root,
            variables,
            names: self.names,
            weights: self.weights,
        }
    }
}

fn variables_per_node(nodes: &[NodeKind]) -> Vec<BTreeSet<u32>> {
    let mut vars: Vec<BTreeSet<u32>> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let set = match node {
            NodeKind::True | NodeKind::False => BTreeSet::new(),
            NodeKind::Literal(k) => BTreeSet::from([k.var()]),
            NodeKind::And(cs) | NodeKind::Or(cs) => {
                cs.iter().flat_map(|&c| vars[c].iter().copied()).collect()
            }
        };
        vars.push(set);
    }
    vars
}

fn reachable(nodes: &[NodeKind], root: NodeId) -> Vec<NodeId> {
    let mut seen = vec![false; nodes.len()];
    let mut stack = vec![root];
    let mut result = Vec::new();
    while let Some(id) = stack.pop() {
        if seen[id] {
            continue;
        }
        seen[id] = true;
        result.push(id);
        stack.extend(nodes[id].children());
    }
    result
}

fn collect_variables(nodes: &[NodeKind], root: NodeId) -> BTreeSet<u32> {
    reachable(nodes, root)
        .into_iter()
        .filter_map(|id| match nodes[id] {
            NodeKind::Literal(k) => Some(k.var()),
            _ => None,
        })
        .collect()
}
