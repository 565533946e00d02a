use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, trace, warn};

use crate::types::{TypeDefinition, TypeRef};

/// Reference graph between source-domain types, keyed by simple name.
///
/// An edge `A -> B` means a public member, the base type or an inherited
/// interface of `A` mentions `B` somewhere in its type tree.
#[derive(Debug, Default, Clone)]
pub struct ReferenceGraph {
    deps: BTreeMap<String, BTreeSet<String>>,
}

impl ReferenceGraph {
    /// Builds the graph over `definitions`; references to types outside the
    /// set are ignored.
    pub fn from_definitions<'a>(definitions: impl IntoIterator<Item = &'a TypeDefinition>) -> Self {
        let definitions: Vec<&TypeDefinition> = definitions.into_iter().collect();
        let known: BTreeSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();

        let mut deps = BTreeMap::new();
        for definition in &definitions {
            let entry: &mut BTreeSet<String> = deps.entry(definition.name.clone()).or_default();
            for type_ref in referenced_types(definition) {
                collect_refs(type_ref, &known, entry);
            }
        }
        Self { deps }
    }

    fn graph(&self) -> DiGraphMap<&str, ()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (from, tos) in &self.deps {
            graph.add_node(from.as_str());
            for to in tos {
                graph.add_edge(from.as_str(), to.as_str(), ());
            }
        }
        trace!(
            node_count = graph.node_count(),
            edge_count = graph.edge_count(),
            "Graph built"
        );
        graph
    }

    /// Groups of types that reference each other, directly or through a
    /// self-reference. Names are sorted inside each group and groups by their
    /// first name.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let graph = self.graph();
        let sccs = kosaraju_scc(&graph);
        debug!(scc_count = sccs.len(), "SCCs found");

        let mut cycles: Vec<Vec<String>> = sccs
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<String> = scc.iter().map(|s| (*s).to_string()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Every type in the graph, dependencies before dependents. Members of one
    /// cycle are emitted together in name order.
    pub fn synchronization_order(&self) -> Vec<String> {
        info!(type_count = self.deps.len(), "Ordering types by references");
        let graph = self.graph();
        let sccs = kosaraju_scc(&graph);

        let mut scc_of: HashMap<&str, usize> = HashMap::new();
        for (idx, scc) in sccs.iter().enumerate() {
            for node in scc {
                scc_of.insert(*node, idx);
            }
        }

        let mut condensation = DiGraphMap::<usize, ()>::new();
        for idx in 0..sccs.len() {
            condensation.add_node(idx);
        }
        for (from, tos) in &self.deps {
            let Some(&from_scc) = scc_of.get(from.as_str()) else {
                continue;
            };
            for to in tos {
                if let Some(&to_scc) = scc_of.get(to.as_str())
                    && from_scc != to_scc
                {
                    condensation.add_edge(from_scc, to_scc, ());
                }
            }
        }

        let sorted = match toposort(&condensation, None) {
            Ok(order) => order,
            Err(_) => {
                warn!("Cycle detected in SCC condensation graph, using arbitrary order");
                (0..sccs.len()).collect()
            }
        };

        let mut result = Vec::with_capacity(self.deps.len());
        for idx in sorted.into_iter().rev() {
            let mut members: Vec<String> = sccs[idx].iter().map(|s| (*s).to_string()).collect();
            members.sort();
            if members.len() > 1 {
                warn!(types = ?members, "Circular references among types");
            }
            result.extend(members);
        }
        debug!(order = ?result, "Synchronization order");
        result
    }
}

/// Types mentioned by the public surface of a definition.
pub fn referenced_types(definition: &TypeDefinition) -> Vec<&TypeRef> {
    let mut types: Vec<&TypeRef> = definition.base_type.iter().collect();
    types.extend(definition.inherited_interfaces.iter());
    for member in definition.public_members() {
        types.extend(member.signature_types());
    }
    types
}

/// Collects known type names anywhere in `type_ref`, generic arguments included.
pub fn collect_refs(type_ref: &TypeRef, known: &BTreeSet<&str>, acc: &mut BTreeSet<String>) {
    for node in type_ref.walk() {
        if known.contains(node.name.as_str()) {
            acc.insert(node.name.clone());
        }
    }
}
