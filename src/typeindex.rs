// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reverse index from type identifiers to the addresses implementing them.
//!
//! Answers "which addresses implement type T" without scanning the
//! namespace tree, and the inverse "which types does address A carry".
//! The index is maintained from structure descriptions: registering an
//! address walks the structure's children and indexes each child under
//! its absolute address.
//!
//! Removal is hierarchical: removing `/a` also removes `/a/b` from
//! every type, while the sibling `/ab` is untouched (component-wise
//! containment, not string prefixing). Removal scans every type's
//! address set, so its cost grows with total index size - a deliberate
//! trade of asymptotics for simplicity; callers restructuring large
//! subtrees should expect that latency.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::Mutex;
use tracing::trace;

use crate::address;
use crate::metrics;

/// Structure description consumed when indexing a subtree. Implemented
/// by the namespace's node model; [`StructureNode`] is a ready-made
/// concrete form.
pub trait TypedNode {
    /// Type identifiers this node implements, in declaration order.
    fn node_types(&self) -> Vec<String>;

    /// Children as (relative key, child structure) pairs.
    fn children(&self) -> Vec<(String, &dyn TypedNode)>;
}

/// Self-contained structure description tree.
#[derive(Debug, Clone, Default)]
pub struct StructureNode {
    pub types: Vec<String>,
    pub children: BTreeMap<String, StructureNode>,
}

impl StructureNode {
    #[must_use]
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
            children: BTreeMap::new(),
        }
    }

    /// Builder-style child attachment.
    #[must_use]
    pub fn with_child(mut self, key: impl Into<String>, child: StructureNode) -> Self {
        self.children.insert(key.into(), child);
        self
    }
}

impl TypedNode for StructureNode {
    fn node_types(&self) -> Vec<String> {
        self.types.clone()
    }

    fn children(&self) -> Vec<(String, &dyn TypedNode)> {
        self.children
            .iter()
            .map(|(key, child)| (key.clone(), child as &dyn TypedNode))
            .collect()
    }
}

/// In-memory type -> address reverse index.
///
/// One lock guards all four operations; this is the most contended
/// structure during bulk namespace restructuring.
#[derive(Debug, Default)]
pub struct TypeIndex {
    by_type: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl TypeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `addr` under every type its structure lists, then
    /// recurse into the structure's children under their absolute
    /// addresses. Idempotent: the underlying association is a set.
    pub fn add_types(&self, addr: &str, structure: &dyn TypedNode) {
        let mut by_type = self.by_type.lock();
        Self::add_recursive(&mut by_type, addr, structure);
        metrics::set_type_index_types(by_type.len());
    }

    fn add_recursive(
        by_type: &mut HashMap<String, BTreeSet<String>>,
        addr: &str,
        structure: &dyn TypedNode,
    ) {
        for ty in structure.node_types() {
            by_type.entry(ty).or_default().insert(addr.to_string());
        }
        for (key, child) in structure.children() {
            let child_addr = address::child_address(addr, &key);
            Self::add_recursive(by_type, &child_addr, child);
        }
    }

    /// Remove `addr` and every component-wise descendant from all type
    /// associations. Types left without addresses are dropped entirely.
    /// Idempotent.
    pub fn remove_address(&self, addr: &str) {
        let mut by_type = self.by_type.lock();
        for addresses in by_type.values_mut() {
            addresses.retain(|candidate| !address::is_ancestor_or_self(addr, candidate));
        }
        by_type.retain(|_, addresses| !addresses.is_empty());
        metrics::set_type_index_types(by_type.len());
        trace!(address = %addr, "subtree removed from type index");
    }

    /// Sorted addresses registered under `ty`; empty for unknown types.
    #[must_use]
    pub fn addresses_of_type(&self, ty: &str) -> Vec<String> {
        self.by_type
            .lock()
            .get(ty)
            .map(|addresses| addresses.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted types associated with exactly `addr` (not its descendants).
    #[must_use]
    pub fn types_of_address(&self, addr: &str) -> Vec<String> {
        let by_type = self.by_type.lock();
        let mut types: Vec<String> = by_type
            .iter()
            .filter(|(_, addresses)| addresses.contains(addr))
            .map(|(ty, _)| ty.clone())
            .collect();
        types.sort();
        types
    }

    /// Number of types with at least one address.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.by_type.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.lock().is_empty()
    }
}
