//! Set algebra over MFDD handles.
//!
//! The recursions mirror the SFDD algebra; the shared-key case
//! additionally merges the two take maps entry-wise. Union combines
//! branches of a shared value and keeps distinct values from both sides;
//! intersection keeps shared values only; symmetric difference applies
//! itself on shared values and keeps one-sided entries as-is; subtraction
//! subtracts on shared values and preserves left entries whose value the
//! right side does not bind. Entries whose branch becomes `zero` drop out
//! in the canonicalizing constructor, collapsing the node when none
//! remain.

use std::cmp::Ordering;
use std::hash::Hash;

use ahash::AHashMap;

use crate::arena::NodeId;
use crate::morphism::Family;

use super::{Mfdd, MfddFactory};

/// Per-operation memoization tables.
pub(crate) struct OpCaches {
    union: AHashMap<(NodeId, NodeId), NodeId>,
    intersection: AHashMap<(NodeId, NodeId), NodeId>,
    symmetric_difference: AHashMap<(NodeId, NodeId), NodeId>,
    subtraction: AHashMap<(NodeId, NodeId), NodeId>,
}

impl OpCaches {
    pub(crate) fn new() -> Self {
        Self {
            union: AHashMap::new(),
            intersection: AHashMap::new(),
            symmetric_difference: AHashMap::new(),
            subtraction: AHashMap::new(),
        }
    }
}

/// Cache key for a commutative operation: the handle-sorted pair.
fn commuted(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Branch bound to `value`, if the take map has one.
fn lookup<V: Eq>(entries: &[(V, NodeId)], value: &V) -> Option<NodeId> {
    entries
        .iter()
        .find(|(v, _)| v == value)
        .map(|(_, child)| *child)
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> MfddFactory<K, V> {
    pub(crate) fn union_ids(&self, a: NodeId, b: NodeId) -> NodeId {
        if a == NodeId::ZERO {
            return b;
        }
        if b == NodeId::ZERO || a == b {
            return a;
        }
        let key = commuted(a, b);
        if let Some(&found) = self.store().caches.borrow().union.get(&key) {
            return found;
        }

        let result = if a == NodeId::ONE || b == NodeId::ONE {
            let internal = if a == NodeId::ONE { b } else { a };
            let (k, entries, skip) = self.parts(internal);
            let skip = self.union_ids(NodeId::ONE, skip);
            self.node_id(k, entries, skip)
        } else {
            let (ka, ea, sa) = self.parts(a);
            let (kb, eb, sb) = self.parts(b);
            match ka.cmp(&kb) {
                Ordering::Less => {
                    let skip = self.union_ids(sa, b);
                    self.node_id(ka, ea, skip)
                }
                Ordering::Equal => {
                    let mut merged = Vec::with_capacity(ea.len() + eb.len());
                    for (value, left) in &ea {
                        let child = match lookup(&eb, value) {
                            Some(right) => self.union_ids(*left, right),
                            None => *left,
                        };
                        merged.push((value.clone(), child));
                    }
                    for (value, right) in &eb {
                        if lookup(&ea, value).is_none() {
                            merged.push((value.clone(), *right));
                        }
                    }
                    let skip = self.union_ids(sa, sb);
                    self.node_id(ka, merged, skip)
                }
                Ordering::Greater => {
                    let skip = self.union_ids(sb, a);
                    self.node_id(kb, eb, skip)
                }
            }
        };

        self.store().caches.borrow_mut().union.insert(key, result);
        result
    }

    pub(crate) fn intersection_ids(&self, a: NodeId, b: NodeId) -> NodeId {
        if a == NodeId::ZERO || b == NodeId::ZERO {
            return NodeId::ZERO;
        }
        if a == b {
            return a;
        }
        if a == NodeId::ONE {
            return self.empty_member_terminal(b);
        }
        if b == NodeId::ONE {
            return self.empty_member_terminal(a);
        }
        let key = commuted(a, b);
        if let Some(&found) = self.store().caches.borrow().intersection.get(&key) {
            return found;
        }

        let (ka, ea, sa) = self.parts(a);
        let (kb, eb, sb) = self.parts(b);
        let result = match ka.cmp(&kb) {
            Ordering::Less => self.intersection_ids(sa, b),
            Ordering::Equal => {
                let mut merged = Vec::new();
                for (value, left) in &ea {
                    if let Some(right) = lookup(&eb, value) {
                        merged.push((value.clone(), self.intersection_ids(*left, right)));
                    }
                }
                let skip = self.intersection_ids(sa, sb);
                self.node_id(ka, merged, skip)
            }
            Ordering::Greater => self.intersection_ids(a, sb),
        };

        self.store()
            .caches
            .borrow_mut()
            .intersection
            .insert(key, result);
        result
    }

    pub(crate) fn symmetric_difference_ids(&self, a: NodeId, b: NodeId) -> NodeId {
        if a == NodeId::ZERO {
            return b;
        }
        if b == NodeId::ZERO {
            return a;
        }
        if a == b {
            return NodeId::ZERO;
        }
        let key = commuted(a, b);
        if let Some(&found) = self.store().caches.borrow().symmetric_difference.get(&key) {
            return found;
        }

        let result = if a == NodeId::ONE || b == NodeId::ONE {
            let internal = if a == NodeId::ONE { b } else { a };
            let (k, entries, skip) = self.parts(internal);
            let skip = self.symmetric_difference_ids(NodeId::ONE, skip);
            self.node_id(k, entries, skip)
        } else {
            let (ka, ea, sa) = self.parts(a);
            let (kb, eb, sb) = self.parts(b);
            match ka.cmp(&kb) {
                Ordering::Less => {
                    let skip = self.symmetric_difference_ids(sa, b);
                    self.node_id(ka, ea, skip)
                }
                Ordering::Equal => {
                    let mut merged = Vec::with_capacity(ea.len() + eb.len());
                    for (value, left) in &ea {
                        let child = match lookup(&eb, value) {
                            Some(right) => self.symmetric_difference_ids(*left, right),
                            None => *left,
                        };
                        merged.push((value.clone(), child));
                    }
                    for (value, right) in &eb {
                        if lookup(&ea, value).is_none() {
                            merged.push((value.clone(), *right));
                        }
                    }
                    let skip = self.symmetric_difference_ids(sa, sb);
                    self.node_id(ka, merged, skip)
                }
                Ordering::Greater => {
                    let skip = self.symmetric_difference_ids(sb, a);
                    self.node_id(kb, eb, skip)
                }
            }
        };

        self.store()
            .caches
            .borrow_mut()
            .symmetric_difference
            .insert(key, result);
        result
    }

    pub(crate) fn subtraction_ids(&self, a: NodeId, b: NodeId) -> NodeId {
        if a == NodeId::ZERO || a == b {
            return NodeId::ZERO;
        }
        if b == NodeId::ZERO {
            return a;
        }
        if a == NodeId::ONE {
            // The empty map survives unless it is also on the right.
            return if self.empty_member_terminal(b) == NodeId::ONE {
                NodeId::ZERO
            } else {
                NodeId::ONE
            };
        }
        let key = (a, b);
        if let Some(&found) = self.store().caches.borrow().subtraction.get(&key) {
            return found;
        }

        let result = if b == NodeId::ONE {
            let (k, entries, skip) = self.parts(a);
            let skip = self.subtraction_ids(skip, NodeId::ONE);
            self.node_id(k, entries, skip)
        } else {
            let (ka, ea, sa) = self.parts(a);
            let (kb, eb, sb) = self.parts(b);
            match ka.cmp(&kb) {
                Ordering::Less => {
                    let skip = self.subtraction_ids(sa, b);
                    self.node_id(ka, ea, skip)
                }
                Ordering::Equal => {
                    let mut merged = Vec::with_capacity(ea.len());
                    for (value, left) in &ea {
                        let child = match lookup(&eb, value) {
                            Some(right) => self.subtraction_ids(*left, right),
                            // Value unbound on the right: preserved as-is.
                            None => *left,
                        };
                        merged.push((value.clone(), child));
                    }
                    let skip = self.subtraction_ids(sa, sb);
                    self.node_id(ka, merged, skip)
                }
                Ordering::Greater => self.subtraction_ids(a, sb),
            }
        };

        self.store()
            .caches
            .borrow_mut()
            .subtraction
            .insert(key, result);
        result
    }

    /// Terminal reached by following the skip chain from `id`.
    pub(crate) fn empty_member_terminal(&self, mut id: NodeId) -> NodeId {
        while !id.is_terminal() {
            let arena = self.store().arena.borrow();
            id = arena.get(id).skip;
        }
        id
    }
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Mfdd<K, V> {
    fn binary(
        &self,
        other: &Self,
        op: impl FnOnce(&MfddFactory<K, V>, NodeId, NodeId) -> NodeId,
    ) -> Self {
        assert!(
            self.factory.is_same(&other.factory),
            "family handles belong to a different factory"
        );
        self.factory.family(op(&self.factory, self.id, other.id))
    }

    /// Members of either family.
    pub fn union(&self, other: &Self) -> Self {
        self.binary(other, |f, a, b| f.union_ids(a, b))
    }

    /// Members of both families.
    pub fn intersection(&self, other: &Self) -> Self {
        self.binary(other, |f, a, b| f.intersection_ids(a, b))
    }

    /// Members of exactly one of the families.
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        self.binary(other, |f, a, b| f.symmetric_difference_ids(a, b))
    }

    /// Members of `self` that are not members of `other`.
    pub fn subtracting(&self, other: &Self) -> Self {
        self.binary(other, |f, a, b| f.subtraction_ids(a, b))
    }

    /// True if the families share no member.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other).is_empty()
    }

    /// True if every member of `self` is a member of `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.subtracting(other).is_empty()
    }

    pub fn is_strict_subset(&self, other: &Self) -> bool {
        self != other && self.is_subset(other)
    }

    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    pub fn is_strict_superset(&self, other: &Self) -> bool {
        other.is_strict_subset(self)
    }

    /// As [`Mfdd::union`], encoding the raw members first.
    pub fn union_members<M>(&self, members: M) -> Self
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = (K, V)>,
    {
        self.union(&self.factory.encode(members))
    }

    /// As [`Mfdd::intersection`], encoding the raw members first.
    pub fn intersection_members<M>(&self, members: M) -> Self
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = (K, V)>,
    {
        self.intersection(&self.factory.encode(members))
    }

    /// As [`Mfdd::symmetric_difference`], encoding the raw members first.
    pub fn symmetric_difference_members<M>(&self, members: M) -> Self
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = (K, V)>,
    {
        self.symmetric_difference(&self.factory.encode(members))
    }

    /// As [`Mfdd::subtracting`], encoding the raw members first.
    pub fn subtracting_members<M>(&self, members: M) -> Self
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = (K, V)>,
    {
        self.subtracting(&self.factory.encode(members))
    }
}

impl<K: Ord + Hash + Clone + 'static, V: Eq + Hash + Clone + 'static> Family for Mfdd<K, V> {
    type Key = K;

    fn union(&self, other: &Self) -> Self {
        Mfdd::union(self, other)
    }

    fn intersection(&self, other: &Self) -> Self {
        Mfdd::intersection(self, other)
    }

    fn symmetric_difference(&self, other: &Self) -> Self {
        Mfdd::symmetric_difference(self, other)
    }

    fn subtracting(&self, other: &Self) -> Self {
        Mfdd::subtracting(self, other)
    }
}
