//! Set algebra over SFDD handles.
//!
//! Each binary operation is a recursion over node handles with a
//! per-operation memoization table owned by the factory. Commutative
//! operations key their cache on the handle-sorted pair so `a ∪ b` and
//! `b ∪ a` share one entry; subtraction keys on the ordered pair. The
//! n-ary union and intersection group operands by their frontier key and
//! key their caches on the sorted, de-duplicated operand list.

use std::cmp::Ordering;
use std::hash::Hash;

use ahash::AHashMap;

use crate::arena::NodeId;
use crate::morphism::Family;

use super::{Sfdd, SfddFactory};

/// Per-operation memoization tables.
pub(crate) struct OpCaches {
    union: AHashMap<(NodeId, NodeId), NodeId>,
    intersection: AHashMap<(NodeId, NodeId), NodeId>,
    symmetric_difference: AHashMap<(NodeId, NodeId), NodeId>,
    subtraction: AHashMap<(NodeId, NodeId), NodeId>,
    union_many: AHashMap<Box<[NodeId]>, NodeId>,
    intersection_many: AHashMap<Box<[NodeId]>, NodeId>,
}

impl OpCaches {
    pub(crate) fn new() -> Self {
        Self {
            union: AHashMap::new(),
            intersection: AHashMap::new(),
            symmetric_difference: AHashMap::new(),
            subtraction: AHashMap::new(),
            union_many: AHashMap::new(),
            intersection_many: AHashMap::new(),
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

impl<K: Ord + Hash + Clone> SfddFactory<K> {
    /// N-ary union over family handles.
    pub fn union_of(&self, families: &[Sfdd<K>]) -> Sfdd<K> {
        for family in families {
            assert!(
                self.is_same(&family.factory),
                "family handles belong to a different factory"
            );
        }
        let operands = families.iter().map(|family| family.id).collect();
        self.family(self.union_many_ids(operands))
    }

    /// N-ary intersection over family handles.
    /// The intersection of no operands is the empty family.
    pub fn intersection_of(&self, families: &[Sfdd<K>]) -> Sfdd<K> {
        for family in families {
            assert!(
                self.is_same(&family.factory),
                "family handles belong to a different factory"
            );
        }
        let operands = families.iter().map(|family| family.id).collect();
        self.family(self.intersection_many_ids(operands))
    }

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

        let result = if a == NodeId::ONE {
            let (k, take, skip) = self.parts(b);
            let skip = self.union_ids(NodeId::ONE, skip);
            self.node_id(k, take, skip)
        } else if b == NodeId::ONE {
            let (k, take, skip) = self.parts(a);
            let skip = self.union_ids(NodeId::ONE, skip);
            self.node_id(k, take, skip)
        } else {
            let (ka, ta, sa) = self.parts(a);
            let (kb, tb, sb) = self.parts(b);
            match ka.cmp(&kb) {
                Ordering::Less => {
                    let skip = self.union_ids(sa, b);
                    self.node_id(ka, ta, skip)
                }
                Ordering::Equal => {
                    let take = self.union_ids(ta, tb);
                    let skip = self.union_ids(sa, sb);
                    self.node_id(ka, take, skip)
                }
                Ordering::Greater => {
                    let skip = self.union_ids(sb, a);
                    self.node_id(kb, tb, skip)
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

        let (ka, ta, sa) = self.parts(a);
        let (kb, tb, sb) = self.parts(b);
        let result = match ka.cmp(&kb) {
            Ordering::Less => self.intersection_ids(sa, b),
            Ordering::Equal => {
                let take = self.intersection_ids(ta, tb);
                let skip = self.intersection_ids(sa, sb);
                self.node_id(ka, take, skip)
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

        let result = if a == NodeId::ONE {
            let (k, take, skip) = self.parts(b);
            let skip = self.symmetric_difference_ids(NodeId::ONE, skip);
            self.node_id(k, take, skip)
        } else if b == NodeId::ONE {
            let (k, take, skip) = self.parts(a);
            let skip = self.symmetric_difference_ids(NodeId::ONE, skip);
            self.node_id(k, take, skip)
        } else {
            let (ka, ta, sa) = self.parts(a);
            let (kb, tb, sb) = self.parts(b);
            match ka.cmp(&kb) {
                Ordering::Less => {
                    let skip = self.symmetric_difference_ids(sa, b);
                    self.node_id(ka, ta, skip)
                }
                Ordering::Equal => {
                    let take = self.symmetric_difference_ids(ta, tb);
                    let skip = self.symmetric_difference_ids(sa, sb);
                    self.node_id(ka, take, skip)
                }
                Ordering::Greater => {
                    let skip = self.symmetric_difference_ids(sb, a);
                    self.node_id(kb, tb, skip)
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
            // The empty set survives unless it is also on the right.
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
            let (k, take, skip) = self.parts(a);
            let skip = self.subtraction_ids(skip, NodeId::ONE);
            self.node_id(k, take, skip)
        } else {
            let (ka, ta, sa) = self.parts(a);
            let (kb, tb, sb) = self.parts(b);
            match ka.cmp(&kb) {
                Ordering::Less => {
                    let skip = self.subtraction_ids(sa, b);
                    self.node_id(ka, ta, skip)
                }
                Ordering::Equal => {
                    let take = self.subtraction_ids(ta, tb);
                    let skip = self.subtraction_ids(sa, sb);
                    self.node_id(ka, take, skip)
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

    fn union_many_ids(&self, mut operands: Vec<NodeId>) -> NodeId {
        operands.retain(|&id| id != NodeId::ZERO);
        operands.sort();
        operands.dedup();

        match operands.len() {
            0 => return NodeId::ZERO,
            1 => return operands[0],
            2 => return self.union_ids(operands[0], operands[1]),
            _ => {}
        }

        let key: Box<[NodeId]> = operands.clone().into_boxed_slice();
        if let Some(&found) = self.store().caches.borrow().union_many.get(&key) {
            return found;
        }

        // Group by the smallest frontier key. `one` has no key and rides
        // along on the skip side until the binary base case absorbs it.
        let mut smallest: Option<K> = None;
        for &id in &operands {
            if id.is_terminal() {
                continue;
            }
            let (k, _, _) = self.parts(id);
            smallest = match smallest {
                Some(current) if current <= k => Some(current),
                _ => Some(k),
            };
        }
        let smallest = smallest.expect("three or more operands include an internal node");

        let mut takes = Vec::new();
        let mut rest = Vec::new();
        for &id in &operands {
            if id.is_terminal() {
                rest.push(id);
                continue;
            }
            let (k, take, skip) = self.parts(id);
            if k == smallest {
                takes.push(take);
                rest.push(skip);
            } else {
                rest.push(id);
            }
        }

        let take = self.union_many_ids(takes);
        let skip = self.union_many_ids(rest);
        let result = self.node_id(smallest, take, skip);

        self.store()
            .caches
            .borrow_mut()
            .union_many
            .insert(key, result);
        result
    }

    fn intersection_many_ids(&self, mut operands: Vec<NodeId>) -> NodeId {
        operands.sort();
        operands.dedup();

        if operands.contains(&NodeId::ZERO) {
            return NodeId::ZERO;
        }
        match operands.len() {
            0 => return NodeId::ZERO,
            1 => return operands[0],
            2 => return self.intersection_ids(operands[0], operands[1]),
            _ => {}
        }
        if operands.contains(&NodeId::ONE) {
            // Only the empty set can survive.
            let all_hold_empty = operands
                .iter()
                .all(|&id| self.empty_member_terminal(id) == NodeId::ONE);
            return if all_hold_empty {
                NodeId::ONE
            } else {
                NodeId::ZERO
            };
        }

        let key: Box<[NodeId]> = operands.clone().into_boxed_slice();
        if let Some(&found) = self.store().caches.borrow().intersection_many.get(&key) {
            return found;
        }

        // Group by the largest frontier key: any operand rooted below it
        // cannot contribute that key to a shared member, so it descends
        // its skip branch.
        let mut largest: Option<K> = None;
        for &id in &operands {
            let (k, _, _) = self.parts(id);
            largest = match largest {
                Some(current) if current >= k => Some(current),
                _ => Some(k),
            };
        }
        let largest = largest.expect("operands are all internal");

        let aligned = operands.iter().all(|&id| self.parts(id).0 == largest);
        let result = if aligned {
            let mut takes = Vec::new();
            let mut skips = Vec::new();
            for &id in &operands {
                let (_, take, skip) = self.parts(id);
                takes.push(take);
                skips.push(skip);
            }
            let take = self.intersection_many_ids(takes);
            let skip = self.intersection_many_ids(skips);
            self.node_id(largest, take, skip)
        } else {
            let descended = operands
                .iter()
                .map(|&id| {
                    let (k, _, skip) = self.parts(id);
                    if k == largest {
                        id
                    } else {
                        skip
                    }
                })
                .collect();
            self.intersection_many_ids(descended)
        };

        self.store()
            .caches
            .borrow_mut()
            .intersection_many
            .insert(key, result);
        result
    }
}

impl<K: Ord + Hash + Clone> Sfdd<K> {
    fn binary(&self, other: &Self, op: impl FnOnce(&SfddFactory<K>, NodeId, NodeId) -> NodeId) -> Self {
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

    /// As [`Sfdd::union`], encoding the raw members first.
    pub fn union_members<M>(&self, members: M) -> Self
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = K>,
    {
        self.union(&self.factory.encode(members))
    }

    /// As [`Sfdd::intersection`], encoding the raw members first.
    pub fn intersection_members<M>(&self, members: M) -> Self
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = K>,
    {
        self.intersection(&self.factory.encode(members))
    }

    /// As [`Sfdd::symmetric_difference`], encoding the raw members first.
    pub fn symmetric_difference_members<M>(&self, members: M) -> Self
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = K>,
    {
        self.symmetric_difference(&self.factory.encode(members))
    }

    /// As [`Sfdd::subtracting`], encoding the raw members first.
    pub fn subtracting_members<M>(&self, members: M) -> Self
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = K>,
    {
        self.subtracting(&self.factory.encode(members))
    }
}

impl<K: Ord + Hash + Clone + 'static> Family for Sfdd<K> {
    type Key = K;

    fn union(&self, other: &Self) -> Self {
        Sfdd::union(self, other)
    }

    fn intersection(&self, other: &Self) -> Self {
        Sfdd::intersection(self, other)
    }

    fn symmetric_difference(&self, other: &Self) -> Self {
        Sfdd::symmetric_difference(self, other)
    }

    fn subtracting(&self, other: &Self) -> Self {
        Sfdd::subtracting(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> SfddFactory<u32> {
        SfddFactory::new()
    }

    #[test]
    fn union_identities() {
        let f = factory();
        let a = f.encode([vec![], vec![3u32, 5], vec![1, 3, 5]]);

        assert_eq!(a.union(&f.zero()), a);
        assert_eq!(f.zero().union(&a), a);
        assert_eq!(a.union(&a), a);

        // one adds the empty set.
        let no_empty = f.encode([vec![3u32, 5]]);
        assert_eq!(no_empty.union(&f.one()), f.encode([vec![], vec![3u32, 5]]));
    }

    #[test]
    fn intersection_identities() {
        let f = factory();
        let a = f.encode([vec![], vec![3u32, 5]]);

        assert_eq!(a.intersection(&f.zero()), f.zero());
        assert_eq!(f.zero().intersection(&f.zero()), f.zero());
        assert_eq!(a.intersection(&a), a);

        // one keeps only the empty set.
        assert_eq!(a.intersection(&f.one()), f.one());
        let no_empty = f.encode([vec![3u32, 5]]);
        assert_eq!(no_empty.intersection(&f.one()), f.zero());
    }

    #[test]
    fn symmetric_difference_identities() {
        let f = factory();
        let a = f.encode([vec![], vec![3u32, 5]]);
        let b = f.encode([vec![3u32, 5], vec![4, 7]]);

        assert_eq!(a.symmetric_difference(&a), f.zero());
        assert_eq!(a.symmetric_difference(&f.zero()), a);
        assert_eq!(
            a.symmetric_difference(&b),
            a.union(&b).subtracting(&a.intersection(&b))
        );
    }

    #[test]
    fn subtraction_identities() {
        let f = factory();
        let a = f.encode([vec![], vec![3u32, 5], vec![1, 3, 5]]);
        let b = f.encode([vec![3u32, 5]]);

        assert_eq!(a.subtracting(&a), f.zero());
        assert_eq!(a.subtracting(&f.zero()), a);
        assert_eq!(a.subtracting(&b), f.encode([vec![], vec![1u32, 3, 5]]));
        assert!(a.subtracting(&b).is_subset(&a));

        // one on either side toggles on the empty member only.
        assert_eq!(f.one().subtracting(&a), f.zero());
        assert_eq!(f.one().subtracting(&b), f.one());
        assert_eq!(a.subtracting(&f.one()), f.encode([vec![3u32, 5], vec![1, 3, 5]]));
    }

    #[test]
    fn subset_and_disjoint_predicates() {
        let f = factory();
        let small = f.encode([vec![3u32, 5]]);
        let large = f.encode([vec![3u32, 5], vec![1, 3, 5]]);
        let apart = f.encode([vec![4u32, 7]]);

        assert!(small.is_subset(&large));
        assert!(small.is_strict_subset(&large));
        assert!(!large.is_strict_subset(&large));
        assert!(large.is_strict_superset(&small));
        assert!(small.is_disjoint(&apart));
        assert!(!small.is_disjoint(&large));
    }

    #[test]
    fn nary_union_matches_folded_binary() {
        let f = factory();
        let families = [
            f.encode([vec![1u32, 2], vec![3]]),
            f.encode([vec![], vec![2u32]]),
            f.encode([vec![1u32, 2], vec![4, 6]]),
            f.zero(),
            f.one(),
        ];

        let folded = families
            .iter()
            .fold(f.zero(), |folded, next| folded.union(next));
        assert_eq!(f.union_of(&families), folded);
        assert_eq!(f.union_of(&[]), f.zero());
        assert_eq!(f.union_of(&[families[0].clone()]), families[0]);
    }

    #[test]
    fn nary_intersection_matches_folded_binary() {
        let f = factory();
        let shared = vec![2u32, 5];
        let families = [
            f.encode([shared.clone(), vec![1u32]]),
            f.encode([shared.clone(), vec![2u32]]),
            f.encode([shared.clone(), vec![5u32], vec![]]),
        ];

        let folded = families
            .iter()
            .skip(1)
            .fold(families[0].clone(), |folded, next| folded.intersection(next));
        assert_eq!(f.intersection_of(&families), folded);
        assert_eq!(f.intersection_of(&families), f.encode([shared]));
        assert_eq!(f.intersection_of(&[]), f.zero());

        // With one in the mix, only a shared empty member survives.
        let with_empty = [f.one(), f.encode([vec![], vec![7u32]]), f.encode([vec![], vec![8u32]])];
        assert_eq!(f.intersection_of(&with_empty), f.one());
        let missing_empty = [f.one(), f.encode([vec![7u32]]), f.encode([vec![], vec![8u32]])];
        assert_eq!(f.intersection_of(&missing_empty), f.zero());
    }

    #[test]
    fn member_sequence_variants_encode_first() {
        let f = factory();
        let a = f.encode([vec![], vec![3u32, 5]]);

        assert_eq!(
            a.union_members([vec![4u32, 7]]),
            a.union(&f.encode([vec![4u32, 7]]))
        );
        assert_eq!(
            a.intersection_members([vec![3u32, 5], vec![9]]),
            f.encode([vec![3u32, 5]])
        );
        assert_eq!(
            a.subtracting_members([Vec::<u32>::new()]),
            f.encode([vec![3u32, 5]])
        );
        assert_eq!(
            a.symmetric_difference_members([vec![3u32, 5]]),
            f.encode([Vec::<u32>::new()])
        );
    }
}
