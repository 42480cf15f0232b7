//! Member enumeration and random sampling for SFDDs.

use std::hash::Hash;

use rand::prelude::*;

use crate::arena::NodeId;

use super::{Sfdd, SfddFactory};

/// Depth-first iterator over the members of a family.
///
/// Yields each member exactly once as a sorted key vector. At every
/// internal node the take branch is visited before the skip branch, so the
/// order is deterministic for a given family.
pub struct SfddMembers<K> {
    factory: SfddFactory<K>,
    /// Nodes pending a visit, with the prefix length at that point.
    stack: Vec<(NodeId, usize)>,
    /// Keys chosen along the current take path.
    prefix: Vec<K>,
}

impl<K: Ord + Hash + Clone> SfddMembers<K> {
    pub(crate) fn new(family: &Sfdd<K>) -> Self {
        Self {
            factory: family.factory.clone(),
            stack: vec![(family.id, 0)],
            prefix: Vec::new(),
        }
    }
}

impl<K: Ord + Hash + Clone> Iterator for SfddMembers<K> {
    type Item = Vec<K>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth)) = self.stack.pop() {
            self.prefix.truncate(depth);
            if id == NodeId::ZERO {
                continue;
            }
            if id == NodeId::ONE {
                return Some(self.prefix.clone());
            }
            let (key, take, skip) = self.factory.parts(id);
            self.stack.push((skip, depth));
            self.prefix.push(key);
            self.stack.push((take, depth + 1));
        }
        None
    }
}

impl<K: Ord + Hash + Clone> Sfdd<K> {
    /// Iterates over every member of the family.
    pub fn members(&self) -> SfddMembers<K> {
        SfddMembers::new(self)
    }

    /// Draws a member by a uniform structural walk seeded from entropy.
    ///
    /// At each internal node the walk picks the take or skip branch with
    /// equal probability (take is forced when skip is `zero`; take is never
    /// `zero`). The draw is uniform over branch choices, not over members.
    /// The empty family yields `None`.
    pub fn random_member(&self) -> Option<Vec<K>> {
        self.random_member_with(&mut StdRng::from_entropy())
    }

    /// As [`Sfdd::random_member`], with a reproducible seed.
    pub fn random_member_seeded(&self, seed: u64) -> Option<Vec<K>> {
        self.random_member_with(&mut StdRng::seed_from_u64(seed))
    }

    /// As [`Sfdd::random_member`], drawing from the provided generator.
    pub fn random_member_with<R: Rng>(&self, rng: &mut R) -> Option<Vec<K>> {
        if self.is_empty() {
            return None;
        }
        let mut member = Vec::new();
        let mut current = self.id;
        while current != NodeId::ONE {
            let (key, take, skip) = self.factory.parts(current);
            if skip == NodeId::ZERO || rng.gen::<bool>() {
                member.push(key);
                current = take;
            } else {
                current = skip;
            }
        }
        Some(member)
    }
}
