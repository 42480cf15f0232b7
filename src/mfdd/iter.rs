//! Member enumeration and random sampling for MFDDs.

use std::hash::Hash;

use rand::prelude::*;

use crate::arena::NodeId;

use super::{Mfdd, MfddFactory};

/// Depth-first iterator over the members of a map family.
///
/// Yields each member exactly once as a key-sorted vector of bindings. At
/// every internal node the take-map entries are visited in node order
/// before the skip branch, so the order is deterministic for a given
/// family within its factory.
pub struct MfddMembers<K, V> {
    factory: MfddFactory<K, V>,
    /// Nodes pending a visit: handle, prefix length, and the cursor into
    /// the take map (one past the last entry means the skip branch).
    stack: Vec<(NodeId, usize, usize)>,
    /// Bindings chosen along the current take path.
    prefix: Vec<(K, V)>,
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> MfddMembers<K, V> {
    pub(crate) fn new(family: &Mfdd<K, V>) -> Self {
        Self {
            factory: family.factory.clone(),
            stack: vec![(family.id, 0, 0)],
            prefix: Vec::new(),
        }
    }
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Iterator for MfddMembers<K, V> {
    type Item = Vec<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth, cursor)) = self.stack.pop() {
            self.prefix.truncate(depth);
            if id == NodeId::ZERO {
                continue;
            }
            if id == NodeId::ONE {
                return Some(self.prefix.clone());
            }
            let (key, take, skip) = self.factory.parts(id);
            if cursor < take.len() {
                self.stack.push((id, depth, cursor + 1));
                let (value, child) = take[cursor].clone();
                self.prefix.push((key, value));
                self.stack.push((child, depth + 1, 0));
            } else {
                self.stack.push((skip, depth, 0));
            }
        }
        None
    }
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Mfdd<K, V> {
    /// Iterates over every member of the family.
    pub fn members(&self) -> MfddMembers<K, V> {
        MfddMembers::new(self)
    }

    /// Draws a member by a uniform structural walk seeded from entropy.
    ///
    /// At each internal node the walk picks the take side or the skip
    /// branch with equal probability (take is forced when skip is `zero`)
    /// and a uniform take-map entry within the take side. The draw is
    /// uniform over branch choices, not over members. The empty family
    /// yields `None`.
    pub fn random_member(&self) -> Option<Vec<(K, V)>> {
        self.random_member_with(&mut StdRng::from_entropy())
    }

    /// As [`Mfdd::random_member`], with a reproducible seed.
    pub fn random_member_seeded(&self, seed: u64) -> Option<Vec<(K, V)>> {
        self.random_member_with(&mut StdRng::seed_from_u64(seed))
    }

    /// As [`Mfdd::random_member`], drawing from the provided generator.
    pub fn random_member_with<R: Rng>(&self, rng: &mut R) -> Option<Vec<(K, V)>> {
        if self.is_empty() {
            return None;
        }
        let mut member = Vec::new();
        let mut current = self.id;
        while current != NodeId::ONE {
            let (key, take, skip) = self.factory.parts(current);
            if skip == NodeId::ZERO || rng.gen::<bool>() {
                let (value, child) = take[rng.gen_range(0..take.len())].clone();
                member.push((key, value));
                current = child;
            } else {
                current = skip;
            }
        }
        Some(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> MfddFactory<u32, &'static str> {
        MfddFactory::new()
    }

    #[test]
    fn terminal_iteration() {
        let f = factory();
        assert_eq!(f.zero().members().count(), 0);
        assert_eq!(
            f.one().members().collect::<Vec<_>>(),
            vec![Vec::<(u32, &str)>::new()]
        );
    }

    #[test]
    fn members_round_trip_the_encoding() {
        let f = factory();
        let family = f.encode([
            vec![],
            vec![(3u32, "a"), (5, "e")],
            vec![(3, "a"), (5, "E")],
            vec![(1, "a"), (3, "c"), (5, "e")],
        ]);

        let members: Vec<Vec<(u32, &str)>> = family.members().collect();
        assert_eq!(members.len() as u64, family.count());
        for member in &members {
            assert!(family.contains(member.iter().cloned()));
        }
        assert_eq!(f.encode(members), family);
    }

    #[test]
    fn members_are_yielded_once_and_deterministically() {
        let f = factory();
        let family = f.encode([
            vec![(1u32, "x")],
            vec![(1, "y")],
            vec![(1, "x"), (2, "z")],
            vec![],
        ]);

        let first: Vec<Vec<(u32, &str)>> = family.members().collect();
        let second: Vec<Vec<(u32, &str)>> = family.members().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        for (i, left) in first.iter().enumerate() {
            for right in &first[i + 1..] {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn random_member_is_always_a_member() {
        let f = factory();
        let family = f.encode([
            vec![],
            vec![(3u32, "a"), (5, "e")],
            vec![(3, "b")],
            vec![(1, "a"), (3, "c"), (5, "e")],
        ]);

        assert_eq!(f.zero().random_member(), None);
        assert_eq!(f.one().random_member(), Some(Vec::new()));

        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..64 {
            let member = family.random_member_with(&mut rng).unwrap();
            assert!(family.contains(member));
        }
        assert_eq!(
            family.random_member_seeded(5),
            family.random_member_seeded(5)
        );
    }
}
