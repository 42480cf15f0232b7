//! Map-family decision diagrams.
//!
//! An MFDD is a canonical DAG representing a family of finite maps from a
//! totally ordered key domain to an arbitrary hashable value domain. It
//! shares the SFDD skeleton, but an internal node `⟨k, take, skip⟩`
//! carries a take *map*: one branch per value bound to `k`. The node
//! denotes every member of `take[v]` extended with `k ↦ v`, for each
//! entry, together with every member of `skip`.
//!
//! Canonicity mirrors the set case: keys strictly increase along every
//! edge, entries never point at `zero` (a take map emptied of such entries
//! collapses the node to its skip branch), values are unique within a
//! node, and identical content is interned once per factory. Take-map
//! equality is order-independent, so the content hash combines entry
//! hashes with XOR and lookup compares entry sets.

pub mod algebra;
pub mod iter;
pub mod morphisms;

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::hash::{BuildHasher, Hash, Hasher};
use std::rc::Rc;

use ahash::{AHashMap, RandomState};

use crate::arena::{HashKind, NodeArena, NodeId, DEFAULT_BUCKET_CAPACITY};

pub use iter::MfddMembers;
pub use morphisms::{MfddInductiveStep, MfddMorphism, MfddMorphisms};

/// Internal node content: a key, its take map, and the skip branch.
pub(crate) struct MfddNode<K, V> {
    pub(crate) key: K,
    /// Value-to-branch entries; values unique, no entry points at zero.
    /// Stored in first-interned order; equality ignores order.
    pub(crate) take: Vec<(V, NodeId)>,
    pub(crate) skip: NodeId,
}

/// Everything one factory owns: arena, content hasher, operation caches.
pub(crate) struct MfddStore<K, V> {
    pub(crate) arena: RefCell<NodeArena<MfddNode<K, V>>>,
    pub(crate) hasher: RandomState,
    pub(crate) caches: RefCell<algebra::OpCaches>,
}

/// Factory of canonical map families over keys `K` and values `V`.
///
/// A factory owns its nodes and caches; handles stay valid as long as any
/// clone of the factory lives, and handles from different factories must
/// not be mixed. Cloning a factory is cheap and yields the same factory.
pub struct MfddFactory<K, V> {
    store: Rc<MfddStore<K, V>>,
}

impl<K, V> Clone for MfddFactory<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Rc::clone(&self.store),
        }
    }
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> MfddFactory<K, V> {
    /// Returns a factory with the default arena bucket capacity.
    pub fn new() -> Self {
        Self::with_bucket_capacity(DEFAULT_BUCKET_CAPACITY)
    }

    /// Returns a factory whose arena buckets hold `bucket_capacity` slots.
    pub fn with_bucket_capacity(bucket_capacity: usize) -> Self {
        Self {
            store: Rc::new(MfddStore {
                arena: RefCell::new(NodeArena::new(bucket_capacity)),
                hasher: RandomState::new(),
                caches: RefCell::new(algebra::OpCaches::new()),
            }),
        }
    }

    /// The empty family.
    pub fn zero(&self) -> Mfdd<K, V> {
        self.family(NodeId::ZERO)
    }

    /// The family containing only the empty map.
    pub fn one(&self) -> Mfdd<K, V> {
        self.family(NodeId::ONE)
    }

    /// Number of internal nodes interned so far.
    pub fn created_count(&self) -> usize {
        self.store.arena.borrow().len()
    }

    /// True if both handles name this factory.
    pub(crate) fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.store, &other.store)
    }

    /// Returns the unique family binding `key` per take-map entry.
    ///
    /// `key` must be strictly smaller than the keys of all children;
    /// entries pointing at `zero` are dropped, and a node left with no
    /// entry collapses to `skip`. Duplicate values are a construction
    /// error.
    pub fn node(&self, key: K, entries: Vec<(V, Mfdd<K, V>)>, skip: &Mfdd<K, V>) -> Mfdd<K, V> {
        assert!(
            self.is_same(&skip.factory),
            "family handles belong to a different factory"
        );
        let entries = entries
            .into_iter()
            .map(|(value, child)| {
                assert!(
                    self.is_same(&child.factory),
                    "family handles belong to a different factory"
                );
                (value, child.id)
            })
            .collect();
        self.family(self.node_id(key, entries, skip.id))
    }

    /// Encodes one member, yielding the single-member family.
    /// Duplicate pairs de-duplicate; conflicting values for one key are a
    /// construction error.
    pub fn encode_member<I>(&self, member: I) -> Mfdd<K, V>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut pairs: Vec<(K, V)> = member.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup();
        for window in pairs.windows(2) {
            assert!(
                window[0].0 != window[1].0,
                "conflicting values for one key in a member"
            );
        }
        let mut id = NodeId::ONE;
        for (key, value) in pairs.into_iter().rev() {
            id = self.node_id(key, vec![(value, id)], NodeId::ZERO);
        }
        self.family(id)
    }

    /// Encodes a collection of members into its canonical family.
    ///
    /// Each member is an iterable of key-value pairs; member order and
    /// pair order are irrelevant. Two encodings of the same collection
    /// return the same handle.
    pub fn encode<M>(&self, members: M) -> Mfdd<K, V>
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = (K, V)>,
    {
        let mut id = NodeId::ZERO;
        for member in members {
            let encoded = self.encode_member(member);
            id = self.union_ids(id, encoded.id);
        }
        self.family(id)
    }

    pub(crate) fn family(&self, id: NodeId) -> Mfdd<K, V> {
        Mfdd {
            factory: self.clone(),
            id,
        }
    }

    /// Canonicalizing node constructor over raw handles.
    pub(crate) fn node_id(&self, key: K, mut entries: Vec<(V, NodeId)>, skip: NodeId) -> NodeId {
        entries.retain(|(_, child)| *child != NodeId::ZERO);
        for i in 0..entries.len() {
            for j in i + 1..entries.len() {
                assert!(entries[i].0 != entries[j].0, "duplicate value in take map");
            }
        }
        for (_, child) in &entries {
            self.assert_child_order(&key, *child);
        }
        self.assert_child_order(&key, skip);
        if entries.is_empty() {
            return skip;
        }

        let hash = self.hash_node(&key, &entries, skip);
        self.store.arena.borrow_mut().intern(
            hash,
            |node| node.key == key && node.skip == skip && entry_sets_equal(&node.take, &entries),
            || MfddNode {
                key: key.clone(),
                take: entries.clone(),
                skip,
            },
        )
    }

    /// Clones out an internal node's content.
    pub(crate) fn parts(&self, id: NodeId) -> (K, Vec<(V, NodeId)>, NodeId) {
        let arena = self.store.arena.borrow();
        let node = arena.get(id);
        (node.key.clone(), node.take.clone(), node.skip)
    }

    fn assert_child_order(&self, key: &K, child: NodeId) {
        if !child.is_terminal() {
            let arena = self.store.arena.borrow();
            assert!(
                *key < arena.get(child).key,
                "child key must exceed parent key"
            );
        }
    }

    fn hash_node(&self, key: &K, entries: &[(V, NodeId)], skip: NodeId) -> HashKind {
        let mut hasher = self.store.hasher.build_hasher();
        key.hash(&mut hasher);
        skip.hash(&mut hasher);
        let mut combined = hasher.finish();
        // Entry order is irrelevant, so entry hashes combine with XOR.
        for (value, child) in entries {
            let mut entry_hasher = self.store.hasher.build_hasher();
            value.hash(&mut entry_hasher);
            child.hash(&mut entry_hasher);
            combined ^= entry_hasher.finish();
        }
        combined
    }

    pub(crate) fn store(&self) -> &MfddStore<K, V> {
        &self.store
    }
}

/// Order-independent equality of two unique-valued entry lists.
fn entry_sets_equal<V: Eq, I: Eq + Copy>(lhs: &[(V, I)], rhs: &[(V, I)]) -> bool {
    lhs.len() == rhs.len()
        && lhs
            .iter()
            .all(|(value, child)| rhs.iter().any(|(v, c)| v == value && c == child))
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Default for MfddFactory<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Debug for MfddFactory<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MfddFactory")
            .field("store", &Rc::as_ptr(&self.store))
            .finish()
    }
}

/// Handle to a canonical map family.
///
/// Cheap to clone; equality and hashing are by identity of the underlying
/// node, which by canonicity is equality of the denoted family.
pub struct Mfdd<K, V> {
    pub(crate) factory: MfddFactory<K, V>,
    pub(crate) id: NodeId,
}

/// Structural view of a family handle, for pattern matching.
pub enum MfddView<K, V> {
    Zero,
    One,
    Node {
        key: K,
        take: Vec<(V, Mfdd<K, V>)>,
        skip: Mfdd<K, V>,
    },
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Mfdd<K, V> {
    /// The factory this family belongs to.
    pub fn factory(&self) -> &MfddFactory<K, V> {
        &self.factory
    }

    /// True for the empty family.
    pub fn is_empty(&self) -> bool {
        self.id == NodeId::ZERO
    }

    /// True for either terminal.
    pub fn is_terminal(&self) -> bool {
        self.id.is_terminal()
    }

    /// Decomposes the handle one level.
    pub fn view(&self) -> MfddView<K, V> {
        if self.id == NodeId::ZERO {
            MfddView::Zero
        } else if self.id == NodeId::ONE {
            MfddView::One
        } else {
            let (key, take, skip) = self.factory.parts(self.id);
            MfddView::Node {
                key,
                take: take
                    .into_iter()
                    .map(|(value, child)| (value, self.factory.family(child)))
                    .collect(),
                skip: self.factory.family(skip),
            }
        }
    }

    /// True if the empty map is a member, following the skip chain.
    pub fn contains_empty_member(&self) -> bool {
        self.factory.empty_member_terminal(self.id) == NodeId::ONE
    }

    /// Number of members in the family.
    pub fn count(&self) -> u64 {
        fn count_rec<K: Ord + Hash + Clone, V: Eq + Hash + Clone>(
            factory: &MfddFactory<K, V>,
            id: NodeId,
            memo: &mut AHashMap<NodeId, u64>,
        ) -> u64 {
            if id == NodeId::ZERO {
                return 0;
            }
            if id == NodeId::ONE {
                return 1;
            }
            if let Some(&found) = memo.get(&id) {
                return found;
            }
            let (_, take, skip) = factory.parts(id);
            let mut total = count_rec(factory, skip, memo);
            for (_, child) in take {
                total += count_rec(factory, child, memo);
            }
            memo.insert(id, total);
            total
        }
        count_rec(&self.factory, self.id, &mut AHashMap::new())
    }

    /// True if `member` is in the family. Duplicate pairs de-duplicate;
    /// conflicting values for one key are a construction error.
    pub fn contains<I>(&self, member: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut pairs: Vec<(K, V)> = member.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup();
        for window in pairs.windows(2) {
            assert!(
                window[0].0 != window[1].0,
                "conflicting values for one key in a member"
            );
        }
        let mut pending = pairs.into_iter().peekable();

        let mut current = self.id;
        loop {
            if current == NodeId::ZERO {
                return false;
            }
            if current == NodeId::ONE {
                return pending.next().is_none();
            }
            let (key, take, skip) = self.factory.parts(current);
            current = match pending.peek() {
                Some((k, v)) if key == *k => {
                    match take.iter().find(|(value, _)| value == v) {
                        Some((_, child)) => {
                            let child = *child;
                            pending.next();
                            child
                        }
                        // Bound to a different value: no member matches.
                        None => return false,
                    }
                }
                // Key not wanted (or member exhausted): only skip can match.
                _ => skip,
            };
        }
    }
}

impl<K, V> Clone for Mfdd<K, V> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            id: self.id,
        }
    }
}

impl<K, V> PartialEq for Mfdd<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Rc::ptr_eq(&self.factory.store, &other.factory.store)
    }
}

impl<K, V> Eq for Mfdd<K, V> {}

impl<K, V> Hash for Mfdd<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.factory.store).hash(state);
        self.id.hash(state);
    }
}

impl<K, V> Debug for Mfdd<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Mfdd").field(&self.id).finish()
    }
}
