//! Set-family decision diagrams.
//!
//! An SFDD is a canonical DAG representing a family of sets over a totally
//! ordered key domain. Two terminals anchor the structure: `zero` denotes
//! the empty family and `one` the family holding only the empty set. An
//! internal node `⟨k, take, skip⟩` denotes every member of `take` with `k`
//! added, together with every member of `skip`.
//!
//! Canonicity is enforced at construction: keys strictly increase along
//! every edge, a node whose take branch is `zero` collapses to its skip
//! branch, and identical content is interned once per factory. Handle
//! equality is therefore semantic equality, which is what makes the cached
//! algebra in [`algebra`] and the morphisms in [`morphisms`] sound.

pub mod algebra;
pub mod iter;
pub mod morphisms;

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::hash::{BuildHasher, Hash, Hasher};
use std::rc::Rc;

use ahash::{AHashMap, RandomState};

use crate::arena::{HashKind, NodeArena, NodeId, DEFAULT_BUCKET_CAPACITY};

pub use iter::SfddMembers;
pub use morphisms::{SfddInductiveStep, SfddMorphism, SfddMorphisms};

/// Internal node content: a key and its two branches.
pub(crate) struct SfddNode<K> {
    pub(crate) key: K,
    pub(crate) take: NodeId,
    pub(crate) skip: NodeId,
}

/// Everything one factory owns: arena, content hasher, operation caches.
pub(crate) struct SfddStore<K> {
    pub(crate) arena: RefCell<NodeArena<SfddNode<K>>>,
    pub(crate) hasher: RandomState,
    pub(crate) caches: RefCell<algebra::OpCaches>,
}

/// Factory of canonical set families over keys of type `K`.
///
/// A factory owns its nodes and caches; handles stay valid as long as any
/// clone of the factory lives, and handles from different factories must
/// not be mixed. Cloning a factory is cheap and yields the same factory.
pub struct SfddFactory<K> {
    store: Rc<SfddStore<K>>,
}

impl<K> Clone for SfddFactory<K> {
    fn clone(&self) -> Self {
        Self {
            store: Rc::clone(&self.store),
        }
    }
}

impl<K: Ord + Hash + Clone> SfddFactory<K> {
    /// Returns a factory with the default arena bucket capacity.
    pub fn new() -> Self {
        Self::with_bucket_capacity(DEFAULT_BUCKET_CAPACITY)
    }

    /// Returns a factory whose arena buckets hold `bucket_capacity` slots.
    pub fn with_bucket_capacity(bucket_capacity: usize) -> Self {
        Self {
            store: Rc::new(SfddStore {
                arena: RefCell::new(NodeArena::new(bucket_capacity)),
                hasher: RandomState::new(),
                caches: RefCell::new(algebra::OpCaches::new()),
            }),
        }
    }

    /// The empty family.
    pub fn zero(&self) -> Sfdd<K> {
        self.family(NodeId::ZERO)
    }

    /// The family containing only the empty set.
    pub fn one(&self) -> Sfdd<K> {
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

    /// Returns the unique family `{ {key} ∪ m : m ∈ take } ∪ skip`.
    ///
    /// `key` must be strictly smaller than the keys of both children; a
    /// `zero` take branch collapses the node to `skip`.
    pub fn node(&self, key: K, take: &Sfdd<K>, skip: &Sfdd<K>) -> Sfdd<K> {
        assert!(
            self.is_same(&take.factory) && self.is_same(&skip.factory),
            "family handles belong to a different factory"
        );
        self.family(self.node_id(key, take.id, skip.id))
    }

    /// Encodes one member, yielding the single-member family.
    /// Duplicate keys are de-duplicated; order is irrelevant.
    pub fn encode_member<I>(&self, member: I) -> Sfdd<K>
    where
        I: IntoIterator<Item = K>,
    {
        let mut keys: Vec<K> = member.into_iter().collect();
        keys.sort();
        keys.dedup();
        let mut id = NodeId::ONE;
        for key in keys.into_iter().rev() {
            id = self.node_id(key, id, NodeId::ZERO);
        }
        self.family(id)
    }

    /// Encodes a collection of members into its canonical family.
    ///
    /// Each member is an iterable of keys; duplicates within a member are
    /// de-duplicated and neither member order nor key order matters. Two
    /// encodings of the same collection return the same handle.
    pub fn encode<M>(&self, members: M) -> Sfdd<K>
    where
        M: IntoIterator,
        M::Item: IntoIterator<Item = K>,
    {
        let members: Vec<Sfdd<K>> = members
            .into_iter()
            .map(|member| self.encode_member(member))
            .collect();
        self.union_of(&members)
    }

    pub(crate) fn family(&self, id: NodeId) -> Sfdd<K> {
        Sfdd {
            factory: self.clone(),
            id,
        }
    }

    /// Canonicalizing node constructor over raw handles.
    pub(crate) fn node_id(&self, key: K, take: NodeId, skip: NodeId) -> NodeId {
        self.assert_child_order(&key, take);
        self.assert_child_order(&key, skip);
        if take == NodeId::ZERO {
            return skip;
        }

        let hash = self.hash_node(&key, take, skip);
        self.store.arena.borrow_mut().intern(
            hash,
            |node| node.key == key && node.take == take && node.skip == skip,
            || SfddNode {
                key: key.clone(),
                take,
                skip,
            },
        )
    }

    /// Clones out an internal node's content.
    pub(crate) fn parts(&self, id: NodeId) -> (K, NodeId, NodeId) {
        let arena = self.store.arena.borrow();
        let node = arena.get(id);
        (node.key.clone(), node.take, node.skip)
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

    fn hash_node(&self, key: &K, take: NodeId, skip: NodeId) -> HashKind {
        let mut hasher = self.store.hasher.build_hasher();
        key.hash(&mut hasher);
        take.hash(&mut hasher);
        skip.hash(&mut hasher);
        hasher.finish()
    }

    pub(crate) fn store(&self) -> &SfddStore<K> {
        &self.store
    }
}

impl<K: Ord + Hash + Clone> Default for SfddFactory<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Debug for SfddFactory<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SfddFactory")
            .field("store", &Rc::as_ptr(&self.store))
            .finish()
    }
}

/// Handle to a canonical set family.
///
/// Cheap to clone; equality and hashing are by identity of the underlying
/// node, which by canonicity is equality of the denoted family.
pub struct Sfdd<K> {
    pub(crate) factory: SfddFactory<K>,
    pub(crate) id: NodeId,
}

/// Structural view of a family handle, for pattern matching.
pub enum SfddView<K> {
    Zero,
    One,
    Node {
        key: K,
        take: Sfdd<K>,
        skip: Sfdd<K>,
    },
}

impl<K: Ord + Hash + Clone> Sfdd<K> {
    /// The factory this family belongs to.
    pub fn factory(&self) -> &SfddFactory<K> {
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
    pub fn view(&self) -> SfddView<K> {
        if self.id == NodeId::ZERO {
            SfddView::Zero
        } else if self.id == NodeId::ONE {
            SfddView::One
        } else {
            let (key, take, skip) = self.factory.parts(self.id);
            SfddView::Node {
                key,
                take: self.factory.family(take),
                skip: self.factory.family(skip),
            }
        }
    }

    /// True if the empty set is a member, following the skip chain.
    pub fn contains_empty_member(&self) -> bool {
        self.factory.empty_member_terminal(self.id) == NodeId::ONE
    }

    /// Number of members in the family.
    pub fn count(&self) -> u64 {
        fn count_rec<K: Ord + Hash + Clone>(
            factory: &SfddFactory<K>,
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
            let total = count_rec(factory, take, memo) + count_rec(factory, skip, memo);
            memo.insert(id, total);
            total
        }
        count_rec(&self.factory, self.id, &mut AHashMap::new())
    }

    /// True if `member` is in the family. Duplicate keys de-duplicate.
    pub fn contains<I>(&self, member: I) -> bool
    where
        I: IntoIterator<Item = K>,
    {
        let mut keys: Vec<K> = member.into_iter().collect();
        keys.sort();
        keys.dedup();
        let mut pending = keys.into_iter().peekable();

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
                Some(next) if key == *next => {
                    pending.next();
                    take
                }
                // Key not wanted (or member exhausted): only skip can match.
                _ => skip,
            };
        }
    }
}

impl<K> Clone for Sfdd<K> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            id: self.id,
        }
    }
}

impl<K> PartialEq for Sfdd<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Rc::ptr_eq(&self.factory.store, &other.factory.store)
    }
}

impl<K> Eq for Sfdd<K> {}

impl<K> Hash for Sfdd<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.factory.store).hash(state);
        self.id.hash(state);
    }
}

impl<K> Debug for Sfdd<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Sfdd").field(&self.id).finish()
    }
}
