//! SFDD morphisms.
//!
//! Key-aware transformations over set families, layered on the generic
//! framework in [`crate::morphism`]: key-list morphisms (insert, remove,
//! the two filters), key mapping, the self-referential inductive morphism,
//! and saturation. [`SfddMorphisms`] is the per-factory morphism factory
//! combining these with the generic combinators; it interns morphisms by
//! structural content so equal morphisms share one application cache.
//!
//! Key lists are sorted and de-duplicated once at construction. Every
//! key-list morphism holds its tail (the same transformation on the
//! remaining keys), so applications walk the diagram and the key list in
//! one pass, and every suffix shares its cache through interning.

use std::any::{Any, TypeId};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::morphism::{Morphism, MorphismCache, MorphismPool, MorphismRef};

use super::{Sfdd, SfddFactory, SfddView};

/// Type-erased SFDD morphism handle.
pub type SfddMorphism<K> = MorphismRef<Sfdd<K>>;

/// Callback of the inductive morphism: from the morphism itself and the
/// current node, produce the morphisms for the take and skip branches.
pub type SfddInductiveStep<K> =
    Box<dyn Fn(&SfddMorphism<K>, &Sfdd<K>) -> (SfddMorphism<K>, SfddMorphism<K>)>;

/// What a key-list morphism does when its smallest outstanding key meets
/// the node frontier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum KeyListKind {
    /// Add every listed key to every member.
    Insert,
    /// Drop every listed key from every member.
    Remove,
    /// Keep only members containing every listed key.
    FilterContaining,
    /// Keep only members containing none of the listed keys.
    FilterExcluding,
}

/// Insert, remove, or filter over a sorted key list.
struct KeyList<K: Ord + Hash + Clone + 'static> {
    kind: KeyListKind,
    factory: SfddFactory<K>,
    /// Sorted, de-duplicated, non-empty.
    keys: Vec<K>,
    /// The same transformation on `keys[1..]`; identity when none remain.
    tail: SfddMorphism<K>,
    cache: MorphismCache<Sfdd<K>>,
}

impl<K: Ord + Hash + Clone + 'static> Morphism<Sfdd<K>> for KeyList<K> {
    fn transform(&self, this: &SfddMorphism<K>, input: &Sfdd<K>) -> Sfdd<K> {
        match input.view() {
            SfddView::Zero => input.clone(),
            SfddView::One => match self.kind {
                KeyListKind::Insert => self.factory.encode_member(self.keys.iter().cloned()),
                KeyListKind::Remove | KeyListKind::FilterExcluding => input.clone(),
                KeyListKind::FilterContaining => self.factory.zero(),
            },
            SfddView::Node { key, take, skip } => {
                let first = &self.keys[0];
                if key < *first {
                    // Untouched layer: transform both branches in place.
                    let take = this.apply(&take);
                    let skip = this.apply(&skip);
                    self.factory.node(key, &take, &skip)
                } else if key == *first {
                    match self.kind {
                        KeyListKind::Insert => {
                            let merged = take.union(&skip);
                            self.factory
                                .node(key, &self.tail.apply(&merged), &self.factory.zero())
                        }
                        KeyListKind::Remove => self.tail.apply(&take.union(&skip)),
                        KeyListKind::FilterContaining => {
                            self.factory
                                .node(key, &self.tail.apply(&take), &self.factory.zero())
                        }
                        KeyListKind::FilterExcluding => self.tail.apply(&skip),
                    }
                } else {
                    match self.kind {
                        KeyListKind::Insert => {
                            // The key is absent below: bind it here.
                            self.factory
                                .node(first.clone(), &self.tail.apply(input), &self.factory.zero())
                        }
                        KeyListKind::Remove | KeyListKind::FilterExcluding => self.tail.apply(input),
                        KeyListKind::FilterContaining => self.factory.zero(),
                    }
                }
            }
        }
    }

    fn cache(&self) -> &MorphismCache<Sfdd<K>> {
        &self.cache
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.keys[0].clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<Self>().map_or(false, |other| {
            self.kind == other.kind
                && self.keys == other.keys
                && self.factory.is_same(&other.factory)
        })
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.kind.hash(&mut state);
        self.keys.hash(&mut state);
        Rc::as_ptr(&self.factory.store).hash(&mut state);
    }
}

/// Rewrites every key through a caller-provided function.
///
/// The function must be strictly order-preserving on the keys that occur
/// in the input; this is not checked beyond the canonical ordering assert.
struct MapKeys<K: Ord + Hash + Clone + 'static> {
    factory: SfddFactory<K>,
    map: Box<dyn Fn(&K) -> K>,
    cache: MorphismCache<Sfdd<K>>,
}

impl<K: Ord + Hash + Clone + 'static> Morphism<Sfdd<K>> for MapKeys<K> {
    fn transform(&self, this: &SfddMorphism<K>, input: &Sfdd<K>) -> Sfdd<K> {
        match input.view() {
            SfddView::Zero | SfddView::One => input.clone(),
            SfddView::Node { key, take, skip } => {
                let take = this.apply(&take);
                let skip = this.apply(&skip);
                self.factory.node((self.map)(&key), &take, &skip)
            }
        }
    }

    fn cache(&self) -> &MorphismCache<Sfdd<K>> {
        &self.cache
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        // Closure-carrying: equality is instance identity.
        other
            .downcast_ref::<Self>()
            .map_or(false, |other| std::ptr::eq(self, other))
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        (self as *const Self as usize).hash(&mut state);
    }
}

/// Generalized structural recursion.
///
/// On an internal node the callback chooses the morphisms applied to the
/// two branches, receiving the type-erased morphism itself so it can
/// recurse. `one` maps to the substitute family, `zero` to itself.
struct Inductive<K: Ord + Hash + Clone + 'static> {
    factory: SfddFactory<K>,
    substitute: Sfdd<K>,
    step: SfddInductiveStep<K>,
    cache: MorphismCache<Sfdd<K>>,
}

impl<K: Ord + Hash + Clone + 'static> Morphism<Sfdd<K>> for Inductive<K> {
    fn transform(&self, this: &SfddMorphism<K>, input: &Sfdd<K>) -> Sfdd<K> {
        match input.view() {
            SfddView::Zero => input.clone(),
            SfddView::One => self.substitute.clone(),
            SfddView::Node { key, take, skip } => {
                let (take_step, skip_step) = (self.step)(this, input);
                let take = take_step.apply(&take);
                let skip = skip_step.apply(&skip);
                self.factory.node(key, &take, &skip)
            }
        }
    }

    fn cache(&self) -> &MorphismCache<Sfdd<K>> {
        &self.cache
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<Self>()
            .map_or(false, |other| std::ptr::eq(self, other))
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        (self as *const Self as usize).hash(&mut state);
    }
}

/// Pushes a morphism below every key it cannot touch.
///
/// Layers whose key is strictly below the wrapped morphism's lowest
/// relevant key are rebuilt in place while the morphism rides down both
/// branches; at the first relevant layer (and on terminals) the wrapped
/// morphism takes over. Semantics are unchanged; what changes is where
/// cache entries land, which is what makes large fixed points tractable.
struct Saturated<K: Ord + Hash + Clone + 'static> {
    factory: SfddFactory<K>,
    lowest: K,
    inner: SfddMorphism<K>,
    cache: MorphismCache<Sfdd<K>>,
}

impl<K: Ord + Hash + Clone + 'static> Morphism<Sfdd<K>> for Saturated<K> {
    fn transform(&self, this: &SfddMorphism<K>, input: &Sfdd<K>) -> Sfdd<K> {
        match input.view() {
            SfddView::Node { key, take, skip } if key < self.lowest => {
                let take = this.apply(&take);
                let skip = this.apply(&skip);
                self.factory.node(key, &take, &skip)
            }
            _ => self.inner.apply(input),
        }
    }

    fn cache(&self) -> &MorphismCache<Sfdd<K>> {
        &self.cache
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.lowest.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<Self>().map_or(false, |other| {
            self.lowest == other.lowest
                && self.inner == other.inner
                && self.factory.is_same(&other.factory)
        })
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.lowest.hash(&mut state);
        self.inner.hash(&mut state);
        Rc::as_ptr(&self.factory.store).hash(&mut state);
    }
}

/// Morphism factory for one SFDD factory.
///
/// Construction goes through this factory so structurally equal morphisms
/// resolve to one interned instance and share their cache. Closure-carrying
/// morphisms (`map`, `inductive`) compare by identity and are always fresh.
pub struct SfddMorphisms<K: Ord + Hash + Clone + 'static> {
    factory: SfddFactory<K>,
    pool: MorphismPool<Sfdd<K>>,
}

impl<K: Ord + Hash + Clone + 'static> SfddMorphisms<K> {
    pub fn new(factory: &SfddFactory<K>) -> Self {
        Self {
            factory: factory.clone(),
            pool: MorphismPool::new(),
        }
    }

    /// The factory whose families these morphisms transform.
    pub fn factory(&self) -> &SfddFactory<K> {
        &self.factory
    }

    /// Number of distinct interned morphisms.
    pub fn interned_count(&self) -> usize {
        self.pool.len()
    }

    pub fn identity(&self) -> SfddMorphism<K> {
        self.pool.identity()
    }

    pub fn constant(&self, value: Sfdd<K>) -> SfddMorphism<K> {
        assert!(
            self.factory.is_same(&value.factory),
            "family handle belongs to a different factory"
        );
        self.pool.constant(value)
    }

    pub fn union(&self, lhs: SfddMorphism<K>, rhs: SfddMorphism<K>) -> SfddMorphism<K> {
        self.pool.union(lhs, rhs)
    }

    pub fn union_many(&self, operands: Vec<SfddMorphism<K>>) -> SfddMorphism<K> {
        self.pool.union_many(operands)
    }

    pub fn intersection(&self, lhs: SfddMorphism<K>, rhs: SfddMorphism<K>) -> SfddMorphism<K> {
        self.pool.intersection(lhs, rhs)
    }

    pub fn intersection_many(&self, operands: Vec<SfddMorphism<K>>) -> SfddMorphism<K> {
        self.pool.intersection_many(operands)
    }

    pub fn symmetric_difference(
        &self,
        lhs: SfddMorphism<K>,
        rhs: SfddMorphism<K>,
    ) -> SfddMorphism<K> {
        self.pool.symmetric_difference(lhs, rhs)
    }

    pub fn symmetric_difference_many(&self, operands: Vec<SfddMorphism<K>>) -> SfddMorphism<K> {
        self.pool.symmetric_difference_many(operands)
    }

    pub fn subtraction(
        &self,
        minuend: SfddMorphism<K>,
        subtrahend: SfddMorphism<K>,
    ) -> SfddMorphism<K> {
        self.pool.subtraction(minuend, subtrahend)
    }

    pub fn composition(&self, outer: SfddMorphism<K>, inner: SfddMorphism<K>) -> SfddMorphism<K> {
        self.pool.composition(outer, inner)
    }

    /// N-ary composition; operands apply right to left.
    pub fn composition_many(&self, operands: Vec<SfddMorphism<K>>) -> SfddMorphism<K> {
        self.pool.composition_many(operands)
    }

    pub fn fixed_point(&self, body: SfddMorphism<K>) -> SfddMorphism<K> {
        self.pool.fixed_point(body)
    }

    /// Adds every listed key to every member.
    pub fn insert<I: IntoIterator<Item = K>>(&self, keys: I) -> SfddMorphism<K> {
        self.key_list(KeyListKind::Insert, keys)
    }

    /// Drops every listed key from every member.
    pub fn remove<I: IntoIterator<Item = K>>(&self, keys: I) -> SfddMorphism<K> {
        self.key_list(KeyListKind::Remove, keys)
    }

    /// Keeps only members containing every listed key.
    pub fn filter_containing<I: IntoIterator<Item = K>>(&self, keys: I) -> SfddMorphism<K> {
        self.key_list(KeyListKind::FilterContaining, keys)
    }

    /// Keeps only members containing none of the listed keys.
    pub fn filter_excluding<I: IntoIterator<Item = K>>(&self, keys: I) -> SfddMorphism<K> {
        self.key_list(KeyListKind::FilterExcluding, keys)
    }

    /// Rewrites every key through `map`, which must be strictly
    /// order-preserving on the keys occurring in the input.
    pub fn map<F: Fn(&K) -> K + 'static>(&self, map: F) -> SfddMorphism<K> {
        self.pool.intern(MorphismRef::new(MapKeys {
            factory: self.factory.clone(),
            map: Box::new(map),
            cache: MorphismCache::new(),
        }))
    }

    /// Generalized recursion; `substitute` replaces `one` and defaults to
    /// `one` when absent.
    pub fn inductive<F>(&self, substitute: Option<Sfdd<K>>, step: F) -> SfddMorphism<K>
    where
        F: Fn(&SfddMorphism<K>, &Sfdd<K>) -> (SfddMorphism<K>, SfddMorphism<K>) + 'static,
    {
        let substitute = substitute.unwrap_or_else(|| self.factory.one());
        assert!(
            self.factory.is_same(&substitute.factory),
            "family handle belongs to a different factory"
        );
        self.pool.intern(MorphismRef::new(Inductive {
            factory: self.factory.clone(),
            substitute,
            step: Box::new(step),
            cache: MorphismCache::new(),
        }))
    }

    /// Wraps `inner` to be pushed below every key strictly below `lowest`.
    pub fn saturated(&self, inner: SfddMorphism<K>, lowest: K) -> SfddMorphism<K> {
        self.pool.intern(MorphismRef::new(Saturated {
            factory: self.factory.clone(),
            lowest,
            inner,
            cache: MorphismCache::new(),
        }))
    }

    /// Saturates a morphism at its advertised lowest relevant key.
    pub fn saturate(&self, inner: &SfddMorphism<K>) -> SfddMorphism<K> {
        let lowest = inner
            .lowest_relevant_key()
            .expect("morphism does not advertise a lowest relevant key");
        self.saturated(inner.clone(), lowest)
    }

    fn key_list<I: IntoIterator<Item = K>>(&self, kind: KeyListKind, keys: I) -> SfddMorphism<K> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();
        assert!(!keys.is_empty(), "key list cannot be empty");
        self.key_list_chain(kind, keys)
    }

    fn key_list_chain(&self, kind: KeyListKind, keys: Vec<K>) -> SfddMorphism<K> {
        let tail = if keys.len() == 1 {
            self.identity()
        } else {
            self.key_list_chain(kind, keys[1..].to_vec())
        };
        self.pool.intern(MorphismRef::new(KeyList {
            kind,
            factory: self.factory.clone(),
            keys,
            tail,
            cache: MorphismCache::new(),
        }))
    }
}
