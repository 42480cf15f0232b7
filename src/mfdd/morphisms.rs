//! MFDD morphisms.
//!
//! Key- and value-aware transformations over map families, layered on the
//! generic framework in [`crate::morphism`]: binding insertion, key and
//! value-binding removal, the two value filters, value mapping, the
//! self-referential inductive morphism, and saturation. [`MfddMorphisms`]
//! is the per-factory morphism factory combining these with the generic
//! combinators.
//!
//! Assignment lists are sorted by key once at construction and must bind
//! each key at most once. Every assignment morphism holds its tail (the
//! same transformation on the remaining assignments), so applications walk
//! the diagram and the assignment list in one pass, and every suffix
//! shares its cache through interning.

use std::any::{Any, TypeId};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::morphism::{Morphism, MorphismCache, MorphismPool, MorphismRef};

use super::{Mfdd, MfddFactory, MfddView};

/// Type-erased MFDD morphism handle.
pub type MfddMorphism<K, V> = MorphismRef<Mfdd<K, V>>;

/// Callback of the inductive morphism: from the morphism itself and the
/// current node, produce a partial assignment of morphisms to take-map
/// values, plus the morphism for the skip branch. Values it leaves out
/// keep their subtree; values it names that the node does not bind are
/// applied to the empty family, which lets the morphism introduce
/// bindings.
pub type MfddInductiveStep<K, V> = Box<
    dyn Fn(&MfddMorphism<K, V>, &Mfdd<K, V>) -> (Vec<(V, MfddMorphism<K, V>)>, MfddMorphism<K, V>),
>;

/// Adds a binding for every listed key to every member.
///
/// At the frontier key, members without a binding receive the inserted
/// value (absorbing the skip branch); members already bound to the
/// inserted value continue unchanged through the remaining assignments;
/// members bound to a *different* value pass through untouched.
struct Insert<K: Ord + Hash + Clone + 'static, V: Eq + Hash + Clone + 'static> {
    factory: MfddFactory<K, V>,
    /// Key-sorted, keys unique, non-empty.
    assignments: Vec<(K, V)>,
    /// The same insertion on `assignments[1..]`; identity when none remain.
    tail: MfddMorphism<K, V>,
    cache: MorphismCache<Mfdd<K, V>>,
}

impl<K, V> Morphism<Mfdd<K, V>> for Insert<K, V>
where
    K: Ord + Hash + Clone + 'static,
    V: Eq + Hash + Clone + 'static,
{
    fn transform(&self, this: &MfddMorphism<K, V>, input: &Mfdd<K, V>) -> Mfdd<K, V> {
        match input.view() {
            MfddView::Zero => input.clone(),
            MfddView::One => self.factory.encode_member(self.assignments.iter().cloned()),
            MfddView::Node { key, take, skip } => {
                let (first_key, first_value) = &self.assignments[0];
                if key < *first_key {
                    let take = take
                        .into_iter()
                        .map(|(value, child)| (value, this.apply(&child)))
                        .collect();
                    self.factory.node(key, take, &this.apply(&skip))
                } else if key == *first_key {
                    let bound = take.iter().any(|(value, _)| value == first_value);
                    if bound {
                        // The bound branch absorbs the unbound members.
                        let entries = take
                            .into_iter()
                            .map(|(value, child)| {
                                if value == *first_value {
                                    let merged = child.union(&skip);
                                    (value, self.tail.apply(&merged))
                                } else {
                                    (value, child)
                                }
                            })
                            .collect();
                        self.factory.node(key, entries, &self.factory.zero())
                    } else {
                        // Fresh binding absorbing every existing branch.
                        let mut folded = skip;
                        for (_, child) in &take {
                            folded = folded.union(child);
                        }
                        let mut entries = take;
                        entries.push((first_value.clone(), self.tail.apply(&folded)));
                        self.factory.node(key, entries, &self.factory.zero())
                    }
                } else {
                    // The key is absent below: bind it here.
                    let entries = vec![(first_value.clone(), self.tail.apply(input))];
                    self.factory
                        .node(first_key.clone(), entries, &self.factory.zero())
                }
            }
        }
    }

    fn cache(&self) -> &MorphismCache<Mfdd<K, V>> {
        &self.cache
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.assignments[0].0.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<Self>().map_or(false, |other| {
            self.assignments == other.assignments && self.factory.is_same(&other.factory)
        })
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.assignments.hash(&mut state);
        Rc::as_ptr(&self.factory.store).hash(&mut state);
    }
}

/// Drops every binding of the listed keys from every member.
struct RemoveKeys<K: Ord + Hash + Clone + 'static, V: Eq + Hash + Clone + 'static> {
    factory: MfddFactory<K, V>,
    /// Sorted, de-duplicated, non-empty.
    keys: Vec<K>,
    tail: MfddMorphism<K, V>,
    cache: MorphismCache<Mfdd<K, V>>,
}

impl<K, V> Morphism<Mfdd<K, V>> for RemoveKeys<K, V>
where
    K: Ord + Hash + Clone + 'static,
    V: Eq + Hash + Clone + 'static,
{
    fn transform(&self, this: &MfddMorphism<K, V>, input: &Mfdd<K, V>) -> Mfdd<K, V> {
        match input.view() {
            MfddView::Zero | MfddView::One => input.clone(),
            MfddView::Node { key, take, skip } => {
                let first = &self.keys[0];
                if key < *first {
                    let take = take
                        .into_iter()
                        .map(|(value, child)| (value, this.apply(&child)))
                        .collect();
                    self.factory.node(key, take, &this.apply(&skip))
                } else if key == *first {
                    // Unbinding merges every branch into the skip side.
                    let mut folded = skip;
                    for (_, child) in &take {
                        folded = folded.union(child);
                    }
                    self.tail.apply(&folded)
                } else {
                    self.tail.apply(input)
                }
            }
        }
    }

    fn cache(&self) -> &MorphismCache<Mfdd<K, V>> {
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
            self.keys == other.keys && self.factory.is_same(&other.factory)
        })
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.keys.hash(&mut state);
        Rc::as_ptr(&self.factory.store).hash(&mut state);
    }
}

/// What a value-list morphism does with the listed values at their key.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum ValueListKind {
    /// Drop only the listed bindings, folding their branches into skip.
    RemoveValues,
    /// Keep only members bound to one of the listed values.
    FilterContaining,
    /// Keep only members not bound to any of the listed values.
    FilterExcluding,
}

/// Removes or filters specific value bindings per key.
struct ValueList<K: Ord + Hash + Clone + 'static, V: Eq + Hash + Clone + 'static> {
    kind: ValueListKind,
    factory: MfddFactory<K, V>,
    /// Key-sorted, keys unique, value lists non-empty and de-duplicated.
    assignments: Vec<(K, Vec<V>)>,
    tail: MfddMorphism<K, V>,
    cache: MorphismCache<Mfdd<K, V>>,
}

impl<K, V> Morphism<Mfdd<K, V>> for ValueList<K, V>
where
    K: Ord + Hash + Clone + 'static,
    V: Eq + Hash + Clone + 'static,
{
    fn transform(&self, this: &MfddMorphism<K, V>, input: &Mfdd<K, V>) -> Mfdd<K, V> {
        match input.view() {
            MfddView::Zero => input.clone(),
            MfddView::One => match self.kind {
                // A required binding is absent from the empty map.
                ValueListKind::FilterContaining => self.factory.zero(),
                ValueListKind::RemoveValues | ValueListKind::FilterExcluding => input.clone(),
            },
            MfddView::Node { key, take, skip } => {
                let (first_key, values) = &self.assignments[0];
                if key < *first_key {
                    let take = take
                        .into_iter()
                        .map(|(value, child)| (value, this.apply(&child)))
                        .collect();
                    self.factory.node(key, take, &this.apply(&skip))
                } else if key == *first_key {
                    match self.kind {
                        ValueListKind::RemoveValues => {
                            let mut kept = Vec::with_capacity(take.len());
                            let mut folded = skip;
                            for (value, child) in take {
                                if values.contains(&value) {
                                    folded = folded.union(&child);
                                } else {
                                    kept.push((value, self.tail.apply(&child)));
                                }
                            }
                            self.factory.node(key, kept, &self.tail.apply(&folded))
                        }
                        ValueListKind::FilterContaining => {
                            let kept = take
                                .into_iter()
                                .filter(|(value, _)| values.contains(value))
                                .map(|(value, child)| (value, self.tail.apply(&child)))
                                .collect();
                            self.factory.node(key, kept, &self.factory.zero())
                        }
                        ValueListKind::FilterExcluding => {
                            let kept = take
                                .into_iter()
                                .filter(|(value, _)| !values.contains(value))
                                .map(|(value, child)| (value, self.tail.apply(&child)))
                                .collect();
                            self.factory.node(key, kept, &self.tail.apply(&skip))
                        }
                    }
                } else {
                    match self.kind {
                        ValueListKind::FilterContaining => self.factory.zero(),
                        ValueListKind::RemoveValues | ValueListKind::FilterExcluding => {
                            self.tail.apply(input)
                        }
                    }
                }
            }
        }
    }

    fn cache(&self) -> &MorphismCache<Mfdd<K, V>> {
        &self.cache
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.assignments[0].0.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<Self>().map_or(false, |other| {
            self.kind == other.kind
                && self.assignments == other.assignments
                && self.factory.is_same(&other.factory)
        })
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.kind.hash(&mut state);
        self.assignments.hash(&mut state);
        Rc::as_ptr(&self.factory.store).hash(&mut state);
    }
}

/// Rewrites every bound value through a caller-provided function.
///
/// The function must keep values distinct within each node's take map;
/// a collision trips the factory's duplicate-value assertion.
struct MapValues<K: Ord + Hash + Clone + 'static, V: Eq + Hash + Clone + 'static> {
    factory: MfddFactory<K, V>,
    map: Box<dyn Fn(&V) -> V>,
    cache: MorphismCache<Mfdd<K, V>>,
}

impl<K, V> Morphism<Mfdd<K, V>> for MapValues<K, V>
where
    K: Ord + Hash + Clone + 'static,
    V: Eq + Hash + Clone + 'static,
{
    fn transform(&self, this: &MfddMorphism<K, V>, input: &Mfdd<K, V>) -> Mfdd<K, V> {
        match input.view() {
            MfddView::Zero | MfddView::One => input.clone(),
            MfddView::Node { key, take, skip } => {
                let take = take
                    .into_iter()
                    .map(|(value, child)| ((self.map)(&value), this.apply(&child)))
                    .collect();
                self.factory.node(key, take, &this.apply(&skip))
            }
        }
    }

    fn cache(&self) -> &MorphismCache<Mfdd<K, V>> {
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

/// Generalized structural recursion over take-map entries.
struct Inductive<K: Ord + Hash + Clone + 'static, V: Eq + Hash + Clone + 'static> {
    factory: MfddFactory<K, V>,
    substitute: Mfdd<K, V>,
    step: MfddInductiveStep<K, V>,
    cache: MorphismCache<Mfdd<K, V>>,
}

impl<K, V> Morphism<Mfdd<K, V>> for Inductive<K, V>
where
    K: Ord + Hash + Clone + 'static,
    V: Eq + Hash + Clone + 'static,
{
    fn transform(&self, this: &MfddMorphism<K, V>, input: &Mfdd<K, V>) -> Mfdd<K, V> {
        match input.view() {
            MfddView::Zero => input.clone(),
            MfddView::One => self.substitute.clone(),
            MfddView::Node { key, take, skip } => {
                let (take_steps, skip_step) = (self.step)(this, input);
                let mut entries = take;
                for (value, morphism) in take_steps {
                    match entries.iter_mut().find(|(v, _)| *v == value) {
                        Some((_, child)) => *child = morphism.apply(child),
                        // Unbound value: the morphism may introduce it.
                        None => entries.push((value.clone(), morphism.apply(&self.factory.zero()))),
                    }
                }
                self.factory.node(key, entries, &skip_step.apply(&skip))
            }
        }
    }

    fn cache(&self) -> &MorphismCache<Mfdd<K, V>> {
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

/// Pushes a morphism below every key it cannot touch. See the SFDD
/// counterpart for the shape; MFDD saturation additionally rides down
/// every take-map entry.
struct Saturated<K: Ord + Hash + Clone + 'static, V: Eq + Hash + Clone + 'static> {
    factory: MfddFactory<K, V>,
    lowest: K,
    inner: MfddMorphism<K, V>,
    cache: MorphismCache<Mfdd<K, V>>,
}

impl<K, V> Morphism<Mfdd<K, V>> for Saturated<K, V>
where
    K: Ord + Hash + Clone + 'static,
    V: Eq + Hash + Clone + 'static,
{
    fn transform(&self, this: &MfddMorphism<K, V>, input: &Mfdd<K, V>) -> Mfdd<K, V> {
        match input.view() {
            MfddView::Node { key, take, skip } if key < self.lowest => {
                let take = take
                    .into_iter()
                    .map(|(value, child)| (value, this.apply(&child)))
                    .collect();
                self.factory.node(key, take, &this.apply(&skip))
            }
            _ => self.inner.apply(input),
        }
    }

    fn cache(&self) -> &MorphismCache<Mfdd<K, V>> {
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

/// Morphism factory for one MFDD factory.
///
/// Construction goes through this factory so structurally equal morphisms
/// resolve to one interned instance and share their cache. Closure-carrying
/// morphisms (`map_values`, `inductive`) compare by identity and are
/// always fresh.
pub struct MfddMorphisms<K: Ord + Hash + Clone + 'static, V: Eq + Hash + Clone + 'static> {
    factory: MfddFactory<K, V>,
    pool: MorphismPool<Mfdd<K, V>>,
}

impl<K, V> MfddMorphisms<K, V>
where
    K: Ord + Hash + Clone + 'static,
    V: Eq + Hash + Clone + 'static,
{
    pub fn new(factory: &MfddFactory<K, V>) -> Self {
        Self {
            factory: factory.clone(),
            pool: MorphismPool::new(),
        }
    }

    /// The factory whose families these morphisms transform.
    pub fn factory(&self) -> &MfddFactory<K, V> {
        &self.factory
    }

    /// Number of distinct interned morphisms.
    pub fn interned_count(&self) -> usize {
        self.pool.len()
    }

    pub fn identity(&self) -> MfddMorphism<K, V> {
        self.pool.identity()
    }

    pub fn constant(&self, value: Mfdd<K, V>) -> MfddMorphism<K, V> {
        assert!(
            self.factory.is_same(&value.factory),
            "family handle belongs to a different factory"
        );
        self.pool.constant(value)
    }

    pub fn union(&self, lhs: MfddMorphism<K, V>, rhs: MfddMorphism<K, V>) -> MfddMorphism<K, V> {
        self.pool.union(lhs, rhs)
    }

    pub fn union_many(&self, operands: Vec<MfddMorphism<K, V>>) -> MfddMorphism<K, V> {
        self.pool.union_many(operands)
    }

    pub fn intersection(
        &self,
        lhs: MfddMorphism<K, V>,
        rhs: MfddMorphism<K, V>,
    ) -> MfddMorphism<K, V> {
        self.pool.intersection(lhs, rhs)
    }

    pub fn intersection_many(&self, operands: Vec<MfddMorphism<K, V>>) -> MfddMorphism<K, V> {
        self.pool.intersection_many(operands)
    }

    pub fn symmetric_difference(
        &self,
        lhs: MfddMorphism<K, V>,
        rhs: MfddMorphism<K, V>,
    ) -> MfddMorphism<K, V> {
        self.pool.symmetric_difference(lhs, rhs)
    }

    pub fn symmetric_difference_many(
        &self,
        operands: Vec<MfddMorphism<K, V>>,
    ) -> MfddMorphism<K, V> {
        self.pool.symmetric_difference_many(operands)
    }

    pub fn subtraction(
        &self,
        minuend: MfddMorphism<K, V>,
        subtrahend: MfddMorphism<K, V>,
    ) -> MfddMorphism<K, V> {
        self.pool.subtraction(minuend, subtrahend)
    }

    pub fn composition(
        &self,
        outer: MfddMorphism<K, V>,
        inner: MfddMorphism<K, V>,
    ) -> MfddMorphism<K, V> {
        self.pool.composition(outer, inner)
    }

    /// N-ary composition; operands apply right to left.
    pub fn composition_many(&self, operands: Vec<MfddMorphism<K, V>>) -> MfddMorphism<K, V> {
        self.pool.composition_many(operands)
    }

    pub fn fixed_point(&self, body: MfddMorphism<K, V>) -> MfddMorphism<K, V> {
        self.pool.fixed_point(body)
    }

    /// Adds a binding for every listed key to every member.
    pub fn insert<I: IntoIterator<Item = (K, V)>>(&self, assignments: I) -> MfddMorphism<K, V> {
        let mut assignments: Vec<(K, V)> = assignments.into_iter().collect();
        assignments.sort_by(|a, b| a.0.cmp(&b.0));
        assert!(!assignments.is_empty(), "assignment list cannot be empty");
        for window in assignments.windows(2) {
            assert!(window[0].0 != window[1].0, "duplicate key in assignments");
        }
        self.insert_chain(assignments)
    }

    /// Drops every binding of the listed keys from every member.
    pub fn remove_keys<I: IntoIterator<Item = K>>(&self, keys: I) -> MfddMorphism<K, V> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();
        assert!(!keys.is_empty(), "key list cannot be empty");
        self.remove_keys_chain(keys)
    }

    /// Drops only the listed value bindings for each key.
    pub fn remove_values<I>(&self, assignments: I) -> MfddMorphism<K, V>
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
    {
        self.value_list(ValueListKind::RemoveValues, assignments)
    }

    /// Keeps only members whose binding at each listed key is allowed.
    pub fn filter_containing<I>(&self, assignments: I) -> MfddMorphism<K, V>
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
    {
        self.value_list(ValueListKind::FilterContaining, assignments)
    }

    /// Keeps only members not bound to any listed value at each key.
    pub fn filter_excluding<I>(&self, assignments: I) -> MfddMorphism<K, V>
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
    {
        self.value_list(ValueListKind::FilterExcluding, assignments)
    }

    /// Rewrites every bound value through `map`, which must keep values
    /// distinct within each node.
    pub fn map_values<F: Fn(&V) -> V + 'static>(&self, map: F) -> MfddMorphism<K, V> {
        self.pool.intern(MorphismRef::new(MapValues {
            factory: self.factory.clone(),
            map: Box::new(map),
            cache: MorphismCache::new(),
        }))
    }

    /// Generalized recursion; `substitute` replaces `one` and defaults to
    /// `one` when absent.
    pub fn inductive<F>(&self, substitute: Option<Mfdd<K, V>>, step: F) -> MfddMorphism<K, V>
    where
        F: Fn(
                &MfddMorphism<K, V>,
                &Mfdd<K, V>,
            ) -> (Vec<(V, MfddMorphism<K, V>)>, MfddMorphism<K, V>)
            + 'static,
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
    pub fn saturated(&self, inner: MfddMorphism<K, V>, lowest: K) -> MfddMorphism<K, V> {
        self.pool.intern(MorphismRef::new(Saturated {
            factory: self.factory.clone(),
            lowest,
            inner,
            cache: MorphismCache::new(),
        }))
    }

    /// Saturates a morphism at its advertised lowest relevant key.
    pub fn saturate(&self, inner: &MfddMorphism<K, V>) -> MfddMorphism<K, V> {
        let lowest = inner
            .lowest_relevant_key()
            .expect("morphism does not advertise a lowest relevant key");
        self.saturated(inner.clone(), lowest)
    }

    fn insert_chain(&self, assignments: Vec<(K, V)>) -> MfddMorphism<K, V> {
        let tail = if assignments.len() == 1 {
            self.identity()
        } else {
            self.insert_chain(assignments[1..].to_vec())
        };
        self.pool.intern(MorphismRef::new(Insert {
            factory: self.factory.clone(),
            assignments,
            tail,
            cache: MorphismCache::new(),
        }))
    }

    fn remove_keys_chain(&self, keys: Vec<K>) -> MfddMorphism<K, V> {
        let tail = if keys.len() == 1 {
            self.identity()
        } else {
            self.remove_keys_chain(keys[1..].to_vec())
        };
        self.pool.intern(MorphismRef::new(RemoveKeys {
            factory: self.factory.clone(),
            keys,
            tail,
            cache: MorphismCache::new(),
        }))
    }

    fn value_list<I>(&self, kind: ValueListKind, assignments: I) -> MfddMorphism<K, V>
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
    {
        let mut assignments: Vec<(K, Vec<V>)> = assignments.into_iter().collect();
        assignments.sort_by(|a, b| a.0.cmp(&b.0));
        assert!(!assignments.is_empty(), "assignment list cannot be empty");
        for window in assignments.windows(2) {
            assert!(window[0].0 != window[1].0, "duplicate key in assignments");
        }
        for (_, values) in &mut assignments {
            let mut unique: Vec<V> = Vec::with_capacity(values.len());
            for value in values.drain(..) {
                if !unique.contains(&value) {
                    unique.push(value);
                }
            }
            assert!(!unique.is_empty(), "value list cannot be empty");
            *values = unique;
        }
        self.value_list_chain(kind, assignments)
    }

    fn value_list_chain(
        &self,
        kind: ValueListKind,
        assignments: Vec<(K, Vec<V>)>,
    ) -> MfddMorphism<K, V> {
        let tail = if assignments.len() == 1 {
            self.identity()
        } else {
            self.value_list_chain(kind, assignments[1..].to_vec())
        };
        self.pool.intern(MorphismRef::new(ValueList {
            kind,
            factory: self.factory.clone(),
            assignments,
            tail,
            cache: MorphismCache::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (
        MfddFactory<u32, &'static str>,
        MfddMorphisms<u32, &'static str>,
    ) {
        let factory = MfddFactory::new();
        let morphisms = MfddMorphisms::new(&factory);
        (factory, morphisms)
    }

    #[test]
    fn insert_binds_missing_keys() {
        let (f, m) = setup();
        let insert = m.insert([(2u32, "b"), (5, "e")]);

        assert_eq!(insert.apply(&f.zero()), f.zero());
        assert_eq!(
            insert.apply(&f.one()),
            f.encode([vec![(2u32, "b"), (5, "e")]])
        );

        let family = f.encode([vec![(1u32, "a")], vec![(3, "c")]]);
        let expected = f.encode([
            vec![(1u32, "a"), (2, "b"), (5, "e")],
            vec![(2, "b"), (3, "c"), (5, "e")],
        ]);
        assert_eq!(insert.apply(&family), expected);
    }

    #[test]
    fn insert_on_the_bound_value_absorbs_the_skip_branch() {
        let (f, m) = setup();
        let insert = m.insert([(1u32, "x")]);

        // Members bound to "x" and members unbound at key 1 merge.
        let family = f.encode([vec![(1u32, "x"), (2, "p")], vec![(2, "q")]]);
        let expected = f.encode([
            vec![(1u32, "x"), (2, "p")],
            vec![(1, "x"), (2, "q")],
        ]);
        assert_eq!(insert.apply(&family), expected);
    }

    #[test]
    fn insert_leaves_conflicting_bindings_untouched() {
        let (f, m) = setup();
        let insert = m.insert([(1u32, "x")]);

        let family = f.encode([vec![(1u32, "y")], vec![(2, "q")]]);
        // The member bound to "y" passes through; the unbound member is
        // folded under the fresh "x" entry together with the "y" branch.
        let applied = insert.apply(&family);
        assert!(applied.contains([(1u32, "y")]));
        assert!(applied.contains([(1u32, "x"), (2, "q")]));
        assert!(applied.contains([(1u32, "x")]));
        assert_eq!(applied.count(), 3);
    }

    #[test]
    fn remove_keys_unbinds_everywhere() {
        let (f, m) = setup();
        let remove = m.remove_keys([3u32]);

        assert_eq!(remove.apply(&f.one()), f.one());

        let family = f.encode([
            vec![(1u32, "a"), (3, "c")],
            vec![(3, "d")],
            vec![(5, "e")],
        ]);
        let expected = f.encode([vec![(1u32, "a")], vec![], vec![(5, "e")]]);
        assert_eq!(remove.apply(&family), expected);
    }

    #[test]
    fn remove_values_drops_only_listed_bindings() {
        let (f, m) = setup();
        let remove = m.remove_values([(1u32, vec!["x"])]);

        let family = f.encode([
            vec![(1u32, "x"), (2, "p")],
            vec![(1, "y"), (2, "q")],
            vec![(2, "r")],
        ]);
        let expected = f.encode([
            vec![(2u32, "p")],
            vec![(1, "y"), (2, "q")],
            vec![(2, "r")],
        ]);
        assert_eq!(remove.apply(&family), expected);
    }

    #[test]
    fn filter_containing_requires_allowed_bindings() {
        let (f, m) = setup();
        let filter = m.filter_containing([(1u32, vec!["x", "y"])]);

        assert_eq!(filter.apply(&f.one()), f.zero());

        let family = f.encode([
            vec![(1u32, "x")],
            vec![(1, "y"), (2, "q")],
            vec![(1, "z")],
            vec![(2, "r")],
        ]);
        let expected = f.encode([vec![(1u32, "x")], vec![(1, "y"), (2, "q")]]);
        assert_eq!(filter.apply(&family), expected);
    }

    #[test]
    fn filter_excluding_drops_denied_bindings() {
        let (f, m) = setup();
        let filter = m.filter_excluding([(1u32, vec!["x"])]);

        assert_eq!(filter.apply(&f.one()), f.one());

        let family = f.encode([
            vec![(1u32, "x")],
            vec![(1, "y")],
            vec![(2, "r")],
            vec![],
        ]);
        let expected = f.encode([vec![(1u32, "y")], vec![(2, "r")], vec![]]);
        assert_eq!(filter.apply(&family), expected);
    }

    #[test]
    fn map_values_rewrites_bindings() {
        let (f, m) = setup();
        let rename = m.map_values(|value: &&str| if *value == "x" { "X" } else { *value });

        let family = f.encode([vec![(1u32, "x"), (2, "y")], vec![(2, "x")]]);
        let expected = f.encode([vec![(1u32, "X"), (2, "y")], vec![(2, "X")]]);
        assert_eq!(rename.apply(&family), expected);
    }

    #[test]
    fn inductive_keeps_unmentioned_values() {
        let (f, m) = setup();
        let drop_x = m.constant(f.zero());
        // Remove members bound to "x" at any key; keep everything else.
        let prune = m.inductive(None, move |this, _| {
            (vec![("x", drop_x.clone())], this.clone())
        });

        let family = f.encode([
            vec![(1u32, "x")],
            vec![(1, "y")],
            vec![(2, "x")],
            vec![],
        ]);
        assert_eq!(prune.apply(&family), f.encode([vec![(1u32, "y")], vec![]]));
    }

    #[test]
    fn inductive_can_introduce_bindings() {
        let (f, m) = setup();
        let one = f.one();
        let add_w = m.constant(one);
        // At every node, add a "w" branch holding the empty tail.
        let widen = m.inductive(None, move |this, _| {
            (vec![("w", add_w.clone())], this.clone())
        });

        let family = f.encode([vec![(1u32, "y")]]);
        let applied = widen.apply(&family);
        assert!(applied.contains([(1u32, "y")]));
        assert!(applied.contains([(1u32, "w")]));
        assert_eq!(applied.count(), 2);
    }

    #[test]
    fn assignment_morphisms_intern_by_content() {
        let (_, m) = setup();
        let a = m.insert([(2u32, "b"), (1, "a")]);
        let b = m.insert([(1u32, "a"), (2, "b")]);
        assert!(a.shares_instance(&b));

        let c = m.remove_keys([1u32, 2]);
        assert!(!a.shares_instance(&c));

        let p = m.filter_containing([(1u32, vec!["a"])]);
        let q = m.filter_containing([(1u32, vec!["a", "a"])]);
        assert!(p.shares_instance(&q));
    }

    #[test]
    fn saturation_preserves_semantics() {
        let (f, m) = setup();
        let insert = m.insert([(5u32, "e")]);
        let saturated = m.saturate(&insert);
        assert_eq!(saturated.lowest_relevant_key(), Some(5));

        let family = f.encode([
            vec![(1u32, "a"), (7, "g")],
            vec![(2, "b"), (3, "c")],
            vec![],
            vec![(6, "f")],
        ]);
        assert_eq!(saturated.apply(&family), insert.apply(&family));
        assert_eq!(saturated.apply(&f.zero()), insert.apply(&f.zero()));
        assert_eq!(saturated.apply(&f.one()), insert.apply(&f.one()));
    }

    #[test]
    #[should_panic(expected = "duplicate key in assignments")]
    fn duplicate_assignment_keys_panic() {
        let (_, m) = setup();
        let _ = m.insert([(1u32, "a"), (1, "b")]);
    }

    #[test]
    #[should_panic(expected = "assignment list cannot be empty")]
    fn empty_assignment_list_panics() {
        let (_, m) = setup();
        let _ = m.insert(Vec::<(u32, &str)>::new());
    }

    #[test]
    #[should_panic(expected = "value list cannot be empty")]
    fn empty_value_list_panics() {
        let (_, m) = setup();
        let _ = m.remove_values([(1u32, Vec::<&str>::new())]);
    }
}
