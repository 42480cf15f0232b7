//! Generic morphism framework.
//!
//! A morphism is a structure-preserving transformation over decision diagram
//! families, applied handle-to-handle without enumerating members. Every
//! morphism instance owns a cache from input handle to output handle, so a
//! morphism applied twice to the same family is free the second time, and
//! shared subgraphs are transformed once.
//!
//! The framework is generic over any [`Family`]: the combinators in this
//! module (identity, constant, the set connectives, composition, fixed
//! point) only need the family algebra, while key-aware morphisms live with
//! their diagram kind. [`MorphismRef`] is the type-erased wrapper that lets
//! heterogeneous morphisms compose and share containers, and
//! [`MorphismPool`] interns morphisms by structural content so equal
//! morphisms share one cache.

use std::any::Any;
use std::any::TypeId;
use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

/// The family algebra a combinator needs from a decision diagram handle.
///
/// Implementors are cheap-to-clone handles whose equality is canonical:
/// two handles compare equal exactly when they denote the same family.
pub trait Family: Clone + Eq + Hash + 'static {
    /// Ordered key domain of the family's members.
    type Key: Ord + Clone;

    fn union(&self, other: &Self) -> Self;
    fn intersection(&self, other: &Self) -> Self;
    fn symmetric_difference(&self, other: &Self) -> Self;
    fn subtracting(&self, other: &Self) -> Self;
}

/// Per-instance application cache, mapping input handle to output handle.
pub struct MorphismCache<F: Family> {
    map: RefCell<AHashMap<F, F>>,
}

impl<F: Family> MorphismCache<F> {
    pub fn new() -> Self {
        Self {
            map: RefCell::new(AHashMap::new()),
        }
    }

    /// Number of memoized applications.
    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }

    fn lookup(&self, input: &F) -> Option<F> {
        self.map.borrow().get(input).cloned()
    }

    fn store(&self, input: F, output: F) {
        self.map.borrow_mut().insert(input, output);
    }
}

impl<F: Family> Default for MorphismCache<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// A cached transformation over families of kind `F`.
///
/// Implementors provide one uncached rewriting step; [`MorphismRef::apply`]
/// wraps it with the per-instance cache. Equality and hashing are forwarded
/// through `dyn`-methods so type-erased morphisms can be interned and
/// compared: structural for parameterized morphisms, identity-based where
/// the parameters are closures and semantic equality is undecidable.
pub trait Morphism<F: Family>: 'static {
    /// One uncached rewriting step.
    ///
    /// `this` is the type-erased wrapper of `self`; recursive morphisms
    /// apply `this` to child handles so the recursion re-enters this
    /// instance's cache.
    fn transform(&self, this: &MorphismRef<F>, input: &F) -> F;

    /// The instance's application cache.
    fn cache(&self) -> &MorphismCache<F>;

    /// Smallest key this morphism can inspect or produce, when it has one.
    ///
    /// Every node whose key is strictly below this commutes with the
    /// morphism, which is what saturation exploits.
    fn lowest_relevant_key(&self) -> Option<F::Key> {
        None
    }

    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn Any) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

/// Type-erased, cheaply cloneable morphism handle.
///
/// Forwards application, equality, and hashing to the boxed morphism, so
/// heterogeneous morphisms can be stored in homogeneous containers and
/// compared for interning.
pub struct MorphismRef<F: Family> {
    inner: Rc<dyn Morphism<F>>,
}

impl<F: Family> MorphismRef<F> {
    pub fn new<M: Morphism<F>>(morphism: M) -> Self {
        Self {
            inner: Rc::new(morphism),
        }
    }

    /// Applies the morphism to a family, consulting the instance cache.
    pub fn apply(&self, input: &F) -> F {
        if let Some(found) = self.inner.cache().lookup(input) {
            return found;
        }
        let output = self.inner.transform(self, input);
        self.inner.cache().store(input.clone(), output.clone());
        output
    }

    /// See [`Morphism::lowest_relevant_key`].
    pub fn lowest_relevant_key(&self) -> Option<F::Key> {
        self.inner.lowest_relevant_key()
    }

    /// Downcasts to a concrete morphism type.
    pub fn downcast_ref<M: Morphism<F>>(&self) -> Option<&M> {
        self.inner.as_any().downcast_ref::<M>()
    }

    /// True if both refs share the same underlying instance (and cache).
    pub fn shares_instance(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<F: Family> Clone for MorphismRef<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<F: Family> PartialEq for MorphismRef<F> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner) || self.inner.dyn_eq(other.inner.as_any())
    }
}

impl<F: Family> Eq for MorphismRef<F> {}

impl<F: Family> std::fmt::Debug for MorphismRef<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MorphismRef")
            .field("inner", &Rc::as_ptr(&self.inner))
            .finish()
    }
}

impl<F: Family> Hash for MorphismRef<F> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.dyn_hash(state);
    }
}

////////////////////////////
// Generic combinators    //
////////////////////////////

/// apply(x) = x.
struct Identity<F: Family> {
    cache: MorphismCache<F>,
}

impl<F: Family> Morphism<F> for Identity<F> {
    fn transform(&self, _this: &MorphismRef<F>, input: &F) -> F {
        input.clone()
    }

    fn cache(&self) -> &MorphismCache<F> {
        &self.cache
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.is::<Self>()
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
    }
}

/// apply(x) = value, for every x.
struct Constant<F: Family> {
    value: F,
    cache: MorphismCache<F>,
}

impl<F: Family> Morphism<F> for Constant<F> {
    fn transform(&self, _this: &MorphismRef<F>, _input: &F) -> F {
        self.value.clone()
    }

    fn cache(&self) -> &MorphismCache<F> {
        &self.cache
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<Self>()
            .map_or(false, |other| self.value == other.value)
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.value.hash(&mut state);
    }
}

/// How a connective folds its operand results.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum ConnectiveKind {
    Union,
    Intersection,
    SymmetricDifference,
}

/// apply(x) = fold of every operand's result under one set connective.
struct Connective<F: Family> {
    kind: ConnectiveKind,
    operands: Vec<MorphismRef<F>>,
    cache: MorphismCache<F>,
}

impl<F: Family> Morphism<F> for Connective<F> {
    fn transform(&self, _this: &MorphismRef<F>, input: &F) -> F {
        let mut results = self.operands.iter().map(|operand| operand.apply(input));
        let first = results.next().expect("connective has at least one operand");
        results.fold(first, |folded, next| match self.kind {
            ConnectiveKind::Union => folded.union(&next),
            ConnectiveKind::Intersection => folded.intersection(&next),
            ConnectiveKind::SymmetricDifference => folded.symmetric_difference(&next),
        })
    }

    fn cache(&self) -> &MorphismCache<F> {
        &self.cache
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        lowest_over(&self.operands)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<Self>()
            .map_or(false, |other| self.kind == other.kind && self.operands == other.operands)
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.kind.hash(&mut state);
        self.operands.hash(&mut state);
    }
}

/// apply(x) = minuend(x) ∖ subtrahend(x).
struct Subtraction<F: Family> {
    minuend: MorphismRef<F>,
    subtrahend: MorphismRef<F>,
    cache: MorphismCache<F>,
}

impl<F: Family> Morphism<F> for Subtraction<F> {
    fn transform(&self, _this: &MorphismRef<F>, input: &F) -> F {
        self.minuend.apply(input).subtracting(&self.subtrahend.apply(input))
    }

    fn cache(&self) -> &MorphismCache<F> {
        &self.cache
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        lowest_over(&[self.minuend.clone(), self.subtrahend.clone()])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<Self>().map_or(false, |other| {
            self.minuend == other.minuend && self.subtrahend == other.subtrahend
        })
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.minuend.hash(&mut state);
        self.subtrahend.hash(&mut state);
    }
}

/// apply(x) = operands[0](operands[1](… operands[n-1](x))).
/// Operands apply right to left.
struct Composition<F: Family> {
    operands: Vec<MorphismRef<F>>,
    cache: MorphismCache<F>,
}

impl<F: Family> Morphism<F> for Composition<F> {
    fn transform(&self, _this: &MorphismRef<F>, input: &F) -> F {
        let mut current = input.clone();
        for operand in self.operands.iter().rev() {
            current = operand.apply(&current);
        }
        current
    }

    fn cache(&self) -> &MorphismCache<F> {
        &self.cache
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        lowest_over(&self.operands)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<Self>()
            .map_or(false, |other| self.operands == other.operands)
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.operands.hash(&mut state);
    }
}

/// apply(x) = the first member of x, body(x), body(body(x)), … that the
/// next application leaves unchanged.
struct FixedPoint<F: Family> {
    body: MorphismRef<F>,
    cache: MorphismCache<F>,
}

impl<F: Family> Morphism<F> for FixedPoint<F> {
    fn transform(&self, _this: &MorphismRef<F>, input: &F) -> F {
        let mut seen = Vec::new();
        let mut current = input.clone();
        loop {
            let next = self.body.apply(&current);
            if next == current {
                break;
            }
            seen.push(current);
            current = next;
        }
        // Every intermediate iterate reaches the same fixed point.
        for stage in seen {
            self.cache.store(stage, current.clone());
        }
        current
    }

    fn cache(&self) -> &MorphismCache<F> {
        &self.cache
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        self.body.lowest_relevant_key()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<Self>()
            .map_or(false, |other| self.body == other.body)
    }

    fn dyn_hash(&self, state: &mut dyn Hasher) {
        let mut state = state;
        TypeId::of::<Self>().hash(&mut state);
        self.body.hash(&mut state);
    }
}

/// Minimum advertised key over a set of operands, when all advertise one.
fn lowest_over<F: Family>(operands: &[MorphismRef<F>]) -> Option<F::Key> {
    let mut lowest: Option<F::Key> = None;
    for operand in operands {
        let key = operand.lowest_relevant_key()?;
        lowest = match lowest {
            Some(current) if current <= key => Some(current),
            _ => Some(key),
        };
    }
    lowest
}

/// Interning table and constructor surface for the generic combinators.
///
/// Structurally equal morphisms resolve to one shared instance, so their
/// caches are shared too. Each diagram kind's morphism factory owns one
/// pool and layers its key-aware constructors on top.
pub struct MorphismPool<F: Family> {
    interned: RefCell<AHashSet<MorphismRef<F>>>,
}

impl<F: Family> MorphismPool<F> {
    pub fn new() -> Self {
        Self {
            interned: RefCell::new(AHashSet::new()),
        }
    }

    /// Number of distinct interned morphisms.
    pub fn len(&self) -> usize {
        self.interned.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interned.borrow().is_empty()
    }

    /// Resolves a morphism to its canonical shared instance.
    pub fn intern(&self, morphism: MorphismRef<F>) -> MorphismRef<F> {
        let mut interned = self.interned.borrow_mut();
        if let Some(found) = interned.get(&morphism) {
            return found.clone();
        }
        interned.insert(morphism.clone());
        morphism
    }

    /// The identity morphism.
    pub fn identity(&self) -> MorphismRef<F> {
        self.intern(MorphismRef::new(Identity {
            cache: MorphismCache::new(),
        }))
    }

    /// The morphism mapping every family to `value`.
    pub fn constant(&self, value: F) -> MorphismRef<F> {
        self.intern(MorphismRef::new(Constant {
            value,
            cache: MorphismCache::new(),
        }))
    }

    pub fn union(&self, lhs: MorphismRef<F>, rhs: MorphismRef<F>) -> MorphismRef<F> {
        self.union_many(vec![lhs, rhs])
    }

    pub fn union_many(&self, operands: Vec<MorphismRef<F>>) -> MorphismRef<F> {
        self.connective(ConnectiveKind::Union, operands)
    }

    pub fn intersection(&self, lhs: MorphismRef<F>, rhs: MorphismRef<F>) -> MorphismRef<F> {
        self.intersection_many(vec![lhs, rhs])
    }

    pub fn intersection_many(&self, operands: Vec<MorphismRef<F>>) -> MorphismRef<F> {
        self.connective(ConnectiveKind::Intersection, operands)
    }

    pub fn symmetric_difference(&self, lhs: MorphismRef<F>, rhs: MorphismRef<F>) -> MorphismRef<F> {
        self.symmetric_difference_many(vec![lhs, rhs])
    }

    pub fn symmetric_difference_many(&self, operands: Vec<MorphismRef<F>>) -> MorphismRef<F> {
        self.connective(ConnectiveKind::SymmetricDifference, operands)
    }

    pub fn subtraction(&self, minuend: MorphismRef<F>, subtrahend: MorphismRef<F>) -> MorphismRef<F> {
        self.intern(MorphismRef::new(Subtraction {
            minuend,
            subtrahend,
            cache: MorphismCache::new(),
        }))
    }

    pub fn composition(&self, outer: MorphismRef<F>, inner: MorphismRef<F>) -> MorphismRef<F> {
        self.composition_many(vec![outer, inner])
    }

    /// N-ary composition; operands apply right to left.
    pub fn composition_many(&self, operands: Vec<MorphismRef<F>>) -> MorphismRef<F> {
        assert!(!operands.is_empty(), "composition needs at least one operand");
        if operands.len() == 1 {
            return operands.into_iter().next().unwrap();
        }
        self.intern(MorphismRef::new(Composition {
            operands,
            cache: MorphismCache::new(),
        }))
    }

    /// Iterates `body` from the input until the handle stops changing.
    pub fn fixed_point(&self, body: MorphismRef<F>) -> MorphismRef<F> {
        self.intern(MorphismRef::new(FixedPoint {
            body,
            cache: MorphismCache::new(),
        }))
    }

    fn connective(&self, kind: ConnectiveKind, operands: Vec<MorphismRef<F>>) -> MorphismRef<F> {
        assert!(!operands.is_empty(), "connective needs at least one operand");
        if operands.len() == 1 {
            return operands.into_iter().next().unwrap();
        }
        self.intern(MorphismRef::new(Connective {
            kind,
            operands,
            cache: MorphismCache::new(),
        }))
    }
}

impl<F: Family> Default for MorphismPool<F> {
    fn default() -> Self {
        Self::new()
    }
}
