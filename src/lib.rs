//! Canonical set-family and map-family decision diagrams.
//!
//! `famdd` represents very large collections of sets ([`sfdd`]) or of
//! key-to-value maps ([`mfdd`]) as hash-consed DAGs with two terminals,
//! so that structurally equal families share one node and handle equality
//! is semantic equality. On top of the shared representation it provides:
//!
//! * a set algebra (union, intersection, symmetric difference,
//!   subtraction, n-ary variants) memoized per operation,
//! * queries without enumeration: counting, membership, subset tests,
//!   iteration, random sampling,
//! * [`morphism`]s: first-class, cached, composable transformations that
//!   rewrite whole families handle-to-handle, with a saturation
//!   optimization that pushes a transformation below the keys it cannot
//!   touch.
//!
//! Factories are single-threaded; independent factories are independent
//! and may live on different threads.

pub mod arena;
pub mod mfdd;
pub mod morphism;
pub mod sfdd;

pub use arena::{NodeId, DEFAULT_BUCKET_CAPACITY};
pub use mfdd::{Mfdd, MfddFactory, MfddMembers, MfddMorphism, MfddMorphisms, MfddView};
pub use morphism::{Family, Morphism, MorphismCache, MorphismPool, MorphismRef};
pub use sfdd::{Sfdd, SfddFactory, SfddMembers, SfddMorphism, SfddMorphisms, SfddView};

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        assert_eq!(2 + 2, 4);
    }
}

/// Add README.md rust code to testing.
#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
