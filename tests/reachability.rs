//! Petri-net reachability over map families.
//!
//! A 7-place, 10-transition token pipeline: places 0..7 hold
//! indistinguishable tokens, six transitions move a token one place
//! forward, four move one back. Markings are maps from place to token
//! count; each transition is the union over token-count pairs of a
//! guarded update (filter on the current counts, unbind them, bind the
//! successor counts), saturated at its lowest touched place. The
//! reachable set is the fixed point of identity joined with every
//! transition.
//!
//! From `p0 ↦ n` every distribution of n tokens over the 7 places is
//! reachable, so the reachable count is C(n + 6, 6).

use famdd::{Mfdd, MfddFactory, MfddMorphism, MfddMorphisms};

const PLACES: u32 = 7;

/// The ten (source, target) token moves.
fn transitions() -> Vec<(u32, u32)> {
    let mut moves = Vec::new();
    for place in 0..PLACES - 1 {
        moves.push((place, place + 1));
    }
    for place in 0..4 {
        moves.push((place + 1, place));
    }
    moves
}

/// Rewrites `place ↦ from` to `place ↦ to`, everywhere the guard holds.
fn retoken(
    morphisms: &MfddMorphisms<u32, u32>,
    place: u32,
    from: u32,
    to: u32,
) -> MfddMorphism<u32, u32> {
    morphisms.composition_many(vec![
        morphisms.insert([(place, to)]),
        morphisms.remove_values([(place, vec![from])]),
        morphisms.filter_containing([(place, vec![from])]),
    ])
}

/// One token moves from `source` to `target`: decrement then increment,
/// each the union of per-count guarded updates, saturated per branch.
fn move_token(
    morphisms: &MfddMorphisms<u32, u32>,
    source: u32,
    target: u32,
    tokens: u32,
) -> MfddMorphism<u32, u32> {
    let decrement = morphisms.union_many(
        (1..=tokens)
            .map(|count| morphisms.saturate(&retoken(morphisms, source, count, count - 1)))
            .collect(),
    );
    let increment = morphisms.union_many(
        (0..tokens)
            .map(|count| morphisms.saturate(&retoken(morphisms, target, count, count + 1)))
            .collect(),
    );
    morphisms.composition(increment, decrement)
}

/// Reachability set from the marking `p0 ↦ tokens`, other places empty.
fn reachable(tokens: u32) -> Mfdd<u32, u32> {
    let factory = MfddFactory::<u32, u32>::new();
    let morphisms = MfddMorphisms::new(&factory);

    let mut body = vec![morphisms.identity()];
    for (source, target) in transitions() {
        body.push(move_token(&morphisms, source, target, tokens));
    }
    let step = morphisms.union_many(body);
    let closure = morphisms.fixed_point(step);

    let initial = factory.encode_member(
        (0..PLACES).map(|place| (place, if place == 0 { tokens } else { 0 })),
    );
    closure.apply(&initial)
}

/// C(n + 6, 6): distributions of n tokens over seven places.
fn distributions(n: u64) -> u64 {
    let mut result = 1u64;
    for i in 1..=6 {
        result = result * (n + i) / i;
    }
    result
}

#[test]
fn single_token_reaches_every_place() {
    let reached = reachable(1);
    assert_eq!(reached.count(), 7);
    assert!(reached.contains((0..PLACES).map(|p| (p, u32::from(p == 6)))));
}

#[test]
fn two_tokens_reach_every_distribution() {
    assert_eq!(reachable(2).count(), distributions(2));
    assert_eq!(distributions(2), 28);
}

#[test]
fn twenty_four_tokens_reach_a_reproducible_state_count() {
    let reached = reachable(24);
    assert_eq!(distributions(24), 593_775);
    assert_eq!(reached.count(), 593_775);

    // The computation is reproducible across runs.
    let again = reachable(24);
    assert_eq!(again.count(), 593_775);
}
