//! Set-family morphism scenarios and laws.

use rand::prelude::*;

use famdd::{Sfdd, SfddFactory, SfddMorphisms};

fn random_family(factory: &SfddFactory<u32>, rng: &mut StdRng) -> Sfdd<u32> {
    let member_count = rng.gen_range(0..=6);
    let members: Vec<Vec<u32>> = (0..member_count)
        .map(|_| {
            let size = rng.gen_range(0..=4);
            (0..size).map(|_| rng.gen_range(0..8)).collect()
        })
        .collect();
    factory.encode(members)
}

#[test]
fn insert_morphism_scenario() {
    let factory = SfddFactory::<u32>::new();
    let morphisms = SfddMorphisms::new(&factory);
    let insert = morphisms.insert([2, 5]);

    let family = factory.encode([vec![1, 2], vec![1, 3]]);
    assert_eq!(
        insert.apply(&family),
        factory.encode([vec![1, 2, 5], vec![1, 2, 3, 5]])
    );
    assert_eq!(insert.apply(&factory.zero()), factory.zero());
    assert_eq!(insert.apply(&factory.one()), factory.encode([vec![2, 5]]));
}

#[test]
fn insert_then_remove_round_trips() {
    let factory = SfddFactory::<u32>::new();
    let morphisms = SfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x1A);

    let insert = morphisms.insert([2, 6]);
    let remove = morphisms.remove([2, 6]);

    for _ in 0..20 {
        let family = random_family(&factory, &mut rng);
        let inserted = insert.apply(&family);

        // Every member now carries both keys.
        for member in inserted.members() {
            assert!(member.contains(&2) && member.contains(&6));
        }
        // Removing them reaches the same family as removing first.
        assert_eq!(remove.apply(&inserted), remove.apply(&family));
    }
}

#[test]
fn filters_split_a_family() {
    let factory = SfddFactory::<u32>::new();
    let morphisms = SfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x2B);

    let containing = morphisms.filter_containing([3]);
    let excluding = morphisms.filter_excluding([3]);

    for _ in 0..20 {
        let family = random_family(&factory, &mut rng);
        let with = containing.apply(&family);
        let without = excluding.apply(&family);

        // The filters partition the family.
        assert_eq!(with.union(&without), family);
        assert!(with.is_disjoint(&without));
        for member in with.members() {
            assert!(member.contains(&3));
        }
        for member in without.members() {
            assert!(!member.contains(&3));
        }
    }
}

#[test]
fn connective_morphisms_match_the_algebra() {
    let factory = SfddFactory::<u32>::new();
    let morphisms = SfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x3C);

    let g = random_family(&factory, &mut rng);
    let id = morphisms.identity();
    let constant_g = morphisms.constant(g.clone());

    let union = morphisms.union(constant_g.clone(), id.clone());
    let intersection = morphisms.intersection(constant_g.clone(), id.clone());
    let symdiff = morphisms.symmetric_difference(constant_g.clone(), id.clone());
    let subtraction = morphisms.subtraction(id.clone(), constant_g.clone());

    for _ in 0..20 {
        let x = random_family(&factory, &mut rng);
        assert_eq!(union.apply(&x), x.union(&g));
        assert_eq!(intersection.apply(&x), x.intersection(&g));
        assert_eq!(symdiff.apply(&x), x.symmetric_difference(&g));
        assert_eq!(subtraction.apply(&x), x.subtracting(&g));
    }
}

#[test]
fn fixed_point_reaches_a_fixed_point() {
    let factory = SfddFactory::<u32>::new();
    let morphisms = SfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x4D);

    // Grow by the 3-free projection of the family until stable.
    let body = morphisms.union(morphisms.identity(), morphisms.remove([3]));
    let limit = morphisms.fixed_point(body.clone());

    for _ in 0..20 {
        let x = random_family(&factory, &mut rng);
        let result = limit.apply(&x);
        assert_eq!(body.apply(&result), result);
        assert_eq!(limit.apply(&result), result);
        assert!(x.is_subset(&result));
    }
}

#[test]
fn saturation_preserves_semantics() {
    let factory = SfddFactory::<u32>::new();
    let morphisms = SfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x5E);

    let plain: Vec<_> = vec![
        morphisms.insert([5]),
        morphisms.remove([4, 6]),
        morphisms.filter_containing([3, 5]),
        morphisms.filter_excluding([6]),
        morphisms.composition(morphisms.insert([7]), morphisms.remove([5])),
        morphisms.union(morphisms.insert([4]), morphisms.filter_excluding([4])),
    ];

    for morphism in &plain {
        let saturated = morphisms.saturate(morphism);
        for _ in 0..10 {
            let x = random_family(&factory, &mut rng);
            assert_eq!(saturated.apply(&x), morphism.apply(&x));
        }
        assert_eq!(saturated.apply(&factory.zero()), morphism.apply(&factory.zero()));
        assert_eq!(saturated.apply(&factory.one()), morphism.apply(&factory.one()));
    }
}

#[test]
fn explicit_saturation_levels_are_transparent() {
    let factory = SfddFactory::<u32>::new();
    let morphisms = SfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x6F);

    let insert = morphisms.insert([6]);
    // Any level at or below the true lowest relevant key is transparent.
    for level in [0u32, 3, 6] {
        let saturated = morphisms.saturated(insert.clone(), level);
        for _ in 0..10 {
            let x = random_family(&factory, &mut rng);
            assert_eq!(saturated.apply(&x), insert.apply(&x));
        }
    }
}

#[test]
fn saturated_fixed_point_matches_the_plain_one() {
    let factory = SfddFactory::<u32>::new();
    let morphisms = SfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x70);

    // A small closure system: adding key 6 and dropping key 2 generate
    // new members until stable.
    let grow = morphisms.insert([6]);
    let shed = morphisms.remove([2]);

    let plain_body = morphisms.union_many(vec![
        morphisms.identity(),
        grow.clone(),
        shed.clone(),
    ]);
    let saturated_body = morphisms.union_many(vec![
        morphisms.identity(),
        morphisms.saturate(&grow),
        morphisms.saturate(&shed),
    ]);

    let plain = morphisms.fixed_point(plain_body);
    let saturated = morphisms.fixed_point(saturated_body);

    for _ in 0..10 {
        let x = random_family(&factory, &mut rng);
        assert_eq!(saturated.apply(&x), plain.apply(&x));
    }
}
