//! Map-family morphism scenarios and laws.

use rand::prelude::*;

use famdd::{Mfdd, MfddFactory, MfddMorphisms};

const VALUES: [&str; 3] = ["a", "b", "c"];

fn random_family(factory: &MfddFactory<u32, &'static str>, rng: &mut StdRng) -> Mfdd<u32, &'static str> {
    let member_count = rng.gen_range(0..=5);
    let members: Vec<Vec<(u32, &'static str)>> = (0..member_count)
        .map(|_| {
            let mut keys: Vec<u32> = (0..rng.gen_range(0..=3)).map(|_| rng.gen_range(0..6)).collect();
            keys.sort();
            keys.dedup();
            keys.into_iter()
                .map(|key| (key, VALUES[rng.gen_range(0..VALUES.len())]))
                .collect()
        })
        .collect();
    factory.encode(members)
}

#[test]
fn rebinding_a_key_via_remove_and_insert() {
    let factory = MfddFactory::<u32, &str>::new();
    let morphisms = MfddMorphisms::new(&factory);

    // Replace whatever key 2 is bound to by "b".
    let rebind = morphisms.composition(
        morphisms.insert([(2, "b")]),
        morphisms.remove_keys([2]),
    );

    let family = factory.encode([
        vec![(1, "a"), (2, "a")],
        vec![(2, "c"), (4, "a")],
        vec![(4, "b")],
    ]);
    let expected = factory.encode([
        vec![(1, "a"), (2, "b")],
        vec![(2, "b"), (4, "a")],
        vec![(2, "b"), (4, "b")],
    ]);
    assert_eq!(rebind.apply(&family), expected);
}

#[test]
fn guarded_update_fires_only_where_its_precondition_holds() {
    let factory = MfddFactory::<u32, &str>::new();
    let morphisms = MfddMorphisms::new(&factory);

    // Where key 1 is bound to "a", rebind it to "b".
    let fire = morphisms.composition_many(vec![
        morphisms.insert([(1, "b")]),
        morphisms.remove_values([(1, vec!["a"])]),
        morphisms.filter_containing([(1, vec!["a"])]),
    ]);

    let family = factory.encode([
        vec![(1, "a"), (2, "c")],
        vec![(1, "c")],
        vec![(2, "a")],
    ]);
    assert_eq!(
        fire.apply(&family),
        factory.encode([vec![(1, "b"), (2, "c")]])
    );

    // Members satisfying the guard plus the rest form the step relation.
    let step = morphisms.union(morphisms.identity(), fire);
    let applied = step.apply(&family);
    assert_eq!(applied.count(), 4);
    assert!(applied.contains([(1, "b"), (2, "c")]));
    assert!(applied.contains([(1, "c")]));
}

#[test]
fn connective_morphisms_match_the_algebra() {
    let factory = MfddFactory::<u32, &str>::new();
    let morphisms = MfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x7A);

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
    let factory = MfddFactory::<u32, &str>::new();
    let morphisms = MfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x8B);

    let body = morphisms.union(morphisms.identity(), morphisms.remove_keys([3]));
    let limit = morphisms.fixed_point(body.clone());

    for _ in 0..20 {
        let x = random_family(&factory, &mut rng);
        let result = limit.apply(&x);
        assert_eq!(body.apply(&result), result);
        assert!(x.is_subset(&result));
    }
}

#[test]
fn saturation_preserves_semantics() {
    let factory = MfddFactory::<u32, &str>::new();
    let morphisms = MfddMorphisms::new(&factory);
    let mut rng = StdRng::seed_from_u64(0x9C);

    let plain: Vec<_> = vec![
        morphisms.insert([(4, "a")]),
        morphisms.remove_keys([3, 5]),
        morphisms.remove_values([(4, vec!["a", "b"])]),
        morphisms.filter_containing([(3, vec!["a"])]),
        morphisms.filter_excluding([(5, vec!["c"])]),
        morphisms.composition(
            morphisms.insert([(4, "b")]),
            morphisms.remove_keys([4]),
        ),
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
fn map_values_composes_with_filters() {
    let factory = MfddFactory::<u32, &str>::new();
    let morphisms = MfddMorphisms::new(&factory);

    let uppercase_a = morphisms.map_values(|value: &&str| if *value == "a" { "A" } else { *value });
    let keep_a = morphisms.filter_containing([(1, vec!["a"])]);
    let pipeline = morphisms.composition(uppercase_a, keep_a);

    let family = factory.encode([
        vec![(1, "a"), (2, "b")],
        vec![(1, "b")],
    ]);
    assert_eq!(
        pipeline.apply(&family),
        factory.encode([vec![(1, "A"), (2, "b")]])
    );
}
