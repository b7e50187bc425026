mod common;

use common::*;
use proptest::prelude::*;
use timeforge::model::{DemandId, WeekTargets};

// --- STRATEGIES ---

/// Weekly hours in half-hour steps.
fn arb_hours() -> impl Strategy<Value = f64> {
    (1u32..=12).prop_map(|h| h as f64 / 2.0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_week_split_preserves_volume(
        math in arb_hours(),
        art in arb_hours(),
        classes in 1usize..4,
        seed in any::<u64>()
    ) {
        let mut builder = InstitutionBuilder::new()
            .daily_cap(None)
            .level("6e", &[("Math", math), ("Art", art)])
            .subject("Math", single("Curie"))
            .subject("Art", single("Monet"))
            .teacher("Curie")
            .teacher("Monet");
        for c in 0..classes {
            builder = builder.class(&format!("6{}", (b'A' + c as u8) as char), "6e", 24);
        }
        let model = builder.model();
        let mut rng = fastrand::Rng::with_seed(seed);
        let targets = WeekTargets::split(&model, &mut rng);

        for (i, d) in model.demands.iter().enumerate() {
            let [a, b] = targets.pair(DemandId::from_index(i));
            prop_assert_eq!(a + b, d.two_week_total);
            prop_assert!(a.abs_diff(b) <= 1);
        }

        // Classes of one level share their targets.
        for subject in 0..2 {
            let pairs: Vec<[u32; 2]> = model
                .demands
                .iter()
                .enumerate()
                .filter(|(_, d)| d.subject.index() == subject)
                .map(|(i, _)| targets.pair(DemandId::from_index(i)))
                .collect();
            prop_assert!(pairs.windows(2).all(|w| w[0] == w[1]));
        }
    }

    #[test]
    fn prop_pool_quotas_spread_at_most_one(
        hours in arb_hours(),
        classes in 1usize..5,
        pool_size in 2usize..4,
        seed in any::<u64>()
    ) {
        let names = ["Curie", "Noether", "Lovelace"];
        let teachers = &names[..pool_size];
        let mut builder = InstitutionBuilder::new()
            .daily_cap(None)
            .level("6e", &[("Math", hours)])
            .subject("Math", pool(teachers));
        for t in teachers {
            builder = builder.teacher(t);
        }
        for c in 0..classes {
            builder = builder.class(&format!("6{}", (b'A' + c as u8) as char), "6e", 24);
        }
        let model = builder.model();

        let mut rng = fastrand::Rng::with_seed(seed);
        for p in &model.pools {
            let mut order: Vec<usize> = (0..p.teachers.len()).collect();
            rng.shuffle(&mut order);
            let quotas = p.quotas(&order);
            let max = quotas.iter().copied().max().unwrap_or(0);
            let min = quotas.iter().copied().min().unwrap_or(0);
            prop_assert!(max - min <= 1);
            let total: u32 = p.demands.iter().map(|d| model.demand(*d).two_week_total).sum();
            prop_assert_eq!(p.total_sessions, total);
            prop_assert_eq!(quotas.iter().sum::<u32>(), total);
        }
    }
}
