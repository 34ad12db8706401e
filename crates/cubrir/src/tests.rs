//! Cross-module coverage properties
//!
//! Merge algebra, the `hit ⊆ executable` invariant, and a full
//! discover → run → snapshot → render pass over a temporary project.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

fn store_from(map: BTreeMap<u8, Vec<u32>>) -> CoverageStore {
    let mut store = CoverageStore::new();
    for (unit, lines) in map {
        store.insert_lines(UnitId::new(format!("src/u{unit}.rs")), lines);
    }
    store
}

fn arb_store() -> impl Strategy<Value = CoverageStore> {
    prop::collection::btree_map(0u8..6, prop::collection::vec(1u32..60, 0..12), 0..5)
        .prop_map(store_from)
}

fn registry_with(executable: &[u32]) -> UnitRegistry {
    let mut registry = UnitRegistry::new("/w");
    for unit in 0u8..6 {
        let id = format!("src/u{unit}.rs");
        registry.insert(Unit::new(
            UnitId::new(id.clone()),
            PathBuf::from(id),
            LineAnalysis {
                executable: executable.iter().copied().collect(),
                excluded: LineSet::new(),
                instrumented: true,
            },
            Arc::from(""),
        ));
    }
    registry
}

mod merge_algebra_tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_merge_commutative(a in arb_store(), b in arb_store()) {
            prop_assert_eq!(merge(&a, &b), merge(&b, &a));
        }

        #[test]
        fn prop_merge_associative(a in arb_store(), b in arb_store(), c in arb_store()) {
            prop_assert_eq!(merge(&merge(&a, &b), &c), merge(&a, &merge(&b, &c)));
        }

        #[test]
        fn prop_merge_idempotent(a in arb_store()) {
            prop_assert_eq!(merge(&a, &a), a);
        }

        #[test]
        fn prop_record_order_irrelevant(
            hits_a in prop::collection::vec((0u8..6, 1u32..60), 0..20),
            hits_b in prop::collection::vec((0u8..6, 1u32..60), 0..20),
        ) {
            let registry = registry_with(&(1..=30).collect::<Vec<_>>());
            let to_session = |hits: &[(u8, u32)]| {
                let mut session = Session::new("p");
                for (unit, line) in hits {
                    let _ = session.record(&format!("src/u{unit}.rs"), *line);
                }
                session
            };
            let (sa, sb) = (to_session(hits_a.as_slice()), to_session(hits_b.as_slice()));

            let mut forward = CoverageStore::new();
            forward.record(&sa, &registry);
            forward.record(&sb, &registry);
            let mut backward = CoverageStore::new();
            backward.record(&sb, &registry);
            backward.record(&sa, &registry);
            prop_assert_eq!(forward, backward);
        }
    }
}

mod invariant_tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_hit_subset_of_executable(
            executable in prop::collection::btree_set(1u32..40, 0..20),
            hits in prop::collection::vec((0u8..6, 1u32..60), 0..40),
        ) {
            let executable: Vec<u32> = executable.into_iter().collect();
            let registry = registry_with(&executable);
            let mut session = Session::new("p");
            for (unit, line) in &hits {
                let _ = session.record(&format!("src/u{unit}.rs"), *line);
            }
            let mut store = CoverageStore::new();
            store.record(&session, &registry);

            for (id, lines) in store.units() {
                let unit = registry.get(id).unwrap();
                prop_assert!(lines.is_subset(unit.executable()));
            }

            let report = AggregateReport::snapshot(&store, &registry);
            for unit in report.units() {
                prop_assert!(unit.hit.is_subset(&unit.executable));
                prop_assert_eq!(unit.hit.len() + unit.missing.len(), unit.executable.len());
            }
        }

        #[test]
        fn prop_percent_bounded(hit in 0usize..500, extra in 0usize..500, precision in 0usize..4) {
            let ratio = Ratio::new(hit, hit + extra);
            let scale = 10u128.pow(precision as u32);
            let scaled = ratio.scaled(precision);
            prop_assert!(scaled <= 100 * scale);
            prop_assert_eq!(scaled == 100 * scale, extra == 0);
        }
    }
}

mod pipeline_tests {
    use super::*;
    use crate::tracer::record_hit;

    const CALC: &str = "\
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

pub fn classify(n: i32) -> &'static str {
    if n < 0 {
        return \"negative\";
    }
    \"non-negative\"
}
";

    #[test]
    fn test_discover_run_report() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/calc.rs"), CALC).unwrap();
        std::fs::write(dir.path().join("src/broken.rs"), "fn (").unwrap();

        let config = CoverageConfig::default();
        let registry = UnitRegistry::discover(dir.path(), &config).unwrap();
        let calc = registry.get(&UnitId::new("src/calc.rs")).unwrap();
        assert_eq!(calc.executable(), &LineSet::from([2, 6, 7, 9]));

        // Stand-in for instrumented code: probes with the absolute path, as
        // `file!()` yields for out-of-workspace builds
        let abs: &'static str =
            Box::leak(dir.path().join("src/calc.rs").display().to_string().into_boxed_str());
        let tests = vec![
            TestCase::from_fn("add", move || record_hit(abs, 2)),
            TestCase::from_fn("classify_positive", move || {
                record_hit(abs, 6);
                record_hit(abs, 9);
            }),
        ];
        let shared = SharedStore::default();
        let results = CoverageRunner::new(&registry)
            .with_jobs(2)
            .run(&tests, &shared)
            .unwrap();
        assert!(results.all_passed());

        let store = shared.into_inner();
        let report = AggregateReport::snapshot(&store, &registry);
        let unit = report.unit(&UnitId::new("src/calc.rs")).unwrap();
        assert_eq!(unit.missing, LineSet::from([7]));
        assert_eq!(unit.percent_text(1), "75.0");
        assert!(report.unit(&UnitId::new("src/broken.rs")).unwrap().is_unreadable());

        let text = TextFormatter::new(&report)
            .with_options(TextOptions {
                show_missing: true,
                ..TextOptions::default()
            })
            .generate();
        assert!(text.contains("75.00%   7"));
        assert!(text.contains("measurement error(s) recovered"));

        let pages = HtmlFormatter::new(&report).render();
        assert_eq!(pages.len(), report.units().len() + 2);
    }

    #[test]
    fn test_store_round_trip_through_disk_keeps_report() {
        let registry = registry_with(&[1, 2, 3]);
        let mut store = CoverageStore::new();
        store.insert_lines(UnitId::new("src/u1.rs"), [1, 3]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage.json");
        store.save(&path).unwrap();

        let loaded = CoverageStore::load(&path).unwrap();
        let before = AggregateReport::snapshot(&store, &registry);
        let after = AggregateReport::snapshot(&loaded, &registry);
        assert_eq!(before.totals(), after.totals());
    }
}
