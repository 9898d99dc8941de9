mod common;

use abtest_core::*;
use abtest_engine::DecisionEngine;
use approx::assert_relative_eq;
use common::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn seeded_engine() -> DecisionEngine {
    DecisionEngine::new(EngineConfig::default().with_seed(42)).unwrap()
}

// ===== Scenario Tests =====

#[test]
fn test_binary_metric_balanced_traffic() {
    let control = binary_arm(500, 100);
    let treatment = binary_arm(500, 150);
    let dataset = two_arm_dataset("A", &control, "B", &treatment);

    let verdict = DecisionEngine::with_alpha(0.05)
        .unwrap()
        .analyze_test(&dataset, "metric")
        .unwrap();

    assert_eq!(verdict.metric_type, MetricType::Binary);
    assert_eq!(verdict.test, TestKind::ProportionZTest);
    assert_relative_eq!(verdict.statistic, 3.6515, epsilon = 1e-4);
    assert!(verdict.significant);
    assert_eq!(verdict.srm.chi2, 0.0);
    assert!(!verdict.srm.srm_detected);
    assert_eq!(verdict.control.label, "A");
    assert_eq!(verdict.treatment.label, "B");
    assert_relative_eq!(verdict.treatment.mean, 0.3, epsilon = 1e-12);
}

#[test]
fn test_traffic_imbalance_detected() {
    let control = normal_quantiles(900, 10.0, 2.0);
    let treatment = normal_quantiles(100, 10.0, 2.0);
    let dataset = two_arm_dataset("A", &control, "B", &treatment);

    let verdict = seeded_engine().analyze_test(&dataset, "metric").unwrap();

    assert_relative_eq!(verdict.srm.chi2, 640.0, epsilon = 1e-9);
    assert!(verdict.srm.p_value < 1e-10);
    assert!(verdict.srm.srm_detected);
    assert_eq!(verdict.srm.counts[0].observed, 900);
    assert_eq!(verdict.srm.counts[0].expected, 500.0);
    assert_eq!(verdict.srm.counts[1].observed, 100);
}

#[test]
fn test_normal_arms_use_welch_t_test() {
    let control = normal_quantiles(200, 0.0, 1.0);
    let treatment = normal_quantiles(200, 0.5, 1.0);
    let dataset = two_arm_dataset("control", &control, "treatment", &treatment);

    let verdict = seeded_engine().analyze_test(&dataset, "metric").unwrap();

    assert_eq!(verdict.metric_type, MetricType::ContinuousNormal);
    assert_eq!(verdict.test, TestKind::WelchTTest);
    assert!(verdict.statistic > 0.0, "treatment is passed first");
    assert!(verdict.significant);
    assert!(!verdict.srm.srm_detected);
}

#[test]
fn test_exponential_control_uses_mann_whitney() {
    let control = exponential_quantiles(200);
    let treatment = normal_quantiles(200, 1.0, 1.0);
    let dataset = two_arm_dataset("control", &control, "treatment", &treatment);

    let verdict = seeded_engine().analyze_test(&dataset, "metric").unwrap();

    assert_eq!(verdict.metric_type, MetricType::ContinuousNonNormal);
    assert_eq!(verdict.test, TestKind::MannWhitneyU);
}

#[test]
fn test_exponential_treatment_uses_mann_whitney() {
    let control = normal_quantiles(200, 1.0, 1.0);
    let treatment = exponential_quantiles(200);
    let dataset = two_arm_dataset("control", &control, "treatment", &treatment);

    let verdict = seeded_engine().analyze_test(&dataset, "metric").unwrap();

    assert_eq!(verdict.test, TestKind::MannWhitneyU);
}

#[test]
fn test_identical_distributions_not_significant() {
    let control = normal_quantiles(100, 5.0, 1.0);
    let treatment = normal_quantiles(100, 5.0, 1.0);
    let dataset = two_arm_dataset("A", &control, "B", &treatment);

    let verdict = seeded_engine().analyze_test(&dataset, "metric").unwrap();

    assert_eq!(verdict.test, TestKind::WelchTTest);
    assert!(!verdict.significant);
    assert_relative_eq!(verdict.p_value, 1.0, epsilon = 1e-9);
}

// ===== Arm Role Tests =====

#[test]
fn test_first_seen_label_is_control() {
    let dataset = two_arm_dataset("B", &binary_arm(50, 10), "A", &binary_arm(50, 20));

    let verdict = seeded_engine().analyze_test(&dataset, "metric").unwrap();

    assert_eq!(verdict.control.label, "B");
    assert_eq!(verdict.control.role, ArmRole::Control);
    assert_eq!(verdict.treatment.label, "A");
    assert!(verdict.statistic > 0.0);
}

#[test]
fn test_explicit_arms_override_first_seen_order() {
    let dataset = two_arm_dataset("B", &binary_arm(50, 10), "A", &binary_arm(50, 20));
    let engine = DecisionEngine::new(EngineConfig::default().with_arms("A", "B")).unwrap();

    let verdict = engine.analyze_test(&dataset, "metric").unwrap();

    assert_eq!(verdict.control.label, "A");
    assert_eq!(verdict.treatment.label, "B");
    assert!(verdict.statistic < 0.0);
}

#[test]
fn test_explicit_arms_allow_extra_variants() {
    let mut rows: Vec<(&str, Option<f64>)> = Vec::new();
    for i in 0..60 {
        rows.push(("holdout", Some((i % 2) as f64)));
        rows.push(("control", Some((i % 3 == 0) as u8 as f64)));
        rows.push(("treatment", Some((i % 4 != 0) as u8 as f64)));
    }
    let dataset = ExperimentDataset::from_observations("variant", "metric", rows);
    let engine = DecisionEngine::new(EngineConfig::default().with_arms("control", "treatment")).unwrap();

    let verdict = engine.analyze_test(&dataset, "metric").unwrap();

    assert_eq!(verdict.control.label, "control");
    assert_eq!(verdict.control.count, 60);
    assert_eq!(verdict.srm.counts.len(), 3);
    assert_eq!(verdict.srm.chi2, 0.0);
}

#[test]
fn test_metric_type_uses_values_of_every_variant() {
    let control = binary_arm(60, 20);
    let treatment = binary_arm(60, 30);
    let mut rows: Vec<(&str, Option<f64>)> = Vec::new();
    for i in 0..60 {
        rows.push(("control", Some(control[i])));
        rows.push(("treatment", Some(treatment[i])));
        rows.push(("holdout", Some(if i == 0 { 2.5 } else { 0.0 })));
    }
    let dataset = ExperimentDataset::from_observations("variant", "metric", rows);
    let engine = DecisionEngine::new(
        EngineConfig::default()
            .with_arms("control", "treatment")
            .with_seed(42),
    )
    .unwrap();

    let verdict = engine.analyze_test(&dataset, "metric").unwrap();

    assert_ne!(verdict.metric_type, MetricType::Binary);
    assert_ne!(verdict.test, TestKind::ProportionZTest);
    assert_eq!(verdict.metric_type, MetricType::ContinuousNonNormal);
    assert_eq!(verdict.test, TestKind::MannWhitneyU);

    let arms_only = two_arm_dataset("control", &control, "treatment", &treatment);
    let binary = engine.analyze_test(&arms_only, "metric").unwrap();
    assert_eq!(binary.metric_type, MetricType::Binary);
}

#[test]
fn test_custom_variant_column() {
    let rows = vec![
        ("x", Some(0.0)),
        ("y", Some(1.0)),
        ("x", Some(1.0)),
        ("y", Some(1.0)),
        ("x", Some(0.0)),
        ("y", Some(0.0)),
    ];
    let dataset = ExperimentDataset::from_observations("group", "converted", rows);

    let configured = DecisionEngine::new(EngineConfig::default().with_variant_column("group"))
        .unwrap()
        .analyze_test(&dataset, "converted")
        .unwrap();
    let explicit = DecisionEngine::default()
        .analyze_test_with(&dataset, "converted", "group")
        .unwrap();

    assert_eq!(configured, explicit);
}

// ===== Error Handling Tests =====

#[test]
fn test_missing_metric_column() {
    let dataset = two_arm_dataset("A", &[1.0, 2.0], "B", &[3.0, 4.0]);
    let err = seeded_engine().analyze_test(&dataset, "revenue").unwrap_err();

    assert_eq!(
        err,
        CoreError::MalformedInput("missing required column 'revenue'".to_string())
    );
}

#[test]
fn test_missing_variant_column() {
    let dataset = two_arm_dataset("A", &[1.0, 2.0], "B", &[3.0, 4.0]);
    let err = seeded_engine()
        .analyze_test_with(&dataset, "metric", "arm")
        .unwrap_err();

    assert!(matches!(err, CoreError::MalformedInput(_)));
}

#[test]
fn test_single_variant_fails_fast() {
    let dataset = ExperimentDataset::from_observations(
        "variant",
        "metric",
        vec![("A", Some(1.0)), ("A", Some(0.0))],
    );

    let err = seeded_engine().analyze_test(&dataset, "metric").unwrap_err();
    assert_eq!(err, CoreError::InsufficientVariants { found: 1 });
}

#[test]
fn test_empty_dataset_fails_fast() {
    let dataset = ExperimentDataset::from_observations("variant", "metric", Vec::<(&str, Option<f64>)>::new());

    let err = seeded_engine().analyze_test(&dataset, "metric").unwrap_err();
    assert_eq!(err, CoreError::InsufficientVariants { found: 0 });
}

#[test]
fn test_three_variants_without_roles_are_ambiguous() {
    let dataset = ExperimentDataset::from_observations(
        "variant",
        "metric",
        vec![("A", Some(1.0)), ("B", Some(0.0)), ("C", Some(1.0))],
    );

    let err = seeded_engine().analyze_test(&dataset, "metric").unwrap_err();
    assert_eq!(err, CoreError::AmbiguousVariants { found: 3 });
}

#[test]
fn test_unknown_explicit_label() {
    let dataset = two_arm_dataset("A", &[1.0, 0.0], "B", &[0.0, 1.0]);
    let engine = DecisionEngine::new(EngineConfig::default().with_arms("A", "Z")).unwrap();

    let err = engine.analyze_test(&dataset, "metric").unwrap_err();
    assert!(matches!(err, CoreError::MalformedInput(_)));
}

#[test]
fn test_all_null_arm_is_empty() {
    let dataset = ExperimentDataset::from_observations(
        "variant",
        "metric",
        vec![("A", Some(1.0)), ("B", None), ("A", Some(0.0)), ("B", Some(f64::NAN))],
    );

    let err = seeded_engine().analyze_test(&dataset, "metric").unwrap_err();
    assert_eq!(err, CoreError::EmptyArm("B".to_string()));
}

#[test]
fn test_single_observation_arm_is_rejected() {
    let dataset = ExperimentDataset::from_observations(
        "variant",
        "metric",
        vec![("A", Some(1.5)), ("B", Some(2.5)), ("A", Some(3.5)), ("B", None)],
    );

    let err = seeded_engine().analyze_test(&dataset, "metric").unwrap_err();
    assert_eq!(
        err,
        CoreError::InsufficientObservations {
            variant: "B".to_string(),
            found: 1,
            required: 2,
        }
    );
}

#[test]
fn test_two_observation_continuous_arm_cannot_be_checked_for_normality() {
    let dataset = two_arm_dataset("A", &[1.5, 2.5, 3.5, 4.0], "B", &[2.0, 3.0]);

    let err = seeded_engine().analyze_test(&dataset, "metric").unwrap_err();
    assert_eq!(
        err,
        CoreError::InsufficientObservations {
            variant: "B".to_string(),
            found: 2,
            required: 3,
        }
    );
}

#[test]
fn test_constant_binary_outcome_is_numeric_instability() {
    let dataset = two_arm_dataset("A", &binary_arm(20, 0), "B", &binary_arm(20, 0));

    let err = seeded_engine().analyze_test(&dataset, "metric").unwrap_err();
    assert!(matches!(err, CoreError::NumericInstability(_)));
}

#[test]
fn test_constant_continuous_arm_is_numeric_instability() {
    let dataset = two_arm_dataset("A", &[7.0; 10], "B", &normal_quantiles(10, 7.0, 1.0));

    let err = seeded_engine().analyze_test(&dataset, "metric").unwrap_err();
    assert!(matches!(err, CoreError::NumericInstability(_)));
}

#[test]
fn test_invalid_alpha_rejected_at_construction() {
    assert!(matches!(
        DecisionEngine::with_alpha(1.0),
        Err(CoreError::Configuration(_))
    ));
}

// ===== Determinism Tests =====

#[test]
fn test_seeded_engine_is_idempotent_on_large_arms() {
    let control = normal_quantiles(6000, 0.0, 1.0);
    let treatment = normal_quantiles(6000, 0.1, 1.0);
    let dataset = two_arm_dataset("A", &control, "B", &treatment);
    let engine = seeded_engine();

    let first = engine.analyze_test(&dataset, "metric").unwrap();
    let second = engine.analyze_test(&dataset, "metric").unwrap();

    assert_eq!(first, second);
    assert_eq!(first.control.count, 6000);
}

#[test]
fn test_engine_is_shareable_across_threads() {
    let engine = std::sync::Arc::new(seeded_engine());
    let dataset = std::sync::Arc::new(two_arm_dataset(
        "A",
        &normal_quantiles(50, 0.0, 1.0),
        "B",
        &normal_quantiles(50, 1.0, 1.0),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            let dataset = dataset.clone();
            std::thread::spawn(move || engine.analyze_test(&dataset, "metric").unwrap())
        })
        .collect();

    let verdicts: Vec<Verdict> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(verdicts.windows(2).all(|pair| pair[0] == pair[1]));
}

// ===== Output Shape =====

#[test]
fn test_verdict_serializes_with_expected_fields() {
    let dataset = two_arm_dataset("A", &binary_arm(500, 100), "B", &binary_arm(500, 150));
    let verdict = seeded_engine().analyze_test(&dataset, "metric").unwrap();

    let value = serde_json::to_value(&verdict).unwrap();

    assert_eq!(value["test"], "Proportion Z-Test");
    assert_eq!(value["metric_type"], "binary");
    assert_eq!(value["srm"]["srm_detected"], false);
    for key in ["statistic", "pvalue", "significant", "srm", "control", "treatment"] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
}

// ===== Property-based Tests =====

proptest! {
    #[test]
    fn test_binary_values_always_use_proportion_test(
        control in proptest::collection::vec(any::<bool>(), 2..60),
        treatment in proptest::collection::vec(any::<bool>(), 2..60),
    ) {
        let all: Vec<bool> = control.iter().chain(&treatment).copied().collect();
        prop_assume!(all.iter().any(|b| *b) && all.iter().any(|b| !*b));

        let to_f64 = |v: &[bool]| v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect::<Vec<f64>>();
        let dataset = two_arm_dataset("A", &to_f64(&control), "B", &to_f64(&treatment));

        let verdict = seeded_engine().analyze_test(&dataset, "metric").unwrap();
        prop_assert_eq!(verdict.metric_type, MetricType::Binary);
        prop_assert_eq!(verdict.test, TestKind::ProportionZTest);
        prop_assert!((0.0..=1.0).contains(&verdict.p_value));
    }

    #[test]
    fn test_srm_invariant_under_label_order(
        count_a in 1usize..400,
        count_b in 1usize..400,
    ) {
        let engine = seeded_engine();
        let a_first = ExperimentDataset::from_observations(
            "variant",
            "metric",
            (0..count_a).map(|_| ("A", Some(1.0))).chain((0..count_b).map(|_| ("B", Some(0.0)))),
        );
        let b_first = ExperimentDataset::from_observations(
            "variant",
            "metric",
            (0..count_b).map(|_| ("B", Some(0.0))).chain((0..count_a).map(|_| ("A", Some(1.0)))),
        );

        let forward = engine.check_srm(&a_first, "variant").unwrap();
        let backward = engine.check_srm(&b_first, "variant").unwrap();

        prop_assert!((forward.chi2 - backward.chi2).abs() < 1e-12);
        prop_assert!((forward.p_value - backward.p_value).abs() < 1e-12);
        prop_assert_eq!(forward.srm_detected, backward.srm_detected);
    }
}
