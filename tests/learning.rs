use std::collections::BTreeMap;
use std::rc::Rc;

use meu_rs::circuit::{NnfBuilder, NnfCircuit};
use meu_rs::data::{parse_examples, read_examples};
use meu_rs::error::Error;
use meu_rs::learner::{get_ulearner, LearnerConfig, ULearner};
use meu_rs::program::CompiledProgram;
use meu_rs::report::{Diagnostic, MemoryReporter};
use meu_rs::weight::{Component, RawWeight};

use test_log::test;

/// `traffic` (0.2) and `sunny` (0.7) independent; `late` ↔ `traffic`.
fn commute() -> NnfCircuit {
    let mut b = NnfBuilder::new();
    let traffic = b.atom("traffic", 1, RawWeight::Prob(0.2));
    let sunny = b.atom("sunny", 2, RawWeight::Prob(0.7));
    let late = b.atom("late", 3, RawWeight::True);
    let (t, nt) = (b.literal(traffic), b.literal(-traffic));
    let (s, ns) = (b.literal(sunny), b.literal(-sunny));
    let (l, nl) = (b.literal(late), b.literal(-late));
    let jam = b.and([t, l]);
    let clear = b.and([nt, nl]);
    let road = b.or([jam, clear]);
    let weather = b.or([s, ns]);
    let root = b.and([road, weather]);
    b.finish(root)
}

/// Targets generated by late = -20, sunny = 5.
const EXAMPLES: &str = "\
evidence(traffic, true).
evidence(sunny, true).
utility(-15).
---
evidence(traffic, true).
evidence(sunny, false).
utility(-20).
---
observe(\\+traffic).
observe(sunny).
utility(5).
---
observe(\\+traffic). observe(\\+sunny). utility(0).
---
% sunny only: 0.2 * -20 + 5
evidence(sunny).
utility(1).
---
evidence(\\+sunny).
utility(-4).
";

fn program() -> CompiledProgram {
    CompiledProgram::new(commute())
        .with_utility("late", Component::Unknown(None))
        .with_utility("sunny", Component::Unknown(Some(1.0)))
}

#[test]
fn test_learn_from_example_text() {
    let examples = parse_examples(EXAMPLES).unwrap();
    assert_eq!(examples.len(), 6);

    let mut learner = get_ulearner(&program(), &examples, 400, 0.3, None).unwrap();
    let learned = learner.learn().unwrap();
    assert!((learned["late"] - -20.0).abs() < 1e-3, "{:?}", learned);
    assert!((learned["sunny"] - 5.0).abs() < 1e-3, "{:?}", learned);

    let all = learner.processed_examples().to_vec();
    assert!(learner.mse(&all).unwrap() < 1e-6);
}

#[test]
fn test_learn_from_example_file() {
    let path = std::env::temp_dir().join(format!("meu-rs-commute-{}.pl", std::process::id()));
    std::fs::write(&path, EXAMPLES).unwrap();
    let examples = read_examples(&[&path]).unwrap();
    std::fs::remove_file(&path).unwrap();

    let mut learner = get_ulearner(&program(), &examples, 100, 0.4, Some(2)).unwrap();
    let learned = learner.learn_adaptive_rate(1.1, 0.9).unwrap();
    assert!((learned["late"] - -20.0).abs() < 0.5, "{:?}", learned);
    assert!((learned["sunny"] - 5.0).abs() < 0.5, "{:?}", learned);
}

#[test]
fn test_learned_utilities_stay_shared_with_weights() {
    let examples = parse_examples(EXAMPLES).unwrap();
    let mut learner = get_ulearner(&program(), &examples, 50, 0.3, None).unwrap();
    learner.learn().unwrap();

    // Overwriting the utilities is visible to the next prediction.
    learner.set_current_util_weights(&BTreeMap::from([("late".to_string(), 0.0), ("sunny".to_string(), 0.0)]));
    let first = learner.processed_examples()[0].clone();
    assert_eq!(learner.predict(&first).unwrap(), 0.0);
}

#[test]
fn test_restarts_with_held_out_examples() {
    let mut examples = parse_examples(EXAMPLES).unwrap();
    examples.extend(parse_examples(EXAMPLES).unwrap());

    let reporter = Rc::new(MemoryReporter::new());
    let config = LearnerConfig {
        batch_size: 3,
        max_epoch: 60,
        seed: 3,
        ..LearnerConfig::default()
    };
    let utilities = vec![
        ("late".to_string(), Component::Unknown(None)),
        ("sunny".to_string(), Component::Unknown(None)),
    ];
    let mut learner =
        ULearner::with_reporter(commute(), &utilities, &examples, config, Box::new(reporter.clone())).unwrap();
    let best = learner.learn_adaptive_rate_left_out(1.1, 0.9, 0.25).unwrap();

    assert_eq!(learner.get_current_util_weights(), best);
    let held_out = learner.processed_examples()[9..].to_vec();
    assert!(learner.mse(&held_out).unwrap() < 1.0, "{:?}", best);
    assert!(reporter
        .entries()
        .iter()
        .any(|d| matches!(d, Diagnostic::BestWeights { .. })));
}

#[test]
fn test_unknown_observation_is_skipped() {
    let text = "observe(traffic). observe(aliens). utility(-20).\n";
    let examples = parse_examples(text).unwrap();
    let reporter = Rc::new(MemoryReporter::new());
    let utilities = vec![("late".to_string(), Component::Unknown(None))];
    let learner = ULearner::with_reporter(
        commute(),
        &utilities,
        &examples,
        LearnerConfig::default(),
        Box::new(reporter.clone()),
    )
    .unwrap();

    assert_eq!(learner.processed_examples()[0].evidence.len(), 1);
    assert!(reporter
        .entries()
        .contains(&Diagnostic::UnresolvedAtom { name: "aliens".into() }));
}

#[test]
fn test_impossible_example_is_an_error() {
    let text = "observe(traffic). observe(\\+late). utility(0).\n";
    let examples = parse_examples(text).unwrap();
    let mut learner = get_ulearner(&program(), &examples, 5, 0.3, None).unwrap();
    assert!(matches!(learner.learn(), Err(Error::InconsistentEvidence)));
}

#[test]
fn test_missing_utility_in_file() {
    let text = "observe(traffic). utility(1).\n---\nobserve(sunny).\n";
    assert!(matches!(parse_examples(text), Err(Error::MissingUtility { block: 1 })));
}
