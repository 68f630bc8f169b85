//! Circuit evaluation and learning benchmarks.
//!
//! Run with:
//! ```bash
//! cargo bench --bench evaluate
//! ```

use std::collections::BTreeSet;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meu_rs::circuit::{NnfBuilder, NnfCircuit};
use meu_rs::data::Example;
use meu_rs::evaluator::Evaluator;
use meu_rs::fixer::WeightFixer;
use meu_rs::key::Key;
use meu_rs::learner::{LearnerConfig, ULearner};
use meu_rs::maxeu::MaxExpectedUtility;
use meu_rs::semiring::ExpectedUtility;
use meu_rs::weight::{Component, RawWeight};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// Helper: independent facts, each paired with a derived atom
// ============================================================================

/// `n` facts with random probabilities; `d_i ↔ f_i ∧ f_{i+1}` for every pair.
/// Every other derived atom is a decision placed on top when `decisions` is set.
fn random_circuit(n: usize, seed: u64, decisions: bool) -> NnfCircuit {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut b = NnfBuilder::new();
    let mut parts = Vec::new();
    let mut top = Vec::new();

    for i in 0..n {
        let var = (i + 1) as u32;
        let name = format!("f{}", i);
        if decisions && i % 2 == 0 {
            let k = b.atom(name, var, RawWeight::Decision);
            let x = b.literal(k);
            let nx = b.literal(-k);
            top.push(b.or([x, nx]));
        } else {
            let p = rng.random_range(0.05..0.95);
            let k = b.atom(name, var, RawWeight::Prob(p));
            let x = b.literal(k);
            let nx = b.literal(-k);
            parts.push(b.or([x, nx]));
        }
    }
    top.extend(parts);
    let root = b.and(top);
    b.finish(root)
}

fn utilities(n: usize, seed: u64) -> Vec<(String, Component)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| (format!("f{}", i), Component::Known(rng.random_range(-10.0..10.0))))
        .collect()
}

fn bench_expected_utility(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate/eu");

    for n in [10, 100, 1000] {
        let circuit = random_circuit(n, 42, false);
        let fixed = WeightFixer::default()
            .fix(&circuit, &utilities(n, 7), &BTreeSet::new())
            .unwrap();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut evaluator = Evaluator::new(&circuit, &ExpectedUtility, &fixed.weights);
                evaluator.evaluate(Key::TRUE).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_conditional(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate/conditional");
    let n = 200;
    let circuit = random_circuit(n, 42, false);
    let fixed = WeightFixer::default()
        .fix(&circuit, &utilities(n, 7), &BTreeSet::new())
        .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let evidence: Vec<(Key, bool)> = (0..20)
        .map(|_| (Key::positive(rng.random_range(1..=n as u32)), rng.random_bool(0.5)))
        .collect();

    group.bench_function("20_pinned", |b| {
        b.iter(|| {
            let mut evaluator = Evaluator::new(&circuit, &ExpectedUtility, &fixed.weights);
            let mut scope = evaluator.with_evidence(&evidence);
            scope.evaluate(Key::positive(1)).unwrap()
        });
    });

    group.finish();
}

fn bench_max_expected_utility(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate/meu");

    for n in [10, 100] {
        let circuit = random_circuit(n, 42, true);
        let decisions: BTreeSet<Key> = (0..n).step_by(2).map(|i| Key::positive((i + 1) as u32)).collect();
        let semiring = MaxExpectedUtility::new(&decisions);
        let fixed = WeightFixer::default().fix(&circuit, &utilities(n, 7), &decisions).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut evaluator = Evaluator::new(&circuit, &semiring, &fixed.weights);
                evaluator.evaluate(Key::TRUE).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_learning_epoch(c: &mut Criterion) {
    let mut group = c.benchmark_group("learn/epoch");
    group.sample_size(10);

    let n = 50;
    let circuit = random_circuit(n, 42, false);
    let unknown: Vec<(String, Component)> = (0..n).map(|i| (format!("f{}", i), Component::Unknown(None))).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let examples: Vec<Example> = (0..32)
        .map(|_| {
            let observations = (0..5)
                .map(|_| (format!("f{}", rng.random_range(0..n)), rng.random_bool(0.5)))
                .collect();
            Example::new(observations, rng.random_range(-50.0..50.0))
        })
        .collect();

    group.bench_function("50_facts_32_examples", |b| {
        b.iter(|| {
            let config = LearnerConfig {
                max_epoch: 1,
                batch_size: 8,
                ..LearnerConfig::default()
            };
            let mut learner = ULearner::new(circuit.clone(), &unknown, &examples, config).unwrap();
            learner.learn().unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_expected_utility,
    bench_conditional,
    bench_max_expected_utility,
    bench_learning_epoch,
);

criterion_main!(benches);
