//! Maximum expected utility.
//!
//! [`MaxExpectedUtility`] extends the expected-utility semiring with the set of
//! decisions committed to reach an element. Conjunction commits to the decisions of
//! both sides. A disjunction whose sides carry decisions is not a union of worlds
//! but a choice between strategies: the side with the larger utility per unit of
//! probability wins. This is only a semiring when decisions sit above every other
//! variable in the circuit (X-constrained compilation).
//!
//! The zero element carries every decision literal, positive and negative. A set of
//! that size can never be produced by a feasible strategy, so `plus` uses it to
//! recognise infeasible sides.
//!
//! [`map_task`] and [`get_best_decision`] are the entry points for whole programs.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::fixer::WeightFixer;
use crate::key::Key;
use crate::program::ProgramSource;
use crate::report::{Diagnostic, Reporter};
use crate::semiring::{Semiring, EPSILON};
use crate::weight::{EuTerm, FixedWeights};

/// Element of [`MaxExpectedUtility`].
#[derive(Debug, Clone, PartialEq)]
pub struct MaxEuValue {
    pub prob: f64,
    pub eu: f64,
    pub decisions: BTreeSet<Key>,
}

impl MaxEuValue {
    pub fn new(prob: f64, eu: f64, decisions: BTreeSet<Key>) -> Self {
        Self { prob, eu, decisions }
    }

    /// Expected utility per unit of probability.
    fn ratio(&self) -> f64 {
        self.eu / self.prob
    }
}

#[derive(Debug, Clone)]
pub struct MaxExpectedUtility {
    zero: MaxEuValue,
}

impl MaxExpectedUtility {
    /// Creates the semiring for the given positive decision keys.
    pub fn new(decisions: &BTreeSet<Key>) -> Self {
        let all: BTreeSet<Key> = decisions.iter().flat_map(|&d| [d, -d]).collect();
        Self {
            zero: MaxEuValue::new(0.0, 0.0, all),
        }
    }

    /// Whether `a` is the infeasible sentinel.
    pub fn is_infeasible(&self, a: &MaxEuValue) -> bool {
        !self.zero.decisions.is_empty() && a.decisions.len() == self.zero.decisions.len()
    }
}

impl Semiring for MaxExpectedUtility {
    type Element = MaxEuValue;

    fn one(&self) -> MaxEuValue {
        MaxEuValue::new(1.0, 0.0, BTreeSet::new())
    }

    fn zero(&self) -> MaxEuValue {
        self.zero.clone()
    }

    fn plus(&self, a: &MaxEuValue, b: &MaxEuValue) -> MaxEuValue {
        if a.decisions.is_empty() && b.decisions.is_empty() {
            return MaxEuValue::new(a.prob + b.prob, a.eu + b.eu, BTreeSet::new());
        }
        let pick_a = if self.is_infeasible(b) {
            true
        } else if self.is_infeasible(a) {
            false
        } else if a.prob == 0.0 {
            false
        } else if b.prob == 0.0 {
            true
        } else {
            a.ratio() >= b.ratio()
        };
        if pick_a {
            a.clone()
        } else {
            b.clone()
        }
    }

    fn times(&self, a: &MaxEuValue, b: &MaxEuValue) -> MaxEuValue {
        MaxEuValue::new(
            a.prob * b.prob,
            a.prob * b.eu + b.prob * a.eu,
            a.decisions.union(&b.decisions).copied().collect(),
        )
    }

    fn negate(&self, a: &MaxEuValue) -> MaxEuValue {
        MaxEuValue::new(1.0 - a.prob, 0.0, a.decisions.clone())
    }

    fn value(&self, term: &EuTerm) -> MaxEuValue {
        let p = term.prob.resolve();
        let u = term.cost.resolve();
        MaxEuValue::new(p, p * u, term.decisions.clone())
    }

    fn normalize(&self, a: &MaxEuValue, z: &MaxEuValue) -> MaxEuValue {
        MaxEuValue::new(a.prob / z.prob, a.eu / z.prob, a.decisions.clone())
    }

    fn probability(&self, a: &MaxEuValue) -> f64 {
        a.prob
    }

    fn to_evidence(&self, pos: MaxEuValue, neg: MaxEuValue, positive: bool) -> (MaxEuValue, MaxEuValue) {
        if positive {
            let off = MaxEuValue::new(0.0, 0.0, neg.decisions);
            (pos, off)
        } else {
            let off = MaxEuValue::new(0.0, 0.0, pos.decisions);
            (off, neg)
        }
    }

    /// A group whose first alternative is a decision has no complement. A
    /// probabilistic group must not contain decisions.
    fn ad_complement(&self, ws: &[MaxEuValue]) -> Result<MaxEuValue> {
        match ws.first() {
            Some(first) if !first.decisions.is_empty() => Ok(MaxEuValue::new(0.0, 0.0, BTreeSet::new())),
            _ => {
                let mut s = self.zero();
                for w in ws {
                    if !w.decisions.is_empty() {
                        return Err(Error::InvalidDecisionMix);
                    }
                    s = self.plus(&s, w);
                }
                Ok(self.negate(&s))
            }
        }
    }

    fn is_zero(&self, a: &MaxEuValue) -> bool {
        a.prob.abs() < EPSILON && a.eu.abs() < EPSILON
    }

    fn is_one(&self, a: &MaxEuValue) -> bool {
        (a.prob - 1.0).abs() < EPSILON && a.eu.abs() < EPSILON && a.decisions.is_empty()
    }
}

/// Result of one query in [`map_task`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub prob: f64,
    pub eu: f64,
    /// Chosen decisions, `name` for true and `-name` for false.
    pub decisions: BTreeSet<String>,
}

/// Result of [`get_best_decision`].
#[derive(Debug, Clone)]
pub struct BestDecision {
    pub decisions: BTreeMap<String, bool>,
    pub expected_utility: f64,
    /// Number of circuit nodes.
    pub size: usize,
    pub compile_time: Duration,
    /// Compilation, weight fixing and evaluation together.
    pub runtime: Duration,
}

struct Prepared<C> {
    circuit: C,
    semiring: MaxExpectedUtility,
    weights: FixedWeights,
    names: BTreeMap<u32, String>,
    compile_time: Duration,
    weight_time: Duration,
}

fn prepare<P: ProgramSource>(program: &P, queries: &[String], reporter: &dyn Reporter) -> Result<Prepared<P::Circuit>> {
    let start = Instant::now();
    let circuit = program.compile(queries)?;
    let compile_time = start.elapsed();
    info!("Compilation took {:?}", compile_time);
    reporter.report(Diagnostic::Timing {
        phase: "Compilation",
        elapsed: compile_time,
    });

    let decisions = circuit.decisions();
    let keys: BTreeSet<Key> = decisions.iter().map(|(_, k)| *k).collect();
    let names: BTreeMap<u32, String> = decisions.into_iter().map(|(n, k)| (k.var(), n)).collect();
    debug!("decisions: {:?}", names);
    let semiring = MaxExpectedUtility::new(&keys);

    let start = Instant::now();
    let fixed = WeightFixer::default().fix(&circuit, &program.utilities(), &keys)?;
    let weight_time = start.elapsed();
    for name in fixed.unresolved {
        reporter.report(Diagnostic::UnresolvedAtom { name });
    }
    reporter.report(Diagnostic::Timing {
        phase: "Fixing weights",
        elapsed: weight_time,
    });

    Ok(Prepared {
        circuit,
        semiring,
        weights: fixed.weights,
        names,
        compile_time,
        weight_time,
    })
}

/// Evaluates every query of `program` under its best strategy.
pub fn map_task<P: ProgramSource>(program: &P, reporter: &dyn Reporter) -> Result<BTreeMap<String, QueryResult>> {
    let queries = program.queries();
    let prepared = prepare(program, &queries, reporter)?;
    let mut evaluator = Evaluator::new(&prepared.circuit, &prepared.semiring, &prepared.weights);

    let start = Instant::now();
    let mut results = BTreeMap::new();
    for query in queries {
        let Some(key) = prepared.circuit.get_node_by_name(&query) else {
            reporter.report(Diagnostic::UnresolvedAtom { name: query });
            continue;
        };
        let value = evaluator.evaluate(key)?;
        let decisions = value
            .decisions
            .iter()
            .filter_map(|d| {
                let name = prepared.names.get(&d.var())?;
                Some(if d.is_negated() { format!("-{}", name) } else { name.clone() })
            })
            .collect();
        results.insert(
            query,
            QueryResult {
                prob: value.prob,
                eu: value.eu,
                decisions,
            },
        );
    }
    reporter.report(Diagnostic::Timing {
        phase: "Circuit evaluation",
        elapsed: start.elapsed(),
    });
    Ok(results)
}

/// Finds the strategy with maximum expected utility for the whole program.
pub fn get_best_decision<P: ProgramSource>(program: &P, reporter: &dyn Reporter) -> Result<BestDecision> {
    let prepared = prepare(program, &["true".to_string()], reporter)?;
    let mut evaluator = Evaluator::new(&prepared.circuit, &prepared.semiring, &prepared.weights);

    let start = Instant::now();
    let value = evaluator.evaluate(Key::TRUE)?;
    let evaluation_time = start.elapsed();
    reporter.report(Diagnostic::Timing {
        phase: "Circuit evaluation",
        elapsed: evaluation_time,
    });

    let decisions: BTreeMap<String, bool> = value
        .decisions
        .iter()
        .filter_map(|d| Some((prepared.names.get(&d.var())?.clone(), !d.is_negated())))
        .collect();
    let runtime = prepared.compile_time + prepared.weight_time + evaluation_time;
    info!("Best decisions {:?} with expected utility {}", decisions, value.eu);

    Ok(BestDecision {
        decisions,
        expected_utility: value.eu,
        size: prepared.circuit.size(),
        compile_time: prepared.compile_time,
        runtime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::circuit::{NnfBuilder, NnfCircuit};
    use crate::program::CompiledProgram;
    use crate::report::{MemoryReporter, NullReporter};
    use crate::weight::{Component, RawWeight};

    fn keys(ks: &[i32]) -> BTreeSet<Key> {
        ks.iter().map(|&k| Key::new(k)).collect()
    }

    fn semiring() -> MaxExpectedUtility {
        MaxExpectedUtility::new(&keys(&[1, 2]))
    }

    #[test]
    fn test_zero_carries_all_decision_literals() {
        let s = semiring();
        assert_eq!(s.zero().decisions, keys(&[-2, -1, 1, 2]));
        assert!(s.is_infeasible(&s.zero()));
        assert!(!s.is_infeasible(&MaxEuValue::new(0.0, 0.0, keys(&[1]))));
    }

    #[test]
    fn test_plus_zero_never_wins() {
        let s = semiring();
        let xs = [
            MaxEuValue::new(0.4, -3.0, keys(&[1])),
            MaxEuValue::new(1.0, 0.0, BTreeSet::new()),
            MaxEuValue::new(0.0, 0.0, keys(&[-2])),
        ];
        for x in xs {
            assert_eq!(s.plus(&s.zero(), &x), x);
            assert_eq!(s.plus(&x, &s.zero()), x);
        }
    }

    #[test]
    fn test_plus_selects_best_ratio() {
        let s = semiring();
        let a = MaxEuValue::new(0.5, 1.0, keys(&[1]));
        let b = MaxEuValue::new(0.25, 1.0, keys(&[-1]));
        assert_eq!(s.plus(&a, &b), b);
        assert_eq!(s.plus(&b, &a), b);

        // Ties keep the left side.
        let c = MaxEuValue::new(1.0, 2.0, keys(&[-1]));
        assert_eq!(s.plus(&a, &c), a);
    }

    #[test]
    fn test_plus_zero_probability() {
        let s = semiring();
        let a = MaxEuValue::new(0.0, 0.0, keys(&[1]));
        let b = MaxEuValue::new(0.5, -7.0, keys(&[-1]));
        assert_eq!(s.plus(&a, &b), b);
        assert_eq!(s.plus(&b, &a), b);
    }

    #[test]
    fn test_plus_without_decisions_sums() {
        let s = semiring();
        let a = MaxEuValue::new(0.3, 1.0, BTreeSet::new());
        let b = MaxEuValue::new(0.7, 2.0, BTreeSet::new());
        assert_eq!(s.plus(&a, &b), MaxEuValue::new(1.0, 3.0, BTreeSet::new()));
    }

    #[test]
    fn test_times_unions_decisions() {
        let s = semiring();
        let a = MaxEuValue::new(0.5, 1.0, keys(&[1]));
        let b = MaxEuValue::new(0.5, 2.0, keys(&[-2]));
        let r = s.times(&a, &b);
        assert_eq!(r.decisions, keys(&[1, -2]));
        assert_eq!(r.decisions.len(), a.decisions.len() + b.decisions.len());
        assert_eq!(r.prob, 0.25);
        assert_eq!(r.eu, 1.5);
        assert_eq!(s.times(&s.one(), &a), a);
    }

    #[test]
    fn test_to_evidence_keeps_decisions_of_dropped_side() {
        let s = semiring();
        let pos = MaxEuValue::new(1.0, 0.0, keys(&[1]));
        let neg = MaxEuValue::new(1.0, 0.0, keys(&[-1]));
        let (p, n) = s.to_evidence(pos.clone(), neg.clone(), true);
        assert_eq!(p, pos);
        assert_eq!(n, MaxEuValue::new(0.0, 0.0, keys(&[-1])));
    }

    #[test]
    fn test_ad_complement() {
        let s = semiring();
        let probs = [
            MaxEuValue::new(0.2, 0.0, BTreeSet::new()),
            MaxEuValue::new(0.5, 0.0, BTreeSet::new()),
        ];
        let c = s.ad_complement(&probs).unwrap();
        assert!((c.prob - 0.3).abs() < 1e-12);

        let decisions = [
            MaxEuValue::new(1.0, 0.0, keys(&[1])),
            MaxEuValue::new(1.0, 0.0, keys(&[2])),
        ];
        assert_eq!(
            s.ad_complement(&decisions).unwrap(),
            MaxEuValue::new(0.0, 0.0, BTreeSet::new())
        );

        let mixed = [
            MaxEuValue::new(0.2, 0.0, BTreeSet::new()),
            MaxEuValue::new(1.0, 0.0, keys(&[1])),
        ];
        assert!(matches!(s.ad_complement(&mixed), Err(Error::InvalidDecisionMix)));
    }

    /// umbrella ∈ {true, false}; rain with probability `p_rain`;
    /// wet ↔ rain ∧ ¬umbrella. Decisions on top.
    fn umbrella(p_rain: f64) -> NnfCircuit {
        let mut b = NnfBuilder::new();
        let u = b.atom("umbrella", 1, RawWeight::Decision);
        let r = b.atom("rain", 2, RawWeight::Prob(p_rain));
        let w = b.atom("wet", 3, RawWeight::True);
        let (lu, lnu) = (b.literal(u), b.literal(-u));
        let (lr, lnr) = (b.literal(r), b.literal(-r));
        let (lw, lnw) = (b.literal(w), b.literal(-w));
        let rain_dry = b.and([lr, lnw]);
        let norain_dry = b.and([lnr, lnw]);
        let covered = b.or([rain_dry, norain_dry]);
        let rain_wet = b.and([lr, lw]);
        let exposed = b.or([rain_wet, norain_dry]);
        let with = b.and([lu, covered]);
        let without = b.and([lnu, exposed]);
        let root = b.or([with, without]);
        b.finish(root)
    }

    fn umbrella_program(p_rain: f64) -> CompiledProgram {
        CompiledProgram::new(umbrella(p_rain))
            .with_utility("umbrella", Component::Known(-2.0))
            .with_utility("wet", Component::Known(-10.0))
            .with_query("wet")
            .with_query("true")
    }

    #[test]
    fn test_best_decision_takes_umbrella() {
        let best = get_best_decision(&umbrella_program(0.3), &NullReporter).unwrap();
        assert_eq!(best.decisions, BTreeMap::from([("umbrella".to_string(), true)]));
        assert!((best.expected_utility - -2.0).abs() < 1e-9);
        assert_eq!(best.size, umbrella(0.3).size());
    }

    #[test]
    fn test_best_decision_leaves_umbrella() {
        let best = get_best_decision(&umbrella_program(0.1), &NullReporter).unwrap();
        assert_eq!(best.decisions, BTreeMap::from([("umbrella".to_string(), false)]));
        assert!((best.expected_utility - -1.0).abs() < 1e-9);
    }

    #[test]
    fn test_map_task() {
        let reporter = MemoryReporter::new();
        let results = map_task(&umbrella_program(0.3).with_query("ghost"), &reporter).unwrap();

        let t = &results["true"];
        assert!((t.prob - 1.0).abs() < 1e-9);
        assert!((t.eu - -2.0).abs() < 1e-9);
        assert_eq!(t.decisions, BTreeSet::from(["umbrella".to_string()]));

        // Forcing wet rules out the umbrella.
        let wet = &results["wet"];
        assert!((wet.prob - 0.3).abs() < 1e-9);
        assert_eq!(wet.decisions, BTreeSet::from(["-umbrella".to_string()]));

        assert!(!results.contains_key("ghost"));
        assert!(reporter
            .entries()
            .contains(&Diagnostic::UnresolvedAtom { name: "ghost".into() }));
    }

    #[test]
    fn test_unconstrained_decision() {
        // A decision that no clause mentions defaults to the positive choice.
        let mut b = NnfBuilder::new();
        let a = b.atom("a", 1, RawWeight::Prob(0.5));
        b.atom("d", 2, RawWeight::Decision);
        let x = b.literal(a);
        let nx = b.literal(-a);
        let root = b.or([x, nx]);
        let program = CompiledProgram::new(b.finish(root)).with_utility("a", Component::Known(4.0));
        let best = get_best_decision(&program, &NullReporter).unwrap();
        assert_eq!(best.decisions, BTreeMap::from([("d".to_string(), true)]));
        assert!((best.expected_utility - 2.0).abs() < 1e-9);
    }
}
