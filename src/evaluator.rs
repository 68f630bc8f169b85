//! Circuit evaluation under a semiring.
//!
//! The [`Evaluator`] combines a circuit, a semiring and fixed weights. Evidence pins
//! literals: a pinned variable keeps only the branch of its asserted sign. Values are
//! conditioned on the evidence by normalising with the total mass `Z` of the
//! evidence, computed by [`Evaluator::propagate`].
//!
//! Nothing is cached between calls. Weights may refer into a shared
//! [`ParameterStore`][crate::store::ParameterStore], and every evaluation reads the
//! values stored at that moment.
//!
//! For a key `k`, [`Evaluator::evaluate`] pins `k` on top of the evidence and returns
//! `normalize(Z(E ∪ {k}), Z(E))`: the conditional probability of `k` and its
//! normalised expected utility. Key `0` returns `normalize(Z(E), Z(E))`, whose
//! utility component is the conditional expected utility of the whole theory.
//!
//! Evidence added through [`Evaluator::with_evidence`] is scoped: dropping the
//! returned [`EvidenceScope`] restores the evidence that was set before, also when
//! the evaluation in between failed.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use log::debug;

use crate::circuit::{Circuit, NodeKind};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::semiring::Semiring;
use crate::weight::FixedWeights;

pub struct Evaluator<'a, C: Circuit, S: Semiring> {
    circuit: &'a C,
    semiring: &'a S,
    weights: &'a FixedWeights,
    evidence: BTreeMap<u32, bool>,
}

impl<'a, C: Circuit, S: Semiring> Evaluator<'a, C, S> {
    pub fn new(circuit: &'a C, semiring: &'a S, weights: &'a FixedWeights) -> Self {
        Self {
            circuit,
            semiring,
            weights,
            evidence: BTreeMap::new(),
        }
    }

    pub fn semiring(&self) -> &S {
        self.semiring
    }

    /// Pinned variables and their asserted signs.
    pub fn evidence(&self) -> &BTreeMap<u32, bool> {
        &self.evidence
    }

    /// Pins literal `lit` to true. Evidence on key 0 is a no-op.
    pub fn add_evidence(&mut self, lit: Key) {
        if lit.is_true() {
            return;
        }
        self.evidence.insert(lit.var(), !lit.is_negated());
    }

    pub fn clear_evidence(&mut self) {
        self.evidence.clear();
    }

    /// Pins every `(key, value)` pair until the returned scope is dropped.
    pub fn with_evidence(&mut self, evidence: &[(Key, bool)]) -> EvidenceScope<'_, 'a, C, S> {
        let saved = self.evidence.clone();
        for &(key, value) in evidence {
            self.add_evidence(if value { key } else { -key });
        }
        EvidenceScope { evaluator: self, saved }
    }

    /// Computes the normalising mass of the current evidence.
    pub fn propagate(&self) -> Result<S::Element> {
        let z = self.total(None);
        debug!("propagate: Z = {:?} under {} pinned literals", z, self.evidence.len());
        if self.semiring.probability(&z) <= 0.0 {
            return Err(Error::InconsistentEvidence);
        }
        Ok(z)
    }

    /// Value of `key` conditioned on the current evidence.
    pub fn evaluate(&mut self, key: Key) -> Result<S::Element> {
        let z = self.propagate()?;
        let total = if key.is_true() { z.clone() } else { self.total(Some(key)) };
        Ok(self.semiring.normalize(&total, &z))
    }

    /// Positive and negative element of `var`, with evidence and `query` applied.
    fn literal_pair(&self, var: u32, query: Option<Key>) -> (S::Element, S::Element) {
        let s = self.semiring;
        let (mut pos, mut neg) = match self.weights.get(&var) {
            Some(w) => (s.pos_value(w), s.neg_value(w)),
            None => (s.one(), s.one()),
        };
        if let Some(&sign) = self.evidence.get(&var) {
            (pos, neg) = s.to_evidence(pos, neg, sign);
        }
        if let Some(q) = query {
            if q.var() == var {
                (pos, neg) = s.to_evidence(pos, neg, !q.is_negated());
            }
        }
        (pos, neg)
    }

    /// Unnormalised mass of the theory, optionally with `query` pinned.
    fn total(&self, query: Option<Key>) -> S::Element {
        let s = self.semiring;
        let root = self.circuit.root();

        let mut values: Vec<S::Element> = Vec::with_capacity(root + 1);
        for id in 0..=root {
            let value = match self.circuit.node(id) {
                NodeKind::True => s.one(),
                NodeKind::False => s.zero(),
                NodeKind::Literal(k) => {
                    let (pos, neg) = self.literal_pair(k.var(), query);
                    if k.is_negated() {
                        neg
                    } else {
                        pos
                    }
                }
                NodeKind::And(cs) => cs.iter().fold(s.one(), |acc, &c| s.times(&acc, &values[c])),
                NodeKind::Or(cs) => cs.iter().fold(s.zero(), |acc, &c| s.plus(&acc, &values[c])),
            };
            values.push(value);
        }
        let mut result = values.swap_remove(root);

        // Weighted variables the circuit does not constrain.
        let variables = self.circuit.variables();
        for &var in self.weights.keys() {
            if var != 0 && !variables.contains(&var) {
                let (pos, neg) = self.literal_pair(var, query);
                result = s.times(&result, &s.plus(&pos, &neg));
            }
        }

        match self.weights.get(&0) {
            Some(w) => s.times(&s.pos_value(w), &result),
            None => result,
        }
    }
}

/// Evidence pinned by [`Evaluator::with_evidence`], released on drop.
pub struct EvidenceScope<'e, 'a, C: Circuit, S: Semiring> {
    evaluator: &'e mut Evaluator<'a, C, S>,
    saved: BTreeMap<u32, bool>,
}

impl<'a, C: Circuit, S: Semiring> Deref for EvidenceScope<'_, 'a, C, S> {
    type Target = Evaluator<'a, C, S>;

    fn deref(&self) -> &Self::Target {
        self.evaluator
    }
}

impl<C: Circuit, S: Semiring> DerefMut for EvidenceScope<'_, '_, C, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.evaluator
    }
}

impl<C: Circuit, S: Semiring> Drop for EvidenceScope<'_, '_, C, S> {
    fn drop(&mut self) {
        self.evaluator.evidence = std::mem::take(&mut self.saved);
    }
}

/// Evaluates `key` once under the given evidence.
pub fn evaluate<C: Circuit, S: Semiring>(
    circuit: &C,
    semiring: &S,
    weights: &FixedWeights,
    key: Key,
    evidence: &[(Key, bool)],
) -> Result<S::Element> {
    let mut evaluator = Evaluator::new(circuit, semiring, weights);
    let mut scope = evaluator.with_evidence(evidence);
    scope.evaluate(key)
}
