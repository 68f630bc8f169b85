//! Weight shapes: raw annotations as delivered by the circuit, and the fixed
//! positive/negative weight pairs consumed by the semirings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use crate::key::Key;
use crate::value::Value;

/// A numeric annotation that is either known or still to be learned.
///
/// `Unknown(Some(x))` is an unknown whose learning starts from `x`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Component {
    Known(f64),
    Unknown(Option<f64>),
}

/// Utility assigned to an atom by a `utility(atom, value)` clause.
pub type UtilityValue = Component;

/// Raw per-variable weight, as produced by the circuit compiler.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RawWeight {
    /// Deterministic (derived) atom: weight 1 on both signs.
    True,
    /// Fixed probability.
    Prob(f64),
    /// Unknown probability, with an optional initial value.
    Unknown(Option<f64>),
    /// Probability/utility pair, each component possibly unknown.
    Eu { prob: Component, cost: Component },
    /// Decision indicator (`?::d`).
    Decision,
}

/// Contribution of one literal: its probability, the utility of it being true,
/// and the decisions committed by choosing it.
#[derive(Debug, Clone, PartialEq)]
pub struct EuTerm {
    pub prob: Value,
    pub cost: Value,
    pub decisions: BTreeSet<Key>,
}

impl EuTerm {
    pub fn new(prob: Value, cost: Value) -> Self {
        Self {
            prob,
            cost,
            decisions: BTreeSet::new(),
        }
    }

    pub fn fixed(prob: f64, cost: f64) -> Self {
        Self::new(Value::Fixed(prob), Value::Fixed(cost))
    }

    pub fn with_decision(mut self, decision: Key) -> Self {
        self.decisions.insert(decision);
        self
    }
}

impl Display for EuTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "s({}, {})", self.prob, self.cost)?;
        if !self.decisions.is_empty() {
            let ds: Vec<String> = self.decisions.iter().map(|d| d.get().to_string()).collect();
            write!(f, "{{{}}}", ds.join(","))?;
        }
        Ok(())
    }
}

/// Finalised weight of a variable: one term for the literal, one for its negation.
#[derive(Debug, Clone, PartialEq)]
pub struct PnWeight {
    pub pos: EuTerm,
    pub neg: EuTerm,
}

impl PnWeight {
    pub fn new(pos: EuTerm, neg: EuTerm) -> Self {
        Self { pos, neg }
    }

    /// Weight of a deterministic atom: `((1, 0), (1, 0))`.
    pub fn certain() -> Self {
        Self::new(EuTerm::fixed(1.0, 0.0), EuTerm::fixed(1.0, 0.0))
    }

    /// Weight of a fixed probability: `((p, 0), (1 - p, 0))`.
    pub fn probability(p: f64) -> Self {
        Self::new(EuTerm::fixed(p, 0.0), EuTerm::fixed(1.0 - p, 0.0))
    }

    /// Weight of decision `var`: both branches certain, tagged with the chosen literal.
    pub fn decision(var: u32) -> Self {
        Self::new(
            EuTerm::fixed(1.0, 0.0).with_decision(Key::literal(var, true)),
            EuTerm::fixed(1.0, 0.0).with_decision(Key::literal(var, false)),
        )
    }

    /// Term of the given branch.
    pub fn branch(&self, positive: bool) -> &EuTerm {
        if positive {
            &self.pos
        } else {
            &self.neg
        }
    }

    pub fn branch_mut(&mut self, positive: bool) -> &mut EuTerm {
        if positive {
            &mut self.pos
        } else {
            &mut self.neg
        }
    }

    /// The same weight seen from the negated literal.
    pub fn swapped(&self) -> Self {
        Self::new(self.neg.clone(), self.pos.clone())
    }
}

impl Display for PnWeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.pos, self.neg)
    }
}

/// Fixed weights indexed by variable; variable 0 is the always-true slot.
pub type FixedWeights = BTreeMap<u32, PnWeight>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_weight() {
        let w = PnWeight::probability(0.3);
        assert_eq!(w.pos.prob.resolve(), 0.3);
        assert!((w.neg.prob.resolve() - 0.7).abs() < 1e-12);
        assert_eq!(w.pos.cost.resolve(), 0.0);
        assert_eq!(w.neg.cost.resolve(), 0.0);
    }

    #[test]
    fn test_decision_weight() {
        let w = PnWeight::decision(4);
        assert_eq!(w.pos.decisions, BTreeSet::from([Key::new(4)]));
        assert_eq!(w.neg.decisions, BTreeSet::from([Key::new(-4)]));
        assert_eq!(w.pos.prob.resolve(), 1.0);
        assert_eq!(w.neg.prob.resolve(), 1.0);
    }

    #[test]
    fn test_swapped() {
        let w = PnWeight::probability(0.25);
        let s = w.swapped();
        assert_eq!(s.pos, w.neg);
        assert_eq!(s.neg, w.pos);
    }

    #[test]
    fn test_display() {
        let w = PnWeight::decision(2);
        assert_eq!(w.to_string(), "(s(1, 0){2}, s(1, 0){-2})");
    }
}
