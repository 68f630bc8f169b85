//! Semirings for circuit evaluation.
//!
//! A [`Semiring`] turns literal weights into elements and combines them bottom-up:
//! `plus` at OR nodes, `times` at AND nodes. [`ExpectedUtility`] computes, for every
//! node, the pair `(probability, expected utility)`, where the expected utility of a
//! set of worlds is the sum over those worlds of `P(world) * U(world)`.
//!
//! The maximising, decision-aware variant lives in [`crate::maxeu`].

use std::fmt::Debug;

use crate::error::Result;
use crate::weight::{EuTerm, PnWeight};

/// Tolerance used by `is_zero`/`is_one` checks.
pub const EPSILON: f64 = 1e-12;

pub trait Semiring {
    type Element: Clone + Debug + PartialEq;

    fn one(&self) -> Self::Element;
    fn zero(&self) -> Self::Element;
    fn plus(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;
    fn times(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;
    fn negate(&self, a: &Self::Element) -> Self::Element;

    /// Element of a single fixed term.
    fn value(&self, term: &EuTerm) -> Self::Element;

    fn pos_value(&self, weight: &PnWeight) -> Self::Element {
        self.value(&weight.pos)
    }

    fn neg_value(&self, weight: &PnWeight) -> Self::Element {
        self.value(&weight.neg)
    }

    /// Conditions `a` on the total mass `z`.
    fn normalize(&self, a: &Self::Element, z: &Self::Element) -> Self::Element;

    /// Probability component of an element.
    fn probability(&self, a: &Self::Element) -> f64;

    /// Pins a literal: keeps the branch of the asserted sign and zeroes the other.
    fn to_evidence(
        &self,
        pos: Self::Element,
        neg: Self::Element,
        positive: bool,
    ) -> (Self::Element, Self::Element);

    /// Complement of the alternatives of one annotated disjunction.
    fn ad_complement(&self, ws: &[Self::Element]) -> Result<Self::Element>;

    fn is_zero(&self, a: &Self::Element) -> bool;
    fn is_one(&self, a: &Self::Element) -> bool;
}

/// Element of [`ExpectedUtility`]: probability and probability-scaled utility.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EuValue {
    pub prob: f64,
    pub eu: f64,
}

impl EuValue {
    pub const fn new(prob: f64, eu: f64) -> Self {
        Self { prob, eu }
    }
}

/// The plain expected-utility semiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpectedUtility;

impl Semiring for ExpectedUtility {
    type Element = EuValue;

    fn one(&self) -> EuValue {
        EuValue::new(1.0, 0.0)
    }

    fn zero(&self) -> EuValue {
        EuValue::new(0.0, 0.0)
    }

    fn plus(&self, a: &EuValue, b: &EuValue) -> EuValue {
        EuValue::new(a.prob + b.prob, a.eu + b.eu)
    }

    fn times(&self, a: &EuValue, b: &EuValue) -> EuValue {
        EuValue::new(a.prob * b.prob, a.prob * b.eu + b.prob * a.eu)
    }

    /// The utility of the complement cannot be recovered from `a` and is taken to be 0.
    fn negate(&self, a: &EuValue) -> EuValue {
        EuValue::new(1.0 - a.prob, 0.0)
    }

    fn value(&self, term: &EuTerm) -> EuValue {
        let p = term.prob.resolve();
        let u = term.cost.resolve();
        EuValue::new(p, p * u)
    }

    fn normalize(&self, a: &EuValue, z: &EuValue) -> EuValue {
        if a.prob == 0.0 {
            return self.zero();
        }
        EuValue::new(a.prob / z.prob, a.eu / z.prob)
    }

    fn probability(&self, a: &EuValue) -> f64 {
        a.prob
    }

    fn to_evidence(&self, pos: EuValue, neg: EuValue, positive: bool) -> (EuValue, EuValue) {
        if positive {
            (pos, self.zero())
        } else {
            (self.zero(), neg)
        }
    }

    fn ad_complement(&self, ws: &[EuValue]) -> Result<EuValue> {
        let s = ws.iter().fold(self.zero(), |acc, w| self.plus(&acc, w));
        Ok(self.negate(&s))
    }

    fn is_zero(&self, a: &EuValue) -> bool {
        a.prob.abs() < EPSILON && a.eu.abs() < EPSILON
    }

    fn is_one(&self, a: &EuValue) -> bool {
        (a.prob - 1.0).abs() < EPSILON && a.eu.abs() < EPSILON
    }
}
