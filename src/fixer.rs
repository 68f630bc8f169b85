//! Weight fixing.
//!
//! Turns the raw per-variable annotations of a circuit plus a set of utility
//! assignments into [`FixedWeights`]: one [`PnWeight`] per variable, with a dynamic
//! reference wherever a probability or utility is still unknown.
//!
//! Variable 0 is the always-true slot. Utilities of atoms that are true in every
//! world end up there, and since `-0 == 0` both of its branches carry them.
//!
//! Fixed utilities accumulate (several utility clauses may name the same literal);
//! an unknown utility replaces whatever fixed cost the branch had.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::store::ParameterStore;
use crate::value::Value;
use crate::weight::{Component, EuTerm, FixedWeights, PnWeight, RawWeight, UtilityValue};

/// Output of [`WeightFixer::fix`].
#[derive(Debug, Clone)]
pub struct FixedParameters {
    pub weights: FixedWeights,
    pub store: ParameterStore,
    /// Literal key -> index of its unknown utility in `store.utilities()`.
    pub key_to_util_index: BTreeMap<Key, usize>,
    /// Variable key -> index of its unknown probability in `store.probabilities()`.
    pub key_to_prob_index: BTreeMap<Key, usize>,
    /// Utility atoms that do not occur in the circuit.
    pub unresolved: Vec<String>,
}

impl FixedParameters {
    /// Weight of a literal as seen from that literal: swapped for negative keys.
    pub fn weight_of(&self, key: Key) -> Option<PnWeight> {
        let w = self.weights.get(&key.var())?;
        Some(if key.is_negated() { w.swapped() } else { w.clone() })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeightFixer {
    /// Initial value of unknown probabilities without a seed.
    pub init_probability: f64,
    /// Initial value of unknown utilities without a seed.
    pub init_utility: f64,
}

impl Default for WeightFixer {
    fn default() -> Self {
        Self {
            init_probability: 0.5,
            init_utility: 0.0,
        }
    }
}

impl WeightFixer {
    pub fn new(init_probability: f64, init_utility: f64) -> Self {
        Self {
            init_probability,
            init_utility,
        }
    }

    pub fn fix<C: Circuit>(
        &self,
        circuit: &C,
        utilities: &[(String, UtilityValue)],
        decision_keys: &BTreeSet<Key>,
    ) -> Result<FixedParameters> {
        let store = ParameterStore::new();
        let mut weights = FixedWeights::new();
        let mut key_to_util_index = BTreeMap::new();
        let mut key_to_prob_index = BTreeMap::new();

        weights.insert(0, PnWeight::certain());

        for (&var, raw) in circuit.get_weights() {
            let key = Key::positive(var);
            let weight = match *raw {
                RawWeight::True => PnWeight::certain(),
                RawWeight::Prob(p) => PnWeight::probability(check_probability(var, p)?),
                RawWeight::Unknown(init) => {
                    let (pos, neg) = self.unknown_probability(&store, var, init, key, &mut key_to_prob_index)?;
                    PnWeight::new(EuTerm::new(pos, Value::ZERO), EuTerm::new(neg, Value::ZERO))
                }
                RawWeight::Eu { prob, cost } => {
                    let (pos, neg) = match prob {
                        Component::Known(p) => {
                            let p = check_probability(var, p)?;
                            (Value::Fixed(p), Value::Fixed(1.0 - p))
                        }
                        Component::Unknown(init) => {
                            self.unknown_probability(&store, var, init, key, &mut key_to_prob_index)?
                        }
                    };
                    let cost = match cost {
                        Component::Known(c) => Value::Fixed(check_utility(var, c)?),
                        Component::Unknown(init) => {
                            let r = store.new_utility(init.unwrap_or(self.init_utility));
                            key_to_util_index.insert(key, r.index());
                            Value::Ref(r)
                        }
                    };
                    PnWeight::new(EuTerm::new(pos, cost), EuTerm::new(neg, Value::ZERO))
                }
                RawWeight::Decision => {
                    if decision_keys.contains(&key) {
                        PnWeight::decision(var)
                    } else {
                        PnWeight::certain()
                    }
                }
            };
            debug!("fix: {} -> {}", key, weight);
            weights.insert(var, weight);
        }

        let raw_weights = circuit.get_weights();
        for d in decision_keys {
            if d.is_negated() || d.is_true() || !matches!(raw_weights.get(&d.var()), Some(RawWeight::Decision)) {
                return Err(Error::Schema(format!("decision key {} has no decision indicator weight", d)));
            }
        }

        let mut unresolved = Vec::new();
        for (name, utility) in utilities {
            let Some(key) = circuit.get_node_by_name(name) else {
                warn!("Utility atom {} does not occur in the circuit, skipped", name);
                unresolved.push(name.clone());
                continue;
            };
            let weight = weights
                .get_mut(&key.var())
                .ok_or_else(|| Error::Schema(format!("utility on {} ({}) which has no weight", name, key)))?;
            let branches: &[bool] = if key.is_true() {
                &[true, false]
            } else if key.is_negated() {
                &[false]
            } else {
                &[true]
            };

            match *utility {
                Component::Known(c) => {
                    let c = check_utility(key.var(), c)?;
                    for &positive in branches {
                        let term = weight.branch_mut(positive);
                        match term.cost {
                            Value::Fixed(x) => term.cost = Value::Fixed(x + c),
                            Value::Ref(_) => debug!("fix: {} keeps its unknown utility over {}", key, c),
                        }
                    }
                }
                Component::Unknown(init) => {
                    if let Value::Ref(r) = &weight.branch(branches[0]).cost {
                        debug!("fix: {} already has unknown utility t({})", key, r.index());
                        key_to_util_index.entry(key).or_insert(r.index());
                        continue;
                    }
                    let r = store.new_utility(init.unwrap_or(self.init_utility));
                    key_to_util_index.insert(key, r.index());
                    for &positive in branches {
                        weight.branch_mut(positive).cost = Value::Ref(r.clone());
                    }
                }
            }
        }

        Ok(FixedParameters {
            weights,
            store,
            key_to_util_index,
            key_to_prob_index,
            unresolved,
        })
    }

    fn unknown_probability(
        &self,
        store: &ParameterStore,
        var: u32,
        init: Option<f64>,
        key: Key,
        key_to_prob_index: &mut BTreeMap<Key, usize>,
    ) -> Result<(Value, Value)> {
        let p = check_probability(var, init.unwrap_or(self.init_probability))?;
        let pos = store.new_probability(p);
        let neg = store.new_probability(1.0 - p);
        key_to_prob_index.insert(key, pos.index());
        Ok((Value::Ref(pos), Value::Ref(neg)))
    }
}

fn check_probability(var: u32, p: f64) -> Result<f64> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(Error::Schema(format!("variable {} has invalid probability {}", var, p)))
    }
}

fn check_utility(var: u32, u: f64) -> Result<f64> {
    if u.is_finite() {
        Ok(u)
    } else {
        Err(Error::Schema(format!("variable {} has invalid utility {}", var, u)))
    }
}
