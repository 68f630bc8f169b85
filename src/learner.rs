//! Learning unknown utilities from examples.
//!
//! Each example pins some atoms and gives the expected utility observed under that
//! evidence. The learner minimises the mean squared error between the conditional
//! expected utility predicted by the circuit and these targets:
//!
//! ```text
//! MSE = 1/M Σ_j (ceu(E_j) - u_j)²
//! ∂MSE/∂u_i = 2/M Σ_j (ceu(E_j) - u_j) · P(f_i | E_j)
//! ```
//!
//! where `f_i` is the literal whose branch carries unknown utility `u_i`. Updates are
//! written into the shared [`ParameterStore`](crate::store::ParameterStore), so the
//! circuit weights see them immediately.
//!
//! Three variants are available: fixed-rate mini-batch descent ([`ULearner::learn`]),
//! descent with an adaptive learning rate ([`ULearner::learn_adaptive_rate`]), and the
//! adaptive variant with a held-out test set, early stopping and random restarts
//! ([`ULearner::learn_adaptive_rate_left_out`]).

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::circuit::Circuit;
use crate::data::{Example, ProcessedExample};
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::fixer::{FixedParameters, WeightFixer};
use crate::key::Key;
use crate::program::ProgramSource;
use crate::report::{Diagnostic, LogReporter, NullReporter, Reporter};
use crate::semiring::ExpectedUtility;
use crate::weight::UtilityValue;

/// Learner settings.
#[derive(Debug, Clone)]
pub struct LearnerConfig {
    /// Examples per gradient step. Clamped to the number of examples.
    pub batch_size: usize,
    pub max_epoch: usize,
    pub learning_rate: f64,
    /// Initial value of unknown probabilities.
    pub lfi_p_init_value: f64,
    /// Initial value of unknown utilities without a seed.
    pub lfi_u_init_value: f64,
    pub increase_rate: f64,
    pub decrease_rate: f64,
    /// Consecutive rejected steps (at a rate of at most 1) before a batch is given up.
    pub max_attempts: usize,
    pub min_learning_rate: f64,
    /// Fraction of the examples held out as test set.
    pub left_out: f64,
    /// Inclusive integer range random restarts draw utilities from.
    pub random_utility_range: (i64, i64),
    pub seed: u64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_epoch: 100,
            learning_rate: 0.4,
            lfi_p_init_value: 0.5,
            lfi_u_init_value: 0.0,
            increase_rate: 1.1,
            decrease_rate: 0.9,
            max_attempts: 10,
            min_learning_rate: 1e-4,
            left_out: 0.3,
            random_utility_range: (-50, 50),
            seed: 0,
        }
    }
}

/// History of a learning run.
#[derive(Debug, Clone, Default)]
pub struct LearnLog {
    /// Training MSE before learning and after every epoch.
    pub mse: Vec<f64>,
    /// Held-out MSE, only filled by the left-out variant.
    pub mse_test: Vec<f64>,
    /// Every accepted gradient.
    pub gradients: Vec<BTreeMap<Key, f64>>,
    /// Utility snapshots, taken alongside `mse` by the adaptive variants.
    pub weights: Vec<BTreeMap<String, f64>>,
}

/// Learning-rate state of the adaptive variants.
#[derive(Debug, Clone, Copy)]
struct Adaptive {
    learning_rate: f64,
    attempt: usize,
    sweeps: usize,
    increase: f64,
    decrease: f64,
}

pub struct ULearner<C: Circuit> {
    circuit: C,
    semiring: ExpectedUtility,
    fixed: FixedParameters,
    examples: Vec<ProcessedExample>,
    term_to_key: BTreeMap<String, Key>,
    config: LearnerConfig,
    log: LearnLog,
    reporter: Box<dyn Reporter>,
    rng: ChaCha8Rng,
}

impl<C: Circuit> ULearner<C> {
    pub fn new(
        circuit: C,
        utilities: &[(String, UtilityValue)],
        examples: &[Example],
        config: LearnerConfig,
    ) -> Result<Self> {
        Self::with_reporter(circuit, utilities, examples, config, Box::new(NullReporter))
    }

    /// Fixes the circuit weights and translates the examples to circuit keys.
    pub fn with_reporter(
        circuit: C,
        utilities: &[(String, UtilityValue)],
        examples: &[Example],
        mut config: LearnerConfig,
        reporter: Box<dyn Reporter>,
    ) -> Result<Self> {
        config.batch_size = config.batch_size.min(examples.len()).max(1);

        let start = Instant::now();
        let fixer = WeightFixer::new(config.lfi_p_init_value, config.lfi_u_init_value);
        let fixed = fixer.fix(&circuit, utilities, &BTreeSet::new())?;
        for name in &fixed.unresolved {
            reporter.report(Diagnostic::UnresolvedAtom { name: name.clone() });
        }
        reporter.report(Diagnostic::Timing {
            phase: "Fixing weights",
            elapsed: start.elapsed(),
        });
        debug!("utility parameters: {:?}", fixed.store.utilities());

        let examples = examples.iter().map(|e| e.translate(&circuit, &*reporter)).collect();
        let term_to_key = utilities
            .iter()
            .filter_map(|(name, _)| Some((name.clone(), circuit.get_node_by_name(name)?)))
            .collect();
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        Ok(Self {
            circuit,
            semiring: ExpectedUtility,
            fixed,
            examples,
            term_to_key,
            config,
            log: LearnLog::default(),
            reporter,
            rng,
        })
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn circuit(&self) -> &C {
        &self.circuit
    }

    pub fn log(&self) -> &LearnLog {
        &self.log
    }

    pub fn parameters(&self) -> &FixedParameters {
        &self.fixed
    }

    /// The examples in circuit-key form. Unresolved observations are already dropped.
    pub fn processed_examples(&self) -> &[ProcessedExample] {
        &self.examples
    }

    /// Current value of every unknown utility, by atom name.
    pub fn get_current_util_weights(&self) -> BTreeMap<String, f64> {
        self.term_to_key
            .iter()
            .filter_map(|(name, key)| {
                let index = self.fixed.key_to_util_index.get(key)?;
                Some((name.clone(), self.fixed.store.utility(*index)))
            })
            .collect()
    }

    /// Sets unknown utilities by atom name. Names without an unknown utility are ignored.
    pub fn set_current_util_weights(&self, utilities: &BTreeMap<String, f64>) {
        for (name, &value) in utilities {
            let index = self
                .term_to_key
                .get(name)
                .and_then(|key| self.fixed.key_to_util_index.get(key));
            if let Some(&index) = index {
                self.fixed.store.set_utility(index, value);
            }
        }
    }

    /// Draws every unknown utility uniformly from `random_utility_range`.
    pub fn set_random_utilities(&mut self) {
        let (lo, hi) = self.config.random_utility_range;
        for index in self.fixed.store.utility_indices() {
            let value = self.rng.random_range(lo..=hi);
            self.fixed.store.set_utility(index, value as f64);
        }
    }

    /// Predicted conditional expected utility under the evidence of `example`.
    pub fn predict(&self, example: &ProcessedExample) -> Result<f64> {
        let mut evaluator = Evaluator::new(&self.circuit, &self.semiring, &self.fixed.weights);
        let mut scope = evaluator.with_evidence(&example.evidence);
        Ok(scope.evaluate(Key::TRUE)?.eu)
    }

    /// Mean squared error of the current utilities on `examples`, 0 for none.
    pub fn mse(&self, examples: &[ProcessedExample]) -> Result<f64> {
        if examples.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0.0;
        for example in examples {
            let diff = self.predict(example)? - example.utility;
            total += diff * diff;
        }
        Ok(total / examples.len() as f64)
    }

    /// Gradient of the batch MSE with respect to every unknown utility.
    pub fn gradients(&self, batch: &[ProcessedExample]) -> Result<BTreeMap<Key, f64>> {
        let mut gradients: BTreeMap<Key, f64> = self.fixed.key_to_util_index.keys().map(|&k| (k, 0.0)).collect();
        if batch.is_empty() {
            return Ok(gradients);
        }
        let mut evaluator = Evaluator::new(&self.circuit, &self.semiring, &self.fixed.weights);
        for example in batch {
            let mut scope = evaluator.with_evidence(&example.evidence);
            let error = scope.evaluate(Key::TRUE)?.eu - example.utility;
            for (&key, gradient) in gradients.iter_mut() {
                *gradient += error * scope.evaluate(key)?.prob;
            }
        }
        let scale = 2.0 / batch.len() as f64;
        for gradient in gradients.values_mut() {
            *gradient *= scale;
        }
        Ok(gradients)
    }

    /// Moves every unknown utility by `-rate * gradient`.
    fn step(&self, gradients: &BTreeMap<Key, f64>, rate: f64) {
        for (key, &index) in &self.fixed.key_to_util_index {
            if let Some(g) = gradients.get(key) {
                self.fixed.store.utilities().add(index, -rate * g);
            }
        }
    }

    fn record_mse(&mut self, mse: f64) {
        self.log.mse.push(mse);
    }

    fn record_weights(&mut self) {
        let weights = self.get_current_util_weights();
        self.log.weights.push(weights);
    }

    /// Mini-batch gradient descent with a fixed learning rate for `max_epoch` epochs.
    pub fn learn(&mut self) -> Result<BTreeMap<String, f64>> {
        let examples = self.examples.clone();
        let rate = self.config.learning_rate;

        let total = self.mse(&examples)?;
        self.record_mse(total);

        for epoch in 1..=self.config.max_epoch {
            for batch in examples.chunks(self.config.batch_size) {
                let gradients = self.gradients(batch)?;
                debug!("gradients: {:?}", gradients);
                self.step(&gradients, rate);
                self.log.gradients.push(gradients);
            }
            let total = self.mse(&examples)?;
            self.record_mse(total);
            self.reporter.report(Diagnostic::EpochFinished { epoch, mse: total });
        }
        Ok(self.get_current_util_weights())
    }

    /// Sweep budget for `n` training examples.
    fn max_sweeps(&self, n: usize) -> f64 {
        (self.config.max_epoch * n) as f64 / self.config.batch_size as f64 * 3.0
    }

    fn adaptive(&self, increase: f64, decrease: f64) -> Adaptive {
        Adaptive {
            learning_rate: self.config.learning_rate,
            attempt: 0,
            sweeps: 0,
            increase,
            decrease,
        }
    }

    fn may_continue(&self, state: &Adaptive, epoch: usize, max_sweeps: f64) -> bool {
        epoch < self.config.max_epoch
            && state.learning_rate > self.config.min_learning_rate
            && (state.sweeps as f64) < max_sweeps
    }

    /// One adaptive epoch over `data`. Returns the training MSE after the epoch.
    ///
    /// Per batch, a step that makes the batch MSE worse is undone and retried at a
    /// smaller rate; an accepted step grows the rate. A batch is given up once
    /// `max_attempts` steps in a row were rejected at a rate of at most 1.
    fn adaptive_epoch(&mut self, data: &[ProcessedExample], state: &mut Adaptive) -> Result<f64> {
        let mut last = 0.0;
        for batch in data.chunks(self.config.batch_size) {
            let prev_mse = self.mse(batch)?;
            let mut mse = f64::INFINITY;
            while prev_mse < mse && !(state.learning_rate <= 1.0 && state.attempt > self.config.max_attempts) {
                state.sweeps += 1;
                let gradients = self.gradients(batch)?;
                self.step(&gradients, state.learning_rate);
                mse = self.mse(batch)?;

                if prev_mse < mse {
                    self.step(&gradients, -state.learning_rate);
                    if state.learning_rate <= 1.0 {
                        state.attempt += 1;
                    }
                    state.learning_rate *= state.decrease;
                } else {
                    state.learning_rate *= state.increase;
                    state.attempt = 0;
                    self.log.gradients.push(gradients);
                }
                self.reporter.report(Diagnostic::BatchStep {
                    prev_mse,
                    mse,
                    learning_rate: state.learning_rate,
                });
            }
            // Rejected steps are undone, so the batch keeps its previous error.
            last = mse.min(prev_mse);
        }

        if self.config.batch_size != data.len() {
            self.mse(data)
        } else {
            Ok(last)
        }
    }

    /// Gradient descent with an adaptive learning rate.
    ///
    /// Stops after `max_epoch` epochs, once the rate drops to `min_learning_rate`, or
    /// once the sweep budget `max_epoch * M / batch_size * 3` is spent.
    pub fn learn_adaptive_rate(&mut self, increase_rate: f64, decrease_rate: f64) -> Result<BTreeMap<String, f64>> {
        let examples = self.examples.clone();
        let mut state = self.adaptive(increase_rate, decrease_rate);
        let max_sweeps = self.max_sweeps(examples.len());

        let total = self.mse(&examples)?;
        self.record_mse(total);
        self.record_weights();

        let mut epoch = 0;
        while self.may_continue(&state, epoch, max_sweeps) {
            epoch += 1;
            let total = self.adaptive_epoch(&examples, &mut state)?;
            self.reporter.report(Diagnostic::EpochFinished { epoch, mse: total });
            self.record_mse(total);
            self.record_weights();
        }
        info!(
            "Adaptive learning stopped after {} epochs ({} sweeps, learning rate {})",
            epoch, state.sweeps, state.learning_rate
        );
        Ok(self.get_current_util_weights())
    }

    /// Adaptive learning with the last `left_out` fraction of the examples held out.
    ///
    /// A run stops as soon as the held-out MSE increases; the next run starts from
    /// random utilities. All runs share the `max_epoch` budget. The utilities with
    /// the lowest held-out MSE over all runs are returned and written back.
    ///
    /// When the held-out fraction rounds down to no examples, the training set is
    /// used as test set.
    pub fn learn_adaptive_rate_left_out(
        &mut self,
        increase_rate: f64,
        decrease_rate: f64,
        left_out: f64,
    ) -> Result<BTreeMap<String, f64>> {
        let examples = self.examples.clone();
        let n = examples.len();
        let held_out = ((n as f64 * left_out).floor() as usize).min(n);
        let (train, test) = examples.split_at(n - held_out);
        let test = if test.is_empty() { train } else { test };
        debug!("left out: {} training and {} test examples", train.len(), test.len());

        let mut epoch = 0;
        let mut best: Option<BTreeMap<String, f64>> = None;
        let mut best_loss = f64::INFINITY;
        let mut restart = 0;
        while epoch < self.config.max_epoch {
            if restart != 0 {
                self.set_random_utilities();
                self.reporter.report(Diagnostic::Restart { restart });
            }
            restart += 1;

            let (next_epoch, weights, loss) = self.left_out_run(train, test, increase_rate, decrease_rate, epoch)?;
            if loss < best_loss {
                best_loss = loss;
                best = Some(weights);
            }
            if next_epoch == epoch {
                break;
            }
            epoch = next_epoch;
        }

        let best = best.unwrap_or_else(|| self.get_current_util_weights());
        self.set_current_util_weights(&best);
        self.reporter.report(Diagnostic::BestWeights { test_loss: best_loss });
        info!("Best weights {:?} with test loss {}", best, best_loss);
        Ok(best)
    }

    /// One early-stopped run starting at `epoch`. Returns the epoch reached, the
    /// utilities with the lowest test loss of the run, and that loss.
    fn left_out_run(
        &mut self,
        train: &[ProcessedExample],
        test: &[ProcessedExample],
        increase: f64,
        decrease: f64,
        mut epoch: usize,
    ) -> Result<(usize, BTreeMap<String, f64>, f64)> {
        let mut state = self.adaptive(increase, decrease);
        let max_sweeps = self.max_sweeps(train.len());

        let total = self.mse(train)?;
        self.record_mse(total);
        let mut prev_test_loss = self.mse(test)?;
        self.log.mse_test.push(prev_test_loss);
        self.record_weights();

        let mut test_loss = prev_test_loss;
        let mut snapshot = self.get_current_util_weights();
        while self.may_continue(&state, epoch, max_sweeps) && test_loss <= prev_test_loss {
            prev_test_loss = test_loss;
            snapshot = self.get_current_util_weights();

            let total = self.adaptive_epoch(train, &mut state)?;
            self.reporter.report(Diagnostic::EpochFinished { epoch, mse: total });
            self.record_mse(total);

            test_loss = self.mse(test)?;
            self.log.mse_test.push(test_loss);
            self.record_weights();
            self.reporter.report(Diagnostic::TestLoss { epoch, mse: test_loss });
            epoch += 1;
        }

        if test_loss <= prev_test_loss {
            Ok((epoch, self.get_current_util_weights(), test_loss))
        } else {
            Ok((epoch, snapshot, prev_test_loss))
        }
    }
}

/// Compiles `program` for the atoms `examples` observe and builds a learner.
///
/// `batch_size: None` uses the whole data set per step. Unknown utilities start at 0
/// unless the program seeds them. Progress goes to the `log` facade.
pub fn get_ulearner<P: ProgramSource>(
    program: &P,
    examples: &[Example],
    max_epoch: usize,
    learning_rate: f64,
    batch_size: Option<usize>,
) -> Result<ULearner<P::Circuit>> {
    let utilities = program.utilities();
    let queries: BTreeSet<String> = examples
        .iter()
        .flat_map(|e| e.observations.iter().map(|(name, _)| name.clone()))
        .chain(utilities.iter().map(|(name, _)| name.clone()))
        .collect();
    let queries: Vec<String> = queries.into_iter().collect();

    let start = Instant::now();
    let circuit = program.compile(&queries)?;
    let reporter = Box::new(LogReporter);
    reporter.report(Diagnostic::Timing {
        phase: "Compilation",
        elapsed: start.elapsed(),
    });

    let config = LearnerConfig {
        batch_size: batch_size.unwrap_or(examples.len()),
        max_epoch,
        learning_rate,
        lfi_u_init_value: 0.0,
        ..LearnerConfig::default()
    };
    ULearner::with_reporter(circuit, &utilities, examples, config, reporter)
}
