//! # meu-rs: Expected utilities over compiled decision-theoretic programs
//!
//! **`meu-rs`** evaluates and learns the parameters of **decision-theoretic probabilistic programs**:
//! logic programs whose atoms carry probabilities, some of whose atoms are binary *decisions*,
//! and whose worlds carry additive *utilities*.
//!
//! ## What does it compute?
//!
//! A program is compiled (elsewhere) into a smooth d-DNNF circuit. Evaluating that circuit under an
//! algebraic semiring yields, for any query and evidence, the conditional probability together with
//! the conditional **expected utility**. A second, maximising semiring picks the decision assignment
//! with the **maximum expected utility**. Unknown utilities can be **learned** from examples of
//! observed evidence and the expected utility seen under it.
//!
//! ## Key Features
//!
//! - **Dynamic parameters**: circuit weights refer to unknown values through [`ParamRef`][crate::value::ParamRef]
//!   handles into a shared [`ParameterStore`][crate::store::ParameterStore]. Learning updates the store and
//!   the next evaluation sees the new values, without re-fixing any weight.
//! - **Two semirings**: [`ExpectedUtility`][crate::semiring::ExpectedUtility] and
//!   [`MaxExpectedUtility`][crate::maxeu::MaxExpectedUtility] behind one [`Semiring`][crate::semiring::Semiring] trait.
//! - **Scoped evidence**: [`Evaluator::with_evidence`][crate::evaluator::Evaluator::with_evidence] pins literals
//!   until the returned guard is dropped, also when an evaluation fails.
//! - **Gradient descent**: plain, adaptive-rate and held-out/restart variants in [`learner`].
//! - **Pluggable circuits**: anything implementing [`Circuit`][crate::circuit::Circuit]; an in-memory
//!   [`NnfCircuit`][crate::circuit::NnfCircuit] and a reader for the `.nnf` format are included.
//!
//! ## Basic Usage
//!
//! ```rust
//! use meu_rs::circuit::NnfBuilder;
//! use meu_rs::maxeu::get_best_decision;
//! use meu_rs::program::CompiledProgram;
//! use meu_rs::report::NullReporter;
//! use meu_rs::weight::{Component, RawWeight};
//!
//! // umbrella is a decision, rain happens with probability 0.3,
//! // and we get wet when it rains without an umbrella.
//! let mut b = NnfBuilder::new();
//! let umbrella = b.atom("umbrella", 1, RawWeight::Decision);
//! let rain = b.atom("rain", 2, RawWeight::Prob(0.3));
//! let wet = b.atom("wet", 3, RawWeight::True);
//! let (u, nu) = (b.literal(umbrella), b.literal(-umbrella));
//! let (r, nr) = (b.literal(rain), b.literal(-rain));
//! let (w, nw) = (b.literal(wet), b.literal(-wet));
//! let rain_dry = b.and([r, nw]);
//! let no_rain = b.and([nr, nw]);
//! let rain_wet = b.and([r, w]);
//! let covered = b.or([rain_dry, no_rain]);
//! let exposed = b.or([rain_wet, no_rain]);
//! let take = b.and([u, covered]);
//! let leave = b.and([nu, exposed]);
//! let root = b.or([take, leave]);
//!
//! let program = CompiledProgram::new(b.finish(root))
//!     .with_utility("umbrella", Component::Known(-2.0))
//!     .with_utility("wet", Component::Known(-10.0));
//!
//! let best = get_best_decision(&program, &NullReporter).unwrap();
//! assert_eq!(best.decisions["umbrella"], true);
//! assert!((best.expected_utility - -2.0).abs() < 1e-9);
//! ```
//!
//! ## Core Components
//!
//! - **[`fixer`]**: turns raw per-variable annotations into positive/negative weight pairs.
//! - **[`evaluator`]**: evidence handling and conditional evaluation.
//! - **[`learner`]**: fitting unknown utilities to examples read by [`data`].
//! - **[`maxeu`]**: best decisions.

pub mod circuit;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod fixer;
pub mod key;
pub mod learner;
pub mod maxeu;
pub mod nnf;
pub mod program;
pub mod report;
pub mod semiring;
pub mod store;
pub mod value;
pub mod weight;
