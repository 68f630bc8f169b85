//! Diagnostic sinks.
//!
//! Components that produce user-facing progress (the learner, the decision entry
//! points, example translation) take a [`Reporter`] instead of printing. The
//! default is [`NullReporter`]; [`LogReporter`] forwards to the `log` facade and
//! [`MemoryReporter`] keeps everything for later inspection.

use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A named atom is absent from the compiled circuit and was skipped.
    UnresolvedAtom { name: String },
    /// Time spent in one phase (compilation, weight fixing, evaluation).
    Timing { phase: &'static str, elapsed: Duration },
    /// One adaptive step: batch MSE before and after, and the new learning rate.
    BatchStep {
        prev_mse: f64,
        mse: f64,
        learning_rate: f64,
    },
    EpochFinished { epoch: usize, mse: f64 },
    TestLoss { epoch: usize, mse: f64 },
    Restart { restart: usize },
    BestWeights { test_loss: f64 },
    /// Free-form message.
    Message(String),
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::UnresolvedAtom { name } => {
                write!(f, "Atom {} does not occur in the circuit, skipped", name)
            }
            Diagnostic::Timing { phase, elapsed } => {
                write!(f, "{} took {:.6} seconds", phase, elapsed.as_secs_f64())
            }
            Diagnostic::BatchStep {
                prev_mse,
                mse,
                learning_rate,
            } => write!(
                f,
                "Batch MSE was {} and is now {}. Learning rate changed to {}",
                prev_mse, mse, learning_rate
            ),
            Diagnostic::EpochFinished { epoch, mse } => {
                write!(f, "Epoch {} finished with total MSE {}", epoch, mse)
            }
            Diagnostic::TestLoss { epoch, mse } => write!(f, "Test loss after epoch {} was {}", epoch, mse),
            Diagnostic::Restart { restart } => write!(f, "Restart {}", restart),
            Diagnostic::BestWeights { test_loss } => write!(f, "Best test loss {}", test_loss),
            Diagnostic::Message(msg) => write!(f, "{}", msg),
        }
    }
}

pub trait Reporter {
    fn report(&self, diagnostic: Diagnostic);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _diagnostic: Diagnostic) {}
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::UnresolvedAtom { .. } => log::warn!("{}", diagnostic),
            _ => log::info!("{}", diagnostic),
        }
    }
}

/// Records diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: RefCell<Vec<Diagnostic>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries.borrow_mut().push(diagnostic);
    }
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic)
    }
}

impl<R: Reporter + ?Sized> Reporter for std::rc::Rc<R> {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reporter() {
        let r = MemoryReporter::new();
        assert!(r.is_empty());
        r.report(Diagnostic::Restart { restart: 1 });
        r.report(Diagnostic::UnresolvedAtom { name: "a".into() });
        assert_eq!(r.len(), 2);
        assert_eq!(r.entries()[0], Diagnostic::Restart { restart: 1 });
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::BatchStep {
            prev_mse: 4.0,
            mse: 1.0,
            learning_rate: 0.44,
        };
        assert_eq!(
            d.to_string(),
            "Batch MSE was 4 and is now 1. Learning rate changed to 0.44"
        );
        let d = Diagnostic::UnresolvedAtom { name: "x".into() };
        assert_eq!(d.to_string(), "Atom x does not occur in the circuit, skipped");
    }
}
