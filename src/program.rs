//! Source programs.
//!
//! Parsing and grounding a decision-theoretic program and compiling it into a
//! circuit are done by an external collaborator. [`ProgramSource`] is the seam:
//! it reports the program's utility and query facts and produces a compiled
//! [`Circuit`] on demand. [`CompiledProgram`] wraps an already compiled circuit.

use crate::circuit::{Circuit, NnfCircuit};
use crate::error::Result;
use crate::weight::UtilityValue;

pub trait ProgramSource {
    type Circuit: Circuit;

    /// All `utility(atom, value)` facts.
    fn utilities(&self) -> Vec<(String, UtilityValue)>;

    /// All `query(atom)` facts.
    fn queries(&self) -> Vec<String>;

    /// Grounds the program for `queries` (plus every utility atom) and compiles it.
    ///
    /// Decisions must be placed above all other variables in the compiled circuit,
    /// so that every OR node mixing decisions chooses between strategies.
    fn compile(&self, queries: &[String]) -> Result<Self::Circuit>;
}

/// A program whose circuit has already been compiled.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    circuit: NnfCircuit,
    utilities: Vec<(String, UtilityValue)>,
    queries: Vec<String>,
}

impl CompiledProgram {
    pub fn new(circuit: NnfCircuit) -> Self {
        Self {
            circuit,
            utilities: Vec::new(),
            queries: Vec::new(),
        }
    }

    pub fn with_utility(mut self, atom: impl Into<String>, value: UtilityValue) -> Self {
        self.utilities.push((atom.into(), value));
        self
    }

    pub fn with_query(mut self, atom: impl Into<String>) -> Self {
        self.queries.push(atom.into());
        self
    }

    pub fn circuit(&self) -> &NnfCircuit {
        &self.circuit
    }
}

impl ProgramSource for CompiledProgram {
    type Circuit = NnfCircuit;

    fn utilities(&self) -> Vec<(String, UtilityValue)> {
        self.utilities.clone()
    }

    fn queries(&self) -> Vec<String> {
        self.queries.clone()
    }

    fn compile(&self, _queries: &[String]) -> Result<NnfCircuit> {
        Ok(self.circuit.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::circuit::NnfBuilder;
    use crate::weight::Component;

    #[test]
    fn test_compiled_program() {
        let mut b = NnfBuilder::new();
        let t = b.constant(true);
        let program = CompiledProgram::new(b.finish(t))
            .with_utility("a", Component::Known(2.0))
            .with_query("a");
        assert_eq!(program.utilities(), vec![("a".to_string(), Component::Known(2.0))]);
        assert_eq!(program.queries(), vec!["a".to_string()]);
        assert_eq!(program.compile(&[]).unwrap().size(), 1);
    }
}
