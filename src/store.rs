use crate::value::{ParamRef, ParamVector};

/// Learnable parameters: unknown utilities and unknown probabilities.
///
/// Both vectors start with a sentinel at index 0. Weights hold [`ParamRef`] handles
/// into these vectors; only the learner writes to them, between evaluations.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    utilities: ParamVector,
    probabilities: ParamVector,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            utilities: ParamVector::with_sentinel(),
            probabilities: ParamVector::with_sentinel(),
        }
    }

    pub fn utilities(&self) -> &ParamVector {
        &self.utilities
    }

    pub fn probabilities(&self) -> &ParamVector {
        &self.probabilities
    }

    /// Allocates a fresh utility slot seeded with `init`.
    pub fn new_utility(&self, init: f64) -> ParamRef {
        let index = self.utilities.push(init);
        self.utilities.handle(index)
    }

    /// Allocates a fresh probability slot seeded with `init`.
    pub fn new_probability(&self, init: f64) -> ParamRef {
        let index = self.probabilities.push(init);
        self.probabilities.handle(index)
    }

    pub fn utility(&self, index: usize) -> f64 {
        self.utilities.get(index)
    }

    pub fn set_utility(&self, index: usize, value: f64) {
        self.utilities.set(index, value);
    }

    /// Number of real utility parameters (the sentinel excluded).
    pub fn num_utilities(&self) -> usize {
        self.utilities.len() - 1
    }

    /// Number of real probability parameters (the sentinel excluded).
    pub fn num_probabilities(&self) -> usize {
        self.probabilities.len() - 1
    }

    /// Indices of all real utility parameters.
    pub fn utility_indices(&self) -> impl Iterator<Item = usize> {
        1..self.utilities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store() {
        let store = ParameterStore::new();
        assert_eq!(store.num_utilities(), 0);
        assert_eq!(store.num_probabilities(), 0);
        assert_eq!(store.utility_indices().count(), 0);
    }

    #[test]
    fn test_independent_indexing() {
        let store = ParameterStore::new();
        let u = store.new_utility(3.0);
        let p = store.new_probability(0.25);
        assert_eq!(u.index(), 1);
        assert_eq!(p.index(), 1);
        assert_eq!(u.get(), 3.0);
        assert_eq!(p.get(), 0.25);

        store.set_utility(1, 8.0);
        assert_eq!(u.get(), 8.0);
        assert_eq!(p.get(), 0.25);
    }

    #[test]
    fn test_clone_shares_parameters() {
        let store = ParameterStore::new();
        let u = store.new_utility(0.0);
        let other = store.clone();
        other.set_utility(u.index(), 5.0);
        assert_eq!(u.get(), 5.0);
    }
}
