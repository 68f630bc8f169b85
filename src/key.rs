use std::fmt::{Display, Formatter};
use std::ops::Neg;

use crate::error::Error;

/// Signed literal key of a circuit node.
///
/// A positive key is the literal itself, its negation has the same magnitude and
/// the opposite sign. Key `0` is the constant node "true": since `-0 == 0`, it has
/// no distinct negation and is handled separately wherever signs matter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Key(i32);

impl Key {
    pub const TRUE: Key = Key(0);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Positive literal of `var`.
    ///
    /// # Panics
    ///
    /// Panics if `var` exceeds `i32::MAX`. Use `Key::try_from` for unchecked input.
    pub const fn positive(var: u32) -> Self {
        assert!(var <= i32::MAX as u32, "Variable index out of range");
        Self(var as i32)
    }

    pub const fn is_true(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_negated(&self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Return the internal representation of the key.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Variable index of the key (its magnitude).
    pub const fn var(self) -> u32 {
        self.0.unsigned_abs()
    }

    /// Literal of `var` with the given polarity. Panics like [`Key::positive`].
    pub const fn literal(var: u32, positive: bool) -> Self {
        let key = Self::positive(var);
        if positive {
            key
        } else {
            key.negate()
        }
    }
}

impl Neg for Key {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::new(value)
    }
}

impl TryFrom<u32> for Key {
    type Error = Error;

    /// Positive literal of a variable index.
    fn try_from(var: u32) -> Result<Self, Self::Error> {
        i32::try_from(var)
            .map(Key::new)
            .map_err(|_| Error::Schema(format!("variable index {} out of range", var)))
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.var())
    }
}
