//! Dynamic parameter values.
//!
//! Weights that refer to a parameter being learned do not store a number: they hold a
//! [`ParamRef`], a handle into a shared [`ParamVector`]. Reading the handle returns the
//! current entry of the vector, so updating a parameter in place is immediately visible
//! to every later evaluation, without re-fixing any weight.
//!
//! ```
//! use meu_rs::value::{ParamVector, Value};
//!
//! let params = ParamVector::with_sentinel();
//! let index = params.push(2.5);
//! let v = Value::Ref(params.handle(index));
//! assert_eq!(v.resolve(), 2.5);
//!
//! params.set(index, 7.0);
//! assert_eq!(v.resolve(), 7.0);
//! ```

use std::cell::RefCell;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Value stored at index 0 of every parameter vector.
///
/// Index 0 is never handed out, so no parameter can collide with node key 0.
pub const SENTINEL: f64 = -1.0;

/// Shared, append-only vector of learnable scalars.
///
/// Clones share the same storage. Entries are never removed, so indices stay valid
/// for the lifetime of every handle.
#[derive(Clone, Default)]
pub struct ParamVector {
    values: Rc<RefCell<Vec<f64>>>,
}

impl ParamVector {
    /// Creates a vector holding only the sentinel at index 0.
    pub fn with_sentinel() -> Self {
        Self {
            values: Rc::new(RefCell::new(vec![SENTINEL])),
        }
    }

    /// Appends a value and returns its index.
    pub fn push(&self, value: f64) -> usize {
        let mut values = self.values.borrow_mut();
        values.push(value);
        values.len() - 1
    }

    pub fn get(&self, index: usize) -> f64 {
        self.values.borrow()[index]
    }

    pub fn set(&self, index: usize, value: f64) {
        self.values.borrow_mut()[index] = value;
    }

    /// Adds `delta` to the entry at `index`.
    pub fn add(&self, index: usize, delta: f64) {
        self.values.borrow_mut()[index] += delta;
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Copy of the current contents, sentinel included.
    pub fn snapshot(&self) -> Vec<f64> {
        self.values.borrow().clone()
    }

    pub fn handle(&self, index: usize) -> ParamRef {
        assert_ne!(index, 0, "Parameter index 0 is reserved");
        ParamRef {
            source: self.clone(),
            index,
        }
    }

    /// Whether both vectors share the same storage.
    pub fn same_source(&self, other: &ParamVector) -> bool {
        Rc::ptr_eq(&self.values, &other.values)
    }
}

impl Debug for ParamVector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.values.borrow().iter()).finish()
    }
}

/// Handle to one entry of a [`ParamVector`].
#[derive(Clone)]
pub struct ParamRef {
    source: ParamVector,
    index: usize,
}

impl ParamRef {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source(&self) -> &ParamVector {
        &self.source
    }

    pub fn get(&self) -> f64 {
        self.source.get(self.index)
    }
}

impl PartialEq for ParamRef {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.source.same_source(&other.source)
    }
}

impl Debug for ParamRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({}, {})", self.index, self.get())
    }
}

/// A weight component: either a fixed number or a dynamic reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Fixed(f64),
    Ref(ParamRef),
}

impl Value {
    pub const ZERO: Value = Value::Fixed(0.0);
    pub const ONE: Value = Value::Fixed(1.0);

    /// Current numeric value.
    pub fn resolve(&self) -> f64 {
        match self {
            Value::Fixed(x) => *x,
            Value::Ref(r) => r.get(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Value::Ref(_))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Fixed(x)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Fixed(x) => write!(f, "{}", x),
            Value::Ref(r) => write!(f, "t({})", r.index()),
        }
    }
}
