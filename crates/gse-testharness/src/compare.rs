//! ---
//! gse_section: "11-test-harness"
//! gse_subsection: "01-engine"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Value matchers and comparison operators."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
//! Comparison rules between recorded values and expectations.
//!
//! Integers compare exactly across signedness, integers and floats compare
//! numerically, strings lexicographically, and lists element by element.
//! Values of unrelated kinds are unordered: they are never equal and never
//! less/greater than each other.

use std::cmp::Ordering;
use std::fmt;

use gse_msg::Value;

/// Comparison operator applied between a recorded value and an expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Strict identity: same kind and same value, no numeric coercion.
    Is,
    IsNot,
}

impl Op {
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Is => "is",
            Op::IsNot => "is not",
        }
    }

    /// Apply the operator to the ordering of `actual` relative to `expected`.
    fn holds(&self, ordering: Option<Ordering>) -> bool {
        match self {
            Op::Eq | Op::Is => ordering == Some(Ordering::Equal),
            Op::Ne | Op::IsNot => ordering != Some(Ordering::Equal),
            Op::Lt => ordering == Some(Ordering::Less),
            Op::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Op::Gt => ordering == Some(Ordering::Greater),
            Op::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }

    /// Compare two counts. Identity operators behave like `==`/`!=`.
    pub fn holds_for_count(&self, actual: usize, expected: usize) -> bool {
        self.holds(Some(actual.cmp(&expected)))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Expectation a recorded value is checked against.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    /// Wildcard: compares equal to anything.
    Anything,
    Exact(Value),
    /// Numeric value within an absolute tolerance.
    Near { target: f64, tolerance: f64 },
    /// Element-wise expectation for event argument lists.
    List(Vec<Expected>),
}

/// Wildcard for a single position, e.g. an event argument whose value is
/// irrelevant to the test.
pub const ANYTHING: Expected = Expected::Anything;

impl Expected {
    pub fn near(target: f64, tolerance: f64) -> Self {
        Expected::Near {
            target,
            tolerance: tolerance.abs(),
        }
    }

    pub fn list<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expected>,
    {
        Expected::List(items.into_iter().map(Into::into).collect())
    }

    /// Whether `actual` satisfies `op` against this expectation.
    pub fn matches(&self, op: Op, actual: &Value) -> bool {
        match op {
            Op::Is => self.identical(actual),
            Op::IsNot => !self.identical(actual),
            _ => op.holds(self.ordering_of(actual)),
        }
    }

    /// Ordering of `actual` relative to this expectation.
    fn ordering_of(&self, actual: &Value) -> Option<Ordering> {
        match self {
            Expected::Anything => Some(Ordering::Equal),
            Expected::Exact(expected) => loose_cmp(actual, expected),
            Expected::Near { target, tolerance } => {
                let value = actual.as_f64()?;
                if (value - target).abs() <= *tolerance {
                    Some(Ordering::Equal)
                } else {
                    value.partial_cmp(target)
                }
            }
            Expected::List(expected) => {
                let actual = actual.as_list()?;
                for (item, expectation) in actual.iter().zip(expected) {
                    match expectation.ordering_of(item)? {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(actual.len().cmp(&expected.len()))
            }
        }
    }

    fn identical(&self, actual: &Value) -> bool {
        match self {
            Expected::Anything => true,
            Expected::Exact(expected) => strict_eq(actual, expected),
            Expected::Near { .. } => {
                matches!(actual, Value::Float(_))
                    && self.ordering_of(actual) == Some(Ordering::Equal)
            }
            Expected::List(expected) => match actual.as_list() {
                Some(items) => {
                    items.len() == expected.len()
                        && items
                            .iter()
                            .zip(expected)
                            .all(|(item, expectation)| expectation.identical(item))
                }
                None => false,
            },
        }
    }
}

/// Ordering between two values following the module rules.
pub fn loose_cmp(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (left, right) in a.iter().zip(b) {
                match loose_cmp(left, right)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => match (actual.as_i128(), expected.as_i128()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => actual.as_f64()?.partial_cmp(&expected.as_f64()?),
        },
    }
}

fn strict_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(left, right)| strict_eq(left, right))
        }
        // bit-level comparison so that NaN is identical to itself
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        _ => actual == expected,
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Anything => f.write_str("ANYTHING"),
            Expected::Exact(value) => write!(f, "{}", value),
            Expected::Near { target, tolerance } => write!(f, "{} ± {}", target, tolerance),
            Expected::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<Value> for Expected {
    fn from(value: Value) -> Self {
        Expected::Exact(value)
    }
}

impl From<Vec<Expected>> for Expected {
    fn from(items: Vec<Expected>) -> Self {
        Expected::List(items)
    }
}

macro_rules! expected_from {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Expected {
                fn from(value: $ty) -> Self {
                    Expected::Exact(Value::from(value))
                }
            }
        )+
    };
}

expected_from!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, &str);
