//! Runtime values
//!
//! Arrays, dictionaries and iterators have shared-reference semantics: every
//! binding that holds one sees mutations made through any other. Everything
//! else is an immutable scalar.

use crate::parser::callable::Callable;
use crate::stack::ensure_sufficient_stack;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

pub type SharedArray = Rc<RefCell<ArrayItems>>;
pub type SharedDict = Rc<RefCell<BTreeMap<String, Value>>>;
pub type SharedIter = Rc<RefCell<IterState>>;

/// Represents the result of evaluating an expression
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Real(f64),
    String(Rc<str>),
    Bool(bool),
    Null,
    Array(SharedArray),
    Dict(SharedDict),
    Range(RangeValue),
    Iter(SharedIter),
    Callable(Callable),
}

/// Element storage of an array value.
///
/// Dropping the last handle to a deeply nested array releases the nesting
/// iteratively, so the depth of a value never exhausts the host stack.
#[derive(Debug, Clone, Default)]
pub struct ArrayItems(Vec<Value>);

impl From<Vec<Value>> for ArrayItems {
    fn from(items: Vec<Value>) -> Self {
        ArrayItems(items)
    }
}

impl Deref for ArrayItems {
    type Target = Vec<Value>;

    fn deref(&self) -> &Vec<Value> {
        &self.0
    }
}

impl DerefMut for ArrayItems {
    fn deref_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }
}

impl Drop for ArrayItems {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.0);
        while let Some(value) = pending.pop() {
            match value {
                Value::Array(items) => {
                    if let Ok(cell) = Rc::try_unwrap(items) {
                        pending.append(&mut cell.into_inner().0);
                    }
                }
                Value::Dict(entries) => {
                    if let Ok(cell) = Rc::try_unwrap(entries) {
                        pending.extend(cell.into_inner().into_values());
                    }
                }
                _ => {}
            }
        }
    }
}

/// Half-open integer range. Counts downward when `lower > upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub lower: i64,
    pub upper: i64,
}

impl RangeValue {
    pub fn new(lower: i64, upper: i64) -> Self {
        RangeValue { lower, upper }
    }

    pub fn len(&self) -> usize {
        (i128::from(self.upper) - i128::from(self.lower)).unsigned_abs() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.lower == self.upper
    }

    /// The `index`-th element, walking from `lower` toward `upper`
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        let step = index as i64;
        if self.lower <= self.upper {
            Some(self.lower + step)
        } else {
            Some(self.lower - step)
        }
    }
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lower, self.upper)
    }
}

/// What an iterator walks over
#[derive(Debug, Clone)]
pub enum IterSource {
    /// Live view: elements pushed during iteration are visited
    Array(SharedArray),
    String(Rc<str>),
    Range(RangeValue),
    /// Keys captured when the iterator was created
    Keys(Vec<String>),
}

/// A cursor over an iterable source
#[derive(Debug, Clone)]
pub struct IterState {
    source: IterSource,
    /// Element index, or byte offset for strings
    cursor: usize,
}

impl IterState {
    pub fn new(source: IterSource) -> Self {
        IterState { source, cursor: 0 }
    }

    /// Type name of the underlying source
    pub fn source_name(&self) -> &'static str {
        match self.source {
            IterSource::Array(_) => "Array",
            IterSource::String(_) => "String",
            IterSource::Range(_) => "Range",
            IterSource::Keys(_) => "Dict",
        }
    }

    /// Advance, or `None` once the source is exhausted
    pub fn next_value(&mut self) -> Option<Value> {
        let value = match &self.source {
            IterSource::Array(items) => items.borrow().get(self.cursor).cloned(),
            IterSource::String(s) => {
                let ch = s.get(self.cursor..)?.chars().next()?;
                self.cursor += ch.len_utf8();
                return Some(Value::from(ch.to_string()));
            }
            IterSource::Range(range) => range.get(self.cursor).map(Value::Int),
            IterSource::Keys(keys) => keys.get(self.cursor).map(|k| Value::from(k.as_str())),
        };
        if value.is_some() {
            self.cursor += 1;
        }
        value
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(ArrayItems(items))))
    }

    pub fn dict(entries: BTreeMap<String, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    /// Name of this value's type, as shown in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Real(_) => "Real",
            Value::String(_) => "String",
            Value::Bool(_) => "Bool",
            Value::Null => "Null",
            Value::Array(_) => "Array",
            Value::Dict(_) => "Dict",
            Value::Range(_) => "Range",
            Value::Iter(_) => "Iterator",
            Value::Callable(_) => "Function",
        }
    }

    /// `null`, `false`, and numeric zero are falsey. Everything else is truthy,
    /// including empty strings and empty arrays.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Real(r) => *r != 0.0,
            _ => true,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Real(_))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// An iterator over this value, or `None` if it is not iterable.
    ///
    /// An iterator yields itself, sharing its cursor.
    pub fn iterate(&self) -> Option<SharedIter> {
        let source = match self {
            Value::Iter(state) => return Some(state.clone()),
            Value::Array(items) => IterSource::Array(items.clone()),
            Value::String(s) => IterSource::String(s.clone()),
            Value::Range(range) => IterSource::Range(*range),
            Value::Dict(entries) => IterSource::Keys(entries.borrow().keys().cloned().collect()),
            _ => return None,
        };
        Some(Rc::new(RefCell::new(IterState::new(source))))
    }

    /// Source-like rendering: strings are quoted
    pub fn repr(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_value(&mut out, true, &mut HashSet::new());
        out
    }

    fn write_value(
        &self,
        f: &mut dyn fmt::Write,
        quote_strings: bool,
        seen: &mut HashSet<*const ()>,
    ) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Real(r) => write!(f, "{:?}", r),
            Value::String(s) if quote_strings => write!(f, "{:?}", s),
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => f.write_str("null"),
            Value::Range(range) => write!(f, "{}", range),
            Value::Iter(state) => write!(f, "<Iterator '{}'>", state.borrow().source_name()),
            Value::Callable(callable) => write!(f, "{}", callable),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if !seen.insert(ptr) {
                    return f.write_str("[...]");
                }
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    ensure_sufficient_stack(|| item.write_value(&mut *f, true, &mut *seen))?;
                }
                seen.remove(&ptr);
                f.write_str("]")
            }
            Value::Dict(entries) => {
                let ptr = Rc::as_ptr(entries) as *const ();
                if !seen.insert(ptr) {
                    return f.write_str("{...}");
                }
                f.write_str("{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: ", key)?;
                    ensure_sufficient_stack(|| value.write_value(&mut *f, true, &mut *seen))?;
                }
                seen.remove(&ptr);
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_value(f, false, &mut HashSet::new())
    }
}

/// Pairs of containers already under comparison
type Visited = HashSet<(*const (), *const ())>;

impl Value {
    fn equals(&self, other: &Value, visited: &mut Visited) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Int(a), Value::Real(b)) | (Value::Real(b), Value::Int(a)) => {
                int_equals_real(*a, *b)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
                // A pair met again on a cycle holds unless some other element differs
                if !visited.insert(pair) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| ensure_sufficient_stack(|| x.equals(y, &mut *visited)));
                visited.remove(&pair);
                equal
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
                if !visited.insert(pair) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
                        ka == kb && ensure_sufficient_stack(|| va.equals(vb, &mut *visited))
                    });
                visited.remove(&pair);
                equal
            }
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Iter(a), Value::Iter(b)) => Rc::ptr_eq(a, b),
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Exact comparison: no rounding of large integers through `f64`
fn int_equals_real(int: i64, real: f64) -> bool {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    real.fract() == 0.0 && (-LIMIT..LIMIT).contains(&real) && real as i64 == int
}

/// Structural equality. Never fails: values of unrelated types are unequal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &mut HashSet::new())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Real(0.0).is_truthy());
        assert!(!Value::Real(-0.0).is_truthy());
        assert!(Value::Real(1e-300).is_truthy());
        assert!(Value::Real(-5e-324).is_truthy());
        assert!(Value::Real(f64::MIN_POSITIVE).is_truthy());
        assert!(Value::Real(f64::NAN).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert_eq!(Value::Int(2), Value::Real(2.0));
        assert_ne!(Value::Int(2), Value::from("2"));
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn test_int_real_equality_is_exact() {
        assert_ne!(Value::Int(9_007_199_254_740_993), Value::Real(9_007_199_254_740_992.0));
        assert_eq!(Value::Int(9_007_199_254_740_992), Value::Real(9_007_199_254_740_992.0));
        assert_eq!(Value::Int(i64::MIN), Value::Real(-9_223_372_036_854_775_808.0));
        assert_ne!(Value::Int(i64::MAX), Value::Real(9_223_372_036_854_775_808.0));
        assert_ne!(Value::Int(1), Value::Real(1.5));
        assert_ne!(Value::Int(0), Value::Real(f64::NAN));
    }

    fn nested(depth: usize, leaf: i64) -> Value {
        let mut value = Value::Int(leaf);
        for _ in 0..depth {
            value = Value::array(vec![value]);
        }
        value
    }

    #[test]
    fn test_deep_nesting_compares_displays_and_drops() {
        let depth = 200_000;
        assert_eq!(nested(depth, 1), nested(depth, 1));
        assert_ne!(nested(depth, 1), nested(depth, 2));
        assert_ne!(nested(depth, 1), nested(depth + 1, 1));
        assert_eq!(nested(depth, 7).to_string().len(), 2 * depth + 1);
    }

    #[test]
    fn test_cyclic_arrays_compare_without_looping() {
        let cycle = |head: i64| {
            let items: SharedArray = Rc::new(RefCell::new(ArrayItems::from(vec![Value::Int(head)])));
            items.borrow_mut().push(Value::Array(items.clone()));
            items
        };
        let (a, b, c) = (cycle(1), cycle(1), cycle(2));
        assert_eq!(Value::Array(a.clone()), Value::Array(b.clone()));
        assert_ne!(Value::Array(a.clone()), Value::Array(c.clone()));
        for items in [a, b, c] {
            items.borrow_mut().clear();
        }
    }

    #[test]
    fn test_cyclic_dicts_compare_without_looping() {
        let cycle = || {
            let value = Value::dict(BTreeMap::new());
            if let Value::Dict(entries) = &value {
                entries.borrow_mut().insert("self".to_string(), value.clone());
            }
            value
        };
        let (a, b) = (cycle(), cycle());
        assert_eq!(a, b);
        for value in [a, b] {
            if let Value::Dict(entries) = value {
                entries.borrow_mut().clear();
            }
        }
    }

    #[test]
    fn test_structural_array_equality() {
        let a = Value::from(vec![Value::Int(1), Value::from("x")]);
        let b = Value::from(vec![Value::Int(1), Value::from("x")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_range_equality_and_len() {
        assert_eq!(Value::Range(RangeValue::new(14, 24)), Value::Range(RangeValue::new(14, 24)));
        assert_ne!(Value::Range(RangeValue::new(0, 10)), Value::Range(RangeValue::new(0, 9)));
        assert_eq!(RangeValue::new(0, 10).len(), 10);
        assert_eq!(RangeValue::new(5, 2).len(), 3);
        assert_eq!(RangeValue::new(5, 2).get(1), Some(4));
        assert_eq!(RangeValue::new(5, 2).get(3), None);
    }

    #[test]
    fn test_display() {
        let v = Value::from(vec![Value::Real(1.0), Value::from("a"), Value::Null]);
        assert_eq!(v.to_string(), "[1.0, \"a\", null]");
        assert_eq!(Value::from("plain").to_string(), "plain");
        assert_eq!(Value::from("quoted").repr(), "\"quoted\"");
        assert_eq!(Value::Range(RangeValue::new(0, 10)).to_string(), "0..10");
    }

    #[test]
    fn test_self_referencing_array_display() {
        let items: SharedArray = Rc::new(RefCell::new(ArrayItems::from(vec![Value::Int(1)])));
        items.borrow_mut().push(Value::Array(items.clone()));
        assert_eq!(Value::Array(items.clone()).to_string(), "[1, [...]]");
        // Break the cycle so the test does not leak
        items.borrow_mut().clear();
    }

    #[test]
    fn test_string_iteration_by_character() {
        let iter = Value::from("hé!").iterate().unwrap();
        let mut out = Vec::new();
        while let Some(v) = iter.borrow_mut().next_value() {
            out.push(v.to_string());
        }
        assert_eq!(out, vec!["h", "é", "!"]);
    }

    #[test]
    fn test_dict_iteration_uses_key_snapshot() {
        let mut entries = BTreeMap::new();
        entries.insert("b".to_string(), Value::Int(2));
        entries.insert("a".to_string(), Value::Int(1));
        let dict = Value::dict(entries);
        let iter = dict.iterate().unwrap();
        if let Value::Dict(d) = &dict {
            d.borrow_mut().insert("c".to_string(), Value::Int(3));
        }
        let first = iter.borrow_mut().next_value();
        let second = iter.borrow_mut().next_value();
        let third = iter.borrow_mut().next_value();
        assert_eq!(first, Some(Value::from("a")));
        assert_eq!(second, Some(Value::from("b")));
        assert_eq!(third, None);
    }

    #[test]
    fn test_non_iterables() {
        assert!(Value::Int(3).iterate().is_none());
        assert!(Value::Null.iterate().is_none());
    }
}
