//! Expression evaluation
//!
//! Every expression produces exactly one [`Value`] or fails with a
//! [`RuntimeError`] located at the node that caused it. Operands are
//! evaluated left to right.

use crate::parser::ast::{BinaryOp, Expression, Literal, LogicalOp, UnaryOp, UpdateOp};
use crate::parser::callable::Callable;
use crate::parser::environment::{AssignError, SharedEnvironment};
use crate::parser::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::parser::interpreter::Interpreter;
use crate::parser::lexer::Span;
use crate::parser::value::{RangeValue, Value};
use crate::stack::ensure_sufficient_stack;
use std::collections::BTreeMap;

/// A resolved assignment target. Subexpressions are evaluated once.
enum Place<'a> {
    Variable(&'a str, Span),
    Index(Value, Value, Span),
    Member(Value, &'a str, Span),
}

impl Interpreter {
    /// Evaluate an expression in `env`
    pub fn evaluate(&mut self, expr: &Expression, env: &SharedEnvironment) -> RuntimeResult<Value> {
        ensure_sufficient_stack(|| self.evaluate_expression(expr, env))
    }

    fn evaluate_expression(
        &mut self,
        expr: &Expression,
        env: &SharedEnvironment,
    ) -> RuntimeResult<Value> {
        match expr {
            Expression::Literal { value, .. } => Ok(literal_value(value)),

            Expression::Grouping(inner) => self.evaluate(inner, env),

            Expression::Unary {
                operator,
                operand,
                span,
            } => {
                let value = self.evaluate(operand, env)?;
                unary(*operator, value, *span)
            }

            Expression::Binary {
                left,
                operator,
                right,
                span,
            } => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                binary(*operator, &left, &right, *span)
            }

            // Yields the operand that decided the result, not a Bool
            Expression::Logical {
                left,
                operator,
                right,
                ..
            } => {
                let left = self.evaluate(left, env)?;
                match operator {
                    LogicalOp::Or if left.is_truthy() => Ok(left),
                    LogicalOp::And if !left.is_truthy() => Ok(left),
                    _ => self.evaluate(right, env),
                }
            }

            Expression::Range { lower, upper, span } => {
                let lower = self.evaluate(lower, env)?;
                let upper = self.evaluate(upper, env)?;
                match (&lower, &upper) {
                    (Value::Int(lo), Value::Int(hi)) => Ok(Value::Range(RangeValue::new(*lo, *hi))),
                    _ => Err(RuntimeError::type_mismatch(
                        format!(
                            "Range bounds must be 'Int', got '{}' and '{}'.",
                            lower.type_name(),
                            upper.type_name()
                        ),
                        *span,
                    )),
                }
            }

            Expression::Assign {
                target,
                operator,
                value,
                span,
            } => self.evaluate_assign(target, *operator, value, *span, env),

            Expression::Variable { name, span } => {
                let value = env.borrow().get(name);
                value.ok_or_else(|| RuntimeError::undefined_variable(name, *span))
            }

            Expression::Call {
                callee,
                arguments,
                span,
            } => self.evaluate_call(callee, arguments, *span, env),

            Expression::Lambda(decl) => Ok(Value::Callable(Callable::Lambda {
                decl: decl.clone(),
                closure: env.clone(),
            })),

            Expression::Array { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate(element, env)?);
                }
                Ok(Value::array(items))
            }

            Expression::Dict { entries, .. } => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let value = self.evaluate(value, env)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::dict(map))
            }

            Expression::Index {
                target,
                index,
                span,
            } => {
                let target = self.evaluate(target, env)?;
                let index = self.evaluate(index, env)?;
                index_value(&target, &index, *span)
            }

            Expression::Member { target, name, span } => {
                let target = self.evaluate(target, env)?;
                member_value(&target, name, *span)
            }

            Expression::Update {
                target,
                operator,
                span,
            } => self.evaluate_update(target, *operator, *span, env),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expression,
        arguments: &[Expression],
        span: Span,
        env: &SharedEnvironment,
    ) -> RuntimeResult<Value> {
        let callee = self.evaluate(callee, env)?;

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument, env)?);
        }

        let callable = match callee {
            Value::Callable(callable) => callable,
            other => {
                return Err(RuntimeError::new(
                    RuntimeErrorKind::NotCallable,
                    format!("Can only call functions, got '{}'.", other.type_name()),
                    span,
                ))
            }
        };

        if !callable.accepts(args.len()) {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ArityMismatch,
                callable.arity_message(args.len()),
                span,
            ));
        }

        callable.call(self, args, span)
    }

    /// The right-hand side is evaluated before the target's subexpressions
    fn evaluate_assign(
        &mut self,
        target: &Expression,
        operator: Option<BinaryOp>,
        value: &Expression,
        span: Span,
        env: &SharedEnvironment,
    ) -> RuntimeResult<Value> {
        let value = self.evaluate(value, env)?;
        let place = self.resolve_place(target, env)?;

        let value = match operator {
            Some(op) => {
                let current = read_place(&place, env)?;
                binary(op, &current, &value, span)?
            }
            None => value,
        };

        write_place(&place, value.clone(), env)?;
        Ok(value)
    }

    /// Postfix `++`/`--`: stores the updated number, yields the old one
    fn evaluate_update(
        &mut self,
        target: &Expression,
        operator: UpdateOp,
        span: Span,
        env: &SharedEnvironment,
    ) -> RuntimeResult<Value> {
        let place = self.resolve_place(target, env)?;
        let old = read_place(&place, env)?;

        let (symbol, delta) = match operator {
            UpdateOp::Increment => ("++", 1),
            UpdateOp::Decrement => ("--", -1),
        };

        let new = match &old {
            Value::Int(n) => n
                .checked_add(delta)
                .map(Value::Int)
                .ok_or_else(|| overflow(format!("Integer overflow in '{}{}'.", n, symbol), span))?,
            Value::Real(r) => Value::Real(r + delta as f64),
            other => {
                return Err(RuntimeError::type_mismatch(
                    format!(
                        "Operator '{}' cannot be applied to '{}'.",
                        symbol,
                        other.type_name()
                    ),
                    span,
                ))
            }
        };

        write_place(&place, new, env)?;
        Ok(old)
    }

    fn resolve_place<'a>(
        &mut self,
        target: &'a Expression,
        env: &SharedEnvironment,
    ) -> RuntimeResult<Place<'a>> {
        match target {
            Expression::Variable { name, span } => Ok(Place::Variable(name, *span)),
            Expression::Index {
                target,
                index,
                span,
            } => {
                let target = self.evaluate(target, env)?;
                let index = self.evaluate(index, env)?;
                Ok(Place::Index(target, index, *span))
            }
            Expression::Member { target, name, span } => {
                let target = self.evaluate(target, env)?;
                Ok(Place::Member(target, name, *span))
            }
            other => Err(RuntimeError::type_mismatch(
                "Invalid assignment target.",
                other.span(),
            )),
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::Int(*n),
        Literal::Real(r) => Value::Real(*r),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn read_place(place: &Place<'_>, env: &SharedEnvironment) -> RuntimeResult<Value> {
    match place {
        Place::Variable(name, span) => {
            let value = env.borrow().get(name);
            value.ok_or_else(|| RuntimeError::undefined_variable(name, *span))
        }
        Place::Index(target, index, span) => index_value(target, index, *span),
        Place::Member(target, name, span) => member_value(target, name, *span),
    }
}

fn write_place(place: &Place<'_>, value: Value, env: &SharedEnvironment) -> RuntimeResult<()> {
    match place {
        Place::Variable(name, span) => {
            let result = env.borrow_mut().assign(name, value);
            result.map_err(|e| match e {
                AssignError::Constant => RuntimeError::new(
                    RuntimeErrorKind::ConstantReassignment,
                    format!("Cannot reassign constant '{}'.", name),
                    *span,
                ),
                AssignError::Undefined => RuntimeError::undefined_variable(name, *span),
            })
        }
        Place::Index(target, index, span) => set_index(target, index, value, *span),
        Place::Member(Value::Dict(entries), name, _) => {
            entries.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        Place::Member(target, name, span) => Err(member_error(target, name, *span)),
    }
}

/// Read `target[index]`
pub fn index_value(target: &Value, index: &Value, span: Span) -> RuntimeResult<Value> {
    match target {
        Value::Array(items) => {
            let items = items.borrow();
            let i = normalize_index(index, items.len(), span)?;
            Ok(items[i].clone())
        }
        Value::String(s) => {
            let len = s.chars().count();
            let i = normalize_index(index, len, span)?;
            s.chars()
                .nth(i)
                .map(|c| Value::from(c.to_string()))
                .ok_or_else(|| out_of_range(index, len, span))
        }
        Value::Range(range) => {
            let i = normalize_index(index, range.len(), span)?;
            range
                .get(i)
                .map(Value::Int)
                .ok_or_else(|| out_of_range(index, range.len(), span))
        }
        Value::Dict(entries) => {
            let key = dict_key(index, span)?;
            let value = entries.borrow().get(key).cloned();
            value.ok_or_else(|| key_not_found(key, span))
        }
        other => Err(RuntimeError::new(
            RuntimeErrorKind::UnsupportedIndexTarget,
            format!("Cannot index into a value of type '{}'.", other.type_name()),
            span,
        )),
    }
}

fn set_index(target: &Value, index: &Value, value: Value, span: Span) -> RuntimeResult<()> {
    match target {
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            let i = normalize_index(index, items.len(), span)?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(entries) => {
            let key = dict_key(index, span)?;
            entries.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        other => Err(RuntimeError::new(
            RuntimeErrorKind::UnsupportedIndexTarget,
            format!(
                "Cannot assign to an index of a value of type '{}'.",
                other.type_name()
            ),
            span,
        )),
    }
}

/// Read `target.name`
pub fn member_value(target: &Value, name: &str, span: Span) -> RuntimeResult<Value> {
    match target {
        Value::Dict(entries) => {
            let value = entries.borrow().get(name).cloned();
            value.ok_or_else(|| key_not_found(name, span))
        }
        other => Err(member_error(other, name, span)),
    }
}

fn member_error(target: &Value, name: &str, span: Span) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::UnsupportedIndexTarget,
        format!(
            "Cannot access member '{}' on a value of type '{}'.",
            name,
            target.type_name()
        ),
        span,
    )
}

/// Map a possibly negative index into `[0, len)`
fn normalize_index(index: &Value, len: usize, span: Span) -> RuntimeResult<usize> {
    let Value::Int(raw) = *index else {
        return Err(RuntimeError::new(
            RuntimeErrorKind::NonIntegerIndex,
            format!("Index must be an 'Int', got '{}'.", index.type_name()),
            span,
        ));
    };

    let length = i64::try_from(len).unwrap_or(i64::MAX);
    let adjusted = if raw < 0 { raw + length } else { raw };
    if adjusted < 0 || adjusted >= length {
        return Err(out_of_range(index, len, span));
    }
    Ok(adjusted as usize)
}

fn dict_key(index: &Value, span: Span) -> RuntimeResult<&str> {
    index.as_str().ok_or_else(|| {
        RuntimeError::type_mismatch(
            format!("Dictionary keys must be 'String', got '{}'.", index.type_name()),
            span,
        )
    })
}

fn out_of_range(index: &Value, len: usize, span: Span) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::IndexOutOfRange,
        format!("Index {} out of range for length {}.", index, len),
        span,
    )
}

fn key_not_found(key: &str, span: Span) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::KeyNotFound,
        format!("Key {:?} not found.", key),
        span,
    )
}

fn overflow(message: String, span: Span) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::IntegerOverflow, message, span)
}

fn division_by_zero(span: Span) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::DivisionByZero, "Division by zero.", span)
}

fn operand_mismatch(op: BinaryOp, left: &Value, right: &Value, span: Span) -> RuntimeError {
    RuntimeError::type_mismatch(
        format!(
            "Operator '{}' cannot be applied to '{}' and '{}'.",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
        span,
    )
}

pub fn unary(operator: UnaryOp, value: Value, span: Span) -> RuntimeResult<Value> {
    match operator {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Negate => match value {
            Value::Int(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| overflow(format!("Integer overflow in '-({})'.", n), span)),
            Value::Real(r) => Ok(Value::Real(-r)),
            other => Err(RuntimeError::type_mismatch(
                format!("Operator '-' cannot be applied to '{}'.", other.type_name()),
                span,
            )),
        },
    }
}

/// Apply a binary operator to two evaluated operands
pub fn binary(op: BinaryOp, left: &Value, right: &Value, span: Span) -> RuntimeResult<Value> {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            compare(op, left, right, span)
        }
        BinaryOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::from(format!("{}{}", a, b))),
            (Value::Array(a), Value::Array(b)) => {
                let mut items = a.borrow().to_vec();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::array(items))
            }
            _ => arithmetic(op, left, right, span),
        },
        BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo
        | BinaryOp::Power => arithmetic(op, left, right, span),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value, span: Span) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b, span),
        _ => match (left.as_real(), right.as_real()) {
            (Some(a), Some(b)) => real_arithmetic(op, a, b, span),
            _ => Err(operand_mismatch(op, left, right, span)),
        },
    }
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64, span: Span) -> RuntimeResult<Value> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Subtract => a.checked_sub(b),
        BinaryOp::Multiply => a.checked_mul(b),
        // True division
        BinaryOp::Divide => return real_arithmetic(op, a as f64, b as f64, span),
        BinaryOp::Modulo => {
            if b == 0 {
                return Err(division_by_zero(span));
            }
            a.checked_rem(b)
        }
        BinaryOp::Power => {
            if b < 0 {
                return real_arithmetic(op, a as f64, b as f64, span);
            }
            match (a, u32::try_from(b)) {
                (_, Ok(exp)) => a.checked_pow(exp),
                // Bases whose powers never grow
                (0 | 1, Err(_)) => Some(a),
                (-1, Err(_)) => Some(if b % 2 == 0 { 1 } else { -1 }),
                _ => None,
            }
        }
        _ => return Err(operand_mismatch(op, &Value::Int(a), &Value::Int(b), span)),
    };

    result.map(Value::Int).ok_or_else(|| {
        overflow(
            format!("Integer overflow in '{} {} {}'.", a, op.symbol(), b),
            span,
        )
    })
}

fn real_arithmetic(op: BinaryOp, a: f64, b: f64, span: Span) -> RuntimeResult<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => {
            if b == 0.0 {
                return Err(division_by_zero(span));
            }
            a / b
        }
        BinaryOp::Modulo => {
            if b == 0.0 {
                return Err(division_by_zero(span));
            }
            a % b
        }
        BinaryOp::Power => a.powf(b),
        _ => return Err(operand_mismatch(op, &Value::Real(a), &Value::Real(b), span)),
    };
    Ok(Value::Real(result))
}

fn compare(op: BinaryOp, left: &Value, right: &Value, span: Span) -> RuntimeResult<Value> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_real(), right.as_real()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(operand_mismatch(op, left, right, span)),
        },
    };

    // NaN compares false with everything
    let result = ordering.is_some_and(|ord| match op {
        BinaryOp::Less => ord.is_lt(),
        BinaryOp::LessEqual => ord.is_le(),
        BinaryOp::Greater => ord.is_gt(),
        BinaryOp::GreaterEqual => ord.is_ge(),
        _ => false,
    });
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::default()
    }

    #[test]
    fn test_integer_division_yields_real() {
        let result = binary(BinaryOp::Divide, &Value::Int(7), &Value::Int(2), span()).unwrap();
        assert_eq!(result, Value::Real(3.5));
        assert!(matches!(result, Value::Real(_)));
    }

    #[test]
    fn test_power_types() {
        let int = binary(BinaryOp::Power, &Value::Int(2), &Value::Int(10), span()).unwrap();
        assert!(matches!(int, Value::Int(1024)));
        let real = binary(BinaryOp::Power, &Value::Int(2), &Value::Int(-1), span()).unwrap();
        assert_eq!(real, Value::Real(0.5));
    }

    #[test]
    fn test_truncated_remainder() {
        let result = binary(BinaryOp::Modulo, &Value::Int(-7), &Value::Int(3), span()).unwrap();
        assert_eq!(result, Value::Int(-1));
    }

    #[test]
    fn test_overflow_and_division_by_zero() {
        let err = binary(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1), span()).unwrap_err();
        assert!(err.is(RuntimeErrorKind::IntegerOverflow));
        let err = binary(BinaryOp::Modulo, &Value::Int(1), &Value::Int(0), span()).unwrap_err();
        assert!(err.is(RuntimeErrorKind::DivisionByZero));
        let err = binary(BinaryOp::Divide, &Value::Real(1.0), &Value::Int(0), span()).unwrap_err();
        assert!(err.is(RuntimeErrorKind::DivisionByZero));
        let err = unary(UnaryOp::Negate, Value::Int(i64::MIN), span()).unwrap_err();
        assert!(err.is(RuntimeErrorKind::IntegerOverflow));
    }

    #[test]
    fn test_mismatch_message_names_operator_and_types() {
        let err = binary(BinaryOp::Subtract, &Value::from("a"), &Value::Int(1), span()).unwrap_err();
        assert!(err.is(RuntimeErrorKind::TypeMismatch));
        assert_eq!(
            err.message,
            "Operator '-' cannot be applied to 'String' and 'Int'."
        );
    }

    #[test]
    fn test_comparisons() {
        let lt = binary(BinaryOp::Less, &Value::Int(1), &Value::Real(1.5), span()).unwrap();
        assert_eq!(lt, Value::Bool(true));
        let strings = binary(BinaryOp::GreaterEqual, &Value::from("b"), &Value::from("a"), span()).unwrap();
        assert_eq!(strings, Value::Bool(true));
        let nan = binary(BinaryOp::Less, &Value::Real(f64::NAN), &Value::Int(1), span()).unwrap();
        assert_eq!(nan, Value::Bool(false));
        let err = binary(BinaryOp::Less, &Value::Null, &Value::Int(1), span()).unwrap_err();
        assert!(err.is(RuntimeErrorKind::TypeMismatch));
    }

    #[test]
    fn test_equality_never_fails() {
        let eq = binary(BinaryOp::Equal, &Value::Null, &Value::from("x"), span()).unwrap();
        assert_eq!(eq, Value::Bool(false));
    }

    #[test]
    fn test_index_normalization() {
        let array = Value::from(vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
        assert_eq!(index_value(&array, &Value::Int(-1), span()).unwrap(), Value::Int(30));

        for bad in [3, -4] {
            let err = index_value(&array, &Value::Int(bad), span()).unwrap_err();
            assert!(err.is(RuntimeErrorKind::IndexOutOfRange));
        }

        let err = index_value(&array, &Value::Real(1.0), span()).unwrap_err();
        assert!(err.is(RuntimeErrorKind::NonIntegerIndex));
    }

    #[test]
    fn test_index_strings_and_ranges() {
        let s = Value::from("ciao");
        assert_eq!(index_value(&s, &Value::Int(1), span()).unwrap(), Value::from("i"));
        let r = Value::Range(RangeValue::new(2, 5));
        assert_eq!(index_value(&r, &Value::Int(1), span()).unwrap(), Value::Int(3));
        let err = index_value(&Value::Int(4), &Value::Int(0), span()).unwrap_err();
        assert!(err.is(RuntimeErrorKind::UnsupportedIndexTarget));
    }

    #[test]
    fn test_string_index_assignment_is_unsupported() {
        let err = set_index(&Value::from("abc"), &Value::Int(0), Value::from("z"), span()).unwrap_err();
        assert!(err.is(RuntimeErrorKind::UnsupportedIndexTarget));
    }
}
