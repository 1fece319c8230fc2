//! In-memory evaluation of expression trees against [`Record`]s.
//!
//! A [`Predicate`] is compiled once from a filter lambda and then applied
//! to any number of records. Compilation rejects nodes the interpreter
//! cannot run and folds a `target ne null` check in front of every boolean
//! leaf that calls a string method on a non-constant target, so a missing
//! value makes that leaf false instead of failing.

use chrono::{Datelike, Timelike};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::expr::{BinaryOp, DeclaringType, Expr, Lambda, MethodCall, UnaryOp};
use crate::model::{Literal, Record, Value};

type Scope<'e, 'r> = Vec<(&'e str, Value<'r>)>;

/// Compiled boolean filter.
#[derive(Clone, Debug)]
pub struct Predicate {
    lambda: Lambda,
}

impl Predicate {
    /// # Errors
    /// `Error::UnsupportedOperation` when the body calls a method the
    /// interpreter does not implement or constructs a record.
    pub fn compile(lambda: &Lambda) -> Result<Self> {
        check(&lambda.body)?;
        Ok(Self {
            lambda: Lambda {
                parameter: lambda.parameter.clone(),
                body: Box::new(guard(&lambda.body)),
            },
        })
    }

    /// The guarded tree that [`Predicate::matches`] runs.
    #[must_use]
    pub fn expression(&self) -> &Lambda {
        &self.lambda
    }

    #[must_use]
    pub fn matches(&self, record: &dyn Record) -> bool {
        evaluate(&self.lambda, record).is_true()
    }
}

/// Compiled value selector, used for ordering keys.
#[derive(Clone, Debug)]
pub struct Selector {
    lambda: Lambda,
}

impl Selector {
    /// # Errors
    /// See [`Predicate::compile`].
    pub fn compile(lambda: &Lambda) -> Result<Self> {
        check(&lambda.body)?;
        Ok(Self {
            lambda: lambda.clone(),
        })
    }

    #[must_use]
    pub fn select<'r>(&self, record: &'r dyn Record) -> Value<'r> {
        evaluate(&self.lambda, record)
    }
}

/// Runs `lambda` with its parameter bound to `record`.
#[must_use]
pub fn evaluate<'r>(lambda: &Lambda, record: &'r dyn Record) -> Value<'r> {
    let mut scope: Scope<'_, 'r> = vec![(lambda.parameter.name.as_str(), Value::Record(record))];
    eval(&lambda.body, &mut scope)
}

/// Total order over values for sorting; `null` sorts first.
#[must_use]
pub fn compare_values(a: &Value<'_>, b: &Value<'_>) -> Ordering {
    match (a.as_literal(), b.as_literal()) {
        (Some(x), Some(y)) => match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => compare_literals(x, y).unwrap_or(Ordering::Equal),
        },
        _ => Ordering::Equal,
    }
}

fn check(expr: &Expr) -> Result<()> {
    match expr {
        Expr::Parameter(_) | Expr::Constant(_) => Ok(()),
        Expr::Member { target, .. } => check(target),
        Expr::Binary { left, right, .. } => {
            check(left)?;
            check(right)
        }
        Expr::Unary { operand, .. } => check(operand),
        Expr::Call(call) => {
            if !evaluable(call) {
                return Err(Error::unsupported(format!(
                    "Cannot evaluate method '{}'",
                    call.method.name
                )));
            }
            if let Some(object) = &call.object {
                check(object)?;
            }
            call.args.iter().try_for_each(check)
        }
        Expr::Lambda(lambda) => check(&lambda.body),
        Expr::New(_) => Err(Error::unsupported(
            "Record construction cannot be evaluated",
        )),
    }
}

fn evaluable(call: &MethodCall) -> bool {
    let name = call.method.name.as_str();
    match &call.method.declaring {
        DeclaringType::String => matches!(
            name,
            "Contains"
                | "StartsWith"
                | "EndsWith"
                | "IndexOf"
                | "Substring"
                | "Replace"
                | "Trim"
                | "ToUpper"
                | "ToUpperInvariant"
                | "ToLower"
                | "ToLowerInvariant"
                | "Length"
                | "Concat"
        ),
        DeclaringType::Math => matches!(name, "Round" | "Floor" | "Ceiling"),
        DeclaringType::DateTime => {
            matches!(name, "Year" | "Month" | "Day" | "Hour" | "Minute" | "Second")
        }
        DeclaringType::Enumerable => matches!(name, "Any" | "All"),
        DeclaringType::Object | DeclaringType::Other(_) => name == "Equals",
    }
}

fn guard(expr: &Expr) -> Expr {
    match expr {
        Expr::Binary {
            op: op @ (BinaryOp::And | BinaryOp::Or),
            left,
            right,
        } => Expr::binary(*op, guard(left), guard(right)),
        Expr::Unary {
            op: op @ (UnaryOp::Not | UnaryOp::IsTrue),
            operand,
        } => Expr::unary(*op, guard(operand)),
        leaf => {
            let body = guard_lambdas(leaf);
            let mut targets = Vec::new();
            collect_string_targets(&body, &mut targets);
            targets
                .into_iter()
                .rev()
                .fold(body, |acc, target| target.ne(Expr::null()).and(acc))
        }
    }
}

/// Copy of `expr` with every quantifier body guarded on its own.
fn guard_lambdas(expr: &Expr) -> Expr {
    match expr {
        Expr::Call(call) => Expr::Call(MethodCall {
            method: call.method.clone(),
            object: call.object.as_deref().map(|o| Box::new(guard_lambdas(o))),
            args: call
                .args
                .iter()
                .map(|arg| match arg {
                    Expr::Lambda(lambda) => Expr::Lambda(Lambda {
                        parameter: lambda.parameter.clone(),
                        body: Box::new(guard(&lambda.body)),
                    }),
                    other => guard_lambdas(other),
                })
                .collect(),
        }),
        Expr::Member { target, member } => Expr::Member {
            target: Box::new(guard_lambdas(target)),
            member: member.clone(),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(guard_lambdas(left)),
            right: Box::new(guard_lambdas(right)),
        },
        Expr::Unary { op, operand } => Expr::unary(*op, guard_lambdas(operand)),
        other => other.clone(),
    }
}

/// Member or parameter targets of string method calls, innermost first.
fn collect_string_targets(expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Call(call) => {
            if let Some(object) = &call.object {
                collect_string_targets(object, out);
                let plain = !matches!(object.as_ref(), Expr::Constant(_) | Expr::Call(_));
                if call.method.declaring == DeclaringType::String
                    && plain
                    && !out.contains(object.as_ref())
                {
                    out.push(object.as_ref().clone());
                }
            }
            for arg in call.args.iter().filter(|a| !matches!(a, Expr::Lambda(_))) {
                collect_string_targets(arg, out);
            }
        }
        Expr::Member { target, .. } => collect_string_targets(target, out),
        Expr::Binary { left, right, .. } => {
            collect_string_targets(left, out);
            collect_string_targets(right, out);
        }
        Expr::Unary { operand, .. } => collect_string_targets(operand, out),
        Expr::Parameter(_) | Expr::Constant(_) | Expr::Lambda(_) | Expr::New(_) => {}
    }
}

fn bool_value(value: bool) -> Value<'static> {
    Value::Scalar(Literal::Bool(value))
}

fn eval<'e, 'r>(expr: &'e Expr, scope: &mut Scope<'e, 'r>) -> Value<'r> {
    match expr {
        Expr::Parameter(p) => scope
            .iter()
            .rev()
            .find(|(name, _)| *name == p.name)
            .map_or(Value::NULL, |(_, value)| value.clone()),
        Expr::Constant(literal) => Value::Scalar(literal.clone()),
        Expr::Member { target, member } => match eval(target, scope) {
            Value::Record(record) => record.field(member).unwrap_or(Value::NULL),
            _ => Value::NULL,
        },
        Expr::Binary { op, left, right } => binary(*op, left, right, scope),
        Expr::Unary { op, operand } => unary(*op, eval(operand, scope)),
        Expr::Call(call) => call_method(call, scope),
        Expr::Lambda(_) | Expr::New(_) => Value::NULL,
    }
}

fn binary<'e, 'r>(op: BinaryOp, left: &'e Expr, right: &'e Expr, scope: &mut Scope<'e, 'r>) -> Value<'r> {
    match op {
        BinaryOp::And => bool_value(eval(left, scope).is_true() && eval(right, scope).is_true()),
        BinaryOp::Or => bool_value(eval(left, scope).is_true() || eval(right, scope).is_true()),
        BinaryOp::Eq => bool_value(values_equal(&eval(left, scope), &eval(right, scope))),
        BinaryOp::Ne => bool_value(!values_equal(&eval(left, scope), &eval(right, scope))),
        BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le => {
            let (l, r) = (eval(left, scope), eval(right, scope));
            let ordering = match (l.as_literal(), r.as_literal()) {
                (Some(a), Some(b)) if !a.is_null() && !b.is_null() => compare_literals(a, b),
                _ => None,
            };
            bool_value(ordering.is_some_and(|o| match op {
                BinaryOp::Gt => o.is_gt(),
                BinaryOp::Ge => o.is_ge(),
                BinaryOp::Lt => o.is_lt(),
                _ => o.is_le(),
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, &eval(left, scope), &eval(right, scope))
        }
    }
}

fn values_equal(a: &Value<'_>, b: &Value<'_>) -> bool {
    match (a, b) {
        (Value::Scalar(x), Value::Scalar(y)) => {
            if x.is_null() || y.is_null() {
                x.is_null() && y.is_null()
            } else {
                compare_literals(x, y) == Some(Ordering::Equal)
            }
        }
        (Value::Record(x), Value::Record(y)) => std::ptr::addr_eq(*x, *y),
        _ => false,
    }
}

/// Ordinal comparison within a value family; `None` across families.
fn compare_literals(a: &Literal, b: &Literal) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (Number::of(a), Number::of(b)) {
        return x.compare(y);
    }
    match (a, b) {
        (Literal::String(x), Literal::String(y)) => Some(x.cmp(y)),
        (Literal::Bool(x), Literal::Bool(y)) => Some(x.cmp(y)),
        (Literal::Guid(x), Literal::Guid(y)) => Some(x.cmp(y)),
        (Literal::DateTime(x), Literal::DateTime(y)) => Some(x.cmp(y)),
        (Literal::DateTimeOffset(x), Literal::DateTimeOffset(y)) => Some(x.cmp(y)),
        (Literal::DateTime(x), Literal::DateTimeOffset(y)) => Some(x.and_utc().cmp(&y.to_utc())),
        (Literal::DateTimeOffset(x), Literal::DateTime(y)) => Some(x.to_utc().cmp(&y.and_utc())),
        (Literal::Enum(x), Literal::Enum(y)) => (x == y).then_some(Ordering::Equal),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Number {
    Integer(i128),
    Float(f64),
    Decimal(Decimal),
}

impl Number {
    fn of(literal: &Literal) -> Option<Self> {
        if let Some(i) = literal.as_integer() {
            return Some(Self::Integer(i));
        }
        match *literal {
            Literal::Single(v) => Some(Self::Float(f64::from(v))),
            Literal::Double(v) => Some(Self::Float(v)),
            Literal::Decimal(v) => Some(Self::Decimal(v)),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_f64(self) -> f64 {
        match self {
            Self::Integer(i) => i as f64,
            Self::Float(f) => f,
            Self::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
        }
    }

    fn to_decimal(self) -> Option<Decimal> {
        match self {
            Self::Integer(i) => Decimal::try_from_i128_with_scale(i, 0).ok(),
            Self::Float(f) => Decimal::try_from(f).ok(),
            Self::Decimal(d) => Some(d),
        }
    }

    fn compare(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(&b)),
            (Self::Float(_), _) | (_, Self::Float(_)) => self.to_f64().partial_cmp(&other.to_f64()),
            _ => Some(self.to_decimal()?.cmp(&other.to_decimal()?)),
        }
    }
}

fn arithmetic(op: BinaryOp, left: &Value<'_>, right: &Value<'_>) -> Value<'static> {
    let (Some(a), Some(b)) = (
        left.as_literal().and_then(Number::of),
        right.as_literal().and_then(Number::of),
    ) else {
        return Value::NULL;
    };
    let result = match (a, b) {
        (Number::Integer(x), Number::Integer(y)) => {
            let value = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                BinaryOp::Div => x.checked_div(y),
                BinaryOp::Mod => x.checked_rem(y),
                _ => None,
            };
            value.and_then(|v| i64::try_from(v).ok()).map(Literal::Int64)
        }
        (Number::Float(_), _) | (_, Number::Float(_)) => {
            let (x, y) = (a.to_f64(), b.to_f64());
            let value = match op {
                BinaryOp::Add => Some(x + y),
                BinaryOp::Sub => Some(x - y),
                BinaryOp::Mul => Some(x * y),
                BinaryOp::Div => Some(x / y),
                BinaryOp::Mod => Some(x % y),
                _ => None,
            };
            value.map(Literal::Double)
        }
        _ => a.to_decimal().zip(b.to_decimal()).and_then(|(x, y)| {
            let value = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                BinaryOp::Div => x.checked_div(y),
                BinaryOp::Mod => x.checked_rem(y),
                _ => None,
            };
            value.map(Literal::Decimal)
        }),
    };
    result.map_or(Value::NULL, Value::Scalar)
}

fn unary(op: UnaryOp, value: Value<'_>) -> Value<'_> {
    match op {
        UnaryOp::IsTrue => value,
        UnaryOp::Not => match value.as_literal() {
            Some(Literal::Bool(b)) => bool_value(!b),
            _ => Value::NULL,
        },
        UnaryOp::Negate => {
            let negated = match value.as_literal().and_then(Number::of) {
                Some(Number::Integer(i)) => i64::try_from(-i).ok().map(Literal::Int64),
                Some(Number::Float(f)) => Some(Literal::Double(-f)),
                Some(Number::Decimal(d)) => Some(Literal::Decimal(-d)),
                None => None,
            };
            negated.map_or(Value::NULL, Value::Scalar)
        }
    }
}

fn call_method<'e, 'r>(call: &'e MethodCall, scope: &mut Scope<'e, 'r>) -> Value<'r> {
    match &call.method.declaring {
        DeclaringType::String => string_method(call, scope),
        DeclaringType::Math => math_method(call, scope),
        DeclaringType::DateTime => date_part(call, scope),
        DeclaringType::Enumerable => quantifier(call, scope),
        DeclaringType::Object | DeclaringType::Other(_) => {
            let mut operands = call
                .object
                .as_deref()
                .into_iter()
                .chain(call.args.iter())
                .map(|e| eval(e, scope));
            match (operands.next(), operands.next(), operands.next()) {
                (Some(a), Some(b), None) if call.method.name == "Equals" => {
                    bool_value(values_equal(&a, &b))
                }
                _ => Value::NULL,
            }
        }
    }
}

fn string_method<'e, 'r>(call: &'e MethodCall, scope: &mut Scope<'e, 'r>) -> Value<'r> {
    let args: Vec<Value<'r>> = call.args.iter().map(|a| eval(a, scope)).collect();
    let Some(object) = call.object.as_deref() else {
        if call.method.name != "Concat" {
            return Value::NULL;
        }
        let joined: String = args
            .iter()
            .filter_map(Value::as_literal)
            .filter(|lit| !lit.is_null())
            .map(ToString::to_string)
            .collect();
        return Value::Scalar(Literal::String(joined));
    };

    let target = eval(object, scope);
    let Some(text) = target.as_literal().and_then(Literal::as_str) else {
        return Value::NULL;
    };
    let text_arg = |i: usize| args.get(i).and_then(Value::as_literal).and_then(Literal::as_str);
    let int_arg = |i: usize| args.get(i).and_then(Value::as_literal).and_then(Literal::as_integer);

    let result = match (call.method.name.as_str(), args.len()) {
        ("Contains", 1) => text_arg(0).map(|n| Literal::Bool(text.contains(n))),
        ("StartsWith", 1) => text_arg(0).map(|n| Literal::Bool(text.starts_with(n))),
        ("EndsWith", 1) => text_arg(0).map(|n| Literal::Bool(text.ends_with(n))),
        ("IndexOf", 1) => text_arg(0).map(|n| Literal::Int32(char_index(text, n))),
        ("Substring", 1) => int_arg(0).and_then(|start| substring(text, start, None)),
        ("Substring", 2) => int_arg(0)
            .zip(int_arg(1))
            .and_then(|(start, len)| substring(text, start, Some(len))),
        ("Replace", 2) => text_arg(0).zip(text_arg(1)).map(|(from, to)| {
            if from.is_empty() {
                Literal::from(text)
            } else {
                Literal::String(text.replace(from, to))
            }
        }),
        ("Trim", 0) => Some(Literal::from(text.trim())),
        ("ToUpper" | "ToUpperInvariant", 0) => Some(Literal::String(text.to_uppercase())),
        ("ToLower" | "ToLowerInvariant", 0) => Some(Literal::String(text.to_lowercase())),
        ("Length", 0) => i32::try_from(text.chars().count()).ok().map(Literal::Int32),
        _ => None,
    };
    result.map_or(Value::NULL, Value::Scalar)
}

/// Character index of `needle` in `text`, or -1.
fn char_index(text: &str, needle: &str) -> i32 {
    text.find(needle).map_or(-1, |byte| {
        i32::try_from(text[..byte].chars().count()).unwrap_or(i32::MAX)
    })
}

fn substring(text: &str, start: i128, length: Option<i128>) -> Option<Literal> {
    let chars: Vec<char> = text.chars().collect();
    let start = usize::try_from(start).ok()?;
    let end = match length {
        Some(len) => start.checked_add(usize::try_from(len).ok()?)?,
        None => chars.len(),
    };
    let slice = chars.get(start..end)?;
    Some(Literal::String(slice.iter().collect()))
}

fn math_method<'e, 'r>(call: &'e MethodCall, scope: &mut Scope<'e, 'r>) -> Value<'r> {
    let Some(operand) = call.args.first() else {
        return Value::NULL;
    };
    let value = eval(operand, scope);
    let Some(literal) = value.as_literal() else {
        return Value::NULL;
    };
    let name = call.method.name.as_str();
    let result = match literal {
        Literal::Double(v) => round_float(name, *v).map(Literal::Double),
        Literal::Single(v) => match name {
            "Round" => Some(Literal::Single(v.round_ties_even())),
            "Floor" => Some(Literal::Single(v.floor())),
            "Ceiling" => Some(Literal::Single(v.ceil())),
            _ => None,
        },
        Literal::Decimal(d) => match name {
            "Round" => Some(Literal::Decimal(d.round())),
            "Floor" => Some(Literal::Decimal(d.floor())),
            "Ceiling" => Some(Literal::Decimal(d.ceil())),
            _ => None,
        },
        other if other.as_integer().is_some() => Some(other.clone()),
        _ => None,
    };
    result.map_or(Value::NULL, Value::Scalar)
}

/// Midpoints round to even.
fn round_float(name: &str, value: f64) -> Option<f64> {
    match name {
        "Round" => Some(value.round_ties_even()),
        "Floor" => Some(value.floor()),
        "Ceiling" => Some(value.ceil()),
        _ => None,
    }
}

fn date_part<'e, 'r>(call: &'e MethodCall, scope: &mut Scope<'e, 'r>) -> Value<'r> {
    let Some(object) = call.object.as_deref() else {
        return Value::NULL;
    };
    let value = eval(object, scope);
    let (date, time) = match value.as_literal() {
        Some(Literal::DateTime(v)) => (v.date(), v.time()),
        Some(Literal::DateTimeOffset(v)) => (v.date_naive(), v.time()),
        _ => return Value::NULL,
    };
    let part = match call.method.name.as_str() {
        "Year" => Some(date.year()),
        "Month" => i32::try_from(date.month()).ok(),
        "Day" => i32::try_from(date.day()).ok(),
        "Hour" => i32::try_from(time.hour()).ok(),
        "Minute" => i32::try_from(time.minute()).ok(),
        "Second" => i32::try_from(time.second()).ok(),
        _ => None,
    };
    part.map_or(Value::NULL, |p| Value::Scalar(Literal::Int32(p)))
}

fn quantifier<'e, 'r>(call: &'e MethodCall, scope: &mut Scope<'e, 'r>) -> Value<'r> {
    let Some(source) = call.args.first() else {
        return Value::NULL;
    };
    let Value::Collection(items) = eval(source, scope) else {
        return Value::NULL;
    };
    let mut test = |lambda: &'e Lambda, item: Value<'r>| {
        scope.push((lambda.parameter.name.as_str(), item));
        let result = eval(&lambda.body, scope).is_true();
        scope.pop();
        result
    };
    match (call.method.name.as_str(), call.args.get(1)) {
        ("Any", None) => bool_value(!items.is_empty()),
        ("Any", Some(Expr::Lambda(lambda))) => {
            bool_value(items.into_iter().any(|item| test(lambda, item)))
        }
        ("All", Some(Expr::Lambda(lambda))) => {
            bool_value(items.into_iter().all(|item| test(lambda, item)))
        }
        _ => Value::NULL,
    }
}
