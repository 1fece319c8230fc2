//! Immutable expression trees and a closure-based builder DSL.
//!
//! Trees are the input of the writer and the output of the parser, so both
//! directions share one node vocabulary:
//!
//! ```rust,ignore
//! let filter = Lambda::new(|x| {
//!     x.clone().member("Name").eq("blah")
//!         .and(x.member("Children").any(|y| y.member("Text").starts_with("a")))
//! });
//! ```

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::model::{EnumValue, Literal, MemberRef};

/// Binary operators of the filter grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Wire token.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::And => "and",
            Self::Or => "or",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
        }
    }

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "ge" => Self::Ge,
            "lt" => Self::Lt,
            "le" => Self::Le,
            "and" => Self::And,
            "or" => Self::Or,
            "add" => Self::Add,
            "sub" => Self::Sub,
            "mul" => Self::Mul,
            "div" => Self::Div,
            "mod" => Self::Mod,
            _ => return None,
        };
        Some(op)
    }

    /// Binding strength; higher binds tighter.
    #[must_use]
    pub fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne => 3,
            Self::Gt | Self::Ge | Self::Lt | Self::Le => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Mod => 6,
        }
    }

    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Ge | Self::Lt | Self::Le
        )
    }

    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod
        )
    }

    /// `a op (b op c)` equals `(a op b) op c`.
    #[must_use]
    pub fn is_associative(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Add | Self::Mul)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
    /// Boolean passthrough.
    IsTrue,
}

/// Owner of a recognized method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeclaringType {
    String,
    Math,
    Enumerable,
    DateTime,
    Object,
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Method {
    pub declaring: DeclaringType,
    pub name: String,
}

impl Method {
    #[must_use]
    pub fn new(declaring: DeclaringType, name: impl Into<String>) -> Self {
        Self {
            declaring,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn string(name: &str) -> Self {
        Self::new(DeclaringType::String, name)
    }

    #[must_use]
    pub fn math(name: &str) -> Self {
        Self::new(DeclaringType::Math, name)
    }

    #[must_use]
    pub fn enumerable(name: &str) -> Self {
        Self::new(DeclaringType::Enumerable, name)
    }

    #[must_use]
    pub fn date_time(name: &str) -> Self {
        Self::new(DeclaringType::DateTime, name)
    }
}

/// Method invocation. Instance methods carry `object`; static and
/// extension methods (quantifiers, math) carry their source in `args`.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodCall {
    pub method: Method,
    pub object: Option<Box<Expr>>,
    pub args: Vec<Expr>,
}

impl MethodCall {
    #[must_use]
    pub fn is(&self, declaring: &DeclaringType, name: &str) -> bool {
        &self.method.declaring == declaring && self.method.name == name
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Single-parameter lambda.
#[derive(Clone, Debug, PartialEq)]
pub struct Lambda {
    pub parameter: Parameter,
    pub body: Box<Expr>,
}

impl Lambda {
    /// Builds a lambda over a root parameter named `x`.
    #[must_use]
    pub fn new(build: impl FnOnce(Expr) -> Expr) -> Self {
        Self::named("x", build)
    }

    #[must_use]
    pub fn named(name: &str, build: impl FnOnce(Expr) -> Expr) -> Self {
        let parameter = Parameter::new(name);
        let body = build(Expr::Parameter(parameter.clone()));
        Self {
            parameter,
            body: Box::new(body),
        }
    }

    /// Lambda that ignores its parameter and returns `true`.
    #[must_use]
    pub fn always_true(name: &str) -> Self {
        Self::named(name, |_| Expr::constant(true))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Parameter(Parameter),
    Constant(Literal),
    Member {
        target: Box<Expr>,
        member: MemberRef,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call(MethodCall),
    Lambda(Lambda),
    /// Record construction in a projection: destination name and source expression.
    New(Vec<(String, Expr)>),
}

/// Conversion of builder arguments into nodes.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for Literal {
    fn into_expr(self) -> Expr {
        Expr::Constant(self)
    }
}

macro_rules! constant_into_expr {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::Constant(Literal::from(self))
                }
            }
        )*
    };
}

constant_into_expr!(
    bool,
    u8,
    i8,
    i16,
    i32,
    i64,
    u16,
    u32,
    u64,
    f32,
    f64,
    Decimal,
    String,
    &str,
    Uuid,
    NaiveDateTime,
    DateTime<FixedOffset>,
    DateTime<Utc>,
    EnumValue,
);

const PARAMETER_NAMES: &[&str] = &[
    "x", "y", "z", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p",
    "q", "r", "s", "t", "u", "v", "w",
];

impl Expr {
    #[must_use]
    pub fn param(name: &str) -> Self {
        Self::Parameter(Parameter::new(name))
    }

    #[must_use]
    pub fn constant(value: impl Into<Literal>) -> Self {
        Self::Constant(value.into())
    }

    #[must_use]
    pub fn null() -> Self {
        Self::Constant(Literal::Null)
    }

    /// Member access by declared name.
    #[must_use]
    pub fn member(self, name: &str) -> Self {
        Self::Member {
            target: Box::new(self),
            member: MemberRef::new(name),
        }
    }

    /// Member access through an interface declaring `declaring_type`.
    #[must_use]
    pub fn interface_member(self, declaring_type: &str, name: &str) -> Self {
        Self::Member {
            target: Box::new(self),
            member: MemberRef::new(name).declared_on(declaring_type),
        }
    }

    #[must_use]
    pub fn binary(op: BinaryOp, left: impl IntoExpr, right: impl IntoExpr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left.into_expr()),
            right: Box::new(right.into_expr()),
        }
    }

    #[must_use]
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    #[must_use]
    pub fn eq(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Eq, self, rhs)
    }

    #[must_use]
    pub fn ne(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Ne, self, rhs)
    }

    #[must_use]
    pub fn gt(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Gt, self, rhs)
    }

    #[must_use]
    pub fn ge(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Ge, self, rhs)
    }

    #[must_use]
    pub fn lt(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Lt, self, rhs)
    }

    #[must_use]
    pub fn le(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Le, self, rhs)
    }

    #[must_use]
    pub fn and(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::And, self, rhs)
    }

    #[must_use]
    pub fn or(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Or, self, rhs)
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn add(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Add, self, rhs)
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Sub, self, rhs)
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Mul, self, rhs)
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn div(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Div, self, rhs)
    }

    #[must_use]
    pub fn modulo(self, rhs: impl IntoExpr) -> Self {
        Self::binary(BinaryOp::Mod, self, rhs)
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::unary(UnaryOp::Not, self)
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn neg(self) -> Self {
        Self::unary(UnaryOp::Negate, self)
    }

    #[must_use]
    pub fn is_true(self) -> Self {
        Self::unary(UnaryOp::IsTrue, self)
    }

    fn instance_call(self, method: Method, args: Vec<Expr>) -> Self {
        Self::Call(MethodCall {
            method,
            object: Some(Box::new(self)),
            args,
        })
    }

    /// Static or extension call.
    #[must_use]
    pub fn call(method: Method, args: Vec<Expr>) -> Self {
        Self::Call(MethodCall {
            method,
            object: None,
            args,
        })
    }

    #[must_use]
    pub fn contains(self, needle: impl IntoExpr) -> Self {
        self.instance_call(Method::string("Contains"), vec![needle.into_expr()])
    }

    #[must_use]
    pub fn starts_with(self, prefix: impl IntoExpr) -> Self {
        self.instance_call(Method::string("StartsWith"), vec![prefix.into_expr()])
    }

    #[must_use]
    pub fn ends_with(self, suffix: impl IntoExpr) -> Self {
        self.instance_call(Method::string("EndsWith"), vec![suffix.into_expr()])
    }

    #[must_use]
    pub fn index_of(self, needle: impl IntoExpr) -> Self {
        self.instance_call(Method::string("IndexOf"), vec![needle.into_expr()])
    }

    #[must_use]
    pub fn substring(self, start: impl IntoExpr) -> Self {
        self.instance_call(Method::string("Substring"), vec![start.into_expr()])
    }

    #[must_use]
    pub fn substring_len(self, start: impl IntoExpr, length: impl IntoExpr) -> Self {
        self.instance_call(
            Method::string("Substring"),
            vec![start.into_expr(), length.into_expr()],
        )
    }

    #[must_use]
    pub fn replace(self, from: impl IntoExpr, to: impl IntoExpr) -> Self {
        self.instance_call(
            Method::string("Replace"),
            vec![from.into_expr(), to.into_expr()],
        )
    }

    #[must_use]
    pub fn trim(self) -> Self {
        self.instance_call(Method::string("Trim"), Vec::new())
    }

    #[must_use]
    pub fn to_upper(self) -> Self {
        self.instance_call(Method::string("ToUpper"), Vec::new())
    }

    #[must_use]
    pub fn to_lower(self) -> Self {
        self.instance_call(Method::string("ToLower"), Vec::new())
    }

    #[must_use]
    pub fn length(self) -> Self {
        self.instance_call(Method::string("Length"), Vec::new())
    }

    #[must_use]
    pub fn concat(self, other: impl IntoExpr) -> Self {
        Self::call(Method::string("Concat"), vec![self, other.into_expr()])
    }

    #[must_use]
    pub fn equals(self, other: impl IntoExpr) -> Self {
        self.instance_call(
            Method::new(DeclaringType::Object, "Equals"),
            vec![other.into_expr()],
        )
    }

    #[must_use]
    pub fn round(self) -> Self {
        Self::call(Method::math("Round"), vec![self])
    }

    #[must_use]
    pub fn floor(self) -> Self {
        Self::call(Method::math("Floor"), vec![self])
    }

    #[must_use]
    pub fn ceiling(self) -> Self {
        Self::call(Method::math("Ceiling"), vec![self])
    }

    #[must_use]
    pub fn year(self) -> Self {
        self.instance_call(Method::date_time("Year"), Vec::new())
    }

    #[must_use]
    pub fn month(self) -> Self {
        self.instance_call(Method::date_time("Month"), Vec::new())
    }

    #[must_use]
    pub fn day(self) -> Self {
        self.instance_call(Method::date_time("Day"), Vec::new())
    }

    #[must_use]
    pub fn hour(self) -> Self {
        self.instance_call(Method::date_time("Hour"), Vec::new())
    }

    #[must_use]
    pub fn minute(self) -> Self {
        self.instance_call(Method::date_time("Minute"), Vec::new())
    }

    #[must_use]
    pub fn second(self) -> Self {
        self.instance_call(Method::date_time("Second"), Vec::new())
    }

    /// `source.Any(p => body)`; `p` is renamed past every parameter in scope.
    #[must_use]
    pub fn any(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.quantifier("Any", build)
    }

    #[must_use]
    pub fn all(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.quantifier("All", build)
    }

    /// Predicate-less `source.Any()`.
    #[must_use]
    pub fn any_empty(self) -> Self {
        Self::call(Method::enumerable("Any"), vec![self])
    }

    fn quantifier(self, name: &str, build: impl FnOnce(Expr) -> Expr) -> Self {
        let lambda = Lambda::named(&placeholder_parameter(), build);
        Self::quantified(name, self, lambda)
    }

    /// `source.<name>(lambda)` with every quantifier parameter in the call
    /// renamed past the names visible where it is bound.
    pub(crate) fn quantified(name: &str, source: Expr, lambda: Lambda) -> Self {
        let mut call = Self::call(Method::enumerable(name), vec![source, Self::Lambda(lambda)]);
        call.name_quantifiers(None);
        call
    }

    /// `enclosing` is the index of the innermost quantifier parameter in scope.
    fn name_quantifiers(&mut self, enclosing: Option<usize>) {
        match self {
            Self::Parameter(_) | Self::Constant(_) => {}
            Self::Member { target, .. } => target.name_quantifiers(enclosing),
            Self::Binary { left, right, .. } => {
                left.name_quantifiers(enclosing);
                right.name_quantifiers(enclosing);
            }
            Self::Unary { operand, .. } => operand.name_quantifiers(enclosing),
            Self::Call(call) => {
                if let Some(object) = &mut call.object {
                    object.name_quantifiers(enclosing);
                }
                let floor = call
                    .args
                    .first()
                    .map_or(enclosing, |source| deepest_parameter(source).max(enclosing));
                for arg in &mut call.args {
                    match arg {
                        Self::Lambda(lambda) => lambda.name_parameter(floor),
                        other => other.name_quantifiers(enclosing),
                    }
                }
            }
            Self::Lambda(lambda) => lambda.name_parameter(enclosing),
            Self::New(fields) => {
                for (_, e) in fields {
                    e.name_quantifiers(enclosing);
                }
            }
        }
    }

    /// Renames free references to `from` into `to`.
    fn rename_parameter(&mut self, from: &str, to: &str) {
        match self {
            Self::Parameter(p) => {
                if p.name == from {
                    to.clone_into(&mut p.name);
                }
            }
            Self::Constant(_) => {}
            Self::Member { target, .. } => target.rename_parameter(from, to),
            Self::Binary { left, right, .. } => {
                left.rename_parameter(from, to);
                right.rename_parameter(from, to);
            }
            Self::Unary { operand, .. } => operand.rename_parameter(from, to),
            Self::Call(call) => {
                if let Some(object) = &mut call.object {
                    object.rename_parameter(from, to);
                }
                for arg in &mut call.args {
                    arg.rename_parameter(from, to);
                }
            }
            Self::Lambda(lambda) => {
                if lambda.parameter.name != from {
                    lambda.body.rename_parameter(from, to);
                }
            }
            Self::New(fields) => {
                for (_, e) in fields {
                    e.rename_parameter(from, to);
                }
            }
        }
    }

    /// Projection into a record shape.
    #[must_use]
    pub fn new_record<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<String>,
    {
        Self::New(fields.into_iter().map(|(n, e)| (n.into(), e)).collect())
    }

    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    /// Visits every parameter reference, descending into nested lambdas.
    pub fn for_each_parameter<'a>(&'a self, visit: &mut impl FnMut(&'a Parameter)) {
        match self {
            Self::Parameter(p) => visit(p),
            Self::Constant(_) => {}
            Self::Member { target, .. } => target.for_each_parameter(visit),
            Self::Binary { left, right, .. } => {
                left.for_each_parameter(visit);
                right.for_each_parameter(visit);
            }
            Self::Unary { operand, .. } => operand.for_each_parameter(visit),
            Self::Call(call) => {
                if let Some(object) = &call.object {
                    object.for_each_parameter(visit);
                }
                for arg in &call.args {
                    arg.for_each_parameter(visit);
                }
            }
            Self::Lambda(lambda) => {
                visit(&lambda.parameter);
                lambda.body.for_each_parameter(visit);
            }
            Self::New(fields) => {
                for (_, e) in fields {
                    e.for_each_parameter(visit);
                }
            }
        }
    }
}

static PLACEHOLDERS: AtomicUsize = AtomicUsize::new(0);

/// Temporary binder name for a quantifier whose body is still being built.
/// Never matches a synthesized name.
pub(crate) fn placeholder_parameter() -> String {
    format!("#{}", PLACEHOLDERS.fetch_add(1, Ordering::Relaxed))
}

fn parameter_index(name: &str) -> Option<usize> {
    PARAMETER_NAMES
        .iter()
        .position(|n| *n == name)
        .or_else(|| name.strip_prefix('v')?.parse().ok())
}

fn deepest_parameter(expr: &Expr) -> Option<usize> {
    let mut deepest = None;
    expr.for_each_parameter(&mut |p| {
        deepest = deepest.max(parameter_index(&p.name));
    });
    deepest
}

impl Lambda {
    /// Binds this parameter one past `floor`. Nested quantifiers are named
    /// first so that renaming this one cannot be captured by them.
    fn name_parameter(&mut self, floor: Option<usize>) {
        let index = floor.map_or(1, |d| d + 1);
        self.body.name_quantifiers(Some(index));
        let name = quantifier_variable(index);
        if self.parameter.name != name {
            let previous = std::mem::replace(&mut self.parameter.name, name);
            self.body.rename_parameter(&previous, &self.parameter.name);
        }
    }
}

/// Synthesized name of the quantifier variable at `depth` (1-based).
pub(crate) fn quantifier_variable(depth: usize) -> String {
    PARAMETER_NAMES
        .get(depth)
        .map_or_else(|| format!("v{depth}"), |n| (*n).to_owned())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_binary_token_round_trip() {
        for op in [
            BinaryOp::Eq,
            BinaryOp::Ne,
            BinaryOp::Gt,
            BinaryOp::Ge,
            BinaryOp::Lt,
            BinaryOp::Le,
            BinaryOp::And,
            BinaryOp::Or,
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Mod,
        ] {
            assert_eq!(BinaryOp::from_token(op.token()), Some(op));
        }
        assert_eq!(BinaryOp::from_token("xor"), None);
    }

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOp::Or.precedence() < BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() < BinaryOp::Eq.precedence());
        assert!(BinaryOp::Eq.precedence() < BinaryOp::Lt.precedence());
        assert!(BinaryOp::Lt.precedence() < BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::Mul.precedence());
    }

    #[test]
    fn test_quantifier_parameters_nest() {
        let lambda = Lambda::new(|x| {
            x.member("Children")
                .all(|y| y.member("Descendants").any(|z| z.member("Text").eq("blah")))
        });

        let Expr::Call(outer) = lambda.body.as_ref() else {
            panic!("expected call");
        };
        let Expr::Lambda(outer_lambda) = &outer.args[1] else {
            panic!("expected lambda");
        };
        assert_eq!(outer_lambda.parameter.name, "y");

        let Expr::Call(inner) = outer_lambda.body.as_ref() else {
            panic!("expected call");
        };
        let Expr::Lambda(inner_lambda) = &inner.args[1] else {
            panic!("expected lambda");
        };
        assert_eq!(inner_lambda.parameter.name, "z");
    }

    #[test]
    fn test_correlated_quantifier_gets_a_fresh_parameter() {
        let lambda = Lambda::new(|x| {
            x.clone().member("Children").any(move |y| {
                x.member("Children")
                    .any(|z| z.member("Text").ne(y.member("Text")))
            })
        });
        let inner = Lambda {
            parameter: Parameter::new("z"),
            body: Box::new(Expr::param("z").member("Text").ne(Expr::param("y").member("Text"))),
        };
        let outer = Lambda {
            parameter: Parameter::new("y"),
            body: Box::new(Expr::call(
                Method::enumerable("Any"),
                vec![Expr::param("x").member("Children"), Expr::Lambda(inner)],
            )),
        };
        let expected = Expr::call(
            Method::enumerable("Any"),
            vec![Expr::param("x").member("Children"), Expr::Lambda(outer)],
        );
        assert_eq!(*lambda.body, expected);
    }

    #[test]
    fn test_rebuilt_quantifier_keeps_inner_binding() {
        let inner = Expr::param("x")
            .member("Children")
            .any(|y| y.member("Text").eq("a"));
        let outer = Expr::quantified(
            "All",
            Expr::param("x").member("Children"),
            Lambda::named("#outer", |_| inner),
        );
        let Expr::Call(call) = &outer else {
            panic!("expected call");
        };
        let Expr::Lambda(lambda) = &call.args[1] else {
            panic!("expected lambda");
        };
        assert_eq!(lambda.parameter.name, "y");
        let Expr::Call(nested) = lambda.body.as_ref() else {
            panic!("expected call");
        };
        let Expr::Lambda(nested) = &nested.args[1] else {
            panic!("expected lambda");
        };
        assert_eq!(nested.parameter.name, "z");
        assert_eq!(
            *nested.body,
            Expr::param("z").member("Text").eq("a")
        );
    }

    #[test]
    fn test_builder_shapes_member_chain() {
        let e = Expr::param("x").member("Child").member("Name");
        let Expr::Member { target, member } = e else {
            panic!("expected member");
        };
        assert_eq!(member.name, "Name");
        assert!(matches!(*target, Expr::Member { .. }));
    }

    #[test]
    fn test_quantifier_variable_sequence() {
        assert_eq!(quantifier_variable(1), "y");
        assert_eq!(quantifier_variable(2), "z");
        assert_eq!(quantifier_variable(3), "a");
    }
}
