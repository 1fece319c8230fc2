//! OData filter text to expression trees.
//!
//! [`FilterParser`] tokenizes a `$filter` value and builds a typed tree
//! against a source descriptor by precedence climbing. Literals are kept
//! raw until the opposite operand is known, so `DoubleValue gt 64` reads
//! `64` as a double while a bare `64` reads as an `Int32`.

mod lexer;
pub mod readers;

use std::sync::Arc;
use tracing::debug;

use crate::config::QuerySettings;
use crate::error::{Error, Result};
use crate::expr::{BinaryOp, Expr, Lambda, Method, Parameter, UnaryOp, placeholder_parameter};
use crate::model::{EntityType, Literal, Member, MemberRef, TypeRef};
use crate::resolver::MemberNameResolver;
use lexer::{Token, tokenize};

pub use readers::{LiteralReader, read_as, read_literal};

const ROOT_PARAMETER: &str = "x";

const FUNCTIONS: &[&str] = &[
    "substringof",
    "contains",
    "startswith",
    "endswith",
    "indexof",
    "substring",
    "replace",
    "trim",
    "toupper",
    "tolower",
    "length",
    "concat",
    "round",
    "floor",
    "ceiling",
    "year",
    "month",
    "day",
    "hour",
    "minute",
    "second",
];

/// Converts filter and member-path text into lambdas over a source type.
#[derive(Clone)]
pub struct FilterParser {
    resolver: Arc<MemberNameResolver>,
    ignore_case: bool,
}

impl FilterParser {
    #[must_use]
    pub fn new(resolver: Arc<MemberNameResolver>) -> Self {
        Self {
            resolver,
            ignore_case: false,
        }
    }

    /// Parser configured from loaded settings.
    #[must_use]
    pub fn from_settings(resolver: Arc<MemberNameResolver>, settings: &QuerySettings) -> Self {
        Self::new(resolver).ignore_case(settings.ignore_case)
    }

    /// Resolve member aliases and compare strings with case folding.
    #[must_use]
    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<MemberNameResolver> {
        &self.resolver
    }

    /// Parses a boolean filter expression into a predicate lambda.
    ///
    /// # Errors
    /// `Error::Format` naming the offending token for malformed literals,
    /// unknown members or functions, type mismatches and trailing input.
    pub fn convert(&self, text: &str, source: &'static EntityType) -> Result<Lambda> {
        let mut parser = Parser::new(self, tokenize(text)?, source);
        if parser.tokens.is_empty() {
            return Err(Error::format("Filter expression is empty"));
        }
        let operand = parser.parse_expr(0)?;
        parser.finish()?;
        let (body, ty) = parser.settle(operand, None)?;
        if !ty.as_ref().is_some_and(TypeRef::is_bool) {
            return Err(Error::format(format!(
                "Filter '{text}' does not evaluate to a boolean"
            )));
        }
        debug!(filter = %text, entity = %source.full_name(), "converted filter");
        Ok(Lambda {
            parameter: Parameter::new(ROOT_PARAMETER),
            body: Box::new(body),
        })
    }

    /// Parses a member path such as `Child/Name` into a selector lambda and
    /// the selected member's type.
    ///
    /// # Errors
    /// `Error::Format` when the path does not resolve on `source`.
    pub fn convert_selector(
        &self,
        path: &str,
        source: &'static EntityType,
    ) -> Result<(Lambda, TypeRef)> {
        let tokens = tokenize(path)?;
        let mut parser = Parser::new(self, tokens, source);
        let Some(Token::Word(first)) = parser.next() else {
            return Err(Error::format(format!("'{path}' is not a member path")));
        };
        let operand = parser.parse_path(first)?;
        parser.finish()?;
        match operand {
            Operand::Typed(body @ Expr::Member { .. }, Some(ty)) => Ok((
                Lambda {
                    parameter: Parameter::new(ROOT_PARAMETER),
                    body: Box::new(body),
                },
                ty,
            )),
            _ => Err(Error::format(format!(
                "Could not resolve member '{path}' on {}",
                source.full_name()
            ))),
        }
    }
}

/// Parsed operand. Literals stay raw until a type hint is available.
enum Operand {
    Typed(Expr, Option<TypeRef>),
    Pending(String),
}

fn typed(expr: Expr, ty: TypeRef) -> Operand {
    Operand::Typed(expr, Some(ty))
}

/// Quantifier variable in scope: spelled `name` in the text, bound to `parameter`.
struct Bound {
    name: String,
    parameter: String,
    ty: TypeRef,
}

struct Parser<'p, 's> {
    owner: &'p FilterParser,
    tokens: Vec<Token<'s>>,
    pos: usize,
    source: &'static EntityType,
    scopes: Vec<Bound>,
}

impl<'p, 's> Parser<'p, 's> {
    fn new(owner: &'p FilterParser, tokens: Vec<Token<'s>>, source: &'static EntityType) -> Self {
        Self {
            owner,
            tokens,
            pos: 0,
            source,
            scopes: Vec::new(),
        }
    }

    fn peek(&self) -> Option<Token<'s>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token<'s>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, wanted: Token<'static>) -> Result<()> {
        match self.next() {
            Some(t) if t == wanted => Ok(()),
            Some(t) => Err(Error::format(format!(
                "Expected '{}' but found '{}'",
                wanted.describe(),
                t.describe()
            ))),
            None => Err(Error::format(format!(
                "Expected '{}' at end of expression",
                wanted.describe()
            ))),
        }
    }

    fn finish(&self) -> Result<()> {
        match self.peek() {
            Some(t) => Err(Error::format(format!("Unexpected token '{}'", t.describe()))),
            None => Ok(()),
        }
    }

    fn parse_expr(&mut self, min_precedence: u8) -> Result<Operand> {
        let mut left = self.parse_unary()?;
        while let Some(Token::Word(word)) = self.peek() {
            let Some(op) = BinaryOp::from_token(word) else {
                break;
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let right = self.parse_expr(precedence + 1)?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Operand> {
        match self.peek() {
            Some(Token::Word("not")) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                let (expr, ty) = self.settle(operand, Some(&TypeRef::Bool))?;
                if !ty.as_ref().is_some_and(TypeRef::is_bool) {
                    return Err(Error::format("'not' requires a boolean operand"));
                }
                Ok(typed(Expr::unary(UnaryOp::Not, expr), TypeRef::Bool))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                let (expr, ty) = self.settle(operand, None)?;
                match ty {
                    Some(ty) if ty.is_numeric() => Ok(typed(Expr::unary(UnaryOp::Negate, expr), ty)),
                    _ => Err(Error::format("'-' requires a numeric operand")),
                }
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Operand> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_expr(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Literal(raw)) => Ok(Operand::Pending(raw.to_owned())),
            Some(Token::Word(word)) => {
                if self.peek() == Some(Token::LParen) {
                    if FUNCTIONS.contains(&word) {
                        return self.call_function(word);
                    }
                    return Err(Error::format(format!("Unknown function '{word}'")));
                }
                if matches!(word, "true" | "false" | "null") {
                    return Ok(Operand::Pending(word.to_owned()));
                }
                self.parse_path(word)
            }
            Some(other) => Err(Error::format(format!(
                "Unexpected token '{}'",
                other.describe()
            ))),
            None => Err(Error::format("Unexpected end of filter expression")),
        }
    }

    fn resolve(&self, ty: &'static EntityType, alias: &str) -> Option<&'static Member> {
        if self.owner.ignore_case {
            self.owner.resolver.resolve_alias_ignore_case(ty, alias)
        } else {
            self.owner.resolver.resolve_alias(ty, alias)
        }
    }

    /// Member path starting at `first`: a bound quantifier variable or a
    /// member of the source. A word that is neither stays pending so that it
    /// fails later as an unreadable literal.
    fn parse_path(&mut self, first: &'s str) -> Result<Operand> {
        let (mut expr, mut ty) = if let Some(bound) = self.scopes.iter().rev().find(|b| b.name == first) {
            (Expr::param(&bound.parameter), bound.ty.clone())
        } else if let Some(member) = self.resolve(self.source, first) {
            (
                member_access(Expr::param(ROOT_PARAMETER), self.source, member),
                member.ty().clone(),
            )
        } else if self.peek() == Some(Token::Slash) {
            return Err(Error::format(format!(
                "Could not resolve member '{first}' on {}",
                self.source.full_name()
            )));
        } else {
            return Ok(Operand::Pending(first.to_owned()));
        };

        while self.peek() == Some(Token::Slash) {
            self.pos += 1;
            let Some(Token::Word(segment)) = self.next() else {
                return Err(Error::format("Expected a member name after '/'"));
            };
            if matches!(segment, "any" | "all") && self.peek() == Some(Token::LParen) {
                expr = self.quantifier(expr, &ty, segment)?;
                ty = TypeRef::Bool;
                continue;
            }
            let Some(owner) = ty.entity() else {
                return Err(Error::format(format!(
                    "Cannot navigate to '{segment}' from a value of type {ty}"
                )));
            };
            let Some(member) = self.resolve(owner, segment) else {
                return Err(Error::format(format!(
                    "Could not resolve member '{segment}' on {}",
                    owner.full_name()
                )));
            };
            expr = member_access(expr, owner, member);
            ty = member.ty().clone();
        }
        Ok(typed(expr, ty))
    }

    fn quantifier(&mut self, source: Expr, ty: &TypeRef, which: &str) -> Result<Expr> {
        self.expect(Token::LParen)?;
        let Some(element) = ty.element().cloned() else {
            return Err(Error::format(format!(
                "'{which}' requires a collection, found {ty}"
            )));
        };
        let method = if which == "any" { "Any" } else { "All" };

        if self.peek() == Some(Token::RParen) {
            self.pos += 1;
            if which == "all" {
                return Err(Error::format("'all' requires a predicate"));
            }
            return Ok(Expr::call(Method::enumerable(method), vec![source]));
        }

        let Some(Token::Word(variable)) = self.next() else {
            return Err(Error::format(format!("Expected a range variable in '{which}'")));
        };
        self.expect(Token::Colon)?;
        let parameter = placeholder_parameter();
        self.scopes.push(Bound {
            name: variable.to_owned(),
            parameter: parameter.clone(),
            ty: element,
        });
        let body = self.parse_expr(0);
        self.scopes.pop();
        let (body, body_ty) = self.settle(body?, None)?;
        if !body_ty.as_ref().is_some_and(TypeRef::is_bool) {
            return Err(Error::format(format!(
                "The '{which}' predicate must be boolean"
            )));
        }
        self.expect(Token::RParen)?;

        let lambda = Lambda {
            parameter: Parameter::new(parameter),
            body: Box::new(body),
        };
        Ok(Expr::quantified(method, source, lambda))
    }

    /// Fixes the type of `operand`, reading a pending literal as `hint`
    /// when the hint is a scalar type.
    fn settle(&self, operand: Operand, hint: Option<&TypeRef>) -> Result<(Expr, Option<TypeRef>)> {
        let raw = match operand {
            Operand::Typed(expr, ty) => return Ok((expr, ty)),
            Operand::Pending(raw) => raw,
        };
        let scalar_hint =
            hint.filter(|h| !matches!(h.underlying(), TypeRef::Entity(_) | TypeRef::Collection(_)));
        let literal = match scalar_hint {
            Some(h) => read_as(h, &raw).or_else(|err| {
                read_literal(&raw)
                    .ok()
                    .filter(|lit| same_family(h, lit))
                    .ok_or(err)
            })?,
            None => read_literal(&raw)?,
        };
        let ty = if literal.is_null() {
            None
        } else {
            literal.type_ref().or_else(|| scalar_hint.cloned())
        };
        Ok((Expr::Constant(literal), ty))
    }

    fn settle_pair(
        &self,
        left: Operand,
        right: Operand,
    ) -> Result<((Expr, Option<TypeRef>), (Expr, Option<TypeRef>))> {
        if matches!(left, Operand::Pending(_)) && matches!(right, Operand::Typed(..)) {
            let right = self.settle(right, None)?;
            let left = self.settle(left, right.1.as_ref())?;
            return Ok((left, right));
        }
        let left = self.settle(left, None)?;
        let right = self.settle(right, left.1.as_ref())?;
        Ok((left, right))
    }

    fn binary(&self, op: BinaryOp, left: Operand, right: Operand) -> Result<Operand> {
        let ((l, lt), (r, rt)) = self.settle_pair(left, right)?;
        let mismatch = || {
            Error::format(format!(
                "Operator '{}' cannot be applied to {} and {}",
                op.token(),
                describe(lt.as_ref()),
                describe(rt.as_ref())
            ))
        };

        if op.is_logical() {
            if !(lt.as_ref().is_some_and(TypeRef::is_bool) && rt.as_ref().is_some_and(TypeRef::is_bool)) {
                return Err(mismatch());
            }
            return Ok(typed(Expr::binary(op, l, r), TypeRef::Bool));
        }

        if op.is_arithmetic() {
            let (Some(a), Some(b)) = (lt.as_ref(), rt.as_ref()) else {
                return Err(mismatch());
            };
            if !(a.is_numeric() && b.is_numeric()) {
                return Err(mismatch());
            }
            let ty = promote(a, b);
            return Ok(typed(Expr::binary(op, l, r), ty));
        }

        if !compatible(lt.as_ref(), rt.as_ref()) {
            return Err(mismatch());
        }
        if !matches!(op, BinaryOp::Eq | BinaryOp::Ne) && !(orderable(lt.as_ref()) && orderable(rt.as_ref())) {
            return Err(mismatch());
        }
        let strings = lt.as_ref().is_some_and(TypeRef::is_string) && rt.as_ref().is_some_and(TypeRef::is_string);
        let (l, r) = if strings { (self.fold(l), self.fold(r)) } else { (l, r) };
        Ok(typed(Expr::binary(op, l, r), TypeRef::Bool))
    }

    /// Lower-cases a string operand in case-insensitive mode.
    fn fold(&self, expr: Expr) -> Expr {
        if !self.owner.ignore_case {
            return expr;
        }
        match expr {
            Expr::Constant(Literal::String(s)) => Expr::Constant(Literal::String(s.to_lowercase())),
            constant @ Expr::Constant(_) => constant,
            other => other.to_lower(),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Operand>> {
        let mut args = Vec::new();
        if self.peek() == Some(Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr(0)?);
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => return Ok(args),
                Some(t) => {
                    return Err(Error::format(format!(
                        "Unexpected token '{}' in argument list",
                        t.describe()
                    )));
                }
                None => return Err(Error::format("Unterminated argument list")),
            }
        }
    }

    fn string_arg(&self, function: &str, operand: Operand) -> Result<Expr> {
        let (expr, ty) = self.settle(operand, Some(&TypeRef::String))?;
        if ty.as_ref().is_none_or(TypeRef::is_string) {
            Ok(expr)
        } else {
            Err(Error::format(format!(
                "'{function}' expects a string argument, found {}",
                describe(ty.as_ref())
            )))
        }
    }

    fn integer_arg(&self, function: &str, operand: Operand) -> Result<Expr> {
        let (expr, ty) = self.settle(operand, Some(&TypeRef::Int32))?;
        if ty.as_ref().is_some_and(TypeRef::is_integral) {
            Ok(expr)
        } else {
            Err(Error::format(format!(
                "'{function}' expects an integer argument, found {}",
                describe(ty.as_ref())
            )))
        }
    }

    fn call_function(&mut self, name: &str) -> Result<Operand> {
        self.expect(Token::LParen)?;
        let args = self.arguments()?;
        match name {
            "substringof" => {
                let [needle, haystack] = take::<2>(name, args)?;
                let needle = self.string_arg(name, needle)?;
                let haystack = self.string_arg(name, haystack)?;
                Ok(typed(
                    self.fold(haystack).contains(self.fold(needle)),
                    TypeRef::Bool,
                ))
            }
            "contains" | "startswith" | "endswith" | "indexof" => {
                let [target, needle] = take::<2>(name, args)?;
                let target = self.fold(self.string_arg(name, target)?);
                let needle = self.fold(self.string_arg(name, needle)?);
                Ok(match name {
                    "contains" => typed(target.contains(needle), TypeRef::Bool),
                    "startswith" => typed(target.starts_with(needle), TypeRef::Bool),
                    "endswith" => typed(target.ends_with(needle), TypeRef::Bool),
                    _ => typed(target.index_of(needle), TypeRef::Int32),
                })
            }
            "substring" => {
                let mut args = args.into_iter();
                let (Some(target), Some(start), length, None) =
                    (args.next(), args.next(), args.next(), args.next())
                else {
                    return Err(arity(name, "2 or 3"));
                };
                let target = self.string_arg(name, target)?;
                let start = self.integer_arg(name, start)?;
                let expr = match length {
                    Some(length) => target.substring_len(start, self.integer_arg(name, length)?),
                    None => target.substring(start),
                };
                Ok(typed(expr, TypeRef::String))
            }
            "replace" => {
                let [target, from, to] = take::<3>(name, args)?;
                let target = self.string_arg(name, target)?;
                let from = self.string_arg(name, from)?;
                let to = self.string_arg(name, to)?;
                Ok(typed(target.replace(from, to), TypeRef::String))
            }
            "trim" | "toupper" | "tolower" | "length" => {
                let [target] = take::<1>(name, args)?;
                let target = self.string_arg(name, target)?;
                Ok(match name {
                    "trim" => typed(target.trim(), TypeRef::String),
                    "toupper" => typed(target.to_upper(), TypeRef::String),
                    "tolower" => typed(target.to_lower(), TypeRef::String),
                    _ => typed(target.length(), TypeRef::Int32),
                })
            }
            "concat" => {
                let [first, second] = take::<2>(name, args)?;
                let first = self.string_arg(name, first)?;
                let second = self.string_arg(name, second)?;
                Ok(typed(first.concat(second), TypeRef::String))
            }
            "round" | "floor" | "ceiling" => {
                let [operand] = take::<1>(name, args)?;
                let (expr, ty) = self.settle(operand, None)?;
                let Some(ty) = ty.filter(TypeRef::is_numeric) else {
                    return Err(Error::format(format!("'{name}' expects a numeric argument")));
                };
                Ok(match name {
                    "round" => typed(expr.round(), ty),
                    "floor" => typed(expr.floor(), ty),
                    _ => typed(expr.ceiling(), ty),
                })
            }
            _ => {
                let [operand] = take::<1>(name, args)?;
                let (expr, ty) = self.settle(operand, None)?;
                if !ty.as_ref().is_some_and(TypeRef::is_temporal) {
                    return Err(Error::format(format!("'{name}' expects a date argument")));
                }
                let expr = match name {
                    "year" => expr.year(),
                    "month" => expr.month(),
                    "day" => expr.day(),
                    "hour" => expr.hour(),
                    "minute" => expr.minute(),
                    _ => expr.second(),
                };
                Ok(typed(expr, TypeRef::Int32))
            }
        }
    }
}

fn member_access(target: Expr, owner: &'static EntityType, member: &'static Member) -> Expr {
    let mut reference = MemberRef::new(member.name());
    if owner.is_interface() {
        reference = reference.declared_on(member.declaring_type());
    }
    Expr::Member {
        target: Box::new(target),
        member: reference,
    }
}

fn take<const N: usize>(function: &str, args: Vec<Operand>) -> Result<[Operand; N]> {
    args.try_into().map_err(|_| arity(function, &N.to_string()))
}

fn arity(function: &str, expected: &str) -> Error {
    Error::format(format!("Function '{function}' expects {expected} argument(s)"))
}

fn describe(ty: Option<&TypeRef>) -> String {
    ty.map_or_else(|| "null".to_owned(), ToString::to_string)
}

fn same_family(hint: &TypeRef, literal: &Literal) -> bool {
    literal
        .type_ref()
        .is_some_and(|t| (hint.is_numeric() && t.is_numeric()) || (hint.is_temporal() && t.is_temporal()))
}

fn compatible(left: Option<&TypeRef>, right: Option<&TypeRef>) -> bool {
    let (Some(a), Some(b)) = (left, right) else {
        return true;
    };
    let (a, b) = (a.underlying(), b.underlying());
    (a.is_numeric() && b.is_numeric()) || (a.is_temporal() && b.is_temporal()) || a == b
}

fn orderable(ty: Option<&TypeRef>) -> bool {
    ty.is_none_or(|t| {
        t.is_numeric()
            || t.is_temporal()
            || t.is_string()
            || matches!(t.underlying(), TypeRef::Guid | TypeRef::Enum(_))
    })
}

fn numeric_rank(ty: &TypeRef) -> u8 {
    match ty.underlying() {
        TypeRef::UInt32 | TypeRef::Int64 => 2,
        TypeRef::UInt64 => 3,
        TypeRef::Single => 4,
        TypeRef::Double => 5,
        TypeRef::Decimal => 6,
        _ => 1,
    }
}

/// Result type of arithmetic over two numeric operands.
fn promote(a: &TypeRef, b: &TypeRef) -> TypeRef {
    match numeric_rank(a).max(numeric_rank(b)) {
        2 => TypeRef::Int64,
        3 => TypeRef::UInt64,
        4 => TypeRef::Single,
        5 => TypeRef::Double,
        6 => TypeRef::Decimal,
        _ => TypeRef::Int32,
    }
}
