//! Expression tree to OData filter text.
//!
//! [`ExpressionWriter`] walks a tree against a source type and emits the
//! v2 grammar. Constants go through the value-writer registry and method
//! calls through the method-writer registry, user writers first.

pub mod methods;
pub mod values;

use std::sync::Arc;
use tracing::debug;

use crate::config::{QuerySettings, WriterSettings};
use crate::error::{Error, Result};
use crate::expr::{BinaryOp, Expr, Lambda, UnaryOp, quantifier_variable};
use crate::model::{EntityType, Literal, Member, MemberRef, TypeRef};
use crate::resolver::MemberNameResolver;

pub use methods::MethodCallWriter;
pub use values::ValueWriter;

pub struct ExpressionWriter {
    resolver: Arc<MemberNameResolver>,
    values: Vec<Box<dyn ValueWriter>>,
    user_values: usize,
    methods: Vec<Box<dyn MethodCallWriter>>,
    user_methods: usize,
    settings: WriterSettings,
}

impl ExpressionWriter {
    #[must_use]
    pub fn new(resolver: Arc<MemberNameResolver>) -> Self {
        Self {
            resolver,
            values: values::builtin_value_writers(),
            user_values: 0,
            methods: methods::builtin_method_writers(),
            user_methods: 0,
            settings: WriterSettings::default(),
        }
    }

    /// Writer with the dialect switches of loaded settings.
    #[must_use]
    pub fn from_settings(resolver: Arc<MemberNameResolver>, settings: &QuerySettings) -> Self {
        Self::new(resolver).with_settings(settings.writer())
    }

    #[must_use]
    pub fn with_settings(mut self, settings: WriterSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Registers a method writer ahead of the built-ins, after earlier user writers.
    #[must_use]
    pub fn with_method_writer(mut self, writer: impl MethodCallWriter + 'static) -> Self {
        self.methods.insert(self.user_methods, Box::new(writer));
        self.user_methods += 1;
        self
    }

    #[must_use]
    pub fn with_value_writer(mut self, writer: impl ValueWriter + 'static) -> Self {
        self.values.insert(self.user_values, Box::new(writer));
        self.user_values += 1;
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<MemberNameResolver> {
        &self.resolver
    }

    #[must_use]
    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// Renders `expr` against `source`.
    ///
    /// # Errors
    /// Returns `UnsupportedOperation` for nodes the grammar cannot express
    /// and `Argument` for malformed calls.
    pub fn write(&self, expr: &Expr, source: &'static EntityType) -> Result<String> {
        let mut emitter = Emitter {
            writer: self,
            source,
            scopes: Vec::new(),
        };
        emitter.write(expr)
    }

    /// Renders a single constant.
    #[must_use]
    pub fn write_value(&self, value: &Literal) -> String {
        self.values
            .iter()
            .find(|w| w.handles(value.kind()))
            .map_or_else(|| value.to_string(), |w| w.write(value))
    }

    /// Wire alias of `member` as seen from `ty`, falling back to the declared name.
    #[must_use]
    pub fn member_alias(&self, ty: Option<&'static EntityType>, member: &MemberRef) -> String {
        ty.and_then(|t| find_member(t, member))
            .map_or_else(|| member.name.clone(), |m| self.resolver.resolve_name(m))
    }
}

pub(crate) fn find_member(ty: &'static EntityType, member: &MemberRef) -> Option<&'static Member> {
    let members = ty.members();
    members
        .iter()
        .find(|m| {
            m.name() == member.name
                && member
                    .declaring_type
                    .as_deref()
                    .is_none_or(|d| d == m.declaring_type())
        })
        .or_else(|| members.iter().find(|m| m.name() == member.name))
        .copied()
}

struct Scope {
    parameter: String,
    /// `None` for the root parameter, which renders as nothing.
    variable: Option<String>,
    ty: Option<TypeRef>,
}

/// Tree-walking state for one `write` call.
pub struct Emitter<'w> {
    writer: &'w ExpressionWriter,
    source: &'static EntityType,
    scopes: Vec<Scope>,
}

impl Emitter<'_> {
    #[must_use]
    pub fn settings(&self) -> &WriterSettings {
        &self.writer.settings
    }

    /// # Errors
    /// See [`ExpressionWriter::write`].
    pub fn write(&mut self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Parameter(p) => Ok(self
                .scope(&p.name)
                .and_then(|s| s.variable.clone())
                .unwrap_or_default()),
            Expr::Constant(value) => Ok(self.writer.write_value(value)),
            Expr::Member { target, member } => {
                let prefix = self.write(target)?;
                let ty = self.type_of(target).and_then(|t| t.entity());
                let alias = self.writer.member_alias(ty, member);
                if prefix.is_empty() {
                    Ok(alias)
                } else {
                    Ok(format!("{prefix}/{alias}"))
                }
            }
            Expr::Binary { op, left, right } => {
                let l = self.operand(*op, left, false)?;
                let r = self.operand(*op, right, true)?;
                Ok(format!("{l} {} {r}", op.token()))
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::IsTrue => self.write(operand),
                UnaryOp::Not => Ok(format!("not ({})", self.write(operand)?)),
                UnaryOp::Negate => {
                    let inner = self.write(operand)?;
                    if matches!(operand.as_ref(), Expr::Binary { .. }) {
                        Ok(format!("-({inner})"))
                    } else {
                        Ok(format!("-{inner}"))
                    }
                }
            },
            Expr::Call(call) => {
                let writer = self.writer;
                if let Some(handler) = writer.methods.iter().find(|w| w.can_handle(call)) {
                    return handler.handle(call, self);
                }
                let mut parts = Vec::new();
                if let Some(target) = &call.object {
                    parts.push(self.write(target)?);
                }
                for a in &call.args {
                    parts.push(self.write(a)?);
                }
                debug!(method = %call.method.name, "no method writer matched, using generic rendering");
                Ok(format!(
                    "{}({})",
                    call.method.name.to_lowercase(),
                    parts.join(", ")
                ))
            }
            Expr::Lambda(lambda) => self.write_root_lambda(lambda),
            Expr::New(_) => Err(Error::unsupported(
                "record construction is only supported as a projection",
            )),
        }
    }

    /// Renders a quantifier body, binding its parameter to the next synthesized variable.
    ///
    /// # Errors
    /// Propagates failures from the body.
    pub fn write_lambda(
        &mut self,
        lambda: &Lambda,
        element: Option<TypeRef>,
    ) -> Result<(String, String)> {
        let depth = self.scopes.iter().filter(|s| s.variable.is_some()).count() + 1;
        let variable = quantifier_variable(depth);
        self.scopes.push(Scope {
            parameter: lambda.parameter.name.clone(),
            variable: Some(variable.clone()),
            ty: element,
        });
        let body = self.write(&lambda.body);
        self.scopes.pop();
        Ok((variable, body?))
    }

    fn write_root_lambda(&mut self, lambda: &Lambda) -> Result<String> {
        let ty = if self.scopes.is_empty() {
            Some(TypeRef::Entity(self.source.into()))
        } else {
            None
        };
        let projection = self.scopes.is_empty();
        self.scopes.push(Scope {
            parameter: lambda.parameter.name.clone(),
            variable: None,
            ty,
        });
        let body = match lambda.body.as_ref() {
            Expr::New(fields) if projection => self.write_projection(fields),
            body => self.write(body),
        };
        self.scopes.pop();
        body
    }

    /// `$select` list for a record construction. Every destination name
    /// must be the alias of a selected source member.
    fn write_projection(&mut self, fields: &[(String, Expr)]) -> Result<String> {
        let mut selected = Vec::with_capacity(fields.len());
        for (_, expr) in fields {
            if matches!(expr, Expr::Member { .. }) {
                selected.push(self.write(expr)?);
            }
        }
        let renamed = fields.iter().any(|(destination, _)| {
            let alias = self
                .writer
                .member_alias(Some(self.source), &MemberRef::new(destination.as_str()));
            !selected.contains(&alias)
        });
        if renamed || selected.len() != fields.len() {
            return Err(Error::format(
                "Projection into new member names is not supported.",
            ));
        }
        Ok(selected.join(","))
    }

    fn scope(&self, parameter: &str) -> Option<&Scope> {
        self.scopes.iter().rev().find(|s| s.parameter == parameter)
    }

    /// Static type of `expr` where it can be derived from the source type.
    #[must_use]
    pub fn type_of(&self, expr: &Expr) -> Option<TypeRef> {
        match expr {
            Expr::Parameter(p) => match self.scope(&p.name) {
                Some(scope) => scope.ty.clone(),
                None => Some(TypeRef::Entity(self.source.into())),
            },
            Expr::Member { target, member } => {
                let ty = self.type_of(target)?.entity()?;
                find_member(ty, member).map(|m| m.ty().clone())
            }
            Expr::Constant(value) => value.type_ref(),
            _ => None,
        }
    }

    fn operand(&mut self, parent: BinaryOp, child: &Expr, is_right: bool) -> Result<String> {
        let text = self.write(child)?;
        let wrap = match child {
            Expr::Binary { op, .. } => needs_parens(parent, *op, is_right),
            _ => false,
        };
        Ok(if wrap { format!("({text})") } else { text })
    }
}

/// Parenthesize a child whose binding is weaker than its parent, a right
/// child at equal strength under a non-associative operator, and a logical
/// child that mixes `and` with `or`.
fn needs_parens(parent: BinaryOp, child: BinaryOp, is_right: bool) -> bool {
    if parent.is_logical() && child.is_logical() {
        return parent != child;
    }
    let (p, c) = (parent.precedence(), child.precedence());
    c < p || (c == p && is_right && !(parent == child && parent.is_associative()))
}
