//! Renderers for recognized method calls.
//!
//! Each writer decides applicability from the method identity, its
//! declaring type and arity, and renders by recursing into the emitter for
//! sub-expressions. Registration order is selection order.

use super::Emitter;
use crate::error::{Error, Result};
use crate::expr::{DeclaringType, Expr, Lambda, Method, MethodCall};

pub trait MethodCallWriter: Send + Sync {
    fn can_handle(&self, call: &MethodCall) -> bool;

    /// # Errors
    /// Propagates failures from rendering sub-expressions.
    fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String>;
}

fn object<'c>(call: &'c MethodCall) -> Result<&'c Expr> {
    call.object
        .as_deref()
        .ok_or_else(|| Error::Argument(format!("{} requires a target", call.method.name)))
}

fn arg(call: &MethodCall, index: usize) -> Result<&Expr> {
    call.args.get(index).ok_or_else(|| {
        Error::Argument(format!(
            "{} is missing argument {}",
            call.method.name,
            index + 1
        ))
    })
}

/// `a.Equals(b)` and `Equals(a, b)` both become `a eq b`.
pub struct EqualsMethodWriter;

impl MethodCallWriter for EqualsMethodWriter {
    fn can_handle(&self, call: &MethodCall) -> bool {
        call.method.name == "Equals"
            && ((call.object.is_some() && call.arity() == 1)
                || (call.object.is_none() && call.arity() == 2))
    }

    fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String> {
        let (left, right) = match call.object.as_deref() {
            Some(target) => (target, arg(call, 0)?),
            None => (arg(call, 0)?, arg(call, 1)?),
        };
        let left = emitter.write(left)?;
        let right = emitter.write(right)?;
        Ok(format!("{left} eq {right}"))
    }
}

/// `haystack.Contains(needle)`; argument order depends on the dialect.
pub struct StringContainsMethodWriter;

impl MethodCallWriter for StringContainsMethodWriter {
    fn can_handle(&self, call: &MethodCall) -> bool {
        call.is(&DeclaringType::String, "Contains") && call.object.is_some() && call.arity() == 1
    }

    fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String> {
        let haystack = emitter.write(object(call)?)?;
        let needle = emitter.write(arg(call, 0)?)?;
        if emitter.settings().use_contains_instead_of_substringof {
            Ok(format!("contains({haystack}, {needle})"))
        } else {
            Ok(format!("substringof({needle}, {haystack})"))
        }
    }
}

/// Instance string method rendered as `function(target, args...)`.
pub struct StringFunctionWriter {
    methods: &'static [&'static str],
    function: &'static str,
    arities: &'static [usize],
}

impl StringFunctionWriter {
    #[must_use]
    pub const fn new(
        methods: &'static [&'static str],
        function: &'static str,
        arities: &'static [usize],
    ) -> Self {
        Self {
            methods,
            function,
            arities,
        }
    }
}

impl MethodCallWriter for StringFunctionWriter {
    fn can_handle(&self, call: &MethodCall) -> bool {
        call.method.declaring == DeclaringType::String
            && call.object.is_some()
            && self.methods.contains(&call.method.name.as_str())
            && self.arities.contains(&call.arity())
    }

    fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String> {
        let mut parts = vec![emitter.write(object(call)?)?];
        for a in &call.args {
            parts.push(emitter.write(a)?);
        }
        Ok(format!("{}({})", self.function, parts.join(", ")))
    }
}

/// `string.Concat(a, b)`.
pub struct StringConcatMethodWriter;

impl MethodCallWriter for StringConcatMethodWriter {
    fn can_handle(&self, call: &MethodCall) -> bool {
        call.is(&DeclaringType::String, "Concat") && call.object.is_none() && call.arity() == 2
    }

    fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String> {
        let first = emitter.write(arg(call, 0)?)?;
        let second = emitter.write(arg(call, 1)?)?;
        Ok(format!("concat({first}, {second})"))
    }
}

/// `Math.Round`, `Math.Floor` and `Math.Ceiling` over one operand.
pub struct MathMethodWriter;

impl MethodCallWriter for MathMethodWriter {
    fn can_handle(&self, call: &MethodCall) -> bool {
        call.method.declaring == DeclaringType::Math
            && matches!(call.method.name.as_str(), "Round" | "Floor" | "Ceiling")
            && call.arity() == 1
    }

    fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String> {
        let operand = emitter.write(arg(call, 0)?)?;
        Ok(format!(
            "{}({operand})",
            call.method.name.to_ascii_lowercase()
        ))
    }
}

/// Date part accessors such as `Year` become `year(target)`.
pub struct DateTimePartMethodWriter;

impl MethodCallWriter for DateTimePartMethodWriter {
    fn can_handle(&self, call: &MethodCall) -> bool {
        call.method.declaring == DeclaringType::DateTime
            && matches!(
                call.method.name.as_str(),
                "Year" | "Month" | "Day" | "Hour" | "Minute" | "Second"
            )
            && call.object.is_some()
            && call.arity() == 0
    }

    fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String> {
        let target = emitter.write(object(call)?)?;
        Ok(format!(
            "{}({target})",
            call.method.name.to_ascii_lowercase()
        ))
    }
}

/// `source.Any(p => ...)` and `source.All(p => ...)` as `path/any(v: ...)`.
pub struct QuantifierMethodWriter {
    method: &'static str,
    function: &'static str,
}

impl QuantifierMethodWriter {
    #[must_use]
    pub const fn any() -> Self {
        Self {
            method: "Any",
            function: "any",
        }
    }

    #[must_use]
    pub const fn all() -> Self {
        Self {
            method: "All",
            function: "all",
        }
    }
}

impl MethodCallWriter for QuantifierMethodWriter {
    fn can_handle(&self, call: &MethodCall) -> bool {
        call.is(&DeclaringType::Enumerable, self.method)
            && call.arity() == 2
            && matches!(call.args.get(1), Some(Expr::Lambda(_)))
    }

    fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String> {
        let source = arg(call, 0)?;
        let Expr::Lambda(lambda) = arg(call, 1)? else {
            return Err(Error::Argument(format!(
                "{} expects a lambda predicate",
                self.method
            )));
        };
        let path = emitter.write(source)?;
        let element = emitter.type_of(source).and_then(|t| t.element().cloned());
        let (variable, body) = emitter.write_lambda(lambda, element)?;
        Ok(format!("{path}/{}({variable}: {body})", self.function))
    }
}

/// Rewrites predicate-less `source.Any()` into `source.Any(_ => true)`.
pub struct EmptyAnyMethodWriter;

impl MethodCallWriter for EmptyAnyMethodWriter {
    fn can_handle(&self, call: &MethodCall) -> bool {
        call.is(&DeclaringType::Enumerable, "Any") && call.arity() == 1
    }

    fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String> {
        let rewritten = MethodCall {
            method: Method::enumerable("Any"),
            object: None,
            args: vec![
                arg(call, 0)?.clone(),
                Expr::Lambda(Lambda::always_true("it")),
            ],
        };
        emitter.write(&Expr::Call(rewritten))
    }
}

pub(crate) fn builtin_method_writers() -> Vec<Box<dyn MethodCallWriter>> {
    vec![
        Box::new(EqualsMethodWriter),
        Box::new(StringContainsMethodWriter),
        Box::new(StringFunctionWriter::new(&["StartsWith"], "startswith", &[1])),
        Box::new(StringFunctionWriter::new(&["EndsWith"], "endswith", &[1])),
        Box::new(StringFunctionWriter::new(&["IndexOf"], "indexof", &[1])),
        Box::new(StringFunctionWriter::new(&["Substring"], "substring", &[1, 2])),
        Box::new(StringFunctionWriter::new(&["Replace"], "replace", &[2])),
        Box::new(StringFunctionWriter::new(&["Trim"], "trim", &[0])),
        Box::new(StringFunctionWriter::new(
            &["ToUpper", "ToUpperInvariant"],
            "toupper",
            &[0],
        )),
        Box::new(StringFunctionWriter::new(
            &["ToLower", "ToLowerInvariant"],
            "tolower",
            &[0],
        )),
        Box::new(StringFunctionWriter::new(&["Length"], "length", &[0])),
        Box::new(StringConcatMethodWriter),
        Box::new(MathMethodWriter),
        Box::new(DateTimePartMethodWriter),
        Box::new(EmptyAnyMethodWriter),
        Box::new(QuantifierMethodWriter::any()),
        Box::new(QuantifierMethodWriter::all()),
    ]
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::{EntityType, Member, TypeRef};
    use crate::resolver::MemberNameResolver;
    use crate::writer::ExpressionWriter;
    use std::sync::{Arc, LazyLock};

    static ITEM: LazyLock<EntityType> = LazyLock::new(|| {
        EntityType::structure("Tests.Row")
            .member(Member::new("Name", TypeRef::String))
            .member(Member::new("Number", TypeRef::Int32).data_member("Num"))
            .member(Member::new("Price", TypeRef::Double))
            .member(Member::new("Created", TypeRef::DateTime))
    });

    fn writer() -> ExpressionWriter {
        ExpressionWriter::new(Arc::new(MemberNameResolver::new()))
    }

    fn render(writer: &ExpressionWriter, build: impl FnOnce(Expr) -> Expr) -> String {
        writer
            .write(&Expr::Lambda(Lambda::new(build)), &ITEM)
            .unwrap()
    }

    #[test]
    fn test_equals_forms() {
        let w = writer();
        assert_eq!(render(&w, |x| x.member("Number").equals(3)), "Num eq 3");
        let call = |x: Expr| {
            Expr::call(
                Method::new(DeclaringType::Object, "Equals"),
                vec![x.member("Name"), Expr::constant("a")],
            )
        };
        assert_eq!(render(&w, call), "Name eq 'a'");
    }

    #[test]
    fn test_string_helpers() {
        let w = writer();
        assert_eq!(
            render(&w, |x| x.member("Name").replace("a", "b").eq("bb")),
            "replace(Name, 'a', 'b') eq 'bb'"
        );
        assert_eq!(render(&w, |x| x.member("Name").trim().eq("a")), "trim(Name) eq 'a'");
        assert_eq!(
            render(&w, |x| x.member("Name").ends_with("z")),
            "endswith(Name, 'z')"
        );
        assert_eq!(
            render(&w, |x| x.member("Name").concat("!").eq("a!")),
            "concat(Name, '!') eq 'a!'"
        );
    }

    #[test]
    fn test_math_and_date_parts() {
        let w = writer();
        assert_eq!(
            render(&w, |x| x.member("Price").round().eq(2.0)),
            "round(Price) eq 2.0"
        );
        assert_eq!(
            render(&w, |x| x.member("Price").ceiling().gt(1.0)),
            "ceiling(Price) gt 1.0"
        );
        assert_eq!(
            render(&w, |x| x.member("Created").year().eq(2012)),
            "year(Created) eq 2012"
        );
        assert_eq!(
            render(&w, |x| x.member("Created").second().lt(30)),
            "second(Created) lt 30"
        );
    }

    #[test]
    fn test_unknown_method_uses_generic_rendering() {
        let w = writer();
        let call = |x: Expr| {
            Expr::call(
                Method::new(DeclaringType::Other("Geo".to_owned()), "Distance"),
                vec![x.member("Name"), Expr::constant(5)],
            )
            .lt(10)
        };
        assert_eq!(render(&w, call), "distance(Name, 5) lt 10");
    }

    struct Shout;

    impl MethodCallWriter for Shout {
        fn can_handle(&self, call: &MethodCall) -> bool {
            call.is(&DeclaringType::String, "ToUpper")
        }

        fn handle(&self, call: &MethodCall, emitter: &mut Emitter<'_>) -> Result<String> {
            Ok(format!("shout({})", emitter.write(object(call)?)?))
        }
    }

    #[test]
    fn test_user_writer_precedes_builtins() {
        let w = writer().with_method_writer(Shout);
        assert_eq!(
            render(&w, |x| x.member("Name").to_upper().eq("A")),
            "shout(Name) eq 'A'"
        );
        assert_eq!(
            render(&writer(), |x| x.member("Name").to_upper().eq("A")),
            "toupper(Name) eq 'A'"
        );
    }
}
