//! Folds an operator chain into request parameters.
//!
//! Operators the grammar can express are written into the
//! [`ParameterBuilder`]. The first one it cannot express loads the results
//! accumulated so far, and every later operator runs in memory.

use std::cmp::Ordering;
use tracing::debug;

use super::ops::QueryOp;
use super::parameter_builder::ParameterBuilder;
use crate::error::{Error, Result};
use crate::eval::{Predicate, Selector, compare_values};
use crate::expr::{Expr, Lambda};
use crate::model::{MemberRef, Record, Value};
use crate::writer::ExpressionWriter;

/// Result of running a chain.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutcome<T> {
    Items(Vec<T>),
    Item(Option<T>),
    Count(u64),
    Flag(bool),
}

impl<T> QueryOutcome<T> {
    #[must_use]
    pub fn into_items(self) -> Option<Vec<T>> {
        match self {
            Self::Items(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_item(self) -> Option<Option<T>> {
        match self {
            Self::Item(item) => Some(item),
            _ => None,
        }
    }

    #[must_use]
    pub fn count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

enum Step {
    Continue,
    Finish,
    Local,
}

pub struct ExpressionProcessor {
    writer: ExpressionWriter,
}

impl ExpressionProcessor {
    #[must_use]
    pub fn new(writer: ExpressionWriter) -> Self {
        Self { writer }
    }

    #[must_use]
    pub fn writer(&self) -> &ExpressionWriter {
        &self.writer
    }

    /// Runs `ops`, calling `load` once with the accumulated parameters.
    ///
    /// # Errors
    /// Propagates writer failures, `Error::Format` for projections into new
    /// member names, `Error::Argument` for empty or ambiguous single-item
    /// terminals and any error returned by `load`.
    pub fn process<T, L>(
        &self,
        ops: &[QueryOp],
        builder: &mut ParameterBuilder,
        mut load: L,
    ) -> Result<QueryOutcome<T>>
    where
        T: Record,
        L: FnMut(&ParameterBuilder) -> Result<Vec<T>>,
    {
        let mut local: Option<LocalItems<T>> = None;

        for op in ops {
            if let Some(state) = local.as_mut() {
                if let Some(outcome) = state.apply(op)? {
                    return Ok(outcome);
                }
                continue;
            }

            match self.translate(op, builder)? {
                Step::Continue => {}
                Step::Finish => return finish(op, load(builder)?),
                Step::Local => {
                    debug!(operator = op.name(), "operator not expressible as a query option, continuing in memory");
                    let mut state = LocalItems::new(load(builder)?);
                    if let Some(outcome) = state.apply(op)? {
                        return Ok(outcome);
                    }
                    local = Some(state);
                }
            }
        }

        match local {
            Some(state) => Ok(QueryOutcome::Items(state.items)),
            None => Ok(QueryOutcome::Items(load(builder)?)),
        }
    }

    fn translate(&self, op: &QueryOp, builder: &mut ParameterBuilder) -> Result<Step> {
        match op {
            QueryOp::Where(lambda) => {
                let clause = self.write_lambda(lambda, builder)?;
                builder.add_filter(&clause);
            }
            QueryOp::Select(_) if builder.select().is_some() => return Ok(Step::Local),
            QueryOp::Select(lambda) => self.project(lambda, builder)?,
            QueryOp::OrderBy(lambda) | QueryOp::ThenBy(lambda) => {
                let key = self.write_lambda(lambda, builder)?;
                builder.add_order_by(key);
            }
            QueryOp::OrderByDescending(lambda) | QueryOp::ThenByDescending(lambda) => {
                let key = self.write_lambda(lambda, builder)?;
                builder.add_order_by(format!("{key} desc"));
            }
            QueryOp::Take(count) => builder.set_take(count),
            QueryOp::Skip(count) => builder.set_skip(count),
            QueryOp::Expand(path) => builder.add_expand(path),
            QueryOp::First(predicate) | QueryOp::FirstOrDefault(predicate) => {
                builder.set_take(1);
                self.fold_predicate(predicate.as_ref(), builder)?;
                return Ok(Step::Finish);
            }
            QueryOp::Single(predicate)
            | QueryOp::SingleOrDefault(predicate)
            | QueryOp::Last(predicate)
            | QueryOp::LastOrDefault(predicate)
            | QueryOp::Count(predicate)
            | QueryOp::LongCount(predicate) => {
                self.fold_predicate(predicate.as_ref(), builder)?;
                return Ok(Step::Finish);
            }
            QueryOp::Any(_)
            | QueryOp::All(_)
            | QueryOp::Distinct
            | QueryOp::Reverse
            | QueryOp::ElementAt(_) => return Ok(Step::Local),
        }
        Ok(Step::Continue)
    }

    fn fold_predicate(&self, predicate: Option<&Lambda>, builder: &mut ParameterBuilder) -> Result<()> {
        if let Some(lambda) = predicate {
            let clause = self.write_lambda(lambda, builder)?;
            builder.add_filter(&clause);
        }
        Ok(())
    }

    fn write_lambda(&self, lambda: &Lambda, builder: &ParameterBuilder) -> Result<String> {
        self.writer
            .write(&Expr::Lambda(lambda.clone()), builder.source())
    }

    fn project(&self, lambda: &Lambda, builder: &mut ParameterBuilder) -> Result<()> {
        match lambda.body.as_ref() {
            Expr::Member { .. } => {
                let alias = self.write_lambda(lambda, builder)?;
                builder.add_select(&alias);
                Ok(())
            }
            Expr::New(_) => {
                let aliases = self.write_lambda(lambda, builder)?;
                builder.set_select(aliases);
                Ok(())
            }
            _ => Err(Error::unsupported(
                "Select supports member access and record construction only",
            )),
        }
    }
}

/// Predicate a single-item or count terminal folds into the filter.
fn terminal_predicate(op: &QueryOp) -> Option<&Lambda> {
    match op {
        QueryOp::First(p)
        | QueryOp::FirstOrDefault(p)
        | QueryOp::Single(p)
        | QueryOp::SingleOrDefault(p)
        | QueryOp::Last(p)
        | QueryOp::LastOrDefault(p)
        | QueryOp::Count(p)
        | QueryOp::LongCount(p) => p.as_ref(),
        _ => None,
    }
}

/// Computes a terminal over `items`; the terminal's own filter predicate
/// has already been applied.
fn finish<T: Record>(op: &QueryOp, mut items: Vec<T>) -> Result<QueryOutcome<T>> {
    let outcome = match op {
        QueryOp::First(_) => QueryOutcome::Item(Some(
            items.into_iter().next().ok_or_else(no_elements)?,
        )),
        QueryOp::FirstOrDefault(_) => QueryOutcome::Item(items.into_iter().next()),
        QueryOp::Single(_) => match items.len() {
            1 => QueryOutcome::Item(items.pop()),
            0 => return Err(no_elements()),
            _ => return Err(more_than_one()),
        },
        QueryOp::SingleOrDefault(_) => match items.len() {
            0 | 1 => QueryOutcome::Item(items.pop()),
            _ => return Err(more_than_one()),
        },
        QueryOp::Last(_) => QueryOutcome::Item(Some(items.pop().ok_or_else(no_elements)?)),
        QueryOp::LastOrDefault(_) => QueryOutcome::Item(items.pop()),
        QueryOp::Count(_) | QueryOp::LongCount(_) => {
            QueryOutcome::Count(u64::try_from(items.len()).unwrap_or(u64::MAX))
        }
        QueryOp::Any(None) => QueryOutcome::Flag(!items.is_empty()),
        QueryOp::Any(Some(lambda)) => {
            let predicate = Predicate::compile(lambda)?;
            QueryOutcome::Flag(items.iter().any(|item| predicate.matches(item)))
        }
        QueryOp::All(lambda) => {
            let predicate = Predicate::compile(lambda)?;
            QueryOutcome::Flag(items.iter().all(|item| predicate.matches(item)))
        }
        QueryOp::ElementAt(index) => QueryOutcome::Item(Some(
            items
                .into_iter()
                .nth(*index)
                .ok_or_else(|| Error::Argument(format!("Index {index} is out of range")))?,
        )),
        other => {
            return Err(Error::Argument(format!(
                "{} does not produce a result",
                other.name()
            )));
        }
    };
    Ok(outcome)
}

fn no_elements() -> Error {
    Error::Argument("Sequence contains no elements".to_owned())
}

fn more_than_one() -> Error {
    Error::Argument("Sequence contains more than one element".to_owned())
}

/// Items materialized after the first untranslatable operator.
struct LocalItems<T> {
    items: Vec<T>,
    order: Vec<(Selector, bool)>,
}

impl<T: Record> LocalItems<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            items,
            order: Vec::new(),
        }
    }

    fn apply(&mut self, op: &QueryOp) -> Result<Option<QueryOutcome<T>>> {
        match op {
            QueryOp::Where(lambda) => {
                let predicate = Predicate::compile(lambda)?;
                self.items.retain(|item| predicate.matches(item));
            }
            // Items keep their type; the server already trimmed the payload.
            QueryOp::Select(_) | QueryOp::Expand(_) => {}
            QueryOp::OrderBy(lambda) | QueryOp::OrderByDescending(lambda) => {
                self.order = vec![(
                    Selector::compile(lambda)?,
                    matches!(op, QueryOp::OrderByDescending(_)),
                )];
                self.sort();
            }
            QueryOp::ThenBy(lambda) | QueryOp::ThenByDescending(lambda) => {
                self.order.push((
                    Selector::compile(lambda)?,
                    matches!(op, QueryOp::ThenByDescending(_)),
                ));
                self.sort();
            }
            QueryOp::Take(count) => self.items.truncate(*count),
            QueryOp::Skip(count) => {
                let count = (*count).min(self.items.len());
                self.items.drain(..count);
            }
            QueryOp::Distinct => {
                let mut kept: Vec<T> = Vec::with_capacity(self.items.len());
                for item in self.items.drain(..) {
                    if !kept.iter().any(|k| same_fields(k, &item)) {
                        kept.push(item);
                    }
                }
                self.items = kept;
            }
            QueryOp::Reverse => self.items.reverse(),
            terminal => {
                let mut items = std::mem::take(&mut self.items);
                if let Some(lambda) = terminal_predicate(terminal) {
                    let predicate = Predicate::compile(lambda)?;
                    items.retain(|item| predicate.matches(item));
                }
                return finish(terminal, items).map(Some);
            }
        }
        Ok(None)
    }

    fn sort(&mut self) {
        let order = &self.order;
        self.items.sort_by(|a, b| {
            order
                .iter()
                .map(|(selector, descending)| {
                    let ordering = compare_values(&selector.select(a), &selector.select(b));
                    if *descending { ordering.reverse() } else { ordering }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }
}

fn same_fields(a: &dyn Record, b: &dyn Record) -> bool {
    a.entity_type().members().iter().all(|m| {
        let member = MemberRef::new(m.name());
        let left = a.field(&member).unwrap_or(Value::NULL);
        let right = b.field(&member).unwrap_or(Value::NULL);
        compare_values(&left, &right) == Ordering::Equal
    })
}
