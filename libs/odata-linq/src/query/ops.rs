use crate::expr::{Expr, Lambda};

/// One operator of a query chain, in application order.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOp {
    Where(Lambda),
    Select(Lambda),
    OrderBy(Lambda),
    OrderByDescending(Lambda),
    ThenBy(Lambda),
    ThenByDescending(Lambda),
    Take(usize),
    Skip(usize),
    Expand(String),
    First(Option<Lambda>),
    FirstOrDefault(Option<Lambda>),
    Single(Option<Lambda>),
    SingleOrDefault(Option<Lambda>),
    Last(Option<Lambda>),
    LastOrDefault(Option<Lambda>),
    Count(Option<Lambda>),
    LongCount(Option<Lambda>),
    Any(Option<Lambda>),
    All(Lambda),
    Distinct,
    Reverse,
    ElementAt(usize),
}

impl QueryOp {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Where(_) => "Where",
            Self::Select(_) => "Select",
            Self::OrderBy(_) => "OrderBy",
            Self::OrderByDescending(_) => "OrderByDescending",
            Self::ThenBy(_) => "ThenBy",
            Self::ThenByDescending(_) => "ThenByDescending",
            Self::Take(_) => "Take",
            Self::Skip(_) => "Skip",
            Self::Expand(_) => "Expand",
            Self::First(_) => "First",
            Self::FirstOrDefault(_) => "FirstOrDefault",
            Self::Single(_) => "Single",
            Self::SingleOrDefault(_) => "SingleOrDefault",
            Self::Last(_) => "Last",
            Self::LastOrDefault(_) => "LastOrDefault",
            Self::Count(_) => "Count",
            Self::LongCount(_) => "LongCount",
            Self::Any(_) => "Any",
            Self::All(_) => "All",
            Self::Distinct => "Distinct",
            Self::Reverse => "Reverse",
            Self::ElementAt(_) => "ElementAt",
        }
    }

    /// Operators that end a chain with a scalar or single-item result.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::First(_)
                | Self::FirstOrDefault(_)
                | Self::Single(_)
                | Self::SingleOrDefault(_)
                | Self::Last(_)
                | Self::LastOrDefault(_)
                | Self::Count(_)
                | Self::LongCount(_)
                | Self::Any(_)
                | Self::All(_)
                | Self::ElementAt(_)
        )
    }
}

/// Operator chain over a remote source.
///
/// ```ignore
/// let query = Query::new()
///     .filter(|x| x.member("Number").le(3))
///     .order_by(|x| x.member("Name"))
///     .take(10);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    ops: Vec<QueryOp>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an arbitrary operator.
    #[must_use]
    pub fn then(mut self, op: QueryOp) -> Self {
        self.ops.push(op);
        self
    }

    #[must_use]
    pub fn ops(&self) -> &[QueryOp] {
        &self.ops
    }

    #[must_use]
    pub fn filter(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::Where(Lambda::new(build)))
    }

    #[must_use]
    pub fn select(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::Select(Lambda::new(build)))
    }

    #[must_use]
    pub fn order_by(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::OrderBy(Lambda::new(build)))
    }

    #[must_use]
    pub fn order_by_descending(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::OrderByDescending(Lambda::new(build)))
    }

    #[must_use]
    pub fn then_by(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::ThenBy(Lambda::new(build)))
    }

    #[must_use]
    pub fn then_by_descending(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::ThenByDescending(Lambda::new(build)))
    }

    #[must_use]
    pub fn take(self, count: usize) -> Self {
        self.then(QueryOp::Take(count))
    }

    #[must_use]
    pub fn skip(self, count: usize) -> Self {
        self.then(QueryOp::Skip(count))
    }

    /// Requests inline expansion of a navigation path such as `Children/Descendants`.
    #[must_use]
    pub fn expand(self, path: &str) -> Self {
        self.then(QueryOp::Expand(path.to_owned()))
    }

    #[must_use]
    pub fn first(self) -> Self {
        self.then(QueryOp::First(None))
    }

    #[must_use]
    pub fn first_or_default(self) -> Self {
        self.then(QueryOp::FirstOrDefault(None))
    }

    #[must_use]
    pub fn first_where(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::First(Some(Lambda::new(build))))
    }

    #[must_use]
    pub fn single(self) -> Self {
        self.then(QueryOp::Single(None))
    }

    #[must_use]
    pub fn single_or_default(self) -> Self {
        self.then(QueryOp::SingleOrDefault(None))
    }

    #[must_use]
    pub fn last(self) -> Self {
        self.then(QueryOp::Last(None))
    }

    #[must_use]
    pub fn last_or_default(self) -> Self {
        self.then(QueryOp::LastOrDefault(None))
    }

    #[must_use]
    pub fn count(self) -> Self {
        self.then(QueryOp::Count(None))
    }

    #[must_use]
    pub fn count_where(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::Count(Some(Lambda::new(build))))
    }

    #[must_use]
    pub fn any(self) -> Self {
        self.then(QueryOp::Any(None))
    }

    #[must_use]
    pub fn any_where(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::Any(Some(Lambda::new(build))))
    }

    #[must_use]
    pub fn all(self, build: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(QueryOp::All(Lambda::new(build)))
    }

    #[must_use]
    pub fn distinct(self) -> Self {
        self.then(QueryOp::Distinct)
    }

    #[must_use]
    pub fn reverse(self) -> Self {
        self.then(QueryOp::Reverse)
    }

    #[must_use]
    pub fn element_at(self, index: usize) -> Self {
        self.then(QueryOp::ElementAt(index))
    }
}
