//! Predicates for WHERE, HAVING and ON clauses.
//!
//! A [`Condition`] is an immutable value. Expressions are SQL fragments with
//! two kinds of placeholders:
//!
//! - `{}` binds the next positional argument
//! - `{name}` / `{alias.name}` names a property; the dialect renders the
//!   column reference for it on the main or the named table alias
//!
//! `{{` and `}}` stand for literal braces.
//!
//! ```ignore
//! let cond = Condition::expr("{lastName} = {}", args!["Apple"])
//!     .and(Condition::expr("{a.city} <> {}", args!["Paris"]));
//! ```

use crate::entity::{Entity, EntityInfo};
use crate::error::{OrmError, OrmResult};
use crate::sql::{QueryState, Sql};
use crate::value::{IntoValue, Value};
use std::sync::Arc;

/// One piece of a parsed expression template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Text(std::borrow::Cow<'a, str>),
    Arg,
    Name(&'a str),
}

fn flush(segments: &mut Vec<Segment<'_>>, text: &mut String) {
    if !text.is_empty() {
        segments.push(Segment::Text(std::mem::take(text).into()));
    }
}

/// Split an expression template into text, positional and named placeholders.
pub(crate) fn parse_template(content: &str) -> OrmResult<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut start = 0;
    let bytes = content.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                text.push_str(&content[start..i]);
                text.push('{');
                i += 2;
                start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                text.push_str(&content[start..i]);
                text.push('}');
                i += 2;
                start = i;
            }
            b'{' => {
                text.push_str(&content[start..i]);
                let Some(len) = content[i + 1..].find('}') else {
                    return Err(OrmError::invalid_state(format!(
                        "unclosed '{{' in expression {content:?}"
                    )));
                };
                flush(&mut segments, &mut text);
                let name = content[i + 1..i + 1 + len].trim();
                if name.is_empty() {
                    segments.push(Segment::Arg);
                } else {
                    segments.push(Segment::Name(name));
                }
                i += len + 2;
                start = i;
            }
            b'}' => {
                return Err(OrmError::invalid_state(format!(
                    "unmatched '}}' in expression {content:?}"
                )));
            }
            _ => i += 1,
        }
    }
    text.push_str(&content[start..]);
    flush(&mut segments, &mut text);
    Ok(segments)
}

fn positional_count(content: &str) -> OrmResult<usize> {
    Ok(parse_template(content)?
        .iter()
        .filter(|s| matches!(s, Segment::Arg))
        .count())
}

/// A SQL fragment with positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    content: String,
    args: Vec<Option<Value>>,
}

impl Expression {
    /// Create an expression, checking that every `{}` has an argument.
    pub fn new(content: impl Into<String>, args: Vec<Option<Value>>) -> OrmResult<Self> {
        let expr = Self::unchecked(content, args);
        expr.check()?;
        Ok(expr)
    }

    /// Create an expression without checking; rendering performs the same check.
    pub fn unchecked(content: impl Into<String>, args: Vec<Option<Value>>) -> Self {
        Self {
            content: content.into(),
            args,
        }
    }

    pub(crate) fn check(&self) -> OrmResult<()> {
        let expected = positional_count(&self.content)?;
        if expected != self.args.len() {
            return Err(OrmError::invalid_state(format!(
                "expression {:?} has {expected} placeholder(s) but {} argument(s)",
                self.content,
                self.args.len()
            )));
        }
        Ok(())
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn args(&self) -> &[Option<Value>] {
        &self.args
    }
}

impl From<&str> for Expression {
    fn from(content: &str) -> Self {
        Expression::unchecked(content, Vec::new())
    }
}

impl From<String> for Expression {
    fn from(content: String) -> Self {
        Expression::unchecked(content, Vec::new())
    }
}

/// Equality over a record's key value properties, or all of them without keys.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCondition {
    info: Arc<EntityInfo>,
    values: Vec<(usize, Option<Value>)>,
}

impl EntityCondition {
    pub fn new<E: Entity>(record: &E) -> OrmResult<Self> {
        let info = EntityInfo::of::<E>()?;
        let values = info.identity_values(record)?;
        Ok(Self { info, values })
    }

    pub fn info(&self) -> &Arc<EntityInfo> {
        &self.info
    }

    /// Column index and value pairs; `None` renders `IS NULL`.
    pub fn values(&self) -> &[(usize, Option<Value>)] {
        &self.values
    }
}

/// A fragment followed by a nested query, such as `EXISTS (...)` or `{id} IN (...)`.
#[derive(Debug, Clone)]
pub struct SubqueryCondition {
    expression: Expression,
    query: Arc<QueryState>,
}

impl SubqueryCondition {
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }
}

impl PartialEq for SubqueryCondition {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression && Arc::ptr_eq(&self.query, &other.query)
    }
}

/// Query operator for property conditions.
///
/// # Example
/// ```ignore
/// Condition::new("age", Op::gte(18))
/// Condition::new("name.last", Op::in_list(vec!["Apple", "Banana"]))
/// ```
#[derive(Debug, Clone)]
pub enum Op<T> {
    /// Equal: column = value
    Eq(T),
    /// Not equal: column <> value
    Ne(T),
    /// Greater than: column > value
    Gt(T),
    /// Greater than or equal: column >= value
    Gte(T),
    /// Less than: column < value
    Lt(T),
    /// Less than or equal: column <= value
    Lte(T),
    /// LIKE pattern match
    Like(T),
    /// NOT LIKE pattern match
    NotLike(T),
    /// IS NULL
    IsNull,
    /// IS NOT NULL
    IsNotNull,
    /// IN (list)
    In(Vec<T>),
    /// NOT IN (list)
    NotIn(Vec<T>),
    /// BETWEEN a AND b
    Between(T, T),
}

impl<T> Op<T> {
    pub fn eq(val: T) -> Self {
        Op::Eq(val)
    }

    pub fn ne(val: T) -> Self {
        Op::Ne(val)
    }

    pub fn gt(val: T) -> Self {
        Op::Gt(val)
    }

    pub fn gte(val: T) -> Self {
        Op::Gte(val)
    }

    pub fn lt(val: T) -> Self {
        Op::Lt(val)
    }

    pub fn lte(val: T) -> Self {
        Op::Lte(val)
    }

    pub fn like(val: T) -> Self {
        Op::Like(val)
    }

    pub fn not_like(val: T) -> Self {
        Op::NotLike(val)
    }

    pub fn is_null() -> Self {
        Op::IsNull
    }

    pub fn is_not_null() -> Self {
        Op::IsNotNull
    }

    pub fn in_list(vals: Vec<T>) -> Self {
        Op::In(vals)
    }

    pub fn not_in(vals: Vec<T>) -> Self {
        Op::NotIn(vals)
    }

    pub fn between(from: T, to: T) -> Self {
        Op::Between(from, to)
    }
}

/// An immutable predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Condition {
    /// No predicate; the identity of `and`/`or`.
    #[default]
    Empty,
    /// Matches every row; renders no predicate at all.
    All,
    Expression(Expression),
    Entity(EntityCondition),
    Subquery(SubqueryCondition),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// An expression condition; the placeholder count is checked when rendered.
    pub fn expr(content: impl Into<String>, args: Vec<Option<Value>>) -> Self {
        Condition::Expression(Expression::unchecked(content, args))
    }

    /// A fragment without arguments.
    pub fn raw(content: impl Into<String>) -> Self {
        Self::expr(content, Vec::new())
    }

    /// Equality over the record's identity (key columns, or all columns).
    pub fn entity<E: Entity>(record: &E) -> OrmResult<Self> {
        Ok(Condition::Entity(EntityCondition::new(record)?))
    }

    /// `content` followed by the nested query in parentheses.
    ///
    /// Outer arguments bind before the nested query's own parameters.
    pub fn subquery<F: Entity>(
        content: impl Into<String>,
        args: Vec<Option<Value>>,
        query: &Sql<'_, F>,
    ) -> Self {
        Condition::Subquery(SubqueryCondition {
            expression: Expression::unchecked(content, args),
            query: Arc::new(query.state().clone()),
        })
    }

    /// `EXISTS (query)`.
    pub fn exists<F: Entity>(query: &Sql<'_, F>) -> Self {
        Self::subquery("EXISTS", Vec::new(), query)
    }

    /// A comparison on one property.
    pub fn new<T: IntoValue>(property: &str, op: Op<T>) -> Self {
        let col = format!("{{{property}}}");
        let list = |vals: Vec<T>| -> (String, Vec<Option<Value>>) {
            let marks = vec!["{}"; vals.len()].join(", ");
            (marks, vals.into_iter().map(IntoValue::into_value).collect())
        };
        match op {
            Op::Eq(v) => Self::expr(format!("{col} = {{}}"), vec![v.into_value()]),
            Op::Ne(v) => Self::expr(format!("{col} <> {{}}"), vec![v.into_value()]),
            Op::Gt(v) => Self::expr(format!("{col} > {{}}"), vec![v.into_value()]),
            Op::Gte(v) => Self::expr(format!("{col} >= {{}}"), vec![v.into_value()]),
            Op::Lt(v) => Self::expr(format!("{col} < {{}}"), vec![v.into_value()]),
            Op::Lte(v) => Self::expr(format!("{col} <= {{}}"), vec![v.into_value()]),
            Op::Like(v) => Self::expr(format!("{col} LIKE {{}}"), vec![v.into_value()]),
            Op::NotLike(v) => Self::expr(format!("{col} NOT LIKE {{}}"), vec![v.into_value()]),
            Op::IsNull => Self::raw(format!("{col} IS NULL")),
            Op::IsNotNull => Self::raw(format!("{col} IS NOT NULL")),
            // Empty IN list matches nothing, empty NOT IN everything.
            Op::In(vals) if vals.is_empty() => Self::raw("1=0"),
            Op::NotIn(vals) if vals.is_empty() => Self::All,
            Op::In(vals) => {
                let (marks, args) = list(vals);
                Self::expr(format!("{col} IN ({marks})"), args)
            }
            Op::NotIn(vals) => {
                let (marks, args) = list(vals);
                Self::expr(format!("{col} NOT IN ({marks})"), args)
            }
            Op::Between(from, to) => Self::expr(
                format!("{col} BETWEEN {{}} AND {{}}"),
                vec![from.into_value(), to.into_value()],
            ),
        }
    }

    pub fn eq<T: IntoValue>(property: &str, value: T) -> Self {
        Self::new(property, Op::Eq(value))
    }

    pub fn ne<T: IntoValue>(property: &str, value: T) -> Self {
        Self::new(property, Op::Ne(value))
    }

    pub fn gt<T: IntoValue>(property: &str, value: T) -> Self {
        Self::new(property, Op::Gt(value))
    }

    pub fn lt<T: IntoValue>(property: &str, value: T) -> Self {
        Self::new(property, Op::Lt(value))
    }

    pub fn is_null(property: &str) -> Self {
        Self::new::<Value>(property, Op::IsNull)
    }

    pub fn in_list<T: IntoValue>(property: &str, values: Vec<T>) -> Self {
        Self::new(property, Op::In(values))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Condition::Empty)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Condition::All)
    }

    /// Conjunction. `Empty` is the identity and `All` is absorbed.
    pub fn and(self, other: Condition) -> Condition {
        match (self, other) {
            (Condition::Empty, c) | (c, Condition::Empty) => c,
            (Condition::All, c) | (c, Condition::All) => c,
            (Condition::And(mut list), c) => {
                list.push(c);
                Condition::And(list)
            }
            (a, b) => Condition::And(vec![a, b]),
        }
    }

    /// Disjunction. `Empty` is the identity and `All` wins.
    pub fn or(self, other: Condition) -> Condition {
        match (self, other) {
            (Condition::Empty, c) | (c, Condition::Empty) => c,
            (Condition::All, _) | (_, Condition::All) => Condition::All,
            (Condition::Or(mut list), c) => {
                list.push(c);
                Condition::Or(list)
            }
            (a, b) => Condition::Or(vec![a, b]),
        }
    }

    /// Check every expression's placeholder count.
    pub fn validate(&self) -> OrmResult<()> {
        match self {
            Condition::Empty | Condition::All | Condition::Entity(_) => Ok(()),
            Condition::Expression(expr) => expr.check(),
            Condition::Subquery(sub) => sub.expression.check(),
            Condition::And(list) | Condition::Or(list) => list.iter().try_for_each(Self::validate),
        }
    }
}

impl From<Expression> for Condition {
    fn from(expr: Expression) -> Self {
        Condition::Expression(expr)
    }
}

/// Build an expression [`Condition`] with positional arguments.
///
/// ```ignore
/// let cond = relmap::expr!("{lastName} = {} AND {age} > {}", "Apple", 18);
/// ```
#[macro_export]
macro_rules! expr {
    ($content:expr) => {
        $crate::Condition::raw($content)
    };
    ($content:expr, $($arg:expr),+ $(,)?) => {
        $crate::Condition::expr($content, $crate::args![$($arg),+])
    };
}
