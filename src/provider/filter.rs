//! Structured row filters and sort orders.
//!
//! Filters are rendered into SQL with bound parameters; column names are
//! checked against the table definition before being spliced into the query.

use serde::{Deserialize, Serialize};

use super::values::FieldValue;
use crate::error::{ProviderError, ProviderResult};
use crate::sqlite_persistence::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl CompareOp {
    fn as_sql(&self, value: &FieldValue) -> &'static str {
        match (self, value) {
            (CompareOp::Eq, FieldValue::Null) => "IS",
            (CompareOp::NotEq, FieldValue::Null) => "IS NOT",
            (CompareOp::Eq, _) => "=",
            (CompareOp::NotEq, _) => "!=",
            (CompareOp::Lt, _) => "<",
            (CompareOp::LtEq, _) => "<=",
            (CompareOp::Gt, _) => ">",
            (CompareOp::GtEq, _) => ">=",
            (CompareOp::Like, _) => "LIKE",
        }
    }
}

/// A conjunction/disjunction tree of typed column predicates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every row.
    #[default]
    All,
    Compare {
        column: String,
        op: CompareOp,
        value: FieldValue,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<FieldValue>) -> Self {
        Filter::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// Narrows `self` by `other`. Neither side is ever dropped.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, other) => other,
            (this, Filter::All) => this,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), other) => {
                left.push(other);
                Filter::And(left)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, _) | (_, Filter::All) => Filter::All,
            (Filter::Or(mut left), other) => {
                left.push(other);
                Filter::Or(left)
            }
            (this, other) => Filter::Or(vec![this, other]),
        }
    }

    pub fn negate(self) -> Filter {
        Filter::Not(Box::new(self))
    }

    /// Renders the filter as a WHERE clause body against `table`.
    ///
    /// Returns `None` when the filter matches every row.
    pub fn to_sql(&self, table: &Table) -> ProviderResult<Option<(String, Vec<FieldValue>)>> {
        let mut params = Vec::new();
        Ok(self
            .render(table, &mut params)?
            .map(|clause| (clause, params)))
    }

    fn render(&self, table: &Table, params: &mut Vec<FieldValue>) -> ProviderResult<Option<String>> {
        match self {
            Filter::All => Ok(None),
            Filter::Compare { column, op, value } => {
                let column = checked_column(table, column)?;
                params.push(value.clone());
                Ok(Some(format!("{} {} ?", column, op.as_sql(value))))
            }
            Filter::And(children) => Self::render_joined(children, " AND ", table, params),
            Filter::Or(children) => Self::render_joined(children, " OR ", table, params),
            Filter::Not(inner) => Ok(Some(match inner.render(table, params)? {
                Some(clause) => format!("NOT ({})", clause),
                None => "0".to_string(),
            })),
        }
    }

    fn render_joined(
        children: &[Filter],
        separator: &str,
        table: &Table,
        params: &mut Vec<FieldValue>,
    ) -> ProviderResult<Option<String>> {
        let params_before = params.len();
        let mut clauses = Vec::with_capacity(children.len());
        for child in children {
            match child.render(table, params)? {
                Some(clause) => clauses.push(format!("({})", clause)),
                // An OR with a match-all branch matches everything
                None if separator == " OR " => {
                    params.truncate(params_before);
                    return Ok(None);
                }
                None => {}
            }
        }
        if clauses.is_empty() {
            // An empty disjunction matches nothing, an empty conjunction everything
            return Ok((separator == " OR ").then(|| "0".to_string()));
        }
        Ok(Some(clauses.join(separator)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortOrder(pub Vec<SortKey>);

impl SortOrder {
    pub fn asc(mut self, column: impl Into<String>) -> Self {
        self.0.push(SortKey {
            column: column.into(),
            descending: false,
        });
        self
    }

    pub fn desc(mut self, column: impl Into<String>) -> Self {
        self.0.push(SortKey {
            column: column.into(),
            descending: true,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses `column [ASC|DESC], ...`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut order = SortOrder::default();
        for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let mut parts = term.split_whitespace();
            let column = parts.next().unwrap_or_default();
            let descending = match parts.next().map(|d| d.to_ascii_uppercase()) {
                None => false,
                Some(d) if d == "ASC" => false,
                Some(d) if d == "DESC" => true,
                Some(d) => return Err(format!("invalid sort direction '{}'", d)),
            };
            if parts.next().is_some() {
                return Err(format!("invalid sort term '{}'", term));
            }
            order = if descending {
                order.desc(column)
            } else {
                order.asc(column)
            };
        }
        Ok(order)
    }

    pub fn to_sql(&self, table: &Table) -> ProviderResult<Option<String>> {
        if self.0.is_empty() {
            return Ok(None);
        }
        let terms = self
            .0
            .iter()
            .map(|key| {
                checked_column(table, &key.column).map(|column| {
                    format!("{} {}", column, if key.descending { "DESC" } else { "ASC" })
                })
            })
            .collect::<ProviderResult<Vec<_>>>()?;
        Ok(Some(terms.join(", ")))
    }
}

pub(crate) fn checked_column(table: &Table, column: &str) -> ProviderResult<&'static str> {
    table
        .column(column)
        .map(|c| c.name)
        .ok_or_else(|| ProviderError::InvalidColumn {
            relation: table.name,
            column: column.to_string(),
        })
}
