//! Query object to SQL translation

use std::fmt::Write as _;

use tracing::{trace, warn};

use super::{
    DimensionCondition, LocationFilter, MaxMinFilter, MetadataFilter, QueryObject, ValueFilter,
};
use crate::schema::{
    dimension_column, DIMENSION_COLUMNS, DIMENSION_TABLE, LOCATION_COLUMNS, LOCATION_TABLE,
    VALUE_TABLE, VARIABLE_COLUMNS, VARIABLE_DIMENSION_TABLE, VARIABLE_TABLE,
};

/// Bound parameter of a [`Statement`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Integer(i64),
    Text(String),
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// SQL text with `?` placeholders and the values bound to them, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// The statement with every placeholder replaced by its literal value.
    ///
    /// Meant for logs and assertions; execution always binds parameters.
    pub fn to_inline_sql(&self) -> String {
        let mut params = self.params.iter();
        let mut out = String::with_capacity(self.sql.len());
        for ch in self.sql.chars() {
            if ch != '?' {
                out.push(ch);
                continue;
            }
            match params.next() {
                Some(SqlParam::Integer(value)) => {
                    let _ = write!(out, "{value}");
                }
                Some(SqlParam::Text(value)) => {
                    let _ = write!(out, "'{}'", value.replace('\'', "''"));
                }
                None => out.push(ch),
            }
        }
        out
    }
}

/// `WHERE` clauses joined with `AND`, omitted entirely when empty
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<SqlParam>,
}

impl Conditions {
    fn is_in<P: Into<SqlParam>>(&mut self, column: &str, values: impl IntoIterator<Item = P>) {
        let start = self.params.len();
        self.params.extend(values.into_iter().map(Into::into));
        let clause = match self.params.len() - start {
            1 => format!("{column} = ?"),
            n => format!("{column} IN ({})", vec!["?"; n].join(", ")),
        };
        self.clauses.push(clause);
    }

    fn is_null(&mut self, column: &str) {
        self.clauses.push(format!("{column} IS NULL"));
    }

    fn finish(self, select: String) -> Statement {
        let mut sql = select;
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        Statement {
            sql,
            params: self.params,
        }
    }
}

fn select(columns: &[&str], table: &str) -> String {
    format!("SELECT {} FROM {table}", columns.join(", "))
}

/// Translate a query object into a statement.
///
/// Returns `None` for queries that cannot be executed: a `values` query
/// without a variable, and a `max-min-value` query scoped by dimensions.
pub fn translate(query: &QueryObject) -> Option<Statement> {
    let statement = match query {
        QueryObject::Locations { filter } => Some(locations(filter)),
        QueryObject::Dimensions { filter } => {
            Some(metadata(select(&DIMENSION_COLUMNS, DIMENSION_TABLE), filter))
        }
        QueryObject::Variables { filter } => {
            Some(metadata(select(&VARIABLE_COLUMNS, VARIABLE_TABLE), filter))
        }
        QueryObject::MaxMinValue { filter } => max_min_value(filter),
        QueryObject::Values { filter } => values(filter),
    }?;
    trace!(kind = query.kind(), sql = %statement.to_inline_sql(), "translated query");
    Some(statement)
}

fn locations(filter: &LocationFilter) -> Statement {
    let mut conditions = Conditions::default();
    if let Some(ids) = &filter.ids {
        conditions.is_in("id", ids.iter().copied());
    }
    conditions.finish(select(&LOCATION_COLUMNS, LOCATION_TABLE))
}

fn metadata(select: String, filter: &MetadataFilter) -> Statement {
    let mut conditions = Conditions::default();
    if let Some(ids) = &filter.ids {
        conditions.is_in("id", ids.iter().copied());
    }
    if let Some(names) = &filter.names {
        conditions.is_in("name", names.iter().map(String::as_str));
    }
    conditions.finish(select)
}

fn max_min_value(filter: &MaxMinFilter) -> Option<Statement> {
    if filter.dimensions.is_some() {
        warn!("max-min-value scoped by dimensions is not supported");
        return None;
    }
    let mut conditions = Conditions::default();
    if let Some(variables) = &filter.variables {
        conditions.is_in("variable", variables.iter().copied());
    }
    if let Some(locations) = &filter.locations {
        conditions.is_in("location", locations.iter().copied());
    }
    Some(conditions.finish(format!(
        "SELECT MAX(value) AS max, MIN(value) AS min FROM {VALUE_TABLE}"
    )))
}

fn values(filter: &ValueFilter) -> Option<Statement> {
    let variables = filter.variables();
    if variables.is_empty() {
        return None;
    }
    let mut conditions = Conditions::default();
    conditions.is_in("variable", variables);

    for (dimension, condition) in filter.dimension_id_and_value_dict.iter().flatten() {
        let column = dimension_column(*dimension);
        match condition {
            DimensionCondition::Unconstrained => {}
            DimensionCondition::IsNull => conditions.is_null(&column),
            DimensionCondition::In(coordinates) => {
                conditions.is_in(&column, coordinates.iter().copied())
            }
        }
    }

    if let Some(locations) = filter.locations() {
        conditions.is_in("location", locations);
    }
    Some(conditions.finish(format!("SELECT * FROM {VALUE_TABLE}")))
}

/// The join-table read used when populating variable metadata
pub fn variable_dimension_links() -> Statement {
    Statement::new(select(&["variable", "dimension"], VARIABLE_DIMENSION_TABLE))
}
