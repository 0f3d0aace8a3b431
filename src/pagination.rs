//! Cursor-based pagination over ordered SQL listings.
//!
//! A cursor is `base64(JSON)` of `{"values": {column: last value, ...},
//! "order": ["column_ASC" | "column_DESC", ...]}` describing the last row of
//! the previous page. It is never stored server-side; the client echoes it
//! back verbatim to fetch the next page.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite};
use std::fmt;

/// Page size when the caller does not ask for one.
pub const DEFAULT_TAKE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    #[error("Order must be <column>_ASC or <column>_DESC: {0}")]
    InvalidOrder(String),
    #[error("Invalid cursor")]
    InvalidCursor,
    #[error("Take must be greater than zero")]
    InvalidTake,
    #[error("Row cannot be encoded into a cursor")]
    Unencodable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    /// Comparison selecting rows that come after the cursor row.
    fn after(self) -> &'static str {
        match self {
            Direction::Asc => " > ",
            Direction::Desc => " < ",
        }
    }
}

/// One `<column>_<ASC|DESC>` order entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub column: String,
    pub direction: Direction,
}

impl OrderKey {
    pub fn parse(raw: &str) -> Result<Self, PaginationError> {
        let invalid = || PaginationError::InvalidOrder(raw.to_string());

        // Split on the last underscore so column names may contain underscores.
        let (column, direction) = raw.rsplit_once('_').ok_or_else(invalid)?;
        let direction = match direction {
            "ASC" => Direction::Asc,
            "DESC" => Direction::Desc,
            _ => return Err(invalid()),
        };

        if column.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            column: column.to_string(),
            direction,
        })
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.column, self.direction.as_sql())
    }
}

/// Pagination input of a list query.
#[derive(Debug, Clone, Default)]
pub struct CursorParams {
    pub cursor: Option<String>,
    pub order: Vec<String>,
    pub take: Option<u32>,
}

/// Decoded cursor contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub values: Map<String, Value>,
    pub order: Vec<String>,
}

impl Cursor {
    pub fn encode(&self) -> Result<String, PaginationError> {
        let json = serde_json::to_string(self).map_err(|_| PaginationError::Unencodable)?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(raw: &str) -> Result<Self, PaginationError> {
        let bytes = STANDARD
            .decode(raw)
            .map_err(|_| PaginationError::InvalidCursor)?;
        serde_json::from_slice(&bytes).map_err(|_| PaginationError::InvalidCursor)
    }

    /// Decode an optional cursor; absence means the first page.
    pub fn decode_optional(raw: Option<&str>) -> Result<Option<Self>, PaginationError> {
        raw.filter(|c| !c.is_empty()).map(Self::decode).transpose()
    }
}

/// Whitelist mapping client-facing column names to SQL expressions.
#[derive(Debug, Clone, Copy)]
pub struct SortColumns {
    columns: &'static [(&'static str, &'static str)],
}

impl SortColumns {
    pub const fn new(columns: &'static [(&'static str, &'static str)]) -> Self {
        Self { columns }
    }

    fn resolve(&self, column: &str) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, sql)| *sql)
    }
}

/// A cursor value that can be bound into a comparison.
#[derive(Debug, Clone)]
enum CursorValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl CursorValue {
    fn from_json(value: &Value) -> Result<Self, PaginationError> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(CursorValue::Int)
                .or_else(|| n.as_f64().map(CursorValue::Float))
                .ok_or(PaginationError::InvalidCursor),
            Value::String(s) => Ok(CursorValue::Text(s.clone())),
            Value::Bool(b) => Ok(CursorValue::Bool(*b)),
            _ => Err(PaginationError::InvalidCursor),
        }
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            CursorValue::Int(v) => qb.push_bind(*v),
            CursorValue::Float(v) => qb.push_bind(*v),
            CursorValue::Text(v) => qb.push_bind(v.clone()),
            CursorValue::Bool(v) => qb.push_bind(*v),
        };
    }
}

struct ResolvedKey {
    sql: &'static str,
    direction: Direction,
}

/// Apply keyset filtering, ordering and the page limit to `qb`.
///
/// `has_filter` tells whether `qb` already contains a `WHERE` clause. When a
/// cursor is present its embedded order replaces `params.order`. Returns the
/// effective order, to be passed on to [`generate_next_cursor`].
pub fn apply_cursor(
    qb: &mut QueryBuilder<'_, Sqlite>,
    params: &CursorParams,
    columns: &SortColumns,
    has_filter: bool,
) -> Result<Vec<OrderKey>, PaginationError> {
    let take = params.take.unwrap_or(DEFAULT_TAKE);
    if take == 0 {
        return Err(PaginationError::InvalidTake);
    }

    let cursor = Cursor::decode_optional(params.cursor.as_deref())?;
    let raw_order = match &cursor {
        Some(cursor) => &cursor.order,
        None => &params.order,
    };

    let order = raw_order
        .iter()
        .map(|raw| OrderKey::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let resolved = order
        .iter()
        .map(|key| {
            columns
                .resolve(&key.column)
                .map(|sql| ResolvedKey {
                    sql,
                    direction: key.direction,
                })
                .ok_or_else(|| PaginationError::InvalidOrder(key.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Validate everything before touching the builder.
    let values = match &cursor {
        Some(cursor) if !order.is_empty() => Some(
            order
                .iter()
                .map(|key| {
                    cursor
                        .values
                        .get(&key.column)
                        .ok_or(PaginationError::InvalidCursor)
                        .and_then(CursorValue::from_json)
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => None,
    };

    if let Some(values) = values {
        push_keyset_predicate(qb, &resolved, &values, has_filter);
    }

    for (i, key) in resolved.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push(key.sql);
        qb.push(" ");
        qb.push(key.direction.as_sql());
    }

    qb.push(" LIMIT ");
    qb.push_bind(i64::from(take));

    Ok(order)
}

/// Rows strictly after the cursor row in the given multi-key order:
/// `(k1 op v1) OR (k1 = v1 AND k2 op v2) OR ...`
fn push_keyset_predicate(
    qb: &mut QueryBuilder<'_, Sqlite>,
    keys: &[ResolvedKey],
    values: &[CursorValue],
    has_filter: bool,
) {
    qb.push(if has_filter { " AND (" } else { " WHERE (" });

    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push("(");
        for (prefix, value) in keys.iter().zip(values).take(i) {
            qb.push(prefix.sql);
            qb.push(" = ");
            value.push_bind(qb);
            qb.push(" AND ");
        }
        qb.push(key.sql);
        qb.push(key.direction.after());
        values[i].push_bind(qb);
        qb.push(")");
    }

    qb.push(")");
}

/// Build the cursor pointing after the last row of `results`.
///
/// Returns `None` for an empty page. Each row must serialize to a JSON
/// object containing every ordered column.
pub fn generate_next_cursor<T: Serialize>(
    results: &[T],
    order: &[OrderKey],
) -> Result<Option<String>, PaginationError> {
    let Some(last) = results.last() else {
        return Ok(None);
    };

    let Value::Object(row) = serde_json::to_value(last).map_err(|_| PaginationError::Unencodable)?
    else {
        return Err(PaginationError::Unencodable);
    };

    let mut values = Map::new();
    for key in order {
        let value = row
            .get(&key.column)
            .ok_or(PaginationError::Unencodable)?;
        values.insert(key.column.clone(), value.clone());
    }

    let cursor = Cursor {
        values,
        order: order.iter().map(OrderKey::to_string).collect(),
    };

    cursor.encode().map(Some)
}
