//! Generic query/create/patch/delete over any [`Entity`].

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::entity::{validate_fields, Entity, EntitySchema, Fields, WriteMode};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// Equality/id filters plus paging. Every filter is ANDed.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub ids: Vec<i64>,
    pub filters: Vec<(String, Value)>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    pub order_by: Option<OrderBy>,
    pub include_deleted: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: i64) -> Self {
        self.ids.push(id);
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.ids.extend(ids);
        self
    }

    pub fn filter(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by = Some(OrderBy {
            column: column.to_string(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by = Some(OrderBy {
            column: column.to_string(),
            descending: true,
        });
        self
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// One page of results and the unpaged total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse<T> {
    pub offset: usize,
    pub total: usize,
    pub results: Vec<T>,
}

impl<T> Default for QueryResponse<T> {
    fn default() -> Self {
        Self {
            offset: 0,
            total: 0,
            results: Vec::new(),
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn where_clause(schema: &EntitySchema, query: &Query) -> AppResult<(String, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut args = Vec::new();

    if !query.ids.is_empty() {
        clauses.push(format!("id IN ({})", placeholders(query.ids.len())));
        args.extend(query.ids.iter().copied().map(Value::Integer));
    }
    for (column, value) in &query.filters {
        schema.check_column(column)?;
        if *value == Value::Null {
            clauses.push(format!("{column} IS NULL"));
        } else {
            clauses.push(format!("{column} = ?"));
            args.push(value.clone());
        }
    }
    if schema.soft_delete && !query.include_deleted {
        clauses.push("deleted_at IS NULL".to_string());
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    Ok((sql, args))
}

pub fn query<E: Entity>(conn: &Connection, query: &Query) -> AppResult<QueryResponse<E>> {
    let schema = &E::SCHEMA;
    let (where_sql, mut args) = where_clause(schema, query)?;

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}{}", schema.table, where_sql),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;

    let order_sql = match &query.order_by {
        Some(order) => {
            schema.check_column(&order.column)?;
            let dir = if order.descending { "DESC" } else { "ASC" };
            format!(" ORDER BY {} {dir}", order.column)
        }
        None => " ORDER BY id ASC".to_string(),
    };

    let offset = query.skip.unwrap_or(0);
    // SQLite treats a negative LIMIT as unbounded
    let limit = query.take.map(|t| t as i64).unwrap_or(-1);
    args.push(Value::Integer(limit));
    args.push(Value::Integer(offset as i64));

    let sql = format!(
        "SELECT * FROM {}{}{} LIMIT ? OFFSET ?",
        schema.table, where_sql, order_sql
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut results = stmt
        .query_map(params_from_iter(args.iter()), |row| E::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    E::load_references(conn, &mut results)?;

    Ok(QueryResponse {
        offset,
        total: total as usize,
        results,
    })
}

/// Lookup by id, soft-deleted rows included.
pub fn get<E: Entity>(conn: &Connection, id: i64) -> AppResult<Option<E>> {
    let response = query::<E>(conn, &Query::new().id(id).include_deleted())?;
    Ok(response.results.into_iter().next())
}

fn check_references(conn: &Connection, schema: &EntitySchema, fields: &Fields) -> AppResult<()> {
    for spec in schema.fields {
        let (Some(table), Some(Value::Integer(id))) = (spec.references, fields.get(spec.name)) else {
            continue;
        };
        let exists: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
            params![id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::validation(
                spec.name,
                format!("{table} {id} does not exist"),
            ));
        }
    }
    Ok(())
}

pub fn create<E: Entity>(conn: &Connection, fields: Fields) -> AppResult<E> {
    let schema = &E::SCHEMA;
    let fields = validate_fields(schema, fields, WriteMode::Create)?;
    check_references(conn, schema, &fields)?;

    if fields.is_empty() {
        conn.execute(&format!("INSERT INTO {} DEFAULT VALUES", schema.table), [])?;
    } else {
        let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema.table,
            columns.join(", "),
            placeholders(columns.len())
        );
        conn.execute(&sql, params_from_iter(fields.values()))?;
    }

    let id = conn.last_insert_rowid();
    debug!(table = schema.table, id, "created row");
    get::<E>(conn, id)?
        .ok_or_else(|| AppError::database(format!("{} {id} vanished after insert", schema.table)))
}

/// Partial update: only the supplied fields are written.
pub fn patch<E: Entity>(conn: &Connection, id: i64, fields: Fields) -> AppResult<E> {
    let schema = &E::SCHEMA;
    let fields = validate_fields(schema, fields, WriteMode::Patch)?;
    check_references(conn, schema, &fields)?;

    if !fields.is_empty() {
        let assignments: Vec<String> = fields.keys().map(|c| format!("{c} = ?")).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            schema.table,
            assignments.join(", ")
        );
        let mut args: Vec<Value> = fields.into_values().collect();
        args.push(Value::Integer(id));
        conn.execute(&sql, params_from_iter(args.iter()))?;
        debug!(table = schema.table, id, "patched row");
    }

    get::<E>(conn, id)?.ok_or_else(|| AppError::not_found(format!("{} {id}", schema.table)))
}

/// Remove rows by id. Foreign keys are left to the store.
pub fn delete<E: Entity>(conn: &Connection, ids: &[i64]) -> AppResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let schema = &E::SCHEMA;
    let sql = format!(
        "DELETE FROM {} WHERE id IN ({})",
        schema.table,
        placeholders(ids.len())
    );
    let removed = conn.execute(&sql, params_from_iter(ids.iter()))?;
    debug!(table = schema.table, removed, "deleted rows");
    Ok(removed)
}

/// Stamp `deleted_at`. Returns false when the row is missing or already deleted.
pub fn soft_delete<E: Entity>(conn: &Connection, id: i64) -> AppResult<bool> {
    let schema = &E::SCHEMA;
    if !schema.soft_delete {
        return Err(AppError::database(format!(
            "{} does not support soft delete",
            schema.table
        )));
    }
    let changed = conn.execute(
        &format!(
            "UPDATE {} SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            schema.table
        ),
        params![Utc::now().to_rfc3339(), id],
    )?;
    Ok(changed > 0)
}
