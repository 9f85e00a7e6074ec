//! Entity metadata for the generic repository.
//!
//! Each table declares its writable fields once, as data: whether the field is
//! required on create, what it defaults to, which rule its value must pass and
//! which table it references. The repository in [`crud`](super::crud) reads
//! this metadata to validate and build every create, patch and query.

use std::collections::BTreeMap;

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;

use crate::utils::error::{AppError, AppResult};

/// Column name to value. Absent keys are left alone on patch and defaulted on create.
pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Int(i64),
    Text(&'static str),
}

impl FieldDefault {
    fn value(self) -> Value {
        match self {
            Self::Int(v) => Value::Integer(v),
            Self::Text(v) => Value::Text(v.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule {
    /// Text with at least one non-whitespace character.
    NotEmpty,
    /// Integer strictly greater than the bound.
    GreaterThan(i64),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub default: Option<FieldDefault>,
    pub rule: Option<FieldRule>,
    pub references: Option<&'static str>,
}

impl FieldSpec {
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            default: None,
            rule: None,
            references: None,
        }
    }

    pub const fn required(name: &'static str) -> Self {
        Self {
            required: true,
            ..Self::optional(name)
        }
    }

    pub const fn default_to(self, default: FieldDefault) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    pub const fn rule(self, rule: FieldRule) -> Self {
        Self {
            rule: Some(rule),
            ..self
        }
    }

    pub const fn references(self, table: &'static str) -> Self {
        Self {
            references: Some(table),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    pub table: &'static str,
    /// Writable columns, excluding `id`.
    pub fields: &'static [FieldSpec],
    /// Store-managed columns that can be filtered and ordered on but not written.
    pub read_only: &'static [&'static str],
    /// Rows carry a `deleted_at` column and are hidden from queries once set.
    pub soft_delete: bool,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == "id"
            || self.field(name).is_some()
            || self.read_only.contains(&name)
            || (self.soft_delete && name == "deleted_at")
    }

    pub fn check_column(&self, name: &str) -> AppResult<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(AppError::validation(
                name,
                format!("unknown column on {}", self.table),
            ))
        }
    }
}

/// A row type the generic repository can read and write.
pub trait Entity: Sized {
    const SCHEMA: EntitySchema;

    fn id(&self) -> i64;

    /// Decode one row of `SELECT *`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Populate `[Reference]`-style children after a query.
    fn load_references(_conn: &Connection, _rows: &mut [Self]) -> rusqlite::Result<()> {
        Ok(())
    }
}

/// Typed create/patch requests convert themselves to [`Fields`].
pub trait IntoFields {
    fn into_fields(self) -> Fields;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Patch,
}

/// Apply defaults and rules. References are checked separately, they need a connection.
pub fn validate_fields(schema: &EntitySchema, mut fields: Fields, mode: WriteMode) -> AppResult<Fields> {
    for name in fields.keys() {
        if schema.field(name).is_none() {
            return Err(AppError::validation(
                name.as_str(),
                format!("not a writable field of {}", schema.table),
            ));
        }
    }

    for spec in schema.fields {
        let missing = matches!(fields.get(spec.name), None | Some(Value::Null));
        if missing {
            match mode {
                WriteMode::Create => {
                    if let Some(default) = spec.default {
                        fields.insert(spec.name.to_string(), default.value());
                    } else if spec.required {
                        return Err(AppError::validation(spec.name, "is required"));
                    }
                }
                WriteMode::Patch => {
                    if spec.required && fields.contains_key(spec.name) {
                        return Err(AppError::validation(spec.name, "cannot be cleared"));
                    }
                }
            }
            continue;
        }

        if let (Some(rule), Some(value)) = (spec.rule, fields.get(spec.name)) {
            check_rule(spec.name, rule, value)?;
        }
    }

    Ok(fields)
}

fn check_rule(name: &str, rule: FieldRule, value: &Value) -> AppResult<()> {
    match (rule, value) {
        (FieldRule::NotEmpty, Value::Text(text)) if !text.trim().is_empty() => Ok(()),
        (FieldRule::NotEmpty, _) => Err(AppError::validation(name, "must not be empty")),
        (FieldRule::GreaterThan(bound), Value::Integer(v)) if *v > bound => Ok(()),
        (FieldRule::GreaterThan(bound), _) => Err(AppError::validation(
            name,
            format!("must be greater than {bound}"),
        )),
    }
}

/// Read a JSON-encoded text column.
pub fn json_column<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|e| {
            let idx = row.as_ref().column_index(column).unwrap_or(0);
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })
    })
    .transpose()
}

/// Builder-style helpers for assembling [`Fields`].
pub trait FieldsExt {
    fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self;
    fn set_opt<V: Into<Value>>(&mut self, name: &str, value: Option<V>) -> &mut Self;
}

impl FieldsExt for Fields {
    fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.insert(name.to_string(), value.into());
        self
    }

    /// Only sets the field when a value is present, so patches stay partial.
    fn set_opt<V: Into<Value>>(&mut self, name: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.insert(name.to_string(), value.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDGETS: EntitySchema = EntitySchema {
        table: "widgets",
        fields: &[
            FieldSpec::required("name").rule(FieldRule::NotEmpty),
            FieldSpec::optional("size")
                .default_to(FieldDefault::Int(512))
                .rule(FieldRule::GreaterThan(0)),
            FieldSpec::required("parent_id").references("parents"),
        ],
        read_only: &["created_at"],
        soft_delete: false,
    };

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_create_applies_defaults() {
        let out = validate_fields(
            &WIDGETS,
            fields(&[
                ("name", Value::Text("a".into())),
                ("parent_id", Value::Integer(1)),
            ]),
            WriteMode::Create,
        )
        .unwrap();
        assert_eq!(out["size"], Value::Integer(512));
    }

    #[test]
    fn test_create_requires_fields() {
        let err = validate_fields(
            &WIDGETS,
            fields(&[("name", Value::Text("a".into()))]),
            WriteMode::Create,
        )
        .unwrap_err();
        assert_eq!(err.field_name(), Some("parent_id"));
    }

    #[test]
    fn test_rules_are_enforced() {
        let err = validate_fields(
            &WIDGETS,
            fields(&[("name", Value::Text("   ".into()))]),
            WriteMode::Patch,
        )
        .unwrap_err();
        assert_eq!(err.field_name(), Some("name"));

        let err = validate_fields(
            &WIDGETS,
            fields(&[("size", Value::Integer(0))]),
            WriteMode::Patch,
        )
        .unwrap_err();
        assert_eq!(err.field_name(), Some("size"));
    }

    #[test]
    fn test_patch_cannot_clear_required() {
        let err = validate_fields(&WIDGETS, fields(&[("name", Value::Null)]), WriteMode::Patch)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_unknown_and_read_only_fields_rejected() {
        assert!(validate_fields(
            &WIDGETS,
            fields(&[("created_at", Value::Null)]),
            WriteMode::Patch
        )
        .is_err());
        assert!(WIDGETS.has_column("created_at"));
        assert!(!WIDGETS.has_column("deleted_at"));
        assert!(WIDGETS.check_column("name; DROP TABLE widgets").is_err());
    }
}
