pub mod crud;
pub mod entity;
pub mod repo;
pub mod schema;

pub use crud::{OrderBy, Query, QueryResponse};
pub use entity::{Entity, EntitySchema, FieldDefault, FieldRule, FieldSpec, Fields, FieldsExt, IntoFields};
pub use repo::{Database, Repository};
