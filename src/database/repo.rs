use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use rusqlite::{Connection, Transaction};
use tracing::info;

use crate::database::crud::{self, Query, QueryResponse};
use crate::database::entity::{Entity, Fields};
use crate::database::schema::SCHEMA;
use crate::utils::error::{AppError, AppResult};

/// Shared handle to the SQLite store. Statements are serialised on one connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let conn = Connection::open(path).context("Failed to open database")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        info!("Opened database at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::database("connection lock poisoned"))
    }

    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Commits when `f` succeeds, rolls back otherwise.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> AppResult<T>) -> AppResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn repo<E: Entity>(&self) -> Repository<'_, E> {
        Repository {
            db: self,
            _entity: PhantomData,
        }
    }
}

/// Typed CRUD for one entity, each call on its own statement.
pub struct Repository<'a, E> {
    db: &'a Database,
    _entity: PhantomData<E>,
}

impl<E: Entity> Repository<'_, E> {
    pub fn query(&self, query: &Query) -> AppResult<QueryResponse<E>> {
        self.db.with_conn(|conn| crud::query::<E>(conn, query))
    }

    pub fn get(&self, id: i64) -> AppResult<Option<E>> {
        self.db.with_conn(|conn| crud::get::<E>(conn, id))
    }

    pub fn create(&self, fields: Fields) -> AppResult<E> {
        self.db.with_conn(|conn| crud::create::<E>(conn, fields))
    }

    pub fn patch(&self, id: i64, fields: Fields) -> AppResult<E> {
        self.db.with_conn(|conn| crud::patch::<E>(conn, id, fields))
    }

    pub fn delete(&self, ids: &[i64]) -> AppResult<usize> {
        self.db.with_conn(|conn| crud::delete::<E>(conn, ids))
    }

    pub fn soft_delete(&self, id: i64) -> AppResult<bool> {
        self.db.with_conn(|conn| crud::soft_delete::<E>(conn, id))
    }
}
