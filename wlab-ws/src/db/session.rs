//! Request-scoped storage session
//!
//! A [`Session`] is acquired when a request starts and passed by `&mut`
//! through the flow. The transaction is begun lazily on first use;
//! [`Session::commit`] and [`Session::rollback`] end it, and the next
//! [`Session::conn`] call begins a fresh one. Dropping a session with an open
//! transaction rolls it back.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

pub struct Session {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl Session {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, tx: None }
    }

    /// Connection of the current transaction, beginning one if needed
    pub async fn conn(&mut self) -> Result<&mut SqliteConnection, sqlx::Error> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        let tx = self.tx.insert(tx);
        Ok(&mut **tx)
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub async fn commit(&mut self) -> Result<(), sqlx::Error> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.tx.is_some() {
            debug!("Session dropped with open transaction, rolling back");
        }
    }
}
