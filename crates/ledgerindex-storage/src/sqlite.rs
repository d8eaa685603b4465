//! SQLite ledger store.
//!
//! Persists blocks, transactions, wallets and applied balance-effect keys to a
//! single SQLite file. Every [`BlockCommit`] runs inside one SQL transaction.
//! Records are stored as JSON bodies next to their key columns; amounts are
//! TEXT so `u128`/`i128` values survive untouched.
//!
//! # Usage
//! ```rust,no_run
//! use ledgerindex_storage::sqlite::SqliteLedgerStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteLedgerStore::open("./ledger.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteLedgerStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use ledgerindex_core::error::IndexerError;
use ledgerindex_core::store::{BlockCommit, LedgerStore};
use ledgerindex_core::types::{Block, Transaction, Wallet};

fn db_err(e: impl std::fmt::Display) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, IndexerError> {
    serde_json::from_str(body).map_err(db_err)
}

/// SQLite-backed [`LedgerStore`].
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./ledger.db"`) or a full
    /// SQLite URL (`"sqlite:./ledger.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Limited to one connection, since each connection would otherwise see
    /// its own empty database.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let statements = [
            "CREATE TABLE IF NOT EXISTS blocks (
                id        TEXT    PRIMARY KEY,
                height    INTEGER NOT NULL UNIQUE,
                timestamp INTEGER NOT NULL,
                body      TEXT    NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS transactions (
                id           TEXT    PRIMARY KEY,
                block_height INTEGER NOT NULL,
                body         TEXT    NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS wallets (
                address        TEXT PRIMARY KEY,
                balance        TEXT NOT NULL,
                total_received TEXT NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS ledger_effects (
                effect_key   TEXT    PRIMARY KEY,
                address      TEXT    NOT NULL,
                block_height INTEGER NOT NULL
            );",
            "CREATE INDEX IF NOT EXISTS idx_transactions_height ON transactions (block_height);",
        ];
        for sql in statements {
            sqlx::query(sql).execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }

    fn wallet_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Wallet, IndexerError> {
        let balance: String = row.get("balance");
        let received: String = row.get("total_received");
        Ok(Wallet {
            address: row.get("address"),
            balance: balance.parse().map_err(db_err)?,
            total_received: received.parse().map_err(db_err)?,
        })
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn last_height(&self) -> Result<Option<u64>, IndexerError> {
        let row = sqlx::query("SELECT MAX(height) AS height FROM blocks")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let height: Option<i64> = row.get("height");
        Ok(height.map(|h| h as u64))
    }

    async fn block_by_height(&self, height: u64) -> Result<Option<Block>, IndexerError> {
        let row = sqlx::query("SELECT body FROM blocks WHERE height = ?")
            .bind(height as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| decode(&r.get::<String, _>("body"))).transpose()
    }

    async fn block_by_id(&self, id: &str) -> Result<Option<Block>, IndexerError> {
        let row = sqlx::query("SELECT body FROM blocks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| decode(&r.get::<String, _>("body"))).transpose()
    }

    async fn recent_blocks(&self, limit: usize) -> Result<Vec<Block>, IndexerError> {
        let rows = sqlx::query("SELECT body FROM blocks ORDER BY height DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(|r| decode(&r.get::<String, _>("body")))
            .collect()
    }

    async fn blocks_in_range(&self, from: u64, to: u64) -> Result<Vec<Block>, IndexerError> {
        let rows = sqlx::query(
            "SELECT body FROM blocks WHERE height >= ? AND height <= ? ORDER BY height ASC",
        )
        .bind(from as i64)
        .bind(to as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|r| decode(&r.get::<String, _>("body")))
            .collect()
    }

    async fn transaction(&self, id: &str) -> Result<Option<Transaction>, IndexerError> {
        let row = sqlx::query("SELECT body FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| decode(&r.get::<String, _>("body"))).transpose()
    }

    async fn has_transaction(&self, id: &str) -> Result<bool, IndexerError> {
        let row = sqlx::query("SELECT 1 FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn wallet(&self, address: &str) -> Result<Option<Wallet>, IndexerError> {
        let row = sqlx::query(
            "SELECT address, balance, total_received FROM wallets WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(Self::wallet_from_row).transpose()
    }

    async fn ensure_wallet(&self, address: &str) -> Result<(), IndexerError> {
        if address.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT OR IGNORE INTO wallets (address, balance, total_received) VALUES (?, '0', '0')",
        )
        .bind(address)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn commit_block(&self, commit: BlockCommit) -> Result<(), IndexerError> {
        let height = commit.height();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let existing = sqlx::query("SELECT id FROM blocks WHERE height = ?")
            .bind(height as i64)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if let Some(row) = existing {
            let id: String = row.get("id");
            if id == commit.block.id {
                return Ok(());
            }
            return Err(IndexerError::Storage(format!(
                "height {height} already holds block {id}, refusing {}",
                commit.block.id
            )));
        }

        for address in &commit.touched {
            sqlx::query(
                "INSERT OR IGNORE INTO wallets (address, balance, total_received) VALUES (?, '0', '0')",
            )
            .bind(address)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        for effect in &commit.effects {
            let claimed = sqlx::query(
                "INSERT OR IGNORE INTO ledger_effects (effect_key, address, block_height) VALUES (?, ?, ?)",
            )
            .bind(&effect.key)
            .bind(&effect.address)
            .bind(height as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            if claimed.rows_affected() == 0 {
                debug!(key = %effect.key, "balance effect already applied");
                continue;
            }

            let row = sqlx::query(
                "SELECT address, balance, total_received FROM wallets WHERE address = ?",
            )
            .bind(&effect.address)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
            let mut wallet = match row {
                Some(r) => Self::wallet_from_row(&r)?,
                None => Wallet::empty(effect.address.as_str()),
            };
            effect.apply_to(&mut wallet)?;

            sqlx::query(
                "INSERT OR REPLACE INTO wallets (address, balance, total_received) VALUES (?, ?, ?)",
            )
            .bind(&wallet.address)
            .bind(wallet.balance.to_string())
            .bind(wallet.total_received.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        for t in &commit.transactions {
            let body = serde_json::to_string(t).map_err(db_err)?;
            sqlx::query(
                "INSERT OR IGNORE INTO transactions (id, block_height, body) VALUES (?, ?, ?)",
            )
            .bind(&t.id)
            .bind(t.block.height as i64)
            .bind(&body)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let body = serde_json::to_string(&commit.block).map_err(db_err)?;
        sqlx::query("INSERT INTO blocks (id, height, timestamp, body) VALUES (?, ?, ?, ?)")
            .bind(&commit.block.id)
            .bind(height as i64)
            .bind(commit.block.timestamp as i64)
            .bind(&body)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        debug!(
            height,
            id = %commit.block.id,
            transactions = commit.transactions.len(),
            effects = commit.effects.len(),
            "block committed"
        );
        Ok(())
    }

    async fn block_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM blocks")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    async fn transaction_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM transactions")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
