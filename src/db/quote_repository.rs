use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sqlx::PgPool;

use crate::db::quote_queries;
use crate::errors::AppError;
use crate::models::{Quote, QuoteRecord};

/// Destination of validated quotes.
#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Create the destination table if it is absent. Safe to call every run.
    async fn ensure_table(&self) -> Result<(), AppError>;

    /// Insert one row and return its surrogate id.
    async fn insert(&self, quote: &Quote) -> Result<i32, AppError>;
}

pub struct PgQuoteRepository {
    pool: PgPool,
    table: String,
}

impl PgQuoteRepository {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl QuoteRepository for PgQuoteRepository {
    async fn ensure_table(&self) -> Result<(), AppError> {
        quote_queries::ensure_table(&self.pool, &self.table).await?;
        Ok(())
    }

    async fn insert(&self, quote: &Quote) -> Result<i32, AppError> {
        Ok(quote_queries::insert_quote(&self.pool, &self.table, quote).await?)
    }
}

/// Keeps rows in memory. Used for dry runs; nothing is written anywhere.
#[derive(Default)]
pub struct InMemoryQuoteRepository {
    created: Mutex<bool>,
    ensure_calls: AtomicUsize,
    rows: Mutex<Vec<QuoteRecord>>,
}

impl InMemoryQuoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_exists(&self) -> bool {
        *self.created.lock()
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub fn rows(&self) -> Vec<QuoteRecord> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn ensure_table(&self) -> Result<(), AppError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        *self.created.lock() = true;
        Ok(())
    }

    async fn insert(&self, quote: &Quote) -> Result<i32, AppError> {
        if !self.table_exists() {
            return Err(AppError::External("quote table does not exist".into()));
        }

        let mut rows = self.rows.lock();
        let id = rows.len() as i32 + 1;
        rows.push(QuoteRecord {
            id,
            value: Some(quote.value.clone()),
            reference_time: Some(quote.reference_time),
            ingested_time: Some(Utc::now().naive_utc()),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn quote(bid: &str) -> Quote {
        Quote {
            pair: "USDBRL".into(),
            value: BigDecimal::from_str(bid).unwrap(),
            reference_time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_ensure_table_twice_keeps_one_table() {
        let repo = InMemoryQuoteRepository::new();
        repo.ensure_table().await.unwrap();
        repo.ensure_table().await.unwrap();

        assert!(repo.table_exists());
        assert_eq!(repo.ensure_calls(), 2);
        assert!(repo.rows().is_empty());
    }

    #[tokio::test]
    async fn test_insert_requires_table() {
        let repo = InMemoryQuoteRepository::new();
        assert!(repo.insert(&quote("5.10")).await.is_err());
    }

    #[tokio::test]
    async fn test_same_quote_twice_is_two_rows() {
        let repo = InMemoryQuoteRepository::new();
        repo.ensure_table().await.unwrap();

        let first = repo.insert(&quote("5.10")).await.unwrap();
        let second = repo.insert(&quote("5.10")).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(repo.rows().len(), 2);
    }
}
