use sqlx::PgPool;
use tracing::{debug, error};

use crate::models::{Quote, QuoteRecord};

/// DDL for the quote table. `table` must already be a validated identifier.
pub fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id SERIAL PRIMARY KEY,
            valor DECIMAL(10, 4),
            data_referencia TIMESTAMP,
            data_ingestao TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#
    )
}

pub async fn ensure_table(pool: &PgPool, table: &str) -> Result<(), sqlx::Error> {
    sqlx::query(&create_table_sql(table))
        .execute(pool)
        .await
        .map_err(|e| {
            error!("Failed to create table {}: {}", table, e);
            e
        })?;
    debug!("Table {} is present", table);
    Ok(())
}

/// Insert one quote; `data_ingestao` is left to the column default.
pub async fn insert_quote(pool: &PgPool, table: &str, quote: &Quote) -> Result<i32, sqlx::Error> {
    let id: i32 = sqlx::query_scalar(&format!(
        "INSERT INTO {table} (valor, data_referencia) VALUES ($1, $2) RETURNING id"
    ))
    .bind(&quote.value)
    .bind(quote.reference_time)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        error!(
            "Failed to insert quote into {} (value: {}, reference: {}): {}",
            table, quote.value, quote.reference_time, e
        );
        e
    })?;

    Ok(id)
}

pub async fn fetch_recent(
    pool: &PgPool,
    table: &str,
    limit: i64,
) -> Result<Vec<QuoteRecord>, sqlx::Error> {
    sqlx::query_as::<_, QuoteRecord>(&format!(
        r#"
        SELECT id, valor, data_referencia, data_ingestao
        FROM {table}
        ORDER BY id DESC
        LIMIT $1
        "#
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql_is_idempotent_ddl() {
        let sql = create_table_sql("cotacao_dolar");
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS cotacao_dolar"));
        assert!(sql.contains("valor DECIMAL(10, 4)"));
        assert!(sql.contains("data_ingestao TIMESTAMP DEFAULT CURRENT_TIMESTAMP"));
    }
}
