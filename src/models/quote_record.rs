use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

// A persisted row of the quote table. Column names are the warehouse's.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuoteRecord {
    pub id: i32,
    #[sqlx(rename = "valor")]
    pub value: Option<BigDecimal>,
    #[sqlx(rename = "data_referencia")]
    pub reference_time: Option<NaiveDateTime>,
    #[sqlx(rename = "data_ingestao")]
    pub ingested_time: Option<NaiveDateTime>,
}
