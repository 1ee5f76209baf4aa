use serde::Serialize;
use tracing::{info, warn};

use crate::db::QuoteRepository;
use crate::errors::AppError;
use crate::external::ObjectSource;
use crate::models::{Quote, QuotePayload};

/// What a processor run did. Only `Inserted` writes a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    NoObjects,
    EmptyPayload { key: String },
    Inserted { key: String, id: i32, quote: Quote },
}

impl ProcessOutcome {
    pub fn rows_written(&self) -> i32 {
        match self {
            ProcessOutcome::Inserted { .. } => 1,
            _ => 0,
        }
    }
}

/// Load the last listed object of the bucket into the quote table.
///
/// 1. list the bucket (empty bucket: nothing to do)
/// 2. take the last key in listing order; no sort is applied
/// 3. decode the payload (empty list: nothing to do)
/// 4. extract and validate the quote for `currency_pair`
/// 5. create the table if needed and insert one row
///
/// Errors are returned untouched; retrying is the job runner's business.
pub async fn process_latest(
    source: &dyn ObjectSource,
    repository: &dyn QuoteRepository,
    currency_pair: &str,
) -> Result<ProcessOutcome, AppError> {
    let keys = source.list_keys().await?;

    let Some(key) = keys.last() else {
        warn!("No objects found in bucket {}", source.bucket());
        return Ok(ProcessOutcome::NoObjects);
    };
    info!("📄 Processing s3://{}/{}", source.bucket(), key);

    let bytes = source.read_key(key).await?;
    let payload = QuotePayload::decode(&bytes)?;

    let Some(object) = payload.primary() else {
        warn!("{} contains an empty JSON list", key);
        return Ok(ProcessOutcome::EmptyPayload { key: key.clone() });
    };

    let quote = Quote::extract(object, currency_pair).map_err(|e| {
        if let AppError::Validation { content, .. } = &e {
            warn!("Invalid quote in {}, content received: {}", key, content);
        }
        e
    })?;

    info!(
        "💱 {} quoted at {} on {}",
        quote.pair, quote.value, quote.reference_time
    );

    repository.ensure_table().await?;
    let id = repository.insert(&quote).await?;

    info!("✅ Inserted quote row {} from {}", id, key);
    Ok(ProcessOutcome::Inserted {
        key: key.clone(),
        id,
        quote,
    })
}
