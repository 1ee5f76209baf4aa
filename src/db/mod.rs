pub mod job_run_queries;
pub mod quote_queries;
pub mod quote_repository;

pub use quote_repository::{InMemoryQuoteRepository, PgQuoteRepository, QuoteRepository};
