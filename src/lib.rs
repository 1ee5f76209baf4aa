//! Hourly currency-quote ingestion: wait for a quote file in an S3 bucket, then
//! load the quote it carries into a Postgres table.

pub mod app;
pub mod config;
pub mod db;
pub mod errors;
pub mod external;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
