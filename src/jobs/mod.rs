//! Background Jobs Module
//!
//! Jobs registered with the job scheduler service. Each job takes a
//! `JobContext` and returns a `JobResult`; scheduling, overlap protection and
//! run bookkeeping live in `services::job_scheduler_service`.
//!
//! # Available Jobs
//!
//! - `quote_ingest_job` - waits for a quote file in the bucket, then loads it
//!   into the quote table
//!
//! Task-level retries (`task_retry`) re-run a failed task from scratch; there
//! is no checkpoint between steps, so a retried load lists and validates again.

pub mod quote_ingest_job;
pub mod task_retry;
