pub mod availability_watcher;
pub mod ingest_processor;
pub mod job_scheduler_service;
