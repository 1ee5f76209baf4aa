mod job_run;
mod quote;
mod quote_record;

pub use job_run::{JobInfo, JobRun, JobStats, JobStatus};
pub use quote::{Quote, QuoteObject, QuotePayload, VALUE_SCALE};
pub use quote_record::QuoteRecord;
