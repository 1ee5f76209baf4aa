pub mod object_source;

pub use object_source::{ObjectSource, ObjectStoreSource};
