pub mod result;
pub mod tracing;
