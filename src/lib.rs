//! A unified query engine over heterogeneous log sources: local files and
//! shell commands, Kubernetes pods, Docker containers, SSH-accessed
//! hosts, Elasticsearch/Kibana, Splunk, and CloudWatch Logs.
//!
//! A query is a time window, a filter expression, an optional field
//! projection, and a size cap; the result is either a bounded, paged
//! vector of entries or a long-running follow stream, with uniform field
//! extraction and result shape across every backend.

pub mod adapters;
pub mod aggregator;
pub mod config;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod models;
pub mod reader;
pub mod shell_escape;
pub mod ssh;
pub mod translate;
pub mod util;

pub use engine::Engine;
pub use errors::{EngineError, EngineResult};
pub use models::{Entry, FieldValue, Query, Range};
