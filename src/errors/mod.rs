pub mod types;

pub use types::{EngineError, EngineResult};
