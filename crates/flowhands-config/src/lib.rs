//! # flowhands Config
//!
//! Configuration for the flowhands automation core: browser connection,
//! settle delays and poll budgets, selector fallback chains, network
//! observation markers and the upstream API endpoints.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
