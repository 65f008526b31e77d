//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestProvider, FEATURED_SOURCE};
//!
//! #[test]
//! fn test_insert_source() {
//!     let env = TestProvider::spawn();
//!     let address = env.add_source(FEATURED_SOURCE);
//!     assert_eq!(env.query_sources().len(), 1);
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::{artwork_values, drain_events, TestProvider};
