//! Prompt construction for the oracle
//!
//! Only the fixer side lives here: the initial task prompt is passed through
//! to the oracle unchanged.

mod fix;

pub use fix::{FixRequestBuilder, NO_USABLE_OUTPUT};
