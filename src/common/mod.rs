//! Common types, traits, and error definitions for lti_mpc
//!
//! This module provides the plant description, horizon parameters, the
//! solver interface and the crate error type.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
