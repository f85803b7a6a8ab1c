//! Error handling for Aegis
//!
//! This module defines the crate-wide error type returned by every fallible
//! operation wrapped by the resilience patterns, together with the closed
//! [`ErrorKind`] discriminator used to drive retry allow-lists and record
//! classification.
//!
//! ## Error Categories
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Aegis Error Taxonomy                      │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Transient             │  Logic               │  Control      │
//! │  ┌─────────────────┐   │  ┌────────────────┐  │  ┌─────────┐  │
//! │  │ • Network       │   │  │ • Validation   │  │  │ • Open  │  │
//! │  │ • Timeout       │   │  │ • State        │  │  │ • Cancel│  │
//! │  │ • Operation     │   │  │ • Configuration│  │  └─────────┘  │
//! │  └─────────────────┘   │  └────────────────┘  │               │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Scope                 │  Internal                            │
//! │  • Component • Render  │  • Internal                          │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod constructors;
pub mod types;

#[cfg(test)]
mod tests;

pub use types::{AegisError, AegisResult, ErrorKind, Result};
