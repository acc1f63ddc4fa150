//! # MV-FS Test Suite
//!
//! Cross-crate flows that no single subsystem crate can exercise alone.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Block store + catalog + cluster choreography
//!     └── flows.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mv-tests
//! cargo test -p mv-tests integration::
//! ```

#![allow(dead_code)]

pub mod integration;
