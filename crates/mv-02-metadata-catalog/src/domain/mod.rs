//! # Domain Layer
//!
//! Logical files, their reentrant lock, the persisted document shape and the
//! pure helpers (block planning, record conditions). No I/O happens here.

pub mod condition;
pub mod document;
pub mod errors;
pub mod lock;
pub mod logical_file;
pub(crate) mod owners;
pub mod planner;
pub mod report;
