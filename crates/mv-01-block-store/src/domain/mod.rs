//! # Domain Layer
//!
//! Pure block-store logic: on-disk layout, index entries, the transfer frame
//! and error types. No I/O happens here.

pub mod errors;
pub mod index;
pub mod layout;
pub mod transfer;
