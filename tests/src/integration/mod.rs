//! # Integration Flows
//!
//! End-to-end scenarios across mv-01 (block store), mv-02 (metadata catalog)
//! and mv-03 (cluster).

pub mod flows;
