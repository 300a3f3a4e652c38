//! colcrypt - call-graph powered sensitive-column encryption refactoring
//!
//! The engine consumes structured method/call/SQL facts from an external
//! parsing front end, builds a call graph, walks it backward from every
//! access of a configured sensitive column to the network-facing entry
//! points, and then drives a pluggable patch generator to rewrite each
//! impacted file - with exact-match patch validation, structural
//! verification, bounded retries, and byte-exact rollback.

pub mod analyzer;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod facts;
pub mod generator;
pub mod graph;
pub mod models;
pub mod patcher;
pub mod reporters;
pub mod tracker;
pub mod verify;
