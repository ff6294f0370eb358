//! Statement processing
//!
//! This module provides:
//! - `parser`: statement lexer and parser
//! - `types`: row values, comparators and filters
//! - `executor`: select and update execution, including the wait/retry loop
//! - `engine`: the query engine tying the parser, cache and executors together

pub mod engine;
pub mod executor;
pub mod parser;
pub mod types;
