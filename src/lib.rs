//! csvdb - an in-memory, CSV-backed table store
//!
//! This crate provides:
//! - CSV tables with per-row locking, loaded on demand into a shared cache
//! - A small SQL-like statement language (select, update, save)
//! - Blocking `WAIT` queries that park until an update makes them match
//! - A bounded-concurrency HTTP/1.1 connection server

pub mod error;
pub mod server;
pub mod sql;
pub mod storage;
