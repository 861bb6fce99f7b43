//! Integration tests for fleetsnap
//!
//! These tests drive the collector, applier and binary end to end against
//! the in-memory cluster and temporary snapshot directories.

#[path = "../common/mod.rs"]
pub mod common;

pub mod backup_flow;
pub mod cli;
pub mod restore_flow;
