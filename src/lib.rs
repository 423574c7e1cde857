//! Staged-concurrency HTTP load generator.
//!
//! A schedule of (duration, target) stages drives a pool of virtual users,
//! each repeatedly executing the workload and recording one check result per
//! iteration. Outcomes are aggregated into a summary when the run ends.

pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod schedule;
pub mod shutdown;
pub mod workload;
