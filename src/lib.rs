// src/lib.rs
//! Prometheus exporter for Pacemaker, Corosync, SBD and DRBD based HA clusters.
//!
//! Each [`collector`] shells out to the cluster tools on every scrape and
//! turns their output into labelled metrics; [`exposition`] encodes them in
//! the Prometheus text format and serves them over HTTP.

pub mod collector;
pub mod config;
pub mod error;
pub mod exposition;

pub use config::Config;
