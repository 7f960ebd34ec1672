//! Shared test utilities for the vault agent crates.
//!
//! This crate provides:
//! - A scripted in-memory secret-store gateway
//! - An observer that records every lease event
//! - Proptest generators for leases, ratios and secrets
//! - JSON fixtures shaped like Vault HTTP responses

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
pub use mocks::{MockGateway, RecordingObserver};
