//! lotline-core: reconciliation engine for a ledger-backed supply chain.
//!
//! The ledger is the source of truth for who holds each item and what state
//! it is in. This crate rebuilds a local read model from it: projected state
//! per item plus a deduplicated, ledger-timestamped history.
//!
//! Layers, leaves first:
//!
//! - [`model`]: status/role lexicon, identities, items, history entries.
//! - [`event`]: typed ledger events and their normalization into entries.
//! - [`store`]: the deduplicating history store and its snapshot format.
//! - [`ledger`] / [`storage`]: the external collaborators, with in-process
//!   and network implementations.
//! - [`sync`]: replay, live notifications, targeted resync, write-then-resync.
//! - [`engine`]: the facade tying them together.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at module boundaries, `anyhow` for
//!   file I/O. Per-item problems during reconciliation are logged and counted,
//!   never propagated.
//! - **Logging**: `tracing` macros with structured fields.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod model;
pub mod storage;
pub mod store;
pub mod sync;

pub use engine::{Engine, resolver_from_config};
pub use error::ErrorCode;
