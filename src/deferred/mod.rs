// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Values
//!
//! Values that are declared eagerly but resolved later by the remote
//! provisioning backend: a resource identifier, a load balancer address, a
//! certificate PEM.
//!
//! # Core Concepts
//!
//! ## Deferred<T>
//!
//! A shareable handle on a value that will resolve exactly once, either to
//! `Ok(T)` or to a [`BackendError`](crate::errors::BackendError). Every clone
//! observes the same resolution.
//!
//! ```text
//! Time:  ──────────────────────────→
//! Value:   pending ········ ● resolved
//! ```
//!
//! ## Continuations
//!
//! Dependent computation is attached with [`Deferred::map`],
//! [`Deferred::try_map`] and [`Deferred::and_then`]. Attaching never blocks;
//! the derived value resolves as soon as its input does, driven by its own
//! task rather than by whoever awaits it.
//!
//! ## Joins
//!
//! - [`join_all`] - every input must succeed, first failure wins
//! - [`join_settled`] - keep every outcome, in input order
//!
//! # Example
//!
//! ```rust
//! use cluster_topology::deferred::{join_all, Deferred};
//!
//! # tokio_test::block_on(async {
//! let ids = vec![
//!     Deferred::resolved("101".to_string()),
//!     Deferred::resolved("102".to_string()),
//! ];
//! let lengths = join_all(ids).map(|ids| ids.len());
//! assert_eq!(lengths.resolve().await, Ok(2));
//! # });
//! ```

pub mod combinators;
pub mod value;

pub use combinators::{join_all, join_settled};
pub use value::{Deferred, Resolution};
