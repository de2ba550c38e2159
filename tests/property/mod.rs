// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module

mod identifiers;
mod node_batches;
