// Copyright (c) 2025 - Cowboy AI, Inc.
//! Run orchestration

pub mod topology;

pub use topology::{outputs, TopologyOrchestrator};
