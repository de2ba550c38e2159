// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machines
//!
//! A provisioning run moves through a fixed sequence of phases. The phase
//! logic is a pure `(state, input) -> state` function; [`Lifecycle`] wraps it
//! with a clock and an audit trail of every accepted step.
//!
//! ```text
//! Lifecycle ── step(input) ──> StateMachine::transition ──> Step { from, to, input, at }
//! ```
//!
//! # Example
//!
//! ```rust
//! use cluster_topology::state_machine::{Lifecycle, PhaseInput, StateMachine, TopologyPhase};
//!
//! let mut run = Lifecycle::new(TopologyPhase::Idle);
//! run.step(PhaseInput::RequestNodes).unwrap();
//! assert_eq!(run.state(), &TopologyPhase::NodesRequested);
//! assert!(run.step(PhaseInput::Complete).is_err());
//! assert_eq!(run.steps().len(), 1);
//! ```

pub mod topology_lifecycle;

pub use topology_lifecycle::{PhaseInput, TopologyPhase};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub type TransitionResult<S> = Result<S, TransitionError>;

/// Rejected transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} on {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{0} is terminal")]
    Terminal(String),
}

/// A pure state machine
///
/// `transition` must not touch anything outside `self`; the caller owns
/// every side effect that goes with a phase change.
pub trait StateMachine: Sized + Clone {
    type Input;
    type Output;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Inputs the current state accepts, when they can be listed
    fn valid_inputs(&self) -> Vec<Self::Input>
    where
        Self::Input: Clone,
    {
        Vec::new()
    }
}

/// One accepted step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub at: DateTime<Utc>,
}

/// A machine plus the steps it has taken
#[derive(Debug, Clone)]
pub struct Lifecycle<M: StateMachine> {
    state: M,
    steps: Vec<Step<M, M::Input>>,
}

impl<M: StateMachine> Lifecycle<M> {
    pub fn new(initial: M) -> Self {
        Self {
            state: initial,
            steps: Vec::new(),
        }
    }

    /// Apply `input` now
    pub fn step(&mut self, input: M::Input) -> TransitionResult<M::Output> {
        self.step_at(input, Utc::now())
    }

    /// Apply `input` with an explicit timestamp
    ///
    /// A rejected input leaves both the state and the steps untouched.
    pub fn step_at(&mut self, input: M::Input, at: DateTime<Utc>) -> TransitionResult<M::Output> {
        let (next, output) = self.state.transition(&input)?;
        let from = std::mem::replace(&mut self.state, next.clone());
        self.steps.push(Step {
            from,
            to: next,
            input,
            at,
        });
        Ok(output)
    }

    pub fn state(&self) -> &M {
        &self.state
    }

    pub fn steps(&self) -> &[Step<M, M::Input>] {
        &self.steps
    }
}
