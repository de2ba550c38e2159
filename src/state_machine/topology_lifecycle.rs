// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Lifecycle State Machine
//!
//! Phases of one provisioning run.
//!
//! # States
//!
//! - Idle: nothing requested yet
//! - NodesRequested: node creation requests are being issued
//! - NodesResolving: waiting on the node identifiers
//! - PoliciesComposing: firewall and load balancer in flight
//! - Done: topology exported (terminal)
//! - Failed: run stopped on its first fatal error (terminal)
//!
//! # Inputs
//!
//! - RequestNodes: Idle → NodesRequested
//! - AwaitIdentifiers: NodesRequested → NodesResolving
//! - ComposePolicies: NodesResolving → PoliciesComposing
//! - Complete: PoliciesComposing → Done
//! - Fail: any non-terminal phase → Failed

use serde::Serialize;
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

/// Phase of a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TopologyPhase {
    Idle,
    NodesRequested,
    NodesResolving,
    PoliciesComposing,
    Done,
    Failed,
}

impl TopologyPhase {
    /// Whether the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, TopologyPhase::Done | TopologyPhase::Failed)
    }
}

impl fmt::Display for TopologyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lifecycle input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhaseInput {
    RequestNodes,
    AwaitIdentifiers,
    ComposePolicies,
    Complete,
    Fail,
}

impl StateMachine for TopologyPhase {
    type Input = PhaseInput;
    type Output = ();

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use PhaseInput::*;
        use TopologyPhase::*;

        match (self, input) {
            (Done | Failed, _) => Err(TransitionError::Terminal(self.to_string())),

            (Idle, RequestNodes) => Ok((NodesRequested, ())),
            (NodesRequested, AwaitIdentifiers) => Ok((NodesResolving, ())),
            (NodesResolving, ComposePolicies) => Ok((PoliciesComposing, ())),
            (PoliciesComposing, Complete) => Ok((Done, ())),
            (_, Fail) => Ok((Failed, ())),

            (from, input) => Err(TransitionError::InvalidTransition {
                from: from.to_string(),
                to: format!("{:?}", input),
            }),
        }
    }

    fn valid_inputs(&self) -> Vec<Self::Input> {
        use PhaseInput::*;
        use TopologyPhase::*;

        match self {
            Idle => vec![RequestNodes, Fail],
            NodesRequested => vec![AwaitIdentifiers, Fail],
            NodesResolving => vec![ComposePolicies, Fail],
            PoliciesComposing => vec![Complete, Fail],
            Done | Failed => vec![],
        }
    }
}
