// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Identifier Coercion

use cluster_topology::composer::cluster_rules;
use cluster_topology::domain::{
    parse_identifier, CoercionPolicy, Diagnostics, IdentifierCoercion, Protocol, RuleAction,
    PLACEHOLDER_ID,
};
use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr};

proptest! {
    /// Any backend identifier parses back to itself
    #[test]
    fn prop_numeric_text_parses(id in any::<u64>()) {
        prop_assert_eq!(parse_identifier(&id.to_string()), Ok(id));
    }

    /// Text with a non-digit never parses
    #[test]
    fn prop_non_numeric_text_fails(prefix in "[0-9]{0,4}", bad in "[a-zA-Z_ -]", suffix in "[0-9a-z]{0,4}") {
        let text = format!("{prefix}{bad}{suffix}");
        prop_assert!(parse_identifier(&text).is_err());
    }

    /// Absorbing never fails and records exactly one diagnostic per bad identifier
    #[test]
    fn prop_absorb_never_fails(text in "\\PC{0,12}") {
        let diagnostics = Diagnostics::new();
        let coercion = IdentifierCoercion::new(CoercionPolicy::Absorb, diagnostics.clone());

        let converted = coercion.convert("worker-0", &text);
        match parse_identifier(&text) {
            Ok(id) => {
                prop_assert_eq!(converted, Ok(id));
                prop_assert!(diagnostics.is_empty());
            }
            Err(_) => {
                prop_assert_eq!(converted, Ok(PLACEHOLDER_ID));
                prop_assert_eq!(diagnostics.len(), 1);
            }
        }
    }

    /// Strict coercion fails exactly when parsing does
    #[test]
    fn prop_strict_matches_parse(text in "\\PC{0,12}") {
        let coercion = IdentifierCoercion::new(CoercionPolicy::Strict, Diagnostics::new());
        prop_assert_eq!(
            coercion.convert("worker-0", &text).is_ok(),
            parse_identifier(&text).is_ok()
        );
    }

    /// From the internet only SSH and the control plane get through over TCP
    #[test]
    fn prop_public_tcp_is_ssh_or_control_plane(port in 1u16..=65535, a in 1u8..=223, d in 1u8..=254) {
        prop_assume!(a != 10 && a != 192 && a != 127);
        let rules = cluster_rules().unwrap();
        let source = IpAddr::V4(Ipv4Addr::new(a, 51, 100, d));

        let expected = if port == 22 || port == 6443 { RuleAction::Accept } else { RuleAction::Drop };
        prop_assert_eq!(rules.inbound_verdict(Protocol::Tcp, source, Some(port)), expected);
        prop_assert_eq!(rules.inbound_verdict(Protocol::Udp, source, Some(port)), RuleAction::Drop);
    }
}
