// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants
//!
//! Address prefixes, port ranges and firewall rules. Serialised forms match
//! what the backend expects in a firewall creation request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;

use super::identifier::NodeId;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid address prefix '{0}'")]
    InvalidPrefix(String),

    #[error("Prefix length {0} exceeds 32")]
    PrefixTooLong(u8),

    #[error("Invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("Rule '{label}' uses {protocol} and must {requirement}")]
    InvalidRule {
        label: String,
        protocol: Protocol,
        requirement: &'static str,
    },
}

/// IPv4 address prefix, `a.b.c.d/len`
///
/// A bare address is a `/32`. The network part is kept as written, so
/// `192.168.1.10/24` round-trips unchanged.
///
/// ```rust
/// use cluster_topology::domain::AddressPrefix;
///
/// let nodes: AddressPrefix = "192.168.0.0/16".parse().unwrap();
/// assert_eq!(nodes.prefix_len(), 16);
/// assert!(nodes.contains("192.168.4.7".parse().unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AddressPrefix {
    network: Ipv4Addr,
    len: u8,
}

impl AddressPrefix {
    /// `0.0.0.0/0`
    pub const ANY: AddressPrefix = AddressPrefix {
        network: Ipv4Addr::UNSPECIFIED,
        len: 0,
    };

    pub fn new(network: Ipv4Addr, len: u8) -> Result<Self, NetworkError> {
        if len > 32 {
            return Err(NetworkError::PrefixTooLong(len));
        }
        Ok(Self { network, len })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    fn mask(&self) -> u32 {
        u32::MAX.checked_shl(32 - u32::from(self.len)).unwrap_or(0)
    }

    /// Whether `ip` falls inside the prefix; IPv6 never does
    pub fn contains(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(ip) => u32::from(self.network) & self.mask() == u32::from(ip) & self.mask(),
            IpAddr::V6(_) => false,
        }
    }
}

impl fmt::Display for AddressPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

impl FromStr for AddressPrefix {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetworkError::InvalidPrefix(s.to_string());
        let (network, len) = match s.split_once('/') {
            Some((network, len)) => (network, len.parse::<u8>().map_err(|_| invalid())?),
            None => (s, 32),
        };
        let network = network.parse::<Ipv4Addr>().map_err(|_| invalid())?;
        Self::new(network, len)
    }
}

impl From<AddressPrefix> for String {
    fn from(value: AddressPrefix) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for AddressPrefix {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Inclusive port range
///
/// Serialised as `"22"` for a single port or `"1-65535"` for a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Every port
    pub const ALL: PortRange = PortRange {
        start: 1,
        end: 65535,
    };

    /// A single port
    pub fn single(port: u16) -> Result<Self, NetworkError> {
        Self::span(port, port)
    }

    /// An inclusive span of ports
    pub fn span(start: u16, end: u16) -> Result<Self, NetworkError> {
        if start == 0 || start > end {
            return Err(NetworkError::InvalidPortRange(format!("{start}-{end}")));
        }
        Ok(Self { start, end })
    }

    /// First port
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Last port
    pub fn end(&self) -> u16 {
        self.end
    }

    /// Whether `port` is inside the range
    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for PortRange {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |p: &str| {
            p.parse::<u16>()
                .map_err(|_| NetworkError::InvalidPortRange(s.to_string()))
        };

        match s.split_once('-') {
            Some((start, end)) => Self::span(parse(start)?, parse(end)?),
            None => Self::single(parse(s)?),
        }
    }
}

impl From<PortRange> for String {
    fn from(value: PortRange) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PortRange {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Transport protocol matched by a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    /// Whether rules for this protocol carry ports
    pub fn uses_ports(&self) -> bool {
        !matches!(self, Self::Icmp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
            Self::Icmp => write!(f, "ICMP"),
        }
    }
}

/// Verdict for matching traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    Accept,
    Drop,
}

/// Source (inbound) or destination (outbound) prefixes of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAddresses {
    pub ipv4: Vec<AddressPrefix>,
}

/// One firewall rule
///
/// Invariant: TCP and UDP rules carry a port range, ICMP rules do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub label: String,
    pub action: RuleAction,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ports: Option<PortRange>,
    pub addresses: RuleAddresses,
}

impl FirewallRule {
    /// Create a validated rule
    pub fn new(
        label: impl Into<String>,
        action: RuleAction,
        protocol: Protocol,
        ports: Option<PortRange>,
        ipv4: Vec<AddressPrefix>,
    ) -> Result<Self, NetworkError> {
        let label = label.into();

        match (protocol.uses_ports(), ports.is_some()) {
            (true, false) => {
                return Err(NetworkError::InvalidRule {
                    label,
                    protocol,
                    requirement: "specify a port range",
                })
            }
            (false, true) => {
                return Err(NetworkError::InvalidRule {
                    label,
                    protocol,
                    requirement: "not specify ports",
                })
            }
            _ => {}
        }

        Ok(Self {
            label,
            action,
            protocol,
            ports,
            addresses: RuleAddresses { ipv4 },
        })
    }

    /// Whether this rule matches traffic from/to `ip` on `protocol`/`port`
    pub fn matches(&self, protocol: Protocol, ip: IpAddr, port: Option<u16>) -> bool {
        if self.protocol != protocol {
            return false;
        }
        let port_ok = match (self.ports, port) {
            (Some(range), Some(port)) => range.contains(port),
            (None, _) => true,
            (Some(_), None) => false,
        };
        port_ok && self.addresses.ipv4.iter().any(|net| net.contains(ip))
    }
}

/// Ordered rule sets plus default verdicts
///
/// Rules are evaluated first-match-wins by the backend; order is preserved
/// exactly as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRules {
    pub inbound_policy: RuleAction,
    pub outbound_policy: RuleAction,
    pub inbound: Vec<FirewallRule>,
    pub outbound: Vec<FirewallRule>,
}

impl FirewallRules {
    /// Verdict for inbound traffic, first matching rule wins
    pub fn inbound_verdict(&self, protocol: Protocol, source: IpAddr, port: Option<u16>) -> RuleAction {
        Self::verdict(&self.inbound, self.inbound_policy, protocol, source, port)
    }

    /// Verdict for outbound traffic, first matching rule wins
    pub fn outbound_verdict(
        &self,
        protocol: Protocol,
        destination: IpAddr,
        port: Option<u16>,
    ) -> RuleAction {
        Self::verdict(&self.outbound, self.outbound_policy, protocol, destination, port)
    }

    fn verdict(
        rules: &[FirewallRule],
        default: RuleAction,
        protocol: Protocol,
        ip: IpAddr,
        port: Option<u16>,
    ) -> RuleAction {
        rules
            .iter()
            .find(|rule| rule.matches(protocol, ip, port))
            .map(|rule| rule.action)
            .unwrap_or(default)
    }
}

/// Devices a firewall is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallDevices {
    pub linodes: Vec<NodeId>,
}

/// Firewall policy as submitted to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallPolicy {
    pub label: String,
    pub tags: Vec<String>,
    pub rules: FirewallRules,
    pub devices: FirewallDevices,
}

impl FirewallPolicy {
    /// Member node identifiers
    pub fn members(&self) -> &[NodeId] {
        &self.devices.linodes
    }
}
