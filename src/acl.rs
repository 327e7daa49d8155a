//! Guards: boolean match expressions over a packet, and the named ACLs they may call.
//!
//! A guard can be evaluated against one concrete packet ([`GuardContext::matches`]) or turned into
//! the set of all packets it accepts ([`GuardContext::to_packet_set`]). The two agree on every
//! packet whose ports are present exactly when its protocol is TCP or UDP.

use crate::bdd::{Bdd, HeaderSpace};
use crate::error::GuardError;
use crate::header::{IpField, IpProtocol, Packet, PortField, PortRange};
use crate::ip_space::{IpSpace, NamedIpSpaces};
use crate::packet_set::PacketSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchExpr {
    True,
    False,
    SrcIp(IpSpace),
    DstIp(IpSpace),
    SrcPort(PortRange),
    DstPort(PortRange),
    Protocol(IpProtocol),
    SrcInterface(Vec<String>),
    PermittedByAcl(String),
    Not(Box<MatchExpr>),
    And(Vec<MatchExpr>),
    Or(Vec<MatchExpr>),
}

impl MatchExpr {
    pub fn dst_ip(space: IpSpace) -> Self {
        MatchExpr::DstIp(space)
    }
    pub fn src_ip(space: IpSpace) -> Self {
        MatchExpr::SrcIp(space)
    }
    pub fn dst_port(range: PortRange) -> Self {
        MatchExpr::DstPort(range)
    }
    pub fn src_port(range: PortRange) -> Self {
        MatchExpr::SrcPort(range)
    }
    pub fn protocol(protocol: IpProtocol) -> Self {
        MatchExpr::Protocol(protocol)
    }
    pub fn src_interface(names: &[&str]) -> Self {
        MatchExpr::SrcInterface(names.iter().map(|n| n.to_string()).collect())
    }
    pub fn permitted_by(acl: &str) -> Self {
        MatchExpr::PermittedByAcl(acl.to_string())
    }
    pub fn not(e: MatchExpr) -> Self {
        MatchExpr::Not(Box::new(e))
    }
    pub fn and(es: Vec<MatchExpr>) -> Self {
        MatchExpr::And(es)
    }
    pub fn or(es: Vec<MatchExpr>) -> Self {
        MatchExpr::Or(es)
    }
}

impl fmt::Display for MatchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchExpr::True => write!(f, "true"),
            MatchExpr::False => write!(f, "false"),
            MatchExpr::SrcIp(space) => write!(f, "srcIp in {:?}", space),
            MatchExpr::DstIp(space) => write!(f, "dstIp in {:?}", space),
            MatchExpr::SrcPort(range) => write!(f, "srcPort in {}", range),
            MatchExpr::DstPort(range) => write!(f, "dstPort in {}", range),
            MatchExpr::Protocol(p) => write!(f, "proto == {}", p.number()),
            MatchExpr::SrcInterface(names) => write!(f, "srcInterface in [{}]", names.join(", ")),
            MatchExpr::PermittedByAcl(name) => write!(f, "permittedBy({})", name),
            MatchExpr::Not(e) => write!(f, "!{}", e),
            MatchExpr::And(es) => write_joined(f, es, " & ", "true"),
            MatchExpr::Or(es) => write_joined(f, es, " | ", "false"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, es: &[MatchExpr], sep: &str, unit: &str) -> fmt::Result {
    if es.is_empty() {
        return write!(f, "{}", unit);
    }
    write!(f, "(")?;
    for (i, e) in es.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", e)?;
    }
    write!(f, ")")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineAction {
    Permit,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclLine {
    pub action: LineAction,
    pub matches: MatchExpr,
}

/// An ordered list of lines. The first matching line decides; a packet matching no line is denied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Acl {
    pub lines: Vec<AclLine>,
}

impl Acl {
    pub fn permit(mut self, matches: MatchExpr) -> Self {
        self.lines.push(AclLine {
            action: LineAction::Permit,
            matches,
        });
        self
    }

    pub fn deny(mut self, matches: MatchExpr) -> Self {
        self.lines.push(AclLine {
            action: LineAction::Deny,
            matches,
        });
        self
    }
}

pub type NamedAcls = BTreeMap<String, Acl>;

/// Everything a guard may refer to besides the packet itself.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub acls: &'a NamedAcls,
    pub ip_spaces: &'a NamedIpSpaces,
    pub src_interface: Option<&'a str>,
}

impl<'a> GuardContext<'a> {
    pub fn new(acls: &'a NamedAcls, ip_spaces: &'a NamedIpSpaces) -> Self {
        GuardContext {
            acls,
            ip_spaces,
            src_interface: None,
        }
    }

    pub fn with_src_interface(mut self, interface: &'a str) -> Self {
        self.src_interface = Some(interface);
        self
    }

    pub fn matches(&self, expr: &MatchExpr, packet: &Packet) -> Result<bool, GuardError> {
        self.matches_in(expr, packet, &mut vec![])
    }

    fn matches_in(
        &self,
        expr: &MatchExpr,
        packet: &Packet,
        visiting: &mut Vec<&'a str>,
    ) -> Result<bool, GuardError> {
        match expr {
            MatchExpr::True => Ok(true),
            MatchExpr::False => Ok(false),
            MatchExpr::SrcIp(space) => space.contains(packet.src_ip, self.ip_spaces),
            MatchExpr::DstIp(space) => space.contains(packet.dst_ip, self.ip_spaces),
            MatchExpr::SrcPort(range) => Ok(packet.src_port.is_some_and(|p| range.contains(p))),
            MatchExpr::DstPort(range) => Ok(packet.dst_port.is_some_and(|p| range.contains(p))),
            MatchExpr::Protocol(p) => Ok(packet.ip_protocol == *p),
            MatchExpr::SrcInterface(names) => Ok(self
                .src_interface
                .is_some_and(|iface| names.iter().any(|n| n == iface))),
            MatchExpr::PermittedByAcl(name) => {
                let (name, acl) = self.resolve_acl(name, visiting)?;
                visiting.push(name);
                let mut action = LineAction::Deny;
                for line in &acl.lines {
                    if self.matches_in(&line.matches, packet, visiting)? {
                        action = line.action;
                        break;
                    }
                }
                visiting.pop();
                Ok(action == LineAction::Permit)
            }
            MatchExpr::Not(e) => Ok(!self.matches_in(e, packet, visiting)?),
            MatchExpr::And(es) => {
                for e in es {
                    if !self.matches_in(e, packet, visiting)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            MatchExpr::Or(es) => {
                for e in es {
                    if self.matches_in(e, packet, visiting)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// The set of all packets `expr` accepts in this context.
    pub fn to_packet_set(&self, expr: &MatchExpr, hs: &HeaderSpace) -> Result<Bdd, GuardError> {
        self.to_packet_set_in(expr, hs, &mut vec![])
    }

    fn to_packet_set_in(
        &self,
        expr: &MatchExpr,
        hs: &HeaderSpace,
        visiting: &mut Vec<&'a str>,
    ) -> Result<Bdd, GuardError> {
        match expr {
            MatchExpr::True => Ok(hs.universe()),
            MatchExpr::False => Ok(hs.empty()),
            MatchExpr::SrcIp(space) => space.to_packet_set(IpField::Source, hs, self.ip_spaces),
            MatchExpr::DstIp(space) => {
                space.to_packet_set(IpField::Destination, hs, self.ip_spaces)
            }
            MatchExpr::SrcPort(range) => {
                Ok(hs.port_range(PortField::Source, *range).and(&port_carrying(hs)))
            }
            MatchExpr::DstPort(range) => {
                Ok(hs.port_range(PortField::Destination, *range).and(&port_carrying(hs)))
            }
            MatchExpr::Protocol(p) => Ok(hs.protocol(*p)),
            MatchExpr::SrcInterface(names) => {
                let hit = self
                    .src_interface
                    .is_some_and(|iface| names.iter().any(|n| n == iface));
                Ok(if hit { hs.universe() } else { hs.empty() })
            }
            MatchExpr::PermittedByAcl(name) => {
                let (name, acl) = self.resolve_acl(name, visiting)?;
                visiting.push(name);
                let mut permitted = hs.empty();
                let mut remaining = hs.universe();
                for line in &acl.lines {
                    let m = self.to_packet_set_in(&line.matches, hs, visiting)?;
                    if line.action == LineAction::Permit {
                        permitted = permitted.or(&remaining.and(&m));
                    }
                    remaining = remaining.difference(&m);
                }
                visiting.pop();
                Ok(permitted)
            }
            MatchExpr::Not(e) => Ok(self.to_packet_set_in(e, hs, visiting)?.not()),
            MatchExpr::And(es) => {
                let mut acc = hs.universe();
                for e in es {
                    acc = acc.and(&self.to_packet_set_in(e, hs, visiting)?);
                }
                Ok(acc)
            }
            MatchExpr::Or(es) => {
                let mut acc = hs.empty();
                for e in es {
                    acc = acc.or(&self.to_packet_set_in(e, hs, visiting)?);
                }
                Ok(acc)
            }
        }
    }

    fn resolve_acl(&self, name: &str, visiting: &[&str]) -> Result<(&'a str, &'a Acl), GuardError> {
        if visiting.contains(&name) {
            return Err(GuardError::CyclicAclReference(name.to_string()));
        }
        self.acls
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| GuardError::UndefinedAcl(name.to_string()))
    }
}

fn port_carrying(hs: &HeaderSpace) -> Bdd {
    hs.protocol(IpProtocol::Tcp).or(&hs.protocol(IpProtocol::Udp))
}
