//! Concrete packet headers, and the bit layout they share with the symbolic header space.

use crate::error::PacketError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// IP protocol carried by a packet.
///
/// `{"other": 6}` deserializes to `Tcp`, so each protocol has exactly one representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "RawProtocol")]
pub enum IpProtocol {
    Icmp,
    Tcp,
    Udp,
    Other(u8),
}

impl IpProtocol {
    pub fn number(self) -> u8 {
        match self {
            IpProtocol::Icmp => 1,
            IpProtocol::Tcp => 6,
            IpProtocol::Udp => 17,
            IpProtocol::Other(n) => n,
        }
    }

    /// Normalises well-known protocol numbers, so `from_number(6)` is `Tcp`.
    pub fn from_number(n: u8) -> Self {
        match n {
            1 => IpProtocol::Icmp,
            6 => IpProtocol::Tcp,
            17 => IpProtocol::Udp,
            n => IpProtocol::Other(n),
        }
    }

    /// Only TCP and UDP packets carry ports.
    pub fn has_ports(self) -> bool {
        matches!(self, IpProtocol::Tcp | IpProtocol::Udp)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawProtocol {
    Icmp,
    Tcp,
    Udp,
    Other(u8),
}

impl From<RawProtocol> for IpProtocol {
    fn from(raw: RawProtocol) -> Self {
        match raw {
            RawProtocol::Icmp => IpProtocol::Icmp,
            RawProtocol::Tcp => IpProtocol::Tcp,
            RawProtocol::Udp => IpProtocol::Udp,
            RawProtocol::Other(n) => IpProtocol::from_number(n),
        }
    }
}

/// Which address of a packet an IP rewrite targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpField {
    Source,
    Destination,
}

/// Which port of a packet a port rewrite targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortField {
    Source,
    Destination,
}

/// Header fields that can show up in a transformation trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlowField {
    #[serde(rename = "srcIp")]
    SrcIp,
    #[serde(rename = "dstIp")]
    DstIp,
    #[serde(rename = "srcPort")]
    SrcPort,
    #[serde(rename = "dstPort")]
    DstPort,
}

impl From<IpField> for FlowField {
    fn from(field: IpField) -> Self {
        match field {
            IpField::Source => FlowField::SrcIp,
            IpField::Destination => FlowField::DstIp,
        }
    }
}

impl From<PortField> for FlowField {
    fn from(field: PortField) -> Self {
        match field {
            PortField::Source => FlowField::SrcPort,
            PortField::Destination => FlowField::DstPort,
        }
    }
}

impl fmt::Display for FlowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowField::SrcIp => "srcIp",
            FlowField::DstIp => "dstIp",
            FlowField::SrcPort => "srcPort",
            FlowField::DstPort => "dstPort",
        };
        write!(f, "{}", name)
    }
}

/// The value of a [`FlowField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Ip(Ipv4Addr),
    Port(u16),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Ip(ip) => write!(f, "{}", ip),
            FieldValue::Port(port) => write!(f, "{}", port),
        }
    }
}

/// An inclusive range of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        PortRange { start, end }
    }

    pub fn single(port: u16) -> Self {
        PortRange { start: port, end: port }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.end
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

/// The fields of the symbolic header, in BDD variable order.
/// Each field occupies `width()` consecutive variables starting at `offset()`, most significant bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeaderField {
    DstIp,
    SrcIp,
    DstPort,
    SrcPort,
    IpProtocol,
}

impl HeaderField {
    pub const ALL: [HeaderField; 5] = [
        HeaderField::DstIp,
        HeaderField::SrcIp,
        HeaderField::DstPort,
        HeaderField::SrcPort,
        HeaderField::IpProtocol,
    ];

    /// Total number of header bits, i.e. the number of BDD variables.
    pub const NUM_BITS: u32 = 104;

    pub fn width(self) -> u32 {
        match self {
            HeaderField::DstIp | HeaderField::SrcIp => 32,
            HeaderField::DstPort | HeaderField::SrcPort => 16,
            HeaderField::IpProtocol => 8,
        }
    }

    pub fn offset(self) -> u32 {
        match self {
            HeaderField::DstIp => 0,
            HeaderField::SrcIp => 32,
            HeaderField::DstPort => 64,
            HeaderField::SrcPort => 80,
            HeaderField::IpProtocol => 96,
        }
    }

    /// Largest value the field can hold.
    pub fn max_value(self) -> u64 {
        (1u64 << self.width()) - 1
    }
}

impl From<IpField> for HeaderField {
    fn from(field: IpField) -> Self {
        match field {
            IpField::Source => HeaderField::SrcIp,
            IpField::Destination => HeaderField::DstIp,
        }
    }
}

impl From<PortField> for HeaderField {
    fn from(field: PortField) -> Self {
        match field {
            PortField::Source => HeaderField::SrcPort,
            PortField::Destination => HeaderField::DstPort,
        }
    }
}

/// A single concrete packet header.
///
/// Ports are present exactly when the protocol is TCP or UDP. The constructors keep it that way,
/// and deserializing rejects packets that break it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPacket")]
pub struct Packet {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub ip_protocol: IpProtocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPacket {
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    ip_protocol: IpProtocol,
    #[serde(default)]
    src_port: Option<u16>,
    #[serde(default)]
    dst_port: Option<u16>,
}

impl TryFrom<RawPacket> for Packet {
    type Error = PacketError;

    fn try_from(raw: RawPacket) -> Result<Self, Self::Error> {
        let protocol = raw.ip_protocol;
        match (raw.src_port, raw.dst_port) {
            (Some(src_port), Some(dst_port)) if protocol.has_ports() => {
                Ok(Packet::with_ports(protocol, raw.src_ip, src_port, raw.dst_ip, dst_port))
            }
            _ if protocol.has_ports() => Err(PacketError::MissingPorts(protocol)),
            (None, None) => Ok(Packet {
                src_ip: raw.src_ip,
                dst_ip: raw.dst_ip,
                ip_protocol: protocol,
                src_port: None,
                dst_port: None,
            }),
            _ => Err(PacketError::UnexpectedPorts(protocol)),
        }
    }
}

impl Packet {
    pub fn tcp(src_ip: Ipv4Addr, src_port: u16, dst_ip: Ipv4Addr, dst_port: u16) -> Self {
        Packet::with_ports(IpProtocol::Tcp, src_ip, src_port, dst_ip, dst_port)
    }

    pub fn udp(src_ip: Ipv4Addr, src_port: u16, dst_ip: Ipv4Addr, dst_port: u16) -> Self {
        Packet::with_ports(IpProtocol::Udp, src_ip, src_port, dst_ip, dst_port)
    }

    pub fn icmp(src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Self {
        Packet {
            src_ip,
            dst_ip,
            ip_protocol: IpProtocol::Icmp,
            src_port: None,
            dst_port: None,
        }
    }

    fn with_ports(
        ip_protocol: IpProtocol,
        src_ip: Ipv4Addr,
        src_port: u16,
        dst_ip: Ipv4Addr,
        dst_port: u16,
    ) -> Self {
        Packet {
            src_ip,
            dst_ip,
            ip_protocol,
            src_port: Some(src_port),
            dst_port: Some(dst_port),
        }
    }

    pub fn ip(&self, field: IpField) -> Ipv4Addr {
        match field {
            IpField::Source => self.src_ip,
            IpField::Destination => self.dst_ip,
        }
    }

    pub fn set_ip(&mut self, field: IpField, ip: Ipv4Addr) {
        match field {
            IpField::Source => self.src_ip = ip,
            IpField::Destination => self.dst_ip = ip,
        }
    }

    pub fn port(&self, field: PortField) -> Option<u16> {
        match field {
            PortField::Source => self.src_port,
            PortField::Destination => self.dst_port,
        }
    }

    pub fn set_port(&mut self, field: PortField, port: u16) {
        match field {
            PortField::Source => self.src_port = Some(port),
            PortField::Destination => self.dst_port = Some(port),
        }
    }

    /// The value a trace shows for `field`; `None` for the ports of a portless packet.
    pub fn flow_value(&self, field: FlowField) -> Option<FieldValue> {
        match field {
            FlowField::SrcIp => Some(FieldValue::Ip(self.src_ip)),
            FlowField::DstIp => Some(FieldValue::Ip(self.dst_ip)),
            FlowField::SrcPort => self.src_port.map(FieldValue::Port),
            FlowField::DstPort => self.dst_port.map(FieldValue::Port),
        }
    }

    /// The raw bits of a header field. Absent ports read as 0.
    pub fn header_value(&self, field: HeaderField) -> u64 {
        match field {
            HeaderField::DstIp => u32::from(self.dst_ip) as u64,
            HeaderField::SrcIp => u32::from(self.src_ip) as u64,
            HeaderField::DstPort => self.dst_port.unwrap_or(0) as u64,
            HeaderField::SrcPort => self.src_port.unwrap_or(0) as u64,
            HeaderField::IpProtocol => self.ip_protocol.number() as u64,
        }
    }

    /// Inverse of [`Packet::header_value`]: ports are kept only for port-carrying protocols.
    pub fn from_header_values(value: impl Fn(HeaderField) -> u64) -> Self {
        let ip_protocol = IpProtocol::from_number(value(HeaderField::IpProtocol) as u8);
        let (src_port, dst_port) = if ip_protocol.has_ports() {
            (
                Some(value(HeaderField::SrcPort) as u16),
                Some(value(HeaderField::DstPort) as u16),
            )
        } else {
            (None, None)
        };
        Packet {
            src_ip: Ipv4Addr::from(value(HeaderField::SrcIp) as u32),
            dst_ip: Ipv4Addr::from(value(HeaderField::DstIp) as u32),
            ip_protocol,
            src_port,
            dst_port,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.src_ip)?;
        if let Some(port) = self.src_port {
            write!(f, ":{}", port)?;
        }
        write!(f, " -> {}", self.dst_ip)?;
        if let Some(port) = self.dst_port {
            write!(f, ":{}", port)?;
        }
        write!(f, " proto {}", self.ip_protocol.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_numbers_normalise() {
        assert_eq!(IpProtocol::from_number(6), IpProtocol::Tcp);
        assert_eq!(IpProtocol::from_number(47), IpProtocol::Other(47));
        assert_eq!(IpProtocol::Udp.number(), 17);
        assert!(!IpProtocol::Icmp.has_ports());
    }

    #[test]
    fn test_layout_covers_all_bits() {
        let mut next = 0;
        for field in HeaderField::ALL {
            assert_eq!(field.offset(), next);
            next += field.width();
        }
        assert_eq!(next, HeaderField::NUM_BITS);
    }

    #[test]
    fn test_header_values_roundtrip_through_packet() {
        let p = Packet::tcp(
            Ipv4Addr::new(1, 2, 3, 4),
            1234,
            Ipv4Addr::new(10, 0, 0, 7),
            80,
        );
        let q = Packet::from_header_values(|f| p.header_value(f));
        assert_eq!(p, q);

        let icmp = Packet::icmp(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2));
        assert_eq!(icmp.header_value(HeaderField::DstPort), 0);
        assert_eq!(Packet::from_header_values(|f| icmp.header_value(f)), icmp);
    }

    #[test]
    fn test_deserialize_normalises_protocol() {
        let other: IpProtocol = serde_json::from_str(r#"{"other": 6}"#).unwrap();
        assert_eq!(other, IpProtocol::Tcp);
        let gre: IpProtocol = serde_json::from_str(r#"{"other": 47}"#).unwrap();
        assert_eq!(gre, IpProtocol::Other(47));

        let json = r#"{"src_ip": "1.1.1.1", "dst_ip": "2.2.2.2", "ip_protocol": {"other": 17},
                       "src_port": 53, "dst_port": 5353}"#;
        let p: Packet = serde_json::from_str(json).unwrap();
        assert_eq!(p, Packet::udp(Ipv4Addr::new(1, 1, 1, 1), 53, Ipv4Addr::new(2, 2, 2, 2), 5353));
    }

    #[test]
    fn test_deserialize_checks_ports_against_protocol() {
        let icmp_with_ports = r#"{"src_ip": "1.1.1.1", "dst_ip": "2.2.2.2", "ip_protocol": "icmp",
                                  "src_port": 1, "dst_port": 2}"#;
        let err = serde_json::from_str::<Packet>(icmp_with_ports).unwrap_err();
        assert!(err.to_string().contains("Icmp packet cannot carry ports"));

        let tcp_one_port = r#"{"src_ip": "1.1.1.1", "dst_ip": "2.2.2.2", "ip_protocol": "tcp", "dst_port": 80}"#;
        assert!(serde_json::from_str::<Packet>(tcp_one_port).is_err());

        let icmp = r#"{"src_ip": "1.1.1.1", "dst_ip": "2.2.2.2", "ip_protocol": "icmp"}"#;
        let p: Packet = serde_json::from_str(icmp).unwrap();
        assert_eq!(p, Packet::icmp(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2)));
    }

    #[test]
    fn test_deserialize_rejects_ingress_fields() {
        let json = r#"{"src_ip": "1.1.1.1", "dst_ip": "2.2.2.2", "ip_protocol": "icmp",
                       "ingress_interface": "eth0"}"#;
        assert!(serde_json::from_str::<Packet>(json).is_err());
    }

    #[test]
    fn test_display() {
        let p = Packet::udp(Ipv4Addr::new(1, 2, 3, 4), 53, Ipv4Addr::new(5, 6, 7, 8), 9999);
        assert_eq!(p.to_string(), "1.2.3.4:53 -> 5.6.7.8:9999 proto 17");
        assert_eq!(FlowField::from(IpField::Destination).to_string(), "dstIp");
        assert_eq!(PortRange::new(10, 20).to_string(), "10-20");
    }
}
