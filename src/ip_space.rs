use crate::bdd::{Bdd, HeaderSpace};
use crate::error::GuardError;
use crate::header::IpField;
use crate::packet_set::PacketSet;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// A set of IPv4 addresses, possibly referring to named definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpSpace {
    Universe,
    Empty,
    Ip(Ipv4Addr),
    Prefix(Ipv4Network),
    Range { lo: Ipv4Addr, hi: Ipv4Addr },
    Union(Vec<IpSpace>),
    Complement(Box<IpSpace>),
    Named(String),
}

pub type NamedIpSpaces = BTreeMap<String, IpSpace>;

impl IpSpace {
    pub fn prefix(network: Ipv4Network) -> Self {
        IpSpace::Prefix(network)
    }
    pub fn range(lo: Ipv4Addr, hi: Ipv4Addr) -> Self {
        IpSpace::Range { lo, hi }
    }
    pub fn named(name: &str) -> Self {
        IpSpace::Named(name.to_string())
    }
    pub fn complement(space: IpSpace) -> Self {
        IpSpace::Complement(Box::new(space))
    }

    pub fn contains(&self, ip: Ipv4Addr, named: &NamedIpSpaces) -> Result<bool, GuardError> {
        self.contains_in(ip, named, &mut vec![])
    }

    fn contains_in<'a>(
        &'a self,
        ip: Ipv4Addr,
        named: &'a NamedIpSpaces,
        visiting: &mut Vec<&'a str>,
    ) -> Result<bool, GuardError> {
        match self {
            IpSpace::Universe => Ok(true),
            IpSpace::Empty => Ok(false),
            IpSpace::Ip(addr) => Ok(*addr == ip),
            IpSpace::Prefix(network) => Ok(network.contains(ip)),
            IpSpace::Range { lo, hi } => Ok(*lo <= ip && ip <= *hi),
            IpSpace::Union(spaces) => {
                for space in spaces {
                    if space.contains_in(ip, named, visiting)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            IpSpace::Complement(space) => Ok(!space.contains_in(ip, named, visiting)?),
            IpSpace::Named(name) => {
                let (name, def) = resolve(name, named, visiting)?;
                visiting.push(name);
                let result = def.contains_in(ip, named, visiting);
                visiting.pop();
                result
            }
        }
    }

    /// The headers whose `field` lies in this space.
    pub fn to_packet_set(
        &self,
        field: IpField,
        hs: &HeaderSpace,
        named: &NamedIpSpaces,
    ) -> Result<Bdd, GuardError> {
        self.to_packet_set_in(field, hs, named, &mut vec![])
    }

    fn to_packet_set_in<'a>(
        &'a self,
        field: IpField,
        hs: &HeaderSpace,
        named: &'a NamedIpSpaces,
        visiting: &mut Vec<&'a str>,
    ) -> Result<Bdd, GuardError> {
        match self {
            IpSpace::Universe => Ok(hs.universe()),
            IpSpace::Empty => Ok(hs.empty()),
            IpSpace::Ip(addr) => Ok(hs.ip_range(field, *addr, *addr)),
            IpSpace::Prefix(network) => Ok(hs.ip_prefix(field, *network)),
            IpSpace::Range { lo, hi } => Ok(hs.ip_range(field, *lo, *hi)),
            IpSpace::Union(spaces) => {
                let mut acc = hs.empty();
                for space in spaces {
                    acc = acc.or(&space.to_packet_set_in(field, hs, named, visiting)?);
                }
                Ok(acc)
            }
            IpSpace::Complement(space) => Ok(space.to_packet_set_in(field, hs, named, visiting)?.not()),
            IpSpace::Named(name) => {
                let (name, def) = resolve(name, named, visiting)?;
                visiting.push(name);
                let result = def.to_packet_set_in(field, hs, named, visiting);
                visiting.pop();
                result
            }
        }
    }
}

fn resolve<'a>(
    name: &str,
    named: &'a NamedIpSpaces,
    visiting: &[&str],
) -> Result<(&'a str, &'a IpSpace), GuardError> {
    if visiting.contains(&name) {
        return Err(GuardError::CyclicIpSpaceReference(name.to_string()));
    }
    named
        .get_key_value(name)
        .map(|(k, v)| (k.as_str(), v))
        .ok_or_else(|| GuardError::UndefinedIpSpace(name.to_string()))
}
