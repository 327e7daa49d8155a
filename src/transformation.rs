use crate::acl::MatchExpr;
use crate::error::TransformationError;
use crate::header::{IpField, PortField};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// The kind of NAT a step belongs to. Trace entries are grouped by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    DestNat,
    SourceNat,
    StaticNat,
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransformationType::DestNat => "DEST_NAT",
            TransformationType::SourceNat => "SOURCE_NAT",
            TransformationType::StaticNat => "STATIC_NAT",
        };
        write!(f, "{}", name)
    }
}

/// A set of addresses to translate into, as inclusive ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpPool {
    pub ranges: Vec<(Ipv4Addr, Ipv4Addr)>,
}

impl IpPool {
    pub fn range(lo: Ipv4Addr, hi: Ipv4Addr) -> Self {
        IpPool {
            ranges: vec![(lo, hi)],
        }
    }

    pub fn single(ip: Ipv4Addr) -> Self {
        IpPool::range(ip, ip)
    }

    /// The address a pool translates to: the smallest address it holds.
    pub fn representative(&self) -> Result<Ipv4Addr, TransformationError> {
        for &(lo, hi) in &self.ranges {
            if lo > hi {
                return Err(TransformationError::MalformedIpPool { lo, hi });
            }
        }
        self.ranges
            .iter()
            .map(|&(lo, _)| lo)
            .min()
            .ok_or(TransformationError::EmptyIpPool)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationStep {
    AssignIpAddressFromPool {
        ty: TransformationType,
        field: IpField,
        pool: IpPool,
    },
    ShiftIpAddressIntoSubnet {
        ty: TransformationType,
        field: IpField,
        subnet: Ipv4Network,
    },
    AssignPortFromPool {
        ty: TransformationType,
        field: PortField,
        start: u16,
        end: u16,
    },
    Noop {
        ty: TransformationType,
    },
    /// Every step, in order, on the same packet.
    ApplyAll(Vec<TransformationStep>),
    /// Exactly one of the steps; evaluation explores each of them.
    ApplyAny(Vec<TransformationStep>),
}

impl TransformationStep {
    pub fn assign_ip(ty: TransformationType, field: IpField, pool: IpPool) -> Self {
        TransformationStep::AssignIpAddressFromPool { ty, field, pool }
    }
    pub fn shift_ip(ty: TransformationType, field: IpField, subnet: Ipv4Network) -> Self {
        TransformationStep::ShiftIpAddressIntoSubnet { ty, field, subnet }
    }
    pub fn assign_port(ty: TransformationType, field: PortField, start: u16, end: u16) -> Self {
        TransformationStep::AssignPortFromPool {
            ty,
            field,
            start,
            end,
        }
    }
    pub fn noop(ty: TransformationType) -> Self {
        TransformationStep::Noop { ty }
    }
    pub fn apply_all(steps: Vec<TransformationStep>) -> Self {
        TransformationStep::ApplyAll(steps)
    }
    pub fn apply_any(steps: Vec<TransformationStep>) -> Self {
        TransformationStep::ApplyAny(steps)
    }
}

/// A node of a transformation tree.
///
/// When `guard` holds (or is absent), `steps` are applied in order and evaluation continues
/// with `and_then`; otherwise it continues with `or_else`. A missing continuation ends the walk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transformation {
    #[serde(default)]
    pub guard: Option<MatchExpr>,
    #[serde(default)]
    pub steps: Vec<TransformationStep>,
    #[serde(default)]
    pub and_then: Option<Box<Transformation>>,
    #[serde(default)]
    pub or_else: Option<Box<Transformation>>,
}

impl Transformation {
    /// An unguarded node.
    pub fn always(steps: Vec<TransformationStep>) -> Self {
        Transformation {
            guard: None,
            steps,
            and_then: None,
            or_else: None,
        }
    }

    pub fn when(guard: MatchExpr, steps: Vec<TransformationStep>) -> Self {
        Transformation {
            guard: Some(guard),
            steps,
            and_then: None,
            or_else: None,
        }
    }

    pub fn and_then(mut self, next: Transformation) -> Self {
        self.and_then = Some(Box::new(next));
        self
    }

    pub fn or_else(mut self, next: Transformation) -> Self {
        self.or_else = Some(Box::new(next));
        self
    }
}
