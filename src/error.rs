//! Error types.

use crate::header::{IpProtocol, PortField};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// A guard referred to something the context does not define.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("undefined ACL: {0}")]
    UndefinedAcl(String),

    #[error("undefined IP space: {0}")]
    UndefinedIpSpace(String),

    #[error("cyclic reference through ACL: {0}")]
    CyclicAclReference(String),

    #[error("cyclic reference through IP space: {0}")]
    CyclicIpSpaceReference(String),
}

/// A packet whose ports disagree with its protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("{0:?} packet needs both ports")]
    MissingPorts(IpProtocol),

    #[error("{0:?} packet cannot carry ports")]
    UnexpectedPorts(IpProtocol),
}

/// Failure of one branch of a transformation evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformationError {
    #[error("guard error: {0}")]
    Guard(#[from] GuardError),

    #[error("IP pool has no addresses")]
    EmptyIpPool,

    #[error("malformed IP pool range: {lo} > {hi}")]
    MalformedIpPool { lo: Ipv4Addr, hi: Ipv4Addr },

    #[error("malformed port pool: {start} > {end}")]
    MalformedPortPool { start: u16, end: u16 },

    #[error("packet has no {0:?} port to rewrite")]
    MissingPort(PortField),

    #[error("ApplyAny with no alternatives")]
    EmptyApplyAny,

    #[error("transformation produced no outcome")]
    NoOutcome,
}

/// Failure to load or run a scenario file.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid scenario {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("guard error: {0}")]
    Guard(#[from] GuardError),

    #[error("transformation error: {0}")]
    Transformation(#[from] TransformationError),
}
