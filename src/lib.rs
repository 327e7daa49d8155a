//! Packet fate analysis: the forwarding edges a device contributes to a network-wide graph, and
//! the NAT/PAT rewrites a transformation tree applies to a concrete packet.

pub mod acl;
pub mod bdd;
pub mod error;
pub mod evaluator;
pub mod fuzz;
pub mod graph;
pub mod header;
pub mod ip_space;
pub mod logging;
pub mod packet_set;
pub mod scenario;
pub mod transformation;
pub mod viz;

pub use acl::{Acl, GuardContext, MatchExpr};
pub use bdd::{Bdd, HeaderSpace};
pub use error::{GuardError, PacketError, ScenarioError, TransformationError};
pub use evaluator::{TransformationEvaluator, TransformationResult};
pub use graph::{DispositionMaps, Edge, ForwardingGraphGenerator, ForwardingStates};
pub use header::Packet;
pub use packet_set::PacketSet;
pub use transformation::{Transformation, TransformationStep};
