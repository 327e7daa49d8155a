//! JSON scenario files for the command line.

use crate::acl::{GuardContext, MatchExpr, NamedAcls};
use crate::bdd::{Bdd, HeaderSpace};
use crate::error::ScenarioError;
use crate::evaluator::{TransformationEvaluator, TransformationResult};
use crate::graph::{DispositionMaps, ExitDisposition};
use crate::header::Packet;
use crate::ip_space::NamedIpSpaces;
use crate::transformation::Transformation;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ScenarioError> {
    let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ScenarioError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// A packet pushed through a transformation tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformationScenario {
    pub packet: Packet,
    /// Interface the packet arrived on, for `src_interface` guards.
    #[serde(default)]
    pub src_interface: Option<String>,
    #[serde(default)]
    pub acls: NamedAcls,
    #[serde(default)]
    pub ip_spaces: NamedIpSpaces,
    pub transformation: Transformation,
}

impl TransformationScenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        load(path)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn context(&self) -> GuardContext<'_> {
        let ctx = GuardContext::new(&self.acls, &self.ip_spaces);
        match &self.src_interface {
            Some(iface) => ctx.with_src_interface(iface),
            None => ctx,
        }
    }

    /// Every outcome; an evaluation error ends the run.
    pub fn run_all(&self) -> Result<Vec<TransformationResult>, ScenarioError> {
        let evaluator = TransformationEvaluator::new(self.context());
        let results = evaluator
            .eval_all(&self.transformation, self.packet.clone())
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            outcomes = results.len(),
            steps = evaluator.steps_applied(),
            "evaluated scenario"
        );
        Ok(results)
    }

    pub fn run_first(&self) -> Result<TransformationResult, ScenarioError> {
        let evaluator = TransformationEvaluator::new(self.context());
        Ok(evaluator.eval(&self.transformation, self.packet.clone())?)
    }
}

/// A packet leaving a VRF through an interface.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExitSpec {
    pub interface: String,
    pub disposition: ExitDisposition,
    pub matches: MatchExpr,
}

/// What happens to packets inside one VRF. Absent sets are empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VrfSpec {
    #[serde(default)]
    pub accept: Option<MatchExpr>,
    #[serde(default)]
    pub null_route: Option<MatchExpr>,
    /// Restricts drop-no-route to these headers instead of the scenario universe.
    #[serde(default)]
    pub no_route_universe: Option<MatchExpr>,
    /// Next VRF → headers leaked there.
    #[serde(default)]
    pub leaks: BTreeMap<String, MatchExpr>,
    #[serde(default)]
    pub exits: Vec<ExitSpec>,
}

/// Per-device forwarding outcomes, written as guards.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkScenario {
    #[serde(default)]
    pub acls: NamedAcls,
    #[serde(default)]
    pub ip_spaces: NamedIpSpaces,
    /// Headers that can reach a VRF; everything when absent.
    #[serde(default)]
    pub universe: Option<MatchExpr>,
    /// node → vrf → dispositions
    pub nodes: BTreeMap<String, BTreeMap<String, VrfSpec>>,
}

impl NetworkScenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        load(path)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Converts every guard to a header set in `hs`.
    pub fn disposition_maps(&self, hs: &HeaderSpace) -> Result<DispositionMaps<Bdd>, ScenarioError> {
        let ctx = GuardContext::new(&self.acls, &self.ip_spaces);
        let set = |expr: &MatchExpr| ctx.to_packet_set(expr, hs);
        let universe = match &self.universe {
            Some(expr) => set(expr)?,
            None => hs.universe(),
        };
        let mut maps = DispositionMaps::new(universe);
        for (node, vrfs) in &self.nodes {
            for (vrf, spec) in vrfs {
                maps.declare_vrf(node, vrf);
                if let Some(expr) = &spec.accept {
                    maps.accept(node, vrf, set(expr)?);
                }
                if let Some(expr) = &spec.null_route {
                    maps.null_route(node, vrf, set(expr)?);
                }
                if let Some(expr) = &spec.no_route_universe {
                    maps.restrict_no_route(node, vrf, set(expr)?);
                }
                for (next_vrf, expr) in &spec.leaks {
                    maps.leak(node, vrf, next_vrf, set(expr)?);
                }
                for exit in &spec.exits {
                    maps.exit(node, vrf, &exit.interface, exit.disposition, set(&exit.matches)?);
                }
            }
        }
        Ok(maps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ForwardingGraphGenerator, ForwardingStates, NamedStates};
    use crate::packet_set::PacketSet;
    use std::net::Ipv4Addr;

    const NAT_SCENARIO: &str = r#"{
        "packet": {
            "src_ip": "192.168.1.10",
            "dst_ip": "203.0.113.7",
            "ip_protocol": "tcp",
            "src_port": 40000,
            "dst_port": 443
        },
        "src_interface": "inside",
        "ip_spaces": {"lan": {"prefix": "192.168.1.0/24"}},
        "transformation": {
            "guard": {"and": [{"src_interface": ["inside"]}, {"src_ip": {"named": "lan"}}]},
            "steps": [
                {"assign_ip_address_from_pool": {
                    "ty": "source_nat",
                    "field": "source",
                    "pool": {"ranges": [["198.51.100.1", "198.51.100.4"]]}
                }},
                {"apply_any": [
                    {"assign_port_from_pool": {"ty": "source_nat", "field": "source", "start": 2000, "end": 2999}},
                    {"noop": {"ty": "source_nat"}}
                ]}
            ]
        }
    }"#;

    #[test]
    fn test_transformation_scenario() {
        crate::logging::init_for_tests();
        let scenario = TransformationScenario::from_json(NAT_SCENARIO).unwrap();
        let results = scenario.run_all().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].packet.src_ip, Ipv4Addr::new(198, 51, 100, 1));
        assert_eq!(results[0].packet.src_port, Some(2000));
        assert_eq!(results[1].packet.src_port, Some(40000));
        assert_eq!(results[0].trace.len(), 1);
        assert_eq!(results[0].trace[0].diffs.len(), 2);
        assert_eq!(scenario.run_first().unwrap(), results[0]);
    }

    #[test]
    fn test_guard_failure_without_interface() {
        let mut scenario = TransformationScenario::from_json(NAT_SCENARIO).unwrap();
        scenario.src_interface = None;
        let results = scenario.run_all().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].packet, scenario.packet);
        assert!(results[0].trace.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let json = r#"{"packet": {"src_ip": "1.1.1.1", "dst_ip": "2.2.2.2", "ip_protocol": "icmp"},
                       "transformation": {}, "extra": 1}"#;
        assert!(TransformationScenario::from_json(json).is_err());
    }

    #[test]
    fn test_undefined_acl_is_reported() {
        let json = r#"{"packet": {"src_ip": "1.1.1.1", "dst_ip": "2.2.2.2", "ip_protocol": "icmp"},
                       "transformation": {"guard": {"permitted_by_acl": "missing"}}}"#;
        let scenario = TransformationScenario::from_json(json).unwrap();
        let err = scenario.run_all().unwrap_err();
        assert_eq!(
            err.to_string(),
            "transformation error: guard error: undefined ACL: missing"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = TransformationScenario::load(Path::new("/nonexistent/scenario.json")).unwrap_err();
        assert!(matches!(err, ScenarioError::Io { .. }));
    }

    #[test]
    fn test_network_scenario() {
        let json = r#"{
            "nodes": {
                "r1": {
                    "default": {
                        "accept": {"dst_ip": {"ip": "10.0.0.1"}},
                        "null_route": {"dst_ip": {"prefix": "192.0.2.0/24"}},
                        "exits": [
                            {"interface": "eth0", "disposition": "delivered_to_subnet",
                             "matches": {"dst_ip": {"prefix": "10.0.0.0/24"}}}
                        ]
                    }
                },
                "r2": {"default": {}}
            }
        }"#;
        let scenario = NetworkScenario::from_json(json).unwrap();
        let hs = HeaderSpace::new();
        let maps = scenario.disposition_maps(&hs).unwrap();
        let states = NamedStates;
        let generator = ForwardingGraphGenerator::new(&maps, &states);
        let edges: Vec<_> = generator.edges().collect();
        assert_eq!(edges.len(), 5);
        let r2_drop = edges
            .iter()
            .find(|e| e.source == states.post_in_vrf("r2", "default"))
            .unwrap();
        assert_eq!(r2_drop.target, states.node_drop_no_route("r2"));
        assert_eq!(r2_drop.guard, hs.universe());
        assert!(edges.iter().all(|e| !e.guard.is_empty()));
    }

    #[test]
    fn test_demo_scenarios_load() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
        let dest_nat = TransformationScenario::load(&demos.join("transformations/dest_nat.json")).unwrap();
        let result = dest_nat.run_first().unwrap();
        assert_eq!(result.packet.dst_ip, Ipv4Addr::new(10, 0, 0, 5));

        let source_nat = TransformationScenario::load(&demos.join("transformations/source_nat.json")).unwrap();
        assert_eq!(source_nat.run_all().unwrap().len(), 2);

        let network = NetworkScenario::load(&demos.join("networks/two_routers.json")).unwrap();
        let hs = HeaderSpace::new();
        let maps = network.disposition_maps(&hs).unwrap();
        let states = NamedStates;
        let generator = ForwardingGraphGenerator::new(&maps, &states);
        let leak = generator
            .edges()
            .find(|e| e.target == states.post_in_vrf("r1", "mgmt"))
            .unwrap();
        assert_eq!(leak.source, states.post_in_vrf("r1", "default"));
    }
}
