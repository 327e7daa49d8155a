//! Forwarding edges for one tick of device-local forwarding.
//!
//! Given per-device disposition maps, [`ForwardingGraphGenerator`] emits the guarded edges
//! between symbolic states that describe where every packet header can go inside a device:
//! accepted, dropped for lack of a route, null routed, leaked to another VRF, or handed to an
//! interface with one of the four exit dispositions.

use crate::packet_set::PacketSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::iter;

/// node → vrf → set
pub type VrfSets<P> = BTreeMap<String, BTreeMap<String, P>>;
/// node → vrf → next vrf → set
pub type VrfLeakSets<P> = BTreeMap<String, BTreeMap<String, BTreeMap<String, P>>>;
/// node → vrf → interface → disposition → set
pub type InterfaceSets<P> =
    BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<ExitDisposition, P>>>>;

/// How a packet leaves a device through an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitDisposition {
    DeliveredToSubnet,
    ExitsNetwork,
    InsufficientInfo,
    NeighborUnreachable,
}

impl ExitDisposition {
    pub const ALL: [ExitDisposition; 4] = [
        ExitDisposition::DeliveredToSubnet,
        ExitDisposition::ExitsNetwork,
        ExitDisposition::InsufficientInfo,
        ExitDisposition::NeighborUnreachable,
    ];
}

impl fmt::Display for ExitDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitDisposition::DeliveredToSubnet => "DeliveredToSubnet",
            ExitDisposition::ExitsNetwork => "ExitsNetwork",
            ExitDisposition::InsufficientInfo => "InsufficientInfo",
            ExitDisposition::NeighborUnreachable => "NeighborUnreachable",
        };
        write!(f, "{}", name)
    }
}

/// Constructors for the states the generated edges connect. The graph search decides what a state is.
pub trait ForwardingStates {
    type State: fmt::Debug;

    fn post_in_vrf(&self, node: &str, vrf: &str) -> Self::State;
    fn pre_out_vrf(&self, node: &str, vrf: &str) -> Self::State;
    fn pre_out_interface_delivered_to_subnet(&self, node: &str, interface: &str) -> Self::State;
    fn pre_out_interface_exits_network(&self, node: &str, interface: &str) -> Self::State;
    fn pre_out_interface_insufficient_info(&self, node: &str, interface: &str) -> Self::State;
    fn pre_out_interface_neighbor_unreachable(&self, node: &str, interface: &str) -> Self::State;
    fn node_accept(&self, node: &str) -> Self::State;
    fn node_drop_no_route(&self, node: &str) -> Self::State;
    fn node_drop_null_route(&self, node: &str) -> Self::State;

    fn pre_out_interface(&self, disposition: ExitDisposition, node: &str, interface: &str) -> Self::State {
        match disposition {
            ExitDisposition::DeliveredToSubnet => self.pre_out_interface_delivered_to_subnet(node, interface),
            ExitDisposition::ExitsNetwork => self.pre_out_interface_exits_network(node, interface),
            ExitDisposition::InsufficientInfo => self.pre_out_interface_insufficient_info(node, interface),
            ExitDisposition::NeighborUnreachable => {
                self.pre_out_interface_neighbor_unreachable(node, interface)
            }
        }
    }
}

/// States identified by kind and location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolicState {
    PostInVrf {
        node: String,
        vrf: String,
    },
    PreOutVrf {
        node: String,
        vrf: String,
    },
    PreOutInterface {
        disposition: ExitDisposition,
        node: String,
        interface: String,
    },
    NodeAccept {
        node: String,
    },
    NodeDropNoRoute {
        node: String,
    },
    NodeDropNullRoute {
        node: String,
    },
}

impl fmt::Display for SymbolicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicState::PostInVrf { node, vrf } => write!(f, "PostInVrf({}, {})", node, vrf),
            SymbolicState::PreOutVrf { node, vrf } => write!(f, "PreOutVrf({}, {})", node, vrf),
            SymbolicState::PreOutInterface {
                disposition,
                node,
                interface,
            } => write!(f, "PreOutInterface{}({}, {})", disposition, node, interface),
            SymbolicState::NodeAccept { node } => write!(f, "NodeAccept({})", node),
            SymbolicState::NodeDropNoRoute { node } => write!(f, "NodeDropNoRoute({})", node),
            SymbolicState::NodeDropNullRoute { node } => write!(f, "NodeDropNullRoute({})", node),
        }
    }
}

/// [`ForwardingStates`] producing [`SymbolicState`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedStates;

impl ForwardingStates for NamedStates {
    type State = SymbolicState;

    fn post_in_vrf(&self, node: &str, vrf: &str) -> SymbolicState {
        SymbolicState::PostInVrf {
            node: node.to_string(),
            vrf: vrf.to_string(),
        }
    }
    fn pre_out_vrf(&self, node: &str, vrf: &str) -> SymbolicState {
        SymbolicState::PreOutVrf {
            node: node.to_string(),
            vrf: vrf.to_string(),
        }
    }
    fn pre_out_interface_delivered_to_subnet(&self, node: &str, interface: &str) -> SymbolicState {
        exit_state(ExitDisposition::DeliveredToSubnet, node, interface)
    }
    fn pre_out_interface_exits_network(&self, node: &str, interface: &str) -> SymbolicState {
        exit_state(ExitDisposition::ExitsNetwork, node, interface)
    }
    fn pre_out_interface_insufficient_info(&self, node: &str, interface: &str) -> SymbolicState {
        exit_state(ExitDisposition::InsufficientInfo, node, interface)
    }
    fn pre_out_interface_neighbor_unreachable(&self, node: &str, interface: &str) -> SymbolicState {
        exit_state(ExitDisposition::NeighborUnreachable, node, interface)
    }
    fn node_accept(&self, node: &str) -> SymbolicState {
        SymbolicState::NodeAccept {
            node: node.to_string(),
        }
    }
    fn node_drop_no_route(&self, node: &str) -> SymbolicState {
        SymbolicState::NodeDropNoRoute {
            node: node.to_string(),
        }
    }
    fn node_drop_null_route(&self, node: &str) -> SymbolicState {
        SymbolicState::NodeDropNullRoute {
            node: node.to_string(),
        }
    }
}

fn exit_state(disposition: ExitDisposition, node: &str, interface: &str) -> SymbolicState {
    SymbolicState::PreOutInterface {
        disposition,
        node: node.to_string(),
        interface: interface.to_string(),
    }
}

/// A transition from `source` to `target` taken by exactly the headers in `guard`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<S, P> {
    pub source: S,
    pub target: S,
    pub guard: P,
}

impl<S, P> Edge<S, P> {
    pub fn new(source: S, target: S, guard: P) -> Self {
        Edge {
            source,
            target,
            guard,
        }
    }
}

/// Where packets end up inside each device, as computed from its FIBs.
///
/// The maps are sparse: a missing entry is the empty set.
#[derive(Debug, Clone)]
pub struct DispositionMaps<P> {
    /// Headers that can arrive at any VRF; drop-no-route is complemented within it.
    pub universe: P,
    /// Per-VRF override of `universe`.
    pub no_route_universe: VrfSets<P>,
    pub accepted: VrfSets<P>,
    pub null_routed: VrfSets<P>,
    pub next_vrf: VrfLeakSets<P>,
    pub interface_dispositions: InterfaceSets<P>,
}

impl<P: PacketSet> DispositionMaps<P> {
    pub fn new(universe: P) -> Self {
        DispositionMaps {
            universe,
            no_route_universe: BTreeMap::new(),
            accepted: BTreeMap::new(),
            null_routed: BTreeMap::new(),
            next_vrf: BTreeMap::new(),
            interface_dispositions: BTreeMap::new(),
        }
    }

    /// Makes a VRF known even if nothing is accepted, routed or leaked there.
    pub fn declare_vrf(&mut self, node: &str, vrf: &str) -> &mut Self {
        let empty = self.universe.empty_like();
        self.accepted
            .entry(node.to_string())
            .or_default()
            .entry(vrf.to_string())
            .or_insert(empty);
        self
    }

    pub fn accept(&mut self, node: &str, vrf: &str, set: P) -> &mut Self {
        add_to(&mut self.accepted, node, vrf, set);
        self
    }

    pub fn null_route(&mut self, node: &str, vrf: &str, set: P) -> &mut Self {
        add_to(&mut self.null_routed, node, vrf, set);
        self
    }

    pub fn restrict_no_route(&mut self, node: &str, vrf: &str, universe: P) -> &mut Self {
        self.no_route_universe
            .entry(node.to_string())
            .or_default()
            .insert(vrf.to_string(), universe);
        self
    }

    pub fn leak(&mut self, node: &str, vrf: &str, next_vrf: &str, set: P) -> &mut Self {
        let slot = self
            .next_vrf
            .entry(node.to_string())
            .or_default()
            .entry(vrf.to_string())
            .or_default();
        union_into(slot, next_vrf, set);
        self
    }

    pub fn exit(
        &mut self,
        node: &str,
        vrf: &str,
        interface: &str,
        disposition: ExitDisposition,
        set: P,
    ) -> &mut Self {
        let slot = self
            .interface_dispositions
            .entry(node.to_string())
            .or_default()
            .entry(vrf.to_string())
            .or_default()
            .entry(interface.to_string())
            .or_default();
        match slot.get_mut(&disposition) {
            Some(existing) => *existing = existing.or(&set),
            None => {
                slot.insert(disposition, set);
            }
        }
        self
    }

    /// Every (node, vrf) mentioned by any of the maps.
    pub fn vrfs(&self) -> BTreeSet<(&str, &str)> {
        fn keys<'m, T>(map: &'m BTreeMap<String, BTreeMap<String, T>>) -> impl Iterator<Item = (&'m str, &'m str)> {
            map.iter()
                .flat_map(|(node, vrfs)| vrfs.keys().map(move |vrf| (node.as_str(), vrf.as_str())))
        }
        keys(&self.accepted)
            .chain(keys(&self.null_routed))
            .chain(keys(&self.no_route_universe))
            .chain(keys(&self.next_vrf))
            .chain(keys(&self.interface_dispositions))
            .collect()
    }
}

fn add_to<P: PacketSet>(map: &mut VrfSets<P>, node: &str, vrf: &str, set: P) {
    union_into(map.entry(node.to_string()).or_default(), vrf, set);
}

fn union_into<P: PacketSet>(map: &mut BTreeMap<String, P>, key: &str, set: P) {
    match map.get_mut(key) {
        Some(existing) => *existing = existing.or(&set),
        None => {
            map.insert(key.to_string(), set);
        }
    }
}

fn lookup<'m, P>(map: &'m VrfSets<P>, node: &str, vrf: &str) -> Option<&'m P> {
    map.get(node).and_then(|vrfs| vrfs.get(vrf))
}

fn include_all(_node: &str) -> bool {
    true
}

/// Generates forwarding edges from disposition maps. Pure: the same maps always give the same edges.
pub struct ForwardingGraphGenerator<'a, P, F> {
    maps: &'a DispositionMaps<P>,
    states: &'a F,
    empty: P,
}

impl<'a, P: PacketSet, F: ForwardingStates> ForwardingGraphGenerator<'a, P, F> {
    pub fn new(maps: &'a DispositionMaps<P>, states: &'a F) -> Self {
        ForwardingGraphGenerator {
            maps,
            states,
            empty: maps.universe.empty_like(),
        }
    }

    /// All edges with a non-empty guard, in a stable order: accept, drop-no-route, drop-null-route,
    /// VRF leaks, then the interface exits grouped by disposition.
    pub fn edges<'s>(&'s self) -> impl Iterator<Item = Edge<F::State, P>> + 's {
        self.edges_for(&include_all)
    }

    /// Like [`Self::edges`], restricted to the nodes `include` accepts.
    pub fn edges_for<'s>(
        &'s self,
        include: &'s dyn Fn(&str) -> bool,
    ) -> impl Iterator<Item = Edge<F::State, P>> + 's {
        tracing::debug!("generating forwarding edges");
        self.accept_edges(include)
            .chain(self.drop_no_route_edges(include))
            .chain(self.drop_null_route_edges(include))
            .chain(self.vrf_leak_edges(include))
            .chain(self.interface_edges(include))
            .filter(|edge| {
                let keep = !edge.guard.is_empty();
                if !keep {
                    tracing::trace!(source = ?edge.source, target = ?edge.target, "suppressed edge with empty guard");
                }
                keep
            })
    }

    fn accept_edges<'s>(
        &'s self,
        include: &'s dyn Fn(&str) -> bool,
    ) -> impl Iterator<Item = Edge<F::State, P>> + 's {
        let states = self.states;
        self.maps
            .accepted
            .iter()
            .filter(move |(node, _)| include(node.as_str()))
            .flat_map(move |(node, vrfs)| {
                vrfs.iter().map(move |(vrf, accepted)| {
                    Edge::new(states.post_in_vrf(node, vrf), states.node_accept(node), accepted.clone())
                })
            })
    }

    fn drop_no_route_edges<'s>(
        &'s self,
        include: &'s dyn Fn(&str) -> bool,
    ) -> impl Iterator<Item = Edge<F::State, P>> + 's {
        // The VRF set is only collected once the chain reaches these edges.
        iter::once(self.maps)
            .flat_map(DispositionMaps::vrfs)
            .filter(move |(node, _)| include(*node))
            .map(move |(node, vrf)| {
                let maps = self.maps;
                let universe = lookup(&maps.no_route_universe, node, vrf).unwrap_or(&maps.universe);
                let accepted = lookup(&maps.accepted, node, vrf).unwrap_or(&self.empty);
                let null_routed = lookup(&maps.null_routed, node, vrf).unwrap_or(&self.empty);
                let guard = universe.and(&accepted.or(null_routed).not());
                Edge::new(
                    self.states.post_in_vrf(node, vrf),
                    self.states.node_drop_no_route(node),
                    guard,
                )
            })
    }

    fn drop_null_route_edges<'s>(
        &'s self,
        include: &'s dyn Fn(&str) -> bool,
    ) -> impl Iterator<Item = Edge<F::State, P>> + 's {
        let states = self.states;
        self.maps
            .null_routed
            .iter()
            .filter(move |(node, _)| include(node.as_str()))
            .flat_map(move |(node, vrfs)| {
                vrfs.iter().map(move |(vrf, null_routed)| {
                    Edge::new(
                        states.pre_out_vrf(node, vrf),
                        states.node_drop_null_route(node),
                        null_routed.clone(),
                    )
                })
            })
    }

    fn vrf_leak_edges<'s>(
        &'s self,
        include: &'s dyn Fn(&str) -> bool,
    ) -> impl Iterator<Item = Edge<F::State, P>> + 's {
        let states = self.states;
        self.maps
            .next_vrf
            .iter()
            .filter(move |(node, _)| include(node.as_str()))
            .flat_map(move |(node, vrfs)| {
                vrfs.iter().flat_map(move |(vrf, next_vrfs)| {
                    next_vrfs.iter().map(move |(next_vrf, leaked)| {
                        Edge::new(
                            states.post_in_vrf(node, vrf),
                            states.post_in_vrf(node, next_vrf),
                            leaked.clone(),
                        )
                    })
                })
            })
    }

    fn interface_edges<'s>(
        &'s self,
        include: &'s dyn Fn(&str) -> bool,
    ) -> impl Iterator<Item = Edge<F::State, P>> + 's {
        let states = self.states;
        let maps = self.maps;
        ExitDisposition::ALL.into_iter().flat_map(move |disposition| {
            maps.interface_dispositions
                .iter()
                .filter(move |(node, _)| include(node.as_str()))
                .flat_map(move |(node, vrfs)| {
                    vrfs.iter().flat_map(move |(vrf, interfaces)| {
                        interfaces.iter().filter_map(move |(interface, sets)| {
                            sets.get(&disposition).map(|set| {
                                Edge::new(
                                    states.pre_out_vrf(node, vrf),
                                    states.pre_out_interface(disposition, node, interface),
                                    set.clone(),
                                )
                            })
                        })
                    })
                })
        })
    }
}
