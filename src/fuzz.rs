use crate::acl::MatchExpr;
use crate::bdd::{Bdd, HeaderSpace};
use crate::graph::{
    DispositionMaps, ExitDisposition, ForwardingGraphGenerator, ForwardingStates, NamedStates, SymbolicState,
};
use crate::header::{HeaderField, IpField, PortField, PortRange};
use crate::ip_space::IpSpace;
use crate::packet_set::PacketSet;
use crate::transformation::{IpPool, Transformation, TransformationStep, TransformationType};
use ipnetwork::Ipv4Network;
use rand::Rng;
use std::net::Ipv4Addr;

// --- Random disposition maps ---

/// A union of up to three short destination prefixes; sometimes empty.
pub fn random_dst_set<R: Rng>(hs: &HeaderSpace, rng: &mut R) -> Bdd {
    let mut set = hs.empty();
    for _ in 0..rng.random_range(0..4) {
        let len = rng.random_range(1..6);
        let value = rng.random::<u32>() as u64;
        set = set.or(&hs.prefix(HeaderField::DstIp, value, len));
    }
    set
}

/// Disposition maps over `num_nodes` nodes with up to two VRFs each.
pub fn random_disposition_maps<R: Rng>(hs: &HeaderSpace, rng: &mut R, num_nodes: usize) -> DispositionMaps<Bdd> {
    let mut maps = DispositionMaps::new(hs.universe());
    for n in 0..num_nodes {
        let node = format!("r{}", n);
        let vrfs = ["default", "blue"];
        let num_vrfs = rng.random_range(1..=vrfs.len());
        for vrf in &vrfs[..num_vrfs] {
            if rng.random_bool(0.7) {
                maps.accept(&node, vrf, random_dst_set(hs, rng));
            }
            if rng.random_bool(0.5) {
                maps.null_route(&node, vrf, random_dst_set(hs, rng));
            }
            if rng.random_bool(0.3) {
                let next = vrfs[rng.random_range(0..vrfs.len())];
                maps.leak(&node, vrf, next, random_dst_set(hs, rng));
            }
            for i in 0..rng.random_range(0..3) {
                let disposition = ExitDisposition::ALL[rng.random_range(0..ExitDisposition::ALL.len())];
                maps.exit(&node, vrf, &format!("eth{}", i), disposition, random_dst_set(hs, rng));
            }
            maps.declare_vrf(&node, vrf);
        }
    }
    maps
}

/// Checks that the drop-no-route edges partition each VRF's headers together with the accept and
/// null-route sets. Returns a description of every violation.
pub fn check_no_route_partition(maps: &DispositionMaps<Bdd>) -> Vec<String> {
    let states = NamedStates;
    let generator = ForwardingGraphGenerator::new(maps, &states);
    let edges: Vec<_> = generator.edges().collect();
    let empty = maps.universe.empty_like();
    let guard = |source: SymbolicState, target: SymbolicState| {
        edges
            .iter()
            .find(|e| e.source == source && e.target == target)
            .map(|e| e.guard.clone())
            .unwrap_or_else(|| empty.clone())
    };

    let mut violations = vec![];
    for (node, vrf) in maps.vrfs() {
        let accepted = guard(states.post_in_vrf(node, vrf), states.node_accept(node));
        let dropped = guard(states.post_in_vrf(node, vrf), states.node_drop_no_route(node));
        let null_routed = guard(states.pre_out_vrf(node, vrf), states.node_drop_null_route(node));
        if accepted.or(&null_routed).or(&dropped) != maps.universe {
            violations.push(format!("{}/{}: dispositions do not cover the universe", node, vrf));
        }
        if dropped.intersects(&accepted) {
            violations.push(format!("{}/{}: drop-no-route overlaps accept", node, vrf));
        }
        if dropped.intersects(&null_routed) {
            violations.push(format!("{}/{}: drop-no-route overlaps null route", node, vrf));
        }
    }
    if let Some(edge) = edges.iter().find(|e| e.guard.is_empty()) {
        violations.push(format!("empty guard on {} -> {}", edge.source, edge.target));
    }
    violations
}

// --- Random transformations ---

fn random_type<R: Rng>(rng: &mut R) -> TransformationType {
    match rng.random_range(0..3) {
        0 => TransformationType::DestNat,
        1 => TransformationType::SourceNat,
        _ => TransformationType::StaticNat,
    }
}

fn random_ip_field<R: Rng>(rng: &mut R) -> IpField {
    if rng.random_bool(0.5) { IpField::Source } else { IpField::Destination }
}

fn random_ip<R: Rng>(rng: &mut R) -> Ipv4Addr {
    // Small address space so rewrites collide with each other and with guards.
    Ipv4Addr::new(10, 0, 0, rng.random_range(0..16))
}

/// A random step that never fails on a TCP or UDP packet.
pub fn random_step<R: Rng>(rng: &mut R, depth: usize) -> TransformationStep {
    let choice = if depth == 0 { rng.random_range(0..4) } else { rng.random_range(0..6) };
    match choice {
        0 => {
            let lo = random_ip(rng);
            let hi = Ipv4Addr::from(u32::from(lo) + rng.random_range(0..4));
            TransformationStep::assign_ip(random_type(rng), random_ip_field(rng), IpPool::range(lo, hi))
        }
        1 => {
            let len = rng.random_range(24..=32);
            let subnet = Ipv4Network::new(random_ip(rng), len).unwrap_or_else(|_| Ipv4Network::from(random_ip(rng)));
            TransformationStep::shift_ip(random_type(rng), random_ip_field(rng), subnet)
        }
        2 => {
            let field = if rng.random_bool(0.5) { PortField::Source } else { PortField::Destination };
            let start = rng.random_range(1000..1010);
            TransformationStep::assign_port(random_type(rng), field, start, start + rng.random_range(0..10))
        }
        3 => TransformationStep::noop(random_type(rng)),
        4 => TransformationStep::apply_all(random_steps(rng, depth - 1)),
        _ => {
            let n = rng.random_range(1..4);
            TransformationStep::apply_any((0..n).map(|_| random_step(rng, depth - 1)).collect())
        }
    }
}

pub fn random_steps<R: Rng>(rng: &mut R, depth: usize) -> Vec<TransformationStep> {
    let n = rng.random_range(0..3);
    (0..n).map(|_| random_step(rng, depth)).collect()
}

fn random_guard<R: Rng>(rng: &mut R) -> MatchExpr {
    let lo = random_ip(rng);
    let hi = Ipv4Addr::from(u32::from(lo) + rng.random_range(0..8));
    match rng.random_range(0..3) {
        0 => MatchExpr::dst_ip(IpSpace::range(lo, hi)),
        1 => MatchExpr::src_ip(IpSpace::range(lo, hi)),
        _ => MatchExpr::dst_port(PortRange::new(1000, 1005)),
    }
}

/// A random transformation tree. With `guarded` false no node has a guard.
pub fn random_transformation<R: Rng>(rng: &mut R, depth: usize, guarded: bool) -> Transformation {
    let mut node = Transformation::always(random_steps(rng, 2));
    if guarded && rng.random_bool(0.6) {
        node.guard = Some(random_guard(rng));
    }
    if depth > 0 {
        if rng.random_bool(0.5) {
            node = node.and_then(random_transformation(rng, depth - 1, guarded));
        }
        if guarded && rng.random_bool(0.5) {
            node = node.or_else(random_transformation(rng, depth - 1, guarded));
        }
    }
    node
}

/// Number of outcomes a step produces on its own.
pub fn branch_count(step: &TransformationStep) -> usize {
    match step {
        TransformationStep::ApplyAll(steps) => steps.iter().map(branch_count).product(),
        TransformationStep::ApplyAny(steps) => steps.iter().map(branch_count).sum(),
        _ => 1,
    }
}

/// Number of outcomes of an unguarded tree.
pub fn unguarded_branch_count(t: &Transformation) -> usize {
    let here: usize = t.steps.iter().map(branch_count).product();
    here * t.and_then.as_deref().map_or(1, unguarded_branch_count)
}
