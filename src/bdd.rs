// Binary decision diagrams over packet headers.
// Unlike textbook BDDs, we do not leave out any levels:
// every path from a root to a terminal visits every variable, i.e. every header bit, exactly once.
// Nodes are hash-consed, so two handles denote the same set iff they are the same index.

use crate::header::{HeaderField, IpField, Packet, PortField, PortRange};
use crate::packet_set::PacketSet;
use ipnetwork::Ipv4Network;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::rc::Rc;

/// Index into the store. The terminals are 0 (false) and 1 (true); internal nodes live at index - 2.
type NodeId = u32;
type Var = u32;

/// A node tests `level` and has one child for the bit being 0 and one for it being 1.
#[derive(Debug, Eq, Hash, PartialEq, Clone, Copy)]
struct BddNode {
    level: Var,
    x0: NodeId,
    x1: NodeId,
}

/// The store of BDD nodes (arena + hash-consing table + memo tables).
#[derive(Debug)]
pub struct BddStore {
    num_vars: Var,
    nodes: Vec<BddNode>,
    hc: HashMap<BddNode, NodeId>,
    // zero_at[d] and one_at[d] are the constant functions over variables d..num_vars
    zero_at: Vec<NodeId>,
    one_at: Vec<NodeId>,

    and_memo: HashMap<(NodeId, NodeId), NodeId>,
    or_memo: HashMap<(NodeId, NodeId), NodeId>,
    not_memo: HashMap<NodeId, NodeId>,
}

impl BddStore {
    pub fn new(num_vars: Var) -> Self {
        let mut store = Self {
            num_vars,
            nodes: vec![],
            hc: HashMap::new(),
            zero_at: vec![0; num_vars as usize + 1],
            one_at: vec![1; num_vars as usize + 1],
            and_memo: HashMap::new(),
            or_memo: HashMap::new(),
            not_memo: HashMap::new(),
        };
        for level in (0..num_vars).rev() {
            let below = level as usize + 1;
            let zero = store.zero_at[below];
            let one = store.one_at[below];
            store.zero_at[level as usize] = store.mk(level, zero, zero);
            store.one_at[level as usize] = store.mk(level, one, one);
        }
        store
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn zero(&self) -> NodeId {
        self.zero_at[0]
    }

    pub fn one(&self) -> NodeId {
        self.one_at[0]
    }

    fn get(&self, id: NodeId) -> BddNode {
        debug_assert!(id >= 2, "terminals have no children");
        self.nodes[id as usize - 2]
    }

    fn level(&self, id: NodeId) -> Var {
        if id < 2 { self.num_vars } else { self.get(id).level }
    }

    fn is_zero(&self, id: NodeId) -> bool {
        id == self.zero_at[self.level(id) as usize]
    }

    fn is_one(&self, id: NodeId) -> bool {
        id == self.one_at[self.level(id) as usize]
    }

    fn mk(&mut self, level: Var, x0: NodeId, x1: NodeId) -> NodeId {
        let node = BddNode { level, x0, x1 };
        if let Some(&id) = self.hc.get(&node) {
            return id;
        }
        let id = self.nodes.len() as NodeId + 2;
        self.nodes.push(node);
        self.hc.insert(node, id);
        id
    }

    pub fn and(&mut self, a: NodeId, b: NodeId) -> NodeId {
        if a == b {
            return a;
        }
        if let Some(&result) = self.and_memo.get(&(a, b)) {
            return result;
        }
        let level = self.level(a);
        debug_assert_eq!(level, self.level(b), "operands must be rooted at the same level");
        if self.is_zero(a) || self.is_zero(b) {
            return self.zero_at[level as usize];
        }
        if self.is_one(a) {
            return b;
        }
        if self.is_one(b) {
            return a;
        }
        let a_node = self.get(a);
        let b_node = self.get(b);
        let x0 = self.and(a_node.x0, b_node.x0);
        let x1 = self.and(a_node.x1, b_node.x1);
        let res = self.mk(level, x0, x1);
        self.and_memo.insert((a, b), res);
        res
    }

    pub fn or(&mut self, a: NodeId, b: NodeId) -> NodeId {
        if a == b {
            return a;
        }
        if let Some(&result) = self.or_memo.get(&(a, b)) {
            return result;
        }
        let level = self.level(a);
        debug_assert_eq!(level, self.level(b), "operands must be rooted at the same level");
        if self.is_one(a) || self.is_one(b) {
            return self.one_at[level as usize];
        }
        if self.is_zero(a) {
            return b;
        }
        if self.is_zero(b) {
            return a;
        }
        let a_node = self.get(a);
        let b_node = self.get(b);
        let x0 = self.or(a_node.x0, b_node.x0);
        let x1 = self.or(a_node.x1, b_node.x1);
        let res = self.mk(level, x0, x1);
        self.or_memo.insert((a, b), res);
        res
    }

    pub fn not(&mut self, a: NodeId) -> NodeId {
        if let Some(&result) = self.not_memo.get(&a) {
            return result;
        }
        let level = self.level(a);
        if self.is_zero(a) {
            return self.one_at[level as usize];
        }
        if self.is_one(a) {
            return self.zero_at[level as usize];
        }
        let node = self.get(a);
        let x0 = self.not(node.x0);
        let x1 = self.not(node.x1);
        let res = self.mk(level, x0, x1);
        self.not_memo.insert(a, res);
        res
    }

    pub fn is_empty(&self, a: NodeId) -> bool {
        self.is_zero(a)
    }

    /// The conjunction of the given literals. Contradictory literals give the empty set.
    pub fn cube(&mut self, literals: &[(Var, bool)]) -> NodeId {
        let mut fixed: Vec<Option<bool>> = vec![None; self.num_vars as usize];
        for &(var, value) in literals {
            assert!(var < self.num_vars, "variable {} out of range", var);
            match fixed[var as usize] {
                Some(prev) if prev != value => return self.zero(),
                _ => fixed[var as usize] = Some(value),
            }
        }
        let mut node = self.one_at[self.num_vars as usize];
        for level in (0..self.num_vars).rev() {
            let zero_below = self.zero_at[level as usize + 1];
            node = match fixed[level as usize] {
                None => self.mk(level, node, node),
                Some(false) => self.mk(level, node, zero_below),
                Some(true) => self.mk(level, zero_below, node),
            };
        }
        node
    }

    /// Follows the assignment `bits` (one per variable) from `root` to a terminal.
    pub fn eval(&self, root: NodeId, bits: &[bool]) -> bool {
        debug_assert_eq!(bits.len(), self.num_vars as usize);
        let mut node = root;
        while node >= 2 {
            let BddNode { level, x0, x1 } = self.get(node);
            node = if bits[level as usize] { x1 } else { x0 };
        }
        node == 1
    }

    /// Some satisfying assignment, preferring 0 bits; `None` for the empty set.
    pub fn example(&self, root: NodeId) -> Option<Vec<bool>> {
        if self.is_zero(root) {
            return None;
        }
        let mut bits = Vec::with_capacity(self.num_vars as usize);
        let mut node = root;
        while node >= 2 {
            let BddNode { x0, x1, .. } = self.get(node);
            if self.is_zero(x0) {
                bits.push(true);
                node = x1;
            } else {
                bits.push(false);
                node = x0;
            }
        }
        Some(bits)
    }

    #[cfg(test)]
    pub fn all(&mut self) -> Vec<NodeId> {
        self.all_helper(0)
    }

    #[cfg(test)]
    fn all_helper(&mut self, level: Var) -> Vec<NodeId> {
        if level == self.num_vars {
            return vec![0, 1];
        }
        let all_rec = self.all_helper(level + 1);
        let mut result = vec![];
        for &x0 in &all_rec {
            for &x1 in &all_rec {
                result.push(self.mk(level, x0, x1))
            }
        }
        result
    }
}

/// A shared BDD store laid out over the packet header (see [`HeaderField`]).
///
/// All [`Bdd`]s combined with one another must come from the same `HeaderSpace`.
#[derive(Clone, Debug)]
pub struct HeaderSpace {
    store: Rc<RefCell<BddStore>>,
}

impl Default for HeaderSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderSpace {
    pub fn new() -> Self {
        HeaderSpace {
            store: Rc::new(RefCell::new(BddStore::new(HeaderField::NUM_BITS))),
        }
    }

    fn wrap(&self, id: NodeId) -> Bdd {
        Bdd {
            space: self.clone(),
            id,
        }
    }

    pub fn universe(&self) -> Bdd {
        let id = self.store.borrow().one();
        self.wrap(id)
    }

    pub fn empty(&self) -> Bdd {
        let id = self.store.borrow().zero();
        self.wrap(id)
    }

    pub fn num_nodes(&self) -> usize {
        self.store.borrow().num_nodes()
    }

    /// Headers whose `field` agrees with `value` on its top `len` bits.
    pub fn prefix(&self, field: HeaderField, value: u64, len: u32) -> Bdd {
        let id = self.store.borrow_mut().cube(&prefix_literals(field, value, len));
        self.wrap(id)
    }

    pub fn field_eq(&self, field: HeaderField, value: u64) -> Bdd {
        self.prefix(field, value, field.width())
    }

    /// Headers whose `field` lies in `lo..=hi`, built as a union of aligned prefixes.
    pub fn range(&self, field: HeaderField, lo: u64, hi: u64) -> Bdd {
        let hi = hi.min(field.max_value());
        let mut store = self.store.borrow_mut();
        let mut acc = store.zero();
        for (value, len) in range_to_prefixes(lo, hi, field.width()) {
            let block = store.cube(&prefix_literals(field, value, len));
            acc = store.or(acc, block);
        }
        drop(store);
        self.wrap(acc)
    }

    pub fn ip_prefix(&self, field: IpField, network: Ipv4Network) -> Bdd {
        let base = u32::from(network.network()) as u64;
        self.prefix(field.into(), base, network.prefix() as u32)
    }

    pub fn ip_range(&self, field: IpField, lo: Ipv4Addr, hi: Ipv4Addr) -> Bdd {
        self.range(field.into(), u32::from(lo) as u64, u32::from(hi) as u64)
    }

    pub fn port_range(&self, field: PortField, range: PortRange) -> Bdd {
        self.range(field.into(), range.start as u64, range.end as u64)
    }

    pub fn protocol(&self, protocol: crate::header::IpProtocol) -> Bdd {
        self.field_eq(HeaderField::IpProtocol, protocol.number() as u64)
    }

    /// The singleton set holding exactly `packet`'s header bits.
    pub fn packet(&self, packet: &Packet) -> Bdd {
        let literals: Vec<(Var, bool)> = packet_bits(packet)
            .into_iter()
            .enumerate()
            .map(|(var, bit)| (var as Var, bit))
            .collect();
        let id = self.store.borrow_mut().cube(&literals);
        self.wrap(id)
    }

    fn same_store(&self, other: &HeaderSpace) -> bool {
        Rc::ptr_eq(&self.store, &other.store)
    }
}

/// A set of packet headers, as a handle into a [`HeaderSpace`].
#[derive(Clone)]
pub struct Bdd {
    space: HeaderSpace,
    id: NodeId,
}

impl Bdd {
    pub fn contains(&self, packet: &Packet) -> bool {
        self.space.store.borrow().eval(self.id, &packet_bits(packet))
    }

    /// A packet in the set, if any. Unconstrained bits are 0.
    pub fn example_packet(&self) -> Option<Packet> {
        let bits = self.space.store.borrow().example(self.id)?;
        Some(Packet::from_header_values(|field| read_field(&bits, field)))
    }

    fn combine(&self, other: &Bdd, op: fn(&mut BddStore, NodeId, NodeId) -> NodeId) -> Bdd {
        debug_assert!(self.space.same_store(&other.space), "mixing header spaces");
        let id = op(&mut *self.space.store.borrow_mut(), self.id, other.id);
        self.space.wrap(id)
    }
}

impl PartialEq for Bdd {
    fn eq(&self, other: &Self) -> bool {
        self.space.same_store(&other.space) && self.id == other.id
    }
}

impl Eq for Bdd {}

impl fmt::Debug for Bdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bdd({})", self.id)
    }
}

impl PacketSet for Bdd {
    fn and(&self, other: &Self) -> Self {
        self.combine(other, BddStore::and)
    }

    fn or(&self, other: &Self) -> Self {
        self.combine(other, BddStore::or)
    }

    fn not(&self) -> Self {
        let id = self.space.store.borrow_mut().not(self.id);
        self.space.wrap(id)
    }

    fn is_empty(&self) -> bool {
        self.space.store.borrow().is_empty(self.id)
    }

    fn empty_like(&self) -> Self {
        self.space.empty()
    }
}

fn prefix_literals(field: HeaderField, value: u64, len: u32) -> Vec<(Var, bool)> {
    let width = field.width();
    let len = len.min(width);
    (0..len)
        .map(|i| {
            let bit = (value >> (width - 1 - i)) & 1 == 1;
            (field.offset() + i, bit)
        })
        .collect()
}

/// Splits `lo..=hi` into maximal aligned blocks, returned as (base, prefix length).
fn range_to_prefixes(lo: u64, hi: u64, width: u32) -> Vec<(u64, u32)> {
    let mut blocks = vec![];
    let mut cur = lo;
    while cur <= hi {
        let mut size_bits = cur.trailing_zeros().min(width);
        while size_bits > 0 && cur + (1u64 << size_bits) - 1 > hi {
            size_bits -= 1;
        }
        blocks.push((cur, width - size_bits));
        cur += 1u64 << size_bits;
    }
    blocks
}

fn packet_bits(packet: &Packet) -> Vec<bool> {
    let mut bits = Vec::with_capacity(HeaderField::NUM_BITS as usize);
    for field in HeaderField::ALL {
        let value = packet.header_value(field);
        for i in 0..field.width() {
            bits.push((value >> (field.width() - 1 - i)) & 1 == 1);
        }
    }
    bits
}

fn read_field(bits: &[bool], field: HeaderField) -> u64 {
    let start = field.offset() as usize;
    bits[start..start + field.width() as usize]
        .iter()
        .fold(0u64, |acc, &bit| (acc << 1) | bit as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::IpProtocol;

    const N: Var = 2;

    #[test]
    fn test_laws_0() {
        let mut s = BddStore::new(N);
        let (zero, one) = (s.zero(), s.one());
        assert_eq!(s.not(one), zero);
        assert_eq!(s.not(zero), one);
    }

    #[test]
    fn test_laws_1() {
        let mut s = BddStore::new(N);
        let (zero, one) = (s.zero(), s.one());
        let all = s.all();
        for sp in all {
            let sp_complement = s.not(sp);
            assert_eq!(s.not(sp_complement), sp);

            assert_eq!(s.or(sp, zero), sp);
            assert_eq!(s.or(sp, one), one);
            assert_eq!(s.and(sp, one), sp);
            assert_eq!(s.and(sp, zero), zero);
            assert_eq!(s.and(sp, sp_complement), zero);
        }
    }

    #[test]
    fn test_laws_2() {
        let mut s = BddStore::new(N);
        let all = s.all();
        for &sp1 in &all {
            for &sp2 in &all {
                let sp1_complement = s.not(sp1);
                let sp2_complement = s.not(sp2);

                let union = s.or(sp1, sp2);
                let intersect = s.and(sp1, sp2);
                let complement_union = s.or(sp1_complement, sp2_complement);
                let complement_intersect = s.and(sp1_complement, sp2_complement);

                assert_eq!(complement_union, s.not(intersect));
                assert_eq!(complement_intersect, s.not(union));

                assert_eq!(union, s.or(sp2, sp1));
                assert_eq!(intersect, s.and(sp2, sp1));
            }
        }
    }

    #[test]
    fn test_cube_and_eval() {
        let mut s = BddStore::new(3);
        let c = s.cube(&[(0, true), (2, false)]);
        assert!(s.eval(c, &[true, false, false]));
        assert!(s.eval(c, &[true, true, false]));
        assert!(!s.eval(c, &[false, true, false]));
        assert!(!s.eval(c, &[true, true, true]));
        assert_eq!(s.cube(&[(1, true), (1, false)]), s.zero());
        assert_eq!(s.example(c), Some(vec![true, false, false]));
        assert_eq!(s.example(s.zero()), None);
    }

    #[test]
    fn test_range_to_prefixes() {
        assert_eq!(range_to_prefixes(0, 255, 8), vec![(0, 0)]);
        assert_eq!(range_to_prefixes(5, 5, 8), vec![(5, 8)]);
        assert_eq!(range_to_prefixes(1, 6, 8), vec![(1, 8), (2, 7), (4, 7), (6, 8)]);
        assert!(range_to_prefixes(7, 6, 8).is_empty());
    }

    #[test]
    fn test_ip_prefix_membership() {
        let hs = HeaderSpace::new();
        let net: Ipv4Network = "10.0.0.0/24".parse().unwrap();
        let set = hs.ip_prefix(IpField::Destination, net);
        let inside = Packet::tcp(Ipv4Addr::new(1, 1, 1, 1), 1, Ipv4Addr::new(10, 0, 0, 7), 80);
        let outside = Packet::tcp(Ipv4Addr::new(1, 1, 1, 1), 1, Ipv4Addr::new(10, 0, 1, 7), 80);
        assert!(set.contains(&inside));
        assert!(!set.contains(&outside));
        assert!(set.not().contains(&outside));
        assert!(!set.is_empty());
        assert!(set.and(&set.not()).is_empty());
    }

    #[test]
    fn test_port_range_membership() {
        let hs = HeaderSpace::new();
        let set = hs.port_range(PortField::Destination, PortRange::new(1000, 2000));
        let ip = Ipv4Addr::new(1, 1, 1, 1);
        assert!(set.contains(&Packet::udp(ip, 1, ip, 1000)));
        assert!(set.contains(&Packet::udp(ip, 1, ip, 1500)));
        assert!(set.contains(&Packet::udp(ip, 1, ip, 2000)));
        assert!(!set.contains(&Packet::udp(ip, 1, ip, 999)));
        assert!(!set.contains(&Packet::udp(ip, 1, ip, 2001)));
    }

    #[test]
    fn test_singleton_and_example() {
        let hs = HeaderSpace::new();
        let p = Packet::tcp(Ipv4Addr::new(192, 168, 1, 1), 4242, Ipv4Addr::new(8, 8, 8, 8), 443);
        let single = hs.packet(&p);
        assert!(single.contains(&p));
        assert_eq!(single.example_packet(), Some(p));
        assert_eq!(hs.empty().example_packet(), None);

        let tcp = hs.protocol(IpProtocol::Tcp);
        let example = tcp.example_packet().unwrap();
        assert_eq!(example.ip_protocol, IpProtocol::Tcp);
        assert!(tcp.contains(&example));
    }

    #[test]
    fn test_hash_consing_gives_structural_equality() {
        let hs = HeaderSpace::new();
        let a = hs.range(HeaderField::DstPort, 0, 1023);
        let b = hs.prefix(HeaderField::DstPort, 0, 6);
        assert_eq!(a, b);
        assert_eq!(a.or(&a.not()), hs.universe());
        assert_eq!(hs.universe().not(), hs.empty());
    }
}
