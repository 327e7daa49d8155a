//! The packet-set algebra the forwarding graph is built over.

use std::fmt::Debug;

/// An immutable set of packet headers.
///
/// Any boolean algebra over headers works. The crate ships [`crate::bdd::Bdd`] as the reference implementation.
pub trait PacketSet: Clone + PartialEq + Debug {
    fn and(&self, other: &Self) -> Self;
    fn or(&self, other: &Self) -> Self;
    fn not(&self) -> Self;
    fn is_empty(&self) -> bool;

    fn difference(&self, other: &Self) -> Self {
        self.and(&other.not())
    }

    fn intersects(&self, other: &Self) -> bool {
        !self.and(other).is_empty()
    }

    /// The empty set, derived from any member of the algebra.
    fn empty_like(&self) -> Self {
        self.and(&self.not())
    }
}
