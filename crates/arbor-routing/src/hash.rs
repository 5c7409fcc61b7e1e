//! Deterministic selection hash
//!
//! Initial tree and path choices hash the numeric node id with the
//! splitmix64 finalizer. Results are identical across processes and
//! platforms.

use clos_fabric::NodeId;

/// splitmix64 finalizer
#[inline]
pub const fn mix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Hash of a single node
#[inline]
pub fn node_hash(node: NodeId) -> u64 {
    mix64(node.0 as u64)
}

/// Hash of a (canonical source, real destination) pair
#[inline]
pub fn pair_hash(source: NodeId, destination: NodeId) -> u64 {
    mix64(node_hash(source) ^ destination.0 as u64)
}

/// `hash mod len` as an index
#[inline]
pub fn pick(hash: u64, len: usize) -> usize {
    (hash % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_values() {
        assert_eq!(mix64(0), 0xE220_A839_7B1D_CDAF);
        assert_eq!(mix64(1), 0x910A_2DEC_8902_5CC1);
    }

    #[test]
    fn test_pair_hash_is_ordered() {
        let a = NodeId(12);
        let b = NodeId(13);
        assert_ne!(pair_hash(a, b), pair_hash(b, a));
        assert_eq!(pair_hash(a, b), pair_hash(a, b));
    }

    #[test]
    fn test_fan_out_four_access_parities() {
        // access nodes of the fan-out-4 fabric are ids 12..20
        let parities: Vec<usize> = (12..20).map(|i| pick(node_hash(NodeId(i)), 2)).collect();
        assert_eq!(parities, vec![1, 1, 0, 1, 1, 1, 0, 0]);
    }
}
