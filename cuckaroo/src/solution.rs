//! Representation and validation of cycle proofs
//!
//! A proof is an array of [`PROOF_SIZE`] nonces in strictly ascending
//! order. Re-hashing each nonce gives one edge, and together the edges must
//! form a single closed cycle that visits every edge once.

use crate::edge::{Edge, EdgeHasher, Nonce};
use crate::err::Error;
use crate::PROOF_SIZE;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::mem;

/// A raw nonce array which may or may not be a well-formed [`Proof`]
pub type ProofArray = [Nonce; PROOF_SIZE];

/// A byte array of the right length to convert to/from a [`Proof`]
pub type ProofByteArray = [u8; Proof::NUM_BYTES];

/// Candidate solution to a cycle puzzle
///
/// The `Proof` type itself verifies that its nonces are sorted and unique,
/// but not that they form a cycle in any particular graph.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Nonce>", into = "Vec<Nonce>")]
pub struct Proof {
    /// Inner fixed-sized array of nonces
    nonces: ProofArray,
}

impl Proof {
    /// Number of nonces in each proof
    pub const NUM_NONCES: usize = PROOF_SIZE;

    /// Size of each nonce, in bytes
    const NONCE_SIZE: usize = mem::size_of::<Nonce>();

    /// Number of bytes in the fixed-width representation of a proof
    pub const NUM_BYTES: usize = Self::NUM_NONCES * Self::NONCE_SIZE;

    /// Build a [`Proof`] from an array of nonces, checking that they are
    /// strictly ascending.
    pub fn try_from_array(nonces: &ProofArray) -> Result<Self, Error> {
        if nonces.windows(2).all(|pair| pair[0] < pair[1]) {
            Ok(Self { nonces: *nonces })
        } else {
            Err(Error::Order)
        }
    }

    /// Build a [`Proof`] from a slice, checking its length and order.
    pub fn try_from_slice(nonces: &[Nonce]) -> Result<Self, Error> {
        let array: &ProofArray = nonces
            .try_into()
            .map_err(|_| Error::ProofSize(nonces.len()))?;
        Self::try_from_array(array)
    }

    /// Build a [`Proof`] from little-endian 32-bit nonces.
    pub fn try_from_bytes(bytes: &ProofByteArray) -> Result<Self, Error> {
        let mut array: ProofArray = [0; PROOF_SIZE];
        for (nonce, chunk) in array.iter_mut().zip(bytes.chunks_exact(Self::NONCE_SIZE)) {
            let mut word = [0u8; Self::NONCE_SIZE];
            word.copy_from_slice(chunk);
            *nonce = Nonce::from_le_bytes(word);
        }
        Self::try_from_array(&array)
    }

    /// Return the fixed-width byte representation of this proof.
    pub fn to_bytes(&self) -> ProofByteArray {
        let mut result = [0u8; Self::NUM_BYTES];
        for (chunk, nonce) in result.chunks_exact_mut(Self::NONCE_SIZE).zip(&self.nonces) {
            chunk.copy_from_slice(&nonce.to_le_bytes());
        }
        result
    }

    /// Pack each nonce into `edge_bits` bits, least significant first.
    ///
    /// This is the canonical encoding that proof hashes are computed over.
    pub fn to_compact(&self, edge_bits: u32) -> Vec<u8> {
        let width = edge_bits as usize;
        let mut bytes = vec![0u8; (PROOF_SIZE * width + 7) / 8];
        for (i, &nonce) in self.nonces.iter().enumerate() {
            for bit in 0..width {
                if (nonce >> bit) & 1 == 1 {
                    let pos = i * width + bit;
                    bytes[pos / 8] |= 1 << (pos % 8);
                }
            }
        }
        bytes
    }

    /// Blake2b-256 of the compact encoding
    pub fn hash(&self, edge_bits: u32) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Blake2b::<U32>::digest(self.to_compact(edge_bits)));
        out
    }

    /// First eight bytes of [`Self::hash()`], big-endian
    ///
    /// Smaller values are harder to find. A proof meets a target when this
    /// value is at or below it.
    pub fn hash_value(&self, edge_bits: u32) -> u64 {
        let hash = self.hash(edge_bits);
        let mut word = [0u8; 8];
        word.copy_from_slice(&hash[..8]);
        u64::from_be_bytes(word)
    }

    /// Difficulty of this proof, `u64::MAX / hash_value`
    pub fn difficulty(&self, edge_bits: u32) -> u64 {
        u64::MAX / self.hash_value(edge_bits).max(1)
    }

    /// The proof's nonces, ascending
    pub fn nonces(&self) -> &ProofArray {
        &self.nonces
    }
}

impl AsRef<ProofArray> for Proof {
    fn as_ref(&self) -> &ProofArray {
        &self.nonces
    }
}

impl From<Proof> for ProofArray {
    fn from(proof: Proof) -> ProofArray {
        proof.nonces
    }
}

impl From<Proof> for Vec<Nonce> {
    fn from(proof: Proof) -> Vec<Nonce> {
        proof.nonces.to_vec()
    }
}

impl TryFrom<Vec<Nonce>> for Proof {
    type Error = Error;

    fn try_from(nonces: Vec<Nonce>) -> Result<Self, Error> {
        Self::try_from_slice(&nonces)
    }
}

/// Check that `edges`, in proof order, form one closed cycle.
///
/// Every node must be shared by exactly two edges, and walking from edge to
/// edge through those shared nodes must visit all of them before returning
/// to the first.
pub fn check_cycle(edges: &[Edge; PROOF_SIZE]) -> Result<(), Error> {
    let mut uvs = [0u32; 2 * PROOF_SIZE];
    let (mut xor0, mut xor1) = (0u32, 0u32);
    for (i, edge) in edges.iter().enumerate() {
        uvs[2 * i] = edge.u();
        uvs[2 * i + 1] = edge.v();
        xor0 ^= edge.u();
        xor1 ^= edge.v();
    }
    if xor0 | xor1 != 0 {
        return Err(Error::Endpoints);
    }

    // Positions 2i and 2i + 1 hold the two ends of edge i. Stepping by two
    // stays on the same side while looking for the node's other edge.
    let mut n = 0;
    let mut i = 0;
    loop {
        let mut j = i;
        let mut k = i;
        loop {
            k = (k + 2) % (2 * PROOF_SIZE);
            if k == i {
                break;
            }
            if uvs[k] == uvs[i] {
                if j != i {
                    return Err(Error::Branch);
                }
                j = k;
            }
        }
        if j == i {
            return Err(Error::DeadEnd);
        }
        i = j ^ 1;
        n += 1;
        if i == 0 {
            break;
        }
    }
    if n == PROOF_SIZE {
        Ok(())
    } else {
        Err(Error::ShortCycle)
    }
}

/// Check a proof against the graph defined by `hasher`.
pub(crate) fn verify(hasher: &EdgeHasher, proof: &Proof) -> Result<(), Error> {
    let num_edges = hasher.num_edges();
    let mut edges = [Edge::default(); PROOF_SIZE];
    for (edge, &nonce) in edges.iter_mut().zip(proof.nonces()) {
        if nonce >= num_edges {
            return Err(Error::NonceRange { nonce, num_edges });
        }
        *edge = hasher.edge(nonce);
    }
    check_cycle(&edges)
}

#[cfg(test)]
mod test {
    use super::{check_cycle, Proof, ProofArray};
    use crate::edge::Edge;
    use crate::err::Error;
    use crate::PROOF_SIZE;

    fn ascending() -> ProofArray {
        let mut array = [0; PROOF_SIZE];
        for (i, nonce) in array.iter_mut().enumerate() {
            *nonce = 3 * i as u32 + 1;
        }
        array
    }

    /// A 42-cycle listed in walk order
    fn ring() -> [Edge; PROOF_SIZE] {
        let mut edges = [Edge::default(); PROOF_SIZE];
        let half = PROOF_SIZE as u32 / 2;
        for i in 0..half {
            let u = 2 * i;
            edges[2 * i as usize] = Edge::new(u, u + 1);
            edges[2 * i as usize + 1] = Edge::new(2 * ((i + 1) % half), u + 1);
        }
        edges
    }

    #[test]
    fn order_is_checked() {
        let array = ascending();
        assert!(Proof::try_from_array(&array).is_ok());

        let mut swapped = array;
        swapped.swap(3, 4);
        assert!(matches!(Proof::try_from_array(&swapped), Err(Error::Order)));

        let mut repeated = array;
        repeated[5] = repeated[4];
        assert!(matches!(Proof::try_from_array(&repeated), Err(Error::Order)));

        assert!(matches!(
            Proof::try_from_slice(&array[1..]),
            Err(Error::ProofSize(41))
        ));
    }

    #[test]
    fn byte_encodings() {
        let proof = Proof::try_from_array(&ascending()).unwrap();
        let bytes = proof.to_bytes();
        assert_eq!(&bytes[..8], &[1, 0, 0, 0, 4, 0, 0, 0]);
        assert_eq!(Proof::try_from_bytes(&bytes).unwrap(), proof);

        // 16-bit nonces pack as plain little-endian u16s
        let compact = proof.to_compact(16);
        assert_eq!(compact.len(), 84);
        assert_eq!(&compact[..4], &[1, 0, 4, 0]);

        // 29-bit nonces straddle byte boundaries
        let compact = proof.to_compact(29);
        assert_eq!(compact.len(), 153);
        assert_eq!(compact[0], 1);
        assert_eq!(compact[3], 4 << 5);
    }

    #[test]
    fn serde_checks_order() {
        let proof = Proof::try_from_array(&ascending()).unwrap();
        let nonces: Vec<u32> = proof.clone().into();
        assert_eq!(Proof::try_from(nonces).unwrap(), proof);

        let mut reversed = ascending().to_vec();
        reversed.reverse();
        assert!(Proof::try_from(reversed).is_err());
    }

    #[test]
    fn cycle_walk() {
        let edges = ring();
        assert!(check_cycle(&edges).is_ok());

        // Proof order doesn't matter to the walk.
        let mut shuffled = edges;
        shuffled.reverse();
        shuffled.swap(0, 17);
        assert!(check_cycle(&shuffled).is_ok());

        let mut broken = edges;
        broken[5] = Edge::new(broken[5].u() + 1000, broken[5].v());
        assert!(matches!(check_cycle(&broken), Err(Error::Endpoints)));
    }

    #[test]
    fn two_short_cycles() {
        // Two disjoint 21-cycles can't exist in a bipartite graph, but a
        // 20-cycle and a 22-cycle can.
        let mut edges = [Edge::default(); PROOF_SIZE];
        let mut n = 0;
        for (half, base) in [(10u32, 0u32), (11, 100)] {
            for i in 0..half {
                let u = base + 2 * i;
                edges[n] = Edge::new(u, u + 1);
                edges[n + 1] = Edge::new(base + 2 * ((i + 1) % half), u + 1);
                n += 2;
            }
        }
        assert!(matches!(check_cycle(&edges), Err(Error::ShortCycle)));
    }

    #[test]
    fn branching_nodes() {
        // A figure eight through node 0: both XORs vanish, but node 0 has
        // four incident edges.
        let mut edges = [Edge::default(); PROOF_SIZE];
        let mut n = 0;
        for (half, base) in [(10u32, 0u32), (11, 100)] {
            for i in 0..half {
                let u = if i == 0 { 0 } else { base + 2 * i };
                let next = if (i + 1) % half == 0 { 0 } else { base + 2 * (i + 1) };
                let v = base + 2 * i + 1;
                edges[n] = Edge::new(u, v);
                edges[n + 1] = Edge::new(next, v);
                n += 2;
            }
        }
        assert!(matches!(check_cycle(&edges), Err(Error::Branch)));
    }
}
