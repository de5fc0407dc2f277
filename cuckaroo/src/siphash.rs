//! Keyed SipHash-2-4 in counter mode
//!
//! Every edge endpoint in the graph is one evaluation of this function. The
//! construction differs from vanilla SipHash in the same ways as other
//! cycle-finding puzzles:
//!
//!   - Seeding: all 256 bits of SipHash state are taken directly from a
//!     Blake2b-256 digest of the puzzle header, instead of expanding a
//!     128-bit key with the nothing-up-my-sleeve constants.
//!
//!   - The input is always a single 64-bit counter. There is no length
//!     block or padding; the counter is mixed into `v3` before the two
//!     compression rounds and into `v0` after them.
//!
//! SipHash is defined by Jean-Philippe Aumasson and Daniel J.Bernstein in
//! their paper "SipHash: a fast short-input PRF" (2012).

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use std::fmt::{self, Debug};

/// Blake2b with a 256-bit digest, used for key derivation
type Blake2b256 = Blake2b<U32>;

/// The four key words of one puzzle instance
///
/// These are used directly as the initial SipHash state.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct SipKeys {
    /// Initial value of `v0`
    k0: u64,
    /// Initial value of `v1`
    k1: u64,
    /// Initial value of `v2`
    k2: u64,
    /// Initial value of `v3`
    k3: u64,
}

impl Debug for SipKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SipKeys[ {:#018x}, {:#018x}, {:#018x}, {:#018x} ]",
            self.k0, self.k1, self.k2, self.k3
        )
    }
}

impl From<SipKeys> for [u64; 4] {
    #[inline(always)]
    fn from(k: SipKeys) -> Self {
        [k.k0, k.k1, k.k2, k.k3]
    }
}

impl From<[u64; 4]> for SipKeys {
    #[inline(always)]
    fn from(a: [u64; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }
}

impl SipKeys {
    /// Size of the key material in bytes
    pub const SIZE: usize = 32;

    /// Construct keys from four words.
    #[inline(always)]
    pub fn new(k0: u64, k1: u64, k2: u64, k3: u64) -> Self {
        Self { k0, k1, k2, k3 }
    }

    /// Construct keys from 32 bytes, as four little-endian words.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let word = |i: usize| {
            let mut w = [0u8; 8];
            w.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            u64::from_le_bytes(w)
        };
        Self::new(word(0), word(1), word(2), word(3))
    }

    /// Derive keys for one puzzle from a header and an optional nonce.
    ///
    /// The key material is `blake2b-256(header || nonce)`, with the nonce
    /// appended as 8 little-endian bytes when present. Miners vary the
    /// nonce to get a fresh graph for the same header.
    pub fn from_header(header: &[u8], nonce: Option<u64>) -> Self {
        let mut hasher = Blake2b256::new();
        hasher.update(header);
        if let Some(nonce) = nonce {
            hasher.update(nonce.to_le_bytes());
        }
        let mut digest = [0u8; Self::SIZE];
        digest.copy_from_slice(&hasher.finalize());
        Self::from_bytes(&digest)
    }
}

/// Internal state of one SipHash evaluation
#[derive(Clone, Copy, Eq, PartialEq)]
struct SipState {
    /// State variable V0 as defined in the SipHash paper
    v0: u64,
    /// State variable V1 as defined in the SipHash paper
    v1: u64,
    /// State variable V2 as defined in the SipHash paper
    v2: u64,
    /// State variable V3 as defined in the SipHash paper
    v3: u64,
}

impl From<&SipKeys> for SipState {
    #[inline(always)]
    fn from(k: &SipKeys) -> Self {
        Self {
            v0: k.k0,
            v1: k.k1,
            v2: k.k2,
            v3: k.k3,
        }
    }
}

impl SipState {
    /// One `SipRound` as defined in the SipHash paper
    ///
    /// Modifies the `SipState` in-place.
    #[inline(always)]
    fn sip_round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v1 = self.v1.rotate_left(13);
        self.v3 = self.v3.rotate_left(16);
        self.v1 ^= self.v0;
        self.v3 ^= self.v2;
        self.v0 = self.v0.rotate_left(32);

        self.v2 = self.v2.wrapping_add(self.v1);
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v1 = self.v1.rotate_left(17);
        self.v3 = self.v3.rotate_left(21);
        self.v1 ^= self.v2;
        self.v3 ^= self.v0;
        self.v2 = self.v2.rotate_left(32);
    }
}

/// SipHash-2-4 of a single counter, with 64-bit output
#[inline(always)]
pub fn siphash24(keys: &SipKeys, input: u64) -> u64 {
    let mut s = SipState::from(keys);
    s.v3 ^= input;

    s.sip_round();
    s.sip_round();

    s.v0 ^= input;
    s.v2 ^= 0xff;

    s.sip_round();
    s.sip_round();
    s.sip_round();
    s.sip_round();

    s.v0 ^ s.v1 ^ s.v2 ^ s.v3
}
