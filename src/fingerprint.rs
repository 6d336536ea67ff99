//! Content fingerprinting: exact hashing and near-duplicate signatures.
//!
//! Two fingerprints are computed per visit:
//! - `exact_hash`: SHA-256 over the raw UTF-8 bytes, for byte-identical
//!   duplicate detection.
//! - `simhash`: a 32-bit locality-sensitive signature built from character
//!   shingles, for near-duplicate detection via Hamming distance.
//!
//! The per-shingle mixing hash is a pinned algorithm contract: signatures
//! stored by older builds must stay comparable, so the exact add/xor/rotate
//! sequence and u32 wraparound behavior below must not change.

use crate::config::FingerprintConfig;
use sha2::{Digest, Sha256};

/// Signature width in bits. Rendered as `SIGNATURE_BITS / 4` hex digits.
pub const SIGNATURE_BITS: u32 = 32;

/// Seeds for the shingle mixer. Changing either invalidates stored signatures.
const MIX_SEED_PRIMARY: u32 = 0x9e37_79b9;
const MIX_SEED_SECONDARY: u32 = 0x85eb_ca6b;

/// SHA-256 of the text's UTF-8 bytes as lowercase hex.
///
/// No normalization is applied: two texts differing in a single character
/// never match.
pub fn exact_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// SimHash engine. Holds the shingling and aggregation tunables so tests
/// can exercise edge thresholds without touching global state.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    shingle_size: usize,
    max_features: usize,
}

impl Fingerprinter {
    pub fn new(config: &FingerprintConfig) -> Self {
        Self {
            shingle_size: config.shingle_size.max(1),
            max_features: config.max_features.max(1),
        }
    }

    /// Compute the 32-bit SimHash signature, rendered as 8 lowercase hex
    /// digits, zero-padded.
    pub fn simhash(&self, text: &str) -> String {
        format!("{:08x}", self.simhash_raw(text))
    }

    pub fn simhash_raw(&self, text: &str) -> u32 {
        let mut hashes: Vec<u32> = self
            .shingles(text)
            .iter()
            .map(|s| mix32(s.as_bytes(), MIX_SEED_PRIMARY, MIX_SEED_SECONDARY))
            .collect();

        // Deterministic truncation: keep the lowest max_features hashes.
        hashes.sort_unstable();
        hashes.truncate(self.max_features);

        let mut weights = [0i32; SIGNATURE_BITS as usize];
        for hash in &hashes {
            for (bit, weight) in weights.iter_mut().enumerate() {
                if hash & (1u32 << bit) != 0 {
                    *weight += 1;
                } else {
                    *weight -= 1;
                }
            }
        }

        let mut signature = 0u32;
        for (bit, weight) in weights.iter().enumerate() {
            if *weight > 0 {
                signature |= 1u32 << bit;
            }
        }
        signature
    }

    /// Contiguous fixed-width character chunks. Inputs no longer than the
    /// shingle size produce a single whole-input shingle.
    fn shingles(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.shingle_size {
            return vec![text.to_string()];
        }

        chars
            .chunks(self.shingle_size)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}

/// Hamming distance between two hex-rendered signatures, in `[0, 32]`.
///
/// Malformed input yields the maximum distance rather than an error;
/// comparison must never fail the caller.
pub fn hamming_distance(a: &str, b: &str) -> u32 {
    match (parse_signature(a), parse_signature(b)) {
        (Some(a), Some(b)) => (a ^ b).count_ones(),
        _ => SIGNATURE_BITS,
    }
}

/// Jaccard-style bit similarity: popcount(AND) / popcount(OR).
///
/// Two all-zero signatures are maximally similar (1.0). Malformed input
/// yields 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = match (parse_signature(a), parse_signature(b)) {
        (Some(a), Some(b)) => (a, b),
        _ => return 0.0,
    };

    let union = (a | b).count_ones();
    if union == 0 {
        return 1.0;
    }
    f64::from((a & b).count_ones()) / f64::from(union)
}

fn parse_signature(hex: &str) -> Option<u32> {
    if hex.is_empty() || hex.len() > 8 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Non-cryptographic 32-bit mixing hash over a byte slice.
///
/// Three accumulators seeded from the input length and two constants,
/// 12-byte blocks through `block_mix`, remainder folded in little-endian,
/// then `final_mix`. All arithmetic is wrapping u32; this exact permutation
/// is load-bearing for signature comparability.
fn mix32(data: &[u8], seed_primary: u32, seed_secondary: u32) -> u32 {
    let mut a = 0xdead_beef_u32
        .wrapping_add(data.len() as u32)
        .wrapping_add(seed_primary);
    let mut b = a;
    let mut c = a.wrapping_add(seed_secondary);

    let mut rest = data;
    while rest.len() > 12 {
        a = a.wrapping_add(read_u32_le(&rest[0..4]));
        b = b.wrapping_add(read_u32_le(&rest[4..8]));
        c = c.wrapping_add(read_u32_le(&rest[8..12]));
        (a, b, c) = block_mix(a, b, c);
        rest = &rest[12..];
    }

    if rest.is_empty() {
        return c;
    }

    // Tail: up to 12 remaining bytes folded in little-endian order.
    let mut tail = [0u8; 12];
    tail[..rest.len()].copy_from_slice(rest);
    a = a.wrapping_add(read_u32_le(&tail[0..4]));
    if rest.len() > 4 {
        b = b.wrapping_add(read_u32_le(&tail[4..8]));
    }
    if rest.len() > 8 {
        c = c.wrapping_add(read_u32_le(&tail[8..12]));
    }

    final_mix(a, b, c)
}

#[inline]
fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Reversible block mixer. Rotation schedule: 4, 6, 8, 16, 19, 4.
#[inline]
fn block_mix(mut a: u32, mut b: u32, mut c: u32) -> (u32, u32, u32) {
    a = a.wrapping_sub(c);
    a ^= c.rotate_left(4);
    c = c.wrapping_add(b);

    b = b.wrapping_sub(a);
    b ^= a.rotate_left(6);
    a = a.wrapping_add(c);

    c = c.wrapping_sub(b);
    c ^= b.rotate_left(8);
    b = b.wrapping_add(a);

    a = a.wrapping_sub(c);
    a ^= c.rotate_left(16);
    c = c.wrapping_add(b);

    b = b.wrapping_sub(a);
    b ^= a.rotate_left(19);
    a = a.wrapping_add(c);

    c = c.wrapping_sub(b);
    c ^= b.rotate_left(4);
    b = b.wrapping_add(a);

    (a, b, c)
}

/// Final avalanche mixer. Rotation schedule: 14, 11, 25, 16, 4, 14, 24.
#[inline]
fn final_mix(mut a: u32, mut b: u32, mut c: u32) -> u32 {
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(14));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(11));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(25));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(16));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(4));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(14));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(24));
    c
}
