//! Small shared cryptographic building blocks.
//!
//! Every identity in the system is an HMAC-SHA-256 digest keyed by a
//! per-object nonce, and several cryptexes are built from XOR pads, so those
//! two primitives live here alongside the OS RNG helpers.

use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

/// Generate `N` cryptographically-secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generate `n` cryptographically-secure random bytes on the heap.
pub fn random_vec(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// HMAC-SHA-256 over the concatenation of `parts`, keyed by `key`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("hmac accepts any key length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

/// XOR `a` with `b` into a new buffer of `a`'s length. `b` must be at least
/// as long as `a`.
pub fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// XOR `src` into `dst` in place. `src` must be at least as long as `dst`.
pub fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_is_keyed() {
        let a = hmac_sha256(b"key one", &[b"data"]);
        let b = hmac_sha256(b"key two", &[b"data"]);
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn hmac_concatenation_matches_single_part() {
        let joined = hmac_sha256(b"k", &[b"hello world"]);
        let split = hmac_sha256(b"k", &[b"hello", b" ", b"world"]);
        assert_eq!(joined, split);
    }

    #[test]
    fn xor_roundtrip() {
        let pad = random_bytes::<16>();
        let masked = xor(b"sixteen byte msg", &pad);
        assert_eq!(xor(&masked, &pad), b"sixteen byte msg");
    }
}
