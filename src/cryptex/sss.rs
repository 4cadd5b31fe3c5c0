//! Threshold cryptex: Shamir secret sharing over GF(256).
//!
//! The secret is split byte-wise into N shares of which any K recover it.
//! Shares occupy x-coordinates 1…N assigned in input order, so index 0 (the
//! invalid Shamir coordinate) can never occur. Absent holders are nil slots
//! and are skipped during recombination.

use super::{CryptexError, non_nil_len};
use rand::RngCore;
use rand::rngs::OsRng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sss {
    pub comment: String,
    pub n: u32,
    pub k: u32,
}

impl Sss {
    pub fn new(n: u32, k: u32, comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            n,
            k,
        }
    }

    fn validate(&self) -> Result<(), CryptexError> {
        if self.k <= 1 {
            return Err(CryptexError::InvalidState("K must be > 1".into()));
        }
        if self.n > 255 {
            return Err(CryptexError::InvalidState("N must be < 256".into()));
        }
        if self.k >= self.n {
            return Err(CryptexError::InvalidState("N must be > K".into()));
        }
        Ok(())
    }

    pub fn close(
        &self,
        inputs: &mut [Option<Vec<u8>>],
        secrets: &[Vec<u8>],
    ) -> Result<(), CryptexError> {
        self.validate()?;
        if inputs.len() < self.k as usize || inputs.len() > self.n as usize {
            return Err(CryptexError::Arity("input count must be between K and N"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("SSS supports only a single secret"));
        }

        let shares = split(self.n as u8, self.k as u8, &secrets[0]);
        for (slot, share) in inputs.iter_mut().zip(shares) {
            *slot = Some(share);
        }
        Ok(())
    }

    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        self.validate()?;
        if non_nil_len(inputs) < self.k as usize {
            return Err(CryptexError::Unsatisfied("not enough inputs"));
        }
        if inputs.len() > self.n as usize {
            return Err(CryptexError::Arity("too many inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("SSS supports only a single secret"));
        }

        let mut shares = Vec::new();
        let mut length = None;
        for (i, input) in inputs.iter().enumerate() {
            let Some(share) = input else { continue };
            match length {
                None => length = Some(share.len()),
                Some(len) if len != share.len() => {
                    return Err(CryptexError::DecryptionFailed);
                }
                _ => {}
            }
            shares.push((i as u8 + 1, share.as_slice()));
        }

        secrets[0] = combine(&shares);
        Ok(())
    }
}

/// Split `secret` into `n` shares with threshold `k`. Share for coordinate
/// `x` is the evaluation of a fresh random degree-`k-1` polynomial per byte.
fn split(n: u8, k: u8, secret: &[u8]) -> Vec<Vec<u8>> {
    let mut shares = vec![Vec::with_capacity(secret.len()); n as usize];
    let mut coefficients = vec![0u8; k as usize];

    for &byte in secret {
        OsRng.fill_bytes(&mut coefficients);
        coefficients[0] = byte;

        for (i, share) in shares.iter_mut().enumerate() {
            share.push(eval(&coefficients, i as u8 + 1));
        }
    }
    shares
}

/// Recombine shares by Lagrange interpolation at x = 0.
fn combine(shares: &[(u8, &[u8])]) -> Vec<u8> {
    let length = shares.first().map_or(0, |(_, data)| data.len());

    let weights: Vec<u8> = shares
        .iter()
        .map(|&(xi, _)| {
            let mut weight = 1u8;
            for &(xj, _) in shares {
                if xi != xj {
                    weight = gf_mul(weight, gf_div(xj, xi ^ xj));
                }
            }
            weight
        })
        .collect();

    (0..length)
        .map(|pos| {
            shares
                .iter()
                .zip(&weights)
                .fold(0u8, |acc, (&(_, data), &weight)| {
                    acc ^ gf_mul(weight, data[pos])
                })
        })
        .collect()
}

fn eval(coefficients: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &c in coefficients.iter().rev() {
        acc = gf_mul(acc, x) ^ c;
    }
    acc
}

/// Carry-less multiplication in GF(2^8) mod x^8 + x^4 + x^3 + x + 1.
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut out = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            out ^= a;
        }
        let carry = a & 0x80 != 0;
        a <<= 1;
        if carry {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    out
}

fn gf_div(a: u8, b: u8) -> u8 {
    // b^254 = b^-1 in GF(2^8)
    debug_assert!(b != 0, "division by zero in GF(256)");
    let mut inv = 1u8;
    let mut base = b;
    let mut exp = 254u8;
    while exp != 0 {
        if exp & 1 != 0 {
            inv = gf_mul(inv, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    gf_mul(a, inv)
}
