//! Seekable sequential key generator.
//!
//! A forward-only sequence of 32-byte keys derived from a seed, used by the
//! Mux and Demux cryptexes to give every input position its own mask key.
//! The construction is the binary-tree SSKG of Marson & Poettering: state is
//! a stack of `(key, height)` nodes walked in depth-first order, so advancing
//! destroys the material needed to recompute earlier keys.

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const KEY_SIZE: usize = 32;

struct Node {
    key: [u8; KEY_SIZE],
    height: u32,
}

pub struct Seq {
    stack: Vec<Node>,
}

fn prf(key: &[u8], label: &[u8]) -> [u8; KEY_SIZE] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(label);
    mac.finalize().into_bytes().into()
}

impl Seq {
    /// Build a sequence able to yield at least `max_keys` keys.
    pub fn new(seed: &[u8], max_keys: usize) -> Self {
        let mut height = 0u32;
        while (1usize << height) - 1 < max_keys {
            height += 1;
        }

        Self {
            stack: vec![Node {
                key: prf(seed, b"seed"),
                height: height.max(1),
            }],
        }
    }

    /// Key for the current position. Returns `None` once the sequence is
    /// exhausted.
    pub fn key(&self, size: usize) -> Option<Vec<u8>> {
        let top = self.stack.last()?;
        Some(prf(&top.key, b"key")[..size.min(KEY_SIZE)].to_vec())
    }

    /// Advance to the next position.
    pub fn next(&mut self) {
        let Some(node) = self.stack.pop() else {
            return;
        };

        if node.height > 1 {
            self.stack.push(Node {
                key: prf(&node.key, b"right"),
                height: node.height - 1,
            });
            self.stack.push(Node {
                key: prf(&node.key, b"left"),
                height: node.height - 1,
            });
        }
    }
}
