//! Nodes: the policy graph's unit of identity.
//!
//! A node carries an 8-byte nonce (unique within one plan), the ordered
//! digests of its children, and exactly one of a cryptex, a secret, or a
//! material marker. Its digest folds the nonce, the child digests, and the
//! marshaled value together, so two structurally identical graphs built at
//! different times never share identities.

use crate::crypto::hmac_sha256;
use crate::cryptex::Cryptex;
use crate::secret::Secret;
use crate::wire::{Reader, WireError, Writer};

pub const NONCE_SIZE: usize = 8;

const TAG_CRYPTEX: u8 = 1;
const TAG_SECRET: u8 = 2;
const TAG_MARKER: u8 = 3;

/// A name-only placeholder: locking deposits material here, unlocking must
/// find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub comment: String,
}

impl Marker {
    pub fn new(comment: impl Into<String>) -> Self {
        Self { comment: comment.into() }
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_str(&self.comment);
        w.into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeValue {
    Cryptex(Cryptex),
    Secret(Secret),
    Marker(Marker),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Cryptex,
    Secret,
    Marker,
}

impl NodeValue {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Cryptex(_) => NodeType::Cryptex,
            Self::Secret(_) => NodeType::Secret,
            Self::Marker(_) => NodeType::Marker,
        }
    }

    pub fn comment(&self) -> &str {
        match self {
            Self::Cryptex(c) => c.comment(),
            Self::Secret(s) => s.comment(),
            Self::Marker(m) => &m.comment,
        }
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Self::Cryptex(c) => {
                w.put_u8(TAG_CRYPTEX);
                w.put_bytes(&c.marshal());
            }
            Self::Secret(s) => {
                w.put_u8(TAG_SECRET);
                w.put_bytes(&s.marshal());
            }
            Self::Marker(m) => {
                w.put_u8(TAG_MARKER);
                w.put_bytes(&m.marshal());
            }
        }
        w.into_bytes()
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let tag = r.u8()?;
        match tag {
            TAG_CRYPTEX => Ok(Self::Cryptex(Cryptex::unmarshal(&r.bytes()?)?)),
            TAG_SECRET => Ok(Self::Secret(Secret::unmarshal(&r.bytes()?)?)),
            TAG_MARKER => {
                let body = r.bytes()?;
                let mut br = Reader::new(&body);
                let marker = Marker { comment: br.string()? };
                br.finish()?;
                Ok(Self::Marker(marker))
            }
            tag => Err(WireError::UnknownTag { kind: "node", tag }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub nonce: Vec<u8>,
    pub inputs: Vec<Vec<u8>>,
    pub value: NodeValue,
}

impl Node {
    /// `HMAC-SHA-256(nonce, inputs ‖ marshal(value))`
    pub fn digest(&self) -> Vec<u8> {
        let value = self.value.marshal();
        let mut parts: Vec<&[u8]> = self.inputs.iter().map(Vec::as_slice).collect();
        parts.push(&value);
        hmac_sha256(&self.nonce, &parts)
    }

    pub fn node_type(&self) -> NodeType {
        self.value.node_type()
    }

    pub fn comment(&self) -> &str {
        self.value.comment()
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_bytes(&self.nonce);
        w.put_chunks(&self.inputs);
        w.put_bytes(&self.value.marshal());
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let nonce = r.bytes()?;
        let inputs = r.chunks()?;
        let body = r.bytes()?;
        let mut br = Reader::new(&body);
        let value = NodeValue::decode(&mut br)?;
        br.finish()?;
        Ok(Self { nonce, inputs, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cryptex::SecretBox;
    use crate::secret::Password;

    fn node() -> Node {
        Node {
            nonce: vec![1, 2, 3, 4, 5, 6, 7, 8],
            inputs: vec![vec![0xaa; 32], vec![0xbb; 32]],
            value: NodeValue::Cryptex(Cryptex::SecretBox(SecretBox::new("master key"))),
        }
    }

    #[test]
    fn digest_is_stable_across_serialization() {
        let original = node();
        let mut w = Writer::new();
        original.encode(&mut w);
        let data = w.into_bytes();

        let mut r = Reader::new(&data);
        let parsed = Node::decode(&mut r).unwrap();
        r.finish().unwrap();

        assert_eq!(parsed, original);
        assert_eq!(parsed.digest(), original.digest());
    }

    #[test]
    fn digest_changes_with_nonce_inputs_and_value() {
        let base = node();

        let mut other = base.clone();
        other.nonce = vec![8, 7, 6, 5, 4, 3, 2, 1];
        assert_ne!(other.digest(), base.digest());

        let mut other = base.clone();
        other.inputs.swap(0, 1);
        assert_ne!(other.digest(), base.digest());

        let mut other = base.clone();
        other.value = NodeValue::Secret(Secret::Password(Password::new("master key")));
        assert_ne!(other.digest(), base.digest());
    }

    #[test]
    fn marker_nodes_roundtrip() {
        let marker = Node {
            nonce: vec![9; NONCE_SIZE],
            inputs: Vec::new(),
            value: NodeValue::Marker(Marker::new("op 1 material")),
        };

        let mut w = Writer::new();
        marker.encode(&mut w);
        let data = w.into_bytes();

        let mut r = Reader::new(&data);
        let parsed = Node::decode(&mut r).unwrap();
        assert_eq!(parsed.node_type(), NodeType::Marker);
        assert_eq!(parsed.comment(), "op 1 material");
    }
}
