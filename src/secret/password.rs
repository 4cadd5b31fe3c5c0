//! Password secret: the raw input bytes are the secret.

use super::SecretError;
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Password {
    pub comment: String,
}

impl Password {
    pub fn new(comment: impl Into<String>) -> Self {
        Self { comment: comment.into() }
    }

    pub fn load(&self, r: &mut dyn Read) -> Result<Vec<Vec<u8>>, SecretError> {
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;
        Ok(vec![data])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_returns_raw_bytes() {
        let password = Password::new("op 1 secret");
        let data = password.load(&mut &b"key #1"[..]).unwrap();
        assert_eq!(data, vec![b"key #1".to_vec()]);
    }
}
