//! SSH RSA private key secret.
//!
//! Declared by the OpenSSH fingerprint of its public half (`SHA256:` plus
//! unpadded base64). Loading parses a PEM PKCS#1 private key, recomputes
//! the fingerprint over the SSH wire-format public key, and returns the raw
//! PEM bytes only on a match.

use super::SecretError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKey {
    pub comment: String,
    pub fingerprint: String,
}

impl SshKey {
    pub fn new(
        fingerprint: impl Into<String>,
        comment: impl Into<String>,
    ) -> Result<Self, SecretError> {
        let fingerprint = fingerprint.into();
        parse_fingerprint(&fingerprint)?;
        Ok(Self {
            comment: comment.into(),
            fingerprint,
        })
    }

    pub fn load(&self, r: &mut dyn Read) -> Result<Vec<Vec<u8>>, SecretError> {
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;
        self.verify(&data)?;
        Ok(vec![data])
    }

    fn verify(&self, key_data: &[u8]) -> Result<(), SecretError> {
        let pem = std::str::from_utf8(key_data)
            .map_err(|_| SecretError::InvalidSshKey("key is not valid UTF-8 PEM".into()))?;
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| SecretError::InvalidSshKey(format!("must be an RSA key: {e}")))?;

        let want = parse_fingerprint(&self.fingerprint)?;
        let got = Sha256::digest(ssh_wire_public_key(&RsaPublicKey::from(&private_key)));
        if want != got.as_slice() {
            return Err(SecretError::FingerprintMismatch);
        }
        Ok(())
    }
}

/// Compute the `SHA256:` fingerprint string for an RSA public key.
pub fn fingerprint_of(public_key: &RsaPublicKey) -> String {
    let digest = Sha256::digest(ssh_wire_public_key(public_key));
    format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
}

/// Derive the fingerprint declared by an `authorized_keys` line.
pub fn fingerprint_of_authorized_key(line: &str) -> Result<String, SecretError> {
    let blob = authorized_key_blob(line)?;
    let digest = Sha256::digest(&blob);
    Ok(format!("SHA256:{}", STANDARD_NO_PAD.encode(digest)))
}

/// Extract the RSA `(e, n)` components from an `authorized_keys` line.
pub fn parse_authorized_key(line: &str) -> Result<(Vec<u8>, Vec<u8>), SecretError> {
    let blob = authorized_key_blob(line)?;

    let mut pos = 0usize;
    let mut next = |what: &str| -> Result<Vec<u8>, SecretError> {
        if blob.len() - pos < 4 {
            return Err(SecretError::InvalidSshKey(format!("truncated {what}")));
        }
        let len =
            u32::from_be_bytes(blob[pos..pos + 4].try_into().expect("4 bytes")) as usize;
        pos += 4;
        if blob.len() - pos < len {
            return Err(SecretError::InvalidSshKey(format!("truncated {what}")));
        }
        let out = blob[pos..pos + len].to_vec();
        pos += len;
        Ok(out)
    };

    let algo = next("algorithm")?;
    if algo != b"ssh-rsa" {
        return Err(SecretError::InvalidSshKey("must be ssh-rsa".into()));
    }
    let e = next("exponent")?;
    let n = next("modulus")?;
    Ok((e, n))
}

fn authorized_key_blob(line: &str) -> Result<Vec<u8>, SecretError> {
    let mut fields = line.split_whitespace();
    let algo = fields
        .next()
        .ok_or(SecretError::InvalidSshKey("empty authorized key".into()))?;
    if algo != "ssh-rsa" {
        return Err(SecretError::InvalidSshKey("must be ssh-rsa".into()));
    }
    let encoded = fields
        .next()
        .ok_or(SecretError::InvalidSshKey("missing key data".into()))?;

    STANDARD_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| SecretError::InvalidSshKey(format!("bad base64: {e}")))
}

/// SSH wire-format encoding of an RSA public key: `string "ssh-rsa" ‖
/// mpint e ‖ mpint n`.
pub(crate) fn ssh_wire_public_key(public_key: &RsaPublicKey) -> Vec<u8> {
    let mut out = Vec::new();
    put_ssh_string(&mut out, b"ssh-rsa");
    put_ssh_mpint(&mut out, &public_key.e().to_bytes_be());
    put_ssh_mpint(&mut out, &public_key.n().to_bytes_be());
    out
}

fn put_ssh_string(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

fn put_ssh_mpint(out: &mut Vec<u8>, magnitude: &[u8]) {
    // a leading high bit would flip the sign; prepend a zero octet
    if magnitude.first().is_some_and(|&b| b & 0x80 != 0) {
        out.extend_from_slice(&(magnitude.len() as u32 + 1).to_be_bytes());
        out.push(0);
    } else {
        out.extend_from_slice(&(magnitude.len() as u32).to_be_bytes());
    }
    out.extend_from_slice(magnitude);
}

fn parse_fingerprint(fingerprint: &str) -> Result<Vec<u8>, SecretError> {
    let (algo, digest) = fingerprint
        .split_once(':')
        .ok_or(SecretError::InvalidFingerprint)?;
    if !algo.eq_ignore_ascii_case("sha256") {
        return Err(SecretError::UnsupportedHash(algo.to_string()));
    }

    STANDARD_NO_PAD
        .decode(digest.trim_end_matches('='))
        .map_err(|_| SecretError::InvalidFingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::pkcs1::LineEnding;

    fn test_key() -> (RsaPrivateKey, String) {
        let private = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate key");
        let pem = private
            .to_pkcs1_pem(LineEnding::LF)
            .expect("encode pem")
            .to_string();
        (private, pem)
    }

    #[test]
    fn load_verifies_fingerprint() {
        let (private, pem) = test_key();
        let fingerprint = fingerprint_of(&RsaPublicKey::from(&private));

        let secret = SshKey::new(fingerprint, "alice@acme.bank").unwrap();
        let loaded = secret.load(&mut pem.as_bytes()).unwrap();
        assert_eq!(loaded, vec![pem.into_bytes()]);
    }

    #[test]
    fn mismatched_fingerprint_is_rejected() {
        let (_, pem) = test_key();
        let (other, _) = test_key();
        let fingerprint = fingerprint_of(&RsaPublicKey::from(&other));

        let secret = SshKey::new(fingerprint, "").unwrap();
        let err = secret.load(&mut pem.as_bytes()).unwrap_err();
        assert!(matches!(err, SecretError::FingerprintMismatch));
    }

    #[test]
    fn malformed_fingerprints_are_rejected() {
        assert!(matches!(
            SshKey::new("no-colon", ""),
            Err(SecretError::InvalidFingerprint)
        ));
        assert!(matches!(
            SshKey::new("MD5:abcd", ""),
            Err(SecretError::UnsupportedHash(_))
        ));
    }

    #[test]
    fn authorized_key_line_matches_wire_fingerprint() {
        use base64::engine::general_purpose::STANDARD;

        let (private, _) = test_key();
        let public = RsaPublicKey::from(&private);
        let line = format!(
            "ssh-rsa {} alice@acme.bank",
            STANDARD.encode(ssh_wire_public_key(&public))
        );

        assert_eq!(
            fingerprint_of_authorized_key(&line).unwrap(),
            fingerprint_of(&public)
        );

        let (e, n) = parse_authorized_key(&line).unwrap();
        assert_eq!(e, public.e().to_bytes_be());
        // the wire mpint may carry a sign octet
        assert!(n.ends_with(&public.n().to_bytes_be()));
    }
}
