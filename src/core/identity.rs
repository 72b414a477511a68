// Copyright (c) 2026 Ddns-node Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! EC identity on secp256r1 (NIST P-256): key generation, signing, verification,
//! and the base64/X.509/PKCS#8 text encoding used everywhere a public or private
//! key crosses the wire or hits disk.
//!
//! Mirrors the RustCrypto idiom used for `k256` signatures in the retrieval
//! pack's `shared-crypto` crate, swapped to `p256` for the curve this protocol
//! requires.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key bytes did not parse as valid X.509/PKCS#8 DER.
    #[error("invalid key encoding")]
    InvalidKey,
    /// Base64 text did not decode.
    #[error("invalid base64")]
    InvalidBase64,
    /// Signature bytes were malformed.
    #[error("invalid signature encoding")]
    InvalidSignature,
    /// Signature did not verify against the given message and key.
    #[error("signature verification failed")]
    VerificationFailed,
}

/// A secp256r1 public key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(Vec<u8>);

/// A secp256r1 private key (scalar).
pub struct PrivateKey(SigningKey);

impl Drop for PrivateKey {
    fn drop(&mut self) {
        // `SigningKey` does not expose raw scalar bytes here, but dropping the
        // struct releases the only copy we hold; zeroize the DER scratch buffers
        // used at the call sites that produce them instead (encode_private_key_der).
    }
}

/// A fixed-size (r || s) ECDSA signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureBytes(pub Vec<u8>);

/// Generate a fresh secp256r1 key pair.
pub fn generate_keypair() -> (PublicKey, PrivateKey) {
    let signing_key = SigningKey::random(&mut rand_core::OsRng);
    let verifying_key = VerifyingKey::from(&signing_key);
    (encode_public(&verifying_key), PrivateKey(signing_key))
}

fn encode_public(vk: &VerifyingKey) -> PublicKey {
    let der = vk
        .to_public_key_der()
        .expect("p256 public key always encodes to X.509 DER");
    PublicKey(der.as_bytes().to_vec())
}

/// Derive the public key that corresponds to a private key.
///
/// Must reproduce the original public key bit-exactly so that a key imported
/// from its base64 text representation can re-sign and be re-verified.
pub fn derive_public(sk: &PrivateKey) -> PublicKey {
    let verifying_key = VerifyingKey::from(&sk.0);
    encode_public(&verifying_key)
}

/// Sign `message` with the given private key.
pub fn sign(sk: &PrivateKey, message: &[u8]) -> SignatureBytes {
    let sig: Signature = sk.0.sign(message);
    SignatureBytes(sig.to_der().as_bytes().to_vec())
}

/// Verify `signature` over `message` against `pk`.
pub fn verify(pk: &PublicKey, message: &[u8], signature: &SignatureBytes) -> Result<(), CryptoError> {
    let vk = VerifyingKey::from_public_key_der(&pk.0).map_err(|_| CryptoError::InvalidKey)?;
    let sig = Signature::from_der(&signature.0).map_err(|_| CryptoError::InvalidSignature)?;
    vk.verify(message, &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Canonical base64 text form of a public key (base64 of its X.509 DER bytes).
pub fn encode_public_key(pk: &PublicKey) -> String {
    BASE64.encode(&pk.0)
}

/// Parse a public key from its base64 text form.
pub fn decode_public_key(text: &str) -> Result<PublicKey, CryptoError> {
    let der = BASE64.decode(text.trim()).map_err(|_| CryptoError::InvalidBase64)?;
    // Validate it parses before accepting.
    VerifyingKey::from_public_key_der(&der).map_err(|_| CryptoError::InvalidKey)?;
    Ok(PublicKey(der))
}

/// Canonical base64 text form of a private key (base64 of its PKCS#8 DER bytes).
pub fn encode_private_key(sk: &PrivateKey) -> Result<String, CryptoError> {
    let doc = sk.0.to_pkcs8_der().map_err(|_| CryptoError::InvalidKey)?;
    let mut bytes = doc.as_bytes().to_vec();
    let text = BASE64.encode(&bytes);
    bytes.zeroize();
    Ok(text)
}

/// Parse a private key from its base64 text form.
pub fn decode_private_key(text: &str) -> Result<PrivateKey, CryptoError> {
    let mut der = BASE64.decode(text.trim()).map_err(|_| CryptoError::InvalidBase64)?;
    let sk = SigningKey::from_pkcs8_der(&der).map_err(|_| CryptoError::InvalidKey)?;
    der.zeroize();
    Ok(PrivateKey(sk))
}

/// Encode a private key directly to raw PKCS#8 DER bytes (no base64), used
/// when the key is about to be passed straight to disk encryption rather
/// than wire/text transport.
pub fn encode_private_key_der(sk: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
    let doc = sk.0.to_pkcs8_der().map_err(|_| CryptoError::InvalidKey)?;
    Ok(doc.as_bytes().to_vec())
}

/// Parse a private key directly from raw PKCS#8 DER bytes (no base64).
pub fn decode_private_key_der(der: &[u8]) -> Result<PrivateKey, CryptoError> {
    let sk = SigningKey::from_pkcs8_der(der).map_err(|_| CryptoError::InvalidKey)?;
    Ok(PrivateKey(sk))
}

/// Encode a signature as base64 for wire transport.
pub fn encode_signature(sig: &SignatureBytes) -> String {
    BASE64.encode(&sig.0)
}

/// Decode a signature from its base64 wire form.
pub fn decode_signature(text: &str) -> Result<SignatureBytes, CryptoError> {
    let bytes = BASE64.decode(text.trim()).map_err(|_| CryptoError::InvalidBase64)?;
    Ok(SignatureBytes(bytes))
}

impl PublicKey {
    /// Raw X.509 DER bytes.
    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    /// Construct from raw X.509 DER bytes, validating the encoding.
    pub fn from_der(der: Vec<u8>) -> Result<Self, CryptoError> {
        VerifyingKey::from_public_key_der(&der).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self(der))
    }
}

/// SHA-256 of `data`, rendered as lowercase hex. The canonical hash function
/// used throughout the protocol (transaction hashes, block hashes).
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_encode_decode_public_key() {
        for _ in 0..100 {
            let (pk, _sk) = generate_keypair();
            let text = encode_public_key(&pk);
            let pk2 = decode_public_key(&text).unwrap();
            assert_eq!(pk, pk2);
        }
    }

    #[test]
    fn derive_public_matches_generated_public() {
        for _ in 0..100 {
            let (pk, sk) = generate_keypair();
            assert_eq!(derive_public(&sk), pk);
        }
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let (pk, sk) = generate_keypair();
        let msg = b"dns record payload";
        let sig = sign(&sk, msg);
        assert!(verify(&pk, msg, &sig).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let (pk, sk) = generate_keypair();
        let sig = sign(&sk, b"original");
        assert!(verify(&pk, b"tampered", &sig).is_err());
    }

    #[test]
    fn private_key_roundtrip_can_resign() {
        let (pk, sk) = generate_keypair();
        let text = encode_private_key(&sk).unwrap();
        let sk2 = decode_private_key(&text).unwrap();
        assert_eq!(derive_public(&sk2), pk);

        let msg = b"re-signed after import";
        let sig = sign(&sk2, msg);
        assert!(verify(&pk, msg, &sig).is_ok());
    }

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
