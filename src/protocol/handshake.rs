//! # Version and Key Handshake
//!
//! The two-step connection handshake: version negotiation, then the
//! asymmetric key exchange that installs the symmetric session key.
//!
//! The client opens by announcing its raw protocol version. The server
//! resolves a codec variant for it, replies with a version acknowledgement
//! carrying the server's public key, and waits for the client to send the
//! session key encrypted under that key. Once the key is installed every
//! further frame passes through the stream cipher.
//!
//! ## Security
//! - The session key travels only under asymmetric encryption
//! - Key material never appears in logs; only lengths are traced
//! - Unknown client versions are rejected before any key material moves

use bytes::Bytes;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::protocol::registry::VersionRegistry;
use crate::protocol::session::Session;

/// Asymmetric half of the handshake, behind a trait so the key exchange
/// algorithm can be swapped without touching the negotiation flow.
pub trait AsymmetricKeyExchange {
    /// Public key blob the version acknowledgement carries to the client.
    fn public_key_blob(&self) -> Result<Vec<u8>>;

    /// Recover the session key the client encrypted under our public key.
    fn decrypt_session_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// RSA PKCS#1 v1.5 key exchange. One keypair per server process; sessions
/// share it read-only.
pub struct RsaKeyExchange {
    private_key: RsaPrivateKey,
}

impl std::fmt::Debug for RsaKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RsaKeyExchange(..)")
    }
}

impl RsaKeyExchange {
    /// Generate a fresh keypair of `bits` size.
    ///
    /// # Errors
    /// `KeyExchange` if key generation fails.
    pub fn generate(bits: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| ProtocolError::KeyExchange(e.to_string()))?;
        Ok(Self { private_key })
    }

    /// Wrap an existing keypair.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    /// Client-side counterpart: encrypt `plaintext` under a public key blob
    /// as produced by [`AsymmetricKeyExchange::public_key_blob`].
    ///
    /// # Errors
    /// `KeyExchange` if the blob does not parse or encryption fails.
    pub fn encrypt_with_public_key(blob: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let public_key = RsaPublicKey::from_pkcs1_der(blob)
            .map_err(|e| ProtocolError::KeyExchange(e.to_string()))?;
        let mut rng = rand::thread_rng();
        public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| ProtocolError::KeyExchange(e.to_string()))
    }
}

impl AsymmetricKeyExchange for RsaKeyExchange {
    fn public_key_blob(&self) -> Result<Vec<u8>> {
        let document = self
            .private_key
            .to_public_key()
            .to_pkcs1_der()
            .map_err(|e| ProtocolError::KeyExchange(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    fn decrypt_session_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.private_key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| ProtocolError::KeyExchange(e.to_string()))
    }
}

/// Handle a client's version announcement.
///
/// Resolves and assigns the codec variant, moves the session into the
/// asymmetric phase, and builds the version acknowledgement frame carrying
/// the public key blob.
///
/// # Errors
/// - `UnknownRawVersion` for a version without a registered variant
/// - `HandshakeError` if the session already negotiated
pub fn negotiate_version(
    session: &mut Session,
    raw_version: i32,
    registry: &VersionRegistry,
    key_exchange: &dyn AsymmetricKeyExchange,
) -> Result<Bytes> {
    let codec = registry.resolve(raw_version)?;
    session.assign_codec(raw_version, codec)?;
    session.begin_key_exchange();

    let blob = key_exchange.public_key_blob()?;
    debug!(raw_version, blob_len = blob.len(), "version negotiated");
    session.codec()?.crypt_key(&blob)
}

/// Handle the client's encrypted session key and complete the handshake.
///
/// # Errors
/// - `KeyExchange` if decryption fails
/// - `HandshakeError` if a key is already installed or the key is empty
pub fn install_session_key(
    session: &mut Session,
    ciphertext: &[u8],
    key_exchange: &dyn AsymmetricKeyExchange,
) -> Result<()> {
    let key = key_exchange.decrypt_session_key(ciphertext)?;
    debug!(key_len = key.len(), "session key installed");
    session.set_session_key(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::session::EncryptionState;
    use crate::protocol::variant::opcodes;

    fn keypair() -> RsaKeyExchange {
        // small keys keep the tests fast; size is a deployment choice
        RsaKeyExchange::generate(1024).unwrap()
    }

    #[test]
    fn test_full_handshake() {
        let registry = VersionRegistry::with_default_variants();
        let kx = keypair();
        let mut session = Session::new();

        let ack = negotiate_version(&mut session, 1110, &registry, &kx).unwrap();
        assert_eq!(ack[2], opcodes::CRYPT_KEY);
        assert_eq!(
            session.encryption_state(),
            EncryptionState::AsymmetricEncrypted
        );

        // client side: pull the blob out of the ack and wrap a key under it
        let blob_len = u16::from_be_bytes([ack[7], ack[8]]) as usize;
        let blob = &ack[9..9 + blob_len];
        let ciphertext =
            RsaKeyExchange::encrypt_with_public_key(blob, b"session-key-material").unwrap();

        install_session_key(&mut session, &ciphertext, &kx).unwrap();
        assert!(session.is_symmetric_encrypted());
    }

    #[test]
    fn test_unknown_version_moves_no_state() {
        let registry = VersionRegistry::with_default_variants();
        let kx = keypair();
        let mut session = Session::new();
        assert!(negotiate_version(&mut session, 9999, &registry, &kx).is_err());
        assert_eq!(session.encryption_state(), EncryptionState::NotEncrypted);
        assert!(session.codec().is_err());
    }

    #[test]
    fn test_garbage_ciphertext_rejected() {
        let kx = keypair();
        let mut session = Session::new();
        let err = install_session_key(&mut session, &[0xAB; 16], &kx).unwrap_err();
        assert!(matches!(err, ProtocolError::KeyExchange(_)));
        assert_eq!(session.encryption_state(), EncryptionState::NotEncrypted);
    }

    #[test]
    fn test_blob_round_trip() {
        let kx = keypair();
        let blob = kx.public_key_blob().unwrap();
        let ciphertext = RsaKeyExchange::encrypt_with_public_key(&blob, b"k").unwrap();
        assert_eq!(kx.decrypt_session_key(&ciphertext).unwrap(), b"k");
    }
}
