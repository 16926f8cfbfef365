//! # Session State
//!
//! Per-connection protocol state: negotiated version, encryption progress,
//! the derived cipher, and the assigned codec variant.
//!
//! A `Session` is created on connect and torn down on disconnect; this layer
//! never does either. The four protocol-relevant fields follow a set-once
//! lifecycle: the raw version and codec are fixed by negotiation, the session
//! key by the key exchange. Account and player attach as the client logs in
//! and enters the world, and they are what the precondition gate inspects.
//!
//! Each session exclusively owns its cipher state and codec reference; no
//! two sessions share either, so sessions may be driven fully in parallel.

use std::sync::Arc;

use crate::core::cipher::StreamCipher;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::model::IconDiffState;
use crate::protocol::variant::CodecVariant;

/// Encryption progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionState {
    /// Fresh connection; frames travel in the clear.
    #[default]
    NotEncrypted,
    /// Key exchange in flight; the key blob is asymmetrically protected.
    AsymmetricEncrypted,
    /// Session key installed; frames pass through the stream cipher.
    SymmetricEncrypted,
}

/// Authenticated account attached to a session. Opaque to the protocol
/// layer beyond its presence.
#[derive(Debug, Clone)]
pub struct Account {
    pub name: String,
}

/// Active in-world player attached to a session. Opaque to the protocol
/// layer beyond its presence.
#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub object_id: u16,
}

/// Per-connection protocol state.
#[derive(Debug, Default)]
pub struct Session {
    raw_version: Option<i32>,
    encryption_state: EncryptionState,
    session_key: Option<Vec<u8>>,
    cipher: StreamCipher,
    account: Option<Account>,
    player: Option<Player>,
    codec: Option<Arc<CodecVariant>>,
    icon_diff: IconDiffState,
}

impl Session {
    /// A fresh, unnegotiated session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw protocol version as announced by the client, if any.
    pub fn raw_version(&self) -> Option<i32> {
        self.raw_version
    }

    /// Current encryption progress.
    pub fn encryption_state(&self) -> EncryptionState {
        self.encryption_state
    }

    /// Move the session into the asymmetric phase of the handshake.
    pub fn begin_key_exchange(&mut self) {
        self.encryption_state = EncryptionState::AsymmetricEncrypted;
    }

    /// Install the shared session key and derive the cipher state.
    ///
    /// Transitions to `SymmetricEncrypted`. The key is set once per session.
    ///
    /// # Errors
    /// `HandshakeError` if a key is already installed or the key is empty.
    pub fn set_session_key(&mut self, key: Vec<u8>) -> Result<()> {
        if self.session_key.is_some() {
            return Err(ProtocolError::HandshakeError(
                constants::ERR_KEY_ALREADY_SET.into(),
            ));
        }
        self.cipher.set_key(&key)?;
        self.session_key = Some(key);
        self.encryption_state = EncryptionState::SymmetricEncrypted;
        Ok(())
    }

    /// The session cipher. Keyless until the handshake completes; the send
    /// and receive paths only engage it in the symmetric state.
    pub fn cipher(&self) -> &StreamCipher {
        &self.cipher
    }

    /// True once frames should pass through the stream cipher.
    pub fn is_symmetric_encrypted(&self) -> bool {
        self.encryption_state == EncryptionState::SymmetricEncrypted && self.cipher.has_key()
    }

    /// Assign the codec variant resolved for the announced version.
    ///
    /// # Errors
    /// `HandshakeError` if a codec was already assigned.
    pub fn assign_codec(&mut self, raw_version: i32, codec: Arc<CodecVariant>) -> Result<()> {
        if self.codec.is_some() {
            return Err(ProtocolError::HandshakeError(
                constants::ERR_CODEC_ALREADY_ASSIGNED.into(),
            ));
        }
        self.raw_version = Some(raw_version);
        self.codec = Some(codec);
        Ok(())
    }

    /// The assigned codec variant.
    ///
    /// # Errors
    /// `HandshakeError` if the client has not completed version negotiation.
    pub fn codec(&self) -> Result<&Arc<CodecVariant>> {
        self.codec.as_ref().ok_or_else(|| {
            ProtocolError::HandshakeError(constants::ERR_VERSION_BEFORE_MESSAGES.into())
        })
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn set_account(&mut self, account: Account) {
        self.account = Some(account);
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn set_player(&mut self, player: Player) {
        self.player = Some(player);
    }

    /// Detach the in-world player, e.g. on quit to character select.
    pub fn clear_player(&mut self) {
        self.player = None;
    }

    /// Icon-diff bookkeeping, exclusively owned by this session.
    pub fn icon_diff_mut(&mut self) -> &mut IconDiffState {
        &mut self.icon_diff
    }
}
