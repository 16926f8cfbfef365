//! # Precondition Gate
//!
//! Session-state admission control for inbound opcodes.
//!
//! Every inbound opcode carries exactly one precondition id; the gate maps
//! the id to a predicate over the session and answers "may this session
//! submit this opcode right now". Opcodes with no registered rule are
//! rejected - the gate fails closed, so forgetting to register a new opcode
//! can never open a hole.
//!
//! Like the version registry, the gate is assembled at startup and sealed
//! before traffic arrives; afterwards it is a shared read-only table.

use tracing::debug;

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::session::Session;

/// Builtin precondition ids.
pub mod preconditions {
    /// Always admitted; handshake traffic.
    pub const NONE: u8 = 0;
    /// Requires an authenticated account on the session.
    pub const LOGGED_IN: u8 = 1;
    /// Requires an in-world player on the session.
    pub const PLAYER_IN_GAME: u8 = 2;
}

/// Client message opcodes with builtin gate rules.
pub mod client_opcodes {
    /// Version announcement and key exchange request.
    pub const CRYPT_REQUEST: u8 = 0xF4;
    /// Keep-alive ping.
    pub const PING_REQUEST: u8 = 0xA3;
    /// Character selection.
    pub const CHAR_SELECT: u8 = 0x10;
    /// Effect cancellation by internal id.
    pub const CANCEL_EFFECT: u8 = 0xB8;
}

type PreconditionFn = fn(&Session) -> bool;

fn always(_session: &Session) -> bool {
    true
}

fn logged_in(session: &Session) -> bool {
    session.account().is_some()
}

fn player_in_game(session: &Session) -> bool {
    session.account().is_some() && session.player().is_some()
}

/// Opcode admission table: one precondition id per opcode, one predicate per
/// id.
pub struct PreconditionGate {
    rules: [Option<u8>; 256],
    predicates: Vec<Option<PreconditionFn>>,
    sealed: bool,
}

impl std::fmt::Debug for PreconditionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreconditionGate")
            .field("rules", &self.rules.iter().filter(|r| r.is_some()).count())
            .field("sealed", &self.sealed)
            .finish()
    }
}

impl Default for PreconditionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PreconditionGate {
    /// An empty, unsealed gate with no predicates registered.
    pub fn new() -> Self {
        Self {
            rules: [None; 256],
            predicates: vec![None; 256],
            sealed: false,
        }
    }

    /// A gate loaded with the builtin predicates and the builtin opcode
    /// rules, sealed.
    pub fn with_builtins() -> Self {
        let mut gate = Self::new();
        // fresh gate, distinct ids and opcodes: cannot fail
        let _ = gate.define_precondition(preconditions::NONE, always);
        let _ = gate.define_precondition(preconditions::LOGGED_IN, logged_in);
        let _ = gate.define_precondition(preconditions::PLAYER_IN_GAME, player_in_game);

        let _ = gate.require(client_opcodes::CRYPT_REQUEST, preconditions::NONE);
        let _ = gate.require(client_opcodes::PING_REQUEST, preconditions::NONE);
        let _ = gate.require(client_opcodes::CHAR_SELECT, preconditions::LOGGED_IN);
        let _ = gate.require(client_opcodes::CANCEL_EFFECT, preconditions::PLAYER_IN_GAME);
        gate.seal();
        gate
    }

    /// Register a predicate under an id.
    ///
    /// # Errors
    /// `ConfigError` if the gate is sealed or the id is taken.
    pub fn define_precondition(&mut self, id: u8, predicate: PreconditionFn) -> Result<()> {
        if self.sealed {
            return Err(ProtocolError::ConfigError(constants::ERR_GATE_SEALED.into()));
        }
        if self.predicates[id as usize].is_some() {
            return Err(ProtocolError::ConfigError(format!(
                "precondition id {id} already defined"
            )));
        }
        self.predicates[id as usize] = Some(predicate);
        Ok(())
    }

    /// Attach a precondition id to an opcode. Re-attaching replaces the rule;
    /// an opcode has exactly one.
    ///
    /// # Errors
    /// `ConfigError` if the gate is sealed.
    pub fn require(&mut self, opcode: u8, precondition: u8) -> Result<()> {
        if self.sealed {
            return Err(ProtocolError::ConfigError(constants::ERR_GATE_SEALED.into()));
        }
        debug!(opcode, precondition, "gate rule registered");
        self.rules[opcode as usize] = Some(precondition);
        Ok(())
    }

    /// Freeze the table. Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// May `session` submit `opcode` right now?
    ///
    /// `Ok(false)` means the precondition ran and denied; the caller drops
    /// the packet.
    ///
    /// # Errors
    /// - `UnregisteredOpcode` when no rule exists for the opcode
    /// - `UnknownPrecondition` when the rule names an undefined id
    pub fn check(&self, opcode: u8, session: &Session) -> Result<bool> {
        let precondition = self.rules[opcode as usize]
            .ok_or(ProtocolError::UnregisteredOpcode(opcode))?;
        let predicate = self.predicates[precondition as usize]
            .ok_or(ProtocolError::UnknownPrecondition(precondition))?;
        Ok(predicate(session))
    }
}
