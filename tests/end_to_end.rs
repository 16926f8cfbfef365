//! End-to-end connection tests
//!
//! Drives a full connection the way a server would: version announcement,
//! key exchange, then encrypted traffic through the processor with the
//! builtin gate rules in force.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use realm_protocol::config::ProtocolConfig;
use realm_protocol::core::cipher::{FrameGeometry, StreamCipher};
use realm_protocol::core::frame::{checksum, FrameBuilder};
use realm_protocol::error::Result;
use realm_protocol::protocol::gate::{client_opcodes, PreconditionGate};
use realm_protocol::protocol::handshake::{
    install_session_key, negotiate_version, RsaKeyExchange,
};
use realm_protocol::protocol::session::Account;
use realm_protocol::protocol::variant::opcodes;
use realm_protocol::transport::LoopbackTransport;
use realm_protocol::utils::Metrics;
use realm_protocol::{
    HandlerTable, InboundFrame, PacketHandler, PacketProcessor, Session, VersionRegistry,
};

const SESSION_KEY: &[u8] = b"negotiated-session-key";

/// Build a well-formed inbound frame around a payload.
fn inbound(code: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.extend_from_slice(&code.to_be_bytes());
    frame.extend_from_slice(payload);
    let sum = checksum(&frame);
    frame.extend_from_slice(&sum.to_be_bytes());
    frame
}

/// Version announcement handler: resolves the codec and queues the
/// acknowledgement carrying the public key blob.
struct CryptRequestHandler {
    registry: Arc<VersionRegistry>,
    key_exchange: Arc<RsaKeyExchange>,
    outbox: Arc<Mutex<Vec<Bytes>>>,
}

impl PacketHandler for CryptRequestHandler {
    fn handle(&self, session: &mut Session, frame: &InboundFrame) -> Result<()> {
        let mut rd = frame.reader();
        let raw_version = i32::from(rd.read_u16()?);
        let ack = negotiate_version(
            session,
            raw_version,
            &self.registry,
            self.key_exchange.as_ref(),
        )?;
        self.outbox.lock().unwrap().push(ack);
        Ok(())
    }
}

/// Ping handler: queues the codec's ping reply.
struct PingHandler {
    outbox: Arc<Mutex<Vec<Bytes>>>,
}

impl PacketHandler for PingHandler {
    fn handle(&self, session: &mut Session, frame: &InboundFrame) -> Result<()> {
        let mut rd = frame.reader();
        let timestamp = rd.read_u32()?;
        let reply = session.codec()?.ping_reply(timestamp, frame.sequence())?;
        self.outbox.lock().unwrap().push(reply);
        Ok(())
    }
}

struct Harness {
    processor: PacketProcessor<LoopbackTransport>,
    key_exchange: Arc<RsaKeyExchange>,
    outbox: Arc<Mutex<Vec<Bytes>>>,
}

fn harness() -> Harness {
    let registry = Arc::new(VersionRegistry::with_default_variants());
    let key_exchange = Arc::new(RsaKeyExchange::generate(1024).unwrap());
    let outbox = Arc::new(Mutex::new(Vec::new()));

    let mut handlers = HandlerTable::new();
    handlers.register(
        client_opcodes::CRYPT_REQUEST,
        Arc::new(CryptRequestHandler {
            registry,
            key_exchange: Arc::clone(&key_exchange),
            outbox: Arc::clone(&outbox),
        }),
    );
    handlers.register(
        client_opcodes::PING_REQUEST,
        Arc::new(PingHandler {
            outbox: Arc::clone(&outbox),
        }),
    );

    let processor = PacketProcessor::new(
        LoopbackTransport::new(),
        &ProtocolConfig::default(),
        Arc::new(PreconditionGate::with_builtins()),
        Arc::new(handlers),
        Arc::new(Metrics::new()),
    );
    Harness {
        processor,
        key_exchange,
        outbox,
    }
}

#[test]
fn test_full_connection_flow() {
    let mut h = harness();

    // 1. client announces version 1121
    h.processor
        .receive(&inbound(u16::from(client_opcodes::CRYPT_REQUEST), &1121u16.to_be_bytes()))
        .unwrap();

    let ack = h.outbox.lock().unwrap().remove(0);
    assert_eq!(ack[2], opcodes::CRYPT_KEY);
    assert_eq!(h.processor.session().raw_version(), Some(1121));

    // 2. client encrypts the session key under the blob from the ack
    let blob_len = u16::from_be_bytes([ack[7], ack[8]]) as usize;
    let ciphertext =
        RsaKeyExchange::encrypt_with_public_key(&ack[9..9 + blob_len], SESSION_KEY).unwrap();
    install_session_key(
        h.processor.session_mut(),
        &ciphertext,
        h.key_exchange.as_ref(),
    )
    .unwrap();
    assert!(h.processor.session().is_symmetric_encrypted());

    // 3. encrypted ping round trip
    let mut ping = inbound(
        u16::from(client_opcodes::PING_REQUEST),
        &[0xDE, 0xAD, 0xBE, 0xEF],
    );
    let mut client_cipher = StreamCipher::new();
    client_cipher.set_key(SESSION_KEY).unwrap();
    client_cipher
        .encode(&mut ping, FrameGeometry::InboundStream)
        .unwrap();
    h.processor.receive(&ping).unwrap();

    let reply = h.outbox.lock().unwrap().remove(0);
    assert_eq!(reply[2], opcodes::PING_REPLY);
    assert_eq!(&reply[3..7], &[0xDE, 0xAD, 0xBE, 0xEF]);

    // 4. the reply goes out ciphered; the client cipher reads it back
    h.processor.send_stream(reply.clone()).unwrap();
    let on_wire = h.processor.transport().stream_frames()[0].clone();
    assert_ne!(&on_wire[2..], &reply[2..]);
    let mut buf = on_wire.to_vec();
    client_cipher.decode(&mut buf, FrameGeometry::Stream).unwrap();
    assert_eq!(&buf[..], &reply[..]);
}

#[test]
fn test_login_scoped_opcode_blocked_until_account() {
    let mut h = harness();

    struct Flagging(Arc<Mutex<bool>>);
    impl PacketHandler for Flagging {
        fn handle(&self, _: &mut Session, _: &InboundFrame) -> Result<()> {
            *self.0.lock().unwrap() = true;
            Ok(())
        }
    }
    let flag = Arc::new(Mutex::new(false));
    {
        let mut handlers = HandlerTable::new();
        handlers.register(client_opcodes::CHAR_SELECT, Arc::new(Flagging(Arc::clone(&flag))));
        h.processor = PacketProcessor::new(
            LoopbackTransport::new(),
            &ProtocolConfig::default(),
            Arc::new(PreconditionGate::with_builtins()),
            Arc::new(handlers),
            Arc::new(Metrics::new()),
        );
    }

    // no account yet: gated, silently dropped
    h.processor
        .receive(&inbound(u16::from(client_opcodes::CHAR_SELECT), &[]))
        .unwrap();
    assert!(!*flag.lock().unwrap());

    h.processor.session_mut().set_account(Account {
        name: "tester".into(),
    });
    h.processor
        .receive(&inbound(u16::from(client_opcodes::CHAR_SELECT), &[]))
        .unwrap();
    assert!(*flag.lock().unwrap());
}

#[test]
fn test_corrupted_stream_disconnects() {
    let mut h = harness();
    let mut frame = inbound(u16::from(client_opcodes::PING_REQUEST), &[0; 4]);
    frame[6] ^= 0x40; // flip a header bit after the checksum was computed
    assert!(h.processor.receive(&frame).is_err());
}

#[test]
fn test_datagram_send_after_handshake() {
    let mut h = harness();
    h.processor
        .session_mut()
        .set_session_key(SESSION_KEY.to_vec())
        .unwrap();

    let mut pak = FrameBuilder::datagram(0x42);
    pak.write_u16(0x0102);
    h.processor.send_datagram(pak.finalize().unwrap(), false).unwrap();

    let sent = h.processor.transport().datagram_frames()[0].clone();
    // size and counter in the clear, body ciphered
    assert_eq!(&sent[..2], &[0x00, 0x03]);
    assert_eq!(&sent[2..4], &[0x00, 0x01]);

    let mut client_cipher = StreamCipher::new();
    client_cipher.set_key(SESSION_KEY).unwrap();
    let mut buf = sent.to_vec();
    client_cipher
        .decode(&mut buf, FrameGeometry::Datagram)
        .unwrap();
    assert_eq!(&buf[4..], &[0x42, 0x01, 0x02]);
}
