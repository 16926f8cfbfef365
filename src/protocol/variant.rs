//! # Codec Variants
//!
//! Per-protocol-revision message encoders, linked into a delegation chain.
//!
//! Each client version only changes what differs from the version before it,
//! so a variant is data - an op table of the encodings it overrides - plus
//! one link to its predecessor. Invoking an operation walks the chain to the
//! first override; the base variant implements everything, so the walk always
//! terminates. This replaces a deep subclass tower with composition: adding a
//! revision means writing only its deltas and registering one table entry.
//!
//! ## Shipped revisions
//! - **V1110** - base: every operation
//! - **V1112** - item record grows a reserved byte mid-record (and the null
//!   item's zero run grows with it)
//! - **V1121** - icon diff entries carry a secondary lookup id and a
//!   negative-effect flag
//! - **V1125** - session id switches to the legacy little-endian field

use std::sync::Arc;

use bytes::Bytes;

use crate::core::frame::FrameBuilder;
use crate::error::{ProtocolError, Result};
use crate::protocol::model::{
    format_sale_price, ChargeEffect, EffectCategory, EffectRecord, IconDiffState, ItemCategory,
    ItemRecord,
};

/// Server message opcodes used by the shipped operations.
pub mod opcodes {
    /// Version acknowledgement plus symmetric-key material.
    pub const CRYPT_KEY: u8 = 0x22;
    /// Session id assignment.
    pub const SESSION_ID: u8 = 0x28;
    /// Ping echo.
    pub const PING_REPLY: u8 = 0x29;
    /// Incremental status-icon update.
    pub const UPDATE_ICONS: u8 = 0x7F;
}

/// Zero run written for a null item slot, base layout.
const NULL_ITEM_RUN: usize = 18;
/// Icon-diff removal entry body, base layout (everything after the index).
const ICON_REMOVAL_RUN: usize = 9;
/// Icon-diff removal entry body once the extended fields exist.
const ICON_REMOVAL_RUN_EXT: usize = 10;
/// Display names are capped at the pascal-string limit, silently.
const DISPLAY_NAME_CAP: usize = 255;

/// Normalized tag of a supported protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionTag {
    V1110,
    V1112,
    V1121,
    V1125,
}

impl VersionTag {
    /// The raw wire version this tag normalizes.
    pub fn raw(self) -> i32 {
        match self {
            VersionTag::V1110 => 1110,
            VersionTag::V1112 => 1112,
            VersionTag::V1121 => 1121,
            VersionTag::V1125 => 1125,
        }
    }
}

impl std::fmt::Display for VersionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let raw = self.raw();
        write!(f, "{}.{}", raw / 1000, (raw % 1000) / 10 * 10 + raw % 10)
    }
}

type ItemRecordOp = fn(&CodecVariant, &mut FrameBuilder, Option<&ItemRecord>) -> Result<()>;
type IconDiffOp =
    fn(&CodecVariant, &[EffectRecord], Option<&[u16]>, &mut IconDiffState) -> Result<Option<Bytes>>;
type CryptKeyOp = fn(&CodecVariant, &[u8]) -> Result<Bytes>;
type SessionIdOp = fn(&CodecVariant, u16) -> Result<Bytes>;
type PingReplyOp = fn(&CodecVariant, u32, u16) -> Result<Bytes>;

/// The operations a variant overrides. `None` delegates to the predecessor.
#[derive(Default)]
pub struct CodecOps {
    pub item_record: Option<ItemRecordOp>,
    pub icon_diff: Option<IconDiffOp>,
    pub crypt_key: Option<CryptKeyOp>,
    pub session_id: Option<SessionIdOp>,
    pub ping_reply: Option<PingReplyOp>,
}

/// One protocol revision: an override table plus a link to the previous
/// revision. Immutable after construction; shared across sessions.
pub struct CodecVariant {
    tag: VersionTag,
    raw_version: i32,
    ops: CodecOps,
    delegate: Option<Arc<CodecVariant>>,
}

impl std::fmt::Debug for CodecVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecVariant")
            .field("tag", &self.tag)
            .field("raw_version", &self.raw_version)
            .finish_non_exhaustive()
    }
}

impl CodecVariant {
    /// Assemble a variant from its deltas and its predecessor.
    pub fn new(tag: VersionTag, ops: CodecOps, delegate: Option<Arc<CodecVariant>>) -> Self {
        Self {
            tag,
            raw_version: tag.raw(),
            ops,
            delegate,
        }
    }

    pub fn tag(&self) -> VersionTag {
        self.tag
    }

    pub fn raw_version(&self) -> i32 {
        self.raw_version
    }

    /// Walk the chain for the first variant overriding the selected op.
    fn lookup<T: Copy>(&self, select: impl Fn(&CodecOps) -> Option<T>) -> Result<T> {
        let mut current = Some(self);
        while let Some(variant) = current {
            if let Some(op) = select(&variant.ops) {
                return Ok(op);
            }
            current = variant.delegate.as_deref();
        }
        // The base variant implements every op; reaching here means a chain
        // was assembled without one.
        Err(ProtocolError::ConfigError(format!(
            "codec chain for {:?} has no base implementation",
            self.tag
        )))
    }

    /// Write one bit-packed item record into an open frame body.
    ///
    /// A `None` item is a vacant slot and serializes as the revision's fixed
    /// zero run.
    pub fn write_item_record(
        &self,
        pak: &mut FrameBuilder,
        item: Option<&ItemRecord>,
    ) -> Result<()> {
        self.lookup(|ops| ops.item_record)?(self, pak, item)
    }

    /// Build the incremental status-icon diff frame.
    ///
    /// `changed` limits emitted entries to effects whose internal id is
    /// listed; `None` resends every visible effect. Returns `None` when
    /// nothing changed - the caller must then skip transmission entirely.
    pub fn icon_diff(
        &self,
        effects: &[EffectRecord],
        changed: Option<&[u16]>,
        state: &mut IconDiffState,
    ) -> Result<Option<Bytes>> {
        self.lookup(|ops| ops.icon_diff)?(self, effects, changed, state)
    }

    /// Build the version acknowledgement carrying the key-exchange blob.
    pub fn crypt_key(&self, key_blob: &[u8]) -> Result<Bytes> {
        self.lookup(|ops| ops.crypt_key)?(self, key_blob)
    }

    /// Build the session id assignment frame.
    pub fn session_id(&self, session_id: u16) -> Result<Bytes> {
        self.lookup(|ops| ops.session_id)?(self, session_id)
    }

    /// Build the ping reply frame.
    pub fn ping_reply(&self, timestamp: u32, sequence: u16) -> Result<Bytes> {
        self.lookup(|ops| ops.ping_reply)?(self, timestamp, sequence)
    }
}

/// Base revision: implements every operation.
pub fn v1110() -> Arc<CodecVariant> {
    Arc::new(CodecVariant::new(
        VersionTag::V1110,
        CodecOps {
            item_record: Some(item_record_base),
            icon_diff: Some(icon_diff_base),
            crypt_key: Some(crypt_key_base),
            session_id: Some(session_id_base),
            ping_reply: Some(ping_reply_base),
        },
        None,
    ))
}

/// Item record grows a reserved byte.
pub fn v1112(delegate: Arc<CodecVariant>) -> Arc<CodecVariant> {
    Arc::new(CodecVariant::new(
        VersionTag::V1112,
        CodecOps {
            item_record: Some(item_record_reserved),
            ..CodecOps::default()
        },
        Some(delegate),
    ))
}

/// Icon diff entries gain the secondary lookup id and negative flag.
pub fn v1121(delegate: Arc<CodecVariant>) -> Arc<CodecVariant> {
    Arc::new(CodecVariant::new(
        VersionTag::V1121,
        CodecOps {
            icon_diff: Some(icon_diff_extended),
            ..CodecOps::default()
        },
        Some(delegate),
    ))
}

/// Session id moves to the legacy little-endian field.
pub fn v1125(delegate: Arc<CodecVariant>) -> Arc<CodecVariant> {
    Arc::new(CodecVariant::new(
        VersionTag::V1125,
        CodecOps {
            session_id: Some(session_id_le),
            ..CodecOps::default()
        },
        Some(delegate),
    ))
}

// ---------------------------------------------------------------------------
// Item record
// ---------------------------------------------------------------------------

fn item_record_base(
    _variant: &CodecVariant,
    pak: &mut FrameBuilder,
    item: Option<&ItemRecord>,
) -> Result<()> {
    write_item_record_body(pak, item, false)
}

fn item_record_reserved(
    _variant: &CodecVariant,
    pak: &mut FrameBuilder,
    item: Option<&ItemRecord>,
) -> Result<()> {
    write_item_record_body(pak, item, true)
}

/// The two value bytes, reinterpreted per category. The slots are the same
/// two bytes on the wire for every category; only the meaning shifts.
fn item_value_bytes(item: &ItemRecord) -> (u8, u8) {
    match item.category {
        ItemCategory::Generic => (item.count as u8, (item.count >> 8) as u8),
        ItemCategory::Ammunition => (item.count.min(u8::MAX as u16) as u8, item.speed),
        ItemCategory::Thrown => (item.power, item.count.min(u8::MAX as u16) as u8),
        // rating 2 is reserved by the client's instrument delve
        ItemCategory::Instrument => (if item.power == 2 { 0 } else { item.power }, 0),
        ItemCategory::Shield => (item.damage_type, item.power),
        ItemCategory::Housing => (0, item.speed),
        ItemCategory::CraftMaterial => (0, 0),
        ItemCategory::Weapon => (item.power, item.speed),
    }
}

fn item_display_name(item: &ItemRecord) -> String {
    let mut name = if item.count > 1 {
        format!("{} {}", item.count, item.name)
    } else {
        item.name.clone()
    };
    if let Some(price) = item.sale_price {
        name.push_str(&format!(" [{}]", format_sale_price(price)));
    }
    truncate_display_name(&mut name);
    name
}

/// Silent cap at the pascal-string limit; no ellipsis, no error.
fn truncate_display_name(name: &mut String) {
    if name.len() > DISPLAY_NAME_CAP {
        let mut cut = DISPLAY_NAME_CAP;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
}

fn write_charge(pak: &mut FrameBuilder, charge: &ChargeEffect) -> Result<()> {
    pak.write_u16(charge.icon);
    let mut name = charge.name.clone();
    truncate_display_name(&mut name);
    pak.write_pascal_string(&name)
}

fn write_item_record_body(
    pak: &mut FrameBuilder,
    item: Option<&ItemRecord>,
    reserved_byte: bool,
) -> Result<()> {
    let Some(item) = item else {
        pak.fill(0x00, NULL_ITEM_RUN + usize::from(reserved_byte));
        return Ok(());
    };

    pak.write_u8(item.level);

    let (value1, value2) = item_value_bytes(item);
    pak.write_u8(value1);
    pak.write_u8(value2);

    // Housing objects reuse the hand slot for their placement rating.
    if item.category == ItemCategory::Housing {
        pak.write_u8(item.power);
    } else {
        pak.write_u8(item.hand << 6);
    }

    // Damage-type nibble rotated into the top bits, category code below.
    let damage = if item.damage_type > 3 {
        0
    } else {
        item.damage_type
    };
    pak.write_u8((damage << 6) | item.category.code());

    if reserved_byte {
        pak.write_u8(0x00);
    }

    pak.write_u16(item.weight);
    pak.write_u8(item.condition_percent);
    pak.write_u8(item.durability_percent);
    pak.write_u8(item.quality_percent);
    pak.write_u8(item.bonus_percent);
    pak.write_u16(item.model);

    if item.emblem != 0 {
        pak.write_u16(item.emblem);
    } else {
        pak.write_u16(item.color);
    }

    let mut flags = 0u8;
    if item.emblem != 0 && item.custom_emblem {
        flags |= 0x01;
    }
    if item.salvageable {
        flags |= 0x02;
    }
    if item.craftable {
        flags |= 0x04;
    }
    if item.primary_charge.is_some() {
        flags |= 0x08;
    }
    if item.secondary_charge.is_some() {
        flags |= 0x10;
    }
    pak.write_u8(flags);

    if let Some(charge) = &item.primary_charge {
        write_charge(pak, charge)?;
    }
    if let Some(charge) = &item.secondary_charge {
        write_charge(pak, charge)?;
    }

    pak.write_u8(item.effect);
    pak.write_pascal_string(&item_display_name(item))
}

// ---------------------------------------------------------------------------
// Icon diff
// ---------------------------------------------------------------------------

fn icon_diff_base(
    _variant: &CodecVariant,
    effects: &[EffectRecord],
    changed: Option<&[u16]>,
    state: &mut IconDiffState,
) -> Result<Option<Bytes>> {
    build_icon_diff(effects, changed, state, false)
}

fn icon_diff_extended(
    _variant: &CodecVariant,
    effects: &[EffectRecord],
    changed: Option<&[u16]>,
    state: &mut IconDiffState,
) -> Result<Option<Bytes>> {
    build_icon_diff(effects, changed, state, true)
}

/// Spell effects (and the high icon range shared with them) flash on
/// refresh; everything else keeps a steady icon.
fn flash_marker(effect: &EffectRecord, slot: u8) -> u8 {
    if effect.category == EffectCategory::Spell || effect.icon > 5000 {
        slot
    } else {
        0xFF
    }
}

fn build_icon_diff(
    effects: &[EffectRecord],
    changed: Option<&[u16]>,
    state: &mut IconDiffState,
    extended: bool,
) -> Result<Option<Bytes>> {
    let mut pak = FrameBuilder::stream(opcodes::UPDATE_ICONS);
    let count_at = pak.len();
    pak.write_u8(0); // entry count, patched below
    pak.fill(0, 3);

    let mut visible: u8 = 0;
    let mut entries: u8 = 0;

    for effect in effects {
        if effect.icon == 0 {
            continue;
        }
        let slot = visible;
        visible = visible.wrapping_add(1);

        if let Some(ids) = changed {
            if !ids.contains(&effect.internal_id) {
                continue;
            }
        }

        pak.write_u8(slot);
        pak.write_u8(flash_marker(effect, slot));
        pak.write_u8(u8::from(effect.immunity));
        pak.write_u16(effect.icon);
        pak.write_u16(effect.remaining_secs());
        if extended {
            // secondary lookup id: only spell effects may override the
            // client's cached tooltip
            pak.write_u16(if effect.category == EffectCategory::Spell {
                effect.tooltip_id
            } else {
                0
            });
            pak.write_u8(u8::from(effect.negative));
        } else {
            pak.write_u16(effect.internal_id);
        }
        let mut name = effect.name.clone();
        truncate_display_name(&mut name);
        pak.write_pascal_string(&name)?;
        entries = entries.wrapping_add(1);
    }

    // Explicit removals for slots the client still shows.
    let removal_run = if extended {
        ICON_REMOVAL_RUN_EXT
    } else {
        ICON_REMOVAL_RUN
    };
    let mut slot = visible;
    while state.last_sent_count > slot {
        pak.write_u8(slot);
        pak.fill(0, removal_run);
        slot = slot.wrapping_add(1);
        entries = entries.wrapping_add(1);
    }
    state.last_sent_count = visible;

    if entries == 0 {
        // nothing changed - no update is needed
        return Ok(None);
    }

    pak.patch_u8(count_at, entries)?;
    pak.finalize().map(Some)
}

// ---------------------------------------------------------------------------
// Handshake and keep-alive messages
// ---------------------------------------------------------------------------

fn crypt_key_base(variant: &CodecVariant, key_blob: &[u8]) -> Result<Bytes> {
    let raw = variant.raw_version();
    let mut pak = FrameBuilder::stream(opcodes::CRYPT_KEY);
    pak.write_u8(0x01); // key exchange enabled
    pak.write_u8((raw / 1000) as u8);
    pak.write_u8(((raw / 10) % 100) as u8);
    pak.write_u8((raw % 10) as u8);
    let len = u16::try_from(key_blob.len())
        .map_err(|_| ProtocolError::FrameTooLarge {
            length: key_blob.len(),
        })?;
    pak.write_u16(len);
    pak.write_bytes(key_blob);
    pak.finalize()
}

fn session_id_base(_variant: &CodecVariant, session_id: u16) -> Result<Bytes> {
    let mut pak = FrameBuilder::stream(opcodes::SESSION_ID);
    pak.write_u16(session_id);
    pak.finalize()
}

fn session_id_le(_variant: &CodecVariant, session_id: u16) -> Result<Bytes> {
    let mut pak = FrameBuilder::stream(opcodes::SESSION_ID);
    pak.write_u16_le(session_id);
    pak.finalize()
}

fn ping_reply_base(_variant: &CodecVariant, timestamp: u32, sequence: u16) -> Result<Bytes> {
    let mut pak = FrameBuilder::stream(opcodes::PING_REPLY);
    pak.write_u32(timestamp);
    pak.fill(0x00, 4);
    pak.write_u16(sequence.wrapping_add(1));
    pak.fill(0x00, 6);
    pak.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (
        Arc<CodecVariant>,
        Arc<CodecVariant>,
        Arc<CodecVariant>,
        Arc<CodecVariant>,
    ) {
        let base = v1110();
        let b = v1112(Arc::clone(&base));
        let c = v1121(Arc::clone(&b));
        let d = v1125(Arc::clone(&c));
        (base, b, c, d)
    }

    fn item(name: &str) -> ItemRecord {
        ItemRecord {
            level: 50,
            category: ItemCategory::Weapon,
            power: 165,
            speed: 37,
            hand: 1,
            damage_type: 2,
            weight: 35,
            model: 310,
            name: name.into(),
            ..ItemRecord::default()
        }
    }

    fn record_bytes(variant: &CodecVariant, item: Option<&ItemRecord>) -> Vec<u8> {
        let mut pak = FrameBuilder::stream(0x01);
        variant.write_item_record(&mut pak, item).unwrap();
        pak.finalize().unwrap()[3..].to_vec()
    }

    #[test]
    fn test_null_item_run_drifts_by_one() {
        let (base, reserved, _, _) = chain();
        assert_eq!(record_bytes(&base, None).len(), NULL_ITEM_RUN);
        assert_eq!(record_bytes(&reserved, None).len(), NULL_ITEM_RUN + 1);
        assert!(record_bytes(&reserved, None).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reserved_byte_sits_after_packed_type() {
        let (base, reserved, _, _) = chain();
        let it = item("Sword");
        let a = record_bytes(&base, Some(&it));
        let b = record_bytes(&reserved, Some(&it));
        assert_eq!(b.len(), a.len() + 1);
        // identical up to the packed type byte, then a zero is spliced in
        assert_eq!(&a[..5], &b[..5]);
        assert_eq!(b[5], 0x00);
        assert_eq!(&a[5..], &b[6..]);
    }

    #[test]
    fn test_item_packed_type_byte() {
        let (base, _, _, _) = chain();
        let it = item("Axe");
        let bytes = record_bytes(&base, Some(&it));
        // hand << 6
        assert_eq!(bytes[3], 1 << 6);
        // damage type rotated high, category code low
        assert_eq!(bytes[4], (2 << 6) | ItemCategory::Weapon.code());
    }

    #[test]
    fn test_item_damage_type_out_of_range_zeroed() {
        let (base, _, _, _) = chain();
        let mut it = item("Staff");
        it.damage_type = 9;
        let bytes = record_bytes(&base, Some(&it));
        assert_eq!(bytes[4], ItemCategory::Weapon.code());
    }

    #[test]
    fn test_item_value_bytes_per_category() {
        let mut it = item("Arrows");
        it.category = ItemCategory::Ammunition;
        it.count = 200;
        it.speed = 45;
        assert_eq!(item_value_bytes(&it), (200, 45));

        it.category = ItemCategory::Generic;
        it.count = 0x0204;
        assert_eq!(item_value_bytes(&it), (0x04, 0x02));

        it.category = ItemCategory::Shield;
        it.damage_type = 3;
        it.power = 90;
        assert_eq!(item_value_bytes(&it), (3, 90));

        it.category = ItemCategory::Instrument;
        it.power = 2;
        assert_eq!(item_value_bytes(&it), (0, 0));

        it.category = ItemCategory::CraftMaterial;
        assert_eq!(item_value_bytes(&it), (0, 0));
    }

    #[test]
    fn test_item_charge_flags_gate_subrecords() {
        let (base, _, _, _) = chain();
        let mut it = item("Ring");
        let plain = record_bytes(&base, Some(&it));

        it.primary_charge = Some(ChargeEffect {
            icon: 0x1234,
            name: "Haste".into(),
        });
        let charged = record_bytes(&base, Some(&it));

        // flags byte gains bit 3; sub-record = icon(2) + name(1+5)
        assert_eq!(charged.len(), plain.len() + 8);
        let flags_at = 15; // fixed prefix before the flags byte
        assert_eq!(plain[flags_at] & 0x08, 0);
        assert_eq!(charged[flags_at] & 0x08, 0x08);
        assert_eq!(&charged[flags_at + 1..flags_at + 3], &[0x12, 0x34]);
        assert_eq!(charged[flags_at + 3], 5);
        assert_eq!(&charged[flags_at + 4..flags_at + 9], b"Haste");
    }

    #[test]
    fn test_item_name_count_and_price_suffix() {
        let (base, _, _, _) = chain();
        let mut it = item("Arrow");
        it.count = 20;
        it.category = ItemCategory::Ammunition;
        it.sale_price = Some(10_000);
        let bytes = record_bytes(&base, Some(&it));
        let name_len = bytes[bytes.len() - 1 - "20 Arrow [1g]".len()] as usize;
        let name = &bytes[bytes.len() - name_len..];
        assert_eq!(name, b"20 Arrow [1g]");
    }

    #[test]
    fn test_item_name_truncated_silently() {
        let (base, _, _, _) = chain();
        let mut it = item(&"n".repeat(300));
        it.sale_price = Some(5);
        let bytes = record_bytes(&base, Some(&it));
        // length prefix says 255 and the record ends exactly there
        let tail = &bytes[bytes.len() - 256..];
        assert_eq!(tail[0], 255);
    }

    #[test]
    fn test_delegation_unoverridden_is_byte_identical() {
        let (_, reserved, icons, le) = chain();
        let it = item("Hammer");
        // v1121 and v1125 do not override the item record; output must match
        // their delegate exactly
        assert_eq!(
            record_bytes(&icons, Some(&it)),
            record_bytes(&reserved, Some(&it))
        );
        assert_eq!(
            record_bytes(&le, Some(&it)),
            record_bytes(&reserved, Some(&it))
        );
    }

    #[test]
    fn test_override_replaces_delegate() {
        let (base, _, _, le) = chain();
        let base_frame = base.session_id(0x0102).unwrap();
        let le_frame = le.session_id(0x0102).unwrap();
        assert_eq!(&base_frame[3..], &[0x01, 0x02]);
        assert_eq!(&le_frame[3..], &[0x02, 0x01]);
    }

    #[test]
    fn test_crypt_key_layout() {
        let (base, _, _, _) = chain();
        let frame = base.crypt_key(&[0xAA, 0xBB]).unwrap();
        assert_eq!(frame[2], opcodes::CRYPT_KEY);
        assert_eq!(frame[3], 0x01);
        // 1110 -> digits 1, 11, 0
        assert_eq!(&frame[4..7], &[1, 11, 0]);
        assert_eq!(&frame[7..9], &[0x00, 0x02]);
        assert_eq!(&frame[9..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_ping_reply_layout() {
        let (base, _, _, _) = chain();
        let frame = base.ping_reply(0xDEADBEEF, 41).unwrap();
        assert_eq!(frame[2], opcodes::PING_REPLY);
        assert_eq!(&frame[3..7], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&frame[7..11], &[0, 0, 0, 0]);
        assert_eq!(&frame[11..13], &[0, 42]);
        assert_eq!(&frame[13..], &[0, 0, 0, 0, 0, 0]);
    }

    fn effect(icon: u16, id: u16) -> EffectRecord {
        EffectRecord {
            icon,
            name: format!("fx-{id}"),
            remaining_ms: 30_000,
            internal_id: id,
            category: EffectCategory::Spell,
            immunity: false,
            negative: false,
            tooltip_id: id + 1000,
        }
    }

    #[test]
    fn test_icon_diff_suppressed_when_unchanged() {
        let (base, _, _, _) = chain();
        let effects = vec![effect(10, 1), effect(11, 2)];
        let mut state = IconDiffState::default();

        // full resend populates the client
        let first = base.icon_diff(&effects, None, &mut state).unwrap();
        assert!(first.is_some());
        assert_eq!(state.last_sent_count, 2);

        // identical list, nothing flagged changed: zero bytes, no send
        let second = base.icon_diff(&effects, Some(&[]), &mut state).unwrap();
        assert!(second.is_none());
        assert_eq!(state.last_sent_count, 2);
    }

    #[test]
    fn test_icon_diff_removal_padding() {
        let (base, _, _, _) = chain();
        let mut state = IconDiffState::default();
        let effects = vec![effect(10, 1), effect(11, 2), effect(12, 3)];
        base.icon_diff(&effects, None, &mut state).unwrap();

        // one effect expired: expect two removal entries' worth of padding
        let remaining = vec![effect(10, 1)];
        let frame = base
            .icon_diff(&remaining, Some(&[]), &mut state)
            .unwrap()
            .unwrap();
        assert_eq!(state.last_sent_count, 1);
        // entry count = 2 removals
        assert_eq!(frame[3], 2);
        let body = &frame[7..];
        assert_eq!(body.len(), 2 * (1 + ICON_REMOVAL_RUN));
        assert_eq!(body[0], 1); // first vacated slot index
        assert!(body[1..1 + ICON_REMOVAL_RUN].iter().all(|&b| b == 0));
        assert_eq!(body[1 + ICON_REMOVAL_RUN], 2);
    }

    #[test]
    fn test_icon_diff_skips_iconless_effects() {
        let (base, _, _, _) = chain();
        let mut state = IconDiffState::default();
        let effects = vec![effect(0, 1), effect(42, 2)];
        let frame = base.icon_diff(&effects, None, &mut state).unwrap().unwrap();
        assert_eq!(frame[3], 1);
        assert_eq!(state.last_sent_count, 1);
    }

    #[test]
    fn test_icon_diff_flash_marker() {
        let (base, _, _, _) = chain();
        let mut state = IconDiffState::default();
        let mut steady = effect(42, 1);
        steady.category = EffectCategory::Combat;
        let frame = base
            .icon_diff(&[steady], None, &mut state)
            .unwrap()
            .unwrap();
        let body = &frame[7..];
        assert_eq!(body[0], 0); // slot
        assert_eq!(body[1], 0xFF); // steady, no flash
    }

    #[test]
    fn test_icon_diff_extended_entry() {
        let (_, _, icons, _) = chain();
        let mut state = IconDiffState::default();
        let mut fx = effect(42, 7);
        fx.negative = true;
        let frame = icons.icon_diff(&[fx], None, &mut state).unwrap().unwrap();
        let body = &frame[7..];
        // index, flash, immunity, icon, secs, tooltip, negative, name
        assert_eq!(&body[3..5], &42u16.to_be_bytes());
        assert_eq!(&body[5..7], &30u16.to_be_bytes());
        assert_eq!(&body[7..9], &1007u16.to_be_bytes());
        assert_eq!(body[9], 1);
    }

    #[test]
    fn test_icon_diff_extended_tooltip_gated_by_category() {
        let (_, _, icons, _) = chain();
        let mut state = IconDiffState::default();
        let mut fx = effect(42, 7);
        fx.category = EffectCategory::Static;
        let frame = icons.icon_diff(&[fx], None, &mut state).unwrap().unwrap();
        let body = &frame[7..];
        assert_eq!(&body[7..9], &[0, 0]); // tooltip suppressed
    }

    #[test]
    fn test_icon_diff_changed_filter_keeps_slot_numbering() {
        let (base, _, _, _) = chain();
        let mut state = IconDiffState::default();
        let effects = vec![effect(10, 1), effect(11, 2)];
        base.icon_diff(&effects, None, &mut state).unwrap();

        // only the second effect refreshed; its entry must still claim slot 1
        let frame = base
            .icon_diff(&effects, Some(&[2]), &mut state)
            .unwrap()
            .unwrap();
        assert_eq!(frame[3], 1);
        assert_eq!(frame[7], 1); // slot index of the second effect
    }
}
