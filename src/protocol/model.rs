//! # Game-Domain Records
//!
//! Opaque, read-only views of the game objects the codecs serialize.
//!
//! The protocol layer never owns game state; these records are snapshots a
//! caller assembles from its own player/inventory/effect systems. Nothing
//! here knows about frames or versions - layout decisions live entirely in
//! the codec variants.

/// Closed set of item categories.
///
/// The category decides how the two context-dependent value bytes of an item
/// record are interpreted by the client. This set is closed by the client's
/// parser; adding a category is a protocol revision, not a data change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCategory {
    /// Plain stackable item; value bytes carry the stack count split low/high.
    Generic,
    /// Arrows, bolts, poisons: count plus speed.
    Ammunition,
    /// Thrown weapons: power rating plus count.
    Thrown,
    /// Instruments: power rating only, with one reserved rating remapped.
    Instrument,
    /// Shields: damage class plus power rating.
    Shield,
    /// House and garden objects: placement width in the speed slot.
    Housing,
    /// Crafting materials and gems: both value bytes unused.
    CraftMaterial,
    /// Default weapon/armor interpretation: power plus speed.
    Weapon,
}

impl ItemCategory {
    /// Wire code carried in the low bits of the packed type byte.
    pub fn code(self) -> u8 {
        match self {
            ItemCategory::Generic => 0,
            ItemCategory::Weapon => 1,
            ItemCategory::Shield => 2,
            ItemCategory::Instrument => 3,
            ItemCategory::Ammunition => 4,
            ItemCategory::Thrown => 5,
            ItemCategory::Housing => 6,
            ItemCategory::CraftMaterial => 7,
        }
    }
}

/// A charge effect carried by an item: icon plus display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeEffect {
    pub icon: u16,
    pub name: String,
}

/// Read-only snapshot of one inventory item.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub level: u8,
    pub category: ItemCategory,
    /// Stack count; presented to the client inside the display name when > 1.
    pub count: u16,
    /// Damage-per-second / armor-factor style rating.
    pub power: u8,
    /// Speed / absorption style rating.
    pub speed: u8,
    /// Which hand(s) the item occupies, two meaningful bits.
    pub hand: u8,
    /// Damage class, values above 3 are not representable on the wire.
    pub damage_type: u8,
    pub weight: u16,
    pub condition_percent: u8,
    pub durability_percent: u8,
    pub quality_percent: u8,
    pub bonus_percent: u8,
    pub model: u16,
    /// Guild emblem id; zero means "use `color` instead".
    pub emblem: u16,
    pub color: u16,
    /// Emblem uses the extended custom format.
    pub custom_emblem: bool,
    pub salvageable: bool,
    pub craftable: bool,
    pub primary_charge: Option<ChargeEffect>,
    pub secondary_charge: Option<ChargeEffect>,
    pub effect: u8,
    pub name: String,
    /// Consignment sale price in copper; appended to the display name.
    pub sale_price: Option<u32>,
}

impl Default for ItemRecord {
    fn default() -> Self {
        Self {
            level: 1,
            category: ItemCategory::Weapon,
            count: 1,
            power: 0,
            speed: 0,
            hand: 0,
            damage_type: 0,
            weight: 0,
            condition_percent: 100,
            durability_percent: 100,
            quality_percent: 100,
            bonus_percent: 0,
            model: 0,
            emblem: 0,
            color: 0,
            custom_emblem: false,
            salvageable: false,
            craftable: false,
            primary_charge: None,
            secondary_charge: None,
            effect: 0,
            name: String::new(),
            sale_price: None,
        }
    }
}

/// Format a copper amount the way the client shows money: gold, silver,
/// copper, zero units omitted.
pub fn format_sale_price(copper: u32) -> String {
    let gold = copper / 10_000;
    let silver = (copper / 100) % 100;
    let copper = copper % 100;
    let mut parts = Vec::with_capacity(3);
    if gold > 0 {
        parts.push(format!("{gold}g"));
    }
    if silver > 0 {
        parts.push(format!("{silver}s"));
    }
    if copper > 0 || parts.is_empty() {
        parts.push(format!("{copper}c"));
    }
    parts.join(" ")
}

/// Effect source category; decides flash-marker and secondary-lookup rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectCategory {
    /// Spell effects: flash on refresh, carry a secondary lookup id.
    Spell,
    /// Combat styles and procs.
    Combat,
    /// Static world/item effects.
    Static,
}

/// Read-only snapshot of one active effect on a player.
#[derive(Debug, Clone)]
pub struct EffectRecord {
    /// Status-bar icon; zero means "never shown", diffed out entirely.
    pub icon: u16,
    pub name: String,
    pub remaining_ms: u32,
    /// Server-side handle the client echoes back to cancel the effect.
    pub internal_id: u16,
    pub category: EffectCategory,
    /// Immunity window active; the client shows "protected by" on the icon.
    pub immunity: bool,
    pub negative: bool,
    /// Secondary lookup id for delve info. Nonzero only for spell effects.
    pub tooltip_id: u16,
}

impl EffectRecord {
    /// Remaining duration in whole seconds, saturating at the field width.
    pub fn remaining_secs(&self) -> u16 {
        (self.remaining_ms / 1000).min(u16::MAX as u32) as u16
    }
}

/// Per-session bookkeeping for the incremental icon diff: how many slots the
/// client currently shows, so removals can be padded explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct IconDiffState {
    pub last_sent_count: u8,
}
