//! Core scalar and identifier types shared across the engine.

use serde::{Deserialize, Serialize};

/// Index into the engine's node vector. Stable only within a tick; re-derive
/// after any step that may reorder nodes (see `world::World::node_index_of`).
pub type NodeIndex = usize;

/// Index into the engine's edge vector. Same stability caveat as `NodeIndex`.
pub type EdgeIndex = usize;

/// Index into a flat `fieldWidth * fieldHeight` row-major field array.
pub type FieldIndex = usize;

/// Monotonically assigned node identity, stable across ticks (unlike `NodeIndex`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Index of a country in the host's country vector, or `None` for unowned.
pub type CountryId = i32;

/// Domestic-package identifier (index into the static package table).
pub type PackageId = u32;

pub type Population = f64;
pub type Calories = f64;
pub type Fraction = f64;

/// The five subsistence modes a node splits its population across.
///
/// `mix()` payoffs, yields and multipliers are always indexed in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SubsistenceMode {
    Foraging = 0,
    Farming = 1,
    Pastoral = 2,
    Fishing = 3,
    Craft = 4,
}

impl SubsistenceMode {
    pub const COUNT: usize = 5;
    pub const ALL: [SubsistenceMode; Self::COUNT] = [
        SubsistenceMode::Foraging,
        SubsistenceMode::Farming,
        SubsistenceMode::Pastoral,
        SubsistenceMode::Fishing,
        SubsistenceMode::Craft,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-field climate state. `Normal` is the rest state; the others apply
/// multiplicative regen/deplete modifiers to fertility (see `phases::climate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClimateRegime {
    Normal = 0,
    Drought = 1,
    Pluvial = 2,
    Cold = 3,
}

impl ClimateRegime {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ClimateRegime::Drought,
            2 => ClimateRegime::Pluvial,
            3 => ClimateRegime::Cold,
            _ => ClimateRegime::Normal,
        }
    }
}

/// No owning country. Mirrors the reference implementation's `-1` sentinel.
pub const UNOWNED: CountryId = -1;

/// Sentinel for "never split" / "far in the past", matching the reference's
/// `-9999999` constant used for `lastSplitYear` before any fission occurs.
pub const NEVER_SPLIT_YEAR: i64 = -9_999_999;
