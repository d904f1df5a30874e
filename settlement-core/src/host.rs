//! Read-only interfaces into the host world simulation (`SPEC_FULL.md` §6).
//!
//! The engine never owns a `Map` or `Country` — it borrows them for the
//! duration of `World::tick_year` through these traits, and returns a small
//! `CountryWriteBack` per country for the host to apply afterwards. This
//! keeps the whole tick atomic: the host never observes partially-updated
//! country state (`SPEC_FULL.md` §5).

use crate::types::CountryId;

/// Per-field read-only view the host's map implements.
///
/// All coordinates are in field units (`fieldWidth x fieldHeight`), not
/// pixels; `field_cell_size` is the conversion factor used only when
/// projecting a country's starting pixel onto this grid (§4.1, §4.13).
pub trait FieldGrid {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn is_land(&self, fx: i32, fy: i32) -> bool;
    fn owner_id(&self, fx: i32, fy: i32) -> CountryId;
    fn population(&self, fx: i32, fy: i32) -> f64;
    fn food_potential(&self, fx: i32, fy: i32) -> f64;
    fn move_cost(&self, fx: i32, fy: i32) -> f64;
    fn corridor_weight(&self, fx: i32, fy: i32) -> f64;
    fn precip_mean(&self, fx: i32, fy: i32) -> f64;
    fn temp_mean(&self, fx: i32, fy: i32) -> f64;
    fn field_cell_size(&self) -> i32;

    fn in_bounds(&self, fx: i32, fy: i32) -> bool {
        fx >= 0 && fy >= 0 && fx < self.width() && fy < self.height()
    }

    fn field_index(&self, fx: i32, fy: i32) -> usize {
        (fy as usize) * (self.width() as usize) + (fx as usize)
    }
}

/// Macro-economic scalars the engine reads from each country and partially
/// writes back after a tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroEconomy {
    pub market_access: f64,
    pub knowledge_stock: f64,
    pub institution_capacity: f64,
    pub famine_severity: f64,
    pub disease_burden: f64,
    pub migration_pressure_out: f64,
    pub migration_attractiveness: f64,
    pub net_revenue: f64,
    pub inequality: f64,
}

/// Read-only view of a host country the engine implements tick logic
/// against. The host's own `Country` type implements this trait; tests use
/// a plain struct stand-in (see `tests/scenarios.rs`).
pub trait CountryView {
    fn index(&self) -> CountryId;
    fn name(&self) -> &str;
    fn starting_pixel(&self) -> (i32, i32);
    fn population(&self) -> f64;
    fn legitimacy(&self) -> f64;
    fn avg_control(&self) -> f64;
    fn admin_capacity(&self) -> f64;
    fn tax_rate(&self) -> f64;
    fn is_at_war(&self) -> bool;
    fn enemies(&self) -> &[CountryId];
    fn macro_economy(&self) -> MacroEconomy;
}

/// The enumerated write-back fields the engine produces per country after a
/// tick (`SPEC_FULL.md` §6 "Written to countries"). The host applies these
/// itself; the engine never mutates host state directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountryWriteBack {
    pub legitimacy_delta: f64,
    pub avg_control_delta: f64,
    pub admin_capacity_delta: f64,
    pub tax_rate: f64,
    pub specialist_population: f64,
    pub knowledge_infra: f64,
    pub net_revenue: f64,
    pub institution_capacity: f64,
    pub market_access: f64,
    pub migration_pressure_out: f64,
    pub migration_attractiveness: f64,
}
