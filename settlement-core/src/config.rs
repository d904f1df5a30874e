//! The engine's configuration surface (`SPEC_FULL.md` §6, §10.3).
//!
//! Every sub-config derives `Serialize`/`Deserialize` so a host can load
//! `EngineConfig` from its own config file (JSON via `serde_json`, same as
//! the rest of this crate's persistence) or build it in code from defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementsConfig {
    pub enabled: bool,
    pub init_node_min_pop: f64,
    pub max_nodes_global: usize,
    pub max_nodes_per_country: usize,
    pub split_min_spacing_fields: i32,
    pub split_cooldown_years: i64,
    pub split_pop_threshold: f64,
    pub split_alpha_min: f64,
    pub split_alpha_max: f64,
    pub k_base_per_food_unit: f64,
    pub cal0: f64,
    pub cal_slope: f64,
    pub growth_r_min: f64,
    pub growth_r_max: f64,
    pub transport_rebuild_interval_years: i64,
}

impl Default for SettlementsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            init_node_min_pop: 30.0,
            max_nodes_global: 4096,
            max_nodes_per_country: 256,
            split_min_spacing_fields: 3,
            split_cooldown_years: 40,
            split_pop_threshold: 6000.0,
            split_alpha_min: 0.30,
            split_alpha_max: 0.48,
            k_base_per_food_unit: 6.0,
            cal0: 2.0,
            cal_slope: 0.6,
            growth_r_min: 0.002,
            growth_r_max: 0.028,
            transport_rebuild_interval_years: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub k_nearest: usize,
    pub max_edge_cost: f64,
    pub land_cost_mult: f64,
    pub sea_cost_mult: f64,
    pub border_friction: f64,
    pub war_risk_mult: f64,
    pub gravity_kappa: f64,
    pub gravity_alpha: f64,
    pub gravity_beta: f64,
    pub gravity_gamma: f64,
    pub migration_m0: f64,
    pub migration_dist_decay: f64,
    pub specialist_eta: f64,
    pub specialist_lambda: f64,
    /// Stored and exposed for the host's own use; the engine never reads
    /// this value itself (see `SPEC_FULL.md` §9 Open Question (c)).
    pub trade_hint_blend: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            k_nearest: 4,
            max_edge_cost: 180.0,
            land_cost_mult: 1.0,
            sea_cost_mult: 0.6,
            border_friction: 1.35,
            war_risk_mult: 1.6,
            gravity_kappa: 0.015,
            gravity_alpha: 0.7,
            gravity_beta: 0.7,
            gravity_gamma: 1.1,
            migration_m0: 0.55,
            migration_dist_decay: 0.015,
            specialist_eta: 0.02,
            specialist_lambda: 0.015,
            trade_hint_blend: 0.35,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsistenceConfig {
    pub mix_adapt_rate: f64,
    pub craft_from_market_weight: f64,
}

impl Default for SubsistenceConfig {
    fn default() -> Self {
        Self {
            mix_adapt_rate: 0.12,
            craft_from_market_weight: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    pub enabled: bool,
    pub adoption_base: f64,
    pub environment_weight: f64,
    pub diffusion_weight: f64,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            adoption_base: 0.22,
            environment_weight: 0.55,
            diffusion_weight: 0.35,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiseaseConfig {
    pub initial_infected_share: f64,
    pub initial_recovered_share: f64,
    pub endemic_base: f64,
    pub endemic_institution_mitigation: f64,
}

impl Default for DiseaseConfig {
    fn default() -> Self {
        Self {
            initial_infected_share: 0.01,
            initial_recovered_share: 0.0,
            endemic_base: 0.10,
            endemic_institution_mitigation: 0.20,
        }
    }
}

/// The miscellaneous per-phase toggles and rates the reference implementation
/// groups under `researchSettlement` — pastoral mobility, household extraction,
/// campaign logistics, polity switching, and the irrigation feedback loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSettlementConfig {
    pub pastoral_mobility: bool,
    pub pastoral_route_radius: i32,
    pub pastoral_move_share: f64,

    pub households_extraction: bool,
    pub extraction_base: f64,
    pub extraction_admin_weight: f64,
    pub extraction_legitimacy_weight: f64,
    pub extraction_storage_invest_share: f64,
    pub extraction_irrigation_invest_share: f64,
    pub extraction_road_invest_share: f64,

    pub campaign_logistics: bool,
    pub campaign_demand_base: f64,
    pub campaign_demand_war_scale: f64,
    pub campaign_attrition_rate: f64,
    pub campaign_node_shock_scale: f64,

    pub polity_choice_assignment: bool,
    pub polity_switch_threshold: f64,
    pub polity_switch_max_node_share: f64,

    pub irrigation_loop: bool,
    pub irrigation_depreciation: f64,
    pub irrigation_fertility_shield: f64,
    pub irrigation_water_boost: f64,

    pub transport_path_rebuild: bool,
}

impl Default for ResearchSettlementConfig {
    fn default() -> Self {
        Self {
            pastoral_mobility: true,
            pastoral_route_radius: 4,
            pastoral_move_share: 0.5,

            households_extraction: true,
            extraction_base: 0.10,
            extraction_admin_weight: 0.20,
            extraction_legitimacy_weight: 0.15,
            extraction_storage_invest_share: 0.35,
            extraction_irrigation_invest_share: 0.30,
            extraction_road_invest_share: 0.15,

            campaign_logistics: true,
            campaign_demand_base: 2.0,
            campaign_demand_war_scale: 0.08,
            campaign_attrition_rate: 0.9,
            campaign_node_shock_scale: 0.5,

            polity_choice_assignment: true,
            polity_switch_threshold: 0.12,
            polity_switch_max_node_share: 0.05,

            irrigation_loop: true,
            irrigation_depreciation: 0.01,
            irrigation_fertility_shield: 0.5,
            irrigation_water_boost: 0.08,

            transport_path_rebuild: false,
        }
    }
}

/// Aggregate configuration surface, one field per `SPEC_FULL.md` §6 group.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub settlements: SettlementsConfig,
    pub transport: TransportConfig,
    pub subsistence: SubsistenceConfig,
    pub packages: PackagesConfig,
    pub disease: DiseaseConfig,
    pub research_settlement: ResearchSettlementConfig,
    /// Deterministic world seed mixed into every per-tick jitter draw.
    pub world_seed: u64,
    /// Host-provided field cell size in pixels, used to convert starting
    /// pixels to field coordinates (`SPEC_FULL.md` §9 Open Question (a)).
    pub field_cell_size: i32,
    pub debug_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).expect("serialize default config");
        let back: EngineConfig = serde_json::from_str(&json).expect("deserialize default config");
        assert_eq!(back.settlements.max_nodes_global, cfg.settlements.max_nodes_global);
        assert_eq!(back.transport.k_nearest, cfg.transport.k_nearest);
    }

    #[test]
    fn partial_json_fills_remaining_fields_from_default() {
        let json = r#"{"transport": {"k_nearest": 8}}"#;
        let cfg: EngineConfig = serde_json::from_str(json).expect("deserialize partial config");
        assert_eq!(cfg.transport.k_nearest, 8);
        assert_eq!(cfg.transport.max_edge_cost, TransportConfig::default().max_edge_cost);
    }
}
