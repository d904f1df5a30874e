//! The engine's state container and tick entry point (`SPEC_FULL.md` §3, §5).

use crate::config::EngineConfig;
use crate::country::{SettlementCountryAggregate, TradeHintMatrix};
use crate::edge::TransportEdge;
use crate::field::FieldState;
use crate::host::{CountryView, CountryWriteBack, FieldGrid};
use crate::node::SettlementNode;
use crate::types::{NodeId, NodeIndex};

/// Per-node parallel arrays that don't belong on `SettlementNode` itself
/// because they are scratch/diagnostic state recomputed every tick rather
/// than persistent entity fields (`SPEC_FULL.md` §3 "Per-node parallel arrays").
#[derive(Debug, Clone, Default)]
pub struct NodeScratch {
    pub s: Vec<f64>,
    pub i: Vec<f64>,
    pub r: Vec<f64>,
    pub disease_burden: Vec<f64>,
    pub imported_infection: Vec<f64>,
    pub outgoing_flow: Vec<f64>,
    pub market_potential: Vec<f64>,
    pub utility: Vec<f64>,
    pub adoption_pressure: Vec<f64>,
    pub join_utility: Vec<f64>,
    pub war_attrition: Vec<f64>,
    pub pastoral_season_gain: Vec<f64>,
    pub extraction_revenue: Vec<f64>,
    pub polity_switch_gain: Vec<f64>,
}

impl NodeScratch {
    fn resize(&mut self, n: usize, disease_cfg: &crate::config::DiseaseConfig) {
        let grow = |v: &mut Vec<f64>, default: f64| v.resize(n, default);
        grow(&mut self.s, 1.0 - disease_cfg.initial_infected_share - disease_cfg.initial_recovered_share);
        grow(&mut self.i, disease_cfg.initial_infected_share);
        grow(&mut self.r, disease_cfg.initial_recovered_share);
        grow(&mut self.disease_burden, 0.0);
        grow(&mut self.imported_infection, 0.0);
        grow(&mut self.outgoing_flow, 0.0);
        grow(&mut self.market_potential, 0.0);
        grow(&mut self.utility, 0.0);
        grow(&mut self.adoption_pressure, 0.0);
        grow(&mut self.join_utility, 0.0);
        grow(&mut self.war_attrition, 0.0);
        grow(&mut self.pastoral_season_gain, 0.0);
        grow(&mut self.extraction_revenue, 0.0);
        grow(&mut self.polity_switch_gain, 0.0);
    }
}

/// The field-resolution rasters exposed for UI consumption (`SPEC_FULL.md` §4.14).
#[derive(Debug, Clone, Default)]
pub struct Overlays {
    pub node_population: Vec<f32>,
    pub dominant_mode: Vec<u8>,
    pub transport_density: Vec<f32>,
}

pub struct World {
    pub config: EngineConfig,

    pub nodes: Vec<SettlementNode>,
    pub edges: Vec<TransportEdge>,
    pub fields: FieldState,
    pub scratch: NodeScratch,

    pub country_agg: Vec<SettlementCountryAggregate>,
    pub trade_hint_matrix: TradeHintMatrix,
    pub overlays: Overlays,

    pub last_determinism_hash: u64,
    pub last_fission_conservation_error: f64,

    initialized: bool,
    last_tick_year: i64,
    next_node_id: u32,
    debug_enabled: bool,
}

impl World {
    pub fn new(config: EngineConfig) -> Self {
        let debug_enabled = config.debug_enabled;
        Self {
            config,
            nodes: Vec::new(),
            edges: Vec::new(),
            fields: FieldState::new(0, 0),
            scratch: NodeScratch::default(),
            country_agg: Vec::new(),
            trade_hint_matrix: TradeHintMatrix::new(0),
            overlays: Overlays::default(),
            last_determinism_hash: 0,
            last_fission_conservation_error: 0.0,
            initialized: false,
            last_tick_year: i64::MIN,
            next_node_id: 1,
            debug_enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.settlements.enabled
    }

    pub fn set_debug_enabled(&mut self, enabled: bool) {
        self.debug_enabled = enabled;
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    pub fn get_node(&self, index: NodeIndex) -> Option<&SettlementNode> {
        self.nodes.get(index)
    }

    pub fn get_node_mut(&mut self, index: NodeIndex) -> Option<&mut SettlementNode> {
        self.nodes.get_mut(index)
    }

    pub fn node_index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn get_edge(&self, index: usize) -> Option<&TransportEdge> {
        self.edges.get(index)
    }

    /// Every edge incident on `node`, as `(edge_index, other_node)` pairs.
    pub fn incident_edges(&self, node: NodeIndex) -> impl Iterator<Item = (usize, NodeIndex)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(move |(i, e)| e.other(node).map(|other| (i, other)))
    }

    /// Pushes a node directly. Exposed for tests/scenarios that construct a
    /// `World` without going through `ensure_initialized`; production code
    /// should rely on the initialization phase to seed nodes from the host map.
    pub fn push_node(&mut self, node: SettlementNode) -> NodeIndex {
        let idx = self.nodes.len();
        self.nodes.push(node);
        idx
    }

    pub fn push_edge(&mut self, edge: TransportEdge) -> usize {
        let idx = self.edges.len();
        self.edges.push(edge);
        idx
    }

    fn resize_scratch_and_aggregates(&mut self, country_count: usize) {
        self.scratch.resize(self.nodes.len(), &self.config.disease);
        if self.country_agg.len() != country_count {
            self.country_agg.resize(country_count, SettlementCountryAggregate::default());
        }
        if self.trade_hint_matrix.country_count() != country_count {
            self.trade_hint_matrix = TradeHintMatrix::new(country_count);
        }
    }

    /// Runs one simulated year across all 15 ordered phases (`SPEC_FULL.md` §2, §5).
    ///
    /// Re-entrant calls for a year `<= ` the last processed year are a no-op,
    /// matching the reference implementation's `tickYear` guard.
    pub fn tick_year<F, C>(&mut self, year: i64, field: &F, countries: &[C]) -> Vec<CountryWriteBack>
    where
        F: FieldGrid,
        C: CountryView,
    {
        if year <= self.last_tick_year {
            return vec![CountryWriteBack::default(); countries.len()];
        }
        self.last_tick_year = year;

        if !self.enabled() {
            self.trade_hint_matrix = TradeHintMatrix::new(countries.len());
            self.last_determinism_hash = 0;
            return vec![CountryWriteBack::default(); countries.len()];
        }

        self.ensure_initialized(year, field, countries);
        if self.nodes.is_empty() {
            self.trade_hint_matrix = TradeHintMatrix::new(countries.len());
            self.last_determinism_hash = 0;
            return vec![CountryWriteBack::default(); countries.len()];
        }
        self.resize_scratch_and_aggregates(countries.len());

        self.sync_node_totals_to_country_population(countries);
        self.update_subsistence_mix_and_packages(year, field, countries);
        self.update_climate_regimes_and_fertility(year, field);
        self.update_pastoral_mobility_routes(year, field);
        self.recompute_food_calories_and_capacity(field, countries);
        let mut write_backs = vec![CountryWriteBack::default(); countries.len()];
        self.update_households_elites_extraction(countries, &mut write_backs);
        self.rebuild_transport_graph(year, field, countries);
        self.compute_flows_and_migration(field, countries);
        self.update_campaign_logistics_and_attrition(countries);
        self.update_settlement_disease(field, countries);
        self.apply_growth_and_fission(year, field, countries);
        self.update_adoption_and_join_utility(year, countries, &mut write_backs);
        self.apply_polity_choice_assignment(year, countries, &mut write_backs);
        self.aggregate_to_countries(countries, &mut write_backs);
        self.build_country_trade_hint_matrix();
        self.rebuild_overlays(field);
        self.compute_determinism_hash();

        if self.debug_enabled {
            self.log_debug_sample(8);
        }

        write_backs
    }

    /// Bounded diagnostic sample over the nodes of the just-completed tick,
    /// gated by `debug_enabled` (`SPEC_FULL.md` §10.5). Exposed so a host can
    /// also trigger an out-of-band sample, e.g. from a debug console command.
    pub fn log_debug_sample(&self, max_samples: usize) {
        #[cfg(feature = "instrument")]
        for node in self.nodes.iter().take(max_samples) {
            tracing::info!(
                target: "settlement::debug_sample",
                year = self.last_tick_year,
                node_id = node.id.0,
                owner = node.owner_country,
                population = node.population,
                calories = node.calories,
            );
        }
        #[cfg(not(feature = "instrument"))]
        let _ = max_samples;
    }
}
