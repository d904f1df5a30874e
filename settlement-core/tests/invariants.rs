//! Universal invariants and cross-tick laws that must hold after *any*
//! `World::tick_year` run, independent of the specific scenario driving it
//! (`SPEC_FULL.md` §8, "Universal invariants" and "Laws").

use settlement_core::{CountryId, CountryView, EngineConfig, FieldGrid, MacroEconomy, World};

/// A small rectangular land grid with per-cell population/food/owner tables,
/// mirroring the shape of a host world map without any of its other state.
struct GridField {
    width: i32,
    height: i32,
    owner: Vec<CountryId>,
    population: Vec<f64>,
    food_potential: Vec<f64>,
}

impl GridField {
    fn new(width: i32, height: i32) -> Self {
        let n = (width * height) as usize;
        Self {
            width,
            height,
            owner: vec![-1; n],
            population: vec![0.0; n],
            food_potential: vec![10.0; n],
        }
    }

    fn set(&mut self, fx: i32, fy: i32, owner: CountryId, population: f64) {
        let idx = (fy * self.width + fx) as usize;
        self.owner[idx] = owner;
        self.population[idx] = population;
    }
}

impl FieldGrid for GridField {
    fn width(&self) -> i32 {
        self.width
    }
    fn height(&self) -> i32 {
        self.height
    }
    fn is_land(&self, _fx: i32, _fy: i32) -> bool {
        true
    }
    fn owner_id(&self, fx: i32, fy: i32) -> CountryId {
        self.owner[(fy * self.width + fx) as usize]
    }
    fn population(&self, fx: i32, fy: i32) -> f64 {
        self.population[(fy * self.width + fx) as usize]
    }
    fn food_potential(&self, fx: i32, fy: i32) -> f64 {
        self.food_potential[(fy * self.width + fx) as usize]
    }
    fn move_cost(&self, _fx: i32, _fy: i32) -> f64 {
        1.0
    }
    fn corridor_weight(&self, _fx: i32, _fy: i32) -> f64 {
        0.3
    }
    fn precip_mean(&self, _fx: i32, _fy: i32) -> f64 {
        0.45
    }
    fn temp_mean(&self, _fx: i32, _fy: i32) -> f64 {
        18.0
    }
    fn field_cell_size(&self) -> i32 {
        1
    }
}

#[derive(Clone)]
struct StubCountry {
    index: CountryId,
    population: f64,
    legitimacy: f64,
    avg_control: f64,
    admin_capacity: f64,
    tax_rate: f64,
    is_at_war: bool,
    enemies: Vec<CountryId>,
    macro_economy: MacroEconomy,
}

impl StubCountry {
    fn new(index: CountryId, population: f64) -> Self {
        Self {
            index,
            population,
            legitimacy: 0.5,
            avg_control: 0.5,
            admin_capacity: 0.4,
            tax_rate: 0.1,
            is_at_war: false,
            enemies: Vec::new(),
            macro_economy: MacroEconomy {
                market_access: 0.3,
                knowledge_stock: 0.3,
                institution_capacity: 0.3,
                inequality: 0.3,
                ..MacroEconomy::default()
            },
        }
    }
}

impl CountryView for StubCountry {
    fn index(&self) -> CountryId {
        self.index
    }
    fn name(&self) -> &str {
        "stub"
    }
    fn starting_pixel(&self) -> (i32, i32) {
        (0, 0)
    }
    fn population(&self) -> f64 {
        self.population
    }
    fn legitimacy(&self) -> f64 {
        self.legitimacy
    }
    fn avg_control(&self) -> f64 {
        self.avg_control
    }
    fn admin_capacity(&self) -> f64 {
        self.admin_capacity
    }
    fn tax_rate(&self) -> f64 {
        self.tax_rate
    }
    fn is_at_war(&self) -> bool {
        self.is_at_war
    }
    fn enemies(&self) -> &[CountryId] {
        &self.enemies
    }
    fn macro_economy(&self) -> MacroEconomy {
        self.macro_economy
    }
}

#[test]
fn sir_shares_stay_normalized_across_many_ticks() {
    let mut field = GridField::new(3, 3);
    field.set(1, 1, 0, 600.0);
    let countries = vec![StubCountry::new(0, 600.0)];

    let mut world = World::new(EngineConfig::default());
    for year in 1..60 {
        world.tick_year(year, &field, &countries);
    }

    for idx in 0..world.nodes.len() {
        let sum = world.scratch.s[idx] + world.scratch.i[idx] + world.scratch.r[idx];
        assert!((sum - 1.0).abs() < 1e-6, "SIR shares at node {idx} sum to {sum}");
    }
}

#[test]
fn fission_splits_an_overfull_node_without_losing_population_over_many_years() {
    let mut field = GridField::new(8, 8);
    field.set(4, 4, 0, 5000.0);
    let countries = vec![StubCountry::new(0, 5000.0)];

    let mut world = World::new(EngineConfig::default());
    for year in 1..200 {
        world.tick_year(year, &field, &countries);
        if world.nodes.len() > 1 {
            break;
        }
    }

    assert!(world.nodes.len() >= 1);
    assert!(world.last_fission_conservation_error <= 1e-3);
}

#[test]
fn trade_hint_matrix_stays_bounded_with_a_zero_diagonal() {
    let mut field = GridField::new(2, 1);
    field.set(0, 0, 0, 500.0);
    field.set(1, 0, 1, 500.0);

    let countries = vec![StubCountry::new(0, 500.0), StubCountry::new(1, 500.0)];
    let mut world = World::new(EngineConfig::default());
    world.tick_year(1, &field, &countries);

    let n = world.trade_hint_matrix.country_count();
    assert_eq!(n, 2);
    for a in 0..n {
        assert_eq!(world.trade_hint_matrix.get(a, a), 0.0);
        for b in 0..n {
            let v = world.trade_hint_matrix.get(a, b);
            assert!((0.0..=1.0).contains(&v), "trade hint [{a},{b}] = {v} out of [0,1]");
        }
    }
}

#[test]
fn determinism_hash_is_reproducible_from_the_same_seed_and_history() {
    let mut field = GridField::new(4, 4);
    field.set(0, 0, 0, 300.0);
    field.set(3, 3, 0, 150.0);
    let countries = vec![StubCountry::new(0, 450.0)];

    let mut config = EngineConfig::default();
    config.world_seed = 42;

    let mut world_a = World::new(config.clone());
    let mut world_b = World::new(config);
    for year in 1..10 {
        world_a.tick_year(year, &field, &countries);
        world_b.tick_year(year, &field, &countries);
    }

    assert_eq!(world_a.last_determinism_hash, world_b.last_determinism_hash);
    assert_ne!(world_a.last_determinism_hash, 0);
}

#[test]
fn re_entrant_tick_for_an_already_processed_year_is_a_no_op() {
    let mut field = GridField::new(2, 2);
    field.set(0, 0, 0, 200.0);
    let countries = vec![StubCountry::new(0, 200.0)];

    let mut world = World::new(EngineConfig::default());
    world.tick_year(5, &field, &countries);
    let hash_after_first = world.last_determinism_hash;
    let node_count = world.nodes.len();

    let write_backs = world.tick_year(5, &field, &countries);
    assert!(write_backs.iter().all(|wb| wb.legitimacy_delta == 0.0));
    assert_eq!(world.last_determinism_hash, hash_after_first);
    assert_eq!(world.nodes.len(), node_count);
}

#[test]
fn disabled_engine_returns_zeroed_write_backs_and_zero_fills_the_trade_hint_matrix() {
    let mut config = EngineConfig::default();
    config.settlements.enabled = false;
    let mut world = World::new(config);

    let mut field = GridField::new(2, 2);
    field.set(0, 0, 0, 200.0);
    let countries = vec![StubCountry::new(0, 200.0), StubCountry::new(1, 100.0)];

    let write_backs = world.tick_year(1, &field, &countries);
    assert_eq!(write_backs.len(), 2);
    assert!(write_backs.iter().all(|wb| wb.legitimacy_delta == 0.0 && wb.market_access == 0.0));
    assert_eq!(world.trade_hint_matrix.country_count(), 2);
    assert_eq!(world.last_determinism_hash, 0);
}

#[test]
fn validate_invariants_passes_after_a_run_of_ticks() {
    let mut field = GridField::new(6, 6);
    field.set(1, 1, 0, 400.0);
    field.set(4, 4, 1, 400.0);
    let countries = vec![StubCountry::new(0, 400.0), StubCountry::new(1, 400.0)];

    let mut world = World::new(EngineConfig::default());
    for year in 1..30 {
        world.tick_year(year, &field, &countries);
    }

    let violation = world.validate_invariants(&field, countries.len());
    assert!(violation.is_none(), "invariant violation: {violation:?}");
}

#[test]
fn package_adoption_is_monotone_nodes_never_drop_an_adopted_package() {
    // `SPEC_FULL.md` §8's package-adoption-monotonicity law: a node's
    // `adoptedPackages` set only grows over time, across both the
    // subsistence-mix phase's environmental adoption and the join-utility
    // phase's diffusion-driven adoption.
    let mut field = GridField::new(5, 5);
    field.set(2, 2, 0, 400.0);
    let countries = vec![StubCountry::new(0, 400.0)];

    let mut world = World::new(EngineConfig::default());
    let mut prev_packages: std::collections::HashSet<u32> = std::collections::HashSet::new();
    for year in 1..80 {
        world.tick_year(year, &field, &countries);
        for node in &world.nodes {
            let current: std::collections::HashSet<u32> = node.adopted_packages.iter().copied().collect();
            assert!(
                prev_packages.iter().all(|p| current.contains(p)),
                "node {} dropped a previously adopted package at year {year}",
                node.id.0
            );
            prev_packages = current;
        }
    }
}
