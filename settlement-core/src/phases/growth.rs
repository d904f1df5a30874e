//! Phase 11: logistic growth and fission (`SPEC_FULL.md` §4.11).

use crate::hash::{jitter_range, salt};
use crate::host::{CountryView, FieldGrid};
use crate::math::{chebyshev, finite_or};
use crate::node::SettlementNode;
use crate::world::World;

impl World {
    pub(crate) fn apply_growth_and_fission<F: FieldGrid, C: CountryView>(
        &mut self,
        year: i64,
        field: &F,
        countries: &[C],
    ) {
        let r_min = self.config.settlements.growth_r_min;
        let r_max = self.config.settlements.growth_r_max;
        let cal_slope = self.config.settlements.cal_slope;
        let cal0 = self.config.settlements.cal0;
        let world_seed = self.config.world_seed;

        for node in self.nodes.iter_mut() {
            let cal_ratio = (node.per_capita_calories() / cal0.max(1e-6)).max(0.0);
            let growth_rate = (r_min + (r_max - r_min) * (cal_slope * (cal_ratio - 1.0)).tanh().max(0.0)).clamp(0.0, r_max);
            let logistic = 1.0 - (node.population / node.carrying_capacity.max(1.0));
            let shock = jitter_range(world_seed, year, node.id.0 as u64, salt::GROWTH_DAMPING, -0.02, 0.02);
            let delta = node.population * growth_rate * logistic.clamp(-1.0, 1.0) + node.population * shock;
            node.population = (node.population + delta).max(0.0);
        }

        self.apply_fission(year, field, countries);

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::growth",
            year = year,
            node_count = self.nodes.len(),
            total_population = self.nodes.iter().map(|n| n.population).sum::<f64>(),
            fission_conservation_error = self.last_fission_conservation_error,
        );
    }

    fn apply_fission<F: FieldGrid, C: CountryView>(&mut self, year: i64, field: &F, countries: &[C]) {
        let threshold = self.config.settlements.split_pop_threshold;
        let cooldown = self.config.settlements.split_cooldown_years;
        let spacing = self.config.settlements.split_min_spacing_fields;
        let alpha_min = self.config.settlements.split_alpha_min;
        let alpha_max = self.config.settlements.split_alpha_max;
        let global_cap = self.config.settlements.max_nodes_global;
        let per_country_cap = self.config.settlements.max_nodes_per_country;
        let world_seed = self.config.world_seed;

        let mut nodes_by_country = vec![0usize; countries.len()];
        for node in &self.nodes {
            if node.owner_country >= 0 && (node.owner_country as usize) < countries.len() {
                nodes_by_country[node.owner_country as usize] += 1;
            }
        }

        let candidates: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                n.population >= threshold
                    && year - n.last_split_year >= cooldown
                    && n.owner_country >= 0
                    && (n.owner_country as usize) < countries.len()
            })
            .map(|(i, _)| i)
            .collect();

        let mut total_before = 0.0;
        for &idx in &candidates {
            total_before += self.nodes[idx].population;
        }

        let mut new_nodes = Vec::new();
        for &idx in &candidates {
            if self.nodes.len() + new_nodes.len() >= global_cap {
                break;
            }
            let owner = self.nodes[idx].owner_country;
            let owner_idx = owner as usize;
            if nodes_by_country[owner_idx] >= per_country_cap {
                continue;
            }

            let fx0 = self.nodes[idx].field_x;
            let fy0 = self.nodes[idx].field_y;
            let mut best: Option<(i32, i32, f64)> = None;
            'ring: for r in spacing.max(1)..=(spacing.max(1) + 4) {
                for dy in -r..=r {
                    for dx in -r..=r {
                        if chebyshev(0, 0, dx, dy) != r {
                            continue;
                        }
                        let nx = fx0 + dx;
                        let ny = fy0 + dy;
                        if !field.in_bounds(nx, ny) || !field.is_land(nx, ny) {
                            continue;
                        }
                        let too_close = self.nodes.iter().any(|n| {
                            n.owner_country == owner && chebyshev(n.field_x, n.field_y, nx, ny) < spacing
                        });
                        if too_close {
                            continue;
                        }
                        let tie = jitter_range(world_seed, year, (idx as u64) * 1000 + (dx + dy * 64) as u64, salt::FISSION_FIELD_TIEBREAK, 0.0, 1.0);
                        let score = finite_or(field.food_potential(nx, ny), 0.0) + tie * 0.01;
                        let better = match &best {
                            None => true,
                            Some((_, _, s)) => score > *s,
                        };
                        if better {
                            best = Some((nx, ny, score));
                        }
                    }
                }
                if best.is_some() {
                    break 'ring;
                }
            }

            let Some((nx, ny, _)) = best else { continue };

            let alpha = jitter_range(world_seed, year, self.nodes[idx].id.0 as u64, salt::FISSION_ALPHA, alpha_min, alpha_max);
            let parent_pop = self.nodes[idx].population;
            let child_pop = parent_pop * alpha;
            self.nodes[idx].population = parent_pop - child_pop;
            self.nodes[idx].last_split_year = year;

            let child_id = self.allocate_node_id();
            let mut child = SettlementNode::new(child_id, nx, ny)
                .with_owner(owner)
                .with_population(child_pop)
                .with_carrying_capacity(self.nodes[idx].carrying_capacity * alpha)
                .with_founded_year(year);
            child.mix = self.nodes[idx].mix;
            child.adopted_packages = self.nodes[idx].adopted_packages.clone();
            child.tech_factor = self.nodes[idx].tech_factor;
            child.soil_factor = self.nodes[idx].soil_factor;
            child.water_factor = self.nodes[idx].water_factor;
            child.local_legitimacy = self.nodes[idx].local_legitimacy;
            child.local_admin_capacity = self.nodes[idx].local_admin_capacity;
            child.last_split_year = crate::types::NEVER_SPLIT_YEAR;

            new_nodes.push(child);
            nodes_by_country[owner_idx] += 1;
        }

        let mut total_after_children = 0.0;
        for child in &new_nodes {
            total_after_children += child.population;
        }
        for &idx in &candidates {
            total_after_children += self.nodes[idx].population;
        }

        for child in new_nodes {
            self.push_node(child);
        }
        self.nodes
            .sort_by(|a, b| a.id.cmp(&b.id).then(a.field_y.cmp(&b.field_y)).then(a.field_x.cmp(&b.field_x)));

        self.last_fission_conservation_error = (total_after_children - total_before).abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::host::MacroEconomy;
    use crate::types::{CountryId, NodeId};

    struct StubField;
    impl FieldGrid for StubField {
        fn width(&self) -> i32 {
            32
        }
        fn height(&self) -> i32 {
            32
        }
        fn is_land(&self, _fx: i32, _fy: i32) -> bool {
            true
        }
        fn owner_id(&self, _fx: i32, _fy: i32) -> CountryId {
            0
        }
        fn population(&self, _fx: i32, _fy: i32) -> f64 {
            0.0
        }
        fn food_potential(&self, _fx: i32, _fy: i32) -> f64 {
            5.0
        }
        fn move_cost(&self, _fx: i32, _fy: i32) -> f64 {
            1.0
        }
        fn corridor_weight(&self, _fx: i32, _fy: i32) -> f64 {
            0.2
        }
        fn precip_mean(&self, _fx: i32, _fy: i32) -> f64 {
            0.4
        }
        fn temp_mean(&self, _fx: i32, _fy: i32) -> f64 {
            18.0
        }
        fn field_cell_size(&self) -> i32 {
            1
        }
    }

    struct StubCountry;
    impl CountryView for StubCountry {
        fn index(&self) -> CountryId {
            0
        }
        fn name(&self) -> &str {
            "stub"
        }
        fn starting_pixel(&self) -> (i32, i32) {
            (0, 0)
        }
        fn population(&self) -> f64 {
            7000.0
        }
        fn legitimacy(&self) -> f64 {
            0.5
        }
        fn avg_control(&self) -> f64 {
            0.5
        }
        fn admin_capacity(&self) -> f64 {
            0.5
        }
        fn tax_rate(&self) -> f64 {
            0.1
        }
        fn is_at_war(&self) -> bool {
            false
        }
        fn enemies(&self) -> &[CountryId] {
            &[]
        }
        fn macro_economy(&self) -> MacroEconomy {
            MacroEconomy::default()
        }
    }

    #[test]
    fn fission_splits_an_overfull_node_without_losing_population() {
        let mut world = World::new(EngineConfig::default());
        let id = world.allocate_node_id();
        let node = SettlementNode::new(id, 10, 10)
            .with_owner(0)
            .with_population(7000.0)
            .with_carrying_capacity(9000.0)
            .with_founded_year(0);
        world.push_node(node);

        let field = StubField;
        let countries = vec![StubCountry];
        world.apply_fission(50, &field, &countries);

        assert!(world.nodes.len() >= 1);
        assert!(world.last_fission_conservation_error < 1e-6);
    }
}
