//! Phase 8: trade flows and utility-driven migration (`SPEC_FULL.md` §4.8).

use crate::host::{CountryView, FieldGrid};
use crate::math::{clamp01, finite_or};
use crate::world::World;

fn hostile<C: CountryView>(countries: &[C], owner: i32, other: i32) -> bool {
    owner >= 0
        && (owner as usize) < countries.len()
        && countries[owner as usize].is_at_war()
        && countries[owner as usize].enemies().contains(&other)
}

impl World {
    pub(crate) fn compute_flows_and_migration<F: FieldGrid, C: CountryView>(
        &mut self,
        field: &F,
        countries: &[C],
    ) {
        let cfg = self.config.transport.clone();
        let cal0 = self.config.settlements.cal0;

        for v in self.scratch.market_potential.iter_mut() {
            *v = 0.0;
        }
        for v in self.scratch.outgoing_flow.iter_mut() {
            *v = 0.0;
        }
        self.trade_hint_matrix.zero_fill();

        let need0: Vec<f64> = self
            .nodes
            .iter()
            .map(|n| (cal0 * n.population.max(1.0) - n.calories).max(0.0))
            .collect();

        let mut attenuation_by_edge = vec![0.0_f64; self.edges.len()];
        let mut corridor_by_edge = vec![0.0_f64; self.edges.len()];

        // Gravity trade: every edge moves calories from the surplus side to
        // the deficit side, split by relative need (`SPEC_FULL.md` §9 Open
        // Question (b): splitAB denominator is max(1, needA + needB)).
        for (edge_idx, edge) in self.edges.iter().enumerate() {
            let a = edge.from_node;
            let b = edge.to_node;
            let pop_a = self.nodes[a].population.max(1.0);
            let pop_b = self.nodes[b].population.max(1.0);

            let owner_a = self.nodes[a].owner_country;
            let owner_b = self.nodes[b].owner_country;
            let war = owner_a >= 0
                && owner_b >= 0
                && owner_a != owner_b
                && (hostile(countries, owner_a, owner_b) || hostile(countries, owner_b, owner_a));

            let specialist_a = self.nodes[a].specialist_share.max(0.02);
            let specialist_b = self.nodes[b].specialist_share.max(0.02);
            let s_a = pop_a * specialist_a;
            let s_b = pop_b * specialist_b;
            let gravity = cfg.gravity_kappa * s_a.powf(cfg.gravity_alpha) * s_b.powf(cfg.gravity_beta)
                / edge.cost.max(0.01).powf(cfg.gravity_gamma);

            let demand = 0.2 * (pop_a * pop_b).max(0.0).sqrt() * (1.0 + if war { 0.6 } else { 0.0 });
            let supply = edge.capacity * edge.reliability;
            let attenuation = (-0.42 * (demand - supply).max(0.0)).exp();
            attenuation_by_edge[edge_idx] = attenuation;

            let corridor = 0.5
                * (finite_or(field.corridor_weight(self.nodes[a].field_x, self.nodes[a].field_y), 0.3)
                    + finite_or(field.corridor_weight(self.nodes[b].field_x, self.nodes[b].field_y), 0.3));
            corridor_by_edge[edge_idx] = corridor.clamp(0.0, 1.0);

            let total_flow = (edge.capacity * edge.reliability * attenuation).min(gravity).max(0.0);
            if total_flow <= 0.0 {
                continue;
            }

            let need_a = need0[a];
            let need_b = need0[b];
            let split_ab = need_a / (need_a + need_b).max(1.0);

            let tradeable_a = (0.26 * self.nodes[a].food_produced - self.nodes[a].food_exported).max(0.0);
            let tradeable_b = (0.26 * self.nodes[b].food_produced - self.nodes[b].food_exported).max(0.0);

            // A -> B, clipped to A's remaining tradeable surplus and B's need.
            let to_b = (total_flow * (1.0 - split_ab))
                .max(0.0)
                .min(tradeable_a)
                .min(need_b + 0.1 * self.nodes[b].food_produced);
            // B -> A, clipped to B's remaining tradeable surplus and A's need.
            let to_a = (total_flow * split_ab)
                .max(0.0)
                .min(tradeable_b)
                .min(need_a + 0.1 * self.nodes[a].food_produced);

            self.nodes[a].food_imported += to_a;
            self.nodes[a].food_exported += to_b;
            self.nodes[b].food_imported += to_b;
            self.nodes[b].food_exported += to_a;

            self.scratch.market_potential[a] += to_a + to_b;
            self.scratch.market_potential[b] += to_a + to_b;
            self.scratch.outgoing_flow[a] += to_b;
            self.scratch.outgoing_flow[b] += to_a;

            // Raw accumulation for the country trade-hint matrix; row-normalized
            // once per tick in `phases::aggregate` (`SPEC_FULL.md` §4.14).
            if owner_a >= 0 && owner_b >= 0 && owner_a != owner_b {
                self.trade_hint_matrix.add(owner_a as usize, owner_b as usize, to_b as f32);
                self.trade_hint_matrix.add(owner_b as usize, owner_a as usize, to_a as f32);
            }
        }

        for node in &mut self.nodes {
            node.calories = (node.food_produced + node.food_imported - node.food_exported).max(0.0);
        }

        // Utility and migration: each node's attractiveness is its per-capita
        // calorie slack plus local market access minus legitimacy/disease drag.
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            let cal_term = (node.per_capita_calories() - cal0) / cal0.max(1e-6);
            let market_term = self.scratch.market_potential[idx] / node.population.max(1.0);
            let mut legit_term = node.local_legitimacy - 0.5;
            let mut disease_term = 0.0;
            if node.owner_country >= 0 {
                if let Some(country) = countries.get(node.owner_country as usize) {
                    legit_term += 0.0;
                    disease_term = country.macro_economy().disease_burden;
                }
            }
            self.scratch.utility[idx] = clamp01(0.5 + 0.35 * cal_term + 0.15 * market_term.min(1.0) + 0.10 * legit_term - 0.20 * disease_term);
        }

        // Per-node migration budget for this tick: no node emits more than
        // `0.08 * population` migrants in total, across all of its edges
        // (`SPEC_FULL.md` §8 "Migration budget" law).
        let move_budget: Vec<f64> = self.nodes.iter().map(|n| 0.08 * n.population).collect();
        let mut moved_out = vec![0.0_f64; self.nodes.len()];

        let mut moves: Vec<(usize, usize, f64)> = Vec::new();
        for (edge_idx, edge) in self.edges.iter().enumerate() {
            let a = edge.from_node;
            let b = edge.to_node;
            let util_a = self.scratch.utility[a];
            let util_b = self.scratch.utility[b];
            let diff = util_b - util_a;
            if diff.abs() < 1e-6 {
                continue;
            }
            let (from, to, gain) = if diff > 0.0 { (a, b, diff) } else { (b, a, -diff) };
            let remaining_budget = (move_budget[from] - moved_out[from]).max(0.0);
            if remaining_budget <= 0.0 {
                continue;
            }
            let attenuation = attenuation_by_edge[edge_idx];
            let corridor_factor = corridor_by_edge[edge_idx].max(0.15);
            let edge_mig_scale = cfg.migration_m0 * (-cfg.migration_dist_decay * edge.cost).exp() * edge.reliability * attenuation;
            let amount = (self.nodes[from].population * gain * edge_mig_scale * corridor_factor * edge.reliability * attenuation)
                .min(0.03 * self.nodes[from].population)
                .min(remaining_budget);
            if amount > 0.0 {
                moved_out[from] += amount;
                moves.push((from, to, amount));
            }
        }
        for (from, to, amount) in moves {
            let amount = amount.min(self.nodes[from].population);
            self.nodes[from].population -= amount;
            self.nodes[to].population += amount;
        }

        // Specialist share drifts toward a level supported by market access.
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            let market = (self.scratch.market_potential[idx] / node.population.max(1.0)).min(3.0);
            let target = clamp01(cfg.specialist_eta + cfg.specialist_lambda * market);
            node.specialist_share = (0.9 * node.specialist_share + 0.1 * target).clamp(0.0, 0.5);
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::flows",
            edge_count = self.edges.len(),
            total_imported = self.nodes.iter().map(|n| n.food_imported).sum::<f64>(),
            total_exported = self.nodes.iter().map(|n| n.food_exported).sum::<f64>(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::edge::TransportEdge;
    use crate::host::MacroEconomy;
    use crate::node::SettlementNode;
    use crate::types::{CountryId, NodeId};
    use crate::world::World;

    struct StubField;
    impl FieldGrid for StubField {
        fn width(&self) -> i32 {
            4
        }
        fn height(&self) -> i32 {
            4
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
            10.0
        }
        fn move_cost(&self, _fx: i32, _fy: i32) -> f64 {
            1.0
        }
        fn corridor_weight(&self, _fx: i32, _fy: i32) -> f64 {
            0.3
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
            1000.0
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
    fn trade_moves_calories_toward_the_deficit_node() {
        let mut world = World::new(EngineConfig::default());
        let id_a = world.allocate_node_id();
        let id_b = world.allocate_node_id();
        let mut a = SettlementNode::new(id_a, 0, 0).with_owner(0).with_population(500.0);
        a.calories = 50.0;
        a.food_produced = 400.0;
        let mut b = SettlementNode::new(id_b, 1, 0).with_owner(0).with_population(500.0);
        b.calories = 5000.0;
        b.food_produced = 6000.0;
        world.push_node(a);
        world.push_node(b);
        world.push_edge(TransportEdge::new(0, 1, 2.0, 500.0, false));
        world.scratch.market_potential = vec![0.0; 2];
        world.scratch.outgoing_flow = vec![0.0; 2];
        world.scratch.utility = vec![0.0; 2];

        let field = StubField;
        let countries = vec![StubCountry];
        world.compute_flows_and_migration(&field, &countries);

        assert!(world.nodes[0].calories > 50.0);
    }

    #[test]
    fn exports_never_exceed_tradeable_surplus() {
        let mut world = World::new(EngineConfig::default());
        let id_a = world.allocate_node_id();
        let id_b = world.allocate_node_id();
        let mut a = SettlementNode::new(id_a, 0, 0).with_owner(0).with_population(500.0);
        a.calories = 10.0;
        a.food_produced = 100.0;
        let mut b = SettlementNode::new(id_b, 1, 0).with_owner(0).with_population(500.0);
        b.calories = 50000.0;
        b.food_produced = 50000.0;
        world.push_node(a);
        world.push_node(b);
        world.push_edge(TransportEdge::new(0, 1, 1.0, 1_000_000.0, false));
        world.scratch.market_potential = vec![0.0; 2];
        world.scratch.outgoing_flow = vec![0.0; 2];
        world.scratch.utility = vec![0.0; 2];

        let field = StubField;
        let countries = vec![StubCountry];
        world.compute_flows_and_migration(&field, &countries);

        assert!(world.nodes[1].food_exported <= 0.26 * 50000.0 + 1e-6);
    }
}
