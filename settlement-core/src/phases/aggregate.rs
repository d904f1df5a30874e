//! Phase 14: country aggregation and trade-hint matrix finalization
//! (`SPEC_FULL.md` §4.14).

use crate::country::SettlementCountryAggregate;
use crate::host::{CountryView, CountryWriteBack};
use crate::math::clamp01;
use crate::world::World;

impl World {
    pub(crate) fn aggregate_to_countries<C: CountryView>(&mut self, countries: &[C], write_backs: &mut [CountryWriteBack]) {
        let n = countries.len();
        if n == 0 {
            return;
        }

        let mut pop = vec![0.0_f64; n];
        let mut specialist_pop = vec![0.0_f64; n];
        let mut market_weighted = vec![0.0_f64; n];
        let mut migration_out_weighted = vec![0.0_f64; n];
        let mut migration_attract_weighted = vec![0.0_f64; n];
        let mut knowledge_signal_weighted = vec![0.0_f64; n];

        for (idx, node) in self.nodes.iter().enumerate() {
            if node.owner_country < 0 || node.owner_country as usize >= n {
                continue;
            }
            let c = node.owner_country as usize;
            pop[c] += node.population;
            specialist_pop[c] += node.population * node.specialist_share;
            market_weighted[c] += node.population * (self.scratch.market_potential[idx] / node.population.max(1.0)).min(3.0);
            migration_out_weighted[c] += self.scratch.outgoing_flow[idx];
            migration_attract_weighted[c] += node.population * self.scratch.utility[idx];
            knowledge_signal_weighted[c] += node.population * (node.tech_factor - 1.0).max(0.0);
        }

        for (idx, country) in countries.iter().enumerate() {
            let p = pop[idx].max(1.0);
            let m = country.macro_economy();

            self.country_agg[idx] = SettlementCountryAggregate {
                specialist_population: specialist_pop[idx],
                market_potential: market_weighted[idx] / p,
                migration_pressure_out: migration_out_weighted[idx],
                migration_attractiveness: migration_attract_weighted[idx] / p,
                knowledge_infra_signal: knowledge_signal_weighted[idx] / p,
            };
            let agg = &self.country_agg[idx];

            let wb = &mut write_backs[idx];
            wb.specialist_population = agg.specialist_population;
            wb.market_access = clamp01(0.70 * m.market_access + 0.30 * (agg.market_potential / 3.0).min(1.0));
            wb.migration_pressure_out = 0.62 * m.migration_pressure_out + 0.38 * agg.migration_pressure_out;
            wb.migration_attractiveness = clamp01(0.62 * m.migration_attractiveness + 0.38 * agg.migration_attractiveness);

            let knowledge_target = clamp01(0.6 * (agg.specialist_population / p).min(1.0) + 0.4 * agg.knowledge_infra_signal);
            wb.knowledge_infra = clamp01(0.8 * m.knowledge_stock + 0.2 * knowledge_target);
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::aggregate",
            country_count = n,
            total_population = pop.iter().sum::<f64>(),
        );
    }

    /// Row-normalizes the trade-hint matrix accumulated during flows
    /// (`phases::flows`) so each row's max boundary-flow entry is 1.
    pub(crate) fn build_country_trade_hint_matrix(&mut self) {
        self.trade_hint_matrix.row_normalize();

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::trade_hint_matrix",
            country_count = self.trade_hint_matrix.country_count(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::country::TradeHintMatrix;
    use crate::host::MacroEconomy;
    use crate::node::SettlementNode;
    use crate::types::{CountryId, NodeId};
    use crate::world::World;

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
            100.0
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
    fn aggregate_sums_population_weighted_specialist_population() {
        let mut world = World::new(EngineConfig::default());
        let id = world.allocate_node_id();
        let mut node = SettlementNode::new(id, 0, 0).with_owner(0).with_population(1000.0);
        node.specialist_share = 0.1;
        world.push_node(node);
        world.scratch.market_potential = vec![0.0];
        world.scratch.outgoing_flow = vec![0.0];
        world.scratch.utility = vec![0.5];
        world.country_agg = vec![SettlementCountryAggregate::default()];
        world.trade_hint_matrix = TradeHintMatrix::new(1);

        let countries = vec![StubCountry];
        let mut write_backs = vec![crate::host::CountryWriteBack::default()];
        world.aggregate_to_countries(&countries, &mut write_backs);

        assert!((world.country_agg[0].specialist_population - 100.0).abs() < 1e-6);
        assert!((write_backs[0].specialist_population - 100.0).abs() < 1e-6);
    }
}
