//! Phase 6: households, elites, extraction (`SPEC_FULL.md` §4.6).

use crate::host::{CountryView, CountryWriteBack};
use crate::math::clamp;
use crate::world::World;

impl World {
    pub(crate) fn update_households_elites_extraction<C: CountryView>(
        &mut self,
        countries: &[C],
        write_backs: &mut [CountryWriteBack],
    ) {
        if !self.config.research_settlement.households_extraction {
            return;
        }
        let base_tau = self.config.research_settlement.extraction_base;
        let w_admin = self.config.research_settlement.extraction_admin_weight;
        let w_legit = self.config.research_settlement.extraction_legitimacy_weight;
        let storage_share = self.config.research_settlement.extraction_storage_invest_share;
        let irrigation_share = self.config.research_settlement.extraction_irrigation_invest_share;
        let road_share = self.config.research_settlement.extraction_road_invest_share;
        let share_total = (storage_share + irrigation_share + road_share).max(1e-6);
        let cal0 = self.config.settlements.cal0;

        let n = countries.len();
        let mut revenue_by_country = vec![0.0_f64; n];
        let mut pop_by_country = vec![0.0_f64; n];
        let mut legit_weighted = vec![0.0_f64; n];
        let mut ctl_weighted = vec![0.0_f64; n];
        let mut admin_weighted = vec![0.0_f64; n];

        for node in &mut self.nodes {
            let target_tau = clamp(
                base_tau + w_admin * node.local_admin_capacity + w_legit * node.local_legitimacy,
                0.0,
                0.55,
            ) * (0.55 + 0.45 * (0.4 + node.elite_share));
            node.extraction_rate = (0.8 * node.extraction_rate + 0.2 * target_tau).clamp(0.0, 0.6);

            let surplus = (node.calories - node.population * cal0).max(0.0);
            let revenue = node.extraction_rate * surplus;

            let storage_invest = revenue * (storage_share / share_total);
            let irrigation_invest = revenue * (irrigation_share / share_total);
            let _road_invest = revenue * (road_share / share_total);
            let elite_consumption = revenue - storage_invest - irrigation_invest - _road_invest;

            node.storage_stock = (node.storage_stock + 0.02 * storage_invest / node.population.max(1.0)).min(3.0);
            node.irrigation_capital =
                (node.irrigation_capital + 0.02 * irrigation_invest / node.population.max(1.0)).clamp(0.0, 1.0);
            node.local_admin_capacity = (node.local_admin_capacity + 0.002).clamp(0.0, 1.0);
            node.local_legitimacy = (node.local_legitimacy - 0.001 * node.extraction_rate).clamp(0.0, 1.0);
            node.elite_share = (node.elite_share + 0.0005 * (elite_consumption / revenue.max(1.0))).clamp(0.0, 0.6);

            if node.owner_country >= 0 && (node.owner_country as usize) < n {
                let idx = node.owner_country as usize;
                revenue_by_country[idx] += revenue;
                pop_by_country[idx] += node.population;
                legit_weighted[idx] += node.population * node.local_legitimacy;
                ctl_weighted[idx] += node.population * (1.0 - node.extraction_rate);
                admin_weighted[idx] += node.population * node.local_admin_capacity;
            }
        }

        for (idx, country) in countries.iter().enumerate() {
            let pop = pop_by_country[idx].max(1.0);
            let wb = &mut write_backs[idx];
            wb.net_revenue = revenue_by_country[idx];
            wb.institution_capacity = country.macro_economy().institution_capacity
                + 0.01 * (revenue_by_country[idx] / pop).min(1.0);
            wb.legitimacy_delta += 0.05 * ((legit_weighted[idx] / pop) - country.legitimacy());
            wb.avg_control_delta += 0.05 * ((ctl_weighted[idx] / pop) - country.avg_control());
            wb.admin_capacity_delta += 0.05 * ((admin_weighted[idx] / pop) - country.admin_capacity());
            wb.tax_rate = (revenue_by_country[idx] / pop).clamp(0.0, 0.6);
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::households",
            total_revenue = revenue_by_country.iter().sum::<f64>(),
            country_count = n,
        );
    }
}
