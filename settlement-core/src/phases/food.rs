//! Phase 5: food production, carrying capacity, calories (`SPEC_FULL.md` §4.5).

use crate::host::{CountryView, FieldGrid};
use crate::math::finite_or;
use crate::packages::default_domestic_packages;
use crate::phases::subsistence::MODE_YIELD;
use crate::types::ClimateRegime;
use crate::world::World;

impl World {
    pub(crate) fn recompute_food_calories_and_capacity<F: FieldGrid, C: CountryView>(
        &mut self,
        field: &F,
        countries: &[C],
    ) {
        let k_base = self.config.settlements.k_base_per_food_unit;
        let packages = default_domestic_packages();

        for (idx, node) in self.nodes.iter_mut().enumerate() {
            let food_potential = finite_or(field.food_potential(node.field_x, node.field_y), 0.0).max(0.0);

            let mut stress = 0.0;
            if node.owner_country >= 0 {
                if let Some(country) = countries.get(node.owner_country as usize) {
                    stress = country.macro_economy().famine_severity.max(country.macro_economy().disease_burden).clamp(0.0, 1.0);
                }
            }

            node.carrying_capacity = (food_potential
                * k_base
                * node.tech_factor
                * node.soil_factor
                * node.water_factor
                * (1.0 + node.storage_stock)
                * (1.0 + 0.3 * node.irrigation_capital)
                * (1.0 - 0.20 * stress))
                .max(80.0);

            let mode_mul: f64 = node
                .mix
                .iter()
                .zip(MODE_YIELD.iter())
                .map(|(m, y)| m * y)
                .sum();
            let package_mul: f64 = node
                .adopted_packages
                .iter()
                .filter_map(|&id| packages.iter().find(|p| p.id == id))
                .map(|p| {
                    let weighted: f64 = crate::types::SubsistenceMode::ALL
                        .iter()
                        .map(|&mode| node.mix_value(mode) * p.mode_multiplier(mode))
                        .sum();
                    weighted.max(0.45)
                })
                .product();

            let field_idx = if field.in_bounds(node.field_x, node.field_y) {
                Some(self.fields.index(node.field_x, node.field_y))
            } else {
                None
            };
            let cold = field_idx
                .map(|i| matches!(self.fields.regime_at(i), ClimateRegime::Cold))
                .unwrap_or(false) as u8 as f64;
            let pastoral_gain = self.scratch.pastoral_season_gain.get(idx).copied().unwrap_or(0.0).min(1.0);

            let food_produced = food_potential
                * mode_mul
                * package_mul
                * node.tech_factor
                * node.soil_factor
                * node.water_factor
                * (1.0 - 0.22 * cold)
                * (1.0 + 0.12 * pastoral_gain)
                * 0.045;

            node.food_produced = food_produced.max(0.0);
            node.food_imported = 0.0;
            node.food_exported = 0.0;
            node.calories = node.food_produced;
        }

        #[cfg(feature = "instrument")]
        {
            let total_food: f64 = self.nodes.iter().map(|n| n.food_produced).sum();
            let total_capacity: f64 = self.nodes.iter().map(|n| n.carrying_capacity).sum();
            tracing::info!(
                target: "settlement::food",
                node_count = self.nodes.len(),
                total_food_produced = total_food,
                total_carrying_capacity = total_capacity,
            );
        }
    }
}
