//! Phase 3: climate regime state machine and fertility update
//! (`SPEC_FULL.md` §4.3).

use crate::hash::{jitter01, salt};
use crate::host::FieldGrid;
use crate::math::{clamp, finite_or};
use crate::types::ClimateRegime;
use crate::world::World;

struct RegimeMul {
    regen: f64,
    deplete: f64,
}

fn regime_mul(regime: ClimateRegime) -> RegimeMul {
    match regime {
        ClimateRegime::Normal => RegimeMul { regen: 1.0, deplete: 1.0 },
        ClimateRegime::Drought => RegimeMul { regen: 0.62, deplete: 1.40 },
        ClimateRegime::Pluvial => RegimeMul { regen: 1.24, deplete: 0.84 },
        ClimateRegime::Cold => RegimeMul { regen: 0.80, deplete: 1.15 },
    }
}

/// Deterministic transition from `from` given aridity/wetness/cold indices
/// and a uniform draw `u`. Tie-breaks are lexicographic over regime id.
fn next_regime(from: ClimateRegime, arid: f64, wet: f64, cold: f64, u: f64) -> ClimateRegime {
    match from {
        ClimateRegime::Normal => {
            let p_drought = 0.10 + 0.35 * arid;
            let p_pluvial = 0.08 + 0.30 * wet;
            let p_cold = 0.06 + 0.30 * cold;
            let total = p_drought + p_pluvial + p_cold;
            if total <= 0.0 || u >= total.min(1.0) {
                ClimateRegime::Normal
            } else if u < p_drought {
                ClimateRegime::Drought
            } else if u < p_drought + p_pluvial {
                ClimateRegime::Pluvial
            } else {
                ClimateRegime::Cold
            }
        }
        ClimateRegime::Drought => {
            if u < 0.62 {
                ClimateRegime::Drought
            } else if u < 0.67 {
                ClimateRegime::Pluvial
            } else {
                ClimateRegime::Normal
            }
        }
        ClimateRegime::Pluvial => {
            if u < 0.62 {
                ClimateRegime::Pluvial
            } else if u < 0.67 {
                ClimateRegime::Drought
            } else {
                ClimateRegime::Normal
            }
        }
        ClimateRegime::Cold => {
            if u < 0.62 {
                ClimateRegime::Cold
            } else {
                ClimateRegime::Normal
            }
        }
    }
}

impl World {
    pub(crate) fn update_climate_regimes_and_fertility<F: FieldGrid>(&mut self, year: i64, field: &F) {
        let world_seed = self.config.world_seed;
        let irrigation_enabled = self.config.research_settlement.irrigation_loop;
        let depreciation = self.config.research_settlement.irrigation_depreciation;
        let fertility_shield = self.config.research_settlement.irrigation_fertility_shield;

        let width = self.fields.width();
        let height = self.fields.height();
        if width <= 0 || height <= 0 {
            return;
        }

        // Farming-share intensity per field, accumulated from nodes sitting on it.
        let mut field_farming_intensity = vec![0.0_f64; self.fields.len()];
        for node in &self.nodes {
            if !field.in_bounds(node.field_x, node.field_y) {
                continue;
            }
            let idx = self.fields.index(node.field_x, node.field_y);
            field_farming_intensity[idx] += node.population * (0.2 + 0.8 * node.farming_share());
        }
        let mut field_irrigation_invest = vec![0.0_f64; self.fields.len()];
        for node in &self.nodes {
            if !field.in_bounds(node.field_x, node.field_y) {
                continue;
            }
            let idx = self.fields.index(node.field_x, node.field_y);
            field_irrigation_invest[idx] += node.irrigation_capital * (0.0015 + 0.0025 * node.farming_share());
        }

        for fy in 0..height {
            for fx in 0..width {
                let idx = self.fields.index(fx, fy);
                let precip = finite_or(field.precip_mean(fx, fy), 0.4).clamp(0.0, 1.0);
                let temp = finite_or(field.temp_mean(fx, fy), 18.0);
                let arid = (1.0 - precip).clamp(0.0, 1.0);
                let wet = precip;
                let cold = ((5.0 - temp) / 25.0).clamp(0.0, 1.0);

                let u = jitter01(world_seed, year, idx as u64, salt::CLIMATE_TRANSITION);
                let current = self.fields.regime_at(idx);
                let next = next_regime(current, arid, wet, cold, u);
                self.fields.set_regime_at(idx, next);

                let food_potential = finite_or(field.food_potential(fx, fy), 1.0).max(0.1);
                let intensity = (field_farming_intensity[idx] / (120.0 * food_potential)).clamp(0.0, 4.0);
                let mul = regime_mul(next);
                let regen = 0.018 * (1.0 - intensity).max(0.0) * mul.regen;
                let deplete = 0.022 * intensity * mul.deplete;

                let mut fertility = (self.fields.fertility[idx] as f64 + regen - deplete).clamp(0.05, 1.0);

                if irrigation_enabled {
                    let invest = field_irrigation_invest[idx];
                    let irr = ((1.0 - depreciation) * self.fields.irrigation_capital[idx] as f64 + invest)
                        .clamp(0.0, 1.0);
                    self.fields.irrigation_capital[idx] = irr as f32;
                    if matches!(next, ClimateRegime::Drought) && irr > 0.0 {
                        fertility = clamp(fertility + 0.018 * fertility_shield * irr, 0.05, 1.0);
                    }
                }

                self.fields.fertility[idx] = fertility as f32;
            }
        }

        let water_boost = self.config.research_settlement.irrigation_water_boost;
        for node in &mut self.nodes {
            if !field.in_bounds(node.field_x, node.field_y) {
                continue;
            }
            let idx = self.fields.index(node.field_x, node.field_y);
            node.soil_factor = (0.6 + 0.8 * self.fields.fertility[idx] as f64).clamp(0.2, 1.6);
            node.water_factor = match self.fields.regime_at(idx) {
                ClimateRegime::Drought => 0.72,
                ClimateRegime::Pluvial => 1.18,
                _ => 1.0,
            };
            if irrigation_enabled {
                let field_irr = self.fields.irrigation_capital[idx] as f64;
                node.irrigation_capital = (0.9 * node.irrigation_capital + 0.1 * field_irr).clamp(0.0, 1.0);
                node.water_factor = (node.water_factor * (1.0 + water_boost * node.irrigation_capital)).min(1.6);
            }
        }

        #[cfg(feature = "instrument")]
        {
            let mean_fertility = if self.fields.fertility.is_empty() {
                0.0
            } else {
                self.fields.fertility.iter().map(|f| *f as f64).sum::<f64>() / self.fields.fertility.len() as f64
            };
            tracing::info!(
                target: "settlement::climate",
                year = year,
                mean_fertility = mean_fertility,
            );
        }
    }
}
