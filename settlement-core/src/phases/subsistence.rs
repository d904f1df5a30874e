//! Phase 2: subsistence mix replicator dynamic and package adoption
//! (`SPEC_FULL.md` §4.2).

use crate::hash::{jitter_range, salt};
use crate::host::{CountryView, FieldGrid};
use crate::math::finite_or;
use crate::node::{DEFAULT_MIX, SettlementNode};
use crate::packages::default_domestic_packages;
use crate::types::SubsistenceMode;
use crate::world::World;

/// Per-mode yield used in both the replicator payoff and `foodProduced`
/// mode-mix weighting (`SPEC_FULL.md` §4.5 `modeYield`).
pub const MODE_YIELD: [f64; SubsistenceMode::COUNT] = [0.86, 1.18, 0.95, 1.08, 0.24];

fn mode_payoff(node: &SettlementNode, mode: SubsistenceMode, env: &EnvFactors) -> f64 {
    let base = match mode {
        SubsistenceMode::Foraging => env.food_potential * (1.0 - 0.3 * env.arid),
        SubsistenceMode::Farming => env.food_potential * env.precip_norm * (1.0 - 0.4 * env.cold),
        SubsistenceMode::Pastoral => env.arid * 0.6 + env.corridor * 0.4,
        SubsistenceMode::Fishing => if env.coastal { 1.0 } else { 0.05 },
        SubsistenceMode::Craft => env.market_potential,
    };
    let package_mul: f64 = node
        .adopted_packages
        .iter()
        .filter_map(|&id| default_domestic_packages().into_iter().find(|p| p.id == id))
        .map(|p| p.mode_multiplier(mode))
        .product();
    (base * package_mul.max(0.45)).max(0.0)
}

struct EnvFactors {
    food_potential: f64,
    precip_norm: f64,
    arid: f64,
    cold: f64,
    coastal: bool,
    corridor: f64,
    market_potential: f64,
}

fn env_factors_at<F: FieldGrid>(field: &F, node: &SettlementNode, market_potential: f64) -> EnvFactors {
    let precip = finite_or(field.precip_mean(node.field_x, node.field_y), 0.4).clamp(0.0, 1.0);
    let temp = finite_or(field.temp_mean(node.field_x, node.field_y), 18.0);
    EnvFactors {
        food_potential: finite_or(field.food_potential(node.field_x, node.field_y), 0.0).max(0.0),
        precip_norm: precip,
        arid: (1.0 - precip).clamp(0.0, 1.0),
        cold: ((5.0 - temp) / 25.0).clamp(0.0, 1.0),
        coastal: finite_or(field.corridor_weight(node.field_x, node.field_y), 0.0) > 0.75,
        corridor: finite_or(field.corridor_weight(node.field_x, node.field_y), 0.0).clamp(0.0, 1.0),
        market_potential,
    }
}

impl World {
    pub(crate) fn update_subsistence_mix_and_packages<F: FieldGrid, C: CountryView>(
        &mut self,
        year: i64,
        field: &F,
        countries: &[C],
    ) {
        let rate = self.config.subsistence.mix_adapt_rate;
        let packages_enabled = self.config.packages.enabled;
        let adoption_base = self.config.packages.adoption_base;
        let env_weight = self.config.packages.environment_weight;
        let diffusion_weight = self.config.packages.diffusion_weight;
        let world_seed = self.config.world_seed;
        let packages = default_domestic_packages();

        for node in &mut self.nodes {
            let market_potential = countries
                .get(node.owner_country.max(0) as usize)
                .filter(|_| node.owner_country >= 0)
                .map(|c| c.macro_economy().market_access)
                .unwrap_or(0.0);
            let env = env_factors_at(field, node, market_potential);

            let payoffs: [f64; SubsistenceMode::COUNT] =
                std::array::from_fn(|i| mode_payoff(node, SubsistenceMode::ALL[i], &env));
            let mean_payoff: f64 = node
                .mix
                .iter()
                .zip(payoffs.iter())
                .map(|(m, p)| m * p)
                .sum();

            let mut sum = 0.0;
            for (k, p) in payoffs.iter().enumerate() {
                let updated = (node.mix[k] + rate * node.mix[k] * (p - mean_payoff)).max(1e-4);
                node.mix[k] = updated;
                sum += updated;
            }
            if !sum.is_finite() || sum <= 0.0 {
                node.mix = DEFAULT_MIX;
            } else {
                for v in &mut node.mix {
                    *v /= sum;
                }
            }

            if !packages_enabled {
                continue;
            }
            for package in &packages {
                if node.has_package(package.id) {
                    continue;
                }
                let env_affinity = env.arid * package.arid_affinity
                    + env.cold * package.cold_affinity
                    + (if env.coastal { package.water_affinity } else { 0.0 });
                let jitter = jitter_range(
                    world_seed,
                    year,
                    (node.id.0 as u64) << 16 | package.id as u64,
                    salt::PACKAGE_ADOPTION_JITTER,
                    -0.04,
                    0.04,
                );
                let score = env_weight * env_affinity
                    + diffusion_weight * market_potential
                    + 0.25 * env.corridor
                    + jitter;
                if score >= 1.0 - adoption_base {
                    node.adopt_package(package.id);
                }
            }
        }

        #[cfg(feature = "instrument")]
        {
            let mean_mix = mean_mix_vector(&self.nodes);
            tracing::info!(
                target: "settlement::subsistence",
                year = year,
                node_count = self.nodes.len(),
                mean_foraging = mean_mix[0],
                mean_farming = mean_mix[1],
                mean_pastoral = mean_mix[2],
                mean_fishing = mean_mix[3],
                mean_craft = mean_mix[4],
            );
        }
    }
}

#[cfg(feature = "instrument")]
fn mean_mix_vector(nodes: &[crate::node::SettlementNode]) -> [f64; SubsistenceMode::COUNT] {
    let mut sum = [0.0; SubsistenceMode::COUNT];
    if nodes.is_empty() {
        return sum;
    }
    for node in nodes {
        for (s, m) in sum.iter_mut().zip(node.mix.iter()) {
            *s += m;
        }
    }
    for s in &mut sum {
        *s /= nodes.len() as f64;
    }
    sum
}
