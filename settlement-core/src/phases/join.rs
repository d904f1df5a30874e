//! Phase 12: neighbor-weighted adoption pressure and join/stay utility
//! (`SPEC_FULL.md` §4.12).
//!
//! `scratch.adoption_pressure` drives a second, diffusion-based package
//! adoption path (distinct from phase 2's environmental/market score);
//! `scratch.join_utility` feeds the polity-switch allocator in
//! `phases::polity`. The country-facing scalars (`elite, risk, sec, trade,
//! pub, tax, opp, stay`) are underspecified beyond "derived from country
//! macro state" — the mapping below is this implementation's resolution of
//! that open question (see `DESIGN.md`).

use crate::hash::{jitter_range, salt};
use crate::host::{CountryView, CountryWriteBack};
use crate::math::{clamp, clamp01, finite_or, sigmoid};
use crate::packages::default_domestic_packages;
use crate::world::World;

struct JoinScalars {
    elite: f64,
    risk: f64,
    sec: f64,
    trade: f64,
    publ: f64,
    tax: f64,
    opp: f64,
    stay: f64,
}

/// Unowned fields get neutral-to-mildly-hostile defaults so an unowned node
/// never looks strictly better than any actual country.
const UNOWNED_SCALARS: JoinScalars = JoinScalars {
    elite: 0.10,
    risk: 0.40,
    sec: 0.30,
    trade: 0.10,
    publ: 0.10,
    tax: 0.0,
    opp: 0.10,
    stay: 0.0,
};

fn scalars_for<C: CountryView>(country: Option<&C>, node_elite_share: f64) -> JoinScalars {
    let Some(country) = country else { return UNOWNED_SCALARS };
    let m = country.macro_economy();
    JoinScalars {
        elite: node_elite_share,
        risk: clamp01(0.5 * m.famine_severity + 0.5 * m.disease_burden),
        sec: clamp01(country.avg_control()),
        trade: clamp01(m.market_access),
        publ: clamp01(m.institution_capacity),
        tax: clamp01(country.tax_rate()),
        opp: clamp01(0.15 * m.inequality),
        stay: 0.0,
    }
}

impl World {
    pub(crate) fn update_adoption_and_join_utility<C: CountryView>(
        &mut self,
        year: i64,
        countries: &[C],
        write_backs: &mut [CountryWriteBack],
    ) {
        let world_seed = self.config.world_seed;
        let n = self.nodes.len();

        for v in self.scratch.adoption_pressure.iter_mut() {
            *v = 0.0;
        }
        for v in self.scratch.join_utility.iter_mut() {
            *v = 0.0;
        }

        let mut neighbor_adopt_weighted = vec![0.0_f64; n];
        let mut neighbor_weight = vec![0.0_f64; n];
        for edge in &self.edges {
            let a = edge.from_node;
            let b = edge.to_node;
            let w = (edge.reliability / (1.0 + edge.cost)).max(0.01);
            let share_a = (self.nodes[a].adopted_packages.len() as f64 / 6.0).min(1.0);
            let share_b = (self.nodes[b].adopted_packages.len() as f64 / 6.0).min(1.0);
            neighbor_adopt_weighted[a] += w * share_b;
            neighbor_weight[a] += w;
            neighbor_adopt_weighted[b] += w * share_a;
            neighbor_weight[b] += w;
        }

        let packages = default_domestic_packages();

        for idx in 0..n {
            let node = &self.nodes[idx];
            let neigh = if neighbor_weight[idx] > 0.0 {
                neighbor_adopt_weighted[idx] / neighbor_weight[idx]
            } else {
                0.0
            };

            let field_fertility = if self.fields.width() > 0
                && node.field_x >= 0
                && node.field_y >= 0
                && node.field_x < self.fields.width()
                && node.field_y < self.fields.height()
            {
                self.fields.fertility[self.fields.index(node.field_x, node.field_y)] as f64
            } else {
                0.5
            };
            let market_norm = (self.scratch.market_potential[idx] / node.population.max(1.0)).min(3.0) / 3.0;
            let suit = 0.55 * field_fertility + 0.45 * market_norm;

            let owner = node.owner_country;
            let country_ref = if owner >= 0 && (owner as usize) < countries.len() {
                Some(&countries[owner as usize])
            } else {
                None
            };
            let s = scalars_for(country_ref, node.elite_share);

            let z = -0.55 + 1.45 * neigh + 1.10 * suit + 0.9 * s.elite - 1.4 * s.risk;
            let adoption_pressure = sigmoid(z);
            self.scratch.adoption_pressure[idx] = adoption_pressure;

            self.scratch.join_utility[idx] = clamp(
                s.sec + s.trade + s.publ - s.tax - s.opp - 0.5 * s.risk - s.stay,
                -1.0,
                1.0,
            );

            if !self.config.packages.enabled {
                continue;
            }
            let jitter = jitter_range(world_seed, year, node.id.0 as u64, salt::JOIN_ADOPTION_JITTER, -0.06, 0.06);
            if adoption_pressure < 0.58 + jitter {
                continue;
            }
            let market_affinity = finite_or(market_norm, 0.0).clamp(0.0, 1.0);
            let mut best: Option<(u32, f64)> = None;
            for package in &packages {
                if self.nodes[idx].has_package(package.id) {
                    continue;
                }
                let p_adopt = clamp01(0.5 + 0.5 * (package.market_affinity - 0.5));
                let score = 0.55 * p_adopt + 0.45 * (suit + 0.25 * market_affinity);
                let better = match best {
                    None => true,
                    Some((best_id, best_score)) => score > best_score || (score == best_score && package.id < best_id),
                };
                if better {
                    best = Some((package.id, score));
                }
            }
            if let Some((package_id, _)) = best {
                self.nodes[idx].adopt_package(package_id);
            }
        }

        let n_countries = countries.len();
        let mut pop_by_country = vec![0.0_f64; n_countries];
        let mut join_weighted = vec![0.0_f64; n_countries];
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.owner_country >= 0 && (node.owner_country as usize) < n_countries {
                let c = node.owner_country as usize;
                pop_by_country[c] += node.population;
                join_weighted[c] += node.population * self.scratch.join_utility[idx];
            }
        }
        for (idx, _country) in countries.iter().enumerate() {
            let pop = pop_by_country[idx];
            if pop <= 0.0 {
                continue;
            }
            let mean_join = join_weighted[idx] / pop;
            write_backs[idx].legitimacy_delta += 0.03 * mean_join;
            write_backs[idx].avg_control_delta += 0.02 * mean_join;
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::join",
            year = year,
            mean_adoption_pressure = self.scratch.adoption_pressure.iter().sum::<f64>() / (n.max(1) as f64),
        );
    }
}
