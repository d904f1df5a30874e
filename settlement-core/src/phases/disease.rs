//! Phase 10: SIR disease dynamics (`SPEC_FULL.md` §4.10).

use crate::host::{CountryView, FieldGrid};
use crate::math::{clamp, clamp01, finite_or};
use crate::world::World;

const SUBSTEPS: u32 = 4;

/// Reference implementation's base transmission rate, before the
/// density/humidity/corridor multipliers of `SPEC_FULL.md` §4.10's `βeff`.
const BETA_BASE: f64 = 0.13;

impl World {
    pub(crate) fn update_settlement_disease<F: FieldGrid, C: CountryView>(&mut self, field: &F, countries: &[C]) {
        let endemic_base = self.config.disease.endemic_base;
        let mitigation = self.config.disease.endemic_institution_mitigation;
        let dt = 1.0 / SUBSTEPS as f64;

        let n = self.nodes.len();
        let mut institution_by_node = vec![0.0_f64; n];
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.owner_country >= 0 {
                if let Some(country) = countries.get(node.owner_country as usize) {
                    institution_by_node[idx] = clamp01(country.macro_economy().institution_capacity);
                }
            }
        }

        let beta_eff: Vec<f64> = self
            .nodes
            .iter()
            .map(|node| {
                let density = clamp01(node.population / node.carrying_capacity.max(1.0));
                let humidity = finite_or(field.precip_mean(node.field_x, node.field_y), 0.4).clamp(0.0, 1.0);
                let corridor = finite_or(field.corridor_weight(node.field_x, node.field_y), 0.0).clamp(0.0, 1.0);
                BETA_BASE * (0.6 + 0.9 * density) * (0.65 + 0.45 * humidity) * (0.75 + 0.4 * corridor)
            })
            .collect();

        let gamma: Vec<f64> = institution_by_node
            .iter()
            .map(|&institution| clamp(0.06 + 0.2 * mitigation * institution, 0.02, 0.3))
            .collect();

        for _ in 0..SUBSTEPS {
            for v in self.scratch.imported_infection.iter_mut() {
                *v = 0.0;
            }
            for edge in &self.edges {
                let a = edge.from_node;
                let b = edge.to_node;
                let pop_a = self.nodes[a].population.max(1.0);
                let pop_b = self.nodes[b].population.max(1.0);
                let flow = (edge.capacity * edge.reliability).min(0.015 * (pop_a * pop_b).sqrt());
                self.scratch.imported_infection[a] += flow * self.scratch.i[b] / pop_a;
                self.scratch.imported_infection[b] += flow * self.scratch.i[a] / pop_b;
            }
            for idx in 0..n {
                let endemic = endemic_base * (1.0 - mitigation * institution_by_node[idx]).max(0.0);
                self.scratch.imported_infection[idx] =
                    (self.scratch.imported_infection[idx] + endemic * 0.02).clamp(0.0, 0.6);
            }

            for idx in 0..n {
                let s = self.scratch.s[idx];
                let i = self.scratch.i[idx];
                let r = self.scratch.r[idx];

                let new_infections = (beta_eff[idx] * s * (i + self.scratch.imported_infection[idx]).min(1.0) * dt).min(s);
                let new_recoveries = (gamma[idx] * i * dt).min(i + new_infections);

                let next_s = (s - new_infections).max(0.0);
                let next_i = (i + new_infections - new_recoveries).max(0.0);
                let next_r = (r + new_recoveries).max(0.0);

                let total = next_s + next_i + next_r;
                if total <= 1e-9 {
                    self.scratch.s[idx] = 1.0;
                    self.scratch.i[idx] = 0.0;
                    self.scratch.r[idx] = 0.0;
                } else {
                    self.scratch.s[idx] = next_s / total;
                    self.scratch.i[idx] = next_i / total;
                    self.scratch.r[idx] = next_r / total;
                }
            }
        }

        for idx in 0..n {
            let mut country_disease_burden = 0.0;
            if self.nodes[idx].owner_country >= 0 {
                if let Some(country) = countries.get(self.nodes[idx].owner_country as usize) {
                    country_disease_burden = country.macro_economy().disease_burden;
                }
            }
            self.scratch.disease_burden[idx] = clamp01(0.65 * self.scratch.i[idx] + 0.35 * country_disease_burden);
        }

        for (idx, node) in self.nodes.iter_mut().enumerate() {
            let burden = self.scratch.disease_burden[idx];
            node.population = (node.population * (1.0 - 0.04 * burden)).max(0.0);
        }

        #[cfg(feature = "instrument")]
        {
            let nf = n.max(1) as f64;
            tracing::info!(
                target: "settlement::disease",
                mean_infected = self.scratch.i.iter().sum::<f64>() / nf,
                mean_recovered = self.scratch.r.iter().sum::<f64>() / nf,
            );
        }
    }
}
