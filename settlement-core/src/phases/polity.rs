//! Phase 13: polity choice assignment (`SPEC_FULL.md` §4.13).

use crate::host::{CountryView, CountryWriteBack};
use crate::world::World;

struct Proposal {
    node_idx: usize,
    target: i32,
    gain: f64,
}

fn country_strength<C: CountryView>(country: &C) -> f64 {
    0.34 * country.legitimacy()
        + 0.28 * country.avg_control()
        + 0.18 * country.admin_capacity()
        + 0.2 * country.macro_economy().market_access
}

fn are_at_war<C: CountryView>(a: &C, b: i32) -> bool {
    a.is_at_war() && a.enemies().contains(&b)
}

impl World {
    pub(crate) fn apply_polity_choice_assignment<C: CountryView>(
        &mut self,
        _year: i64,
        countries: &[C],
        write_backs: &mut [CountryWriteBack],
    ) {
        if !self.config.research_settlement.polity_choice_assignment || countries.is_empty() {
            return;
        }
        let threshold = self.config.research_settlement.polity_switch_threshold;
        let max_share = self.config.research_settlement.polity_switch_max_node_share;
        let cell = self.config.field_cell_size.max(1) as f64;

        // Top-3 strongest countries, by id ascending tie-break, computed once per tick.
        let mut ranked: Vec<(usize, f64)> = countries.iter().enumerate().map(|(i, c)| (i, country_strength(c))).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        let top3: Vec<usize> = ranked.iter().take(3).map(|&(i, _)| i).collect();

        let n = self.nodes.len();
        let mut neighbor_owners: Vec<Vec<i32>> = vec![Vec::new(); n];
        for edge in &self.edges {
            let a = edge.from_node;
            let b = edge.to_node;
            let owner_b = self.nodes[b].owner_country;
            let owner_a = self.nodes[a].owner_country;
            if owner_b >= 0 && !neighbor_owners[a].contains(&owner_b) {
                neighbor_owners[a].push(owner_b);
            }
            if owner_a >= 0 && !neighbor_owners[b].contains(&owner_a) {
                neighbor_owners[b].push(owner_a);
            }
        }

        let mut proposals = Vec::new();
        for idx in 0..n {
            let current = self.nodes[idx].owner_country;
            let mut candidates: Vec<i32> = Vec::new();
            if current >= 0 {
                candidates.push(current);
            }
            for &o in &neighbor_owners[idx] {
                if !candidates.contains(&o) {
                    candidates.push(o);
                }
            }
            for &o in &top3 {
                let o = o as i32;
                if !candidates.contains(&o) {
                    candidates.push(o);
                }
            }

            let join_utility = self.scratch.join_utility[idx];
            let node = &self.nodes[idx];
            let mut best_candidate = current;
            let mut best_utility = f64::NEG_INFINITY;
            for &cand in &candidates {
                if cand < 0 || cand as usize >= countries.len() {
                    continue;
                }
                let country = &countries[cand as usize];
                let strength = country_strength(country);
                let (cap_px_x, cap_py_y) = country.starting_pixel();
                let cap_fx = cap_px_x as f64 / cell;
                let cap_fy = cap_py_y as f64 / cell;
                let dist = ((node.field_x as f64 - cap_fx).powi(2) + (node.field_y as f64 - cap_fy).powi(2)).sqrt();
                let at_war = current >= 0
                    && (current as usize) < countries.len()
                    && cand != current
                    && are_at_war(&countries[current as usize], cand);
                let utility = join_utility + 0.45 * strength - 0.0012 * dist - if at_war { 0.1 } else { 0.0 };
                if utility > best_utility {
                    best_utility = utility;
                    best_candidate = cand;
                }
            }

            if best_candidate != current {
                let current_utility = if current >= 0 && (current as usize) < countries.len() {
                    let country = &countries[current as usize];
                    let strength = country_strength(country);
                    let (cap_px_x, cap_py_y) = country.starting_pixel();
                    let cap_fx = cap_px_x as f64 / cell;
                    let cap_fy = cap_py_y as f64 / cell;
                    let dist = ((node.field_x as f64 - cap_fx).powi(2) + (node.field_y as f64 - cap_fy).powi(2)).sqrt();
                    join_utility + 0.45 * strength - 0.0012 * dist
                } else {
                    0.0
                };
                let gain = best_utility - current_utility;
                if gain >= threshold {
                    proposals.push(Proposal { node_idx: idx, target: best_candidate, gain });
                }
            }
        }

        proposals.sort_by(|a, b| b.gain.partial_cmp(&a.gain).unwrap_or(std::cmp::Ordering::Equal).then(a.node_idx.cmp(&b.node_idx)));

        let cap = ((max_share * n as f64).floor() as usize).max(0);
        let n_countries = countries.len();
        let mut pop_gain_by_country = vec![0.0_f64; n_countries];
        let mut pop_by_country = vec![0.0_f64; n_countries];

        let mut switched_count = 0usize;
        for proposal in proposals.into_iter().take(cap) {
            let target = proposal.target;
            if target < 0 || target as usize >= countries.len() {
                continue;
            }
            let target_country = &countries[target as usize];
            let node = &mut self.nodes[proposal.node_idx];
            node.owner_country = target;
            node.local_legitimacy = (0.7 * node.local_legitimacy + 0.3 * target_country.legitimacy()).clamp(0.0, 1.0);
            node.local_admin_capacity = (0.7 * node.local_admin_capacity + 0.3 * target_country.admin_capacity()).clamp(0.0, 1.0);

            pop_gain_by_country[target as usize] += node.population * proposal.gain;
            pop_by_country[target as usize] += node.population;
            switched_count += 1;
        }

        for (idx, _country) in countries.iter().enumerate() {
            if pop_by_country[idx] <= 0.0 {
                continue;
            }
            let mean_gain = pop_gain_by_country[idx] / pop_by_country[idx];
            write_backs[idx].legitimacy_delta += 0.02 * mean_gain;
            write_backs[idx].avg_control_delta += 0.02 * mean_gain;
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::polity",
            switch_cap = cap,
            switched_count = switched_count,
        );
        #[cfg(not(feature = "instrument"))]
        let _ = switched_count;
    }
}
