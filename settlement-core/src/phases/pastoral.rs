//! Phase 4: pastoral seasonal mobility (`SPEC_FULL.md` §4.4).

use crate::host::FieldGrid;
use crate::math::{clamp01, finite_or, manhattan};
use crate::world::World;

struct FieldScore {
    fx: i32,
    fy: i32,
    score: f64,
}

fn score_field<F: FieldGrid>(field: &F, fx: i32, fy: i32, season: i64) -> f64 {
    let precip = finite_or(field.precip_mean(fx, fy), 0.4);
    let temp = finite_or(field.temp_mean(fx, fy), 18.0);
    let corridor = finite_or(field.corridor_weight(fx, fy), 0.0);
    let seasonal = if season == 0 { precip } else { 1.0 - precip };
    0.5 * seasonal + 0.3 * (1.0 - ((temp - 20.0).abs() / 30.0).clamp(0.0, 1.0)) + 0.2 * corridor
}

impl World {
    pub(crate) fn update_pastoral_mobility_routes<F: FieldGrid>(&mut self, year: i64, field: &F) {
        if !self.config.research_settlement.pastoral_mobility {
            return;
        }
        let radius = self.config.research_settlement.pastoral_route_radius;
        let move_share = self.config.research_settlement.pastoral_move_share;
        let season = year.rem_euclid(2);

        let node_fields: Vec<(i32, i32, i32, f64, f64)> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (i as i32, n.field_x, n.field_y, n.population, n.pastoral_share()))
            .collect();

        let mut moves: Vec<(usize, usize, f64)> = Vec::new();

        for &(idx, fx, fy, population, pastoral_share) in &node_fields {
            if pastoral_share < 0.10 || population <= 20.0 {
                continue;
            }
            let base_score = score_field(field, fx, fy, season);
            let mut best: Option<FieldScore> = None;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let nx = fx + dx;
                    let ny = fy + dy;
                    if !field.in_bounds(nx, ny) || !field.is_land(nx, ny) {
                        continue;
                    }
                    let score = score_field(field, nx, ny, season);
                    let better = match &best {
                        None => true,
                        Some(b) => score > b.score || (score == b.score && (nx, ny) < (b.fx, b.fy)),
                    };
                    if better {
                        best = Some(FieldScore { fx: nx, fy: ny, score });
                    }
                }
            }
            let Some(best) = best else { continue };
            let gain = clamp01((best.score - base_score) + 0.22 * pastoral_share);
            if gain <= 0.0 {
                continue;
            }
            let owner = self.nodes[idx as usize].owner_country;
            let mut target_idx: Option<usize> = None;
            let mut target_dist = i32::MAX;
            for &(other_idx, ofx, ofy, _, _) in &node_fields {
                if other_idx == idx {
                    continue;
                }
                if self.nodes[other_idx as usize].owner_country != owner {
                    continue;
                }
                let dist = manhattan(ofx, ofy, best.fx, best.fy);
                if dist < target_dist || (dist == target_dist && other_idx < target_idx.map(|t| t as i32).unwrap_or(i32::MAX)) {
                    target_dist = dist;
                    target_idx = Some(other_idx as usize);
                }
            }
            let Some(target_idx) = target_idx else { continue };
            let amount = (population * pastoral_share * move_share * gain).min(0.04 * population);
            if amount > 0.0 {
                moves.push((idx as usize, target_idx, amount));
            }
        }

        #[cfg(feature = "instrument")]
        let move_count = moves.len();
        #[cfg(feature = "instrument")]
        let total_moved: f64 = moves.iter().map(|(_, _, amount)| amount).sum();

        for (from, to, amount) in moves {
            let amount = amount.min(self.nodes[from].population);
            self.nodes[from].population -= amount;
            self.nodes[to].population += amount;
            self.scratch.pastoral_season_gain[from] = amount;
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::pastoral",
            year = year,
            season = season,
            move_count = move_count,
            total_moved = total_moved,
        );
    }
}
