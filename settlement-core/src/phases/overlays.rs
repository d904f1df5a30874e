//! Phase 15: overlays and the determinism hash (`SPEC_FULL.md` §4.14, §9).

use crate::hash::{DETERMINISM_HASH_SEED, hash_double, mix_hash};
use crate::host::FieldGrid;
use crate::types::SubsistenceMode;
use crate::world::{Overlays, World};

/// Quantization scale applied to every real before hashing, matching the
/// "6 decimal places" bit-for-bit determinism check in `SPEC_FULL.md` §8.
const HASH_SCALE: f64 = 1_000_000.0;

impl World {
    pub(crate) fn rebuild_overlays<F: FieldGrid>(&mut self, field: &F) {
        let len = self.fields.len();
        let mut node_population = vec![0.0_f32; len];
        let mut mode_weight = vec![[0.0_f64; SubsistenceMode::COUNT]; len];
        let mut transport_density = vec![0.0_f32; len];

        for node in &self.nodes {
            if !field.in_bounds(node.field_x, node.field_y) {
                continue;
            }
            let idx = self.fields.index(node.field_x, node.field_y);
            node_population[idx] = node_population[idx].max(node.population as f32);
            for (k, share) in node.mix.iter().enumerate() {
                mode_weight[idx][k] += node.population * share;
            }
        }

        for edge in &self.edges {
            let density = (edge.capacity * edge.reliability / (1.0 + edge.cost)) as f32;
            for &node_idx in &[edge.from_node, edge.to_node] {
                if let Some(node) = self.nodes.get(node_idx) {
                    if field.in_bounds(node.field_x, node.field_y) {
                        let idx = self.fields.index(node.field_x, node.field_y);
                        transport_density[idx] += density;
                    }
                }
            }
        }

        let dominant_mode: Vec<u8> = mode_weight
            .iter()
            .map(|weights| {
                let mut best: Option<(usize, f64)> = None;
                for (k, &w) in weights.iter().enumerate() {
                    if w <= 0.0 {
                        continue;
                    }
                    match best {
                        Some((_, bw)) if w <= bw => {}
                        _ => best = Some((k, w)),
                    }
                }
                best.map(|(k, _)| k as u8).unwrap_or(255)
            })
            .collect();

        self.overlays = Overlays { node_population, dominant_mode, transport_density };

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::overlays",
            field_count = len,
            occupied_fields = self.overlays.node_population.iter().filter(|p| **p > 0.0).count(),
        );
    }

    /// 64-bit canonical hash of all persistent state, used externally to
    /// check reproducibility across runs (`SPEC_FULL.md` §4.14, §9).
    pub(crate) fn compute_determinism_hash(&mut self) {
        let mut h = DETERMINISM_HASH_SEED;
        h = mix_hash(h, self.nodes.len() as u64);
        h = mix_hash(h, self.edges.len() as u64);

        for node in &self.nodes {
            h = mix_hash(h, node.id.0 as u64);
            h = mix_hash(h, node.owner_country as i64 as u64);
            h = mix_hash(h, hash_double(node.population, HASH_SCALE));
            h = mix_hash(h, hash_double(node.carrying_capacity, HASH_SCALE));
            h = mix_hash(h, hash_double(node.calories, HASH_SCALE));
            h = mix_hash(h, hash_double(node.food_imported, HASH_SCALE));
            h = mix_hash(h, hash_double(node.food_exported, HASH_SCALE));
            h = mix_hash(h, hash_double(node.specialist_share, HASH_SCALE));
            h = mix_hash(h, hash_double(node.storage_stock, HASH_SCALE));
            h = mix_hash(h, hash_double(node.irrigation_capital, HASH_SCALE));
            h = mix_hash(h, hash_double(node.extraction_rate, HASH_SCALE));
            for v in &node.mix {
                h = mix_hash(h, hash_double(*v, HASH_SCALE));
            }
            for &p in &node.adopted_packages {
                h = mix_hash(h, p as u64);
            }
        }

        for edge in &self.edges {
            h = mix_hash(h, edge.from_node as u64);
            h = mix_hash(h, edge.to_node as u64);
            h = mix_hash(h, hash_double(edge.cost, HASH_SCALE));
            h = mix_hash(h, hash_double(edge.capacity, HASH_SCALE));
            h = mix_hash(h, hash_double(edge.reliability, HASH_SCALE));
            h = mix_hash(h, hash_double(edge.campaign_attrition, HASH_SCALE));
            h = mix_hash(h, edge.sea_link as u64);
        }

        for &irr in &self.fields.irrigation_capital {
            h = mix_hash(h, hash_double(irr as f64, HASH_SCALE));
        }

        self.last_determinism_hash = h;

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::determinism_hash",
            hash = self.last_determinism_hash,
            node_count = self.nodes.len(),
            edge_count = self.edges.len(),
        );
    }

    /// Validates the universal invariants of `SPEC_FULL.md` §3/§8, returning
    /// the first violation found, or `None` if the post-tick state is sound.
    pub fn validate_invariants<F: FieldGrid>(&self, field: &F, country_count: usize) -> Option<String> {
        for node in &self.nodes {
            if !field.in_bounds(node.field_x, node.field_y) {
                return Some(format!("node {} out of field bounds", node.id.0));
            }
            if !field.is_land(node.field_x, node.field_y) {
                return Some(format!("node {} not on land", node.id.0));
            }
            if node.owner_country < -1 || node.owner_country as isize >= country_count as isize {
                return Some(format!("node {} owner out of range", node.id.0));
            }
            if !node.population.is_finite() || node.population < 0.0 {
                return Some(format!("node {} population not finite/nonnegative", node.id.0));
            }
            if !(node.carrying_capacity.is_finite() && node.carrying_capacity > 0.0) {
                return Some(format!("node {} carrying capacity not positive", node.id.0));
            }
            let mix_sum: f64 = node.mix.iter().sum();
            if (mix_sum - 1.0).abs() > 1e-3 {
                return Some(format!("node {} mix sums to {mix_sum}, not 1", node.id.0));
            }
        }

        for (idx, (s, i, r)) in self
            .scratch
            .s
            .iter()
            .zip(self.scratch.i.iter())
            .zip(self.scratch.r.iter())
            .map(|((s, i), r)| (s, i, r))
            .enumerate()
        {
            let sum = s + i + r;
            let collapsed = (*s - 1.0).abs() < 1e-9 && i.abs() < 1e-9 && r.abs() < 1e-9;
            if (sum - 1.0).abs() > 1e-6 && !collapsed {
                return Some(format!("node index {idx} SIR shares sum to {sum}, not 1"));
            }
        }

        for edge in &self.edges {
            if edge.from_node == edge.to_node {
                return Some("edge endpoints not distinct".to_string());
            }
            if !edge.is_canonical() {
                return Some("edge not in canonical from<to order".to_string());
            }
            if !(edge.cost > 0.0 && edge.cost.is_finite()) {
                return Some("edge cost not positive/finite".to_string());
            }
            if !(0.03..=1.0).contains(&edge.reliability) {
                return Some(format!("edge reliability {} out of [0.03,1]", edge.reliability));
            }
            if !(edge.campaign_attrition > 0.0 && edge.campaign_attrition <= 1.0) {
                return Some(format!("edge campaign_attrition {} out of (0,1]", edge.campaign_attrition));
            }
        }

        let n = self.trade_hint_matrix.country_count();
        for a in 0..n {
            if self.trade_hint_matrix.get(a, a) != 0.0 {
                return Some(format!("trade hint diagonal [{a},{a}] not zero"));
            }
            for b in 0..n {
                let v = self.trade_hint_matrix.get(a, b);
                if !(0.0..=1.0).contains(&v) {
                    return Some(format!("trade hint [{a},{b}] = {v} out of [0,1]"));
                }
            }
        }

        if self.last_fission_conservation_error > 1e-3 {
            return Some(format!(
                "fission conservation error {} exceeds 1e-3",
                self.last_fission_conservation_error
            ));
        }

        None
    }
}
