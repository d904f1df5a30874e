//! Phase 1: initialization / population sync (`SPEC_FULL.md` §4.1).

use crate::host::{CountryView, FieldGrid};
use crate::math::{chebyshev, clamp01, finite_or};
use crate::node::SettlementNode;
use crate::world::World;

struct Candidate {
    owner: i32,
    fx: i32,
    fy: i32,
    field_index: usize,
    pop: f64,
}

impl World {
    pub(crate) fn ensure_initialized<F: FieldGrid, C: CountryView>(
        &mut self,
        year: i64,
        field: &F,
        countries: &[C],
    ) {
        let dims_changed = self.fields.width() != field.width() || self.fields.height() != field.height();
        if self.is_initialized() && !dims_changed {
            return;
        }
        self.fields.resize(field.width(), field.height());
        self.initialize_nodes_from_field_population(year, field, countries);
        self.mark_initialized();
    }

    fn initialize_nodes_from_field_population<F: FieldGrid, C: CountryView>(
        &mut self,
        year: i64,
        field: &F,
        countries: &[C],
    ) {
        self.nodes.clear();
        let country_count = countries.len() as i32;
        let min_pop = self.config.settlements.init_node_min_pop;
        let global_cap = self.config.settlements.max_nodes_global;
        let per_country_cap = self.config.settlements.max_nodes_per_country;
        let spacing = self.config.settlements.split_min_spacing_fields;
        let k_base = self.config.settlements.k_base_per_food_unit;

        let mut candidates = Vec::new();
        for fy in 0..field.height() {
            for fx in 0..field.width() {
                if !field.is_land(fx, fy) {
                    continue;
                }
                let owner = field.owner_id(fx, fy);
                if owner < 0 || owner >= country_count {
                    continue;
                }
                let pop = finite_or(field.population(fx, fy), 0.0).max(0.0);
                if pop < min_pop {
                    continue;
                }
                candidates.push(Candidate {
                    owner,
                    fx,
                    fy,
                    field_index: field.field_index(fx, fy),
                    pop,
                });
            }
        }
        candidates.sort_by(|a, b| {
            a.owner
                .cmp(&b.owner)
                .then(b.pop.partial_cmp(&a.pop).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.field_index.cmp(&b.field_index))
        });

        let mut nodes_by_country = vec![0usize; countries.len()];
        for candidate in &candidates {
            if self.nodes.len() >= global_cap {
                break;
            }
            let owner_idx = candidate.owner as usize;
            if nodes_by_country[owner_idx] >= per_country_cap {
                continue;
            }
            let too_close = self.nodes.iter().any(|n| {
                n.owner_country == candidate.owner
                    && chebyshev(n.field_x, n.field_y, candidate.fx, candidate.fy) < spacing
            });
            if too_close {
                continue;
            }

            let country = &countries[owner_idx];
            let m = country.macro_economy();
            let food_potential = finite_or(field.food_potential(candidate.fx, candidate.fy), 0.0).max(0.0);
            let population = candidate.pop.max(5.0);
            let carrying_capacity =
                (population * 1.20).max(food_potential * k_base.max(1.0));

            let id = self.allocate_node_id();
            let node = SettlementNode::new(id, candidate.fx, candidate.fy)
                .with_owner(candidate.owner)
                .with_population(population)
                .with_carrying_capacity(carrying_capacity)
                .with_founded_year(year);
            let mut node = node;
            node.specialist_share = clamp01(0.02 + 0.10 * m.market_access);
            node.storage_stock = 0.08 + 0.20 * m.institution_capacity;
            node.tech_factor = 0.80 + 0.40 * m.knowledge_stock;
            node.irrigation_capital = clamp01(0.10 + 0.35 * m.institution_capacity + 0.15 * m.market_access);
            node.elite_share = clamp01(0.08 + 0.26 * m.inequality);
            node.local_legitimacy = clamp01(0.35 + 0.45 * country.legitimacy());
            node.local_admin_capacity = clamp01(0.20 + 0.48 * country.admin_capacity());
            node.extraction_rate = clamp01(0.04 + 0.12 * m.institution_capacity);

            self.push_node(node);
            nodes_by_country[owner_idx] += 1;
        }

        for (owner_idx, country) in countries.iter().enumerate() {
            if nodes_by_country[owner_idx] > 0 || country.population() <= 0.0 {
                continue;
            }
            if self.nodes.len() >= global_cap {
                break;
            }
            let cell = field.field_cell_size().max(1);
            let (px, py) = country.starting_pixel();
            let mut fx = (px / cell).clamp(0, field.width() - 1);
            let mut fy = (py / cell).clamp(0, field.height() - 1);
            if !field.is_land(fx, fy) {
                'ring: for r in 1..6 {
                    for dy in -r..=r {
                        for dx in -r..=r {
                            let nx = fx + dx;
                            let ny = fy + dy;
                            if field.in_bounds(nx, ny) && field.is_land(nx, ny) {
                                fx = nx;
                                fy = ny;
                                break 'ring;
                            }
                        }
                    }
                }
            }

            let food_potential = finite_or(field.food_potential(fx, fy), 1.0).max(1.0);
            let population = country.population().max(50.0);
            let carrying_capacity = (population * 1.20).max(food_potential * k_base.max(1.0));

            let id = self.allocate_node_id();
            let mut node = SettlementNode::new(id, fx, fy)
                .with_owner(owner_idx as i32)
                .with_population(population)
                .with_carrying_capacity(carrying_capacity)
                .with_founded_year(year);
            node.storage_stock = 0.08;
            node.tech_factor = 0.90;
            node.irrigation_capital = 0.08;
            node.elite_share = 0.12;
            node.local_legitimacy = clamp01(0.35 + 0.45 * country.legitimacy());
            node.local_admin_capacity = clamp01(0.20 + 0.45 * country.admin_capacity());
            node.extraction_rate = 0.06;

            self.push_node(node);
            nodes_by_country[owner_idx] += 1;
        }

        self.nodes
            .sort_by(|a, b| a.id.cmp(&b.id).then(a.field_y.cmp(&b.field_y)).then(a.field_x.cmp(&b.field_x)));
    }

    pub(crate) fn sync_node_totals_to_country_population<C: CountryView>(&mut self, countries: &[C]) {
        let n = countries.len();
        let mut total_by_country = vec![0.0_f64; n];
        for node in &self.nodes {
            if node.owner_country >= 0 && (node.owner_country as usize) < n {
                total_by_country[node.owner_country as usize] += node.population;
            }
        }
        for node in &mut self.nodes {
            if node.owner_country < 0 || (node.owner_country as usize) >= n {
                continue;
            }
            let idx = node.owner_country as usize;
            let current = total_by_country[idx];
            if current <= 0.0 {
                continue;
            }
            let target = countries[idx].population().max(0.0);
            let scale = target / current;
            if scale.is_finite() && scale > 0.0 {
                node.population *= scale;
            }
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::sync_population",
            node_count = self.nodes.len(),
            country_count = n,
        );
    }
}
