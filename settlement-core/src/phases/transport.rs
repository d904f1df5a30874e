//! Phase 7: transport graph rebuild (`SPEC_FULL.md` §4.7).

use std::collections::BinaryHeap;
use std::cmp::Ordering;

use crate::edge::TransportEdge;
use crate::host::{CountryView, FieldGrid};
use crate::math::finite_or;
use crate::world::World;

struct Candidate {
    other: usize,
    cost: f64,
    capacity: f64,
    sea_link: bool,
}

fn are_at_war<C: CountryView>(a: &C, b_idx: i32) -> bool {
    a.is_at_war() && a.enemies().contains(&b_idx)
}

fn base_cost(dist: f64, land_mult: f64, sea_mult: f64, sea_eligible: bool, move_cost_avg: f64, corridor_avg: f64) -> (f64, bool) {
    let land_cost = dist * land_mult * move_cost_avg / corridor_avg.max(0.1);
    if sea_eligible {
        let sea_cost = dist * sea_mult;
        if sea_cost < land_cost {
            return (sea_cost, true);
        }
    }
    (land_cost, false)
}

/// Minimal binary-heap Dijkstra over the 8-connected land field grid,
/// returning the minimum cost from `start` to every other node's field.
fn dijkstra_costs<F: FieldGrid>(
    field: &F,
    start_fx: i32,
    start_fy: i32,
    node_fields: &[(i32, i32)],
    land_mult: f64,
    max_cost: f64,
) -> Vec<f64> {
    #[derive(PartialEq)]
    struct HeapItem(f64, usize);
    impl Eq for HeapItem {}
    impl Ord for HeapItem {
        fn cmp(&self, other: &Self) -> Ordering {
            other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
        }
    }
    impl PartialOrd for HeapItem {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    let width = field.width().max(1) as usize;
    let height = field.height().max(1) as usize;
    let mut dist = vec![f64::INFINITY; width * height];
    let start_idx = (start_fy as usize) * width + (start_fx as usize);
    dist[start_idx] = 0.0;
    let mut heap = BinaryHeap::new();
    heap.push(HeapItem(0.0, start_idx));

    while let Some(HeapItem(d, idx)) = heap.pop() {
        if d > dist[idx] {
            continue;
        }
        let fx = (idx % width) as i32;
        let fy = (idx / width) as i32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = fx + dx;
                let ny = fy + dy;
                if !field.in_bounds(nx, ny) || !field.is_land(nx, ny) {
                    continue;
                }
                let c0 = finite_or(field.move_cost(fx, fy), 1.0);
                let c1 = finite_or(field.move_cost(nx, ny), 1.0);
                let w0 = finite_or(field.corridor_weight(fx, fy), 0.3);
                let w1 = finite_or(field.corridor_weight(nx, ny), 0.3);
                let geom = if dx != 0 && dy != 0 { std::f64::consts::SQRT_2 } else { 1.0 };
                let weight = geom * land_mult * 0.5 * (c0 + c1) / (0.5 * (w0 + w1)).max(0.1);
                let next_d = d + weight;
                if next_d <= max_cost && next_d < dist[(ny as usize) * width + nx as usize] {
                    let nidx = (ny as usize) * width + nx as usize;
                    dist[nidx] = next_d;
                    heap.push(HeapItem(next_d, nidx));
                }
            }
        }
    }

    node_fields
        .iter()
        .map(|&(fx, fy)| {
            if field.in_bounds(fx, fy) {
                dist[(fy as usize) * width + fx as usize]
            } else {
                f64::INFINITY
            }
        })
        .collect()
}

impl World {
    pub(crate) fn rebuild_transport_graph<F: FieldGrid, C: CountryView>(
        &mut self,
        year: i64,
        field: &F,
        countries: &[C],
    ) {
        let interval = self.config.settlements.transport_rebuild_interval_years.max(1);
        let should_rebuild = self.edges.is_empty() || year % interval == 0;

        if !should_rebuild {
            self.refresh_edge_capacity_and_reliability();
            return;
        }

        let cfg = self.config.transport.clone();
        let n = self.nodes.len();
        let node_fields: Vec<(i32, i32)> = self.nodes.iter().map(|n| (n.field_x, n.field_y)).collect();
        let node_pop: Vec<f64> = self.nodes.iter().map(|n| n.population).collect();
        let node_owner: Vec<i32> = self.nodes.iter().map(|n| n.owner_country).collect();
        let node_coastal: Vec<bool> = self
            .nodes
            .iter()
            .map(|node| finite_or(field.corridor_weight(node.field_x, node.field_y), 0.0) > 0.75)
            .collect();

        let max_geom_dist = (cfg.max_edge_cost / cfg.land_cost_mult.max(0.01)).max(4.0);
        let bucket_size = 6.0_f64;
        let bucket_range = (max_geom_dist / bucket_size).ceil() as i32;

        let mut all_candidates: Vec<Vec<Candidate>> = (0..n).map(|_| Vec::new()).collect();

        for i in 0..n {
            let (ix, iy) = node_fields[i];
            let costs_from_i = if self.config.research_settlement.transport_path_rebuild {
                Some(dijkstra_costs(
                    field,
                    ix,
                    iy,
                    &node_fields,
                    cfg.land_cost_mult,
                    cfg.max_edge_cost * 1.05,
                ))
            } else {
                None
            };

            let bucket_x = (ix as f64 / bucket_size) as i32;
            let bucket_y = (iy as f64 / bucket_size) as i32;

            for j in 0..n {
                if j == i {
                    continue;
                }
                let (jx, jy) = node_fields[j];
                let jb_x = (jx as f64 / bucket_size) as i32;
                let jb_y = (jy as f64 / bucket_size) as i32;
                if (jb_x - bucket_x).abs() > bucket_range || (jb_y - bucket_y).abs() > bucket_range {
                    continue;
                }
                let dist = (((ix - jx).pow(2) + (iy - jy).pow(2)) as f64).sqrt();
                if dist > max_geom_dist {
                    continue;
                }
                let move_cost_avg =
                    0.5 * (finite_or(field.move_cost(ix, iy), 1.0) + finite_or(field.move_cost(jx, jy), 1.0));
                let corridor_avg = 0.5
                    * (finite_or(field.corridor_weight(ix, iy), 0.3) + finite_or(field.corridor_weight(jx, jy), 0.3));

                let (mut cost, mut sea_link) = if let Some(ref costs) = costs_from_i {
                    let c = costs[j];
                    if !c.is_finite() {
                        continue;
                    }
                    (c, false)
                } else {
                    base_cost(
                        dist,
                        cfg.land_cost_mult,
                        cfg.sea_cost_mult,
                        node_coastal[i] && node_coastal[j],
                        move_cost_avg,
                        corridor_avg,
                    )
                };

                if node_coastal[i] && node_coastal[j] {
                    let sea_cost = dist * cfg.sea_cost_mult;
                    if sea_cost < cost {
                        cost = sea_cost;
                        sea_link = true;
                    }
                }

                let owner_i = node_owner[i];
                let owner_j = node_owner[j];
                if owner_i != owner_j {
                    cost *= cfg.border_friction;
                    let hostile = (owner_i >= 0 && (owner_i as usize) < countries.len() && are_at_war(&countries[owner_i as usize], owner_j))
                        || (owner_j >= 0 && (owner_j as usize) < countries.len() && are_at_war(&countries[owner_j as usize], owner_i));
                    if hostile {
                        cost *= cfg.war_risk_mult;
                    }
                }

                if cost <= 0.0 || cost > cfg.max_edge_cost {
                    continue;
                }

                let capacity = (24.0 + 0.06 * (node_pop[i] * node_pop[j]).max(0.0).sqrt()) / (1.0 + 0.08 * cost);
                all_candidates[i].push(Candidate { other: j, cost, capacity, sea_link });
            }

            all_candidates[i].sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap_or(Ordering::Equal));
        }

        let mut selected = std::collections::BTreeSet::new();
        for i in 0..n {
            for cand in all_candidates[i].iter().take(cfg.k_nearest) {
                let pair = if i < cand.other { (i, cand.other) } else { (cand.other, i) };
                selected.insert(pair);
            }
        }

        let mut edges = Vec::with_capacity(selected.len());
        for (a, b) in selected {
            let cand = all_candidates[a]
                .iter()
                .find(|c| c.other == b)
                .or_else(|| all_candidates[b].iter().find(|c| c.other == a))
                .expect("selected pair must have a candidate");
            let reliability = (1.0 / (1.0 + 0.06 * cand.cost)).clamp(0.05, 1.0);
            let mut edge = TransportEdge::new(a, b, cand.cost, cand.capacity, cand.sea_link);
            edge.reliability = reliability;
            edges.push(edge);
        }
        edges.sort_by(|a, b| {
            a.from_node
                .cmp(&b.from_node)
                .then(a.to_node.cmp(&b.to_node))
                .then(a.cost.partial_cmp(&b.cost).unwrap_or(Ordering::Equal))
        });

        self.edges = edges;

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::transport",
            year = year,
            edge_count = self.edges.len(),
            node_count = n,
        );
        #[cfg(not(feature = "instrument"))]
        let _ = year;
    }

    fn refresh_edge_capacity_and_reliability(&mut self) {
        for edge in &mut self.edges {
            let pop_a = self.nodes.get(edge.from_node).map(|n| n.population).unwrap_or(0.0);
            let pop_b = self.nodes.get(edge.to_node).map(|n| n.population).unwrap_or(0.0);
            edge.capacity = (24.0 + 0.06 * (pop_a * pop_b).max(0.0).sqrt()) / (1.0 + 0.08 * edge.cost);
            edge.reliability = (1.0 / (1.0 + 0.06 * edge.cost)).clamp(0.05, 1.0);
        }
    }
}
