//! Phase 9: campaign logistics and attrition (`SPEC_FULL.md` §4.9).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::host::CountryView;
use crate::world::World;

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

impl World {
    pub(crate) fn update_campaign_logistics_and_attrition<C: CountryView>(&mut self, countries: &[C]) {
        if !self.config.research_settlement.campaign_logistics {
            return;
        }
        let demand_base = self.config.research_settlement.campaign_demand_base;
        let demand_war_scale = self.config.research_settlement.campaign_demand_war_scale;
        let attrition_rate = self.config.research_settlement.campaign_attrition_rate;
        let node_shock_scale = self.config.research_settlement.campaign_node_shock_scale;

        for edge in &mut self.edges {
            edge.campaign_load = 0.0;
            edge.campaign_deficit = 0.0;
            edge.campaign_attrition = 1.0;
        }
        for v in self.scratch.war_attrition.iter_mut() {
            *v = 0.0;
        }

        let n = self.nodes.len();
        let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        for (edge_idx, edge) in self.edges.iter().enumerate() {
            adjacency[edge.from_node].push((edge.to_node, edge_idx));
            adjacency[edge.to_node].push((edge.from_node, edge_idx));
        }

        for (country_idx, country) in countries.iter().enumerate() {
            if !country.is_at_war() || country.enemies().is_empty() {
                continue;
            }
            let source = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| node.owner_country == country_idx as i32)
                .max_by(|(_, a), (_, b)| a.population.partial_cmp(&b.population).unwrap_or(Ordering::Equal));
            let Some((source_idx, _)) = source else { continue };

            let fronts: Vec<usize> = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| {
                    node.owner_country >= 0
                        && node.owner_country != country_idx as i32
                        && country.enemies().contains(&node.owner_country)
                })
                .map(|(idx, _)| idx)
                .collect();
            if fronts.is_empty() {
                continue;
            }

            let mut dist = vec![f64::INFINITY; n];
            let mut prev_edge: Vec<Option<usize>> = vec![None; n];
            dist[source_idx] = 0.0;
            let mut heap = BinaryHeap::new();
            heap.push(HeapItem(0.0, source_idx));
            while let Some(HeapItem(d, u)) = heap.pop() {
                if d > dist[u] {
                    continue;
                }
                for &(v, edge_idx) in &adjacency[u] {
                    let edge = &self.edges[edge_idx];
                    let weight = edge.cost / edge.reliability.max(0.05);
                    let nd = d + weight;
                    if nd < dist[v] {
                        dist[v] = nd;
                        prev_edge[v] = Some(edge_idx);
                        heap.push(HeapItem(nd, v));
                    }
                }
            }

            let src_pop = self.nodes[source_idx].population;
            for &front in &fronts {
                if !dist[front].is_finite() {
                    continue;
                }
                let dst_pop = self.nodes[front].population;
                let demand = demand_base + demand_war_scale * (src_pop * dst_pop).max(0.0).sqrt();
                let mut cur = front;
                while let Some(edge_idx) = prev_edge[cur] {
                    self.edges[edge_idx].campaign_load += demand;
                    let edge = &self.edges[edge_idx];
                    cur = edge.other(cur).unwrap_or(source_idx);
                }
            }
        }

        for edge in &mut self.edges {
            if edge.campaign_load <= 0.0 {
                continue;
            }
            let deficit = (edge.campaign_load - edge.capacity * edge.reliability).max(0.0);
            edge.campaign_deficit = deficit;
            edge.campaign_attrition = (-attrition_rate * (deficit / edge.capacity.max(1.0))).exp().clamp(0.03, 1.0);
            edge.reliability = (edge.reliability * edge.campaign_attrition).max(0.03);
        }

        // Per-node war attrition: normalized deficit (halved) summed over
        // every incident edge, not just the ones on a routed path.
        for edge in &self.edges {
            if edge.campaign_deficit <= 0.0 {
                continue;
            }
            let normalized = 0.5 * (edge.campaign_deficit / edge.capacity.max(1.0));
            self.scratch.war_attrition[edge.from_node] += normalized;
            self.scratch.war_attrition[edge.to_node] += normalized;
        }

        for front in 0..n {
            if self.scratch.war_attrition[front] > 0.0 {
                let shock = (node_shock_scale * self.scratch.war_attrition[front]).min(0.25);
                self.nodes[front].population = (self.nodes[front].population * (1.0 - shock)).max(0.0);
            }
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "settlement::campaign",
            loaded_edges = self.edges.iter().filter(|e| e.campaign_load > 0.0).count(),
            total_deficit = self.edges.iter().map(|e| e.campaign_deficit).sum::<f64>(),
            mean_attrition = self.edges.iter().map(|e| e.campaign_attrition).sum::<f64>() / (self.edges.len().max(1) as f64),
        );
    }
}
