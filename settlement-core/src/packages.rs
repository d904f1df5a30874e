//! Domestic technology packages: the static, id-indexed table of multipliers
//! and suitability affinities nodes can adopt (`SPEC_FULL.md` §4.2, §4.12).

use crate::types::PackageId;

#[derive(Debug, Clone)]
pub struct DomesticPackageDefinition {
    pub id: PackageId,
    pub key: &'static str,
    pub foraging_mul: f64,
    pub farming_mul: f64,
    pub pastoral_mul: f64,
    pub fishing_mul: f64,
    pub storage_bonus: f64,
    pub water_affinity: f64,
    pub arid_affinity: f64,
    pub cold_affinity: f64,
    pub market_affinity: f64,
}

impl DomesticPackageDefinition {
    /// The per-mode multiplier this package applies to `SubsistenceMode::mix`
    /// payoffs, in `SubsistenceMode` order. Craft has no direct multiplier in
    /// the reference data set (packages only ever touch the four primary modes).
    pub fn mode_multiplier(&self, mode: crate::types::SubsistenceMode) -> f64 {
        use crate::types::SubsistenceMode::*;
        match mode {
            Foraging => self.foraging_mul,
            Farming => self.farming_mul,
            Pastoral => self.pastoral_mul,
            Fishing => self.fishing_mul,
            Craft => 1.0,
        }
    }
}

/// The reference implementation's hardcoded default package table.
pub fn default_domestic_packages() -> Vec<DomesticPackageDefinition> {
    vec![
        DomesticPackageDefinition {
            id: 0,
            key: "floodplain_irrigation",
            foraging_mul: 0.96,
            farming_mul: 1.34,
            pastoral_mul: 0.90,
            fishing_mul: 0.88,
            storage_bonus: 0.12,
            water_affinity: 0.95,
            arid_affinity: 0.10,
            cold_affinity: 0.05,
            market_affinity: 0.25,
        },
        DomesticPackageDefinition {
            id: 1,
            key: "clay_granaries",
            foraging_mul: 1.00,
            farming_mul: 1.08,
            pastoral_mul: 1.00,
            fishing_mul: 1.02,
            storage_bonus: 0.24,
            water_affinity: 0.40,
            arid_affinity: 0.20,
            cold_affinity: 0.20,
            market_affinity: 0.35,
        },
        DomesticPackageDefinition {
            id: 2,
            key: "caravan_herding",
            foraging_mul: 0.92,
            farming_mul: 0.95,
            pastoral_mul: 1.28,
            fishing_mul: 0.82,
            storage_bonus: 0.08,
            water_affinity: 0.10,
            arid_affinity: 0.92,
            cold_affinity: 0.20,
            market_affinity: 0.45,
        },
        DomesticPackageDefinition {
            id: 3,
            key: "littoral_fishery",
            foraging_mul: 0.86,
            farming_mul: 0.88,
            pastoral_mul: 0.84,
            fishing_mul: 1.46,
            storage_bonus: 0.10,
            water_affinity: 1.00,
            arid_affinity: 0.10,
            cold_affinity: 0.05,
            market_affinity: 0.30,
        },
        DomesticPackageDefinition {
            id: 4,
            key: "craft_market_towns",
            foraging_mul: 0.90,
            farming_mul: 1.02,
            pastoral_mul: 0.94,
            fishing_mul: 0.94,
            storage_bonus: 0.06,
            water_affinity: 0.20,
            arid_affinity: 0.20,
            cold_affinity: 0.15,
            market_affinity: 1.00,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_five_packages_with_sequential_ids() {
        let packages = default_domestic_packages();
        assert_eq!(packages.len(), 5);
        for (i, p) in packages.iter().enumerate() {
            assert_eq!(p.id, i as u32);
        }
    }

    #[test]
    fn littoral_fishery_favors_fishing() {
        let packages = default_domestic_packages();
        let fishery = &packages[3];
        assert!(fishery.fishing_mul > fishery.farming_mul);
        assert!(fishery.water_affinity > 0.9);
    }
}
