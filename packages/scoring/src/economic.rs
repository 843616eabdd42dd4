//! Outage-cost savings estimate for the static model.

use storage_siting_scoring_models::{EconomicParams, InfrastructureScore};

/// Estimates what a storage installation would save during an outage.
#[derive(Debug, Clone, PartialEq)]
pub struct EconomicAnalyzer {
    params: EconomicParams,
}

impl EconomicAnalyzer {
    #[must_use]
    pub const fn new(params: EconomicParams) -> Self {
        Self { params }
    }

    /// Census attribute holding the exposure (population or load).
    #[must_use]
    pub fn exposure_attribute(&self) -> &str {
        &self.params.exposure_attribute
    }

    /// `outage_hours × (exposure × cost_per_unit + Σ facility outage costs)`.
    ///
    /// Only categories with a positive weighted score contribute facility
    /// costs.
    #[must_use]
    pub fn savings(&self, exposure: f64, infrastructure: &[InfrastructureScore]) -> f64 {
        let facility_costs: f64 = infrastructure
            .iter()
            .filter(|s| s.weighted > 0.0)
            .map(|s| s.outage_cost)
            .sum();

        let hourly = exposure
            .max(0.0)
            .mul_add(self.params.cost_per_unit, facility_costs);
        self.params.outage_hours * hourly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> EconomicAnalyzer {
        EconomicAnalyzer::new(EconomicParams {
            exposure_attribute: "population".to_string(),
            cost_per_unit: 2.0,
            outage_hours: 4.0,
        })
    }

    fn scored(category: &str, weighted: f64, outage_cost: f64) -> InfrastructureScore {
        InfrastructureScore {
            weighted,
            outage_cost,
            ..InfrastructureScore::empty(category, 0.5)
        }
    }

    #[test]
    fn combines_exposure_and_facility_costs() {
        let infra = [scored("hospitals", 0.3, 500.0), scored("schools", 0.2, 100.0)];
        let savings = analyzer().savings(1_000.0, &infra);
        assert!((savings - 4.0 * (2_000.0 + 600.0)).abs() < 1e-9);
    }

    #[test]
    fn unscored_categories_add_no_cost() {
        let infra = [scored("hospitals", 0.0, 500.0)];
        let savings = analyzer().savings(0.0, &infra);
        assert!(savings.abs() < f64::EPSILON);
    }

    #[test]
    fn exposes_attribute_name() {
        assert_eq!(analyzer().exposure_attribute(), "population");
    }
}
