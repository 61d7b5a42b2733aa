//! Recommendation Engine
//!
//! **[REC-ENG-010]** Derives climate-control settings from the confirmed
//! inventory. Pure aside from the injected randomness source used for the
//! informational estimate figures; never fails — an empty inventory yields the
//! baseline settings.

use rand::Rng;

use coolsight_common::models::{
    ClassifiedItem, CoolerSettings, EnergyMode, FoodCategory, Recommendation,
};

/// Baseline temperature (°C)
const BASELINE_TEMPERATURE_C: i32 = 3;
/// Baseline relative humidity (%)
const BASELINE_HUMIDITY_PCT: i32 = 65;
/// Baseline airflow (%)
const BASELINE_AIRFLOW_PCT: i32 = 60;
/// Defrost interval (hours)
const DEFROST_CYCLE_HOURS: u32 = 8;

/// Temperature floor when lowering for perishables (°C)
const MIN_TEMPERATURE_C: i32 = 1;
/// Humidity ceiling for the perishable adjustment (%)
const MAX_HUMIDITY_PERISHABLE_PCT: i32 = 70;
/// Humidity ceiling for the vegetable adjustment (%)
const MAX_HUMIDITY_VEGETABLE_PCT: i32 = 85;
/// Airflow ceiling for the fruit adjustment (%)
const MAX_AIRFLOW_PCT: i32 = 80;

/// Settings recommendation engine
///
/// **[REC-ENG-010]** Category presence drives the derivation: perishables
/// (meat/dairy) lower the temperature and raise humidity, vegetables raise
/// humidity further, fruits raise airflow. Each adjustment clamps
/// independently; the clamps hold no matter how many categories are present.
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Derive a recommendation from the inventory
    ///
    /// The estimate figures (efficiency, preservation, savings) come from the
    /// injected `rng`; every other output is a deterministic function of the
    /// category presence flags.
    pub fn recommend<R: Rng>(
        &self,
        inventory: &[ClassifiedItem],
        rng: &mut R,
    ) -> Recommendation {
        let has_perishable = inventory.iter().any(|item| item.category.is_perishable());
        let has_vegetable = inventory
            .iter()
            .any(|item| item.category == FoodCategory::Vegetables);
        let has_fruit = inventory
            .iter()
            .any(|item| item.category == FoodCategory::Fruits);

        let mut temperature = BASELINE_TEMPERATURE_C;
        let mut humidity = BASELINE_HUMIDITY_PCT;
        let mut airflow = BASELINE_AIRFLOW_PCT;

        if has_perishable {
            temperature = (temperature - 1).max(MIN_TEMPERATURE_C);
            humidity = (humidity + 5).min(MAX_HUMIDITY_PERISHABLE_PCT);
        }

        if has_vegetable {
            humidity = (humidity + 10).min(MAX_HUMIDITY_VEGETABLE_PCT);
        }

        if has_fruit {
            airflow = (airflow + 15).min(MAX_AIRFLOW_PCT);
        }

        let energy_mode = if has_perishable {
            EnergyMode::Standard
        } else {
            EnergyMode::Eco
        };

        let settings = CoolerSettings {
            temperature_c: temperature,
            humidity_pct: humidity as u8,
            airflow_pct: airflow as u8,
            defrost_cycle_hours: DEFROST_CYCLE_HOURS,
            energy_mode,
        };

        let mut reasoning = Vec::new();
        if has_perishable {
            reasoning.push(
                "Lower temperature recommended for meat and dairy preservation".to_string(),
            );
        }
        if has_vegetable {
            reasoning.push("Increased humidity to prevent vegetable dehydration".to_string());
        }
        if has_fruit {
            reasoning
                .push("Enhanced airflow to prevent fruit ripening acceleration".to_string());
        }
        reasoning.push(format!(
            "{} energy mode selected for optimal efficiency",
            settings.energy_mode.as_str()
        ));
        reasoning.push(format!(
            "Defrost cycle set to {} hours based on usage pattern",
            settings.defrost_cycle_hours
        ));

        Recommendation {
            settings,
            reasoning,
            energy_efficiency_pct: rng.gen_range(85..=100),
            food_preservation_pct: rng.gen_range(90..=100),
            estimated_monthly_savings: format!("${:.0}/month", rng.gen_range(10.0..30.0)),
        }
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn item(category: FoodCategory) -> ClassifiedItem {
        ClassifiedItem {
            name: "test".to_string(),
            quantity: "1".to_string(),
            confidence: 90,
            category,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_dairy_only_inventory() {
        // Given: an inventory containing a single dairy item
        let inventory = vec![item(FoodCategory::Dairy)];

        // When: a recommendation is derived
        let rec = RecommendationEngine::new().recommend(&inventory, &mut rng());

        // Then: temperature drops, humidity rises, standard energy mode
        assert_eq!(rec.settings.temperature_c, 2);
        assert_eq!(rec.settings.humidity_pct, 70);
        assert_eq!(rec.settings.airflow_pct, 60);
        assert_eq!(rec.settings.energy_mode, EnergyMode::Standard);
    }

    #[test]
    fn test_fruit_only_inventory() {
        let inventory = vec![item(FoodCategory::Fruits)];
        let rec = RecommendationEngine::new().recommend(&inventory, &mut rng());

        assert_eq!(rec.settings.temperature_c, 3);
        assert_eq!(rec.settings.humidity_pct, 65);
        assert_eq!(rec.settings.airflow_pct, 75);
        assert_eq!(rec.settings.energy_mode, EnergyMode::Eco);
    }

    #[test]
    fn test_mixed_inventory_combines_adjustments() {
        let inventory = vec![
            item(FoodCategory::Dairy),
            item(FoodCategory::Vegetables),
            item(FoodCategory::Fruits),
        ];
        let rec = RecommendationEngine::new().recommend(&inventory, &mut rng());

        assert_eq!(rec.settings.temperature_c, 2);
        assert_eq!(rec.settings.humidity_pct, 80);
        assert_eq!(rec.settings.airflow_pct, 75);
        assert_eq!(rec.settings.energy_mode, EnergyMode::Standard);
    }

    #[test]
    fn test_empty_inventory_yields_baseline() {
        let rec = RecommendationEngine::new().recommend(&[], &mut rng());

        assert_eq!(rec.settings.temperature_c, 3);
        assert_eq!(rec.settings.humidity_pct, 65);
        assert_eq!(rec.settings.airflow_pct, 60);
        assert_eq!(rec.settings.defrost_cycle_hours, 8);
        assert_eq!(rec.settings.energy_mode, EnergyMode::Eco);
    }

    #[test]
    fn test_clamps_hold_for_saturated_inventory() {
        // All boosting categories at once, several items each
        let inventory = vec![
            item(FoodCategory::Meat),
            item(FoodCategory::Meat),
            item(FoodCategory::Dairy),
            item(FoodCategory::Vegetables),
            item(FoodCategory::Vegetables),
            item(FoodCategory::Fruits),
            item(FoodCategory::Fruits),
            item(FoodCategory::Beverages),
            item(FoodCategory::Other),
        ];
        let rec = RecommendationEngine::new().recommend(&inventory, &mut rng());

        assert!(rec.settings.temperature_c >= 1);
        assert!(rec.settings.humidity_pct <= 85);
        assert!(rec.settings.airflow_pct <= 80);
        assert!(rec.settings.validate().is_ok());
    }

    #[test]
    fn test_no_perishables_selects_eco_mode() {
        let inventory = vec![
            item(FoodCategory::Vegetables),
            item(FoodCategory::Beverages),
            item(FoodCategory::Other),
        ];
        let rec = RecommendationEngine::new().recommend(&inventory, &mut rng());
        assert_eq!(rec.settings.energy_mode, EnergyMode::Eco);
    }

    #[test]
    fn test_reasoning_order_and_always_present_sentences() {
        let inventory = vec![
            item(FoodCategory::Fruits),
            item(FoodCategory::Dairy),
            item(FoodCategory::Vegetables),
        ];
        let rec = RecommendationEngine::new().recommend(&inventory, &mut rng());

        // Per-condition sentences in perishable → vegetable → fruit order,
        // regardless of item order
        assert_eq!(rec.reasoning.len(), 5);
        assert!(rec.reasoning[0].contains("meat and dairy"));
        assert!(rec.reasoning[1].contains("vegetable"));
        assert!(rec.reasoning[2].contains("fruit"));
        assert!(rec.reasoning[3].contains("energy mode"));
        assert!(rec.reasoning[4].contains("Defrost cycle"));
    }

    #[test]
    fn test_reasoning_never_shorter_than_two() {
        let rec = RecommendationEngine::new().recommend(&[], &mut rng());
        assert_eq!(rec.reasoning.len(), 2);
        assert!(rec.reasoning[0].contains("eco energy mode"));
        assert!(rec.reasoning[1].contains("8 hours"));
    }

    #[test]
    fn test_estimates_stay_in_bounds() {
        let engine = RecommendationEngine::new();
        let inventory = vec![item(FoodCategory::Dairy)];

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let rec = engine.recommend(&inventory, &mut rng);

            assert!((85..=100).contains(&rec.energy_efficiency_pct));
            assert!((90..=100).contains(&rec.food_preservation_pct));

            let amount: u32 = rec
                .estimated_monthly_savings
                .trim_start_matches('$')
                .trim_end_matches("/month")
                .parse()
                .expect("savings should be a whole dollar amount");
            // [10, 30) rounded to zero decimals
            assert!((10..=30).contains(&amount));
        }
    }

    #[test]
    fn test_estimates_reproducible_with_seeded_rng() {
        let engine = RecommendationEngine::new();
        let inventory = vec![item(FoodCategory::Vegetables)];

        let a = engine.recommend(&inventory, &mut StdRng::seed_from_u64(7));
        let b = engine.recommend(&inventory, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
