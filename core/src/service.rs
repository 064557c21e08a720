//! Costing service: pricing operations behind a storage seam.
//!
//! `PriceSource` is the only thing the quoting logic knows about storage,
//! so tests (and alternative front ends) can supply an in-memory source
//! instead of the real database.

use anyhow::Result;
use serde::Serialize;

use crate::db::Database;
use crate::models::{Ingredient, Purchase};
use crate::pricing::{self, current_price, price_line};

/// Read access to the price records the quoting operations need.
pub trait PriceSource {
    fn ingredient(&self, id: i64) -> Result<Ingredient>;
    fn purchases(&self, ingredient_id: i64) -> Result<Vec<Purchase>>;
}

impl PriceSource for Database {
    fn ingredient(&self, id: i64) -> Result<Ingredient> {
        self.get_ingredient_by_id(id)
    }

    fn purchases(&self, ingredient_id: i64) -> Result<Vec<Purchase>> {
        self.list_purchases(Some(ingredient_id))
    }
}

/// A priced quantity of an ingredient, ready for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: String,
    pub base_unit: String,
    pub effective_unit_price: f64,
    pub amount: f64,
    /// Price came from the latest purchase rather than the manual fallback.
    pub from_purchase: bool,
    /// No purchase and no manual price; the amount is a visible zero.
    pub missing_price: bool,
    /// The unit pair had no known conversion; factor 1 was used.
    pub conversion_fallback: bool,
}

/// Effective price per base unit for an ingredient, or `None` when no
/// price data exists at all.
pub fn effective_price_for(source: &dyn PriceSource, ingredient_id: i64) -> Result<Option<f64>> {
    let ingredient = source.ingredient(ingredient_id)?;
    let purchases = source.purchases(ingredient_id)?;
    match current_price(&ingredient, &purchases) {
        Some(cp) => Ok(Some(pricing::effective_unit_price(
            cp.price,
            cp.loss_percentage,
        )?)),
        None => Ok(None),
    }
}

/// Price a quantity of an ingredient in an arbitrary unit, without needing
/// a recipe to exist. This is the ad-hoc "what would this cost" operation.
pub fn quote_line(
    source: &dyn PriceSource,
    ingredient_id: i64,
    quantity: f64,
    unit: &str,
) -> Result<Quote> {
    let ingredient = source.ingredient(ingredient_id)?;
    let purchases = source.purchases(ingredient_id)?;

    let (effective, from_purchase, missing_price) = match current_price(&ingredient, &purchases) {
        Some(cp) => (
            pricing::effective_unit_price(cp.price, cp.loss_percentage)?,
            cp.from_purchase,
            false,
        ),
        None => (0.0, false, true),
    };
    let line = price_line(&ingredient.base_unit, quantity, unit, effective);

    Ok(Quote {
        ingredient_id: ingredient.id,
        ingredient_name: ingredient.name,
        quantity,
        unit: unit.to_string(),
        base_unit: ingredient.base_unit,
        effective_unit_price: effective,
        amount: line.amount,
        from_purchase,
        missing_price,
        conversion_fallback: line.fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct MockSource {
        ingredients: Vec<Ingredient>,
        purchases: Vec<Purchase>,
    }

    impl PriceSource for MockSource {
        fn ingredient(&self, id: i64) -> Result<Ingredient> {
            match self.ingredients.iter().find(|i| i.id == id) {
                Some(i) => Ok(i.clone()),
                None => bail!("Ingredient not found"),
            }
        }

        fn purchases(&self, ingredient_id: i64) -> Result<Vec<Purchase>> {
            Ok(self
                .purchases
                .iter()
                .filter(|p| p.ingredient_id == ingredient_id)
                .cloned()
                .collect())
        }
    }

    fn ingredient(id: i64, base_unit: &str, unit_price: Option<f64>) -> Ingredient {
        Ingredient {
            id,
            uuid: format!("ing-{id}"),
            name: format!("Ingredient {id}"),
            base_unit: base_unit.to_string(),
            unit_price,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn purchase(id: i64, ingredient_id: i64, date: &str, price: f64, loss: f64) -> Purchase {
        Purchase {
            id,
            uuid: format!("pur-{id}"),
            ingredient_id,
            date: date.to_string(),
            price,
            loss_percentage: loss,
            supplier_name: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_effective_price_prefers_latest_purchase() {
        let source = MockSource {
            ingredients: vec![ingredient(1, "kg", Some(99.0))],
            purchases: vec![
                purchase(1, 1, "2024-01-01", 8.0, 0.0),
                purchase(2, 1, "2024-06-01", 12.0, 20.0),
            ],
        };
        // 12 / 0.8 = 15
        let price = effective_price_for(&source, 1).unwrap().unwrap();
        assert!((price - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_effective_price_manual_fallback() {
        let source = MockSource {
            ingredients: vec![ingredient(1, "l", Some(4.5))],
            purchases: vec![],
        };
        let price = effective_price_for(&source, 1).unwrap().unwrap();
        assert!((price - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_effective_price_none_when_no_data() {
        let source = MockSource {
            ingredients: vec![ingredient(1, "kg", None)],
            purchases: vec![],
        };
        assert!(effective_price_for(&source, 1).unwrap().is_none());
    }

    #[test]
    fn test_quote_line_with_conversion() {
        let source = MockSource {
            ingredients: vec![ingredient(1, "kg", None)],
            purchases: vec![purchase(1, 1, "2024-06-01", 10.0, 0.0)],
        };
        // 10/kg, 500 g → 5.00
        let quote = quote_line(&source, 1, 500.0, "g").unwrap();
        assert!((quote.amount - 5.0).abs() < 1e-12);
        assert!(quote.from_purchase);
        assert!(!quote.missing_price);
        assert!(!quote.conversion_fallback);
    }

    #[test]
    fn test_quote_line_missing_price_is_zero() {
        let source = MockSource {
            ingredients: vec![ingredient(1, "kg", None)],
            purchases: vec![],
        };
        let quote = quote_line(&source, 1, 2.0, "kg").unwrap();
        assert!((quote.amount - 0.0).abs() < f64::EPSILON);
        assert!(quote.missing_price);
    }

    #[test]
    fn test_quote_line_flags_fallback_unit() {
        let source = MockSource {
            ingredients: vec![ingredient(1, "kg", Some(10.0))],
            purchases: vec![],
        };
        let quote = quote_line(&source, 1, 2.0, "caixa").unwrap();
        assert!((quote.amount - 20.0).abs() < 1e-12);
        assert!(quote.conversion_fallback);
        assert!(!quote.from_purchase);
    }

    #[test]
    fn test_quote_line_unknown_ingredient_errors() {
        let source = MockSource {
            ingredients: vec![],
            purchases: vec![],
        };
        assert!(quote_line(&source, 42, 1.0, "kg").is_err());
    }

    #[test]
    fn test_quote_line_against_real_database() {
        let db = Database::open_in_memory().unwrap();
        let ing = db
            .insert_ingredient(&crate::models::NewIngredient {
                name: "Ovo".to_string(),
                base_unit: "dz".to_string(),
                unit_price: Some(12.0),
            })
            .unwrap();
        // 12/dz, 6 un → 6.00
        let quote = quote_line(&db, ing.id, 6.0, "un").unwrap();
        assert!((quote.amount - 6.0).abs() < 1e-12);
    }
}
