use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::units::{UNIT_CODES, Unit};

/// A purchasable raw material. `unit_price` is a manual fallback price per
/// base unit, used only when no purchase has been recorded yet.
///
/// Serialized field names (camelCase) are the stored-record contract shared
/// with earlier deployments of the tool; backups must round-trip them exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    pub base_unit: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unit_price: Option<f64>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// One recorded acquisition of an ingredient. Immutable once recorded;
/// `price` is per base unit of the ingredient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub ingredient_id: i64,
    pub date: String,
    pub price: f64,
    pub loss_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub supplier_name: Option<String>,
    pub created_at: String,
}

/// A ficha técnica: a named set of line items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// A quantity of one ingredient, in a chosen unit, inside a recipe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeItem {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub recipe_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: String,
    // Joined field for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient_name: Option<String>,
}

/// A sellable item: one or more recipes plus finishing cost and margin.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    pub finishing_cost_pct: f64,
    pub margin_pct: f64,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// A recipe included in a dish, scaled by a portion multiplier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DishComponent {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub dish_id: i64,
    pub recipe_id: i64,
    pub portions: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub base_unit: String,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub ingredient_id: i64,
    pub date: NaiveDate,
    pub price: f64,
    pub loss_percentage: f64,
    pub supplier_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRecipeItem {
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: String,
}

// --- Derived cost views (never stored; recomputed from current records) ---

/// One costed line inside a recipe. The amount is a pure function of the
/// ingredient's effective unit price, the quantity, and the unit pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostedItem {
    pub item_id: i64,
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: String,
    pub base_unit: String,
    /// Effective price per base unit (purchase price corrected for loss),
    /// zero when no price data exists.
    pub effective_unit_price: f64,
    pub amount: f64,
    /// Implied price per target unit (`amount / quantity`), for display.
    pub target_unit_price: f64,
    /// Quantity expressed in the base unit, when a conversion applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_quantity: Option<f64>,
    /// No purchase and no manual price: the line costs zero and needs fixing.
    pub missing_price: bool,
    /// The unit pair had no known conversion; factor 1 was used.
    pub conversion_fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeCost {
    pub id: i64,
    pub name: String,
    pub items: Vec<CostedItem>,
    pub total: f64,
}

/// A dish component's recipe cost scaled by its portion multiplier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCost {
    pub recipe_id: i64,
    pub recipe_name: String,
    pub portions: f64,
    pub recipe_total: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DishCost {
    pub id: i64,
    pub name: String,
    pub finishing_cost_pct: f64,
    pub margin_pct: f64,
    pub components: Vec<ComponentCost>,
    pub total_cost: f64,
    pub full_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_price: Option<f64>,
    /// Set instead of `suggested_price` when the margin configuration is
    /// invalid (margin ≥ 100%), so listings still render.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_error: Option<String>,
}

// --- Export / Import types (JSON backup) ---

/// Purchase with the ingredient's uuid attached, so backups can be merged
/// into a database with different rowids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPurchase {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub ingredient_id: i64,
    #[serde(default)]
    pub ingredient_uuid: String,
    pub date: String,
    pub price: f64,
    pub loss_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub supplier_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecipe {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecipeItem {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub recipe_id: i64,
    #[serde(default)]
    pub recipe_uuid: String,
    pub ingredient_id: i64,
    #[serde(default)]
    pub ingredient_uuid: String,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDish {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    pub finishing_cost_pct: f64,
    pub margin_pct: f64,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDishComponent {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub dish_id: i64,
    #[serde(default)]
    pub dish_uuid: String,
    pub recipe_id: i64,
    #[serde(default)]
    pub recipe_uuid: String,
    pub portions: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: i64,
    pub exported_at: String,
    pub ingredients: Vec<Ingredient>,
    pub purchases: Vec<ExportPurchase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipes: Vec<ExportRecipe>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipe_items: Vec<ExportRecipeItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dishes: Vec<ExportDish>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dish_components: Vec<ExportDishComponent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct ImportSummary {
    pub ingredients_imported: i64,
    pub purchases_imported: i64,
    pub recipes_imported: i64,
    pub recipe_items_imported: i64,
    pub dishes_imported: i64,
    pub dish_components_imported: i64,
}

// --- Validation ---

/// Validate a unit string and return its canonical code.
pub fn validate_unit(unit: &str) -> Result<String> {
    match Unit::parse(unit) {
        Some(u) => Ok(u.code().to_string()),
        None => bail!(
            "Unknown unit '{unit}'. Must be one of: {}",
            UNIT_CODES.join(", ")
        ),
    }
}

/// Loss percentage must be at least 0 and strictly below 100 — at 100% the
/// usable yield is zero and the effective price has no finite value.
pub fn validate_loss_percentage(loss: f64) -> Result<()> {
    if !loss.is_finite() || loss < 0.0 {
        bail!("Loss percentage must not be negative (got {loss})");
    }
    if loss >= 100.0 {
        bail!("Loss percentage must be below 100 (got {loss}): nothing usable would remain");
    }
    Ok(())
}

pub fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        bail!("Price must be greater than 0 (got {price})");
    }
    Ok(())
}

pub fn validate_quantity(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        bail!("Quantity must be greater than 0 (got {quantity})");
    }
    Ok(())
}

pub fn validate_finishing_cost(pct: f64) -> Result<()> {
    if !pct.is_finite() || pct < 0.0 {
        bail!("Finishing cost percentage must not be negative (got {pct})");
    }
    Ok(())
}

/// Margin is taken on price, not on cost: 100% or more leaves no finite
/// sale price, so it is rejected at write time.
pub fn validate_margin(pct: f64) -> Result<()> {
    if !pct.is_finite() || pct < 0.0 {
        bail!("Margin percentage must not be negative (got {pct})");
    }
    if pct >= 100.0 {
        bail!("Margin percentage must be below 100 (got {pct}): margin is taken on price");
    }
    Ok(())
}

/// Validate an ingredient from a backup: name, unit, optional manual price.
pub fn validate_export_ingredient(ingredient: &Ingredient) -> Result<()> {
    if ingredient.name.trim().is_empty() {
        bail!("Ingredient name must not be empty");
    }
    validate_unit(&ingredient.base_unit)?;
    if let Some(price) = ingredient.unit_price {
        validate_price(price)?;
    }
    Ok(())
}

/// Validate a purchase from a backup: price, loss, date format.
pub fn validate_export_purchase(purchase: &ExportPurchase) -> Result<()> {
    validate_price(purchase.price)?;
    validate_loss_percentage(purchase.loss_percentage)?;
    NaiveDate::parse_from_str(&purchase.date, "%Y-%m-%d").map_err(|_| {
        anyhow::anyhow!(
            "Invalid purchase date '{}'. Must be YYYY-MM-DD",
            purchase.date
        )
    })?;
    Ok(())
}

pub fn validate_export_recipe_item(item: &ExportRecipeItem) -> Result<()> {
    validate_quantity(item.quantity)?;
    validate_unit(&item.unit)?;
    Ok(())
}

pub fn validate_export_dish(dish: &ExportDish) -> Result<()> {
    if dish.name.trim().is_empty() {
        bail!("Dish name must not be empty");
    }
    validate_finishing_cost(dish.finishing_cost_pct)?;
    validate_margin(dish.margin_pct)?;
    Ok(())
}
