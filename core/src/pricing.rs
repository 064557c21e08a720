//! The pricing engine: effective unit prices, line-item costing, and
//! total aggregation.
//!
//! Everything here is a pure function of its inputs. Monetary values stay
//! unrounded; formatting to two decimal places happens only at presentation.

use anyhow::{Result, bail};

use crate::models::{CostedItem, Ingredient, Purchase, RecipeItem};
use crate::units::{PriceFactor, price_factor};

/// Price and loss correction that currently apply to an ingredient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentPrice {
    pub price: f64,
    pub loss_percentage: f64,
    /// False when the price came from the ingredient's manual fallback.
    pub from_purchase: bool,
}

/// One priced line item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePrice {
    pub amount: f64,
    /// Implied price per target unit (`amount / quantity`), for display.
    pub target_unit_price: f64,
    /// Quantity expressed in the base unit, when a conversion applied.
    pub base_quantity: Option<f64>,
    /// The unit pair had no known conversion; factor 1 was used.
    pub fallback: bool,
}

impl LinePrice {
    const ZERO: Self = Self {
        amount: 0.0,
        target_unit_price: 0.0,
        base_quantity: None,
        fallback: false,
    };
}

/// The price that currently applies to an ingredient: its most recent
/// purchase (by date, ties broken by the later-recorded row), else the
/// manually set unit price, else nothing.
///
/// Purchases belonging to other ingredients are ignored, so callers may
/// pass an unfiltered slice.
#[must_use]
pub fn current_price(ingredient: &Ingredient, purchases: &[Purchase]) -> Option<CurrentPrice> {
    let latest = purchases
        .iter()
        .filter(|p| p.ingredient_id == ingredient.id)
        .max_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
    if let Some(p) = latest {
        return Some(CurrentPrice {
            price: p.price,
            loss_percentage: p.loss_percentage,
            from_purchase: true,
        });
    }
    ingredient.unit_price.map(|price| CurrentPrice {
        price,
        loss_percentage: 0.0,
        from_purchase: false,
    })
}

/// Purchase price inflated for usable-yield loss:
/// `price / (1 - loss/100)`.
///
/// A loss of 100% (or more) has no finite effective price and is reported
/// as an error rather than propagated as infinity.
pub fn effective_unit_price(price: f64, loss_percentage: f64) -> Result<f64> {
    if !price.is_finite() || price < 0.0 {
        bail!("Purchase price must not be negative (got {price})");
    }
    if !loss_percentage.is_finite() || loss_percentage < 0.0 {
        bail!("Loss percentage must not be negative (got {loss_percentage})");
    }
    if loss_percentage >= 100.0 {
        bail!(
            "Loss percentage must be below 100 (got {loss_percentage}): nothing usable would remain"
        );
    }
    Ok(price / (1.0 - loss_percentage / 100.0))
}

/// Cost of `quantity` of an ingredient measured in `target_unit`, given the
/// effective price per `base_unit`.
///
/// A missing selection is not an error: zero or negative quantity, or a
/// zero/absent price, prices the line at zero so the surrounding form keeps
/// working. An unresolvable unit pair prices with factor 1 and sets
/// `fallback` so the caller can show a warning.
#[must_use]
pub fn price_line(
    base_unit: &str,
    quantity: f64,
    target_unit: &str,
    effective_unit_price: f64,
) -> LinePrice {
    if !quantity.is_finite()
        || quantity <= 0.0
        || !effective_unit_price.is_finite()
        || effective_unit_price <= 0.0
    {
        return LinePrice::ZERO;
    }

    if base_unit.eq_ignore_ascii_case(target_unit) {
        return LinePrice {
            amount: effective_unit_price * quantity,
            target_unit_price: effective_unit_price,
            base_quantity: None,
            fallback: false,
        };
    }

    let PriceFactor { factor, fallback } = price_factor(base_unit, target_unit);
    let target_unit_price = effective_unit_price * factor;
    LinePrice {
        amount: target_unit_price * quantity,
        target_unit_price,
        base_quantity: if fallback {
            None
        } else {
            Some(quantity * factor)
        },
        fallback,
    }
}

/// Sum of line amounts. Always recomputed from the current line items —
/// never maintained incrementally — so totals cannot drift.
#[must_use]
pub fn aggregate(amounts: &[f64]) -> f64 {
    amounts.iter().sum()
}

/// Cost including the finishing surcharge: `total * (1 + finishing/100)`.
#[must_use]
pub fn full_cost(total_cost: f64, finishing_cost_pct: f64) -> f64 {
    total_cost * (1.0 + finishing_cost_pct / 100.0)
}

/// Suggested sale price from cost, finishing surcharge, and a target margin
/// taken on the sale price: `full_cost / (1 - margin/100)`.
///
/// A margin of 100% or more makes the divisor non-positive; it is rejected
/// as an invalid configuration, never computed.
pub fn sale_price(total_cost: f64, finishing_cost_pct: f64, margin_pct: f64) -> Result<f64> {
    if !finishing_cost_pct.is_finite() || finishing_cost_pct < 0.0 {
        bail!("Finishing cost percentage must not be negative (got {finishing_cost_pct})");
    }
    if !margin_pct.is_finite() || margin_pct < 0.0 {
        bail!("Margin percentage must not be negative (got {margin_pct})");
    }
    if margin_pct >= 100.0 {
        bail!("Margin percentage must be below 100 (got {margin_pct}): margin is taken on price");
    }
    Ok(full_cost(total_cost, finishing_cost_pct) / (1.0 - margin_pct / 100.0))
}

/// Cost a recipe line from its ingredient's current records.
///
/// An ingredient with no purchases and no manual price resolves to an
/// effective price of zero with `missing_price` set — a visible state a
/// human can correct, never a silent nonzero number.
pub fn cost_item(
    ingredient: &Ingredient,
    purchases: &[Purchase],
    item: &RecipeItem,
) -> Result<CostedItem> {
    let (effective, missing_price) = match current_price(ingredient, purchases) {
        Some(cp) => (effective_unit_price(cp.price, cp.loss_percentage)?, false),
        None => (0.0, true),
    };
    let line = price_line(&ingredient.base_unit, item.quantity, &item.unit, effective);
    Ok(CostedItem {
        item_id: item.id,
        ingredient_id: ingredient.id,
        ingredient_name: ingredient.name.clone(),
        quantity: item.quantity,
        unit: item.unit.clone(),
        base_unit: ingredient.base_unit.clone(),
        effective_unit_price: effective,
        amount: line.amount,
        target_unit_price: line.target_unit_price,
        base_quantity: line.base_quantity,
        missing_price,
        conversion_fallback: line.fallback,
    })
}
