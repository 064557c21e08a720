use anyhow::Result;

use ficha_core::db::Database;
use ficha_core::service::quote_line;

use super::helpers::{format_currency, parse_quantity};
use super::resolve_ingredient;

/// Ad-hoc "what would this cost" — prices a quantity of an ingredient
/// without touching any recipe.
pub(crate) fn cmd_quote(
    db: &Database,
    ingredient_name: &str,
    quantity_str: &str,
    json: bool,
) -> Result<()> {
    let ingredient = resolve_ingredient(db, ingredient_name, json)?;
    let (quantity, unit) = parse_quantity(quantity_str)?;
    let unit = unit.unwrap_or_else(|| ingredient.base_unit.clone());

    let quote = quote_line(db, ingredient.id, quantity, &unit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
        return Ok(());
    }

    let name = &quote.ingredient_name;
    let amount = format_currency(quote.amount);
    println!("{quantity} {unit} of {name}: {amount}");

    if quote.missing_price {
        eprintln!("Warning: no purchase or manual price recorded; the amount is zero");
    } else {
        let unit_price = format_currency(quote.effective_unit_price);
        let base_unit = &quote.base_unit;
        let source = if quote.from_purchase {
            "latest purchase"
        } else {
            "manual price"
        };
        println!("Based on {unit_price}/{base_unit} ({source})");
    }
    if quote.conversion_fallback {
        let base_unit = &quote.base_unit;
        eprintln!("Warning: no conversion from {base_unit} to {unit}; priced 1:1");
    }
    Ok(())
}
