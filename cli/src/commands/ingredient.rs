use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use ficha_core::db::Database;
use ficha_core::models::NewIngredient;

use super::helpers::{format_currency, json_error, truncate};
use super::resolve_ingredient;

pub(crate) fn cmd_ingredient_add(
    db: &Database,
    name: &str,
    unit: &str,
    price: Option<f64>,
    json: bool,
) -> Result<()> {
    let ingredient = db.insert_ingredient(&NewIngredient {
        name: name.to_string(),
        base_unit: unit.to_string(),
        unit_price: price,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let name = &ingredient.name;
        let unit = &ingredient.base_unit;
        match ingredient.unit_price {
            Some(p) => {
                let p = format_currency(p);
                println!("Added ingredient: {name} ({p}/{unit})");
            }
            None => {
                println!("Added ingredient: {name} (per {unit}, no price yet)");
                println!("Record a purchase with: ficha purchase log \"{name}\" <price>");
            }
        }
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(db: &Database, search: Option<&str>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Unit")]
        unit: String,
        #[tabled(rename = "Current price")]
        price: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    let ingredients = db.list_ingredients(search)?;
    if ingredients.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No ingredients found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredients)?);
        return Ok(());
    }

    let mut rows = Vec::with_capacity(ingredients.len());
    for ingredient in &ingredients {
        let latest = db.latest_purchase(ingredient.id)?;
        let (price, source) = match db.effective_unit_price(ingredient.id)? {
            Some(p) => {
                let label = if latest.is_some() { "purchase" } else { "manual" };
                (
                    format!("{}/{}", format_currency(p), ingredient.base_unit),
                    label.to_string(),
                )
            }
            None => ("-".to_string(), "-".to_string()),
        };
        rows.push(IngredientRow {
            id: ingredient.id,
            name: truncate(&ingredient.name, 35),
            unit: ingredient.base_unit.clone(),
            price,
            source,
        });
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_ingredient_set_price(
    db: &Database,
    name: &str,
    price: Option<f64>,
    clear: bool,
    json: bool,
) -> Result<()> {
    let ingredient = resolve_ingredient(db, name, json)?;
    let new_price = if clear { None } else { price };
    let updated = db.set_ingredient_price(ingredient.id, new_price)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        let name = &updated.name;
        match updated.unit_price {
            Some(p) => {
                let p = format_currency(p);
                let unit = &updated.base_unit;
                println!("Set manual price for {name}: {p}/{unit}");
            }
            None => println!("Cleared manual price for {name}"),
        }
        if db.latest_purchase(updated.id)?.is_some() {
            eprintln!("Note: recorded purchases take precedence over the manual price");
        }
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_delete(db: &Database, name: &str, json: bool) -> Result<()> {
    let ingredient = resolve_ingredient(db, name, json)?;
    match db.delete_ingredient(ingredient.id) {
        Ok(()) => {
            if json {
                println!("{}", serde_json::json!({ "deleted": ingredient.name }));
            } else {
                println!("Deleted ingredient: {}", ingredient.name);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                println!("{}", json_error(&format!("{e:#}")));
                process::exit(1);
            }
            Err(e)
        }
    }
}
