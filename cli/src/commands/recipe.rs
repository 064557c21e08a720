use anyhow::{Context, Result};
use std::path::Path;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use ficha_core::csv_io::write_recipe_csv;
use ficha_core::db::Database;
use ficha_core::models::{NewRecipeItem, RecipeCost};

use super::helpers::{format_currency, json_error, parse_quantity, truncate};
use super::{resolve_ingredient, resolve_recipe};

pub(crate) fn cmd_recipe_create(db: &Database, name: &str, json: bool) -> Result<()> {
    let recipe = db.create_recipe(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let id = recipe.id;
        println!("Created recipe: {name} (id: {id})");
        println!("Add items with: ficha recipe add-item \"{name}\" <ingredient> <quantity>");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_add_item(
    db: &Database,
    recipe_name: &str,
    ingredient_name: &str,
    quantity_str: &str,
    json: bool,
) -> Result<()> {
    let recipe = resolve_recipe(db, recipe_name, json)?;
    let ingredient = resolve_ingredient(db, ingredient_name, json)?;
    let (quantity, unit) = parse_quantity(quantity_str)?;
    let unit = unit.unwrap_or_else(|| ingredient.base_unit.clone());

    let item = db.add_recipe_item(
        recipe.id,
        &NewRecipeItem {
            ingredient_id: ingredient.id,
            quantity,
            unit,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let name = &ingredient.name;
        let unit = &item.unit;
        println!("Added {quantity} {unit} of {name} to {recipe_name}");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_remove_item(
    db: &Database,
    recipe_name: &str,
    ingredient_name: &str,
    json: bool,
) -> Result<()> {
    let recipe = resolve_recipe(db, recipe_name, json)?;
    if db.remove_recipe_item(recipe.id, ingredient_name)? {
        if json {
            println!("{}", serde_json::json!({ "removed": ingredient_name }));
        } else {
            println!("Removed {ingredient_name} from {recipe_name}");
        }
        Ok(())
    } else {
        if json {
            println!(
                "{}",
                json_error(&format!("Ingredient '{ingredient_name}' not found in recipe"))
            );
        } else {
            eprintln!("Ingredient '{ingredient_name}' not found in recipe");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_recipe_set_quantity(
    db: &Database,
    recipe_name: &str,
    ingredient_name: &str,
    quantity: f64,
    json: bool,
) -> Result<()> {
    let recipe = resolve_recipe(db, recipe_name, json)?;
    let items = db.get_recipe_items(recipe.id)?;
    let Some(item) = items.iter().find(|item| {
        item.ingredient_name
            .as_deref()
            .is_some_and(|name| name.eq_ignore_ascii_case(ingredient_name.trim()))
    }) else {
        if json {
            println!(
                "{}",
                json_error(&format!("Ingredient '{ingredient_name}' not found in recipe"))
            );
        } else {
            eprintln!("Ingredient '{ingredient_name}' not found in recipe");
        }
        process::exit(2);
    };

    let updated = db.set_recipe_item_quantity(item.id, quantity)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        let unit = &updated.unit;
        println!("Updated {ingredient_name} in {recipe_name}: {quantity} {unit}");
    }
    Ok(())
}

fn print_recipe_cost(cost: &RecipeCost) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "Ingredient")]
        ingredient: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Unit price")]
        unit_price: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let name = &cost.name;
    println!("=== {name} ===\n");

    let rows: Vec<ItemRow> = cost
        .items
        .iter()
        .map(|item| ItemRow {
            ingredient: truncate(&item.ingredient_name, 30),
            quantity: format!("{} {}", item.quantity, item.unit),
            unit_price: if item.missing_price {
                "-".to_string()
            } else {
                format!("{}/{}", format_currency(item.target_unit_price), item.unit)
            },
            amount: format_currency(item.amount),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let total = format_currency(cost.total);
    println!("\n  Total: {total}");

    for item in &cost.items {
        let name = &item.ingredient_name;
        if item.missing_price {
            eprintln!("Warning: {name} has no price recorded; its line costs zero");
        }
        if item.conversion_fallback {
            let base = &item.base_unit;
            let unit = &item.unit;
            eprintln!("Warning: {name}: no conversion from {base} to {unit}; priced 1:1");
        }
    }
}

pub(crate) fn cmd_recipe_show(db: &Database, recipe_name: &str, json: bool) -> Result<()> {
    let recipe = resolve_recipe(db, recipe_name, json)?;
    let cost = db.recipe_cost(recipe.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cost)?);
        return Ok(());
    }
    print_recipe_cost(&cost);
    Ok(())
}

pub(crate) fn cmd_recipe_list(db: &Database, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Items")]
        items: usize,
        #[tabled(rename = "Total cost")]
        total: String,
    }

    let recipes = db.list_recipes()?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        process::exit(2);
    }

    let mut costs = Vec::with_capacity(recipes.len());
    for recipe in &recipes {
        costs.push(db.recipe_cost(recipe.id)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&costs)?);
        return Ok(());
    }

    let rows: Vec<RecipeRow> = costs
        .iter()
        .map(|cost| RecipeRow {
            id: cost.id,
            name: truncate(&cost.name, 30),
            items: cost.items.len(),
            total: format_currency(cost.total),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_recipe_delete(db: &Database, recipe_name: &str, json: bool) -> Result<()> {
    let recipe = resolve_recipe(db, recipe_name, json)?;
    match db.delete_recipe(recipe.id) {
        Ok(()) => {
            if json {
                println!("{}", serde_json::json!({ "deleted": recipe.name }));
            } else {
                println!("Deleted recipe: {}", recipe.name);
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

pub(crate) fn cmd_recipe_export(
    db: &Database,
    recipe_name: &str,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let recipe = resolve_recipe(db, recipe_name, json)?;
    let cost = db.recipe_cost(recipe.id)?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.display()))?;
            write_recipe_csv(file, &cost)?;
            if json {
                println!("{}", serde_json::json!({ "exported": cost.name, "file": path }));
            } else {
                println!("Exported {} to {}", cost.name, path.display());
            }
        }
        None => write_recipe_csv(std::io::stdout().lock(), &cost)?,
    }
    Ok(())
}
