use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use ficha_core::db::Database;
use ficha_core::models::DishCost;

use super::helpers::{format_currency, json_error, truncate};
use super::{resolve_dish, resolve_recipe};

pub(crate) fn cmd_dish_create(
    db: &Database,
    name: &str,
    finishing: f64,
    margin: f64,
    json: bool,
) -> Result<()> {
    let dish = db.create_dish(name, finishing, margin)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&dish)?);
    } else {
        let finishing = dish.finishing_cost_pct;
        let margin = dish.margin_pct;
        println!("Created dish: {name} (finishing {finishing}%, margin {margin}%)");
        println!("Add recipes with: ficha dish add-recipe \"{name}\" <recipe>");
    }
    Ok(())
}

pub(crate) fn cmd_dish_add_recipe(
    db: &Database,
    dish_name: &str,
    recipe_name: &str,
    portions: f64,
    json: bool,
) -> Result<()> {
    let dish = resolve_dish(db, dish_name, json)?;
    let recipe = resolve_recipe(db, recipe_name, json)?;
    let component = db.add_dish_component(dish.id, recipe.id, portions)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&component)?);
    } else {
        println!("Added {portions}x {recipe_name} to {dish_name}");
    }
    Ok(())
}

pub(crate) fn cmd_dish_remove_recipe(
    db: &Database,
    dish_name: &str,
    recipe_name: &str,
    json: bool,
) -> Result<()> {
    let dish = resolve_dish(db, dish_name, json)?;
    if db.remove_dish_component(dish.id, recipe_name)? {
        if json {
            println!("{}", serde_json::json!({ "removed": recipe_name }));
        } else {
            println!("Removed {recipe_name} from {dish_name}");
        }
        Ok(())
    } else {
        if json {
            println!(
                "{}",
                json_error(&format!("Recipe '{recipe_name}' not part of dish"))
            );
        } else {
            eprintln!("Recipe '{recipe_name}' not part of dish");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_dish_set_pricing(
    db: &Database,
    dish_name: &str,
    finishing: Option<f64>,
    margin: Option<f64>,
    json: bool,
) -> Result<()> {
    let dish = resolve_dish(db, dish_name, json)?;
    let updated = db.set_dish_pricing(dish.id, finishing, margin)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        let name = &updated.name;
        let finishing = updated.finishing_cost_pct;
        let margin = updated.margin_pct;
        println!("Updated {name}: finishing {finishing}%, margin {margin}%");
    }
    Ok(())
}

fn print_dish_cost(cost: &DishCost) {
    #[derive(Tabled)]
    struct ComponentRow {
        #[tabled(rename = "Recipe")]
        recipe: String,
        #[tabled(rename = "Portions")]
        portions: String,
        #[tabled(rename = "Recipe cost")]
        recipe_cost: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let name = &cost.name;
    println!("=== {name} ===\n");

    let rows: Vec<ComponentRow> = cost
        .components
        .iter()
        .map(|c| ComponentRow {
            recipe: truncate(&c.recipe_name, 30),
            portions: format!("{}", c.portions),
            recipe_cost: format_currency(c.recipe_total),
            amount: format_currency(c.amount),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let total = format_currency(cost.total_cost);
    let full = format_currency(cost.full_cost);
    let finishing = cost.finishing_cost_pct;
    println!("\n  Ingredient cost: {total}");
    println!("  Full cost (+{finishing}% finishing): {full}");
    match (&cost.suggested_price, &cost.price_error) {
        (Some(price), _) => {
            let price = format_currency(*price);
            let margin = cost.margin_pct;
            println!("  Suggested price ({margin}% margin): {price}");
        }
        (None, Some(error)) => eprintln!("  No suggested price: {error}"),
        (None, None) => {}
    }
}

pub(crate) fn cmd_dish_show(db: &Database, dish_name: &str, json: bool) -> Result<()> {
    let dish = resolve_dish(db, dish_name, json)?;
    let cost = db.dish_cost(dish.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cost)?);
        return Ok(());
    }
    print_dish_cost(&cost);
    Ok(())
}

pub(crate) fn cmd_dish_list(db: &Database, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct DishRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Full cost")]
        full_cost: String,
        #[tabled(rename = "Margin %")]
        margin: String,
        #[tabled(rename = "Suggested price")]
        price: String,
    }

    let dishes = db.list_dishes()?;
    if dishes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No dishes found");
        }
        process::exit(2);
    }

    let mut costs = Vec::with_capacity(dishes.len());
    for dish in &dishes {
        costs.push(db.dish_cost(dish.id)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&costs)?);
        return Ok(());
    }

    let rows: Vec<DishRow> = costs
        .iter()
        .map(|cost| DishRow {
            id: cost.id,
            name: truncate(&cost.name, 30),
            full_cost: format_currency(cost.full_cost),
            margin: format!("{}", cost.margin_pct),
            price: cost
                .suggested_price
                .map_or("-".to_string(), format_currency),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_dish_delete(db: &Database, dish_name: &str, json: bool) -> Result<()> {
    let dish = resolve_dish(db, dish_name, json)?;
    db.delete_dish(dish.id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": dish.name }));
    } else {
        println!("Deleted dish: {}", dish.name);
    }
    Ok(())
}
