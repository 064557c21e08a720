use anyhow::{Context, Result};
use std::path::Path;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use ficha_core::csv_io::{import_purchases, parse_purchase_csv};
use ficha_core::db::Database;
use ficha_core::models::NewPurchase;

use super::helpers::{format_currency, parse_date, truncate};
use super::resolve_ingredient;

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_purchase_log(
    db: &Database,
    ingredient_name: &str,
    price: f64,
    loss: f64,
    supplier: Option<String>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let ingredient = resolve_ingredient(db, ingredient_name, json)?;
    let date = parse_date(date)?;

    let purchase = db.insert_purchase(&NewPurchase {
        ingredient_id: ingredient.id,
        date,
        price,
        loss_percentage: loss,
        supplier_name: supplier,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&purchase)?);
        return Ok(());
    }

    let name = &ingredient.name;
    let unit = &ingredient.base_unit;
    let paid = format_currency(purchase.price);
    println!("Logged purchase: {name} — {paid}/{unit} on {}", purchase.date);
    if purchase.loss_percentage > 0.0 {
        let effective = db
            .effective_unit_price(ingredient.id)?
            .context("Purchase was just logged")?;
        let effective = format_currency(effective);
        let loss = purchase.loss_percentage;
        println!("Effective price after {loss}% loss: {effective}/{unit}");
    }
    Ok(())
}

pub(crate) fn cmd_purchase_list(
    db: &Database,
    ingredient_name: Option<&str>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct PurchaseRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Ingredient")]
        ingredient: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Loss %")]
        loss: String,
        #[tabled(rename = "Supplier")]
        supplier: String,
    }

    let ingredient = match ingredient_name {
        Some(name) => Some(resolve_ingredient(db, name, json)?),
        None => None,
    };
    let purchases = db.list_purchases(ingredient.as_ref().map(|i| i.id))?;

    if purchases.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No purchases found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&purchases)?);
        return Ok(());
    }

    let mut rows = Vec::with_capacity(purchases.len());
    for purchase in &purchases {
        let ingredient = db.get_ingredient_by_id(purchase.ingredient_id)?;
        rows.push(PurchaseRow {
            id: purchase.id,
            date: purchase.date.clone(),
            ingredient: truncate(&ingredient.name, 30),
            price: format!("{}/{}", format_currency(purchase.price), ingredient.base_unit),
            loss: if purchase.loss_percentage > 0.0 {
                format!("{}", purchase.loss_percentage)
            } else {
                "-".to_string()
            },
            supplier: purchase
                .supplier_name
                .as_deref()
                .map(|s| truncate(s, 25))
                .unwrap_or_default(),
        });
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_purchase_delete(db: &Database, id: i64, json: bool) -> Result<()> {
    if db.delete_purchase(id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted purchase {id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", super::helpers::json_error(&format!("Purchase {id} not found")));
        } else {
            eprintln!("Purchase {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_purchase_import(
    db: &Database,
    file: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let reader = std::fs::File::open(file)
        .with_context(|| format!("Failed to open file: {}", file.display()))?;
    let rows = parse_purchase_csv(reader)?;
    let summary = import_purchases(db, &rows, dry_run)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dryRun": dry_run,
                "rowsParsed": summary.rows_parsed,
                "ingredientsCreated": summary.ingredients_created,
                "ingredientsReused": summary.ingredients_reused,
                "purchasesLogged": summary.purchases_logged,
            })
        );
        return Ok(());
    }

    if dry_run {
        println!("Dry run — nothing was written");
    }
    let parsed = summary.rows_parsed;
    let created = summary.ingredients_created;
    let reused = summary.ingredients_reused;
    let logged = summary.purchases_logged;
    println!("Parsed {parsed} row(s)");
    println!("Ingredients: {created} created, {reused} reused");
    println!("Purchases logged: {logged}");
    if let Some((from, to)) = summary.dates_spanned {
        println!("Dates: {from} to {to}");
    }
    Ok(())
}
