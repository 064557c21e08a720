//! CSV import of purchase histories and CSV export of costed recipes.
//!
//! The import reader is forgiving about formatting (flexible row lengths,
//! trimmed whitespace, case-insensitive headers, two date formats) but
//! strict about values: a row with a bad price, loss, or date fails the
//! whole import with its row number, rather than silently skipping.

use std::collections::HashMap;
use std::io::{Read, Write};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use crate::db::Database;
use crate::models::{
    NewIngredient, NewPurchase, RecipeCost, validate_loss_percentage, validate_price,
    validate_unit,
};

/// One parsed purchase row, not yet tied to a database ingredient.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRow {
    pub date: NaiveDate,
    pub ingredient: String,
    pub price: f64,
    pub loss_percentage: f64,
    pub supplier: Option<String>,
    /// Base unit for the ingredient if it has to be created. Defaults to
    /// "kg" when the file has no Unit column.
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchaseImportSummary {
    pub rows_parsed: usize,
    pub ingredients_created: usize,
    pub ingredients_reused: usize,
    pub purchases_logged: usize,
    /// Earliest and latest purchase dates in the file.
    pub dates_spanned: Option<(NaiveDate, NaiveDate)>,
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .map_err(|_| anyhow::anyhow!("Invalid date '{s}'. Must be YYYY-MM-DD or DD/MM/YYYY"))
}

fn parse_number(s: &str) -> Result<f64> {
    // Accept a decimal comma ("4,50") alongside the dot
    let normalized = s.trim().replace(',', ".");
    normalized
        .parse::<f64>()
        .map_err(|_| anyhow::anyhow!("Invalid number '{s}'"))
}

/// Parse a purchase-history CSV.
///
/// Expected headers (case-insensitive): `Date`, `Ingredient`, `Price`, and
/// optionally `Loss %`, `Supplier`, `Unit`. Extra columns are ignored.
pub fn parse_purchase_csv<R: Read>(reader: R) -> Result<Vec<PurchaseRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers().context("Failed to read CSV headers")?;
    let date_col = find_column(headers, "Date")
        .context("CSV is missing the required 'Date' column")?;
    let ingredient_col = find_column(headers, "Ingredient")
        .context("CSV is missing the required 'Ingredient' column")?;
    let price_col = find_column(headers, "Price")
        .context("CSV is missing the required 'Price' column")?;
    let loss_col = find_column(headers, "Loss %");
    let supplier_col = find_column(headers, "Supplier");
    let unit_col = find_column(headers, "Unit");

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let row_number = index + 2; // 1-based, after the header row
        let record = record.with_context(|| format!("Failed to read CSV row {row_number}"))?;

        let field = |col: usize| record.get(col).unwrap_or("").trim();

        let ingredient = field(ingredient_col).to_string();
        if ingredient.is_empty() {
            bail!("Row {row_number}: ingredient name is empty");
        }
        let date = parse_date(field(date_col)).with_context(|| format!("Row {row_number}"))?;
        let price =
            parse_number(field(price_col)).with_context(|| format!("Row {row_number}"))?;
        validate_price(price).with_context(|| format!("Row {row_number}"))?;

        let loss_percentage = match loss_col.map(field) {
            Some(s) if !s.is_empty() => {
                let loss = parse_number(s).with_context(|| format!("Row {row_number}"))?;
                validate_loss_percentage(loss).with_context(|| format!("Row {row_number}"))?;
                loss
            }
            _ => 0.0,
        };
        let supplier = supplier_col
            .map(field)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        let unit = match unit_col.map(field) {
            Some(s) if !s.is_empty() => {
                validate_unit(s).with_context(|| format!("Row {row_number}"))?
            }
            _ => "kg".to_string(),
        };

        rows.push(PurchaseRow {
            date,
            ingredient,
            price,
            loss_percentage,
            supplier,
            unit,
        });
    }

    Ok(rows)
}

/// Log parsed purchase rows into the database, creating ingredients that
/// don't exist yet (matched by name, case-insensitively).
///
/// With `dry_run` set, nothing is written; the summary reports what an
/// actual import would do.
pub fn import_purchases(
    db: &Database,
    rows: &[PurchaseRow],
    dry_run: bool,
) -> Result<PurchaseImportSummary> {
    let mut summary = PurchaseImportSummary {
        rows_parsed: rows.len(),
        ..Default::default()
    };

    // name (lowercased) → ingredient id; avoids re-querying and makes
    // dry runs consistent for files that mention an ingredient twice
    let mut ingredient_cache: HashMap<String, Option<i64>> = HashMap::new();

    for row in rows {
        let key = row.ingredient.to_lowercase();
        let cached = ingredient_cache.get(&key).copied();
        let ingredient_id = match cached {
            Some(id) => {
                summary.ingredients_reused += 1;
                id
            }
            None => match db.get_ingredient_by_name(&row.ingredient)? {
                Some(existing) => {
                    summary.ingredients_reused += 1;
                    ingredient_cache.insert(key, Some(existing.id));
                    Some(existing.id)
                }
                None => {
                    summary.ingredients_created += 1;
                    let id = if dry_run {
                        None
                    } else {
                        let created = db.insert_ingredient(&NewIngredient {
                            name: row.ingredient.clone(),
                            base_unit: row.unit.clone(),
                            unit_price: None,
                        })?;
                        Some(created.id)
                    };
                    ingredient_cache.insert(key, id);
                    id
                }
            },
        };

        if !dry_run {
            let ingredient_id =
                ingredient_id.context("Ingredient id missing outside of a dry run")?;
            db.insert_purchase(&NewPurchase {
                ingredient_id,
                date: row.date,
                price: row.price,
                loss_percentage: row.loss_percentage,
                supplier_name: row.supplier.clone(),
            })?;
        }
        summary.purchases_logged += 1;

        summary.dates_spanned = Some(match summary.dates_spanned {
            Some((min, max)) => (min.min(row.date), max.max(row.date)),
            None => (row.date, row.date),
        });
    }

    Ok(summary)
}

/// Write a costed recipe as CSV, one line item per row plus a total row.
/// Amounts are formatted to two decimal places; this is a report, not a
/// backup format.
pub fn write_recipe_csv<W: Write>(writer: W, cost: &RecipeCost) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "Ingredient",
        "Quantity",
        "Unit",
        "Unit Price",
        "Amount",
        "Notes",
    ])?;

    for item in &cost.items {
        let notes = if item.missing_price {
            "no price recorded"
        } else if item.conversion_fallback {
            "no unit conversion"
        } else {
            ""
        };
        csv_writer.write_record([
            item.ingredient_name.as_str(),
            &format!("{}", item.quantity),
            item.unit.as_str(),
            &format!("{:.2}", item.target_unit_price),
            &format!("{:.2}", item.amount),
            notes,
        ])?;
    }
    csv_writer.write_record([
        "Total",
        "",
        "",
        "",
        &format!("{:.2}", cost.total),
        "",
    ])?;
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
Date,Ingredient,Price,Loss %,Supplier,Unit
2024-06-01,Tomate,8.50,20,Hortifruti,kg
02/06/2024,Tomate,9.00,20,,kg
2024-06-03,Leite,\"4,50\",,Laticínio Boa Vista,l
";

    #[test]
    fn test_parse_sample() {
        let rows = parse_purchase_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].ingredient, "Tomate");
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!((rows[0].price - 8.5).abs() < f64::EPSILON);
        assert!((rows[0].loss_percentage - 20.0).abs() < f64::EPSILON);
        assert_eq!(rows[0].supplier.as_deref(), Some("Hortifruti"));
        assert_eq!(rows[0].unit, "kg");

        // Brazilian date format and empty supplier
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert!(rows[1].supplier.is_none());

        // Decimal comma, missing loss defaults to 0
        assert!((rows[2].price - 4.5).abs() < f64::EPSILON);
        assert!((rows[2].loss_percentage - 0.0).abs() < f64::EPSILON);
        assert_eq!(rows[2].unit, "l");
    }

    #[test]
    fn test_parse_headers_case_insensitive() {
        let csv = "date,INGREDIENT,price\n2024-06-01,Sal,2.00\n";
        let rows = parse_purchase_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ingredient, "Sal");
        assert_eq!(rows[0].unit, "kg"); // no Unit column
    }

    #[test]
    fn test_missing_unit_column_defaults_to_kg() {
        let csv = "Date,Ingredient,Price\n2024-06-01,Farinha,4.00\n";
        let rows = parse_purchase_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].unit, "kg");

        let db = Database::open_in_memory().unwrap();
        import_purchases(&db, &rows, false).unwrap();
        let created = db.get_ingredient_by_name("Farinha").unwrap().unwrap();
        assert_eq!(created.base_unit, "kg");
    }

    #[test]
    fn test_parse_missing_required_column() {
        let csv = "Date,Price\n2024-06-01,2.00\n";
        let err = parse_purchase_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Ingredient"));
    }

    #[test]
    fn test_parse_bad_value_reports_row() {
        let csv = "Date,Ingredient,Price\n2024-06-01,Sal,2.00\nnot-a-date,Sal,2.00\n";
        let err = parse_purchase_csv(csv.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("Row 3"));
    }

    #[test]
    fn test_parse_rejects_total_loss() {
        let csv = "Date,Ingredient,Price,Loss %\n2024-06-01,Tomate,8.00,100\n";
        assert!(parse_purchase_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_import_creates_and_reuses_ingredients() {
        let db = Database::open_in_memory().unwrap();
        let rows = parse_purchase_csv(SAMPLE_CSV.as_bytes()).unwrap();
        let summary = import_purchases(&db, &rows, false).unwrap();

        assert_eq!(summary.rows_parsed, 3);
        assert_eq!(summary.ingredients_created, 2); // Tomate, Leite
        assert_eq!(summary.ingredients_reused, 1); // second Tomate row
        assert_eq!(summary.purchases_logged, 3);
        assert_eq!(
            summary.dates_spanned,
            Some((
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
            ))
        );

        let tomate = db.get_ingredient_by_name("Tomate").unwrap().unwrap();
        assert_eq!(tomate.base_unit, "kg");
        assert_eq!(db.list_purchases(Some(tomate.id)).unwrap().len(), 2);

        // Latest purchase drives the effective price: 9.00 at 20% → 11.25
        let price = db.effective_unit_price(tomate.id).unwrap().unwrap();
        assert!((price - 11.25).abs() < 1e-12);
    }

    #[test]
    fn test_import_matches_existing_ingredient_case_insensitively() {
        let db = Database::open_in_memory().unwrap();
        db.insert_ingredient(&NewIngredient {
            name: "tomate".to_string(),
            base_unit: "kg".to_string(),
            unit_price: None,
        })
        .unwrap();

        let rows = parse_purchase_csv(SAMPLE_CSV.as_bytes()).unwrap();
        let summary = import_purchases(&db, &rows, false).unwrap();
        assert_eq!(summary.ingredients_created, 1); // only Leite
        assert_eq!(db.list_ingredients(None).unwrap().len(), 2);
    }

    #[test]
    fn test_import_dry_run_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let rows = parse_purchase_csv(SAMPLE_CSV.as_bytes()).unwrap();
        let summary = import_purchases(&db, &rows, true).unwrap();

        assert_eq!(summary.ingredients_created, 2);
        assert_eq!(summary.purchases_logged, 3);
        assert!(db.list_ingredients(None).unwrap().is_empty());
        assert!(db.list_purchases(None).unwrap().is_empty());
    }

    #[test]
    fn test_write_recipe_csv() {
        let db = Database::open_in_memory().unwrap();
        let flour = db
            .insert_ingredient(&NewIngredient {
                name: "Farinha".to_string(),
                base_unit: "kg".to_string(),
                unit_price: Some(4.0),
            })
            .unwrap();
        let recipe = db.create_recipe("Massa").unwrap();
        db.add_recipe_item(
            recipe.id,
            &crate::models::NewRecipeItem {
                ingredient_id: flour.id,
                quantity: 500.0,
                unit: "g".to_string(),
            },
        )
        .unwrap();

        let cost = db.recipe_cost(recipe.id).unwrap();
        let mut buffer = Vec::new();
        write_recipe_csv(&mut buffer, &cost).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.starts_with("Ingredient,Quantity,Unit,Unit Price,Amount,Notes"));
        assert!(output.contains("Farinha,500,g,0.00,2.00,"));
        assert!(output.contains("Total,,,,2.00,"));
    }

    #[test]
    fn test_write_recipe_csv_notes_missing_price() {
        let cost = RecipeCost {
            id: 1,
            name: "Teste".to_string(),
            items: vec![crate::models::CostedItem {
                item_id: 1,
                ingredient_id: 1,
                ingredient_name: "Açafrão".to_string(),
                quantity: 2.0,
                unit: "g".to_string(),
                base_unit: "g".to_string(),
                effective_unit_price: 0.0,
                amount: 0.0,
                target_unit_price: 0.0,
                base_quantity: None,
                missing_price: true,
                conversion_fallback: false,
            }],
            total: 0.0,
        };
        let mut buffer = Vec::new();
        write_recipe_csv(&mut buffer, &cost).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("no price recorded"));
    }
}
