use anyhow::{Context, Result};
use std::path::Path;

use ficha_core::db::Database;
use ficha_core::models::ExportData;

pub(crate) fn cmd_backup_export(db: &Database, output: Option<&Path>, json: bool) -> Result<()> {
    let data = db.export_all()?;
    let serialized = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            std::fs::write(path, &serialized)
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "file": path,
                        "ingredients": data.ingredients.len(),
                        "purchases": data.purchases.len(),
                        "recipes": data.recipes.len(),
                        "dishes": data.dishes.len(),
                    })
                );
            } else {
                let ingredients = data.ingredients.len();
                let purchases = data.purchases.len();
                let recipes = data.recipes.len();
                let dishes = data.dishes.len();
                println!("Exported to {}", path.display());
                println!(
                    "{ingredients} ingredient(s), {purchases} purchase(s), {recipes} recipe(s), {dishes} dish(es)"
                );
            }
        }
        // No file: the backup itself goes to stdout
        None => println!("{serialized}"),
    }
    Ok(())
}

pub(crate) fn cmd_backup_import(db: &Database, file: &Path, json: bool) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let data: ExportData =
        serde_json::from_str(&contents).context("Invalid backup file format")?;
    let summary = db.import_all(&data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Imported from {}", file.display());
    let ingredients = summary.ingredients_imported;
    let purchases = summary.purchases_imported;
    let recipes = summary.recipes_imported;
    let items = summary.recipe_items_imported;
    let dishes = summary.dishes_imported;
    let components = summary.dish_components_imported;
    println!("{ingredients} ingredient(s), {purchases} purchase(s)");
    println!("{recipes} recipe(s) with {items} item(s), {dishes} dish(es) with {components} component(s)");
    println!("Records already present were left untouched");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ficha_core::models::NewIngredient;

    #[test]
    fn test_backup_export_import_via_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        let source = Database::open_in_memory().unwrap();
        source
            .insert_ingredient(&NewIngredient {
                name: "Farinha".to_string(),
                base_unit: "kg".to_string(),
                unit_price: Some(4.0),
            })
            .unwrap();

        let data = source.export_all().unwrap();
        std::fs::write(&path, serde_json::to_string_pretty(&data).unwrap()).unwrap();

        let target = Database::open_in_memory().unwrap();
        cmd_backup_import(&target, &path, true).unwrap();
        let imported = target.get_ingredient_by_name("Farinha").unwrap().unwrap();
        assert_eq!(imported.base_unit, "kg");
        assert!((imported.unit_price.unwrap() - 4.0).abs() < f64::EPSILON);
    }
}
