use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::models::{
    ComponentCost, Dish, DishComponent, DishCost, ExportData, ExportDish, ExportDishComponent,
    ExportPurchase, ExportRecipe, ExportRecipeItem, ImportSummary, Ingredient, NewIngredient,
    NewPurchase, NewRecipeItem, Purchase, Recipe, RecipeCost, RecipeItem, validate_export_dish,
    validate_export_ingredient, validate_export_purchase, validate_export_recipe_item,
    validate_finishing_cost, validate_loss_percentage, validate_margin, validate_price,
    validate_quantity, validate_unit,
};
use crate::pricing::{self, cost_item};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    base_unit TEXT NOT NULL,
                    unit_price REAL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS purchases (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
                    date TEXT NOT NULL,
                    price REAL NOT NULL,
                    loss_percentage REAL NOT NULL DEFAULT 0,
                    supplier_name TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS dishes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    finishing_cost_pct REAL NOT NULL DEFAULT 0,
                    margin_pct REAL NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS dish_components (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    dish_id INTEGER NOT NULL REFERENCES dishes(id) ON DELETE CASCADE,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id),
                    portions REAL NOT NULL DEFAULT 1
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_ingredients_name
                    ON ingredients(name COLLATE NOCASE);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_recipes_name
                    ON recipes(name COLLATE NOCASE);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_dishes_name
                    ON dishes(name COLLATE NOCASE);
                CREATE INDEX IF NOT EXISTS idx_purchases_ingredient_date
                    ON purchases(ingredient_id, date);
                CREATE INDEX IF NOT EXISTS idx_recipe_items_recipe
                    ON recipe_items(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_dish_components_dish
                    ON dish_components(dish_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
        Ok(Ingredient {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            base_unit: row.get(3)?,
            unit_price: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn purchase_from_row(row: &rusqlite::Row) -> rusqlite::Result<Purchase> {
        Ok(Purchase {
            id: row.get(0)?,
            uuid: row.get(1)?,
            ingredient_id: row.get(2)?,
            date: row.get(3)?,
            price: row.get(4)?,
            loss_percentage: row.get(5)?,
            supplier_name: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn dish_from_row(row: &rusqlite::Row) -> rusqlite::Result<Dish> {
        Ok(Dish {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            finishing_cost_pct: row.get(3)?,
            margin_pct: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    // --- Ingredients ---

    pub fn insert_ingredient(&self, ingredient: &NewIngredient) -> Result<Ingredient> {
        if ingredient.name.trim().is_empty() {
            bail!("Ingredient name must not be empty");
        }
        let base_unit = validate_unit(&ingredient.base_unit)?;
        if let Some(price) = ingredient.unit_price {
            validate_price(price)?;
        }
        if self.get_ingredient_by_name(&ingredient.name)?.is_some() {
            bail!("Ingredient '{}' already exists", ingredient.name);
        }

        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO ingredients (uuid, name, base_unit, unit_price, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uuid,
                ingredient.name.trim(),
                base_unit,
                ingredient.unit_price,
                now,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_ingredient_by_id(id)
    }

    pub fn get_ingredient_by_id(&self, id: i64) -> Result<Ingredient> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, base_unit, unit_price, created_at, updated_at
                 FROM ingredients WHERE id = ?1",
                params![id],
                Self::ingredient_from_row,
            )
            .context("Ingredient not found")
    }

    pub fn get_ingredient_by_name(&self, name: &str) -> Result<Option<Ingredient>> {
        let ingredient = self
            .conn
            .query_row(
                "SELECT id, uuid, name, base_unit, unit_price, created_at, updated_at
                 FROM ingredients WHERE name = ?1 COLLATE NOCASE",
                params![name.trim()],
                Self::ingredient_from_row,
            )
            .optional()?;
        Ok(ingredient)
    }

    fn get_ingredient_by_uuid(&self, uuid: &str) -> Result<Option<Ingredient>> {
        let ingredient = self
            .conn
            .query_row(
                "SELECT id, uuid, name, base_unit, unit_price, created_at, updated_at
                 FROM ingredients WHERE uuid = ?1",
                params![uuid],
                Self::ingredient_from_row,
            )
            .optional()?;
        Ok(ingredient)
    }

    pub fn list_ingredients(&self, search: Option<&str>) -> Result<Vec<Ingredient>> {
        if let Some(query) = search {
            let escaped = query
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            let pattern = format!("%{escaped}%");
            let mut stmt = self.conn.prepare(
                "SELECT id, uuid, name, base_unit, unit_price, created_at, updated_at
                 FROM ingredients WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name",
            )?;
            let ingredients = stmt
                .query_map(params![pattern], Self::ingredient_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ingredients);
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, base_unit, unit_price, created_at, updated_at
             FROM ingredients ORDER BY name",
        )?;
        let ingredients = stmt
            .query_map([], Self::ingredient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ingredients)
    }

    /// Set or clear the manual fallback price per base unit.
    pub fn set_ingredient_price(&self, id: i64, unit_price: Option<f64>) -> Result<Ingredient> {
        if let Some(price) = unit_price {
            validate_price(price)?;
        }
        self.get_ingredient_by_id(id)?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE ingredients SET unit_price = ?1, updated_at = ?2 WHERE id = ?3",
            params![unit_price, now, id],
        )?;
        self.get_ingredient_by_id(id)
    }

    /// Delete an ingredient. Refuses while purchases or recipe items still
    /// reference it — records are never deleted implicitly.
    pub fn delete_ingredient(&self, id: i64) -> Result<()> {
        let ingredient = self.get_ingredient_by_id(id)?;
        let purchase_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM purchases WHERE ingredient_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if purchase_count > 0 {
            bail!(
                "Ingredient '{}' has {purchase_count} recorded purchase(s); delete them first",
                ingredient.name
            );
        }
        let item_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM recipe_items WHERE ingredient_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if item_count > 0 {
            bail!(
                "Ingredient '{}' is used by {item_count} recipe item(s); remove them first",
                ingredient.name
            );
        }
        self.conn
            .execute("DELETE FROM ingredients WHERE id = ?1", params![id])?;
        Ok(())
    }

    // --- Purchases ---

    pub fn insert_purchase(&self, purchase: &NewPurchase) -> Result<Purchase> {
        validate_price(purchase.price)?;
        validate_loss_percentage(purchase.loss_percentage)?;
        self.get_ingredient_by_id(purchase.ingredient_id)?;

        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let date_str = purchase.date.format("%Y-%m-%d").to_string();
        self.conn.execute(
            "INSERT INTO purchases (uuid, ingredient_id, date, price, loss_percentage, supplier_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                uuid,
                purchase.ingredient_id,
                date_str,
                purchase.price,
                purchase.loss_percentage,
                purchase.supplier_name,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_purchase_by_id(id)
    }

    pub fn get_purchase_by_id(&self, id: i64) -> Result<Purchase> {
        self.conn
            .query_row(
                "SELECT id, uuid, ingredient_id, date, price, loss_percentage, supplier_name, created_at
                 FROM purchases WHERE id = ?1",
                params![id],
                Self::purchase_from_row,
            )
            .context("Purchase not found")
    }

    /// Purchases, newest first. Same-date purchases order by the
    /// later-recorded row first, matching the current-price rule.
    pub fn list_purchases(&self, ingredient_id: Option<i64>) -> Result<Vec<Purchase>> {
        if let Some(ingredient_id) = ingredient_id {
            let mut stmt = self.conn.prepare(
                "SELECT id, uuid, ingredient_id, date, price, loss_percentage, supplier_name, created_at
                 FROM purchases WHERE ingredient_id = ?1
                 ORDER BY date DESC, id DESC",
            )?;
            let purchases = stmt
                .query_map(params![ingredient_id], Self::purchase_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(purchases);
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, ingredient_id, date, price, loss_percentage, supplier_name, created_at
             FROM purchases ORDER BY date DESC, id DESC",
        )?;
        let purchases = stmt
            .query_map([], Self::purchase_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(purchases)
    }

    pub fn latest_purchase(&self, ingredient_id: i64) -> Result<Option<Purchase>> {
        let purchase = self
            .conn
            .query_row(
                "SELECT id, uuid, ingredient_id, date, price, loss_percentage, supplier_name, created_at
                 FROM purchases WHERE ingredient_id = ?1
                 ORDER BY date DESC, id DESC LIMIT 1",
                params![ingredient_id],
                Self::purchase_from_row,
            )
            .optional()?;
        Ok(purchase)
    }

    pub fn delete_purchase(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM purchases WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Effective price per base unit that currently applies to an
    /// ingredient: latest purchase corrected for loss, else the manual
    /// price, else None (a visible zero-price state).
    pub fn effective_unit_price(&self, ingredient_id: i64) -> Result<Option<f64>> {
        let ingredient = self.get_ingredient_by_id(ingredient_id)?;
        let purchases = self.list_purchases(Some(ingredient_id))?;
        match pricing::current_price(&ingredient, &purchases) {
            Some(cp) => Ok(Some(pricing::effective_unit_price(
                cp.price,
                cp.loss_percentage,
            )?)),
            None => Ok(None),
        }
    }

    // --- Recipes ---

    pub fn create_recipe(&self, name: &str) -> Result<Recipe> {
        if name.trim().is_empty() {
            bail!("Recipe name must not be empty");
        }
        if self.get_recipe_by_name(name)?.is_some() {
            bail!("Recipe '{name}' already exists");
        }
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO recipes (uuid, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![uuid, name.trim(), now, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_recipe_by_id(id)
    }

    pub fn get_recipe_by_id(&self, id: i64) -> Result<Recipe> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, created_at, updated_at FROM recipes WHERE id = ?1",
                params![id],
                Self::recipe_from_row,
            )
            .context("Recipe not found")
    }

    pub fn get_recipe_by_name(&self, name: &str) -> Result<Option<Recipe>> {
        let recipe = self
            .conn
            .query_row(
                "SELECT id, uuid, name, created_at, updated_at
                 FROM recipes WHERE name = ?1 COLLATE NOCASE",
                params![name.trim()],
                Self::recipe_from_row,
            )
            .optional()?;
        Ok(recipe)
    }

    fn get_recipe_by_uuid(&self, uuid: &str) -> Result<Option<Recipe>> {
        let recipe = self
            .conn
            .query_row(
                "SELECT id, uuid, name, created_at, updated_at FROM recipes WHERE uuid = ?1",
                params![uuid],
                Self::recipe_from_row,
            )
            .optional()?;
        Ok(recipe)
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, uuid, name, created_at, updated_at FROM recipes ORDER BY name")?;
        let recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    pub fn add_recipe_item(&self, recipe_id: i64, item: &NewRecipeItem) -> Result<RecipeItem> {
        validate_quantity(item.quantity)?;
        let unit = validate_unit(&item.unit)?;
        self.get_recipe_by_id(recipe_id)?;
        self.get_ingredient_by_id(item.ingredient_id)?;

        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO recipe_items (uuid, recipe_id, ingredient_id, quantity, unit)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![uuid, recipe_id, item.ingredient_id, item.quantity, unit],
        )?;
        self.touch_recipe(recipe_id, &now)?;
        let id = self.conn.last_insert_rowid();
        self.get_recipe_item(id)
    }

    pub fn get_recipe_item(&self, id: i64) -> Result<RecipeItem> {
        self.conn
            .query_row(
                "SELECT ri.id, ri.uuid, ri.recipe_id, ri.ingredient_id, ri.quantity, ri.unit, i.name
                 FROM recipe_items ri
                 JOIN ingredients i ON ri.ingredient_id = i.id
                 WHERE ri.id = ?1",
                params![id],
                Self::recipe_item_from_row,
            )
            .context("Recipe item not found")
    }

    fn recipe_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeItem> {
        Ok(RecipeItem {
            id: row.get(0)?,
            uuid: row.get(1)?,
            recipe_id: row.get(2)?,
            ingredient_id: row.get(3)?,
            quantity: row.get(4)?,
            unit: row.get(5)?,
            ingredient_name: Some(row.get(6)?),
        })
    }

    pub fn get_recipe_items(&self, recipe_id: i64) -> Result<Vec<RecipeItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT ri.id, ri.uuid, ri.recipe_id, ri.ingredient_id, ri.quantity, ri.unit, i.name
             FROM recipe_items ri
             JOIN ingredients i ON ri.ingredient_id = i.id
             WHERE ri.recipe_id = ?1
             ORDER BY ri.id",
        )?;
        let items = stmt
            .query_map(params![recipe_id], Self::recipe_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn remove_recipe_item(&self, recipe_id: i64, ingredient_name: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM recipe_items WHERE recipe_id = ?1 AND ingredient_id IN (
                SELECT id FROM ingredients WHERE name = ?2 COLLATE NOCASE
            )",
            params![recipe_id, ingredient_name.trim()],
        )?;
        if rows > 0 {
            let now = Local::now().to_rfc3339();
            self.touch_recipe(recipe_id, &now)?;
        }
        Ok(rows > 0)
    }

    pub fn set_recipe_item_quantity(&self, item_id: i64, quantity: f64) -> Result<RecipeItem> {
        validate_quantity(quantity)?;
        let item = self.get_recipe_item(item_id)?;
        self.conn.execute(
            "UPDATE recipe_items SET quantity = ?1 WHERE id = ?2",
            params![quantity, item_id],
        )?;
        let now = Local::now().to_rfc3339();
        self.touch_recipe(item.recipe_id, &now)?;
        self.get_recipe_item(item_id)
    }

    fn touch_recipe(&self, recipe_id: i64, now: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE recipes SET updated_at = ?1 WHERE id = ?2",
            params![now, recipe_id],
        )?;
        Ok(())
    }

    pub fn delete_recipe(&self, recipe_id: i64) -> Result<()> {
        let recipe = self.get_recipe_by_id(recipe_id)?;
        let component_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dish_components WHERE recipe_id = ?1",
            params![recipe_id],
            |row| row.get(0),
        )?;
        if component_count > 0 {
            bail!(
                "Recipe '{}' is used by {component_count} dish(es); remove it from them first",
                recipe.name
            );
        }
        // CASCADE covers the items, but be explicit
        self.conn.execute(
            "DELETE FROM recipe_items WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        self.conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![recipe_id])?;
        Ok(())
    }

    /// Cost a recipe from its current line items and price records. Totals
    /// are never stored; every call recomputes from source.
    pub fn recipe_cost(&self, recipe_id: i64) -> Result<RecipeCost> {
        let recipe = self.get_recipe_by_id(recipe_id)?;
        let items = self.get_recipe_items(recipe_id)?;

        let mut costed = Vec::with_capacity(items.len());
        for item in &items {
            let ingredient = self.get_ingredient_by_id(item.ingredient_id)?;
            let purchases = self.list_purchases(Some(item.ingredient_id))?;
            costed.push(cost_item(&ingredient, &purchases, item)?);
        }
        let amounts: Vec<f64> = costed.iter().map(|c| c.amount).collect();
        let total = pricing::aggregate(&amounts);

        Ok(RecipeCost {
            id: recipe.id,
            name: recipe.name,
            items: costed,
            total,
        })
    }

    // --- Dishes ---

    pub fn create_dish(&self, name: &str, finishing_cost_pct: f64, margin_pct: f64) -> Result<Dish> {
        if name.trim().is_empty() {
            bail!("Dish name must not be empty");
        }
        validate_finishing_cost(finishing_cost_pct)?;
        validate_margin(margin_pct)?;
        if self.get_dish_by_name(name)?.is_some() {
            bail!("Dish '{name}' already exists");
        }
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO dishes (uuid, name, finishing_cost_pct, margin_pct, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![uuid, name.trim(), finishing_cost_pct, margin_pct, now, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_dish_by_id(id)
    }

    pub fn get_dish_by_id(&self, id: i64) -> Result<Dish> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, finishing_cost_pct, margin_pct, created_at, updated_at
                 FROM dishes WHERE id = ?1",
                params![id],
                Self::dish_from_row,
            )
            .context("Dish not found")
    }

    pub fn get_dish_by_name(&self, name: &str) -> Result<Option<Dish>> {
        let dish = self
            .conn
            .query_row(
                "SELECT id, uuid, name, finishing_cost_pct, margin_pct, created_at, updated_at
                 FROM dishes WHERE name = ?1 COLLATE NOCASE",
                params![name.trim()],
                Self::dish_from_row,
            )
            .optional()?;
        Ok(dish)
    }

    pub fn list_dishes(&self) -> Result<Vec<Dish>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, finishing_cost_pct, margin_pct, created_at, updated_at
             FROM dishes ORDER BY name",
        )?;
        let dishes = stmt
            .query_map([], Self::dish_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dishes)
    }

    pub fn set_dish_pricing(
        &self,
        dish_id: i64,
        finishing_cost_pct: Option<f64>,
        margin_pct: Option<f64>,
    ) -> Result<Dish> {
        self.get_dish_by_id(dish_id)?;
        let now = Local::now().to_rfc3339();
        if let Some(pct) = finishing_cost_pct {
            validate_finishing_cost(pct)?;
            self.conn.execute(
                "UPDATE dishes SET finishing_cost_pct = ?1, updated_at = ?2 WHERE id = ?3",
                params![pct, now, dish_id],
            )?;
        }
        if let Some(pct) = margin_pct {
            validate_margin(pct)?;
            self.conn.execute(
                "UPDATE dishes SET margin_pct = ?1, updated_at = ?2 WHERE id = ?3",
                params![pct, now, dish_id],
            )?;
        }
        self.get_dish_by_id(dish_id)
    }

    pub fn add_dish_component(
        &self,
        dish_id: i64,
        recipe_id: i64,
        portions: f64,
    ) -> Result<DishComponent> {
        validate_quantity(portions)?;
        self.get_dish_by_id(dish_id)?;
        self.get_recipe_by_id(recipe_id)?;

        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO dish_components (uuid, dish_id, recipe_id, portions)
             VALUES (?1, ?2, ?3, ?4)",
            params![uuid, dish_id, recipe_id, portions],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_dish_component(id)
    }

    fn get_dish_component(&self, id: i64) -> Result<DishComponent> {
        self.conn
            .query_row(
                "SELECT dc.id, dc.uuid, dc.dish_id, dc.recipe_id, dc.portions, r.name
                 FROM dish_components dc
                 JOIN recipes r ON dc.recipe_id = r.id
                 WHERE dc.id = ?1",
                params![id],
                Self::dish_component_from_row,
            )
            .context("Dish component not found")
    }

    fn dish_component_from_row(row: &rusqlite::Row) -> rusqlite::Result<DishComponent> {
        Ok(DishComponent {
            id: row.get(0)?,
            uuid: row.get(1)?,
            dish_id: row.get(2)?,
            recipe_id: row.get(3)?,
            portions: row.get(4)?,
            recipe_name: Some(row.get(5)?),
        })
    }

    pub fn get_dish_components(&self, dish_id: i64) -> Result<Vec<DishComponent>> {
        let mut stmt = self.conn.prepare(
            "SELECT dc.id, dc.uuid, dc.dish_id, dc.recipe_id, dc.portions, r.name
             FROM dish_components dc
             JOIN recipes r ON dc.recipe_id = r.id
             WHERE dc.dish_id = ?1
             ORDER BY dc.id",
        )?;
        let components = stmt
            .query_map(params![dish_id], Self::dish_component_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(components)
    }

    pub fn remove_dish_component(&self, dish_id: i64, recipe_name: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM dish_components WHERE dish_id = ?1 AND recipe_id IN (
                SELECT id FROM recipes WHERE name = ?2 COLLATE NOCASE
            )",
            params![dish_id, recipe_name.trim()],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_dish(&self, dish_id: i64) -> Result<()> {
        self.get_dish_by_id(dish_id)?;
        self.conn.execute(
            "DELETE FROM dish_components WHERE dish_id = ?1",
            params![dish_id],
        )?;
        self.conn
            .execute("DELETE FROM dishes WHERE id = ?1", params![dish_id])?;
        Ok(())
    }

    /// Cost a dish from its component recipes, then derive the full cost and
    /// suggested sale price. An invalid margin configuration yields
    /// `price_error` instead of a price — never a negative or infinite number.
    pub fn dish_cost(&self, dish_id: i64) -> Result<DishCost> {
        let dish = self.get_dish_by_id(dish_id)?;
        let components = self.get_dish_components(dish_id)?;

        let mut component_costs = Vec::with_capacity(components.len());
        for component in &components {
            let recipe_cost = self.recipe_cost(component.recipe_id)?;
            component_costs.push(ComponentCost {
                recipe_id: component.recipe_id,
                recipe_name: recipe_cost.name.clone(),
                portions: component.portions,
                recipe_total: recipe_cost.total,
                amount: recipe_cost.total * component.portions,
            });
        }
        let amounts: Vec<f64> = component_costs.iter().map(|c| c.amount).collect();
        let total_cost = pricing::aggregate(&amounts);
        let full = pricing::full_cost(total_cost, dish.finishing_cost_pct);

        let (suggested_price, price_error) =
            match pricing::sale_price(total_cost, dish.finishing_cost_pct, dish.margin_pct) {
                Ok(price) => (Some(price), None),
                Err(e) => (None, Some(e.to_string())),
            };

        Ok(DishCost {
            id: dish.id,
            name: dish.name,
            finishing_cost_pct: dish.finishing_cost_pct,
            margin_pct: dish.margin_pct,
            components: component_costs,
            total_cost,
            full_cost: full,
            suggested_price,
            price_error,
        })
    }

    // --- Export / Import (JSON backup) ---

    pub fn export_all(&self) -> Result<ExportData> {
        let ingredients = self.list_ingredients(None)?;

        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.uuid, p.ingredient_id, i.uuid, p.date, p.price,
                    p.loss_percentage, p.supplier_name, p.created_at
             FROM purchases p JOIN ingredients i ON p.ingredient_id = i.id
             ORDER BY p.id",
        )?;
        let purchases = stmt
            .query_map([], |row| {
                Ok(ExportPurchase {
                    id: row.get(0)?,
                    uuid: row.get(1)?,
                    ingredient_id: row.get(2)?,
                    ingredient_uuid: row.get(3)?,
                    date: row.get(4)?,
                    price: row.get(5)?,
                    loss_percentage: row.get(6)?,
                    supplier_name: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let recipes = self
            .list_recipes()?
            .into_iter()
            .map(|r| ExportRecipe {
                id: r.id,
                uuid: r.uuid,
                name: r.name,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect();

        let mut stmt = self.conn.prepare(
            "SELECT ri.id, ri.uuid, ri.recipe_id, r.uuid, ri.ingredient_id, i.uuid,
                    ri.quantity, ri.unit
             FROM recipe_items ri
             JOIN recipes r ON ri.recipe_id = r.id
             JOIN ingredients i ON ri.ingredient_id = i.id
             ORDER BY ri.id",
        )?;
        let recipe_items = stmt
            .query_map([], |row| {
                Ok(ExportRecipeItem {
                    id: row.get(0)?,
                    uuid: row.get(1)?,
                    recipe_id: row.get(2)?,
                    recipe_uuid: row.get(3)?,
                    ingredient_id: row.get(4)?,
                    ingredient_uuid: row.get(5)?,
                    quantity: row.get(6)?,
                    unit: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let dishes = self
            .list_dishes()?
            .into_iter()
            .map(|d| ExportDish {
                id: d.id,
                uuid: d.uuid,
                name: d.name,
                finishing_cost_pct: d.finishing_cost_pct,
                margin_pct: d.margin_pct,
                created_at: d.created_at,
                updated_at: d.updated_at,
            })
            .collect();

        let mut stmt = self.conn.prepare(
            "SELECT dc.id, dc.uuid, dc.dish_id, d.uuid, dc.recipe_id, r.uuid, dc.portions
             FROM dish_components dc
             JOIN dishes d ON dc.dish_id = d.id
             JOIN recipes r ON dc.recipe_id = r.id
             ORDER BY dc.id",
        )?;
        let dish_components = stmt
            .query_map([], |row| {
                Ok(ExportDishComponent {
                    id: row.get(0)?,
                    uuid: row.get(1)?,
                    dish_id: row.get(2)?,
                    dish_uuid: row.get(3)?,
                    recipe_id: row.get(4)?,
                    recipe_uuid: row.get(5)?,
                    portions: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ExportData {
            version: 1,
            exported_at: Local::now().to_rfc3339(),
            ingredients,
            purchases,
            recipes,
            recipe_items,
            dishes,
            dish_components,
        })
    }

    /// Merge a backup into this database. Records are matched by uuid;
    /// existing uuids are left untouched (purchases are immutable, and a
    /// backup is not a sync source). Foreign references resolve through the
    /// uuid maps, so rowids from the source database are ignored.
    #[allow(clippy::too_many_lines)]
    pub fn import_all(&self, data: &ExportData) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        // Ingredients: uuid → local id
        let mut ingredient_ids: HashMap<String, i64> = HashMap::new();
        for ingredient in &data.ingredients {
            if ingredient.uuid.is_empty() {
                continue;
            }
            validate_export_ingredient(ingredient)?;
            if let Some(existing) = self.get_ingredient_by_uuid(&ingredient.uuid)? {
                ingredient_ids.insert(ingredient.uuid.clone(), existing.id);
                continue;
            }
            // Same name under a different uuid: reuse the local record
            if let Some(existing) = self.get_ingredient_by_name(&ingredient.name)? {
                ingredient_ids.insert(ingredient.uuid.clone(), existing.id);
                continue;
            }
            let base_unit = validate_unit(&ingredient.base_unit)?;
            self.conn.execute(
                "INSERT INTO ingredients (uuid, name, base_unit, unit_price, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    ingredient.uuid,
                    ingredient.name.trim(),
                    base_unit,
                    ingredient.unit_price,
                    ingredient.created_at,
                    ingredient.updated_at
                ],
            )?;
            ingredient_ids.insert(ingredient.uuid.clone(), self.conn.last_insert_rowid());
            summary.ingredients_imported += 1;
        }

        let resolve_ingredient = |ids: &HashMap<String, i64>, uuid: &str| -> Result<Option<i64>> {
            if uuid.is_empty() {
                return Ok(None);
            }
            if let Some(&id) = ids.get(uuid) {
                return Ok(Some(id));
            }
            Ok(self.get_ingredient_by_uuid(uuid)?.map(|i| i.id))
        };

        for purchase in &data.purchases {
            if purchase.uuid.is_empty() || self.purchase_uuid_exists(&purchase.uuid)? {
                continue;
            }
            validate_export_purchase(purchase)?;
            let Some(ingredient_id) = resolve_ingredient(&ingredient_ids, &purchase.ingredient_uuid)?
            else {
                continue;
            };
            self.conn.execute(
                "INSERT INTO purchases (uuid, ingredient_id, date, price, loss_percentage, supplier_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    purchase.uuid,
                    ingredient_id,
                    purchase.date,
                    purchase.price,
                    purchase.loss_percentage,
                    purchase.supplier_name,
                    purchase.created_at
                ],
            )?;
            summary.purchases_imported += 1;
        }

        // Recipes: uuid → local id
        let mut recipe_ids: HashMap<String, i64> = HashMap::new();
        for recipe in &data.recipes {
            if recipe.uuid.is_empty() {
                continue;
            }
            if let Some(existing) = self.get_recipe_by_uuid(&recipe.uuid)? {
                recipe_ids.insert(recipe.uuid.clone(), existing.id);
                continue;
            }
            if let Some(existing) = self.get_recipe_by_name(&recipe.name)? {
                recipe_ids.insert(recipe.uuid.clone(), existing.id);
                continue;
            }
            self.conn.execute(
                "INSERT INTO recipes (uuid, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![recipe.uuid, recipe.name.trim(), recipe.created_at, recipe.updated_at],
            )?;
            recipe_ids.insert(recipe.uuid.clone(), self.conn.last_insert_rowid());
            summary.recipes_imported += 1;
        }

        for item in &data.recipe_items {
            if item.uuid.is_empty() || self.recipe_item_uuid_exists(&item.uuid)? {
                continue;
            }
            validate_export_recipe_item(item)?;
            let recipe_id = if let Some(&id) = recipe_ids.get(&item.recipe_uuid) {
                Some(id)
            } else {
                self.get_recipe_by_uuid(&item.recipe_uuid)?.map(|r| r.id)
            };
            let ingredient_id = resolve_ingredient(&ingredient_ids, &item.ingredient_uuid)?;
            let (Some(recipe_id), Some(ingredient_id)) = (recipe_id, ingredient_id) else {
                continue;
            };
            let unit = validate_unit(&item.unit)?;
            self.conn.execute(
                "INSERT INTO recipe_items (uuid, recipe_id, ingredient_id, quantity, unit)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![item.uuid, recipe_id, ingredient_id, item.quantity, unit],
            )?;
            summary.recipe_items_imported += 1;
        }

        // Dishes: uuid → local id
        let mut dish_ids: HashMap<String, i64> = HashMap::new();
        for dish in &data.dishes {
            if dish.uuid.is_empty() {
                continue;
            }
            validate_export_dish(dish)?;
            if let Some(existing) = self.dish_id_by_uuid(&dish.uuid)? {
                dish_ids.insert(dish.uuid.clone(), existing);
                continue;
            }
            if let Some(existing) = self.get_dish_by_name(&dish.name)? {
                dish_ids.insert(dish.uuid.clone(), existing.id);
                continue;
            }
            self.conn.execute(
                "INSERT INTO dishes (uuid, name, finishing_cost_pct, margin_pct, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    dish.uuid,
                    dish.name.trim(),
                    dish.finishing_cost_pct,
                    dish.margin_pct,
                    dish.created_at,
                    dish.updated_at
                ],
            )?;
            dish_ids.insert(dish.uuid.clone(), self.conn.last_insert_rowid());
            summary.dishes_imported += 1;
        }

        for component in &data.dish_components {
            if component.uuid.is_empty() || self.dish_component_uuid_exists(&component.uuid)? {
                continue;
            }
            validate_quantity(component.portions)?;
            let dish_id = if let Some(&id) = dish_ids.get(&component.dish_uuid) {
                Some(id)
            } else {
                self.dish_id_by_uuid(&component.dish_uuid)?
            };
            let recipe_id = if let Some(&id) = recipe_ids.get(&component.recipe_uuid) {
                Some(id)
            } else {
                self.get_recipe_by_uuid(&component.recipe_uuid)?.map(|r| r.id)
            };
            let (Some(dish_id), Some(recipe_id)) = (dish_id, recipe_id) else {
                continue;
            };
            self.conn.execute(
                "INSERT INTO dish_components (uuid, dish_id, recipe_id, portions)
                 VALUES (?1, ?2, ?3, ?4)",
                params![component.uuid, dish_id, recipe_id, component.portions],
            )?;
            summary.dish_components_imported += 1;
        }

        Ok(summary)
    }

    fn purchase_uuid_exists(&self, uuid: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM purchases WHERE uuid = ?1",
            params![uuid],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn recipe_item_uuid_exists(&self, uuid: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM recipe_items WHERE uuid = ?1",
            params![uuid],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn dish_component_uuid_exists(&self, uuid: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dish_components WHERE uuid = ?1",
            params![uuid],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn dish_id_by_uuid(&self, uuid: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM dishes WHERE uuid = ?1",
                params![uuid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_ingredient(db: &Database, name: &str, unit: &str, price: Option<f64>) -> Ingredient {
        db.insert_ingredient(&NewIngredient {
            name: name.to_string(),
            base_unit: unit.to_string(),
            unit_price: price,
        })
        .unwrap()
    }

    fn log_purchase(db: &Database, ingredient_id: i64, date: &str, price: f64, loss: f64) {
        db.insert_purchase(&NewPurchase {
            ingredient_id,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            price,
            loss_percentage: loss,
            supplier_name: None,
        })
        .unwrap();
    }

    #[test]
    fn test_insert_and_get_ingredient() {
        let db = db();
        let ing = add_ingredient(&db, "Farinha de trigo", "KG", None);
        assert_eq!(ing.base_unit, "kg"); // canonicalized
        assert!(!ing.uuid.is_empty());

        let by_name = db.get_ingredient_by_name("farinha DE trigo").unwrap().unwrap();
        assert_eq!(by_name.id, ing.id);
    }

    #[test]
    fn test_duplicate_ingredient_rejected() {
        let db = db();
        add_ingredient(&db, "Sal", "kg", None);
        let result = db.insert_ingredient(&NewIngredient {
            name: "SAL".to_string(),
            base_unit: "kg".to_string(),
            unit_price: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_insert_ingredient_bad_unit_rejected() {
        let db = db();
        let result = db.insert_ingredient(&NewIngredient {
            name: "Azeite".to_string(),
            base_unit: "caixa".to_string(),
            unit_price: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_list_ingredients_search_escapes_like() {
        let db = db();
        add_ingredient(&db, "Açúcar 100%", "kg", None);
        add_ingredient(&db, "Açúcar mascavo", "kg", None);

        let found = db.list_ingredients(Some("100%")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Açúcar 100%");
    }

    #[test]
    fn test_purchase_validation() {
        let db = db();
        let ing = add_ingredient(&db, "Tomate", "kg", None);
        let bad = db.insert_purchase(&NewPurchase {
            ingredient_id: ing.id,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            price: 8.0,
            loss_percentage: 100.0,
            supplier_name: None,
        });
        assert!(bad.is_err());

        let bad_price = db.insert_purchase(&NewPurchase {
            ingredient_id: ing.id,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            price: 0.0,
            loss_percentage: 0.0,
            supplier_name: None,
        });
        assert!(bad_price.is_err());
    }

    #[test]
    fn test_latest_purchase_by_date() {
        let db = db();
        let ing = add_ingredient(&db, "Cebola", "kg", None);
        log_purchase(&db, ing.id, "2024-03-01", 5.0, 0.0);
        log_purchase(&db, ing.id, "2024-06-01", 7.0, 0.0);
        log_purchase(&db, ing.id, "2024-04-15", 6.0, 0.0);

        let latest = db.latest_purchase(ing.id).unwrap().unwrap();
        assert_eq!(latest.date, "2024-06-01");
        assert!((latest.price - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_effective_unit_price_from_latest_purchase() {
        let db = db();
        let ing = add_ingredient(&db, "Carne", "kg", Some(99.0));
        log_purchase(&db, ing.id, "2024-06-01", 12.0, 20.0);

        // 12 / (1 - 0.2) = 15, manual price ignored once a purchase exists
        let price = db.effective_unit_price(ing.id).unwrap().unwrap();
        assert!((price - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_effective_unit_price_manual_fallback() {
        let db = db();
        let ing = add_ingredient(&db, "Ovo", "dz", Some(10.0));
        let price = db.effective_unit_price(ing.id).unwrap().unwrap();
        assert!((price - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_effective_unit_price_missing() {
        let db = db();
        let ing = add_ingredient(&db, "Manjericão", "un", None);
        assert!(db.effective_unit_price(ing.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_ingredient_refuses_when_referenced() {
        let db = db();
        let ing = add_ingredient(&db, "Alho", "kg", None);
        log_purchase(&db, ing.id, "2024-06-01", 20.0, 0.0);
        assert!(db.delete_ingredient(ing.id).is_err());
    }

    #[test]
    fn test_recipe_cost_recomputes_from_source() {
        let db = db();
        let flour = add_ingredient(&db, "Farinha", "kg", None);
        log_purchase(&db, flour.id, "2024-06-01", 4.0, 0.0);

        let recipe = db.create_recipe("Massa base").unwrap();
        db.add_recipe_item(
            recipe.id,
            &NewRecipeItem {
                ingredient_id: flour.id,
                quantity: 500.0,
                unit: "g".to_string(),
            },
        )
        .unwrap();

        // 4.00/kg → 0.004/g * 500 = 2.00
        let cost = db.recipe_cost(recipe.id).unwrap();
        assert!((cost.total - 2.0).abs() < 1e-12);

        // A newer purchase changes the recomputed total, no stale state
        log_purchase(&db, flour.id, "2024-07-01", 6.0, 0.0);
        let cost = db.recipe_cost(recipe.id).unwrap();
        assert!((cost.total - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_recipe_cost_flags_missing_price() {
        let db = db();
        let saffron = add_ingredient(&db, "Açafrão", "g", None);
        let recipe = db.create_recipe("Risoto").unwrap();
        db.add_recipe_item(
            recipe.id,
            &NewRecipeItem {
                ingredient_id: saffron.id,
                quantity: 2.0,
                unit: "g".to_string(),
            },
        )
        .unwrap();

        let cost = db.recipe_cost(recipe.id).unwrap();
        assert!((cost.total - 0.0).abs() < f64::EPSILON);
        assert!(cost.items[0].missing_price);
    }

    #[test]
    fn test_set_recipe_item_quantity_recomputes_total() {
        let db = db();
        let flour = add_ingredient(&db, "Farinha", "kg", Some(4.0));
        let recipe = db.create_recipe("Massa").unwrap();
        let item = db
            .add_recipe_item(
                recipe.id,
                &NewRecipeItem {
                    ingredient_id: flour.id,
                    quantity: 500.0,
                    unit: "g".to_string(),
                },
            )
            .unwrap();
        assert!((db.recipe_cost(recipe.id).unwrap().total - 2.0).abs() < 1e-12);

        let updated = db.set_recipe_item_quantity(item.id, 750.0).unwrap();
        assert!((updated.quantity - 750.0).abs() < f64::EPSILON);
        assert!((db.recipe_cost(recipe.id).unwrap().total - 3.0).abs() < 1e-12);

        assert!(db.set_recipe_item_quantity(item.id, 0.0).is_err());
    }

    #[test]
    fn test_remove_recipe_item_updates_total() {
        let db = db();
        let a = add_ingredient(&db, "Arroz", "kg", Some(5.0));
        let b = add_ingredient(&db, "Feijão", "kg", Some(8.0));
        let recipe = db.create_recipe("PF").unwrap();
        for (ing, qty) in [(&a, 1.0), (&b, 0.5)] {
            db.add_recipe_item(
                recipe.id,
                &NewRecipeItem {
                    ingredient_id: ing.id,
                    quantity: qty,
                    unit: "kg".to_string(),
                },
            )
            .unwrap();
        }
        assert!((db.recipe_cost(recipe.id).unwrap().total - 9.0).abs() < 1e-12);

        assert!(db.remove_recipe_item(recipe.id, "feijão").unwrap());
        assert!((db.recipe_cost(recipe.id).unwrap().total - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_dish_cost_with_margin() {
        let db = db();
        let ing = add_ingredient(&db, "Base", "kg", Some(50.0));
        let recipe = db.create_recipe("Base pronta").unwrap();
        db.add_recipe_item(
            recipe.id,
            &NewRecipeItem {
                ingredient_id: ing.id,
                quantity: 1.0,
                unit: "kg".to_string(),
            },
        )
        .unwrap();

        let dish = db.create_dish("Prato executivo", 10.0, 45.0).unwrap();
        db.add_dish_component(dish.id, recipe.id, 1.0).unwrap();

        let cost = db.dish_cost(dish.id).unwrap();
        assert!((cost.total_cost - 50.0).abs() < 1e-12);
        assert!((cost.full_cost - 55.0).abs() < 1e-12);
        // 55 / (1 - 0.45) = 100
        assert!((cost.suggested_price.unwrap() - 100.0).abs() < 1e-9);
        assert!(cost.price_error.is_none());
    }

    #[test]
    fn test_dish_cost_component_portions_scale() {
        let db = db();
        let ing = add_ingredient(&db, "Molho", "l", Some(10.0));
        let recipe = db.create_recipe("Molho da casa").unwrap();
        db.add_recipe_item(
            recipe.id,
            &NewRecipeItem {
                ingredient_id: ing.id,
                quantity: 0.5,
                unit: "l".to_string(),
            },
        )
        .unwrap();

        let dish = db.create_dish("Macarrão", 0.0, 0.0).unwrap();
        db.add_dish_component(dish.id, recipe.id, 2.0).unwrap();

        let cost = db.dish_cost(dish.id).unwrap();
        assert!((cost.total_cost - 10.0).abs() < 1e-12);
        assert!((cost.suggested_price.unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_create_dish_rejects_margin_at_100() {
        let db = db();
        assert!(db.create_dish("Prato errado", 10.0, 100.0).is_err());
        assert!(db.create_dish("Prato errado", 10.0, 200.0).is_err());
    }

    #[test]
    fn test_delete_recipe_refuses_when_in_dish() {
        let db = db();
        let ing = add_ingredient(&db, "Queijo", "kg", Some(30.0));
        let recipe = db.create_recipe("Recheio").unwrap();
        db.add_recipe_item(
            recipe.id,
            &NewRecipeItem {
                ingredient_id: ing.id,
                quantity: 0.2,
                unit: "kg".to_string(),
            },
        )
        .unwrap();
        let dish = db.create_dish("Pastel", 0.0, 50.0).unwrap();
        db.add_dish_component(dish.id, recipe.id, 1.0).unwrap();

        assert!(db.delete_recipe(recipe.id).is_err());
        assert!(db.remove_dish_component(dish.id, "Recheio").unwrap());
        assert!(db.delete_recipe(recipe.id).is_ok());
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = db();
        let flour = add_ingredient(&source, "Farinha", "kg", None);
        log_purchase(&source, flour.id, "2024-06-01", 4.0, 10.0);
        let recipe = source.create_recipe("Massa").unwrap();
        source
            .add_recipe_item(
                recipe.id,
                &NewRecipeItem {
                    ingredient_id: flour.id,
                    quantity: 500.0,
                    unit: "g".to_string(),
                },
            )
            .unwrap();
        let dish = source.create_dish("Pizza", 10.0, 60.0).unwrap();
        source.add_dish_component(dish.id, recipe.id, 1.0).unwrap();

        let data = source.export_all().unwrap();

        let target = db();
        let summary = target.import_all(&data).unwrap();
        assert_eq!(summary.ingredients_imported, 1);
        assert_eq!(summary.purchases_imported, 1);
        assert_eq!(summary.recipes_imported, 1);
        assert_eq!(summary.recipe_items_imported, 1);
        assert_eq!(summary.dishes_imported, 1);
        assert_eq!(summary.dish_components_imported, 1);

        // The costed totals survive the migration
        let imported_recipe = target.get_recipe_by_name("Massa").unwrap().unwrap();
        let cost = target.recipe_cost(imported_recipe.id).unwrap();
        // 4 / 0.9 / 1000 * 500
        assert!((cost.total - 4.0 / 0.9 / 1000.0 * 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_import_is_idempotent() {
        let source = db();
        let ing = add_ingredient(&source, "Leite", "l", Some(4.5));
        log_purchase(&source, ing.id, "2024-06-01", 4.0, 0.0);
        let data = source.export_all().unwrap();

        let target = db();
        target.import_all(&data).unwrap();
        let second = target.import_all(&data).unwrap();
        assert_eq!(second.ingredients_imported, 0);
        assert_eq!(second.purchases_imported, 0);
        assert_eq!(target.list_ingredients(None).unwrap().len(), 1);
        assert_eq!(target.list_purchases(None).unwrap().len(), 1);
    }

    #[test]
    fn test_import_matches_ingredient_by_name() {
        let source = db();
        add_ingredient(&source, "Tomate", "kg", None);
        let data = source.export_all().unwrap();

        let target = db();
        add_ingredient(&target, "tomate", "kg", Some(6.0));
        let summary = target.import_all(&data).unwrap();
        assert_eq!(summary.ingredients_imported, 0);
        assert_eq!(target.list_ingredients(None).unwrap().len(), 1);
    }
}
