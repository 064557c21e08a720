mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    cmd_backup_export, cmd_backup_import, cmd_dish_add_recipe, cmd_dish_create, cmd_dish_delete,
    cmd_dish_list, cmd_dish_remove_recipe, cmd_dish_set_pricing, cmd_dish_show,
    cmd_ingredient_add, cmd_ingredient_delete, cmd_ingredient_list, cmd_ingredient_set_price,
    cmd_purchase_delete, cmd_purchase_import, cmd_purchase_list, cmd_purchase_log, cmd_quote,
    cmd_recipe_add_item, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_export, cmd_recipe_list,
    cmd_recipe_remove_item, cmd_recipe_set_quantity, cmd_recipe_show,
};
use crate::config::Config;
use ficha_core::db::Database;

#[derive(Parser)]
#[command(
    name = "ficha",
    version,
    about = "Kitchen costing from your terminal",
    long_about = "Track ingredient purchases, cost recipes (fichas técnicas), and price dishes.\nEverything lives in a local SQLite database."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a quantity of an ingredient without creating a recipe
    Quote {
        /// Ingredient name
        ingredient: String,
        /// Quantity (e.g. "500g", "2 kg", "1 dz")
        quantity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage ingredients
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Record and inspect purchases
    Purchase {
        #[command(subcommand)]
        command: PurchaseCommands,
    },
    /// Manage recipes (fichas técnicas)
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Manage dishes (recipes + finishing cost + margin)
    Dish {
        #[command(subcommand)]
        command: DishCommands,
    },
    /// Export and import JSON backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient
    Add {
        /// Ingredient name
        name: String,
        /// Base unit: kg, g, l, ml, dz, un
        #[arg(short, long)]
        unit: String,
        /// Manual price per base unit (fallback until a purchase is logged)
        #[arg(short, long)]
        price: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List/search ingredients with their current prices
    List {
        /// Search query to filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set or clear the manual price of an ingredient
    SetPrice {
        /// Ingredient name
        name: String,
        /// New manual price per base unit
        #[arg(short, long)]
        price: Option<f64>,
        /// Clear the manual price instead
        #[arg(long, conflicts_with = "price")]
        clear: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an ingredient (refused while purchases or recipes use it)
    Delete {
        /// Ingredient name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PurchaseCommands {
    /// Log a purchase of an ingredient
    Log {
        /// Ingredient name
        ingredient: String,
        /// Price paid per base unit
        price: f64,
        /// Loss (waste) percentage, 0-99
        #[arg(short, long, default_value = "0")]
        loss: f64,
        /// Supplier name
        #[arg(short, long)]
        supplier: Option<String>,
        /// Purchase date (YYYY-MM-DD, DD/MM/YYYY, today/yesterday; default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List purchases, newest first
    List {
        /// Only purchases of this ingredient
        #[arg(short, long)]
        ingredient: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a purchase by ID
    Delete {
        /// Purchase ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import purchases from a CSV file
    Import {
        /// Path to the CSV file (columns: Date, Ingredient, Price, Loss %, Supplier, Unit)
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create a new recipe
    Create {
        /// Recipe name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an ingredient line to a recipe
    AddItem {
        /// Recipe name
        recipe: String,
        /// Ingredient name
        ingredient: String,
        /// Quantity (e.g. "500g", "2 kg"; defaults to the ingredient's base unit)
        quantity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an ingredient line from a recipe
    RemoveItem {
        /// Recipe name
        recipe: String,
        /// Ingredient name to remove
        ingredient: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the quantity of an ingredient line (keeps its unit)
    SetQuantity {
        /// Recipe name
        recipe: String,
        /// Ingredient name
        ingredient: String,
        /// New quantity, in the line's current unit
        quantity: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with current line costs and total
    Show {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes with their current totals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe (refused while a dish uses it)
    Delete {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export a costed recipe as CSV
    Export {
        /// Recipe name
        recipe: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DishCommands {
    /// Create a new dish
    Create {
        /// Dish name
        name: String,
        /// Finishing cost percentage added on top of ingredient cost
        #[arg(short, long, default_value = "0")]
        finishing: f64,
        /// Target margin percentage, taken on the sale price (0-99)
        #[arg(short, long, default_value = "0")]
        margin: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipe to a dish
    AddRecipe {
        /// Dish name
        dish: String,
        /// Recipe name
        recipe: String,
        /// Portion multiplier for the recipe
        #[arg(short, long, default_value = "1")]
        portions: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a recipe from a dish
    RemoveRecipe {
        /// Dish name
        dish: String,
        /// Recipe name to remove
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a dish's finishing cost and/or margin
    SetPricing {
        /// Dish name
        dish: String,
        /// New finishing cost percentage
        #[arg(short, long)]
        finishing: Option<f64>,
        /// New margin percentage (0-99)
        #[arg(short, long)]
        margin: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a dish with component costs and suggested price
    Show {
        /// Dish name
        dish: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all dishes with costs and suggested prices
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a dish
    Delete {
        /// Dish name
        dish: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Export everything as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a JSON backup (merge; existing records are kept)
    Import {
        /// Path to the backup file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Quote {
            ingredient,
            quantity,
            json,
        } => cmd_quote(&db, &ingredient, &quantity, json),
        Commands::Ingredient { command } => match command {
            IngredientCommands::Add {
                name,
                unit,
                price,
                json,
            } => cmd_ingredient_add(&db, &name, &unit, price, json),
            IngredientCommands::List { search, json } => {
                cmd_ingredient_list(&db, search.as_deref(), json)
            }
            IngredientCommands::SetPrice {
                name,
                price,
                clear,
                json,
            } => cmd_ingredient_set_price(&db, &name, price, clear, json),
            IngredientCommands::Delete { name, json } => cmd_ingredient_delete(&db, &name, json),
        },
        Commands::Purchase { command } => match command {
            PurchaseCommands::Log {
                ingredient,
                price,
                loss,
                supplier,
                date,
                json,
            } => cmd_purchase_log(&db, &ingredient, price, loss, supplier, date, json),
            PurchaseCommands::List { ingredient, json } => {
                cmd_purchase_list(&db, ingredient.as_deref(), json)
            }
            PurchaseCommands::Delete { id, json } => cmd_purchase_delete(&db, id, json),
            PurchaseCommands::Import {
                file,
                dry_run,
                json,
            } => cmd_purchase_import(&db, &file, dry_run, json),
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Create { name, json } => cmd_recipe_create(&db, &name, json),
            RecipeCommands::AddItem {
                recipe,
                ingredient,
                quantity,
                json,
            } => cmd_recipe_add_item(&db, &recipe, &ingredient, &quantity, json),
            RecipeCommands::RemoveItem {
                recipe,
                ingredient,
                json,
            } => cmd_recipe_remove_item(&db, &recipe, &ingredient, json),
            RecipeCommands::SetQuantity {
                recipe,
                ingredient,
                quantity,
                json,
            } => cmd_recipe_set_quantity(&db, &recipe, &ingredient, quantity, json),
            RecipeCommands::Show { recipe, json } => cmd_recipe_show(&db, &recipe, json),
            RecipeCommands::List { json } => cmd_recipe_list(&db, json),
            RecipeCommands::Delete { recipe, json } => cmd_recipe_delete(&db, &recipe, json),
            RecipeCommands::Export {
                recipe,
                output,
                json,
            } => cmd_recipe_export(&db, &recipe, output.as_deref(), json),
        },
        Commands::Dish { command } => match command {
            DishCommands::Create {
                name,
                finishing,
                margin,
                json,
            } => cmd_dish_create(&db, &name, finishing, margin, json),
            DishCommands::AddRecipe {
                dish,
                recipe,
                portions,
                json,
            } => cmd_dish_add_recipe(&db, &dish, &recipe, portions, json),
            DishCommands::RemoveRecipe { dish, recipe, json } => {
                cmd_dish_remove_recipe(&db, &dish, &recipe, json)
            }
            DishCommands::SetPricing {
                dish,
                finishing,
                margin,
                json,
            } => cmd_dish_set_pricing(&db, &dish, finishing, margin, json),
            DishCommands::Show { dish, json } => cmd_dish_show(&db, &dish, json),
            DishCommands::List { json } => cmd_dish_list(&db, json),
            DishCommands::Delete { dish, json } => cmd_dish_delete(&db, &dish, json),
        },
        Commands::Backup { command } => match command {
            BackupCommands::Export { output, json } => {
                cmd_backup_export(&db, output.as_deref(), json)
            }
            BackupCommands::Import { file, json } => cmd_backup_import(&db, &file, json),
        },
    }
}
