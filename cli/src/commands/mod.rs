mod backup;
mod dish;
mod helpers;
mod ingredient;
mod purchase;
mod quote;
mod recipe;

use anyhow::Result;
use std::process;

use ficha_core::db::Database;
use ficha_core::models::{Dish, Ingredient, Recipe};

use helpers::json_error;

pub(crate) use backup::{cmd_backup_export, cmd_backup_import};
pub(crate) use dish::{
    cmd_dish_add_recipe, cmd_dish_create, cmd_dish_delete, cmd_dish_list, cmd_dish_remove_recipe,
    cmd_dish_set_pricing, cmd_dish_show,
};
pub(crate) use ingredient::{
    cmd_ingredient_add, cmd_ingredient_delete, cmd_ingredient_list, cmd_ingredient_set_price,
};
pub(crate) use purchase::{
    cmd_purchase_delete, cmd_purchase_import, cmd_purchase_list, cmd_purchase_log,
};
pub(crate) use quote::cmd_quote;
pub(crate) use recipe::{
    cmd_recipe_add_item, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_export, cmd_recipe_list,
    cmd_recipe_remove_item, cmd_recipe_set_quantity, cmd_recipe_show,
};

/// Look up an ingredient by name. Not-found is a user-facing miss (exit 2),
/// not an internal error.
pub(super) fn resolve_ingredient(db: &Database, name: &str, json: bool) -> Result<Ingredient> {
    match db.get_ingredient_by_name(name)? {
        Some(ingredient) => Ok(ingredient),
        None => {
            let message = format!("Ingredient '{name}' not found. Add it with: ficha ingredient add");
            if json {
                println!("{}", json_error(&message));
            } else {
                eprintln!("{message}");
            }
            process::exit(2);
        }
    }
}

pub(super) fn resolve_recipe(db: &Database, name: &str, json: bool) -> Result<Recipe> {
    match db.get_recipe_by_name(name)? {
        Some(recipe) => Ok(recipe),
        None => {
            let message = format!("Recipe '{name}' not found");
            if json {
                println!("{}", json_error(&message));
            } else {
                eprintln!("{message}");
            }
            process::exit(2);
        }
    }
}

pub(super) fn resolve_dish(db: &Database, name: &str, json: bool) -> Result<Dish> {
    match db.get_dish_by_name(name)? {
        Some(dish) => Ok(dish),
        None => {
            let message = format!("Dish '{name}' not found");
            if json {
                println!("{}", json_error(&message));
            } else {
                eprintln!("{message}");
            }
            process::exit(2);
        }
    }
}
