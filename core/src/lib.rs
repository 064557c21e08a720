//! Core library for the ficha kitchen-costing tool.
//!
//! Everything costing-related lives here: ingredient, purchase, recipe, and
//! dish records in `SQLite`, the pure pricing engine, and CSV/JSON import
//! and export. Front ends stay thin.

pub mod csv_io;
pub mod db;
pub mod models;
pub mod pricing;
pub mod service;
pub mod units;
