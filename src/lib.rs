use anyhow::Context;
use axum::extract::FromRef;

pub mod commands;
pub mod config;
pub mod controllers;
pub mod db;
pub mod error;
pub mod markdown;
pub mod models;
pub mod slug;
pub mod types;
pub mod views;

pub use error::{Error, Result};

use config::Config;
use db::Database;

/// Shared state handed to every request handler.
#[derive(Clone, FromRef)]
pub struct App {
    pub config: Config,
    pub database: Database,
}

impl App {
    /// Connect to the configured database and bring its schema up to date.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let database = Database::connect(&config.database.url)
            .await
            .context("failed to connect to database")?;
        database
            .migrate()
            .await
            .context("failed to migrate database")?;

        Ok(App { config, database })
    }
}
