//! Demo account seeder for Tallyflow development.
//!
//! Creates a fixed set of owners if no account with that owner exists yet,
//! so running it twice is harmless.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::info;

use tallyflow_core::account::NewAccount;
use tallyflow_db::AccountRepository;
use tallyflow_db::entities::accounts;
use tallyflow_shared::AppConfig;
use tallyflow_shared::types::Currency;

/// `(owner, currency, opening balance in minor units, scale)`.
const DEMO_ACCOUNTS: [(&str, Currency, i64, u32); 4] = [
    ("Alice Operating", Currency::Usd, 1_000_000, 2),
    ("Bob Savings", Currency::Usd, 250_000, 2),
    ("Carol Payroll", Currency::Usd, 0, 2),
    ("Dewi Rupiah", Currency::Idr, 15_000_000, 0),
];

async fn owner_exists(db: &DatabaseConnection, owner: &str) -> anyhow::Result<bool> {
    let found = accounts::Entity::find()
        .filter(accounts::Column::Owner.eq(owner))
        .one(db)
        .await?;
    Ok(found.is_some())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("seeder=info,tallyflow=info")
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = Arc::new(
        tallyflow_db::connect(&config.database)
            .await
            .context("Failed to connect to database")?,
    );
    let repo = AccountRepository::new(db.clone());

    for (owner, currency, minor_units, scale) in DEMO_ACCOUNTS {
        if owner_exists(&db, owner).await? {
            info!(owner, "Account already exists, skipping");
            continue;
        }
        let account = NewAccount::new(owner, currency, Decimal::new(minor_units, scale))?;
        let created = repo.create_account(&account).await?;
        info!(
            account_id = created.id,
            owner,
            balance = %created.balance,
            "Seeded account"
        );
    }

    info!("Seeding complete");
    Ok(())
}
