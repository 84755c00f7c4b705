use dotenvy::dotenv;
use product_catalog::{
    config::{catalog, database, storage::StorageConfig},
    core::{
        catalog::{ProductQuery, Visibility, list_products},
        category::{list_categories_with_subcategories, seed_catalog},
    },
    errors::Result,
    storage::{AttachmentStore, FilesystemBackend},
};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Open the database and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 4. Seed categories if a seed file is present
    if Path::new(catalog::DEFAULT_CONFIG_PATH).exists() {
        let config = catalog::load_default_config()?;
        seed_catalog(&db, &config)
            .await
            .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;
    } else {
        warn!(file = catalog::DEFAULT_CONFIG_PATH, "no seed file found, skipping category seeding");
    }

    // 5. Check the attachment storage root before anything gets uploaded
    let storage = StorageConfig::from_env();
    FilesystemBackend::new(&storage.root)
        .validate()
        .await
        .inspect_err(|e| error!("Attachment storage is not usable: {}", e))?;
    let store = AttachmentStore::from_config(&storage);
    info!(root = %storage.root.display(), public_url = %storage.public_url, "attachment storage ready");

    // 6. Report what the catalog holds
    let trees = list_categories_with_subcategories(&db).await?;
    let products = list_products(
        &db,
        &ProductQuery {
            visibility: Visibility::Everything,
            per_page: Some(1),
            ..Default::default()
        },
    )
    .await?;
    info!(
        categories = trees.len(),
        subcategories = trees.iter().map(|t| t.subcategories.len()).sum::<usize>(),
        products = products.total,
        ?store,
        "catalog ready"
    );

    Ok(())
}
