//! Catalog commands.

use palma_storefront::catalog::Catalog;
use palma_storefront::config::StorefrontConfig;
use palma_storefront::db::PgCatalog;
use palma_storefront::error::AppError;
use palma_core::Price;

/// Print active products, newest first.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn list(config: &StorefrontConfig) -> Result<(), AppError> {
    let pool = super::connect(config).await?;
    let products = PgCatalog::new(pool.clone()).list_active().await?;

    #[allow(clippy::print_stdout)]
    {
        if products.is_empty() {
            println!("No active products.");
        }
        for product in &products {
            let stock = if product.in_stock() {
                format!("{} in stock", product.stock)
            } else {
                "out of stock".to_string()
            };
            println!(
                "{:>5}  {:<32} {:>5}ml  {:>12}  {}",
                product.id,
                product.name,
                product.size_ml,
                Price::from_amount(product.price).to_string(),
                stock
            );
        }
    }

    pool.close().await;
    Ok(())
}
