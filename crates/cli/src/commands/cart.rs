//! Cart commands.
//!
//! Without `--user` the anonymous cart in `PALMA_LOCAL_STORE_DIR` is used;
//! with it, the signed-in cart in `PostgreSQL`.

use palma_core::{CartSnapshot, Price, ProductId};
use palma_storefront::catalog::Catalog;
use palma_storefront::config::StorefrontConfig;
use palma_storefront::error::AppError;

use crate::CartAction;

/// Run a cart command for the given user (or the anonymous cart).
///
/// # Errors
///
/// Returns an error if the user id is blank, the database is unreachable, or a
/// product to add does not exist.
pub async fn run(
    config: StorefrontConfig,
    user: Option<&str>,
    action: CartAction,
) -> Result<(), AppError> {
    let identity = super::parse_identity(user)?;
    let storefront = super::open_session(config, identity).await?;
    let cart = storefront.cart();

    match action {
        CartAction::Show => {}
        CartAction::Add { product_id } => {
            let product_id = ProductId::new(product_id);
            let product = storefront
                .catalog()
                .get_by_id(product_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
            cart.add_line(product_id, product.line_details()).await;
        }
        CartAction::Remove { product_id } => cart.remove_line(ProductId::new(product_id)).await,
        CartAction::Set {
            product_id,
            quantity,
        } => cart.set_quantity(ProductId::new(product_id), quantity).await,
        CartAction::Clear => cart.clear().await,
    }

    print_cart(&cart.snapshot());
    storefront.shutdown().await;
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart(snapshot: &CartSnapshot) {
    if snapshot.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    for line in snapshot {
        println!(
            "{:>5}  {} {:<32} x{:<4} {:>12}",
            line.product_id,
            line.image_ref,
            line.name,
            line.quantity,
            Price::from_amount(line.line_total()).to_string()
        );
    }
    println!(
        "{} item(s), subtotal {}",
        snapshot.total_items(),
        Price::from_amount(snapshot.total_price())
    );
}
