//! Checkout command.

use palma_core::{Identity, IdentityId, PaymentMethod, Price};
use palma_storefront::checkout::ShippingDetails;
use palma_storefront::config::StorefrontConfig;
use palma_storefront::error::AppError;

/// Place an order for `user`'s signed-in cart.
///
/// # Errors
///
/// Returns an error if the user id is blank, the cart is empty, shipping
/// details are incomplete, or the order could not be saved.
pub async fn place_order(
    config: StorefrontConfig,
    user: &str,
    shipping: &ShippingDetails,
    payment: PaymentMethod,
) -> Result<(), AppError> {
    let user = IdentityId::parse(user).map_err(|e| AppError::BadRequest(format!("--user: {e}")))?;
    let storefront = super::open_session(config, Identity::from(user)).await?;

    let result = storefront.checkout().place_order(shipping, payment).await;
    storefront.shutdown().await;
    let placed = result?;

    #[allow(clippy::print_stdout)]
    {
        println!("Order {} placed ({payment}).", placed.order_number);
        println!("  Subtotal: {}", Price::from_amount(placed.subtotal));
        println!("  Shipping: {}", Price::from_amount(placed.shipping_fee));
        println!("  Total:    {}", Price::from_amount(placed.total));
    }
    Ok(())
}
