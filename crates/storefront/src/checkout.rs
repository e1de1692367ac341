//! Turning a signed-in cart into an order.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use palma_core::{Identity, IdentityId, OrderId, OrderStatus, PaymentMethod, ProductId};
use rand::distr::{Alphanumeric, SampleString};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument};

use crate::cart::CartService;
use crate::db::RepositoryError;

/// Errors that can occur when placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("sign in to place an order")]
    NotSignedIn,

    #[error("cart is empty")]
    EmptyCart,

    #[error("shipping {0} is required")]
    InvalidShipping(&'static str),

    #[error("failed to save order: {0}")]
    Store(#[from] RepositoryError),
}

/// Where an order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingDetails {
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: Option<String>,
    pub phone: String,
}

impl ShippingDetails {
    /// Trim every field and reject blank required ones.
    fn normalized(&self) -> Result<Self, CheckoutError> {
        fn required(value: &str, field: &'static str) -> Result<String, CheckoutError> {
            let value = value.trim();
            if value.is_empty() {
                return Err(CheckoutError::InvalidShipping(field));
            }
            Ok(value.to_string())
        }

        Ok(Self {
            address: required(&self.address, "address")?,
            city: required(&self.city, "city")?,
            state: required(&self.state, "state")?,
            postal_code: self
                .postal_code
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string),
            phone: required(&self.phone, "phone")?,
        })
    }
}

/// An order ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user_id: IdentityId,
    pub order_number: String,
    /// Cart subtotal. Shipping is not included.
    pub total_amount: Decimal,
    pub shipping: ShippingDetails,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub items: Vec<OrderItemDraft>,
}

/// One order line, priced at the time of purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemDraft {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price_at_purchase: Decimal,
}

/// Summary of a placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub order_number: String,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
}

/// Persistence for placed orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Save the order and its items atomically.
    async fn create_order(&self, draft: &OrderDraft) -> Result<OrderId, RepositoryError>;
}

/// Order store that keeps orders in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<Vec<OrderDraft>>>,
    failing: Arc<RwLock<bool>>,
}

impl InMemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders saved so far, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<OrderDraft> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make subsequent saves fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write().unwrap_or_else(PoisonError::into_inner) = failing;
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, draft: &OrderDraft) -> Result<OrderId, RepositoryError> {
        if *self.failing.read().unwrap_or_else(PoisonError::into_inner) {
            return Err(RepositoryError::Conflict("order store offline".to_string()));
        }
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        if orders.iter().any(|o| o.order_number == draft.order_number) {
            return Err(RepositoryError::Conflict(format!(
                "order number {} already exists",
                draft.order_number
            )));
        }
        orders.push(draft.clone());
        let id = i32::try_from(orders.len()).unwrap_or(i32::MAX);
        Ok(OrderId::new(id))
    }
}

/// Generate a human-facing order number such as `ORD-7KQ2M9XAB`.
#[must_use]
pub fn generate_order_number() -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::rng(), 9);
    format!("ORD-{}", suffix.to_uppercase())
}

/// Places orders from the session cart.
pub struct Checkout {
    cart: Arc<CartService>,
    orders: Arc<dyn OrderStore>,
    shipping_fee: Decimal,
}

impl Checkout {
    #[must_use]
    pub fn new(cart: Arc<CartService>, orders: Arc<dyn OrderStore>, shipping_fee: Decimal) -> Self {
        Self {
            cart,
            orders,
            shipping_fee,
        }
    }

    /// Flat shipping fee added to every order total.
    #[must_use]
    pub const fn shipping_fee(&self) -> Decimal {
        self.shipping_fee
    }

    /// Place an order for the current cart and clear the cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if the shopper is anonymous, the cart is empty,
    /// shipping details are incomplete, or the order could not be saved. The
    /// cart is left untouched on error.
    #[instrument(skip(self, shipping))]
    pub async fn place_order(
        &self,
        shipping: &ShippingDetails,
        payment_method: PaymentMethod,
    ) -> Result<PlacedOrder, CheckoutError> {
        let Identity::Authenticated(user_id) = self.cart.identity() else {
            return Err(CheckoutError::NotSignedIn);
        };

        let snapshot = self.cart.snapshot();
        if snapshot.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let shipping = shipping.normalized()?;

        let subtotal = snapshot.total_price();
        let draft = OrderDraft {
            user_id,
            order_number: generate_order_number(),
            total_amount: subtotal,
            shipping,
            payment_method,
            status: OrderStatus::Pending,
            items: snapshot
                .iter()
                .map(|line| OrderItemDraft {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    price_at_purchase: line.unit_price,
                })
                .collect(),
        };

        let id = self.orders.create_order(&draft).await?;
        info!(
            order_id = %id,
            order_number = %draft.order_number,
            items = draft.items.len(),
            %subtotal,
            "Order placed"
        );

        self.cart.clear().await;

        Ok(PlacedOrder {
            id,
            order_number: draft.order_number,
            subtotal,
            shipping_fee: self.shipping_fee,
            total: subtotal + self.shipping_fee,
        })
    }
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("shipping_fee", &self.shipping_fee)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use palma_core::LineDetails;

    use super::*;
    use crate::cart::{InMemoryLocalStore, InMemoryRemoteCartStore};
    use crate::catalog::{InMemoryCatalog, sample_product};

    struct Fixture {
        cart: Arc<CartService>,
        remote: InMemoryRemoteCartStore,
        orders: InMemoryOrderStore,
        checkout: Checkout,
    }

    fn fixture() -> Fixture {
        let remote = InMemoryRemoteCartStore::new();
        let cart = Arc::new(CartService::new(
            Arc::new(InMemoryCatalog::with_products([sample_product(
                1,
                "Extra Virgin 500ml",
                Decimal::from(1000),
            )])),
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(remote.clone()),
        ));
        let orders = InMemoryOrderStore::new();
        let checkout = Checkout::new(
            Arc::clone(&cart),
            Arc::new(orders.clone()),
            Decimal::from(1500),
        );
        Fixture {
            cart,
            remote,
            orders,
            checkout,
        }
    }

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            address: " 12 Palm Avenue ".to_string(),
            city: "Lagos".to_string(),
            state: "Lagos".to_string(),
            postal_code: Some("  ".to_string()),
            phone: "+2348000000000".to_string(),
        }
    }

    fn user(id: &str) -> IdentityId {
        IdentityId::parse(id).unwrap()
    }

    async fn add_two(cart: &CartService) {
        let details = LineDetails {
            name: "Extra Virgin 500ml".to_string(),
            unit_price: Decimal::from(1000),
            image_ref: "🫒".to_string(),
        };
        cart.add_line(ProductId::new(1), details.clone()).await;
        cart.add_line(ProductId::new(1), details).await;
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        let suffix = &number[4..];
        assert_eq!(suffix.len(), 9);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[tokio::test]
    async fn test_anonymous_checkout_is_rejected() {
        let f = fixture();
        add_two(&f.cart).await;
        let err = f
            .checkout
            .place_order(&shipping(), PaymentMethod::Paystack)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotSignedIn));
        assert_eq!(f.cart.total_items(), 2);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let f = fixture();
        f.cart.on_identity_changed(Identity::from(user("u1"))).await;
        let err = f
            .checkout
            .place_order(&shipping(), PaymentMethod::Paystack)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_blank_shipping_field_is_rejected() {
        let f = fixture();
        f.cart.on_identity_changed(Identity::from(user("u1"))).await;
        add_two(&f.cart).await;

        let mut details = shipping();
        details.city = "   ".to_string();
        let err = f
            .checkout
            .place_order(&details, PaymentMethod::Paystack)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidShipping("city")));
        assert!(f.orders.orders().is_empty());
    }

    #[tokio::test]
    async fn test_place_order_saves_and_clears_cart() {
        let f = fixture();
        f.cart.on_identity_changed(Identity::from(user("u1"))).await;
        add_two(&f.cart).await;

        let placed = f
            .checkout
            .place_order(&shipping(), PaymentMethod::CashOnDelivery)
            .await
            .unwrap();

        assert_eq!(placed.subtotal, Decimal::from(2000));
        assert_eq!(placed.shipping_fee, Decimal::from(1500));
        assert_eq!(placed.total, Decimal::from(3500));

        let orders = f.orders.orders();
        assert_eq!(orders.len(), 1);
        let order = &orders[0];
        assert_eq!(order.order_number, placed.order_number);
        assert_eq!(order.total_amount, Decimal::from(2000));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.shipping.address, "12 Palm Avenue");
        assert_eq!(order.shipping.postal_code, None);
        assert_eq!(
            order.items,
            vec![OrderItemDraft {
                product_id: ProductId::new(1),
                quantity: 2,
                price_at_purchase: Decimal::from(1000),
            }]
        );

        assert!(f.cart.snapshot().is_empty());
        assert!(f.remote.rows_for(&user("u1")).is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_keeps_cart() {
        let f = fixture();
        f.cart.on_identity_changed(Identity::from(user("u1"))).await;
        add_two(&f.cart).await;
        f.orders.set_failing(true);

        let err = f
            .checkout
            .place_order(&shipping(), PaymentMethod::Paystack)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Store(_)));
        assert_eq!(f.cart.total_items(), 2);
        assert_eq!(f.remote.rows_for(&user("u1")), vec![(ProductId::new(1), 2)]);
    }
}
