//! Cart reconciliation across identity changes and store failures.
//!
//! Run with: cargo test -p palma-integration-tests --test cart_reconciliation

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use palma_core::{Identity, ProductId};
use palma_integration_tests::{TestContext, details, signed_in, user};
use palma_storefront::cart::{LocalStore, RemoteWrite, decode_blob};
use palma_storefront::config::DEFAULT_CART_KEY;
use rust_decimal::Decimal;

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_guest_cart_is_discarded_on_sign_in() {
    let ctx = TestContext::new();
    ctx.cart.load().await;

    ctx.add(1).await;
    ctx.add(1).await;
    assert_eq!(ctx.cart.total_items(), 2);
    assert_eq!(ctx.cart.total_price(), Decimal::from(2000));

    let stored = decode_blob(&ctx.local.peek(DEFAULT_CART_KEY).unwrap()).unwrap();
    assert_eq!(stored.total_items(), 2);

    ctx.cart.on_identity_changed(signed_in("u1")).await;

    assert!(ctx.cart.snapshot().is_empty());
    assert_eq!(ctx.cart.total_items(), 0);
    assert!(ctx.local.peek(DEFAULT_CART_KEY).is_none());
    // Nothing was carried over
    assert!(ctx.remote.rows_for(&user("u1")).is_empty());
    assert!(ctx.remote.writes().is_empty());
}

#[tokio::test]
async fn test_stale_remote_rows_are_dropped_and_deleted() {
    let ctx = TestContext::new();
    ctx.remote.insert_row(&user("u1"), ProductId::new(5), 1);
    ctx.remote.insert_row(&user("u1"), ProductId::new(99), 3);

    ctx.cart.on_identity_changed(signed_in("u1")).await;
    ctx.cart.wait_for_cleanup().await;

    let snapshot = ctx.cart.snapshot();
    assert_eq!(snapshot.len(), 1);
    let line = snapshot.get(ProductId::new(5)).unwrap();
    assert_eq!(line.quantity, 1);
    assert_eq!(line.name, "Coconut Oil 750ml");
    assert_eq!(line.unit_price, Decimal::from(1800));
    assert!(snapshot.get(ProductId::new(99)).is_none());

    assert_eq!(
        ctx.remote.writes(),
        vec![RemoteWrite::DeleteRow {
            identity: user("u1"),
            product_id: ProductId::new(99),
        }]
    );
    assert_eq!(ctx.remote.rows_for(&user("u1")), vec![(ProductId::new(5), 1)]);
}

#[tokio::test]
async fn test_remote_cart_survives_a_new_session() {
    let ctx = TestContext::new();
    ctx.cart.on_identity_changed(signed_in("u1")).await;
    ctx.add(2).await;
    ctx.add(5).await;
    ctx.cart.set_quantity(ProductId::new(5), 3).await;

    // Another device signs in as the same user
    let other = TestContext::with_catalog(ctx.catalog.clone());
    for (product_id, quantity) in ctx.remote.rows_for(&user("u1")) {
        other.remote.insert_row(&user("u1"), product_id, quantity);
    }
    other.cart.on_identity_changed(signed_in("u1")).await;

    assert_eq!(other.cart.total_items(), 4);
    assert_eq!(
        other.cart.total_price(),
        Decimal::from(2500) + Decimal::from(3 * 1800)
    );
}

#[tokio::test]
async fn test_users_do_not_see_each_others_carts() {
    let ctx = TestContext::new();
    ctx.remote.insert_row(&user("u1"), ProductId::new(1), 2);
    ctx.remote.insert_row(&user("u2"), ProductId::new(2), 1);

    ctx.cart.on_identity_changed(signed_in("u1")).await;
    assert_eq!(ctx.cart.total_price(), Decimal::from(2000));

    ctx.cart.on_identity_changed(signed_in("u2")).await;
    assert_eq!(ctx.cart.total_price(), Decimal::from(2500));

    ctx.cart.clear().await;
    assert_eq!(ctx.remote.rows_for(&user("u1")), vec![(ProductId::new(1), 2)]);
    assert!(ctx.remote.rows_for(&user("u2")).is_empty());
}

#[tokio::test]
async fn test_sign_out_returns_to_a_fresh_local_cart() {
    let ctx = TestContext::new();
    ctx.cart.on_identity_changed(signed_in("u1")).await;
    ctx.add(1).await;

    ctx.cart.on_identity_changed(Identity::Anonymous).await;
    assert!(ctx.cart.snapshot().is_empty());

    ctx.add(2).await;
    ctx.cart.on_identity_changed(signed_in("u1")).await;
    assert_eq!(ctx.cart.total_items(), 1);
    assert!(ctx.cart.snapshot().get(ProductId::new(1)).is_some());
}

#[tokio::test]
async fn test_clear_then_reload_is_empty_for_both_stores() {
    let ctx = TestContext::new();
    ctx.add(1).await;
    ctx.cart.clear().await;
    ctx.cart.load().await;
    assert!(ctx.cart.snapshot().is_empty());

    ctx.cart.on_identity_changed(signed_in("u1")).await;
    ctx.add(1).await;
    ctx.add(2).await;
    ctx.cart.clear().await;
    ctx.cart.load().await;
    assert!(ctx.cart.snapshot().is_empty());
    assert_eq!(
        ctx.remote.writes().last(),
        Some(&RemoteWrite::DeleteAll {
            identity: user("u1")
        })
    );
}

#[tokio::test]
async fn test_local_blob_written_by_the_browser_is_loaded() {
    let ctx = TestContext::new();
    ctx.local
        .set(
            DEFAULT_CART_KEY,
            r#"[
                {"id": 1, "name": "Extra Virgin Olive Oil 500ml", "price": 1000, "quantity": 2, "image": "🫒"},
                {"id": 2, "name": "Red Palm Oil 1L", "price": "2500", "quantity": 0},
                {"id": 1, "name": "Duplicate", "price": 1000, "quantity": 1}
            ]"#,
        )
        .await
        .unwrap();

    ctx.cart.load().await;

    let snapshot = ctx.cart.snapshot();
    assert_eq!(snapshot.len(), 1);
    let line = snapshot.get(ProductId::new(1)).unwrap();
    assert_eq!(line.quantity, 3);
    assert_eq!(line.name, "Extra Virgin Olive Oil 500ml");
}

#[tokio::test]
async fn test_store_outages_never_reach_the_caller() {
    let ctx = TestContext::new();
    ctx.remote.insert_row(&user("u1"), ProductId::new(1), 1);
    ctx.remote.set_fail_on_read(true);
    ctx.remote.set_fail_on_write(true);

    ctx.cart.on_identity_changed(signed_in("u1")).await;
    assert!(ctx.cart.snapshot().is_empty());

    ctx.add(2).await;
    ctx.cart.set_quantity(ProductId::new(2), 5).await;
    assert_eq!(ctx.cart.total_items(), 5);

    ctx.remote.set_fail_on_read(false);
    ctx.remote.set_fail_on_write(false);
    ctx.cart.load().await;
    assert_eq!(ctx.cart.total_items(), 1);
}

#[tokio::test]
async fn test_catalog_outage_loads_empty_and_keeps_rows() {
    let ctx = TestContext::new();
    ctx.remote.insert_row(&user("u1"), ProductId::new(99), 3);
    ctx.catalog.set_failing(true);

    ctx.cart.on_identity_changed(signed_in("u1")).await;
    ctx.cart.wait_for_cleanup().await;

    assert!(ctx.cart.snapshot().is_empty());
    assert!(ctx.remote.writes().is_empty());

    ctx.catalog.set_failing(false);
    ctx.cart.load().await;
    ctx.cart.wait_for_cleanup().await;
    assert!(ctx.remote.rows_for(&user("u1")).is_empty());
}

#[tokio::test]
async fn test_observers_follow_loads_and_mutations() {
    let ctx = TestContext::new();
    ctx.remote.insert_row(&user("u1"), ProductId::new(5), 2);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let id = ctx.cart.subscribe(move |cart| {
        sink.lock().unwrap().push(cart.total_items());
    });

    ctx.add(1).await;
    ctx.cart.on_identity_changed(signed_in("u1")).await;
    ctx.cart.remove_line(ProductId::new(5)).await;
    ctx.cart.unsubscribe(id);
    ctx.add(1).await;

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 0]);
}

#[tokio::test]
async fn test_identity_listener_drives_reloads() {
    let ctx = TestContext::new();
    ctx.remote.insert_row(&user("u1"), ProductId::new(2), 4);
    ctx.cart.start_session(&ctx.identity).await;
    let _listener = ctx.cart.spawn_identity_listener(&ctx.identity);

    ctx.cart
        .add_line(ProductId::new(1), details("Guest pick", 1000))
        .await;

    ctx.identity.sign_in(user("u1"));
    wait_until(|| ctx.cart.total_items() == 4).await;
    assert_eq!(ctx.cart.identity(), signed_in("u1"));
    assert_eq!(ctx.cart.total_price(), Decimal::from(4 * 2500));

    ctx.identity.sign_out();
    wait_until(|| ctx.cart.identity().is_anonymous()).await;
    wait_until(|| ctx.cart.total_items() == 0).await;
    assert!(ctx.cart.snapshot().is_empty());
}
