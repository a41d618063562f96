//! Cart store against the stub API.

use petverse_client::ToastLevel;
use petverse_client::cart::{CartError, QuantityChange};
use petverse_client::catalog::Product;
use petverse_core::{Email, ProductId};
use petverse_integration_tests::{Failure, StubApi, product_json};
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn product(id: &str, name: &str, price: f64, discount: f64) -> Product {
    serde_json::from_value(product_json(id, name, price, discount)).unwrap()
}

#[tokio::test]
async fn test_add_to_cart_totals_match_server_echo() {
    let stub = StubApi::start().await;
    let mut client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart().clone();

    let rope = product("p1", "Rope Toy", 19.99, 10.0);
    let bowl = product("p2", "Steel Bowl", 10.0, 33.0);

    cart.add_to_cart(&rope, None).await.unwrap();
    cart.add_to_cart(&rope, None).await.unwrap();
    let local = cart.add_to_cart(&bowl, None).await.unwrap();

    let server = stub
        .state()
        .cart(&Email::parse("kim@example.com").unwrap())
        .unwrap();
    assert_eq!(local.cart_items, server.cart_items);
    assert_eq!(local.total_items, 3);
    assert_eq!(local.total_items, server.total_items);
    // 2 x 17.99 + 6.70
    assert_eq!(local.total_price, dec("42.68"));
    assert!(local.totals_match());

    assert_eq!(cart.total_items().await, 3);
    assert_eq!(cart.total_price().await, dec("42.68"));

    let toasts = client.drain_toasts();
    assert_eq!(toasts.len(), 3);
    assert!(toasts.iter().all(|t| t.level == ToastLevel::Success));
}

#[tokio::test]
async fn test_remove_refetches_and_totals_follow() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart();

    cart.add_to_cart(&product("p1", "Rope Toy", 19.99, 10.0), None)
        .await
        .unwrap();
    cart.add_to_cart(&product("p2", "Steel Bowl", 10.0, 0.0), None)
        .await
        .unwrap();

    let after = cart
        .remove_from_cart(&ProductId::new("p1"), None)
        .await
        .unwrap();
    assert_eq!(after.cart_items.len(), 1);
    assert_eq!(after.total_items, 1);
    assert_eq!(after.total_price, dec("10.00"));
    assert!(cart.get_item(&ProductId::new("p1"), None).await.is_none());
    assert_eq!(stub.state().hits("GET /carts"), 1);
}

#[tokio::test]
async fn test_get_item_distinguishes_variants() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart();
    let harness = product("p9", "Harness", 30.0, 0.0);

    cart.add_to_cart(&harness, Some("small")).await.unwrap();
    cart.add_to_cart(&harness, Some("large")).await.unwrap();
    cart.add_to_cart(&harness, Some("large")).await.unwrap();

    let id = ProductId::new("p9");
    assert_eq!(cart.get_item(&id, Some("small")).await.unwrap().quantity, 1);
    assert_eq!(cart.get_item(&id, Some("large")).await.unwrap().quantity, 2);
    assert!(cart.get_item(&id, None).await.is_none());
    assert!(cart.get_item(&id, Some("medium")).await.is_none());
    assert!(
        cart.get_item(&ProductId::new("p404"), Some("small"))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_quantity_changes_and_clear() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart();
    cart.add_to_cart(&product("p1", "Rope Toy", 5.0, 0.0), None)
        .await
        .unwrap();

    let id = ProductId::new("p1");
    let up = cart
        .update_quantity(&QuantityChange::increase(id.clone(), None))
        .await
        .unwrap();
    assert_eq!(up.total_items, 2);
    assert_eq!(up.total_price, dec("10.00"));

    let down = cart
        .update_quantity(&QuantityChange::decrease(id.clone(), None))
        .await
        .unwrap();
    assert_eq!(down.get_item(&id, None).unwrap().quantity, 1);

    let cleared = cart.clear_cart().await.unwrap();
    assert!(cleared.is_empty());
    assert_eq!(cleared.total_items, 0);
    assert_eq!(cleared.total_price, Decimal::ZERO);
}

#[tokio::test]
async fn test_update_cart_replaces_line() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart();
    cart.add_to_cart(&product("p1", "Rope Toy", 5.0, 0.0), None)
        .await
        .unwrap();

    let mut item = cart.get_item(&ProductId::new("p1"), None).await.unwrap();
    item.quantity = 4;
    let updated = cart.update_cart(&item).await.unwrap();
    assert_eq!(updated.total_items, 4);
    assert_eq!(updated.total_price, dec("20.00"));

    item.quantity = 0;
    assert!(matches!(
        cart.update_cart(&item).await,
        Err(CartError::InvalidQuantity(0))
    ));
}

#[tokio::test]
async fn test_add_without_login_sends_nothing() {
    let stub = StubApi::start().await;
    let mut client = stub.client();

    let err = client
        .app
        .cart()
        .add_to_cart(&product("p1", "Rope Toy", 5.0, 0.0), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::NotSignedIn));
    assert!(err.needs_login());
    assert_eq!(stub.state().hits("POST /carts"), 0);

    let toasts = client.drain_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Info);
}

#[tokio::test]
async fn test_fetch_failure_resets_to_empty_with_one_toast() {
    let stub = StubApi::start().await;
    let mut client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart().clone();
    cart.add_to_cart(&product("p1", "Rope Toy", 5.0, 0.0), None)
        .await
        .unwrap();
    client.drain_toasts();

    stub.state().fail(Failure::CartFetch);
    let err = cart.fetch_cart().await.unwrap_err();
    assert!(matches!(err, CartError::Api(_)));

    let snapshot = cart.snapshot().await;
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.total_items, 0);

    let toasts = client.drain_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Error);
    assert!(toasts[0].message.contains("database unavailable"));

    stub.state().recover(Failure::CartFetch);
    assert_eq!(cart.fetch_cart().await.unwrap().total_items, 1);
}

#[tokio::test]
async fn test_add_failure_keeps_snapshot_and_reports_once() {
    let stub = StubApi::start().await;
    let mut client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart().clone();
    cart.add_to_cart(&product("p1", "Rope Toy", 5.0, 0.0), None)
        .await
        .unwrap();
    client.drain_toasts();

    stub.state().fail(Failure::CartAdd);
    assert!(
        cart.add_to_cart(&product("p2", "Bowl", 3.0, 0.0), None)
            .await
            .is_err()
    );

    assert_eq!(cart.total_items().await, 1);
    let toasts = client.drain_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Error);
}

#[tokio::test]
async fn test_missing_cart_is_empty() {
    let stub = StubApi::start().await;
    let mut client = stub.signed_in("new@example.com").await;

    let cart = client.app.cart().fetch_cart().await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(cart.owner_email.unwrap().as_str(), "new@example.com");
    assert!(client.drain_toasts().is_empty());
}

#[tokio::test]
async fn test_user_change_discards_snapshot() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart();
    cart.add_to_cart(&product("p1", "Rope Toy", 5.0, 0.0), None)
        .await
        .unwrap();
    assert_eq!(cart.total_items().await, 1);

    client.app.auth().logout();
    assert!(cart.snapshot().await.is_empty());

    client
        .app
        .auth()
        .sign_in(petverse_client::SessionUser::new(
            Email::parse("lee@example.com").unwrap(),
        ))
        .await
        .unwrap();
    let snapshot = cart.snapshot().await;
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.owner_email.unwrap().as_str(), "lee@example.com");
}

#[tokio::test]
async fn test_decrement_reads_server_quantity() {
    let stub = StubApi::start().await;
    let other_tab = stub.signed_in("kim@example.com").await;
    let rope = product("p1", "Rope Toy", 5.0, 0.0);
    other_tab.app.cart().add_to_cart(&rope, None).await.unwrap();
    other_tab.app.cart().add_to_cart(&rope, None).await.unwrap();

    // A fresh client has never loaded the cart.
    let client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart();
    let id = ProductId::new("p1");

    let after = cart.decrement(&id, None).await.unwrap();
    assert_eq!(after.get_item(&id, None).unwrap().quantity, 1);
    assert_eq!(stub.state().hits("PATCH /carts/increase"), 1);

    let after = cart.decrement(&id, None).await.unwrap();
    assert!(after.get_item(&id, None).is_none());
    assert_eq!(stub.state().hits("PATCH /carts/increase"), 1);
    assert_eq!(stub.state().hits("DELETE /carts/item"), 1);

    let unchanged = cart.decrement(&id, None).await.unwrap();
    assert!(unchanged.is_empty());
    assert_eq!(stub.state().hits("DELETE /carts/item"), 1);
}

#[tokio::test]
async fn test_session_sync_refetches_for_new_user() {
    let stub = StubApi::start().await;
    let lee = stub.signed_in("lee@example.com").await;
    lee.app
        .cart()
        .add_to_cart(&product("p1", "Rope Toy", 5.0, 0.0), None)
        .await
        .unwrap();

    let client = stub.signed_in("kim@example.com").await;
    let cart = client.app.cart();
    let sync = cart.spawn_session_sync();

    client
        .app
        .auth()
        .sign_in(petverse_client::SessionUser::new(
            Email::parse("lee@example.com").unwrap(),
        ))
        .await
        .unwrap();

    let synced = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            let snapshot = cart.snapshot().await;
            if snapshot.total_items > 0 {
                return snapshot;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(synced.owner_email.unwrap().as_str(), "lee@example.com");
    assert_eq!(synced.total_items, 1);
    sync.abort();
}
