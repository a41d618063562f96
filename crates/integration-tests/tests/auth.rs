//! Token issuance and forced logout on 401.

use petverse_client::{ApiError, AuthEvent, SessionUser};
use petverse_core::Email;
use petverse_integration_tests::{Failure, StubApi};
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test]
async fn test_sign_in_issues_token() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;

    let session = client.app.session();
    assert_eq!(session.current_email().unwrap().as_str(), "kim@example.com");
    assert!(session.token().is_some());
    assert_eq!(stub.state().hits("POST /jwt"), 1);
}

#[tokio::test]
async fn test_unauthorized_logs_out_and_redirects_once() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;
    let mut events = client.app.session().events();

    stub.state().fail(Failure::RejectTokens);

    let cart = client.app.cart();
    let payments = client.app.payments();
    let email = Email::parse("kim@example.com").unwrap();
    let (first, second, third) = tokio::join!(
        cart.fetch_cart(),
        payments.orders(),
        payments.my_payments(&email),
    );

    assert!(matches!(first, Err(petverse_client::CartError::Api(ApiError::Unauthorized(_)))));
    assert!(matches!(second, Err(ApiError::Unauthorized(_))));
    // Sent after the logout, so it goes out without a token and fails the same way.
    assert!(matches!(third, Err(ApiError::Unauthorized(_))));

    assert!(client.app.session().current_user().is_none());
    assert!(client.app.session().token().is_none());

    let mut redirects = Vec::new();
    loop {
        match events.try_recv() {
            Ok(AuthEvent::LoginRequired { redirect }) => redirects.push(redirect),
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("unexpected channel state: {e}"),
        }
    }
    assert_eq!(redirects, vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_sign_in_rearms_expiry() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;

    stub.state().fail(Failure::RejectTokens);
    assert!(client.app.payments().orders().await.is_err());
    assert!(client.app.session().current_user().is_none());

    stub.state().recover(Failure::RejectTokens);
    client
        .app
        .auth()
        .sign_in(SessionUser::new(Email::parse("kim@example.com").unwrap()))
        .await
        .unwrap();
    let mut events = client.app.session().events();

    stub.state().fail(Failure::RejectTokens);
    assert!(client.app.payments().orders().await.is_err());

    assert_eq!(events.try_recv().unwrap(), AuthEvent::LoggedOut);
    assert_eq!(
        events.try_recv().unwrap(),
        AuthEvent::LoginRequired {
            redirect: "/login".to_string()
        }
    );
}

#[tokio::test]
async fn test_public_endpoints_do_not_expire_session() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;

    stub.state().fail(Failure::RejectTokens);
    // The catalog is public and unaffected.
    assert!(client.app.catalog().list_products().await.unwrap().is_empty());
    assert!(client.app.session().current_user().is_some());
}
