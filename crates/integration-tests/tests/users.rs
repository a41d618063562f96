//! Profile lookup and updates.

use petverse_client::users::UserUpdate;
use petverse_client::{ApiError, SessionUser};
use petverse_core::{Email, UserRole};
use petverse_integration_tests::StubApi;
use serde_json::json;

fn seed(stub: &StubApi) {
    stub.state().add_user(json!({
        "_id": "u1",
        "name": "Kim Lee",
        "email": "kim@example.com",
        "role": "admin",
        "phone": "555-0101"
    }));
}

#[tokio::test]
async fn test_single_user_feeds_session() {
    let stub = StubApi::start().await;
    seed(&stub);
    let client = stub.signed_in("kim@example.com").await;
    let kim = Email::parse("kim@example.com").unwrap();

    let user = client.app.users().single_user(&kim).await.unwrap();
    assert_eq!(user.name, "Kim Lee");
    assert_eq!(user.role, UserRole::Admin);
    assert_eq!(user.address, None);

    assert!(client.app.session().restore(SessionUser::from(&user)));
    let session_user = client.app.session().current_user().unwrap();
    assert!(session_user.is_admin());
    assert_eq!(session_user.display_name(), "Kim Lee");
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("new@example.com").await;
    let new = Email::parse("new@example.com").unwrap();

    let result = client.app.users().single_user(&new).await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
    // A missing profile is not an auth failure.
    assert!(client.app.session().current_user().is_some());
}

#[tokio::test]
async fn test_update_user_changes_only_given_fields() {
    let stub = StubApi::start().await;
    seed(&stub);
    let client = stub.signed_in("kim@example.com").await;
    let kim = Email::parse("kim@example.com").unwrap();

    let update = UserUpdate {
        address: Some("12 Bark Lane".to_string()),
        ..UserUpdate::default()
    };
    client.app.users().update_user(&kim, &update).await.unwrap();

    let stored = stub.state().user(&kim).unwrap();
    assert_eq!(stored["address"], "12 Bark Lane");
    assert_eq!(stored["phone"], "555-0101");
    assert_eq!(stored["name"], "Kim Lee");

    let user = client.app.users().single_user(&kim).await.unwrap();
    assert_eq!(user.address.as_deref(), Some("12 Bark Lane"));
}

#[tokio::test]
async fn test_update_user_requires_login() {
    let stub = StubApi::start().await;
    seed(&stub);
    let client = stub.client();
    let kim = Email::parse("kim@example.com").unwrap();

    let update = UserUpdate {
        name: Some("Someone Else".to_string()),
        ..UserUpdate::default()
    };
    let result = client.app.users().update_user(&kim, &update).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    assert_eq!(stub.state().user(&kim).unwrap()["name"], "Kim Lee");
}
