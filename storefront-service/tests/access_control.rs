mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;

use storefront_service::lifecycle::ApprovalPolicy;
use support::{TestApp, ADMIN};

#[tokio::test]
async fn missing_token_is_unauthenticated_and_bad_token_forbidden() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);

    let (status, body) = app.send(Method::GET, "/users/a@x.com", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("unauthenticated"));

    let (status, body) = app.send(Method::GET, "/users/a@x.com", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], json!("forbidden access"));
}

#[tokio::test]
async fn upsert_merges_without_duplicating() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let (_, first) = app
        .send(Method::PUT, "/user/a@x.com", None, Some(json!({"name": "Ada", "location": "London"})))
        .await;
    assert_eq!(first["result"]["created"], json!(true));

    let (status, second) = app
        .send(Method::PUT, "/user/a@x.com", None, Some(json!({"location": "Paris"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["result"]["created"], json!(false));

    let admin = app.login_admin().await;
    let (_, users) = app.send(Method::GET, "/users", Some(&admin), None).await;
    let matching: Vec<_> = users
        .as_array()
        .unwrap()
        .iter()
        .filter(|u| u["email"] == json!("a@x.com"))
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0]["name"], json!("Ada"));
    assert_eq!(matching[0]["location"], json!("Paris"));
    assert_eq!(matching[0]["role"], json!("customer"));
}

#[tokio::test]
async fn extra_profile_fields_are_kept() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let (status, body) = app
        .send(
            Method::PUT,
            "/user/a@x.com",
            None,
            Some(json!({"name": "Ada", "phone": "555", "displayName": "A"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, user) = app.send(Method::GET, "/users/a@x.com", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["name"], json!("Ada"));
    assert_eq!(user["phone"], json!("555"));
    assert_eq!(user["displayName"], json!("A"));
    assert_eq!(user["email"], json!("a@x.com"));

    let (_, updated) = app
        .send(
            Method::PUT,
            "/user/profile/a@x.com",
            Some(&token),
            Some(json!({"displayName": "Countess", "email": "b@x.com"})),
        )
        .await;
    assert_eq!(updated["displayName"], json!("Countess"));
    assert_eq!(updated["phone"], json!("555"));
    assert_eq!(updated["email"], json!("a@x.com"));
}

#[tokio::test]
async fn upsert_rejects_malformed_email() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let (status, body) = app.send(Method::PUT, "/user/not-an-email", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("invalid_email"));
}

#[tokio::test]
async fn profile_update_never_grants_admin() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let token = app.login("a@x.com").await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/user/profile/a@x.com",
            Some(&token),
            Some(json!({"name": "Ada", "role": "admin"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], json!("Ada"));
    assert_eq!(body["role"], json!("customer"));

    let (_, check) = app.send(Method::GET, "/admin/a@x.com", Some(&token), None).await;
    assert_eq!(check, json!({"admin": false}));
}

#[tokio::test]
async fn profile_update_is_owner_only() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    app.login("a@x.com").await;
    let other = app.login("b@x.com").await;
    let (status, _) = app
        .send(Method::PUT, "/user/profile/a@x.com", Some(&other), Some(json!({"name": "Mallory"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_routes_follow_stored_role() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let customer = app.login("a@x.com").await;
    let admin = app.login_admin().await;

    let (status, _) = app.send(Method::GET, "/users", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::PUT, "/users/admin/a@x.com", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::PUT, "/users/admin/a@x.com", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], json!("admin"));

    // Same token as before the grant: the role is looked up per request.
    let (status, _) = app.send(Method::GET, "/users", Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, check) = app.send(Method::GET, "/admin/a@x.com", Some(&customer), None).await;
    assert_eq!(check, json!({"admin": true}));
}

#[tokio::test]
async fn deleted_admin_loses_access_immediately() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let admin = app.login_admin().await;
    let (status, _) = app.send(Method::DELETE, &format!("/users/{ADMIN}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send(Method::GET, "/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let token = app.login("a@x.com").await;
    let admin = app.login_admin().await;

    let (status, body) = app.send(Method::GET, "/users/ghost@x.com", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("user_not_found"));

    let (status, _) = app.send(Method::DELETE, "/users/ghost@x.com", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orders_are_visible_to_owner_and_admin_only() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let owner = app.login("a@x.com").await;
    let stranger = app.login("b@x.com").await;
    let admin = app.login_admin().await;
    let order = app.place_order(&owner, json!(20)).await;
    let id = order["id"].as_str().unwrap();

    let (status, _) = app.send(Method::GET, &format!("/orders/{id}"), Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &format!("/orders/{id}"), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::GET, &format!("/orders/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::PATCH, &format!("/order/{id}"), Some(&stranger), Some(json!({"transactionId": "tx"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::DELETE, &format!("/order/{id}"), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Method::GET, "/order?email=a@x.com", Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, mine) = app.send(Method::GET, "/order?email=a@x.com", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, _) = app.send(Method::DELETE, &format!("/order/{id}"), Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.send(Method::GET, &format!("/orders/{id}"), Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("order_not_found"));
}

#[tokio::test]
async fn admin_can_record_payment_on_any_order() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let owner = app.login("a@x.com").await;
    let admin = app.login_admin().await;
    let order = app.place_order(&owner, json!(20)).await;
    let id = order["id"].as_str().unwrap();

    let (status, body) = app
        .send(Method::PATCH, &format!("/order/{id}"), Some(&admin), Some(json!({"transactionId": "tx-admin"})))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["paid"], json!(true));
    assert_eq!(body["transactionId"], json!("tx-admin"));
    assert_eq!(body["ownerEmail"], json!("a@x.com"));

    let (_, payments) = app.send(Method::GET, &format!("/orders/{id}/payments"), Some(&owner), None).await;
    assert_eq!(payments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_authorization_header_is_forbidden() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    for value in ["Basic abc", "Bearer", "Token abc"] {
        let req = axum::http::Request::builder()
            .uri("/users/a@x.com")
            .header("authorization", value)
            .body(axum::body::Body::empty())
            .unwrap();
        let resp = tower::util::ServiceExt::oneshot(app.router.clone(), req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{value:?}");
    }
}

#[tokio::test]
async fn order_owner_comes_from_token() {
    let app = TestApp::new(ApprovalPolicy::RequirePayment);
    let token = app.login("a@x.com").await;
    let (status, body) = app
        .send(
            Method::POST,
            "/order",
            Some(&token),
            Some(json!({
                "items": [{"productId": "sku-1", "quantity": 1}],
                "totalPrice": 5,
                "ownerEmail": "victim@x.com"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ownerEmail"], json!("a@x.com"));
}
