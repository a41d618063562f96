//! Integration tests for the PetVerse client.
//!
//! The tests drive the real `reqwest`-based client against [`StubApi`], an
//! in-process axum server bound to `127.0.0.1:0` that keeps carts, threads,
//! appointments and payments in memory.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p petverse-integration-tests
//! ```
//!
//! Failures can be injected per endpoint with [`StubState::fail`], and
//! [`StubState::hits`] counts requests per route for cache assertions.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use petverse_client::notify::ChannelNotifier;
use petverse_client::{AppState, ClientConfig, SessionUser, Toast};
use petverse_core::{Cart, CartItem, Email, ProductId, discounted_price, round_money};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use url::Url;

/// Endpoints that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    /// `GET /carts` answers 500.
    CartFetch,
    /// `POST /carts` answers 500.
    CartAdd,
    /// `PATCH /threads/:id/like` answers 500.
    Like,
    /// Every secure endpoint answers 401.
    RejectTokens,
}

/// Shared state of the stub server, inspectable from tests.
#[derive(Clone, Default)]
pub struct StubState {
    inner: Arc<Mutex<StubData>>,
}

#[derive(Default)]
struct StubData {
    products: Vec<Value>,
    carts: HashMap<Email, Cart>,
    threads: Vec<Value>,
    appointments: Vec<(Collection, Value)>,
    payments: Vec<Value>,
    users: HashMap<Email, Value>,
    tokens: HashSet<String>,
    failures: HashSet<Failure>,
    hits: HashMap<&'static str, usize>,
    last_intent_price: Option<f64>,
}

impl StubState {
    fn data(&self) -> MutexGuard<'_, StubData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hit(&self, route: &'static str) {
        *self.data().hits.entry(route).or_insert(0) += 1;
    }

    pub fn add_product(&self, product: Value) {
        self.data().products.push(product);
    }

    pub fn add_user(&self, user: Value) {
        if let Some(email) = user["email"].as_str().and_then(|e| Email::parse(e).ok()) {
            self.data().users.insert(email, user);
        }
    }

    #[must_use]
    pub fn user(&self, email: &Email) -> Option<Value> {
        self.data().users.get(email).cloned()
    }

    #[must_use]
    pub fn products(&self) -> Vec<Value> {
        self.data().products.clone()
    }

    pub fn add_thread(&self, thread: Value) {
        self.data().threads.push(thread);
    }

    /// Change a stored thread behind the client's back.
    pub fn edit_thread(&self, id: &str, edit: impl FnOnce(&mut Value)) {
        if let Some(thread) = self.data().threads.iter_mut().find(|t| t["_id"] == id) {
            edit(thread);
        }
    }

    pub fn fail(&self, failure: Failure) {
        self.data().failures.insert(failure);
    }

    pub fn recover(&self, failure: Failure) {
        self.data().failures.remove(&failure);
    }

    /// Number of requests served for `route` (e.g. `"GET /products"`).
    #[must_use]
    pub fn hits(&self, route: &str) -> usize {
        self.data().hits.get(route).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn cart(&self, email: &Email) -> Option<Cart> {
        self.data().carts.get(email).cloned()
    }

    #[must_use]
    pub fn thread(&self, id: &str) -> Option<Value> {
        self.data()
            .threads
            .iter()
            .find(|t| t["_id"] == id)
            .cloned()
    }

    #[must_use]
    pub fn payments(&self) -> Vec<Value> {
        self.data().payments.clone()
    }

    /// Appointments stored under `/grooming` or `/healthcare`.
    #[must_use]
    pub fn appointments(&self, collection: &str) -> Vec<Value> {
        self.data()
            .appointments
            .iter()
            .filter(|(c, _)| c.0 == collection)
            .map(|(_, a)| a.clone())
            .collect()
    }

    pub fn add_payment(&self, payment: Value) {
        self.data().payments.push(payment);
    }

    #[must_use]
    pub fn last_intent_price(&self) -> Option<f64> {
        self.data().last_intent_price
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let data = self.data();
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match token {
            Some(token) if !data.failures.contains(&Failure::RejectTokens) && data.tokens.contains(token) => Ok(()),
            _ => Err(error(StatusCode::UNAUTHORIZED, "unauthorized access")),
        }
    }

    fn failing(&self, failure: Failure) -> Result<(), Response> {
        if self.data().failures.contains(&failure) {
            return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable"));
        }
        Ok(())
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// A running stub API. The server stops when this is dropped.
pub struct StubApi {
    addr: SocketAddr,
    state: StubState,
    server: JoinHandle<()>,
}

impl StubApi {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = StubState::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub API listener");
        let addr = listener.local_addr().expect("Listener has no local address");

        let app = router(state.clone());
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Stub API server stopped");
            }
        });

        Self {
            addr,
            state,
            server,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &StubState {
        &self.state
    }

    /// Base URL of the stub.
    ///
    /// # Panics
    ///
    /// Never for a bound socket address.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("Socket address is a valid URL")
    }

    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url())
    }

    /// A fresh, signed-out client with toasts captured.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn client(&self) -> TestClient {
        let (notifier, toasts) = ChannelNotifier::channel();
        let app = AppState::with_notifier(self.config(), Arc::new(notifier))
            .expect("Failed to build client state");
        TestClient { app, toasts }
    }

    /// A client signed in as `email` through `POST /jwt`.
    ///
    /// # Panics
    ///
    /// Panics if the email is invalid or sign-in fails.
    pub async fn signed_in(&self, email: &str) -> TestClient {
        let client = self.client();
        let email = Email::parse(email).expect("Invalid test email");
        client
            .app
            .auth()
            .sign_in(SessionUser::new(email))
            .await
            .expect("Sign-in against stub failed");
        client
    }
}

impl Drop for StubApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Client state plus the toasts it emitted.
pub struct TestClient {
    pub app: AppState,
    pub toasts: UnboundedReceiver<Toast>,
}

impl TestClient {
    /// Toasts emitted since the last call.
    pub fn drain_toasts(&mut self) -> Vec<Toast> {
        let mut toasts = Vec::new();
        while let Ok(toast) = self.toasts.try_recv() {
            toasts.push(toast);
        }
        toasts
    }
}

/// JSON for a product the stub can serve.
#[must_use]
pub fn product_json(id: &str, name: &str, price: f64, discount: f64) -> Value {
    json!({
        "_id": id,
        "name": name,
        "image": format!("https://img.petverse.test/{id}.png"),
        "category": "toys",
        "petType": "dog",
        "price": price,
        "discount": discount,
        "stock": 10,
        "rating": 4.5
    })
}

fn router(state: StubState) -> Router {
    Router::new()
        .route("/jwt", post(issue_token))
        .route("/products", get(list_products))
        .route("/product/{id}", get(get_product))
        .route("/add-product", post(create_product))
        .route("/singleuser", get(single_user))
        .route("/updateuser", patch(update_user))
        .route("/carts", get(get_cart).post(add_items).patch(update_item))
        .route("/carts/increase", patch(change_quantity))
        .route("/carts/item", delete(remove_item))
        .route("/carts/clear", delete(clear_cart))
        .route("/threads", get(list_threads))
        .route("/threads/{id}", get(get_thread))
        .route("/threads/{id}/like", patch(toggle_like))
        .route("/threads/{id}/comment", post(add_comment))
        .route("/grooming", appointments(Collection::GROOMING))
        .route("/healthcare", appointments(Collection::HEALTHCARE))
        .route(
            "/grooming/{id}",
            patch(update_appointment).layer(Extension(Collection::GROOMING)),
        )
        .route(
            "/healthcare/{id}",
            patch(update_appointment).layer(Extension(Collection::HEALTHCARE)),
        )
        .route("/create-payment-intent", post(create_intent))
        .route("/make-payment", post(make_payment))
        .route("/orders", get(list_orders))
        .route("/payments", get(list_payments))
        .with_state(state)
}

// =============================================================================
// Auth and catalog
// =============================================================================

#[derive(Deserialize)]
struct TokenRequest {
    email: Email,
}

async fn issue_token(State(state): State<StubState>, Json(body): Json<TokenRequest>) -> Json<Value> {
    state.hit("POST /jwt");
    let token = format!("token-{}-{}", body.email.local_part(), state.data().tokens.len());
    state.data().tokens.insert(token.clone());
    Json(json!({ "token": token }))
}

async fn list_products(State(state): State<StubState>) -> Json<Value> {
    state.hit("GET /products");
    Json(Value::Array(state.data().products.clone()))
}

async fn get_product(State(state): State<StubState>, Path(id): Path<String>) -> Response {
    state.hit("GET /product/:id");
    let product = state.data().products.iter().find(|p| p["_id"] == id.as_str()).cloned();
    match product {
        Some(product) => Json(product).into_response(),
        None => error(StatusCode::NOT_FOUND, "product not found"),
    }
}

async fn create_product(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(mut product): Json<Value>,
) -> Response {
    state.hit("POST /add-product");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let mut data = state.data();
    let id = format!("p-new-{}", data.products.len() + 1);
    product["_id"] = Value::String(id.clone());
    data.products.push(product);
    Json(json!({ "acknowledged": true, "insertedId": id })).into_response()
}

// =============================================================================
// Users
// =============================================================================

async fn single_user(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<OwnerQuery>,
) -> Response {
    state.hit("GET /singleuser");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    match state.user(&query.email) {
        Some(user) => Json(user).into_response(),
        None => error(StatusCode::NOT_FOUND, "user not found"),
    }
}

async fn update_user(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("PATCH /updateuser");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let Some(email) = body["email"].as_str().and_then(|e| Email::parse(e).ok()) else {
        return error(StatusCode::BAD_REQUEST, "email is required");
    };
    let mut data = state.data();
    let Some(user) = data.users.get_mut(&email) else {
        return error(StatusCode::NOT_FOUND, "user not found");
    };
    if let (Some(user), Some(changes)) = (user.as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            if key != "email" {
                user.insert(key.clone(), value.clone());
            }
        }
    }
    Json(json!({ "modifiedCount": 1 })).into_response()
}

// =============================================================================
// Carts
// =============================================================================

#[derive(Deserialize)]
struct OwnerQuery {
    email: Email,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemQuery {
    email: Email,
    product_id: ProductId,
    variant: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemsBody {
    owner_email: Email,
    cart_items: Vec<CartItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateItemBody {
    owner_email: Email,
    cart_item: CartItem,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuantityBody {
    owner_email: Email,
    product_id: ProductId,
    variant: Option<String>,
    quantity: i64,
}

/// Recompute line prices and cart totals the way the API does.
fn recompute(cart: &mut Cart) {
    for item in &mut cart.cart_items {
        item.price = round_money(
            discounted_price(item.unit_price, item.discount) * Decimal::from(item.quantity),
        );
    }
    cart.total_items = cart.computed_total_items();
    cart.total_price = cart.computed_total_price();
    cart.updated_at = Some(Utc::now());
}

async fn get_cart(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<OwnerQuery>,
) -> Response {
    state.hit("GET /carts");
    if let Err(response) = state
        .authorize(&headers)
        .and_then(|()| state.failing(Failure::CartFetch))
    {
        return response;
    }
    match state.cart(&query.email) {
        Some(cart) => Json(cart).into_response(),
        None => error(StatusCode::NOT_FOUND, "cart not found"),
    }
}

async fn add_items(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<AddItemsBody>,
) -> Response {
    state.hit("POST /carts");
    if let Err(response) = state
        .authorize(&headers)
        .and_then(|()| state.failing(Failure::CartAdd))
    {
        return response;
    }

    let mut data = state.data();
    let cart = data.carts.entry(body.owner_email.clone()).or_insert_with(|| {
        let mut cart = Cart::empty(Some(body.owner_email.clone()));
        cart.created_at = Some(Utc::now());
        cart
    });
    for item in body.cart_items {
        match cart
            .cart_items
            .iter_mut()
            .find(|line| line.matches(&item.product_id, item.variant.as_deref()))
        {
            Some(line) => line.quantity += item.quantity,
            None => cart.cart_items.push(item),
        }
    }
    recompute(cart);
    Json(cart.clone()).into_response()
}

async fn update_item(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<UpdateItemBody>,
) -> Response {
    state.hit("PATCH /carts");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }

    let mut data = state.data();
    let Some(cart) = data.carts.get_mut(&body.owner_email) else {
        return error(StatusCode::NOT_FOUND, "cart not found");
    };
    let item = body.cart_item;
    match cart
        .cart_items
        .iter_mut()
        .find(|line| line.matches(&item.product_id, item.variant.as_deref()))
    {
        Some(line) => *line = item,
        None => return error(StatusCode::NOT_FOUND, "item not in cart"),
    }
    recompute(cart);
    Json(cart.clone()).into_response()
}

async fn change_quantity(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<QuantityBody>,
) -> Response {
    state.hit("PATCH /carts/increase");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }

    let mut data = state.data();
    let Some(cart) = data.carts.get_mut(&body.owner_email) else {
        return error(StatusCode::NOT_FOUND, "cart not found");
    };
    let Some(pos) = cart
        .cart_items
        .iter()
        .position(|line| line.matches(&body.product_id, body.variant.as_deref()))
    else {
        return error(StatusCode::NOT_FOUND, "item not in cart");
    };

    let quantity = i64::from(cart.cart_items[pos].quantity) + body.quantity;
    if quantity <= 0 {
        cart.cart_items.remove(pos);
    } else {
        cart.cart_items[pos].quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
    }
    recompute(cart);
    Json(json!({ "modifiedCount": 1 })).into_response()
}

async fn remove_item(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<ItemQuery>,
) -> Response {
    state.hit("DELETE /carts/item");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }

    let mut data = state.data();
    let Some(cart) = data.carts.get_mut(&query.email) else {
        return error(StatusCode::NOT_FOUND, "cart not found");
    };
    cart.cart_items
        .retain(|line| !line.matches(&query.product_id, query.variant.as_deref()));
    recompute(cart);
    Json(json!({ "deletedCount": 1 })).into_response()
}

async fn clear_cart(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<OwnerQuery>,
) -> Response {
    state.hit("DELETE /carts/clear");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }

    let mut data = state.data();
    if let Some(cart) = data.carts.get_mut(&query.email) {
        cart.cart_items.clear();
        recompute(cart);
    }
    Json(json!({ "modifiedCount": 1 })).into_response()
}

// =============================================================================
// Forum
// =============================================================================

#[derive(Deserialize)]
struct LikeBody {
    email: Email,
}

async fn list_threads(State(state): State<StubState>) -> Json<Value> {
    state.hit("GET /threads");
    Json(Value::Array(state.data().threads.clone()))
}

async fn get_thread(State(state): State<StubState>, Path(id): Path<String>) -> Response {
    state.hit("GET /threads/:id");
    match state.thread(&id) {
        Some(thread) => Json(thread).into_response(),
        None => error(StatusCode::NOT_FOUND, "thread not found"),
    }
}

async fn toggle_like(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<LikeBody>,
) -> Response {
    state.hit("PATCH /threads/:id/like");
    if let Err(response) = state
        .authorize(&headers)
        .and_then(|()| state.failing(Failure::Like))
    {
        return response;
    }

    let mut data = state.data();
    let Some(thread) = data.threads.iter_mut().find(|t| t["_id"] == id.as_str()) else {
        return error(StatusCode::NOT_FOUND, "thread not found");
    };
    let email = Value::String(body.email.into_inner());
    if let Some(likes) = thread["likes"].as_array_mut() {
        if let Some(pos) = likes.iter().position(|e| *e == email) {
            likes.remove(pos);
        } else {
            likes.push(email);
        }
    } else {
        thread["likes"] = json!([email]);
    }
    Json(json!({ "modifiedCount": 1 })).into_response()
}

async fn add_comment(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(comment): Json<Value>,
) -> Response {
    state.hit("POST /threads/:id/comment");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }

    let mut data = state.data();
    let Some(thread) = data.threads.iter_mut().find(|t| t["_id"] == id.as_str()) else {
        return error(StatusCode::NOT_FOUND, "thread not found");
    };
    match thread["comments"].as_array_mut() {
        Some(comments) => comments.push(comment),
        None => thread["comments"] = json!([comment]),
    }
    Json(json!({ "modifiedCount": 1 })).into_response()
}

// =============================================================================
// Appointments and payments
// =============================================================================

/// Which appointment collection a route serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Collection(&'static str);

impl Collection {
    const GROOMING: Self = Self("grooming");
    const HEALTHCARE: Self = Self("healthcare");
}

fn appointments(collection: Collection) -> axum::routing::MethodRouter<StubState> {
    get(list_appointments)
        .post(book_appointment)
        .layer(Extension(collection))
}

async fn list_appointments(
    State(state): State<StubState>,
    Extension(collection): Extension<Collection>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.hit(if collection == Collection::GROOMING {
        "GET /grooming"
    } else {
        "GET /healthcare"
    });
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let appointments: Vec<Value> = state
        .appointments(collection.0)
        .into_iter()
        .filter(|a| {
            query
                .get("email")
                .is_none_or(|email| a["ownerEmail"] == email.as_str())
        })
        .collect();
    Json(Value::Array(appointments)).into_response()
}

async fn book_appointment(
    State(state): State<StubState>,
    Extension(collection): Extension<Collection>,
    headers: HeaderMap,
    Json(mut appointment): Json<Value>,
) -> Response {
    state.hit(if collection == Collection::GROOMING {
        "POST /grooming"
    } else {
        "POST /healthcare"
    });
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let mut data = state.data();
    let id = format!("apt-{}", data.appointments.len() + 1);
    appointment["_id"] = Value::String(id.clone());
    data.appointments.push((collection, appointment));
    Json(json!({ "acknowledged": true, "insertedId": id })).into_response()
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

async fn update_appointment(
    State(state): State<StubState>,
    Extension(collection): Extension<Collection>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Response {
    state.hit("PATCH /appointment/:id");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let mut data = state.data();
    let Some((_, appointment)) = data
        .appointments
        .iter_mut()
        .find(|(c, a)| *c == collection && a["_id"] == id.as_str())
    else {
        return error(StatusCode::NOT_FOUND, "appointment not found");
    };
    appointment["status"] = Value::String(body.status);
    Json(json!({ "modifiedCount": 1 })).into_response()
}

#[derive(Deserialize)]
struct IntentBody {
    price: f64,
}

async fn create_intent(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<IntentBody>,
) -> Response {
    state.hit("POST /create-payment-intent");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    state.data().last_intent_price = Some(body.price);
    Json(json!({ "clientSecret": "pi_stub_secret_123" })).into_response()
}

async fn make_payment(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(mut payment): Json<Value>,
) -> Response {
    state.hit("POST /make-payment");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let mut data = state.data();
    let id = format!("pay-{}", data.payments.len() + 1);
    payment["_id"] = Value::String(id.clone());
    data.payments.push(payment);
    Json(json!({ "acknowledged": true, "insertedId": id })).into_response()
}

async fn list_orders(State(state): State<StubState>, headers: HeaderMap) -> Response {
    state.hit("GET /orders");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    Json(Value::Array(state.payments())).into_response()
}

async fn list_payments(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<OwnerQuery>,
) -> Response {
    state.hit("GET /payments");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let payments: Vec<Value> = state
        .payments()
        .into_iter()
        .filter(|p| p["email"] == query.email.as_str())
        .collect();
    Json(Value::Array(payments)).into_response()
}
