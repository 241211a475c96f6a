use std::sync::Arc;

use async_trait::async_trait;
use axum::{ body::{ to_bytes, Body }, http::{ header, Method, Request, StatusCode }, Router };
use serde_json::{ json, Value };
use tower::ServiceExt;

use metriks_common::{
	auth::Authenticator,
	cart::RedirectCart,
	error::StoreError,
	memory::MemoryStore,
	models::{ CandidateListing, NewUser, Product, ResultRow, User },
	search::SearchQuery,
	server::{ build_router, AppState },
	store::PriceStore,
};

/// Store whose datastore is gone
struct OfflineStore;

#[async_trait]
impl PriceStore for OfflineStore {
	async fn init(&self) -> Result<(), StoreError> {
		Ok(())
	}

	fn name(&self) -> String {
		"Offline".to_string()
	}

	async fn search_master(&self, _query: &SearchQuery) -> Result<Vec<ResultRow>, StoreError> {
		Err(StoreError::Unavailable("unable to open database file".to_string()))
	}

	async fn create_user(&self, _user: NewUser) -> Result<User, StoreError> {
		Err(StoreError::Unavailable("database is locked".to_string()))
	}

	async fn find_user_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
		Err(StoreError::Unavailable("database is locked".to_string()))
	}
}

fn listing(product_id: i64, name: &str, listing_id: i64, price: f64, current: bool) -> CandidateListing {
	CandidateListing {
		product: Product {
			id: product_id,
			name: name.to_string(),
			brand: Some("Tnuva".to_string()),
			image_url: Some(format!("https://img.example/{}.jpg", product_id)),
		},
		listing_id,
		store_name: format!("Branch {}", listing_id),
		retailer_name: "Rami Levy".to_string(),
		price,
		is_current: current,
	}
}

fn app_with(store: MemoryStore) -> (Router, Arc<AppState<MemoryStore>>) {
	let state = Arc::new(AppState {
		store: Arc::new(store),
		cart: Arc::new(RedirectCart::new("https://hahishook.com")),
		auth: Authenticator::new("api-test-secret", 30),
	});
	(build_router(state.clone()), state)
}

fn offline_app() -> Router {
	build_router(
		Arc::new(AppState {
			store: Arc::new(OfflineStore),
			cart: Arc::new(RedirectCart::new("https://hahishook.com")),
			auth: Authenticator::new("api-test-secret", 30),
		})
	)
}

fn app() -> Router {
	app_with(MemoryStore::new()).0
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
	let mut request = Request::builder().method(method).uri(uri);
	let body = match body {
		Some(json) => {
			request = request.header(header::CONTENT_TYPE, "application/json");
			Body::from(json.to_string())
		}
		None => Body::empty(),
	};

	let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
	let status = response.status();
	let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
	let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
	(status, value)
}

async fn register(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
	send(
		app,
		Method::POST,
		"/api/register",
		Some(json!({ "email": email, "username": "dana", "password": password }))
	).await
}

#[tokio::test]
async fn register_then_login() {
	let app = app();

	let (status, body) = register(&app, "dana@example.com", "hunter22").await;
	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(body["message"], "User registered successfully");

	let (status, body) = send(
		&app,
		Method::POST,
		"/api/login",
		Some(json!({ "email": "dana@example.com", "password": "hunter22" }))
	).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["username"], "dana");

	let token = body["token"].as_str().unwrap();
	let claims = Authenticator::new("api-test-secret", 30).verify_token(token).unwrap();
	assert_eq!(claims.username, "dana");
}

#[tokio::test]
async fn duplicate_email_is_conflict_and_not_stored() {
	let (app, state) = app_with(MemoryStore::new());

	assert_eq!(register(&app, "dana@example.com", "hunter22").await.0, StatusCode::CREATED);
	let (status, body) = register(&app, "dana@example.com", "other-pass").await;

	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(body["message"], "Email already registered");
	assert_eq!(state.store.user_count(), 1);
}

#[tokio::test]
async fn register_requires_every_field() {
	let app = app();
	let (status, body) = send(
		&app,
		Method::POST,
		"/api/register",
		Some(json!({ "email": "dana@example.com", "password": "hunter22" }))
	).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["message"], "Missing required fields");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
	let app = app();
	register(&app, "dana@example.com", "hunter22").await;

	let (status, body) = send(
		&app,
		Method::POST,
		"/api/login",
		Some(json!({ "email": "dana@example.com", "password": "wrong" }))
	).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn login_with_unknown_email_is_unauthorized() {
	let (status, _) = send(
		&app(),
		Method::POST,
		"/api/login",
		Some(json!({ "email": "nobody@example.com", "password": "hunter22" }))
	).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_without_password_is_bad_request() {
	let (status, _) = send(
		&app(),
		Method::POST,
		"/api/login",
		Some(json!({ "email": "dana@example.com" }))
	).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_returns_cheapest_current_price() {
	let (app, _) = app_with(
		MemoryStore::with_listings(
			vec![listing(1, "Milk 3%", 10, 5.9, true), listing(1, "Milk 3%", 11, 6.5, false)]
		)
	);

	let (status, body) = send(&app, Method::GET, "/api/search/supermarket?q=milk", None).await;
	assert_eq!(status, StatusCode::OK);

	let rows = body.as_array().unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0]["masterproductid"], 1);
	assert_eq!(rows[0]["productname"], "Milk 3%");
	assert_eq!(rows[0]["price"], 5.9);
	assert_eq!(rows[0]["listingid"], 10);
	assert_eq!(rows[0]["storename"], "Branch 10");
	assert_eq!(rows[0]["retailername"], "Rami Levy");
	assert_eq!(rows[0]["brand"], "Tnuva");
}

#[tokio::test]
async fn search_orders_by_tier_and_paginates() {
	let mut listings = vec![listing(100, "milk", 100, 9.0, true)];
	listings.extend((1..=25).map(|i| listing(i, &format!("Goat Milk {}", i), i, i as f64, true)));
	let (app, _) = app_with(MemoryStore::with_listings(listings));

	let (_, body) = send(&app, Method::GET, "/api/search/supermarket?q=MILK&limit=5", None).await;
	let first = body.as_array().unwrap();
	assert_eq!(first[0]["masterproductid"], 100);
	assert_eq!(first[1]["masterproductid"], 1);

	let (_, body) = send(&app, Method::GET, "/api/search/supermarket?q=milk&limit=10&page=2", None).await;
	let ids: Vec<i64> = body
		.as_array()
		.unwrap()
		.iter()
		.map(|row| row["masterproductid"].as_i64().unwrap())
		.collect();
	assert_eq!(ids, (10..=19).collect::<Vec<i64>>());

	let (status, body) = send(&app, Method::GET, "/api/search/supermarket?q=milk&page=50", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!([]));
}

#[tokio::test]
async fn search_without_query_is_bad_request() {
	let (status, _) = send(&app(), Method::GET, "/api/search/supermarket", None).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nearby_search_is_not_implemented() {
	let app = app();
	for uri in [
		"/api/search/supermarket?searchType=nearby",
		"/api/search/supermarket?q=milk&searchType=nearby&limit=oops",
	] {
		let (status, _) = send(&app, Method::GET, uri, None).await;
		assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
	}
}

#[tokio::test]
async fn unknown_search_type_is_bad_request() {
	let (status, _) = send(&app(), Method::GET, "/api/search/supermarket?q=milk&searchType=cheap", None).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn prepare_cart_url_uses_first_item() {
	let (status, body) = send(
		&app(),
		Method::POST,
		"/api/hahishuk/prepare-cart-url",
		Some(json!({ "items": [{ "productId": "15164", "quantity": 2 }, { "productId": "1" }] }))
	).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["redirectUrl"], "https://hahishook.com/cart/?add-to-cart=15164&quantity=2");
	assert_eq!(body["summary"], "Adding item 15164 (quantity: 2) to Hahishuk cart");
}

#[tokio::test]
async fn prepare_cart_url_defaults_quantity_and_accepts_numeric_ids() {
	let (_, body) = send(
		&app(),
		Method::POST,
		"/api/hahishuk/prepare-cart-url",
		Some(json!({ "items": [{ "productId": 15165 }] }))
	).await;
	assert_eq!(body["redirectUrl"], "https://hahishook.com/cart/?add-to-cart=15165&quantity=1");
}

#[tokio::test]
async fn prepare_cart_url_rejects_empty_items() {
	let (status, body) = send(&app(), Method::POST, "/api/hahishuk/prepare-cart-url", Some(json!({ "items": [] }))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "No items provided");
}

#[tokio::test]
async fn prepare_cart_url_requires_product_id() {
	let (status, body) = send(
		&app(),
		Method::POST,
		"/api/hahishuk/prepare-cart-url",
		Some(json!({ "items": [{ "quantity": 1 }] }))
	).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "Product ID is required");
}

#[tokio::test]
async fn add_to_cart_reports_per_item() {
	let (status, body) = send(
		&app(),
		Method::POST,
		"/api/hahishuk/add-to-cart",
		Some(json!({ "items": [{ "productId": "178225" }, { "productId": "" }] }))
	).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["summary"], "Added 1/2 items");
	assert_eq!(body["details"][0]["status"], "added");
	assert_eq!(body["details"][1]["status"], "error");
}

#[tokio::test]
async fn retailer_products_are_listed() {
	let (status, body) = send(&app(), Method::GET, "/api/products/hahishuk", None).await;
	assert_eq!(status, StatusCode::OK);

	let products = body.as_array().unwrap();
	assert_eq!(products.len(), 3);
	assert_eq!(products[0]["productname"], "Milk 3%");
	assert_eq!(products[0]["hahishuk_site_product_id"], "15164");
	assert_eq!(products[0]["stock_status"], "instock");
}

#[tokio::test]
async fn unavailable_store_is_internal_error_with_raw_message() {
	let app = offline_app();

	let (status, body) = send(&app, Method::GET, "/api/search/supermarket?q=milk", None).await;
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["error"], "unable to open database file");

	let (status, body) = send(
		&app,
		Method::POST,
		"/api/login",
		Some(json!({ "email": "dana@example.com", "password": "hunter22" }))
	).await;
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["message"], "database is locked");
}

#[tokio::test]
async fn prepare_cart_url_escapes_product_id() {
	let (status, body) = send(
		&app(),
		Method::POST,
		"/api/hahishuk/prepare-cart-url",
		Some(json!({ "items": [{ "productId": "15164&quantity=99" }] }))
	).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["redirectUrl"], "https://hahishook.com/cart/?add-to-cart=15164%26quantity%3D99&quantity=1");
}
