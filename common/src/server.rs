use axum::{
	extract::{ rejection::{ JsonRejection, QueryRejection }, Query, State },
	http::StatusCode,
	routing::{ get, post },
	Json,
	Router,
};
use std::{ net::SocketAddr, sync::Arc };
use tokio::{ net::TcpListener, signal };
use tower_http::{ cors::CorsLayer, trace::TraceLayer };
use anyhow::Result;
use tracing::{ info, warn };
use tracing_subscriber::EnvFilter;

use crate::{
	auth::{ AuthError, Authenticator },
	cart::{ add_items, AjaxCart, RedirectCart, RetailerCart },
	config::{ CartMode, Config },
	error::ApiError,
	models::{
		CartItemRequest,
		CartRequest,
		CartSummary,
		LoginRequest,
		LoginResponse,
		MessageResponse,
		NewUser,
		PrepareCartResponse,
		RegisterRequest,
		ResultRow,
		RetailerProduct,
	},
	search::SearchParams,
	store::PriceStore,
};

// Shared state for the API
pub struct AppState<S: PriceStore + Send + Sync + 'static> {
	pub store: Arc<S>,
	pub cart: Arc<dyn RetailerCart + Send + Sync>,
	pub auth: Authenticator,
}

/// Install the fmt subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	// A subscriber may already be installed by an embedding process
	let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn build_cart(config: &Config) -> Arc<dyn RetailerCart + Send + Sync> {
	match config.cart_mode {
		CartMode::Redirect => Arc::new(RedirectCart::new(&config.cart_base_url)),
		CartMode::Ajax => Arc::new(AjaxCart::new(&config.cart_base_url)),
	}
}

pub fn build_router<S: PriceStore + Send + Sync + 'static>(state: Arc<AppState<S>>) -> Router {
	Router::new()
		.route("/", get(root_handler))
		.route("/health", get(health_handler))
		.route("/api/register", post(register_handler::<S>))
		.route("/api/login", post(login_handler::<S>))
		.route("/api/search/supermarket", get(search_handler::<S>))
		.route("/api/hahishuk/prepare-cart-url", post(prepare_cart_url_handler::<S>))
		.route("/api/hahishuk/add-to-cart", post(add_to_cart_handler::<S>))
		.route("/api/products/hahishuk", get(retailer_products_handler))
		.layer(CorsLayer::permissive())
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

// Run the API server on top of the provided store
pub async fn run_server<S: PriceStore + Send + Sync + 'static>(
	store: S,
	config: &Config
) -> Result<()> {
	info!("Starting API on the {} store", store.name());

	let state = Arc::new(AppState {
		store: Arc::new(store),
		cart: build_cart(config),
		auth: Authenticator::new(&config.jwt_secret, config.token_ttl_days),
	});
	info!("Retailer cart mode: {}", config.cart_mode);

	let app = build_router(state);

	let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
	let listener = TcpListener::bind(addr).await?;
	info!("Server listening on {}", addr);

	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

	info!("Server stopped");
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			warn!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
		info!("Received Ctrl+C, shutting down");
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
				info!("Received terminate signal, shutting down");
			}
			Err(e) => {
				warn!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

// Root handler
async fn root_handler() -> &'static str {
	"Metriks price comparison API. Search with /api/search/supermarket?q=..."
}

async fn health_handler() -> &'static str {
	"ok"
}

fn required(value: Option<String>) -> Option<String> {
	value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn bad_body(rejection: JsonRejection) -> ApiError {
	ApiError::InvalidArgument(rejection.body_text())
}

async fn register_handler<S: PriceStore + Send + Sync + 'static>(
	State(state): State<Arc<AppState<S>>>,
	payload: Result<Json<RegisterRequest>, JsonRejection>
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
	let Json(payload) = payload.map_err(bad_body)?;

	let (Some(email), Some(username), Some(password)) = (
		required(payload.email),
		required(payload.username),
		// Passwords are taken verbatim, only emptiness is checked
		payload.password.filter(|p| !p.trim().is_empty()),
	) else {
		return Err(ApiError::InvalidArgument("Missing required fields".to_string()));
	};

	let password_hash = state.auth.hash_password(&password).await?;
	let user = state.store.create_user(NewUser { email, username, password_hash }).await?;
	info!("Registered user {}", user.id);

	Ok((
		StatusCode::CREATED,
		Json(MessageResponse { message: "User registered successfully".to_string() }),
	))
}

async fn login_handler<S: PriceStore + Send + Sync + 'static>(
	State(state): State<Arc<AppState<S>>>,
	payload: Result<Json<LoginRequest>, JsonRejection>
) -> Result<Json<LoginResponse>, ApiError> {
	let Json(payload) = payload.map_err(bad_body)?;

	let (Some(email), Some(password)) = (
		required(payload.email),
		payload.password.filter(|p| !p.is_empty()),
	) else {
		return Err(ApiError::InvalidArgument("Missing required fields".to_string()));
	};

	let user = state.store
		.find_user_by_email(&email).await?
		.ok_or(AuthError::InvalidCredentials)?;
	state.auth.verify_password(&password, &user.password_hash).await?;

	let token = state.auth.issue_token(&user)?;
	info!("User {} logged in", user.id);

	Ok(Json(LoginResponse { token, username: user.username }))
}

async fn search_handler<S: PriceStore + Send + Sync + 'static>(
	State(state): State<Arc<AppState<S>>>,
	params: Result<Query<SearchParams>, QueryRejection>
) -> Result<Json<Vec<ResultRow>>, ApiError> {
	let Query(params) = params.map_err(|e| ApiError::InvalidArgument(e.body_text()))?;

	let query = params.validate().map_err(|e| {
		warn!("Rejected search request: {}", e);
		e
	})?;

	let rows = state.store.search_master(&query).await?;
	info!("Search '{}' page {} returned {} rows", query.text, query.page, rows.len());

	Ok(Json(rows))
}

fn cart_product_id(item: &CartItemRequest) -> Option<String> {
	item.product_id.as_ref().and_then(|id| id.normalized())
}

fn cart_quantity(item: &CartItemRequest) -> Result<u32, ApiError> {
	match item.quantity {
		None => Ok(1),
		Some(q) =>
			u32
				::try_from(q)
				.ok()
				.filter(|q| *q >= 1)
				.ok_or_else(|| ApiError::InvalidArgument("Quantity must be at least 1".to_string())),
	}
}

async fn prepare_cart_url_handler<S: PriceStore + Send + Sync + 'static>(
	State(state): State<Arc<AppState<S>>>,
	payload: Result<Json<CartRequest>, JsonRejection>
) -> Result<Json<PrepareCartResponse>, ApiError> {
	let Json(payload) = payload.map_err(bad_body)?;

	// One item per request; the rest are ignored
	let first = payload.items
		.first()
		.ok_or_else(|| ApiError::InvalidArgument("No items provided".to_string()))?;
	let product_id = cart_product_id(first).ok_or_else(|| {
		ApiError::InvalidArgument("Product ID is required".to_string())
	})?;
	let quantity = cart_quantity(first)?;

	let redirect_url = state.cart.add_to_cart(&product_id, quantity).await?;

	Ok(
		Json(PrepareCartResponse {
			redirect_url,
			summary: format!(
				"Adding item {} (quantity: {}) to Hahishuk cart",
				product_id,
				quantity
			),
		})
	)
}

async fn add_to_cart_handler<S: PriceStore + Send + Sync + 'static>(
	State(state): State<Arc<AppState<S>>>,
	payload: Result<Json<CartRequest>, JsonRejection>
) -> Result<Json<CartSummary>, ApiError> {
	let Json(payload) = payload.map_err(bad_body)?;

	if payload.items.is_empty() {
		return Err(ApiError::InvalidArgument("No items provided".to_string()));
	}

	// Missing ids are reported per item, a bad quantity fails the request
	let items = payload.items
		.iter()
		.map(|item| -> Result<(Option<String>, u32), ApiError> {
			Ok((cart_product_id(item), cart_quantity(item)?))
		})
		.collect::<Result<Vec<_>, ApiError>>()?;

	let summary = add_items(state.cart.as_ref(), &items).await;
	info!("{}", summary.summary);

	Ok(Json(summary))
}

async fn retailer_products_handler() -> Json<Vec<RetailerProduct>> {
	Json(retailer_products())
}

// Static catalog until the retailer feed is wired to the database
fn retailer_products() -> Vec<RetailerProduct> {
	[
		("Milk 3%", "15164", "https://hahishook.com/product-image.jpg", 5.9),
		("White Bread", "15165", "https://hahishook.com/bread-image.jpg", 7.5),
		("Eggs 12 Pack", "15166", "https://hahishook.com/eggs-image.jpg", 12.9),
	]
		.into_iter()
		.map(|(name, id, image, price)| RetailerProduct {
			productname: name.to_string(),
			hahishuk_site_product_id: id.to_string(),
			imageurl: image.to_string(),
			current_price: price,
			stock_status: "instock".to_string(),
		})
		.collect()
}
