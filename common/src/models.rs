use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
	pub id: Uuid,
	pub email: String,
	pub username: String,
	#[serde(skip_serializing)]
	pub password_hash: String,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
	pub email: String,
	pub username: String,
	pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
	pub id: i64,
	pub name: String,
	pub brand: Option<String>,
	pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
	pub id: i64,
	pub product_id: i64,
	pub store_id: i64,
	pub retailer_id: i64,
}

/// One listing joined with its product, store, retailer and current price.
/// This is the shape the ranking step consumes.
#[derive(Debug, Clone)]
pub struct CandidateListing {
	pub product: Product,
	pub listing_id: i64,
	pub store_name: String,
	pub retailer_name: String,
	pub price: f64,
	pub is_current: bool,
}

/// Cheapest current offer for one master product. Field names follow the
/// mobile client's JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
	#[serde(rename = "masterproductid")]
	pub product_id: i64,
	#[serde(rename = "productname")]
	pub product_name: String,
	#[serde(rename = "imageurl")]
	pub image_url: Option<String>,
	pub price: f64,
	#[serde(rename = "storename")]
	pub store_name: String,
	#[serde(rename = "retailername")]
	pub retailer_name: String,
	#[serde(rename = "listingid")]
	pub listing_id: i64,
	pub brand: Option<String>,
}

// Request and response bodies

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
	pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
	pub token: String,
	pub username: String,
}

/// Retailer-side product identifiers arrive either as JSON strings or numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
	Text(String),
	Number(i64),
}

impl ProductRef {
	/// Returns the identifier as text, or `None` when it is blank.
	pub fn normalized(&self) -> Option<String> {
		match self {
			ProductRef::Text(text) => {
				let trimmed = text.trim();
				if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
			}
			ProductRef::Number(number) => Some(number.to_string()),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemRequest {
	#[serde(default, rename = "productId")]
	pub product_id: Option<ProductRef>,
	#[serde(default)]
	pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartRequest {
	#[serde(default)]
	pub items: Vec<CartItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareCartResponse {
	#[serde(rename = "redirectUrl")]
	pub redirect_url: String,
	pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartItemStatus {
	Added,
	Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemOutcome {
	#[serde(rename = "productId")]
	pub product_id: Option<String>,
	pub status: CartItemStatus,
	#[serde(rename = "redirectUrl", skip_serializing_if = "Option::is_none")]
	pub redirect_url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSummary {
	pub summary: String,
	pub details: Vec<CartItemOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailerProduct {
	pub productname: String,
	pub hahishuk_site_product_id: String,
	pub imageurl: String,
	pub current_price: f64,
	pub stock_status: String,
}
