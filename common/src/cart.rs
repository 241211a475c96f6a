use async_trait::async_trait;
use reqwest::{ header, Client, StatusCode };
use thiserror::Error;
use tracing::{ info, warn };

use crate::models::{ CartItemOutcome, CartItemStatus, CartSummary };

/// Marker the storefront puts in its AJAX reply when an item was added.
/// Not a documented contract.
const SUCCESS_MARKER: &str = "\"success\":true";

/// How much of a failed reply body is kept for diagnostics
const DETAILS_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum CartError {
	#[error("Retailer rejected the item: {0}")]
	Rejected(String),

	#[error("Retailer unreachable: {0}")]
	Transport(String),
}

/// An external retailer storefront that can receive items.
#[async_trait]
pub trait RetailerCart {
	/// Add `quantity` of the retailer's product and return the URL the
	/// shopper should be sent to.
	async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<String, CartError>;
}

/// Builds the storefront's add-to-cart link without calling it. The browser
/// performs the actual add when it follows the redirect.
#[derive(Debug, Clone)]
pub struct RedirectCart {
	base_url: String,
}

impl RedirectCart {
	pub fn new(base_url: &str) -> Self {
		Self { base_url: base_url.trim_end_matches('/').to_string() }
	}
}

#[async_trait]
impl RetailerCart for RedirectCart {
	async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<String, CartError> {
		Ok(
			format!(
				"{}/cart/?add-to-cart={}&quantity={}",
				self.base_url,
				urlencoding::encode(product_id),
				quantity
			)
		)
	}
}

/// Posts to the storefront's WooCommerce AJAX endpoint from the server side.
#[derive(Debug, Clone)]
pub struct AjaxCart {
	client: Client,
	base_url: String,
}

impl AjaxCart {
	pub fn new(base_url: &str) -> Self {
		Self::with_client(Client::new(), base_url)
	}

	pub fn with_client(client: Client, base_url: &str) -> Self {
		Self { client, base_url: base_url.trim_end_matches('/').to_string() }
	}
}

#[async_trait]
impl RetailerCart for AjaxCart {
	async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<String, CartError> {
		let url = format!("{}/?wc-ajax=add_to_cart", self.base_url);
		let quantity = quantity.to_string();

		let response = self.client
			.post(&url)
			.header(header::REFERER, &self.base_url)
			.header("X-Requested-With", "XMLHttpRequest")
			.form(
				&[
					("product_id", product_id),
					("quantity", quantity.as_str()),
				]
			)
			.send().await
			.map_err(|e| CartError::Transport(e.to_string()))?;

		let status = response.status();
		let body = response.text().await.map_err(|e| CartError::Transport(e.to_string()))?;

		if status == StatusCode::OK && body.contains(SUCCESS_MARKER) {
			info!("Added product {} to retailer cart", product_id);
			Ok(format!("{}/cart/", self.base_url))
		} else {
			warn!("Retailer refused product {} with status {}", product_id, status);
			Err(CartError::Rejected(body.chars().take(DETAILS_LIMIT).collect()))
		}
	}
}

/// Adds every item in turn and reports per-item outcomes. Items without a
/// product id are reported as errors rather than aborting the batch.
pub async fn add_items<C: RetailerCart + ?Sized>(
	cart: &C,
	items: &[(Option<String>, u32)]
) -> CartSummary {
	let mut details = Vec::with_capacity(items.len());

	for (product_id, quantity) in items {
		let outcome = match product_id {
			None =>
				CartItemOutcome {
					product_id: None,
					status: CartItemStatus::Error,
					redirect_url: None,
					details: Some("Product ID is required".to_string()),
				},
			Some(id) =>
				match cart.add_to_cart(id, *quantity).await {
					Ok(url) =>
						CartItemOutcome {
							product_id: Some(id.clone()),
							status: CartItemStatus::Added,
							redirect_url: Some(url),
							details: None,
						},
					Err(e) =>
						CartItemOutcome {
							product_id: Some(id.clone()),
							status: CartItemStatus::Error,
							redirect_url: None,
							details: Some(e.to_string()),
						},
				}
		};
		details.push(outcome);
	}

	let added = details
		.iter()
		.filter(|d| d.status == CartItemStatus::Added)
		.count();

	CartSummary {
		summary: format!("Added {}/{} items", added, items.len()),
		details,
	}
}
