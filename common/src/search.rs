use std::{ cmp::Ordering, collections::HashMap };

use serde::Deserialize;

use crate::{ error::ApiError, models::{ CandidateListing, ResultRow } };

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;
pub const DEFAULT_PAGE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
	/// One cheapest row per master product
	Master,
	/// Location-aware search, not served yet
	Nearby,
}

impl SearchType {
	pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
		match raw.map(str::trim) {
			None | Some("") | Some("master") => Ok(SearchType::Master),
			Some("nearby") => Ok(SearchType::Nearby),
			Some(other) =>
				Err(ApiError::InvalidArgument(format!("Unsupported searchType '{}'", other))),
		}
	}
}

/// Raw query-string parameters of the search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
	pub q: Option<String>,
	#[serde(rename = "searchType")]
	pub search_type: Option<String>,
	pub limit: Option<String>,
	pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
	pub text: String,
	pub limit: u32,
	pub page: u32,
}

impl SearchQuery {
	pub fn new(text: &str, limit: u32, page: u32) -> Result<Self, ApiError> {
		let text = text.trim();
		if text.is_empty() {
			return Err(ApiError::InvalidArgument("Search query is required".to_string()));
		}
		if limit == 0 || limit > MAX_LIMIT {
			return Err(
				ApiError::InvalidArgument(format!("limit must be between 1 and {}", MAX_LIMIT))
			);
		}
		if page == 0 {
			return Err(ApiError::InvalidArgument("page must be a positive integer".to_string()));
		}

		Ok(Self { text: text.to_string(), limit, page })
	}

	pub fn offset(&self) -> u64 {
		(u64::from(self.page) - 1).saturating_mul(u64::from(self.limit))
	}
}

impl SearchParams {
	/// Validates the parameters. `searchType` is looked at first so that a
	/// `nearby` request is refused before anything else is checked.
	pub fn validate(&self) -> Result<SearchQuery, ApiError> {
		if SearchType::parse(self.search_type.as_deref())? == SearchType::Nearby {
			return Err(ApiError::NotImplemented("Nearby search is not implemented yet".to_string()));
		}

		let text = self.q.as_deref().unwrap_or_default();
		let limit = parse_positive("limit", self.limit.as_deref(), DEFAULT_LIMIT)?;
		let page = parse_positive("page", self.page.as_deref(), DEFAULT_PAGE)?;

		SearchQuery::new(text, limit, page)
	}
}

fn parse_positive(name: &str, raw: Option<&str>, default: u32) -> Result<u32, ApiError> {
	match raw.map(str::trim) {
		None | Some("") => Ok(default),
		Some(value) =>
			value
				.parse::<u32>()
				.map_err(|_| {
					ApiError::InvalidArgument(format!("{} must be a positive integer", name))
				}),
	}
}

/// Match quality of a product name against the query: 0 exact, 1 prefix,
/// 2 substring. `None` when the name does not contain the query at all.
pub fn match_tier(name: &str, query: &str) -> Option<u8> {
	let name = name.to_lowercase();
	let query = query.to_lowercase();

	if name == query {
		Some(0)
	} else if name.starts_with(&query) {
		Some(1)
	} else if name.contains(&query) {
		Some(2)
	} else {
		None
	}
}

/// Reduces candidate listings to the cheapest current offer per product and
/// orders them by tier, price and product id, then applies pagination.
pub fn rank_listings(candidates: &[CandidateListing], query: &SearchQuery) -> Vec<ResultRow> {
	let mut cheapest: HashMap<i64, &CandidateListing> = HashMap::new();

	for candidate in candidates.iter().filter(|c| c.is_current) {
		if match_tier(&candidate.product.name, &query.text).is_none() {
			continue;
		}

		cheapest
			.entry(candidate.product.id)
			.and_modify(|best| {
				let cheaper = candidate.price < best.price;
				let tie_lower_id = candidate.price == best.price && candidate.listing_id < best.listing_id;
				if cheaper || tie_lower_id {
					*best = candidate;
				}
			})
			.or_insert(candidate);
	}

	let mut ranked: Vec<(u8, &CandidateListing)> = cheapest
		.into_values()
		.filter_map(|c| match_tier(&c.product.name, &query.text).map(|tier| (tier, c)))
		.collect();

	ranked.sort_by(|(tier_a, a), (tier_b, b)| {
		tier_a
			.cmp(tier_b)
			.then(a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal))
			.then(a.product.id.cmp(&b.product.id))
	});

	let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
	ranked
		.into_iter()
		.skip(offset)
		.take(query.limit as usize)
		.map(|(_, c)| ResultRow {
			product_id: c.product.id,
			product_name: c.product.name.clone(),
			image_url: c.product.image_url.clone(),
			price: c.price,
			store_name: c.store_name.clone(),
			retailer_name: c.retailer_name.clone(),
			listing_id: c.listing_id,
			brand: c.product.brand.clone(),
		})
		.collect()
}
