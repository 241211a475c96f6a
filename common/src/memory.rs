use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
	error::StoreError,
	models::{ CandidateListing, NewUser, ResultRow, User },
	search::{ rank_listings, SearchQuery },
	store::PriceStore,
};

/// `PriceStore` kept entirely in process memory. Ranking goes through
/// `rank_listings`, which is the behavior SQL backends have to reproduce.
#[derive(Debug, Default)]
pub struct MemoryStore {
	listings: Mutex<Vec<CandidateListing>>,
	users: Mutex<Vec<User>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_listings(listings: Vec<CandidateListing>) -> Self {
		Self {
			listings: Mutex::new(listings),
			users: Mutex::new(Vec::new()),
		}
	}

	pub fn user_count(&self) -> usize {
		self.users.lock().map(|users| users.len()).unwrap_or_default()
	}
}

fn poisoned<T>(_: T) -> StoreError {
	StoreError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl PriceStore for MemoryStore {
	async fn init(&self) -> Result<(), StoreError> {
		Ok(())
	}

	fn name(&self) -> String {
		"Memory".to_string()
	}

	async fn search_master(&self, query: &SearchQuery) -> Result<Vec<ResultRow>, StoreError> {
		let listings = self.listings.lock().map_err(poisoned)?;
		Ok(rank_listings(&listings, query))
	}

	async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
		let mut users = self.users.lock().map_err(poisoned)?;

		// Check and insert happen under the same lock
		if users.iter().any(|existing| existing.email == user.email) {
			return Err(StoreError::Conflict("Email already registered".to_string()));
		}

		let created = User {
			id: Uuid::new_v4(),
			email: user.email,
			username: user.username,
			password_hash: user.password_hash,
			created_at: Utc::now(),
		};
		users.push(created.clone());

		Ok(created)
	}

	async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
		let users = self.users.lock().map_err(poisoned)?;
		Ok(users.iter().find(|user| user.email == email).cloned())
	}
}
