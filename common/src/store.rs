use async_trait::async_trait;

use crate::{
	error::StoreError,
	models::{ NewUser, ResultRow, User },
	search::SearchQuery,
};

#[async_trait]
pub trait PriceStore {
	/// Create the schema if it does not exist yet
	async fn init(&self) -> Result<(), StoreError>;

	/// Backend name, used in logs
	fn name(&self) -> String;

	/// Cheapest current offer per product whose name contains the query,
	/// ordered by match tier, then price, then product id
	async fn search_master(&self, query: &SearchQuery) -> Result<Vec<ResultRow>, StoreError>;

	/// Insert a user in a single statement. A taken email is reported as
	/// `StoreError::Conflict`
	async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

	async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}
