use std::{ fmt::Display, path::Path };

use anyhow::Result;
use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use metriks_common::{
	error::StoreError,
	models::{ Listing, NewUser, Product, ResultRow, User },
	search::SearchQuery,
	store::PriceStore,
};
use rusqlite::{ params, ErrorCode, OptionalExtension, Row };
use tracing::info;
use uuid::Uuid;

use crate::pool::ConnectionPool;

/// Cheapest current listing per product, ranked exact > prefix > substring,
/// then by price and product id. Case is folded with `unicode_lower`, which
/// every pooled connection registers. `?1` is the query text, `?2` the limit
/// and `?3` the offset.
const RANKED_SEARCH_SQL: &str =
	"
	WITH candidates AS (
		SELECT mp.id AS product_id,
			   mp.name AS product_name,
			   mp.image_url,
			   mp.brand,
			   p.price,
			   s.name AS store_name,
			   r.name AS retailer_name,
			   l.id AS listing_id,
			   ROW_NUMBER() OVER (
				   PARTITION BY mp.id
				   ORDER BY p.price ASC, l.id ASC
			   ) AS price_rank
		FROM master_products mp
		JOIN listings l ON l.master_product_id = mp.id
		JOIN prices p ON p.listing_id = l.id AND p.is_current = 1
		JOIN stores s ON s.id = l.store_id
		JOIN retailers r ON r.id = l.retailer_id
		WHERE instr(unicode_lower(mp.name), unicode_lower(?1)) > 0
	)
	SELECT product_id, product_name, image_url, price, store_name, retailer_name, listing_id, brand
	FROM candidates
	WHERE price_rank = 1
	ORDER BY
		CASE
			WHEN unicode_lower(product_name) = unicode_lower(?1) THEN 0
			WHEN instr(unicode_lower(product_name), unicode_lower(?1)) = 1 THEN 1
			ELSE 2
		END ASC,
		price ASC,
		product_id ASC
	LIMIT ?2 OFFSET ?3
";

pub struct SqliteStore {
	db_path: String,
	pool: ConnectionPool,
}

fn unavailable<E: Display>(err: E) -> StoreError {
	StoreError::Unavailable(err.to_string())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
	let id: String = row.get(0)?;
	let id = Uuid::parse_str(&id).map_err(|e| {
		rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
	})?;

	Ok(User {
		id,
		email: row.get(1)?,
		username: row.get(2)?,
		password_hash: row.get(3)?,
		created_at: row.get::<_, DateTime<Utc>>(4)?,
	})
}

impl SqliteStore {
	pub async fn new(db_path: &str, pool_size: usize) -> Result<Self> {
		// Create the data directory if it doesn't exist
		if let Some(dir) = Path::new(db_path).parent() {
			if !dir.as_os_str().is_empty() && !dir.exists() {
				std::fs::create_dir_all(dir)?;
			}
		}

		let pool = ConnectionPool::open(db_path, pool_size).await?;
		let store = Self { db_path: db_path.to_string(), pool };

		store.init().await?;
		info!("SQLite store ready at {} with {} connections", store.db_path, store.pool.size());

		Ok(store)
	}

	pub async fn insert_retailer(&self, name: &str) -> Result<i64> {
		let conn = self.pool.get().await?;
		let name = name.to_string();

		let id = conn.call(move |conn| {
			conn.execute("INSERT INTO retailers (name) VALUES (?1)", params![name])?;
			Ok(conn.last_insert_rowid())
		}).await?;

		Ok(id)
	}

	pub async fn insert_store(&self, retailer_id: i64, name: &str) -> Result<i64> {
		let conn = self.pool.get().await?;
		let name = name.to_string();

		let id = conn.call(move |conn| {
			conn.execute(
				"INSERT INTO stores (retailer_id, name) VALUES (?1, ?2)",
				params![retailer_id, name]
			)?;
			Ok(conn.last_insert_rowid())
		}).await?;

		Ok(id)
	}

	pub async fn insert_product(
		&self,
		name: &str,
		brand: Option<&str>,
		image_url: Option<&str>
	) -> Result<Product> {
		let conn = self.pool.get().await?;
		let mut product = Product {
			id: 0,
			name: name.to_string(),
			brand: brand.map(str::to_string),
			image_url: image_url.map(str::to_string),
		};

		let row = product.clone();
		product.id = conn.call(move |conn| {
			conn.execute(
				"INSERT INTO master_products (name, brand, image_url) VALUES (?1, ?2, ?3)",
				params![row.name, row.brand, row.image_url]
			)?;
			Ok(conn.last_insert_rowid())
		}).await?;

		Ok(product)
	}

	pub async fn insert_listing(&self, product_id: i64, store_id: i64, retailer_id: i64) -> Result<Listing> {
		let conn = self.pool.get().await?;

		let id = conn.call(move |conn| {
			conn.execute(
				"INSERT INTO listings (master_product_id, store_id, retailer_id) VALUES (?1, ?2, ?3)",
				params![product_id, store_id, retailer_id]
			)?;
			Ok(conn.last_insert_rowid())
		}).await?;

		Ok(Listing { id, product_id, store_id, retailer_id })
	}

	/// Make `price` the listing's current price. Earlier prices stay as
	/// history with `is_current` cleared, all in one transaction.
	pub async fn record_price(&self, listing_id: i64, price: f64) -> Result<i64> {
		let conn = self.pool.get().await?;

		let id = conn.call(move |conn| {
			let tx = conn.transaction()?;

			tx.execute(
				"UPDATE prices SET is_current = 0 WHERE listing_id = ?1 AND is_current = 1",
				params![listing_id]
			)?;
			tx.execute(
				"INSERT INTO prices (listing_id, price, is_current, recorded_at) VALUES (?1, ?2, 1, ?3)",
				params![listing_id, price, Utc::now()]
			)?;
			let id = tx.last_insert_rowid();

			tx.commit()?;
			Ok(id)
		}).await?;

		Ok(id)
	}

	/// Clear the current price of a listing that is no longer offered
	pub async fn retire_prices(&self, listing_id: i64) -> Result<usize> {
		let conn = self.pool.get().await?;

		let updated = conn.call(move |conn| {
			let updated = conn.execute(
				"UPDATE prices SET is_current = 0 WHERE listing_id = ?1 AND is_current = 1",
				params![listing_id]
			)?;
			Ok(updated)
		}).await?;

		Ok(updated)
	}

	pub async fn product_count(&self) -> Result<i64> {
		let conn = self.pool.get().await?;

		let count = conn.call(|conn| {
			let count = conn.query_row("SELECT COUNT(*) FROM master_products", [], |row| row.get(0))?;
			Ok(count)
		}).await?;

		Ok(count)
	}
}

#[async_trait]
impl PriceStore for SqliteStore {
	async fn init(&self) -> Result<(), StoreError> {
		let conn = self.pool.get().await.map_err(unavailable)?;

		conn.call(|conn| {
			conn.execute_batch(
				"
				CREATE TABLE IF NOT EXISTS retailers (
					id INTEGER PRIMARY KEY,
					name TEXT NOT NULL UNIQUE
				);

				CREATE TABLE IF NOT EXISTS stores (
					id INTEGER PRIMARY KEY,
					retailer_id INTEGER NOT NULL,
					name TEXT NOT NULL,
					FOREIGN KEY (retailer_id) REFERENCES retailers (id)
				);

				CREATE TABLE IF NOT EXISTS master_products (
					id INTEGER PRIMARY KEY,
					name TEXT NOT NULL,
					brand TEXT,
					image_url TEXT
				);

				CREATE TABLE IF NOT EXISTS listings (
					id INTEGER PRIMARY KEY,
					master_product_id INTEGER NOT NULL,
					store_id INTEGER NOT NULL,
					retailer_id INTEGER NOT NULL,
					FOREIGN KEY (master_product_id) REFERENCES master_products (id),
					FOREIGN KEY (store_id) REFERENCES stores (id),
					FOREIGN KEY (retailer_id) REFERENCES retailers (id)
				);

				CREATE TABLE IF NOT EXISTS prices (
					id INTEGER PRIMARY KEY,
					listing_id INTEGER NOT NULL,
					price REAL NOT NULL,
					is_current INTEGER NOT NULL DEFAULT 1,
					recorded_at TEXT NOT NULL,
					FOREIGN KEY (listing_id) REFERENCES listings (id)
				);

				CREATE TABLE IF NOT EXISTS users (
					id TEXT PRIMARY KEY,
					email TEXT NOT NULL UNIQUE,
					username TEXT NOT NULL,
					password_hash TEXT NOT NULL,
					created_at TEXT NOT NULL
				);

				CREATE INDEX IF NOT EXISTS idx_master_products_name ON master_products (name);
				CREATE INDEX IF NOT EXISTS idx_listings_product ON listings (master_product_id);
				CREATE INDEX IF NOT EXISTS idx_prices_listing ON prices (listing_id);
				CREATE UNIQUE INDEX IF NOT EXISTS idx_prices_one_current
					ON prices (listing_id) WHERE is_current = 1;
				"
			)?;

			Ok(())
		}).await
			.map_err(unavailable)
	}

	fn name(&self) -> String {
		"SQLite".to_string()
	}

	async fn search_master(&self, query: &SearchQuery) -> Result<Vec<ResultRow>, StoreError> {
		let conn = self.pool.get().await.map_err(unavailable)?;

		let text = query.text.clone();
		let limit = i64::from(query.limit);
		let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);

		conn.call(move |conn| {
			let mut stmt = conn.prepare(RANKED_SEARCH_SQL)?;

			let rows = stmt
				.query_map(params![text, limit, offset], |row| {
					Ok(ResultRow {
						product_id: row.get(0)?,
						product_name: row.get(1)?,
						image_url: row.get(2)?,
						price: row.get(3)?,
						store_name: row.get(4)?,
						retailer_name: row.get(5)?,
						listing_id: row.get(6)?,
						brand: row.get(7)?,
					})
				})?
				.collect::<Result<Vec<_>, _>>()?;

			Ok(rows)
		}).await
			.map_err(unavailable)
	}

	async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
		let conn = self.pool.get().await.map_err(unavailable)?;

		let created = User {
			id: Uuid::new_v4(),
			email: user.email,
			username: user.username,
			password_hash: user.password_hash,
			created_at: Utc::now(),
		};
		let row = created.clone();

		// The UNIQUE constraint on email decides, no prior lookup
		let inserted = conn
			.call(move |conn| {
				let result = conn.execute(
					"INSERT INTO users (id, email, username, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
					params![row.id.to_string(), row.email, row.username, row.password_hash, row.created_at]
				);

				match result {
					Ok(_) => Ok(true),
					Err(rusqlite::Error::SqliteFailure(err, _)) if
						err.code == ErrorCode::ConstraintViolation
					=> Ok(false),
					Err(e) => Err(e.into()),
				}
			}).await
			.map_err(unavailable)?;

		if inserted {
			Ok(created)
		} else {
			Err(StoreError::Conflict("Email already registered".to_string()))
		}
	}

	async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
		let conn = self.pool.get().await.map_err(unavailable)?;
		let email = email.trim().to_string();

		conn.call(move |conn| {
			let user = conn
				.query_row(
					"SELECT id, email, username, password_hash, created_at FROM users WHERE email = ?1",
					params![email],
					user_from_row
				)
				.optional()?;
			Ok(user)
		}).await
			.map_err(unavailable)
	}
}
