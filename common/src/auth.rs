use argon2::{
	password_hash::{ rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString },
	Argon2,
};
use chrono::{ Duration, Utc };
use jsonwebtoken::{ decode, encode, DecodingKey, EncodingKey, Header, Validation };
use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::models::User;

#[derive(Error, Debug)]
pub enum AuthError {
	#[error("Invalid credentials")]
	InvalidCredentials,

	#[error("Password hashing failed: {0}")]
	Hashing(String),

	#[error("Token error: {0}")]
	Token(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
	/// User id
	pub sub: String,
	pub username: String,
	pub iat: i64,
	pub exp: i64,
}

/// Password hashing and bearer-token issuance.
#[derive(Clone)]
pub struct Authenticator {
	encoding_key: EncodingKey,
	decoding_key: DecodingKey,
	token_ttl: Duration,
}

impl std::fmt::Debug for Authenticator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Authenticator").field("token_ttl", &self.token_ttl).finish_non_exhaustive()
	}
}

impl Authenticator {
	pub fn new(secret: &str, token_ttl_days: i64) -> Self {
		Self {
			encoding_key: EncodingKey::from_secret(secret.as_bytes()),
			decoding_key: DecodingKey::from_secret(secret.as_bytes()),
			token_ttl: Duration::days(token_ttl_days),
		}
	}

	/// Argon2id hash in PHC string form. Runs on the blocking pool.
	pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
		let password = password.to_string();

		tokio::task
			::spawn_blocking(move || {
				let salt = SaltString::generate(&mut OsRng);
				Argon2::default()
					.hash_password(password.as_bytes(), &salt)
					.map(|hash| hash.to_string())
					.map_err(|e| AuthError::Hashing(e.to_string()))
			}).await
			.map_err(|e| AuthError::Hashing(e.to_string()))?
	}

	/// Fails with `InvalidCredentials` on mismatch. A malformed stored hash is
	/// treated the same way so that callers cannot tell the two apart.
	pub async fn verify_password(&self, password: &str, stored_hash: &str) -> Result<(), AuthError> {
		let password = password.to_string();
		let stored_hash = stored_hash.to_string();

		tokio::task
			::spawn_blocking(move || {
				let parsed = PasswordHash::new(&stored_hash).map_err(
					|_| AuthError::InvalidCredentials
				)?;
				Argon2::default()
					.verify_password(password.as_bytes(), &parsed)
					.map_err(|_| AuthError::InvalidCredentials)
			}).await
			.map_err(|e| AuthError::Hashing(e.to_string()))?
	}

	pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
		let now = Utc::now();
		let claims = Claims {
			sub: user.id.to_string(),
			username: user.username.clone(),
			iat: now.timestamp(),
			exp: (now + self.token_ttl).timestamp(),
		};

		encode(&Header::default(), &claims, &self.encoding_key).map_err(|e|
			AuthError::Token(e.to_string())
		)
	}

	pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
		decode::<Claims>(token, &self.decoding_key, &Validation::default())
			.map(|data| data.claims)
			.map_err(|e| AuthError::Token(e.to_string()))
	}
}
