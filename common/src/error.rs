use axum::{ http::StatusCode, response::{ IntoResponse, Response }, Json };
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::{ auth::AuthError, cart::CartError };

#[derive(Error, Debug)]
pub enum StoreError {
	/// A uniqueness constraint rejected the write
	#[error("{0}")]
	Conflict(String),

	#[error("Datastore unavailable: {0}")]
	Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
	#[error("{0}")]
	InvalidArgument(String),

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	Unauthorized(String),

	#[error("{0}")]
	NotImplemented(String),

	#[error("{0}")]
	BadGateway(String),

	#[error("{0}")]
	Internal(String),
}

impl ApiError {
	pub fn status(&self) -> StatusCode {
		match self {
			ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
			ApiError::Conflict(_) => StatusCode::CONFLICT,
			ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
			ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
			ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: String,
	message: String,
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			error!("Request failed with {}: {}", status, self);
		}

		let message = self.to_string();
		let body = ErrorBody { error: message.clone(), message };
		(status, Json(body)).into_response()
	}
}

impl From<StoreError> for ApiError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::Conflict(message) => ApiError::Conflict(message),
			// Raw datastore message goes back to the caller
			StoreError::Unavailable(message) => ApiError::Internal(message),
		}
	}
}

impl From<AuthError> for ApiError {
	fn from(err: AuthError) -> Self {
		match err {
			AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
			AuthError::Hashing(_) | AuthError::Token(_) => ApiError::Internal(err.to_string()),
		}
	}
}

impl From<CartError> for ApiError {
	fn from(err: CartError) -> Self {
		ApiError::BadGateway(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn store_errors_map_to_http_kinds() {
		let conflict: ApiError = StoreError::Conflict("Email already registered".into()).into();
		assert_eq!(conflict.status(), StatusCode::CONFLICT);

		let unavailable: ApiError = StoreError::Unavailable("disk I/O error".into()).into();
		assert_eq!(unavailable.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(unavailable.to_string(), "disk I/O error");
	}

	#[test]
	fn bad_credentials_are_unauthorized() {
		let err: ApiError = AuthError::InvalidCredentials.into();
		assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(err.to_string(), "Invalid credentials");
	}

	#[test]
	fn cart_failures_are_bad_gateway() {
		let err: ApiError = CartError::Rejected("out of stock".into()).into();
		assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
	}
}
