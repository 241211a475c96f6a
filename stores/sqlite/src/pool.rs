use std::{ ops::Deref, sync::{ Arc, Mutex } };

use anyhow::{ bail, Result };
use rusqlite::functions::FunctionFlags;
use tokio::sync::{ OwnedSemaphorePermit, Semaphore };
use tokio_rusqlite::Connection as AsyncConnection;
use tracing::debug;

/// Unicode-aware lowercase, registered on every pooled connection
pub const UNICODE_LOWER: &str = "unicode_lower";

/// Fixed set of SQLite connections handed out one request at a time.
pub struct ConnectionPool {
	idle: Arc<Mutex<Vec<AsyncConnection>>>,
	permits: Arc<Semaphore>,
	size: usize,
}

/// A checked-out connection. Dropping it puts the connection back.
pub struct PooledConnection {
	conn: AsyncConnection,
	idle: Arc<Mutex<Vec<AsyncConnection>>>,
	_permit: OwnedSemaphorePermit,
}

impl ConnectionPool {
	pub async fn open(db_path: &str, size: usize) -> Result<Self> {
		if size == 0 {
			bail!("connection pool needs at least one connection");
		}

		let mut conns = Vec::with_capacity(size);
		for _ in 0..size {
			conns.push(open_connection(db_path).await?);
		}
		debug!("Opened {} connections to {}", size, db_path);

		Ok(Self {
			idle: Arc::new(Mutex::new(conns)),
			permits: Arc::new(Semaphore::new(size)),
			size,
		})
	}

	pub fn size(&self) -> usize {
		self.size
	}

	/// Wait for a free connection
	pub async fn get(&self) -> Result<PooledConnection> {
		let permit = self.permits.clone().acquire_owned().await?;

		let conn = {
			let mut idle = self.idle
				.lock()
				.map_err(|_| anyhow::anyhow!("connection pool lock poisoned"))?;
			idle.pop()
		};

		match conn {
			Some(conn) =>
				Ok(PooledConnection {
					conn,
					idle: self.idle.clone(),
					_permit: permit,
				}),
			// Permits and idle connections are kept in step, so this means the
			// pool was corrupted by a panic while returning a connection
			None => bail!("connection pool is empty"),
		}
	}
}

impl Deref for PooledConnection {
	type Target = AsyncConnection;

	fn deref(&self) -> &Self::Target {
		&self.conn
	}
}

impl Drop for PooledConnection {
	fn drop(&mut self) {
		// Handles are cheap clones of the same background connection
		if let Ok(mut idle) = self.idle.lock() {
			idle.push(self.conn.clone());
		}
	}
}

// Open a connection and apply the per-connection pragmas
async fn open_connection(db_path: &str) -> Result<AsyncConnection> {
	let conn = AsyncConnection::open(db_path).await?;

	conn.call(|conn| {
		// journal_mode returns a row, so it cannot go through execute
		let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
		conn.execute_batch(
			"PRAGMA synchronous = NORMAL;
			 PRAGMA busy_timeout = 5000;
			 PRAGMA foreign_keys = ON;"
		)?;

		// SQLite's lower() only folds ASCII
		conn.create_scalar_function(
			UNICODE_LOWER,
			1,
			FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
			|ctx| Ok(ctx.get::<String>(0)?.to_lowercase())
		)?;
		Ok(())
	}).await?;

	Ok(conn)
}
