//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use tempfile::TempDir;

use smartstore::{ClientConfig, SmartStoreClient};
use smartstore_core::UserId;
use smartstore_engine::{MemoryEngine, SqliteEngine};

/// A fixture with a SQLite-backed client in a temporary directory and an
/// in-memory client, both logged in as [`test_user`].
pub struct TestFixture {
    pub sqlite: SmartStoreClient<SqliteEngine>,
    pub memory: SmartStoreClient<MemoryEngine>,
    dir: TempDir,
}

impl TestFixture {
    /// Create a new fixture in a fresh temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let config = ClientConfig::for_user(test_user());

        Self {
            sqlite: SmartStoreClient::new(SqliteEngine::open(dir.path()), config.clone()),
            memory: SmartStoreClient::new(MemoryEngine::new(), config),
            dir,
        }
    }

    /// The directory holding the SQLite stores.
    pub fn root(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// A second SQLite client over the same directory, as after a restart.
    pub fn reopen_sqlite(&self) -> SmartStoreClient<SqliteEngine> {
        SmartStoreClient::new(
            SqliteEngine::open(self.dir.path()),
            ClientConfig::for_user(test_user()),
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// The user the fixtures log in as.
pub fn test_user() -> UserId {
    UserId::new("00D000000000062", "005000000000001")
}

/// Install a fmt subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
