//! Session management for Telegram client
//!
//! Provides:
//! - File-based session locking to prevent parallel execution
//! - SQLite session loading (created on first run)
//! - Client creation, interactive login, and idempotent disconnect

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::client::updates::UpdatesLike;
use grammers_client::{Client, SignInError};
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::lifecycle::Connection;

/// Session lock guard that ensures exclusive access to the Telegram session.
pub struct SessionLock {
    lock_file: Option<File>,
    path: PathBuf,
}

impl SessionLock {
    /// Acquire an exclusive lock on the session.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                lock_file: Some(lock_file),
                path,
            }),
            Err(_) => {
                error!(
                    "Telegram session is already in use by another process ({}). \
                     Wait for it to finish and try again.",
                    path.display()
                );
                Err(Error::SessionLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = file.unlock();
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open the session file, creating it if it does not exist yet.
pub fn open_session(path: &Path) -> Result<Arc<SqliteSession>> {
    let session = SqliteSession::open(path)
        .map_err(|e| Error::SessionError(format!("{}: {}", path.display(), e)))?;
    Ok(Arc::new(session))
}

/// Holder for SenderPool components and Client
pub struct TelegramClient {
    pub client: Client,
    handle: SenderPoolHandle,
    runner: Mutex<Option<JoinHandle<()>>>,
    connected: AtomicBool,
    _session: Arc<SqliteSession>,
    _updates: mpsc::UnboundedReceiver<UpdatesLike>,
}

impl TelegramClient {
    /// Start the sender pool for a session.
    pub fn start(session: Arc<SqliteSession>, api_id: i32) -> Self {
        let pool = SenderPool::new(session.clone(), api_id);

        // Create client from pool (need reference to whole pool)
        let client = Client::new(&pool);

        let SenderPool {
            runner,
            updates,
            handle,
        } = pool;

        let runner_handle = tokio::spawn(async move {
            runner.run().await;
        });

        Self {
            client,
            handle,
            runner: Mutex::new(Some(runner_handle)),
            connected: AtomicBool::new(true),
            _session: session,
            _updates: updates,
        }
    }
}

impl Connection for TelegramClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Cleaning up and closing connection...");
        let _ = self.handle.quit();
        if let Some(runner) = self.runner.lock().await.take() {
            runner
                .await
                .map_err(|e| Error::ConnectionError(format!("Sender pool task failed: {}", e)))?;
        }
        info!("Connection closed.");
        Ok(())
    }
}

impl Drop for TelegramClient {
    fn drop(&mut self) {
        // Dropped without disconnect (panic, early return): still stop the pool.
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.handle.quit();
        }
    }
}

// Implement Deref to allow using TelegramClient as &Client
impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Connect with the session at `session_file`, logging in interactively if
/// the session is not authorized yet.
pub async fn connect(session_file: &Path, credentials: &Credentials) -> Result<TelegramClient> {
    info!("Connecting to Telegram...");
    let session = open_session(session_file)?;
    let client = TelegramClient::start(session, credentials.api_id);

    if client.is_authorized().await? {
        info!("Using existing session");
    } else {
        println!("First time login - authentication required");
        interactive_login(&client, credentials).await?;
        println!("Authentication successful!");
    }

    info!("Connected successfully!");
    Ok(client)
}

async fn interactive_login(client: &Client, credentials: &Credentials) -> Result<()> {
    if credentials.phone.is_empty() {
        return Err(Error::AuthorizationFailed(
            "PHONE must be set for the first login".to_string(),
        ));
    }

    let token = client
        .request_login_code(&credentials.phone, &credentials.api_hash)
        .await
        .map_err(|e| Error::AuthorizationFailed(format!("Failed to request code: {}", e)))?;

    let code = prompt("Enter the code you received in Telegram: ").await?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none").to_string();
            let password = prompt(&format!("Enter your 2FA password (hint: {}): ", hint)).await?;
            client
                .check_password(password_token, password.as_str())
                .await
                .map_err(|e| Error::AuthorizationFailed(format!("Failed to check password: {}", e)))?
        }
        Err(e) => {
            return Err(Error::AuthorizationFailed(format!("Failed to sign in: {}", e)));
        }
    };

    info!(user = %user.full_name(), "Signed in");
    Ok(())
}

/// Read one line from stdin without blocking the runtime, so a shutdown
/// signal can still interrupt the login.
async fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut input = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut input).await?;
    Ok(input.trim().to_string())
}
