//! Init session command: authorize the session file once, interactively

use std::path::Path;

use tracing::info;

use crate::config::{lock_file, session_file, Credentials, FileConfig, SESSION_NAME};
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::session::{connect, SessionLock};

/// Connect with the configured credentials, logging in if needed, then
/// disconnect. Leaves an authorized session file behind.
pub async fn run(config_path: &Path) -> Result<()> {
    let file = FileConfig::load(config_path)?;
    let section = file.telegram.as_ref();
    let credentials = Credentials::resolve(section)?;
    let session_name = section
        .and_then(|t| t.session_name.as_deref())
        .unwrap_or(SESSION_NAME);

    let _lock = SessionLock::acquire(lock_file(session_name))?;
    let path = session_file(session_name);
    let lifecycle = Lifecycle::new(connect(&path, &credentials).await?);

    let me = lifecycle.connection().get_me().await;
    let teardown = lifecycle.teardown().await;

    let me = me?;
    teardown?;
    info!(session = %path.display(), "Session ready");
    println!(
        "Session {} is authorized as {}",
        path.display(),
        me.full_name()
    );
    Ok(())
}
