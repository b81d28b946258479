//! Persisted access/refresh token store.
//!
//! The browser client this service was built for kept `jwt` and
//! `refreshToken` in local storage; the terminal equivalent is a credentials
//! file under the config directory. The file is written atomically
//! (temp-then-rename) with user-only permissions, and both tokens are held
//! in memory as [`SecretString`] so they never appear in debug output.
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access credentials file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode credentials: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Persisted Form
// ============================================================================

/// On-disk representation of a session. Field names match what the backend
/// hands out at login so the file is self-describing.
#[derive(Serialize, Deserialize)]
struct PersistedSession {
    access_token: String,
    refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

#[derive(Default)]
struct Session {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
    user_id: Option<String>,
}

// ============================================================================
// TokenStore
// ============================================================================

/// Process-wide accessor over the persisted token pair.
///
/// All consumers reach tokens through this type; there is no other path to
/// the credentials file. Single-threaded callers get natural mutual
/// exclusion, but the store is also `Sync` (internal mutex) so it can sit
/// behind an `Arc` shared with background tasks.
pub struct TokenStore {
    session: Mutex<Session>,
    /// `None` means in-memory only (tests); mutations are not persisted.
    path: Option<PathBuf>,
}

impl TokenStore {
    /// Create an empty store with no backing file. Used by tests and by
    /// flows that must not touch the filesystem.
    pub fn in_memory() -> Self {
        Self {
            session: Mutex::new(Session::default()),
            path: None,
        }
    }

    /// Open a store backed by `path`, loading any existing session.
    ///
    /// A missing file is a logged-out state, not an error. A file that
    /// cannot be parsed is treated the same way (with a warning): the only
    /// recovery for corrupt credentials is logging in again, so failing
    /// here would just wedge the client.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let session = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<PersistedSession>(&content) {
                Ok(persisted) => {
                    tracing::debug!(path = %path.display(), "Loaded stored session");
                    Session {
                        access: Some(SecretString::from(persisted.access_token)),
                        refresh: Some(SecretString::from(persisted.refresh_token)),
                        user_id: persisted.user_id,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Credentials file is unreadable, starting logged out"
                    );
                    Session::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Session::default(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        Ok(Self {
            session: Mutex::new(session),
            path: Some(path),
        })
    }

    /// Current access token, if logged in.
    pub fn access_token(&self) -> Option<SecretString> {
        self.lock().access.clone()
    }

    /// Current refresh token, if logged in.
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.lock().refresh.clone()
    }

    /// User id captured at login (used for click analytics).
    pub fn user_id(&self) -> Option<String> {
        self.lock().user_id.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().access.is_some()
    }

    /// Install a full session after a successful login and persist it.
    pub fn set_session(
        &self,
        access: SecretString,
        refresh: SecretString,
        user_id: Option<String>,
    ) -> Result<(), StoreError> {
        {
            let mut session = self.lock();
            session.access = Some(access);
            session.refresh = Some(refresh);
            session.user_id = user_id;
        }
        self.persist()
    }

    /// Replace only the access token after a successful refresh. The refresh
    /// token and user id are untouched.
    pub fn set_access_token(&self, access: SecretString) -> Result<(), StoreError> {
        {
            let mut session = self.lock();
            session.access = Some(access);
        }
        self.persist()
    }

    /// Wipe the session from memory and remove the credentials file.
    /// Used for logout and for irrecoverable refresh failure.
    pub fn clear(&self) -> Result<(), StoreError> {
        {
            let mut session = self.lock();
            *session = Session::default();
        }
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed credentials file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Session> {
        // A poisoned mutex means another thread panicked mid-update; the
        // session data itself is plain fields, so carry on with it.
        self.session.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Write the current session to the backing file, if any.
    ///
    /// A session missing either token is persisted as logged out (file
    /// removed) — a half-pair can never be replayed into a valid login.
    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let persisted = {
            let session = self.lock();
            match (&session.access, &session.refresh) {
                (Some(access), Some(refresh)) => Some(PersistedSession {
                    access_token: access.expose_secret().to_string(),
                    refresh_token: refresh.expose_secret().to_string(),
                    user_id: session.user_id.clone(),
                }),
                _ => None,
            }
        };

        match persisted {
            Some(persisted) => {
                let json = serde_json::to_vec_pretty(&persisted)?;
                atomic_write(path, &json)?;
                tracing::debug!(path = %path.display(), "Persisted session");
                Ok(())
            }
            None => self.clear(),
        }
    }
}

/// Tokens are masked; only presence is shown.
impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.lock();
        f.debug_struct("TokenStore")
            .field("access_token", &session.access.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &session.refresh.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &session.user_id)
            .field("path", &self.path)
            .finish()
    }
}

// ============================================================================
// Atomic Write
// ============================================================================

/// Write a file using the write-to-temp-then-rename pattern so the
/// destination is never left in a partial state. The temp name is
/// randomized so a concurrent writer cannot squat on it, and the file is
/// created user-only on Unix before any secret bytes land in it.
fn atomic_write(dst: &Path, content: &[u8]) -> Result<(), StoreError> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true); // Fails atomically if file exists
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut temp_file = options.open(&temp_path)?;

    if let Err(e) = temp_file.write_all(content) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StoreError::Io(e));
    }

    // Sync to disk to ensure data is persisted before rename
    if let Err(e) = temp_file.sync_all() {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StoreError::Io(e));
    }

    // Drop the file handle before rename
    drop(temp_file);

    // Atomic rename (POSIX guarantees atomicity for rename on same filesystem)
    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if dst.exists() {
        if let Err(e) = std::fs::remove_file(dst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StoreError::Io(e));
        }
    }

    if let Err(e) = std::fs::rename(&temp_path, dst) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StoreError::Io(e));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_creds_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kiosk_store_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("credentials.json")
    }

    #[test]
    fn test_in_memory_starts_logged_out() {
        let store = TokenStore::in_memory();
        assert!(!store.is_logged_in());
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.user_id().is_none());
    }

    #[test]
    fn test_session_round_trip() {
        let path = temp_creds_path("round_trip");
        let _ = std::fs::remove_file(&path);

        let store = TokenStore::open(path.clone()).unwrap();
        store
            .set_session(
                SecretString::from("access-1"),
                SecretString::from("refresh-1"),
                Some("user-42".to_string()),
            )
            .unwrap();

        // A second store opened on the same path sees the session
        let reopened = TokenStore::open(path.clone()).unwrap();
        assert!(reopened.is_logged_in());
        assert_eq!(reopened.access_token().unwrap().expose_secret(), "access-1");
        assert_eq!(
            reopened.refresh_token().unwrap().expose_secret(),
            "refresh-1"
        );
        assert_eq!(reopened.user_id().as_deref(), Some("user-42"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_set_access_token_keeps_refresh_token() {
        let store = TokenStore::in_memory();
        store
            .set_session(
                SecretString::from("old-access"),
                SecretString::from("refresh-1"),
                None,
            )
            .unwrap();

        store
            .set_access_token(SecretString::from("new-access"))
            .unwrap();

        assert_eq!(
            store.access_token().unwrap().expose_secret(),
            "new-access"
        );
        assert_eq!(store.refresh_token().unwrap().expose_secret(), "refresh-1");
    }

    #[test]
    fn test_clear_removes_file() {
        let path = temp_creds_path("clear");
        let _ = std::fs::remove_file(&path);

        let store = TokenStore::open(path.clone()).unwrap();
        store
            .set_session(
                SecretString::from("access"),
                SecretString::from("refresh"),
                None,
            )
            .unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!store.is_logged_in());
        assert!(!path.exists());

        // Clearing twice is fine (file already gone)
        store.clear().unwrap();
    }

    #[test]
    fn test_missing_file_is_logged_out() {
        let path = temp_creds_path("missing");
        let _ = std::fs::remove_file(&path);

        let store = TokenStore::open(path).unwrap();
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_corrupt_file_is_logged_out() {
        let path = temp_creds_path("corrupt");
        std::fs::write(&path, "{ not json").unwrap();

        let store = TokenStore::open(path.clone()).unwrap();
        assert!(!store.is_logged_in());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_debug_masks_tokens() {
        let store = TokenStore::in_memory();
        store
            .set_session(
                SecretString::from("super-secret-access"),
                SecretString::from("super-secret-refresh"),
                Some("user-1".to_string()),
            )
            .unwrap();

        let debug_output = format!("{:?}", store);
        assert!(!debug_output.contains("super-secret-access"));
        assert!(!debug_output.contains("super-secret-refresh"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[cfg(unix)]
    #[test]
    fn test_credentials_file_is_user_only() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_creds_path("perms");
        let _ = std::fs::remove_file(&path);

        let store = TokenStore::open(path.clone()).unwrap();
        store
            .set_session(
                SecretString::from("access"),
                SecretString::from("refresh"),
                None,
            )
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        std::fs::remove_file(&path).ok();
    }
}
