//! OAuth2 authentication for the Gmail API (read-only)

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::{debug, info};
use yup_oauth2::ApplicationSecret;

use crate::error::{GmailError, Result};

/// Read-only access to messages and settings; nothing is ever modified
pub const READONLY_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.readonly"];

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Initialize Gmail API hub with OAuth2 authentication
///
/// Runs the installed-app flow on first use (a browser window opens for
/// consent) and persists the token to `token_cache_path`; later runs refresh
/// the cached token silently.
pub async fn initialize_gmail_hub(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<GmailHub> {
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to read credentials: {}", e)))?;

    if let Some(parent) = token_cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Obtain the token up front so consent happens before any fetch starts
    let _token = auth
        .token(READONLY_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;
    debug!("OAuth token available for {:?}", READONLY_SCOPES);

    // HTTP/1 only; google-gmail1 misbehaves with HTTP/2 here
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| {
                    GmailError::AuthError(format!("Failed to load TLS roots: {}", e))
                })?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, auth))
}

/// Delete the cached token so the next authentication starts a fresh consent flow
///
/// Returns whether a cached token existed.
pub async fn clear_token_cache(token_cache_path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(token_cache_path).await {
        Ok(()) => {
            info!("Removed cached token at {:?}", token_cache_path);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Google OAuth2 client secrets file (`credentials.json`)
///
/// Desktop clients carry an `installed` section, web clients a `web` section.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<ClientSecret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<ClientSecret>,
}

impl Credentials {
    /// Whether the file has one of the sections the OAuth flow understands
    pub fn is_valid(&self) -> bool {
        self.installed.is_some() || self.web.is_some()
    }

    pub fn client(&self) -> Option<&ClientSecret> {
        self.installed.as_ref().or(self.web.as_ref())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub auth_uri: String,
    #[serde(default)]
    pub token_uri: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Load OAuth2 credentials from a JSON file
pub async fn load_credentials(path: &Path) -> Result<Credentials> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        GmailError::ConfigError(format!("Cannot read credentials file {:?}: {}", path, e))
    })?;
    let creds = serde_json::from_str(&content)?;
    Ok(creds)
}

/// Load and check the credentials file, rejecting files without an
/// `installed` or `web` section
pub async fn validate_credentials(path: &Path) -> Result<Credentials> {
    let creds = load_credentials(path).await?;
    if !creds.is_valid() {
        return Err(GmailError::ConfigError(format!(
            "{:?} has neither an 'installed' nor a 'web' section. \
             Download an OAuth client ID of type 'Desktop app' from the Google Cloud Console",
            path
        )));
    }
    Ok(creds)
}

/// Load OAuth2 credentials from environment variables
///
/// # Environment Variables
/// - `GMAIL_CLIENT_ID`: OAuth2 client ID
/// - `GMAIL_CLIENT_SECRET`: OAuth2 client secret
/// - `GMAIL_REDIRECT_URI`: Redirect URI (optional, defaults to http://localhost:8080)
pub fn load_credentials_from_env() -> Result<ApplicationSecret> {
    let client_id = env::var("GMAIL_CLIENT_ID")
        .map_err(|_| GmailError::ConfigError("GMAIL_CLIENT_ID not set".to_string()))?;
    let client_secret = env::var("GMAIL_CLIENT_SECRET")
        .map_err(|_| GmailError::ConfigError("GMAIL_CLIENT_SECRET not set".to_string()))?;
    let redirect_uri = env::var("GMAIL_REDIRECT_URI")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());

    Ok(ApplicationSecret {
        client_id,
        client_secret,
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        redirect_uris: vec![redirect_uri],
        ..Default::default()
    })
}

/// Write an `installed` credentials file from the `GMAIL_*` environment variables
pub async fn write_credentials_from_env(path: &Path) -> Result<()> {
    let secret = load_credentials_from_env()?;
    let creds = Credentials {
        installed: Some(ClientSecret {
            client_id: secret.client_id,
            project_id: String::new(),
            auth_uri: secret.auth_uri,
            token_uri: secret.token_uri,
            client_secret: secret.client_secret,
            redirect_uris: secret.redirect_uris,
        }),
        web: None,
    };
    tokio::fs::write(path, serde_json::to_string_pretty(&creds)?).await?;
    secure_token_file(path).await
}

/// Restrict a secrets file to owner read/write (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows relies on ACLs inherited from the user profile directory
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
