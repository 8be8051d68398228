//! OAuth2 credential persistence and acquisition for the Gmail send scope.
//!
//! The credential lives in a small versioned JSON file together with the
//! OAuth client it was issued to, so an expired token can be refreshed
//! without the client-secret file. `yup-oauth2` drives the installed-app
//! consent flow and writes its result through [`FileTokenStorage`].

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::storage::{TokenInfo, TokenStorage};
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::config::GmailConfig;

pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

/// Version written by [`write_credential`]; files with a higher version are ignored
pub const CREDENTIAL_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing client secret: {} not found", .0.display())]
    MissingClientSecret(PathBuf),

    #[error("unable to read client secret {}: {source}", .path.display())]
    ClientSecret {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("GOOGLE_CREDENTIALS_BASE64 is not valid base64: {0}")]
    SecretEncoding(#[from] base64::DecodeError),

    #[error("unable to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("OAuth2 authorization failed: {0}")]
    Flow(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("refresh token was revoked or has expired, authorize again")]
    Revoked,

    #[error("authorization returned no access token")]
    EmptyToken,
}

/// Access/refresh token pair as persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Absent in v1 files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<OAuthClient>,
}

/// The OAuth client a credential was issued to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
}

impl From<&ApplicationSecret> for OAuthClient {
    fn from(secret: &ApplicationSecret) -> Self {
        OAuthClient {
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            token_uri: secret.token_uri.clone(),
        }
    }
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some()
    }

    fn from_token_info(token: TokenInfo) -> Option<Self> {
        Some(Credential {
            access_token: token.access_token?,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_at
                .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), 0)),
            client: None,
        })
    }

    fn into_token_info(self) -> TokenInfo {
        TokenInfo {
            access_token: Some(self.access_token),
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_at
                .and_then(|at| time::OffsetDateTime::from_unix_timestamp(at.timestamp()).ok()),
            id_token: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CredentialFile {
    version: u32,
    credential: Credential,
}

/// Persist a credential, replacing whatever the file held before
pub fn write_credential(path: &Path, credential: &Credential) -> Result<(), AuthError> {
    let io_err = |source: io::Error| AuthError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = CredentialFile {
        version: CREDENTIAL_FORMAT_VERSION,
        credential: credential.clone(),
    };
    let json = serde_json::to_vec_pretty(&file).map_err(|e| io_err(e.into()))?;

    // Write next to the target then rename, so a crash never leaves half a file
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&json).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    debug!("Credential written to {}", path.display());
    Ok(())
}

/// Load a persisted credential; unreadable or unknown files count as absent
pub fn read_credential(path: &Path) -> Option<Credential> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("⚠️  Unable to read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice::<CredentialFile>(&bytes) {
        Ok(file) if file.version <= CREDENTIAL_FORMAT_VERSION => Some(file.credential),
        Ok(file) => {
            warn!(
                "⚠️  {} uses credential format v{} (supported: v{}), ignoring it",
                path.display(),
                file.version,
                CREDENTIAL_FORMAT_VERSION
            );
            None
        }
        Err(e) => {
            warn!("❌ Error reading token {}: {}, a new one will be requested", path.display(), e);
            None
        }
    }
}

/// `yup-oauth2` token storage backed by the versioned credential file
pub struct FileTokenStorage {
    path: PathBuf,
    client: Option<OAuthClient>,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTokenStorage {
            path: path.into(),
            client: None,
        }
    }

    /// Record `client` alongside every token written
    pub fn with_client(mut self, client: OAuthClient) -> Self {
        self.client = Some(client);
        self
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        let Some(mut credential) = Credential::from_token_info(token) else {
            anyhow::bail!("refusing to store a token without an access token");
        };
        credential.client = self.client.clone();
        write_credential(&self.path, &credential)?;
        info!("✅ Token stored to {}", self.path.display());
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        read_credential(&self.path).map(Credential::into_token_info)
    }
}

/// Opens the consent page in the system browser
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserFlowDelegate;

impl InstalledFlowDelegate for BrowserFlowDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(present_consent_url(url, need_code))
    }
}

async fn present_consent_url(url: &str, need_code: bool) -> Result<String, String> {
    info!("🔐 Authorize this app by visiting this URL:\n{}", url);

    if let Err(e) = open::that_detached(url) {
        warn!("⚠️  Unable to open a browser ({}), open the URL above manually", e);
    }

    if !need_code {
        return Ok(String::new());
    }

    println!("Paste the code from that page here: ");
    let mut code = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut code)
        .await
        .map_err(|e| e.to_string())?;
    Ok(code.trim().to_string())
}

/// Bearer credentials for one call to the mail provider
#[derive(Clone)]
pub struct AuthorizedClient {
    access_token: String,
}

impl AuthorizedClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        AuthorizedClient {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Source of authorized clients for the mail sender
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> Result<AuthorizedClient, AuthError>;
}

/// Successful answer of the token endpoint to a refresh-token grant
#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
}

pub struct CredentialStore {
    client_secret_path: PathBuf,
    token_cache_path: PathBuf,
    client_secret_base64: Option<String>,
    http: reqwest::Client,
}

impl CredentialStore {
    pub fn new(config: &GmailConfig) -> Self {
        CredentialStore {
            client_secret_path: PathBuf::from(&config.credentials_path),
            token_cache_path: PathBuf::from(&config.token_cache_path),
            client_secret_base64: config.credentials_base64.clone(),
            http: reqwest::Client::new(),
        }
    }

    pub fn stored_credential(&self) -> Option<Credential> {
        read_credential(&self.token_cache_path)
    }

    /// Materialize the client secret from its base64 form when the file is missing
    fn ensure_client_secret(&self) -> Result<(), AuthError> {
        if self.client_secret_path.exists() {
            return Ok(());
        }

        if let Some(encoded) = &self.client_secret_base64 {
            let decoded = general_purpose::STANDARD.decode(encoded.trim())?;
            fs::write(&self.client_secret_path, decoded).map_err(|source| AuthError::Io {
                path: self.client_secret_path.clone(),
                source,
            })?;
            info!(
                "✅ {} created from GOOGLE_CREDENTIALS_BASE64",
                self.client_secret_path.display()
            );
            return Ok(());
        }

        Err(AuthError::MissingClientSecret(self.client_secret_path.clone()))
    }

    async fn application_secret(&self) -> Result<ApplicationSecret, AuthError> {
        self.ensure_client_secret()?;

        yup_oauth2::read_application_secret(&self.client_secret_path)
            .await
            .map_err(|source| AuthError::ClientSecret {
                path: self.client_secret_path.clone(),
                source,
            })
    }

    fn forget_credential(&self) {
        match fs::remove_file(&self.token_cache_path) {
            Ok(()) => info!(
                "🗑️  Removed rejected token {}, the next send will ask for consent again",
                self.token_cache_path.display()
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("⚠️  Unable to remove {}: {}", self.token_cache_path.display(), e),
        }
    }

    /// Return an authorized client, refreshing or running the consent flow when needed
    pub async fn authorized_client(&self) -> Result<AuthorizedClient, AuthError> {
        if let Some(credential) = self.stored_credential() {
            if !credential.is_expired_at(Utc::now()) {
                debug!("Using stored Gmail credential");
                return Ok(AuthorizedClient::new(credential.access_token));
            }

            if credential.is_refreshable() {
                info!("🔄 Token expired, refreshing...");
                return self.refresh(credential).await;
            }

            info!("🔄 Token expired without refresh token, consent required");
        }

        self.run_consent_flow().await
    }

    /// Exchange the refresh token for a new access token and overwrite the stored credential
    async fn refresh(&self, credential: Credential) -> Result<AuthorizedClient, AuthError> {
        // v1 files carry no client, fall back to the client-secret file
        let client = match &credential.client {
            Some(client) => client.clone(),
            None => OAuthClient::from(&self.application_secret().await?),
        };
        let refresh_token = credential.refresh_token.clone().unwrap_or_default();

        let response = self
            .http
            .post(&client.token_uri)
            .form(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        if !status.is_success() {
            let error = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_default();
            if error == "invalid_grant" {
                warn!("❌ Refresh token rejected by {}", client.token_uri);
                self.forget_credential();
                return Err(AuthError::Revoked);
            }
            return Err(AuthError::Refresh(format!("{} {}", status, body)));
        }

        let refreshed: RefreshResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Refresh(format!("unexpected token response: {}", e)))?;
        if refreshed.access_token.is_empty() {
            return Err(AuthError::EmptyToken);
        }

        let renewed = Credential {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or(credential.refresh_token),
            expires_at: refreshed
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            client: Some(client),
        };
        write_credential(&self.token_cache_path, &renewed)?;
        info!("✅ Token refreshed and stored to {}", self.token_cache_path.display());

        Ok(AuthorizedClient::new(renewed.access_token))
    }

    async fn run_consent_flow(&self) -> Result<AuthorizedClient, AuthError> {
        let secret = self.application_secret().await?;
        let storage =
            FileTokenStorage::new(&self.token_cache_path).with_client(OAuthClient::from(&secret));

        let auth = InstalledFlowAuthenticator::builder(
            secret,
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(storage))
        .flow_delegate(Box::new(BrowserFlowDelegate))
        .build()
        .await
        .map_err(|e| AuthError::Flow(format!("unable to create OAuth2 authenticator: {}", e)))?;

        let token = auth
            .token(&[GMAIL_SEND_SCOPE])
            .await
            .map_err(|e| AuthError::Flow(e.to_string()))?;

        let access_token = token.token().ok_or(AuthError::EmptyToken)?;
        info!("✅ Gmail authorization ready");

        Ok(AuthorizedClient::new(access_token))
    }
}

#[async_trait]
impl Authorizer for CredentialStore {
    async fn authorize(&self) -> Result<AuthorizedClient, AuthError> {
        self.authorized_client().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_in(dir: &Path, base64: Option<&str>) -> CredentialStore {
        CredentialStore {
            client_secret_path: dir.join("credentials.json"),
            token_cache_path: dir.join("token.json"),
            client_secret_base64: base64.map(str::to_string),
            http: reqwest::Client::new(),
        }
    }

    fn oauth_client(server: &MockServer) -> OAuthClient {
        OAuthClient {
            client_id: "client-id.apps.googleusercontent.com".to_string(),
            client_secret: "client-secret".to_string(),
            token_uri: format!("{}/token", server.uri()),
        }
    }

    fn write_client_secret(store: &CredentialStore, server: &MockServer) {
        let secret = json!({
            "installed": {
                "client_id": "client-id.apps.googleusercontent.com",
                "client_secret": "client-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": format!("{}/token", server.uri()),
                "redirect_uris": ["http://localhost"],
                "project_id": "maildraft"
            }
        });
        fs::write(&store.client_secret_path, secret.to_string()).unwrap();
    }

    async fn token_endpoint(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
            .and(body_string_contains("client_secret=client-secret"))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    fn credential(expires_in: Duration, refresh: Option<&str>) -> Credential {
        Credential {
            access_token: "ya29.access".to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_at: Some(Utc::now() + expires_in),
            client: None,
        }
    }

    #[test]
    fn test_credential_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let original = credential(Duration::hours(1), Some("1//refresh"));

        write_credential(&path, &original).unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], CREDENTIAL_FORMAT_VERSION);

        // Overwrites in place
        let replacement = credential(Duration::hours(2), None);
        write_credential(&path, &replacement).unwrap();
        assert_eq!(read_credential(&path), Some(replacement));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(
            &path,
            r#"{"version":1,"extra":true,"credential":{"access_token":"abc","scopes":["x"]}}"#,
        )
        .unwrap();

        let loaded = read_credential(&path).unwrap();
        assert_eq!(loaded.access_token, "abc");
        assert_eq!(loaded.refresh_token, None);
        assert_eq!(loaded.expires_at, None);
        assert_eq!(loaded.client, None);
    }

    #[test]
    fn test_newer_or_corrupt_files_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        fs::write(&path, r#"{"version":99,"credential":{"access_token":"abc"}}"#).unwrap();
        assert_eq!(read_credential(&path), None);

        fs::write(&path, b"\x80\x04pickle").unwrap();
        assert_eq!(read_credential(&path), None);

        assert_eq!(read_credential(&dir.path().join("missing.json")), None);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        assert!(credential(Duration::seconds(-1), None).is_expired_at(now));
        assert!(!credential(Duration::hours(1), None).is_expired_at(now));

        let no_expiry = Credential {
            expires_at: None,
            ..credential(Duration::zero(), None)
        };
        assert!(!no_expiry.is_expired_at(now));
    }

    #[test]
    fn test_valid_credential_skips_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), None);
        write_credential(&store.token_cache_path, &credential(Duration::hours(1), None)).unwrap();

        let client = tokio_test::block_on(store.authorize()).unwrap();
        assert_eq!(client.access_token(), "ya29.access");
    }

    #[test]
    fn test_missing_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), None);

        let err = tokio_test::block_on(store.authorize()).unwrap_err();
        assert!(matches!(err, AuthError::MissingClientSecret(_)));
        assert!(err.to_string().starts_with("missing client secret"));

        // Expired without a refresh token needs a new consent
        write_credential(&store.token_cache_path, &credential(Duration::hours(-1), None)).unwrap();
        let err = tokio_test::block_on(store.authorize()).unwrap_err();
        assert!(matches!(err, AuthError::MissingClientSecret(_)));

        // A v1 record knows no client, so its refresh needs the secret file
        write_credential(
            &store.token_cache_path,
            &credential(Duration::hours(-1), Some("1//refresh")),
        )
        .unwrap();
        let err = tokio_test::block_on(store.authorize()).unwrap_err();
        assert!(matches!(err, AuthError::MissingClientSecret(_)));
    }

    #[tokio::test]
    async fn test_refresh_with_client_secret_file() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let store = store_in(dir.path(), None);
        write_client_secret(&store, &server);
        write_credential(
            &store.token_cache_path,
            &credential(Duration::hours(-1), Some("1//refresh")),
        )
        .unwrap();

        token_endpoint(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new",
                "expires_in": 3599,
                "scope": GMAIL_SEND_SCOPE,
                "token_type": "Bearer"
            })),
        )
        .await;

        let client = store.authorized_client().await.unwrap();
        assert_eq!(client.access_token(), "new");

        let stored = store.stored_credential().unwrap();
        assert_eq!(stored.access_token, "new");
        assert_eq!(stored.refresh_token.as_deref(), Some("1//refresh"));
        assert!(!stored.is_expired_at(Utc::now()));
        assert_eq!(stored.client, Some(oauth_client(&server)));
    }

    #[tokio::test]
    async fn test_refresh_without_client_secret_file() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let store = store_in(dir.path(), None);
        let expired = Credential {
            client: Some(oauth_client(&server)),
            ..credential(Duration::hours(-1), Some("1//refresh"))
        };
        write_credential(&store.token_cache_path, &expired).unwrap();

        token_endpoint(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new",
                "expires_in": 3599,
                "refresh_token": "1//rotated"
            })),
        )
        .await;

        let client = store.authorized_client().await.unwrap();
        assert_eq!(client.access_token(), "new");
        assert!(!store.client_secret_path.exists());

        let stored = store.stored_credential().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("1//rotated"));
        assert_eq!(stored.client, Some(oauth_client(&server)));
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_forgets_credential() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let store = store_in(dir.path(), None);
        let expired = Credential {
            client: Some(oauth_client(&server)),
            ..credential(Duration::hours(-1), Some("1//refresh"))
        };
        write_credential(&store.token_cache_path, &expired).unwrap();

        token_endpoint(
            &server,
            ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })),
        )
        .await;

        let result =
            tokio::time::timeout(std::time::Duration::from_secs(5), store.authorized_client())
                .await
                .expect("refresh must not wait on a consent flow");
        assert!(matches!(result, Err(AuthError::Revoked)));
        assert!(!store.token_cache_path.exists());
    }

    #[tokio::test]
    async fn test_refresh_server_error_keeps_credential() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let store = store_in(dir.path(), None);
        let expired = Credential {
            client: Some(oauth_client(&server)),
            ..credential(Duration::hours(-1), Some("1//refresh"))
        };
        write_credential(&store.token_cache_path, &expired).unwrap();

        token_endpoint(&server, ResponseTemplate::new(503).set_body_string("unavailable")).await;

        let err = store.authorized_client().await.unwrap_err();
        assert!(matches!(err, AuthError::Refresh(_)), "{err:?}");
        assert_eq!(store.stored_credential(), Some(expired));
    }

    #[test]
    fn test_client_secret_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let secret = r#"{"installed":{"client_id":"id"}}"#;
        let store = store_in(dir.path(), Some(&general_purpose::STANDARD.encode(secret)));

        store.ensure_client_secret().unwrap();
        assert_eq!(fs::read_to_string(&store.client_secret_path).unwrap(), secret);

        let bad = store_in(tempfile::tempdir().unwrap().path(), Some("%%%"));
        assert!(matches!(bad.ensure_client_secret(), Err(AuthError::SecretEncoding(_))));
    }

    #[test]
    fn test_token_storage_uses_credential_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("token.json"));
        let expires_at = time::OffsetDateTime::from_unix_timestamp(2_000_000_000).unwrap();

        tokio_test::block_on(storage.set(
            &[GMAIL_SEND_SCOPE],
            TokenInfo {
                access_token: Some("ya29.new".to_string()),
                refresh_token: Some("1//refresh".to_string()),
                expires_at: Some(expires_at),
                id_token: None,
            },
        ))
        .unwrap();

        let stored = read_credential(&dir.path().join("token.json")).unwrap();
        assert_eq!(stored.access_token, "ya29.new");
        assert_eq!(stored.client, None);
        assert_eq!(stored.expires_at.unwrap().timestamp(), 2_000_000_000);

        let token = tokio_test::block_on(storage.get(&[GMAIL_SEND_SCOPE])).unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(token.expires_at, Some(expires_at));
    }

    #[test]
    fn test_token_storage_records_client() {
        let dir = tempfile::tempdir().unwrap();
        let client = OAuthClient {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        };
        let storage = FileTokenStorage::new(dir.path().join("token.json")).with_client(client.clone());

        tokio_test::block_on(storage.set(
            &[GMAIL_SEND_SCOPE],
            TokenInfo {
                access_token: Some("ya29.consent".to_string()),
                refresh_token: Some("1//refresh".to_string()),
                expires_at: None,
                id_token: None,
            },
        ))
        .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.path().join("token.json")).unwrap()).unwrap();
        assert_eq!(raw["version"], 2);
        assert_eq!(raw["credential"]["client"]["token_uri"], client.token_uri);

        let stored = read_credential(&dir.path().join("token.json")).unwrap();
        assert_eq!(stored.client, Some(client));
    }
}
