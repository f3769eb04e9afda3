//! Google Sheets record store.
//!
//! Authenticates as a service account (RS256-signed JWT exchanged for an
//! OAuth access token), makes sure the `Survey` worksheet exists with its
//! header row, then appends one row per completed survey.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use rustls_pki_types::PrivatePkcs8KeyDer;
use rustls_pki_types::pem::PemObject;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::RecordError;
use crate::store::traits::RecordStore;

/// Worksheet that receives survey rows.
pub const WORKSHEET_TITLE: &str = "Survey";

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh the access token this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const NEW_SHEET_ROWS: u32 = 2000;
const NEW_SHEET_COLS: u32 = 20;

/// The fields of a service account JSON key that matter here.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse a raw service account JSON document.
    pub fn from_json(raw: &str) -> Result<Self, RecordError> {
        serde_json::from_str(raw).map_err(|e| RecordError::Auth {
            store: "sheets".into(),
            reason: format!("Invalid service account JSON: {e}"),
        })
    }
}

/// Signs JWT assertions with the service account's RSA key.
struct JwtSigner {
    client_email: String,
    token_uri: String,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl JwtSigner {
    fn new(key: &ServiceAccountKey) -> Result<Self, RecordError> {
        let auth_err = |reason: String| RecordError::Auth {
            store: "sheets".into(),
            reason,
        };
        let der = PrivatePkcs8KeyDer::from_pem_slice(key.private_key.as_bytes())
            .map_err(|e| auth_err(format!("Unreadable private key PEM: {e}")))?;
        let key_pair = RsaKeyPair::from_pkcs8(der.secret_pkcs8_der())
            .map_err(|e| auth_err(format!("Rejected private key: {e}")))?;
        Ok(Self {
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// Build a signed `header.claims.signature` assertion issued at `iat`.
    fn assertion(&self, iat: i64) -> Result<String, RecordError> {
        let header = json!({ "alg": "RS256", "typ": "JWT" });
        let claims = json!({
            "iss": self.client_email,
            "scope": SCOPE,
            "aud": self.token_uri,
            "iat": iat,
            "exp": iat + TOKEN_LIFETIME_SECS,
        });
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );

        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &self.rng,
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| RecordError::Auth {
                store: "sheets".into(),
                reason: "Failed to sign JWT".into(),
            })?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    TOKEN_LIFETIME_SECS as u64
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct SpreadsheetInfo {
    #[serde(default)]
    sheets: Vec<SheetInfo>,
}

#[derive(Deserialize)]
struct SheetInfo {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

/// Appends survey rows to a Google Sheets worksheet.
pub struct SheetsRecordStore {
    client: reqwest::Client,
    spreadsheet_id: String,
    api_base: String,
    header: Vec<String>,
    signer: JwtSigner,
    token: Mutex<Option<CachedToken>>,
    initialized: AtomicBool,
}

impl SheetsRecordStore {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        key: &ServiceAccountKey,
        header: &[&str],
    ) -> Result<Self, RecordError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RecordError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.into(),
            api_base: SHEETS_API_BASE.to_string(),
            header: header.iter().map(|s| s.to_string()).collect(),
            signer: JwtSigner::new(key)?,
            token: Mutex::new(None),
            initialized: AtomicBool::new(false),
        })
    }

    /// Point the store at a different Sheets API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/{}", self.api_base, self.spreadsheet_id)
    }

    /// A valid access token, fetching a new one when the cached one is
    /// missing or about to expire.
    async fn access_token(&self) -> Result<String, RecordError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.signer.assertion(chrono::Utc::now().timestamp())?;
        let resp = self
            .client
            .post(&self.signer.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RecordError::Http(format!("Token request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RecordError::Auth {
                store: self.name().to_string(),
                reason: format!("Token endpoint returned {status}: {body}"),
            });
        }

        let token: TokenResponse = resp.json().await.map_err(|e| RecordError::Auth {
            store: self.name().to_string(),
            reason: format!("Malformed token response: {e}"),
        })?;
        debug!(expires_in = token.expires_in, "Fetched Sheets access token");

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    /// Send an authorized request and fail on a non-success status.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RecordError> {
        let token = self.access_token().await?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RecordError::Http(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(RecordError::Rejected {
                store: self.name().to_string(),
                reason: format!("{status}: {body}"),
            })
        }
    }

    async fn worksheet_exists(&self) -> Result<bool, RecordError> {
        let resp = self
            .send(
                self.client
                    .get(self.spreadsheet_url())
                    .query(&[("fields", "sheets.properties.title")]),
            )
            .await?;
        let info: SpreadsheetInfo = resp
            .json()
            .await
            .map_err(|e| RecordError::Http(format!("Malformed spreadsheet metadata: {e}")))?;
        Ok(info
            .sheets
            .iter()
            .any(|sheet| sheet.properties.title == WORKSHEET_TITLE))
    }

    async fn create_worksheet(&self) -> Result<(), RecordError> {
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": WORKSHEET_TITLE,
                        "gridProperties": {
                            "rowCount": NEW_SHEET_ROWS,
                            "columnCount": NEW_SHEET_COLS,
                        }
                    }
                }
            }]
        });
        self.send(
            self.client
                .post(format!("{}:batchUpdate", self.spreadsheet_url()))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn append_values(&self, row: &[String]) -> Result<(), RecordError> {
        let url = format!(
            "{}/values/{WORKSHEET_TITLE}!A1:append",
            self.spreadsheet_url()
        );
        self.send(
            self.client
                .post(url)
                .query(&[
                    ("valueInputOption", "RAW"),
                    ("insertDataOption", "INSERT_ROWS"),
                ])
                .json(&json!({ "values": [row] })),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SheetsRecordStore {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn init(&self) -> Result<(), RecordError> {
        if !self.worksheet_exists().await? {
            self.create_worksheet().await?;
            self.append_values(&self.header).await?;
            info!(worksheet = WORKSHEET_TITLE, "Created worksheet with header row");
        }
        self.initialized.store(true, Ordering::SeqCst);
        info!(spreadsheet = %self.spreadsheet_id, "Sheets record store ready");
        Ok(())
    }

    async fn append(&self, row: &[String]) -> Result<(), RecordError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(RecordError::NotInitialized {
                store: self.name().to_string(),
            });
        }
        self.append_values(row).await
    }
}
