//! Gmail OAuth2 authentication
//!
//! Implements the OAuth2 authorization code flow with a loopback listener
//! for the callback. Tokens are kept per profile in `token.json` and
//! refreshed when they are within five minutes of expiry.

use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpListener;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, bail};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::GmailCredentials;
use crate::error::{Error, Result};

/// Token filename inside a profile directory
pub const TOKEN_FILE: &str = "token.json";

/// Seconds before expiry at which a token is refreshed
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Access-token source for one profile
///
/// The fetch executor calls [`GmailAuth::access_token`] from many worker
/// threads; the cached token sits behind a mutex so only one of them
/// refreshes it.
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
    cached: Mutex<Option<StoredToken>>,
}

/// Stored token data
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl StoredToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at > now + EXPIRY_MARGIN_SECS)
    }
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

/// Grant presented to the token endpoint
enum Grant<'a> {
    AuthorizationCode { code: &'a str, redirect_uri: &'a str },
    Refresh(&'a str),
}

impl Grant<'_> {
    fn form_fields(&self) -> Vec<(&str, &str)> {
        match self {
            Grant::AuthorizationCode { code, redirect_uri } => vec![
                ("grant_type", "authorization_code"),
                ("code", *code),
                ("redirect_uri", *redirect_uri),
            ],
            Grant::Refresh(refresh_token) => vec![
                ("grant_type", "refresh_token"),
                ("refresh_token", *refresh_token),
            ],
        }
    }
}

/// Query parameters of the OAuth redirect
#[derive(Debug, Default, PartialEq, Eq)]
struct Callback {
    code: Option<String>,
    error: Option<String>,
}

impl Callback {
    /// Parse `GET /?code=AUTH_CODE&scope=... HTTP/1.1`
    fn from_request_line(request_line: &str) -> Self {
        let query = request_line
            .split_whitespace()
            .nth(1)
            .and_then(|target| target.split_once('?'))
            .map(|(_, query)| query)
            .unwrap_or_default();

        let mut callback = Self::default();
        for (name, raw) in query.split('&').filter_map(|pair| pair.split_once('=')) {
            let value = urlencoding::decode(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            match name {
                "code" => callback.code = Some(value),
                "error" => callback.error = Some(value),
                _ => {}
            }
        }
        callback
    }

    fn into_code(self) -> anyhow::Result<String> {
        if let Some(error) = self.error {
            bail!("Authorization was denied: {}", error);
        }
        self.code.context("Redirect carried no authorization code")
    }
}

const CALLBACK_PAGE_OK: &str = concat!(
    "<html><body><h1>gmailsort is authorized</h1>",
    "<p>You can close this window.</p></body></html>"
);
const CALLBACK_PAGE_FAILED: &str = concat!(
    "<html><body><h1>gmailsort was not authorized</h1>",
    "<p>See the terminal for details.</p></body></html>"
);

impl GmailAuth {
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Modify allows reading metadata and changing labels
    const SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.modify";

    /// Loopback ports tried for the OAuth redirect
    const CALLBACK_PORTS: RangeInclusive<u16> = 8080..=8090;

    /// Create an authenticator that keeps its token at `token_path`
    pub fn new(credentials: &GmailCredentials, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            token_path: token_path.into(),
            cached: Mutex::new(None),
        }
    }

    /// Create an authenticator for the profile stored in `profile_dir`
    pub fn for_profile(credentials: &GmailCredentials, profile_dir: &Path) -> Self {
        Self::new(credentials, profile_dir.join(TOKEN_FILE))
    }

    /// Get a valid access token, refreshing or re-authenticating as needed
    pub fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref()
            && token.is_fresh(now)
        {
            return Ok(token.access_token.clone());
        }

        let token = self
            .obtain_token(cached.take(), now)
            .map_err(|e| Error::Auth(format!("{e:#}")))?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Whether a token is stored for this profile
    pub fn has_token(&self) -> bool {
        self.token_path.is_file()
    }

    /// Forget the cached token and delete the stored one
    pub fn logout(&self) -> Result<()> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match fs::remove_file(&self.token_path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn obtain_token(&self, cached: Option<StoredToken>, now: i64) -> anyhow::Result<StoredToken> {
        let stored = cached.or_else(|| config::load_json_file(&self.token_path).ok());

        let refresh_token = match stored {
            Some(token) if token.is_fresh(now) => return Ok(token),
            Some(token) => token.refresh_token,
            None => None,
        };

        if let Some(refresh_token) = refresh_token {
            debug!("Refreshing access token");
            match self.request_token(Grant::Refresh(&refresh_token)) {
                Ok(mut response) => {
                    // Refresh responses omit the refresh token
                    response.refresh_token.get_or_insert(refresh_token);
                    return self.store(response, now);
                }
                Err(e) => warn!("Token refresh failed, re-authenticating: {e:#}"),
            }
        }

        let response = self.authorize()?;
        self.store(response, now)
    }

    /// Interactive authorization through the browser and a loopback redirect
    fn authorize(&self) -> anyhow::Result<TokenResponse> {
        let (listener, port) = Self::CALLBACK_PORTS
            .clone()
            .find_map(|port| {
                TcpListener::bind(("127.0.0.1", port))
                    .ok()
                    .map(|listener| (listener, port))
            })
            .with_context(|| {
                format!(
                    "No free loopback port in {:?} for the OAuth redirect",
                    Self::CALLBACK_PORTS
                )
            })?;
        let redirect_uri = format!("http://localhost:{}", port);
        let url = self.authorization_url(&redirect_uri);

        info!("Gmail authorization required, opening browser");
        info!("If no browser opens, visit: {}", url);
        if let Err(e) = open::that(&url) {
            warn!("Could not open a browser: {}", e);
        }

        let code = Self::await_redirect(&listener)?.into_code()?;
        debug!("Exchanging authorization code for tokens");
        let response = self.request_token(Grant::AuthorizationCode {
            code: &code,
            redirect_uri: &redirect_uri,
        })?;
        info!("Gmail authorization granted");
        Ok(response)
    }

    fn authorization_url(&self, redirect_uri: &str) -> String {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", Self::SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ];
        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect();
        format!("{}?{}", Self::AUTH_URL, query.join("&"))
    }

    /// Accept one redirect on the loopback listener and answer it
    fn await_redirect(listener: &TcpListener) -> anyhow::Result<Callback> {
        let (mut stream, peer) = listener
            .accept()
            .context("Failed to accept the OAuth redirect")?;
        debug!("OAuth redirect from {}", peer);

        let mut request_line = String::new();
        BufReader::new(&stream)
            .read_line(&mut request_line)
            .context("Failed to read the OAuth redirect")?;
        let callback = Callback::from_request_line(&request_line);

        let (status, page) = match callback.code {
            Some(_) => ("200 OK", CALLBACK_PAGE_OK),
            None => ("400 Bad Request", CALLBACK_PAGE_FAILED),
        };
        let reply = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{page}",
            page.len()
        );
        if let Err(e) = stream.write_all(reply.as_bytes()) {
            debug!("Could not answer the OAuth redirect: {}", e);
        }
        Ok(callback)
    }

    fn request_token(&self, grant: Grant<'_>) -> anyhow::Result<TokenResponse> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend(grant.form_fields());

        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form(form)
            .context("Token request failed")?;
        response
            .body_mut()
            .read_json()
            .context("Malformed token response")
    }

    fn store(&self, response: TokenResponse, now: i64) -> anyhow::Result<StoredToken> {
        let token = StoredToken {
            expires_at: response.expires_in.map(|secs| now + secs as i64),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        };
        config::save_json_file(&self.token_path, &token)?;
        Ok(token)
    }
}
