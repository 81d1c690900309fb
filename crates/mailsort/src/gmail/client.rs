//! Gmail API HTTP client
//!
//! Implements [`MailService`] over the Gmail REST API v1.
//! Uses synchronous HTTP (ureq) so the fetch executor's worker threads can
//! share one client.

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::GmailAuth;
use super::api::{
    BatchModifyRequest, CreateLabelRequest, GmailLabel, GmailMessage, HistoryResponse,
    ListLabelsResponse, ListMessagesResponse, ProfileResponse,
};
use super::normalize::{
    KEPT_HEADERS, normalize_history, normalize_label, normalize_message, normalize_profile,
};
use crate::error::{Error, Result};
use crate::models::{Label, LabelId, Message, MessageId, Profile};
use crate::service::{MailService, Page};
use crate::sync::HistoryRecord;

/// Gmail API client for one authenticated profile
pub struct GmailClient {
    auth: GmailAuth,
    page_size: usize,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1/users/me";

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        Self {
            auth,
            page_size: 500,
        }
    }

    /// Builder method to set the listing page size (1-500)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, 500);
        self
    }

    /// Run the authorization flow now if no valid token is stored
    pub fn authenticate(&self) -> Result<()> {
        self.auth.access_token().map(|_| ())
    }

    fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.auth.access_token()?))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = format!("{}/{}", Self::BASE_URL, path);
        debug!("GET {}", url);
        let mut response = ureq::get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .map_err(|e| classify_error(e, what))?;
        response
            .body_mut()
            .read_json()
            .map_err(|e| Error::protocol(format!("Failed to parse {what} response: {e}")))
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<T> {
        let mut response = self.post(path, body, what)?;
        response
            .body_mut()
            .read_json()
            .map_err(|e| Error::protocol(format!("Failed to parse {what} response: {e}")))
    }

    fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        let url = format!("{}/{}", Self::BASE_URL, path);
        debug!("POST {}", url);
        ureq::post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(body)
            .map_err(|e| classify_error(e, what))
    }

    fn with_page_token(mut path: String, page_token: Option<&str>) -> String {
        if let Some(token) = page_token.filter(|t| !t.is_empty()) {
            path.push_str("&pageToken=");
            path.push_str(&urlencoding::encode(token));
        }
        path
    }
}

/// Map a transport or HTTP status failure onto the error taxonomy
///
/// 403 is how Gmail reports per-user quota exhaustion, so it is treated
/// like 429.
fn classify_error(e: ureq::Error, what: &str) -> Error {
    match e {
        ureq::Error::StatusCode(401) => Error::Auth(format!("{what}: access token rejected")),
        ureq::Error::StatusCode(status @ (403 | 429)) => {
            Error::RateLimited(format!("{what}: HTTP {status}"))
        }
        ureq::Error::StatusCode(404) => Error::NotFound(what.to_string()),
        ureq::Error::StatusCode(status) => Error::Protocol {
            status: Some(status),
            message: format!("{what} failed"),
        },
        ureq::Error::Io(e) => Error::Network(format!("{what}: {e}")),
        e @ (ureq::Error::Timeout(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed) => Error::Network(format!("{what}: {e}")),
        other => Error::protocol(format!("{what}: {other}")),
    }
}

impl MailService for GmailClient {
    fn get_profile(&self) -> Result<Profile> {
        let profile: ProfileResponse = self.get_json("profile", "profile")?;
        normalize_profile(profile)
    }

    fn list_message_ids(&self, page_token: Option<&str>) -> Result<Page<MessageId>> {
        let path =
            Self::with_page_token(format!("messages?maxResults={}", self.page_size), page_token);
        let list: ListMessagesResponse = self.get_json(&path, "message list")?;
        Ok(Page {
            items: list
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| MessageId::new(m.id))
                .collect(),
            next_page_token: list.next_page_token,
        })
    }

    fn get_message(&self, id: &MessageId) -> Result<Message> {
        let headers: String = KEPT_HEADERS
            .iter()
            .map(|h| format!("&metadataHeaders={h}"))
            .collect();
        let path = format!(
            "messages/{}?format=metadata{}",
            urlencoding::encode(id.as_str()),
            headers
        );
        let message: GmailMessage = self.get_json(&path, &format!("message {id}"))?;
        Ok(normalize_message(message))
    }

    fn list_history(
        &self,
        start_history_id: u64,
        page_token: Option<&str>,
    ) -> Result<Page<HistoryRecord>> {
        let path = Self::with_page_token(
            format!(
                "history?startHistoryId={}&maxResults={}",
                start_history_id, self.page_size
            ),
            page_token,
        );
        let response: HistoryResponse =
            self.get_json(&path, &format!("history {start_history_id}"))?;
        let items = response
            .history
            .unwrap_or_default()
            .into_iter()
            .map(normalize_history)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page {
            items,
            next_page_token: response.next_page_token,
        })
    }

    fn list_labels(&self) -> Result<Vec<Label>> {
        let response: ListLabelsResponse = self.get_json("labels", "labels")?;
        Ok(response
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(normalize_label)
            .collect())
    }

    fn create_label(&self, name: &str) -> Result<Label> {
        let request = CreateLabelRequest {
            name,
            label_list_visibility: "labelShow",
            message_list_visibility: "show",
        };
        let label: GmailLabel =
            self.post_json("labels", &request, &format!("create label '{name}'"))?;
        Ok(normalize_label(label))
    }

    fn batch_modify(&self, ids: &[MessageId], add: &[LabelId], remove: &[LabelId]) -> Result<()> {
        let request = BatchModifyRequest {
            ids: ids.iter().map(MessageId::as_str).collect(),
            add_label_ids: add.iter().map(LabelId::as_str).collect(),
            remove_label_ids: remove.iter().map(LabelId::as_str).collect(),
        };
        self.post("messages/batchModify", &request, "batch modify")?;
        Ok(())
    }
}
