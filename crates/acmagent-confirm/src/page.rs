//! Confirmation page client. Follows the emailed link, scrapes the
//! approval form and posts it back to the issuer.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::error::ConfirmError;

/// Endpoint the approval form is posted to.
pub const APPROVAL_FORM_URL: &str = "https://certificates.amazon.com/approvals";

/// Desktop browser User-Agent sent with every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_1) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/39.0.2171.95 Safari/537.36";

/// Form field name → value.
pub type FormPayload = BTreeMap<String, String>;

/// Fixed endpoint and header values, overridable in tests.
#[derive(Clone, Debug)]
pub struct PageSettings {
    pub approval_url: String,
    pub user_agent: String,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            approval_url: APPROVAL_FORM_URL.to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

#[async_trait]
pub trait ConfirmationPage: Send + Sync {
    /// GET the confirmation link and return the first form's inputs.
    async fn fetch_confirmation_form(&self, url: &str) -> Result<FormPayload, ConfirmError>;

    /// POST the payload to the approval endpoint.
    async fn submit_form(&self, payload: &FormPayload) -> Result<(), ConfirmError>;
}

/// `reqwest`-backed confirmation page client.
pub struct HttpConfirmationPage {
    client: Client,
    settings: PageSettings,
}

impl HttpConfirmationPage {
    pub fn new(settings: PageSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &PageSettings {
        &self.settings
    }
}

impl Default for HttpConfirmationPage {
    fn default() -> Self {
        Self::new(PageSettings::default())
    }
}

#[async_trait]
impl ConfirmationPage for HttpConfirmationPage {
    async fn fetch_confirmation_form(&self, url: &str) -> Result<FormPayload, ConfirmError> {
        info!(url = %url, "Sending GET");

        let http_error = |e: reqwest::Error| ConfirmError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let body = self
            .client
            .get(url)
            .header(USER_AGENT, &self.settings.user_agent)
            .send()
            .await
            .map_err(http_error)?
            .text()
            .await
            .map_err(http_error)?;

        let payload = parse_form(&body).ok_or_else(|| ConfirmError::ExpiredOrMissingForm {
            url: url.to_string(),
        })?;

        debug!(
            payload = %serde_json::to_string(&payload).unwrap_or_default(),
            "Found confirmation form"
        );
        Ok(payload)
    }

    async fn submit_form(&self, payload: &FormPayload) -> Result<(), ConfirmError> {
        let url = &self.settings.approval_url;
        info!(
            url = %url,
            payload = %serde_json::to_string(payload).unwrap_or_default(),
            "Sending POST"
        );

        let response = self
            .client
            .post(url)
            .header(USER_AGENT, &self.settings.user_agent)
            .form(payload)
            .send()
            .await
            .map_err(|e| ConfirmError::Http {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfirmError::SubmissionFailed {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        info!("Success! The certificate has been confirmed");
        Ok(())
    }
}

/// Inputs of the first `<form>` in the page, or `None` when there is no form.
///
/// Inputs without a `name` are skipped; a missing `value` becomes `""`.
pub fn parse_form(html: &str) -> Option<FormPayload> {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").ok()?;
    let input_selector = Selector::parse("input").ok()?;

    let form = document.select(&form_selector).next()?;
    let payload = form
        .select(&input_selector)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    Some(payload)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
