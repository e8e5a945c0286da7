// Thin client for the Brevo transactional email API.
// https://developers.brevo.com/reference/sendtransacemail

pub mod models;

use reqwest::{header, Client, StatusCode};
use thiserror::Error;

use crate::models::{ErrorResponse, SendEmailResponse, TemplateEmail};

const DEFAULT_BASE_URL: &str = "https://api.brevo.com/v3";

#[derive(Debug, Error)]
pub enum BrevoError {
    #[error("request to Brevo failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Brevo returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

#[derive(Debug, Clone)]
pub struct BrevoOptions {
    pub api_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BrevoService {
    options: BrevoOptions,
    client: Client,
}

impl BrevoService {
    pub fn new(options: BrevoOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    fn base_url(&self) -> &str {
        self.options
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
    }

    /// Send one templated email. Brevo queues the message on its side, so a
    /// successful response only means it was accepted.
    pub async fn send_template_email(
        &self,
        email: &TemplateEmail,
    ) -> Result<SendEmailResponse, BrevoError> {
        let url = format!("{}/smtp/email", self.base_url());

        let response = self
            .client
            .post(url)
            .header("api-key", &self.options.api_key)
            .header(header::ACCEPT, "application/json")
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| format!("{} ({})", e.message, e.code))
                .unwrap_or(body);
            return Err(BrevoError::Api { status, message });
        }

        Ok(response.json::<SendEmailResponse>().await?)
    }
}
