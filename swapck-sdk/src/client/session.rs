//! Checkout backend client (session lookup, billing details, invoices).

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{ClientError, expect_success, parse_response};
use crate::objects::billing::{AddBillingAddressRequest, SendEmailInvoiceRequest};
use crate::objects::session::{Session, SessionStatus};

/// Typed HTTP client for the checkout backend.
///
/// Sessions live in one database per network; `db_name` selects it and is
/// sent with every session lookup.
#[derive(Debug, Clone)]
pub struct SessionClient {
    http: Client,
    base_url: Url,
    db_name: String,
}

impl SessionClient {
    /// Create a new `SessionClient`.
    ///
    /// * `base_url` – root URL of the checkout site (e.g. `https://pay.example.com`).
    /// * `db_name` – session database of the active network.
    pub fn new(base_url: Url, db_name: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            db_name: db_name.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// `GET /api/session?sessionId=&db_name=` – fetch the full session.
    #[tracing::instrument(skip(self), err)]
    pub async fn get_session(&self, session_id: &str) -> Result<Session, ClientError> {
        let url = self.base_url.join("/api/session")?;

        let resp = self
            .http
            .get(url)
            .query(&[("sessionId", session_id), ("db_name", self.db_name.as_str())])
            .send()
            .await?;

        parse_response(resp).await
    }

    /// Same endpoint as [`get_session`](Self::get_session), reading only the
    /// status so a partially populated body still polls.
    #[tracing::instrument(skip(self), err, level = "debug")]
    pub async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, ClientError> {
        #[derive(Deserialize)]
        struct StatusOnly {
            #[serde(default)]
            status: SessionStatus,
        }

        let url = self.base_url.join("/api/session")?;

        let resp = self
            .http
            .get(url)
            .query(&[("sessionId", session_id), ("db_name", self.db_name.as_str())])
            .send()
            .await?;

        let body: StatusOnly = parse_response(resp).await?;
        Ok(body.status)
    }

    /// `POST /api/add-billing-address` – attach shipping/contact details and
    /// the payment transaction hash to the session.
    #[tracing::instrument(skip_all, fields(session_id = %request.session_id), err)]
    pub async fn add_billing_address(
        &self,
        request: &AddBillingAddressRequest,
    ) -> Result<(), ClientError> {
        let url = self.base_url.join("/api/add-billing-address")?;

        let resp = self.http.post(url).json(request).send().await?;

        expect_success(resp).await
    }

    /// `POST /api/sendEmailInvoice` – ask the backend to e-mail the invoice.
    #[tracing::instrument(skip(self), err)]
    pub async fn send_email_invoice(&self, session_id: &str) -> Result<(), ClientError> {
        let url = self.base_url.join("/api/sendEmailInvoice")?;
        let body = SendEmailInvoiceRequest {
            session_id: session_id.to_owned(),
        };

        let resp = self.http.post(url).json(&body).send().await?;

        expect_success(resp).await
    }
}
