use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::*;
use mpg_common::Money;
use reqwest::{header::HeaderValue, Client};

use crate::{
    data_objects::{AccessTokenResponse, StkPushRequest, StkPushResponse},
    helpers::{daraja_password, daraja_timestamp},
    DarajaApiError,
    DarajaConfig,
    PushAck,
};

/// How long we are willing to wait for the gateway to acknowledge an outbound call. This is deliberately short:
/// a slow gateway at initiation time must fail the initiate call within seconds, not hold the caller for the
/// minutes the end-user may take to respond to the payment prompt.
const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct DarajaApi {
    config: DarajaConfig,
    client: Arc<Client>,
}

impl DarajaApi {
    pub fn new(config: DarajaConfig) -> Result<Self, DarajaApiError> {
        Self::with_timeout(config, DEFAULT_CLIENT_TIMEOUT)
    }

    pub fn with_timeout(config: DarajaConfig, timeout: Duration) -> Result<Self, DarajaApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DarajaApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &DarajaConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.environment.base_url())
    }

    /// Fetch a bearer token using the consumer key/secret. Tokens are requested per call; the gateway's token
    /// lifecycle is out of scope here.
    pub async fn access_token(&self) -> Result<String, DarajaApiError> {
        let url = self.url("/oauth/v1/generate?grant_type=client_credentials");
        trace!("Requesting gateway access token");
        let response = self
            .client
            .get(url)
            .basic_auth(self.config.consumer_key.reveal(), Some(self.config.consumer_secret.reveal()))
            .send()
            .await
            .map_err(|e| DarajaApiError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(DarajaApiError::Authentication(format!("status {status}: {message}")));
        }
        let token =
            response.json::<AccessTokenResponse>().await.map_err(|e| DarajaApiError::JsonError(e.to_string()))?;
        Ok(token.access_token)
    }

    /// Send an STK push prompt to the payer's device. The synchronous response carries the checkout request id
    /// that all asynchronous callbacks will be correlated against.
    pub async fn stk_push(&self, amount: Money, phone_number: &str) -> Result<PushAck, DarajaApiError> {
        let token = self.access_token().await?;
        let timestamp = daraja_timestamp(Utc::now());
        let password = daraja_password(&self.config.shortcode, self.config.passkey.reveal(), &timestamp);
        let request = StkPushRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: amount.to_shillings(),
            party_a: phone_number.to_string(),
            party_b: self.config.shortcode.clone(),
            phone_number: phone_number.to_string(),
            callback_url: self.config.callback_urls.result.clone(),
            account_reference: self.config.account_reference.clone(),
            transaction_desc: self.config.transaction_description.clone(),
        };
        let url = self.url("/mpesa/stkpush/v1/processrequest");
        trace!("Sending STK push of {amount} to {url}");
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| DarajaApiError::Initialization(e.to_string()))?;
        auth.set_sensitive(true);
        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    DarajaApiError::Unavailable(e.to_string())
                } else {
                    DarajaApiError::Unavailable(format!("request error: {e}"))
                }
            })?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            debug!("STK push rejected with status {status}: {message}");
            return Err(DarajaApiError::Rejected { status, message });
        }
        let ack = response.json::<StkPushResponse>().await.map_err(|e| DarajaApiError::JsonError(e.to_string()))?;
        if ack.response_code != "0" {
            return Err(DarajaApiError::PushDeclined {
                code: ack.response_code,
                description: ack.response_description,
            });
        }
        info!("STK push accepted by gateway: {}", ack.checkout_request_id);
        Ok(PushAck::from(ack))
    }
}
