//! `SendGrid` v3 mail-send client

use super::DeliveryError;
use crate::extract::mask_email;
use crate::runtime::DeliveryGateway;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const SEND_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

pub const DEFAULT_SENDER: &str = "no-reply@example.com";

#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    /// Verified sender address
    pub sender: String,
}

/// Single-attempt delivery through `SendGrid`. Success iff the API answers 2xx.
pub struct SendGridDelivery {
    client: Client,
    api_key: String,
    sender: String,
    endpoint: String,
}

impl SendGridDelivery {
    pub fn new(config: SendGridConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: config.api_key,
            sender: config.sender,
            endpoint: SEND_ENDPOINT.to_string(),
        }
    }

    #[allow(dead_code)] // Used to point tests at a local server
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_mail(&self, to: &str, subject: &str, body: &str) -> MailRequest {
        MailRequest {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: to.to_string(),
                }],
            }],
            from: Address {
                email: self.sender.clone(),
            },
            subject: subject.to_string(),
            content: vec![
                Content {
                    r#type: "text/plain".to_string(),
                    value: body.to_string(),
                },
                Content {
                    r#type: "text/html".to_string(),
                    value: body.replace('\n', "<br>"),
                },
            ],
        }
    }
}

#[async_trait]
impl DeliveryGateway for SendGridDelivery {
    async fn send_text(&self, address: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let mail = self.build_mail(address, subject, body);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&mail)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %mask_email(address), status = status.as_u16(), "Mail accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            to = %mask_email(address),
            status = status.as_u16(),
            "SendGrid rejected mail"
        );
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct MailRequest {
    personalizations: Vec<Personalization>,
    from: Address,
    subject: String,
    content: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Personalization {
    to: Vec<Address>,
}

#[derive(Debug, Serialize)]
struct Address {
    email: String,
}

#[derive(Debug, Serialize)]
struct Content {
    r#type: String,
    value: String,
}
