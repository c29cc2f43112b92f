//! E-mail delivery: passcode messages and expanded-answer guides

mod sendgrid;

pub use sendgrid::{SendGridConfig, SendGridDelivery, DEFAULT_SENDER};

use crate::extract::mask_email;
use crate::runtime::DeliveryGateway;
use async_trait::async_trait;
use thiserror::Error;

/// Subject line for passcode e-mails
pub const CODE_SUBJECT: &str = "Your OTP Code";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Body of the passcode e-mail
pub fn code_email_body(code: &str) -> String {
    format!(
        "Hello,\n\n\
         Your OTP code is: {code}\n\n\
         This code expires in 5 minutes.\n\n\
         If you didn't request this, please ignore the e-mail.\n\n\
         Best regards,\nHistorical Monument Agent"
    )
}

/// Subject for the guide e-mail: `Guide: Tell Me About The Colosseum`
pub fn guide_subject(query: &str) -> String {
    let title = query
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ");
    format!("Guide: {title}")
}

/// Development gateway that only logs. Used when no mail provider is
/// configured; every send succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

#[async_trait]
impl DeliveryGateway for LogDelivery {
    async fn send_text(&self, address: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %mask_email(address),
            subject = %subject,
            body_len = body.len(),
            "Mail provider not configured; message logged instead of sent"
        );
        Ok(())
    }
}
