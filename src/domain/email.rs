//! Outbound e-mail messages
//!
//! E-mail destinations do not talk SMTP themselves. They persist one message
//! per recipient to an outbound queue that a mail relay drains.

use super::entities::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File attached to a queued message, stored as a blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl EmailAttachment {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_type_for(&name).to_string();
        Self {
            name,
            mime_type,
            data,
        }
    }
}

/// One message addressed to exactly one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEmail {
    /// Sending account; `None` uses the relay default
    pub email_account_id: Option<EntityId>,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<EmailAttachment>,
    pub created_on_utc: DateTime<Utc>,
}

/// Guess a MIME type from a file extension
pub fn mime_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "zip" => "application/zip",
        "jsonl" | "ndjson" => "application/x-ndjson",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
