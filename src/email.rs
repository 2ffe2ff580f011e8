//! Email notifications.
//!
//! Supports two modes:
//! 1. Demo: nothing is sent, the message is only logged
//! 2. Resend: delivered through the Resend API
//!
//! Every attempt, whatever the mode or outcome, is recorded in `email_logs`.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmailMode;
use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::models::EmailStatus;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2024")
fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Result of attempting to send a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailSendResult {
    /// Email was accepted by Resend
    Sent,
    /// Demo mode, logged only
    Logged,
    /// Resend mode without an API key
    NoApiKey,
}

/// The messages this service knows how to write.
#[derive(Debug, Clone)]
pub enum Notification {
    Welcome {
        name: String,
    },
    LicenseAssigned {
        customer_name: String,
        ea_name: String,
        license_key: String,
        expiration_date: Option<i64>,
    },
    AccountApproved {
        name: String,
    },
    AccountSuspended {
        name: String,
    },
}

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl Notification {
    pub fn template(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "welcome",
            Notification::LicenseAssigned { .. } => "license_assigned",
            Notification::AccountApproved { .. } => "account_approved",
            Notification::AccountSuspended { .. } => "account_suspended",
        }
    }

    pub fn render(&self) -> RenderedEmail {
        let (subject, paragraphs) = match self {
            Notification::Welcome { name } => (
                "Welcome to EA Forge".to_string(),
                vec![
                    format!("Hi {},", name),
                    "Your account has been created. You can now describe a trading strategy and we will generate the MetaTrader 5 code for it.".to_string(),
                ],
            ),
            Notification::LicenseAssigned {
                customer_name,
                ea_name,
                license_key,
                expiration_date,
            } => {
                let validity = match expiration_date {
                    Some(exp) => format!("This license is valid until {}.", format_date(*exp)),
                    None => "This license does not expire.".to_string(),
                };
                (
                    format!("Your license for {}", ea_name),
                    vec![
                        format!("Hi {},", customer_name),
                        format!("You have been licensed to use {}. Your license key is:", ea_name),
                        license_key.clone(),
                        validity,
                        "Enter this key in the Expert Advisor's input parameters in MetaTrader 5.".to_string(),
                    ],
                )
            }
            Notification::AccountApproved { name } => (
                "Your EA Forge account has been approved".to_string(),
                vec![
                    format!("Hi {},", name),
                    "An administrator approved your account. You can now generate Expert Advisors and Indicators.".to_string(),
                ],
            ),
            Notification::AccountSuspended { name } => (
                "Your EA Forge account has been suspended".to_string(),
                vec![
                    format!("Hi {},", name),
                    "An administrator suspended your account. Contact support if you think this is a mistake.".to_string(),
                ],
            ),
        };

        let text = paragraphs.join("\n\n");
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<p>{}</p>\n", html_escape(p)))
            .collect();
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">{}</h2>
{}<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">If you didn't expect this email, you can ignore it.</p>
</body>
</html>"#,
            html_escape(&subject),
            body
        );

        RenderedEmail {
            subject,
            text,
            html,
        }
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

#[derive(Clone)]
pub struct EmailService {
    mode: EmailMode,
    api_key: Option<String>,
    from_email: String,
    http_client: Client,
    db: DbPool,
}

impl EmailService {
    pub fn new(mode: EmailMode, api_key: Option<String>, from_email: String, db: DbPool) -> Self {
        Self {
            mode,
            api_key,
            from_email,
            http_client: Client::new(),
            db,
        }
    }

    pub async fn send(&self, to: &str, notification: &Notification) -> Result<EmailSendResult> {
        let template = notification.template();
        let email = notification.render();

        match self.mode {
            EmailMode::Demo => {
                tracing::info!(
                    to = %to,
                    template,
                    subject = %email.subject,
                    "Demo mode: email logged, not sent"
                );
                self.record(to, &email.subject, template, EmailStatus::Demo, None);
                Ok(EmailSendResult::Logged)
            }
            EmailMode::Resend => {
                let Some(api_key) = self.api_key.as_deref() else {
                    tracing::warn!(to = %to, template, "No Resend API key configured, cannot send email");
                    self.record(
                        to,
                        &email.subject,
                        template,
                        EmailStatus::Failed,
                        Some("No Resend API key configured"),
                    );
                    return Ok(EmailSendResult::NoApiKey);
                };

                match self.send_via_resend(api_key, to, &email).await {
                    Ok(()) => {
                        tracing::info!(to = %to, template, "Email sent via Resend");
                        self.record(to, &email.subject, template, EmailStatus::Sent, None);
                        Ok(EmailSendResult::Sent)
                    }
                    Err(cause) => {
                        self.record(to, &email.subject, template, EmailStatus::Failed, Some(cause.as_str()));
                        Err(AppError::ExternalService("Failed to send email".into()))
                    }
                }
            }
        }
    }

    /// Deliver through Resend. The error string is the logged cause.
    async fn send_via_resend(
        &self,
        api_key: &str,
        to: &str,
        email: &RenderedEmail,
    ) -> std::result::Result<(), String> {
        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![to],
            subject: &email.subject,
            text: &email.text,
            html: &email.html,
        };

        let response = self
            .http_client
            .post(RESEND_API_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                format!("Request failed: {}", e)
            })?;

        if response.status().is_success() {
            let _result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                format!("Unreadable response: {}", e)
            })?;
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Resend API returned error");
            Err(format!("{} - {}", status, body))
        }
    }

    /// Write the attempt to `email_logs`. Best-effort and blocking: the pool
    /// checkout and INSERT run inline, and a logging failure never fails the send.
    fn record(&self, to: &str, subject: &str, template: &str, status: EmailStatus, error: Option<&str>) {
        let result = self
            .db
            .get()
            .map_err(AppError::from)
            .and_then(|conn| queries::create_email_log(&conn, to, subject, template, status, error));
        if let Err(e) = result {
            tracing::error!(error = %e, to = %to, template, "Failed to record email log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_email_mentions_key_and_expiry() {
        let email = Notification::LicenseAssigned {
            customer_name: "Jane Doe".into(),
            ea_name: "Grid <Bot>".into(),
            license_key: "EA-ABCD1234".into(),
            expiration_date: Some(1_705_276_800),
        }
        .render();

        assert_eq!(email.subject, "Your license for Grid <Bot>");
        assert!(email.text.contains("EA-ABCD1234"));
        assert!(email.text.contains("Jan 15, 2024"));
        assert!(email.html.contains("Grid &lt;Bot&gt;"));
        assert!(!email.html.contains("<Bot>"));
    }

    #[test]
    fn test_perpetual_license_email() {
        let email = Notification::LicenseAssigned {
            customer_name: "Jane".into(),
            ea_name: "Scalper".into(),
            license_key: "EA-1".into(),
            expiration_date: None,
        }
        .render();
        assert!(email.text.contains("does not expire"));
    }

    #[test]
    fn test_template_names() {
        assert_eq!(Notification::Welcome { name: "a".into() }.template(), "welcome");
        assert_eq!(
            Notification::AccountSuspended { name: "a".into() }.template(),
            "account_suspended"
        );
    }
}
