use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::models::NotificationKind;
use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

pub struct EmailNotifier {
    config: SmtpConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| AppError::Notification(format!("Invalid SMTP relay {}: {}", config.host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port).timeout(Some(Duration::from_secs(15)));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            config,
        })
    }

    fn format_subject(&self, event: &NotificationEvent) -> String {
        let prefix = match event.kind {
            NotificationKind::ExpiryWarning => "Expiring soon",
            NotificationKind::OriginalUrlActive => "Back again",
            NotificationKind::SimilarNewListing => "Similar deal",
            NotificationKind::SaveConfirmation => "Saved",
        };
        format!("[Deal Watcher] {}: {}", prefix, event.deal.title)
    }

    fn format_text_body(&self, event: &NotificationEvent) -> String {
        let mut body = format!("{}\n\n{}\n", event.title, event.message);
        if let Some(url) = &event.deal.url {
            body.push_str(&format!("\nDeal: {} ({})\n", event.deal.title, url));
        }
        if let Some(listing) = &event.listing {
            body.push_str(&format!("New listing: {} ({})\n", listing.title, listing.url));
        }
        body
    }

    fn format_html_body(&self, event: &NotificationEvent) -> String {
        let link = |title: &str, url: &str| format!("<a href=\"{}\">{}</a>", escape_html(url), escape_html(title));

        let mut html = format!(
            "<html><body><h2>{}</h2><p>{}</p><ul>",
            escape_html(&event.title),
            escape_html(&event.message)
        );
        match &event.deal.url {
            Some(url) => html.push_str(&format!("<li>Deal: {}</li>", link(&event.deal.title, url))),
            None => html.push_str(&format!("<li>Deal: {}</li>", escape_html(&event.deal.title))),
        }
        if let Some(listing) = &event.listing {
            html.push_str(&format!("<li>New listing: {}</li>", link(&listing.title, &listing.url)));
        }
        html.push_str("</ul></body></html>");
        html
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl NotifierPlugin for EmailNotifier {
    fn name(&self) -> &str {
        "Email Notifier"
    }

    fn plugin_type(&self) -> &str {
        "email"
    }

    fn description(&self) -> &str {
        "Sends deal alerts via SMTP email"
    }

    async fn notify(&self, event: &NotificationEvent) -> std::result::Result<NotificationResult, Box<dyn std::error::Error + Send + Sync>> {
        let email = Message::builder()
            .from(format!("{} <{}>", self.config.from_name, self.config.from_address).parse()?)
            .to(self.config.to_address.parse()?)
            .subject(self.format_subject(event))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(self.format_text_body(event)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(self.format_html_body(event)),
                    ),
            )?;

        match self.mailer.send(email).await {
            Ok(_response) => Ok(NotificationResult::delivered(format!("email-{}", event.id))),
            Err(e) => Ok(NotificationResult::failed(e.to_string())),
        }
    }
}
