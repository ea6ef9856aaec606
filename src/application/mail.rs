//! Outgoing mail: message rendering and the transport seam.

use askama::Template;
use async_trait::async_trait;
use thiserror::Error;

use crate::application::notify::PublishedPostNotice;

pub const PUBLISHED_SUBJECT: &str = "Your blog post has been published!";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to render email: {0}")]
    Render(#[from] askama::Error),
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("mail relay rejected message with status {status}")]
    Rejected { status: u16 },
}

/// Sender identity and link base used when rendering messages.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub from_address: String,
    pub app_name: String,
    pub frontend_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

#[derive(Template)]
#[template(path = "emails/post_published.html")]
struct PostPublishedHtml<'a> {
    subject: &'a str,
    recipient_name: &'a str,
    title: &'a str,
    description: &'a str,
    post_url: &'a str,
    app_name: &'a str,
}

#[derive(Template)]
#[template(path = "emails/post_published.txt")]
struct PostPublishedText<'a> {
    recipient_name: &'a str,
    title: &'a str,
    post_url: &'a str,
    app_name: &'a str,
}

pub fn post_url(frontend_url: &str, post_id: i64) -> String {
    format!("{}/posts/{post_id}", frontend_url.trim_end_matches('/'))
}

/// Build the "post published" message for the notice's recipient.
pub fn render_published_email(
    notice: &PublishedPostNotice,
    config: &MailerConfig,
) -> Result<OutgoingEmail, MailError> {
    let url = post_url(&config.frontend_url, notice.post_id);

    let html = PostPublishedHtml {
        subject: PUBLISHED_SUBJECT,
        recipient_name: &notice.recipient_name,
        title: &notice.title,
        description: &notice.description,
        post_url: &url,
        app_name: &config.app_name,
    }
    .render()?;
    let text = PostPublishedText {
        recipient_name: &notice.recipient_name,
        title: &notice.title,
        post_url: &url,
        app_name: &config.app_name,
    }
    .render()?;

    Ok(OutgoingEmail {
        from: config.from_address.clone(),
        to: notice.recipient_email.clone(),
        to_name: notice.recipient_name.clone(),
        subject: PUBLISHED_SUBJECT.to_string(),
        html,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MailerConfig {
        MailerConfig {
            from_address: "no-reply@quire.local".to_string(),
            app_name: "Quire".to_string(),
            frontend_url: "https://blog.example/".to_string(),
        }
    }

    fn notice() -> PublishedPostNotice {
        PublishedPostNotice {
            post_id: 7,
            title: "Tips & Tricks".to_string(),
            description: "Body".to_string(),
            published_at: None,
            recipient_email: "ada@example.com".to_string(),
            recipient_name: "Ada".to_string(),
        }
    }

    #[test]
    fn published_email_links_to_the_post() {
        let email = render_published_email(&notice(), &config()).expect("render");

        assert_eq!(email.subject, PUBLISHED_SUBJECT);
        assert_eq!(email.to, "ada@example.com");
        assert!(email.html.contains("https://blog.example/posts/7"));
        assert!(email.html.contains("View Post"));
        assert!(email.html.contains("Hello Ada"));
        assert!(email.text.contains("https://blog.example/posts/7"));
        assert!(email.text.contains("Quire"));
    }

    #[test]
    fn html_body_escapes_titles() {
        let email = render_published_email(&notice(), &config()).expect("render");
        assert!(email.html.contains("Tips &amp; Tricks") || email.html.contains("Tips &#38; Tricks"));
        assert!(email.text.contains("Tips & Tricks"));
    }
}
