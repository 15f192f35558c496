// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::MailConfig;
use crate::models::{AbuseReport, UserAccount};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    StartTls,
    ImplicitTls,
}

impl SmtpSecurity {
    pub fn for_config(config: &MailConfig) -> Self {
        if config.use_starttls {
            SmtpSecurity::StartTls
        } else {
            SmtpSecurity::ImplicitTls
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from config, or `None` when no SMTP host is configured
    pub fn from_config(config: &MailConfig) -> Result<Option<Self>> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };

        // Mail is never sent in plaintext
        let mut builder = match SmtpSecurity::for_config(config) {
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpSecurity::ImplicitTls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
        }
        .with_context(|| format!("Invalid SMTP relay {}", host))?
        .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = config
            .from_address
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid sender address {}", config.from_address))?;

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid recipient address {}", mail.to))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .context("Failed to build notification message")?;

        let response = self
            .transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        if !response.is_positive() {
            bail!("SMTP server rejected the message: {:?}", response.code());
        }
        Ok(())
    }
}

/// Stand-in used when outgoing mail is not configured; every send fails
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _mail: OutgoingMail) -> Result<()> {
        Err(anyhow!("mail delivery is not configured"))
    }
}

/// Sends the site notification for newly filed reports
#[derive(Clone)]
pub struct ReportNotifier {
    mailer: Arc<dyn Mailer>,
    site_address: String,
}

impl ReportNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, site_address: impl Into<String>) -> Self {
        Self {
            mailer,
            site_address: site_address.into(),
        }
    }

    pub async fn notify_new_report(
        &self,
        report: &AbuseReport,
        reporter: &UserAccount,
        reported: &UserAccount,
    ) -> Result<()> {
        let mut body = format!(
            "A new abuse report has been submitted.\n\n\
             Report: #{}\n\
             Reporter: {} (id {})\n\
             Reported user: {} (id {})\n\
             Reason: {}\n",
            report.id,
            reporter.account_name,
            reporter.id,
            reported.account_name,
            reported.id,
            report.reason,
        );
        if let Some(message) = &report.message {
            body.push_str("\nMessage:\n");
            body.push_str(message);
            body.push('\n');
        }

        let mail = OutgoingMail {
            to: self.site_address.clone(),
            subject: format!("New abuse report #{}", report.id),
            body,
        };

        match self.mailer.send(mail).await {
            Ok(()) => {
                info!("Sent notification for abuse report {}", report.id);
                Ok(())
            }
            Err(e) => {
                warn!("Notification for abuse report {} failed: {:#}", report.id, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportStatus;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingMail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: OutgoingMail) -> Result<()> {
            self.sent.lock().await.push(mail);
            Ok(())
        }
    }

    fn report(message: Option<&str>) -> AbuseReport {
        let now = chrono::Utc::now().naive_utc();
        AbuseReport {
            id: 12,
            reporter_user_id: 1,
            reported_user_id: 2,
            reason: "harassment".into(),
            message: message.map(Into::into),
            status: ReportStatus::New,
            admin_notes: Vec::new(),
            user_notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn account(id: i32, name: &str) -> UserAccount {
        UserAccount {
            id,
            account_name: name.into(),
        }
    }

    fn mail_config(smtp_host: Option<&str>, use_starttls: bool) -> MailConfig {
        MailConfig {
            site_address: "abuse@example.org".into(),
            from_address: "noreply@example.org".into(),
            smtp_host: smtp_host.map(Into::into),
            smtp_port: 465,
            smtp_username: Some("mailer".into()),
            smtp_password: Some("secret".into()),
            use_starttls,
        }
    }

    #[test]
    fn smtp_without_starttls_uses_implicit_tls() {
        assert_eq!(
            SmtpSecurity::for_config(&mail_config(Some("smtp.example.org"), false)),
            SmtpSecurity::ImplicitTls
        );
        assert_eq!(
            SmtpSecurity::for_config(&mail_config(Some("smtp.example.org"), true)),
            SmtpSecurity::StartTls
        );
    }

    #[test]
    fn no_smtp_host_disables_the_mailer() {
        assert!(SmtpMailer::from_config(&mail_config(None, false)).unwrap().is_none());
    }

    #[tokio::test]
    async fn notification_goes_to_site_address() {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = ReportNotifier::new(mailer.clone(), "abuse@example.org");

        notifier
            .notify_new_report(&report(Some("sent threats")), &account(1, "alice"), &account(2, "bob"))
            .await
            .unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "abuse@example.org");
        assert_eq!(sent[0].subject, "New abuse report #12");
        assert!(sent[0].body.contains("Reported user: bob (id 2)"));
        assert!(sent[0].body.contains("sent threats"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn disabled_mailer_fails_and_logs() {
        let notifier = ReportNotifier::new(Arc::new(DisabledMailer), "abuse@example.org");

        let result = notifier
            .notify_new_report(&report(None), &account(1, "alice"), &account(2, "bob"))
            .await;

        assert!(result.is_err());
        assert!(logs_contain("Notification for abuse report 12 failed"));
    }
}
