//! Email Service
//!
//! SMTP delivery for password reset links, signed with the lodge's
//! configured name and signature.

use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{Config, SmtpSecurity};

/// Build the front-end link a member follows to choose a new password.
#[must_use]
pub fn password_reset_link(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password?token={token}",
        frontend_url.trim_end_matches('/')
    )
}

/// A password reset message before it is addressed.
#[derive(Debug, Clone)]
pub struct ResetEmail<'a> {
    pub username: &'a str,
    pub link: &'a str,
    pub valid_hours: i64,
    pub lodge_name: &'a str,
    /// Free text appended after the body; empty for none.
    pub signature: &'a str,
}

impl ResetEmail<'_> {
    #[must_use]
    pub fn subject(&self) -> String {
        format!("{}: restablecimiento de contraseña", self.lodge_name)
    }

    #[must_use]
    pub fn body(&self) -> String {
        let mut body = format!(
            "Estimado hermano {},\n\
             \n\
             Se ha solicitado restablecer la contraseña de su cuenta en {}.\n\
             \n\
             Siga este enlace para elegir una nueva contraseña:\n\
             {}\n\
             \n\
             El enlace es válido durante {} horas y solo puede usarse una vez.\n\
             \n\
             Si usted no realizó esta solicitud, puede ignorar este mensaje.\n",
            self.username, self.lodge_name, self.link, self.valid_hours
        );
        let signature = self.signature.trim();
        if !signature.is_empty() {
            body.push_str("\n--\n");
            body.push_str(signature);
            body.push('\n');
        }
        body
    }
}

/// Outgoing mail over an SMTP relay.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: Mailbox,
}

impl EmailService {
    /// Build the transport from server configuration.
    ///
    /// Every SMTP field must be set (`config.has_smtp()`).
    pub fn new(config: &Config) -> Result<Self> {
        let host = config.smtp_host.as_deref().context("SMTP_HOST is required")?;
        let username = config
            .smtp_username
            .clone()
            .context("SMTP_USERNAME is required")?;
        let password = config
            .smtp_password
            .clone()
            .context("SMTP_PASSWORD is required")?;
        let from_address: Mailbox = config
            .smtp_from
            .as_deref()
            .context("SMTP_FROM is required")?
            .parse()
            .context("SMTP_FROM is not a valid email address")?;

        let builder = match config.smtp_tls {
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .context("Failed to create SMTP STARTTLS transport")?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .context("Failed to create SMTP TLS transport")?,
            SmtpSecurity::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let mailer = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self {
            mailer,
            from_address,
        })
    }

    /// Check the relay answers a NOOP.
    pub async fn test_connection(&self) -> Result<()> {
        let ok = self
            .mailer
            .test_connection()
            .await
            .context("SMTP connection test failed")?;
        if !ok {
            anyhow::bail!("SMTP server did not respond positively to connection test");
        }
        Ok(())
    }

    /// Send a rendered reset message to `to_email`.
    pub async fn send_password_reset(&self, to_email: &str, reset: &ResetEmail<'_>) -> Result<()> {
        let to_mailbox: Mailbox = to_email
            .parse()
            .context("Invalid recipient email address")?;

        let email = Message::builder()
            .from(self.from_address.clone())
            .to(to_mailbox)
            .subject(reset.subject())
            .body(reset.body())
            .context("Failed to build email message")?;

        self.mailer
            .send(email)
            .await
            .context("Failed to send email via SMTP")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_test_config() -> Config {
        let mut config = Config::default_for_test();
        config.smtp_host = Some("localhost".into());
        config.smtp_username = Some("secretaria".into());
        config.smtp_password = Some("clave".into());
        config.smtp_from = Some("secretaria@luzyverdad.org".into());
        config.smtp_tls = SmtpSecurity::Plain;
        config
    }

    fn expect_err(result: Result<EmailService>) -> anyhow::Error {
        match result {
            Err(e) => e,
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    fn reset<'a>(signature: &'a str) -> ResetEmail<'a> {
        ResetEmail {
            username: "hiram",
            link: "http://localhost:3000/reset-password?token=abc",
            valid_hours: 24,
            lodge_name: "Logia Luz y Verdad",
            signature,
        }
    }

    #[test]
    fn test_reset_link_trims_trailing_slash() {
        assert_eq!(
            password_reset_link("https://logia.example/", "abc"),
            "https://logia.example/reset-password?token=abc"
        );
        assert_eq!(
            password_reset_link("http://localhost:3000", "xyz"),
            "http://localhost:3000/reset-password?token=xyz"
        );
    }

    #[test]
    fn test_reset_body_mentions_link_and_validity() {
        let email = reset("");
        let body = email.body();
        assert!(body.contains("http://localhost:3000/reset-password?token=abc"));
        assert!(body.contains("24 horas"));
        assert!(body.contains("Logia Luz y Verdad"));
        assert!(!body.contains("\n--\n"));
        assert_eq!(email.subject(), "Logia Luz y Verdad: restablecimiento de contraseña");
    }

    #[test]
    fn test_reset_body_appends_signature() {
        let body = reset("  Secretaría\nR∴L∴ Luz y Verdad  ").body();
        assert!(body.ends_with("\n--\nSecretaría\nR∴L∴ Luz y Verdad\n"));
    }

    #[test]
    fn test_new_success() {
        assert!(EmailService::new(&smtp_test_config()).is_ok());
    }

    #[test]
    fn test_new_missing_host() {
        let mut config = smtp_test_config();
        config.smtp_host = None;
        let err = expect_err(EmailService::new(&config));
        assert!(err.to_string().contains("SMTP_HOST"), "{err}");
    }

    #[test]
    fn test_new_missing_credentials() {
        let mut config = smtp_test_config();
        config.smtp_password = None;
        let err = expect_err(EmailService::new(&config));
        assert!(err.to_string().contains("SMTP_PASSWORD"), "{err}");
    }

    #[test]
    fn test_new_invalid_from_address() {
        let mut config = smtp_test_config();
        config.smtp_from = Some("no-es-un-correo".into());
        let err = expect_err(EmailService::new(&config));
        assert!(err.to_string().contains("valid email"), "{err}");
    }
}
