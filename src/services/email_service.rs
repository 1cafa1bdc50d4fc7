use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use std::env;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<(), EmailError>;
    async fn send_recovery_code(&self, to_email: &str, code: &str) -> Result<(), EmailError>;
    async fn send_invitation(&self, to_email: &str, invited_by: &str) -> Result<(), EmailError>;
}

/// Logs outgoing mail instead of sending it.
pub struct MockEmailService;

impl MockEmailService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockEmailService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<(), EmailError> {
        tracing::info!(to = %to_email, "[MOCK EMAIL] Verification code: {}", code);
        Ok(())
    }

    async fn send_recovery_code(&self, to_email: &str, code: &str) -> Result<(), EmailError> {
        tracing::info!(to = %to_email, "[MOCK EMAIL] Password recovery code: {}", code);
        Ok(())
    }

    async fn send_invitation(&self, to_email: &str, invited_by: &str) -> Result<(), EmailError> {
        tracing::info!(to = %to_email, "[MOCK EMAIL] Invitation from {}", invited_by);
        Ok(())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl SmtpEmailService {
    pub fn new() -> Result<Self, EmailError> {
        let smtp_host = env::var("SMTP_HOST")
            .map_err(|_| EmailError::ConfigError("SMTP_HOST not set".to_string()))?;
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| EmailError::ConfigError("Invalid SMTP_PORT".to_string()))?;
        let smtp_username = env::var("SMTP_USERNAME")
            .map_err(|_| EmailError::ConfigError("SMTP_USERNAME not set".to_string()))?;
        let smtp_password = env::var("SMTP_PASSWORD")
            .map_err(|_| EmailError::ConfigError("SMTP_PASSWORD not set".to_string()))?;
        let from_email = env::var("SMTP_FROM_EMAIL")
            .map_err(|_| EmailError::ConfigError("SMTP_FROM_EMAIL not set".to_string()))?;
        let from_name =
            env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Delivery Notes".to_string());

        let encryption = env::var("SMTP_ENCRYPTION").unwrap_or_else(|_| "starttls".to_string());
        let credentials = Credentials::new(smtp_username, smtp_password);

        let mailer = match encryption.to_lowercase().as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP relay error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "starttls" => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_host)
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            _ => {
                return Err(EmailError::ConfigError(format!(
                    "Invalid SMTP_ENCRYPTION value: {}. Use 'tls', 'starttls', or 'none'",
                    encryption
                )))
            }
        };

        Ok(Self {
            mailer,
            from_email,
            from_name,
        })
    }

    async fn send_html(&self, to_email: &str, subject: &str, body: String) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_email)
                    .parse()
                    .map_err(|e| {
                        EmailError::MessageBuild(format!("Invalid from address: {}", e))
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

fn code_mail(heading: &str, intro: &str, code: &str) -> String {
    format!(
        r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #333;">{}</h1>
    <p>{}</p>
    <p style="text-align: center; font-size: 28px; letter-spacing: 6px; margin: 30px 0;"><strong>{}</strong></p>
    <p style="color: #999; font-size: 12px; margin-top: 40px;">If you did not request this, you can safely ignore this email.</p>
</body>
</html>
"#,
        heading, intro, code
    )
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<(), EmailError> {
        let body = code_mail(
            "Verify your email",
            "Use this code to validate your account:",
            code,
        );
        self.send_html(to_email, "Your verification code", body).await
    }

    async fn send_recovery_code(&self, to_email: &str, code: &str) -> Result<(), EmailError> {
        let body = code_mail(
            "Reset your password",
            "Use this code to choose a new password:",
            code,
        );
        self.send_html(to_email, "Your password recovery code", body)
            .await
    }

    async fn send_invitation(&self, to_email: &str, invited_by: &str) -> Result<(), EmailError> {
        let body = format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #333;">You have been invited</h1>
    <p>{} invited you to share their company workspace.</p>
    <p>Recover your password with this email address to activate the account.</p>
</body>
</html>
"#,
            invited_by
        );
        self.send_html(to_email, "You have been invited", body).await
    }
}

pub fn create_email_service() -> Box<dyn EmailService> {
    if env::var("SMTP_HOST").is_ok() {
        match SmtpEmailService::new() {
            Ok(service) => {
                tracing::info!("Using SMTP email service");
                Box::new(service)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SMTP email service: {}. Falling back to mock service",
                    e
                );
                Box::new(MockEmailService::new())
            }
        }
    } else {
        tracing::info!("SMTP not configured. Using mock email service (emails are logged)");
        Box::new(MockEmailService::new())
    }
}
