use crate::models::otp::OtpType;
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
    async fn send_otp_email(
        &self,
        to_email: &str,
        fullname: &str,
        code: &str,
        otp_type: OtpType,
    ) -> Result<(), EmailError>;
    async fn send_welcome_email(&self, to_email: &str, fullname: &str) -> Result<(), EmailError>;
}

fn otp_subject(otp_type: OtpType) -> &'static str {
    match otp_type {
        OtpType::Signup => "Verify your Dvota account",
        OtpType::ForgotPassword => "Reset your Dvota password",
    }
}

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
    async fn send_otp_email(
        &self,
        to_email: &str,
        fullname: &str,
        code: &str,
        otp_type: OtpType,
    ) -> Result<(), EmailError> {
        tracing::info!("📧 [MOCK EMAIL] OTP email to: {} ({})", to_email, fullname);
        tracing::info!("   Subject: {}", otp_subject(otp_type));
        tracing::info!("   Code: {}", code);
        tracing::info!("   ---");
        Ok(())
    }

    async fn send_welcome_email(&self, to_email: &str, fullname: &str) -> Result<(), EmailError> {
        tracing::info!("📧 [MOCK EMAIL] Welcome email to: {} ({})", to_email, fullname);
        tracing::info!("   Subject: Welcome to Dvota");
        tracing::info!("   ---");
        Ok(())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
    base_url: String,
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
        let from_name = env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Dvota".to_string());
        let base_url = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

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
            base_url,
        })
    }

    async fn deliver(&self, to_email: &str, subject: &str, html_body: String) -> Result<(), EmailError> {
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
            .body(html_body)
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_otp_email(
        &self,
        to_email: &str,
        fullname: &str,
        code: &str,
        otp_type: OtpType,
    ) -> Result<(), EmailError> {
        let (intro, minutes) = match otp_type {
            OtpType::Signup => ("Use the code below to verify your email address.", 10),
            OtpType::ForgotPassword => ("Use the code below to reset your password.", 5),
        };

        let html_body = format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #333;">Hello {}</h1>
    <p>{}</p>
    <p style="text-align: center; margin: 30px 0; font-size: 32px; letter-spacing: 8px; font-weight: bold;">{}</p>
    <p style="color: #999; font-size: 12px; margin-top: 40px;">This code will expire in {} minutes. If you didn't request it, you can safely ignore this email.</p>
</body>
</html>
"#,
            fullname, intro, code, minutes
        );

        self.deliver(to_email, otp_subject(otp_type), html_body).await
    }

    async fn send_welcome_email(&self, to_email: &str, fullname: &str) -> Result<(), EmailError> {
        let html_body = format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #333;">Welcome to Dvota, {}!</h1>
    <p>Your email address has been verified. You can now create elections and take part in the ones you are invited to.</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{}" style="background-color: #4CAF50; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block;">Open Dvota</a>
    </p>
</body>
</html>
"#,
            fullname, self.base_url
        );

        self.deliver(to_email, "Welcome to Dvota", html_body).await
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
        tracing::info!(
            "SMTP not configured. Using mock email service (emails will be logged to console)"
        );
        Box::new(MockEmailService::new())
    }
}
