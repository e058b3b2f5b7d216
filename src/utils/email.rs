use lettre::message::{MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{error, info, instrument};

use crate::config::email::EmailConfig;

/// Sends verification and password-reset codes over SMTP.
///
/// Both send methods report success as `bool` and never error: transport
/// failures are logged here, and the caller decides whether the surrounding
/// write commits. With `SMTP_ENABLED=false` the code is logged instead of
/// sent, which keeps local development flowing.
#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self, code))]
    pub async fn send_verification_email(&self, to_email: &str, code: &str) -> bool {
        let html_body = self.code_template(
            "Welcome to LinguaZone!",
            "Thank you for registering. To verify your email address, please use the following verification code:",
            code,
        );
        let text_body = format!(
            "Welcome to LinguaZone!\n\n\
             Your verification code is: {}\n\n\
             This code will expire in 30 minutes.\n\n\
             If you didn't request this verification, please ignore this email.",
            code
        );

        self.send(to_email, "Verify Your Email - LinguaZone", &text_body, &html_body)
            .await
    }

    #[instrument(skip(self, code))]
    pub async fn send_password_reset_email(&self, to_email: &str, code: &str) -> bool {
        let html_body = self.code_template(
            "Password Reset Request",
            "We received a request to reset your password. Please use the following verification code:",
            code,
        );
        let text_body = format!(
            "Password Reset Request\n\n\
             Your verification code is: {}\n\n\
             This code will expire in 30 minutes.\n\n\
             If you did not request a password reset, please ignore this email.",
            code
        );

        self.send(to_email, "Reset Your Password - LinguaZone", &text_body, &html_body)
            .await
    }

    async fn send(&self, to_email: &str, subject: &str, text_body: &str, html_body: &str) -> bool {
        if !self.config.enabled {
            info!(to_email, subject, "SMTP disabled, logging instead of sending");
            return true;
        }

        match self.build_and_send(to_email, subject, text_body, html_body).await {
            Ok(()) => true,
            Err(e) => {
                error!(to_email, subject, error = %e, "failed to send email");
                false
            }
        }
    }

    async fn build_and_send(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), anyhow::Error> {
        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);

        let email = Message::builder()
            .from(from.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_username.is_empty() {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
                .port(self.config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            );

            SmtpTransport::relay(&self.config.smtp_host)?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build()
        };

        tokio::task::spawn_blocking(move || mailer.send(&email)).await??;

        Ok(())
    }

    fn code_template(&self, heading: &str, lead: &str, code: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{heading}</title></head>
<body style="margin: 0; padding: 0; font-family: Arial, sans-serif; background-color: #f4f4f4;">
    <table width="100%" cellpadding="0" cellspacing="0" style="background-color: #f4f4f4; padding: 20px;">
        <tr>
            <td align="center">
                <table width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; border-radius: 8px; overflow: hidden;">
                    <tr>
                        <td style="background-color: #4CAF50; padding: 30px; text-align: center;">
                            <h1 style="margin: 0; color: #ffffff; font-size: 28px;">LinguaZone</h1>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding: 40px 30px;">
                            <h2 style="margin: 0 0 20px 0; color: #333333; font-size: 24px;">{heading}</h2>
                            <p style="margin: 0 0 20px 0; color: #666666; font-size: 16px; line-height: 1.5;">{lead}</p>
                            <p style="margin: 0 0 20px 0; color: #4CAF50; font-size: 40px; text-align: center; letter-spacing: 6px;"><strong>{code}</strong></p>
                            <p style="margin: 0 0 20px 0; color: #666666; font-size: 14px; line-height: 1.5;">
                                <strong>This code will expire in 30 minutes.</strong>
                            </p>
                            <p style="margin: 0; color: #666666; font-size: 14px; line-height: 1.5;">
                                If you didn't request this, please ignore this email.
                            </p>
                        </td>
                    </tr>
                    <tr>
                        <td style="background-color: #f8f9fa; padding: 20px 30px; text-align: center; border-top: 1px solid #e9ecef;">
                            <p style="margin: 0; color: #999999; font-size: 12px;">
                                This is an automated email from LinguaZone. Please do not reply.
                            </p>
                        </td>
                    </tr>
                </table>
            </td>
        </tr>
    </table>
</body>
</html>"#
        )
    }
}
