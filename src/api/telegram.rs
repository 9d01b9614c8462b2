use super::GatewayError;
use reqwest::Client;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Fire-and-forget Telegram sink
///
/// Without credentials (or with a placeholder token) messages are logged
/// instead of sent. Delivery failures are logged and dropped.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(token: Option<String>, chat_id: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        // Placeholder values from the sample .env count as unset
        let token = token.filter(|t| !t.trim().is_empty() && !t.starts_with("YOUR"));
        let chat_id = chat_id.filter(|c| !c.trim().is_empty() && !c.starts_with("YOUR"));

        Self {
            client,
            api_base: TELEGRAM_API_BASE.to_string(),
            token,
            chat_id,
        }
    }

    /// Notifier that only logs (dry-run)
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    /// Send a Markdown message; never fails
    pub async fn send(&self, text: &str) {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            tracing::info!("📨 [notification]\n{}", text);
            return;
        };

        if let Err(e) = self.try_send(token, chat_id, text).await {
            tracing::warn!("Telegram delivery failed: {}", e);
        }
    }

    async fn try_send(&self, token: &str, chat_id: &str, text: &str) -> Result<(), GatewayError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let params = [
            ("chat_id", chat_id),
            ("text", text),
            ("parse_mode", "Markdown"),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                endpoint: "sendMessage",
                status,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_token_disables_delivery() {
        let notifier = TelegramNotifier::new(
            Some("YOUR_BOT_TOKEN".to_string()),
            Some("12345".to_string()),
        );
        assert!(!notifier.is_enabled());

        let notifier = TelegramNotifier::new(Some("123:abc".to_string()), None);
        assert!(!notifier.is_enabled());
    }

    #[tokio::test]
    async fn test_send_posts_markdown_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("chat_id".into(), "42".into()),
                mockito::Matcher::UrlEncoded("parse_mode".into(), "Markdown".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let notifier =
            TelegramNotifier::new(Some("123:abc".to_string()), Some("42".to_string()))
                .with_api_base(server.url());
        notifier.send("*hello*").await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .with_status(400)
            .create_async()
            .await;

        let notifier =
            TelegramNotifier::new(Some("123:abc".to_string()), Some("42".to_string()))
                .with_api_base(server.url());
        notifier.send("unbalanced *markdown").await;

        mock.assert_async().await;
    }
}
