use super::{ExtractError, ReceiptExtractor, ReceiptImage, RECEIPT_PROMPT};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Gemini generateContent 客户端 (不实现 Debug, 避免打印 api_key)
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, api_key: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        )
    }
}

#[async_trait]
impl ReceiptExtractor for GeminiClient {
    async fn extract(&self, image: ReceiptImage<'_>) -> Result<String, ExtractError> {
        let api_key = self.api_key.as_deref().ok_or(ExtractError::MissingApiKey)?;
        let payload = request_body(RECEIPT_PROMPT, image);

        debug!(model = %self.model, bytes = image.data.len(), "calling Gemini");
        let response = self
            .http
            .post(self.endpoint(api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ExtractError::Timeout
                } else {
                    // 错误信息里的 url 带有 key
                    ExtractError::Http(err.without_url())
                }
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(ExtractError::Auth),
            StatusCode::TOO_MANY_REQUESTS => return Err(ExtractError::RateLimited),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ExtractError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| ExtractError::InvalidResponse(err.without_url().to_string()))?;
        reply_text(&body)
    }
}

/// 构造请求体: 提示词 + base64 图片
fn request_body(prompt: &str, image: ReceiptImage<'_>) -> Value {
    let encoded = base64::engine::general_purpose::STANDARD.encode(image.data);
    serde_json::json!({
        "contents": [
            {
                "role": "user",
                "parts": [
                    {"text": prompt},
                    {"inline_data": {"mime_type": image.mime_type, "data": encoded}}
                ]
            }
        ]
    })
}

/// 取第一个候选的全部文本片段并拼接
fn reply_text(body: &Value) -> Result<String, ExtractError> {
    let parts = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractError::InvalidResponse("missing text candidate".to_string()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(ExtractError::InvalidResponse("missing text candidate".to_string()));
    }
    Ok(text.trim().to_string())
}
