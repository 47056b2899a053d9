//! 票据识别 (外部视觉模型).

pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use thiserror::Error;

/// 发给模型的固定提示词
pub const RECEIPT_PROMPT: &str = r#"You are an expert at extracting information from restaurant bills and receipts.
From the attached image, extract every individual item with its quantity (if present) and price.
Also identify the subtotal, tax and total amount.
If a quantity is not explicitly stated, assume 1.
Return a single JSON object with this structure:
{
  "items": [
    {"description": "Burger", "quantity": 1, "price": 12.50},
    {"description": "Fries", "quantity": 2, "price": 4.00}
  ],
  "subtotal": 20.50,
  "tax": 1.50,
  "total": 22.00,
  "currency": "USD"
}
The currency may be inferred from the receipt.
If any field is not found or cannot be reliably extracted, set its value to null.
Only return the JSON object, with no explanatory text outside it."#;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Gemini API key is not configured")]
    MissingApiKey,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini request timed out")]
    Timeout,
    #[error("Gemini rejected the API key")]
    Auth,
    #[error("Gemini rate limit exceeded")]
    RateLimited,
    #[error("Gemini returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid Gemini response: {0}")]
    InvalidResponse(String),
}

/// 待识别的图片
#[derive(Debug, Clone, Copy)]
pub struct ReceiptImage<'a> {
    pub data: &'a [u8],
    pub mime_type: &'a str,
}

/// 识别服务: 提示词 + 图片 -> 模型返回的原始文本
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    async fn extract(&self, image: ReceiptImage<'_>) -> Result<String, ExtractError>;
}
