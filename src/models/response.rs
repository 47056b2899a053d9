use super::{Bill, BillItem};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 明细行对外表示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillItemResponse {
    pub id: i64,
    pub description: String,
    pub price: BigDecimal,
}

/// 票据对外表示 (含明细)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillResponse {
    pub id: i64,
    pub uploaded_image: String,
    pub upload_date: DateTime<Utc>,
    pub total_amount: Option<BigDecimal>,
    pub gemini_raw_response: Option<Value>,
    pub is_processed: bool,
    pub items: Vec<BillItemResponse>,
}

/// 识别结果无法解析时返回的 202 响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseFailureResponse {
    pub message: String,
    pub raw_gemini_output: String,
    pub bill_id: i64,
}

impl From<BillItem> for BillItemResponse {
    fn from(item: BillItem) -> Self {
        Self {
            id: item.id,
            description: item.description,
            price: item.price,
        }
    }
}

impl BillResponse {
    /// `media_url` 为图片访问前缀, 如 `/media/`
    pub fn new(bill: Bill, items: Vec<BillItem>, media_url: &str) -> Self {
        Self {
            id: bill.id,
            uploaded_image: format!("{}{}", media_url, bill.uploaded_image),
            upload_date: bill.upload_date,
            total_amount: bill.total_amount,
            gemini_raw_response: bill.gemini_raw_response,
            is_processed: bill.is_processed,
            items: items.into_iter().map(BillItemResponse::from).collect(),
        }
    }
}

impl ParseFailureResponse {
    pub fn new(bill_id: i64, raw_text: String) -> Self {
        Self {
            message: "Bill uploaded, but Gemini response could not be fully parsed.".to_string(),
            raw_gemini_output: raw_text,
            bill_id,
        }
    }
}
