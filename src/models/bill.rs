use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::fmt;

/// 票据主表 (bill)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Bill {
    pub id: i64,
    pub uploaded_image: String,               // 图片相对路径 (相对 media 根目录)
    pub upload_date: DateTime<Utc>,
    pub total_amount: Option<BigDecimal>,     // 识别后写入
    pub gemini_raw_response: Option<Value>,   // 识别原始结果或失败信息
    pub is_processed: bool,
}

/// 票据明细表 (bill_item)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BillItem {
    pub id: i64,
    pub bill_id: i64,
    pub description: String,
    pub price: BigDecimal,
}

/// 待写入的明细行
#[derive(Debug, Clone, PartialEq)]
pub struct NewBillItem {
    pub description: String,
    pub price: BigDecimal,
}

/// 票据处理状态, 由 is_processed 和 gemini_raw_response 推导
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillStatus {
    Pending,
    Processed,
    ParseFailed,
    Failed,
}

impl Bill {
    pub fn status(&self) -> BillStatus {
        if self.is_processed {
            return BillStatus::Processed;
        }
        match &self.gemini_raw_response {
            None => BillStatus::Pending,
            Some(payload) if payload.get("raw_text").is_some() => BillStatus::ParseFailed,
            Some(_) => BillStatus::Failed,
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BillStatus::Pending => "pending",
            BillStatus::Processed => "processed",
            BillStatus::ParseFailed => "failed-parse",
            BillStatus::Failed => "failed-error",
        };
        f.write_str(name)
    }
}
