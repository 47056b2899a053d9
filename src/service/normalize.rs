//! 模型回复的解析与校验.
//!
//! 模型回复是自由文本, 通常是 JSON, 有时包在 ```json ... ``` 代码块里.
//! 这里只做纯计算, 不碰数据库, 结果用 [`ExtractionOutcome`] 表示.

use crate::models::NewBillItem;
use bigdecimal::{BigDecimal, Zero};
use serde_json::{json, Value};
use std::str::FromStr;

/// 明细没有描述时的占位
pub const MISSING_DESCRIPTION: &str = "N/A";

/// 描述最大长度 (与 bill_item.description 一致)
pub const DESCRIPTION_MAX_CHARS: usize = 255;

/// 识别成功后的结构化结果
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReceipt {
    pub payload: Value,
    pub total: Option<BigDecimal>,
    pub items: Vec<NewBillItem>,
}

/// 一次识别的三种结局
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// 解析成功
    Processed(ParsedReceipt),
    /// 回复不是合法 JSON, 保留原文供人工处理
    ParseFailed { raw_text: String },
    /// 其他错误 (调用失败, 结构不符等)
    Failed { message: String },
}

impl ExtractionOutcome {
    /// 写回票据的原始数据
    pub fn raw_response(&self) -> Value {
        match self {
            ExtractionOutcome::Processed(parsed) => parsed.payload.clone(),
            ExtractionOutcome::ParseFailed { raw_text } => json!({
                "error": "Failed to parse Gemini response JSON.",
                "raw_text": raw_text,
            }),
            ExtractionOutcome::Failed { message } => json!({
                "error": message,
                "message": "An unexpected error occurred during processing.",
            }),
        }
    }
}

/// 去掉包裹在外层的代码块标记, 支持可选的 `json` 语言标记
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = match trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    {
        Some(inner) => inner,
        None => return trimmed,
    };
    let inner = match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &inner[4..],
        _ => inner,
    };
    inner.trim()
}

/// 解析模型回复
pub fn normalize_reply(reply: &str) -> ExtractionOutcome {
    let payload: Value = match serde_json::from_str(strip_code_fence(reply)) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("模型回复不是合法 JSON: {}", e);
            return ExtractionOutcome::ParseFailed {
                raw_text: reply.to_string(),
            };
        }
    };

    match parse_receipt(payload) {
        Ok(parsed) => ExtractionOutcome::Processed(parsed),
        Err(message) => ExtractionOutcome::Failed { message },
    }
}

fn parse_receipt(payload: Value) -> Result<ParsedReceipt, String> {
    let document = payload
        .as_object()
        .ok_or_else(|| format!("expected a JSON object, got {}", kind(&payload)))?;

    let total = match document.get("total") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            decimal_from(value)
                .map(|total| to_cents(&total))
                .ok_or_else(|| format!("total is not a decimal number: {}", value))?,
        ),
    };

    let entries = match document.get("items") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(entries)) => entries.as_slice(),
        Some(other) => return Err(format!("items must be a list, got {}", kind(other))),
    };

    let items = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let entry = entry
                .as_object()
                .ok_or_else(|| format!("item {} must be an object, got {}", idx, kind(entry)))?;
            Ok(NewBillItem {
                description: description_from(entry.get("description")),
                price: coerce_price(entry.get("price")),
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(ParsedReceipt {
        payload,
        total,
        items,
    })
}

/// 价格转换失败一律按 0 处理, 不影响明细写入
pub fn coerce_price(value: Option<&Value>) -> BigDecimal {
    value
        .and_then(decimal_from)
        .map(|p| to_cents(&p))
        .unwrap_or_else(|| BigDecimal::zero().with_scale(2))
}

/// 保留两位小数 (与 NUMERIC(10,2) 一致)
fn to_cents(value: &BigDecimal) -> BigDecimal {
    value.round(2).with_scale(2)
}

fn description_from(value: Option<&Value>) -> String {
    let text = match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => MISSING_DESCRIPTION.to_string(),
    };
    text.chars().take(DESCRIPTION_MAX_CHARS).collect()
}

/// 数字, 数字字符串和布尔值 (true = 1) 可转换, 其余返回 None
fn decimal_from(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Bool(flag) => Some(BigDecimal::from(i64::from(*flag))),
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            BigDecimal::from_str(s).ok()
        }
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
