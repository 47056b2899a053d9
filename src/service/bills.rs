use super::normalize::{normalize_reply, ExtractionOutcome};
use crate::db::{BillStore, BillUpdate};
use crate::error::AppError;
use crate::extract::{ReceiptExtractor, ReceiptImage};
use crate::models::{BillResponse, ParseFailureResponse};
use crate::storage::MediaStorage;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 上传的图片
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// 上传处理结果
#[derive(Debug)]
pub enum UploadResult {
    /// 识别成功, 返回完整票据
    Processed(BillResponse),
    /// 票据已保存, 但模型回复无法解析
    ParseFailed(ParseFailureResponse),
}

/// 票据服务: 上传识别 + 查询
pub struct BillService {
    store: Arc<dyn BillStore>,
    extractor: Arc<dyn ReceiptExtractor>,
    storage: MediaStorage,
    media_url: String,
}

impl BillService {
    pub fn new(
        store: Arc<dyn BillStore>,
        extractor: Arc<dyn ReceiptExtractor>,
        storage: MediaStorage,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            extractor,
            storage,
            media_url: media_url.into(),
        }
    }

    pub fn storage(&self) -> &MediaStorage {
        &self.storage
    }

    /// 上传票据: 保存图片 -> 建票据 -> 调模型 -> 解析 -> 写回
    pub async fn upload(&self, image: UploadedImage) -> Result<UploadResult, AppError> {
        // 1. 先落盘并建票据, 识别失败也不丢图片
        let path = self
            .storage
            .save(&image.file_name, &image.data, Utc::now())
            .await?;
        let bill = self.store.create_bill(&path).await?;
        info!("Bill {} created, image stored at {}", bill.id, path);

        // 2. 从存储读回图片
        let data = match self.storage.read(&bill.uploaded_image).await {
            Ok(data) => data,
            Err(e) => {
                error!("Bill {} 读取图片失败: {}", bill.id, e);
                return Err(AppError::ImageUnreadable);
            }
        };

        // 3. 调用模型并解析
        let reply = self
            .extractor
            .extract(ReceiptImage {
                data: &data,
                mime_type: &image.mime_type,
            })
            .await;
        let outcome = match reply {
            Ok(text) => {
                info!("Bill {} 收到模型回复, {} 字符", bill.id, text.len());
                debug!("Bill {} raw reply: {}", bill.id, text);
                normalize_reply(&text)
            }
            Err(e) => ExtractionOutcome::Failed {
                message: e.to_string(),
            },
        };

        // 4. 写回结果
        match &outcome {
            ExtractionOutcome::Processed(parsed) => {
                let item_count = parsed.items.len();
                let update = BillUpdate {
                    total_amount: parsed.total.clone(),
                    raw_response: parsed.payload.clone(),
                    is_processed: true,
                };
                let persisted = async {
                    self.store.update_bill(bill.id, &update).await?;
                    self.store.insert_items(bill.id, &parsed.items).await
                }
                .await;
                if let Err(e) = persisted {
                    return Err(self.mark_failed(bill.id, e.to_string()).await);
                }

                info!("Bill {} processed, {} items", bill.id, item_count);
                let response = self.get(bill.id).await?;
                Ok(UploadResult::Processed(response))
            }
            ExtractionOutcome::ParseFailed { raw_text } => {
                let update = BillUpdate {
                    total_amount: None,
                    raw_response: outcome.raw_response(),
                    is_processed: false,
                };
                if let Err(e) = self.store.update_bill(bill.id, &update).await {
                    return Err(self.mark_failed(bill.id, e.to_string()).await);
                }
                warn!("Bill {} 模型回复无法解析, 已保留原文", bill.id);
                Ok(UploadResult::ParseFailed(ParseFailureResponse::new(
                    bill.id,
                    raw_text.clone(),
                )))
            }
            ExtractionOutcome::Failed { message } => {
                Err(self.mark_failed(bill.id, message.clone()).await)
            }
        }
    }

    /// 标记处理失败 (尽力而为), 返回对外错误
    async fn mark_failed(&self, bill_id: i64, message: String) -> AppError {
        error!("Bill {} processing failed: {}", bill_id, message);
        let update = BillUpdate {
            total_amount: None,
            raw_response: ExtractionOutcome::Failed {
                message: message.clone(),
            }
            .raw_response(),
            is_processed: false,
        };
        if let Err(e) = self.store.update_bill(bill_id, &update).await {
            error!("Bill {} 写回失败状态出错: {}", bill_id, e);
        }
        AppError::Processing(message)
    }

    /// 查询票据及明细
    pub async fn get(&self, bill_id: i64) -> Result<BillResponse, AppError> {
        let bill = self
            .store
            .get_bill(bill_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let items = self.store.list_bill_items(bill_id).await?;
        Ok(BillResponse::new(bill, items, &self.media_url))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::memory::MemoryBillStore;
    use crate::extract::ExtractError;
    use crate::models::BillStatus;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;
    use std::sync::Mutex;

    /// 固定回复的识别服务
    pub(crate) struct StubExtractor {
        reply: Result<String, String>,
        seen_mime: Mutex<Option<String>>,
    }

    impl StubExtractor {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen_mime: Mutex::new(None),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                seen_mime: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ReceiptExtractor for StubExtractor {
        async fn extract(&self, image: ReceiptImage<'_>) -> Result<String, ExtractError> {
            *self.seen_mime.lock().unwrap() = Some(image.mime_type.to_string());
            self.reply
                .clone()
                .map_err(ExtractError::InvalidResponse)
        }
    }

    fn setup(
        extractor: StubExtractor,
    ) -> (BillService, Arc<MemoryBillStore>, Arc<StubExtractor>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBillStore::new());
        let extractor = Arc::new(extractor);
        let service = BillService::new(
            store.clone(),
            extractor.clone(),
            MediaStorage::new(dir.path()),
            "/media/",
        );
        (service, store, extractor, dir)
    }

    fn image() -> UploadedImage {
        UploadedImage {
            file_name: "dinner.png".to_string(),
            mime_type: "image/png".to_string(),
            data: b"png-bytes".to_vec(),
        }
    }

    const REPLY: &str = "```json\n{\"items\": [{\"description\": \"Pasta\", \"price\": 14.5}, {\"description\": \"Water\", \"price\": \"free\"}], \"total\": 14.5}\n```";

    #[tokio::test]
    async fn successful_upload_stores_total_and_items() {
        let (service, store, extractor, _dir) = setup(StubExtractor::replying(REPLY));

        let result = service.upload(image()).await.unwrap();
        let UploadResult::Processed(bill) = result else {
            panic!("expected processed bill");
        };

        assert!(bill.is_processed);
        assert_eq!(bill.total_amount, Some(BigDecimal::from_str("14.50").unwrap()));
        assert_eq!(bill.items.len(), 2);
        assert_eq!(bill.items[0].description, "Pasta");
        assert_eq!(bill.items[1].price.to_string(), "0.00");
        assert!(bill.uploaded_image.starts_with("/media/bills/"));
        assert!(bill.uploaded_image.ends_with("/dinner.png"));
        assert_eq!(extractor.seen_mime.lock().unwrap().as_deref(), Some("image/png"));

        let stored = store.get_bill(bill.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), BillStatus::Processed);
        assert_eq!(stored.gemini_raw_response.unwrap()["total"], 14.5);
    }

    #[tokio::test]
    async fn unparsable_reply_keeps_bill_with_raw_text() {
        let (service, store, _extractor, _dir) =
            setup(StubExtractor::replying("I could not read the receipt"));

        let result = service.upload(image()).await.unwrap();
        let UploadResult::ParseFailed(body) = result else {
            panic!("expected parse failure");
        };
        assert_eq!(body.raw_gemini_output, "I could not read the receipt");

        let stored = service.get(body.bill_id).await.unwrap();
        assert!(!stored.is_processed);
        assert!(stored.items.is_empty());
        assert_eq!(
            stored.gemini_raw_response.unwrap()["raw_text"],
            "I could not read the receipt"
        );
        assert_eq!(
            store.get_bill(body.bill_id).await.unwrap().unwrap().status(),
            BillStatus::ParseFailed
        );
    }

    #[tokio::test]
    async fn extractor_error_marks_bill_failed() {
        let (service, store, _extractor, _dir) = setup(StubExtractor::failing("connection reset"));

        let err = service.upload(image()).await.unwrap_err();
        assert!(matches!(err, AppError::Processing(ref m) if m.contains("connection reset")));

        let stored = store.get_bill(1).await.unwrap().unwrap();
        assert_eq!(stored.status(), BillStatus::Failed);
        assert!(!stored.is_processed);
        assert!(stored.gemini_raw_response.unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("connection reset"));
    }

    #[tokio::test]
    async fn wrong_reply_shape_marks_bill_failed_without_items() {
        let (service, store, _extractor, _dir) =
            setup(StubExtractor::replying(r#"{"items": [{"price": 1}, "oops"]}"#));

        assert!(service.upload(image()).await.is_err());
        assert_eq!(store.get_bill(1).await.unwrap().unwrap().status(), BillStatus::Failed);
        assert!(store.list_bill_items(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn item_write_failure_is_reported_as_processing_error() {
        let (service, store, _extractor, _dir) = setup(StubExtractor::replying(REPLY));
        store.fail_item_inserts();

        let err = service.upload(image()).await.unwrap_err();
        assert!(matches!(err, AppError::Processing(_)));
        assert_eq!(store.get_bill(1).await.unwrap().unwrap().status(), BillStatus::Failed);
    }

    #[tokio::test]
    async fn unreadable_image_keeps_unprocessed_bill() {
        let (service, store, extractor, _dir) = setup(StubExtractor::replying(REPLY));
        store.misplace_images();

        let err = service.upload(image()).await.unwrap_err();
        assert!(matches!(err, AppError::ImageUnreadable));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let stored = store.get_bill(1).await.unwrap().unwrap();
        assert!(!stored.is_processed);
        assert_eq!(stored.status(), BillStatus::Pending);
        assert!(extractor.seen_mime.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn parse_failure_write_error_is_a_processing_error() {
        let (service, store, _extractor, _dir) =
            setup(StubExtractor::replying("not json at all"));
        store.fail_bill_updates();

        let err = service.upload(image()).await.unwrap_err();
        assert!(matches!(err, AppError::Processing(_)));
        assert_eq!(store.bill_count(), 1);
        assert!(!store.get_bill(1).await.unwrap().unwrap().is_processed);
    }

    #[tokio::test]
    async fn unknown_bill_is_not_found() {
        let (service, _store, _extractor, _dir) = setup(StubExtractor::replying(REPLY));
        assert!(matches!(service.get(42).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn items_come_back_in_creation_order() {
        let reply = r#"{"items": [
            {"description": "A", "price": 1}, {"description": "B", "price": 2}, {"description": "C", "price": 3}
        ], "total": 6}"#;
        let (service, _store, _extractor, _dir) = setup(StubExtractor::replying(reply));

        let UploadResult::Processed(bill) = service.upload(image()).await.unwrap() else {
            panic!("expected processed bill");
        };
        let fetched = service.get(bill.id).await.unwrap();
        let names: Vec<&str> = fetched.items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
