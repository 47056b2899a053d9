use super::store::{BillStore, BillUpdate};
use crate::models::{Bill, BillItem, NewBillItem};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;

/// 测试用内存存储
#[derive(Default)]
pub struct MemoryBillStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    bills: Vec<Bill>,
    items: Vec<BillItem>,
    next_item_id: i64,
    fail_item_inserts: bool,
    fail_bill_updates: bool,
    misplace_images: bool,
}

impl MemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的明细写入全部返回错误
    pub fn fail_item_inserts(&self) {
        self.state.lock().unwrap().fail_item_inserts = true;
    }

    /// 之后的票据更新全部返回错误
    pub fn fail_bill_updates(&self) {
        self.state.lock().unwrap().fail_bill_updates = true;
    }

    /// 新建票据记录的图片路径指向不存在的位置
    pub fn misplace_images(&self) {
        self.state.lock().unwrap().misplace_images = true;
    }

    pub fn bill_count(&self) -> usize {
        self.state.lock().unwrap().bills.len()
    }
}

#[async_trait]
impl BillStore for MemoryBillStore {
    async fn create_bill(&self, uploaded_image: &str) -> Result<Bill, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let uploaded_image = if state.misplace_images {
            format!("missing/{}", uploaded_image)
        } else {
            uploaded_image.to_string()
        };
        let bill = Bill {
            id: state.bills.len() as i64 + 1,
            uploaded_image,
            upload_date: Utc::now(),
            total_amount: None,
            gemini_raw_response: None,
            is_processed: false,
        };
        state.bills.push(bill.clone());
        Ok(bill)
    }

    async fn update_bill(&self, bill_id: i64, update: &BillUpdate) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_bill_updates {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let bill = state
            .bills
            .iter_mut()
            .find(|b| b.id == bill_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        bill.total_amount = update.total_amount.clone();
        bill.gemini_raw_response = Some(update.raw_response.clone());
        bill.is_processed = update.is_processed;
        Ok(())
    }

    async fn insert_items(
        &self,
        bill_id: i64,
        items: &[NewBillItem],
    ) -> Result<Vec<BillItem>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_item_inserts {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            state.next_item_id += 1;
            let row = BillItem {
                id: state.next_item_id,
                bill_id,
                description: item.description.clone(),
                price: item.price.clone(),
            };
            state.items.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn get_bill(&self, bill_id: i64) -> Result<Option<Bill>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.bills.iter().find(|b| b.id == bill_id).cloned())
    }

    async fn list_bill_items(&self, bill_id: i64) -> Result<Vec<BillItem>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .items
            .iter()
            .filter(|i| i.bill_id == bill_id)
            .cloned()
            .collect())
    }
}
