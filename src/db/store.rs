use crate::models::{Bill, BillItem, NewBillItem};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::Value;
use sqlx::PgPool;

/// 识别结束后写回票据的字段
#[derive(Debug, Clone)]
pub struct BillUpdate {
    pub total_amount: Option<BigDecimal>,
    pub raw_response: Value,
    pub is_processed: bool,
}

/// 票据存储
///
/// 票据更新与明细写入是两次独立的操作, 没有包在同一个事务里.
#[async_trait]
pub trait BillStore: Send + Sync {
    /// 新建空票据 (仅图片路径), 返回含 id 和上传时间的记录
    async fn create_bill(&self, uploaded_image: &str) -> Result<Bill, sqlx::Error>;

    /// 写回识别结果
    async fn update_bill(&self, bill_id: i64, update: &BillUpdate) -> Result<(), sqlx::Error>;

    /// 批量写入明细, 返回顺序与入参一致
    async fn insert_items(
        &self,
        bill_id: i64,
        items: &[NewBillItem],
    ) -> Result<Vec<BillItem>, sqlx::Error>;

    async fn get_bill(&self, bill_id: i64) -> Result<Option<Bill>, sqlx::Error>;

    /// 按创建顺序列出明细
    async fn list_bill_items(&self, bill_id: i64) -> Result<Vec<BillItem>, sqlx::Error>;
}

/// PostgreSQL 实现
#[derive(Clone)]
pub struct PgBillStore {
    pool: PgPool,
}

impl PgBillStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillStore for PgBillStore {
    async fn create_bill(&self, uploaded_image: &str) -> Result<Bill, sqlx::Error> {
        sqlx::query_as::<_, Bill>(
            r#"
            INSERT INTO bill (uploaded_image)
            VALUES ($1)
            RETURNING id, uploaded_image, upload_date, total_amount, gemini_raw_response, is_processed
            "#
        )
        .bind(uploaded_image)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_bill(&self, bill_id: i64, update: &BillUpdate) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE bill
            SET total_amount = $2,
                gemini_raw_response = $3,
                is_processed = $4
            WHERE id = $1
            "#
        )
        .bind(bill_id)
        .bind(update.total_amount.clone())
        .bind(&update.raw_response)
        .bind(update.is_processed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_items(
        &self,
        bill_id: i64,
        items: &[NewBillItem],
    ) -> Result<Vec<BillItem>, sqlx::Error> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO bill_item (bill_id, description, price) "
        );
        query_builder.push_values(items, |mut b, item| {
            b.push_bind(bill_id)
                .push_bind(&item.description)
                .push_bind(item.price.clone());
        });
        query_builder.push(" RETURNING id, bill_id, description, price");

        let mut inserted = query_builder
            .build_query_as::<BillItem>()
            .fetch_all(&self.pool)
            .await?;
        inserted.sort_by_key(|item| item.id);

        tracing::debug!("Bill {} 写入明细 {} 条", bill_id, inserted.len());
        Ok(inserted)
    }

    async fn get_bill(&self, bill_id: i64) -> Result<Option<Bill>, sqlx::Error> {
        sqlx::query_as::<_, Bill>(
            r#"
            SELECT id, uploaded_image, upload_date, total_amount, gemini_raw_response, is_processed
            FROM bill
            WHERE id = $1
            "#
        )
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_bill_items(&self, bill_id: i64) -> Result<Vec<BillItem>, sqlx::Error> {
        sqlx::query_as::<_, BillItem>(
            r#"
            SELECT id, bill_id, description, price
            FROM bill_item
            WHERE bill_id = $1
            ORDER BY id
            "#
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await
    }
}
