use crate::error::AppError;
use crate::service::{BillService, UploadResult, UploadedImage};
use crate::storage::guess_mime_type;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Json, Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::io;
use std::sync::Arc;

/// 上传字段名
const IMAGE_FIELD: &str = "image";

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 上传票据图片并识别
pub async fn upload_bill(
    State(service): State<Arc<BillService>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            return AppError::Rejected {
                status: rejection.status(),
                message: rejection.body_text(),
            }
            .into_response()
        }
    };
    let image = match read_image_field(multipart).await {
        Ok(Some(image)) => image,
        Ok(None) => return AppError::NoImage.into_response(),
        Err(e) => return e.into_response(),
    };

    match service.upload(image).await {
        Ok(UploadResult::Processed(bill)) => (StatusCode::CREATED, Json(bill)).into_response(),
        Ok(UploadResult::ParseFailed(body)) => (StatusCode::ACCEPTED, Json(body)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 查询票据详情
pub async fn get_bill(
    State(service): State<Arc<BillService>>,
    Path(id): Path<String>,
) -> Response {
    // 非数字 id 与不存在的票据一样返回 404
    let Ok(bill_id) = id.parse::<i64>() else {
        return AppError::NotFound.into_response();
    };
    match service.get(bill_id).await {
        Ok(bill) => (StatusCode::OK, Json(bill)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 开发环境下直接提供已上传的图片
pub async fn serve_media(
    State(service): State<Arc<BillService>>,
    Path(path): Path<String>,
) -> Response {
    match service.storage().read(&path).await {
        Ok(data) => {
            let mime = guess_mime_type(&path).unwrap_or("application/octet-stream");
            ([(header::CONTENT_TYPE, mime)], data).into_response()
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::InvalidInput) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found." }))).into_response()
        }
        Err(e) => AppError::Storage(e).into_response(),
    }
}

/// 取出 `image` 文件字段; 字段缺失, 不是文件或内容为空时返回 None
async fn read_image_field(mut multipart: Multipart) -> Result<Option<UploadedImage>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(rejected)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // 没有 filename 的是普通表单字段
        let file_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(rejected)?;
        if data.is_empty() {
            return Ok(None);
        }

        let mime_type = content_type
            .filter(|c| c.starts_with("image/"))
            .or_else(|| guess_mime_type(&file_name).map(str::to_string))
            .unwrap_or_else(|| "image/jpeg".to_string());

        return Ok(Some(UploadedImage {
            file_name,
            mime_type,
            data: data.to_vec(),
        }));
    }
    Ok(None)
}

/// 保留 multipart 错误自带的状态码 (如超出大小限制时的 413)
fn rejected(e: MultipartError) -> AppError {
    AppError::Rejected {
        status: e.status(),
        message: e.body_text(),
    }
}
