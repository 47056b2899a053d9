//! 上传图片的本地存储.
//!
//! 图片按上传日期落到 `<root>/bills/YYYY/MM/DD/` 下, 数据库里只保存相对路径.

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Component, Path, PathBuf};

/// 相对路径最大长度 (与 bill.uploaded_image 一致, 同时低于文件名 255 字节的限制)
pub const MAX_PATH_LEN: usize = 255;

/// 超过该长度的扩展名当作文件名的一部分
const MAX_EXT_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 写入图片, 返回相对路径 (如 `bills/2026/10/19/receipt.jpg`)
    ///
    /// 同名文件已存在时在扩展名前追加 `_1`, `_2`...
    /// 文件名过长时截断主干部分, 保证整个相对路径不超过 [`MAX_PATH_LEN`].
    pub async fn save(
        &self,
        file_name: &str,
        data: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> io::Result<String> {
        let dir = format!("bills/{}", uploaded_at.format("%Y/%m/%d"));
        tokio::fs::create_dir_all(self.root.join(&dir)).await?;

        let name = sanitize_file_name(file_name);
        let (stem, ext) = match name.rfind('.') {
            Some(idx) if idx > 0 && name.len() - idx <= MAX_EXT_LEN => {
                (&name[..idx], &name[idx..])
            }
            _ => (name.as_str(), ""),
        };

        let mut suffix = 0u32;
        loop {
            let candidate = fit_path(&dir, stem, suffix, ext);
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&candidate))
                .await;
            match file {
                Ok(mut file) => {
                    use tokio::io::AsyncWriteExt;
                    file.write_all(data).await?;
                    file.flush().await?;
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    suffix += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 读取已保存的图片
    pub async fn read(&self, relative: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(relative)?;
        tokio::fs::read(path).await
    }

    fn resolve(&self, relative: &str) -> io::Result<PathBuf> {
        let rel = Path::new(relative);
        let safe = !relative.is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid media path: {}", relative),
            ));
        }
        Ok(self.root.join(rel))
    }
}

/// 拼出 `<dir>/<stem>[_N]<ext>`, 必要时截断 stem
fn fit_path(dir: &str, stem: &str, suffix: u32, ext: &str) -> String {
    let tail = if suffix == 0 {
        ext.to_string()
    } else {
        format!("_{}{}", suffix, ext)
    };
    // 文件名已清洗为 ASCII, 字节数即字符数
    let room = MAX_PATH_LEN.saturating_sub(dir.len() + 1 + tail.len());
    let stem = &stem[..stem.len().min(room)];
    format!("{}/{}{}", dir, stem, tail)
}

/// 只保留文件名最后一段, 非 `[A-Za-z0-9._-]` 字符替换为 `_`
pub fn sanitize_file_name(file_name: &str) -> String {
    let last = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "receipt".to_string()
    } else {
        cleaned
    }
}

/// 根据扩展名推断图片类型
pub fn guess_mime_type(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mime)
}
