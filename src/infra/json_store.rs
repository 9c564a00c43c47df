use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::model::book::Book;

/// 現行のファイルスキーマ。マイグレーションは持たない。
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum JsonStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported table version {found} (expected {expected})", expected = SCHEMA_VERSION)]
    UnsupportedVersion { found: u32 },
}

/// テーブル1つ分のファイルイメージ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableImage {
    pub version: u32,
    /// 次に採番するid。削除済みidを再利用しないため永続化する。
    pub next_id: i64,
    pub books: Vec<Book>,
}

/// JSONファイルによるテーブルの永続化。
/// 1 テーブル = 1 JSONファイル。
#[derive(Debug)]
pub struct JsonTableFile {
    path: PathBuf,
}

impl JsonTableFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `books.json` → `books.json.tmp`。拡張子違いの兄弟ファイルと衝突させない。
    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// ファイルがなければ `None`（空テーブル扱い）。
    pub async fn load(&self) -> Result<Option<TableImage>, JsonStoreError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let image: TableImage = serde_json::from_str(&content)?;
        if image.version != SCHEMA_VERSION {
            return Err(JsonStoreError::UnsupportedVersion {
                found: image.version,
            });
        }
        Ok(Some(image))
    }

    /// 一時ファイルに書いてからrenameする。
    pub async fn save(&self, image: &TableImage) -> Result<(), JsonStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(image)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
