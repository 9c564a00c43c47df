use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::BookId;
use crate::domain::error::DomainError;

/// 星評価（1〜5）。範囲外の値は構築できない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// 呼び出し側から渡された生の値を検証する。
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DomainError::InvalidRating(value))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// "★★★☆☆" 形式の表示。
    pub fn stars(&self) -> String {
        let filled = self.0 as usize;
        let empty = (Self::MAX - self.0) as usize;
        format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
    }
}

impl TryFrom<u8> for Rating {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value as i64)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一覧・件数クエリの絞り込み条件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookFilter {
    All,
    /// 読書リスト（未読）
    Unread,
    /// 読了
    Read,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        match self {
            Self::All => true,
            Self::Unread => !book.is_read,
            Self::Read => book.is_read,
        }
    }
}

/// 挿入用の行。idは通常Storeが採番する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    /// 明示的なid（バッチ復元用）。既存idと衝突すると挿入は失敗する。
    pub id: Option<BookId>,
    pub title: String,
    pub author: Option<String>,
    pub rating: Option<Rating>,
    pub is_read: bool,
    /// エポックからのミリ秒
    pub created_at: i64,
}

impl NewBook {
    /// 読書リストに積む未読の本。
    pub fn unread(title: impl Into<String>, author: Option<String>, created_at: i64) -> Self {
        Self {
            id: None,
            title: title.into(),
            author,
            rating: None,
            is_read: false,
            created_at,
        }
    }

    /// 評価付きの読了済みの本。
    pub fn read(
        title: impl Into<String>,
        author: Option<String>,
        rating: Rating,
        created_at: i64,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            author,
            rating: Some(rating),
            is_read: true,
            created_at,
        }
    }
}

/// タイトル・著者の部分更新（Noneのフィールドは変更しない）
#[derive(Debug, Clone, Default)]
pub struct UpdateDetailsRequest {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// テーブルの1行。Storeが正本を所有する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    id: BookId,
    title: String,
    author: Option<String>,
    rating: Option<Rating>,
    is_read: bool,
    created_at: i64,
}

impl Book {
    pub(crate) fn from_new(id: BookId, new: NewBook) -> Self {
        Self {
            id,
            title: new.title,
            author: new.author,
            rating: new.rating,
            is_read: new.is_read,
            created_at: new.created_at,
        }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn rating(&self) -> Option<Rating> {
        self.rating
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    // --- read-modify-write 用のマージ（元の行は変更しない） ---

    /// 読了にして評価を付けた複製。
    pub fn marked_read(&self, rating: Rating) -> Self {
        Self {
            is_read: true,
            rating: Some(rating),
            ..self.clone()
        }
    }

    /// 評価だけ差し替えた複製。既読状態は変えない。
    pub fn rated(&self, rating: Rating) -> Self {
        Self {
            rating: Some(rating),
            ..self.clone()
        }
    }

    /// 指定されたフィールドだけ差し替えた複製。
    pub fn with_details(&self, req: UpdateDetailsRequest) -> Self {
        Self {
            title: req.title.unwrap_or_else(|| self.title.clone()),
            author: req.author.or_else(|| self.author.clone()),
            ..self.clone()
        }
    }
}
