use std::sync::Arc;

use crate::domain::error::DomainError;
use crate::domain::live::LiveQuery;
use crate::domain::model::book::{Book, BookFilter, NewBook, Rating, UpdateDetailsRequest};
use crate::domain::model::id::BookId;
use crate::domain::repository::BookRepository;

use super::clock::{Clock, SystemClock};
use super::error::AppError;

/// 本の登録・読了・評価に対するユースケース。
/// 部分更新は fetch → merge → 全行書き戻し のパターンで操作する。
/// 行のキャッシュは持たない。
pub struct BookService<R: BookRepository> {
    repo: R,
    clock: Arc<dyn Clock>,
}

impl<R: BookRepository> BookService<R> {
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, Arc::new(SystemClock))
    }

    pub fn with_clock(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    // --- 購読 ---

    pub fn list_all(&self) -> LiveQuery<Vec<Book>> {
        self.repo.observe_books(BookFilter::All)
    }

    /// 読書リスト（未読）
    pub fn list_unread(&self) -> LiveQuery<Vec<Book>> {
        self.repo.observe_books(BookFilter::Unread)
    }

    pub fn list_read(&self) -> LiveQuery<Vec<Book>> {
        self.repo.observe_books(BookFilter::Read)
    }

    pub fn count_unread(&self) -> LiveQuery<usize> {
        self.repo.observe_count(BookFilter::Unread)
    }

    pub fn count_read(&self) -> LiveQuery<usize> {
        self.repo.observe_count(BookFilter::Read)
    }

    /// 該当行がなければ `None` を流す（エラーではない）。
    pub fn get(&self, id: BookId) -> LiveQuery<Option<Book>> {
        self.repo.observe_book(id)
    }

    // --- 作成 ---

    /// 読書リストに追加する。
    pub async fn add_unread(
        &self,
        title: impl Into<String>,
        author: Option<String>,
    ) -> Result<BookId, AppError> {
        let book = NewBook::unread(title, author, self.clock.unix_timestamp_millis());
        let id = self.repo.insert(book).await.map_err(AppError::storage)?;
        tracing::debug!(book_id = %id, "added to reading list");
        Ok(id)
    }

    /// 読了済みとして評価付きで追加する。評価が範囲外なら何も挿入しない。
    pub async fn add_read(
        &self,
        title: impl Into<String>,
        author: Option<String>,
        rating: i64,
    ) -> Result<BookId, AppError> {
        let rating = validate_rating(rating)?;
        let book = NewBook::read(title, author, rating, self.clock.unix_timestamp_millis());
        let id = self.repo.insert(book).await.map_err(AppError::storage)?;
        tracing::debug!(book_id = %id, %rating, "added as read");
        Ok(id)
    }

    // --- 部分更新（read-modify-write） ---

    /// 読了にして評価を付ける。
    pub async fn mark_read(&self, id: BookId, rating: i64) -> Result<(), AppError> {
        let rating = validate_rating(rating)?;
        let book = self.load_book(id).await?;
        self.persist(&book.marked_read(rating)).await?;
        tracing::debug!(book_id = %id, %rating, "marked as read");
        Ok(())
    }

    /// 評価だけを差し替える。既読状態は変えない。
    pub async fn set_rating(&self, id: BookId, rating: i64) -> Result<(), AppError> {
        let rating = validate_rating(rating)?;
        let book = self.load_book(id).await?;
        self.persist(&book.rated(rating)).await?;
        tracing::debug!(book_id = %id, %rating, "rating updated");
        Ok(())
    }

    /// タイトル・著者を編集する。Noneは「変更しない」（消去ではない）。
    pub async fn edit_details(
        &self,
        id: BookId,
        title: Option<String>,
        author: Option<String>,
    ) -> Result<(), AppError> {
        let book = self.load_book(id).await?;
        self.persist(&book.with_details(UpdateDetailsRequest { title, author }))
            .await?;
        tracing::debug!(book_id = %id, "details edited");
        Ok(())
    }

    /// 削除する。存在しないidでも成功扱い。
    pub async fn remove(&self, id: BookId) -> Result<(), AppError> {
        let deleted = self
            .repo
            .delete_by_id(id)
            .await
            .map_err(AppError::storage)?;
        tracing::debug!(book_id = %id, deleted, "removed");
        Ok(())
    }

    // --- private ---

    async fn load_book(&self, id: BookId) -> Result<Book, AppError> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(AppError::storage)?
            .ok_or_else(|| {
                tracing::warn!(book_id = %id, "book not found");
                DomainError::BookNotFound(id).into()
            })
    }

    async fn persist(&self, book: &Book) -> Result<(), AppError> {
        self.repo
            .update(book)
            .await
            .map_err(AppError::storage)?;
        Ok(())
    }
}

fn validate_rating(rating: i64) -> Result<Rating, AppError> {
    Rating::new(rating).map_err(|e| {
        tracing::warn!(rating, "rejected rating");
        e.into()
    })
}
