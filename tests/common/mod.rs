//! Shared test harness for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use booklog_mcp::application::clock::Clock;
use booklog_mcp::application::service::BookService;
use booklog_mcp::domain::live::LiveQuery;
use booklog_mcp::domain::model::book::{Book, BookFilter, NewBook};
use booklog_mcp::domain::model::id::BookId;
use booklog_mcp::domain::repository::BookRepository;
use booklog_mcp::infra::store::{BookStore, StoreError};

// =============================================================================
// ManualClock — テスト用の手動時計
// =============================================================================

/// 手で進める時計（ミリ秒）。
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn at(millis: i64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicI64::new(millis),
        })
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .unwrap_or_default()
    }
}

// =============================================================================
// FlakyRepo — 書き込みを失敗させられるリポジトリ
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FlakyError {
    #[error("storage unavailable")]
    Unavailable,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// インメモリStoreに委譲しつつ、`fail_writes` 中は全書き込みを失敗させる。
pub struct FlakyRepo {
    inner: BookStore,
    fail_writes: AtomicBool,
}

impl FlakyRepo {
    pub fn new() -> Self {
        Self {
            inner: BookStore::in_memory(),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), FlakyError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FlakyError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl BookRepository for FlakyRepo {
    type Error = FlakyError;

    async fn insert(&self, book: NewBook) -> Result<BookId, Self::Error> {
        self.check()?;
        Ok(self.inner.insert(book).await?)
    }

    async fn insert_all(&self, books: Vec<NewBook>) -> Result<Vec<BookId>, Self::Error> {
        self.check()?;
        Ok(self.inner.insert_all(books).await?)
    }

    async fn update(&self, book: &Book) -> Result<bool, Self::Error> {
        self.check()?;
        Ok(self.inner.update(book).await?)
    }

    async fn delete_by_id(&self, id: BookId) -> Result<bool, Self::Error> {
        self.check()?;
        Ok(self.inner.delete_by_id(id).await?)
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, Self::Error> {
        Ok(self.inner.find_by_id(id).await?)
    }

    fn observe_books(&self, filter: BookFilter) -> LiveQuery<Vec<Book>> {
        self.inner.observe_books(filter)
    }

    fn observe_book(&self, id: BookId) -> LiveQuery<Option<Book>> {
        self.inner.observe_book(id)
    }

    fn observe_count(&self, filter: BookFilter) -> LiveQuery<usize> {
        self.inner.observe_count(filter)
    }
}

// =============================================================================
// Service builders
// =============================================================================

/// インメモリStore + 手動時計のService。
pub fn service_at(millis: i64) -> (BookService<BookStore>, Arc<ManualClock>) {
    let clock = ManualClock::at(millis);
    let svc = BookService::with_clock(BookStore::in_memory(), clock.clone());
    (svc, clock)
}

/// 件数（未読, 既読）の現在値。
pub fn counts<R: BookRepository>(svc: &BookService<R>) -> (usize, usize) {
    (svc.count_unread().current(), svc.count_read().current())
}

pub fn titles(books: &[Book]) -> Vec<&str> {
    books.iter().map(|b| b.title()).collect()
}

// =============================================================================
// Assertion helpers
// =============================================================================

/// 結果がErrで、メッセージに指定文字列を含むことをassert。
pub fn assert_error_contains<T: std::fmt::Debug>(
    result: Result<T, impl std::fmt::Display>,
    expected: &str,
) {
    match result {
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected),
                "Expected error containing '{expected}', got: '{msg}'"
            );
        }
        Ok(v) => panic!("Expected error containing '{expected}', got Ok({v:?})"),
    }
}
