use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use super::json_store::{JsonStoreError, JsonTableFile, TableImage, SCHEMA_VERSION};
use crate::domain::live::{LiveQuery, Snapshot};
use crate::domain::model::book::{Book, BookFilter, NewBook};
use crate::domain::model::id::BookId;
use crate::domain::repository::BookRepository;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    File(#[from] JsonStoreError),

    #[error("book with id {0} already exists")]
    Conflict(BookId),

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("no book id left after {0}")]
    IdExhausted(BookId),
}

#[derive(Debug, Clone)]
struct TableState {
    rows: BTreeMap<BookId, Book>,
    next_id: i64,
}

impl TableState {
    fn empty() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn from_image(image: TableImage) -> Result<Self, StoreError> {
        let rows: BTreeMap<BookId, Book> = image.books.into_iter().map(|b| (b.id(), b)).collect();
        // 壊れたnext_idでも既存idとは衝突させない
        let floor = match rows.keys().next_back() {
            Some(&last) => successor(last)?,
            None => 1,
        };
        Ok(Self {
            rows,
            next_id: image.next_id.max(floor),
        })
    }

    fn to_image(&self) -> TableImage {
        TableImage {
            version: SCHEMA_VERSION,
            next_id: self.next_id,
            books: self.ordered(),
        }
    }

    /// `created_at` 降順、同値はid降順。
    fn ordered(&self) -> Vec<Book> {
        let mut books: Vec<Book> = self.rows.values().cloned().collect();
        books.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        books
    }

    fn insert(&mut self, new: NewBook) -> Result<BookId, StoreError> {
        check_title(&new.title)?;
        let id = match new.id {
            Some(id) if self.rows.contains_key(&id) => return Err(StoreError::Conflict(id)),
            Some(id) => {
                self.next_id = self.next_id.max(successor(id)?);
                id
            }
            None => {
                let id = BookId::new(self.next_id);
                self.next_id = successor(id)?;
                id
            }
        };
        self.rows.insert(id, Book::from_new(id, new));
        Ok(id)
    }
}

/// 次に採番できるid。i64の上限に達していれば `IdExhausted`。
fn successor(id: BookId) -> Result<i64, StoreError> {
    id.get().checked_add(1).ok_or(StoreError::IdExhausted(id))
}

fn check_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::EmptyTitle);
    }
    Ok(())
}

/// 単一テーブルのRecord Store。
///
/// 書き込みは非同期Mutexで直列化し、永続化が成功してから
/// スナップショットを公開する（公開 = コミット）。
/// `in_memory` はファイルを持たない。
pub struct BookStore {
    state: Mutex<TableState>,
    snapshots: watch::Sender<Snapshot>,
    file: Option<JsonTableFile>,
}

impl BookStore {
    pub fn in_memory() -> Self {
        Self::with_state(TableState::empty(), None)
    }

    /// JSONファイルを開く。ファイルがなければ空テーブルから始める。
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let file = JsonTableFile::new(path);
        let state = match file.load().await? {
            Some(image) => TableState::from_image(image)?,
            None => TableState::empty(),
        };
        tracing::info!(
            path = %file.path().display(),
            rows = state.rows.len(),
            "opened book table"
        );
        Ok(Self::with_state(state, Some(file)))
    }

    fn with_state(state: TableState, file: Option<JsonTableFile>) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(state.ordered()));
        Self {
            state: Mutex::new(state),
            snapshots,
            file,
        }
    }

    /// 下書きに変更を適用し、変更があれば永続化してから公開する。
    /// クロージャが失敗した場合、テーブルは一切変わらない。
    async fn commit<T>(
        &self,
        op: &'static str,
        apply: impl FnOnce(&mut TableState) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.state.lock().await;
        let mut draft = state.clone();
        let (value, dirty) = apply(&mut draft)?;
        if !dirty {
            return Ok(value);
        }
        if let Some(file) = &self.file {
            file.save(&draft.to_image()).await?;
        }
        let snapshot = Arc::new(draft.ordered());
        *state = draft;
        self.snapshots.send_replace(snapshot);
        tracing::trace!(op, rows = state.rows.len(), "committed");
        Ok(value)
    }
}

#[async_trait]
impl BookRepository for BookStore {
    type Error = StoreError;

    async fn insert(&self, book: NewBook) -> Result<BookId, Self::Error> {
        let id = self
            .commit("insert", |t| t.insert(book).map(|id| (id, true)))
            .await?;
        tracing::debug!(book_id = %id, "inserted book");
        Ok(id)
    }

    async fn insert_all(&self, books: Vec<NewBook>) -> Result<Vec<BookId>, Self::Error> {
        let count = books.len();
        let ids = self
            .commit("insert_all", |t| {
                let ids = books
                    .into_iter()
                    .map(|b| t.insert(b))
                    .collect::<Result<Vec<_>, _>>()?;
                let dirty = !ids.is_empty();
                Ok((ids, dirty))
            })
            .await?;
        tracing::debug!(count, "inserted books");
        Ok(ids)
    }

    async fn update(&self, book: &Book) -> Result<bool, Self::Error> {
        check_title(book.title())?;
        let updated = self
            .commit("update", |t| match t.rows.get_mut(&book.id()) {
                Some(row) => {
                    *row = book.clone();
                    Ok((true, true))
                }
                None => Ok((false, false)),
            })
            .await?;
        tracing::debug!(book_id = %book.id(), updated, "updated book");
        Ok(updated)
    }

    async fn delete_by_id(&self, id: BookId) -> Result<bool, Self::Error> {
        let deleted = self
            .commit("delete", |t| {
                let removed = t.rows.remove(&id).is_some();
                Ok((removed, removed))
            })
            .await?;
        tracing::debug!(book_id = %id, deleted, "deleted book");
        Ok(deleted)
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, Self::Error> {
        Ok(self.state.lock().await.rows.get(&id).cloned())
    }

    fn observe_books(&self, filter: BookFilter) -> LiveQuery<Vec<Book>> {
        LiveQuery::new(self.snapshots.subscribe(), move |books| {
            books.iter().filter(|b| filter.matches(b)).cloned().collect()
        })
    }

    fn observe_book(&self, id: BookId) -> LiveQuery<Option<Book>> {
        LiveQuery::new(self.snapshots.subscribe(), move |books| {
            books.iter().find(|b| b.id() == id).cloned()
        })
    }

    fn observe_count(&self, filter: BookFilter) -> LiveQuery<usize> {
        LiveQuery::new(self.snapshots.subscribe(), move |books| {
            books.iter().filter(|b| filter.matches(b)).count()
        })
    }
}
