use async_trait::async_trait;

use super::live::LiveQuery;
use super::model::book::{Book, BookFilter, NewBook};
use super::model::id::BookId;

/// 永続化の抽象（Record Store）。Infra層が実装する。
///
/// 各書き込みはコミット単位で直列化され、コミット後に全ての
/// live queryへ変更が通知される。
#[async_trait]
pub trait BookRepository: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// 1行挿入して採番されたidを返す。明示idが既存と衝突したら失敗（上書きしない）。
    async fn insert(&self, book: NewBook) -> Result<BookId, Self::Error>;

    /// 一括挿入。1件でも失敗したら何も挿入しない。
    async fn insert_all(&self, books: Vec<NewBook>) -> Result<Vec<BookId>, Self::Error>;

    /// id一致の行を丸ごと置き換える。該当行がなければ `false`。
    async fn update(&self, book: &Book) -> Result<bool, Self::Error>;

    /// 該当行がなければ `false`（エラーではない）。
    async fn delete_by_id(&self, id: BookId) -> Result<bool, Self::Error>;

    /// 行と同じidの行を削除する。
    async fn delete(&self, book: &Book) -> Result<bool, Self::Error> {
        self.delete_by_id(book.id()).await
    }

    /// 単発の読み取り。
    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, Self::Error>;

    /// 絞り込み済みの一覧を `created_at` 降順で購読する。
    fn observe_books(&self, filter: BookFilter) -> LiveQuery<Vec<Book>>;

    fn observe_book(&self, id: BookId) -> LiveQuery<Option<Book>>;

    fn observe_count(&self, filter: BookFilter) -> LiveQuery<usize>;
}
