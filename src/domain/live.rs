//! Live query — コミットごとに結果を再送する購読。
//!
//! Storeはコミットのたびに不変スナップショットを `watch` チャネルへ流す。
//! 各 `LiveQuery` はスナップショットを自分の射影で評価し、
//! 結果が変わったときだけ次の値を返す。

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use super::model::book::Book;

/// テーブル全体の不変スナップショット。`created_at` 降順（同値はid降順）で並ぶ。
pub type Snapshot = Arc<Vec<Book>>;

type Projection<T> = Box<dyn Fn(&[Book]) -> T + Send + Sync>;

/// 1つのクエリ形状に対する購読。dropすると購読解除。
pub struct LiveQuery<T> {
    rx: watch::Receiver<Snapshot>,
    project: Projection<T>,
    last: Option<T>,
}

impl<T: Clone + PartialEq> LiveQuery<T> {
    pub fn new(
        rx: watch::Receiver<Snapshot>,
        project: impl Fn(&[Book]) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            rx,
            project: Box::new(project),
            last: None,
        }
    }

    /// 次の結果を待つ。
    ///
    /// 初回は現在のスナップショットを即座に返す。以降は結果が変化する
    /// コミットまで待機する。Storeが破棄されたら `None`。
    pub async fn next(&mut self) -> Option<T> {
        if self.last.is_none() {
            let value = (self.project)(&self.rx.borrow_and_update());
            self.last = Some(value.clone());
            return Some(value);
        }
        loop {
            self.rx.changed().await.ok()?;
            let value = (self.project)(&self.rx.borrow_and_update());
            if self.last.as_ref() != Some(&value) {
                self.last = Some(value.clone());
                return Some(value);
            }
        }
    }

    /// 最新コミット時点の結果。購読位置は進めない。
    pub fn current(&self) -> T {
        (self.project)(&self.rx.borrow())
    }
}

impl<T> fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQuery")
            .field("emitted", &self.last.is_some())
            .finish_non_exhaustive()
    }
}
