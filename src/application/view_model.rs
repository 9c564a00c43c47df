//! 本の一覧を観測可能な値として公開するアダプタ。
//!
//! 最初の観測者が付いたときに `list_all()` の購読を開始し、最後の観測者が
//! 外れてから猶予期間（linger）が過ぎたら購読を破棄する。猶予中に再び
//! 観測者が付けば、走っている購読をそのまま使い回す。

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::model::book::Book;
use crate::domain::repository::BookRepository;

use super::service::BookService;

/// 最後の観測者が外れてから購読を破棄するまでの既定の猶予。
pub const DEFAULT_LINGER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
struct ListState {
    books: Arc<Vec<Book>>,
    /// 現在の購読から1回以上値が届いたか
    loaded: bool,
}

#[derive(Default)]
struct Lifecycle {
    observers: usize,
    /// attachのたびに進める。古い破棄タイマーを無効化するため。
    generation: u64,
    upstream: Option<JoinHandle<()>>,
    teardown: Option<JoinHandle<()>>,
}

struct Inner<R: BookRepository + 'static> {
    service: Arc<BookService<R>>,
    linger: Duration,
    state: Arc<watch::Sender<ListState>>,
    lifecycle: Mutex<Lifecycle>,
}

/// `list_all()` を保持する観測可能な値。初期値は空の一覧。
pub struct BookListViewModel<R: BookRepository + 'static> {
    inner: Arc<Inner<R>>,
}

impl<R: BookRepository + 'static> Clone for BookListViewModel<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: BookRepository + 'static> BookListViewModel<R> {
    pub fn new(service: Arc<BookService<R>>, linger: Duration) -> Self {
        let (state, _) = watch::channel(ListState::default());
        Self {
            inner: Arc::new(Inner {
                service,
                linger,
                state: Arc::new(state),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// 観測を開始する。ガードをdropすると観測終了。
    ///
    /// Tokioランタイム内で呼ぶこと（購読タスクをspawnする）。
    pub fn observe(&self) -> BookListObserver<R> {
        self.inner.attach();
        BookListObserver {
            inner: Arc::clone(&self.inner),
            rx: self.inner.state.subscribe(),
        }
    }

    /// 最後に届いた一覧。まだ何も届いていなければ空。
    pub fn books(&self) -> Arc<Vec<Book>> {
        Arc::clone(&self.inner.state.borrow().books)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers
    }

    /// 上流の購読が生きているか。
    pub fn is_active(&self) -> bool {
        self.inner
            .lock()
            .upstream
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl<R: BookRepository + 'static> Inner<R> {
    fn lock(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attach(&self) {
        let mut lc = self.lock();
        lc.observers += 1;
        lc.generation += 1;
        if let Some(pending) = lc.teardown.take() {
            pending.abort();
            tracing::trace!("teardown cancelled by re-attach");
        }
        if lc.upstream.is_none() {
            // 保持中の値は残し、新しい購読から届くまで未ロード扱いにする
            self.state.send_modify(|s| s.loaded = false);
            lc.upstream = Some(self.spawn_upstream());
            tracing::debug!("book list subscription started");
        }
    }

    fn spawn_upstream(&self) -> JoinHandle<()> {
        let mut query = self.service.list_all();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            while let Some(books) = query.next().await {
                state.send_replace(ListState {
                    books: Arc::new(books),
                    loaded: true,
                });
            }
        })
    }

    fn release(self: &Arc<Self>) {
        let mut lc = self.lock();
        lc.observers = lc.observers.saturating_sub(1);
        if lc.observers > 0 {
            return;
        }
        let generation = lc.generation;
        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(self);
                let linger = self.linger;
                lc.teardown = Some(handle.spawn(async move {
                    tokio::time::sleep(linger).await;
                    inner.teardown_if_idle(generation);
                }));
            }
            // ランタイム外でのdropは即時破棄
            Err(_) => Self::stop_upstream(&mut lc),
        }
    }

    fn teardown_if_idle(&self, generation: u64) {
        let mut lc = self.lock();
        if lc.observers == 0 && lc.generation == generation {
            lc.teardown = None;
            Self::stop_upstream(&mut lc);
        }
    }

    fn stop_upstream(lc: &mut Lifecycle) {
        if let Some(upstream) = lc.upstream.take() {
            upstream.abort();
            tracing::debug!("book list subscription torn down");
        }
    }
}

impl<R: BookRepository + 'static> Drop for Inner<R> {
    fn drop(&mut self) {
        let lc = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(upstream) = lc.upstream.take() {
            upstream.abort();
        }
    }
}

/// 観測ガード。生きている間は上流の購読が維持される。
pub struct BookListObserver<R: BookRepository + 'static> {
    inner: Arc<Inner<R>>,
    rx: watch::Receiver<ListState>,
}

impl<R: BookRepository + 'static> BookListObserver<R> {
    pub fn books(&self) -> Arc<Vec<Book>> {
        Arc::clone(&self.rx.borrow().books)
    }

    /// 次の値が届くまで待つ。
    pub async fn changed(&mut self) -> Option<Arc<Vec<Book>>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update().books))
    }

    /// 現在の購読から値が届いていればそれを、なければ届くまで待って返す。
    pub async fn wait_loaded(&mut self) -> Option<Arc<Vec<Book>>> {
        let state = self.rx.wait_for(|s| s.loaded).await.ok()?;
        Some(Arc::clone(&state.books))
    }
}

impl<R: BookRepository + 'static> Drop for BookListObserver<R> {
    fn drop(&mut self) {
        self.inner.release();
    }
}
