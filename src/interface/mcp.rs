//! MCP Server for booklog-mcp
//!
//! MCP Protocol (stdio) <-> application::BookService / BookListViewModel
//!
//! 8 tools: book_add, book_mark_read, book_rate, book_edit, book_remove,
//! book_list, book_show, book_watch

use std::sync::Arc;
use std::time::Duration;

use rmcp::{
    handler::server::{tool::ToolCallContext, tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::application::error::{AppError, ErrorKind};
use crate::application::service::BookService;
use crate::application::view_model::BookListViewModel;
use crate::config::AppConfig;
use crate::domain::live::LiveQuery;
use crate::domain::model::book::{Book, BookFilter};
use crate::domain::model::id::BookId;
use crate::infra::store::BookStore;

use super::render::{render_book_detail, render_book_line, render_book_list};

/// `book_watch` の既定待ち時間と上限。
const DEFAULT_WATCH_TIMEOUT_MS: u64 = 30_000;
const MAX_WATCH_TIMEOUT_MS: u64 = 300_000;

// =============================================================================
// Public entry point
// =============================================================================

/// MCP Serverを起動する。Storeはここで1つだけ作り、各層へ渡す。
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let store = BookStore::open(&config.store_path).await?;
    let service = Arc::new(BookService::new(store));
    let server = BooklogMcpServer::new(service, config.linger);

    tracing::info!(path = %config.store_path.display(), "serving booklog over stdio");
    let running = server.serve(stdio()).await?;
    running.waiting().await?;
    Ok(())
}

// =============================================================================
// MCP Server
// =============================================================================

#[derive(Clone)]
struct BooklogMcpServer {
    service: Arc<BookService<BookStore>>,
    books: BookListViewModel<BookStore>,
    tool_router: ToolRouter<Self>,
}

impl BooklogMcpServer {
    fn new(service: Arc<BookService<BookStore>>, linger: Duration) -> Self {
        let books = BookListViewModel::new(Arc::clone(&service), linger);
        Self {
            service,
            books,
            tool_router: Self::tool_router(),
        }
    }

    fn to_mcp_error(e: AppError) -> McpError {
        match e.kind() {
            ErrorKind::InvalidArgument | ErrorKind::NotFound => {
                McpError::invalid_params(format!("{e}"), None)
            }
            ErrorKind::Storage => {
                tracing::error!(error = %e, "storage failure");
                McpError::internal_error(format!("{e}"), None)
            }
        }
    }

    /// `#3` / `3` / タイトル部分一致 → BookId。
    ///
    /// 優先順位:
    /// 1. 存在する数値id（先頭の `#` は任意）
    /// 2. タイトル部分一致（case-insensitive, フォールバック）
    /// 3. どちらにも当たらない数値はそのままidとして返す（NotFound判定は後段）
    fn resolve_book_ref(&self, s: &str) -> Result<BookId, McpError> {
        let trimmed = s.trim();
        let numeric = parse_book_id(trimmed);
        if let Some(id) = numeric {
            if self.service.get(id).current().is_some() {
                return Ok(id);
            }
        }

        let query = trimmed.to_lowercase();
        if query.is_empty() {
            return Err(McpError::invalid_params("book must not be empty", None));
        }
        let matches: Vec<Book> = self
            .service
            .list_all()
            .current()
            .into_iter()
            .filter(|b| b.title().to_lowercase().contains(&query))
            .collect();
        match matches.len() {
            0 => numeric.ok_or_else(|| {
                McpError::invalid_params(
                    format!("No book found matching: '{trimmed}'. Use `book_list` to see ids."),
                    None,
                )
            }),
            1 => Ok(matches[0].id()),
            n => Err(McpError::invalid_params(
                format!(
                    "Ambiguous title match: '{trimmed}' matches {n} books: {}",
                    matches
                        .iter()
                        .map(|b| format!("'{}' (#{})", b.title(), b.id()))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                None,
            )),
        }
    }

    /// 操作後の1行表示。直後に削除されていれば `#id` のみ。
    fn describe(&self, id: BookId) -> String {
        self.service
            .get(id)
            .current()
            .map(|b| render_book_line(&b))
            .unwrap_or_else(|| format!("#{id}"))
    }

    fn counts(&self) -> (usize, usize) {
        (
            self.service.count_unread().current(),
            self.service.count_read().current(),
        )
    }
}

// =============================================================================
// ServerHandler impl
// =============================================================================

impl ServerHandler for BooklogMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "booklog-mcp".to_string(),
                title: Some("Booklog MCP: Reading List & Ratings".to_string()),
                description: Some(
                    "Track books to read and books read, with 1-5 star ratings.".to_string(),
                ),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Keep a reading list and a read list.\n\
                 \n\
                 Add books with `book_add` (give a rating to record a finished book). \
                 When a book is finished, `book_mark_read` with a 1-5 rating. \
                 `book_list` shows ids; any tool taking `book` accepts an id like '3' or '#3', \
                 or a unique part of the title."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_ctx = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_ctx).await
    }
}

// =============================================================================
// Request types
// =============================================================================

fn parse_book_id(s: &str) -> Option<BookId> {
    s.strip_prefix('#').unwrap_or(s).parse::<i64>().ok().map(BookId::new)
}

fn parse_filter(s: &str) -> Result<BookFilter, McpError> {
    match s {
        "all" => Ok(BookFilter::All),
        "unread" | "reading" => Ok(BookFilter::Unread),
        "read" => Ok(BookFilter::Read),
        other => Err(McpError::invalid_params(
            format!("Unknown filter: '{other}'. Use: all, unread, read"),
            None,
        )),
    }
}

/// 空白のみの任意フィールドは「指定なし」とみなす。
fn normalize_text(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpBookAddRequest {
    #[schemars(description = "Book title (required)")]
    pub title: String,
    #[schemars(description = "Author (optional)")]
    pub author: Option<String>,
    #[schemars(
        description = "Star rating 1-5. Give it to record a book you already finished; omit to add to the reading list."
    )]
    pub rating: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpBookRatingRequest {
    #[schemars(description = "Book id from `book_list` (e.g. '3' or '#3') or part of its title")]
    pub book: String,
    #[schemars(description = "Star rating 1-5")]
    pub rating: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpBookEditRequest {
    #[schemars(description = "Book id from `book_list` (e.g. '3' or '#3') or part of its title")]
    pub book: String,
    #[schemars(description = "New title (omit to keep current)")]
    pub title: Option<String>,
    #[schemars(description = "New author (omit to keep current)")]
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpBookRefRequest {
    #[schemars(description = "Book id from `book_list` (e.g. '3' or '#3') or part of its title")]
    pub book: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpBookListRequest {
    #[schemars(description = "Which books: all (default), unread, read")]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpBookWatchRequest {
    #[schemars(description = "How long to wait for a change in milliseconds (default: 30000, max: 300000)")]
    pub timeout_ms: Option<u64>,
}

// =============================================================================
// Tool implementations
// =============================================================================

#[tool_router]
impl BooklogMcpServer {
    #[tool(
        name = "book_add",
        description = "Add a book. Without a rating it goes to the reading list; with a rating (1-5) it is recorded as already read.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn book_add(
        &self,
        Parameters(req): Parameters<McpBookAddRequest>,
    ) -> Result<CallToolResult, McpError> {
        let title = normalize_text(Some(req.title))
            .ok_or_else(|| McpError::invalid_params("title must not be empty", None))?;
        let author = normalize_text(req.author);
        let id = match req.rating {
            Some(rating) => self.service.add_read(title, author, rating).await,
            None => self.service.add_unread(title, author).await,
        }
        .map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Added: {}",
            self.describe(id)
        ))]))
    }

    #[tool(
        name = "book_mark_read",
        description = "Mark a book as read and give it a 1-5 star rating. Specify the book by id from `book_list` (e.g. '3').",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn book_mark_read(
        &self,
        Parameters(req): Parameters<McpBookRatingRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = self.resolve_book_ref(&req.book)?;
        self.service
            .mark_read(id, req.rating)
            .await
            .map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Marked as read: {}",
            self.describe(id)
        ))]))
    }

    #[tool(
        name = "book_rate",
        description = "Change a book's 1-5 star rating without changing whether it is read.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn book_rate(
        &self,
        Parameters(req): Parameters<McpBookRatingRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = self.resolve_book_ref(&req.book)?;
        self.service
            .set_rating(id, req.rating)
            .await
            .map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Rated: {}",
            self.describe(id)
        ))]))
    }

    #[tool(
        name = "book_edit",
        description = "Edit a book's title and/or author. Only specified fields are changed.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn book_edit(
        &self,
        Parameters(req): Parameters<McpBookEditRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = self.resolve_book_ref(&req.book)?;
        self.service
            .edit_details(id, normalize_text(req.title), normalize_text(req.author))
            .await
            .map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Updated: {}",
            self.describe(id)
        ))]))
    }

    #[tool(
        name = "book_remove",
        description = "Delete a book. Deleting an id that does not exist is not an error.",
        annotations(
            read_only_hint = false,
            destructive_hint = true,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn book_remove(
        &self,
        Parameters(req): Parameters<McpBookRefRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = self.resolve_book_ref(&req.book)?;
        // 削除前に表示用の行を取得
        let label = self.describe(id);
        self.service.remove(id).await.map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Removed: {label}"
        ))]))
    }

    #[tool(
        name = "book_list",
        description = "List books, newest first, with ids and counts. Filter: all (default), unread (reading list), read.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn book_list(
        &self,
        Parameters(req): Parameters<McpBookListRequest>,
    ) -> Result<CallToolResult, McpError> {
        let filter = req
            .filter
            .as_deref()
            .map(parse_filter)
            .transpose()?
            .unwrap_or(BookFilter::All);

        let query = match filter {
            BookFilter::All => self.service.list_all(),
            BookFilter::Unread => self.service.list_unread(),
            BookFilter::Read => self.service.list_read(),
        };
        let books = first_result(query).await?;
        let (unread, read) = self.counts();

        Ok(CallToolResult::success(vec![Content::text(
            render_book_list(&books, filter, unread, read),
        )]))
    }

    #[tool(
        name = "book_show",
        description = "Show one book's details: author, status, rating, and when it was added.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn book_show(
        &self,
        Parameters(req): Parameters<McpBookRefRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = self.resolve_book_ref(&req.book)?;
        let text = match first_result(self.service.get(id)).await? {
            Some(book) => render_book_detail(&book),
            None => format!("Book #{id} not found."),
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        name = "book_watch",
        description = "Wait until the book list changes (or the timeout passes), then show the new list. Useful to follow edits made by another client.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn book_watch(
        &self,
        Parameters(req): Parameters<McpBookWatchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let timeout_ms = req
            .timeout_ms
            .unwrap_or(DEFAULT_WATCH_TIMEOUT_MS)
            .min(MAX_WATCH_TIMEOUT_MS);

        // 観測中はView Modelの購読が維持され、連続呼び出しでも張り直さない
        let mut observer = self.books.observe();
        observer.wait_loaded().await.ok_or_else(subscription_closed)?;

        match tokio::time::timeout(Duration::from_millis(timeout_ms), observer.changed()).await {
            Ok(Some(books)) => {
                let (unread, read) = self.counts();
                Ok(CallToolResult::success(vec![Content::text(format!(
                    "Book list changed.\n\n{}",
                    render_book_list(&books, BookFilter::All, unread, read)
                ))]))
            }
            Ok(None) => Err(subscription_closed()),
            Err(_) => Ok(CallToolResult::success(vec![Content::text(format!(
                "No changes within {timeout_ms} ms."
            ))])),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// live queryの初回スナップショットを取り出す。
async fn first_result<T: Clone + PartialEq>(mut query: LiveQuery<T>) -> Result<T, McpError> {
    query.next().await.ok_or_else(subscription_closed)
}

fn subscription_closed() -> McpError {
    McpError::internal_error("book table subscription closed", None)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> BooklogMcpServer {
        let service = Arc::new(BookService::new(BookStore::in_memory()));
        BooklogMcpServer::new(service, Duration::from_millis(50))
    }

    #[test]
    fn parse_filter_valid() {
        assert_eq!(parse_filter("all").unwrap(), BookFilter::All);
        assert_eq!(parse_filter("unread").unwrap(), BookFilter::Unread);
        assert_eq!(parse_filter("reading").unwrap(), BookFilter::Unread);
        assert_eq!(parse_filter("read").unwrap(), BookFilter::Read);
    }

    #[test]
    fn parse_filter_invalid() {
        assert!(parse_filter("finished").is_err());
    }

    #[test]
    fn parse_book_id_forms() {
        assert_eq!(parse_book_id("3"), Some(BookId::new(3)));
        assert_eq!(parse_book_id("#12"), Some(BookId::new(12)));
        assert_eq!(parse_book_id("Dune"), None);
        assert_eq!(parse_book_id("#"), None);
    }

    #[test]
    fn normalize_text_drops_blank() {
        assert_eq!(normalize_text(Some("  ".into())), None);
        assert_eq!(normalize_text(Some(" Le Guin ".into())), Some("Le Guin".into()));
        assert_eq!(normalize_text(None), None);
    }

    #[tokio::test]
    async fn server_info() {
        let info = server().get_info();
        assert_eq!(info.server_info.name, "booklog-mcp");
        assert!(!info.server_info.version.is_empty());
    }

    #[test]
    fn add_request_minimal() {
        let req: McpBookAddRequest = serde_json::from_str(r#"{"title": "Dune"}"#).unwrap();
        assert_eq!(req.title, "Dune");
        assert!(req.author.is_none());
        assert!(req.rating.is_none());
    }

    #[test]
    fn list_and_watch_request_defaults() {
        let list: McpBookListRequest = serde_json::from_str("{}").unwrap();
        assert!(list.filter.is_none());
        let watch: McpBookWatchRequest = serde_json::from_str("{}").unwrap();
        assert!(watch.timeout_ms.is_none());
    }

    #[tokio::test]
    async fn resolve_by_id_and_title() {
        let server = server();
        let dune = server.service.add_unread("Dune", None).await.unwrap();
        server
            .service
            .add_unread("Dune Messiah", None)
            .await
            .unwrap();
        server.service.add_unread("Emma", None).await.unwrap();

        assert_eq!(server.resolve_book_ref(&format!("#{dune}")).unwrap(), dune);
        assert!(server.resolve_book_ref("emma").is_ok());
        // "dune" は2冊に一致
        assert!(server.resolve_book_ref("dune").is_err());
        assert!(server.resolve_book_ref("Ulysses").is_err());
    }

    #[test]
    fn domain_errors_map_to_invalid_params() {
        use crate::domain::error::DomainError;
        use rmcp::model::ErrorCode;

        let e = BooklogMcpServer::to_mcp_error(DomainError::InvalidRating(9).into());
        assert_eq!(e.code, ErrorCode::INVALID_PARAMS);
        let e = BooklogMcpServer::to_mcp_error(DomainError::BookNotFound(BookId::new(1)).into());
        assert_eq!(e.code, ErrorCode::INVALID_PARAMS);
    }
    // --- ツール呼び出し ---

    fn text(result: CallToolResult) -> String {
        result.content[0]
            .as_text()
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    fn add(title: &str, author: Option<&str>, rating: Option<i64>) -> Parameters<McpBookAddRequest> {
        Parameters(McpBookAddRequest {
            title: title.into(),
            author: author.map(Into::into),
            rating,
        })
    }

    fn book_ref(book: &str) -> Parameters<McpBookRefRequest> {
        Parameters(McpBookRefRequest { book: book.into() })
    }

    fn list(filter: Option<&str>) -> Parameters<McpBookListRequest> {
        Parameters(McpBookListRequest {
            filter: filter.map(Into::into),
        })
    }

    fn watch(timeout_ms: Option<u64>) -> Parameters<McpBookWatchRequest> {
        Parameters(McpBookWatchRequest { timeout_ms })
    }

    #[tokio::test]
    async fn book_add_replies_with_rendered_line() {
        let server = server();
        let out = server
            .book_add(add(" Dune ", Some("Frank Herbert"), None))
            .await
            .unwrap();
        assert_eq!(text(out), "Added: #1. Dune — Frank Herbert [reading list]");

        let out = server.book_add(add("Emma", None, Some(4))).await.unwrap();
        assert_eq!(text(out), "Added: #2. Emma ★★★★☆");
        assert_eq!(server.counts(), (1, 1));
    }

    #[tokio::test]
    async fn book_add_rejects_bad_input_without_insert() {
        use rmcp::model::ErrorCode;

        let server = server();
        let err = server.book_add(add("Dune", None, Some(9))).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.message, "Rating must be between 1 and 5");

        let err = server.book_add(add("   ", None, None)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(server.counts(), (0, 0));
    }

    #[tokio::test]
    async fn book_list_empty_and_filtered() {
        let server = server();
        let out = server.book_list(list(None)).await.unwrap();
        assert_eq!(
            text(out),
            "# My Books (0 unread, 0 read)\n\n📚 No books yet\nStart adding books to your reading list!"
        );

        server.book_add(add("Dune", None, Some(5))).await.unwrap();
        server.book_add(add("Emma", None, None)).await.unwrap();

        let out = server.book_list(list(Some("read"))).await.unwrap();
        assert_eq!(text(out), "# Read (1 unread, 1 read)\n\n#1. Dune ★★★★★");

        let out = server.book_list(list(Some("unread"))).await.unwrap();
        assert_eq!(
            text(out),
            "# Reading List (1 unread, 1 read)\n\n#2. Emma [reading list]"
        );

        assert!(server.book_list(list(Some("finished"))).await.is_err());
    }

    #[tokio::test]
    async fn book_remove_and_show_missing_id() {
        let server = server();
        let out = server.book_remove(book_ref("42")).await.unwrap();
        assert_eq!(text(out), "Removed: #42");

        let out = server.book_show(book_ref("#7")).await.unwrap();
        assert_eq!(text(out), "Book #7 not found.");
    }

    #[tokio::test]
    async fn book_show_and_remove_existing() {
        let server = server();
        server
            .book_add(add("Dune", Some("Frank Herbert"), Some(4)))
            .await
            .unwrap();

        let out = text(server.book_show(book_ref("dune")).await.unwrap());
        assert!(out.starts_with("#1 Dune\nAuthor: Frank Herbert\nStatus: read\nRating: ★★★★☆ (4/5)\nAdded: "));

        let out = server.book_remove(book_ref("1")).await.unwrap();
        assert_eq!(text(out), "Removed: #1. Dune — Frank Herbert ★★★★☆");
        assert_eq!(server.counts(), (0, 0));
    }

    #[tokio::test]
    async fn book_mark_read_missing_is_invalid_params() {
        use rmcp::model::ErrorCode;

        let server = server();
        let err = server
            .book_mark_read(Parameters(McpBookRatingRequest {
                book: "5".into(),
                rating: 3,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.message, "Book with id 5 not found");
    }

    #[tokio::test]
    async fn numeric_title_falls_back_to_title_match() {
        let server = server();
        let nineteen = server.service.add_unread("1984", None).await.unwrap();
        let dune = server.service.add_unread("Dune", None).await.unwrap();

        // 存在するidが優先、存在しなければタイトル一致
        assert_eq!(server.resolve_book_ref("2").unwrap(), dune);
        assert_eq!(server.resolve_book_ref("1984").unwrap(), nineteen);
        // どちらにも当たらなければidとして扱う
        assert_eq!(server.resolve_book_ref("#77").unwrap(), BookId::new(77));

        let out = server
            .book_mark_read(Parameters(McpBookRatingRequest {
                book: "1984".into(),
                rating: 5,
            }))
            .await
            .unwrap();
        assert_eq!(text(out), "Marked as read: #1. 1984 ★★★★★");
    }

    #[tokio::test(start_paused = true)]
    async fn book_watch_reports_change() {
        let server = server();
        let service = Arc::clone(&server.service);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            service.add_unread("Dune", None).await.unwrap();
        });

        let out = server.book_watch(watch(Some(10_000))).await.unwrap();
        assert_eq!(
            text(out),
            "Book list changed.\n\n# My Books (1 unread, 0 read)\n\n#1. Dune [reading list]"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn book_watch_times_out_and_caps_wait() {
        let server = server();
        let out = server.book_watch(watch(Some(2_000))).await.unwrap();
        assert_eq!(text(out), "No changes within 2000 ms.");

        let started = tokio::time::Instant::now();
        let out = server.book_watch(watch(Some(u64::MAX))).await.unwrap();
        assert_eq!(text(out), "No changes within 300000 ms.");
        assert!(started.elapsed() >= Duration::from_millis(MAX_WATCH_TIMEOUT_MS));
        assert!(started.elapsed() < Duration::from_millis(MAX_WATCH_TIMEOUT_MS + 1_000));
    }
}
