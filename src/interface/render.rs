//! 一覧・詳細のテキスト表示。

use crate::domain::model::book::{Book, BookFilter};

pub const EMPTY_STATE: &str = "📚 No books yet\nStart adding books to your reading list!";

/// 一覧の見出し（件数付き）と各行。空なら空状態のメッセージ。
pub fn render_book_list(books: &[Book], filter: BookFilter, unread: usize, read: usize) -> String {
    let heading = match filter {
        BookFilter::All => "My Books",
        BookFilter::Unread => "Reading List",
        BookFilter::Read => "Read",
    };
    let mut output = format!("# {heading} ({unread} unread, {read} read)\n\n");

    if books.is_empty() {
        match filter {
            BookFilter::All => output.push_str(EMPTY_STATE),
            BookFilter::Unread => output.push_str("Reading list is empty."),
            BookFilter::Read => output.push_str("No books marked as read yet."),
        }
        return output;
    }

    let lines: Vec<String> = books.iter().map(render_book_line).collect();
    output.push_str(&lines.join("\n"));
    output
}

/// `#3. Dune — Frank Herbert ★★★★☆`
pub fn render_book_line(book: &Book) -> String {
    let mut line = format!("#{}. {}", book.id(), book.title());
    if let Some(author) = book.author() {
        line.push_str(&format!(" — {author}"));
    }
    line.push(' ');
    line.push_str(&status_label(book));
    line
}

pub fn render_book_detail(book: &Book) -> String {
    let rating = match book.rating() {
        Some(r) => format!("{} ({}/5)", r.stars(), r.get()),
        None => "-".to_string(),
    };
    format!(
        "#{} {}\nAuthor: {}\nStatus: {}\nRating: {}\nAdded: {}",
        book.id(),
        book.title(),
        book.author().unwrap_or("-"),
        if book.is_read() { "read" } else { "reading list" },
        rating,
        format_timestamp(book.created_at()),
    )
}

fn status_label(book: &Book) -> String {
    match (book.is_read(), book.rating()) {
        (true, Some(r)) => r.stars(),
        (true, None) => "[read, no rating]".to_string(),
        (false, _) => "[reading list]".to_string(),
    }
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::book::{NewBook, Rating};
    use crate::domain::model::id::BookId;

    #[test]
    fn line_for_rated_book() {
        let book = Book::from_new(
            BookId::new(3),
            NewBook::read("Dune", Some("Frank Herbert".into()), Rating::new(4).unwrap(), 0),
        );
        assert_eq!(render_book_line(&book), "#3. Dune — Frank Herbert ★★★★☆");
    }

    #[test]
    fn line_for_unread_book_without_author() {
        let book = Book::from_new(BookId::new(1), NewBook::unread("Emma", None, 0));
        assert_eq!(render_book_line(&book), "#1. Emma [reading list]");
    }

    #[test]
    fn empty_all_shows_placeholder() {
        let out = render_book_list(&[], BookFilter::All, 0, 0);
        assert!(out.starts_with("# My Books (0 unread, 0 read)"));
        assert!(out.ends_with(EMPTY_STATE));
    }

    #[test]
    fn detail_formats_timestamp() {
        let book = Book::from_new(BookId::new(1), NewBook::unread("Emma", None, 0));
        assert!(render_book_detail(&book).contains("Added: 1970-01-01 00:00 UTC"));
    }
}
