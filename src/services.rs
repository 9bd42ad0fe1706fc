//! Sample in-memory catalogue service.

use chrono::{NaiveDateTime, Utc};
use parking_lot::RwLock;
use xmlrpc_core::{xmlrpc_record, MethodError, Methods, Service};

/// Fault code for a missing book.
pub const BOOK_NOT_FOUND: i32 = 404;

xmlrpc_record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Book {
        pub id: i32,
        pub title: String,
        pub author: String,
        pub tags: Vec<String>,
        pub summary: Option<String>,
        pub added: NaiveDateTime as "dateAdded",
    }
}

/// Book catalogue held in memory.
#[derive(Default)]
pub struct Library {
    books: RwLock<Vec<Book>>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_book(&self, mut book: Book) -> Result<i32, MethodError> {
        if book.title.trim().is_empty() {
            return Err(MethodError::fault(400, "title is required"));
        }
        let mut books = self.books.write();
        book.id = books.iter().map(|b| b.id).max().unwrap_or(0) + 1;
        book.added = Utc::now().naive_utc();
        tracing::debug!(id = book.id, title = %book.title, "book added");
        let id = book.id;
        books.push(book);
        Ok(id)
    }

    fn get_book(&self, id: i32) -> Result<Book, MethodError> {
        self.books
            .read()
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| MethodError::fault(BOOK_NOT_FOUND, format!("no book with id {}", id)))
    }

    fn list_books(&self) -> Result<Vec<Book>, MethodError> {
        Ok(self.books.read().clone())
    }

    fn find_by_tag(&self, tag: String) -> Result<Vec<Book>, MethodError> {
        Ok(self
            .books
            .read()
            .iter()
            .filter(|b| b.tags.iter().any(|t| t == &tag))
            .cloned()
            .collect())
    }

    fn remove_book(&self, id: i32) -> Result<bool, MethodError> {
        let mut books = self.books.write();
        let before = books.len();
        books.retain(|b| b.id != id);
        Ok(books.len() != before)
    }

    fn count(&self) -> Result<i32, MethodError> {
        Ok(self.books.read().len() as i32)
    }
}

impl Service for Library {
    const NAME: &'static str = "library";

    fn methods(methods: &mut Methods<Self>) {
        methods
            .add("library.addBook", Library::add_book)
            .describe("Adds a book to the catalogue")
            .params(&["book"])
            .returns("The id assigned to the book");
        methods
            .add("library.getBook", Library::get_book)
            .describe("Fetches one book by id")
            .params(&["id"])
            .bare();
        methods
            .add("library.listBooks", Library::list_books)
            .describe("Lists every book in the catalogue");
        methods
            .add("library.findByTag", Library::find_by_tag)
            .params(&["tag"])
            .returns("Books carrying the tag");
        methods
            .add("library.removeBook", Library::remove_book)
            .params(&["id"])
            .returns("Whether a book was removed");
        methods.add("library.count", Library::count);
    }
}
