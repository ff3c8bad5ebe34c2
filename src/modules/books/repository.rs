use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use shelf_db::{Database, DbError, Timestamp};
use shelf_http::AppError;
use thiserror::Error;

use super::models::{Book, BookPatch, NewBook};

const COLUMNS: &str = "id, name, author, description, price, created_at, updated_at, deleted_at";

/// How a book is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Stamp `deleted_at`; the row stays in storage.
    #[default]
    Soft,
    /// Remove the row permanently, soft-deleted or not.
    Hard,
}

#[derive(Debug, Error)]
pub enum BookError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("book {0} not found")]
    NotFound(i64),

    #[error("storage failure: {0}")]
    Storage(#[from] DbError),
}

impl From<rusqlite::Error> for BookError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.into())
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Validation { field, message } => AppError::invalid_field(field, message),
            e @ BookError::NotFound(_) => AppError::not_found(e.to_string()),
            BookError::Storage(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

/// Transactional access to book rows with soft-delete semantics.
#[derive(Clone)]
pub struct BookRepository {
    db: Arc<Database>,
}

impl BookRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, new: NewBook) -> Result<Book, BookError> {
        require_text("name", &new.name)?;
        require_text("author", &new.author)?;

        let now = Timestamp::now();
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO books (name, author, description, price, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![new.name, new.author, new.description, new.price, now],
            )?;
            Ok::<_, BookError>(conn.last_insert_rowid())
        })?;

        tracing::info!(book_id = id, "book created");

        Ok(Book {
            id,
            name: new.name,
            author: new.author,
            description: new.description,
            price: new.price,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Live book by primary key.
    pub fn get(&self, id: i64) -> Result<Book, BookError> {
        self.db
            .with_conn(|conn| find_live(conn, id))?
            .ok_or(BookError::NotFound(id))
    }

    /// Book by primary key, including soft-deleted rows.
    pub fn get_unscoped(&self, id: i64) -> Result<Option<Book>, BookError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM books WHERE id = ?1"),
                params![id],
                map_book,
            )
            .optional()
            .map_err(BookError::from)
        })
    }

    pub fn list(&self) -> Result<Vec<Book>, BookError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM books WHERE deleted_at IS NULL ORDER BY id"
            ))?;
            let books = stmt
                .query_map([], map_book)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(books)
        })
    }

    /// Live books with exactly this name, most expensive first.
    pub fn search(&self, name: &str) -> Result<Vec<Book>, BookError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM books
                 WHERE name = ?1 AND deleted_at IS NULL
                 ORDER BY price DESC, id ASC"
            ))?;
            let books = stmt
                .query_map(params![name], map_book)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(books)
        })
    }

    /// Merge `patch` into the live book `id`. Read and write share one
    /// transaction; concurrent updates resolve last-writer-wins.
    pub fn update(&self, id: i64, patch: BookPatch) -> Result<Book, BookError> {
        if let Some(field) = patch.immutable_field(id) {
            return Err(BookError::Validation {
                field,
                message: format!("{field} cannot be changed"),
            });
        }
        if let Some(name) = &patch.name {
            require_text("name", name)?;
        }
        if let Some(author) = &patch.author {
            require_text("author", author)?;
        }

        let book = self.db.transaction(|tx| {
            let mut book = find_live(tx, id)?.ok_or(BookError::NotFound(id))?;
            if patch.is_empty() {
                return Ok(book);
            }

            patch.apply_to(&mut book);
            book.updated_at = Timestamp::now();

            tx.execute(
                "UPDATE books
                 SET name = ?1, author = ?2, description = ?3, price = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    book.name,
                    book.author,
                    book.description,
                    book.price,
                    book.updated_at,
                    id
                ],
            )?;
            Ok::<_, BookError>(book)
        })?;

        tracing::info!(book_id = id, "book updated");
        Ok(book)
    }

    pub fn delete(&self, id: i64, mode: DeleteMode) -> Result<(), BookError> {
        let affected = self.db.with_conn(|conn| match mode {
            DeleteMode::Soft => conn.execute(
                "UPDATE books SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                params![Timestamp::now(), id],
            ),
            DeleteMode::Hard => conn.execute("DELETE FROM books WHERE id = ?1", params![id]),
        })?;

        if affected == 0 {
            return Err(BookError::NotFound(id));
        }

        match mode {
            DeleteMode::Soft => tracing::info!(book_id = id, "book soft-deleted"),
            DeleteMode::Hard => tracing::warn!(book_id = id, "book permanently deleted"),
        }
        Ok(())
    }
}

fn find_live(conn: &Connection, id: i64) -> Result<Option<Book>, BookError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM books WHERE id = ?1 AND deleted_at IS NULL"),
        params![id],
        map_book,
    )
    .optional()
    .map_err(BookError::from)
}

fn map_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        name: row.get(1)?,
        author: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        deleted_at: row.get(7)?,
    })
}

fn require_text(field: &'static str, value: &str) -> Result<(), BookError> {
    if value.trim().is_empty() {
        return Err(BookError::Validation {
            field,
            message: format!("{field} must not be empty"),
        });
    }
    Ok(())
}
