use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use tracing::{debug, info};

use super::{PositionMutator, PositionStore};
use crate::config::DiaryConfig;
use crate::entity::{GroupKey, Note, NoteDraft, NoteEdit, Page, Product};
use crate::error::{DiaryError, Result};
use crate::ordering::OrderingChange;

const NOTE_COLUMNS: &str =
    "id, page_id, meal_type, product_id, product_quantity, display_order";

/// SQLite-backed persistence for pages, products and notes
pub struct DiaryStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl DiaryStore {
    /// Open or create the diary database at the configured path
    pub fn open(config: &DiaryConfig) -> Result<Self> {
        let conn = Connection::open(&config.database_path)?;
        let store = Self {
            conn,
            path: Some(config.database_path.clone()),
        };
        store.configure(config)?;
        info!(path = %config.database_path.display(), "opened diary database");
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory(config: &DiaryConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn, path: None };
        store.configure(config)?;
        Ok(store)
    }

    /// Location of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn configure(&self, config: &DiaryConfig) -> Result<()> {
        self.conn
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        self.conn.pragma_update(None, "foreign_keys", true)?;
        self.init_schema()
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                calories_cost INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
                meal_type INTEGER NOT NULL,
                product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                product_quantity INTEGER NOT NULL,
                display_order INTEGER NOT NULL CHECK (display_order >= 0)
            );

            CREATE INDEX IF NOT EXISTS idx_notes_group
                ON notes(page_id, meal_type, display_order);
            CREATE INDEX IF NOT EXISTS idx_notes_product ON notes(product_id);
            ",
        )?;
        Ok(())
    }

    /// Begin a unit of work holding the database write lock.
    ///
    /// The lock is taken immediately so that concurrent reorderings of the
    /// same group are serialized before either one reads its slice.
    pub fn begin(&mut self) -> Result<UnitOfWork<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(UnitOfWork { tx })
    }

    /// Register a product
    pub fn add_product(&self, name: &str, calories_cost: i32) -> Result<Product> {
        if name.trim().is_empty() {
            return Err(DiaryError::validation("Name", "Product name is required"));
        }
        if self.product_by_name(name)?.is_some() {
            return Err(DiaryError::validation(
                "Name",
                format!("Product with name '{}' already exists", name),
            ));
        }

        self.conn.execute(
            "INSERT INTO products (name, calories_cost) VALUES (?1, ?2)",
            params![name, calories_cost],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(product_id = id, name, "product added");

        Ok(Product {
            id,
            name: name.to_string(),
            calories_cost,
        })
    }

    fn product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let product = self
            .conn
            .query_row(
                "SELECT id, name, calories_cost FROM products WHERE name = ?1",
                [name],
                product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    /// All products ordered by name
    pub fn list_products(&self) -> Result<Vec<Product>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, calories_cost FROM products ORDER BY name")?;
        let products = stmt
            .query_map([], product_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Create the page for a date
    pub fn add_page(&self, date: NaiveDate) -> Result<Page> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pages WHERE date = ?1)",
            [date.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(DiaryError::validation(
                "Date",
                format!("Page with date '{}' already exists", date),
            ));
        }

        self.conn
            .execute("INSERT INTO pages (date) VALUES (?1)", [date.to_string()])?;
        let id = self.conn.last_insert_rowid();
        debug!(page_id = id, %date, "page added");

        Ok(Page { id, date })
    }

    /// All pages ordered by date
    pub fn list_pages(&self) -> Result<Vec<Page>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, date FROM pages ORDER BY date")?;
        let pages = stmt
            .query_map([], page_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    /// Look up a page by id
    pub fn get_page(&self, id: i64) -> Result<Option<Page>> {
        let page = self
            .conn
            .query_row("SELECT id, date FROM pages WHERE id = ?1", [id], page_from_row)
            .optional()?;
        Ok(page)
    }

    /// Look up a note by id
    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        select_note(&self.conn, id)
    }

    /// Notes of a page ordered by meal type, then display order
    pub fn notes_for_page(&self, page_id: i64) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE page_id = ?1
             ORDER BY meal_type, display_order"
        ))?;
        let notes = stmt
            .query_map([page_id], note_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Notes of a single ordering group, ascending by display order
    pub fn notes_for_group(&self, key: &GroupKey) -> Result<Vec<Note>> {
        select_group(&self.conn, key, 0)
    }
}

/// One atomic mutation of the diary. Dropping it without calling
/// [`UnitOfWork::commit`] rolls every change back.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl UnitOfWork<'_> {
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        select_note(&self.tx, id)
    }

    /// Fetch notes by id. Unknown ids are silently absent from the result.
    pub fn notes_by_ids(&self, ids: &[i64]) -> Result<Vec<Note>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id IN ({placeholders})
             ORDER BY page_id, meal_type, display_order"
        ))?;
        let notes = stmt
            .query_map(params_from_iter(ids.iter()), note_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    pub fn product_exists(&self, product_id: i64) -> Result<bool> {
        let exists = self.tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = ?1)",
            [product_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn page_exists(&self, page_id: i64) -> Result<bool> {
        let exists = self.tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM pages WHERE id = ?1)",
            [page_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Insert a note at an already computed display order
    pub(crate) fn insert_note(&self, draft: &NoteDraft, display_order: u32) -> Result<Note> {
        self.tx.execute(
            "INSERT INTO notes (page_id, meal_type, product_id, product_quantity, display_order)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                draft.page_id,
                draft.meal_type,
                draft.product_id,
                draft.product_quantity,
                display_order,
            ],
        )?;

        Ok(Note {
            id: self.tx.last_insert_rowid(),
            page_id: draft.page_id,
            meal_type: draft.meal_type,
            product_id: draft.product_id,
            product_quantity: draft.product_quantity,
            display_order,
        })
    }

    /// Update product and quantity only
    pub(crate) fn update_note_contents(&self, id: i64, edit: &NoteEdit) -> Result<()> {
        let updated = self.tx.execute(
            "UPDATE notes SET product_id = ?1, product_quantity = ?2 WHERE id = ?3",
            params![edit.product_id, edit.product_quantity, id],
        )?;
        if updated == 0 {
            return Err(DiaryError::NotFound(format!("note {}", id)));
        }
        Ok(())
    }

    pub(crate) fn delete_notes(&self, ids: &[i64]) -> Result<usize> {
        let mut stmt = self.tx.prepare("DELETE FROM notes WHERE id = ?1")?;
        let mut deleted = 0;
        for id in ids {
            deleted += stmt.execute([id])?;
        }
        Ok(deleted)
    }
}

impl PositionStore for UnitOfWork<'_> {
    fn group_members(&self, key: &GroupKey) -> Result<Vec<Note>> {
        select_group(&self.tx, key, 0)
    }

    fn group_tail(&self, key: &GroupKey, from: u32) -> Result<Vec<Note>> {
        select_group(&self.tx, key, from)
    }

    fn max_display_order(&self, key: &GroupKey) -> Result<Option<u32>> {
        let max = self.tx.query_row(
            "SELECT MAX(display_order) FROM notes WHERE page_id = ?1 AND meal_type = ?2",
            params![key.page_id, key.meal_type],
            |row| row.get::<_, Option<u32>>(0),
        )?;
        Ok(max)
    }
}

impl PositionMutator for UnitOfWork<'_> {
    fn apply_ordering_changes(&self, changes: &[OrderingChange]) -> Result<usize> {
        let mut reorder = self
            .tx
            .prepare_cached("UPDATE notes SET display_order = ?1 WHERE id = ?2")?;
        let mut relocate = self
            .tx
            .prepare_cached("UPDATE notes SET display_order = ?1, meal_type = ?2 WHERE id = ?3")?;

        let mut written = 0;
        for change in changes {
            let updated = match change.meal_type {
                Some(meal) => relocate.execute(params![change.display_order, meal, change.note_id])?,
                None => reorder.execute(params![change.display_order, change.note_id])?,
            };
            if updated == 0 {
                return Err(DiaryError::Store(format!(
                    "note {} vanished while applying ordering changes",
                    change.note_id
                )));
            }
            written += updated;
        }

        debug!(written, "ordering changes applied");
        Ok(written)
    }
}

fn select_note(conn: &Connection, id: i64) -> Result<Option<Note>> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
            [id],
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

fn select_group(conn: &Connection, key: &GroupKey, from: u32) -> Result<Vec<Note>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {NOTE_COLUMNS} FROM notes
         WHERE page_id = ?1 AND meal_type = ?2 AND display_order >= ?3
         ORDER BY display_order"
    ))?;
    let notes = stmt
        .query_map(params![key.page_id, key.meal_type, from], note_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(notes)
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        page_id: row.get(1)?,
        meal_type: row.get(2)?,
        product_id: row.get(3)?,
        product_quantity: row.get(4)?,
        display_order: row.get(5)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        calories_cost: row.get(2)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    let raw: String = row.get(1)?;
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Page {
        id: row.get(0)?,
        date,
    })
}
