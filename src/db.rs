use std::path::Path;

use chrono::{NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Result, Row};

use crate::models::{
    BudgetRecord, CategoryTotal, DateRange, ExpenseCategory, ExpenseDraft, ExpenseRecord,
    IncomeDraft, IncomeRecord, User,
};

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_db(path: &Path) -> std::result::Result<DbPool, crate::error::AppError> {
    // foreign_keys is a per-connection pragma, so every pooled connection sets it.
    let manager = SqliteConnectionManager::file(path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::new(manager)?;
    {
        let conn = pool.get()?;
        run_migrations(&conn)?;
    }
    Ok(pool)
}

pub(crate) fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            token TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS expense_categories (
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS incomes (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
            source TEXT NOT NULL,
            description TEXT,
            occurred_on TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            category_id INTEGER,
            amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
            title TEXT NOT NULL,
            description TEXT,
            occurred_on TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES expense_categories(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS budgets (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
            month INTEGER NOT NULL CHECK(month BETWEEN 1 AND 12),
            year INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, category_id, month, year),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES expense_categories(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS incomes_user_date ON incomes(user_id, occurred_on);
        CREATE INDEX IF NOT EXISTS expenses_user_date ON expenses(user_id, occurred_on);
        ",
    )?;
    seed_categories(conn)?;
    Ok(())
}

fn seed_categories(conn: &Connection) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO expense_categories (code) VALUES (?1)")?;
    for category in ExpenseCategory::ALL {
        stmt.execute(params![category.code()])?;
    }
    Ok(())
}

pub fn insert_user(conn: &Connection, username: &str, password_hash: &str, created_at: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        params![username, password_hash, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// True when `err` is a UNIQUE constraint failure, such as a taken username.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub fn user_credentials(conn: &Connection, username: &str) -> Result<Option<(i64, String)>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, password_hash
        FROM users
        WHERE username = ?1
        ",
    )?;
    let mut rows = stmt.query(params![username])?;
    if let Some(row) = rows.next()? {
        Ok(Some((row.get(0)?, row.get(1)?)))
    } else {
        Ok(None)
    }
}

pub fn create_session(conn: &Connection, user_id: i64, token: &str, created_at: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (user_id, token, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, token, created_at],
    )?;
    Ok(())
}

pub fn user_by_session(conn: &Connection, token: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "
        SELECT u.id, u.username
        FROM sessions s
        JOIN users u ON s.user_id = u.id
        WHERE s.token = ?1
        ",
    )?;
    let mut rows = stmt.query(params![token])?;
    if let Some(row) = rows.next()? {
        Ok(Some(User {
            id: row.get(0)?,
            username: row.get(1)?,
        }))
    } else {
        Ok(None)
    }
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

pub fn prune_sessions(conn: &Connection, user_id: i64, keep: i64) -> Result<()> {
    conn.execute(
        "
        DELETE FROM sessions
        WHERE user_id = ?1
          AND id NOT IN (
            SELECT id
            FROM sessions
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
          )
        ",
        params![user_id, keep],
    )?;
    Ok(())
}

pub fn category_id(conn: &Connection, category: ExpenseCategory) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM expense_categories WHERE code = ?1")?;
    let mut rows = stmt.query(params![category.code()])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row.get(0)?))
    } else {
        Ok(None)
    }
}

/// Removes a category row. Its budgets go with it; expenses keep existing
/// with no category. There is no route for this, categories are managed
/// directly in the database.
#[allow(dead_code)]
pub fn delete_category(conn: &Connection, category: ExpenseCategory) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM expense_categories WHERE code = ?1",
        params![category.code()],
    )?;
    Ok(changed > 0)
}

fn category_from_row(row: &Row<'_>, idx: usize) -> Result<Option<ExpenseCategory>> {
    let code: Option<String> = row.get(idx)?;
    Ok(code.as_deref().and_then(ExpenseCategory::from_code))
}

// SQLite treats a negative LIMIT as "no limit".
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map(|value| value as i64).unwrap_or(-1)
}

fn range_bounds(range: Option<DateRange>) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match range {
        Some(range) => (Some(range.start), Some(range.end)),
        None => (None, None),
    }
}

fn income_from_row(row: &Row<'_>) -> Result<IncomeRecord> {
    Ok(IncomeRecord {
        id: row.get(0)?,
        amount_cents: row.get(1)?,
        source: row.get(2)?,
        description: row.get(3)?,
        occurred_on: row.get(4)?,
    })
}

pub fn insert_income(conn: &Connection, user_id: i64, draft: &IncomeDraft) -> Result<i64> {
    let now = Utc::now();
    conn.execute(
        "
        INSERT INTO incomes (user_id, amount_cents, source, description, occurred_on, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        ",
        params![
            user_id,
            draft.amount_cents,
            draft.source,
            draft.description,
            draft.occurred_on,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_income(conn: &Connection, user_id: i64, income_id: i64) -> Result<Option<IncomeRecord>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, amount_cents, source, description, occurred_on
        FROM incomes
        WHERE id = ?1 AND user_id = ?2
        ",
    )?;
    let mut rows = stmt.query(params![income_id, user_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(income_from_row(row)?)),
        None => Ok(None),
    }
}

/// Returns false when the income does not exist or belongs to someone else.
pub fn update_income(conn: &Connection, user_id: i64, income_id: i64, draft: &IncomeDraft) -> Result<bool> {
    let changed = conn.execute(
        "
        UPDATE incomes
        SET amount_cents = ?1, source = ?2, description = ?3, occurred_on = ?4, updated_at = ?5
        WHERE id = ?6 AND user_id = ?7
        ",
        params![
            draft.amount_cents,
            draft.source,
            draft.description,
            draft.occurred_on,
            Utc::now(),
            income_id,
            user_id
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_income(conn: &Connection, user_id: i64, income_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM incomes WHERE id = ?1 AND user_id = ?2",
        params![income_id, user_id],
    )?;
    Ok(changed > 0)
}

pub fn list_incomes(
    conn: &Connection,
    user_id: i64,
    range: Option<DateRange>,
    limit: Option<usize>,
) -> Result<Vec<IncomeRecord>> {
    let (start, end) = range_bounds(range);
    let mut stmt = conn.prepare(
        "
        SELECT id, amount_cents, source, description, occurred_on
        FROM incomes
        WHERE user_id = ?1
          AND (?2 IS NULL OR occurred_on >= ?2)
          AND (?3 IS NULL OR occurred_on < ?3)
        ORDER BY occurred_on DESC, id DESC
        LIMIT ?4
        ",
    )?;
    let rows = stmt.query_map(params![user_id, start, end, sql_limit(limit)], income_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn income_total(conn: &Connection, user_id: i64, range: Option<DateRange>) -> Result<i64> {
    let (start, end) = range_bounds(range);
    conn.query_row(
        "
        SELECT COALESCE(SUM(amount_cents), 0)
        FROM incomes
        WHERE user_id = ?1
          AND (?2 IS NULL OR occurred_on >= ?2)
          AND (?3 IS NULL OR occurred_on < ?3)
        ",
        params![user_id, start, end],
        |row| row.get(0),
    )
}

fn expense_from_row(row: &Row<'_>) -> Result<ExpenseRecord> {
    Ok(ExpenseRecord {
        id: row.get(0)?,
        category: category_from_row(row, 1)?,
        amount_cents: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        occurred_on: row.get(5)?,
    })
}

/// The category must already be resolved to its row id by the caller.
/// Stores a new expense. The category is looked up by code; a code whose row
/// is gone leaves the expense uncategorized.
pub fn insert_expense(conn: &Connection, user_id: i64, draft: &ExpenseDraft) -> Result<i64> {
    let now = Utc::now();
    conn.execute(
        "
        INSERT INTO expenses (user_id, category_id, amount_cents, title, description, occurred_on, created_at, updated_at)
        VALUES (?1, (SELECT id FROM expense_categories WHERE code = ?2), ?3, ?4, ?5, ?6, ?7, ?7)
        ",
        params![
            user_id,
            draft.category.code(),
            draft.amount_cents,
            draft.title,
            draft.description,
            draft.occurred_on,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_expense(conn: &Connection, user_id: i64, expense_id: i64) -> Result<Option<ExpenseRecord>> {
    let mut stmt = conn.prepare(
        "
        SELECT e.id, c.code, e.amount_cents, e.title, e.description, e.occurred_on
        FROM expenses e
        LEFT JOIN expense_categories c ON e.category_id = c.id
        WHERE e.id = ?1 AND e.user_id = ?2
        ",
    )?;
    let mut rows = stmt.query(params![expense_id, user_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(expense_from_row(row)?)),
        None => Ok(None),
    }
}

pub fn update_expense(
    conn: &Connection,
    user_id: i64,
    expense_id: i64,
    draft: &ExpenseDraft,
) -> Result<bool> {
    let changed = conn.execute(
        "
        UPDATE expenses
        SET category_id = (SELECT id FROM expense_categories WHERE code = ?1), amount_cents = ?2, title = ?3, description = ?4, occurred_on = ?5, updated_at = ?6
        WHERE id = ?7 AND user_id = ?8
        ",
        params![
            draft.category.code(),
            draft.amount_cents,
            draft.title,
            draft.description,
            draft.occurred_on,
            Utc::now(),
            expense_id,
            user_id
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_expense(conn: &Connection, user_id: i64, expense_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM expenses WHERE id = ?1 AND user_id = ?2",
        params![expense_id, user_id],
    )?;
    Ok(changed > 0)
}

pub fn list_expenses(
    conn: &Connection,
    user_id: i64,
    range: Option<DateRange>,
    limit: Option<usize>,
) -> Result<Vec<ExpenseRecord>> {
    let (start, end) = range_bounds(range);
    let mut stmt = conn.prepare(
        "
        SELECT e.id, c.code, e.amount_cents, e.title, e.description, e.occurred_on
        FROM expenses e
        LEFT JOIN expense_categories c ON e.category_id = c.id
        WHERE e.user_id = ?1
          AND (?2 IS NULL OR e.occurred_on >= ?2)
          AND (?3 IS NULL OR e.occurred_on < ?3)
        ORDER BY e.occurred_on DESC, e.id DESC
        LIMIT ?4
        ",
    )?;
    let rows = stmt.query_map(params![user_id, start, end, sql_limit(limit)], expense_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn expense_total(conn: &Connection, user_id: i64, range: Option<DateRange>) -> Result<i64> {
    let (start, end) = range_bounds(range);
    conn.query_row(
        "
        SELECT COALESCE(SUM(amount_cents), 0)
        FROM expenses
        WHERE user_id = ?1
          AND (?2 IS NULL OR occurred_on >= ?2)
          AND (?3 IS NULL OR occurred_on < ?3)
        ",
        params![user_id, start, end],
        |row| row.get(0),
    )
}

/// Expense sums per category within the range, largest first. Uncategorized
/// expenses are grouped under `None`.
pub fn expense_totals_by_category(conn: &Connection, user_id: i64, range: DateRange) -> Result<Vec<CategoryTotal>> {
    let mut stmt = conn.prepare(
        "
        SELECT c.code, SUM(e.amount_cents) AS total_cents
        FROM expenses e
        LEFT JOIN expense_categories c ON e.category_id = c.id
        WHERE e.user_id = ?1 AND e.occurred_on >= ?2 AND e.occurred_on < ?3
        GROUP BY c.code
        ORDER BY total_cents DESC, c.code
        ",
    )?;
    let rows = stmt.query_map(params![user_id, range.start, range.end], |row| {
        Ok(CategoryTotal {
            category: category_from_row(row, 0)?,
            total_cents: row.get(1)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// `(month, income_cents, expense_cents)` for every month inside the range
/// that has at least one record. The range must not span more than a year.
pub fn monthly_totals(conn: &Connection, user_id: i64, range: DateRange) -> Result<Vec<(u32, i64, i64)>> {
    let mut stmt = conn.prepare(
        "
        SELECT month,
               COALESCE(SUM(CASE WHEN kind = 'income' THEN amount_cents END), 0) AS income_cents,
               COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount_cents END), 0) AS expense_cents
        FROM (
            SELECT CAST(substr(occurred_on, 6, 2) AS INTEGER) AS month, 'income' AS kind, amount_cents
            FROM incomes
            WHERE user_id = ?1 AND occurred_on >= ?2 AND occurred_on < ?3
            UNION ALL
            SELECT CAST(substr(occurred_on, 6, 2) AS INTEGER) AS month, 'expense' AS kind, amount_cents
            FROM expenses
            WHERE user_id = ?1 AND occurred_on >= ?2 AND occurred_on < ?3
        )
        GROUP BY month
        ORDER BY month
        ",
    )?;
    let rows = stmt.query_map(params![user_id, range.start, range.end], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn record_years(conn: &Connection, user_id: i64) -> Result<Vec<i32>> {
    let mut stmt = conn.prepare(
        "
        SELECT CAST(substr(occurred_on, 1, 4) AS INTEGER) AS year FROM incomes WHERE user_id = ?1
        UNION
        SELECT CAST(substr(occurred_on, 1, 4) AS INTEGER) AS year FROM expenses WHERE user_id = ?1
        ORDER BY year
        ",
    )?;
    let rows = stmt.query_map(params![user_id], |row| row.get(0))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Inserts the budget or replaces the amount of the existing one for the
/// same (user, category, month, year).
pub fn upsert_budget(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    month: u32,
    year: i32,
    amount_cents: i64,
) -> Result<()> {
    let now = Utc::now();
    conn.execute(
        "
        INSERT INTO budgets (user_id, category_id, amount_cents, month, year, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        ON CONFLICT(user_id, category_id, month, year)
        DO UPDATE SET amount_cents = excluded.amount_cents, updated_at = excluded.updated_at
        ",
        params![user_id, category_id, amount_cents, month, year, now],
    )?;
    Ok(())
}

pub fn list_budgets(conn: &Connection, user_id: i64, month: u32, year: i32, range: DateRange) -> Result<Vec<BudgetRecord>> {
    let mut stmt = conn.prepare(
        "
        SELECT b.id, c.code, b.amount_cents,
               COALESCE(SUM(e.amount_cents), 0) AS spent_cents
        FROM budgets b
        JOIN expense_categories c ON b.category_id = c.id
        LEFT JOIN expenses e
            ON e.category_id = b.category_id
           AND e.user_id = b.user_id
           AND e.occurred_on >= ?4
           AND e.occurred_on < ?5
        WHERE b.user_id = ?1 AND b.month = ?2 AND b.year = ?3
        GROUP BY b.id, c.code, b.amount_cents
        ORDER BY c.id
        ",
    )?;
    let rows = stmt.query_map(params![user_id, month, year, range.start, range.end], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            category_from_row(row, 1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, category, amount_cents, spent_cents) = row?;
        // Rows whose code is not in the enum cannot be produced by the app.
        if let Some(category) = category {
            out.push(BudgetRecord {
                id,
                category,
                amount_cents,
                spent_cents,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    pub(crate) fn add_user(conn: &Connection, username: &str) -> i64 {
        insert_user(conn, username, "hash", "2025-01-01T00:00:00Z").unwrap()
    }

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn add_income(conn: &Connection, user_id: i64, cents: i64, on: NaiveDate) -> i64 {
        let draft = IncomeDraft {
            amount_cents: cents,
            source: "Salary".to_string(),
            description: None,
            occurred_on: on,
        };
        insert_income(conn, user_id, &draft).unwrap()
    }

    pub(crate) fn add_expense(
        conn: &Connection,
        user_id: i64,
        category: ExpenseCategory,
        cents: i64,
        on: NaiveDate,
    ) -> i64 {
        let draft = ExpenseDraft {
            category,
            amount_cents: cents,
            title: format!("{} spending", category.display_name()),
            description: None,
            occurred_on: on,
        };
        insert_expense(conn, user_id, &draft).unwrap()
    }

    fn march_2025() -> DateRange {
        DateRange {
            start: date(2025, 3, 1),
            end: date(2025, 4, 1),
        }
    }

    #[test]
    fn migrations_are_idempotent_and_seed_categories() {
        let conn = memory_db();
        run_migrations(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM expense_categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 7);
    }

    #[test]
    fn totals_only_count_the_range_and_owner() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let bob = add_user(&conn, "bob");
        add_income(&conn, alice, 100_000, date(2025, 3, 2));
        add_income(&conn, alice, 50_050, date(2025, 3, 31));
        add_income(&conn, alice, 99_999, date(2025, 4, 1));
        add_income(&conn, bob, 12_345, date(2025, 3, 10));

        assert_eq!(income_total(&conn, alice, Some(march_2025())).unwrap(), 150_050);
        assert_eq!(income_total(&conn, alice, None).unwrap(), 250_049);
        assert_eq!(expense_total(&conn, alice, Some(march_2025())).unwrap(), 0);
    }

    #[test]
    fn lists_are_newest_first_and_limited() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let first = add_expense(&conn, alice, ExpenseCategory::Travel, 100, date(2025, 3, 1));
        let second = add_expense(&conn, alice, ExpenseCategory::Travel, 200, date(2025, 3, 9));
        let third = add_expense(&conn, alice, ExpenseCategory::Others, 300, date(2025, 3, 9));

        let all = list_expenses(&conn, alice, None, None).unwrap();
        let ids: Vec<i64> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![third, second, first]);

        let limited = list_expenses(&conn, alice, Some(march_2025()), Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn owner_checks_block_other_users() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let bob = add_user(&conn, "bob");
        let income = add_income(&conn, alice, 1_000, date(2025, 3, 1));
        let expense = add_expense(&conn, alice, ExpenseCategory::Clothing, 500, date(2025, 3, 1));

        assert!(get_income(&conn, bob, income).unwrap().is_none());
        assert!(get_expense(&conn, bob, expense).unwrap().is_none());
        assert!(!delete_income(&conn, bob, income).unwrap());
        assert!(!delete_expense(&conn, bob, expense).unwrap());

        let draft = IncomeDraft {
            amount_cents: 1,
            source: "stolen".to_string(),
            description: None,
            occurred_on: date(2025, 3, 1),
        };
        assert!(!update_income(&conn, bob, income, &draft).unwrap());
        assert_eq!(get_income(&conn, alice, income).unwrap().unwrap().amount_cents, 1_000);

        assert!(delete_expense(&conn, alice, expense).unwrap());
        assert!(list_expenses(&conn, alice, None, None).unwrap().is_empty());
        assert_eq!(expense_total(&conn, alice, None).unwrap(), 0);
    }

    #[test]
    fn update_expense_changes_editable_fields() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let expense = add_expense(&conn, alice, ExpenseCategory::Travel, 500, date(2025, 3, 1));
        let draft = ExpenseDraft {
            category: ExpenseCategory::BillsRent,
            amount_cents: 75_000,
            title: "Rent".to_string(),
            description: Some("March".to_string()),
            occurred_on: date(2025, 3, 5),
        };
        assert!(update_expense(&conn, alice, expense, &draft).unwrap());

        let stored = get_expense(&conn, alice, expense).unwrap().unwrap();
        assert_eq!(stored.category, Some(ExpenseCategory::BillsRent));
        assert_eq!(stored.amount_cents, 75_000);
        assert_eq!(stored.title, "Rent");
        assert_eq!(stored.description.as_deref(), Some("March"));
        assert_eq!(stored.occurred_on, date(2025, 3, 5));
    }

    #[test]
    fn category_totals_sort_descending_and_group_uncategorized() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        add_expense(&conn, alice, ExpenseCategory::Travel, 15_000, date(2025, 3, 3));
        add_expense(&conn, alice, ExpenseCategory::EatingOut, 2_000, date(2025, 3, 4));
        add_expense(&conn, alice, ExpenseCategory::EatingOut, 1_500, date(2025, 3, 5));
        add_expense(&conn, alice, ExpenseCategory::Others, 40_000, date(2025, 3, 6));
        delete_category(&conn, ExpenseCategory::Others).unwrap();

        let totals = expense_totals_by_category(&conn, alice, march_2025()).unwrap();
        assert_eq!(
            totals,
            vec![
                CategoryTotal { category: None, total_cents: 40_000 },
                CategoryTotal { category: Some(ExpenseCategory::Travel), total_cents: 15_000 },
                CategoryTotal { category: Some(ExpenseCategory::EatingOut), total_cents: 3_500 },
            ]
        );
    }

    #[test]
    fn deleting_a_category_drops_budgets_but_keeps_expenses() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let travel = category_id(&conn, ExpenseCategory::Travel).unwrap().unwrap();
        let expense = add_expense(&conn, alice, ExpenseCategory::Travel, 15_000, date(2025, 3, 3));
        upsert_budget(&conn, alice, travel, 3, 2025, 50_000).unwrap();

        assert!(delete_category(&conn, ExpenseCategory::Travel).unwrap());

        let stored = get_expense(&conn, alice, expense).unwrap().unwrap();
        assert_eq!(stored.category, None);
        assert_eq!(stored.label(), "Travel spending");
        let budgets: i64 = conn
            .query_row("SELECT COUNT(*) FROM budgets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(budgets, 0);
    }

    #[test]
    fn budget_upsert_keeps_one_row_per_month() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let travel = category_id(&conn, ExpenseCategory::Travel).unwrap().unwrap();
        upsert_budget(&conn, alice, travel, 3, 2025, 50_000).unwrap();
        upsert_budget(&conn, alice, travel, 3, 2025, 70_000).unwrap();
        upsert_budget(&conn, alice, travel, 4, 2025, 10_000).unwrap();
        add_expense(&conn, alice, ExpenseCategory::Travel, 15_000, date(2025, 3, 3));
        add_expense(&conn, alice, ExpenseCategory::Travel, 99_000, date(2025, 4, 3));

        let budgets = list_budgets(&conn, alice, 3, 2025, march_2025()).unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].amount_cents, 70_000);
        assert_eq!(budgets[0].spent_cents, 15_000);
    }

    #[test]
    fn record_years_merge_incomes_and_expenses() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        add_income(&conn, alice, 100, date(2023, 6, 1));
        add_expense(&conn, alice, ExpenseCategory::Travel, 100, date(2025, 1, 1));
        add_expense(&conn, alice, ExpenseCategory::Travel, 100, date(2023, 2, 1));
        assert_eq!(record_years(&conn, alice).unwrap(), vec![2023, 2025]);
    }

    #[test]
    fn sessions_are_pruned_to_newest() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        for idx in 0..4 {
            create_session(&conn, alice, &format!("token-{idx}"), &format!("2025-01-0{}T00:00:00Z", idx + 1))
                .unwrap();
        }
        prune_sessions(&conn, alice, 2).unwrap();
        assert!(user_by_session(&conn, "token-0").unwrap().is_none());
        assert!(user_by_session(&conn, "token-1").unwrap().is_none());
        assert_eq!(user_by_session(&conn, "token-3").unwrap().unwrap().username, "alice");
        delete_session(&conn, "token-3").unwrap();
        assert!(user_by_session(&conn, "token-3").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_a_unique_violation() {
        let conn = memory_db();
        add_user(&conn, "alice");
        let err = insert_user(&conn, "alice", "hash", "2025-01-02T00:00:00Z").unwrap_err();
        assert!(is_unique_violation(&err));

        let other = conn.execute("INSERT INTO incomes (user_id) VALUES (1)", []).unwrap_err();
        assert!(!is_unique_violation(&other));
        assert!(!is_unique_violation(&rusqlite::Error::QueryReturnedNoRows));
    }
}
