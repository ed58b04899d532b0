//! SQLite storage for harvested declarations.
//!
//! Writes go through one transaction per chunk. The upsert keeps the latest
//! observed state per case number, except that a null incoming field never
//! clears a stored value: `deadline`, `declare_date`, and `budget` update
//! through `COALESCE(excluded.col, ...)`. That mirrors the source system's
//! behavior of skipping null columns in the duplicate-key update; whether a
//! budget that disappears from the portal should really survive here is
//! pending product confirmation.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use crate::extract::Declaration;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    /// The database could not be opened. Fatal.
    #[error("cannot open database: {0}")]
    Open(rusqlite::Error),
    /// The schema could not be applied. Fatal.
    #[error("cannot apply schema: {0}")]
    Schema(rusqlite::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub struct Db {
    conn: Connection,
}

/// Outcome of one chunk's write transaction. Constraint failures are
/// collected per record so the driver can report them without losing the
/// rest of the batch.
#[derive(Debug, Default)]
pub struct ChunkWriteReport {
    pub written: usize,
    pub failed: Vec<(String, rusqlite::Error)>,
}

/// A declaration as stored, read back for the notification digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDeclaration {
    pub id: String,
    pub org_name: String,
    pub subject: String,
    pub method: String,
    pub category: String,
    pub declare_date: Option<String>,
    pub deadline: Option<String>,
    pub budget: Option<i64>,
    pub url: String,
}

/// Read filter for the notification digest query.
#[derive(Debug, Default)]
pub struct NotifyFilter<'a> {
    pub start_date: NaiveDate,
    pub org_keywords: &'a [String],
    pub subject_keywords: &'a [String],
    pub min_budget: Option<i64>,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path).map_err(DbError::Open)?;
        Self::configure(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().map_err(DbError::Open)?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(DbError::Open)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<(), DbError> {
        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema).map_err(DbError::Schema)
    }

    /// Upserts one chunk's records in a single transaction (the chunk is the
    /// consistency boundary). A record rejected by the store is reported and
    /// skipped; the rest of the batch still commits.
    pub fn upsert_declarations(
        &mut self,
        records: &[Declaration],
    ) -> Result<ChunkWriteReport, DbError> {
        let tx = self.conn.transaction()?;
        let mut report = ChunkWriteReport::default();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO declaration_notify (
                   id, org_name, subject, method, category,
                   declare_date, deadline, budget, url
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                   org_name = excluded.org_name,
                   subject = excluded.subject,
                   method = excluded.method,
                   category = excluded.category,
                   declare_date = COALESCE(excluded.declare_date, declaration_notify.declare_date),
                   deadline = COALESCE(excluded.deadline, declaration_notify.deadline),
                   budget = COALESCE(excluded.budget, declaration_notify.budget),
                   url = excluded.url",
            )?;
            for record in records {
                let declare_date = record.declare_date.map(|i| i.to_sql_string());
                let deadline = record.deadline.map(|i| i.to_sql_string());
                let result = stmt.execute(params![
                    record.id,
                    record.org_name,
                    record.subject,
                    record.method,
                    record.category,
                    declare_date,
                    deadline,
                    record.budget,
                    record.url,
                ]);
                match result {
                    Ok(_) => report.written += 1,
                    Err(err) => {
                        tracing::warn!(id = %record.id, %err, "declaration rejected by store");
                        report.failed.push((record.id.clone(), err));
                    }
                }
            }
        }
        tx.commit()?;
        Ok(report)
    }

    pub fn declaration_count(&self) -> Result<i64, DbError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM declaration_notify", [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// Declarations matching a subscriber's filter: declared on or after the
    /// start date, optionally OR-matched against organization/subject
    /// keywords, optionally above a budget floor (rows without a budget
    /// always pass the floor). Ordered by budget, largest first.
    pub fn select_matching(
        &self,
        filter: &NotifyFilter<'_>,
    ) -> Result<Vec<StoredDeclaration>, DbError> {
        let mut sql = String::from(
            "SELECT id, org_name, subject, method, category,
                    declare_date, deadline, budget, url
             FROM declaration_notify
             WHERE declare_date >= ?",
        );
        let mut values: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(filter.start_date.format("%Y-%m-%d").to_string())];

        let mut keyword_terms = Vec::new();
        for keyword in filter.org_keywords {
            keyword_terms.push("org_name LIKE ?");
            values.push(Box::new(format!("%{}%", keyword)));
        }
        for keyword in filter.subject_keywords {
            keyword_terms.push("subject LIKE ?");
            values.push(Box::new(format!("%{}%", keyword)));
        }
        if !keyword_terms.is_empty() {
            sql.push_str(" AND (");
            sql.push_str(&keyword_terms.join(" OR "));
            sql.push(')');
        }

        if let Some(min_budget) = filter.min_budget {
            sql.push_str(" AND (budget IS NULL OR budget >= ?)");
            values.push(Box::new(min_budget));
        }

        sql.push_str(" ORDER BY budget DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
            Ok(StoredDeclaration {
                id: row.get(0)?,
                org_name: row.get(1)?,
                subject: row.get(2)?,
                method: row.get(3)?,
                category: row.get(4)?,
                declare_date: row.get(5)?,
                deadline: row.get(6)?,
                budget: row.get(7)?,
                url: row.get(8)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::RocInstant;

    fn test_db() -> Db {
        let db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn declaration(id: &str, budget: Option<i64>) -> Declaration {
        Declaration {
            id: id.to_string(),
            org_name: "機關甲".to_string(),
            subject: format!("{} 測試案", id),
            method: "公開招標".to_string(),
            category: "工程".to_string(),
            declare_date: NaiveDate::from_ymd_opt(2024, 5, 20).map(RocInstant::Date),
            deadline: NaiveDate::from_ymd_opt(2024, 6, 3).map(RocInstant::Date),
            budget,
            url: "http://web.pcc.gov.tw/tps/pss/tpam/main.do?pkid=1".to_string(),
        }
    }

    fn get(db: &Db, id: &str) -> StoredDeclaration {
        let filter = NotifyFilter {
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            ..Default::default()
        };
        db.select_matching(&filter)
            .unwrap()
            .into_iter()
            .find(|row| row.id == id)
            .unwrap()
    }

    #[test]
    fn insert_then_read_back() {
        let mut db = test_db();
        let report = db.upsert_declarations(&[declaration("113A0001", Some(500))]).unwrap();
        assert_eq!(report.written, 1);
        assert!(report.failed.is_empty());

        let row = get(&db, "113A0001");
        assert_eq!(row.org_name, "機關甲");
        assert_eq!(row.declare_date.as_deref(), Some("2024-05-20"));
        assert_eq!(row.budget, Some(500));
    }

    #[test]
    fn second_upsert_overwrites_not_duplicates() {
        let mut db = test_db();
        db.upsert_declarations(&[declaration("113A0001", Some(500))]).unwrap();

        let mut updated = declaration("113A0001", Some(900));
        updated.org_name = "機關乙".to_string();
        db.upsert_declarations(&[updated]).unwrap();

        assert_eq!(db.declaration_count().unwrap(), 1);
        let row = get(&db, "113A0001");
        assert_eq!(row.budget, Some(900));
        assert_eq!(row.org_name, "機關乙");
    }

    #[test]
    fn null_budget_does_not_clear_stored_value() {
        let mut db = test_db();
        db.upsert_declarations(&[declaration("113A0001", Some(500))]).unwrap();
        db.upsert_declarations(&[declaration("113A0001", None)]).unwrap();

        assert_eq!(get(&db, "113A0001").budget, Some(500));
    }

    #[test]
    fn null_deadline_does_not_clear_stored_value() {
        let mut db = test_db();
        db.upsert_declarations(&[declaration("113A0001", Some(500))]).unwrap();

        let mut updated = declaration("113A0001", Some(500));
        updated.deadline = None;
        db.upsert_declarations(&[updated]).unwrap();

        assert_eq!(get(&db, "113A0001").deadline.as_deref(), Some("2024-06-03"));
    }

    #[test]
    fn select_filters_by_start_date() {
        let mut db = test_db();
        let mut old = declaration("112Z9999", Some(100));
        old.declare_date = NaiveDate::from_ymd_opt(2023, 1, 1).map(RocInstant::Date);
        db.upsert_declarations(&[old, declaration("113A0001", Some(500))]).unwrap();

        let filter = NotifyFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ..Default::default()
        };
        let rows = db.select_matching(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "113A0001");
    }

    #[test]
    fn select_keyword_groups_are_or_matched() {
        let mut db = test_db();
        let mut a = declaration("113A0001", Some(100));
        a.org_name = "衛生福利部".to_string();
        let mut b = declaration("113B0002", Some(200));
        b.subject = "113B0002 資安 監控".to_string();
        let c = declaration("113C0003", Some(300));
        db.upsert_declarations(&[a, b, c]).unwrap();

        let orgs = vec!["衛生".to_string()];
        let subjects = vec!["資安".to_string()];
        let filter = NotifyFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            org_keywords: &orgs,
            subject_keywords: &subjects,
            ..Default::default()
        };
        let mut ids: Vec<_> = db
            .select_matching(&filter)
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["113A0001", "113B0002"]);
    }

    #[test]
    fn select_orders_by_budget_descending_nulls_last() {
        let mut db = test_db();
        db.upsert_declarations(&[
            declaration("113A0001", Some(100)),
            declaration("113B0002", None),
            declaration("113C0003", Some(900)),
        ])
        .unwrap();

        let filter = NotifyFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ..Default::default()
        };
        let ids: Vec<_> = db
            .select_matching(&filter)
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, vec!["113C0003", "113A0001", "113B0002"]);
    }

    #[test]
    fn budget_floor_keeps_unpriced_rows() {
        let mut db = test_db();
        db.upsert_declarations(&[
            declaration("113A0001", Some(100)),
            declaration("113B0002", None),
            declaration("113C0003", Some(900)),
        ])
        .unwrap();

        let filter = NotifyFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            min_budget: Some(500),
            ..Default::default()
        };
        let ids: Vec<_> = db
            .select_matching(&filter)
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, vec!["113C0003", "113B0002"]);
    }
}
