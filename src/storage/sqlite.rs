use crate::model::{RawPricePoint, StorageError};
use rusqlite::{Connection, Row, Transaction, params};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// SQLite cache of raw price histories, one row per input point.
///
/// Rows keep their input order (`seq`) so the normalizer sees them exactly as
/// the source delivered them.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database and runs migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    fn migrate(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS price_points (
                stock_name TEXT NOT NULL,
                seq INTEGER NOT NULL,
                date TEXT NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                volume REAL,
                PRIMARY KEY (stock_name, seq)
            );

            CREATE INDEX IF NOT EXISTS idx_price_points_date
                ON price_points (stock_name, date);
            ",
        )?;
        Ok(())
    }

    /// Replaces the cached history of one security in a single transaction
    pub fn replace_points(&mut self, stock_name: &str, points: &[RawPricePoint]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::write_history(&tx, stock_name, points)?;
        tx.commit()?;
        debug!("Cached {} points for {}", points.len(), stock_name);
        Ok(())
    }

    /// Stores every history of an export atomically; on error the previous cache is untouched
    pub fn replace_all(&mut self, histories: &BTreeMap<String, Vec<RawPricePoint>>) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for (stock_name, points) in histories {
            Self::write_history(&tx, stock_name, points)?;
        }
        tx.commit()?;
        debug!("Cached histories for {} securities", histories.len());
        Ok(())
    }

    fn write_history(tx: &Transaction, stock_name: &str, points: &[RawPricePoint]) -> Result<(), StorageError> {
        tx.execute("DELETE FROM price_points WHERE stock_name = ?1", params![stock_name])?;
        let mut stmt = tx.prepare_cached(
            "INSERT INTO price_points (stock_name, seq, date, open, high, low, close, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (seq, p) in points.iter().enumerate() {
            stmt.execute(params![
                stock_name,
                seq as i64,
                &p.date,
                non_nan(p.open),
                non_nan(p.high),
                non_nan(p.low),
                non_nan(p.close),
                non_nan(p.volume),
            ])?;
        }
        Ok(())
    }

    /// Distinct security names, sorted
    pub fn list_securities(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT stock_name FROM price_points ORDER BY stock_name ASC")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()?;
        Ok(names)
    }

    /// Loads one security's history in input order
    pub fn load_points(&self, stock_name: &str) -> Result<Vec<RawPricePoint>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, open, high, low, close, volume
             FROM price_points WHERE stock_name = ?1 ORDER BY seq ASC",
        )?;
        let points: Vec<RawPricePoint> = stmt
            .query_map(params![stock_name], Self::map_point)?
            .collect::<Result<_, _>>()?;
        Ok(points)
    }

    pub fn count_points(&self, stock_name: &str) -> Result<usize, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM price_points WHERE stock_name = ?1",
            params![stock_name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn map_point(row: &Row) -> Result<RawPricePoint, rusqlite::Error> {
        Ok(RawPricePoint {
            date: row.get(0)?,
            open: row.get(1)?,
            high: row.get(2)?,
            low: row.get(3)?,
            close: row.get(4)?,
            volume: row.get(5)?,
        })
    }
}

// SQLite stores NaN as NULL; make that explicit so reads round-trip to None
fn non_nan(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(date: &str, low: Option<f64>) -> RawPricePoint {
        RawPricePoint {
            date: date.to_string(),
            open: Some(10.0),
            high: Some(11.0),
            low,
            close: Some(10.5),
            volume: None,
        }
    }

    fn storage() -> (tempfile::TempDir, SqliteStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(dir.path().join("prices.db")).unwrap();
        (dir, storage)
    }

    #[test]
    fn round_trips_points_in_input_order() {
        let (_dir, mut storage) = storage();
        let points = vec![point("2024-01-03", Some(9.0)), point("2024-01-01", None)];
        storage.replace_points("ABB", &points).unwrap();

        assert_eq!(storage.load_points("ABB").unwrap(), points);
        assert_eq!(storage.count_points("ABB").unwrap(), 2);
        assert!(storage.load_points("UNKNOWN").unwrap().is_empty());
    }

    #[test]
    fn replace_overwrites_previous_history() {
        let (_dir, mut storage) = storage();
        storage
            .replace_points("ABB", &[point("2024-01-01", Some(9.0)), point("2024-01-02", Some(9.0))])
            .unwrap();
        storage.replace_points("ABB", &[point("2024-02-01", Some(8.0))]).unwrap();

        let loaded = storage.load_points("ABB").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].date, "2024-02-01");
    }

    #[test]
    fn lists_securities_sorted() {
        let (_dir, mut storage) = storage();
        let mut histories = BTreeMap::new();
        histories.insert("Volvo B".to_string(), vec![point("2024-01-01", Some(1.0))]);
        histories.insert("ABB".to_string(), vec![point("2024-01-01", Some(1.0))]);
        storage.replace_all(&histories).unwrap();

        assert_eq!(storage.list_securities().unwrap(), vec!["ABB", "Volvo B"]);
    }

    #[test]
    fn reopening_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.db");
        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.replace_points("ABB", &[point("2024-01-01", Some(9.0))]).unwrap();
        }
        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.count_points("ABB").unwrap(), 1);
    }

    #[test]
    fn failed_export_leaves_previous_cache_intact() {
        let (_dir, mut storage) = storage();
        let old = vec![point("2024-01-01", Some(9.0)), point("2024-01-02", Some(8.5))];
        storage.replace_points("ABB", &old).unwrap();

        storage
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_zzz BEFORE INSERT ON price_points
                 WHEN NEW.stock_name = 'ZZZ'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        // ABB sorts first, so its new rows are written before ZZZ fails
        let mut histories = BTreeMap::new();
        histories.insert("ABB".to_string(), vec![point("2024-03-01", Some(7.0))]);
        histories.insert("ZZZ".to_string(), vec![point("2024-03-01", Some(1.0))]);
        assert!(storage.replace_all(&histories).is_err());

        assert_eq!(storage.load_points("ABB").unwrap(), old);
        assert_eq!(storage.count_points("ZZZ").unwrap(), 0);
    }
}
