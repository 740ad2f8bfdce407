//! Durable index of packed-object metadata, backed by an embedded SQLite
//! database (`packs.idx`).

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// One packed-object catalog row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedEntry {
    /// Which `packs/<pack_id>` file holds the bytes.
    pub pack_id: u64,
    /// Byte offset within the pack.
    pub offset: u64,
    /// Bytes stored in the pack (the encoded length, if compressed).
    pub length: u64,
    /// Original uncompressed size.
    pub size: u64,
    /// Whether the stored bytes are compressed.
    pub compressed: bool,
    /// Codec name, or empty if uncompressed.
    pub compression_name: String,
}

/// A row to insert, paired with its key.
#[derive(Clone, Debug)]
pub struct NewEntry {
    /// Primary key.
    pub hashkey: String,
    /// Packed location and codec metadata.
    pub entry: PackedEntry,
}

/// Durable catalog over `packs.idx`.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open (creating the schema if absent) the catalog at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS db_object (
                hashkey          TEXT PRIMARY KEY,
                pack_id          INTEGER NOT NULL,
                offset           INTEGER NOT NULL,
                length           INTEGER NOT NULL,
                size             INTEGER NOT NULL,
                compressed       INTEGER NOT NULL,
                compression_name TEXT NOT NULL DEFAULT ''
            )",
            [],
        )?;
        Ok(Catalog { conn })
    }

    /// Atomically insert a batch of rows. Conflicting primary keys (already
    /// packed) are silently ignored.
    pub fn insert_many(&mut self, rows: &[NewEntry]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO db_object
                    (hashkey, pack_id, offset, length, size, compressed, compression_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.hashkey,
                    row.entry.pack_id,
                    row.entry.offset,
                    row.entry.length,
                    row.entry.size,
                    row.entry.compressed as i64,
                    row.entry.compression_name,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Look up a single key.
    pub fn lookup(&self, hashkey: &str) -> Result<Option<PackedEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT pack_id, offset, length, size, compressed, compression_name
             FROM db_object WHERE hashkey = ?1",
        )?;
        let row = stmt
            .query_row(params![hashkey], Self::row_to_entry)
            .optional()?;
        Ok(row)
    }

    /// Look up many keys in a single query. Missing keys are absent from the
    /// result map.
    pub fn lookup_many(&self, hashkeys: &[String]) -> Result<HashMap<String, PackedEntry>> {
        let mut out = HashMap::with_capacity(hashkeys.len());
        if hashkeys.is_empty() {
            return Ok(out);
        }
        // rusqlite has no native array binding; build the IN-list placeholders
        // directly so the whole lookup is one query.
        let placeholders: Vec<String> = (1..=hashkeys.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT hashkey, pack_id, offset, length, size, compressed, compression_name
             FROM db_object WHERE hashkey IN ({})",
            placeholders.join(",")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params = rusqlite::params_from_iter(hashkeys.iter());
        let mut rows = stmt.query(params)?;
        while let Some(row) = rows.next()? {
            let hashkey: String = row.get(0)?;
            let entry = Self::row_to_entry(row)?;
            out.insert(hashkey, entry);
        }
        Ok(out)
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<PackedEntry> {
        // `lookup` selects 6 columns (indices 0..=5); `lookup_many` selects 7
        // (hashkey first), so fields are fetched by name to stay correct for
        // both call sites.
        Ok(PackedEntry {
            pack_id: row.get("pack_id")?,
            offset: row.get("offset")?,
            length: row.get("length")?,
            size: row.get("size")?,
            compressed: row.get::<_, i64>("compressed")? != 0,
            compression_name: row.get("compression_name")?,
        })
    }

    /// Total number of packed-object rows.
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM db_object", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// Sum of uncompressed `size` across every row.
    pub fn sum_size(&self) -> Result<u64> {
        let n: Option<i64> =
            self.conn.query_row("SELECT SUM(size) FROM db_object", [], |r| r.get(0))?;
        Ok(n.unwrap_or(0) as u64)
    }

    /// Largest `pack_id` referenced by any row, if any.
    pub fn max_pack_id(&self) -> Result<Option<u64>> {
        let n: Option<i64> =
            self.conn.query_row("SELECT MAX(pack_id) FROM db_object", [], |r| r.get(0))?;
        Ok(n.map(|v| v as u64))
    }

    /// High-water mark (`offset + length`) committed for `pack_id`, used by
    /// `PackWriter` to truncate dead tail bytes left by a crash between
    /// append and catalog commit.
    pub fn pack_high_water_mark(&self, pack_id: u64) -> Result<u64> {
        let n: Option<i64> = self.conn.query_row(
            "SELECT MAX(offset + length) FROM db_object WHERE pack_id = ?1",
            params![pack_id],
            |r| r.get(0),
        )?;
        Ok(n.unwrap_or(0) as u64)
    }

    /// Every distinct `pack_id` with at least one row, ascending.
    pub fn pack_ids(&self) -> Result<Vec<u64>> {
        let mut stmt =
            self.conn.prepare("SELECT DISTINCT pack_id FROM db_object ORDER BY pack_id")?;
        let ids = stmt
            .query_map([], |r| r.get::<_, i64>(0))?
            .map(|r| r.map(|v| v as u64))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// All hash keys currently catalogued.
    pub fn all_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT hashkey FROM db_object")?;
        let keys = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pack_id: u64, offset: u64, length: u64) -> PackedEntry {
        PackedEntry {
            pack_id,
            offset,
            length,
            size: length,
            compressed: false,
            compression_name: String::new(),
        }
    }

    #[test]
    fn insert_many_is_atomic_and_idempotent_on_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let mut cat = Catalog::open(&dir.path().join("packs.idx")).unwrap();
        let rows = vec![
            NewEntry { hashkey: "a".into(), entry: entry(0, 0, 10) },
            NewEntry { hashkey: "b".into(), entry: entry(0, 10, 10) },
        ];
        cat.insert_many(&rows).unwrap();
        assert_eq!(cat.count().unwrap(), 2);

        // Re-inserting "a" with different metadata is ignored (already packed).
        let dup = vec![NewEntry { hashkey: "a".into(), entry: entry(1, 0, 99) }];
        cat.insert_many(&dup).unwrap();
        assert_eq!(cat.lookup("a").unwrap().unwrap().pack_id, 0);
        assert_eq!(cat.count().unwrap(), 2);
    }

    #[test]
    fn lookup_many_single_query() {
        let dir = tempfile::tempdir().unwrap();
        let mut cat = Catalog::open(&dir.path().join("packs.idx")).unwrap();
        cat.insert_many(&[NewEntry { hashkey: "a".into(), entry: entry(0, 0, 5) }]).unwrap();
        let found = cat.lookup_many(&["a".into(), "missing".into()]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("a"));
    }

    #[test]
    fn aggregates() {
        let dir = tempfile::tempdir().unwrap();
        let mut cat = Catalog::open(&dir.path().join("packs.idx")).unwrap();
        cat.insert_many(&[
            NewEntry { hashkey: "a".into(), entry: entry(0, 0, 5) },
            NewEntry { hashkey: "b".into(), entry: entry(1, 0, 7) },
        ])
        .unwrap();
        assert_eq!(cat.sum_size().unwrap(), 12);
        assert_eq!(cat.max_pack_id().unwrap(), Some(1));
        assert_eq!(cat.pack_ids().unwrap(), vec![0, 1]);
    }
}
