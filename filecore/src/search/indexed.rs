//! [`IndexedProvider`] — FTS5-backed search over a maintained content index,
//! per spec.md §4.I. The index itself (population, incremental updates on
//! [`crate::change_bus::ChangeEvent`]) is out of scope for this provider;
//! it only queries whatever `locate.db`-shaped database it's pointed at.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::location::Location;
use crate::search::engine::SearchProvider;
use crate::search::query::{Query, SearchHit};
use crate::task::Cancellable;

const BATCH_SIZE: usize = 100;
const SNIPPET_START: &str = "_NAUTILUS_SNIPPET_DELIM_START_";
const SNIPPET_END: &str = "_NAUTILUS_SNIPPET_DELIM_END_";

/// What [`IndexedProvider::index`] records for a freshly (re-)indexed
/// location. `content_type`/`modified`/`accessed`/`created` exist only to
/// let a search apply §3's mime-type and date-range predicates without
/// re-`stat`ing the file.
pub struct IndexEntry<'a> {
    pub name: &'a str,
    pub content_type: &'a str,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub created: Option<SystemTime>,
}

/// Opens (and lazily creates) an FTS5 virtual table over `path`. `name` is
/// the searched column; everything else is `UNINDEXED` — carried for
/// identity (`uri`, `parent_uri`) or post-filtering (`content_type` and the
/// `*_secs` timestamps), never matched against query text.
pub struct IndexedProvider {
    conn: Mutex<Connection>,
}

impl IndexedProvider {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        conn.execute_batch(
            "CREATE VIRTUAL TABLE IF NOT EXISTS documents USING fts5(
                uri UNINDEXED, name, content_type UNINDEXED, parent_uri UNINDEXED,
                modified_secs UNINDEXED, accessed_secs UNINDEXED, created_secs UNINDEXED
            );",
        )
        .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        Ok(IndexedProvider { conn: Mutex::new(conn) })
    }

    /// Replaces the indexed row for `location`, or removes it if `entry` is
    /// `None`. Called by the index maintainer in response to change-bus
    /// events; not used by the search path itself.
    pub fn index(&self, location: &Location, entry: Option<IndexEntry>) -> Result<()> {
        let uri = location.to_uri();
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM documents WHERE uri = ?1", [&uri]).map_err(sql_err)?;
        if let Some(entry) = entry {
            let parent_uri = location.parent().map(|p| p.to_uri()).unwrap_or_default();
            conn.execute(
                "INSERT INTO documents (uri, name, content_type, parent_uri, modified_secs, accessed_secs, created_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    uri,
                    entry.name,
                    entry.content_type,
                    parent_uri,
                    to_secs(entry.modified),
                    to_secs(entry.accessed),
                    to_secs(entry.created),
                ],
            )
            .map_err(sql_err)?;
        }
        Ok(())
    }
}

fn sql_err(e: rusqlite::Error) -> Error {
    Error::BackendUnavailable(e.to_string())
}

fn to_secs(t: Option<SystemTime>) -> Option<i64> {
    t.and_then(|t| t.duration_since(UNIX_EPOCH).ok()).map(|d| d.as_secs() as i64)
}

fn from_secs(secs: Option<i64>) -> Option<SystemTime> {
    secs.and_then(|s| u64::try_from(s).ok()).map(|s| UNIX_EPOCH + Duration::from_secs(s))
}

/// Escapes the raw, attacker-controlled (i.e. from filenames) snippet text
/// so substituting the delimiter sentinels for real markup can't also let a
/// filename smuggle its own tags into the rendered result.
fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Turns the raw `snippet()` output (bracketed by the sentinel strings) into
/// markup: escape everything else first, then substitute the sentinels for
/// `<b>`/`</b>` so they survive the escape pass unharmed.
fn render_snippet(raw: &str) -> String {
    raw.split(SNIPPET_START)
        .enumerate()
        .map(|(i, chunk)| {
            if i == 0 {
                escape_markup(chunk)
            } else {
                match chunk.split_once(SNIPPET_END) {
                    Some((hit, rest)) => format!("<b>{}</b>{}", escape_markup(hit), escape_markup(rest)),
                    None => escape_markup(chunk),
                }
            }
        })
        .collect()
}

/// Escapes `%`/`_`/`\` so a root URI can be used as a `LIKE ... ESCAPE '\'`
/// pattern without its own characters being read as wildcards.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

impl SearchProvider for IndexedProvider {
    fn name(&self) -> &'static str {
        "indexed"
    }

    fn search(&self, query: &Query, cancellable: &Cancellable, on_hit: &dyn Fn(Vec<SearchHit>)) -> Result<()> {
        if query.text.is_empty() {
            return Ok(());
        }
        let match_expr = query.text.iter().map(|t| format!("\"{}\"*", t.replace('"', ""))).collect::<Vec<_>>().join(" ");

        // §4.I's location scope: "direct parent equals root" when
        // non-recursive, "path begins with root/" when recursive. Bound as
        // a named placeholder rather than spliced into the statement text.
        let root_uri = query.root.as_ref().map(|root| Location::from_path(root).to_uri());
        let (location_sql, location_param) = match &root_uri {
            None => (String::new(), None),
            Some(root_uri) if query.recursive => {
                (" AND uri LIKE :root ESCAPE '\\'".to_string(), Some(format!("{}/%", escape_like(root_uri))))
            }
            Some(root_uri) => (" AND parent_uri = :root".to_string(), Some(root_uri.clone())),
        };

        let sql = format!(
            "SELECT uri, name, content_type, modified_secs, accessed_secs, created_secs, rank,
                    snippet(documents, 1, '{SNIPPET_START}', '{SNIPPET_END}', '...', 10)
             FROM documents WHERE documents MATCH :text{location_sql} ORDER BY rank"
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
        let mut rows = match &location_param {
            Some(param) => stmt.query(rusqlite::named_params! {":text": match_expr, ":root": param}).map_err(sql_err)?,
            None => stmt.query(rusqlite::named_params! {":text": match_expr}).map_err(sql_err)?,
        };

        let mut batch = Vec::with_capacity(BATCH_SIZE);
        while let Some(row) = rows.next().map_err(sql_err)? {
            cancellable.check()?;
            let uri: String = row.get(0).map_err(sql_err)?;
            let content_type: String = row.get(2).map_err(sql_err)?;
            let modified = from_secs(row.get(3).map_err(sql_err)?);
            let accessed = from_secs(row.get(4).map_err(sql_err)?);
            let created = from_secs(row.get(5).map_err(sql_err)?);
            let rank: f64 = row.get(6).map_err(sql_err)?;
            let raw_snippet: String = row.get(7).map_err(sql_err)?;

            if !query.matches_mime(&content_type) || !query.matches_date(modified, accessed, created) {
                continue;
            }
            batch.push(SearchHit {
                uri,
                // FTS5 rank is negative and smaller-is-better; flip and
                // normalize to the provider contract's "higher is better".
                fts_rank: -rank,
                snippet: Some(render_snippet(&raw_snippet)),
                modified,
                accessed,
                created,
            });
            if batch.len() >= BATCH_SIZE {
                on_hit(std::mem::take(&mut batch));
            }
        }
        if !batch.is_empty() {
            on_hit(batch);
        }
        Ok(())
    }
}

pub fn default_index_path(config: &crate::config::Config) -> PathBuf {
    config.search_index_path.clone().unwrap_or_else(|| {
        crate::config::Config::default_path()
            .and_then(|p| p.parent().map(|p| p.join("locate.db")))
            .unwrap_or_else(|| PathBuf::from("locate.db"))
    })
}
