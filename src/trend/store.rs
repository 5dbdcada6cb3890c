//! SQLite-backed rolling detection history.
//!
//! One row per distinct signal id. `recent_detections` holds the trailing
//! 7-day window as a JSON timestamp array; `total_count` is lifetime and
//! survives pruning. A naive load-mutate-save of the whole snapshot set
//! loses updates under concurrent requests, so every `record` runs as a
//! single transaction behind a process-wide writer mutex. Readers that only
//! need the latest alerts can be served from the last-good cache even while
//! the store is down.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::detect::Signal;
use crate::error::EngineError;
use crate::rules::Severity;

/// Detection history window, in days.
pub const TREND_WINDOW_DAYS: i64 = 7;

/// Persisted rolling history for one signal id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSnapshot {
    pub signal_id: String,
    pub title: String,
    pub severity: Severity,
    /// Lifetime detection count; not reduced by pruning.
    pub total_count: i64,
    /// Ascending timestamps within the trailing window.
    pub recent_detections: Vec<DateTime<Utc>>,
    pub last_detected_at: Option<DateTime<Utc>>,
}

impl TrendSnapshot {
    /// Detections within the `hours` trailing window, relative to `now`.
    pub fn detections_within(&self, now: DateTime<Utc>, hours: i64) -> usize {
        let floor = now - Duration::hours(hours);
        self.recent_detections
            .iter()
            .filter(|ts| **ts >= floor)
            .count()
    }
}

/// Single-writer trend persistence.
pub struct TrendStore {
    conn: Mutex<Connection>,
    /// Last successfully loaded snapshot set; served when the store errors.
    last_good: RwLock<Vec<TrendSnapshot>>,
}

impl TrendStore {
    /// Open (or create) the store at `~/.caseintel/trends.db`.
    pub fn open_default() -> Result<Self, EngineError> {
        Self::open(default_db_path()?)
    }

    /// Open a store at an explicit path. Useful for testing.
    pub fn open(path: PathBuf) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trend_snapshots (
                signal_id         TEXT PRIMARY KEY,
                title             TEXT NOT NULL,
                severity          TEXT NOT NULL,
                total_count       INTEGER NOT NULL DEFAULT 0,
                recent_detections TEXT NOT NULL DEFAULT '[]',
                last_detected_at  TEXT
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            last_good: RwLock::new(Vec::new()),
        })
    }

    /// Record one detection pass and return the full pruned snapshot set,
    /// sorted by lifetime count descending.
    ///
    /// Never fails the caller: on store errors this logs and falls back to
    /// the last successfully loaded set (or empty) so the request proceeds
    /// without trend alerts.
    pub fn record(&self, signals: &[Signal]) -> Vec<TrendSnapshot> {
        self.record_at(signals, Utc::now())
    }

    /// `record` with an explicit clock. Useful for testing window math.
    pub fn record_at(&self, signals: &[Signal], now: DateTime<Utc>) -> Vec<TrendSnapshot> {
        match self.try_record(signals, now) {
            Ok(snapshots) => {
                *self.last_good.write() = snapshots.clone();
                snapshots
            }
            Err(e) => {
                tracing::warn!(error = %e, "trend store unavailable; proceeding without trend update");
                self.last_good.read().clone()
            }
        }
    }

    /// Load the current snapshot set without recording. Stale timestamps are
    /// pruned from the returned view.
    pub fn load(&self) -> Vec<TrendSnapshot> {
        self.load_at(Utc::now())
    }

    /// `load` with an explicit clock. Useful for testing.
    pub fn load_at(&self, now: DateTime<Utc>) -> Vec<TrendSnapshot> {
        let conn = self.conn.lock();
        match read_all(&conn, now) {
            Ok(snapshots) => {
                *self.last_good.write() = snapshots.clone();
                snapshots
            }
            Err(e) => {
                tracing::warn!(error = %e, "trend store unavailable; serving last-good snapshots");
                self.last_good.read().clone()
            }
        }
    }

    fn try_record(
        &self,
        signals: &[Signal],
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendSnapshot>, EngineError> {
        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;

        let result = (|| -> Result<(), EngineError> {
            for signal in signals {
                upsert_detection(&conn, signal, now)?;
            }
            // Prune every row, not only the ones touched this pass.
            prune_all(&conn, now)?;
            Ok(())
        })();

        match result {
            Ok(()) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }

        read_all(&conn, now)
    }
}

fn default_db_path() -> Result<PathBuf, EngineError> {
    let home = dirs::home_dir()
        .ok_or_else(|| EngineError::Configuration("cannot resolve home directory".to_string()))?;
    Ok(home.join(".caseintel").join("trends.db"))
}

fn window_floor(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(TREND_WINDOW_DAYS)
}

fn upsert_detection(conn: &Connection, signal: &Signal, now: DateTime<Utc>) -> Result<(), EngineError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT recent_detections FROM trend_snapshots WHERE signal_id = ?1",
            params![signal.id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    let mut detections: Vec<DateTime<Utc>> = match existing.as_deref() {
        Some(json) => parse_detections(json),
        None => Vec::new(),
    };
    detections.push(now);
    detections.sort();

    let json = encode_detections(&detections);
    conn.execute(
        "INSERT INTO trend_snapshots
            (signal_id, title, severity, total_count, recent_detections, last_detected_at)
         VALUES (?1, ?2, ?3, 1, ?4, ?5)
         ON CONFLICT(signal_id) DO UPDATE SET
            title = excluded.title,
            severity = excluded.severity,
            total_count = total_count + 1,
            recent_detections = excluded.recent_detections,
            last_detected_at = excluded.last_detected_at",
        params![
            signal.id,
            signal.title,
            severity_to_str(signal.severity),
            json,
            now.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn prune_all(conn: &Connection, now: DateTime<Utc>) -> Result<(), EngineError> {
    let floor = window_floor(now);

    let rows: Vec<(String, String)> = {
        let mut stmt = conn.prepare("SELECT signal_id, recent_detections FROM trend_snapshots")?;
        let mapped = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        mapped.collect::<Result<_, _>>()?
    };

    for (signal_id, json) in rows {
        let detections = parse_detections(&json);
        let kept: Vec<DateTime<Utc>> = detections.into_iter().filter(|ts| *ts >= floor).collect();
        conn.execute(
            "UPDATE trend_snapshots SET recent_detections = ?1 WHERE signal_id = ?2",
            params![encode_detections(&kept), signal_id],
        )?;
    }
    Ok(())
}

fn read_all(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<TrendSnapshot>, EngineError> {
    let floor = window_floor(now);
    let mut stmt = conn.prepare(
        "SELECT signal_id, title, severity, total_count, recent_detections, last_detected_at
         FROM trend_snapshots
         ORDER BY total_count DESC, signal_id ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut snapshots = Vec::new();
    for row in rows {
        let (signal_id, title, severity, total_count, detections_json, last_detected) = row?;
        let recent_detections: Vec<DateTime<Utc>> = parse_detections(&detections_json)
            .into_iter()
            .filter(|ts| *ts >= floor)
            .collect();

        snapshots.push(TrendSnapshot {
            signal_id,
            title,
            severity: severity_from_str(&severity),
            total_count,
            recent_detections,
            last_detected_at: last_detected
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        });
    }
    Ok(snapshots)
}

fn parse_detections(json: &str) -> Vec<DateTime<Utc>> {
    let raw: Vec<String> = serde_json::from_str(json).unwrap_or_default();
    let mut out: Vec<DateTime<Utc>> = raw
        .iter()
        .filter_map(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .collect();
    out.sort();
    out
}

fn encode_detections(detections: &[DateTime<Utc>]) -> String {
    let raw: Vec<String> = detections.iter().map(|ts| ts.to_rfc3339()).collect();
    serde_json::to_string(&raw).unwrap_or_else(|_| "[]".to_string())
}

fn severity_to_str(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "high",
        Severity::Medium => "medium",
        Severity::Low => "low",
    }
}

fn severity_from_str(s: &str) -> Severity {
    match s {
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> TrendStore {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("trends.db");
        std::mem::forget(dir);
        TrendStore::open(path).expect("open")
    }

    fn signal(id: &str, severity: Severity) -> Signal {
        Signal {
            id: id.to_string(),
            title: id.replace('-', " "),
            severity,
            confidence: 0.55,
            evidence: "matched test".to_string(),
            guidance: String::new(),
        }
    }

    #[test]
    fn test_record_creates_snapshot() {
        let store = test_store();
        let snapshots = store.record(&[signal("violence-threat", Severity::High)]);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].signal_id, "violence-threat");
        assert_eq!(snapshots[0].total_count, 1);
        assert_eq!(snapshots[0].recent_detections.len(), 1);
        assert!(snapshots[0].last_detected_at.is_some());
    }

    #[test]
    fn test_repeat_detection_increments() {
        let store = test_store();
        let sig = signal("legal-deadline", Severity::High);
        store.record(&[sig.clone()]);
        store.record(&[sig.clone()]);
        let snapshots = store.record(&[sig]);
        assert_eq!(snapshots[0].total_count, 3);
        assert_eq!(snapshots[0].recent_detections.len(), 3);
    }

    #[test]
    fn test_sorted_by_total_count_desc() {
        let store = test_store();
        let frequent = signal("frequent", Severity::Medium);
        let rare = signal("rare", Severity::Low);
        store.record(&[frequent.clone(), rare]);
        store.record(&[frequent.clone()]);
        let snapshots = store.record(&[frequent]);
        assert_eq!(snapshots[0].signal_id, "frequent");
        assert_eq!(snapshots[0].total_count, 3);
        assert_eq!(snapshots[1].signal_id, "rare");
    }

    #[test]
    fn test_prune_drops_stale_keeps_lifetime_count() {
        let store = test_store();
        let sig = signal("privacy-exposure", Severity::Medium);
        let old = Utc::now() - Duration::days(10);
        store.record_at(&[sig.clone()], old);

        // Recording with zero signals prunes every row without counting.
        let snapshots = store.record(&[]);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].total_count, 1, "lifetime count survives pruning");
        assert!(snapshots[0].recent_detections.is_empty());
    }

    #[test]
    fn test_no_stale_timestamps_after_any_operation() {
        let store = test_store();
        let sig = signal("stalking-pattern", Severity::High);
        let now = Utc::now();
        store.record_at(&[sig.clone()], now - Duration::days(9));
        store.record_at(&[sig.clone()], now - Duration::days(2));
        let snapshots = store.record_at(&[sig], now);

        let floor = now - Duration::days(TREND_WINDOW_DAYS);
        for snapshot in &snapshots {
            assert!(snapshot.recent_detections.iter().all(|ts| *ts >= floor));
        }
        assert_eq!(snapshots[0].total_count, 3);
        assert_eq!(snapshots[0].recent_detections.len(), 2);
    }

    #[test]
    fn test_detections_sorted_ascending() {
        let store = test_store();
        let sig = signal("financial-fraud", Severity::Medium);
        let now = Utc::now();
        store.record_at(&[sig.clone()], now - Duration::hours(3));
        store.record_at(&[sig.clone()], now - Duration::hours(1));
        let snapshots = store.record_at(&[sig], now - Duration::hours(2));

        let detections = &snapshots[0].recent_detections;
        assert!(detections.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_load_matches_record_output() {
        let store = test_store();
        let sig = signal("missing-contact", Severity::Medium);
        store.record(&[sig]);
        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].signal_id, "missing-contact");
    }

    #[test]
    fn test_detections_within_window_helper() {
        let now = Utc::now();
        let snapshot = TrendSnapshot {
            signal_id: "x".to_string(),
            title: "x".to_string(),
            severity: Severity::Low,
            total_count: 3,
            recent_detections: vec![
                now - Duration::days(3),
                now - Duration::hours(20),
                now - Duration::hours(1),
            ],
            last_detected_at: Some(now - Duration::hours(1)),
        };
        assert_eq!(snapshot.detections_within(now, 24), 2);
        assert_eq!(snapshot.detections_within(now, 24 * 7), 3);
    }
}
