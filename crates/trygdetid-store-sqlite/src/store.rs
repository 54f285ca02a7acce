//! [`SqliteStore`], the SQLite implementation of [`TrygdetidStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use trygdetid_core::{record::InsuranceTimeRecord, store::TrygdetidStore};

use crate::{
  encode::{PeriodRow, RecordRow, encode_uuid},
  schema::SCHEMA,
  Error, Result,
};

const RECORD_COLUMNS: &str = "record_id, case_id, ident, created_at, \
   occupational_injury, nordic_convention, point_year_override, \
   result_override, computed_result, facts";

const PERIOD_COLUMNS: &str = "period_id, kind, country, from_date, to_date, \
   counts_at_period_start, counts_at_period_end, is_prorated, \
   computed_duration, justification, source";

fn record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
  Ok(RecordRow {
    record_id:           row.get(0)?,
    case_id:             row.get(1)?,
    ident:               row.get(2)?,
    created_at:          row.get(3)?,
    occupational_injury: row.get(4)?,
    nordic_convention:   row.get(5)?,
    point_year_override: row.get(6)?,
    result_override:     row.get(7)?,
    computed_result:     row.get(8)?,
    facts:               row.get(9)?,
  })
}

fn period_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PeriodRow> {
  Ok(PeriodRow {
    period_id:              row.get(0)?,
    kind:                   row.get(1)?,
    country:                row.get(2)?,
    from_date:              row.get(3)?,
    to_date:                row.get(4)?,
    counts_at_period_start: row.get(5)?,
    counts_at_period_end:   row.get(6)?,
    is_prorated:            row.get(7)?,
    computed_duration:      row.get(8)?,
    justification:          row.get(9)?,
    source:                 row.get(10)?,
  })
}

fn load_periods(
  conn: &rusqlite::Connection,
  record_id: &str,
) -> rusqlite::Result<Vec<PeriodRow>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PERIOD_COLUMNS} FROM trygdetid_period
     WHERE record_id = ?1 ORDER BY position"
  ))?;
  stmt
    .query_map(rusqlite::params![record_id], period_row)?
    .collect()
}

fn write_periods(
  conn: &rusqlite::Connection,
  record_id: &str,
  periods: &[PeriodRow],
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO trygdetid_period (
       period_id, record_id, position, kind, country, from_date, to_date,
       counts_at_period_start, counts_at_period_end, is_prorated,
       computed_duration, justification, source
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
  )?;
  for (position, p) in periods.iter().enumerate() {
    stmt.execute(rusqlite::params![
      p.period_id,
      record_id,
      position as i64,
      p.kind,
      p.country,
      p.from_date,
      p.to_date,
      p.counts_at_period_start,
      p.counts_at_period_end,
      p.is_prorated,
      p.computed_duration,
      p.justification,
      p.source,
    ])?;
  }
  Ok(())
}

fn decode_all(rows: Vec<(RecordRow, Vec<PeriodRow>)>) -> Result<Vec<InsuranceTimeRecord>> {
  rows
    .into_iter()
    .map(|(record, periods)| record.decode(periods))
    .collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A trygdetid store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Load every record matching `filter`, a `WHERE` clause over the
  /// `trygdetid` table whose positional parameters are bound from `params`.
  async fn select(
    &self,
    filter: &'static str,
    params: Vec<String>,
  ) -> Result<Vec<InsuranceTimeRecord>> {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS} FROM trygdetid WHERE {filter}
           ORDER BY created_at, record_id"
        ))?;
        let records = stmt
          .query_map(rusqlite::params_from_iter(params), record_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(records.len());
        for record in records {
          let periods = load_periods(conn, &record.record_id)?;
          out.push((record, periods));
        }
        Ok(out)
      })
      .await?;

    decode_all(rows)
  }
}

// ─── TrygdetidStore impl ─────────────────────────────────────────────────────

impl TrygdetidStore for SqliteStore {
  type Error = Error;

  async fn insert(&self, record: InsuranceTimeRecord) -> Result<()> {
    let (row, periods) = RecordRow::encode(&record)?;

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM trygdetid WHERE case_id = ?1 AND ident = ?2",
            rusqlite::params![row.case_id, row.ident],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if exists {
          return Ok(false);
        }

        tx.execute(
          &format!(
            "INSERT INTO trygdetid ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
          ),
          rusqlite::params![
            row.record_id,
            row.case_id,
            row.ident,
            row.created_at,
            row.occupational_injury,
            row.nordic_convention,
            row.point_year_override,
            row.result_override,
            row.computed_result,
            row.facts,
          ],
        )?;
        write_periods(&tx, &row.record_id, &periods)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::RecordExists { case_id: record.case_id, ident: record.ident });
    }
    debug!(record_id = %record.id, case_id = %record.case_id, "inserted trygdetid");
    Ok(())
  }

  async fn update(&self, record: InsuranceTimeRecord) -> Result<()> {
    let (row, periods) = RecordRow::encode(&record)?;

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE trygdetid SET
             occupational_injury = ?2,
             nordic_convention   = ?3,
             point_year_override = ?4,
             result_override     = ?5,
             computed_result     = ?6,
             facts               = ?7
           WHERE record_id = ?1",
          rusqlite::params![
            row.record_id,
            row.occupational_injury,
            row.nordic_convention,
            row.point_year_override,
            row.result_override,
            row.computed_result,
            row.facts,
          ],
        )?;
        if changed == 0 {
          return Ok(false);
        }

        tx.execute(
          "DELETE FROM trygdetid_period WHERE record_id = ?1",
          rusqlite::params![row.record_id],
        )?;
        write_periods(&tx, &row.record_id, &periods)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !updated {
      return Err(Error::RecordNotFound(record.id));
    }
    debug!(record_id = %record.id, periods = record.periods.len(), "updated trygdetid");
    Ok(())
  }

  async fn get(&self, id: Uuid) -> Result<Option<InsuranceTimeRecord>> {
    Ok(self.select("record_id = ?1", vec![encode_uuid(id)]).await?.pop())
  }

  async fn find(&self, case_id: Uuid, ident: &str) -> Result<Option<InsuranceTimeRecord>> {
    Ok(
      self
        .select("case_id = ?1 AND ident = ?2", vec![
          encode_uuid(case_id),
          ident.to_owned(),
        ])
        .await?
        .pop(),
    )
  }

  async fn list_for_case(&self, case_id: Uuid) -> Result<Vec<InsuranceTimeRecord>> {
    self.select("case_id = ?1", vec![encode_uuid(case_id)]).await
  }

  async fn delete_case(&self, case_id: Uuid) -> Result<usize> {
    let case_id_str = encode_uuid(case_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM trygdetid WHERE case_id = ?1",
          rusqlite::params![case_id_str],
        )?)
      })
      .await?;

    debug!(%case_id, removed, "deleted trygdetid for case");
    Ok(removed)
  }
}
