//! Single-writer operation queue fronting the SQLite connection
//!
//! A `rusqlite::Connection` is `!Sync`, and SQLite itself serializes writes
//! from one connection, so exactly one dedicated OS thread owns it. Callers
//! on arbitrary Tokio tasks submit [`Operation`]s over a [`std::sync::mpsc`]
//! channel and await a [`tokio::sync::oneshot`] for the result; the worker
//! never touches a Tokio runtime.

use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use chrono::Utc;
use duracache_core::{ticks_from_datetime, ticks_to_datetime, CacheElement, CacheError, Result};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

use super::schema;

/// Maximum number of operations drained into a single batch pass.
const MAX_BATCH: usize = 64;

/// What a queued operation asked the worker to do.
pub enum OperationKind {
    BulkInsert(Vec<CacheElement>),
    BulkSelect(Vec<String>),
    BulkSelectByType(String),
    BulkInvalidate(Vec<String>),
    BulkInvalidateByType(String),
    InvalidateAll,
    GetAllKeys,
    GetCreatedAt(String),
    Vacuum,
    Flush,
    /// Internal poison pill: stop the worker loop after this pass.
    Shutdown,
}

/// What a completed operation hands back to its caller.
pub enum OperationOutcome {
    Unit,
    Elements(Vec<CacheElement>),
    Keys(Vec<String>),
    CreatedAt(Option<chrono::DateTime<Utc>>),
}

struct Operation {
    kind: OperationKind,
    completion: oneshot::Sender<Result<OperationOutcome>>,
}

/// Handle to the writer thread. Cloning shares the same underlying thread
/// and connection; dropping the last handle does not join the thread —
/// call [`OperationQueue::shutdown`] explicitly.
#[derive(Clone)]
pub struct OperationQueue {
    sender: std_mpsc::Sender<Operation>,
    shared: std::sync::Arc<Shared>,
}

struct Shared {
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl OperationQueue {
    /// Open (or create) the database file at `path` and start the worker
    /// thread. Schema initialization runs before the thread accepts its
    /// first external operation.
    pub fn open(path: PathBuf) -> Result<Self> {
        let (tx, rx) = std_mpsc::channel::<Operation>();

        let (ready_tx, ready_rx) = std_mpsc::channel::<rusqlite::Result<()>>();
        let handle = std::thread::Builder::new()
            .name("duracache-writer".into())
            .spawn(move || worker_loop(path, rx, ready_tx))
            .map_err(|e| CacheError::BackendFailure(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|e| CacheError::BackendFailure(e.to_string()))?
            .map_err(|e| CacheError::BackendFailure(e.to_string()))?;

        Ok(Self {
            sender: tx,
            shared: std::sync::Arc::new(Shared {
                worker: std::sync::Mutex::new(Some(handle)),
            }),
        })
    }

    async fn submit(&self, kind: OperationKind) -> Result<OperationOutcome> {
        let (completion, receiver) = oneshot::channel();
        self.sender
            .send(Operation { kind, completion })
            .map_err(|_| CacheError::Disposed)?;
        receiver.await.map_err(|_| CacheError::Disposed)?
    }

    pub async fn bulk_insert(&self, elements: Vec<CacheElement>) -> Result<()> {
        self.submit(OperationKind::BulkInsert(elements)).await.map(|_| ())
    }

    pub async fn bulk_select(&self, keys: Vec<String>) -> Result<Vec<CacheElement>> {
        match self.submit(OperationKind::BulkSelect(keys)).await? {
            OperationOutcome::Elements(elements) => Ok(elements),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn bulk_select_by_type(&self, type_name: String) -> Result<Vec<CacheElement>> {
        match self.submit(OperationKind::BulkSelectByType(type_name)).await? {
            OperationOutcome::Elements(elements) => Ok(elements),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn bulk_invalidate(&self, keys: Vec<String>) -> Result<()> {
        self.submit(OperationKind::BulkInvalidate(keys)).await.map(|_| ())
    }

    pub async fn bulk_invalidate_by_type(&self, type_name: String) -> Result<()> {
        self.submit(OperationKind::BulkInvalidateByType(type_name))
            .await
            .map(|_| ())
    }

    pub async fn invalidate_all(&self) -> Result<()> {
        self.submit(OperationKind::InvalidateAll).await.map(|_| ())
    }

    pub async fn get_all_keys(&self) -> Result<Vec<String>> {
        match self.submit(OperationKind::GetAllKeys).await? {
            OperationOutcome::Keys(keys) => Ok(keys),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn get_created_at(&self, key: String) -> Result<Option<chrono::DateTime<Utc>>> {
        match self.submit(OperationKind::GetCreatedAt(key)).await? {
            OperationOutcome::CreatedAt(at) => Ok(at),
            _ => Ok(None),
        }
    }

    pub async fn vacuum(&self) -> Result<()> {
        self.submit(OperationKind::Vacuum).await.map(|_| ())
    }

    pub async fn flush(&self) -> Result<()> {
        self.submit(OperationKind::Flush).await.map(|_| ())
    }

    /// Stop accepting new operations, drain pending work, and join the
    /// writer thread. Idempotent: a second call observes `CacheError::Disposed`
    /// from `submit` and returns `Ok(())` anyway.
    pub async fn shutdown(&self) -> Result<()> {
        let (completion, receiver) = oneshot::channel();
        if self
            .sender
            .send(Operation {
                kind: OperationKind::Shutdown,
                completion,
            })
            .is_ok()
        {
            let _ = receiver.await;
        }

        let handle = self.shared.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            // Joining runs on a blocking thread pool slot to avoid stalling
            // the caller's async runtime.
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
        }
        Ok(())
    }
}

fn worker_loop(path: PathBuf, rx: std_mpsc::Receiver<Operation>, ready: std_mpsc::Sender<rusqlite::Result<()>>) {
    let conn = match Connection::open(&path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    if let Err(err) = schema::initialize(&conn) {
        let _ = ready.send(Err(err));
        return;
    }
    let _ = ready.send(Ok(()));

    loop {
        let first = match rx.recv() {
            Ok(op) => op,
            Err(_) => return, // all senders dropped
        };

        let mut batch = vec![first];
        while batch.len() < MAX_BATCH {
            match rx.try_recv() {
                Ok(op) => batch.push(op),
                Err(_) => break,
            }
        }

        if run_batch(&conn, batch) {
            return;
        }
    }
}

/// Groups queue order: reads, writes, invalidations, vacuum, flush, shutdown.
/// Returns `true` once a shutdown operation has been observed and the worker
/// should stop after this pass.
fn run_batch(conn: &Connection, batch: Vec<Operation>) -> bool {
    let mut reads = Vec::new();
    let mut writes = Vec::new();
    let mut invalidations = Vec::new();
    let mut vacuums = Vec::new();
    let mut flushes = Vec::new();
    let mut shutdowns = Vec::new();

    for op in batch {
        match op.kind {
            OperationKind::BulkSelect(_)
            | OperationKind::BulkSelectByType(_)
            | OperationKind::GetAllKeys
            | OperationKind::GetCreatedAt(_) => reads.push(op),
            OperationKind::BulkInsert(_) => writes.push(op),
            OperationKind::BulkInvalidate(_)
            | OperationKind::BulkInvalidateByType(_)
            | OperationKind::InvalidateAll => invalidations.push(op),
            OperationKind::Vacuum => vacuums.push(op),
            OperationKind::Flush => flushes.push(op),
            OperationKind::Shutdown => shutdowns.push(op),
        }
    }

    let now_ticks = ticks_from_datetime(Utc::now());
    let mut lazily_expired: Vec<String> = Vec::new();

    run_group(conn, reads, |tx, kind| execute_read(tx, kind, now_ticks, &mut lazily_expired));
    run_group(conn, writes, |tx, kind| execute_write(tx, kind));
    run_group(conn, invalidations, |tx, kind| execute_invalidation(tx, kind));

    if !lazily_expired.is_empty() {
        if let Ok(tx) = conn.unchecked_transaction() {
            let _ = delete_keys(&tx, &lazily_expired);
            let _ = tx.commit();
        }
    }

    run_group(conn, vacuums, |tx, kind| execute_vacuum(tx, kind, now_ticks));
    // Flush is a pure barrier: everything before it in this pass (and every
    // earlier pass, by FIFO channel order) has already executed.
    for op in flushes {
        let _ = op.completion.send(Ok(OperationOutcome::Unit));
    }

    let stopping = !shutdowns.is_empty();
    for op in shutdowns {
        let _ = op.completion.send(Ok(OperationOutcome::Unit));
    }
    stopping
}

/// Runs each operation in `ops` inside its own savepoint nested within one
/// group transaction: a failing operation's partial writes are rolled back
/// to that savepoint (atomicity per-op, e.g. `insert_many`'s all-or-nothing
/// contract) without discarding the other operations already committed in
/// this pass.
fn run_group<F>(conn: &Connection, ops: Vec<Operation>, mut f: F)
where
    F: FnMut(&Connection, OperationKind) -> Result<OperationOutcome>,
{
    if ops.is_empty() {
        return;
    }
    let mut tx = match conn.unchecked_transaction() {
        Ok(tx) => tx,
        Err(err) => {
            for op in ops {
                let _ = op
                    .completion
                    .send(Err(CacheError::BackendFailure(err.to_string())));
            }
            return;
        }
    };
    for op in ops {
        let Operation { kind, completion } = op;
        let result = run_within_savepoint(&mut tx, |sp| f(sp, kind));
        let _ = completion.send(result);
    }
    let _ = tx.commit();
}

fn run_within_savepoint<F>(tx: &mut rusqlite::Transaction, f: F) -> Result<OperationOutcome>
where
    F: FnOnce(&Connection) -> Result<OperationOutcome>,
{
    let sp = tx
        .savepoint()
        .map_err(|e| CacheError::BackendFailure(e.to_string()))?;
    let result = f(&*sp);
    if result.is_ok() {
        sp.commit().map_err(|e| CacheError::BackendFailure(e.to_string()))?;
    }
    // On error `sp` is dropped here uncommitted, which rolls back to the
    // savepoint and releases it, undoing only this operation's writes.
    result
}

fn execute_read(
    conn: &Connection,
    kind: OperationKind,
    now_ticks: i64,
    lazily_expired: &mut Vec<String>,
) -> Result<OperationOutcome> {
    match kind {
        OperationKind::BulkSelect(keys) => select_keys(conn, &keys, now_ticks, lazily_expired),
        OperationKind::BulkSelectByType(type_name) => {
            select_by_type(conn, &type_name, now_ticks, lazily_expired)
        }
        OperationKind::GetAllKeys => select_all_keys(conn, now_ticks, lazily_expired),
        OperationKind::GetCreatedAt(key) => select_created_at(conn, &key, now_ticks, lazily_expired),
        _ => unreachable!("non-read operation routed to execute_read"),
    }
}

fn select_keys(
    conn: &Connection,
    keys: &[String],
    now_ticks: i64,
    lazily_expired: &mut Vec<String>,
) -> Result<OperationOutcome> {
    let mut elements = Vec::with_capacity(keys.len());
    for key in keys {
        let row: Option<(Option<String>, Vec<u8>, i64, i64)> = conn
            .query_row(
                "SELECT TypeName, Value, Expiration, CreatedAt FROM CacheElement WHERE Key = ?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .ok();
        if let Some((type_name, value, expiration, created_at)) = row {
            if expiration < now_ticks {
                lazily_expired.push(key.clone());
                continue;
            }
            elements.push(CacheElement {
                key: key.clone(),
                type_name,
                value,
                created_at: ticks_to_datetime(created_at),
                expiration: ticks_to_datetime(expiration),
            });
        }
    }
    Ok(OperationOutcome::Elements(elements))
}

fn select_by_type(
    conn: &Connection,
    type_name: &str,
    now_ticks: i64,
    lazily_expired: &mut Vec<String>,
) -> Result<OperationOutcome> {
    let mut stmt = conn
        .prepare("SELECT Key, Value, Expiration, CreatedAt FROM CacheElement WHERE TypeName = ?1")
        .map_err(|e| CacheError::BackendFailure(e.to_string()))?;
    let rows = stmt
        .query_map(params![type_name], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, Vec<u8>>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, i64>(3)?,
            ))
        })
        .map_err(|e| CacheError::BackendFailure(e.to_string()))?;

    let mut elements = Vec::new();
    for row in rows.flatten() {
        let (key, value, expiration, created_at) = row;
        if expiration < now_ticks {
            lazily_expired.push(key);
            continue;
        }
        elements.push(CacheElement {
            key,
            type_name: Some(type_name.to_string()),
            value,
            created_at: ticks_to_datetime(created_at),
            expiration: ticks_to_datetime(expiration),
        });
    }
    Ok(OperationOutcome::Elements(elements))
}

fn select_all_keys(
    conn: &Connection,
    now_ticks: i64,
    lazily_expired: &mut Vec<String>,
) -> Result<OperationOutcome> {
    let mut stmt = conn
        .prepare("SELECT Key, Expiration FROM CacheElement")
        .map_err(|e| CacheError::BackendFailure(e.to_string()))?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))
        .map_err(|e| CacheError::BackendFailure(e.to_string()))?;

    let mut keys = Vec::new();
    for row in rows.flatten() {
        let (key, expiration) = row;
        if expiration < now_ticks {
            lazily_expired.push(key);
        } else {
            keys.push(key);
        }
    }
    Ok(OperationOutcome::Keys(keys))
}

fn select_created_at(
    conn: &Connection,
    key: &str,
    now_ticks: i64,
    lazily_expired: &mut Vec<String>,
) -> Result<OperationOutcome> {
    let row: Option<(i64, i64)> = conn
        .query_row(
            "SELECT Expiration, CreatedAt FROM CacheElement WHERE Key = ?1",
            params![key],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .ok();
    match row {
        Some((expiration, _created_at)) if expiration < now_ticks => {
            lazily_expired.push(key.to_string());
            Ok(OperationOutcome::CreatedAt(None))
        }
        Some((_, created_at)) => Ok(OperationOutcome::CreatedAt(Some(ticks_to_datetime(created_at)))),
        None => Ok(OperationOutcome::CreatedAt(None)),
    }
}

fn execute_write(conn: &Connection, kind: OperationKind) -> Result<OperationOutcome> {
    match kind {
        OperationKind::BulkInsert(elements) => insert_elements(conn, &elements),
        _ => unreachable!("non-write operation routed to execute_write"),
    }
}

fn insert_elements(conn: &Connection, elements: &[CacheElement]) -> Result<OperationOutcome> {
    for element in elements {
        conn.execute(
            "INSERT INTO CacheElement (Key, TypeName, Value, Expiration, CreatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(Key) DO UPDATE SET
                TypeName = excluded.TypeName,
                Value = excluded.Value,
                Expiration = excluded.Expiration,
                CreatedAt = excluded.CreatedAt",
            params![
                element.key,
                element.type_name,
                element.value,
                ticks_from_datetime(element.expiration),
                ticks_from_datetime(element.created_at),
            ],
        )
        .map_err(|e| CacheError::BackendFailure(e.to_string()))?;
    }
    Ok(OperationOutcome::Unit)
}

fn execute_invalidation(conn: &Connection, kind: OperationKind) -> Result<OperationOutcome> {
    match kind {
        OperationKind::BulkInvalidate(keys) => delete_keys(conn, &keys),
        OperationKind::BulkInvalidateByType(type_name) => conn
            .execute("DELETE FROM CacheElement WHERE TypeName = ?1", params![type_name])
            .map(|_| OperationOutcome::Unit)
            .map_err(|e| CacheError::BackendFailure(e.to_string())),
        OperationKind::InvalidateAll => conn
            .execute("DELETE FROM CacheElement", [])
            .map(|_| OperationOutcome::Unit)
            .map_err(|e| CacheError::BackendFailure(e.to_string())),
        _ => unreachable!("non-invalidation operation routed to execute_invalidation"),
    }
}

fn delete_keys(conn: &Connection, keys: &[String]) -> Result<OperationOutcome> {
    for key in keys {
        conn.execute("DELETE FROM CacheElement WHERE Key = ?1", params![key])
            .map_err(|e| CacheError::BackendFailure(e.to_string()))?;
    }
    Ok(OperationOutcome::Unit)
}

fn execute_vacuum(conn: &Connection, kind: OperationKind, now_ticks: i64) -> Result<OperationOutcome> {
    debug_assert!(matches!(kind, OperationKind::Vacuum));
    conn.execute("DELETE FROM CacheElement WHERE Expiration < ?1", params![now_ticks])
        .map(|_| OperationOutcome::Unit)
        .map_err(|e| CacheError::BackendFailure(e.to_string()))
}
