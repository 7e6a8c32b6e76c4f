//! Buffered, crash-safe delivery of records to the persistence sink

use crate::buffer::{BufferError, BufferResult, BufferedRecord, RecoveryMirror};
use crate::storage::{OutcomeRecord, PersistenceSink, SharedSink, SubdomainRecord};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Snapshot of a pipeline's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    pub current_size: usize,
    pub threshold: usize,
    pub flush_count: u64,
    pub total_flushed: u64,
    pub session_id: i64,
}

/// Per-session record buffer
pub struct BufferPipeline {
    session_id: i64,
    sink: SharedSink,
    threshold: usize,
    mirror: RecoveryMirror,
    records: Mutex<Vec<BufferedRecord>>,
    flush_lock: Mutex<()>,
    flush_count: AtomicU64,
    total_flushed: AtomicU64,
}

impl BufferPipeline {
    /// Creates a pipeline for a session
    ///
    /// # Arguments
    ///
    /// * `session_id` - Session the records belong to
    /// * `sink` - Where flushed records go
    /// * `threshold` - Buffer length that makes a flush due
    /// * `mirror_dir` - Directory holding the recovery mirror
    pub fn new(
        session_id: i64,
        sink: SharedSink,
        threshold: usize,
        mirror_dir: &Path,
    ) -> BufferResult<Self> {
        Ok(Self {
            session_id,
            sink,
            threshold: threshold.max(1),
            mirror: RecoveryMirror::new(mirror_dir, session_id)?,
            records: Mutex::new(Vec::new()),
            flush_lock: Mutex::new(()),
            flush_count: AtomicU64::new(0),
            total_flushed: AtomicU64::new(0),
        })
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn mirror(&self) -> &RecoveryMirror {
        &self.mirror
    }

    pub fn len(&self) -> usize {
        self.lock_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<BufferedRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record and rewrites the recovery mirror
    ///
    /// The record is kept in memory even if the mirror write fails.
    pub fn append(&self, record: BufferedRecord) -> BufferResult<()> {
        let mut records = self.lock_records();
        records.push(record);
        self.mirror.write(&records)
    }

    pub fn append_outcome(&self, record: OutcomeRecord) -> BufferResult<()> {
        self.append(BufferedRecord::Url {
            session_id: self.session_id,
            record,
        })
    }

    pub fn append_subdomain(&self, record: SubdomainRecord) -> BufferResult<()> {
        self.append(BufferedRecord::Subdomain {
            session_id: self.session_id,
            record,
        })
    }

    /// Flushes when the buffer has reached its threshold
    ///
    /// # Returns
    ///
    /// Number of records flushed (zero when no flush was due)
    pub fn flush_if_due(&self) -> BufferResult<usize> {
        if self.len() >= self.threshold {
            self.flush()
        } else {
            Ok(0)
        }
    }

    /// Persists the current buffer contents as one batch
    ///
    /// On failure only the records the sink did not accept stay in the buffer,
    /// so the next trigger retries exactly those.
    pub fn flush(&self) -> BufferResult<usize> {
        let _flushing = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let snapshot = self.lock_records().clone();
        if snapshot.is_empty() {
            return Ok(0);
        }

        let result = {
            let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
            persist_records(&mut *sink, self.session_id, &snapshot)
        };

        match result {
            Ok(()) => {
                let flushed = snapshot.len();
                self.discard_persisted(&(0..flushed).collect::<Vec<_>>())?;
                self.flush_count.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "Flushed {} records for session {}",
                    flushed,
                    self.session_id
                );
                Ok(flushed)
            }
            Err(partial) => {
                if !partial.persisted.is_empty() {
                    tracing::warn!(
                        "Partial flush for session {}: {} of {} records persisted",
                        self.session_id,
                        partial.persisted.len(),
                        snapshot.len()
                    );
                    self.discard_persisted(&partial.persisted)?;
                }
                Err(partial.error)
            }
        }
    }

    /// Drops persisted records from the head of the buffer and rewrites the mirror
    ///
    /// `persisted` holds sorted indices into the flushed snapshot, which is
    /// always a prefix of the buffer.
    fn discard_persisted(&self, persisted: &[usize]) -> BufferResult<()> {
        let mut records = self.lock_records();
        let mut index = 0;
        records.retain(|_| {
            let keep = persisted.binary_search(&index).is_err();
            index += 1;
            keep
        });

        self.total_flushed
            .fetch_add(persisted.len() as u64, Ordering::Relaxed);

        if records.is_empty() {
            self.mirror.remove()
        } else {
            self.mirror.write(&records)
        }
    }

    /// Flushes any remainder at session end and removes the mirror
    ///
    /// If the flush fails the mirror is kept for a later replay.
    pub fn final_flush(&self) -> BufferResult<usize> {
        let flushed = self.flush()?;
        self.mirror.remove()?;
        Ok(flushed)
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            current_size: self.len(),
            threshold: self.threshold,
            flush_count: self.flush_count.load(Ordering::Relaxed),
            total_flushed: self.total_flushed.load(Ordering::Relaxed),
            session_id: self.session_id,
        }
    }
}

/// A flush that stopped part way through
struct PartialFlush {
    /// Sorted indices of the records the sink accepted
    persisted: Vec<usize>,
    error: BufferError,
}

/// Writes URL records as one batch, then each subdomain record
fn persist_records(
    sink: &mut dyn PersistenceSink,
    session_id: i64,
    records: &[BufferedRecord],
) -> Result<(), PartialFlush> {
    let mut outcomes = Vec::new();
    let mut outcome_indices = Vec::new();
    let mut subdomains = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match record {
            BufferedRecord::Url { record, .. } => {
                outcomes.push(record.clone());
                outcome_indices.push(index);
            }
            BufferedRecord::Subdomain { record, .. } => subdomains.push((index, record)),
        }
    }

    if !outcomes.is_empty() {
        if let Err(e) = sink.log_url_batch(session_id, &outcomes) {
            return Err(PartialFlush {
                persisted: Vec::new(),
                error: e.into(),
            });
        }
    }

    let mut persisted = outcome_indices;
    for (index, subdomain) in subdomains {
        if let Err(e) = sink.log_subdomain(session_id, &subdomain.subdomain, &subdomain.base_domain)
        {
            persisted.sort_unstable();
            return Err(PartialFlush {
                persisted,
                error: e.into(),
            });
        }
        persisted.push(index);
    }

    Ok(())
}

/// Persists the records of a leftover recovery mirror and deletes it
///
/// Records are grouped by session in their original order. If the sink fails
/// part way, the mirror is rewritten with only the records not yet persisted.
///
/// # Returns
///
/// Number of records replayed
pub fn replay_mirror(path: &Path, sink: &mut dyn PersistenceSink) -> BufferResult<usize> {
    let mirror = RecoveryMirror::at(path);
    let records = mirror.read()?;

    let mut sessions: Vec<i64> = Vec::new();
    for record in &records {
        if !sessions.contains(&record.session_id()) {
            sessions.push(record.session_id());
        }
    }

    let mut done = vec![false; records.len()];
    for session_id in sessions {
        let indices: Vec<usize> = (0..records.len())
            .filter(|&i| records[i].session_id() == session_id)
            .collect();
        let group: Vec<BufferedRecord> = indices.iter().map(|&i| records[i].clone()).collect();

        if let Err(partial) = persist_records(sink, session_id, &group) {
            for local in partial.persisted {
                done[indices[local]] = true;
            }
            let remaining: Vec<BufferedRecord> = records
                .iter()
                .zip(&done)
                .filter(|&(_, &persisted)| !persisted)
                .map(|(record, _)| record.clone())
                .collect();
            mirror.write(&remaining)?;
            return Err(partial.error);
        }

        for &i in &indices {
            done[i] = true;
        }
        tracing::info!(
            "Replayed {} records for session {}",
            group.len(),
            session_id
        );
    }

    mirror.remove()?;
    Ok(records.len())
}
