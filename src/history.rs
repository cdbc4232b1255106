//! Cross-cycle state owned by the orchestrator: the recency window used for
//! headline de-duplication and the bounded log of generated artifacts.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Local, Utc};

use crate::state_machine::GenerationRecord;

/// Bounded set of the most recently fetched headlines (exact-text membership).
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, headline: &str) -> bool {
        self.members.contains(headline)
    }

    /// Insert headlines in order. Re-inserting a headline refreshes its
    /// recency; the oldest entries are evicted beyond capacity.
    pub fn extend<I>(&mut self, headlines: I)
    where
        I: IntoIterator<Item = String>,
    {
        for headline in headlines {
            if self.members.contains(&headline) {
                self.order.retain(|h| h != &headline);
            } else {
                self.members.insert(headline.clone());
            }
            self.order.push_back(headline);

            while self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.members.remove(&evicted);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Append-only log of generation records, FIFO-bounded to `max_records`.
#[derive(Debug, Clone)]
pub struct GenerationLog {
    max_records: usize,
    records: VecDeque<GenerationRecord>,
}

impl GenerationLog {
    pub fn new(max_records: usize) -> Self {
        Self {
            max_records,
            records: VecDeque::new(),
        }
    }

    pub fn push(&mut self, record: GenerationRecord) {
        self.records.push_back(record);
        while self.records.len() > self.max_records {
            self.records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &GenerationRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&GenerationRecord> {
        self.records.back()
    }

    /// Records created since local midnight.
    pub fn count_since_midnight(&self) -> usize {
        let midnight: Option<DateTime<Utc>> = Local::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| naive.and_local_timezone(Local).earliest())
            .map(|local| local.with_timezone(&Utc));

        match midnight {
            Some(start) => self.records.iter().filter(|r| r.timestamp >= start).count(),
            None => 0,
        }
    }
}
