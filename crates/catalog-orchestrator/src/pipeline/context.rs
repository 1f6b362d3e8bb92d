use crate::catalog::{CatalogProcessingRecord, MappingResult, RecordOutcome};
use crate::store::Lease;

/// State carried through one run over a record.
pub struct EntryContext {
    /// Renewed before every stage; always the newest copy.
    pub lease: Lease,

    /// Latest persisted copy of the record.
    pub record: CatalogProcessingRecord,

    // Set once the mapping stage completed (in this run or an earlier one)
    pub mapping: Option<MappingResult>,
}

impl EntryContext {
    pub fn new(lease: Lease, record: CatalogProcessingRecord) -> Self {
        Self {
            lease,
            record,
            mapping: None,
        }
    }
}

/// How a call to process a record ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The run drove the record to a terminal outcome.
    Finished {
        outcome: RecordOutcome,
        catalog_id: Option<String>,
    },
    /// Nothing to do; the record was already terminal.
    AlreadyFinished(RecordOutcome),
    /// Another worker holds the lease.
    Busy,
    /// The lease expired mid-run; the in-flight stage result was discarded.
    LeaseLost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub tracking_id: String,
    pub outcome: EntryOutcome,
}

impl EntryReport {
    pub fn new(tracking_id: &str, outcome: EntryOutcome) -> Self {
        Self {
            tracking_id: tracking_id.to_string(),
            outcome,
        }
    }

    pub fn finished(record: &CatalogProcessingRecord) -> Self {
        Self::new(
            &record.tracking_id,
            EntryOutcome::Finished {
                outcome: record.outcome,
                catalog_id: record.ondc_catalog_id.clone(),
            },
        )
    }
}
