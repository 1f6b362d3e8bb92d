//! Domain model: records, stage state machine, attributes and the
//! marketplace item schema.

pub mod attributes;
pub mod failure;
pub mod item;
pub mod message;
pub mod record;
pub mod status;

pub use attributes::{
    CulturallySignificantItem, Dimensions, ExtractedAttributes, Measurement, Price,
};
pub use failure::{ErrorCategory, ErrorClass, ErrorDetails};
pub use item::{Descriptor, ItemPrice, MarketplaceCatalogItem};
pub use message::{LanguageCode, MessageError, Priority, QueueMessage};
pub use record::{
    AsrResult, CatalogProcessingRecord, MappingResult, MediaRefs, StageState, SubmissionReceipt,
    TransitionError, VisionResult,
};
pub use status::{RecordOutcome, Stage, StageStatus};
