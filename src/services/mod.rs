mod catalog;
mod export_pipeline;
pub mod format_registry;
pub(crate) mod object_store;
pub mod progress;
mod section_registry;
mod selection;
mod upload_coordinator;

pub use catalog::{builtin_config, BucketCatalog, CatalogConfig};
pub use export_pipeline::{ExportPipeline, ExportPipelineBuilder, DEFAULT_EXPORT_TIMEOUT};
pub use format_registry::{ExportFormatDescriptor, FormatRegistry, Rendition, SerializeError};
pub use object_store::ObjectStore;
pub use progress::{FixedStepper, ProgressStepper, RandomStepper};
pub use section_registry::SectionRegistry;
pub use selection::{SelectionManager, DEFAULT_CONFIRMATION_THRESHOLD};
pub use upload_coordinator::{UploadConfig, UploadCoordinator};
