pub mod catalog;
pub mod downloader_tool;
pub mod enricher;
pub mod message_queue;
pub mod object_store;
pub mod transcoder_tool;

pub use catalog::Catalog;
pub use downloader_tool::{DownloadProgressCallback, DownloaderTool};
pub use enricher::{EnrichmentRecord, Enricher};
pub use message_queue::{MessageQueue, QueuedMessage};
pub use object_store::{ObjectMeta, ObjectStore};
pub use transcoder_tool::{Rendition, RenditionLadder, TranscoderTool};
