pub mod artifact_key;
pub mod slug;

pub use artifact_key::{ArtifactKey, ArtifactKind};
pub use slug::slugify;
