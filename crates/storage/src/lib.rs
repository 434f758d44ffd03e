pub mod backend;
pub mod feedback;
pub mod in_memory;
pub mod registry;
pub mod sqlite;

pub use backend::{cosine_similarity, MemoryBackend, VectorHit};
pub use feedback::{FeedbackLog, FeedbackSink, FnSink};
pub use in_memory::InMemoryBackend;
pub use registry::BackendRegistry;
pub use sqlite::SqliteBackend;
