//! Domain model (ids, task state machine, candidates, collected content, errors).

pub mod candidate;
pub mod collection;
pub mod errors;
pub mod ids;
pub mod state;
pub mod task;

pub use candidate::{CandidateRecord, Community, LookupKey, ParsedEntry, ParsedFile, Resolution};
pub use collection::{CollectionUnit, Comment, Post};
pub use errors::{DirectoryError, ErrorKind, FlockError, SourceError, StoreError};
pub use ids::{CommentId, CommunityId, PostId, TaskId};
pub use state::{ErrorStage, TaskKind, TaskStatus};
pub use task::{Counters, PhaseCounter, Task};
