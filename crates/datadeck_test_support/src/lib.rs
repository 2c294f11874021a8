pub mod fake_executor;
pub mod fixtures;
pub mod handles;
pub mod storage;

pub use fake_executor::{FakeExecutor, FakeExecutorStats, FakeQueryOutcome};
pub use handles::FakeHandleStore;
pub use storage::{MemoryStorage, MemoryStorageHub};
