pub mod events;
pub mod generator;

pub use events::{ProgressSink, ProgressStream};
pub use generator::Generator;
pub use generator::backend::auth::Credentials;
pub use generator::backend::config::GenBackendConfig;
pub use generator::backend::{GenBackend, TaskBackend};
pub use generator::cache::{CacheEntry, ResultCache, SessionCache};
pub use generator::poller::PollConfig;
pub use generator::retry::{with_retry, RetryPolicy};
