pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{Priority, WorkerPool};
pub use crate::queue::{DispatchQueue, QueueKind};
pub use crate::runtime::{init_with_config, Runtime};
pub use crate::scheduler::Timer;
pub use crate::util::OverflowPolicy;
