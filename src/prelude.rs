//! Convenience re-exports of the commonly used types.

pub use crate::config::{Config, ConfigBuilder};
pub use crate::dispatcher::{Dispatcher, DispatcherHandle};
pub use crate::error::{Error, Result};
pub use crate::pool::{TaskPool, TaskQueue};
pub use crate::task::{Priority, Task, TaskHandle, TaskState};
pub use crate::{init, init_with_config, pool, shutdown};
