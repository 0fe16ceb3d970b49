use crate::error::{Error, Result};
use crate::executor::panic_handler::{FailureObserver, PanicStrategy, TaskFailure};
use crate::util::OverflowPolicy;
use std::sync::Arc;

const MAX_THREADS: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    pub timer_thread_name: String,

    /// Bound on the pool's ready set. `None` keeps it unbounded.
    pub ready_capacity: Option<usize>,
    /// Bound on the timer's pending set. `None` keeps it unbounded.
    pub pending_capacity: Option<usize>,
    pub overflow_policy: OverflowPolicy,

    pub panic_strategy: PanicStrategy,
    pub failure_observer: Option<FailureObserver>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "dispatch-worker".to_string(),
            timer_thread_name: "dispatch-timer".to_string(),
            ready_capacity: None,
            pending_capacity: None,
            overflow_policy: OverflowPolicy::default(),
            panic_strategy: PanicStrategy::default(),
            failure_observer: None,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > MAX_THREADS {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.ready_capacity == Some(0) {
            return Err(Error::config("ready_capacity must be > 0"));
        }

        if self.pending_capacity == Some(0) {
            return Err(Error::config("pending_capacity must be > 0"));
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn timer_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.timer_thread_name = name.into();
        self
    }

    pub fn ready_capacity(mut self, capacity: usize) -> Self {
        self.config.ready_capacity = Some(capacity);
        self
    }

    pub fn pending_capacity(mut self, capacity: usize) -> Self {
        self.config.pending_capacity = Some(capacity);
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    /// Register a hook called for every task panic caught by the runtime.
    pub fn on_task_failure<F>(mut self, observer: F) -> Self
    where
        F: Fn(&TaskFailure) + Send + Sync + 'static,
    {
        self.config.failure_observer = Some(FailureObserver(Arc::new(observer)));
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_threads() >= 1);
        assert!(config.ready_capacity.is_none());
        assert!(config.pending_capacity.is_none());
    }

    #[test]
    fn test_builder_rejects_zero_threads() {
        let err = Config::builder().num_threads(0).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(Config::builder().num_threads(4096).build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        assert!(Config::builder().ready_capacity(0).build().is_err());
        assert!(Config::builder().pending_capacity(0).build().is_err());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = Config::builder()
            .num_threads(3)
            .thread_name_prefix("io")
            .ready_capacity(16)
            .overflow_policy(OverflowPolicy::Reject)
            .on_task_failure(|_| {})
            .build()
            .unwrap();

        assert_eq!(config.worker_threads(), 3);
        assert_eq!(config.thread_name_prefix, "io");
        assert_eq!(config.ready_capacity, Some(16));
        assert_eq!(config.overflow_policy, OverflowPolicy::Reject);
        assert!(config.failure_observer.is_some());
    }
}
