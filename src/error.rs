pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("runtime already initialized")]
    AlreadyInitialized,

    #[error("runtime is shut down")]
    ShutDown,

    #[error("submission rejected: {0} is full")]
    Rejected(&'static str),

    #[error("task evicted from a full {0} before it ran")]
    Evicted(&'static str),

    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn task_failed<S: Into<String>>(msg: S) -> Self {
        Error::TaskFailed(msg.into())
    }
}
