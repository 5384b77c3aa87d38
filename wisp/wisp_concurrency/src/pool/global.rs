//! Process-wide shared pool.
//!
//! Small one-off jobs (writing a screenshot, flushing a log) don't justify
//! a dedicated pool. [`global`] builds one on first use from the default
//! configuration plus environment overrides and keeps it for the lifetime
//! of the process.

use once_cell::sync::OnceCell;
use wisp_core::Result;

use super::config::ThreadPoolConfig;
use super::thread::ThreadPool;

static GLOBAL_POOL: OnceCell<ThreadPool> = OnceCell::new();

/// Get the shared pool, creating it on first call.
///
/// Fails if the environment holds an invalid override or a worker thread
/// cannot be spawned; a later call will try again.
pub fn global() -> Result<&'static ThreadPool> {
    GLOBAL_POOL.get_or_try_init(|| {
        let config = ThreadPoolConfig {
            thread_name_prefix: "wisp-global".to_string(),
            ..Default::default()
        }
        .with_env_overrides()?;

        Ok(ThreadPool::with_config(config)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_pool_is_shared() {
        let first = global().unwrap();
        let second = global().unwrap();
        assert!(std::ptr::eq(first, second));

        let handle = first.enqueue(|| 1 + 1).unwrap();
        assert_eq!(handle.wait().unwrap(), 2);
    }
}
