use once_cell::sync::OnceCell;
use std::time::Duration;

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Tuning knobs for the worker pool.
///
/// Install with [`configure`] before the first promise is created; once the
/// pool has started, the configuration is latched for the life of the
/// process.
#[derive(Clone, Debug)]
pub struct Config {
    /// How long an idle worker lingers before retiring.
    pub idle_timeout: Duration,
    /// How many idle workers stay resident instead of retiring.
    pub reserve_threads: usize,
    /// Name given to worker threads.
    pub thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(1),
            reserve_threads: num_cpus::get(),
            thread_name: String::from("vow/worker"),
        }
    }
}

/// Returned by [`configure`] when the pool configuration is already latched.
#[derive(Debug, thiserror::Error)]
#[error("worker pool is already configured")]
pub struct AlreadyConfigured(pub Config);

/// Installs the worker pool configuration.
///
/// Fails if the pool has already latched a configuration, either through an
/// earlier call or because a promise has already been created. The rejected
/// [`Config`] is handed back inside the error.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vow::task::{configure, Config};
///
/// configure(Config {
///     idle_timeout: Duration::from_millis(500),
///     ..Config::default()
/// })
/// .unwrap();
/// ```
pub fn configure(config: Config) -> Result<(), AlreadyConfigured> {
    CONFIG.set(config).map_err(AlreadyConfigured)
}

pub(crate) fn config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}
