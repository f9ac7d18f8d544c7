use std::sync::Arc;
use std::time::Duration;

use log::Logger;

use crate::config::{get_parsed_variable_or, get_variable};
use crate::session::Sessions;
use crate::store::Store;

const DEFAULT_DEBOUNCE_MS: u64 = 400;
const DEFAULT_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub sessions: Arc<Sessions>,
    pub config: Config,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, store: Arc<dyn Store>, config: Config) -> Self {
        let sessions = Arc::new(Sessions::new(
            store,
            (*logger).clone(),
            config.debounce,
            config.session_ttl,
        ));

        Self {
            logger,
            sessions,
            config,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) base_path: String,
    pub(crate) debounce: Duration,
    pub(crate) session_ttl: Duration,
}

impl Config {
    pub fn new(base_path: impl Into<String>, debounce: Duration, session_ttl: Duration) -> Self {
        Self {
            base_path: base_path.into(),
            debounce,
            session_ttl,
        }
    }

    /// Reads `POSTTEST_BASE_PATH` (required), `POSTTEST_DEBOUNCE_MS` and
    /// `POSTTEST_SESSION_TTL_SECONDS`.
    pub fn from_env() -> Self {
        Self::new(
            get_variable("POSTTEST_BASE_PATH"),
            Duration::from_millis(get_parsed_variable_or(
                "POSTTEST_DEBOUNCE_MS",
                DEFAULT_DEBOUNCE_MS,
            )),
            Duration::from_secs(get_parsed_variable_or(
                "POSTTEST_SESSION_TTL_SECONDS",
                DEFAULT_SESSION_TTL_SECONDS,
            )),
        )
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}
