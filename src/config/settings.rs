use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the durable store, the session engine and logging.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub store: StoreSettings,
    pub session: SessionSettings,
    pub log: LogSettings,
}

/// Where the sled database lives and which tree namespace to use.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub path: String,
    pub namespace: String,
}

/// Controls how many messages go out per cycle and how fast retries back off.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub batch_size: usize,
    pub retry_interval_secs: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from the defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub store: Option<PartialStoreSettings>,
    pub session: Option<PartialSessionSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStoreSettings {
    pub path: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialSessionSettings {
    pub batch_size: Option<usize>,
    pub retry_interval_secs: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "pollpack_db".to_string(),
            namespace: "pollpack".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            retry_interval_secs: 5,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PartialSettings {
    /// Overlay whatever was provided on top of `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();
        let store = self.store.unwrap_or_default();
        let session = self.session.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            store: StoreSettings {
                path: store.path.unwrap_or(default.store.path),
                namespace: store.namespace.unwrap_or(default.store.namespace),
            },
            session: SessionSettings {
                batch_size: session.batch_size.unwrap_or(default.session.batch_size),
                retry_interval_secs: session
                    .retry_interval_secs
                    .unwrap_or(default.session.retry_interval_secs),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}
