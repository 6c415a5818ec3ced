//! Toolbox configuration.
//!
//! Configuration can be loaded from:
//! 1. TOML file (`.toolbox.toml`)
//! 2. Environment variables (with `TOOLBOX_` prefix)
//!
//! Environment variables override TOML configuration.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [toolbox.task]
//! start_on_create = false
//! block_outside_runtime = true
//!
//! [toolbox.scheduler]
//! flavor = "multi_thread"
//! worker_threads = 4
//! thread_name = "toolbox-worker"
//!
//! [toolbox.cache]
//! max_size = 128
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default configuration file looked up by [`ToolboxConfig::load`].
pub const DEFAULT_CONFIG_FILE: &str = ".toolbox.toml";

/// Main toolbox configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolboxConfig {
    /// Task lifecycle behaviour.
    pub task: TaskConfig,

    /// Runtime construction for owned schedulers.
    pub scheduler: SchedulerConfig,

    /// Future cache bounds.
    pub cache: CacheConfig,
}

impl ToolboxConfig {
    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML configuration file
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Ok(contents) = std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from TOML content.
    ///
    /// Settings live under the `[toolbox]` table; a document without it
    /// yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct FullConfig {
            #[serde(default)]
            toolbox: ToolboxConfig,
        }

        let full: FullConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(full.toolbox)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// Values that fail to parse are ignored.
    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Task
        if let Some(v) = var("TOOLBOX_TASK_START_ON_CREATE") {
            if let Ok(b) = v.parse() {
                self.task.start_on_create = b;
            }
        }
        if let Some(v) = var("TOOLBOX_TASK_BLOCK_OUTSIDE_RUNTIME") {
            if let Ok(b) = v.parse() {
                self.task.block_outside_runtime = b;
            }
        }

        // Scheduler
        if let Some(v) = var("TOOLBOX_SCHEDULER_FLAVOR") {
            match v.as_str() {
                "current_thread" => self.scheduler.flavor = RuntimeFlavor::CurrentThread,
                "multi_thread" => self.scheduler.flavor = RuntimeFlavor::MultiThread,
                _ => {
                    tracing::warn!(value = %v, "ignoring unknown TOOLBOX_SCHEDULER_FLAVOR");
                },
            }
        }
        if let Some(v) = var("TOOLBOX_SCHEDULER_WORKER_THREADS") {
            if let Ok(n) = v.parse() {
                self.scheduler.worker_threads = Some(n);
            }
        }
        if let Some(v) = var("TOOLBOX_SCHEDULER_THREAD_NAME") {
            self.scheduler.thread_name = v;
        }

        // Cache
        if let Some(v) = var("TOOLBOX_CACHE_MAX_SIZE") {
            if let Ok(n) = v.parse() {
                self.cache.max_size = Some(n);
            }
        }
    }
}

/// Task lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Start the task as soon as it is built.
    pub start_on_create: bool,

    /// Block inside `start()` until the run finishes when the caller is not
    /// inside a tokio runtime. When `false`, `start()` never blocks and the
    /// work only progresses while the scheduler is driven elsewhere.
    pub block_outside_runtime: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            start_on_create: false,
            block_outside_runtime: true,
        }
    }
}

/// Which tokio runtime flavor an owned scheduler uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeFlavor {
    /// Single-threaded cooperative runtime.
    #[default]
    CurrentThread,
    /// Work-stealing runtime with a worker pool.
    MultiThread,
}

/// Owned scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Runtime flavor.
    pub flavor: RuntimeFlavor,

    /// Worker thread count for [`RuntimeFlavor::MultiThread`]. `None` uses
    /// tokio's default (one per core).
    pub worker_threads: Option<usize>,

    /// Name given to runtime threads.
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flavor: RuntimeFlavor::CurrentThread,
            worker_threads: None,
            thread_name: "toolbox-worker".to_string(),
        }
    }
}

/// Future cache configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of completed entries. `None` means unbounded.
    pub max_size: Option<usize>,
}
