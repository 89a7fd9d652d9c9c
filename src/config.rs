use crate::error::{Error, Result};
use crate::executor::FailureStrategy;

const MIN_STACK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Used in log fields and as the drain thread name prefix.
    pub name: String,
    pub stack_size: Option<usize>,
    pub failure_strategy: FailureStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "drainpool".to_string(),
            stack_size: None,
            failure_strategy: FailureStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("name must not be empty"));
        }

        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(Error::config(format!(
                    "stack_size too small (min {} bytes)",
                    MIN_STACK_SIZE
                )));
            }
        }

        Ok(())
    }

    pub fn thread_name(&self) -> String {
        format!("{}-drain", self.name)
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

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn failure_strategy(mut self, strategy: FailureStrategy) -> Self {
        self.config.failure_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
