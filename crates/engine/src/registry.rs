//! Factory table mapping implementation ids to job constructors.

use std::collections::HashMap;

use cogwork_core::Job;

use crate::error::EngineError;

/// Constructor for one job type.
pub type JobFactory = Box<dyn Fn() -> Box<dyn Job> + Send + Sync>;

/// Registry of job types the engine can instantiate.
///
/// Descriptors store an implementation id; on resume the engine looks the id
/// up here instead of reflecting on stored type names. Register everything at
/// startup and validate before processing begins.
#[derive(Default)]
pub struct JobRegistry {
    factories: HashMap<String, JobFactory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `implementation`.
    pub fn register<F>(&mut self, implementation: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Job> + Send + Sync + 'static,
    {
        self.factories.insert(implementation.into(), Box::new(factory));
    }

    /// Instantiate a fresh job of the given type.
    pub fn instantiate(&self, implementation: &str) -> Option<Box<dyn Job>> {
        self.factories.get(implementation).map(|factory| factory())
    }

    pub fn contains(&self, implementation: &str) -> bool {
        self.factories.contains_key(implementation)
    }

    /// Registered implementation ids, sorted for stable output.
    pub fn implementations(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Fail fast if any of `required` has no registered constructor.
    pub fn validate(&self, required: &[&str]) -> Result<(), EngineError> {
        for implementation in required {
            if !self.contains(implementation) {
                return Err(EngineError::UnknownImplementation(
                    (*implementation).to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("implementations", &self.implementations())
            .finish()
    }
}
