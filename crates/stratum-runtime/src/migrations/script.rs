use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use stratum_core::Result;

use crate::db::Connection;

/// A migration written as code rather than a statement batch.
///
/// Each implementation is registered under the name of its script file in
/// the migration folder. The whole unit succeeds or fails.
#[async_trait]
pub trait ScriptMigration: Send + Sync {
    async fn up(&self, db: &dyn Connection) -> Result<()>;

    async fn down(&self, db: &dyn Connection) -> Result<()>;
}

/// Script implementations keyed by file name.
#[derive(Clone, Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, Arc<dyn ScriptMigration>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the implementation for a script file, replacing any previous one.
    pub fn register<S>(&mut self, file_name: impl Into<String>, script: S) -> &mut Self
    where
        S: ScriptMigration + 'static,
    {
        self.scripts.insert(file_name.into(), Arc::new(script));
        self
    }

    pub fn get(&self, file_name: &str) -> Option<Arc<dyn ScriptMigration>> {
        self.scripts.get(file_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.scripts.keys().collect();
        names.sort();
        f.debug_struct("ScriptRegistry").field("scripts", &names).finish()
    }
}
