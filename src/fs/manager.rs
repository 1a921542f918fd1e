use crate::fs::env::Env;
use std::path::PathBuf;
use std::sync::Arc;

const CONSENSUS_META_DIR: &str = "consensus-meta";

/// FsManager resolves where consensus metadata lives under a server's data
/// root. One file per replication group, named by the group id.
pub struct FsManager {
    env: Arc<dyn Env>,
    root: PathBuf,
}

impl std::fmt::Debug for FsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsManager")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FsManager {
    pub fn new(env: Arc<dyn Env>, root: impl Into<PathBuf>) -> Self {
        FsManager {
            env,
            root: root.into(),
        }
    }

    pub fn env(&self) -> &dyn Env {
        self.env.as_ref()
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join(CONSENSUS_META_DIR)
    }

    pub fn meta_path(&self, group_id: &str) -> PathBuf {
        self.meta_dir().join(group_id)
    }
}
