/*!
Test harness

In-memory directory bootstrapped with an owner, a mock transport and a temporary
data directory for heartbeat files.
*/

use crate::transport_stub::MockTransport;
use anyhow::Result;
use imsa_core::directory::BootstrapAdmin;
use imsa_core::liveness::HeartbeatFile;
use imsa_core::{Directory, Role};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestHarness {
    pub owner_id: i64,
    pub directory: Directory,
    pub transport: Arc<MockTransport>,
    data_dir: TempDir,
}

impl TestHarness {
    pub async fn new(owner_id: i64) -> Result<Self> {
        // logs visibles avec RUST_LOG=debug
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();

        let directory =
            Directory::connect_in_memory(BootstrapAdmin { telegram_id: owner_id, name: "owner".into() }).await?;

        Ok(Self {
            owner_id,
            directory,
            transport: Arc::new(MockTransport::new()),
            data_dir: tempfile::tempdir()?,
        })
    }

    pub async fn seed_users(&self, users: &[(i64, &str, Role)]) -> Result<()> {
        for (id, name, role) in users {
            self.directory.add_user(*id, name, *role).await?;
        }
        Ok(())
    }

    pub fn heartbeat_file(&self) -> HeartbeatFile {
        HeartbeatFile::new(self.data_dir.path().join("heartbeat"))
    }
}
