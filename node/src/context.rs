//! Wiring of configured backends into the file service.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use peerfs_content::{ClusterClient, ClusterDirectory};
use peerfs_files::{FileService, FilesContext};
use peerfs_storage::{LedgerClient, SledLedger};
use peerfs_types::PeerId;
use std::sync::Arc;
use tracing::info;

/// Everything a command needs, built once per invocation.
pub struct NodeContext {
    pub config: AppConfig,
    pub cluster: Arc<ClusterClient>,
    pub ledger: Arc<SledLedger>,
    pub files: FileService,
}

impl NodeContext {
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let cluster = Arc::new(
            ClusterClient::new(&config.cluster_api_url, &config.gateway_url)
                .context("failed to build cluster client")?,
        );

        let local_peer = match &config.peer_id {
            Some(peer_id) => PeerId::new(peer_id.as_str()),
            None => {
                cluster
                    .local_peer()
                    .await
                    .with_context(|| {
                        format!("failed to query peer identity from {}", config.cluster_api_url)
                    })?
                    .id
            }
        };

        if let Some(parent) = config.ledger_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create ledger directory {}", parent.display())
            })?;
        }
        let ledger = Arc::new(SledLedger::open(&config.ledger_path).with_context(|| {
            format!("failed to open ledger at {}", config.ledger_path.display())
        })?);

        info!(
            peer = %local_peer,
            cluster = %config.cluster_api_url,
            ledger = %config.ledger_path.display(),
            "node context ready"
        );

        let files = FileService::new(FilesContext {
            local_peer,
            ledger: LedgerClient::with_policy(ledger.clone(), config.retry_policy()),
            store: cluster.clone(),
            directory: cluster.clone(),
            replication: config.replication(),
        });

        Ok(Self {
            config,
            cluster,
            ledger,
            files,
        })
    }

    /// Flush pending ledger writes to disk.
    pub fn shutdown(&self) -> Result<()> {
        self.ledger.flush().context("failed to flush ledger")
    }
}
