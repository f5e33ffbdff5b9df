//! Nicknamed remote peers, one list per local identity.

use crate::error::{FilesError, Result};
use peerfs_content::ClusterDirectory;
use peerfs_storage::{Decoded, LedgerClient, Mutation};
use peerfs_types::{FavoriteEntry, FavoritesList, LedgerKey, PeerId};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct FavoritesDirectory {
    ledger: LedgerClient,
    directory: Arc<dyn ClusterDirectory>,
    owner: PeerId,
}

impl FavoritesDirectory {
    pub fn new(ledger: LedgerClient, directory: Arc<dyn ClusterDirectory>, owner: PeerId) -> Self {
        Self {
            ledger,
            directory,
            owner,
        }
    }

    fn key(&self) -> String {
        LedgerKey::Favorites(&self.owner).to_key()
    }

    /// Add or replace `peer` with `nickname`. The advertised peer name is
    /// looked up in the cluster directory and left blank if unknown.
    pub async fn add(&self, peer: &PeerId, nickname: &str) -> Result<FavoritesList> {
        let peer_name = match self.directory.peer_name(peer).await {
            Ok(name) => name.unwrap_or_default(),
            Err(err) => {
                warn!(%peer, error = %err, "peer name lookup failed");
                String::new()
            }
        };
        let entry = FavoriteEntry {
            nickname: nickname.to_string(),
            peer_name,
        };

        let key = self.key();
        let list = self
            .ledger
            .update(&key, |current: Decoded<FavoritesList>| {
                let mut list = current.unwrap_or_default();
                list.upsert(peer.clone(), entry.clone());
                Mutation::Write(list.clone(), list)
            })
            .await
            .map_err(|err| FilesError::from_update(&key, err))?;

        info!(owner = %self.owner, %peer, nickname, "favorite added");
        Ok(list)
    }

    /// Change the nickname of an existing favorite.
    pub async fn rename(&self, peer: &PeerId, nickname: &str) -> Result<FavoritesList> {
        let key = self.key();
        let outcome = self
            .ledger
            .update(&key, |current: Decoded<FavoritesList>| {
                let mut list = current.unwrap_or_default();
                if list.rename(peer, nickname) {
                    Mutation::Write(list.clone(), Ok(list))
                } else {
                    Mutation::Keep(Err(list))
                }
            })
            .await
            .map_err(|err| FilesError::from_update(&key, err))?;

        self.settle(peer, outcome, "favorite renamed")
    }

    /// Drop `peer` from the list.
    pub async fn remove(&self, peer: &PeerId) -> Result<FavoritesList> {
        let key = self.key();
        let outcome = self
            .ledger
            .update(&key, |current: Decoded<FavoritesList>| {
                let mut list = current.unwrap_or_default();
                if list.remove(peer).is_some() {
                    Mutation::Write(list.clone(), Ok(list))
                } else {
                    Mutation::Keep(Err(list))
                }
            })
            .await
            .map_err(|err| FilesError::from_update(&key, err))?;

        self.settle(peer, outcome, "favorite removed")
    }

    pub async fn list(&self) -> Result<FavoritesList> {
        Ok(self
            .ledger
            .read::<FavoritesList>(&self.key())
            .await?
            .unwrap_or_default())
    }

    fn settle(
        &self,
        peer: &PeerId,
        outcome: std::result::Result<FavoritesList, FavoritesList>,
        message: &str,
    ) -> Result<FavoritesList> {
        match outcome {
            Ok(list) => {
                info!(owner = %self.owner, %peer, "{message}");
                Ok(list)
            }
            Err(current) => Err(FilesError::UnknownFavorite {
                peer: peer.clone(),
                current,
            }),
        }
    }
}
