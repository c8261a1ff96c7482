//! Digest delivery.
//!
//! [`OutboxSink`] writes each digest as a JSON mail message into an outbox
//! directory; a mail relay or a human picks them up from there.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use amendwatch_shared::{
    AmendWatchError, DigestBody, NotifyConfig, Partition, Result, expand_home,
};

/// Receives rendered digests.
#[async_trait]
pub trait DigestSink: Send + Sync {
    async fn send(&self, digest: &DigestBody, partition: Partition) -> Result<()>;
}

/// One queued message, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub partition: Partition,
    pub created_at: DateTime<Utc>,
}

/// Writes `<outbox_dir>/<partition>-<uuid>.json` per digest.
pub struct OutboxSink {
    dir: PathBuf,
    from: String,
    to: Vec<String>,
}

impl OutboxSink {
    pub fn new(dir: impl Into<PathBuf>, from: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            from: from.into(),
            to,
        }
    }

    /// `None` when no sender or no recipients are configured.
    pub fn from_config(config: &NotifyConfig) -> Option<Self> {
        let Some(from) = config.from.as_deref().filter(|f| !f.is_empty()) else {
            info!("no sender configured, digests will not be sent");
            return None;
        };
        if config.to.is_empty() {
            info!("no recipients configured, digests will not be sent");
            return None;
        }
        Some(Self::new(
            expand_home(&config.outbox_dir),
            from,
            config.to.clone(),
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DigestSink for OutboxSink {
    async fn send(&self, digest: &DigestBody, partition: Partition) -> Result<()> {
        let message = OutboxMessage {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: digest.subject.clone(),
            html: digest.html.clone(),
            partition,
            created_at: Utc::now(),
        };
        let body = serde_json::to_string_pretty(&message)
            .map_err(|e| AmendWatchError::Notify(format!("encode message: {e}")))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AmendWatchError::io(&self.dir, e))?;

        let path = self
            .dir
            .join(format!("{partition}-{}.json", Uuid::now_v7()));
        if let Err(e) = tokio::fs::write(&path, body).await {
            warn!(path = %path.display(), error = %e, "failed to queue digest");
            return Err(AmendWatchError::io(&path, e));
        }

        info!(path = %path.display(), recipients = self.to.len(), "digest queued");
        Ok(())
    }
}
