use super::types::{Disposal, RelayConfig};
use crate::request::types::RequestId;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A unit of bulk data tagged with a disposal policy.
///
/// `server_path` names where the file lives on the worker. It may be written
/// relative; `materialize` resolves it against the worker's staging root, and
/// it is only meaningful as a filesystem location after that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataPacket {
    /// A file carried inline. `body` holds the bytes client-side; packets
    /// with Return/Ftp disposal travel as named references with no body.
    File {
        client_path: String,
        server_path: String,
        disposal: Disposal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Vec<u8>>,
    },
    /// A file fetched from a URL at staging time.
    Url {
        source: String,
        server_path: String,
        disposal: Disposal,
    },
}

impl DataPacket {
    pub fn file(client_path: &str, server_path: &str, disposal: Disposal, body: Vec<u8>) -> Self {
        DataPacket::File {
            client_path: client_path.to_string(),
            server_path: server_path.to_string(),
            disposal,
            body: Some(body),
        }
    }

    /// A named reference to a file the task itself produces worker-side.
    pub fn reference(client_path: &str, server_path: &str, disposal: Disposal) -> Self {
        DataPacket::File {
            client_path: client_path.to_string(),
            server_path: server_path.to_string(),
            disposal,
            body: None,
        }
    }

    pub fn url(source: &str, server_path: &str, disposal: Disposal) -> Self {
        DataPacket::Url {
            source: source.to_string(),
            server_path: server_path.to_string(),
            disposal,
        }
    }

    pub fn disposal(&self) -> Disposal {
        match self {
            DataPacket::File { disposal, .. } | DataPacket::Url { disposal, .. } => *disposal,
        }
    }

    pub fn server_path(&self) -> &str {
        match self {
            DataPacket::File { server_path, .. } | DataPacket::Url { server_path, .. } => {
                server_path
            }
        }
    }

    fn set_server_path(&mut self, resolved: String) {
        match self {
            DataPacket::File { server_path, .. } | DataPacket::Url { server_path, .. } => {
                *server_path = resolved;
            }
        }
    }

    /// The client-side name results should flow back to.
    fn client_ref(&self) -> &str {
        match self {
            DataPacket::File { client_path, .. } => client_path,
            DataPacket::Url { source, .. } => source,
        }
    }

    /// Stages this packet under `dest_root`.
    ///
    /// For Keep/Delete/Update the carried bytes (or the fetched URL body) are
    /// written to the resolved server path, creating parent directories
    /// first. For Return/Ftp no local copy is created; the packet arrives
    /// only as a named reference, and only the path is resolved.
    pub async fn materialize(&mut self, dest_root: &Path, fetch_timeout: Duration) -> Result<()> {
        let resolved = resolve_path(dest_root, self.server_path());

        if matches!(self.disposal(), Disposal::Return | Disposal::Ftp) {
            self.set_server_path(resolved.display().to_string());
            return Ok(());
        }

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create staging directory {}", parent.display())
            })?;
        }

        let bytes = match self {
            DataPacket::File {
                client_path, body, ..
            } => body
                .clone()
                .with_context(|| format!("packet for {} carries no data", client_path))?,
            DataPacket::Url { source, .. } => fetch_url(source, fetch_timeout).await?,
        };

        tokio::fs::write(&resolved, bytes)
            .await
            .with_context(|| format!("failed to stage {}", resolved.display()))?;

        self.set_server_path(resolved.display().to_string());
        Ok(())
    }

    /// Applies the disposal policy after execution, possibly yielding a
    /// packet that must flow back to the client.
    ///
    /// Update and Return leave the worker-side file in place; the return
    /// packet carries its bytes with a Keep policy and a client path equal to
    /// this packet's resolved server path.
    pub async fn dispose(&self, relay: Option<&RelayConfig>) -> Result<Option<DataPacket>> {
        let server_path = self.server_path().to_string();

        match self.disposal() {
            Disposal::Keep => Ok(None),
            Disposal::Delete => {
                tokio::fs::remove_file(&server_path)
                    .await
                    .with_context(|| format!("failed to delete staged file {}", server_path))?;
                Ok(None)
            }
            Disposal::Update | Disposal::Return => {
                let bytes = tokio::fs::read(&server_path)
                    .await
                    .with_context(|| format!("failed to read result file {}", server_path))?;
                Ok(Some(DataPacket::File {
                    client_path: server_path,
                    server_path: self.client_ref().to_string(),
                    disposal: Disposal::Keep,
                    body: Some(bytes),
                }))
            }
            Disposal::Ftp => {
                let relay = relay.context("ftp disposal requested but no relay is configured")?;
                let name = Path::new(&server_path)
                    .file_name()
                    .with_context(|| format!("relay source {} has no file name", server_path))?
                    .to_string_lossy()
                    .to_string();

                tokio::fs::create_dir_all(&relay.dir).await.with_context(|| {
                    format!("failed to create relay directory {}", relay.dir.display())
                })?;
                let relayed = relay.dir.join(&name);
                tokio::fs::copy(&server_path, &relayed)
                    .await
                    .with_context(|| format!("failed to relay {}", server_path))?;
                tokio::fs::remove_file(&server_path)
                    .await
                    .with_context(|| format!("failed to delete relayed file {}", server_path))?;

                let source = format!("{}/{}", relay.base_url.trim_end_matches('/'), name);
                Ok(Some(DataPacket::Url {
                    source,
                    server_path: self.client_ref().to_string(),
                    disposal: Disposal::Keep,
                }))
            }
        }
    }
}

/// An ordered collection of packets keyed by the same request id as the
/// request they accompany.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataPack {
    pub id: RequestId,
    pub packets: Vec<DataPacket>,
}

impl DataPack {
    pub fn new(id: RequestId) -> Self {
        Self {
            id,
            packets: Vec::new(),
        }
    }

    pub fn push(&mut self, packet: DataPacket) {
        self.packets.push(packet);
    }

    /// Stages every member packet under `dest_root`, failing on the first
    /// packet that cannot be staged.
    pub async fn materialize(&mut self, dest_root: &Path, fetch_timeout: Duration) -> Result<()> {
        for packet in &mut self.packets {
            packet.materialize(dest_root, fetch_timeout).await?;
        }
        Ok(())
    }

    /// Disposes of every member packet in order.
    ///
    /// The results concatenate into a new pack under the same id; when no
    /// member yields a return packet the result collapses to `None`, never an
    /// empty pack.
    pub async fn dispose(&self, relay: Option<&RelayConfig>) -> Result<Option<DataPack>> {
        let mut returns = Vec::new();
        for packet in &self.packets {
            if let Some(produced) = packet.dispose(relay).await? {
                returns.push(produced);
            }
        }
        if returns.is_empty() {
            return Ok(None);
        }
        Ok(Some(DataPack {
            id: self.id.clone(),
            packets: returns,
        }))
    }
}

fn resolve_path(dest_root: &Path, server_path: &str) -> PathBuf {
    let path = Path::new(server_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dest_root.join(path)
    }
}

async fn fetch_url(source: &str, fetch_timeout: Duration) -> Result<Vec<u8>> {
    // Network staging is bounded; an unreachable source fails the request
    // instead of hanging the worker.
    let client = reqwest::Client::builder()
        .timeout(fetch_timeout)
        .build()
        .context("failed to build fetch client")?;
    let response = client
        .get(source)
        .send()
        .await
        .with_context(|| format!("failed to fetch {}", source))?;
    if !response.status().is_success() {
        bail!("fetch of {} failed: {}", source, response.status());
    }
    Ok(response.bytes().await?.to_vec())
}
