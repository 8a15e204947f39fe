use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// The post-execution fate of a staged file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Disposal {
    /// Remove the worker-side file after execution.
    Delete,
    /// Leave the worker-side file in place.
    Keep,
    /// The file is produced worker-side and flows back to the client.
    Return,
    /// The file is moved into a relay directory and flows back as a URL.
    Ftp,
    /// The client's file is staged, possibly modified, and flows back.
    Update,
}

impl FromStr for Disposal {
    type Err = anyhow::Error;

    /// Parses a policy name case-insensitively; single-letter abbreviations
    /// are accepted. Anything unrecognized is a hard error, never a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "delete" | "d" => Ok(Disposal::Delete),
            "keep" | "k" => Ok(Disposal::Keep),
            "return" | "r" => Ok(Disposal::Return),
            "ftp" | "f" => Ok(Disposal::Ftp),
            "update" | "u" => Ok(Disposal::Update),
            other => bail!(
                "unrecognized disposal policy {:?} (expected delete/keep/return/ftp/update or d/k/r/f/u)",
                other
            ),
        }
    }
}

/// External settings for the Ftp disposal policy: a local relay directory and
/// the public base URL it is served under. Used only by disposal.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub dir: PathBuf,
    pub base_url: String,
}
