//! Scripted ledger histories.
//!
//! A [`LedgerScript`] is a JSON list of contract calls replayed into a fresh
//! [`MemoryLedger`]. The CLI uses it as a stand-in for a live chain.
//!
//! ```json
//! {
//!   "block_interval_secs": 12,
//!   "ops": [
//!     { "op": "mint", "caller": "0xfarm", "metadata": "ipfs://cid/meta.json" },
//!     { "op": "inspect", "caller": "0xinsp", "item": 1 },
//!     { "op": "transfer", "caller": "0xfarm", "item": 1, "to": "0xship" },
//!     { "op": "mine", "blocks": 5 }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::memory::{DEFAULT_BLOCK_INTERVAL_SECS, DEFAULT_GENESIS_UNIX};
use super::{LedgerCall, LedgerError, MemoryLedger};
use crate::model::{Address, ItemId};

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    Mint {
        caller: Address,
        metadata: String,
    },
    Inspect {
        caller: Address,
        item: ItemId,
        #[serde(default)]
        metadata: Option<String>,
    },
    /// Transfer from the caller to `to`.
    Transfer {
        caller: Address,
        item: ItemId,
        to: Address,
    },
    AdvanceRetail {
        caller: Address,
        item: ItemId,
    },
    Recall {
        caller: Address,
        item: ItemId,
        reason: String,
    },
    /// Mine empty blocks.
    Mine { blocks: u64 },
}

impl ScriptOp {
    /// The caller and contract call for this step, or `None` for `Mine`.
    #[must_use]
    pub fn to_call(&self) -> Option<(Address, LedgerCall)> {
        let pair = match self {
            Self::Mint { caller, metadata } => (
                caller.clone(),
                LedgerCall::Mint {
                    metadata_pointer: metadata.clone(),
                },
            ),
            Self::Inspect {
                caller,
                item,
                metadata,
            } => (
                caller.clone(),
                LedgerCall::Inspect {
                    item: *item,
                    metadata_pointer: metadata.clone(),
                },
            ),
            Self::Transfer { caller, item, to } => (
                caller.clone(),
                LedgerCall::TransferFrom {
                    item: *item,
                    from: caller.clone(),
                    to: to.clone(),
                },
            ),
            Self::AdvanceRetail { caller, item } => {
                (caller.clone(), LedgerCall::AdvanceRetail { item: *item })
            }
            Self::Recall {
                caller,
                item,
                reason,
            } => (
                caller.clone(),
                LedgerCall::Recall {
                    item: *item,
                    reason: reason.clone(),
                },
            ),
            Self::Mine { .. } => return None,
        };
        Some(pair)
    }
}

/// A whole scripted history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_interval_secs: Option<i64>,
    #[serde(default)]
    pub ops: Vec<ScriptOp>,
}

/// A scripted step was refused by the contract.
#[derive(Debug, thiserror::Error)]
#[error("script step {step} ({op}) failed: {source}")]
pub struct ScriptError {
    pub step: usize,
    pub op: &'static str,
    #[source]
    pub source: LedgerError,
}

impl LedgerScript {
    /// Read a script from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid script.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read ledger script {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse ledger script {}", path.display()))
    }

    /// Build a fresh ledger and run every step against it.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] for the first step the contract refuses.
    pub fn build(&self) -> Result<MemoryLedger, ScriptError> {
        let genesis = self
            .genesis
            .unwrap_or(DateTime::UNIX_EPOCH + TimeDelta::seconds(DEFAULT_GENESIS_UNIX));
        let interval =
            TimeDelta::seconds(self.block_interval_secs.unwrap_or(DEFAULT_BLOCK_INTERVAL_SECS));
        let ledger = MemoryLedger::with_clock(genesis, interval);
        self.apply_to(&ledger)?;
        Ok(ledger)
    }

    /// Run every step against an existing ledger.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] for the first step the contract refuses.
    pub fn apply_to(&self, ledger: &MemoryLedger) -> Result<(), ScriptError> {
        for (step, op) in self.ops.iter().enumerate() {
            let Some((caller, call)) = op.to_call() else {
                if let ScriptOp::Mine { blocks } = op {
                    ledger.mine(*blocks);
                }
                continue;
            };
            ledger
                .execute(&caller, &call)
                .map_err(|source| ScriptError {
                    step: step + 1,
                    op: call.name(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use tempfile::TempDir;

    const SCRIPT: &str = r#"{
        "ops": [
            { "op": "mint", "caller": "0xFarm", "metadata": "ipfs://cid/meta.json" },
            { "op": "inspect", "caller": "0xinsp", "item": 1 },
            { "op": "mine", "blocks": 3 },
            { "op": "transfer", "caller": "0xfarm", "item": 1, "to": "0xship" }
        ]
    }"#;

    #[tokio::test]
    async fn script_builds_ledger() {
        let script: LedgerScript = serde_json::from_str(SCRIPT).unwrap();
        let ledger = script.build().unwrap();
        let item = ItemId::new_unchecked(1);
        assert_eq!(ledger.status_code(item).await.unwrap(), 3);
        assert_eq!(ledger.owner(item).await.unwrap().as_str(), "0xship");
        assert_eq!(ledger.height(), 6);
    }

    #[test]
    fn failing_step_is_reported_with_position() {
        let script = LedgerScript {
            ops: vec![ScriptOp::Inspect {
                caller: Address::new("0xinsp"),
                item: ItemId::new_unchecked(4),
                metadata: None,
            }],
            ..LedgerScript::default()
        };
        let err = script.build().unwrap_err();
        assert_eq!(err.step, 1);
        assert_eq!(err.op, "inspect");
        assert!(err.to_string().contains("Unknown batch"));
    }

    #[test]
    fn from_path_reads_json() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, SCRIPT).unwrap();
        let script = LedgerScript::from_path(&path).unwrap();
        assert_eq!(script.ops.len(), 4);
        assert!(LedgerScript::from_path(&dir.path().join("missing.json")).is_err());
    }
}
