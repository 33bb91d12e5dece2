//! In-process ledger.
//!
//! [`MemoryLedger`] simulates the custody contract closely enough for replay,
//! live and write paths to run end to end: registration, inspection, custody
//! transfers with status advance, retail progression, recall, and transfers
//! to the quarantine and archive vaults. Every confirmed call mines exactly one
//! block; block `n` is stamped `genesis + n * block_interval`, so replays over
//! the same script always see the same timestamps.
//!
//! [`Faults`] lets tests break individual reads, queries and block lookups.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{EventStream, Ledger, LedgerCall, LedgerError, PendingTx, Receipt};
use crate::event::{EventKind, LedgerEvent, RawEvent};
use crate::model::{Address, ItemId, Status};

/// Default ledger time of block 0: 2024-01-01T00:00:00Z.
pub const DEFAULT_GENESIS_UNIX: i64 = 1_704_067_200;
/// Default spacing between blocks.
pub const DEFAULT_BLOCK_INTERVAL_SECS: i64 = 12;

/// Injected failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Faults {
    /// Owner/status/pointer reads for these items fail with a transport error.
    pub item_reads: BTreeSet<ItemId>,
    /// Historical queries for these kinds fail.
    pub event_queries: BTreeSet<EventKind>,
    /// Block-time lookups for these blocks fail.
    pub block_times: BTreeSet<u64>,
    /// Returned (once) by the next `submit_write`.
    pub reject_next_write: Option<LedgerError>,
    /// Every read fails.
    pub unavailable: bool,
}

#[derive(Debug, Clone)]
struct OnChainItem {
    owner: Address,
    status: u8,
    metadata_pointer: String,
}

#[derive(Debug, Default)]
struct State {
    items: Vec<OnChainItem>,
    height: u64,
    log: Vec<RawEvent>,
    subscribers: HashMap<EventKind, Vec<mpsc::UnboundedSender<RawEvent>>>,
    pending: HashMap<String, (Address, LedgerCall)>,
    next_tx: u64,
    faults: Faults,
}

impl State {
    fn item(&self, id: ItemId) -> Option<&OnChainItem> {
        let index = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        self.items.get(index)
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut OnChainItem> {
        let index = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        self.items.get_mut(index)
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.faults.unavailable {
            return Err(LedgerError::Transport("ledger unreachable".into()));
        }
        Ok(())
    }

    fn check_item_read(&self, id: ItemId) -> Result<(), LedgerError> {
        self.check_available()?;
        if self.faults.item_reads.contains(&id) {
            return Err(LedgerError::Transport(format!("read of item {id} timed out")));
        }
        Ok(())
    }

    /// Validate `call` against contract rules, mutate state, and return the
    /// events it emits. Nothing changes on error.
    fn apply(
        &mut self,
        caller: &Address,
        call: &LedgerCall,
    ) -> Result<(Option<ItemId>, Vec<LedgerEvent>), LedgerError> {
        let revert = |msg: &str| LedgerError::Reverted(msg.to_string());

        match call {
            LedgerCall::Mint { metadata_pointer } => {
                if metadata_pointer.trim().is_empty() {
                    return Err(revert("URI required"));
                }
                let id = ItemId::new_unchecked(self.items.len() as u64 + 1);
                self.items.push(OnChainItem {
                    owner: caller.clone(),
                    status: Status::Created.code(),
                    metadata_pointer: metadata_pointer.clone(),
                });
                Ok((
                    Some(id),
                    vec![
                        LedgerEvent::Transfer {
                            item: id,
                            from: Address::zero(),
                            to: caller.clone(),
                        },
                        LedgerEvent::Minted {
                            item: id,
                            producer: caller.clone(),
                        },
                    ],
                ))
            }
            LedgerCall::Inspect {
                item,
                metadata_pointer,
            } => {
                let state = self.item_mut(*item).ok_or_else(|| revert("Unknown batch"))?;
                if state.status != Status::Created.code() {
                    return Err(revert("Must be in HARVESTED state"));
                }
                state.status = Status::Inspecting.code();
                if let Some(pointer) = metadata_pointer.as_ref().filter(|p| !p.is_empty()) {
                    state.metadata_pointer.clone_from(pointer);
                }
                Ok((
                    None,
                    vec![LedgerEvent::Inspected {
                        item: *item,
                        inspector: caller.clone(),
                    }],
                ))
            }
            LedgerCall::TransferFrom { item, from, to } => {
                let state = self
                    .item_mut(*item)
                    .ok_or_else(|| revert("Token does not exist"))?;
                if state.owner != *from || caller != from {
                    return Err(revert("Not owner nor approved"));
                }
                if to.is_zero() {
                    return Err(revert("Zero address"));
                }

                let transfer = LedgerEvent::Transfer {
                    item: *item,
                    from: from.clone(),
                    to: to.clone(),
                };
                let old = state.status;
                let mut events = vec![transfer];
                match Status::from_code(old) {
                    Ok(Status::Created) => return Err(revert("Cannot transfer in HARVESTED state")),
                    Ok(Status::Inspecting | Status::InTransit) => {
                        let new = old + 1;
                        state.status = new;
                        events.push(LedgerEvent::StatusUpdated {
                            item: *item,
                            updater: caller.clone(),
                            old_code: old,
                            new_code: new,
                        });
                    }
                    Ok(Status::Delivered | Status::Retailed) => {
                        return Err(revert(
                            "Token in DELIVERED/RETAILED state cannot be transferred",
                        ));
                    }
                    Ok(Status::Consumed) => {
                        if to.as_str() != Address::ARCHIVE_VAULT {
                            return Err(revert("Can only transfer CONSUMED to ARCHIVE_VAULT"));
                        }
                        events.push(LedgerEvent::Archived {
                            item: *item,
                            caller: caller.clone(),
                            vault: to.clone(),
                        });
                    }
                    Ok(Status::Recalled) => {
                        if to.as_str() != Address::QUARANTINE_VAULT {
                            return Err(revert("Can only transfer RECALLED to QUARANTINE_VAULT"));
                        }
                    }
                    Ok(Status::NotExist) | Err(_) => return Err(revert("Token does not exist")),
                }
                state.owner = to.clone();
                Ok((None, events))
            }
            LedgerCall::AdvanceRetail { item } => {
                let state = self.item_mut(*item).ok_or_else(|| revert("Unknown batch"))?;
                if state.owner != *caller {
                    return Err(revert("Not current holder"));
                }
                let old = state.status;
                let new = match Status::from_code(old) {
                    Ok(Status::Delivered) => Status::Retailed.code(),
                    Ok(Status::Retailed) => Status::Consumed.code(),
                    _ => return Err(revert("Invalid state for retail progress")),
                };
                state.status = new;
                Ok((
                    None,
                    vec![LedgerEvent::StatusUpdated {
                        item: *item,
                        updater: caller.clone(),
                        old_code: old,
                        new_code: new,
                    }],
                ))
            }
            LedgerCall::Recall { item, reason } => {
                let state = self.item_mut(*item).ok_or_else(|| revert("Unknown batch"))?;
                let old = state.status;
                if old == Status::Consumed.code() {
                    return Err(revert("Cannot recall consumed token"));
                }
                if old == Status::Recalled.code() {
                    return Err(revert("Already recalled"));
                }
                state.status = Status::Recalled.code();
                Ok((
                    None,
                    vec![
                        LedgerEvent::Recalled {
                            item: *item,
                            caller: caller.clone(),
                            reason: reason.clone(),
                        },
                        LedgerEvent::StatusUpdated {
                            item: *item,
                            updater: caller.clone(),
                            old_code: old,
                            new_code: Status::Recalled.code(),
                        },
                    ],
                ))
            }
        }
    }

    /// Mine one block holding `events` and fan them out to subscribers.
    fn commit(&mut self, events: Vec<LedgerEvent>) -> u64 {
        self.height += 1;
        let block = self.height;
        for (index, payload) in events.into_iter().enumerate() {
            let raw = RawEvent::new(block, u32::try_from(index).unwrap_or(u32::MAX), payload);
            if let Some(senders) = self.subscribers.get_mut(&raw.kind()) {
                senders.retain(|tx| tx.send(raw.clone()).is_ok());
            }
            trace!(block, kind = %raw.kind(), item_id = %raw.item(), "event emitted");
            self.log.push(raw);
        }
        block
    }
}

/// Contract simulation held entirely in memory.
#[derive(Debug)]
pub struct MemoryLedger {
    state: Mutex<State>,
    genesis: DateTime<Utc>,
    block_interval: TimeDelta,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(
            DateTime::UNIX_EPOCH + TimeDelta::seconds(DEFAULT_GENESIS_UNIX),
            TimeDelta::seconds(DEFAULT_BLOCK_INTERVAL_SECS),
        )
    }

    #[must_use]
    pub fn with_clock(genesis: DateTime<Utc>, block_interval: TimeDelta) -> Self {
        Self {
            state: Mutex::new(State::default()),
            genesis,
            block_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ledger time of `block`, ignoring faults.
    #[must_use]
    pub fn block_time(&self, block: u64) -> DateTime<Utc> {
        let blocks = i32::try_from(block).unwrap_or(i32::MAX);
        self.genesis + self.block_interval * blocks
    }

    /// Execute `call` immediately as `caller`, mining one block.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Reverted`] when a contract rule refuses the call.
    pub fn execute(&self, caller: &Address, call: &LedgerCall) -> Result<Receipt, LedgerError> {
        let mut state = self.lock();
        let (minted, events) = state.apply(caller, call)?;
        let block_number = state.commit(events);
        state.next_tx += 1;
        let hash = format!("0x{:064x}", state.next_tx);
        debug!(call = call.name(), block = block_number, "ledger call executed");
        Ok(Receipt {
            hash,
            block_number,
            minted,
        })
    }

    /// Mine `blocks` empty blocks.
    pub fn mine(&self, blocks: u64) {
        self.lock().height += blocks;
    }

    /// Adjust injected failures.
    pub fn faults(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.lock().faults);
    }

    /// Open live channels for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock()
            .subscribers
            .get(&kind)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Every event emitted so far, in log order.
    #[must_use]
    pub fn event_log(&self) -> Vec<RawEvent> {
        self.lock().log.clone()
    }

    /// Current height without going through the async interface.
    #[must_use]
    pub fn height(&self) -> u64 {
        self.lock().height
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn item_count(&self) -> Result<u64, LedgerError> {
        let state = self.lock();
        state.check_available()?;
        Ok(state.items.len() as u64)
    }

    async fn owner(&self, item: ItemId) -> Result<Address, LedgerError> {
        let state = self.lock();
        state.check_item_read(item)?;
        state
            .item(item)
            .map(|i| i.owner.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("item {item}")))
    }

    async fn status_code(&self, item: ItemId) -> Result<u8, LedgerError> {
        let state = self.lock();
        state.check_item_read(item)?;
        Ok(state.item(item).map_or(Status::NotExist.code(), |i| i.status))
    }

    async fn metadata_pointer(&self, item: ItemId) -> Result<String, LedgerError> {
        let state = self.lock();
        state.check_item_read(item)?;
        state
            .item(item)
            .map(|i| i.metadata_pointer.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("item {item}")))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        let state = self.lock();
        state.check_available()?;
        Ok(state.height)
    }

    async fn query_events(
        &self,
        kind: EventKind,
        item: Option<ItemId>,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<RawEvent>, LedgerError> {
        let state = self.lock();
        state.check_available()?;
        if state.faults.event_queries.contains(&kind) {
            return Err(LedgerError::Transport(format!("query for {kind} failed")));
        }
        let to_block = to_block.unwrap_or(u64::MAX);
        Ok(state
            .log
            .iter()
            .filter(|raw| raw.kind() == kind)
            .filter(|raw| item.is_none_or(|id| raw.item() == id))
            .filter(|raw| (from_block..=to_block).contains(&raw.block_number))
            .cloned()
            .collect())
    }

    async fn resolve_block_time(&self, block: u64) -> Result<DateTime<Utc>, LedgerError> {
        {
            let state = self.lock();
            state.check_available()?;
            if state.faults.block_times.contains(&block) {
                return Err(LedgerError::Transport(format!("block {block} lookup failed")));
            }
            if block > state.height {
                return Err(LedgerError::NotFound(format!("block {block}")));
            }
        }
        Ok(self.block_time(block))
    }

    async fn subscribe(&self, kind: EventKind) -> Result<EventStream, LedgerError> {
        let mut state = self.lock();
        state.check_available()?;
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.entry(kind).or_default().push(tx);
        Ok(rx)
    }

    fn unsubscribe_all(&self, kind: EventKind) {
        self.lock().subscribers.remove(&kind);
    }

    async fn submit_write(
        &self,
        caller: &Address,
        call: &LedgerCall,
    ) -> Result<PendingTx, LedgerError> {
        let mut state = self.lock();
        if let Some(err) = state.faults.reject_next_write.take() {
            return Err(err);
        }
        state.check_available()?;
        state.next_tx += 1;
        let hash = format!("0x{:064x}", state.next_tx);
        state
            .pending
            .insert(hash.clone(), (caller.clone(), call.clone()));
        Ok(PendingTx { hash })
    }

    async fn await_confirmation(&self, tx: &PendingTx) -> Result<Receipt, LedgerError> {
        let mut state = self.lock();
        let (caller, call) = state
            .pending
            .remove(&tx.hash)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {}", tx.hash)))?;
        let (minted, events) = state.apply(&caller, &call)?;
        let block_number = state.commit(events);
        debug!(call = call.name(), block = block_number, tx = %tx.hash, "write confirmed");
        Ok(Receipt {
            hash: tx.hash.clone(),
            block_number,
            minted,
        })
    }
}
