//! Chain reader: pulls contract state into per-field snapshots.
//!
//! Every read takes a sequence number when it starts. A completion only
//! lands if it is newer than whatever produced the current value of that
//! field, so reads finishing out of order never roll a field back. Fields
//! are independent; there is no composite snapshot that could go stale as
//! a whole.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use alloy_primitives::{Address, U256};
use log::{debug, warn};

use crate::calls::abi::{decode_address, decode_bool, decode_uint};
use crate::calls::contract_calls::{
    allowance_call, balance_of_call, mint_price_call, owner_of_call, pending_rewards_call,
    pool_total_call, sale_active_call, token_price_call, user_info_call, ContractAddresses,
};
use crate::error::ReadError;
use crate::rpc::EthCall;

/// Outcome of the latest read of one quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Read<T> {
    /// Never read, or skipped because no wallet is connected.
    #[default]
    Absent,
    Known(T),
    /// The last read failed. Never to be confused with zero.
    Unknown,
}

impl<T> Read<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Read::Known(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Read::Unknown)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Read<U> {
        match self {
            Read::Absent => Read::Absent,
            Read::Known(value) => Read::Known(f(value)),
            Read::Unknown => Read::Unknown,
        }
    }

    fn from_result(result: Result<T, ReadError>) -> Self {
        match result {
            Ok(value) => Read::Known(value),
            Err(_) => Read::Unknown,
        }
    }
}

/// The staking contract's per-user ledger entry, `userInfo(address)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserStakeRecord {
    pub amount: U256,
    pub reward_debt: U256,
    pub boost: U256,
}

/// Connected account and network, owned by the wallet side and injected here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountState {
    pub address: Option<Address>,
    pub chain_id: u64,
}

/// Contract reads the client depends on.
pub trait ContractReader: Send + Sync {
    fn token_balance(&self, owner: Address) -> Result<U256, ReadError>;
    /// Token balance of the staking contract.
    fn pool_total(&self) -> Result<U256, ReadError>;
    /// Allowance granted by `owner` to the staking contract.
    fn allowance(&self, owner: Address) -> Result<U256, ReadError>;
    fn user_info(&self, user: Address) -> Result<UserStakeRecord, ReadError>;
    fn pending_rewards(&self, user: Address) -> Result<U256, ReadError>;
    fn sale_active(&self) -> Result<bool, ReadError>;
    /// `None` when the token is not minted.
    fn owner_of(&self, token_id: u64) -> Result<Option<Address>, ReadError>;
    fn token_price(&self, token_id: u64) -> Result<U256, ReadError>;
    /// Collection-wide price, for contracts without per-token pricing.
    fn mint_price(&self) -> Result<U256, ReadError>;
}

/// `ContractReader` backed by `eth_call`.
pub struct OnChainReader<C> {
    rpc: C,
    contracts: ContractAddresses,
}

impl<C: EthCall> OnChainReader<C> {
    pub fn new(rpc: C, contracts: ContractAddresses) -> Self {
        Self { rpc, contracts }
    }
}

impl<C: EthCall> ContractReader for OnChainReader<C> {
    fn token_balance(&self, owner: Address) -> Result<U256, ReadError> {
        let data = self.rpc.call(&balance_of_call(&self.contracts, owner))?;
        decode_uint(&data, 0)
    }

    fn pool_total(&self) -> Result<U256, ReadError> {
        let data = self.rpc.call(&pool_total_call(&self.contracts))?;
        decode_uint(&data, 0)
    }

    fn allowance(&self, owner: Address) -> Result<U256, ReadError> {
        let data = self.rpc.call(&allowance_call(&self.contracts, owner))?;
        decode_uint(&data, 0)
    }

    fn user_info(&self, user: Address) -> Result<UserStakeRecord, ReadError> {
        let data = self.rpc.call(&user_info_call(&self.contracts, user))?;
        Ok(UserStakeRecord {
            amount: decode_uint(&data, 0)?,
            reward_debt: decode_uint(&data, 1)?,
            boost: decode_uint(&data, 2)?,
        })
    }

    fn pending_rewards(&self, user: Address) -> Result<U256, ReadError> {
        let data = self.rpc.call(&pending_rewards_call(&self.contracts, user))?;
        decode_uint(&data, 0)
    }

    fn sale_active(&self) -> Result<bool, ReadError> {
        let data = self.rpc.call(&sale_active_call(&self.contracts))?;
        decode_bool(&data, 0)
    }

    fn owner_of(&self, token_id: u64) -> Result<Option<Address>, ReadError> {
        // ERC-721 reverts `ownerOf` for tokens that do not exist yet.
        match self.rpc.call(&owner_of_call(&self.contracts, token_id)) {
            Ok(data) => {
                let owner = decode_address(&data, 0)?;
                Ok((!owner.is_zero()).then_some(owner))
            }
            Err(ReadError::Reverted(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn token_price(&self, token_id: u64) -> Result<U256, ReadError> {
        let data = self.rpc.call(&token_price_call(&self.contracts, token_id))?;
        decode_uint(&data, 0)
    }

    fn mint_price(&self) -> Result<U256, ReadError> {
        let data = self.rpc.call(&mint_price_call(&self.contracts))?;
        decode_uint(&data, 0)
    }
}

/// Latest value of every tracked quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshots {
    pub pool_total: Read<U256>,
    pub balance: Read<U256>,
    pub allowance: Read<U256>,
    pub stake: Read<UserStakeRecord>,
    pub pending_rewards: Read<U256>,
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot<T> {
    read: Read<T>,
    seq: u64,
}

impl<T> Slot<T> {
    fn land(&mut self, seq: u64, read: Read<T>) -> bool {
        if seq <= self.seq {
            return false;
        }
        self.seq = seq;
        self.read = read;
        true
    }
}

#[derive(Debug, Default)]
struct SnapshotStore {
    pool_total: Slot<U256>,
    balance: Slot<U256>,
    allowance: Slot<U256>,
    stake: Slot<UserStakeRecord>,
    pending_rewards: Slot<U256>,
}

impl SnapshotStore {
    fn view(&self) -> Snapshots {
        Snapshots {
            pool_total: self.pool_total.read,
            balance: self.balance.read,
            allowance: self.allowance.read,
            stake: self.stake.read,
            pending_rewards: self.pending_rewards.read,
        }
    }
}

/// Shared handle over the snapshots. Cloning shares the same store.
#[derive(Clone)]
pub struct ChainReader {
    source: Arc<dyn ContractReader>,
    account: AccountState,
    store: Arc<Mutex<SnapshotStore>>,
    seq: Arc<AtomicU64>,
}

impl ChainReader {
    pub fn new(source: Arc<dyn ContractReader>, account: AccountState) -> Self {
        Self {
            source,
            account,
            store: Arc::new(Mutex::new(SnapshotStore::default())),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn source(&self) -> &dyn ContractReader {
        self.source.as_ref()
    }

    pub fn snapshots(&self) -> Snapshots {
        self.lock().view()
    }

    fn lock(&self) -> MutexGuard<'_, SnapshotStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn complete<T>(
        &self,
        name: &str,
        seq: u64,
        result: Result<T, ReadError>,
        slot: impl FnOnce(&mut SnapshotStore) -> &mut Slot<T>,
    ) {
        if let Err(e) = &result {
            warn!("{name} read failed: {e}");
        }
        let read = Read::from_result(result);
        if !slot(&mut *self.lock()).land(seq, read) {
            debug!("{name} read #{seq} superseded by a newer one");
        }
    }

    /// Mark a per-user field absent without touching the network.
    fn skip<T>(&self, seq: u64, slot: impl FnOnce(&mut SnapshotStore) -> &mut Slot<T>) {
        slot(&mut *self.lock()).land(seq, Read::Absent);
    }

    pub fn refresh_pool_total(&self) {
        let seq = self.begin();
        let result = self.source.pool_total();
        self.complete("pool total", seq, result, |s| &mut s.pool_total);
    }

    pub fn refresh_balance(&self) {
        let seq = self.begin();
        match self.account.address {
            Some(owner) => {
                let result = self.source.token_balance(owner);
                self.complete("balance", seq, result, |s| &mut s.balance);
            }
            None => self.skip(seq, |s| &mut s.balance),
        }
    }

    pub fn refresh_allowance(&self) {
        let seq = self.begin();
        match self.account.address {
            Some(owner) => {
                let result = self.source.allowance(owner);
                self.complete("allowance", seq, result, |s| &mut s.allowance);
            }
            None => self.skip(seq, |s| &mut s.allowance),
        }
    }

    pub fn refresh_stake(&self) {
        let seq = self.begin();
        match self.account.address {
            Some(user) => {
                let result = self.source.user_info(user);
                self.complete("user info", seq, result, |s| &mut s.stake);
            }
            None => self.skip(seq, |s| &mut s.stake),
        }
    }

    pub fn refresh_pending_rewards(&self) {
        let seq = self.begin();
        match self.account.address {
            Some(user) => {
                let result = self.source.pending_rewards(user);
                self.complete("pending rewards", seq, result, |s| &mut s.pending_rewards);
            }
            None => self.skip(seq, |s| &mut s.pending_rewards),
        }
    }

    pub fn refresh_all(&self) {
        self.refresh_balance();
        self.refresh_allowance();
        self.refresh_stake();
        self.refresh_pending_rewards();
        self.refresh_pool_total();
    }

    /// Re-read the pool total every `interval` on a background thread until
    /// the returned handle is stopped or dropped.
    pub fn spawn_poller(&self, interval: Duration) -> Poller {
        let (stop, stopped) = mpsc::channel::<()>();
        let reader = self.clone();
        let handle = thread::spawn(move || loop {
            reader.refresh_pool_total();
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        Poller {
            stop: Some(stop),
            handle: Some(handle),
        }
    }
}

/// Handle to a running pool poller.
pub struct Poller {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the worker out of its wait.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("pool poller panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
