//! In-memory chain for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};

use crate::amount::WEI_PER_TOKEN;
use crate::calls::abi::{decode_uint, selector};
use crate::calls::contract_calls::{ContractAddresses, TxRequest};
use crate::error::{ReadError, TxError};
use crate::notify::{Notice, NoticeSink, Notifications};
use crate::orchestrator::Orchestrator;
use crate::reader::{AccountState, ChainReader, ContractReader, UserStakeRecord};
use crate::rpc::WalletProvider;

pub fn user() -> Address {
    Address::repeat_byte(0xa1)
}

#[derive(Default)]
pub struct RecordingSink {
    pub shown: Vec<Notice>,
}

impl NoticeSink for RecordingSink {
    fn show(&mut self, notice: &Notice) {
        self.shown.push(notice.clone());
    }
}

/// A connected reader over `chain`, not yet refreshed.
pub fn reader(chain: &Arc<MockChain>) -> ChainReader {
    ChainReader::new(
        chain.clone(),
        AccountState {
            address: Some(user()),
            chain_id: 137,
        },
    )
}

pub fn orchestrator(chain: &Arc<MockChain>) -> Orchestrator<Arc<MockChain>, RecordingSink> {
    let notices = Notifications::new(
        RecordingSink::default(),
        "https://polygonscan.com",
        "FLX",
        Duration::from_secs(6),
    );
    Orchestrator::new(
        chain.clone(),
        notices,
        chain.contracts(),
        AccountState {
            address: Some(user()),
            chain_id: 137,
        },
        137,
    )
}

enum Outcome {
    Mined,
    Revert(Option<String>),
}

struct State {
    pool: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<Address, U256>,
    stakes: HashMap<Address, U256>,
    pending: HashMap<Address, U256>,
    sale_active: bool,
    owners: HashMap<u64, Address>,
    unreadable: HashSet<u64>,
    token_price: Option<U256>,
    mint_price: Option<U256>,
    failing: bool,
    reject_next: bool,
    revert_next: Option<Option<String>>,
    sent: Vec<TxRequest>,
    mempool: HashMap<B256, (Address, TxRequest, Outcome)>,
    nonce: u64,
}

/// Token, staking and NFT contracts in one process. Transactions take
/// effect when their receipt is awaited.
pub struct MockChain {
    contracts: ContractAddresses,
    state: Mutex<State>,
    pool_reads: AtomicUsize,
    user_reads: AtomicUsize,
    nft_reads: AtomicUsize,
}

impl MockChain {
    /// 1000 tokens in the pool and 100 in the user's wallet, nothing else.
    pub fn funded() -> Arc<Self> {
        let contracts = ContractAddresses {
            staking: Address::repeat_byte(0x5a),
            token: Address::repeat_byte(0x70),
            nft: Address::repeat_byte(0x4e),
        };
        let state = State {
            pool: U256::from(1000) * WEI_PER_TOKEN,
            balances: HashMap::from([(user(), U256::from(100) * WEI_PER_TOKEN)]),
            allowances: HashMap::new(),
            stakes: HashMap::new(),
            pending: HashMap::new(),
            sale_active: false,
            owners: HashMap::new(),
            unreadable: HashSet::new(),
            token_price: Some(WEI_PER_TOKEN / U256::from(100)),
            mint_price: None,
            failing: false,
            reject_next: false,
            revert_next: None,
            sent: Vec::new(),
            mempool: HashMap::new(),
            nonce: 0,
        };
        Arc::new(Self {
            contracts,
            state: Mutex::new(state),
            pool_reads: AtomicUsize::new(0),
            user_reads: AtomicUsize::new(0),
            nft_reads: AtomicUsize::new(0),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn contracts(&self) -> ContractAddresses {
        self.contracts
    }

    pub fn pool(&self) -> U256 {
        self.state().pool
    }

    pub fn balance_of(&self, owner: Address) -> U256 {
        self.state().balances.get(&owner).copied().unwrap_or_default()
    }

    pub fn set_pool(&self, amount: U256) {
        self.state().pool = amount;
    }

    pub fn set_balance(&self, amount: U256) {
        self.state().balances.insert(user(), amount);
    }

    pub fn set_allowance(&self, amount: U256) {
        self.state().allowances.insert(user(), amount);
    }

    pub fn set_staked(&self, amount: U256) {
        self.state().stakes.insert(user(), amount);
    }

    pub fn set_pending_rewards(&self, amount: U256) {
        self.state().pending.insert(user(), amount);
    }

    pub fn set_sale_active(&self, active: bool) {
        self.state().sale_active = active;
    }

    pub fn set_owner(&self, token_id: u64, owner: Address) {
        self.state().owners.insert(token_id, owner);
    }

    /// `ownerOf(token_id)` fails with a transport error.
    pub fn unreadable_owner(&self, token_id: u64) {
        self.state().unreadable.insert(token_id);
    }

    /// `None` makes `tokenPrice` revert, as on contracts without per-token pricing.
    pub fn set_token_price(&self, price: Option<U256>) {
        self.state().token_price = price;
    }

    pub fn set_mint_price(&self, price: Option<U256>) {
        self.state().mint_price = price;
    }

    pub fn fail_reads(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// The wallet declines the next transaction.
    pub fn reject_next(&self) {
        self.state().reject_next = true;
    }

    /// The next transaction is mined but reverts.
    pub fn revert_next(&self, reason: Option<&str>) {
        self.state().revert_next = Some(reason.map(str::to_string));
    }

    pub fn sent(&self) -> Vec<TxRequest> {
        self.state().sent.clone()
    }

    pub fn pool_reads(&self) -> usize {
        self.pool_reads.load(Ordering::SeqCst)
    }

    pub fn user_reads(&self) -> usize {
        self.user_reads.load(Ordering::SeqCst)
    }

    pub fn nft_reads(&self) -> usize {
        self.nft_reads.load(Ordering::SeqCst)
    }

    fn read<T>(&self, counter: &AtomicUsize, f: impl FnOnce(&State) -> T) -> Result<T, ReadError> {
        counter.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if state.failing {
            return Err(ReadError::Transport("connection refused".to_string()));
        }
        Ok(f(&*state))
    }
}

fn get(map: &HashMap<Address, U256>, key: Address) -> U256 {
    map.get(&key).copied().unwrap_or_default()
}

impl ContractReader for MockChain {
    fn token_balance(&self, owner: Address) -> Result<U256, ReadError> {
        self.read(&self.user_reads, |s| get(&s.balances, owner))
    }

    fn pool_total(&self) -> Result<U256, ReadError> {
        self.read(&self.pool_reads, |s| s.pool)
    }

    fn allowance(&self, owner: Address) -> Result<U256, ReadError> {
        self.read(&self.user_reads, |s| get(&s.allowances, owner))
    }

    fn user_info(&self, user: Address) -> Result<UserStakeRecord, ReadError> {
        self.read(&self.user_reads, |s| UserStakeRecord {
            amount: get(&s.stakes, user),
            ..Default::default()
        })
    }

    fn pending_rewards(&self, user: Address) -> Result<U256, ReadError> {
        self.read(&self.user_reads, |s| get(&s.pending, user))
    }

    fn sale_active(&self) -> Result<bool, ReadError> {
        self.read(&self.nft_reads, |s| s.sale_active)
    }

    fn owner_of(&self, token_id: u64) -> Result<Option<Address>, ReadError> {
        self.read(&self.nft_reads, |s| {
            if s.unreadable.contains(&token_id) {
                Err(ReadError::Transport("timeout".to_string()))
            } else {
                Ok(s.owners.get(&token_id).copied())
            }
        })?
    }

    fn token_price(&self, _token_id: u64) -> Result<U256, ReadError> {
        self.read(&self.nft_reads, |s| s.token_price)?
            .ok_or_else(|| ReadError::Reverted("execution reverted".to_string()))
    }

    fn mint_price(&self) -> Result<U256, ReadError> {
        self.read(&self.nft_reads, |s| s.mint_price)?
            .ok_or_else(|| ReadError::Reverted("execution reverted".to_string()))
    }
}

impl WalletProvider for MockChain {
    fn send_transaction(&self, from: Address, tx: &TxRequest) -> Result<B256, TxError> {
        let mut state = self.state();
        if std::mem::take(&mut state.reject_next) {
            return Err(TxError::UserRejected);
        }
        state.nonce += 1;
        let hash = B256::from(U256::from(state.nonce));
        let outcome = match state.revert_next.take() {
            Some(reason) => Outcome::Revert(reason),
            None => Outcome::Mined,
        };
        state.sent.push(tx.clone());
        state.mempool.insert(hash, (from, tx.clone(), outcome));
        Ok(hash)
    }

    fn wait_for_receipt(&self, hash: B256) -> Result<(), TxError> {
        let mut state = self.state();
        let (from, tx, outcome) = state
            .mempool
            .remove(&hash)
            .ok_or_else(|| TxError::Provider("unknown transaction".to_string()))?;
        if let Outcome::Revert(reason) = outcome {
            return Err(TxError::ContractReverted { reason });
        }
        apply(&mut state, from, &tx)
    }
}

fn apply(state: &mut State, from: Address, tx: &TxRequest) -> Result<(), TxError> {
    let revert = |reason: &str| TxError::ContractReverted {
        reason: Some(reason.to_string()),
    };
    let args = &tx.data[4..];
    let arg = |index| decode_uint(args, index).map_err(|e| TxError::Provider(e.to_string()));
    let call = &tx.data[..4];

    if call == selector("approve(address,uint256)") {
        state.allowances.insert(from, arg(1)?);
    } else if call == selector("stake(uint256)") {
        let amount = arg(0)?;
        let allowance = get(&state.allowances, from);
        let balance = get(&state.balances, from);
        if allowance < amount {
            return Err(revert("ERC20: insufficient allowance"));
        }
        if balance < amount {
            return Err(revert("ERC20: transfer amount exceeds balance"));
        }
        state.allowances.insert(from, allowance - amount);
        state.balances.insert(from, balance - amount);
        *state.stakes.entry(from).or_default() += amount;
        state.pool += amount;
    } else if call == selector("unstake(uint256)") {
        let amount = arg(0)?;
        let staked = get(&state.stakes, from);
        if staked < amount {
            return Err(revert("insufficient stake"));
        }
        state.stakes.insert(from, staked - amount);
        *state.balances.entry(from).or_default() += amount;
        state.pool = state.pool.saturating_sub(amount);
    } else if call == selector("claimRewards()") {
        let rewards = state.pending.remove(&from).unwrap_or_default();
        *state.balances.entry(from).or_default() += rewards;
    } else if call == selector("mint(uint256)") {
        let token_id = arg(0)?.to::<u64>();
        if !state.sale_active {
            return Err(revert("sale inactive"));
        }
        if state.owners.contains_key(&token_id) {
            return Err(revert("already minted"));
        }
        state.owners.insert(token_id, from);
    } else {
        return Err(TxError::Provider(format!("unexpected call to {}", tx.to)));
    }
    Ok(())
}
