//! Transaction orchestration.
//!
//! Staking is a two-step protocol: an `approve` for exactly the amount,
//! then the `stake` itself. Each submission produces exactly one
//! transaction, chosen by [`plan_stake`]; confirming an approval stops in
//! [`FlowState::Approved`] and the stake needs a second submission.
//!
//! Only one transaction may be in flight. Submitting while one is pending
//! is refused locally, since a second transaction would race the wallet's
//! nonce sequence.

use std::time::Instant;

use alloy_primitives::{Address, B256, U256};
use log::{debug, info};

use crate::calls::contract_calls::{
    approve_call, claim_rewards_call, mint_call, stake_call, unstake_call, ContractAddresses,
    TxRequest,
};
use crate::error::{GuardViolation, TxError};
use crate::nft::MintTicket;
use crate::notify::{NoticeId, NoticeSink, Notifications};
use crate::reader::{AccountState, ChainReader};
use crate::rpc::WalletProvider;
use crate::state::DerivedState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxKind {
    Approve,
    Stake,
    Unstake,
    Claim,
    Mint(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Submitted,
    Confirmed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub kind: TxKind,
    pub hash: B256,
    pub status: TxStatus,
    notice: NoticeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingApproval { tx: PendingTransaction, amount: U256 },
    /// Allowance granted. The stake is a separate, user-initiated submission.
    Approved { amount: U256 },
    AwaitingStake { tx: PendingTransaction },
    Done,
    AwaitingUnstake { tx: PendingTransaction },
    AwaitingClaim { tx: PendingTransaction },
    AwaitingMint { tx: PendingTransaction },
    Failed { tx: PendingTransaction, error: TxError },
}

impl FlowState {
    pub fn in_flight(&self) -> Option<&PendingTransaction> {
        match self {
            FlowState::AwaitingApproval { tx, .. }
            | FlowState::AwaitingStake { tx }
            | FlowState::AwaitingUnstake { tx }
            | FlowState::AwaitingClaim { tx }
            | FlowState::AwaitingMint { tx } => Some(tx),
            _ => None,
        }
    }
}

/// The single transaction a stake submission will send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeStep {
    Approve(U256),
    Stake(U256),
}

/// Pick the next step of the stake flow. The pool check runs first so an
/// empty or unreadable pool blocks staking whatever the allowance says.
pub fn plan_stake(derived: &DerivedState) -> Result<StakeStep, GuardViolation> {
    if derived.staking_halted() {
        return Err(GuardViolation::PoolHalted);
    }
    let amount = derived.amount.ok_or(GuardViolation::InvalidAmount)?;
    if derived.is_approved {
        Ok(StakeStep::Stake(amount))
    } else {
        Ok(StakeStep::Approve(amount))
    }
}

pub struct Orchestrator<W, S> {
    wallet: W,
    notices: Notifications<S>,
    contracts: ContractAddresses,
    account: AccountState,
    expected_chain_id: u64,
    state: FlowState,
    amount_input: String,
    last_failure: Option<(TxKind, TxError)>,
}

impl<W: WalletProvider, S: NoticeSink> Orchestrator<W, S> {
    pub fn new(
        wallet: W,
        notices: Notifications<S>,
        contracts: ContractAddresses,
        account: AccountState,
        expected_chain_id: u64,
    ) -> Self {
        Self {
            wallet,
            notices,
            contracts,
            account,
            expected_chain_id,
            state: FlowState::Idle,
            amount_input: String::new(),
            last_failure: None,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn notices(&self) -> &Notifications<S> {
        &self.notices
    }

    pub fn amount_input(&self) -> &str {
        &self.amount_input
    }

    pub fn set_amount(&mut self, input: &str) {
        self.amount_input = input.trim().to_string();
    }

    pub fn last_failure(&self) -> Option<&(TxKind, TxError)> {
        self.last_failure.as_ref()
    }

    pub fn derived(&self, reader: &ChainReader) -> DerivedState {
        DerivedState::evaluate(&reader.snapshots(), &self.amount_input)
    }

    /// Submit whichever of approve or stake the current amount needs.
    pub fn submit_stake(&mut self, reader: &ChainReader) -> Result<PendingTransaction, TxError> {
        let derived = self.derived(reader);
        let step = self.guarded(|_| plan_stake(&derived))?;
        debug!("stake step {step:?}");
        match step {
            StakeStep::Approve(amount) => {
                let tx = approve_call(&self.contracts, amount);
                self.submit(TxKind::Approve, tx, |tx| FlowState::AwaitingApproval { tx, amount })
            }
            StakeStep::Stake(amount) => {
                let tx = stake_call(&self.contracts, amount);
                self.submit(TxKind::Stake, tx, |tx| FlowState::AwaitingStake { tx })
            }
        }
    }

    pub fn submit_unstake(&mut self, reader: &ChainReader) -> Result<PendingTransaction, TxError> {
        let derived = self.derived(reader);
        let amount = self.guarded(|_| {
            if derived.staking_halted() {
                return Err(GuardViolation::PoolHalted);
            }
            let amount = derived.amount.ok_or(GuardViolation::InvalidAmount)?;
            if !derived.can_unstake {
                return Err(GuardViolation::NothingStaked);
            }
            Ok(amount)
        })?;
        let tx = unstake_call(&self.contracts, amount);
        self.submit(TxKind::Unstake, tx, |tx| FlowState::AwaitingUnstake { tx })
    }

    pub fn submit_claim(&mut self, reader: &ChainReader) -> Result<PendingTransaction, TxError> {
        let derived = self.derived(reader);
        self.guarded(|_| {
            if derived.can_claim {
                Ok(())
            } else {
                Err(GuardViolation::NoRewards)
            }
        })?;
        let tx = claim_rewards_call(&self.contracts);
        self.submit(TxKind::Claim, tx, |tx| FlowState::AwaitingClaim { tx })
    }

    pub fn submit_mint(&mut self, ticket: MintTicket) -> Result<PendingTransaction, TxError> {
        self.guarded(|_| Ok(()))?;
        let kind = TxKind::Mint(ticket.token_id());
        let tx = mint_call(&self.contracts, ticket.token_id(), ticket.price());
        self.submit(kind, tx, |tx| FlowState::AwaitingMint { tx })
    }

    /// Wait for the in-flight transaction to be mined and reconcile.
    ///
    /// Success refreshes every snapshot; failure leaves them untouched.
    pub fn settle(&mut self, reader: &ChainReader) -> Result<PendingTransaction, TxError> {
        let mut tx = *self
            .state
            .in_flight()
            .ok_or(TxError::Guard(GuardViolation::NothingPending))?;

        match self.wallet.wait_for_receipt(tx.hash) {
            Ok(()) => {
                tx.status = TxStatus::Confirmed;
                info!("{:?} confirmed in {}", tx.kind, tx.hash);
                self.notices
                    .confirmed(tx.notice, tx.kind, tx.hash, Instant::now());
                let next = match (tx.kind, &self.state) {
                    (TxKind::Approve, FlowState::AwaitingApproval { amount, .. }) => {
                        FlowState::Approved { amount: *amount }
                    }
                    (TxKind::Stake, _) => {
                        self.amount_input.clear();
                        FlowState::Done
                    }
                    _ => FlowState::Idle,
                };
                self.transition(next);
                reader.refresh_all();
                Ok(tx)
            }
            Err(error) => {
                tx.status = TxStatus::Failed;
                self.fail(tx, error.clone());
                Err(error)
            }
        }
    }

    /// Submit then settle in one call.
    pub fn execute(
        &mut self,
        reader: &ChainReader,
        submit: impl FnOnce(&mut Self, &ChainReader) -> Result<PendingTransaction, TxError>,
    ) -> Result<PendingTransaction, TxError> {
        submit(self, reader)?;
        self.settle(reader)
    }

    /// Run the shared guards (one in flight, wallet, network) and then the
    /// action-specific one. Violations are reported and nothing is sent.
    fn guarded<T>(
        &mut self,
        check: impl FnOnce(Address) -> Result<T, GuardViolation>,
    ) -> Result<T, TxError> {
        self.sender()
            .and_then(check)
            .map_err(|violation| self.refuse(violation))
    }

    /// Report a guard violation found outside the orchestrator, such as a
    /// refused mint.
    pub fn refuse(&mut self, violation: GuardViolation) -> TxError {
        debug!("refused locally: {violation}");
        self.notices.refused(violation, Instant::now());
        TxError::Guard(violation)
    }

    fn sender(&self) -> Result<Address, GuardViolation> {
        if self.state.in_flight().is_some() {
            return Err(GuardViolation::TransactionInFlight);
        }
        let from = self
            .account
            .address
            .ok_or(GuardViolation::WalletDisconnected)?;
        if self.account.chain_id != self.expected_chain_id {
            return Err(GuardViolation::WrongNetwork);
        }
        Ok(from)
    }

    fn submit(
        &mut self,
        kind: TxKind,
        request: TxRequest,
        awaiting: impl FnOnce(PendingTransaction) -> FlowState,
    ) -> Result<PendingTransaction, TxError> {
        let from = self.sender().map_err(TxError::Guard)?;
        let notice = self.notices.submitted(kind, Instant::now());
        match self.wallet.send_transaction(from, &request) {
            Ok(hash) => {
                let tx = PendingTransaction {
                    kind,
                    hash,
                    status: TxStatus::Submitted,
                    notice,
                };
                info!("{kind:?} submitted as {hash}");
                self.transition(awaiting(tx));
                Ok(tx)
            }
            Err(error) => {
                let tx = PendingTransaction {
                    kind,
                    hash: B256::ZERO,
                    status: TxStatus::Failed,
                    notice,
                };
                self.fail(tx, error.clone());
                Err(error)
            }
        }
    }

    fn fail(&mut self, tx: PendingTransaction, error: TxError) {
        self.notices.failed(tx.notice, &error, Instant::now());
        self.last_failure = Some((tx.kind, error.clone()));
        self.transition(FlowState::Failed { tx, error });
        self.transition(FlowState::Idle);
    }

    fn transition(&mut self, next: FlowState) {
        debug!("flow {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
