//! Derived dashboard state.
//!
//! Everything here is a pure function of the latest snapshots and the amount
//! the user typed; it is recomputed on every refresh and never cached.

use alloy_primitives::U256;

use crate::amount::{format_ether, parse_positive};
use crate::reader::{Read, Snapshots};

/// Shown instead of a number when the last read of it failed.
pub const UNKNOWN_PLACEHOLDER: &str = "--";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolState {
    Funded,
    Empty,
    /// Not read yet, or the read failed.
    Unknown,
}

impl PoolState {
    pub fn of(pool_total: &Read<U256>) -> Self {
        match pool_total {
            Read::Known(total) if is_pool_empty(*total) => PoolState::Empty,
            Read::Known(_) => PoolState::Funded,
            Read::Absent | Read::Unknown => PoolState::Unknown,
        }
    }

    /// Staking is halted unless the pool is known to hold tokens.
    pub fn halts_staking(self) -> bool {
        self != PoolState::Funded
    }
}

pub fn is_pool_empty(pool_total: U256) -> bool {
    pool_total.is_zero()
}

/// Whether the current allowance covers `amount_input`. An empty or
/// malformed amount is never approved.
pub fn is_approved(allowance: &Read<U256>, amount_input: &str) -> bool {
    match (allowance.known(), parse_positive(amount_input)) {
        (Some(allowance), Some(amount)) => *allowance >= amount,
        _ => false,
    }
}

/// Token amount for display: absent reads show `0`, failed reads a placeholder.
pub fn display_amount(read: &Read<U256>) -> String {
    match read {
        Read::Known(wei) => format_ether(*wei),
        Read::Absent => "0".to_string(),
        Read::Unknown => UNKNOWN_PLACEHOLDER.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedState {
    pub pool: PoolState,
    /// Parsed amount input, `None` when empty, malformed or zero.
    pub amount: Option<U256>,
    pub is_approved: bool,
    pub display_balance: String,
    pub display_pool: String,
    pub display_staked: String,
    pub display_rewards: String,
    pub can_stake: bool,
    pub can_unstake: bool,
    pub can_claim: bool,
}

impl DerivedState {
    pub fn evaluate(snapshots: &Snapshots, amount_input: &str) -> Self {
        let pool = PoolState::of(&snapshots.pool_total);
        let amount = parse_positive(amount_input);
        let staked = snapshots.stake.map(|record| record.amount);

        // The circuit breaker comes first: nothing below can re-enable staking.
        let open = !pool.halts_staking();
        let can_stake = open && amount.is_some();
        let can_unstake = open
            && amount.is_some()
            && staked.known().is_some_and(|amount| !amount.is_zero());
        let can_claim = snapshots
            .pending_rewards
            .known()
            .is_some_and(|rewards| !rewards.is_zero());

        Self {
            pool,
            amount,
            is_approved: is_approved(&snapshots.allowance, amount_input),
            display_balance: display_amount(&snapshots.balance),
            display_pool: display_amount(&snapshots.pool_total),
            display_staked: display_amount(&staked),
            display_rewards: display_amount(&snapshots.pending_rewards),
            can_stake,
            can_unstake,
            can_claim,
        }
    }

    pub fn staking_halted(&self) -> bool {
        self.pool.halts_staking()
    }

    /// Caption of the combined approve/stake action.
    pub fn stake_label(&self, symbol: &str, in_flight: bool) -> String {
        if in_flight {
            "PROCESSING...".to_string()
        } else if self.staking_halted() {
            "POOL EMPTY".to_string()
        } else if self.is_approved {
            format!("STAKE {symbol}")
        } else {
            format!("APPROVE {symbol}")
        }
    }
}
