use thiserror::Error;

/// Why a submitted (or attempted) transaction did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("You rejected the transaction")]
    UserRejected,

    #[error("{}", reason.as_deref().unwrap_or("Transaction Failed"))]
    ContractReverted { reason: Option<String> },

    #[error("{0}")]
    Provider(String),

    #[error(transparent)]
    Guard(#[from] GuardViolation),
}

/// A read that could not produce a value. The caller records it as unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed return data: {0}")]
    Decode(String),
}

/// Preconditions checked locally; a violation never reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("Reward pool is empty or unreadable: staking paused")]
    PoolHalted,

    #[error("Enter a valid positive amount")]
    InvalidAmount,

    #[error("Nothing staked")]
    NothingStaked,

    #[error("No rewards to claim")]
    NoRewards,

    #[error("Wallet not connected")]
    WalletDisconnected,

    #[error("Wrong network")]
    WrongNetwork,

    #[error("A transaction is already pending")]
    TransactionInFlight,

    #[error("No transaction is pending")]
    NothingPending,

    #[error("Mint sale is currently inactive")]
    SaleInactive,

    #[error("Token already minted")]
    AlreadyMinted,

    #[error("Token id is outside the collection")]
    TokenOutOfRange,
}
