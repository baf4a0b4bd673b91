//! Transaction notices.
//!
//! Each submitted transaction gets exactly one notice lifecycle: a loading
//! notice that is replaced in place by a success or failure notice. Settled
//! notices disappear after a fixed duration unless updated again.

use std::time::{Duration, Instant};

use alloy_primitives::B256;
use colorful::Colorful;

use crate::error::{GuardViolation, TxError};
use crate::orchestrator::TxKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Loading,
    Success,
    /// The user backed out; nothing went wrong on chain.
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoticeId(u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub level: NoticeLevel,
    pub message: String,
    pub link: Option<String>,
}

/// Where notices end up.
pub trait NoticeSink {
    fn show(&mut self, notice: &Notice);
}

/// Prints notices to the terminal.
#[derive(Default)]
pub struct ConsoleSink;

impl NoticeSink for ConsoleSink {
    fn show(&mut self, notice: &Notice) {
        let text = match notice.level {
            NoticeLevel::Loading => notice.message.clone().yellow().to_string(),
            NoticeLevel::Success => notice.message.clone().green().to_string(),
            NoticeLevel::Warning => notice.message.clone().magenta().to_string(),
            NoticeLevel::Error => notice.message.clone().red().to_string(),
        };
        match &notice.link {
            Some(link) => println!("{text}\n  {link}"),
            None => println!("{text}"),
        }
    }
}

pub fn explorer_tx_url(explorer_url: &str, hash: B256) -> String {
    format!("{}/tx/0x{}", explorer_url.trim_end_matches('/'), hex::encode(hash))
}

pub fn loading_message(kind: TxKind, symbol: &str) -> String {
    match kind {
        TxKind::Approve => format!("Approving {symbol}..."),
        TxKind::Stake => "Executing Stake...".to_string(),
        TxKind::Unstake => format!("Unstaking {symbol}..."),
        TxKind::Claim => "Claiming Rewards...".to_string(),
        TxKind::Mint(token_id) => format!("Minting NFT #{token_id}..."),
    }
}

pub fn success_message(kind: TxKind) -> &'static str {
    match kind {
        TxKind::Approve => "Approved! Now you can stake.",
        TxKind::Stake => "Staked Successfully!",
        TxKind::Unstake => "Unstaked Successfully!",
        TxKind::Claim => "Rewards Claimed!",
        TxKind::Mint(_) => "Minted successfully!",
    }
}

pub fn failure_message(err: &TxError) -> String {
    let text = err.to_string();
    if text.trim().is_empty() {
        "Transaction Failed".to_string()
    } else {
        text
    }
}

struct Active {
    notice: Notice,
    expires_at: Option<Instant>,
}

pub struct Notifications<S> {
    sink: S,
    explorer_url: String,
    symbol: String,
    duration: Duration,
    active: Vec<Active>,
    next_id: u64,
}

impl<S: NoticeSink> Notifications<S> {
    pub fn new(sink: S, explorer_url: &str, symbol: &str, duration: Duration) -> Self {
        Self {
            sink,
            explorer_url: explorer_url.to_string(),
            symbol: symbol.to_string(),
            duration,
            active: Vec::new(),
            next_id: 0,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Open the lifecycle of a freshly submitted transaction.
    pub fn submitted(&mut self, kind: TxKind, now: Instant) -> NoticeId {
        let id = self.allocate();
        let message = loading_message(kind, &self.symbol);
        self.post(id, NoticeLevel::Loading, message, None, now);
        id
    }

    pub fn confirmed(&mut self, id: NoticeId, kind: TxKind, hash: B256, now: Instant) {
        let link = explorer_tx_url(&self.explorer_url, hash);
        self.post(id, NoticeLevel::Success, success_message(kind).to_string(), Some(link), now);
    }

    pub fn failed(&mut self, id: NoticeId, err: &TxError, now: Instant) {
        let level = match err {
            TxError::UserRejected => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        self.post(id, level, failure_message(err), None, now);
    }

    /// A guard stopped the action before any transaction existed.
    pub fn refused(&mut self, violation: GuardViolation, now: Instant) {
        let id = self.allocate();
        self.post(id, NoticeLevel::Error, violation.to_string(), None, now);
    }

    /// Notices still on screen at `now`.
    pub fn visible(&self, now: Instant) -> Vec<&Notice> {
        self.active
            .iter()
            .filter(|a| a.expires_at.map_or(true, |at| now < at))
            .map(|a| &a.notice)
            .collect()
    }

    pub fn prune(&mut self, now: Instant) {
        self.active
            .retain(|a| a.expires_at.map_or(true, |at| now < at));
    }

    fn allocate(&mut self) -> NoticeId {
        self.next_id += 1;
        NoticeId(self.next_id)
    }

    fn post(&mut self, id: NoticeId, level: NoticeLevel, message: String, link: Option<String>, now: Instant) {
        let notice = Notice {
            id,
            level,
            message,
            link,
        };
        // Loading notices stay until their transaction settles.
        let expires_at = (level != NoticeLevel::Loading).then(|| now + self.duration);
        self.sink.show(&notice);
        match self.active.iter_mut().find(|a| a.notice.id == id) {
            Some(active) => {
                active.notice = notice;
                active.expires_at = expires_at;
            }
            None => self.active.push(Active { notice, expires_at }),
        }
    }
}
