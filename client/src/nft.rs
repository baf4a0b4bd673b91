//! Fluxon coin NFT collection: rarity tiers, the minted scan, listing and
//! guarded mints.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use log::{debug, warn};

use crate::error::GuardViolation;
use crate::reader::{ContractReader, Read};

pub const MAX_NFTS: u64 = 500;
pub const PAGE_SIZE: usize = 50;
pub const DEFAULT_NFT_CONTRACT: &str = "0x74643E4D2Ef45Bf7Bca9F251C75d25678442218C";
pub const DEFAULT_IMAGE_BASE_URL: &str =
    "https://ipfs.io/ipfs/bafybeialcvwyzpyaoskn5waqj4vp7s7mlieaf35yl7tiufwpt6tbtmq3ye";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rarity {
    Legendary,
    Rare,
    Common,
}

impl Rarity {
    pub const ALL: [Rarity; 3] = [Rarity::Legendary, Rarity::Rare, Rarity::Common];

    pub fn of(token_id: u64) -> Self {
        match token_id {
            0..=50 => Rarity::Legendary,
            51..=200 => Rarity::Rare,
            _ => Rarity::Common,
        }
    }

    pub fn capacity(self) -> u64 {
        match self {
            Rarity::Legendary => 50,
            Rarity::Rare => 150,
            Rarity::Common => 300,
        }
    }

    pub fn ids(self) -> impl Iterator<Item = u64> {
        (1..=MAX_NFTS).filter(move |id| Rarity::of(*id) == self)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rarity::Legendary => "Legendary",
            Rarity::Rare => "Rare",
            Rarity::Common => "Common",
        };
        f.pad(name)
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legendary" => Ok(Rarity::Legendary),
            "rare" => Ok(Rarity::Rare),
            "common" => Ok(Rarity::Common),
            other => Err(format!("unknown rarity {other}")),
        }
    }
}

pub fn image_url(base_url: &str, token_id: u64) -> String {
    format!(
        "{}/{}/FluxonCoin_{:03}.png",
        base_url.trim_end_matches('/'),
        Rarity::of(token_id),
        token_id
    )
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Minted,
    Unminted,
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "minted" => Ok(Filter::Minted),
            "unminted" => Ok(Filter::Unminted),
            other => Err(format!("unknown filter {other}")),
        }
    }
}

/// Result of asking `ownerOf` about every token in the collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MintedScan {
    pub minted: BTreeSet<u64>,
    /// Ids whose owner could not be read. Counted as neither minted nor free.
    pub unknown: BTreeSet<u64>,
}

impl MintedScan {
    pub fn minted_in(&self, rarity: Rarity) -> usize {
        self.minted.iter().filter(|id| Rarity::of(**id) == rarity).count()
    }

    /// One page of `rarity` ids matching `filter`. Pages start at 1.
    pub fn page(&self, rarity: Rarity, filter: Filter, page: usize) -> Vec<u64> {
        rarity
            .ids()
            .filter(|id| match filter {
                Filter::All => true,
                Filter::Minted => self.minted.contains(id),
                Filter::Unminted => !self.minted.contains(id) && !self.unknown.contains(id),
            })
            .skip(page.saturating_sub(1).saturating_mul(PAGE_SIZE))
            .take(PAGE_SIZE)
            .collect()
    }
}

pub fn scan_minted(source: &dyn ContractReader) -> MintedScan {
    let mut scan = MintedScan::default();
    for id in 1..=MAX_NFTS {
        match source.owner_of(id) {
            Ok(Some(_)) => {
                scan.minted.insert(id);
            }
            Ok(None) => {}
            Err(e) => {
                debug!("ownerOf({id}) failed: {e}");
                scan.unknown.insert(id);
            }
        }
    }
    if !scan.unknown.is_empty() {
        warn!("{} token owners could not be read", scan.unknown.len());
    }
    scan
}

pub fn sale_status(sale_active: &Read<bool>) -> &'static str {
    match sale_active {
        Read::Known(true) => "ACTIVE",
        Read::Known(false) => "INACTIVE",
        Read::Absent | Read::Unknown => "UNKNOWN",
    }
}

/// Proof that a mint passed its guards. Only [`prepare_mint`] creates one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintTicket {
    token_id: u64,
    price: U256,
}

impl MintTicket {
    pub fn token_id(&self) -> u64 {
        self.token_id
    }

    pub fn price(&self) -> U256 {
        self.price
    }
}

/// Check that `token_id` can be minted now and settle its price: the
/// token's own price, else the collection price, else `fallback_price`.
///
/// The sale must be readably active. An unreadable owner does not block:
/// the contract rejects a duplicate mint anyway.
pub fn prepare_mint(
    source: &dyn ContractReader,
    token_id: u64,
    fallback_price: U256,
) -> Result<MintTicket, GuardViolation> {
    if !(1..=MAX_NFTS).contains(&token_id) {
        return Err(GuardViolation::TokenOutOfRange);
    }
    match source.sale_active() {
        Ok(true) => {}
        Ok(false) => return Err(GuardViolation::SaleInactive),
        Err(e) => {
            warn!("saleActive read failed: {e}");
            return Err(GuardViolation::SaleInactive);
        }
    }
    match source.owner_of(token_id) {
        Ok(Some(_)) => return Err(GuardViolation::AlreadyMinted),
        Ok(None) => {}
        Err(e) => warn!("ownerOf({token_id}) failed, minting anyway: {e}"),
    }
    let price = source
        .token_price(token_id)
        .or_else(|e| {
            debug!("tokenPrice({token_id}) unavailable ({e}), trying mintPrice");
            source.mint_price()
        })
        .unwrap_or_else(|e| {
            debug!("mintPrice unavailable ({e}), using configured price");
            fallback_price
        });
    Ok(MintTicket { token_id, price })
}
