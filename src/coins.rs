//! Coin views: read access to the unspent output set
//!
//! `CoinsView` is the seam between consensus code and whatever stores the
//! UTXO set. `MemoryCoinsView` is an ordered in-memory backend and
//! `CoinsViewOverlay` layers pending additions and spends over any view
//! without mutating it.

use crate::error::{ConsensusError, Result};
use crate::types::{Coin, Hash, OutPoint, UtxoSet};
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Peekable;

/// Ordered cursor entry. A failed entry means the backing store is corrupt.
pub type CursorItem = Result<(OutPoint, Coin)>;

/// Read access to a set of unspent coins
pub trait CoinsView {
    /// Look up an unspent coin
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin>;

    fn have_coin(&self, outpoint: &OutPoint) -> bool {
        self.get_coin(outpoint).is_some()
    }

    /// Hash of the block this view reflects
    fn best_block(&self) -> Hash;

    /// Iterate every coin in ascending outpoint order
    fn cursor(&self) -> Box<dyn Iterator<Item = CursorItem> + '_>;

    /// Estimated on-disk footprint in bytes, 0 if unknown
    fn estimate_size(&self) -> u64 {
        0
    }
}

/// In-memory coin set keyed by outpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCoinsView {
    coins: UtxoSet,
    best_block: Hash,
}

impl MemoryCoinsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_coins(coins: UtxoSet, best_block: Hash) -> Self {
        Self { coins, best_block }
    }

    /// Insert a coin, replacing any previous coin at the same outpoint
    pub fn add_coin(&mut self, outpoint: OutPoint, coin: Coin) {
        self.coins.insert(outpoint, coin);
    }

    pub fn spend_coin(&mut self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.remove(outpoint)
    }

    pub fn set_best_block(&mut self, hash: Hash) {
        self.best_block = hash;
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn coins(&self) -> &UtxoSet {
        &self.coins
    }

    /// Apply a set of changes produced by an overlay
    pub fn batch_write(&mut self, changes: CoinsChanges) {
        for outpoint in &changes.spent {
            self.coins.remove(outpoint);
        }
        self.coins.extend(changes.added);
        if let Some(best_block) = changes.best_block {
            self.best_block = best_block;
        }
    }
}

impl CoinsView for MemoryCoinsView {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.get(outpoint).cloned()
    }

    fn have_coin(&self, outpoint: &OutPoint) -> bool {
        self.coins.contains_key(outpoint)
    }

    fn best_block(&self) -> Hash {
        self.best_block
    }

    fn cursor(&self) -> Box<dyn Iterator<Item = CursorItem> + '_> {
        Box::new(self.coins.iter().map(|(outpoint, coin)| Ok((*outpoint, coin.clone()))))
    }

    fn estimate_size(&self) -> u64 {
        self.coins
            .values()
            .map(|coin| 32 + 4 + 4 + 8 + coin.output.script_pubkey.len() as u64)
            .sum()
    }
}

/// Net effect of an overlay, ready to be written to its base
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinsChanges {
    pub added: BTreeMap<OutPoint, Coin>,
    pub spent: BTreeSet<OutPoint>,
    pub best_block: Option<Hash>,
}

/// Pending coin changes on top of a base view.
///
/// Spending a coin that was added in the same overlay cancels the addition.
/// Spending a base coin records a deletion. The base is never touched.
pub struct CoinsViewOverlay<'a, V: CoinsView + ?Sized> {
    base: &'a V,
    additions: BTreeMap<OutPoint, Coin>,
    deletions: BTreeSet<OutPoint>,
    best_block: Option<Hash>,
}

impl<'a, V: CoinsView + ?Sized> CoinsViewOverlay<'a, V> {
    pub fn new(base: &'a V) -> Self {
        Self {
            base,
            additions: BTreeMap::new(),
            deletions: BTreeSet::new(),
            best_block: None,
        }
    }

    /// Add a coin. Overwrites a pending addition and revives a spent outpoint.
    pub fn add_coin(&mut self, outpoint: OutPoint, coin: Coin) {
        self.deletions.remove(&outpoint);
        self.additions.insert(outpoint, coin);
    }

    /// Spend a coin, returning it if it was unspent in this overlay
    pub fn spend_coin(&mut self, outpoint: &OutPoint) -> Option<Coin> {
        if let Some(coin) = self.additions.remove(outpoint) {
            if self.base.have_coin(outpoint) {
                self.deletions.insert(*outpoint);
            }
            return Some(coin);
        }
        if self.deletions.contains(outpoint) {
            return None;
        }
        let coin = self.base.get_coin(outpoint)?;
        self.deletions.insert(*outpoint);
        Some(coin)
    }

    pub fn set_best_block(&mut self, hash: Hash) {
        self.best_block = Some(hash);
    }

    pub fn additions_count(&self) -> usize {
        self.additions.len()
    }

    pub fn deletions_count(&self) -> usize {
        self.deletions.len()
    }

    /// Consume the overlay, yielding its changes for `batch_write`
    pub fn into_changes(self) -> CoinsChanges {
        CoinsChanges {
            added: self.additions,
            spent: self.deletions,
            best_block: self.best_block,
        }
    }
}

impl<'a, V: CoinsView + ?Sized> CoinsView for CoinsViewOverlay<'a, V> {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        if let Some(coin) = self.additions.get(outpoint) {
            return Some(coin.clone());
        }
        if self.deletions.contains(outpoint) {
            return None;
        }
        self.base.get_coin(outpoint)
    }

    fn best_block(&self) -> Hash {
        self.best_block.unwrap_or_else(|| self.base.best_block())
    }

    fn cursor(&self) -> Box<dyn Iterator<Item = CursorItem> + '_> {
        Box::new(MergedCursor {
            base: self.base.cursor().peekable(),
            additions: self.additions.iter().peekable(),
            deletions: &self.deletions,
        })
    }

    fn estimate_size(&self) -> u64 {
        self.base.estimate_size()
    }
}

/// Ordered merge of a base cursor with overlay additions, skipping deletions
struct MergedCursor<'a, B: Iterator<Item = CursorItem>> {
    base: Peekable<B>,
    additions: Peekable<std::collections::btree_map::Iter<'a, OutPoint, Coin>>,
    deletions: &'a BTreeSet<OutPoint>,
}

impl<'a, B: Iterator<Item = CursorItem>> Iterator for MergedCursor<'a, B> {
    type Item = CursorItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let base_key = match self.base.peek() {
                Some(Ok((outpoint, _))) => Some(*outpoint),
                Some(Err(_)) => return self.base.next(),
                None => None,
            };
            let added_key = self.additions.peek().map(|(outpoint, _)| **outpoint);

            let take_addition = match (base_key, added_key) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(b), Some(a)) => a <= b,
            };

            if take_addition {
                if base_key == added_key {
                    self.base.next();
                }
                let (outpoint, coin) = self.additions.next()?;
                return Some(Ok((*outpoint, coin.clone())));
            }

            let item = self.base.next()?;
            match item {
                Ok((outpoint, _)) if self.deletions.contains(&outpoint) => continue,
                other => return Some(other),
            }
        }
    }
}

/// Build a view from an explicit list, rejecting duplicate outpoints
pub fn view_from_entries<I>(entries: I, best_block: Hash) -> Result<MemoryCoinsView>
where
    I: IntoIterator<Item = (OutPoint, Coin)>,
{
    let mut coins = UtxoSet::new();
    for (outpoint, coin) in entries {
        if coins.insert(outpoint, coin).is_some() {
            return Err(ConsensusError::UtxoCorruption(format!(
                "duplicate outpoint {}:{}",
                hex::encode(outpoint.hash),
                outpoint.index
            )));
        }
    }
    Ok(MemoryCoinsView::from_coins(coins, best_block))
}
