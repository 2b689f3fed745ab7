//! Unspent-output queries over the stored chain.
//!
//! Nothing here is persisted: every query rescans the chain from the tip back
//! to genesis. Spends are recorded by the spending transaction, which is
//! always newer than the output it consumes, so walking newest-first lets an
//! input mark its outpoint spent before the scan reaches the output.

use crate::core::transaction::{OutPoint, Transaction, TxOutput};
use crate::core::Blockchain;
use crate::crypto::hash::Hash256;
use crate::Result;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Selected outputs keyed by transaction id.
pub type SpendableSelection = BTreeMap<Hash256, Vec<u32>>;

/// Anything that can pick outputs for a new transaction to spend.
pub trait UtxoSource {
    /// Greedily selects outputs unlockable by `address` until their value
    /// reaches `amount`. Returns the accumulated value, which is below
    /// `amount` only when the address cannot cover it.
    fn find_spendable_outputs(
        &self,
        address: &str,
        amount: u64,
    ) -> Result<(u64, SpendableSelection)>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoEntry {
    pub outpoint: OutPoint,
    pub output: TxOutput,
}

/// A transaction with at least one unspent output for the scanned address.
struct UnspentTransaction {
    tx: Transaction,
    vouts: Vec<u32>,
}

impl Blockchain {
    fn scan_unspent(&self, address: &str) -> Result<Vec<UnspentTransaction>> {
        let mut unspent = Vec::new();
        let mut spent: HashMap<Hash256, HashSet<u32>> = HashMap::new();

        for block in self.iter() {
            let block = block?;

            // Later transactions in a block may spend earlier ones.
            for tx in block.transactions.into_iter().rev() {
                let spent_vouts = spent.get(&tx.id);
                let vouts: Vec<u32> = tx
                    .outputs
                    .iter()
                    .enumerate()
                    .map(|(vout, output)| (vout as u32, output))
                    .filter(|(vout, _)| spent_vouts.map_or(true, |s| !s.contains(vout)))
                    .filter(|(_, output)| output.can_be_unlocked(address))
                    .map(|(vout, _)| vout)
                    .collect();

                if !tx.is_coinbase() {
                    for input in tx.inputs.iter().filter(|input| input.can_unlock(address)) {
                        spent
                            .entry(input.previous_output.txid)
                            .or_default()
                            .insert(input.previous_output.vout);
                    }
                }

                if !vouts.is_empty() {
                    unspent.push(UnspentTransaction { tx, vouts });
                }
            }
        }

        Ok(unspent)
    }

    /// Transactions holding unspent outputs for `address`, newest first.
    pub fn find_unspent_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        Ok(self.scan_unspent(address)?.into_iter().map(|u| u.tx).collect())
    }

    /// Unspent outputs for `address` together with their outpoints.
    pub fn find_utxos(&self, address: &str) -> Result<Vec<UtxoEntry>> {
        let mut utxos = Vec::new();
        for UnspentTransaction { tx, vouts } in self.scan_unspent(address)? {
            for vout in vouts {
                utxos.push(UtxoEntry {
                    outpoint: OutPoint::new(tx.id, vout),
                    output: tx.outputs[vout as usize].clone(),
                });
            }
        }
        Ok(utxos)
    }

    pub fn find_unspent_transaction_outputs(&self, address: &str) -> Result<Vec<TxOutput>> {
        Ok(self.find_utxos(address)?.into_iter().map(|entry| entry.output).collect())
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        Ok(self
            .find_unspent_transaction_outputs(address)?
            .iter()
            .fold(0u64, |total, output| total.saturating_add(output.value)))
    }
}

impl UtxoSource for Blockchain {
    fn find_spendable_outputs(
        &self,
        address: &str,
        amount: u64,
    ) -> Result<(u64, SpendableSelection)> {
        let mut accumulated = 0u64;
        let mut selected = SpendableSelection::new();

        'scan: for UnspentTransaction { tx, vouts } in self.scan_unspent(address)? {
            for vout in vouts {
                if accumulated >= amount {
                    break 'scan;
                }
                accumulated = accumulated.saturating_add(tx.outputs[vout as usize].value);
                selected.entry(tx.id).or_default().push(vout);
            }
        }

        log::debug!(
            "Selected {} unspent output(s) worth {} for {} (requested {})",
            selected.values().map(Vec::len).sum::<usize>(),
            accumulated,
            address,
            amount
        );
        Ok((accumulated, selected))
    }
}
