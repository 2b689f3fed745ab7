use crate::core::utxo::UtxoSource;
use crate::crypto::hash::{Hash256, Hashable};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Output index carried by the coinbase input: the all-ones pattern, i.e. -1.
pub const COINBASE_VOUT: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_output: OutPoint,
    /// Unlocking credential. Stands in for a signature: it must equal the
    /// address the referenced output is locked to.
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    /// Locking address.
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl Transaction {
    /// Builds a transaction and fixes its id.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: Hash256::zero(),
            inputs,
            outputs,
        };
        tx.set_id();
        tx
    }

    /// Mints `reward` to `to`. An empty memo is replaced with a default.
    pub fn new_coinbase(to: &str, memo: &str, reward: u64) -> Self {
        let memo = if memo.is_empty() {
            format!("Coins to {}", to)
        } else {
            memo.to_string()
        };

        let coinbase_input = TxInput {
            previous_output: OutPoint::null(),
            signature: memo,
        };

        Self::new(vec![coinbase_input], vec![TxOutput::new(reward, to)])
    }

    /// Moves `amount` from `from` to `to`, spending outputs selected by `source`.
    ///
    /// Any surplus of the selected outputs over `amount` is returned to `from`
    /// as a change output, so the outputs always sum to the consumed inputs.
    pub fn new_transfer<S>(from: &str, to: &str, amount: u64, source: &S) -> Result<Self>
    where
        S: UtxoSource + ?Sized,
    {
        if from.is_empty() || to.is_empty() {
            return Err(LedgerError::InvalidInput("address must not be empty".to_string()));
        }
        if amount == 0 {
            return Err(LedgerError::InvalidInput("amount must be positive".to_string()));
        }

        let (accumulated, selected) = source.find_spendable_outputs(from, amount)?;
        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let inputs = selected
            .into_iter()
            .flat_map(|(txid, vouts)| vouts.into_iter().map(move |vout| OutPoint::new(txid, vout)))
            .map(|outpoint| TxInput {
                previous_output: outpoint,
                signature: from.to_string(),
            })
            .collect();

        let mut outputs = vec![TxOutput::new(amount, to)];
        if accumulated > amount {
            outputs.push(TxOutput::new(accumulated - amount, from));
        }

        let tx = Self::new(inputs, outputs);
        log::debug!(
            "Built transaction {} moving {} from {} to {} ({} inputs)",
            tx.id.short(),
            amount,
            from,
            to,
            tx.inputs.len()
        );
        Ok(tx)
    }

    /// Recomputes `id` from the transaction content.
    pub fn set_id(&mut self) {
        self.id = self.hash();
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|output| output.value).sum()
    }
}

/// Content hash with `id` left out.
impl Hashable for Transaction {
    fn hash(&self) -> Hash256 {
        let mut data = Vec::new();

        data.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            data.extend_from_slice(input.previous_output.txid.as_bytes());
            data.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            data.extend_from_slice(&(input.signature.len() as u32).to_le_bytes());
            data.extend_from_slice(input.signature.as_bytes());
        }

        data.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            data.extend_from_slice(&output.value.to_le_bytes());
            data.extend_from_slice(&(output.address.len() as u32).to_le_bytes());
            data.extend_from_slice(output.address.as_bytes());
        }

        Hash256::hash(&data)
    }
}

impl TxInput {
    pub fn can_unlock(&self, address: &str) -> bool {
        self.signature == address
    }
}

impl TxOutput {
    pub fn new(value: u64, address: &str) -> Self {
        Self {
            value,
            address: address.to_string(),
        }
    }

    pub fn can_be_unlocked(&self, address: &str) -> bool {
        self.address == address
    }
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// The reference carried by a coinbase input: empty id, index -1.
    pub fn null() -> Self {
        Self {
            txid: Hash256::zero(),
            vout: COINBASE_VOUT,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == COINBASE_VOUT
    }
}
