use crate::config::Config;
use crate::core::{Block, Transaction};
use crate::crypto::hash::Hash256;
use crate::mining::ProofOfWork;
use crate::storage::Database;
use crate::{LedgerError, Result};
use std::sync::Arc;

/// Handle on a persisted chain.
///
/// `tip` caches the store's `last_hash`. Appends always re-read the stored
/// tip, so several handles over one [`Database`] stay consistent.
#[derive(Debug, Clone)]
pub struct Blockchain {
    tip: Hash256,
    db: Arc<Database>,
    pow: ProofOfWork,
    coinbase_reward: u64,
}

impl Blockchain {
    /// Creates a new chain whose genesis block pays the coinbase reward to `address`.
    pub fn create(db: Arc<Database>, config: &Config, address: &str) -> Result<Self> {
        if address.is_empty() {
            return Err(LedgerError::InvalidInput("address must not be empty".to_string()));
        }
        let pow = Self::proof_of_work_for(config)?;

        if db.has_chain()? {
            log::warn!("Blockchain already exists");
            return Err(LedgerError::AlreadyExists);
        }

        let coinbase = Transaction::new_coinbase(
            address,
            &config.consensus.genesis_memo,
            config.consensus.coinbase_reward,
        );
        let genesis = Block::genesis(coinbase, &pow)?;
        db.insert_genesis(&genesis)?;

        log::info!("🌱 Genesis block {} created, reward to {}", genesis.hash, address);
        Ok(Self {
            tip: genesis.hash,
            db,
            pow,
            coinbase_reward: config.consensus.coinbase_reward,
        })
    }

    /// Opens an existing chain.
    ///
    /// The tip block must verify under the configured difficulty, so a
    /// handle never appends blocks sealed at a different difficulty.
    pub fn open(db: Arc<Database>, config: &Config) -> Result<Self> {
        let pow = Self::proof_of_work_for(config)?;
        let tip = db.get_tip()?.ok_or(LedgerError::NotFound)?;

        let tip_block = db
            .get_block(&tip)?
            .ok_or_else(|| LedgerError::corrupt_block(tip, "missing from store"))?;
        if !pow.validate(&tip_block) {
            log::warn!("Chain was not sealed at difficulty {}", pow.difficulty());
            return Err(LedgerError::InvalidInput(format!(
                "tip block {} does not verify at difficulty {}",
                tip,
                pow.difficulty()
            )));
        }

        log::debug!("Opened blockchain at tip {}", tip);
        Ok(Self {
            tip,
            db,
            pow,
            coinbase_reward: config.consensus.coinbase_reward,
        })
    }

    pub fn open_or_create(db: Arc<Database>, config: &Config, address: &str) -> Result<Self> {
        if db.has_chain()? {
            Self::open(db, config)
        } else {
            Self::create(db, config, address)
        }
    }

    fn proof_of_work_for(config: &Config) -> Result<ProofOfWork> {
        config.validate()?;
        ProofOfWork::new(config.mining.difficulty, config.mining.threads)
    }

    pub fn tip(&self) -> Hash256 {
        self.tip
    }

    pub fn coinbase_reward(&self) -> u64 {
        self.coinbase_reward
    }

    /// Seals `transactions` on the current tip and advances the tip.
    ///
    /// If another writer advances the tip while this block is being sealed,
    /// the commit is refused by the store and the block is re-sealed on the
    /// new tip.
    pub fn add_block(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        if transactions.is_empty() {
            return Err(LedgerError::InvalidInput(
                "a block needs at least one transaction".to_string(),
            ));
        }

        loop {
            let tip = self.db.get_tip()?.ok_or(LedgerError::NotFound)?;
            let block = Block::new(transactions.clone(), Some(tip), &self.pow)?;

            if self.db.append_block(&tip, &block)? {
                self.tip = block.hash;
                log::info!(
                    "✅ Block {} added with {} transaction(s)",
                    block.hash,
                    block.transaction_count()
                );
                return Ok(block);
            }

            log::warn!("Tip moved past {} while sealing, retrying on the new tip", tip.short());
        }
    }

    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>> {
        self.db.get_block(hash)
    }

    pub fn is_valid_proof_of_work(&self, block: &Block) -> bool {
        self.pow.validate(block)
    }

    /// Walks the chain from the stored tip back to genesis.
    pub fn iter(&self) -> BlockchainIterator<'_> {
        BlockchainIterator {
            db: self.db.as_ref(),
            current: Some(self.tip),
        }
    }

    pub fn block_count(&self) -> Result<usize> {
        self.iter().try_fold(0, |count, block| block.map(|_| count + 1))
    }

    /// Audits every block from tip to genesis. Returns the number of blocks,
    /// or the first block that fails proof-of-work or linkage.
    pub fn verify(&self) -> Result<usize> {
        let mut count = 0;
        for block in self.iter() {
            let block = block?;
            if !self.pow.validate(&block) {
                log::warn!("Block {} fails proof-of-work", block.hash);
                return Err(LedgerError::corrupt_block(block.hash, "fails proof-of-work"));
            }
            count += 1;
        }
        Ok(count)
    }
}

/// Backward cursor over the chain. Yields the tip first and ends after the
/// genesis block. A block that is missing, undecodable or stored under the
/// wrong key is yielded as [`LedgerError::CorruptBlock`] and ends the walk.
pub struct BlockchainIterator<'a> {
    db: &'a Database,
    current: Option<Hash256>,
}

impl<'a> Iterator for BlockchainIterator<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current.take()?;

        let block = match self.db.get_block(&hash) {
            Ok(Some(block)) => block,
            Ok(None) => return Some(Err(LedgerError::corrupt_block(hash, "missing from store"))),
            Err(e) => return Some(Err(e)),
        };

        if block.hash != hash {
            return Some(Err(LedgerError::corrupt_block(
                hash,
                format!("stored block carries hash {}", block.hash),
            )));
        }

        self.current = block.prev_hash;
        Some(Ok(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default().with_data_dir(temp_dir.path());
        config.mining.difficulty = 8;
        config.mining.threads = 2;
        config
    }

    fn open_db(config: &Config) -> Result<Arc<Database>> {
        Ok(Arc::new(Database::new(config.db_path())?))
    }

    #[test]
    fn test_create_genesis() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let chain = Blockchain::create(open_db(&config)?, &config, "alice")?;

        let blocks: Vec<Block> = chain.iter().collect::<Result<_>>()?;
        assert_eq!(blocks.len(), 1);

        let genesis = &blocks[0];
        assert!(genesis.is_genesis());
        assert_eq!(genesis.hash, chain.tip());
        let coinbase = genesis.get_coinbase_transaction().unwrap();
        assert_eq!(coinbase.outputs[0].value, chain.coinbase_reward());
        assert_eq!(coinbase.inputs[0].signature, config.consensus.genesis_memo);
        assert!(chain.is_valid_proof_of_work(genesis));
        Ok(())
    }

    #[test]
    fn test_open_preconditions() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let db = open_db(&config)?;

        assert!(matches!(Blockchain::open(db.clone(), &config), Err(LedgerError::NotFound)));
        assert!(!db.has_chain()?);

        let created = Blockchain::create(db.clone(), &config, "alice")?;
        assert!(matches!(
            Blockchain::create(db.clone(), &config, "bob"),
            Err(LedgerError::AlreadyExists)
        ));

        let opened = Blockchain::open(db.clone(), &config)?;
        assert_eq!(opened.tip(), created.tip());

        let either = Blockchain::open_or_create(db, &config, "carol")?;
        assert_eq!(either.tip(), created.tip());
        Ok(())
    }

    #[test]
    fn test_create_rejects_empty_address() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let db = open_db(&config)?;

        assert!(matches!(
            Blockchain::create(db.clone(), &config, ""),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(!db.has_chain()?);
        Ok(())
    }

    #[test]
    fn test_add_block_links_to_tip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let mut chain = Blockchain::create(open_db(&config)?, &config, "alice")?;
        let genesis_hash = chain.tip();

        let first = chain.add_block(vec![Transaction::new_coinbase("bob", "", 100)])?;
        let second = chain.add_block(vec![Transaction::new_coinbase("carol", "", 100)])?;

        assert_eq!(first.prev_hash, Some(genesis_hash));
        assert_eq!(second.prev_hash, Some(first.hash));
        assert_eq!(chain.tip(), second.hash);

        let hashes: Vec<Hash256> = chain.iter().map(|b| b.map(|b| b.hash)).collect::<Result<_>>()?;
        assert_eq!(hashes, vec![second.hash, first.hash, genesis_hash]);
        assert_eq!(chain.verify()?, 3);
        Ok(())
    }

    #[test]
    fn test_add_block_rejects_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let mut chain = Blockchain::create(open_db(&config)?, &config, "alice")?;

        assert!(matches!(chain.add_block(Vec::new()), Err(LedgerError::InvalidInput(_))));
        assert_eq!(chain.block_count()?, 1);
        Ok(())
    }

    #[test]
    fn test_stale_handle_appends_on_latest_tip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let db = open_db(&config)?;
        let mut first_handle = Blockchain::create(db.clone(), &config, "alice")?;
        let mut second_handle = Blockchain::open(db, &config)?;

        let from_first = first_handle.add_block(vec![Transaction::new_coinbase("bob", "", 100)])?;
        let from_second =
            second_handle.add_block(vec![Transaction::new_coinbase("carol", "", 100)])?;

        assert_eq!(from_second.prev_hash, Some(from_first.hash));
        assert_eq!(second_handle.block_count()?, 3);
        Ok(())
    }

    #[test]
    fn test_concurrent_appends_never_fork() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let db = open_db(&config)?;
        let chain = Blockchain::create(db, &config, "alice")?;

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let mut handle = chain.clone();
                scope.spawn(move || {
                    for round in 0..3 {
                        let memo = format!("worker {} round {}", worker, round);
                        handle.add_block(vec![Transaction::new_coinbase("miner", &memo, 100)])?;
                    }
                    Ok::<(), LedgerError>(())
                });
            }
        });

        let reopened = Blockchain::open(chain.db.clone(), &config)?;
        let blocks: Vec<Block> = reopened.iter().collect::<Result<_>>()?;
        assert_eq!(blocks.len(), 13);
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].prev_hash, Some(pair[1].hash));
        }
        Ok(())
    }

    #[test]
    fn test_iterator_reports_missing_block() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let chain = Blockchain::create(open_db(&config)?, &config, "alice")?;

        let mut broken = chain.clone();
        broken.tip = Hash256::hash(b"not a block");
        let mut iter = broken.iter();
        assert!(matches!(iter.next(), Some(Err(LedgerError::CorruptBlock { .. }))));
        assert!(iter.next().is_none());
        assert!(broken.verify().is_err());
        Ok(())
    }

    #[test]
    fn test_open_rejects_different_difficulty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let db = open_db(&config)?;
        let mut chain = Blockchain::create(db.clone(), &config, "alice")?;
        chain.add_block(vec![Transaction::new_coinbase("bob", "", 100)])?;

        for difficulty in [1, 0, 9, 200] {
            let mut other = config.clone();
            other.mining.difficulty = difficulty;
            assert!(matches!(
                Blockchain::open(db.clone(), &other),
                Err(LedgerError::InvalidInput(_))
            ));
            assert!(matches!(
                Blockchain::open_or_create(db.clone(), &other, "alice"),
                Err(LedgerError::InvalidInput(_))
            ));
        }

        let reopened = Blockchain::open(db, &config)?;
        assert_eq!(reopened.tip(), chain.tip());
        assert_eq!(reopened.verify()?, 2);
        Ok(())
    }

    #[test]
    fn test_verify_rejects_wrong_difficulty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = test_config(&temp_dir);
        let mut chain = Blockchain::create(open_db(&config)?, &config, "alice")?;

        chain.pow = ProofOfWork::new(200, 1)?;
        assert!(matches!(chain.verify(), Err(LedgerError::CorruptBlock { .. })));
        Ok(())
    }
}
