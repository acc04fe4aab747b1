use crate::core::Block;
use data_encoding::HEXLOWER;
use num_bigint::BigInt;
use num_bigint::Sign::Plus;
use std::ops::ShlAssign;
use std::sync::atomic::{AtomicBool, Ordering};

/// How many nonces to try between cancellation checks.
const NONCE_BATCH: i64 = 1000;

/// Nonce search for one candidate block. Difficulty `d` demands `d` leading
/// zero hex digits, which is exactly `hash < 2^(256 - 4d)` - so the check is
/// done as a big-integer comparison against that target rather than by
/// inspecting the hex string.
pub struct ProofOfWork {
    block: Block,
    target: BigInt,
}

impl ProofOfWork {
    pub fn new(block: Block) -> ProofOfWork {
        let target = difficulty_target(block.get_difficulty());
        ProofOfWork { block, target }
    }

    /// Search for a nonce that brings the block hash under the target. Returns
    /// the sealed block, or `None` if `cancel` was raised first. The flag is
    /// polled between batches, not per nonce, so cancellation lands within one
    /// batch of hashes.
    pub fn run(mut self, cancel: &AtomicBool) -> Option<Block> {
        let mut nonce = 0_i64;
        loop {
            if cancel.load(Ordering::Relaxed) {
                log::info!(
                    "Nonce search for block #{} cancelled at nonce {}",
                    self.block.get_index(),
                    nonce
                );
                return None;
            }
            for _ in 0..NONCE_BATCH {
                self.block.seal(nonce, String::new());
                let hash = self.block.compute_hash();
                if self.hash_meets_target(&hash) {
                    log::info!(
                        "Found nonce {} for block #{}: {}",
                        nonce,
                        self.block.get_index(),
                        hash
                    );
                    self.block.seal(nonce, hash);
                    return Some(self.block);
                }
                nonce += 1;
            }
        }
    }

    /// Check a sealed block: hash recomputes and meets its declared
    /// difficulty.
    pub fn validate(block: &Block) -> bool {
        block.has_valid_hash() && hash_matches_difficulty(block.get_hash(), block.get_difficulty())
    }

    fn hash_meets_target(&self, hash_hex: &str) -> bool {
        let Ok(bytes) = HEXLOWER.decode(hash_hex.as_bytes()) else {
            return false;
        };
        BigInt::from_bytes_be(Plus, &bytes) < self.target
    }
}

/// `target = 1 << (256 - 4 * difficulty)`. Difficulties of 64 and above
/// saturate to a target of 1, which no hash can be under.
fn difficulty_target(difficulty: u32) -> BigInt {
    let mut target = BigInt::from(1);
    target.shl_assign(256_usize.saturating_sub(4 * difficulty as usize));
    target
}

/// Whether a hex-encoded hash satisfies the given difficulty.
pub fn hash_matches_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    let Ok(bytes) = HEXLOWER.decode(hash_hex.as_bytes()) else {
        return false;
    };
    BigInt::from_bytes_be(Plus, &bytes) < difficulty_target(difficulty)
}
