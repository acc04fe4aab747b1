use crate::core::Block;

/// Expected seconds between blocks.
pub const BLOCK_GENERATION_INTERVAL: i64 = 10;
/// Blocks between difficulty adjustments.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: usize = 10;

/// The difficulty retarget rule. Every `DIFFICULTY_ADJUSTMENT_INTERVAL`
/// blocks the actual time the last interval took is compared to the expected
/// time; a drift beyond a factor of two in either direction moves the
/// difficulty by one.
pub struct DifficultyAdjustment;

impl DifficultyAdjustment {
    /// The difficulty the next block must carry, given the current chain.
    /// Between adjustment heights this is simply the latest block's
    /// difficulty.
    pub fn next_difficulty(chain: &[Block]) -> u32 {
        let latest = match chain.last() {
            Some(block) => block,
            None => return 0,
        };
        if latest.get_index() % DIFFICULTY_ADJUSTMENT_INTERVAL != 0 || latest.get_index() == 0 {
            return latest.get_difficulty();
        }
        Self::adjusted_difficulty(chain, latest)
    }

    fn adjusted_difficulty(chain: &[Block], latest: &Block) -> u32 {
        let prev_adjustment = &chain[chain.len() - DIFFICULTY_ADJUSTMENT_INTERVAL];
        let expected_ms =
            BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL as i64 * 1000;
        let taken_ms = latest.get_timestamp() - prev_adjustment.get_timestamp();

        if taken_ms < expected_ms / 2 {
            log::info!(
                "Interval took {taken_ms}ms, expected {expected_ms}ms: raising difficulty to {}",
                prev_adjustment.get_difficulty() + 1
            );
            prev_adjustment.get_difficulty() + 1
        } else if taken_ms > expected_ms * 2 {
            let lowered = prev_adjustment.get_difficulty().saturating_sub(1);
            log::info!(
                "Interval took {taken_ms}ms, expected {expected_ms}ms: lowering difficulty to {lowered}"
            );
            lowered
        } else {
            prev_adjustment.get_difficulty()
        }
    }
}
