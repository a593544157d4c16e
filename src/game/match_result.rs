//! Match result summary
//!
//! Computes the final result of one side's match.

use std::cmp::Ordering;

use crate::game::state::GameState;

/// Match result information
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub final_score: u32,
    /// Last score reported by the other peer (multiplayer only)
    pub opponent_score: Option<u32>,
    pub level_reached: u8,
    pub ticks_survived: u64,
    pub match_duration: f32,
    pub kills: u32,
    pub rewards_collected: u32,
    pub reason: MatchEndReason,
}

impl MatchResult {
    /// Ordering of this side against the opponent by score, None in
    /// single-player
    pub fn standing(&self) -> Option<Ordering> {
        self.opponent_score.map(|other| self.final_score.cmp(&other))
    }
}

/// Determine match result from game state. `tick_rate` converts the tick
/// count into seconds.
pub fn determine_result(state: &GameState, reason: MatchEndReason, tick_rate: u32) -> MatchResult {
    MatchResult {
        final_score: state.score,
        opponent_score: state.opponent_score(),
        level_reached: state.level,
        ticks_survived: state.tick,
        match_duration: state.tick as f32 / tick_rate.max(1) as f32,
        kills: state.kills,
        rewards_collected: state.rewards_collected,
        reason,
    }
}

/// Check if match should end
pub fn check_match_end(state: &GameState) -> Option<MatchEndReason> {
    if state.cannon.is_destroyed() {
        return Some(MatchEndReason::CannonDestroyed);
    }
    None
}

/// Reason why match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEndReason {
    /// Cannon ran out of hit points
    CannonDestroyed,
    /// Local player left the match
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::assets::AssetCache;
    use crate::game::state::{Bounds, OpponentState};

    #[test]
    fn test_no_end_while_cannon_alive() {
        let assets = AssetCache::new();
        let state = GameState::new(&assets, Bounds::default(), 600.0);
        assert_eq!(check_match_end(&state), None);
    }

    #[test]
    fn test_end_on_cannon_destroyed() {
        let assets = AssetCache::new();
        let mut state = GameState::new(&assets, Bounds::default(), 600.0);
        assert!(state.cannon.take_contact());
        assert_eq!(check_match_end(&state), Some(MatchEndReason::CannonDestroyed));
    }

    #[test]
    fn test_result_summary() {
        let assets = AssetCache::new();
        let mut state = GameState::new(&assets, Bounds::default(), 600.0);
        state.tick = 600;
        state.score = 120;
        state.kills = 7;
        state.rewards_collected = 1;
        state.level = 2;

        let result = determine_result(&state, MatchEndReason::Quit, 60);
        assert_eq!(result.final_score, 120);
        assert_eq!(result.level_reached, 2);
        assert!((result.match_duration - 10.0).abs() < 1e-6);
        assert_eq!(result.standing(), None);

        state.opponent = Some(OpponentState {
            score: 200,
            ..OpponentState::default()
        });
        let result = determine_result(&state, MatchEndReason::CannonDestroyed, 60);
        assert!((result.match_duration - 10.0).abs() < 1e-6);

        let result = determine_result(&state, MatchEndReason::CannonDestroyed, 30);
        assert!((result.match_duration - 20.0).abs() < 1e-6);
        assert_eq!(result.opponent_score, Some(200));
        assert_eq!(result.standing(), Some(Ordering::Less));
    }
}
