//! Score mutation engine: pure transitions from one scoreboard snapshot to the next.
//!
//! Nothing in here performs I/O. Callers decide whether the resulting state is worth
//! persisting (an unchanged state is a no-op).

use serde::Deserialize;
use utoipa::ToSchema;

use super::scoreboard::{
    BALL_WRAP, Base, CountKind, FIRST_INNING, LAST_INNING, LiveGameState, OUT_WRAP, STRIKE_WRAP,
    TeamSide,
};

/// Operator intent accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum ScoreIntent {
    /// Move one half-inning forward or backward.
    AdvanceHalfInning {
        /// `true` moves towards the 9th inning, `false` back towards the 1st.
        forward: bool,
    },
    /// Add or remove one run for a team.
    AdjustScore {
        /// Team whose score changes.
        side: TeamSide,
        /// `true` adds a run, `false` removes one (never below zero).
        increment: bool,
    },
    /// Flip between top and bottom without touching the inning.
    ToggleHalf,
    /// Put a runner on or take one off a single base.
    ToggleRunner {
        /// Base to flip.
        base: Base,
    },
    /// Bump a ball, strike or out counter with wrap-around.
    IncrementCount {
        /// Counter to bump.
        kind: CountKind,
    },
    /// Clear balls and strikes.
    ResetCounts,
    /// Empty every base.
    ResetRunners,
}

/// Compute the state that results from applying `intent` to `state`.
///
/// The returned value is always a complete snapshot; `game_id`, `version` and `updated_at`
/// are carried over untouched.
pub fn apply(state: &LiveGameState, intent: &ScoreIntent) -> LiveGameState {
    let mut next = state.clone();
    match *intent {
        ScoreIntent::AdvanceHalfInning { forward } => advance_half_inning(&mut next, forward),
        ScoreIntent::AdjustScore { side, increment } => {
            let score = match side {
                TeamSide::Away => &mut next.a_score,
                TeamSide::Home => &mut next.h_score,
            };
            *score = if increment {
                score.saturating_add(1)
            } else {
                score.saturating_sub(1)
            };
        }
        ScoreIntent::ToggleHalf => next.is_top = !next.is_top,
        ScoreIntent::ToggleRunner { base } => {
            let flag = match base {
                Base::First => &mut next.is_first,
                Base::Second => &mut next.is_second,
                Base::Third => &mut next.is_third,
            };
            *flag = !*flag;
        }
        ScoreIntent::IncrementCount { kind } => {
            let (count, wrap) = match kind {
                CountKind::Ball => (&mut next.b_count, BALL_WRAP),
                CountKind::Strike => (&mut next.s_count, STRIKE_WRAP),
                CountKind::Out => (&mut next.o_count, OUT_WRAP),
            };
            // out-of-range counts from storage are folded back into range first
            *count = (*count % wrap + 1) % wrap;
        }
        ScoreIntent::ResetCounts => {
            // Outs belong to the half-inning, not the at-bat.
            next.b_count = 0;
            next.s_count = 0;
        }
        ScoreIntent::ResetRunners => clear_runners(&mut next),
    }
    next
}

fn advance_half_inning(state: &mut LiveGameState, forward: bool) {
    let (inning, is_top) = match (forward, state.is_top) {
        (true, true) => (state.inning, false),
        (true, false) if state.inning < LAST_INNING => (state.inning + 1, true),
        (false, false) => (state.inning, true),
        (false, true) if state.inning > FIRST_INNING => (state.inning - 1, false),
        _ => return,
    };

    state.inning = inning;
    state.is_top = is_top;
    state.b_count = 0;
    state.s_count = 0;
    state.o_count = 0;
    clear_runners(state);
}

fn clear_runners(state: &mut LiveGameState) {
    state.is_first = false;
    state.is_second = false;
    state.is_third = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORWARD: ScoreIntent = ScoreIntent::AdvanceHalfInning { forward: true };
    const BACKWARD: ScoreIntent = ScoreIntent::AdvanceHalfInning { forward: false };

    fn busy_state() -> LiveGameState {
        let mut state = LiveGameState::new(1);
        state.inning = 4;
        state.a_score = 3;
        state.h_score = 2;
        state.b_count = 2;
        state.s_count = 1;
        state.o_count = 2;
        state.is_first = true;
        state.is_third = true;
        state.version = 12;
        state
    }

    fn run(state: &LiveGameState, intents: &[ScoreIntent]) -> LiveGameState {
        intents
            .iter()
            .fold(state.clone(), |acc, intent| apply(&acc, intent))
    }

    #[test]
    fn seventeen_forward_steps_reach_bottom_of_ninth() {
        let start = LiveGameState::new(1);
        let end = run(&start, &[FORWARD; 17]);
        assert_eq!((end.inning, end.is_top), (9, false));

        assert_eq!(apply(&end, &FORWARD), end);
        assert_eq!(run(&end, &[FORWARD; 2]), end);
    }

    #[test]
    fn backward_from_top_of_first_is_a_no_op() {
        let mut start = busy_state();
        start.inning = 1;
        start.is_top = true;
        assert_eq!(apply(&start, &BACKWARD), start);
    }

    #[test]
    fn forward_and_backward_walk_the_half_innings() {
        let mut state = LiveGameState::new(1);
        state.inning = 3;

        let bottom = apply(&state, &FORWARD);
        assert_eq!((bottom.inning, bottom.is_top), (3, false));
        let next_top = apply(&bottom, &FORWARD);
        assert_eq!((next_top.inning, next_top.is_top), (4, true));

        let back = apply(&next_top, &BACKWARD);
        assert_eq!((back.inning, back.is_top), (3, false));
        let back_again = apply(&back, &BACKWARD);
        assert_eq!((back_again.inning, back_again.is_top), (3, true));
    }

    #[test]
    fn inning_change_resets_counts_and_runners_but_keeps_scores() {
        let start = busy_state();
        let next = apply(&start, &FORWARD);

        assert_eq!((next.b_count, next.s_count, next.o_count), (0, 0, 0));
        assert!(!next.is_first && !next.is_second && !next.is_third);
        assert_eq!((next.a_score, next.h_score), (3, 2));
        assert_eq!(next.version, start.version);
        assert_eq!(next.game_id, start.game_id);
    }

    #[test]
    fn boundary_no_op_keeps_counts_and_runners() {
        let mut start = busy_state();
        start.inning = 9;
        start.is_top = false;
        let next = apply(&start, &FORWARD);
        assert_eq!(next, start);
        assert_eq!(next.o_count, 2);
        assert!(next.is_first);
    }

    #[test]
    fn decrement_never_goes_below_zero() {
        let start = LiveGameState::new(1);
        for side in [TeamSide::Away, TeamSide::Home] {
            let next = apply(
                &start,
                &ScoreIntent::AdjustScore {
                    side,
                    increment: false,
                },
            );
            assert_eq!(next.score(side), 0);
        }
    }

    #[test]
    fn score_adjustments_only_touch_one_side() {
        let start = busy_state();
        let next = apply(
            &start,
            &ScoreIntent::AdjustScore {
                side: TeamSide::Home,
                increment: true,
            },
        );
        assert_eq!((next.a_score, next.h_score), (3, 3));

        let back = apply(
            &next,
            &ScoreIntent::AdjustScore {
                side: TeamSide::Home,
                increment: false,
            },
        );
        assert_eq!(back, start);
    }

    #[test]
    fn counts_wrap_at_their_limits() {
        let start = LiveGameState::new(1);
        let ball = ScoreIntent::IncrementCount {
            kind: CountKind::Ball,
        };
        let strike = ScoreIntent::IncrementCount {
            kind: CountKind::Strike,
        };
        let out = ScoreIntent::IncrementCount {
            kind: CountKind::Out,
        };

        assert_eq!(run(&start, &[ball; 3]).b_count, 3);
        assert_eq!(run(&start, &[ball; 4]).b_count, 0);
        assert_eq!(run(&start, &[strike; 2]).s_count, 2);
        assert_eq!(run(&start, &[strike; 3]).s_count, 0);
        assert_eq!(run(&start, &[out; 2]).o_count, 2);
        assert_eq!(run(&start, &[out; 3]).o_count, 0);
    }

    #[test]
    fn wrapping_outs_does_not_advance_or_clear_bases() {
        let start = busy_state();
        let next = apply(
            &start,
            &ScoreIntent::IncrementCount {
                kind: CountKind::Out,
            },
        );
        assert_eq!(next.o_count, 0);
        assert_eq!((next.inning, next.is_top), (start.inning, start.is_top));
        assert!(next.is_first && next.is_third);
        assert_eq!((next.a_score, next.h_score), (3, 2));
    }

    #[test]
    fn toggles_affect_a_single_field() {
        let start = busy_state();

        let half = apply(&start, &ScoreIntent::ToggleHalf);
        assert!(!half.is_top);
        assert_eq!(half.b_count, start.b_count);
        assert!(half.is_first);

        let runner = apply(&start, &ScoreIntent::ToggleRunner { base: Base::Second });
        assert!(runner.is_second);
        assert!(runner.is_first && runner.is_third);
        assert!(!apply(&runner, &ScoreIntent::ToggleRunner { base: Base::Second }).is_second);
    }

    #[test]
    fn resets_clear_only_their_fields() {
        let start = busy_state();

        let counts = apply(&start, &ScoreIntent::ResetCounts);
        assert_eq!((counts.b_count, counts.s_count), (0, 0));
        assert_eq!(counts.o_count, 2);
        assert!(counts.is_first);

        let runners = apply(&start, &ScoreIntent::ResetRunners);
        assert!(!runners.is_first && !runners.is_second && !runners.is_third);
        assert_eq!(runners.b_count, 2);
    }

    #[test]
    fn intents_deserialize_from_tagged_json() {
        let intent: ScoreIntent =
            serde_json::from_str(r#"{"intent":"adjust_score","side":"away","increment":true}"#)
                .expect("valid intent");
        assert_eq!(
            intent,
            ScoreIntent::AdjustScore {
                side: TeamSide::Away,
                increment: true
            }
        );

        let intent: ScoreIntent =
            serde_json::from_str(r#"{"intent":"reset_counts"}"#).expect("valid intent");
        assert_eq!(intent, ScoreIntent::ResetCounts);
    }

    #[test]
    fn out_of_range_counts_wrap_without_overflow() {
        let mut state = LiveGameState::new(1);
        state.b_count = u8::MAX;
        state.s_count = 7;
        state.o_count = 3;

        let next = apply(&state, &ScoreIntent::IncrementCount { kind: CountKind::Ball });
        assert_eq!(next.b_count, (u8::MAX % BALL_WRAP + 1) % BALL_WRAP);
        assert!(next.b_count < BALL_WRAP);

        let next = apply(&state, &ScoreIntent::IncrementCount { kind: CountKind::Strike });
        assert!(next.s_count < STRIKE_WRAP);
        let next = apply(&state, &ScoreIntent::IncrementCount { kind: CountKind::Out });
        assert_eq!(next.o_count, 1);
    }
}
