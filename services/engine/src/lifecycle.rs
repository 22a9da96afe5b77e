//! Round lifecycle state machine
//!
//! Sequences the wheel animation phases against contract events:
//! `standby -> waiting -> spinning -> landed -> stopped`, resetting to
//! `standby` when the visible round changes. The machine itself is pure and
//! synchronous; the watcher owns the clock, the event feed, and the
//! cancellable settle timer.
//!
//! Event delivery is at-least-once and may reorder across rounds, so every
//! observation filters by round id and treats repeats as no-ops.

use serde::{Deserialize, Serialize};

use games_shared::types::RoundId;

use crate::domain::{ContractEvent, GameKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum WheelPhase {
    /// No active round action
    Standby,
    /// Round closed, awaiting the on-chain randomness request
    Waiting,
    /// Randomness requested, animation running
    Spinning { since_unix: u64 },
    /// Winner determined on chain; animation converging on the offset
    Landed { offset: u64, winning_index: u32 },
    /// Final phase, results displayed
    Stopped { offset: u64, winning_index: u32 },
}

/// Per-round lifecycle, owned by the watcher of one game
#[derive(Debug, Clone)]
pub struct RoundLifecycle {
    game: GameKind,
    round_id: RoundId,
    phase: WheelPhase,
}

impl RoundLifecycle {
    pub fn new(game: GameKind, round_id: RoundId) -> Self {
        Self {
            game,
            round_id,
            phase: WheelPhase::Standby,
        }
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    pub fn phase(&self) -> WheelPhase {
        self.phase
    }

    /// Clock-driven entry into `waiting` once the betting window closes
    pub fn begin_waiting(&mut self) -> Option<WheelPhase> {
        match self.phase {
            WheelPhase::Standby => {
                self.phase = WheelPhase::Waiting;
                Some(self.phase)
            }
            _ => None,
        }
    }

    /// Feed one contract event into the machine
    ///
    /// Events for another game or round id are ignored (stale-event
    /// filtering); duplicates and already-passed phases are no-ops. Returns
    /// the new phase when a transition fired.
    pub fn observe(&mut self, event: &ContractEvent, now_unix: u64) -> Option<WheelPhase> {
        if event.game() != self.game || event.round_id() != self.round_id {
            return None;
        }

        match (event, self.phase) {
            (
                ContractEvent::CalculationRequested { .. },
                WheelPhase::Standby | WheelPhase::Waiting,
            ) => {
                self.phase = WheelPhase::Spinning {
                    since_unix: now_unix,
                };
                Some(self.phase)
            }
            (
                ContractEvent::WinnerCalculated {
                    offset,
                    winning_index,
                    ..
                },
                // The calculation-requested event can be dropped; a winner
                // event still lands the wheel from any pre-landed phase.
                WheelPhase::Standby | WheelPhase::Waiting | WheelPhase::Spinning { .. },
            ) => {
                self.phase = WheelPhase::Landed {
                    offset: *offset,
                    winning_index: *winning_index,
                };
                Some(self.phase)
            }
            _ => None,
        }
    }

    /// Land the wheel from a status re-poll instead of an event
    ///
    /// Used by the stuck-spin recovery path when the contract reports the
    /// round settled but the winner event never arrived.
    pub fn land_from_poll(&mut self, offset: u64, winning_index: u32) -> Option<WheelPhase> {
        match self.phase {
            WheelPhase::Standby | WheelPhase::Waiting | WheelPhase::Spinning { .. } => {
                self.phase = WheelPhase::Landed {
                    offset,
                    winning_index,
                };
                Some(self.phase)
            }
            _ => None,
        }
    }

    /// Timer-driven `landed -> stopped`; idempotent
    pub fn settle(&mut self) -> Option<WheelPhase> {
        match self.phase {
            WheelPhase::Landed {
                offset,
                winning_index,
            } => {
                self.phase = WheelPhase::Stopped {
                    offset,
                    winning_index,
                };
                Some(self.phase)
            }
            _ => None,
        }
    }

    /// Seconds spent spinning past `timeout_secs`, if any
    pub fn spin_overdue(&self, now_unix: u64, timeout_secs: u64) -> Option<u64> {
        match self.phase {
            WheelPhase::Spinning { since_unix } => {
                let elapsed = now_unix.saturating_sub(since_unix);
                (elapsed > timeout_secs).then_some(elapsed)
            }
            _ => None,
        }
    }

    /// Point the machine at a new round, discarding the old phase
    pub fn reset(&mut self, round_id: RoundId) {
        self.round_id = round_id;
        self.phase = WheelPhase::Standby;
    }
}
