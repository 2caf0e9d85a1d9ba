// Season state store.
//
// The single authoritative container for season state. Every mutation is a
// named `Action` applied through `SeasonStore::dispatch`; subscribers receive
// a fresh snapshot synchronously after each applied action. The merge rule
// shared by every match-carrying action: a match that is already completed in
// the store is never overwritten.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::model::{
    Match, MatchId, PlayoffStage, PreMatchStage, SimulationPhase, Speed, Standing, TeamRef,
    TopPerformers,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("invalid phase transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: SimulationPhase,
        to: SimulationPhase,
    },

    #[error("unknown match {0}")]
    UnknownMatch(MatchId),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Complete season state. Consumers only ever see read-only snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonState {
    pub phase: SimulationPhase,
    pub matches: Vec<Match>,
    pub standings: Vec<Standing>,
    pub top_performers: TopPerformers,
    /// Index into the league fixtures of the match being played.
    pub current_match_index: usize,
    pub current_match: Option<MatchId>,
    pub playoff_phase: Option<PlayoffStage>,
    pub qualified_teams: Vec<TeamRef>,
    pub semifinal_1_winner: Option<TeamRef>,
    pub semifinal_1_loser: Option<TeamRef>,
    pub semifinal_2_winner: Option<TeamRef>,
    pub eliminator_winner: Option<TeamRef>,
    pub champion: Option<TeamRef>,
    pub runner_up: Option<TeamRef>,
    pub is_playing: bool,
    pub speed: Speed,
    pub show_pre_match: bool,
    pub pre_match_stage: Option<PreMatchStage>,
    pub is_preparing_match: bool,
    /// Incremented on every applied action.
    pub revision: u64,
}

impl Default for SeasonState {
    fn default() -> Self {
        SeasonState {
            phase: SimulationPhase::Intro,
            matches: Vec::new(),
            standings: Vec::new(),
            top_performers: TopPerformers::default(),
            current_match_index: 0,
            current_match: None,
            playoff_phase: None,
            qualified_teams: Vec::new(),
            semifinal_1_winner: None,
            semifinal_1_loser: None,
            semifinal_2_winner: None,
            eliminator_winner: None,
            champion: None,
            runner_up: None,
            is_playing: false,
            speed: Speed::X1,
            show_pre_match: false,
            pre_match_stage: None,
            is_preparing_match: false,
            revision: 0,
        }
    }
}

impl SeasonState {
    pub fn match_by_id(&self, id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    pub fn league_matches(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| m.match_type.is_league())
    }

    pub fn league_match_count(&self) -> usize {
        self.league_matches().count()
    }

    /// League fixture at `current_match_index`.
    pub fn current_league_match(&self) -> Option<&Match> {
        self.league_matches().nth(self.current_match_index)
    }

    pub fn completed_league_matches(&self) -> usize {
        self.league_matches().filter(|m| m.completed).count()
    }

    pub fn is_completed(&self, id: MatchId) -> bool {
        self.match_by_id(id).is_some_and(|m| m.completed)
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Batched post-resolution update: the new table, leaderboards, pointer and
/// the matches to merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCompleteUpdate {
    pub standings: Vec<Standing>,
    pub top_performers: TopPerformers,
    pub current_match_index: usize,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetMatches(Vec<Match>),
    /// Attach prediction/toss data to a not-yet-completed match.
    CommitPreparedMatch(Match),
    UpdateMatchComplete(MatchCompleteUpdate),
    SetPhase(SimulationPhase),
    SetCurrentMatchIndex(usize),
    SetCurrentMatch(Option<MatchId>),
    SetPlayoffPhase(Option<PlayoffStage>),
    SetQualifiedTeams(Vec<TeamRef>),
    SetSemifinal1Result { winner: TeamRef, loser: TeamRef },
    SetSemifinal2Winner(TeamRef),
    SetEliminatorWinner(TeamRef),
    SetChampion { champion: TeamRef, runner_up: TeamRef },
    SetPlaying(bool),
    SetSpeed(Speed),
    StartPreMatchSequence,
    SetPreMatchStage(PreMatchStage),
    CompletePreMatchSequence,
    SetIsPreparingMatch(bool),
    /// Back to Intro with all accumulated state cleared. Keeps the speed.
    Reset,
}

/// What a dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// False when the action was discarded as stale.
    pub applied: bool,
    /// Incoming matches rejected because the stored copy is completed.
    pub protected: usize,
}

impl DispatchOutcome {
    fn applied() -> Self {
        DispatchOutcome {
            applied: true,
            protected: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Merge rules
// ---------------------------------------------------------------------------

/// Merge `incoming` into `existing`, never replacing a completed match.
/// Returns `(protected, newly_completed)`.
fn merge_matches(existing: &mut Vec<Match>, incoming: Vec<Match>) -> (usize, usize) {
    let mut protected = 0;
    let mut newly_completed = 0;
    for m in incoming {
        match existing.iter_mut().find(|e| e.id == m.id) {
            Some(current) if current.completed => {
                if *current != m {
                    debug!(match_id = %m.id, "ignoring overwrite of completed match");
                    protected += 1;
                }
            }
            Some(current) => {
                if m.completed {
                    newly_completed += 1;
                }
                *current = m;
            }
            None => {
                if m.completed {
                    newly_completed += 1;
                }
                existing.push(m);
            }
        }
    }
    (protected, newly_completed)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct SeasonStore {
    state: SeasonState,
    tx: watch::Sender<Arc<SeasonState>>,
}

impl Default for SeasonStore {
    fn default() -> Self {
        SeasonStore::new()
    }
}

impl SeasonStore {
    pub fn new() -> Self {
        let state = SeasonState::default();
        let (tx, _rx) = watch::channel(Arc::new(state.clone()));
        SeasonStore { state, tx }
    }

    /// Latest state. The orchestrator re-reads this before every commit.
    pub fn state(&self) -> &SeasonState {
        &self.state
    }

    pub fn snapshot(&self) -> Arc<SeasonState> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SeasonState>> {
        self.tx.subscribe()
    }

    /// Apply one action. State is untouched when an error is returned.
    pub fn dispatch(&mut self, action: Action) -> Result<DispatchOutcome, StoreError> {
        let outcome = self.apply(action)?;
        if outcome.applied {
            self.state.revision += 1;
            self.tx.send_replace(Arc::new(self.state.clone()));
        }
        Ok(outcome)
    }

    fn apply(&mut self, action: Action) -> Result<DispatchOutcome, StoreError> {
        let state = &mut self.state;
        match action {
            Action::SetMatches(matches) => {
                // The incoming list defines the order; completed matches keep
                // their stored copy and are never dropped.
                let mut merged = Vec::with_capacity(matches.len());
                let mut protected = 0;
                for m in matches {
                    match state.match_by_id(m.id) {
                        Some(current) if current.completed => {
                            if *current != m {
                                protected += 1;
                            }
                            merged.push(current.clone());
                        }
                        _ => merged.push(m),
                    }
                }
                for current in state.matches.iter().filter(|c| c.completed) {
                    if !merged.iter().any(|m| m.id == current.id) {
                        merged.push(current.clone());
                    }
                }
                state.matches = merged;
                Ok(DispatchOutcome {
                    applied: true,
                    protected,
                })
            }

            Action::CommitPreparedMatch(prepared) => {
                let Some(current) = state.matches.iter_mut().find(|m| m.id == prepared.id) else {
                    return Err(StoreError::UnknownMatch(prepared.id));
                };
                if current.completed {
                    debug!(match_id = %prepared.id, "discarding preparation for completed match");
                    return Ok(DispatchOutcome {
                        applied: false,
                        protected: 1,
                    });
                }
                current.prediction = prepared.prediction;
                current.toss = prepared.toss;
                current.home_win_probability = prepared.home_win_probability;
                Ok(DispatchOutcome::applied())
            }

            Action::UpdateMatchComplete(update) => {
                let mut matches = state.matches.clone();
                let (protected, newly_completed) = merge_matches(&mut matches, update.matches);
                if protected > 0 && newly_completed == 0 {
                    // Every completion in this update lost the race; its
                    // table and pointer were computed from stale data.
                    warn!(protected, "discarding stale match-complete update");
                    return Ok(DispatchOutcome {
                        applied: false,
                        protected,
                    });
                }
                state.matches = matches;
                state.standings = update.standings;
                state.top_performers = update.top_performers;
                state.current_match_index = update.current_match_index;
                Ok(DispatchOutcome {
                    applied: true,
                    protected,
                })
            }

            Action::SetPhase(phase) => {
                if phase == state.phase {
                    return Ok(DispatchOutcome::default());
                }
                if !state.phase.can_advance_to(phase) {
                    return Err(StoreError::InvalidTransition {
                        from: state.phase,
                        to: phase,
                    });
                }
                info!("phase {:?} -> {:?}", state.phase, phase);
                state.phase = phase;
                Ok(DispatchOutcome::applied())
            }

            Action::SetCurrentMatchIndex(index) => {
                state.current_match_index = index;
                Ok(DispatchOutcome::applied())
            }

            Action::SetCurrentMatch(id) => {
                if let Some(id) = id {
                    if state.match_by_id(id).is_none() {
                        return Err(StoreError::UnknownMatch(id));
                    }
                }
                state.current_match = id;
                Ok(DispatchOutcome::applied())
            }

            Action::SetPlayoffPhase(stage) => {
                state.playoff_phase = stage;
                Ok(DispatchOutcome::applied())
            }

            Action::SetQualifiedTeams(teams) => {
                state.qualified_teams = teams;
                Ok(DispatchOutcome::applied())
            }

            Action::SetSemifinal1Result { winner, loser } => {
                state.semifinal_1_winner = Some(winner);
                state.semifinal_1_loser = Some(loser);
                Ok(DispatchOutcome::applied())
            }

            Action::SetSemifinal2Winner(team) => {
                state.semifinal_2_winner = Some(team);
                Ok(DispatchOutcome::applied())
            }

            Action::SetEliminatorWinner(team) => {
                state.eliminator_winner = Some(team);
                Ok(DispatchOutcome::applied())
            }

            Action::SetChampion {
                champion,
                runner_up,
            } => {
                state.champion = Some(champion);
                state.runner_up = Some(runner_up);
                Ok(DispatchOutcome::applied())
            }

            Action::SetPlaying(playing) => {
                state.is_playing = playing;
                Ok(DispatchOutcome::applied())
            }

            Action::SetSpeed(speed) => {
                state.speed = speed;
                Ok(DispatchOutcome::applied())
            }

            Action::StartPreMatchSequence => {
                state.show_pre_match = true;
                state.pre_match_stage = Some(PreMatchStage::Toss);
                Ok(DispatchOutcome::applied())
            }

            Action::SetPreMatchStage(stage) => {
                state.pre_match_stage = Some(stage);
                Ok(DispatchOutcome::applied())
            }

            Action::CompletePreMatchSequence => {
                state.show_pre_match = false;
                state.pre_match_stage = None;
                Ok(DispatchOutcome::applied())
            }

            Action::SetIsPreparingMatch(preparing) => {
                state.is_preparing_match = preparing;
                Ok(DispatchOutcome::applied())
            }

            Action::Reset => {
                let speed = state.speed;
                let revision = state.revision;
                *state = SeasonState {
                    speed,
                    revision,
                    ..SeasonState::default()
                };
                info!("season state reset");
                Ok(DispatchOutcome::applied())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
