// Timed cues for the season show.
//
// At most one cue is in flight. Each cue is a spawned task that sleeps until
// its deadline and reports back through the timer channel; the orchestrator
// accepts a firing only if its generation is still current.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use seasoncast_core::model::{PreMatchStage, Speed};

use crate::config::TimingConfig;

/// A step of the scripted show that waits on the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Fixture list has been on screen long enough; league play begins.
    FixtureRevealDone,
    /// The given pre-match stage has finished showing.
    PreMatch(PreMatchStage),
    /// The result card has been shown.
    ResultShown,
    /// The updated table has been shown; move to the next fixture.
    StandingsSettled,
    QualificationDone,
    ChampionDone,
    TrophyDone,
    RewindDone,
}

impl Cue {
    /// Duration of the cue at 1x.
    pub fn base_delay(self, timing: &TimingConfig) -> Duration {
        let ms = match self {
            Cue::FixtureRevealDone => timing.fixture_reveal_ms,
            Cue::PreMatch(PreMatchStage::Toss) => timing.toss_ms,
            Cue::PreMatch(PreMatchStage::LineupTeam1 | PreMatchStage::LineupTeam2) => {
                timing.lineup_ms
            }
            Cue::PreMatch(PreMatchStage::Complete) => timing.fade_ms,
            Cue::ResultShown => timing.result_ms,
            Cue::StandingsSettled => timing.standings_ms,
            Cue::QualificationDone => timing.qualification_ms,
            Cue::ChampionDone => timing.champion_ms,
            Cue::TrophyDone => timing.trophy_ms,
            Cue::RewindDone => timing.rewind_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Delivered on the timer channel when a cue's deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub generation: u64,
    pub cue: Cue,
}

pub struct Scheduler {
    tx: mpsc::Sender<TimerFired>,
    generation: u64,
    pending: Option<(Cue, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(tx: mpsc::Sender<TimerFired>) -> Self {
        Scheduler {
            tx,
            generation: 0,
            pending: None,
        }
    }

    /// Schedule `cue` after `base` scaled by `speed`, replacing any pending
    /// cue. The deadline is fixed now; later speed changes do not move it.
    pub fn schedule(&mut self, cue: Cue, base: Duration, speed: Speed) {
        self.abort_pending();
        self.generation += 1;
        let generation = self.generation;
        let delay = speed.scale(base);
        let deadline = Instant::now() + delay;
        let tx = self.tx.clone();

        debug!(?cue, ?delay, generation, "scheduling cue");
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(TimerFired { generation, cue }).await;
        });
        self.pending = Some((cue, handle));
    }

    /// Abort the pending cue. Firings already queued become stale.
    pub fn cancel(&mut self) {
        if self.abort_pending() {
            debug!(generation = self.generation, "cancelled pending cue");
        }
        self.generation += 1;
    }

    /// Consume a firing. Returns false for stale deliveries.
    pub fn accept(&mut self, fired: &TimerFired) -> bool {
        if !self.is_current(fired) {
            debug!(
                cue = ?fired.cue,
                got = fired.generation,
                current = self.generation,
                "discarding stale timer"
            );
            return false;
        }
        self.pending = None;
        true
    }

    pub fn is_current(&self, fired: &TimerFired) -> bool {
        fired.generation == self.generation
            && self.pending.as_ref().is_some_and(|(cue, _)| *cue == fired.cue)
    }

    pub fn pending(&self) -> Option<Cue> {
        self.pending.as_ref().map(|(cue, _)| *cue)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn abort_pending(&mut self) -> bool {
        match self.pending.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
