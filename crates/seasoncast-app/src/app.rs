// Season orchestration.
//
// The central event loop that owns the season store and drives the show:
// it reacts to user commands, pipeline results and timer cues, dispatches
// store actions and pushes UI updates to the front end. Spawned pipeline and
// timer tasks never touch state; their messages are checked against the
// store's latest state before anything is committed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use seasoncast_api::{ApiError, PredictionService};
use seasoncast_core::bracket::{home_venue, next_match_id, BracketError, PlayoffBracket};
use seasoncast_core::model::{
    Match, MatchId, PlayoffStage, PreMatchStage, SeasonOutlook, SimulationPhase, TeamRef, VenueId,
};
use seasoncast_core::performers::compute_top_performers;
use seasoncast_core::resolve::{complete_match, resolve_match, ResolveInput, ScoringContext};
use seasoncast_core::standings::{compute_standings_with, top_teams};
use seasoncast_core::store::{Action, DispatchOutcome, MatchCompleteUpdate, SeasonState, SeasonStore};

use crate::config::Config;
use crate::pipeline::{spawn_load, spawn_prepare, Pipeline, PipelineEvent, PreparedMatch, SeasonData};
use crate::protocol::{UiUpdate, UserCommand};
use crate::report;
use crate::scheduler::{Cue, Scheduler, TimerFired};

/// Home win probability used when no prediction could be fetched.
pub const FALLBACK_WIN_PROBABILITY: f64 = 50.0;

/// Progress held back while paused, replayed on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parked {
    Cue(Cue),
    /// Prepared match waiting for its toss and lineup reveal.
    StartPreMatch(MatchId),
    /// Match waiting for fallback resolution.
    Resolve(MatchId),
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

pub struct AppState {
    config: Config,
    store: SeasonStore,
    pipeline: Arc<Pipeline>,
    pipeline_tx: mpsc::Sender<PipelineEvent>,
    ui_tx: mpsc::Sender<UiUpdate>,
    scheduler: Scheduler,

    /// Tags pipeline tasks; events from older generations are discarded.
    pipeline_generation: u64,
    pipeline_task: Option<JoinHandle<()>>,
    /// Match whose preparation is in flight.
    in_flight: Option<MatchId>,
    loading: bool,
    parked: Option<Parked>,

    /// Fixtures as loaded, replayed on reset.
    pristine: Vec<Match>,
    teams: Vec<TeamRef>,
    outlook: SeasonOutlook,
    contexts: HashMap<MatchId, Option<ScoringContext>>,
    bracket: Option<PlayoffBracket>,
}

impl AppState {
    pub fn new(
        config: Config,
        service: Arc<dyn PredictionService>,
        pipeline_tx: mpsc::Sender<PipelineEvent>,
        timer_tx: mpsc::Sender<TimerFired>,
        ui_tx: mpsc::Sender<UiUpdate>,
    ) -> Self {
        let pipeline = Arc::new(Pipeline::new(service, &config));
        let mut store = SeasonStore::new();
        // SetSpeed is infallible.
        let _ = store.dispatch(Action::SetSpeed(config.playback.speed));
        AppState {
            config,
            store,
            pipeline,
            pipeline_tx,
            ui_tx,
            scheduler: Scheduler::new(timer_tx),
            pipeline_generation: 0,
            pipeline_task: None,
            in_flight: None,
            loading: false,
            parked: None,
            pristine: Vec::new(),
            teams: Vec::new(),
            outlook: SeasonOutlook::default(),
            contexts: HashMap::new(),
            bracket: None,
        }
    }

    /// Snapshots published after every applied store action.
    pub fn subscribe(&self) -> watch::Receiver<Arc<SeasonState>> {
        self.store.subscribe()
    }

    pub fn state(&self) -> &SeasonState {
        self.store.state()
    }

    async fn emit(&self, update: UiUpdate) {
        let _ = self.ui_tx.send(update).await;
    }

    /// Dispatch an action that cannot fail for the current state. A failure
    /// means the flow went out of sync and is logged.
    fn dispatch(&mut self, action: Action) -> DispatchOutcome {
        match self.store.dispatch(action) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("store rejected action: {e}");
                DispatchOutcome::default()
            }
        }
    }

    async fn set_phase(&mut self, phase: SimulationPhase) {
        if self.dispatch(Action::SetPhase(phase)).applied {
            self.emit(UiUpdate::PhaseChanged(phase)).await;
        }
    }

    async fn set_playing(&mut self, playing: bool) {
        self.dispatch(Action::SetPlaying(playing));
        let speed = self.store.state().speed;
        self.emit(UiUpdate::Playback { playing, speed }).await;
    }

    fn schedule(&mut self, cue: Cue) {
        let base = cue.base_delay(&self.config.timing);
        let speed = self.store.state().speed;
        self.scheduler.schedule(cue, base, speed);
    }

    fn cancel_pipeline_task(&mut self) {
        if let Some(handle) = self.pipeline_task.take() {
            handle.abort();
            debug!("cancelled pipeline task");
        }
        self.pipeline_generation += 1;
        self.in_flight = None;
        self.loading = false;
    }

    /// Abort every spawned task.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel();
        self.cancel_pipeline_task();
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub async fn handle_command(&mut self, cmd: UserCommand) {
        match cmd {
            UserCommand::Start => self.start().await,
            UserCommand::Play => self.play().await,
            UserCommand::Pause => self.pause().await,
            UserCommand::TogglePlay => {
                if self.store.state().is_playing {
                    self.pause().await;
                } else {
                    self.play().await;
                }
            }
            UserCommand::SetSpeed(speed) => {
                self.dispatch(Action::SetSpeed(speed));
                info!("speed set to {speed}");
                let playing = self.store.state().is_playing;
                self.emit(UiUpdate::Playback { playing, speed }).await;
            }
            UserCommand::Reset => self.reset().await,
            // Handled by the event loop.
            UserCommand::Quit => {}
        }
    }

    async fn start(&mut self) {
        if self.store.state().phase != SimulationPhase::Intro {
            self.resume().await;
            return;
        }
        if self.loading {
            debug!("season load already in flight");
            return;
        }
        self.set_playing(true).await;
        if self.pristine.is_empty() {
            self.pipeline_generation += 1;
            self.loading = true;
            let outlook = self
                .config
                .outlook
                .enabled
                .then_some(self.config.outlook.num_simulations);
            info!(season = self.config.season.year, "loading season");
            self.pipeline_task = Some(spawn_load(
                Arc::clone(&self.pipeline),
                self.config.season.year,
                outlook,
                self.pipeline_generation,
                self.pipeline_tx.clone(),
            ));
        } else {
            self.enter_fixture_reveal().await;
        }
    }

    async fn play(&mut self) {
        if self.store.state().phase == SimulationPhase::Intro {
            self.start().await;
        } else {
            self.resume().await;
        }
    }

    async fn resume(&mut self) {
        if self.store.state().phase.is_terminal() {
            return;
        }
        self.set_playing(true).await;
        let Some(parked) = self.parked.take() else {
            return;
        };
        debug!(?parked, "replaying parked progress");
        match parked {
            Parked::Cue(cue) => self.on_cue(cue).await,
            Parked::StartPreMatch(match_id) => {
                if self.is_live(match_id) {
                    self.start_pre_match(match_id).await;
                }
            }
            Parked::Resolve(match_id) => {
                if self.is_live(match_id) {
                    self.resolve_current().await;
                }
            }
        }
    }

    /// `match_id` is still the current match and not yet completed.
    fn is_live(&self, match_id: MatchId) -> bool {
        let state = self.store.state();
        state.current_match == Some(match_id) && !state.is_completed(match_id)
    }

    async fn pause(&mut self) {
        if self.store.state().is_playing {
            self.set_playing(false).await;
        }
    }

    async fn reset(&mut self) {
        self.shutdown();
        self.parked = None;
        self.contexts.clear();
        self.bracket = None;
        self.dispatch(Action::Reset);
        if !self.pristine.is_empty() {
            self.install_fixtures();
        }
        info!("season reset");
        self.emit(UiUpdate::PhaseChanged(SimulationPhase::Intro)).await;
        let speed = self.store.state().speed;
        self.emit(UiUpdate::Playback {
            playing: false,
            speed,
        })
        .await;
    }

    // -----------------------------------------------------------------------
    // Timer cues
    // -----------------------------------------------------------------------

    pub async fn handle_timer(&mut self, fired: TimerFired) {
        if !self.scheduler.accept(&fired) {
            return;
        }
        if !self.store.state().is_playing {
            debug!(cue = ?fired.cue, "paused, parking cue");
            self.parked = Some(Parked::Cue(fired.cue));
            return;
        }
        self.on_cue(fired.cue).await;
    }

    async fn on_cue(&mut self, cue: Cue) {
        match cue {
            Cue::FixtureRevealDone => {
                self.set_phase(SimulationPhase::League).await;
                self.next_league_match().await;
            }
            Cue::PreMatch(stage) => self.advance_pre_match(stage).await,
            Cue::ResultShown => self.schedule(Cue::StandingsSettled),
            Cue::StandingsSettled => self.advance().await,
            Cue::QualificationDone => {
                self.set_phase(SimulationPhase::Playoffs).await;
                self.next_playoff_match().await;
            }
            Cue::ChampionDone => {
                self.set_phase(SimulationPhase::Trophy).await;
                self.schedule(Cue::TrophyDone);
            }
            Cue::TrophyDone => {
                self.set_phase(SimulationPhase::Rewind).await;
                self.schedule(Cue::RewindDone);
            }
            Cue::RewindDone => {
                self.set_phase(SimulationPhase::Analytics).await;
                self.finish().await;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pipeline events
    // -----------------------------------------------------------------------

    pub async fn handle_pipeline(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::SeasonLoaded { generation, result } => {
                if generation != self.pipeline_generation {
                    debug!(generation, "discarding stale season load");
                    return;
                }
                self.pipeline_task = None;
                self.loading = false;
                self.on_season_loaded(result).await;
            }
            PipelineEvent::Prepared {
                match_id,
                generation,
                outcome,
            } => {
                if generation != self.pipeline_generation {
                    debug!(match_id = %match_id, generation, "discarding stale preparation");
                    return;
                }
                self.pipeline_task = None;
                self.in_flight = None;
                self.dispatch(Action::SetIsPreparingMatch(false));
                self.on_prepared(match_id, outcome).await;
            }
        }
    }

    async fn on_season_loaded(&mut self, result: Result<SeasonData, ApiError>) {
        let data = match result {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to load season fixtures: {e}");
                self.set_playing(false).await;
                self.emit(UiUpdate::Error(format!("could not load fixtures: {e}")))
                    .await;
                return;
            }
        };
        if data.matches.is_empty() {
            warn!("season has no fixtures");
            self.set_playing(false).await;
            self.emit(UiUpdate::Error("the season has no fixtures".into()))
                .await;
            return;
        }

        self.pristine = data.matches;
        self.teams = data.teams;
        self.outlook = data.outlook;
        self.install_fixtures();
        self.emit(UiUpdate::FixturesLoaded {
            fixtures: self.pristine.len(),
            teams: self.teams.len(),
        })
        .await;
        self.enter_fixture_reveal().await;
    }

    /// Put the loaded fixtures and the empty table into the store.
    fn install_fixtures(&mut self) {
        self.dispatch(Action::SetMatches(self.pristine.clone()));
        let standings = compute_standings_with(&self.pristine, &self.teams, &self.outlook);
        self.dispatch(Action::UpdateMatchComplete(MatchCompleteUpdate {
            standings,
            top_performers: Default::default(),
            current_match_index: 0,
            matches: Vec::new(),
        }));
    }

    async fn on_prepared(&mut self, match_id: MatchId, outcome: Result<PreparedMatch, ApiError>) {
        let state = self.store.state();
        if state.current_match != Some(match_id) {
            warn!(
                match_id = %match_id,
                current = ?state.current_match,
                "preparation finished for a match that is no longer current"
            );
            return;
        }
        if state.is_completed(match_id) {
            debug!(match_id = %match_id, "match already completed, dropping preparation");
            return;
        }

        match outcome {
            Ok(prepared) => {
                let home_win_probability = prepared
                    .fixture
                    .home_win_probability
                    .unwrap_or(FALLBACK_WIN_PROBABILITY);
                if !self
                    .dispatch(Action::CommitPreparedMatch(prepared.fixture))
                    .applied
                {
                    return;
                }
                self.contexts.insert(match_id, prepared.context);
                self.emit(UiUpdate::MatchPrepared {
                    match_id,
                    home_win_probability,
                    fallback: false,
                })
                .await;
                if self.store.state().is_playing {
                    self.start_pre_match(match_id).await;
                } else {
                    debug!(match_id = %match_id, "paused, holding the pre-match reveal");
                    self.parked = Some(Parked::StartPreMatch(match_id));
                }
            }
            Err(e) => {
                warn!(match_id = %match_id, "prediction unavailable, resolving with fallback: {e}");
                self.contexts.insert(match_id, None);
                self.emit(UiUpdate::MatchPrepared {
                    match_id,
                    home_win_probability: FALLBACK_WIN_PROBABILITY,
                    fallback: true,
                })
                .await;
                if self.store.state().is_playing {
                    self.resolve_current().await;
                } else {
                    debug!(match_id = %match_id, "paused, holding fallback resolution");
                    self.parked = Some(Parked::Resolve(match_id));
                }
            }
        }
    }

    async fn start_pre_match(&mut self, match_id: MatchId) {
        self.dispatch(Action::StartPreMatchSequence);
        self.emit(UiUpdate::PreMatch {
            match_id,
            stage: PreMatchStage::Toss,
        })
        .await;
        self.schedule(Cue::PreMatch(PreMatchStage::Toss));
    }

    // -----------------------------------------------------------------------
    // Season flow
    // -----------------------------------------------------------------------

    async fn enter_fixture_reveal(&mut self) {
        self.set_phase(SimulationPhase::FixtureReveal).await;
        self.schedule(Cue::FixtureRevealDone);
    }

    async fn advance_pre_match(&mut self, stage: PreMatchStage) {
        let Some(match_id) = self.store.state().current_match else {
            warn!(?stage, "pre-match cue without a current match");
            return;
        };
        match stage.next() {
            Some(next) => {
                self.dispatch(Action::SetPreMatchStage(next));
                self.emit(UiUpdate::PreMatch {
                    match_id,
                    stage: next,
                })
                .await;
                self.schedule(Cue::PreMatch(next));
            }
            None => {
                self.dispatch(Action::CompletePreMatchSequence);
                self.resolve_current().await;
            }
        }
    }

    /// Start preparing `fixture`. At most one preparation is in flight.
    async fn begin_match(&mut self, fixture: Match, stage: Option<PlayoffStage>) {
        if self.in_flight == Some(fixture.id) {
            debug!(match_id = %fixture.id, "preparation already in flight");
            return;
        }
        if let Some(other) = self.in_flight {
            warn!(match_id = %other, "abandoning preparation of another match");
            self.cancel_pipeline_task();
        }

        if let Err(e) = self.store.dispatch(Action::SetCurrentMatch(Some(fixture.id))) {
            warn!("cannot start match: {e}");
            return;
        }
        self.dispatch(Action::SetIsPreparingMatch(true));

        self.pipeline_generation += 1;
        self.in_flight = Some(fixture.id);
        info!(match_id = %fixture.id, "preparing {}", fixture.title());
        self.emit(UiUpdate::MatchStarting {
            match_id: fixture.id,
            title: fixture.title(),
            stage,
        })
        .await;
        self.pipeline_task = Some(spawn_prepare(
            Arc::clone(&self.pipeline),
            fixture,
            self.pipeline_generation,
            self.pipeline_tx.clone(),
        ));
    }

    async fn next_league_match(&mut self) {
        loop {
            let state = self.store.state();
            let index = state.current_match_index;
            match state.current_league_match().cloned() {
                Some(m) if m.completed => {
                    self.dispatch(Action::SetCurrentMatchIndex(index + 1));
                }
                Some(m) => {
                    self.begin_match(m, None).await;
                    return;
                }
                None => break,
            }
        }
        self.enter_qualification().await;
    }

    /// Resolve the current match, commit it with the recomputed table and
    /// schedule the result card.
    async fn resolve_current(&mut self) {
        let state = self.store.state();
        let Some(match_id) = state.current_match else {
            warn!("resolve requested without a current match");
            return;
        };
        let Some(fixture) = state.match_by_id(match_id).cloned() else {
            warn!(match_id = %match_id, "current match missing from store");
            return;
        };
        if fixture.completed {
            debug!(match_id = %match_id, "already completed, skipping resolution");
            return;
        }

        let knockout = !fixture.match_type.is_league();
        let input = ResolveInput {
            match_id,
            home: fixture.home_team_id,
            away: fixture.away_team_id,
            home_win_probability: fixture
                .home_win_probability
                .unwrap_or(FALLBACK_WIN_PROBABILITY),
            toss: fixture.toss,
            context: self.contexts.get(&match_id).copied().flatten(),
            knockout,
        };
        let done = complete_match(&fixture, resolve_match(&input, &self.config.scoring));

        let mut matches = state.matches.clone();
        if let Some(slot) = matches.iter_mut().find(|m| m.id == match_id) {
            *slot = done.clone();
        }
        let standings = compute_standings_with(&matches, &self.teams, &self.outlook);
        let top_performers =
            compute_top_performers(&matches, self.config.leaders.mvp_wicket_weight);
        let current_match_index = if knockout {
            state.current_match_index
        } else {
            state.current_match_index + 1
        };

        let outcome = self.dispatch(Action::UpdateMatchComplete(MatchCompleteUpdate {
            standings: standings.clone(),
            top_performers: top_performers.clone(),
            current_match_index,
            matches: vec![done.clone()],
        }));
        if !outcome.applied {
            warn!(match_id = %match_id, "completion lost to an earlier commit");
            return;
        }

        match &done.margin {
            Some(margin) if done.no_result => info!(match_id = %match_id, "{}: {margin}", done.title()),
            Some(margin) => info!(
                match_id = %match_id,
                winner = ?done.winner_id,
                "{}: won by {margin}",
                done.title()
            ),
            None => info!(match_id = %match_id, "{} completed", done.title()),
        }
        self.contexts.remove(&match_id);

        if knockout {
            self.record_knockout(&done).await;
        }
        self.emit(UiUpdate::MatchResult(Box::new(done))).await;
        self.emit(UiUpdate::StandingsUpdated {
            standings,
            top_performers,
        })
        .await;
        self.schedule(Cue::ResultShown);
    }

    async fn record_knockout(&mut self, done: &Match) {
        let Some(stage) = PlayoffStage::from_match_type(done.match_type) else {
            return;
        };
        let Some(winner) = done.winner_id else {
            warn!(match_id = %done.id, "knockout finished without a winner");
            return;
        };
        let Some(bracket) = self.bracket.as_mut() else {
            warn!(match_id = %done.id, "knockout result without a bracket");
            return;
        };
        let result = match bracket.record(stage, winner) {
            Ok(result) => result.clone(),
            Err(e) => {
                warn!("bracket rejected result: {e}");
                return;
            }
        };

        let action = match stage {
            PlayoffStage::Semifinal1 => Action::SetSemifinal1Result {
                winner: result.winner.clone(),
                loser: result.loser.clone(),
            },
            PlayoffStage::Semifinal2 => Action::SetSemifinal2Winner(result.winner.clone()),
            PlayoffStage::Eliminator => Action::SetEliminatorWinner(result.winner.clone()),
            PlayoffStage::Final => Action::SetChampion {
                champion: result.winner.clone(),
                runner_up: result.loser.clone(),
            },
        };
        self.dispatch(action);
        if stage == PlayoffStage::Final {
            info!("{} are champions", result.winner.name);
            self.emit(UiUpdate::Champion {
                champion: result.winner,
                runner_up: Some(result.loser),
            })
            .await;
        }
    }

    /// Move on after a result has been shown.
    async fn advance(&mut self) {
        match self.store.state().phase {
            SimulationPhase::League => self.next_league_match().await,
            SimulationPhase::Playoffs | SimulationPhase::Final => {
                if self.bracket.as_ref().is_some_and(PlayoffBracket::is_complete) {
                    self.enter_champion().await;
                } else {
                    self.next_playoff_match().await;
                }
            }
            phase => warn!(?phase, "nothing to advance to"),
        }
    }

    async fn enter_qualification(&mut self) {
        self.set_phase(SimulationPhase::Qualification).await;
        let standings = self.store.state().standings.clone();
        match PlayoffBracket::qualify(&standings) {
            Ok(bracket) => {
                let qualified = bracket.seeds().to_vec();
                info!(
                    "qualified: {}",
                    qualified
                        .iter()
                        .map(|t| t.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                self.dispatch(Action::SetQualifiedTeams(qualified.clone()));
                self.bracket = Some(bracket);
                self.emit(UiUpdate::Qualified(qualified)).await;
                self.schedule(Cue::QualificationDone);
            }
            Err(BracketError::NotEnoughTeams(n)) => self.crown_table_leader(n).await,
            Err(e) => warn!("cannot seed playoffs: {e}"),
        }
    }

    /// Too few teams for a bracket: the table leader takes the title.
    async fn crown_table_leader(&mut self, teams: usize) {
        let standings = self.store.state().standings.clone();
        let top = top_teams(&standings, 2);
        let [champion, runner_up] = match <[TeamRef; 2]>::try_from(top) {
            Ok(pair) => pair,
            Err(_) => {
                warn!(teams, "not enough teams to crown a champion");
                self.set_playing(false).await;
                self.emit(UiUpdate::Error("not enough teams to crown a champion".into()))
                    .await;
                return;
            }
        };

        info!(teams, "too few teams for playoffs, crowning the table leader");
        self.emit(UiUpdate::Notice(format!(
            "only {teams} teams, no playoffs this season"
        )))
        .await;
        self.dispatch(Action::SetQualifiedTeams(top_teams(&standings, teams)));
        for phase in [
            SimulationPhase::Playoffs,
            SimulationPhase::Final,
            SimulationPhase::Champion,
        ] {
            self.set_phase(phase).await;
        }
        self.dispatch(Action::SetChampion {
            champion: champion.clone(),
            runner_up: runner_up.clone(),
        });
        self.emit(UiUpdate::Champion {
            champion,
            runner_up: Some(runner_up),
        })
        .await;
        self.schedule(Cue::ChampionDone);
    }

    async fn next_playoff_match(&mut self) {
        let Some(fixture) = self.bracket.as_ref().and_then(PlayoffBracket::next_fixture) else {
            warn!("no playoff fixture to play");
            return;
        };
        let stage = fixture.stage;
        if stage == PlayoffStage::Final {
            self.set_phase(SimulationPhase::Final).await;
        }
        self.dispatch(Action::SetPlayoffPhase(Some(stage)));

        let state = self.store.state();
        let scheduled = state
            .matches
            .iter()
            .find(|m| m.match_type == stage.match_type() && !m.completed);
        let (id, (venue_id, venue_name)) = match scheduled {
            Some(m) => (m.id, (m.venue_id, m.venue_name.clone())),
            None => (
                next_match_id(&state.matches),
                home_venue(&state.matches, fixture.home.id)
                    .unwrap_or_else(|| (VenueId(0), String::new())),
            ),
        };
        let knockout = fixture.to_match(id, venue_id, &venue_name);

        let mut matches = state.matches.clone();
        match matches.iter_mut().find(|m| m.id == id) {
            Some(slot) => *slot = knockout.clone(),
            None => matches.push(knockout.clone()),
        }
        self.dispatch(Action::SetMatches(matches));
        info!("{}: {}", stage.label(), knockout.title());
        self.begin_match(knockout, Some(stage)).await;
    }

    async fn enter_champion(&mut self) {
        self.set_phase(SimulationPhase::Champion).await;
        self.schedule(Cue::ChampionDone);
    }

    async fn finish(&mut self) {
        if self.config.report.enabled {
            let dir = Path::new(&self.config.report.dir);
            match report::write_report(dir, &self.config.season, self.store.state()) {
                Ok(path) => self.emit(UiUpdate::ReportWritten(path)).await,
                Err(e) => {
                    warn!("failed to write season report: {e:#}");
                    self.emit(UiUpdate::Error(format!("report not written: {e:#}")))
                        .await;
                }
            }
        }
        self.set_playing(false).await;
        info!("season complete");
        self.emit(UiUpdate::SeasonComplete).await;
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the orchestrator until `Quit` or until the command channel closes.
///
/// Listens on three channels using `tokio::select!`:
/// 1. User commands from the front end
/// 2. Pipeline results (season load, match preparation)
/// 3. Timer cues from the scheduler
pub async fn run(
    mut pipeline_rx: mpsc::Receiver<PipelineEvent>,
    mut timer_rx: mpsc::Receiver<TimerFired>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => state.handle_command(cmd).await,
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // AppState holds senders for both channels, so they never close
            // while the loop runs.
            Some(event) = pipeline_rx.recv() => {
                state.handle_pipeline(event).await;
            }

            Some(fired) = timer_rx.recv() => {
                state.handle_timer(fired).await;
            }
        }
    }

    state.shutdown();
    info!("Application event loop exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
