// End-to-end checks of the core pipeline: resolve a full league, fold it into
// the store, rank the table, and walk the playoff bracket to a champion.

use seasoncast_core::bracket::{home_venue, next_match_id, PlayoffBracket};
use seasoncast_core::model::{
    Match, MatchId, MatchPrediction, PerSide, PlayoffStage, RunScorer, SimulationPhase, PlayerId,
    TeamId, TeamRef, VenueId, WicketTaker,
};
use seasoncast_core::performers::{compute_top_performers, DEFAULT_MVP_WICKET_WEIGHT};
use seasoncast_core::resolve::{
    complete_match, resolve_match, toss_for, ResolveInput, Resolution, ScoringContext,
    ScoringParams,
};
use seasoncast_core::standings::{compute_standings, ranking};
use seasoncast_core::store::{Action, MatchCompleteUpdate, SeasonStore};

fn teams() -> Vec<TeamRef> {
    (1..=6)
        .map(|i| TeamRef::new(TeamId(i), format!("Franchise {i}")))
        .collect()
}

/// Double round robin, every team hosting at its own venue.
fn league_fixtures() -> Vec<Match> {
    let teams = teams();
    let mut fixtures = Vec::new();
    let mut id = 1;
    for home in &teams {
        for away in &teams {
            if home.id == away.id {
                continue;
            }
            let mut m = Match::fixture(MatchId(id), home.clone(), away.clone(), VenueId(home.id.0));
            m.venue_name = format!("Ground {}", home.id);
            m.match_number = Some(id);
            fixtures.push(m);
            id += 1;
        }
    }
    fixtures
}

fn prediction_for(m: &Match) -> MatchPrediction {
    let home = 35.0 + f64::from(m.home_team_id.0 * 5);
    MatchPrediction {
        home_win_probability: home,
        away_win_probability: 100.0 - home,
        starting_xi: PerSide::default(),
        top_run_scorers: PerSide {
            home: vec![RunScorer {
                player_id: PlayerId(m.home_team_id.0 * 100),
                player_name: format!("Opener {}", m.home_team_id),
                predicted_runs: 30.0,
            }],
            away: vec![RunScorer {
                player_id: PlayerId(m.away_team_id.0 * 100),
                player_name: format!("Opener {}", m.away_team_id),
                predicted_runs: 25.0,
            }],
        },
        top_wicket_takers: PerSide {
            home: vec![WicketTaker {
                player_id: PlayerId(m.home_team_id.0 * 100 + 1),
                player_name: format!("Quick {}", m.home_team_id),
                predicted_wickets: 1.5,
            }],
            away: vec![],
        },
        predicted_scores: None,
    }
}

fn resolve(m: &Match, params: &ScoringParams) -> Match {
    let prediction = prediction_for(m);
    let input = ResolveInput {
        match_id: m.id,
        home: m.home_team_id,
        away: m.away_team_id,
        home_win_probability: prediction.home_win_probability,
        toss: Some(toss_for(m.id, m.home_team_id, m.away_team_id)),
        context: Some(ScoringContext {
            venue_avg_score: 170.0,
        }),
        knockout: !m.match_type.is_league(),
    };
    let mut prepared = m.clone();
    prepared.home_win_probability = Some(prediction.home_win_probability);
    prepared.prediction = Some(prediction);
    complete_match(&prepared, resolve_match(&input, params))
}

fn play_league(store: &mut SeasonStore, params: &ScoringParams) {
    let total = store.state().league_match_count();
    for index in 0..total {
        let fixture = store
            .state()
            .current_league_match()
            .cloned()
            .expect("fixture at index");
        assert_eq!(index, store.state().current_match_index);
        let done = resolve(&fixture, params);

        let mut matches = store.state().matches.clone();
        if let Some(slot) = matches.iter_mut().find(|m| m.id == done.id) {
            *slot = done.clone();
        }
        let outcome = store
            .dispatch(Action::UpdateMatchComplete(MatchCompleteUpdate {
                standings: compute_standings(&matches),
                top_performers: compute_top_performers(&matches, DEFAULT_MVP_WICKET_WEIGHT),
                current_match_index: index + 1,
                matches: vec![done],
            }))
            .unwrap();
        assert!(outcome.applied);
    }
}

#[test]
fn full_league_produces_consistent_table() {
    let params = ScoringParams::default();
    let mut store = SeasonStore::new();
    store.dispatch(Action::SetMatches(league_fixtures())).unwrap();
    play_league(&mut store, &params);

    let state = store.state();
    assert_eq!(state.completed_league_matches(), 30);
    assert_eq!(state.standings.len(), 6);

    let played: u32 = state.standings.iter().map(|s| s.played).sum();
    assert_eq!(played, 60);
    for row in &state.standings {
        assert_eq!(row.points, 2 * row.wins + row.no_result);
        assert_eq!(row.played, row.wins + row.losses + row.no_result);
    }
    for pair in state.standings.windows(2) {
        assert_ne!(ranking(&pair[0], &pair[1]), std::cmp::Ordering::Greater);
    }
    assert_eq!(state.standings, compute_standings(&state.matches));
    assert!(state.top_performers.orange_cap.is_some());
    assert!(state.top_performers.mvp.is_some());
}

#[test]
fn replaying_the_season_is_deterministic() {
    let params = ScoringParams::default();
    let mut first = SeasonStore::new();
    first.dispatch(Action::SetMatches(league_fixtures())).unwrap();
    play_league(&mut first, &params);

    let mut second = SeasonStore::new();
    second.dispatch(Action::SetMatches(league_fixtures())).unwrap();
    play_league(&mut second, &params);

    assert_eq!(first.state().matches, second.state().matches);
    assert_eq!(first.state().standings, second.state().standings);
}

#[test]
fn late_duplicate_resolution_is_discarded() {
    let params = ScoringParams::default();
    let mut store = SeasonStore::new();
    store.dispatch(Action::SetMatches(league_fixtures())).unwrap();
    play_league(&mut store, &params);
    let before = store.state().clone();

    // A stale continuation arrives with a fabricated result for match 1.
    let mut forged = before.match_by_id(MatchId(1)).cloned().unwrap();
    forged.winner_id = Some(forged.away_team_id);
    forged.home_score = Some(1);
    let outcome = store
        .dispatch(Action::UpdateMatchComplete(MatchCompleteUpdate {
            standings: Vec::new(),
            top_performers: Default::default(),
            current_match_index: 0,
            matches: vec![forged],
        }))
        .unwrap();

    assert!(!outcome.applied);
    assert_eq!(store.state().matches, before.matches);
    assert_eq!(store.state().standings, before.standings);
    assert_eq!(store.state().current_match_index, before.current_match_index);
}

#[test]
fn playoffs_crown_a_qualified_champion() {
    let params = ScoringParams::default();
    let mut store = SeasonStore::new();
    store.dispatch(Action::SetMatches(league_fixtures())).unwrap();
    for phase in [SimulationPhase::FixtureReveal, SimulationPhase::League] {
        store.dispatch(Action::SetPhase(phase)).unwrap();
    }
    play_league(&mut store, &params);
    store
        .dispatch(Action::SetPhase(SimulationPhase::Qualification))
        .unwrap();

    let mut bracket = PlayoffBracket::qualify(&store.state().standings).unwrap();
    let seeds = bracket.seeds().clone();
    store
        .dispatch(Action::SetQualifiedTeams(seeds.to_vec()))
        .unwrap();
    store.dispatch(Action::SetPhase(SimulationPhase::Playoffs)).unwrap();

    while let Some(fixture) = bracket.next_fixture() {
        if fixture.stage == PlayoffStage::Final {
            store.dispatch(Action::SetPhase(SimulationPhase::Final)).unwrap();
        }
        let matches = &store.state().matches;
        let (venue_id, venue_name) =
            home_venue(matches, fixture.home.id).expect("home venue");
        let id = next_match_id(matches);
        let knockout = fixture.to_match(id, venue_id, &venue_name);
        let mut schedule = store.state().matches.clone();
        schedule.push(knockout.clone());
        store.dispatch(Action::SetMatches(schedule)).unwrap();

        let done = resolve(&knockout, &params);
        assert!(!done.no_result, "knockout matches always produce a winner");
        let winner = done.winner_id.expect("winner");
        let update = MatchCompleteUpdate {
            standings: store.state().standings.clone(),
            top_performers: store.state().top_performers.clone(),
            current_match_index: store.state().current_match_index,
            matches: vec![done],
        };
        store.dispatch(Action::UpdateMatchComplete(update)).unwrap();
        let result = bracket.record(fixture.stage, winner).unwrap().clone();
        match fixture.stage {
            PlayoffStage::Semifinal1 => store.dispatch(Action::SetSemifinal1Result {
                winner: result.winner,
                loser: result.loser,
            }),
            PlayoffStage::Semifinal2 => store.dispatch(Action::SetSemifinal2Winner(result.winner)),
            PlayoffStage::Eliminator => {
                store.dispatch(Action::SetEliminatorWinner(result.winner))
            }
            PlayoffStage::Final => store.dispatch(Action::SetChampion {
                champion: result.winner,
                runner_up: result.loser,
            }),
        }
        .unwrap();
    }

    let state = store.state();
    let champion = state.champion.clone().expect("champion");
    assert!(seeds.iter().any(|t| t.id == champion.id));
    assert_eq!(bracket.champion(), Some(&champion));
    assert_eq!(state.phase, SimulationPhase::Final);
    // League table is untouched by knockout results.
    assert_eq!(state.standings, compute_standings(&state.matches));
    assert_eq!(state.matches.len(), 34);
    assert!(state.matches.iter().all(|m| m.completed));
}

#[test]
fn washouts_award_a_point_each() {
    let params = ScoringParams {
        no_result_probability: 1.0,
        ..ScoringParams::default()
    };
    let fixtures = league_fixtures();
    let done: Vec<Match> = fixtures.iter().map(|m| resolve(m, &params)).collect();
    assert!(done.iter().all(|m| m.no_result && m.result.is_none()));
    let table = compute_standings(&done);
    assert!(table.iter().all(|s| s.points == 10 && s.no_result == 10));

    // A knockout fixture with the same draws still produces a winner.
    let mut knockout = fixtures[0].clone();
    knockout.match_type = PlayoffStage::Final.match_type();
    let input = ResolveInput {
        match_id: knockout.id,
        home: knockout.home_team_id,
        away: knockout.away_team_id,
        home_win_probability: 50.0,
        toss: None,
        context: None,
        knockout: true,
    };
    assert!(matches!(
        resolve_match(&input, &params),
        Resolution::Decided(_)
    ));
}
