// League table aggregation.
//
// The table is recomputed wholesale from the full match list after every
// result; nothing is patched incrementally. Only completed league fixtures
// count.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::warn;

use crate::model::{
    Match, SeasonOutlook, Standing, TeamId, TeamRef, BALLS_PER_INNINGS, BALLS_PER_OVER,
};

pub const POINTS_PER_WIN: u32 = 2;
pub const POINTS_PER_NO_RESULT: u32 = 1;

#[derive(Debug, Default, Clone)]
struct Tally {
    name: String,
    played: u32,
    wins: u32,
    losses: u32,
    no_result: u32,
    runs_for: u32,
    balls_for: u32,
    runs_against: u32,
    balls_against: u32,
}

impl Tally {
    fn net_run_rate(&self) -> f64 {
        run_rate(self.runs_for, self.balls_for) - run_rate(self.runs_against, self.balls_against)
    }
}

fn run_rate(runs: u32, balls: u32) -> f64 {
    if balls == 0 {
        return 0.0;
    }
    f64::from(runs) / (f64::from(balls) / f64::from(BALLS_PER_OVER))
}

/// Compute the table from the match list alone.
pub fn compute_standings(matches: &[Match]) -> Vec<Standing> {
    compute_standings_with(matches, &[], &SeasonOutlook::default())
}

/// Compute the table, seeding the team set with `known_teams` (so teams that
/// have not played yet still get a row) and merging the pre-season outlook.
///
/// A side bowled out is charged its full quota of overs for net run rate.
pub fn compute_standings_with(
    matches: &[Match],
    known_teams: &[TeamRef],
    outlook: &SeasonOutlook,
) -> Vec<Standing> {
    let mut tallies: BTreeMap<TeamId, Tally> = BTreeMap::new();

    for team in known_teams {
        tallies.entry(team.id).or_default().name = team.name.clone();
    }

    for m in matches.iter().filter(|m| m.match_type.is_league()) {
        for (id, name) in [
            (m.home_team_id, &m.home_team_name),
            (m.away_team_id, &m.away_team_name),
        ] {
            let tally = tallies.entry(id).or_default();
            if tally.name.is_empty() {
                tally.name = name.clone();
            }
        }
    }

    for m in matches
        .iter()
        .filter(|m| m.match_type.is_league() && m.completed)
    {
        if m.no_result {
            for id in [m.home_team_id, m.away_team_id] {
                let tally = tallies.entry(id).or_default();
                tally.played += 1;
                tally.no_result += 1;
            }
            continue;
        }

        let Some(result) = &m.result else {
            warn!(match_id = %m.id, "completed match has no result, skipping in standings");
            continue;
        };

        let loser = result.loser();
        for innings in [&result.first_innings, &result.second_innings] {
            let balls = if innings.is_all_out() {
                u32::from(BALLS_PER_INNINGS)
            } else {
                u32::from(innings.overs.balls())
            };
            let bowling = if innings.batting_team == m.home_team_id {
                m.away_team_id
            } else {
                m.home_team_id
            };

            let bat = tallies.entry(innings.batting_team).or_default();
            bat.runs_for += innings.runs;
            bat.balls_for += balls;

            let bowl = tallies.entry(bowling).or_default();
            bowl.runs_against += innings.runs;
            bowl.balls_against += balls;
        }

        let winner = tallies.entry(result.winner).or_default();
        winner.played += 1;
        winner.wins += 1;
        let loser = tallies.entry(loser).or_default();
        loser.played += 1;
        loser.losses += 1;
    }

    let mut table: Vec<Standing> = tallies
        .into_iter()
        .map(|(team_id, t)| Standing {
            team_id,
            position: 0,
            played: t.played,
            wins: t.wins,
            losses: t.losses,
            no_result: t.no_result,
            points: POINTS_PER_WIN * t.wins + POINTS_PER_NO_RESULT * t.no_result,
            net_run_rate: t.net_run_rate(),
            runs_for: t.runs_for,
            balls_for: t.balls_for,
            runs_against: t.runs_against,
            balls_against: t.balls_against,
            playoff_probability: outlook
                .playoff_probability
                .get(&team_id)
                .copied()
                .unwrap_or(0.0),
            championship_probability: outlook
                .championship_probability
                .get(&team_id)
                .copied()
                .unwrap_or(0.0),
            team_name: t.name,
        })
        .collect();

    table.sort_by(ranking);
    for (idx, row) in table.iter_mut().enumerate() {
        row.position = idx + 1;
    }
    table
}

/// Points desc, net run rate desc, wins desc, then team id for a total order.
pub fn ranking(a: &Standing, b: &Standing) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.net_run_rate.total_cmp(&a.net_run_rate))
        .then_with(|| b.wins.cmp(&a.wins))
        .then_with(|| a.team_id.cmp(&b.team_id))
}

/// The top `n` teams of a computed table.
pub fn top_teams(table: &[Standing], n: usize) -> Vec<TeamRef> {
    table.iter().take(n).map(Standing::team).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Innings, MatchId, MatchResult, Overs, TossDecision, TossOutcome, VenueId,
    };

    fn team(id: u32) -> TeamRef {
        TeamRef::new(TeamId(id), format!("Team {id}"))
    }

    fn fixture(id: u32, home: u32, away: u32) -> Match {
        Match::fixture(MatchId(id), team(home), team(away), VenueId(1))
    }

    /// `first` bats first and scores `runs`; `second` replies with `reply`.
    fn played(
        id: u32,
        first: u32,
        second: u32,
        runs: u32,
        reply: u32,
        reply_wickets: u8,
        reply_balls: u16,
    ) -> Match {
        let mut m = fixture(id, first, second);
        let winner = if reply > runs { second } else { first };
        m.completed = true;
        m.winner_id = Some(TeamId(winner));
        m.result = Some(MatchResult {
            winner: TeamId(winner),
            margin: String::new(),
            first_innings: Innings {
                batting_team: TeamId(first),
                runs,
                wickets: 6,
                overs: Overs::FULL,
            },
            second_innings: Innings {
                batting_team: TeamId(second),
                runs: reply,
                wickets: reply_wickets,
                overs: Overs::from_balls(reply_balls),
            },
            toss: TossOutcome {
                winner: TeamId(first),
                decision: TossDecision::Bat,
            },
        });
        m
    }

    fn six_team_fixtures() -> Vec<Match> {
        vec![
            fixture(1, 1, 2),
            fixture(2, 3, 4),
            fixture(3, 5, 6),
            fixture(4, 1, 3),
            fixture(5, 2, 5),
            fixture(6, 4, 6),
        ]
    }

    #[test]
    fn six_teams_two_results() {
        let mut matches = six_team_fixtures();
        // Team 1 beats team 2 twice (once defending, once chasing).
        matches[0] = played(1, 1, 2, 180, 160, 8, 120);
        matches.push(played(7, 2, 1, 150, 151, 4, 110));

        let table = compute_standings(&matches);
        assert_eq!(table.len(), 6);
        assert_eq!(table[0].team_id, TeamId(1));
        assert_eq!(table[0].points, 4);
        assert_eq!(table[0].position, 1);

        let team2 = table.iter().find(|s| s.team_id == TeamId(2)).unwrap();
        assert_eq!(team2.points, 0);
        assert_eq!(team2.losses, 2);
        for s in table.iter().filter(|s| s.team_id.0 > 2) {
            assert_eq!(s.points, 0);
            assert_eq!(s.played, 0);
        }
    }

    #[test]
    fn single_win_gives_two_points() {
        let mut matches = six_team_fixtures();
        matches[0] = played(1, 1, 2, 180, 160, 8, 120);
        let table = compute_standings(&matches);
        let a = table.iter().find(|s| s.team_id == TeamId(1)).unwrap();
        let b = table.iter().find(|s| s.team_id == TeamId(2)).unwrap();
        assert_eq!((a.points, b.points), (2, 0));
    }

    #[test]
    fn idempotent() {
        let mut matches = six_team_fixtures();
        matches[0] = played(1, 1, 2, 180, 160, 8, 120);
        matches[1] = played(2, 3, 4, 140, 141, 3, 100);
        assert_eq!(compute_standings(&matches), compute_standings(&matches));
    }

    #[test]
    fn points_formula_and_no_result() {
        let mut matches = six_team_fixtures();
        matches[0] = played(1, 1, 2, 180, 160, 8, 120);
        matches[1].completed = true;
        matches[1].no_result = true;
        let table = compute_standings(&matches);
        for s in &table {
            assert_eq!(s.points, 2 * s.wins + s.no_result);
        }
        let team3 = table.iter().find(|s| s.team_id == TeamId(3)).unwrap();
        assert_eq!((team3.played, team3.no_result, team3.points), (1, 1, 1));
    }

    #[test]
    fn net_run_rate_charges_full_quota_when_all_out() {
        // Team 2 bowled out for 100 in 15 overs: charged 20 overs.
        let matches = vec![played(1, 1, 2, 160, 100, 10, 90)];
        let table = compute_standings(&matches);
        let team1 = table.iter().find(|s| s.team_id == TeamId(1)).unwrap();
        let team2 = table.iter().find(|s| s.team_id == TeamId(2)).unwrap();
        assert!((team1.net_run_rate - (8.0 - 5.0)).abs() < 1e-9);
        assert!((team2.net_run_rate + 3.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_total_order() {
        let mut matches = six_team_fixtures();
        matches[0] = played(1, 1, 2, 180, 160, 8, 120);
        matches[1] = played(2, 3, 4, 140, 141, 3, 100);
        matches[2] = played(3, 5, 6, 200, 120, 9, 120);
        matches[3] = played(4, 1, 3, 150, 140, 7, 120);
        let table = compute_standings(&matches);
        for pair in table.windows(2) {
            assert_ne!(ranking(&pair[0], &pair[1]), Ordering::Greater);
            assert!(pair[0].position < pair[1].position);
        }
    }

    #[test]
    fn empty_match_list_uses_known_teams() {
        let known = vec![team(1), team(2)];
        let mut outlook = SeasonOutlook::default();
        outlook.playoff_probability.insert(TeamId(2), 0.8);
        let table = compute_standings_with(&[], &known, &outlook);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].team_id, TeamId(1));
        assert!((table[1].playoff_probability - 0.8).abs() < 1e-9);
    }

    #[test]
    fn playoff_matches_do_not_count() {
        use crate::model::MatchType;
        let mut m = played(1, 1, 2, 180, 160, 8, 120);
        m.match_type = MatchType::Final;
        let table = compute_standings(&[m]);
        assert!(table.is_empty());
    }
}
