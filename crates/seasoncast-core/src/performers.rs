// Season leaderboards: Orange Cap, Purple Cap and MVP.
//
// Aggregates the predicted runs/wickets of the top-3 scorer and wicket-taker
// slices across every completed match that carries prediction data. Ties go
// to the lowest player id.

use std::collections::BTreeMap;

use crate::model::{Leader, Match, PlayerId, TopPerformers};

/// Weight of one wicket in the MVP score (`runs + weight * wickets`).
pub const DEFAULT_MVP_WICKET_WEIGHT: f64 = 25.0;

#[derive(Debug, Default)]
struct PlayerTally {
    name: String,
    runs: f64,
    wickets: f64,
}

pub fn compute_top_performers(matches: &[Match], mvp_wicket_weight: f64) -> TopPerformers {
    let mut tallies: BTreeMap<PlayerId, PlayerTally> = BTreeMap::new();

    for prediction in matches
        .iter()
        .filter(|m| m.completed)
        .filter_map(|m| m.prediction.as_ref())
    {
        for scorer in prediction.top_run_scorers.iter().flatten() {
            let tally = tallies.entry(scorer.player_id).or_default();
            if tally.name.is_empty() {
                tally.name = scorer.player_name.clone();
            }
            tally.runs += scorer.predicted_runs.max(0.0);
        }
        for taker in prediction.top_wicket_takers.iter().flatten() {
            let tally = tallies.entry(taker.player_id).or_default();
            if tally.name.is_empty() {
                tally.name = taker.player_name.clone();
            }
            tally.wickets += taker.predicted_wickets.max(0.0);
        }
    }

    TopPerformers {
        orange_cap: leader_by(&tallies, |t| t.runs),
        purple_cap: leader_by(&tallies, |t| t.wickets),
        mvp: leader_by(&tallies, |t| t.runs + mvp_wicket_weight * t.wickets),
    }
}

/// Highest positive score wins; iteration is in ascending id order and only
/// a strictly greater score replaces the current leader.
fn leader_by<F>(tallies: &BTreeMap<PlayerId, PlayerTally>, score: F) -> Option<Leader>
where
    F: Fn(&PlayerTally) -> f64,
{
    let mut best: Option<(PlayerId, &PlayerTally, f64)> = None;
    for (id, tally) in tallies {
        let value = score(tally);
        if value <= 0.0 {
            continue;
        }
        match best {
            Some((_, _, top)) if value <= top => {}
            _ => best = Some((*id, tally, value)),
        }
    }
    best.map(|(player_id, tally, value)| Leader {
        player_id,
        player_name: tally.name.clone(),
        runs: tally.runs,
        wickets: tally.wickets,
        score: value,
    })
}
