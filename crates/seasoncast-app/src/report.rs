// End-of-season analytics report.
//
// Writes the final table, the leaderboards and a JSON snapshot of the season
// into a timestamped directory under the configured report dir.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use seasoncast_core::model::{Leader, TeamRef};
use seasoncast_core::store::SeasonState;

use crate::config::SeasonConfig;

#[derive(Debug, Serialize)]
struct StandingRow<'a> {
    position: usize,
    team_id: u32,
    team: &'a str,
    played: u32,
    wins: u32,
    losses: u32,
    no_result: u32,
    points: u32,
    net_run_rate: String,
    playoff_probability: f64,
    championship_probability: f64,
}

#[derive(Debug, Serialize)]
struct LeaderRow<'a> {
    category: &'static str,
    player_id: u32,
    player: &'a str,
    runs: f64,
    wickets: f64,
    score: f64,
}

#[derive(Debug, Serialize)]
struct SeasonReport<'a> {
    season: &'a str,
    year: u32,
    generated_at: DateTime<Utc>,
    champion: Option<&'a TeamRef>,
    runner_up: Option<&'a TeamRef>,
    state: &'a SeasonState,
}

/// Write `standings.csv`, `leaders.csv` and `season.json` into a fresh
/// timestamped directory under `dir`. Returns that directory.
pub fn write_report(dir: &Path, season: &SeasonConfig, state: &SeasonState) -> anyhow::Result<PathBuf> {
    let generated_at = Utc::now();
    let out = dir.join(format!(
        "{}-{}",
        season.year,
        generated_at.format("%Y%m%dT%H%M%S")
    ));
    fs::create_dir_all(&out)
        .with_context(|| format!("failed to create report directory {}", out.display()))?;

    write_standings(&out.join("standings.csv"), state)?;
    write_leaders(&out.join("leaders.csv"), state)?;

    let report = SeasonReport {
        season: &season.name,
        year: season.year,
        generated_at,
        champion: state.champion.as_ref(),
        runner_up: state.runner_up.as_ref(),
        state,
    };
    let json_path = out.join("season.json");
    let json = serde_json::to_string_pretty(&report).context("failed to serialize season snapshot")?;
    fs::write(&json_path, json)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    info!(dir = %out.display(), "season report written");
    Ok(out)
}

fn write_standings(path: &Path, state: &SeasonState) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for s in &state.standings {
        writer.serialize(StandingRow {
            position: s.position,
            team_id: s.team_id.0,
            team: &s.team_name,
            played: s.played,
            wins: s.wins,
            losses: s.losses,
            no_result: s.no_result,
            points: s.points,
            net_run_rate: format!("{:+.3}", s.net_run_rate),
            playoff_probability: s.playoff_probability,
            championship_probability: s.championship_probability,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_leaders(path: &Path, state: &SeasonState) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let performers = &state.top_performers;
    let rows: [(&'static str, Option<&Leader>); 3] = [
        ("orange_cap", performers.orange_cap.as_ref()),
        ("purple_cap", performers.purple_cap.as_ref()),
        ("mvp", performers.mvp.as_ref()),
    ];
    for (category, leader) in rows {
        let Some(leader) = leader else {
            continue;
        };
        writer.serialize(LeaderRow {
            category,
            player_id: leader.player_id.0,
            player: &leader.player_name,
            runs: leader.runs,
            wickets: leader.wickets,
            score: leader.score,
        })?;
    }
    writer.flush()?;
    Ok(())
}
