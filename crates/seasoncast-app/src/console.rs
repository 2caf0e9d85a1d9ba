// Line-oriented console front end.
//
// Reads commands from stdin and prints one line per UI update. Logging goes
// to the log file, so stdout carries only the show.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use seasoncast_core::model::{PreMatchStage, SimulationPhase, Speed};

use crate::protocol::{UiUpdate, UserCommand};

pub const HELP: &str = "commands: s start, p play/pause, 1/2/5/10 speed, r reset, q quit";

/// Parse one input line. Unknown input yields `None`.
pub fn parse_command(line: &str) -> Option<UserCommand> {
    let line = line.trim().to_ascii_lowercase();
    match line.as_str() {
        "s" | "start" => Some(UserCommand::Start),
        "p" | "pause" | "play" => Some(UserCommand::TogglePlay),
        "r" | "reset" => Some(UserCommand::Reset),
        "q" | "quit" | "exit" => Some(UserCommand::Quit),
        other => {
            let factor = other.trim_end_matches('x').parse::<u32>().ok()?;
            Speed::from_factor(factor).map(UserCommand::SetSpeed)
        }
    }
}

fn phase_label(phase: SimulationPhase) -> &'static str {
    match phase {
        SimulationPhase::Intro => "Intro",
        SimulationPhase::FixtureReveal => "Fixtures",
        SimulationPhase::League => "League stage",
        SimulationPhase::Qualification => "Qualification",
        SimulationPhase::Playoffs => "Playoffs",
        SimulationPhase::Final => "Final",
        SimulationPhase::Champion => "Champions",
        SimulationPhase::Trophy => "Trophy",
        SimulationPhase::Rewind => "Season rewind",
        SimulationPhase::Analytics => "Analytics",
    }
}

/// One-line rendering of an update, or `None` for updates with nothing to
/// show.
pub fn format_update(update: &UiUpdate) -> Option<String> {
    let line = match update {
        UiUpdate::PhaseChanged(phase) => format!("== {} ==", phase_label(*phase)),
        UiUpdate::FixturesLoaded { fixtures, teams } => {
            format!("{fixtures} fixtures loaded for {teams} teams")
        }
        UiUpdate::MatchStarting { title, stage, .. } => match stage {
            Some(stage) => format!("{}: {title}", stage.label()),
            None => format!("Next up: {title}"),
        },
        UiUpdate::MatchPrepared {
            home_win_probability,
            fallback,
            ..
        } => {
            if *fallback {
                "  prediction unavailable, simulating without it".to_string()
            } else {
                format!("  home win probability {home_win_probability:.1}%")
            }
        }
        UiUpdate::PreMatch { stage, .. } => match stage {
            PreMatchStage::Toss => "  toss".to_string(),
            PreMatchStage::LineupTeam1 | PreMatchStage::LineupTeam2 => return None,
            PreMatchStage::Complete => "  players walking out".to_string(),
        },
        UiUpdate::MatchResult(m) => {
            let summary = match (&m.result, m.no_result) {
                (_, true) => "no result".to_string(),
                (Some(result), false) => {
                    let winner = m.team_name(result.winner).unwrap_or("?");
                    format!(
                        "{winner} won by {} ({} / {})",
                        result.margin,
                        result.first_innings.scoreline(),
                        result.second_innings.scoreline()
                    )
                }
                (None, false) => "completed".to_string(),
            };
            format!("  {}: {summary}", m.title())
        }
        UiUpdate::StandingsUpdated { standings, .. } => {
            let top: Vec<String> = standings
                .iter()
                .take(4)
                .map(|s| format!("{}. {} {}pts", s.position, s.team_name, s.points))
                .collect();
            format!("  table: {}", top.join(" | "))
        }
        UiUpdate::Qualified(teams) => {
            let names: Vec<&str> = teams.iter().map(|t| t.name.as_str()).collect();
            format!("Qualified: {}", names.join(", "))
        }
        UiUpdate::Champion {
            champion,
            runner_up,
        } => match runner_up {
            Some(runner_up) => format!("{} are champions! Runners-up: {}", champion.name, runner_up.name),
            None => format!("{} are champions!", champion.name),
        },
        UiUpdate::Playback { playing, speed } => {
            format!("[{} at {speed}]", if *playing { "playing" } else { "paused" })
        }
        UiUpdate::ReportWritten(path) => format!("Report written to {}", path.display()),
        UiUpdate::Notice(message) => message.clone(),
        UiUpdate::Error(message) => format!("error: {message}"),
        UiUpdate::SeasonComplete => "Season complete. r to replay, q to quit.".to_string(),
    };
    Some(line)
}

/// Pump stdin into commands and updates onto stdout until either side
/// closes or the user quits.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(update) => {
                        if let Some(line) = format_update(&update) {
                            println!("{line}");
                        }
                    }
                    None => {
                        info!("UI channel closed");
                        break;
                    }
                }
            }

            line = lines.next_line() => {
                match line? {
                    Some(line) => match parse_command(&line) {
                        Some(cmd) => {
                            let quit = cmd == UserCommand::Quit;
                            if cmd_tx.send(cmd).await.is_err() || quit {
                                break;
                            }
                        }
                        None => {
                            debug!(input = %line, "unrecognized command");
                            println!("{HELP}");
                        }
                    },
                    None => {
                        info!("stdin closed, quitting");
                        let _ = cmd_tx.send(UserCommand::Quit).await;
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}
