use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use renketsu_core::{
    decode_frame, encode_frame, peek_kind, CutSpec, Envelope, GameEvent, GameRules, ParticipantId,
    PuzzleStatus, Session, SessionConfig,
};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod bot;
mod relay;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "renketsu-cli", version, about = "Operator tools for renketsu puzzles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Bots {
        #[command(subcommand)]
        command: bot::BotCommand,
    },
}

#[derive(clap::Args, Clone, Debug)]
struct PuzzleArgs {
    #[arg(long, env = "RENKETSU_PUZZLE_ID", default_value_t = 1)]
    puzzle_id: u32,
    #[arg(long, env = "RENKETSU_COLS", default_value_t = 4)]
    cols: usize,
    #[arg(long, env = "RENKETSU_ROWS", default_value_t = 3)]
    rows: usize,
    #[arg(long, env = "RENKETSU_PIECE_PX", default_value_t = 64.0)]
    piece_px: f32,
    #[arg(long, env = "RENKETSU_HOLD_TIMEOUT_MS", default_value_t = renketsu_core::game::HOLD_TIMEOUT_MS_DEFAULT)]
    hold_timeout_ms: u64,
}

impl PuzzleArgs {
    fn rules(&self) -> GameRules {
        GameRules {
            hold_timeout_ms: self.hold_timeout_ms,
            ..GameRules::default()
        }
        .sanitized()
    }

    fn cut(&self) -> Result<CutSpec, BoxError> {
        if self.cols == 0 || self.rows == 0 {
            return Err(err_msg("puzzle needs at least one column and one row"));
        }
        let cut = CutSpec::grid(self.cols, self.rows, self.piece_px, self.piece_px, &self.rules());
        cut.validate()?;
        Ok(cut)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Bots { command } => bot::run(command).await?,
    }

    Ok(())
}

fn err_msg(msg: impl Into<String>) -> BoxError {
    msg.into().into()
}

fn parse_seed_arg(raw: &str) -> Result<u32, BoxError> {
    let trimmed = raw.trim();
    let value = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16)?
    } else {
        trimmed.parse::<u32>()?
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_accepts_decimal_and_hex() {
        assert_eq!(parse_seed_arg("42").unwrap(), 42);
        assert_eq!(parse_seed_arg(" 0xC0DE ").unwrap(), 0xC0DE);
        assert!(parse_seed_arg("zz").is_err());
    }

    #[test]
    fn empty_grid_is_rejected() {
        let args = PuzzleArgs {
            puzzle_id: 1,
            cols: 0,
            rows: 3,
            piece_px: 64.0,
            hold_timeout_ms: 10_000,
        };
        assert!(args.cut().is_err());
    }

    #[test]
    fn cli_parses_simulate() {
        let cli = Cli::try_parse_from([
            "renketsu-cli", "bots", "simulate", "--players", "3", "--cols", "2", "--rows", "2",
            "--seed", "0x10",
        ])
        .expect("parse");
        let Commands::Bots { command } = cli.command;
        let bot::BotCommand::Simulate { puzzle, players, seed, .. } = command;
        assert_eq!(players, 3);
        assert_eq!((puzzle.cols, puzzle.rows), (2, 2));
        assert_eq!(seed.as_deref(), Some("0x10"));
    }
}
