use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use magpie::board::Position;
use magpie::eval::nnue::{AccumulatorCaches, AccumulatorStack, Networks};
use magpie::eval::{self, NodeType};
use magpie::search::movepick::MovePicker;
use magpie::search::timeman::{EngineOptions, Limits, TimeManager, TimeParams};
use magpie::search::Histories;

#[derive(Parser, Debug)]
#[command(author, version, about = "NNUE evaluation and move-ordering core", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the static evaluation breakdown of a position
    Eval {
        /// FEN, defaults to the starting position
        #[arg(long)]
        fen: Option<String>,
        /// Big network file (embedded parameters if omitted)
        #[arg(long)]
        eval_file: Option<PathBuf>,
        /// Small network file
        #[arg(long)]
        eval_file_small: Option<PathBuf>,
    },
    /// Print the staged move order for a position
    Order {
        #[arg(long)]
        fen: Option<String>,
        /// Remaining depth fed to the picker (<= 0 is quiescence)
        #[arg(long, default_value_t = 8)]
        depth: i32,
        /// Transposition-table move to try first, in UCI notation
        #[arg(long)]
        tt: Option<String>,
    },
    /// Print the time budget for a clock state
    Budget {
        #[arg(long)]
        time_ms: i64,
        #[arg(long, default_value_t = 0)]
        inc_ms: i64,
        #[arg(long, default_value_t = 0)]
        movestogo: i32,
        #[arg(long, default_value_t = 0)]
        ply: i32,
        #[arg(long, default_value_t = 10)]
        move_overhead: i64,
        #[arg(long, default_value_t = 0)]
        nodestime: i64,
        #[arg(long)]
        ponder: bool,
    },
}

fn position_from(fen: &Option<String>) -> Result<Position> {
    match fen {
        Some(fen) => Position::from_fen(fen).map_err(|e| anyhow!(e)),
        None => Ok(Position::startpos()),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Eval { fen, eval_file, eval_file_small } => {
            let pos = position_from(&fen)?;
            let networks =
                Networks::from_files(eval_file.as_deref(), eval_file_small.as_deref())?;
            print!("{}", eval::trace(&networks, &pos));
            if !pos.in_check() {
                let mut stack = AccumulatorStack::new();
                let mut caches = AccumulatorCaches::new(&networks);
                let v = eval::evaluate(&networks, &pos, &mut stack, &mut caches, 0, NodeType::Pv);
                println!("side to move {v:>8} cp");
            }
        }
        Command::Order { fen, depth, tt } => {
            let pos = position_from(&fen)?;
            let tt_move = match tt {
                Some(uci) => {
                    Some(uci.parse().map_err(|e| anyhow!("bad tt move: {e:?}"))?)
                }
                None => None,
            };
            let histories = Histories::new();
            let bundle = histories.bundle();
            let mut picker = MovePicker::new(&pos, tt_move, depth, 0, &bundle);
            let mut n = 0;
            while let Some(mv) = picker.next_move() {
                n += 1;
                println!("{n:>3}. {mv}");
            }
        }
        Command::Budget {
            time_ms,
            inc_ms,
            movestogo,
            ply,
            move_overhead,
            nodestime,
            ponder,
        } => {
            let mut limits = Limits::new();
            let us = cozy_chess::Color::White;
            limits.time[us as usize] = time_ms;
            limits.inc[us as usize] = inc_ms;
            limits.movestogo = movestogo;
            let options = EngineOptions { move_overhead, nodestime, ponder };
            let mut tm = TimeManager::new();
            let mut original_time_adjust = -1.0;
            tm.init(
                &mut limits,
                us,
                ply,
                &options,
                &mut original_time_adjust,
                &TimeParams::default(),
            );
            println!("optimum {} ms", tm.optimum());
            println!("maximum {} ms", tm.maximum());
        }
    }
    Ok(())
}
