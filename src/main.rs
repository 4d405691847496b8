use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::Rng;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use ntuple_2048::engine::{self, Action};
use ntuple_2048::experiment::{run_parallel, Algorithm, Checkpoint, ExperimentConfig};
use ntuple_2048::game::Game;
use ntuple_2048::learning::{Agent, AfterstateTd, LearningConfig, RewardShaping, TerminalPenalty};
use ntuple_2048::results::ResultsFiles;

#[derive(Debug, Parser)]
#[command(name = "ntuple-2048", about = "2048 with n-tuple reinforcement learning")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,

    /// Log verbosity (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Train agents and append their per-game results to csv files
    Train {
        #[arg(long, value_enum, default_value = "afterstate")]
        algorithm: Algorithm,
        /// Games per experiment
        #[arg(long, default_value_t = 1000)]
        games: usize,
        /// Learning rate
        #[arg(long, default_value_t = 0.01)]
        alpha: f64,
        /// Exploration rate for epsilon-greedy
        #[arg(long, default_value_t = 0.1)]
        epsilon: f64,
        /// Independent experiments run in parallel
        #[arg(long, default_value_t = 1)]
        experiments: usize,
        /// Base seed; experiment i uses seed + i (random when omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Train on floor(log2(reward)) instead of the raw merge reward
        #[arg(long)]
        log2_reward: bool,
        /// Train final afterstates of low-scoring games toward -50 (afterstate only)
        #[arg(long)]
        terminal_penalty: bool,
        /// Weight file to checkpoint to (single experiment only)
        #[arg(long)]
        weights: Option<PathBuf>,
        /// Checkpoint every N games (0: only at the end)
        #[arg(long, default_value_t = 1000)]
        save_every: usize,
        /// Load --weights before training
        #[arg(long, requires = "weights")]
        resume: bool,
        /// Directory for the scores/wins csv files
        #[arg(long, default_value = "results")]
        results_dir: PathBuf,
        /// Suppress the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Play in the terminal: w/a/s/d or 5/1/2/3, q quits
    Play {
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Let a trained afterstate agent play one game
    Watch {
        #[arg(long)]
        weights: PathBuf,
        /// The weights were trained with --log2-reward
        #[arg(long)]
        log2_reward: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    TermLogger::init(args.log_level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;
    engine::warm();

    match args.cmd {
        Cmd::Train {
            algorithm,
            games,
            alpha,
            epsilon,
            experiments,
            seed,
            log2_reward,
            terminal_penalty,
            weights,
            save_every,
            resume,
            results_dir,
            quiet,
        } => {
            if experiments == 0 {
                anyhow::bail!("--experiments must be at least 1");
            }
            if weights.is_some() && experiments > 1 {
                anyhow::bail!("--weights checkpoints a single experiment; got --experiments {experiments}");
            }
            let learning = LearningConfig {
                alpha,
                reward: reward_shaping(log2_reward),
                terminal_penalty: terminal_penalty.then(TerminalPenalty::default),
            };
            let base = ExperimentConfig {
                algorithm,
                games,
                learning,
                epsilon,
                seed: seed.unwrap_or_else(|| rand::thread_rng().gen()),
                checkpoint: None,
                resume,
            };
            // a checkpointed run appends its results at every checkpoint
            let checkpoint = weights.map(|path| Checkpoint {
                path,
                interval: save_every,
                results: Some(ResultsFiles::for_experiment(&results_dir, &base)),
            });
            let cfgs: Vec<ExperimentConfig> = (0..experiments as u64)
                .map(|i| ExperimentConfig { seed: base.seed.wrapping_add(i), checkpoint: checkpoint.clone(), ..base.clone() })
                .collect();
            train(&cfgs, &results_dir, quiet)
        }
        Cmd::Play { seed } => play(seed),
        Cmd::Watch { weights, log2_reward, seed } => watch(weights, reward_shaping(log2_reward), seed),
    }
}

fn reward_shaping(log2_reward: bool) -> RewardShaping {
    if log2_reward {
        RewardShaping::Log2
    } else {
        RewardShaping::Raw
    }
}

fn train(cfgs: &[ExperimentConfig], results_dir: &PathBuf, quiet: bool) -> anyhow::Result<()> {
    let total: usize = cfgs.iter().map(|c| c.games).sum();
    let pb = if !quiet {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:40}] {pos}/{len} games | {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let all = run_parallel(cfgs, |_, _, outcome| {
        if let Some(pb) = &pb {
            pb.inc(1);
            pb.set_message(format!("last score {}", outcome.score));
        }
    })?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    for (cfg, results) in cfgs.iter().zip(&all) {
        if cfg.checkpoint.is_none() {
            ResultsFiles::for_experiment(results_dir, cfg).append(results)?;
        }
        println!(
            "{} seed {}: mean score {:.1} | best {} | win rate {:.3}",
            cfg.algorithm.tag(),
            cfg.seed,
            results.mean_score(),
            results.best_score(),
            results.win_rate()
        );
    }
    info!("results appended under {}", results_dir.display());
    Ok(())
}

fn new_game(seed: Option<u64>) -> Game {
    Game::seeded(seed.unwrap_or_else(|| rand::thread_rng().gen()))
}

fn parse_key(key: &str) -> Option<Action> {
    match key {
        "w" | "5" => Some(Action::Up),
        "s" | "2" => Some(Action::Down),
        "a" | "1" => Some(Action::Left),
        "d" | "3" => Some(Action::Right),
        _ => None,
    }
}

fn play(seed: Option<u64>) -> anyhow::Result<()> {
    let mut game = new_game(seed);
    let mut announced = false;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        println!("{}", game.state());
        println!("Score: {}", game.score());
        if game.has_won() && !announced {
            println!("You reached {}!", ntuple_2048::game::WIN_TILE);
            announced = true;
        }
        if game.is_over() {
            println!("Game over. Final score: {}", game.score());
            return Ok(());
        }
        print!("Move (w/a/s/d, q to quit): ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { return Ok(()) };
        let line = line?;
        let key = line.trim();
        if key == "q" {
            return Ok(());
        }
        match parse_key(key) {
            Some(action) if game.state().is_legal(action) => {
                game.take_action(action);
            }
            Some(action) => println!("{action} does not move anything"),
            None => println!("Unknown key {key:?}"),
        }
    }
}

fn watch(weights: PathBuf, reward: RewardShaping, seed: Option<u64>) -> anyhow::Result<()> {
    let mut agent = AfterstateTd::new(&LearningConfig { reward, ..LearningConfig::default() });
    agent.load(&weights).with_context(|| format!("loading weights from {}", weights.display()))?;
    let mut game = new_game(seed);
    println!("{}", game.state());
    loop {
        let actions = game.actions();
        if actions.is_empty() {
            break;
        }
        let action = agent.select_action(game.state(), &actions);
        let reward = game.take_action(action);
        println!("{action} (+{reward})");
        println!("{}", game.state());
    }
    println!("Final score: {} | max tile {}", game.score(), game.max_tile());
    Ok(())
}
