use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use neon_2048::config::{self, Settings};
use neon_2048::engine::{Move, Score, Tile};
use neon_2048::progress::{self, FileStore, ProgressStore};
use neon_2048::session::{Session, Snapshot, GAME_ID};
use rand::Rng;
use rayon::prelude::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(name = "neon-2048", about = "Play 2048 in the terminal")]
struct Args {
    #[command(subcommand)]
    cmd: Option<Cmd>,

    /// Settings file (default: settings.json in the data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding saved progress
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Board side length
    #[arg(long)]
    size: Option<usize>,

    /// Play as this user id instead of guest
    #[arg(long)]
    user: Option<String>,

    /// Tile value that counts as a win
    #[arg(long)]
    win_tile: Option<Tile>,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Interactive game (default)
    Play,
    /// Play many games with random moves and report statistics
    Simulate {
        /// Number of games
        #[arg(long, default_value_t = 1000)]
        games: u64,
        /// Stop a game after this many moves
        #[arg(long)]
        max_moves: Option<u64>,
        /// Suppress the progress bar
        #[arg(long)]
        quiet: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let settings = resolve_settings(&args)?;

    match args.cmd.unwrap_or(Cmd::Play) {
        Cmd::Play => play(&settings),
        Cmd::Simulate { games, max_moves, quiet } => simulate(&settings, games, max_moves, quiet),
    }
}

fn resolve_settings(args: &Args) -> Result<Settings> {
    let paths = config::project_paths()?;
    let settings_path = args.config.clone().unwrap_or(paths.settings_path);
    let mut settings = config::load_settings(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = config::save_settings(&settings_path, &settings) {
            warn!("could not write default settings: {e:#}");
        }
    }
    if let Some(size) = args.size { settings.board_size = size; }
    if let Some(user) = &args.user { settings.user = Some(user.clone()); }
    if let Some(t) = args.win_tile { settings.win_threshold = t; }
    if let Some(dir) = &args.data_dir { settings.data_dir = Some(dir.clone()); }
    if settings.data_dir.is_none() { settings.data_dir = Some(paths.data_dir); }
    Ok(settings)
}

enum Command {
    Dir(Move),
    New,
    Save,
    ResetRecord,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "n" | "new" => Some(Command::New),
        "save" => Some(Command::Save),
        "reset-record" => Some(Command::ResetRecord),
        "h" | "help" | "?" => Some(Command::Help),
        "q" | "quit" | "exit" => Some(Command::Quit),
        other => other.parse::<Move>().ok().map(Command::Dir),
    }
}

const HELP: &str = "moves: w/a/s/d or up/down/left/right | new | save | reset-record | help | quit";

fn play(settings: &Settings) -> Result<()> {
    let data_dir = settings.data_dir.clone().context("no data directory configured")?;
    let mut store = FileStore::new(data_dir);
    let identity = settings.identity();
    let mut rng = rand::thread_rng();
    let mut session = progress::load_session(&store, &identity, GAME_ID, settings.board_size, &mut rng)?
        .with_win_threshold(settings.win_threshold);
    info!("playing as {} (saves in {})", identity.profile_key(), store.dir().display());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    println!("{HELP}");
    render(&session.snapshot(), session.state().total_games_played);

    let mut announced_win = session.snapshot().has_winning_tile;
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let Some(cmd) = parse_command(&line?) else {
            println!("{HELP}");
            continue;
        };
        match cmd {
            Command::Dir(dir) => {
                if session.is_game_over() {
                    println!("Game over! Type `new` to start again.");
                    continue;
                }
                let snap = session.step(dir, &mut rng)?;
                if !snap.changed {
                    continue;
                }
                render(&snap, session.state().total_games_played);
                if snap.has_winning_tile && !announced_win {
                    println!("You made {}! Keep going.", settings.win_threshold);
                    announced_win = true;
                }
                if snap.is_game_over {
                    println!("Game over! No moves left.");
                }
            }
            Command::New => {
                if session.has_unsaved_changes() && !confirm(&mut lines, "Unsaved progress. Start a new game anyway?")? {
                    continue;
                }
                session.reset(&mut rng);
                announced_win = false;
                render(&session.snapshot(), session.state().total_games_played);
            }
            Command::Save => match progress::save_session(&mut store, &identity, GAME_ID, &mut session) {
                Ok(()) => println!("Saved."),
                Err(e) => {
                    warn!("save failed: {e}");
                    println!("Could not save the game.");
                }
            },
            Command::ResetRecord => {
                if !confirm(&mut lines, "Reset best score and statistics?")? {
                    continue;
                }
                if let Err(e) = store.clear(&identity, GAME_ID) {
                    warn!("clearing progress failed: {e}");
                }
                session.clear_record(&mut rng);
                announced_win = false;
                render(&session.snapshot(), session.state().total_games_played);
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {
                if session.has_unsaved_changes() && !confirm(&mut lines, "Unsaved progress. Quit anyway?")? {
                    continue;
                }
                break;
            }
        }
    }
    Ok(())
}

fn confirm<B: BufRead>(lines: &mut io::Lines<B>, question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(matches!(line?.trim(), "y" | "Y" | "yes")),
        None => Ok(false),
    }
}

fn render(snap: &Snapshot, games_played: u64) {
    println!("{}", snap.board);
    println!(
        "Score: {} | Best: {} | Games: {}",
        snap.score, snap.best_score, games_played
    );
}

struct GameStats {
    score: Score,
    highest_tile: Tile,
    moves: u64,
    won: bool,
}

fn run_random_game(size: usize, win_threshold: Tile, max_moves: Option<u64>) -> Result<GameStats> {
    let mut rng = rand::thread_rng();
    let mut session = Session::new(size, &mut rng)?.with_win_threshold(win_threshold);
    let mut moves = 0u64;
    let mut won = false;
    while !session.is_game_over() {
        let dir = Move::ALL[rng.gen_range(0..Move::ALL.len())];
        let snap = session.step(dir, &mut rng)?;
        if snap.changed {
            moves += 1;
            won |= snap.has_winning_tile;
        }
        if let Some(limit) = max_moves {
            if moves >= limit { break; }
        }
    }
    Ok(GameStats {
        score: session.state().score,
        highest_tile: session.board().highest_tile(),
        moves,
        won,
    })
}

fn simulate(settings: &Settings, games: u64, max_moves: Option<u64>, quiet: bool) -> Result<()> {
    let start = Instant::now();
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(games);
        pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} games | {elapsed_precise} | {per_sec}")?);
        pb
    };

    let results: Vec<GameStats> = (0..games)
        .into_par_iter()
        .map(|_| {
            let stats = run_random_game(settings.board_size, settings.win_threshold, max_moves);
            pb.inc(1);
            stats
        })
        .collect::<Result<_>>()?;
    pb.finish_and_clear();

    if results.is_empty() {
        println!("No games played.");
        return Ok(());
    }
    let n = results.len() as f64;
    let total_score: Score = results.iter().map(|g| g.score).sum();
    let total_moves: u64 = results.iter().map(|g| g.moves).sum();
    let best = results.iter().map(|g| g.score).max().unwrap_or(0);
    let top_tile = results.iter().map(|g| g.highest_tile).max().unwrap_or(0);
    let wins = results.iter().filter(|g| g.won).count();
    println!(
        "Games: {} | avg score: {:.1} | best score: {} | avg moves: {:.1} | top tile: {} | win rate: {:.2}% | {:.2}s",
        results.len(),
        total_score as f64 / n,
        best,
        total_moves as f64 / n,
        top_tile,
        100.0 * wins as f64 / n,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
