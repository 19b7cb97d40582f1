use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gazeswipe::{layouts, replay, Keyboard, KeyboardConfig, KeyTrace, ReplayOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gazeswipe", about = "Dwell-driven gaze swipe keyboard")]
struct Cli {
    /// Keyboard config (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Layout name or JSON layout file, overriding the config
    #[arg(short, long, global = true)]
    layout: Option<String>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded sample file through the whole pipeline
    Replay {
        /// One `x y` pair or `-` per tick
        samples: PathBuf,
    },
    /// Decode a literal key trace, e.g. `3 3 2 2 4 4 6 6`
    Decode {
        #[arg(required = true)]
        keys: Vec<String>,
        /// Text typed before this word
        #[arg(short, long, default_value = "")]
        prompt: String,
        /// Give up on the language model after this long
        #[arg(long, default_value_t = 2000)]
        wait_ms: u64,
    },
    /// Show the discrete representation of words on the layout
    Representation {
        #[arg(required = true)]
        words: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GAZESWIPE_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => KeyboardConfig::load_toml(path)?,
        None => KeyboardConfig::default(),
    };
    if let Some(layout) = cli.layout {
        config.layout = layout;
    }

    match cli.command {
        Command::Replay { samples } => run_replay(&config, samples),
        Command::Decode {
            keys,
            prompt,
            wait_ms,
        } => run_decode(&config, keys, &prompt, wait_ms),
        Command::Representation { words } => run_representation(&config, &words),
    }
}

fn run_replay(config: &KeyboardConfig, samples: PathBuf) -> anyhow::Result<()> {
    let ticks = replay::load_ticks(&samples)?;
    let mut keyboard = Keyboard::from_config(config)?;
    let worker = keyboard.spawn_worker()?;
    let options = ReplayOptions::from_config(config.base());
    let report = replay::replay(
        &ticks,
        &mut keyboard.session,
        &worker,
        &mut keyboard.transcript,
        &options,
    )?;
    drop(worker);

    for swipe in &report.swipes {
        let keys: Vec<&str> = swipe.trace.keys().iter().map(|k| k.as_str()).collect();
        println!("tick {:>5}  [{}]", swipe.tick, keys.join(" "));
        if swipe.ranking.suggestions.is_empty() {
            println!("  → (no suggestions)");
        }
        for (i, s) in swipe.ranking.suggestions.suggestions().iter().enumerate() {
            println!(
                "  {}. {:<16} fused {:.3}  trace {:.3}  lm {:.3}",
                i + 1,
                s.word,
                s.fused_probability,
                s.trace_probability,
                s.language_probability
            );
        }
    }
    println!();
    println!("text: {}", keyboard.transcript.text());
    for spoken in keyboard.transcript.take_speech() {
        println!("spoke: {}", spoken);
    }
    if report.discarded > 0 {
        println!("discarded rankings: {}", report.discarded);
    }
    if let Some(tick) = report.exited_at {
        println!("exit at tick {} of {}", tick, ticks.len());
    }
    let (hits, misses) = keyboard.engine.cache_stats();
    tracing::info!(ticks = report.ticks, swipes = report.swipes.len(), hits, misses, "replay finished");

    if let Some(path) = keyboard.save_analytics(config)? {
        println!("analytics: {}", path.display());
    }
    Ok(())
}

fn run_decode(config: &KeyboardConfig, keys: Vec<String>, prompt: &str, wait_ms: u64) -> anyhow::Result<()> {
    let keyboard = Keyboard::from_config(config)?;
    let ids: Vec<String> = keys
        .iter()
        .flat_map(|k| k.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    for id in &ids {
        if keyboard.layout.key(id).is_none() {
            anyhow::bail!("layout has no key '{}'", id);
        }
    }
    let trace = KeyTrace::from_ids(ids).context("empty trace")?;

    let distribution = keyboard.engine.decode(&trace);
    if distribution.is_empty() {
        println!("(no words match this trace)");
        return Ok(());
    }
    for (word, p) in distribution.entries().iter().take(10) {
        println!("  {:<16} {:.4}", word, p);
    }

    // Rank off the calling thread, the way the live keyboard does.
    let worker = keyboard.spawn_worker()?;
    worker.submit(trace, prompt)?;
    let Some(result) = worker.recv_timeout(Duration::from_millis(wait_ms)) else {
        anyhow::bail!("ranking did not finish within {} ms", wait_ms);
    };
    if let Some(warning) = &result.ranking.warning {
        println!("warning: {}", warning);
    }
    println!();
    for (i, s) in result.ranking.suggestions.suggestions().iter().enumerate() {
        println!("  {}. {} ({:.3})", i + 1, s.word, s.fused_probability);
    }
    Ok(())
}

fn run_representation(config: &KeyboardConfig, words: &[String]) -> anyhow::Result<()> {
    let layout = layouts::resolve(&config.layout)?;
    for word in words {
        match layout.representation_for_word(&gazeswipe_core::utils::normalize(word)) {
            Some(repr) => println!("{:<16} {}", word, repr.to_key()),
            None => println!("{:<16} (not typeable on this layout)", word),
        }
    }
    Ok(())
}
