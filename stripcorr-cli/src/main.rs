//!
//! This binary provides a CLI for strip-detector decay-chain correlation.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};
use rayon::prelude::*;

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use stripcorr_chain::{
    process_frame, CorrelatorStatistics, EventCorrelator, MatrixCorrelator, PixelCorrelator,
    VecSink,
};
use stripcorr_core::{ClassifierCutoffs, CorrelationConfig};
use stripcorr_dssd::{Frame, MatcherConfig, StripMatcher};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame parse error in {path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("core error: {0}")]
    Core(#[from] stripcorr_core::Error),
}

/// Strip-detector decay-chain correlator.
#[derive(Parser)]
#[command(name = "stripcorr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correlate frame files into decay-chain reports
    Process {
        /// Input frame file(s), one JSON frame per line
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output file for chain report lines (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Front strip count
        #[arg(long, default_value = "16")]
        front_strips: u16,

        /// Back strip count
        #[arg(long, default_value = "16")]
        back_strips: u16,

        /// Front/back matching time window (ticks)
        #[arg(long, default_value = "10")]
        time_window: u64,

        /// Front/back energy gate width; enables the gate when set
        #[arg(long)]
        delta_energy: Option<f64>,

        /// Energy gate saturation sentinel
        #[arg(long, default_value = "15000")]
        high_energy_cutoff: f64,

        /// Post-implant dead time (ticks)
        #[arg(long, default_value = "100")]
        min_implant_separation: u64,

        /// Maximum implant-to-decay correlation time (ticks)
        #[arg(long, default_value = "100000000")]
        max_correlation_time: u64,

        /// Fast-decay flagging threshold (ticks)
        #[arg(long, default_value = "1000000")]
        fast_decay_time: u64,

        /// Backwards-timestamp margin read as a hardware clock reset (ticks)
        #[arg(long, default_value = "10000000000")]
        clock_reset_margin: u64,

        /// Upper bound on the post-reset timestamp for reset detection (ticks)
        #[arg(long, default_value = "1000000")]
        clock_reset_low_time: u64,

        /// Alpha/fission dividing energy
        #[arg(long, default_value = "20000")]
        cutoff_energy: f64,

        /// Minimum recoil energy for beam+MWPC coincidences
        #[arg(long, default_value = "3000")]
        recoil_energy_cutoff: f64,

        /// Use the two-slot matrix correlator variant
        #[arg(long)]
        matrix: bool,

        /// First-to-second decay window of the matrix correlator (ticks)
        #[arg(long, default_value = "50000000")]
        matrix_window: u64,

        /// Neighbor-implant cross-talk veto window of the matrix correlator (ticks)
        #[arg(long, default_value = "1000")]
        neighbor_veto_window: u64,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a frame file
    Info {
        /// Input frame file
        input: PathBuf,
    },
}

/// Outcome of processing a single input file with its own correlator.
struct RunOutcome {
    path: PathBuf,
    frames: usize,
    pairs: usize,
    invalid_locations: usize,
    chains: Vec<String>,
    stats: CorrelatorStatistics,
}

fn read_frames(path: &Path) -> Result<Vec<Frame>> {
    let reader = BufReader::new(File::open(path)?);
    let mut frames = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: Frame = serde_json::from_str(&line).map_err(|source| CliError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        frames.push(frame);
    }
    Ok(frames)
}

fn run_file<C: EventCorrelator>(
    path: &Path,
    matcher_config: &MatcherConfig,
    cutoffs: &ClassifierCutoffs,
    mut correlator: C,
    stats: impl Fn(&C) -> CorrelatorStatistics,
) -> Result<RunOutcome> {
    let frames = read_frames(path)?;
    let mut matcher = StripMatcher::new(matcher_config.clone());
    let mut sink = VecSink::new();

    let mut pairs = 0usize;
    let mut invalid_locations = 0usize;

    for frame in &frames {
        let summary = process_frame(&mut matcher, cutoffs, &mut correlator, frame, &mut sink);
        pairs += summary.pairs;
        invalid_locations += summary.invalid_locations;
    }

    // End-of-run drain of standing interesting chains.
    correlator.flush_all(&mut sink);

    let chains = sink
        .take()
        .into_iter()
        .flat_map(|report| {
            let header = format!(
                "# pixel ({}, {})",
                report.location.front, report.location.back
            );
            std::iter::once(header).chain(report.lines())
        })
        .collect();

    Ok(RunOutcome {
        path: path.to_path_buf(),
        frames: frames.len(),
        pairs,
        invalid_locations,
        chains,
        stats: stats(&correlator),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            front_strips,
            back_strips,
            time_window,
            delta_energy,
            high_energy_cutoff,
            min_implant_separation,
            max_correlation_time,
            fast_decay_time,
            clock_reset_margin,
            clock_reset_low_time,
            cutoff_energy,
            recoil_energy_cutoff,
            matrix,
            matrix_window,
            neighbor_veto_window,
            verbose,
        } => {
            let mut config = CorrelationConfig::new()
                .with_strips(front_strips, back_strips)
                .with_time_window(time_window)
                .with_high_energy_cutoff(high_energy_cutoff)
                .with_min_implant_separation(min_implant_separation)
                .with_max_correlation_time(max_correlation_time)
                .with_fast_decay_time(fast_decay_time)
                .with_clock_reset_bounds(clock_reset_margin, clock_reset_low_time)
                .with_matrix_window(matrix_window)
                .with_neighbor_veto_window(neighbor_veto_window);
            if let Some(delta) = delta_energy {
                config = config.with_delta_energy(delta);
            }
            config.validate()?;

            let matcher_config = MatcherConfig {
                time_window: config.time_window,
                delta_energy: config.delta_energy,
                high_energy_cutoff: config.high_energy_cutoff,
                energy_gate: delta_energy.is_some(),
            };
            let cutoffs = ClassifierCutoffs {
                cutoff_energy,
                recoil_energy_cutoff,
            };

            if verbose {
                eprintln!("Processing {} file(s)...", input.len());
                eprintln!("Grid: {}x{}", front_strips, back_strips);
                eprintln!("Time window: {} ticks", time_window);
                eprintln!("Correlator: {}", if matrix { "matrix" } else { "chain" });
            }

            let start = Instant::now();

            // One correlator instance per input file; files run in parallel.
            let outcomes: Vec<RunOutcome> = input
                .par_iter()
                .map(|path| {
                    if matrix {
                        run_file(
                            path,
                            &matcher_config,
                            &cutoffs,
                            MatrixCorrelator::new(config.clone())?,
                            MatrixCorrelator::statistics,
                        )
                    } else {
                        run_file(
                            path,
                            &matcher_config,
                            &cutoffs,
                            PixelCorrelator::new(config.clone())?,
                            PixelCorrelator::statistics,
                        )
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(File::create(path)?),
                None => Box::new(std::io::stdout()),
            };

            let mut total_frames = 0usize;
            let mut total_chains = 0usize;
            for outcome in &outcomes {
                total_frames += outcome.frames;
                total_chains += outcome.stats.chains_emitted;
                for line in &outcome.chains {
                    writeln!(out, "{}", line)?;
                }

                if verbose {
                    eprintln!("{}:", outcome.path.display());
                    eprintln!("  {} frames, {} pairs", outcome.frames, outcome.pairs);
                    eprintln!(
                        "  implants: {} valid, {} back-to-back",
                        outcome.stats.valid_implants, outcome.stats.back_to_back_implants
                    );
                    eprintln!(
                        "  decays: {} valid, {} too soon, {} too late, {} unknown",
                        outcome.stats.valid_decays,
                        outcome.stats.implants_too_soon,
                        outcome.stats.decays_too_late,
                        outcome.stats.unknown
                    );
                    eprintln!(
                        "  chains: {} emitted, {} discarded",
                        outcome.stats.chains_emitted, outcome.stats.chains_discarded
                    );
                    if outcome.invalid_locations > 0 {
                        eprintln!("  {} events at invalid locations", outcome.invalid_locations);
                    }
                    if outcome.stats.clock_resets > 0 {
                        eprintln!("  {} clock resets", outcome.stats.clock_resets);
                    }
                }
            }

            let elapsed = start.elapsed();
            eprintln!(
                "Processed {} files ({} frames) in {:.2}s",
                input.len(),
                total_frames,
                elapsed.as_secs_f64()
            );
            eprintln!("Total chains: {}", total_chains);
        }

        Commands::Info { input } => {
            let frames = read_frames(&input)?;

            let front_hits: usize = frames.iter().map(|f| f.front.len()).sum();
            let back_hits: usize = frames.iter().map(|f| f.back.len()).sum();
            let beam_frames = frames.iter().filter(|f| f.beam).count();

            println!("File: {}", input.display());
            println!("Frames: {}", frames.len());
            println!("Front hits: {}", front_hits);
            println!("Back hits: {}", back_hits);
            println!("Beam-on frames: {}", beam_frames);

            let times: Vec<u64> = frames
                .iter()
                .flat_map(|f| f.front.iter().chain(&f.back).map(|h| h.time))
                .collect();
            if let (Some(min), Some(max)) = (times.iter().min(), times.iter().max()) {
                println!("Time range: {} - {}", min, max);
            }
        }
    }

    Ok(())
}
