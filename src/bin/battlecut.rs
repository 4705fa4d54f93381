use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::Arc,
};

use battlecut::{
    Boundary, ClipBatch, DEFAULT_END_LABELS, DEFAULT_START_TEMPLATE, DEFAULT_VIDEO_EXTENSION,
    EventRecord, ExportOptions, ExportSummary, FfmpegExporter, FfmpegLogLevel, Geometry,
    ProgressCallback, ProgressInfo, SampleReport, ScanConfig, TemplateSet, VideoSource,
    find_source_video, scan_video,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  battlecut cut\n  battlecut cut --dir recordings/session1 --out clips --progress\n  battlecut scan --step 30 --start-threshold 0.85 --json\n  battlecut completions zsh > _battlecut";

#[derive(Debug, Parser)]
#[command(
    name = "battlecut",
    version,
    about = "Find battles in a gameplay recording and cut them into clips",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Do not print a line per sampled frame.
    #[arg(long, global = true)]
    quiet: bool,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Parser, Clone)]
struct ScanArgs {
    /// Directory holding the recording (exactly one file with --extension).
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Scan this file instead of searching --dir.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Extension of the recording to look for in --dir.
    #[arg(long, default_value = DEFAULT_VIDEO_EXTENSION)]
    extension: String,

    /// Directory holding the template images (defaults to --dir).
    #[arg(long)]
    templates: Option<PathBuf>,

    /// File name of the start-screen template.
    #[arg(long, default_value = DEFAULT_START_TEMPLATE)]
    start_template: String,

    /// End-screen labels in priority order; each is loaded from <label>_frame.jpg.
    #[arg(long = "end", value_delimiter = ',', default_values_t = DEFAULT_END_LABELS.map(String::from))]
    end_labels: Vec<String>,

    /// Score every Nth decoded frame.
    #[arg(long, default_value_t = battlecut::config::DEFAULT_FRAME_STEP)]
    step: u64,

    /// Minimum start-screen similarity (0-1).
    #[arg(long, default_value_t = battlecut::config::DEFAULT_START_THRESHOLD)]
    start_threshold: f64,

    /// Minimum end-screen similarity (0-1).
    #[arg(long, default_value_t = battlecut::config::DEFAULT_END_THRESHOLD)]
    end_threshold: f64,

    /// Pixels agree when their intensities differ by less than this.
    #[arg(long, default_value_t = battlecut::config::DEFAULT_PIXEL_TOLERANCE)]
    tolerance: u8,

    /// Expected frame width.
    #[arg(long, default_value_t = battlecut::config::DEFAULT_GEOMETRY.width)]
    width: u32,

    /// Expected frame height.
    #[arg(long, default_value_t = battlecut::config::DEFAULT_GEOMETRY.height)]
    height: u32,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect battles and print their time ranges.
    #[command(
        about = "Detect battles without cutting",
        after_help = "Examples:\n  battlecut scan\n  battlecut scan --input game.mp4 --json"
    )]
    Scan {
        #[command(flatten)]
        scan: ScanArgs,

        /// Print the battles as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Detect battles and cut each one into its own clip.
    #[command(
        about = "Detect battles and cut clips",
        after_help = "Examples:\n  battlecut cut\n  battlecut cut --out highlights --crf 22 --preset fast"
    )]
    Cut {
        #[command(flatten)]
        scan: ScanArgs,

        /// Output directory for the clips.
        #[arg(long, default_value = battlecut::export::DEFAULT_OUTPUT_DIR)]
        out: PathBuf,

        /// Transcoder binary.
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: String,

        /// x264 preset.
        #[arg(long, default_value = "veryfast")]
        preset: String,

        /// x264 constant rate factor.
        #[arg(long, default_value_t = 18)]
        crf: u8,

        /// Cut clips concurrently (requires the `rayon` feature).
        #[arg(long)]
        parallel: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl ScanArgs {
    fn config(&self) -> ScanConfig {
        ScanConfig::new()
            .with_frame_step(self.step)
            .with_start_threshold(self.start_threshold)
            .with_end_threshold(self.end_threshold)
            .with_pixel_tolerance(self.tolerance)
            .with_expected_geometry(Geometry::new(self.width, self.height))
    }

    fn video_path(&self) -> Result<PathBuf, Box<dyn Error>> {
        match &self.input {
            Some(input) => Ok(input.clone()),
            None => Ok(find_source_video(&self.dir, &self.extension)?),
        }
    }

    fn template_dir(&self) -> PathBuf {
        self.templates.clone().unwrap_or_else(|| self.dir.clone())
    }
}

fn init_logging(global: &GlobalOptions) {
    let default_filter = if global.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn Error>> {
    if let Some(level) = &global.log_level {
        battlecut::set_ffmpeg_log_level(level.parse::<FfmpegLogLevel>()?);
    }
    Ok(())
}

/// Drives an indicatif bar from scan/export progress.
struct BarProgress(ProgressBar);

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.0.set_length(total);
        }
        self.0.set_position(info.current);
    }
}

fn progress_bar(global: &GlobalOptions) -> Result<Option<ProgressBar>, Box<dyn Error>> {
    if !global.progress {
        return Ok(None);
    }
    let bar = ProgressBar::new(0);
    let style =
        ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
    bar.set_style(style.progress_chars("##-"));
    Ok(Some(bar))
}

fn print_line(bar: Option<&ProgressBar>, line: String) {
    match bar {
        Some(bar) => bar.println(line),
        None => println!("{line}"),
    }
}

fn format_sample(report: &SampleReport) -> String {
    report
        .scores
        .iter()
        .map(|score| {
            format!(
                "[{:05}] similarity to {}: {:.3}",
                report.frame_index, score.template, score.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_boundary(boundary: &Boundary) -> String {
    match boundary {
        Boundary::StartConfirmed(start) => format!(
            "{} battle start at {:.2}s",
            "[+]".green().bold(),
            start.as_secs_f64()
        ),
        Boundary::EndConfirmed(record) => format!(
            "{} battle end ({}) at {:.2}s",
            "[+]".green().bold(),
            record.label,
            record.end.as_secs_f64()
        ),
    }
}

fn format_summary(summary: &ExportSummary, out: &Path) -> String {
    if summary.written.is_empty() && !summary.failed.is_empty() {
        return format!(
            "{} {}",
            "warning:".yellow().bold(),
            format!(
                "No clips were written; all {} export(s) failed",
                summary.failed.len()
            )
            .yellow()
        );
    }
    format!(
        "{} {}",
        "success:".green().bold(),
        format!(
            "Saved {} clip(s) to {}",
            summary.written.len(),
            out.display()
        )
        .green()
    )
}

fn detect(
    scan: &ScanArgs,
    global: &GlobalOptions,
) -> Result<(PathBuf, Vec<EventRecord>), Box<dyn Error>> {
    let mut config = scan.config();
    config.validate()?;

    let video = scan.video_path()?;
    let templates = TemplateSet::load_dir(
        scan.template_dir(),
        &scan.start_template,
        scan.end_labels.as_slice(),
        config.expected_geometry(),
    )?;

    let bar = progress_bar(global)?;
    if let Some(bar) = &bar {
        config = config.with_progress(Arc::new(BarProgress(bar.clone())));
    }

    let records = {
        let mut source = VideoSource::open(&video, config.expected_geometry())?;
        eprintln!(
            "{} analysing {}",
            "[~]".cyan().bold(),
            video.display()
        );
        scan_video(&mut source, templates, &config, |report| {
            if !global.quiet {
                print_line(bar.as_ref(), format_sample(report));
            }
            if let Some(boundary) = &report.boundary {
                print_line(bar.as_ref(), format_boundary(boundary));
            }
        })?
    };

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    Ok((video, records))
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Scan { scan, json } => {
            let (_, records) = detect(&scan, &cli.global)?;
            if json {
                let payload: Vec<_> = records
                    .iter()
                    .enumerate()
                    .map(|(index, record)| {
                        json!({
                            "index": index + 1,
                            "start_seconds": record.start.as_secs_f64(),
                            "end_seconds": record.end.as_secs_f64(),
                            "label": record.label,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if records.is_empty() {
                println!("{}", "[!] no battles found".yellow());
            } else {
                for (index, record) in records.iter().enumerate() {
                    println!(
                        "{:02}. {:.2}s - {:.2}s ({})",
                        index + 1,
                        record.start.as_secs_f64(),
                        record.end.as_secs_f64(),
                        record.label
                    );
                }
            }
        }
        Commands::Cut {
            scan,
            out,
            ffmpeg,
            preset,
            crf,
            parallel,
        } => {
            let (video, records) = detect(&scan, &cli.global)?;
            if records.is_empty() {
                println!("{}", "[!] no battles found".yellow());
                return Ok(());
            }

            let exporter = FfmpegExporter::new(
                ExportOptions::new()
                    .with_program(ffmpeg)
                    .with_preset(preset)
                    .with_crf(crf),
            );
            let mut batch = ClipBatch::new(&exporter, &video).output_dir(&out);
            let bar = progress_bar(&cli.global)?;
            if let Some(bar) = &bar {
                batch = batch.with_progress(Arc::new(BarProgress(bar.clone())));
            }

            #[cfg(feature = "rayon")]
            let summary = if parallel {
                batch.run_parallel(&records)?
            } else {
                batch.run(&records)?
            };
            #[cfg(not(feature = "rayon"))]
            let summary = {
                if parallel {
                    eprintln!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        "--parallel requires building with the `rayon` feature".yellow()
                    );
                }
                batch.run(&records)?
            };

            if let Some(bar) = bar {
                bar.finish_and_clear();
            }

            for (output, error) in &summary.failed {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{} was not written: {error}", output.display()).yellow()
                );
            }
            println!("{}", format_summary(&summary, &out));
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "battlecut", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use battlecut::TemplateScore;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_defaults() {
        let cli = Cli::try_parse_from(["battlecut", "scan"]).unwrap();
        let Commands::Scan { scan, json } = cli.command else {
            panic!("expected scan subcommand");
        };
        assert!(!json);
        assert_eq!(scan.step, 60);
        assert_eq!(scan.tolerance, 20);
        assert_eq!(scan.end_labels, DEFAULT_END_LABELS.map(String::from).to_vec());
        assert_eq!(scan.template_dir(), PathBuf::from("."));
        assert!(scan.config().validate().is_ok());
    }

    #[test]
    fn end_labels_are_comma_separated() {
        let cli = Cli::try_parse_from(["battlecut", "cut", "--end", "lose,win", "--crf", "22"])
            .unwrap();
        let Commands::Cut { scan, crf, .. } = cli.command else {
            panic!("expected cut subcommand");
        };
        assert_eq!(scan.end_labels, vec!["lose".to_string(), "win".to_string()]);
        assert_eq!(crf, 22);
    }

    #[test]
    fn summary_warns_when_every_clip_failed() {
        colored::control::set_override(false);
        let failed = ExportSummary {
            written: Vec::new(),
            failed: vec![(
                PathBuf::from("clips/battle_01.mp4"),
                battlecut::BattlecutError::ExportFailure {
                    output: PathBuf::from("clips/battle_01.mp4"),
                    reason: "exit status: 1".to_string(),
                },
            )],
        };
        assert_eq!(
            format_summary(&failed, Path::new("clips")),
            "warning: No clips were written; all 1 export(s) failed"
        );

        let written = ExportSummary {
            written: vec![PathBuf::from("clips/battle_01.mp4")],
            failed: Vec::new(),
        };
        assert_eq!(
            format_summary(&written, Path::new("clips")),
            "success: Saved 1 clip(s) to clips"
        );
    }

    #[test]
    fn sample_lines_are_zero_padded() {
        let report = SampleReport {
            frame_index: 120,
            timestamp: Duration::from_secs(2),
            scores: vec![TemplateScore {
                template: "start".to_string(),
                score: 0.25,
            }],
            boundary: None,
        };
        assert_eq!(format_sample(&report), "[00120] similarity to start: 0.250");
    }
}
