use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use plan_vision::config::Config;
use plan_vision::pipeline::{PipelineInputs, run_pipeline};
use plan_vision::plan::PlanningLogParser;
use plan_vision::report::write_report;
use plan_vision::video::VideoAnalyzer;
use plan_vision::{annotator_from_settings, compare_output};

/// Plan Vision - check a recorded UI test run against its plan
#[derive(Parser, Debug)]
#[command(
    name = "plan-vision",
    about = "Compare a UI test run's planning log against its video recording and final result",
    after_help = "ENVIRONMENT VARIABLES:\n\
        PLAN_VISION_CONFIG                 Configuration file (default: config.json)\n\
        PLAN_VISION_FRAME_SKIP             Inspect every Nth video frame\n\
        PLAN_VISION_SCENE_THRESHOLD        Scene-change threshold (0-255)\n\
        PLAN_VISION_VIDEO_EXTENSIONS       Comma-separated video extensions\n\
        PLAN_VISION_PLANNER_KEY            Planning log key holding planner messages\n\
        PLAN_VISION_API_KEY                Credential for step annotations\n\
        PLAN_VISION_ANNOTATION_ENDPOINT    Chat-completions endpoint\n\
        PLAN_VISION_ANNOTATION_MODEL       Annotation model name\n\
        RUST_LOG                           Log filter (default: info)"
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full comparison and write deviation_report.{json,md}
    Analyze {
        /// Path to the planning log JSON file
        #[arg(long)]
        planning_log: PathBuf,

        /// Path to the video file or directory containing videos
        #[arg(long)]
        video: PathBuf,

        /// Path to the test output (XML/HTML)
        #[arg(long)]
        test_output: PathBuf,

        /// Directory to save the deviation report
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Path to configuration file
        #[arg(long, env = "PLAN_VISION_CONFIG", default_value = "config.json")]
        config: PathBuf,

        /// Print the report as JSON instead of the summary
        #[arg(long)]
        json: bool,
    },

    /// Print the planned steps parsed from a planning log
    Steps {
        #[arg(long)]
        planning_log: PathBuf,

        #[arg(long, env = "PLAN_VISION_CONFIG", default_value = "config.json")]
        config: PathBuf,
    },

    /// Print scene changes detected in a video or directory of videos
    Scan {
        #[arg(long)]
        video: PathBuf,

        /// Override the frame sample stride
        #[arg(long)]
        frame_skip: Option<usize>,

        #[arg(long, env = "PLAN_VISION_CONFIG", default_value = "config.json")]
        config: PathBuf,
    },

    /// Print the normalized result of a test output file
    #[command(name = "result")]
    TestOutput {
        #[arg(long)]
        test_output: PathBuf,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(Some(path)).with_context(|| format!("loading config {}", path.display()))
}

fn main() -> ExitCode {
    init_tracing();

    match run(Args::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    match args.command {
        Commands::Analyze {
            planning_log,
            video,
            test_output,
            output_dir,
            config,
            json,
        } => {
            let config = load_config(&config)?;
            let inputs = PipelineInputs {
                planning_log,
                video,
                test_output,
            };

            if !json {
                println!("🚀 Starting video analysis...");
                println!("\n📋 Planning log: {}", inputs.planning_log.display());
                println!("🎥 Video(s): {}", inputs.video.display());
                println!("📄 Test output: {}", inputs.test_output.display());
            }

            let analyzer = VideoAnalyzer::new(config.analysis.clone());
            let annotator = annotator_from_settings(&config.annotation);
            let outcome = run_pipeline(&inputs, &config, &analyzer, annotator.as_ref());

            let paths = write_report(&output_dir, &outcome.report)
                .with_context(|| format!("writing report to {}", output_dir.display()))?;

            let report = &outcome.report;
            if json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                println!("   Found {} planned steps", outcome.steps.len());
                println!("   Processed {} video(s)", outcome.video_analysis.video_count);
                println!("   Test Status: {}", outcome.test_result.status);

                println!("\n✅ Report generated successfully!");
                println!("   JSON: {}", paths.json.display());
                println!("   Markdown: {}", paths.markdown.display());

                println!("\n📊 Summary:");
                println!("   Total Steps: {}", report.summary.total_steps);
                println!("   Observed: {}", report.summary.observed_steps);
                println!("   Deviations: {}", report.summary.deviation_count);

                if report.summary.deviation_count == 0 {
                    println!("\n   ✨ No deviations detected!");
                } else {
                    println!("\n   ⚠️  {} deviation(s) found", report.summary.deviation_count);
                }
            }

            Ok(if report.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Steps {
            planning_log,
            config,
        } => {
            let config = load_config(&config)?;
            let steps = PlanningLogParser::new(&planning_log)
                .planner_key(&config.analysis.planner_key)
                .extract_steps()
                .with_context(|| format!("reading planning log {}", planning_log.display()))?;
            println!("{}", serde_json::to_string_pretty(&steps)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Scan {
            video,
            frame_skip,
            config,
        } => {
            let mut config = load_config(&config)?;
            if let Some(frame_skip) = frame_skip {
                config.analysis.frame_skip = frame_skip;
            }
            let analysis = VideoAnalyzer::new(config.analysis).analyze(&video);
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::TestOutput { test_output } => {
            let result = compare_output(&test_output);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
