use std::{
    io::Write,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use tartil_core::{
    AyahRequest, Job, JobService, JobStatus, JobTicket, RenderConfig, ServiceConfig,
    SubmitRequest, captions, telemetry, text, timeline,
};
use tokio::sync::broadcast;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), (secs % 60.0).floor())
    }
}

#[derive(Parser)]
#[command(name = "tartil")]
#[command(about = "Render recited scripture into videos with timed subtitles")]
struct Cli {
    /// Workspace root holding uploads/, outputs/, temp/ and backgrounds/
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a video from verse text and a narration file or URL
    Render {
        /// Verse text
        #[arg(short, long, conflicts_with = "text_file", required_unless_present = "text_file")]
        text: Option<String>,

        /// Read the verse text from a file
        #[arg(long)]
        text_file: Option<PathBuf>,

        /// Narration: local file or http(s) URL
        #[arg(short, long)]
        audio: String,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Look a verse up by surah and ayah and render it with its recitation
    Ayah {
        surah: u32,
        ayah: u32,

        /// Reciter id in the audio catalog (e.g. "ar.alafasy")
        #[arg(short, long)]
        reciter: Option<String>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Write only the subtitle track for a text and a narration length
    Subtitles {
        /// Verse text
        #[arg(short, long)]
        text: String,

        /// Narration length in seconds
        #[arg(short, long)]
        duration: f64,

        /// Output .ass file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Render option override, KEY=VALUE (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Background name inside backgrounds/, or an http(s) URL
    #[arg(short, long)]
    background: Option<String>,

    /// Output file stem
    #[arg(short, long)]
    name: Option<String>,

    /// Render option override, KEY=VALUE (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// JSON file with render options, applied before --set
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 1800)]
    wait: u64,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// `KEY=VALUE`; the value is taken as JSON when it parses, else as a string.
fn parse_override(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("override '{raw}' must look like KEY=VALUE");
    };
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

async fn load_overrides(file: Option<&PathBuf>, overrides: &[String]) -> Result<Map<String, Value>> {
    let mut config = match file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("could not read {}", path.display()))?;
            match serde_json::from_str(&raw)? {
                Value::Object(map) => map,
                _ => bail!("{} must contain a JSON object", path.display()),
            }
        }
        None => Map::new(),
    };

    for raw in overrides {
        let (key, value) = parse_override(raw)?;
        config.insert(key, value);
    }
    Ok(config)
}

fn stage_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Downloading => "Fetching media...",
        JobStatus::GeneratingSubtitles => "Building subtitles...",
        JobStatus::GeneratingVideo => "Encoding video...",
        JobStatus::Completed | JobStatus::Error => "Finishing...",
    }
}

fn stage_done(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Downloading => "Media ready",
        JobStatus::GeneratingSubtitles => "Subtitles built",
        JobStatus::GeneratingVideo => "Video encoded",
        JobStatus::Completed | JobStatus::Error => "Done",
    }
}

/// Poll the job, one spinner per stage, until it reaches a terminal state.
async fn follow(service: &JobService, ticket: &JobTicket, wait: Duration) -> Result<Job> {
    let deadline = Instant::now() + wait;
    let mut status = JobStatus::Downloading;
    let mut step_start = Instant::now();
    let mut spinner = create_spinner(stage_label(status));

    loop {
        let job = service
            .job(&ticket.job_id)
            .with_context(|| format!("job {} disappeared", ticket.job_id))?;

        if job.status != status {
            if job.status != JobStatus::Error {
                spinner.finish_with_message(format!(
                    "{} {} {}",
                    style("✓").green().bold(),
                    stage_done(status),
                    style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
                ));
            }
            status = job.status;
            step_start = Instant::now();
            if !status.is_terminal() {
                spinner = create_spinner(stage_label(status));
            }
        }

        if job.is_terminal() {
            if job.status == JobStatus::Error {
                spinner.finish_with_message(format!(
                    "{} {}",
                    style("✗").red().bold(),
                    job.error.as_deref().unwrap_or("job failed")
                ));
            }
            return Ok(job);
        }

        if Instant::now() >= deadline {
            spinner.abandon_with_message(format!("{} still {}", style("…").yellow(), job.status));
            bail!("job {} did not finish within {}s", ticket.job_id, wait.as_secs());
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

async fn run_job(service: &JobService, ticket: JobTicket, wait: Duration) -> Result<()> {
    println!(
        "{} Job {} queued",
        style("✓").green().bold(),
        style(&ticket.job_id).yellow()
    );
    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();
    let job = follow(service, &ticket, wait).await?;

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );

    match (job.status, job.output_path) {
        (JobStatus::Completed, Some(path)) => {
            println!("{} {}", style("Saved:").dim(), style(path.display()).cyan());
            Ok(())
        }
        _ => bail!(job.error.unwrap_or_else(|| "job failed".to_string())),
    }
}

fn write_subtitles(text_in: &str, duration: f64, config: &RenderConfig) -> Result<captions::SubtitleDocument> {
    let prepared = text::prepare(text_in, config.clean_policy(), config.remove_diacritics);
    let units = text::segment(&prepared, config.words_per_segment, config.max_segments);
    let timeline = timeline::allocate(&units, duration);
    let style_sheet = captions::StyleSheet::from_config(config);
    Ok(captions::build(
        &timeline,
        &style_sheet,
        Some(config.reciter_name.as_str()),
    )?)
}

/// Render the subtitle track alone, to `out` or else to `stdout`.
async fn run_subtitles(
    text_in: &str,
    duration: f64,
    out: Option<PathBuf>,
    overrides: &[String],
    stdout: &mut impl Write,
) -> Result<()> {
    let overrides = load_overrides(None, overrides).await?;
    let config = RenderConfig::merged(&overrides)?;
    let document = write_subtitles(text_in, duration, &config)?;
    match out {
        Some(path) => {
            document.write_to(&path).await?;
            eprintln!(
                "{} {} captions written to {}",
                style("✓").green().bold(),
                document.event_count(),
                style(path.display()).cyan()
            );
        }
        None => {
            write!(stdout, "{document}")?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let telemetry_config = telemetry::TelemetryConfig::default();
    let budget = telemetry::init(&telemetry_config);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let reporter = telemetry::spawn_drop_reporter(
        budget,
        telemetry_config.report_interval,
        shutdown_tx.subscribe(),
    );

    let mut service_config = ServiceConfig::default();
    if let Some(root) = cli.root {
        service_config = service_config.with_root(root);
    }
    tracing::debug!(root = %service_config.root_dir.display(), "workspace root");

    // stdout carries command output such as a subtitle document.
    eprintln!(
        "\n{}  {}\n",
        style("tartil").cyan().bold(),
        style("Recitation Video Renderer").dim()
    );

    let outcome = match cli.command {
        Command::Subtitles {
            text,
            duration,
            out,
            overrides,
        } => run_subtitles(&text, duration, out, &overrides, &mut std::io::stdout()).await,
        Command::Render {
            text,
            text_file,
            audio,
            render,
        } => {
            let verse_text = match (text, text_file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("could not read {}", path.display()))?,
                (None, None) => bail!("either --text or --text-file is required"),
            };
            let config = load_overrides(render.config.as_ref(), &render.overrides).await?;

            let service = JobService::start(service_config).await?;
            let ticket = service.submit(SubmitRequest {
                verse_text,
                audio_url: audio,
                background: render.background,
                output_name: render.name,
                config,
            })?;
            let outcome = run_job(&service, ticket, Duration::from_secs(render.wait)).await;
            service.shutdown().await;
            outcome
        }
        Command::Ayah {
            surah,
            ayah,
            reciter,
            render,
        } => {
            let config = load_overrides(render.config.as_ref(), &render.overrides).await?;

            let service = JobService::start(service_config).await?;
            let spinner = create_spinner(&format!("Looking up {surah}:{ayah}..."));
            let submitted = service
                .submit_ayah(AyahRequest {
                    surah,
                    ayah,
                    reciter,
                    background: render.background,
                    output_name: render.name,
                    config,
                })
                .await;
            spinner.finish_and_clear();

            let outcome = match submitted {
                Ok(ticket) => run_job(&service, ticket, Duration::from_secs(render.wait)).await,
                Err(e) => Err(e.into()),
            };
            service.shutdown().await;
            outcome
        }
    };

    let _ = shutdown_tx.send(());
    let _ = reporter.await;

    if let Err(e) = outcome {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_millis(119_600)), "1m 59s");
    }

    #[test]
    fn test_parse_override_values() {
        assert_eq!(
            parse_override("night_mode=true").unwrap(),
            ("night_mode".to_string(), Value::Bool(true))
        );
        assert_eq!(
            parse_override("font_size=72").unwrap(),
            ("font_size".to_string(), Value::from(72))
        );
        assert_eq!(
            parse_override("reciter_name=Mishary Alafasy").unwrap(),
            ("reciter_name".to_string(), Value::from("Mishary Alafasy"))
        );
        assert!(parse_override("night_mode").is_err());
    }

    #[tokio::test]
    async fn test_subtitles_to_stdout_is_a_bare_document() {
        let mut stdout = Vec::new();
        run_subtitles("بسم الله الرحمن الرحيم", 4.0, None, &[], &mut stdout)
            .await
            .unwrap();

        let written = String::from_utf8(stdout).unwrap();
        assert!(written.starts_with("[Script Info]\n"));
        assert!(!written.contains("Recitation Video Renderer"));
    }

    #[test]
    fn test_subtitles_command_output() {
        let config = RenderConfig::default();
        let document = write_subtitles("بسم الله الرحمن الرحيم", 4.0, &config).unwrap();
        assert_eq!(document.event_count(), 1);
        assert!(document.as_str().contains("Dialogue: 0,0:00:00.00,0:00:04.00,Verse,"));
    }
}
