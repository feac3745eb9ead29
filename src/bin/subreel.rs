use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

use subreel::{
    BatchReport, BatchScheduler, InputLayout, ItemInputs, RenderConfig, SharedAssets,
    build_composition, discover_pending, init_logging, render_item,
};

#[derive(Parser, Debug)]
#[command(name = "subreel", version, about = "Batch-render captioned videos from numbered inputs")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// JSON config file; missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with `<n>.png`, `<n>.srt` and `<n>.mp3`/`<n>.wav` inputs.
    #[arg(long, global = true, default_value = "input_files")]
    input: PathBuf,

    /// Directory receiving `output_<n>.mp4` files.
    #[arg(long, global = true, default_value = "output_files")]
    output: PathBuf,

    /// Caption font (overrides `text.font_path`).
    #[arg(long, global = true)]
    font: Option<PathBuf>,

    /// Items rendered concurrently (overrides `workers`).
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Log filter such as `info` or `subreel=debug` (overrides `logging.level`; `RUST_LOG` wins).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every pending item, optionally polling for new ones.
    Batch(BatchArgs),
    /// Render a single item.
    Render(ItemArgs),
    /// List pending item numbers, one per line.
    Pending,
    /// Write one composited frame as a PNG preview.
    Frame(FrameArgs),
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Keep polling the input directory for new items.
    #[arg(long)]
    watch: bool,

    /// Seconds to wait between polls when nothing is pending.
    #[arg(long, default_value = "30", value_parser = parse_poll_secs)]
    poll_secs: Duration,
}

#[derive(Args, Debug)]
struct ItemArgs {
    /// Item number `<n>`.
    #[arg(long)]
    item: u64,
}

#[derive(Args, Debug)]
struct FrameArgs {
    /// Item number `<n>`.
    #[arg(long)]
    item: u64,

    /// Timeline position in seconds.
    #[arg(long, default_value_t = 0.0)]
    time: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.global)?;
    init_logging(&cfg.logging);

    let layout = InputLayout::new(&cli.global.input, &cli.global.output);
    match cli.cmd {
        Command::Batch(args) => cmd_batch(layout, cfg, args),
        Command::Render(args) => cmd_render(&layout, &cfg, args),
        Command::Pending => cmd_pending(&layout),
        Command::Frame(args) => cmd_frame(&layout, &cfg, args),
    }
}

fn parse_poll_secs(s: &str) -> Result<Duration, String> {
    let secs = s
        .parse::<f64>()
        .map_err(|e| format!("not a number: {e}"))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| format!("expected a non-negative number of seconds, got {secs}"))
}

fn load_config(global: &GlobalArgs) -> anyhow::Result<RenderConfig> {
    let mut cfg = match &global.config {
        Some(path) => RenderConfig::from_path(path)?,
        None => RenderConfig::default(),
    };
    if let Some(font) = &global.font {
        cfg.text.font_path = Some(font.clone());
    }
    if let Some(workers) = global.workers {
        cfg.workers = Some(workers);
    }
    if let Some(level) = &global.log_level {
        cfg.logging.level = level.clone();
    }
    if global.log_json {
        cfg.logging.json = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn cmd_batch(layout: InputLayout, cfg: RenderConfig, args: BatchArgs) -> anyhow::Result<ExitCode> {
    let scheduler = BatchScheduler::new(layout, cfg)?;
    let report = if args.watch {
        scheduler.watch(args.poll_secs, || false)?
    } else {
        scheduler.run_once()?
    };
    print_report(&report);
    Ok(exit_code(&report))
}

fn cmd_render(layout: &InputLayout, cfg: &RenderConfig, args: ItemArgs) -> anyhow::Result<ExitCode> {
    std::fs::create_dir_all(&layout.output_dir).with_context(|| {
        format!("create output directory '{}'", layout.output_dir.display())
    })?;
    let assets = SharedAssets::from_config(cfg)?;
    let report = render_item(layout, args.item, &assets, cfg)?;
    println!(
        "{}\t{} frames\t{:.2}s",
        report.output.display(),
        report.frames,
        report.elapsed.as_secs_f64()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_pending(layout: &InputLayout) -> anyhow::Result<ExitCode> {
    for item in discover_pending(layout)? {
        println!("{item}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_frame(layout: &InputLayout, cfg: &RenderConfig, args: FrameArgs) -> anyhow::Result<ExitCode> {
    let assets = SharedAssets::from_config(cfg)?;
    let mut renderer = assets.text_renderer(cfg)?;
    let inputs = ItemInputs::resolve(layout, args.item)?;
    let comp = build_composition(&inputs, &mut renderer, cfg)?;

    let idx = comp.frame_at(args.time);
    let frame = subreel::FrameCompositor::new(comp.canvas)?.render_frame(&comp, idx)?;
    let bg = cfg.encoder.background;
    let rgba = frame.to_opaque_rgba8([bg.r, bg.g, bg.b, 255])?;

    subreel::ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &rgba,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {} (frame {})", args.out.display(), idx.0);
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &BatchReport) {
    for r in report.succeeded() {
        println!("ok\t{}\t{}", r.item, r.output.display());
    }
    for (item, error) in report.failed() {
        println!("failed\t{item}\t{error}");
    }
}

fn exit_code(report: &BatchReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
