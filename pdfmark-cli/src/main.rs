use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use pdfmark_core::geometry::bounding_rect;
use pdfmark_core::outline::breadcrumb;
use pdfmark_core::recovery::{discard_backup, recovery_candidate, write_atomically, write_backup};
use pdfmark_core::save::SavePolicy;
use pdfmark_core::{
    Config, ControllerEvent, DocumentLoader, HighlightController, HighlightRequest, ObjRef, Quad,
    Rgb, Tool, ToolCategory,
};
use pdfmark_doc::{DocProxy, LopdfLoader};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "pdfmark",
    version,
    about = "Edit PDF outlines and text markup annotations in place"
)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the edited document here instead of over the input
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Open the newer auto-save backup instead of the file, when one exists
    #[arg(long, global = true)]
    recover: bool,

    /// PDF file to operate on
    file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read or edit the outline (bookmarks)
    #[command(subcommand)]
    Outline(OutlineCommand),
    /// Read or edit highlight and underline annotations
    #[command(subcommand)]
    Highlight(HighlightCommand),
    /// Overlay rectangles for one page, as percent insets
    Overlay {
        /// Page index (0-based)
        page: usize,
    },
    /// Read or edit the viewer state stored in the document
    #[command(subcommand)]
    ViewState(ViewStateCommand),
}

#[derive(Debug, Subcommand)]
enum OutlineCommand {
    List,
    /// Insert an item after the last item on or before its page
    Add {
        title: String,
        /// Page index (0-based)
        page: usize,
        /// Levels deeper (positive) or shallower (negative) than the
        /// preceding item
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        depth: i32,
    },
    Remove {
        title: String,
        page: usize,
    },
    /// Move an item up or down the hierarchy
    Depth {
        title: String,
        page: usize,
        #[arg(allow_negative_numbers = true)]
        delta: i32,
    },
    /// Titles leading to the section a page belongs to
    Breadcrumb {
        page: usize,
    },
}

#[derive(Debug, Subcommand)]
enum HighlightCommand {
    List {
        /// Only this page (0-based)
        #[arg(long)]
        page: Option<usize>,
    },
    Add {
        /// Page index (0-based)
        page: usize,
        /// Marked region in page units, `x0,y0,x1,y1`; repeat for more lines
        #[arg(long = "rect", required = true, value_parser = parse_rect)]
        rects: Vec<[f64; 4]>,
        /// Configured tool to use (defaults to the first markup tool)
        #[arg(long)]
        tool: Option<String>,
        /// Override the tool color, `#rrggbb`
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        opacity: Option<f64>,
        /// Text stored as the annotation contents
        #[arg(long)]
        text: Option<String>,
    },
    Remove {
        /// Object reference, `12` or `12 0 R`
        #[arg(value_parser = parse_ref)]
        reference: ObjRef,
    },
}

#[derive(Debug, Subcommand)]
enum ViewStateCommand {
    Get {
        key: Option<String>,
    },
    /// Store one key; the value is parsed as JSON, or kept as a string
    Set {
        key: String,
        value: String,
    },
}

fn parse_rect(raw: &str) -> Result<[f64; 4], String> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| err.to_string())?;
    <[f64; 4]>::try_from(values).map_err(|_| format!("expected x0,y0,x1,y1, got {raw:?}"))
}

fn parse_ref(raw: &str) -> Result<ObjRef, String> {
    let mut parts = raw.trim().trim_end_matches('R').split_whitespace();
    let number = parts
        .next()
        .ok_or("empty reference")?
        .parse::<u32>()
        .map_err(|err| err.to_string())?;
    let generation = match parts.next() {
        Some(raw) => raw.parse::<u16>().map_err(|err| err.to_string())?,
        None => 0,
    };
    Ok(ObjRef::new(number, generation))
}

fn rect_to_quad([x0, y0, x1, y1]: [f64; 4]) -> Quad {
    let (left, right) = (x0.min(x1), x0.max(x1));
    let (bottom, top) = (y0.min(y1), y0.max(y1));
    [left, bottom, right, bottom, left, top, right, top]
}

type Controller = HighlightController<DocProxy>;

/// Whether a command changed the document.
enum Outcome {
    Unchanged,
    Modified,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "pdfmark", "pdfmark");
    let _log_guard = match &project_dirs {
        Some(dirs) => Some(init_logging(dirs)?),
        None => {
            init_console_logging()?;
            None
        }
    };

    let config = load_config(args.config.as_deref())?;
    let source = source_path(&args.file, args.recover);
    let bytes = fs::read(&source).with_context(|| format!("failed to read {:?}", source))?;
    let document = LopdfLoader
        .load(bytes)
        .await
        .with_context(|| format!("failed to open {:?}", source))?;
    let mut controller = HighlightController::new(document, &config);

    let outcome = run(&mut controller, &config, &args)?;
    let events = controller.drain_events();
    if let Outcome::Modified = outcome {
        let target = args.output.clone().unwrap_or_else(|| args.file.clone());
        let in_place = target == args.file;
        let mut document = controller.into_document();
        let mut policy = SavePolicy::from_config(&config.save);
        if in_place && auto_save_due(&mut policy, &events, Instant::now()) {
            auto_save(&mut document, &args.file)?;
        }
        save(document, &target)?;
        // The backup belongs to the source file; it is only stale once the
        // source itself has been rewritten.
        if in_place {
            discard_backup(&args.file);
        }
    }
    Ok(())
}

/// Feeds the controller's auto-save requests through the debouncer.
fn auto_save_due(policy: &mut SavePolicy, events: &[ControllerEvent], now: Instant) -> bool {
    events
        .iter()
        .filter(|event| matches!(event, ControllerEvent::AutoSaveRequested))
        .fold(false, |due, _| policy.request_auto_save(now) || due)
}

fn auto_save(document: &mut DocProxy, file: &Path) -> Result<()> {
    let bytes = document
        .get_doc_as_bytes()
        .context("failed to serialize document")?;
    let backup = write_backup(file, &bytes)
        .with_context(|| format!("failed to write backup of {:?}", file))?;
    info!(?backup, "backup written");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path.map(Path::to_path_buf).or_else(Config::default_path) else {
        warn!("no configuration directory, using defaults");
        return Ok(Config::default());
    };
    Config::load(&path).with_context(|| format!("failed to load config {:?}", path))
}

fn source_path(file: &Path, recover: bool) -> PathBuf {
    if recover {
        if let Some(backup) = recovery_candidate(file) {
            info!(?backup, "recovering from newer backup");
            return backup;
        }
    }
    file.to_path_buf()
}

fn save(mut document: DocProxy, target: &Path) -> Result<()> {
    let bytes = document
        .get_doc_as_bytes()
        .context("failed to serialize document")?;
    write_atomically(target, &bytes).with_context(|| format!("failed to write {:?}", target))?;
    info!(?target, len = bytes.len(), "document saved");
    Ok(())
}

fn run(controller: &mut Controller, config: &Config, args: &Args) -> Result<Outcome> {
    match &args.command {
        Command::Outline(command) => run_outline(controller, command, args.json),
        Command::Highlight(command) => run_highlight(controller, config, command, args.json),
        Command::Overlay { page } => {
            if controller.document().page_box(*page).is_none() {
                bail!("page {page} out of range");
            }
            controller.draw_page(*page)?;
            print_overlays(controller, *page, args.json)?;
            Ok(Outcome::Unchanged)
        }
        Command::ViewState(command) => run_view_state(controller, command, args.json),
    }
}

fn run_outline(controller: &mut Controller, command: &OutlineCommand, json: bool) -> Result<Outcome> {
    match command {
        OutlineCommand::List => {
            let outline = controller.document().list_serializable_outlines();
            if json {
                print_json(&outline)?;
            } else {
                for item in pdfmark_core::outline::flatten(&outline) {
                    let page = item
                        .page_index()
                        .map_or_else(|| "-".to_string(), |page| page.to_string());
                    println!("{}{}\t{}", "  ".repeat(item.depth - 1), item.title, page);
                }
            }
            Ok(Outcome::Unchanged)
        }
        OutlineCommand::Add { title, page, depth } => {
            controller.add_outline_item(title, *page, *depth)?;
            Ok(Outcome::Modified)
        }
        OutlineCommand::Remove { title, page } => {
            controller.remove_outline_item(title, *page)?;
            Ok(Outcome::Modified)
        }
        OutlineCommand::Depth { title, page, delta } => {
            controller.change_outline_item_depth(title, *page, *delta)?;
            Ok(Outcome::Modified)
        }
        OutlineCommand::Breadcrumb { page } => {
            let path = breadcrumb(&controller.document().list_serializable_outlines(), *page);
            if json {
                print_json(&path)?;
            } else {
                println!("{}", path.join(" > "));
            }
            Ok(Outcome::Unchanged)
        }
    }
}

fn pick_tool(config: &Config, name: Option<&str>) -> Result<Tool> {
    let tool = match name {
        Some(name) => config
            .tool(name)
            .ok_or_else(|| anyhow!("no tool named {name:?}"))?,
        None => config
            .tools
            .iter()
            .find(|tool| tool.category() == ToolCategory::Markup)
            .ok_or_else(|| anyhow!("no markup tool configured"))?,
    };
    if tool.kind.markup().is_none() {
        bail!("tool {:?} does not mark up text", tool.label());
    }
    Ok(tool.clone())
}

fn run_highlight(
    controller: &mut Controller,
    config: &Config,
    command: &HighlightCommand,
    json: bool,
) -> Result<Outcome> {
    match command {
        HighlightCommand::List { page } => {
            let records = match page {
                Some(page) => controller.document().list_highlights_for_page_idx(*page)?,
                None => controller.document().list_highlights(),
            };
            if json {
                print_json(&records)?;
            } else {
                for record in &records {
                    let page = record
                        .page_index
                        .map_or_else(|| "-".to_string(), |page| page.to_string());
                    let kind = record
                        .subtype
                        .markup()
                        .map_or_else(|| "?".to_string(), |kind| kind.to_string());
                    let color = record
                        .color
                        .map_or_else(|| "-".to_string(), |color| color.to_hex(record.opacity));
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        record.reference,
                        page,
                        kind,
                        color,
                        record.contents.as_deref().unwrap_or("")
                    );
                }
            }
            Ok(Outcome::Unchanged)
        }
        HighlightCommand::Add {
            page,
            rects,
            tool,
            color,
            opacity,
            text,
        } => {
            let mut tool = pick_tool(config, tool.as_deref())?;
            if let Some(color) = color {
                tool.color = Rgb::from_hex(color)?;
            }
            if let Some(opacity) = opacity {
                tool.opacity = opacity.clamp(0.0, 1.0);
            }
            let quads: Vec<Quad> = rects.iter().copied().map(rect_to_quad).collect();
            let request = HighlightRequest {
                page_index: *page,
                kind: tool
                    .kind
                    .markup()
                    .ok_or_else(|| anyhow!("tool does not mark up text"))?,
                color: tool.color,
                opacity: tool.opacity,
                quad_points: quads.iter().flatten().copied().collect(),
                rect: bounding_rect(&quads),
                contents: text.clone(),
            };
            controller.set_current_tool(tool);
            controller.annotate(request)?;
            print_overlays(controller, *page, json)?;
            Ok(Outcome::Modified)
        }
        HighlightCommand::Remove { reference } => {
            let params = controller.remove_annotation(*reference)?;
            if let Some(page) = params.page_index {
                info!(%reference, page, "annotation removed");
            }
            Ok(Outcome::Modified)
        }
    }
}

fn run_view_state(
    controller: &mut Controller,
    command: &ViewStateCommand,
    json: bool,
) -> Result<Outcome> {
    match command {
        ViewStateCommand::Get { key } => {
            let state = controller.document().get_custom_view_info();
            let value = match key {
                Some(key) => state.get(key).cloned().unwrap_or(Value::Null),
                None => Value::Object(state),
            };
            if json || !value.is_string() {
                print_json(&value)?;
            } else if let Some(text) = value.as_str() {
                println!("{text}");
            }
            Ok(Outcome::Unchanged)
        }
        ViewStateCommand::Set { key, value } => {
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone()));
            controller.document_mut().set_custom_view_info(key, value)?;
            Ok(Outcome::Modified)
        }
    }
}

fn print_overlays(controller: &Controller, page: usize, json: bool) -> Result<()> {
    let overlays = controller.overlays(page);
    if json {
        return print_json(&overlays);
    }
    for overlay in overlays {
        let insets = overlay.insets;
        println!(
            "{}\ttop {:.2}% left {:.2}% bottom {:.2}% right {:.2}%\t{}",
            overlay.element_id, insets.top, insets.left, insets.bottom, insets.right, overlay.color
        );
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pdfmark.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

fn init_console_logging() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err))
}
