use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, ValueEnum};

use flowcanvas::{
    NodeTypeCatalog, ServeArgs, Workflow, render_png, render_svg, run_serve,
};

#[derive(Debug, Parser)]
#[command(
    name = "flowcanvas",
    about = "Render ETL workflow graphs to SVG, or edit them in the browser."
)]
struct RenderArgs {
    /// Path to the input workflow definition. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Output format (defaults to the output file extension or svg).
    #[arg(short = 'e', long = "output-format")]
    output_format: Option<OutputFormat>,

    /// Node type catalog to use instead of the built-in one.
    #[arg(long = "catalog")]
    catalog: Option<PathBuf>,

    /// Launch the interactive editor instead of rendering once.
    #[arg(
        long = "edit",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["output", "output_format"],
        requires = "input"
    )]
    edit: bool,

    /// Override the host binding when using --edit.
    #[arg(long = "serve-host", requires = "edit")]
    serve_host: Option<String>,

    /// Override the port binding when using --edit.
    #[arg(long = "serve-port", requires = "edit")]
    serve_port: Option<u16>,

    /// Background color for the rendered workflow.
    #[arg(short = 'b', long = "background-color", default_value = "white")]
    background_color: String,

    /// Scale factor applied when rasterizing PNG output.
    #[arg(long = "scale", default_value_t = 2.0)]
    scale: f32,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Svg,
    Png,
}

impl OutputFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
        {
            Some(ext) if ext == "svg" => Some(OutputFormat::Svg),
            Some(ext) if ext == "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = dispatch().await {
        eprintln!("\u{001b}[31merror:\u{001b}[0m {err:?}");
        std::process::exit(1);
    }
}

async fn dispatch() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            let serve_args = ServeArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_serve(serve_args, None).await
        }
        Some("render") => {
            let render_args = RenderArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_render_or_edit(render_args).await
        }
        _ => {
            let render_args = RenderArgs::parse_from(args);
            run_render_or_edit(render_args).await
        }
    }
}

async fn run_render_or_edit(cli: RenderArgs) -> Result<()> {
    if cli.edit {
        run_edit(cli).await
    } else {
        run_render(cli)
    }
}

async fn run_edit(cli: RenderArgs) -> Result<()> {
    let input_source = parse_input(cli.input.as_deref())?;
    let input_path = match input_source {
        InputSource::File(path) => path,
        InputSource::Stdin => bail!("--edit requires a concrete file input"),
    };

    let canonical_input = input_path
        .canonicalize()
        .with_context(|| format!("failed to canonicalize '{}'", input_path.display()))?;

    let ui_root = locate_ui_dist()?;

    let host = cli
        .serve_host
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = cli.serve_port.unwrap_or(6161);

    let serve_args = ServeArgs {
        input: Some(canonical_input.clone()),
        catalog: cli.catalog.clone(),
        host: host.clone(),
        port,
        background_color: cli.background_color.clone(),
    };

    println!("Launching editor for {}", canonical_input.display());
    println!("Loaded web UI from {}", ui_root.display());
    println!(
        "Visit http://{}:{} in your browser to begin editing",
        host, port
    );

    run_serve(serve_args, Some(ui_root)).await
}

fn locate_ui_dist() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("FLOWCANVAS_WEB_DIST") {
        let custom_path = PathBuf::from(custom);
        if custom_path.join("index.html").is_file() {
            return Ok(custom_path);
        } else {
            bail!(
                "FLOWCANVAS_WEB_DIST='{}' does not contain an index.html",
                custom_path.display()
            );
        }
    }

    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("frontend/out"));
    }

    if let Ok(exe) = std::env::current_exe() {
        for ancestor in exe.ancestors() {
            candidates.push(PathBuf::from(ancestor).join("frontend/out"));
        }
    }

    for candidate in candidates {
        if candidate.join("index.html").is_file() {
            return Ok(candidate);
        }
    }

    bail!(
        "unable to find built web UI assets; run 'npm install' and 'npm run build' in the frontend/ directory or set FLOWCANVAS_WEB_DIST"
    );
}

fn run_render(cli: RenderArgs) -> Result<()> {
    let input_source = parse_input(cli.input.as_deref())?;
    let output_dest = parse_output(cli.output.as_deref(), &input_source)?;
    let format = determine_format(cli.output_format, &output_dest)?;

    let definition = load_definition(&input_source)?;
    let workflow = Workflow::parse(&definition)?;
    let catalog = match &cli.catalog {
        Some(path) => NodeTypeCatalog::load(path)?,
        None => NodeTypeCatalog::builtin(),
    };

    let bytes = match format {
        OutputFormat::Svg => render_svg(&workflow, &catalog, &cli.background_color)?.into_bytes(),
        OutputFormat::Png => render_png(&workflow, &catalog, &cli.background_color, cli.scale)?,
    };

    write_output(output_dest, &bytes, cli.quiet)?;

    Ok(())
}

fn parse_input(input: Option<&str>) -> Result<InputSource> {
    match input {
        None | Some("-") => Ok(InputSource::Stdin),
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.is_file() {
                bail!("input file '{}' does not exist", path.display());
            }
            Ok(InputSource::File(path))
        }
    }
}

fn parse_output(output: Option<&str>, input: &InputSource) -> Result<OutputDestination> {
    match output {
        Some("-") => Ok(OutputDestination::Stdout),
        Some(path) => Ok(OutputDestination::File(PathBuf::from(path))),
        None => match input {
            InputSource::File(path) => Ok(OutputDestination::File(path.with_extension("svg"))),
            InputSource::Stdin => Ok(OutputDestination::Stdout),
        },
    }
}

fn determine_format(
    requested: Option<OutputFormat>,
    output: &OutputDestination,
) -> Result<OutputFormat> {
    if let Some(format) = requested {
        return Ok(format);
    }

    match output {
        OutputDestination::File(path) => Ok(OutputFormat::from_path(path).unwrap_or(OutputFormat::Svg)),
        OutputDestination::Stdout => Ok(OutputFormat::Svg),
    }
}

fn load_definition(input: &InputSource) -> Result<String> {
    match input {
        InputSource::Stdin => {
            let mut definition = String::new();
            io::stdin()
                .read_to_string(&mut definition)
                .context("failed to read workflow definition from stdin")?;
            Ok(definition)
        }
        InputSource::File(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display())),
    }
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            io::stdout()
                .write_all(bytes)
                .context("failed to write output to stdout")?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            if !quiet {
                println!("Rendered workflow to {}", path.display());
            }
        }
    }
    Ok(())
}
