use annotation::{
    parse_heatmap_arg, rasterize_xml, AnalysisResult, ClassHeatmap, ConversionConfig, Converter,
    MaskSource, SlideGeometry,
};
use clap::{Parser, Subcommand};
use cli::{render, resolve_heatmap_scale, ConversionJob, OutputFormat};
use color_eyre::eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Convert slide annotations into labelled WKT polygons", long_about = None)]
struct Cli {
    /// Conversion configuration (.toml or .json); defaults apply when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Output format for converted polygons
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Wkt)]
    format: OutputFormat,
    /// Write to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an annotation XML export
    Xml {
        input: PathBuf,
        /// Slide height in slide pixels
        #[arg(long)]
        height: f64,
    },
    /// Convert an analysis service result JSON
    Structured {
        input: PathBuf,
        /// Slide height in slide pixels
        #[arg(long)]
        height: f64,
    },
    /// Trace per-class heatmap images
    Heatmap {
        /// LABEL=PATH, repeat once per class
        #[arg(long = "class", required = true)]
        classes: Vec<String>,
        /// Slide height in slide pixels
        #[arg(long)]
        height: f64,
        /// Heatmap-pixel to slide-pixel factor
        #[arg(long)]
        scale: Option<f64>,
        /// Slide microns per pixel, used to derive the scale
        #[arg(long)]
        mpp: Option<f64>,
    },
    /// Render an annotation XML export into one PNG heatmap per class
    Rasterize {
        input: PathBuf,
        #[arg(long)]
        slide_width: u32,
        #[arg(long)]
        slide_height: u32,
        /// Slide pixels per heatmap pixel
        #[arg(long)]
        ratio: Option<f64>,
        /// Slide microns per pixel, used to derive the ratio
        #[arg(long)]
        mpp: Option<f64>,
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Trace heatmaps into the analysis service result format
    ExportStructured {
        /// LABEL=PATH, repeat once per class
        #[arg(long = "class", required = true)]
        classes: Vec<String>,
        #[arg(long)]
        slide_width: u32,
        #[arg(long)]
        slide_height: u32,
        #[arg(long, default_value = "0")]
        offset_x: f64,
        #[arg(long, default_value = "0")]
        offset_y: f64,
    },
    /// Convert every slide listed in a job file
    Process {
        /// Path to the job file (.toml or .json)
        #[arg(short, long)]
        job: PathBuf,
    },
    /// Print the default configuration as TOML
    DefaultConfig,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConversionConfig::from_file(path)
            .wrap_err_with(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConversionConfig::default(),
    };

    match &cli.command {
        Commands::Xml { input, height } => {
            let xml = std::fs::read_to_string(input)?;
            convert(&cli, config, MaskSource::Xml(xml), SlideGeometry::new(*height, 1.0))?;
        }
        Commands::Structured { input, height } => {
            let result = AnalysisResult::from_json_file(input)?;
            convert(&cli, config, MaskSource::StructuredApi(result), SlideGeometry::new(*height, 1.0))?;
        }
        Commands::Heatmap { classes, height, scale, mpp } => {
            let scale = resolve_heatmap_scale(*scale, *mpp, &config)?;
            let heatmaps = load_heatmaps(classes)?;
            convert(&cli, config, MaskSource::HeatmapDict(heatmaps), SlideGeometry::new(*height, scale))?;
        }
        Commands::Rasterize { input, slide_width, slide_height, ratio, mpp, output_dir } => {
            let ratio = resolve_heatmap_scale(*ratio, *mpp, &config)?;
            let xml = std::fs::read_to_string(input)?;
            let heatmaps = rasterize_xml(&xml, (*slide_width, *slide_height), ratio, &config)?;

            std::fs::create_dir_all(output_dir)?;
            for heatmap in heatmaps {
                let path = output_dir.join(format!("{}.png", heatmap.label));
                heatmap.raster.save(&path)?;
                info!("Wrote {} heatmap -> {}", heatmap.label, path.display());
            }
        }
        Commands::ExportStructured { classes, slide_width, slide_height, offset_x, offset_y } => {
            let heatmaps = load_heatmaps(classes)?;
            let converter = Converter::from_config(config);
            let contours = converter.export_structured(
                &heatmaps,
                (*slide_width, *slide_height),
                (*offset_x, *offset_y),
            )?;
            let json = serde_json::to_string_pretty(&serde_json::json!({ "heatmap": contours }))?;
            emit(cli.output.as_deref(), &json)?;
        }
        Commands::Process { job } => {
            process_job(job)?;
        }
        Commands::DefaultConfig => {
            emit(cli.output.as_deref(), &ConversionConfig::default().to_toml()?)?;
        }
    }

    Ok(())
}

fn load_heatmaps(classes: &[String]) -> Result<Vec<ClassHeatmap>> {
    classes
        .iter()
        .map(|arg| {
            let (label, path) = parse_heatmap_arg(arg)?;
            ClassHeatmap::open(label, &path).wrap_err_with(|| format!("Failed to load heatmap {}", path))
        })
        .collect()
}

fn convert(cli: &Cli, config: ConversionConfig, source: MaskSource, slide: SlideGeometry) -> Result<()> {
    let converter = Converter::from_config(config);
    info!("{}", converter.info());

    let output = converter.convert(&source, slide)?;
    for diagnostic in &output.diagnostics {
        warn!("Rejected shape {} of '{}': {}", diagnostic.index, diagnostic.label, diagnostic.reason);
    }

    emit(cli.output.as_deref(), &render(&output, cli.format, converter.config())?)
}

fn emit(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)?;
            info!("Wrote {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}

fn process_job(job_path: &Path) -> Result<()> {
    let job = ConversionJob::from_file(job_path)?;
    let config = job.conversion_config()?;
    let converter = Converter::from_config(config);
    info!("Processing {} slides with {}", job.slides.len(), converter.info());

    std::fs::create_dir_all(&job.output_dir)?;

    for slide in &job.slides {
        let source = slide.source.load()?;
        let geometry = slide.geometry(converter.config())?;

        let output = converter.convert(&source, geometry)?;
        if output.is_empty() {
            warn!("No polygons for slide '{}'", slide.name);
        }

        let output_path = Path::new(&job.output_dir).join(format!("{}.{}", slide.name, job.format.extension()));
        std::fs::write(&output_path, render(&output, job.format, converter.config())?)?;
        info!(
            "Slide '{}': {} polygons, {} rejected -> {}",
            slide.name,
            output.len(),
            output.diagnostics.len(),
            output_path.display()
        );
    }

    info!("✅ Annotation conversion completed!");
    Ok(())
}
