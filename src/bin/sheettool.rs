use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sheet_scan::overlay::{bubble_overlay, marker_overlay};
use sheet_scan::pipeline::StaticLayout;
use sheet_scan::tools::{FsCropStore, FsLayoutProvider, FsResultSink, load_rgb};
use sheet_scan::utils::grayscale::to_gray_image;
use sheet_scan::{CropStore, LayoutProvider, PageLayout, ScanConfig, Scanner};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "sheettool", version, about = "Answer-sheet scanning tools")]
struct Cli {
    /// Scanner profile (JSON); SHEET_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find and decode the identifier symbol
    Locate {
        #[arg(long)]
        image: PathBuf,
    },
    /// Detect the corner markers, optionally writing the debug overlay
    Markers {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        overlay: Option<PathBuf>,
    },
    /// Rectify a photo onto the canonical page of a layout
    Warp {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        layout: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Render the bubble overlay of a photo against a layout
    Overlay {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        layout: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Run the full scan and print the result record
    Scan {
        #[arg(long)]
        image: PathBuf,
        /// Directory of `<quizId>/v<version>.json` layouts
        #[arg(long, conflicts_with = "layout")]
        layouts: Option<PathBuf>,
        /// Single layout file used for any sheet
        #[arg(long)]
        layout: Option<PathBuf>,
        /// Write the record to `<results>/<sheetId>.json`
        #[arg(long)]
        results: Option<PathBuf>,
        /// Write the name crop under this directory
        #[arg(long)]
        crops: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let scanner = Scanner::new(load_config(cli.config.as_deref())?);

    match cli.command {
        Command::Locate { image } => locate_cmd(&scanner, &image),
        Command::Markers { image, overlay } => markers_cmd(&scanner, &image, overlay.as_deref()),
        Command::Warp { image, layout, out } => warp_cmd(&scanner, &image, &layout, &out),
        Command::Overlay { image, layout, out } => overlay_cmd(&scanner, &image, &layout, &out),
        Command::Scan {
            image,
            layouts,
            layout,
            results,
            crops,
        } => scan_cmd(&scanner, &image, layouts, layout, results, crops),
    }
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    let mut config = match path {
        Some(p) => ScanConfig::load(p).with_context(|| format!("loading {}", p.display()))?,
        None => ScanConfig::default(),
    };
    config.apply_env().context("applying SHEET_* overrides")?;
    Ok(config)
}

fn load_layout(path: &Path) -> Result<PageLayout> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(PageLayout::from_response(value)?)
}

fn load_photo(path: &Path) -> Result<image::RgbImage> {
    load_rgb(path).with_context(|| format!("loading image {}", path.display()))
}

fn locate_cmd(scanner: &Scanner, image: &Path) -> Result<()> {
    let photo = load_photo(image)?;
    let start = Instant::now();
    let found = scanner.locate(&to_gray_image(&photo))?;
    println!("Image: {} ({}x{})", image.display(), photo.width(), photo.height());
    println!("Payload: {}", found.payload);
    match &found.rect {
        Some(r) => println!("Rect: x={} y={} w={} h={}", r.x, r.y, r.w, r.h),
        None => println!("Rect: unknown"),
    }
    println!("Variant: {} via {}", found.variant, found.decoder);
    match found.parse() {
        Ok(sheet) => println!(
            "Sheet: quiz={} sheet={} version={}",
            sheet.quiz_id, sheet.sheet_id, sheet.version
        ),
        Err(err) => println!("Sheet: {err}"),
    }
    println!("Elapsed: {:.1} ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn markers_cmd(scanner: &Scanner, image: &Path, overlay: Option<&Path>) -> Result<()> {
    let photo = load_photo(image)?;
    let gray = to_gray_image(&photo);
    let exclude = scanner.locate(&gray).ok().and_then(|found| found.rect);
    let detection = scanner.detect_markers(&gray, exclude.as_ref());

    println!("Image: {} ({}x{})", image.display(), photo.width(), photo.height());
    println!("Candidates: {}", detection.candidates.len());
    for (id, (p, found)) in sheet_scan::AnchorId::ORDER
        .iter()
        .zip(detection.anchors.points.iter().zip(detection.anchors.detected))
    {
        let tag = if found { "marker" } else { "corner" };
        println!("  {id:?}: ({:.1}, {:.1}) {tag}", p.x, p.y);
    }
    println!("Degraded: {}", detection.anchors.is_degraded());

    if let Some(out) = overlay {
        marker_overlay(&photo, &detection, exclude.as_ref())
            .save(out)
            .with_context(|| format!("writing {}", out.display()))?;
        println!("Overlay: {}", out.display());
    }
    Ok(())
}

fn warp_cmd(scanner: &Scanner, image: &Path, layout: &Path, out: &Path) -> Result<()> {
    let photo = load_photo(image)?;
    let layout = load_layout(layout)?;
    let exclude = scanner.locate(&to_gray_image(&photo)).ok().and_then(|f| f.rect);
    let page = scanner.read_page(&photo, &layout, exclude.as_ref())?;
    page.alignment
        .image
        .save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "Canonical: {} ({}x{}) degraded={}",
        out.display(),
        page.alignment.image.width(),
        page.alignment.image.height(),
        page.anchors.is_degraded()
    );
    Ok(())
}

fn overlay_cmd(scanner: &Scanner, image: &Path, layout: &Path, out: &Path) -> Result<()> {
    let photo = load_photo(image)?;
    let layout = load_layout(layout)?;
    let exclude = scanner.locate(&to_gray_image(&photo)).ok().and_then(|f| f.rect);
    let page = scanner.read_page(&photo, &layout, exclude.as_ref())?;
    bubble_overlay(
        &page.alignment.image,
        &layout,
        scanner.scorer(),
        scanner.config().px_per_pt,
    )
    .save(out)
    .with_context(|| format!("writing {}", out.display()))?;
    println!("Overlay: {}", out.display());
    Ok(())
}

fn scan_cmd(
    scanner: &Scanner,
    image: &Path,
    layouts: Option<PathBuf>,
    layout: Option<PathBuf>,
    results: Option<PathBuf>,
    crops: Option<PathBuf>,
) -> Result<()> {
    let photo = load_photo(image)?;
    let provider: Box<dyn LayoutProvider> = match (layouts, layout) {
        (Some(dir), _) => Box::new(FsLayoutProvider::new(dir)),
        (None, Some(file)) => {
            let text =
                std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            Box::new(StaticLayout(serde_json::from_str(&text)?))
        }
        (None, None) => anyhow::bail!("either --layouts or --layout is required"),
    };

    let crop_store = crops.map(FsCropStore::new);
    let crop_store = crop_store.as_ref().map(|s| s as &dyn CropStore);

    let record = match results {
        Some(dir) => {
            let sink = FsResultSink::new(dir);
            scanner
                .scan_and_submit(&photo, provider.as_ref(), &sink, crop_store)?
                .1
        }
        None => {
            let reading = scanner.scan(&photo, provider.as_ref())?;
            let path = crop_store.and_then(|store| reading.store_name_crop(store));
            reading.to_record(path)
        }
    };
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
