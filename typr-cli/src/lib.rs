//! typr CLI (made by FontLab https://www.fontlab.com/)

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use typr_core::glyph_id::parse_glyph_id;
use typr_core::pipeline::{synthesize, PipelineOptions};
use typr_core::report::{write_json_pretty, write_ndjson, BuildReport};
use typr_core::request::{CharacterMapping, FontMetadata, OutputFormat, Rect, RequestManifest};
use typr_core::source::SourceImage;
use typr_core::verify::{inspect_path, FontSummary};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// CLI entrypoint for typr.
#[derive(Debug, Parser)]
#[command(
    name = "typr",
    about = "Turn scanned letters into fonts (made by FontLab https://www.fontlab.com/)"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a font from a JSON request
    Build(BuildArgs),
    /// Write a request from a directory of per-character images
    Charmap(CharmapArgs),
    /// Summarize fonts: tables, checksums, names and code points
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Request file (JSON); image paths resolve against its directory
    #[arg(value_hint = ValueHint::FilePath)]
    request: PathBuf,

    /// Directory the font is written to
    #[arg(short = 'o', long = "out-dir", default_value = ".", value_hint = ValueHint::DirPath)]
    out_dir: PathBuf,

    /// Override the request's output format
    #[arg(long = "format", value_enum)]
    format: Option<FormatArg>,

    /// Override the request's family name
    #[arg(long = "family")]
    family: Option<String>,

    /// Worker threads for tracing (defaults to one per core)
    #[arg(short = 'j', long = "jobs", env = "TYPR_JOBS")]
    jobs: Option<usize>,

    /// Font units per em (16..=16384)
    #[arg(long = "units-per-em", default_value_t = 1000)]
    units_per_em: u16,

    /// Add an empty space glyph when the request has none
    #[arg(long = "add-space", action = ArgAction::SetTrue)]
    add_space: bool,

    /// Also write the report to this file
    #[arg(long = "report", value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CharmapArgs {
    /// Directory holding images named `A.png`, `U+0041.png` or `a.alt.png`
    #[arg(value_hint = ValueHint::DirPath)]
    dir: PathBuf,

    /// Family name recorded in the request
    #[arg(long = "family")]
    family: String,

    #[arg(long = "format", value_enum, default_value_t = FormatArg::Ttf)]
    format: FormatArg,

    /// Write the request here instead of stdout
    #[arg(short = 'o', long = "output", value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Follow symlinks while walking the directory
    #[arg(long = "follow-symlinks", action = ArgAction::SetTrue)]
    follow_symlinks: bool,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Font files to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    fonts: Vec<PathBuf>,

    /// Emit a single JSON array
    #[arg(long = "json", action = ArgAction::SetTrue, conflicts_with = "ndjson")]
    json: bool,

    /// Emit newline-delimited JSON
    #[arg(long = "ndjson", action = ArgAction::SetTrue)]
    ndjson: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum FormatArg {
    Ttf,
    Otf,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Ttf => OutputFormat::Ttf,
            FormatArg::Otf => OutputFormat::Otf,
        }
    }
}

/// Parse CLI args and execute the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => run_build(args),
        Command::Charmap(args) => run_charmap(args),
        Command::Inspect(args) => run_inspect(args),
    }
}

fn run_build(args: BuildArgs) -> Result<()> {
    let mut manifest = RequestManifest::from_path(&args.request)?;
    apply_overrides(&mut manifest, &args);
    let family = manifest.metadata.family_name.clone();

    let base_dir = args
        .request
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let request = manifest.load(&base_dir)?;
    let options = PipelineOptions {
        jobs: args.jobs,
        units_per_em: args.units_per_em,
        ensure_space: args.add_space,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let font = match synthesize(&request, &options) {
        Ok(font) => font,
        Err(err) => {
            let report = BuildReport::failure(family, &err);
            emit_report(&report, args.report.as_deref(), &mut handle)?;
            return Err(anyhow::Error::new(err)
                .context(format!("building {}", args.request.display())));
        }
    };

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let path = args.out_dir.join(font.file_name());
    fs::write(&path, &font.bytes).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote {} ({} bytes)", path.display(), font.bytes.len());
    for warning in &font.warnings {
        warn!("{}", warning.message);
    }

    let report = font.report().with_file(path.display().to_string());
    emit_report(&report, args.report.as_deref(), &mut handle)
}

fn apply_overrides(manifest: &mut RequestManifest, args: &BuildArgs) {
    if let Some(format) = args.format {
        manifest.format = format.into();
    }
    if let Some(family) = &args.family {
        manifest.metadata.family_name = family.clone();
    }
}

fn emit_report(report: &BuildReport, file: Option<&Path>, w: impl Write) -> Result<()> {
    if let Some(file) = file {
        let out = fs::File::create(file).with_context(|| format!("creating {}", file.display()))?;
        write_json_pretty(report, out)?;
    }
    write_json_pretty(report, w)
}

fn run_charmap(args: CharmapArgs) -> Result<()> {
    let manifest = charmap_manifest(&args)?;
    info!(
        "mapped {} images from {}",
        manifest.character_mappings.len(),
        args.dir.display()
    );

    match &args.output {
        Some(path) => {
            let out = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
            write_json_pretty(&manifest, out)
        }
        None => write_json_pretty(&manifest, io::stdout().lock()),
    }
}

/// One mapping per image; the file stem names the character and the whole
/// image is its region.
///
/// Image paths are stored relative to the directory the request will live
/// in (the output file's parent, or `dir` for stdout) and absolute when the
/// image sits outside it.
fn charmap_manifest(args: &CharmapArgs) -> Result<RequestManifest> {
    let base = match &args.output {
        Some(out) => out.parent().map(Path::to_path_buf).unwrap_or_default(),
        None => args.dir.clone(),
    };

    let mut manifest = RequestManifest {
        metadata: FontMetadata::new(args.family.clone()),
        format: args.format.into(),
        ..RequestManifest::default()
    };

    let mut images: Vec<PathBuf> = WalkDir::new(&args.dir)
        .follow_links(args.follow_symlinks)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_image(e.path()))
        .map(|e| e.into_path())
        .collect();
    images.sort();

    let mut seen = BTreeSet::new();
    for path in images {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("non UTF-8 file name: {}", path.display()))?;
        let glyph = match parse_glyph_id(stem) {
            Ok(glyph) => glyph,
            Err(err) => {
                warn!("skipping {}: {err}", path.display());
                continue;
            }
        };
        if !seen.insert(glyph.clone()) {
            warn!("skipping {}: {glyph} is already mapped", path.display());
            continue;
        }
        let image = SourceImage::open(&path)?;
        let id = path
            .strip_prefix(&args.dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        debug!("{glyph} <- {id} ({}x{})", image.width(), image.height());

        manifest
            .source_images
            .insert(id.clone(), request_relative(&path, &base)?);
        manifest.character_mappings.push(CharacterMapping::new(
            glyph,
            id,
            Rect::new(0, 0, i64::from(image.width()), i64::from(image.height())),
        ));
    }

    if manifest.character_mappings.is_empty() {
        return Err(anyhow!("no character images found in {}", args.dir.display()));
    }
    Ok(manifest)
}

fn request_relative(image: &Path, base: &Path) -> Result<PathBuf> {
    if let Ok(rel) = image.strip_prefix(base) {
        return Ok(rel.to_path_buf());
    }
    fs::canonicalize(image).with_context(|| format!("resolving {}", image.display()))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Serialize)]
struct InspectedFont {
    path: PathBuf,
    checksums_ok: bool,
    #[serde(flatten)]
    summary: FontSummary,
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let fonts = args
        .fonts
        .iter()
        .map(|path| {
            let summary = inspect_path(path)?;
            Ok(InspectedFont {
                path: path.clone(),
                checksums_ok: summary.checksums_ok(),
                summary,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if args.ndjson {
        write_ndjson(&fonts, &mut handle)?;
    } else if args.json {
        write_json_pretty(&fonts, &mut handle)?;
    } else {
        write_plain(&fonts, &mut handle)?;
    }
    Ok(())
}

fn write_plain(fonts: &[InspectedFont], mut w: impl Write) -> Result<()> {
    for font in fonts {
        let s = &font.summary;
        writeln!(
            w,
            "{}  {} glyphs  upm {}  checksums {}",
            font.path.display(),
            s.num_glyphs,
            s.units_per_em,
            if font.checksums_ok { "ok" } else { "BAD" }
        )?;
        let tags: Vec<&str> = s.tables.iter().map(|t| t.tag.as_str()).collect();
        writeln!(w, "  tables: {}", tags.join(" "))?;
        if let Some(name) = s.names.first() {
            writeln!(w, "  name:   {name}")?;
        }
        let text: String = s.codepoints.iter().filter(|c| !c.is_control()).collect();
        writeln!(w, "  chars:  {text}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
