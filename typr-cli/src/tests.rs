use super::*;
use clap::CommandFactory;
use image::{GrayImage, Luma};
use std::io::Cursor;
use tempfile::tempdir;
use typr_core::glyph_id::GlyphId;
use typr_core::verify::TableSummary;

fn write_glyph_png(path: &Path, w: u32, h: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    GrayImage::from_fn(w, h, |x, y| {
        let inside = x > w / 4 && x < 3 * w / 4 && y > h / 4 && y < 3 * h / 4;
        Luma([if inside { 0 } else { 255 }])
    })
    .save(path)
    .expect("save png");
}

fn charmap_args(dir: &Path, output: Option<PathBuf>) -> CharmapArgs {
    CharmapArgs {
        dir: dir.to_path_buf(),
        family: "Scan".into(),
        format: FormatArg::Otf,
        output,
        follow_symlinks: false,
    }
}

#[test]
fn parses_build_args_with_overrides() {
    let cli = Cli::try_parse_from([
        "typr",
        "build",
        "hand/request.json",
        "--format",
        "otf",
        "--family",
        "Other",
        "--jobs",
        "3",
        "--units-per-em",
        "2048",
        "--add-space",
    ])
    .expect("parse cli");

    let Command::Build(args) = cli.command else {
        panic!("expected build");
    };
    assert_eq!(args.request, PathBuf::from("hand/request.json"));
    assert_eq!(args.jobs, Some(3));
    assert_eq!(args.units_per_em, 2048);
    assert!(args.add_space);

    let mut manifest = RequestManifest::default();
    manifest.metadata.family_name = "Hand".into();
    apply_overrides(&mut manifest, &args);
    assert_eq!(manifest.format, OutputFormat::Otf);
    assert_eq!(manifest.metadata.family_name, "Other");
}

#[test]
fn build_defaults_leave_request_alone() {
    let cli = Cli::try_parse_from(["typr", "build", "request.json"]).expect("parse cli");
    let Command::Build(args) = cli.command else {
        panic!("expected build");
    };
    assert_eq!(args.out_dir, PathBuf::from("."));
    assert_eq!(args.units_per_em, 1000);

    let mut manifest = RequestManifest::default();
    manifest.metadata.family_name = "Hand".into();
    manifest.format = OutputFormat::Otf;
    apply_overrides(&mut manifest, &args);
    assert_eq!(manifest.format, OutputFormat::Otf);
    assert_eq!(manifest.metadata.family_name, "Hand");
}

#[test]
fn charmap_maps_file_stems_to_glyphs() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("letters");
    write_glyph_png(&dir.join("A.png"), 40, 50);
    write_glyph_png(&dir.join("U+0042.png"), 30, 50);
    write_glyph_png(&dir.join("extra").join("a.alt.png"), 20, 20);
    write_glyph_png(&dir.join("not valid!.png"), 10, 10);
    fs::write(dir.join("notes.txt"), "ignored").expect("write notes");

    let manifest = charmap_manifest(&charmap_args(&dir, None)).expect("manifest");

    let glyphs: Vec<&GlyphId> = manifest
        .character_mappings
        .iter()
        .map(|m| &m.glyph)
        .collect();
    assert_eq!(
        glyphs,
        vec![
            &GlyphId::Char('A'),
            &GlyphId::Char('B'),
            &GlyphId::Named("a.alt".into())
        ]
    );
    assert_eq!(manifest.format, OutputFormat::Otf);
    assert_eq!(manifest.metadata.family_name, "Scan");

    let a = &manifest.character_mappings[0];
    assert_eq!(a.rect, Rect::new(0, 0, 40, 50));
    assert_eq!(a.image, "A.png");
    assert_eq!(manifest.source_images["A.png"], PathBuf::from("A.png"));
    assert_eq!(
        manifest.source_images["extra/a.alt.png"],
        PathBuf::from("extra").join("a.alt.png")
    );
}

#[test]
fn charmap_paths_follow_the_output_location() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("letters");
    write_glyph_png(&dir.join("A.png"), 20, 20);

    let output = tmp.path().join("request.json");
    let manifest = charmap_manifest(&charmap_args(&dir, Some(output))).expect("manifest");

    assert_eq!(
        manifest.source_images["A.png"],
        PathBuf::from("letters").join("A.png")
    );
}

#[test]
fn charmap_skips_duplicate_characters() {
    let tmp = tempdir().expect("tempdir");
    write_glyph_png(&tmp.path().join("A.png"), 20, 20);
    write_glyph_png(&tmp.path().join("U+0041.png"), 20, 20);

    let manifest = charmap_manifest(&charmap_args(tmp.path(), None)).expect("manifest");
    assert_eq!(manifest.character_mappings.len(), 1);
    assert_eq!(manifest.character_mappings[0].image, "A.png");
    assert_eq!(manifest.source_images.len(), 1);
}

#[test]
fn charmap_without_images_is_an_error() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("readme.md"), "nothing here").expect("write");
    assert!(charmap_manifest(&charmap_args(tmp.path(), None)).is_err());
}

#[test]
fn writes_plain_summary_lines() {
    let fonts = vec![InspectedFont {
        path: PathBuf::from("out/Scan-Regular.ttf"),
        checksums_ok: true,
        summary: FontSummary {
            tables: vec![TableSummary {
                tag: "head".into(),
                offset: 12,
                length: 54,
                stored_checksum: 1,
                computed_checksum: 1,
            }],
            names: vec!["Scan".into()],
            codepoints: vec!['A', 'B'],
            num_glyphs: 3,
            units_per_em: 1000,
            checksum_adjustment: 0,
            file_checksum_ok: true,
        },
    }];

    let mut buf = Cursor::new(Vec::new());
    write_plain(&fonts, &mut buf).expect("write");

    let output = String::from_utf8(buf.into_inner()).expect("utf8");
    assert!(output.contains("out/Scan-Regular.ttf  3 glyphs  upm 1000  checksums ok"));
    assert!(output.contains("tables: head"));
    assert!(output.contains("chars:  AB"));
}

#[test]
fn inspect_json_and_ndjson_conflict() {
    let parse = Cli::try_parse_from(["typr", "inspect", "--json", "--ndjson", "a.ttf"]);
    assert!(parse.is_err());
}

#[test]
fn help_output_lists_build_flags() {
    let mut root = Cli::command();
    let build = root
        .find_subcommand_mut("build")
        .expect("build command present");
    let help = build.render_long_help().to_string();
    assert!(help.contains("--units-per-em"));
    assert!(help.contains("--add-space"));
    assert!(help.contains("TYPR_JOBS"));
}
