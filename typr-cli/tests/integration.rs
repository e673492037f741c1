use std::fs;
use std::path::Path;
use std::process::Command;

use image::{GrayImage, Luma};
use read_fonts::{FontRef, TableProvider};
use serde_json::Value;
use tempfile::tempdir;

fn write_letter(path: &Path) {
    GrayImage::from_fn(60, 80, |x, y| {
        let ink = (10..50).contains(&x) && (10..70).contains(&y);
        Luma([if ink { 0 } else { 255 }])
    })
    .save(path)
    .expect("save png");
}

fn typr(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_typr"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run typr")
}

#[test]
fn charmap_then_build_then_inspect() {
    let tmp = tempdir().expect("tempdir");
    let letters = tmp.path().join("letters");
    fs::create_dir_all(&letters).expect("mkdir");
    write_letter(&letters.join("A.png"));
    write_letter(&letters.join("U+0042.png"));

    let request = tmp.path().join("request.json");
    let output = typr(&[
        "charmap",
        letters.to_str().unwrap(),
        "--family",
        "Scanned",
        "-o",
        request.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let out_dir = tmp.path().join("out");
    let report_path = tmp.path().join("report.json");
    let output = typr(&[
        "build",
        request.to_str().unwrap(),
        "-o",
        out_dir.to_str().unwrap(),
        "--jobs",
        "1",
        "--report",
        report_path.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("report json");
    assert_eq!(report["success"], true);
    assert_eq!(report["metadata"]["glyph_count"], 2);
    assert_eq!(report["metadata"]["warnings"].as_array().unwrap().len(), 0);

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("read report")).expect("json");
    assert_eq!(saved, report);

    let font_path = out_dir.join("Scanned-Regular.ttf");
    let bytes = fs::read(&font_path).expect("font written");
    let font = FontRef::new(&bytes).expect("parse font");
    assert_eq!(font.maxp().expect("maxp").num_glyphs(), 3);

    let output = typr(&["inspect", "--json", font_path.to_str().unwrap()]);
    assert!(output.status.success());
    let parsed: Value = serde_json::from_slice(&output.stdout).expect("inspect json");
    let first = &parsed.as_array().expect("array")[0];
    assert_eq!(first["checksums_ok"], true);
    assert_eq!(first["codepoints"], serde_json::json!(["A", "B"]));
}

#[test]
fn failed_build_reports_error_and_exits_nonzero() {
    let tmp = tempdir().expect("tempdir");
    write_letter(&tmp.path().join("sheet.png"));
    let request = tmp.path().join("request.json");
    fs::write(
        &request,
        r#"{
            "source_images": {"sheet": "sheet.png"},
            "character_mappings": [
                {"char": "A", "image": "sheet", "rect": {"x1": 0, "y1": 0, "x2": 60, "y2": 80}},
                {"char": "A", "image": "sheet", "rect": {"x1": 0, "y1": 0, "x2": 30, "y2": 40}}
            ],
            "metadata": {"family_name": "Dup"}
        }"#,
    )
    .expect("write request");

    let output = typr(&["build", request.to_str().unwrap(), "-o", tmp.path().to_str().unwrap()]);
    assert!(!output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("report json");
    assert_eq!(report["success"], false);
    assert!(report["error"].as_str().unwrap().contains("duplicate"));
    assert!(!tmp.path().join("Dup-Regular.ttf").exists());
}

#[test]
fn format_flag_overrides_request() {
    let tmp = tempdir().expect("tempdir");
    write_letter(&tmp.path().join("sheet.png"));
    let request = tmp.path().join("request.json");
    fs::write(
        &request,
        r#"{
            "source_images": {"sheet": "sheet.png"},
            "character_mappings": [
                {"char": "A", "image": "sheet", "rect": {"x1": 0, "y1": 0, "x2": 60, "y2": 80}}
            ],
            "metadata": {"family_name": "Flip", "subfamily": "Bold"},
            "format": "ttf"
        }"#,
    )
    .expect("write request");

    let output = typr(&[
        "build",
        request.to_str().unwrap(),
        "-o",
        tmp.path().to_str().unwrap(),
        "--format",
        "otf",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let bytes = fs::read(tmp.path().join("Flip-Bold.otf")).expect("otf written");
    assert_eq!(&bytes[..4], b"OTTO");
}
