mod annotation;
mod app;
mod export;
mod session;
mod viewport;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use eframe::egui;
use image::DynamicImage;

use crate::annotation::CategoryColors;
use crate::export::ExportMode;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/data/store";

const USAGE: &str =
    "Usage: annotate-export [IMAGE] [--endpoint URL] [--mode files|json] [--categories FILE]";

struct Args {
    image: Option<String>,
    endpoint: String,
    mode: ExportMode,
    categories: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        image: None,
        endpoint: DEFAULT_ENDPOINT.to_string(),
        mode: ExportMode::default(),
        categories: None,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--endpoint" => {
                args.endpoint = it.next().context("--endpoint needs a URL")?;
            }
            "--mode" => {
                let value = it.next().context("--mode needs 'files' or 'json'")?;
                args.mode = ExportMode::from_arg(&value)
                    .with_context(|| format!("unknown export mode '{value}'"))?;
            }
            "--categories" => {
                let value = it.next().context("--categories needs a file path")?;
                args.categories = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                eprintln!("{USAGE}");
                std::process::exit(0);
            }
            other if args.image.is_none() && !other.starts_with('-') => {
                args.image = Some(other.to_string());
            }
            other => bail!("unexpected argument '{other}'"),
        }
    }
    Ok(args)
}

/// Decode the image from a local path, or fetch-then-decode for http(s) URLs.
fn load_image(source: &str) -> Result<DynamicImage> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let bytes = reqwest::blocking::get(source)
            .and_then(reqwest::blocking::Response::error_for_status)
            .with_context(|| format!("fetch {source}"))?
            .bytes()
            .context("read image body")?;
        image::load_from_memory(&bytes).with_context(|| format!("decode {source}"))
    } else {
        image::open(source).with_context(|| format!("open {source}"))
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err:#}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    let mut colors = CategoryColors::default();
    if let Some(ref path) = args.categories {
        if let Err(err) = colors.merge_file(path) {
            log::warn!("ignoring category table: {err:#}");
        }
    }

    let source = args.image.or_else(|| {
        rfd::FileDialog::new()
            .add_filter("images", &["png", "jpg", "jpeg", "bmp", "gif"])
            .pick_file()
            .map(|p| p.to_string_lossy().into_owned())
    });

    // Missing or broken image is not fatal: the editor opens with the
    // annotation tools inert.
    let image = match source {
        Some(source) => match load_image(&source) {
            Ok(img) => Some((source, img)),
            Err(err) => {
                log::error!("failed to load image: {err:#}");
                None
            }
        },
        None => {
            log::error!("no valid image provided; annotation tools are disabled");
            None
        }
    };

    let title = match image.as_ref() {
        Some((source, _)) => format!("annotate-export — {source}"),
        None => "annotate-export".to_string(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    let app = app::AnnotateApp::new(image, colors, args.endpoint, args.mode);
    if let Err(err) = eframe::run_native(&title, options, Box::new(move |_cc| Ok(Box::new(app)))) {
        log::error!("eframe exited with error: {err}");
        std::process::exit(1);
    }
}
