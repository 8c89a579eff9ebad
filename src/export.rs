use std::io::Cursor;
use std::thread;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde::Serialize;

use crate::annotation::RectAnnotation;

/// Which wire format the pipeline ships. One pipeline, explicit switch —
/// not two copy-pasted variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportMode {
    /// One multipart/form-data POST per rectangle, PNG bytes as a file field.
    Files,
    /// One application/json POST carrying every rectangle base64-encoded.
    #[default]
    Json,
}

impl ExportMode {
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "files" => Some(Self::Files),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// One record of the JSON-batch payload.
#[derive(Clone, Debug, Serialize)]
pub struct ExportRecord {
    pub file: String,
    #[serde(rename = "dateTime")]
    pub date_time: String,
    pub category: String,
    #[serde(rename = "imageBase64")]
    pub image_base64: String,
}

/// A cropped, PNG-encoded region ready to ship.
pub struct ExportItem {
    /// 1-based position in the scene's rectangle list, used for filenames.
    pub index: usize,
    pub category: String,
    pub png: Vec<u8>,
}

/// Snapshot of everything to export, captured atomically when the user
/// clicks Export. Deleting rectangles afterwards cannot affect it.
pub struct ExportPlan {
    pub items: Vec<ExportItem>,
    pub total: usize,
    pub processed: usize,
}

/// Crop every non-degenerate rectangle's region out of the source image.
/// Zero-size rectangles and crops with no pixels inside the image are
/// skipped but still counted, so completion accounting reaches the total.
pub fn build_plan(image: &DynamicImage, annotations: &[RectAnnotation]) -> ExportPlan {
    let total = annotations.len();
    let mut processed = 0;
    let mut items = Vec::new();

    for (idx, ann) in annotations.iter().enumerate() {
        let index = idx + 1;
        processed += 1;
        if ann.is_degenerate() {
            log::info!("skipped rectangle {index} due to zero dimensions");
            continue;
        }
        let Some(crop) = crop_region(image, ann.rect) else {
            log::warn!("no pixels extracted for rectangle {index}");
            continue;
        };
        match encode_png(&crop) {
            Ok(png) => items.push(ExportItem {
                index,
                category: ann.category.clone(),
                png,
            }),
            Err(err) => log::error!("encoding rectangle {index} failed: {err:#}"),
        }
    }

    log::info!("finished processing all rectangles ({processed}/{total})");
    ExportPlan {
        items,
        total,
        processed,
    }
}

/// Intersect the rectangle with the image bounds; None when nothing is left.
fn crop_region(image: &DynamicImage, rect: egui::Rect) -> Option<DynamicImage> {
    let (img_w, img_h) = (image.width() as f32, image.height() as f32);
    let x0 = rect.min.x.max(0.0).min(img_w);
    let y0 = rect.min.y.max(0.0).min(img_h);
    let x1 = rect.max.x.max(0.0).min(img_w);
    let y1 = rect.max.y.max(0.0).min(img_h);

    let w = (x1 - x0).round() as u32;
    let h = (y1 - y0).round() as u32;
    if w == 0 || h == 0 {
        return None;
    }
    Some(image.crop_imm(x0.round() as u32, y0.round() as u32, w, h))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .context("encode PNG")?;
    Ok(buf)
}

/// Build the JSON-batch records for a plan. `file` carries the original
/// image source, matching what the server stores as `fromImage`.
pub fn json_records(plan: &ExportPlan, original: &str, date_time: &str) -> Vec<ExportRecord> {
    plan.items
        .iter()
        .map(|item| ExportRecord {
            file: original.to_string(),
            date_time: date_time.to_string(),
            category: item.category.clone(),
            image_base64: general_purpose::STANDARD.encode(&item.png),
        })
        .collect()
}

pub struct Exporter {
    endpoint: String,
    mode: ExportMode,
    client: reqwest::blocking::Client,
}

impl Exporter {
    pub fn new(endpoint: String, mode: ExportMode) -> Self {
        Self {
            endpoint,
            mode,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Ship a plan. Per-item failures are logged and the rest continues;
    /// nothing aborts and nothing is rolled back.
    pub fn run(&self, plan: &ExportPlan, original: &str, date_time: &str) {
        log::info!(
            "exporting {} rectangle(s) ({} processed of {} total)",
            plan.items.len(),
            plan.processed,
            plan.total
        );
        match self.mode {
            ExportMode::Files => {
                for item in &plan.items {
                    match self.upload_file(item, original, date_time) {
                        Ok(body) => {
                            log::debug!("server response for rectangle {}: {body}", item.index);
                        }
                        Err(err) => {
                            log::error!("failed to send rectangle {}: {err:#}", item.index);
                        }
                    }
                }
            }
            ExportMode::Json => {
                let records = json_records(plan, original, date_time);
                if records.is_empty() {
                    log::info!("no valid data to send");
                    return;
                }
                match self.post_batch(&records) {
                    Ok(body) => log::debug!("server response: {body}"),
                    Err(err) => log::error!("failed to send data: {err:#}"),
                }
            }
        }
    }

    fn upload_file(
        &self,
        item: &ExportItem,
        original: &str,
        date_time: &str,
    ) -> Result<serde_json::Value> {
        let part = reqwest::blocking::multipart::Part::bytes(item.png.clone())
            .file_name(format!("rectangle_{}.png", item.index))
            .mime_str("image/png")
            .context("build file part")?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("dateTime", date_time.to_string())
            .text("category", item.category.clone())
            .text("originalImagePath", original.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .context("POST multipart")?;
        decode_response(response)
    }

    fn post_batch(&self, records: &[ExportRecord]) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(records)
            .send()
            .context("POST json batch")?;
        decode_response(response)
    }
}

fn decode_response(response: reqwest::blocking::Response) -> Result<serde_json::Value> {
    let status = response.status();
    let body: serde_json::Value = response.json().context("decode server response")?;
    if !status.is_success() {
        bail!("server returned {status}: {body}");
    }
    Ok(body)
}

/// Run an export off the UI thread. The plan was snapshotted by the caller,
/// so the session is free to change while this runs.
pub fn spawn(
    exporter: Exporter,
    plan: ExportPlan,
    original: String,
    date_time: String,
) -> thread::JoinHandle<()> {
    thread::spawn(move || exporter.run(&plan, &original, &date_time))
}
