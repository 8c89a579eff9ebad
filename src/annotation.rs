use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use egui::{Color32, Pos2, Rect};

pub type AnnotationId = u64;

/// Outline thickness of a rectangle, in image units.
pub const OUTLINE_WIDTH: f32 = 2.0;
/// Vertical gap between a rectangle's top-left corner and its label.
pub const LABEL_OFFSET: f32 = 20.0;
pub const LABEL_FONT_SIZE: f32 = 14.0;
/// Outline color while a rectangle sits in the selection set.
pub const SELECTED_OUTLINE: Color32 = Color32::from_rgb(255, 255, 0);

const FILL_ALPHA: u8 = 77; // 30% opaque interior

/// A user-drawn bounding box in image coordinates, together with its
/// category label. The label has no separate lifetime: it is rendered
/// from this struct and disappears with it.
#[derive(Clone, Debug)]
pub struct RectAnnotation {
    pub id: AnnotationId,
    pub rect: Rect,
    pub category: String,
    pub color: Color32,
}

impl RectAnnotation {
    /// A zero-size rectangle anchored at `start`; grows via [`Self::set_corners`].
    pub fn new(id: AnnotationId, start: Pos2, category: String, color: Color32) -> Self {
        Self {
            id,
            rect: Rect::from_min_max(start, start),
            category,
            color,
        }
    }

    /// Recompute the bounds from the drag anchor and the current cursor so
    /// width/height stay non-negative whichever direction the user drags.
    pub fn set_corners(&mut self, anchor: Pos2, cursor: Pos2) {
        self.rect = Rect::from_two_pos(anchor, cursor);
    }

    /// Where the category label is pinned: directly above the top-left corner.
    pub fn label_pos(&self) -> Pos2 {
        Pos2::new(self.rect.min.x, self.rect.min.y - LABEL_OFFSET)
    }

    pub fn is_degenerate(&self) -> bool {
        self.rect.width() == 0.0 || self.rect.height() == 0.0
    }

    pub fn contains(&self, pos: Pos2) -> bool {
        self.rect.contains(pos)
    }

    /// Selection overrides the category color with a fixed highlight.
    pub fn outline_color(&self, selected: bool) -> Color32 {
        if selected {
            SELECTED_OUTLINE
        } else {
            self.color
        }
    }

    pub fn fill_color(&self) -> Color32 {
        Color32::from_rgba_unmultiplied(self.color.r(), self.color.g(), self.color.b(), FILL_ALPHA)
    }
}

/// Category → display color table. Seeded with the built-in categories and
/// extendable from a JSON file, so new categories need no code change.
#[derive(Clone, Debug)]
pub struct CategoryColors {
    table: BTreeMap<String, Color32>,
    fallback: Color32,
}

impl Default for CategoryColors {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert("door".to_string(), Color32::from_rgb(0xFF, 0x00, 0x00));
        table.insert("double_door".to_string(), Color32::from_rgb(0x00, 0x00, 0xFF));
        Self {
            table,
            fallback: Color32::from_rgb(0x00, 0xFF, 0x00),
        }
    }
}

impl CategoryColors {
    pub fn color_for(&self, category: &str) -> Color32 {
        self.table.get(category).copied().unwrap_or(self.fallback)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    pub fn insert(&mut self, category: String, color: Color32) {
        self.table.insert(category, color);
    }

    /// Merge `{"category": "#RRGGBB"}` entries from a JSON file over the
    /// built-in table. Existing categories are overridden.
    pub fn merge_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read category table {}", path.display()))?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("parse category table {}", path.display()))?;
        for (category, hex) in entries {
            let color = parse_hex_color(&hex)
                .with_context(|| format!("category '{category}' in {}", path.display()))?;
            self.insert(category, color);
        }
        Ok(())
    }
}

fn parse_hex_color(hex: &str) -> anyhow::Result<Color32> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        bail!("expected #RRGGBB, got '{hex}'");
    }
    let value = u32::from_str_radix(digits, 16).with_context(|| format!("bad hex '{hex}'"))?;
    Ok(Color32::from_rgb(
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
    ))
}
