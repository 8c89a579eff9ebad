use eframe::egui;
use image::DynamicImage;

use crate::annotation::{CategoryColors, LABEL_FONT_SIZE, OUTLINE_WIDTH};
use crate::export::{self, ExportMode, Exporter};
use crate::session::{EditorSession, ToolMode};

pub struct AnnotateApp {
    session: EditorSession,
    /// Path or URL the image came from; forwarded to the server as
    /// `originalImagePath` / `file`.
    original: Option<String>,
    raw_image: Option<DynamicImage>,
    texture: Option<egui::TextureHandle>,
    endpoint: String,
    export_mode: ExportMode,
    fitted: bool,
}

impl AnnotateApp {
    pub fn new(
        image: Option<(String, DynamicImage)>,
        colors: CategoryColors,
        endpoint: String,
        export_mode: ExportMode,
    ) -> Self {
        let (original, raw_image) = match image {
            Some((source, img)) => (Some(source), Some(img)),
            None => (None, None),
        };
        Self {
            session: EditorSession::new(colors),
            original,
            raw_image,
            texture: None,
            endpoint,
            export_mode,
            fitted: false,
        }
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        if let Some(ref img) = self.raw_image {
            let rgba = img.to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = rgba.as_flat_samples();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            self.texture = Some(ctx.load_texture("image", color_image, egui::TextureOptions::LINEAR));
        }
    }

    fn image_size(&self) -> Option<egui::Vec2> {
        self.raw_image
            .as_ref()
            .map(|img| egui::vec2(img.width() as f32, img.height() as f32))
    }

    fn start_export(&self) {
        let Some(ref img) = self.raw_image else {
            log::error!("no image loaded; nothing to export");
            return;
        };
        // Snapshot at click time: later deletions cannot touch this plan.
        let plan = export::build_plan(img, &self.session.annotations);
        let exporter = Exporter::new(self.endpoint.clone(), self.export_mode);
        let original = self.original.clone().unwrap_or_else(|| "unknown".to_string());
        let date_time = chrono::Utc::now().to_rfc3339();
        // Detached; the outcome is logged from the worker thread.
        let _ = export::spawn(exporter, plan, original, date_time);
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for (mode, label) in [
                (ToolMode::Pan, "Pan"),
                (ToolMode::Draw, "Rect"),
                (ToolMode::Select, "Select"),
            ] {
                if ui.selectable_label(self.session.tool == mode, label).clicked() {
                    self.session.set_tool(mode);
                }
            }
            ui.separator();

            if ui.button("Zoom +").clicked() {
                self.session.viewport.zoom_in();
            }
            if ui.button("Zoom −").clicked() {
                self.session.viewport.zoom_out();
            }
            ui.separator();

            ui.label("Category:");
            let categories: Vec<String> = self
                .session
                .colors
                .categories()
                .map(str::to_string)
                .collect();
            egui::ComboBox::from_id_salt("category")
                .selected_text(self.session.category.clone())
                .show_ui(ui, |ui| {
                    for cat in categories {
                        ui.selectable_value(&mut self.session.category, cat.clone(), cat);
                    }
                });
            ui.separator();

            if ui.button("Delete Selected").clicked() {
                self.session.delete_selected();
            }
            ui.separator();

            egui::ComboBox::from_id_salt("export_mode")
                .selected_text(match self.export_mode {
                    ExportMode::Files => "File upload",
                    ExportMode::Json => "JSON batch",
                })
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.export_mode, ExportMode::Json, "JSON batch");
                    ui.selectable_value(&mut self.export_mode, ExportMode::Files, "File upload");
                });
            if ui.button("Export").clicked() {
                self.start_export();
            }
            ui.separator();

            ui.label(format!("Zoom: {:.0}%", self.session.viewport.zoom * 100.0));
        });
    }

    fn draw_scene(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        let vp = &self.session.viewport;
        if let Some(ref tex) = self.texture {
            painter.image(
                tex.id(),
                vp.image_rect_on_screen(canvas_rect),
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        } else {
            painter.text(
                canvas_rect.center(),
                egui::Align2::CENTER_CENTER,
                "No image loaded",
                egui::FontId::proportional(18.0),
                egui::Color32::from_gray(140),
            );
        }

        let scale = vp.scale();
        for ann in &self.session.annotations {
            let rect = egui::Rect::from_min_max(
                vp.image_to_screen(canvas_rect, ann.rect.min),
                vp.image_to_screen(canvas_rect, ann.rect.max),
            );
            painter.rect_filled(rect, 0.0, ann.fill_color());
            painter.rect_stroke(
                rect,
                0.0,
                egui::Stroke::new(
                    OUTLINE_WIDTH * scale,
                    ann.outline_color(self.session.is_selected(ann.id)),
                ),
                egui::StrokeKind::Middle,
            );
            painter.text(
                vp.image_to_screen(canvas_rect, ann.label_pos()),
                egui::Align2::LEFT_TOP,
                &ann.category,
                egui::FontId::proportional(LABEL_FONT_SIZE * scale),
                ann.color,
            );
        }
    }

    fn handle_pointer(
        &mut self,
        ctx: &egui::Context,
        response: &egui::Response,
        canvas_rect: egui::Rect,
    ) {
        // Annotation tools stay inert without an image.
        if self.raw_image.is_none() {
            return;
        }
        let vp_pos = |session: &EditorSession, pos: egui::Pos2| {
            session.viewport.screen_to_image(canvas_rect, pos)
        };

        if response.drag_started_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                match self.session.tool {
                    ToolMode::Draw => {
                        let img_pos = vp_pos(&self.session, pos);
                        self.session.begin_rect(img_pos);
                    }
                    ToolMode::Select => {
                        let img_pos = vp_pos(&self.session, pos);
                        self.session.toggle_select_at(img_pos);
                    }
                    ToolMode::Pan | ToolMode::None => {}
                }
            }
        }

        if response.dragged_by(egui::PointerButton::Primary) {
            match self.session.tool {
                ToolMode::Pan => {
                    let delta = response.drag_delta();
                    self.session.viewport.pan_by(delta);
                }
                ToolMode::Draw if self.session.drawing_in_progress() => {
                    if let Some(pos) = response
                        .hover_pos()
                        .or(ctx.input(|i| i.pointer.latest_pos()))
                    {
                        let img_pos = vp_pos(&self.session, pos);
                        self.session.update_rect(img_pos);
                    }
                }
                ToolMode::Draw => {}
                ToolMode::Select | ToolMode::None => {}
            }
        }

        // Pointer-up, inside or outside the canvas.
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            self.session.finish_rect();
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                match self.session.tool {
                    ToolMode::Draw => {
                        // A plain click leaves a zero-size rectangle behind,
                        // which export later skips.
                        let img_pos = vp_pos(&self.session, pos);
                        self.session.begin_rect(img_pos);
                        self.session.finish_rect();
                    }
                    ToolMode::Select => {
                        let img_pos = vp_pos(&self.session, pos);
                        self.session.toggle_select_at(img_pos);
                    }
                    ToolMode::Pan | ToolMode::None => {}
                }
            }
        }
    }
}

impl eframe::App for AnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_texture(ctx);

        ctx.input(|i| {
            if i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace) {
                self.session.delete_selected();
            }
        });

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;

            if !self.fitted {
                if let Some(size) = self.image_size() {
                    self.session.viewport.fit(size, canvas_rect.size());
                }
                self.fitted = true;
            }

            self.draw_scene(&painter, canvas_rect);
            self.handle_pointer(ctx, &response, canvas_rect);
        });
    }
}
