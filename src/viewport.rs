use egui::{Pos2, Rect, Vec2};

/// One zoom button click multiplies (or divides) the scale by this ratio.
pub const ZOOM_STEP: f32 = 1.1;

const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 10.0;

/// The pannable/zoomable coordinate space the image and all annotations
/// live in. Annotations are stored in image coordinates; this maps them
/// to and from screen space.
#[derive(Clone, Debug)]
pub struct Viewport {
    pub pan: Vec2,
    pub zoom: f32,
    fit_scale: f32,
    image_size: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            fit_scale: 1.0,
            image_size: Vec2::ZERO,
        }
    }
}

impl Viewport {
    /// Fit the image to the view: `scale = min(vw/iw, vh/ih)`, image centered.
    pub fn fit(&mut self, image_size: Vec2, view_size: Vec2) {
        self.image_size = image_size;
        if image_size.x > 0.0 && image_size.y > 0.0 {
            self.fit_scale = (view_size.x / image_size.x).min(view_size.y / image_size.y);
        } else {
            self.fit_scale = 1.0;
        }
        self.pan = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Effective image-to-screen scale factor.
    pub fn scale(&self) -> f32 {
        self.fit_scale * self.zoom
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    pub fn image_to_screen(&self, canvas_rect: Rect, img_pos: Pos2) -> Pos2 {
        let center = canvas_rect.center();
        center + self.pan + (img_pos.to_vec2() - self.image_size * 0.5) * self.scale()
    }

    pub fn screen_to_image(&self, canvas_rect: Rect, screen_pos: Pos2) -> Pos2 {
        let center = canvas_rect.center();
        let rel = screen_pos - center - self.pan;
        let scale = self.scale();
        Pos2::new(
            rel.x / scale + self.image_size.x * 0.5,
            rel.y / scale + self.image_size.y * 0.5,
        )
    }

    pub fn image_rect_on_screen(&self, canvas_rect: Rect) -> Rect {
        let top_left = self.image_to_screen(canvas_rect, Pos2::ZERO);
        let bot_right =
            self.image_to_screen(canvas_rect, Pos2::new(self.image_size.x, self.image_size.y));
        Rect::from_min_max(top_left, bot_right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Rect {
        Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0))
    }

    #[test]
    fn fit_scale_is_min_of_axis_ratios() {
        let mut vp = Viewport::default();
        vp.fit(Vec2::new(1600.0, 600.0), Vec2::new(800.0, 600.0));
        assert_eq!(vp.scale(), 0.5);

        vp.fit(Vec2::new(400.0, 1200.0), Vec2::new(800.0, 600.0));
        assert_eq!(vp.scale(), 0.5);
    }

    #[test]
    fn screen_image_round_trip() {
        let mut vp = Viewport::default();
        vp.fit(Vec2::new(1000.0, 500.0), Vec2::new(800.0, 600.0));
        vp.pan_by(Vec2::new(13.0, -27.0));
        vp.zoom_in();

        let img = Pos2::new(123.0, 456.0);
        let screen = vp.image_to_screen(canvas(), img);
        let back = vp.screen_to_image(canvas(), screen);
        assert!((back - img).length() < 1e-3);
    }

    #[test]
    fn zoom_buttons_step_by_fixed_ratio() {
        let mut vp = Viewport::default();
        vp.fit(Vec2::new(800.0, 600.0), Vec2::new(800.0, 600.0));
        let base = vp.scale();
        vp.zoom_in();
        assert!((vp.scale() - base * ZOOM_STEP).abs() < 1e-6);
        vp.zoom_out();
        assert!((vp.scale() - base).abs() < 1e-6);
    }

    #[test]
    fn fitted_image_is_centered() {
        let mut vp = Viewport::default();
        vp.fit(Vec2::new(400.0, 300.0), Vec2::new(800.0, 600.0));
        let on_screen = vp.image_rect_on_screen(canvas());
        assert_eq!(on_screen.center(), canvas().center());
    }
}
