use std::collections::HashSet;

use egui::Pos2;

use crate::annotation::{AnnotationId, CategoryColors, RectAnnotation};
use crate::viewport::Viewport;

/// The exclusive interaction mode. Exactly one is active; pointer events
/// are dispatched by matching on the current value, so a previously active
/// tool has no lingering handlers to misfire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToolMode {
    #[default]
    None,
    Pan,
    Draw,
    Select,
}

#[derive(Clone, Copy, Debug)]
enum DragState {
    Idle,
    Drawing { id: AnnotationId, anchor: Pos2 },
}

/// All mutable editor state for one image: active tool, annotations,
/// selection set, viewport, and the in-progress drag. Owning it in one
/// struct keeps sessions independently constructible.
pub struct EditorSession {
    pub tool: ToolMode,
    pub annotations: Vec<RectAnnotation>,
    pub selection: HashSet<AnnotationId>,
    pub colors: CategoryColors,
    pub category: String,
    pub viewport: Viewport,
    drag: DragState,
    next_id: AnnotationId,
}

impl EditorSession {
    pub fn new(colors: CategoryColors) -> Self {
        let category = colors
            .categories()
            .next()
            .unwrap_or("door")
            .to_string();
        Self {
            tool: ToolMode::None,
            annotations: Vec::new(),
            selection: HashSet::new(),
            colors,
            category,
            viewport: Viewport::default(),
            drag: DragState::Idle,
            next_id: 1,
        }
    }

    /// Switch tools. Any in-progress draw is finalized as-is.
    pub fn set_tool(&mut self, tool: ToolMode) {
        if self.tool != tool {
            self.tool = tool;
            self.drag = DragState::Idle;
        }
    }

    /// Pointer-down in Draw mode: add a zero-size rectangle (and its label)
    /// at `pos`, colored for the current category, and start tracking it.
    pub fn begin_rect(&mut self, pos: Pos2) -> Option<AnnotationId> {
        if self.tool != ToolMode::Draw {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        let color = self.colors.color_for(&self.category);
        self.annotations
            .push(RectAnnotation::new(id, pos, self.category.clone(), color));
        self.drag = DragState::Drawing { id, anchor: pos };
        Some(id)
    }

    /// Pointer-move while drawing: resize the tracked rectangle so its
    /// top-left stays at the componentwise minimum of anchor and cursor.
    pub fn update_rect(&mut self, cursor: Pos2) {
        let DragState::Drawing { id, anchor } = self.drag else {
            return;
        };
        if self.tool != ToolMode::Draw {
            return;
        }
        if let Some(ann) = self.annotations.iter_mut().find(|a| a.id == id) {
            ann.set_corners(anchor, cursor);
        }
    }

    /// Pointer-up (inside or outside the canvas): stop tracking.
    pub fn finish_rect(&mut self) {
        self.drag = DragState::Idle;
    }

    pub fn drawing_in_progress(&self) -> bool {
        matches!(self.drag, DragState::Drawing { .. })
    }

    /// Pointer-down in Select mode: toggle the topmost rectangle under the
    /// cursor in or out of the selection set. Returns the toggled id, if any.
    pub fn toggle_select_at(&mut self, pos: Pos2) -> Option<AnnotationId> {
        if self.tool != ToolMode::Select {
            return None;
        }
        let id = self
            .annotations
            .iter()
            .rev()
            .find(|a| a.contains(pos))
            .map(|a| a.id)?;
        if !self.selection.remove(&id) {
            self.selection.insert(id);
        }
        Some(id)
    }

    pub fn is_selected(&self, id: AnnotationId) -> bool {
        self.selection.contains(&id)
    }

    /// Remove every selected rectangle (labels go with them) and empty the
    /// selection set. Irreversible.
    pub fn delete_selected(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        let before = self.annotations.len();
        self.annotations.retain(|a| !self.selection.contains(&a.id));
        log::info!(
            "deleted {} selected rectangle(s)",
            before - self.annotations.len()
        );
        self.selection.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Color32;

    fn draw_session() -> EditorSession {
        let mut session = EditorSession::new(CategoryColors::default());
        session.set_tool(ToolMode::Draw);
        session
    }

    fn drag(session: &mut EditorSession, from: Pos2, to: Pos2) -> AnnotationId {
        let id = session.begin_rect(from).expect("draw mode active");
        session.update_rect(to);
        session.finish_rect();
        id
    }

    #[test]
    fn reverse_drag_yields_normalized_red_door_rect() {
        let mut session = draw_session();
        session.category = "door".to_string();
        drag(&mut session, Pos2::new(50.0, 50.0), Pos2::new(10.0, 10.0));

        let ann = &session.annotations[0];
        assert_eq!(ann.rect.min, Pos2::new(10.0, 10.0));
        assert_eq!(ann.rect.width(), 40.0);
        assert_eq!(ann.rect.height(), 40.0);
        assert_eq!(ann.color, Color32::from_rgb(0xFF, 0x00, 0x00));
        assert_eq!(ann.category, "door");
        assert_eq!(ann.label_pos(), Pos2::new(10.0, -10.0));
    }

    #[test]
    fn all_drag_quadrants_normalize() {
        let start = Pos2::new(50.0, 50.0);
        for end in [
            Pos2::new(90.0, 90.0),
            Pos2::new(10.0, 90.0),
            Pos2::new(90.0, 10.0),
            Pos2::new(10.0, 10.0),
        ] {
            let mut session = draw_session();
            drag(&mut session, start, end);
            let ann = &session.annotations[0];
            assert!(ann.rect.width() >= 0.0 && ann.rect.height() >= 0.0);
            assert_eq!(ann.rect.min.x, start.x.min(end.x));
            assert_eq!(ann.rect.min.y, start.y.min(end.y));
        }
    }

    #[test]
    fn begin_rect_requires_draw_mode() {
        let mut session = EditorSession::new(CategoryColors::default());
        session.set_tool(ToolMode::Pan);
        assert!(session.begin_rect(Pos2::new(5.0, 5.0)).is_none());
        assert!(session.annotations.is_empty());
    }

    #[test]
    fn finalize_stops_resizing() {
        let mut session = draw_session();
        let id = session.begin_rect(Pos2::new(0.0, 0.0)).unwrap();
        session.update_rect(Pos2::new(30.0, 30.0));
        session.finish_rect();
        session.update_rect(Pos2::new(300.0, 300.0));

        let ann = session.annotations.iter().find(|a| a.id == id).unwrap();
        assert_eq!(ann.rect.max, Pos2::new(30.0, 30.0));
    }

    #[test]
    fn toggling_selection_twice_restores_category_color() {
        let mut session = draw_session();
        let id = drag(&mut session, Pos2::new(0.0, 0.0), Pos2::new(20.0, 20.0));
        session.set_tool(ToolMode::Select);

        let inside = Pos2::new(10.0, 10.0);
        assert_eq!(session.toggle_select_at(inside), Some(id));
        assert!(session.is_selected(id));
        let ann = &session.annotations[0];
        assert_eq!(ann.outline_color(session.is_selected(id)), crate::annotation::SELECTED_OUTLINE);

        assert_eq!(session.toggle_select_at(inside), Some(id));
        assert!(!session.is_selected(id));
        let ann = &session.annotations[0];
        assert_eq!(ann.outline_color(session.is_selected(id)), ann.color);
    }

    #[test]
    fn select_requires_select_mode_and_a_hit() {
        let mut session = draw_session();
        drag(&mut session, Pos2::new(0.0, 0.0), Pos2::new(20.0, 20.0));

        // Still in Draw mode: pointer-down on the rect must not toggle.
        assert!(session.toggle_select_at(Pos2::new(10.0, 10.0)).is_none());

        session.set_tool(ToolMode::Select);
        assert!(session.toggle_select_at(Pos2::new(500.0, 500.0)).is_none());
        assert!(session.selection.is_empty());
    }

    #[test]
    fn overlapping_hit_picks_topmost() {
        let mut session = draw_session();
        let bottom = drag(&mut session, Pos2::new(0.0, 0.0), Pos2::new(40.0, 40.0));
        let top = drag(&mut session, Pos2::new(10.0, 10.0), Pos2::new(30.0, 30.0));
        session.set_tool(ToolMode::Select);

        assert_eq!(session.toggle_select_at(Pos2::new(20.0, 20.0)), Some(top));
        assert!(!session.is_selected(bottom));
    }

    #[test]
    fn deleting_selection_removes_exactly_those_rectangles() {
        let mut session = draw_session();
        let keep = drag(&mut session, Pos2::new(0.0, 0.0), Pos2::new(20.0, 20.0));
        let doomed = drag(&mut session, Pos2::new(50.0, 50.0), Pos2::new(80.0, 80.0));

        session.set_tool(ToolMode::Select);
        session.toggle_select_at(Pos2::new(60.0, 60.0));
        assert!(session.is_selected(doomed));

        session.delete_selected();
        assert_eq!(session.annotations.len(), 1);
        assert_eq!(session.annotations[0].id, keep);
        assert!(session.selection.is_empty());
    }

    #[test]
    fn switching_tools_drops_in_progress_drag() {
        let mut session = draw_session();
        session.begin_rect(Pos2::new(0.0, 0.0));
        assert!(session.drawing_in_progress());
        session.set_tool(ToolMode::Pan);
        assert!(!session.drawing_in_progress());
    }
}
