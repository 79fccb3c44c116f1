//! Highlight mapping: stored element rects onto a displayed reference image.
//!
//! Rects are captured in the pixel space of the original page screenshot.
//! The reference image is shown either stretched into its box (absolute page
//! frame, scroll offset included) or aspect-fit inside a container
//! ("contain", letterboxed and centered). [`map_highlight`] converts a rect
//! into whichever frame the image uses.
//!
//! Elements carrying an ad class are never highlighted, even with a rect.

pub mod timer;

use serde::{Deserialize, Serialize};

use crate::config::schema::FitMode;
use crate::detect::FlagDetector;
use crate::model::{InteractionElement, Rect};

pub use timer::HighlightTimer;

/// How the reference image is currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    /// Intrinsic image size in pixels.
    pub natural_width: f64,
    pub natural_height: f64,
    /// Rendered image size (stretch) or container size (contain).
    pub box_width: f64,
    pub box_height: f64,
    /// Page position of the image box; only used in the stretch frame.
    #[serde(default)]
    pub origin_x: f64,
    #[serde(default)]
    pub origin_y: f64,
    /// Page scroll offset; only used in the stretch frame.
    #[serde(default)]
    pub scroll_x: f64,
    #[serde(default)]
    pub scroll_y: f64,
    #[serde(default)]
    pub fit: FitMode,
}

impl ImageGeometry {
    /// An image displayed at `box` size with no page offset.
    pub fn new(natural: (f64, f64), display_box: (f64, f64), fit: FitMode) -> Self {
        Self {
            natural_width: natural.0,
            natural_height: natural.1,
            box_width: display_box.0,
            box_height: display_box.1,
            origin_x: 0.0,
            origin_y: 0.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            fit,
        }
    }

    /// Per-axis scale and top-left offset of the drawn image, or `None` when
    /// the natural size is degenerate or any display measure is not finite.
    fn transform(&self) -> Option<(f64, f64, f64, f64)> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(self.natural_width) || !valid(self.natural_height) {
            return None;
        }
        let sized = |v: f64| v.is_finite() && v >= 0.0;
        if !sized(self.box_width) || !sized(self.box_height) {
            return None;
        }
        let offsets = [self.origin_x, self.origin_y, self.scroll_x, self.scroll_y];
        if !offsets.iter().all(|v| v.is_finite()) {
            return None;
        }

        match self.fit {
            FitMode::Stretch => Some((
                self.box_width / self.natural_width,
                self.box_height / self.natural_height,
                self.origin_x + self.scroll_x,
                self.origin_y + self.scroll_y,
            )),
            FitMode::Contain => {
                let scale = (self.box_width / self.natural_width)
                    .min(self.box_height / self.natural_height);
                Some((
                    scale,
                    scale,
                    (self.box_width - self.natural_width * scale) / 2.0,
                    (self.box_height - self.natural_height * scale) / 2.0,
                ))
            }
        }
    }
}

/// Highlight box in display coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightRect {
    pub dom_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Project a source-space rect into the display frame of `geometry`.
pub fn project_rect(rect: &Rect, geometry: &ImageGeometry) -> Option<(f64, f64, f64, f64)> {
    let (sx, sy, ox, oy) = geometry.transform()?;
    let (x, y, w, h) = (
        ox + rect.x * sx,
        oy + rect.y * sy,
        rect.width * sx,
        rect.height * sy,
    );
    [x, y, w, h].iter().all(|v| v.is_finite()).then_some((x, y, w, h))
}

/// Locate `dom_id`'s first element with a rect and map it onto the image.
///
/// Returns `None` when no element with that `domID` has a rect, when the
/// matched element carries an ad class, or when the image has no usable
/// natural size.
pub fn map_highlight(
    dom_id: &str,
    elements: &[InteractionElement],
    geometry: &ImageGeometry,
    detector: &FlagDetector,
) -> Option<HighlightRect> {
    let element = elements
        .iter()
        .find(|e| e.dom_id() == dom_id && e.rect.is_some())?;

    if detector.is_ad_class(element) {
        return None;
    }

    let rect = element.rect.as_ref()?;
    let (x, y, width, height) = project_rect(rect, geometry)?;

    Some(HighlightRect {
        dom_id: dom_id.to_string(),
        x,
        y,
        width,
        height,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn with_rect(dom_id: &str, rect: Rect) -> InteractionElement {
        InteractionElement {
            dom_id_raw: dom_id.to_string(),
            rect: Some(rect),
            ..Default::default()
        }
    }

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect {
            x,
            y,
            width: w,
            height: h,
        }
    }

    #[test]
    fn stretch_scales_each_axis_and_adds_page_offset() {
        let mut geometry = ImageGeometry::new((1000.0, 2000.0), (500.0, 500.0), FitMode::Stretch);
        geometry.origin_x = 20.0;
        geometry.origin_y = 100.0;
        geometry.scroll_y = 50.0;

        let elements = vec![with_rect("hero", rect(100.0, 400.0, 200.0, 80.0))];
        let h = map_highlight("hero", &elements, &geometry, &FlagDetector::builtin()).unwrap();
        assert_eq!(h.x, 20.0 + 50.0);
        assert_eq!(h.y, 150.0 + 100.0);
        assert_eq!(h.width, 100.0);
        assert_eq!(h.height, 20.0);
    }

    #[test]
    fn contain_letterboxes_and_centers() {
        // 1000x500 image in an 800x800 container: scale 0.8, vertical bars of 200
        let geometry = ImageGeometry::new((1000.0, 500.0), (800.0, 800.0), FitMode::Contain);
        let elements = vec![with_rect("cta", rect(500.0, 250.0, 100.0, 50.0))];
        let h = map_highlight("cta", &elements, &geometry, &FlagDetector::builtin()).unwrap();
        assert!((h.x - 400.0).abs() < 1e-9);
        assert!((h.y - (200.0 + 200.0)).abs() < 1e-9);
        assert!((h.width - 80.0).abs() < 1e-9);
        assert!((h.height - 40.0).abs() < 1e-9);
    }

    #[test]
    fn skips_elements_without_rect() {
        let mut no_rect = with_rect("a", rect(0.0, 0.0, 1.0, 1.0));
        no_rect.rect = None;
        let elements = vec![no_rect, with_rect("a", rect(10.0, 10.0, 5.0, 5.0))];
        let geometry = ImageGeometry::new((100.0, 100.0), (100.0, 100.0), FitMode::Stretch);
        let h = map_highlight("a", &elements, &geometry, &FlagDetector::builtin()).unwrap();
        assert_eq!(h.x, 10.0);
    }

    #[test]
    fn unknown_dom_id_is_no_highlight() {
        let elements = vec![with_rect("a", rect(0.0, 0.0, 1.0, 1.0))];
        let geometry = ImageGeometry::new((100.0, 100.0), (100.0, 100.0), FitMode::Stretch);
        assert!(map_highlight("b", &elements, &geometry, &FlagDetector::builtin()).is_none());
    }

    #[test]
    fn zero_natural_size_is_no_highlight() {
        let elements = vec![with_rect("a", rect(0.0, 0.0, 1.0, 1.0))];
        let geometry = ImageGeometry::new((0.0, 100.0), (100.0, 100.0), FitMode::Contain);
        assert!(map_highlight("a", &elements, &geometry, &FlagDetector::builtin()).is_none());
    }

    #[test]
    fn non_finite_display_box_is_no_highlight() {
        let elements = vec![with_rect("a", rect(10.0, 10.0, 5.0, 5.0))];
        let detector = FlagDetector::builtin();
        for display in [(f64::NAN, 100.0), (100.0, f64::INFINITY), (-1.0, 100.0)] {
            for fit in [FitMode::Stretch, FitMode::Contain] {
                let geometry = ImageGeometry::new((100.0, 100.0), display, fit);
                assert!(map_highlight("a", &elements, &geometry, &detector).is_none());
            }
        }

        let mut geometry = ImageGeometry::new((100.0, 100.0), (100.0, 100.0), FitMode::Stretch);
        geometry.scroll_y = f64::NAN;
        assert!(map_highlight("a", &elements, &geometry, &detector).is_none());
    }
}
