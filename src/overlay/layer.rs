use std::marker::PhantomData;
use std::rc::Rc;

use serde::Serialize;

use crate::geometry::PixelRect;

use super::StrokeStyle;

/// One outlined rectangle on the overlay.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverlayElement {
    pub rect: PixelRect,
    pub label: Option<String>,
    pub confidence: Option<f32>,
    pub style: StrokeStyle,
}

impl OverlayElement {
    pub fn outline(rect: PixelRect, style: StrokeStyle) -> Self {
        Self {
            rect,
            label: None,
            confidence: None,
            style,
        }
    }
}

/// Overlay layer owned by the display.
///
/// Not `Send`: it can only be touched from the thread that created it.
#[derive(Debug, Default)]
pub struct OverlayLayer {
    elements: Vec<OverlayElement>,
    generation: u64,
    _display_thread: PhantomData<Rc<()>>,
}

impl OverlayLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the layer contents with one outline per rectangle.
    pub fn render(&mut self, rects: &[PixelRect], style: StrokeStyle) -> &[OverlayElement] {
        let elements = rects
            .iter()
            .map(|rect| OverlayElement::outline(*rect, style))
            .collect();
        self.replace(elements)
    }

    /// Swap in a new element set in one step.
    pub fn replace(&mut self, elements: Vec<OverlayElement>) -> &[OverlayElement] {
        self.elements = elements;
        self.generation += 1;
        &self.elements
    }

    pub fn clear(&mut self) {
        if !self.elements.is_empty() {
            self.elements.clear();
            self.generation += 1;
        }
    }

    pub fn elements(&self) -> &[OverlayElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Bumped on every content change.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
