//! A headless drawing surface.
//!
//! Instead of rasterizing, drawing records a list of [`DrawCommand`]s that
//! tests and embedders can inspect. Text metrics use a fixed glyph advance,
//! since no font stack is loaded.

use figures::units::{Px, UPx};
use figures::{Point, Size};

use crate::styles::Color;

/// The horizontal advance of every glyph, in pixels.
pub const GLYPH_ADVANCE: u32 = 8;

/// The height of a line of text, in pixels.
pub const LINE_HEIGHT: u32 = 16;

/// A recording drawing surface.
#[derive(Debug)]
pub struct Graphics {
    size: Size<UPx>,
    commands: Vec<DrawCommand>,
}

impl Graphics {
    /// Returns a new surface of `size` with no recorded commands.
    #[must_use]
    pub fn new(size: Size<UPx>) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    /// The size of the drawable region.
    #[must_use]
    pub fn size(&self) -> Size<UPx> {
        self.size
    }

    /// Fills the surface with `color`.
    pub fn fill(&mut self, color: Color) {
        self.commands.push(DrawCommand::Fill { color });
    }

    /// Draws `text` with its top-left at `origin`.
    pub fn draw_text(&mut self, text: &str, color: Color, origin: Point<Px>) {
        self.commands.push(DrawCommand::Text {
            text: text.to_owned(),
            color,
            origin,
        });
    }

    /// Measures `text` using the fixed glyph metrics.
    #[must_use]
    pub fn measure_text(&self, text: &str) -> Size<UPx> {
        let glyphs = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        Size::new(
            UPx::new(glyphs.saturating_mul(GLYPH_ADVANCE)),
            UPx::new(LINE_HEIGHT),
        )
    }

    /// The commands recorded since creation or the last [`reset`](Self::reset).
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Returns each string drawn, in draw order.
    pub fn drawn_text(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            DrawCommand::Fill { .. } => None,
        })
    }

    /// Discards all recorded commands, beginning a new frame.
    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

/// A single recorded drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// The surface was filled with a color.
    Fill {
        /// The fill color.
        color: Color,
    },
    /// A string was drawn.
    Text {
        /// The drawn string.
        text: String,
        /// The text color.
        color: Color,
        /// The top-left of the rendered text.
        origin: Point<Px>,
    },
}

#[cfg(test)]
mod tests {
    use figures::Zero;

    use super::*;

    #[test]
    fn measurement_uses_fixed_metrics() {
        let gfx = Graphics::new(Size::new(UPx::new(100), UPx::new(100)));
        let size = gfx.measure_text("Hello");
        assert_eq!(size.width, UPx::new(5 * GLYPH_ADVANCE));
        assert_eq!(size.height, UPx::new(LINE_HEIGHT));
        assert_eq!(gfx.measure_text("").width, UPx::ZERO);
    }

    #[test]
    fn commands_record_in_order() {
        let mut gfx = Graphics::new(Size::new(UPx::new(10), UPx::new(10)));
        gfx.fill(Color::WHITE);
        gfx.draw_text("hi", Color::BLACK, Point::new(Px::new(1), Px::new(2)));
        assert_eq!(gfx.commands().len(), 2);
        assert_eq!(gfx.drawn_text().collect::<Vec<_>>(), vec!["hi"]);
        gfx.reset();
        assert!(gfx.commands().is_empty());
    }
}
