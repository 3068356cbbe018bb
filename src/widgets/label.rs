//! A read-only text widget.

use figures::units::UPx;
use figures::{Point, Size, Zero};

use crate::context::{GraphicsContext, LayoutContext};
use crate::styles::{Color, Component, TEXT_COLOR};
use crate::value::{IntoValue, Value};
use crate::widget::Widget;
use crate::ConstraintLimit;

/// A widget that displays a piece of text.
#[derive(Debug)]
pub struct Label {
    /// The contents of the label.
    pub text: Value<String>,
}

impl Label {
    /// Returns a label that displays `text`.
    pub fn new(text: impl IntoValue<String>) -> Self {
        Self {
            text: text.into_value(),
        }
    }
}

impl Widget for Label {
    fn redraw(&mut self, context: &mut GraphicsContext<'_>) {
        let text = self.text.get_tracking_redraw(context);
        let color = context
            .query_style(TEXT_COLOR)
            .and_then(Component::color)
            .unwrap_or(Color::BLACK);
        context.gfx.draw_text(&text, color, Point::ZERO);
    }

    fn layout(
        &mut self,
        _available_space: Size<ConstraintLimit>,
        context: &mut LayoutContext<'_>,
    ) -> Size<UPx> {
        self.text.map(|text| context.gfx.measure_text(text))
    }
}

#[cfg(test)]
mod tests {
    use figures::units::Px;
    use figures::{IntoSigned, Rect};

    use super::*;
    use crate::graphics::Graphics;
    use crate::tree::Tree;
    use crate::value::{Destination, Dynamic};

    #[test]
    fn draws_contents() {
        let tree = Tree::new();
        let mounted = tree.mount(Label::new("hi"), None);
        let mut gfx = Graphics::new(Size::new(UPx::new(100), UPx::new(100)));
        mounted.redraw(&mut gfx);
        assert_eq!(gfx.drawn_text().collect::<Vec<_>>(), vec!["hi"]);
    }

    #[test]
    fn dynamic_text_invalidates() {
        let text = Dynamic::new(String::from("before"));
        let tree = Tree::new();
        let mounted = tree.mount(Label::new(&text), None);
        let mut gfx = Graphics::new(Size::new(UPx::new(100), UPx::new(100)));
        mounted.redraw(&mut gfx);
        assert!(!mounted.invalidated());

        text.set(String::from("after"));
        assert!(mounted.invalidated());
        gfx.reset();
        mounted.redraw(&mut gfx);
        assert_eq!(gfx.drawn_text().collect::<Vec<_>>(), vec!["after"]);
    }

    #[test]
    fn layout_measures_text() {
        let tree = Tree::new();
        let mounted = tree.mount(Label::new("abc"), None);
        let mut gfx = Graphics::new(Size::new(UPx::new(100), UPx::new(100)));
        let size = mounted.layout(
            Size::new(
                ConstraintLimit::SizeToFit(UPx::new(100)),
                ConstraintLimit::SizeToFit(UPx::new(100)),
            ),
            &mut gfx,
        );
        assert_eq!(size, gfx.measure_text("abc"));
        assert_eq!(
            mounted.last_layout(),
            Some(Rect::new(
                Point::new(Px::ZERO, Px::ZERO),
                size.into_signed()
            ))
        );
    }
}
