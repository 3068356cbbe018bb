//! A button that toggles its caption between a fixed text and a press count.

use figures::units::{Px, UPx};
use figures::{IntoSigned, IntoUnsigned, Point, Rect, Size, Zero};

use crate::context::{EventContext, GraphicsContext, LayoutContext};
use crate::notifications::Notification;
use crate::styles::{Color, Component, Styles, TEXT_COLOR, WIDGET_BACKGROUND};
use crate::value::{Destination, Dynamic, IntoDynamic, IntoValue, Source, Value};
use crate::widget::{
    Accessibility, Callback, EventHandling, MakeWidget, MouseButton, Widget, WidgetRef, HANDLED,
    IGNORED,
};
use crate::ConstraintLimit;

/// A button that alternates between showing a fixed caption and the number of
/// times it has been pressed.
///
/// Each press inverts [`pressed`](Self::pressed). Entering the pressed state
/// increments the press counter and shows it as the caption; leaving the
/// pressed state restores the fixed caption. Every press also emits a
/// [`NOTIFICATION`](Self::NOTIFICATION) notification that bubbles to ancestor
/// listeners.
#[derive(Debug)]
pub struct ToggleButton {
    text: Value<String>,
    display: Dynamic<String>,
    pressed: Dynamic<bool>,
    counter: Dynamic<u64>,
    disabled: Dynamic<bool>,
    background: Color,
    icon_left: Option<WidgetRef>,
    icon_right: Option<WidgetRef>,
    on_press: Option<Callback>,
    buttons_pressed: usize,
}

impl ToggleButton {
    /// The name of the notification emitted on every press.
    pub const NOTIFICATION: &'static str = "toggle-press";

    /// The payload carried by every emitted notification.
    pub const NOTIFICATION_DETAIL: &'static str = "data from toggle-button";

    const ROLE: &'static str = "button";
    const LABEL: &'static str = "Test";

    /// Returns a button that shows `text` until it is pressed.
    pub fn new(text: impl IntoValue<String>) -> Self {
        let text = text.into_value();
        let display = Dynamic::new(text.get());
        Self {
            text,
            display,
            pressed: Dynamic::default(),
            counter: Dynamic::default(),
            disabled: Dynamic::default(),
            background: Color::CLEAR,
            icon_left: None,
            icon_right: None,
            on_press: None,
            buttons_pressed: 0,
        }
    }

    /// Sets the background color from a CSS-style color string.
    ///
    /// Unrecognized colors leave the background transparent.
    #[must_use]
    pub fn background_color(mut self, color: &str) -> Self {
        self.background = match Color::parse(color) {
            Ok(color) => color,
            Err(_) => {
                tracing::debug!(color, "unrecognized background color");
                Color::CLEAR
            }
        };
        self
    }

    /// Places `icon` before the caption.
    #[must_use]
    pub fn icon_left(mut self, icon: impl MakeWidget) -> Self {
        self.icon_left = Some(icon.widget_ref());
        self
    }

    /// Places `icon` after the caption.
    #[must_use]
    pub fn icon_right(mut self, icon: impl MakeWidget) -> Self {
        self.icon_right = Some(icon.widget_ref());
        self
    }

    /// Sets the value backing the disabled flag.
    ///
    /// The flag is observable state only. A disabled button still responds to
    /// presses.
    #[must_use]
    pub fn disabled(mut self, disabled: impl IntoDynamic<bool>) -> Self {
        self.disabled = disabled.into_dynamic();
        self
    }

    /// Invokes `on_press` each time this button is pressed.
    #[must_use]
    pub fn on_press<F>(mut self, mut on_press: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_press = Some(Callback::new(move |()| on_press()));
        self
    }

    /// The caption currently shown by the button.
    #[must_use]
    pub fn caption(&self) -> &Dynamic<String> {
        &self.display
    }

    /// Whether the button is currently in its pressed state.
    #[must_use]
    pub fn pressed(&self) -> &Dynamic<bool> {
        &self.pressed
    }

    /// The total number of times the button has entered the pressed state.
    #[must_use]
    pub fn counter(&self) -> &Dynamic<u64> {
        &self.counter
    }

    /// Returns the current value of the disabled flag.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.get()
    }

    /// Updates the disabled flag.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.set(disabled);
    }

    fn press(&mut self, context: &mut EventContext<'_>) {
        let pressed = self.pressed.toggle();
        if pressed {
            let count = self.counter.map_mut(|mut count| {
                *count += 1;
                *count
            });
            self.display.set(count.to_string());
        } else {
            self.display.set(self.text.get());
        }
        context.emit(Notification::new(
            Self::NOTIFICATION,
            Self::NOTIFICATION_DETAIL,
        ));
        if let Some(on_press) = &mut self.on_press {
            on_press.invoke(());
        }
    }
}

impl Widget for ToggleButton {
    fn mounted(&mut self, context: &mut EventContext<'_>) {
        if self.background != Color::CLEAR {
            context.attach_styles(
                Styles::new().with(WIDGET_BACKGROUND, Component::Color(self.background)),
            );
        }
    }

    fn unmounted(&mut self, context: &mut EventContext<'_>) {
        if let Some(icon) = &mut self.icon_left {
            icon.unmount(context);
        }
        if let Some(icon) = &mut self.icon_right {
            icon.unmount(context);
        }
    }

    fn redraw(&mut self, context: &mut GraphicsContext<'_>) {
        let background = context
            .query_style(WIDGET_BACKGROUND)
            .and_then(Component::color)
            .unwrap_or(Color::CLEAR);
        if background.alpha > 0 {
            context.gfx.fill(background);
        }

        let padding = context.intrinsic_padding();
        let mut caption_x = padding;
        if let Some(icon) = &mut self.icon_left {
            let mounted = icon.mounted(&mut context.as_event_context());
            context.for_other(&mounted).redraw();
            if let Some(layout) = mounted.last_layout() {
                caption_x = layout.origin.x + layout.size.width + padding;
            }
        }
        if let Some(icon) = &mut self.icon_right {
            let mounted = icon.mounted(&mut context.as_event_context());
            context.for_other(&mounted).redraw();
        }

        let caption = self.display.get_tracking_redraw(context);
        let disabled = self.disabled.get_tracking_redraw(context);
        let color = if disabled {
            Color::new(128, 128, 128, 255)
        } else {
            context
                .query_style(TEXT_COLOR)
                .and_then(Component::color)
                .unwrap_or(Color::BLACK)
        };
        context
            .gfx
            .draw_text(&caption, color, Point::new(caption_x, padding));
    }

    fn layout(
        &mut self,
        available_space: Size<ConstraintLimit>,
        context: &mut LayoutContext<'_>,
    ) -> Size<UPx> {
        let padding = context.intrinsic_padding().into_unsigned();
        let child_constraints = Size::new(
            ConstraintLimit::SizeToFit(available_space.width.max()),
            ConstraintLimit::SizeToFit(available_space.height.max()),
        );

        let mut cursor = padding;
        let mut content_height = UPx::ZERO;

        if let Some(icon) = &mut self.icon_left {
            let mounted = icon.mounted(&mut context.as_event_context());
            let size = context.for_other(&mounted).layout(child_constraints);
            context.set_child_layout(
                &mounted,
                Rect::new(
                    Point::new(cursor.into_signed(), padding.into_signed()),
                    size.into_signed(),
                ),
            );
            cursor += size.width + padding;
            content_height = content_height.max(size.height);
        }

        let caption_size = self.display.map_ref(|caption| context.gfx.measure_text(caption));
        cursor += caption_size.width + padding;
        content_height = content_height.max(caption_size.height);

        if let Some(icon) = &mut self.icon_right {
            let mounted = icon.mounted(&mut context.as_event_context());
            let size = context.for_other(&mounted).layout(child_constraints);
            context.set_child_layout(
                &mounted,
                Rect::new(
                    Point::new(cursor.into_signed(), padding.into_signed()),
                    size.into_signed(),
                ),
            );
            cursor += size.width + padding;
            content_height = content_height.max(size.height);
        }

        Size::new(cursor, content_height + padding + padding)
    }

    fn hit_test(&mut self, _location: Point<Px>, _context: &mut EventContext<'_>) -> bool {
        true
    }

    fn mouse_down(
        &mut self,
        _location: Point<Px>,
        button: MouseButton,
        context: &mut EventContext<'_>,
    ) -> EventHandling {
        if button == MouseButton::Left {
            self.buttons_pressed += 1;
            context.activate();
            HANDLED
        } else {
            IGNORED
        }
    }

    fn mouse_up(
        &mut self,
        location: Option<Point<Px>>,
        button: MouseButton,
        context: &mut EventContext<'_>,
    ) {
        if button == MouseButton::Left {
            self.buttons_pressed = self.buttons_pressed.saturating_sub(1);
            if self.buttons_pressed == 0 {
                context.deactivate();
                let inside = location.is_some_and(|location| {
                    context.last_layout().map_or(true, |layout| {
                        Rect::new(Point::ZERO, layout.size).contains(location)
                    })
                });
                if inside {
                    context.focus();
                    self.press(context);
                }
            }
        }
    }

    fn activate(&mut self, context: &mut EventContext<'_>) {
        // A pointer press activates the widget while a button is still down;
        // only non-pointer activation fires a press from here.
        if self.buttons_pressed == 0 {
            self.press(context);
        }
    }

    fn accessibility(&self) -> Option<Accessibility> {
        Some(Accessibility::role(Self::ROLE).labelled(Self::LABEL))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::graphics::{DrawCommand, Graphics};
    use crate::tree::{MountedWidget, Tree};

    fn click(mounted: &MountedWidget) {
        mounted.simulate_click(Point::new(Px::new(1), Px::new(1)));
    }

    #[test]
    fn toggles_between_text_and_count() {
        let button = ToggleButton::new("Hello");
        let caption = button.caption().clone();
        let pressed = button.pressed().clone();
        let counter = button.counter().clone();

        let tree = Tree::new();
        let mounted = tree.mount(button, None);

        assert_eq!(caption.get(), "Hello");
        assert!(!pressed.get());

        click(&mounted);
        assert_eq!(caption.get(), "1");
        assert!(pressed.get());
        assert_eq!(counter.get(), 1);

        click(&mounted);
        assert_eq!(caption.get(), "Hello");
        assert!(!pressed.get());
        assert_eq!(counter.get(), 1);

        click(&mounted);
        assert_eq!(caption.get(), "2");
        assert!(pressed.get());
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn disabled_does_not_block_presses() {
        let disabled = Dynamic::new(true);
        let button = ToggleButton::new("Hello").disabled(&disabled);
        let caption = button.caption().clone();
        let counter = button.counter().clone();
        assert!(button.is_disabled());

        let tree = Tree::new();
        let mounted = tree.mount(button, None);

        click(&mounted);
        assert_eq!(caption.get(), "1");
        assert_eq!(counter.get(), 1);
        assert!(disabled.get());
    }

    #[test]
    fn disabled_flag_round_trips() {
        let button = ToggleButton::new("Hello");
        assert!(!button.is_disabled());
        button.set_disabled(true);
        assert!(button.is_disabled());
        button.set_disabled(false);
        assert!(!button.is_disabled());
    }

    #[test]
    fn each_press_emits_one_notification() {
        let button = ToggleButton::new("Hello");
        let tree = Tree::new();
        let mounted = tree.mount(button, None);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let _handle = mounted.on_notification(ToggleButton::NOTIFICATION, move |notification| {
            sink.lock().push(notification);
        });

        click(&mounted);
        click(&mounted);

        let received = received.lock();
        assert_eq!(received.len(), 2);
        for notification in received.iter() {
            assert_eq!(notification.name(), ToggleButton::NOTIFICATION);
            assert_eq!(notification.detail(), ToggleButton::NOTIFICATION_DETAIL);
        }
    }

    #[test]
    fn notifications_bubble_to_ancestors() {
        let tree = Tree::new();
        let root = tree.mount("container", None);
        let button = tree.mount(ToggleButton::new("Hello"), Some(&root));

        let received = Arc::new(AtomicUsize::new(0));
        let sink = received.clone();
        let _handle = root.on_notification(ToggleButton::NOTIFICATION, move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        });

        click(&button);
        assert_eq!(received.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn instances_are_independent() {
        let first = ToggleButton::new("Hello");
        let second = ToggleButton::new("World");
        let first_caption = first.caption().clone();
        let first_counter = first.counter().clone();
        let second_caption = second.caption().clone();
        let second_counter = second.counter().clone();

        let tree = Tree::new();
        let first = tree.mount(first, None);
        let second = tree.mount(second, None);

        click(&first);
        click(&first);
        click(&second);

        assert_eq!(first_caption.get(), "Hello");
        assert_eq!(first_counter.get(), 1);
        assert_eq!(second_caption.get(), "1");
        assert_eq!(second_counter.get(), 1);
    }

    #[test]
    fn activation_without_a_pointer_presses() {
        let presses = Arc::new(AtomicUsize::new(0));
        let observed = presses.clone();
        let button = ToggleButton::new("Hello").on_press(move || {
            observed.fetch_add(1, Ordering::Relaxed);
        });
        let caption = button.caption().clone();

        let tree = Tree::new();
        let mounted = tree.mount(button, None);

        mounted.simulate_activation();
        assert_eq!(caption.get(), "1");
        assert_eq!(presses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn background_is_applied_once_per_frame() {
        let tree = Tree::new();
        let mounted = tree.mount(ToggleButton::new("Hello").background_color("red"), None);
        let mut gfx = Graphics::new(Size::new(UPx::new(200), UPx::new(100)));
        mounted.redraw(&mut gfx);
        let fills = gfx
            .commands()
            .iter()
            .filter(|command| matches!(command, DrawCommand::Fill { .. }))
            .collect::<Vec<_>>();
        assert_eq!(
            fills,
            vec![&DrawCommand::Fill {
                color: Color::new(255, 0, 0, 255)
            }]
        );
    }

    #[test]
    fn unknown_background_color_is_ignored() {
        let tree = Tree::new();
        let mounted = tree.mount(
            ToggleButton::new("Hello").background_color("not-a-color"),
            None,
        );
        let mut gfx = Graphics::new(Size::new(UPx::new(200), UPx::new(100)));
        mounted.redraw(&mut gfx);
        assert!(gfx
            .commands()
            .iter()
            .all(|command| !matches!(command, DrawCommand::Fill { .. })));
    }

    #[test]
    fn reports_button_role() {
        let tree = Tree::new();
        let mounted = tree.mount(ToggleButton::new("Hello"), None);
        let accessibility = mounted.accessibility().expect("accessibility reported");
        assert_eq!(accessibility.role, "button");
        assert_eq!(accessibility.label.as_deref(), Some("Test"));
    }

    #[test]
    fn redraw_reflects_presses() {
        let tree = Tree::new();
        let mounted = tree.mount(ToggleButton::new("Hello"), None);
        let mut gfx = Graphics::new(Size::new(UPx::new(200), UPx::new(100)));
        mounted.redraw(&mut gfx);
        assert_eq!(gfx.drawn_text().collect::<Vec<_>>(), vec!["Hello"]);
        assert!(!mounted.invalidated());

        click(&mounted);
        assert!(mounted.invalidated());
        gfx.reset();
        mounted.redraw(&mut gfx);
        assert_eq!(gfx.drawn_text().collect::<Vec<_>>(), vec!["1"]);
    }

    #[test]
    fn icons_layout_around_caption() {
        let tree = Tree::new();
        let mounted = tree.mount(
            ToggleButton::new("Hi").icon_left("<").icon_right(">"),
            None,
        );
        let mut gfx = Graphics::new(Size::new(UPx::new(400), UPx::new(100)));
        let size = mounted.layout(
            Size::new(
                ConstraintLimit::SizeToFit(UPx::new(400)),
                ConstraintLimit::SizeToFit(UPx::new(100)),
            ),
            &mut gfx,
        );
        // Two icons, the caption, and four gaps of padding.
        let padding = UPx::new(6);
        let expected_width = gfx.measure_text("<").width
            + gfx.measure_text("Hi").width
            + gfx.measure_text(">").width
            + padding * 4;
        assert_eq!(size.width, expected_width);

        gfx.reset();
        mounted.redraw(&mut gfx);
        let drawn = gfx.drawn_text().collect::<Vec<_>>();
        assert!(drawn.contains(&"<"));
        assert!(drawn.contains(&">"));
        assert!(drawn.contains(&"Hi"));
    }

    #[test]
    fn release_outside_does_not_press() {
        let button = ToggleButton::new("Hello");
        let counter = button.counter().clone();
        let tree = Tree::new();
        let mounted = tree.mount(button, None);
        let mut gfx = Graphics::new(Size::new(UPx::new(400), UPx::new(100)));
        mounted.layout(
            Size::new(
                ConstraintLimit::SizeToFit(UPx::new(400)),
                ConstraintLimit::SizeToFit(UPx::new(100)),
            ),
            &mut gfx,
        );
        mounted.simulate_click(Point::new(Px::new(100_000), Px::new(1)));
        assert_eq!(counter.get(), 0);
    }
}
