//! Contexts for event handling, layout, and drawing.
//!
//! Contexts layer: [`LayoutContext`] derefs to [`GraphicsContext`], which
//! derefs to [`WidgetContext`]. [`EventContext`] also derefs to
//! [`WidgetContext`].
//!
//! State changes requested while a widget handles an event (activation,
//! focus, notifications) are queued and applied after the widget releases its
//! own lock, keeping event delivery strictly serialized.

use std::ops::{Deref, DerefMut};

use figures::units::{Px, UPx};
use figures::{IntoSigned, Point, Rect, Size, Zero};

use crate::graphics::Graphics;
use crate::notifications::Notification;
use crate::styles::{Component, Styles, DEFAULT_PADDING, INTRINSIC_PADDING};
use crate::tree::MountedWidget;
use crate::value::{CallbackDisconnected, Dynamic, Source};
use crate::widget::{MouseButton, Widget, WidgetInstance, HANDLED};
use crate::ConstraintLimit;

/// State available to a widget regardless of what kind of event is being
/// processed.
#[derive(Clone)]
pub struct WidgetContext {
    mounted: MountedWidget,
}

impl WidgetContext {
    pub(crate) fn new(mounted: MountedWidget) -> Self {
        Self { mounted }
    }

    /// The widget this context operates on.
    #[must_use]
    pub fn widget(&self) -> &MountedWidget {
        &self.mounted
    }

    /// Marks this context's widget as needing to be redrawn.
    pub fn set_needs_redraw(&self) {
        self.mounted.tree.invalidate(self.mounted.node);
    }

    /// Invalidates this context's widget whenever `dynamic` is updated.
    ///
    /// Re-registering the same dynamic replaces the previous registration, so
    /// calling this from `redraw` does not accumulate callbacks.
    pub fn redraw_when_changed<T>(&self, dynamic: &Dynamic<T>)
    where
        T: Send + 'static,
    {
        let tree = self.mounted.tree.clone();
        let node = self.mounted.node;
        let handle = dynamic.on_change_try(move || {
            if tree.invalidate(node) {
                Ok(())
            } else {
                Err(CallbackDisconnected)
            }
        });
        self.mounted
            .tree
            .retain_tracker(self.mounted.node, dynamic.as_ptr() as usize, handle);
    }

    /// Attaches `styles` to this widget's node, making them visible to the
    /// widget and its descendants.
    pub fn attach_styles(&self, styles: Styles) {
        self.mounted.tree.attach_styles(self.mounted.node, styles);
    }

    /// Queries the style component `name`, starting at this widget and
    /// falling back to each ancestor.
    #[must_use]
    pub fn query_style(&self, name: &'static str) -> Option<Component> {
        self.mounted.tree.query_style(self.mounted.node, name)
    }

    /// The padding to apply within this widget's content.
    #[must_use]
    pub fn intrinsic_padding(&self) -> Px {
        self.query_style(INTRINSIC_PADDING)
            .and_then(Component::dimension)
            .unwrap_or(DEFAULT_PADDING)
    }

    /// Returns true if this widget is the active widget.
    #[must_use]
    pub fn active(&self) -> bool {
        self.mounted.tree.is_active(self.mounted.node)
    }

    /// Returns true if this widget has input focus.
    #[must_use]
    pub fn focused(&self) -> bool {
        self.mounted.tree.is_focused(self.mounted.node)
    }

    /// The region this widget occupied in its most recent layout.
    #[must_use]
    pub fn last_layout(&self) -> Option<Rect<Px>> {
        self.mounted.last_layout()
    }
}

pub(crate) enum Pending {
    Activate(MountedWidget),
    Deactivate(MountedWidget),
    Focus(MountedWidget),
    Notify {
        from: MountedWidget,
        notification: Notification,
    },
}

enum PendingEvents<'a> {
    Owned(Vec<Pending>),
    Borrowed(&'a mut Vec<Pending>),
}

impl Deref for PendingEvents<'_> {
    type Target = Vec<Pending>;

    fn deref(&self) -> &Self::Target {
        match self {
            PendingEvents::Owned(queue) => queue,
            PendingEvents::Borrowed(queue) => queue,
        }
    }
}

impl DerefMut for PendingEvents<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            PendingEvents::Owned(queue) => queue,
            PendingEvents::Borrowed(queue) => queue,
        }
    }
}

/// A context for handling an input event.
pub struct EventContext<'context> {
    widget: WidgetContext,
    pending: PendingEvents<'context>,
}

impl EventContext<'_> {
    pub(crate) fn new(mounted: MountedWidget) -> EventContext<'static> {
        EventContext {
            widget: WidgetContext::new(mounted),
            pending: PendingEvents::Owned(Vec::new()),
        }
    }

    /// Makes this widget the active widget. Returns true if the active widget
    /// changed.
    pub fn activate(&mut self) -> bool {
        let changed = !self.widget.active();
        if changed {
            self.pending
                .push(Pending::Activate(self.widget.mounted.clone()));
        }
        changed
    }

    /// Deactivates this widget if it is the active widget. Returns true if
    /// the active widget changed.
    pub fn deactivate(&mut self) -> bool {
        let changed = self.widget.active();
        if changed {
            self.pending
                .push(Pending::Deactivate(self.widget.mounted.clone()));
        }
        changed
    }

    /// Gives this widget input focus.
    pub fn focus(&mut self) {
        self.pending.push(Pending::Focus(self.widget.mounted.clone()));
    }

    /// Emits `notification` from this widget.
    ///
    /// The notification is delivered to listeners on this widget and then on
    /// each ancestor, after the current event finishes.
    pub fn emit(&mut self, notification: Notification) {
        self.pending.push(Pending::Notify {
            from: self.widget.mounted.clone(),
            notification,
        });
    }

    /// Mounts `widget` as a child of this context's widget.
    pub fn push_child(&mut self, widget: WidgetInstance) -> MountedWidget {
        let tree = self.widget.mounted.tree.clone();
        tree.mount(widget, Some(&self.widget.mounted))
    }

    /// Unmounts `child` and its descendants.
    pub fn remove_child(&mut self, child: &MountedWidget) {
        child.remove();
    }
}

impl Deref for EventContext<'_> {
    type Target = WidgetContext;

    fn deref(&self) -> &Self::Target {
        &self.widget
    }
}

impl DerefMut for EventContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.widget
    }
}

impl Drop for EventContext<'_> {
    fn drop(&mut self) {
        if let PendingEvents::Owned(queue) = &mut self.pending {
            let mut queue = std::mem::take(queue);
            process_pending(&mut queue);
        }
    }
}

/// A context for drawing a widget.
pub struct GraphicsContext<'gfx> {
    widget: WidgetContext,
    /// The surface being drawn to.
    pub gfx: &'gfx mut Graphics,
    pending: PendingEvents<'gfx>,
}

impl<'gfx> GraphicsContext<'gfx> {
    /// Returns a context that draws `widget` onto the same surface.
    pub fn for_other<'child>(&'child mut self, widget: &MountedWidget) -> GraphicsContext<'child> {
        GraphicsContext {
            widget: WidgetContext::new(widget.clone()),
            gfx: &mut *self.gfx,
            pending: PendingEvents::Borrowed(&mut self.pending),
        }
    }

    /// Invokes this context's widget's
    /// [`redraw`](crate::widget::Widget::redraw).
    pub fn redraw(&mut self) {
        self.widget
            .mounted
            .tree
            .reset_needs_redraw(self.widget.mounted.node);
        let instance = self.widget.mounted.instance().clone();
        let mut widget = instance.lock();
        widget.redraw(self);
    }

    /// Returns an event context for this widget, allowing children to be
    /// mounted during a redraw or layout.
    pub fn as_event_context(&mut self) -> EventContext<'_> {
        EventContext {
            widget: self.widget.clone(),
            pending: PendingEvents::Borrowed(&mut self.pending),
        }
    }
}

impl Deref for GraphicsContext<'_> {
    type Target = WidgetContext;

    fn deref(&self) -> &Self::Target {
        &self.widget
    }
}

impl DerefMut for GraphicsContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.widget
    }
}

impl Drop for GraphicsContext<'_> {
    fn drop(&mut self) {
        if let PendingEvents::Owned(queue) = &mut self.pending {
            let mut queue = std::mem::take(queue);
            process_pending(&mut queue);
        }
    }
}

/// A context for laying out a widget.
pub struct LayoutContext<'gfx> {
    graphics: GraphicsContext<'gfx>,
}

impl<'gfx> LayoutContext<'gfx> {
    /// Returns a context that lays out `widget` on the same surface.
    pub fn for_other<'child>(&'child mut self, widget: &MountedWidget) -> LayoutContext<'child> {
        LayoutContext {
            graphics: self.graphics.for_other(widget),
        }
    }

    /// Invokes this context's widget's
    /// [`layout`](crate::widget::Widget::layout), returning the size the
    /// widget requests.
    pub fn layout(&mut self, available_space: Size<ConstraintLimit>) -> Size<UPx> {
        let instance = self.graphics.widget.mounted.instance().clone();
        let mut widget = instance.lock();
        widget.layout(available_space, self)
    }

    /// Stores the region `child` occupies within its parent.
    pub fn set_child_layout(&self, child: &MountedWidget, layout: Rect<Px>) {
        child.tree().set_layout(child.node, layout);
    }
}

impl<'gfx> Deref for LayoutContext<'gfx> {
    type Target = GraphicsContext<'gfx>;

    fn deref(&self) -> &Self::Target {
        &self.graphics
    }
}

impl DerefMut for LayoutContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.graphics
    }
}

fn dispatch<F>(target: &MountedWidget, queue: &mut Vec<Pending>, event: F)
where
    F: FnOnce(&mut dyn Widget, &mut EventContext<'_>),
{
    let mut context = EventContext {
        widget: WidgetContext::new(target.clone()),
        pending: PendingEvents::Borrowed(queue),
    };
    let mut widget = target.lock();
    event(&mut *widget, &mut context);
}

pub(crate) fn process_pending(queue: &mut Vec<Pending>) {
    while !queue.is_empty() {
        let batch = queue.drain(..).collect::<Vec<_>>();
        for event in batch {
            match event {
                Pending::Activate(target) => {
                    if let Some(previous) = target.tree.set_active(Some(target.node)) {
                        if let Some(previous) =
                            previous.and_then(|node| target.tree.mounted_for(node))
                        {
                            dispatch(&previous, queue, |widget, context| {
                                widget.deactivate(context);
                            });
                        }
                        dispatch(&target, queue, |widget, context| widget.activate(context));
                    }
                }
                Pending::Deactivate(target) => {
                    if target.tree.is_active(target.node)
                        && target.tree.set_active(None).is_some()
                    {
                        dispatch(&target, queue, |widget, context| {
                            widget.deactivate(context);
                        });
                    }
                }
                Pending::Focus(target) => {
                    if let Some(previous) = target.tree.set_focused(Some(target.node)) {
                        if let Some(previous) =
                            previous.and_then(|node| target.tree.mounted_for(node))
                        {
                            dispatch(&previous, queue, |widget, context| widget.blur(context));
                        }
                        dispatch(&target, queue, |widget, context| widget.focus(context));
                    }
                }
                Pending::Notify { from, notification } => {
                    tracing::trace!(
                        name = notification.name(),
                        detail = notification.detail(),
                        "notification"
                    );
                    for callback in from.tree.listeners_for(from.node, notification.name()) {
                        callback.lock().invoke(notification.clone());
                    }
                }
            }
        }
    }
}

impl MountedWidget {
    /// Lays out this widget within `available_space`, storing the resulting
    /// region in the tree, and returns the size the widget requested.
    pub fn layout(&self, available_space: Size<ConstraintLimit>, graphics: &mut Graphics) -> Size<UPx> {
        let mut context = LayoutContext {
            graphics: GraphicsContext {
                widget: WidgetContext::new(self.clone()),
                gfx: graphics,
                pending: PendingEvents::Owned(Vec::new()),
            },
        };
        let size = context.layout(available_space);
        drop(context);
        self.tree
            .set_layout(self.node, Rect::new(Point::ZERO, size.into_signed()));
        size
    }

    /// Redraws this widget into `graphics`.
    pub fn redraw(&self, graphics: &mut Graphics) {
        let mut context = GraphicsContext {
            widget: WidgetContext::new(self.clone()),
            gfx: graphics,
            pending: PendingEvents::Owned(Vec::new()),
        };
        context.redraw();
    }

    /// Simulates a primary-button press and release at `location`.
    ///
    /// Input simulation mirrors the host environment's event delivery: each
    /// event is handled to completion, including any queued state changes,
    /// before the next is dispatched.
    pub fn simulate_click(&self, location: Point<Px>) {
        let mut queue = Vec::new();
        let mut handled = false;
        dispatch(self, &mut queue, |widget, context| {
            handled = widget.hit_test(location, context)
                && widget.mouse_down(location, MouseButton::Left, context) == HANDLED;
        });
        process_pending(&mut queue);

        if handled {
            dispatch(self, &mut queue, |widget, context| {
                widget.mouse_up(Some(location), MouseButton::Left, context);
            });
            process_pending(&mut queue);
        }
    }

    /// Invokes this widget's [`activate`](Widget::activate) hook directly,
    /// mirroring a non-pointer activation such as a keypress.
    pub fn simulate_activation(&self) {
        let mut queue = Vec::new();
        dispatch(self, &mut queue, |widget, context| widget.activate(context));
        process_pending(&mut queue);
    }
}
