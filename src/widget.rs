//! Types for creating reusable widgets (aka components or views).

use std::fmt::{self, Debug};
use std::ops::{ControlFlow, Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use figures::units::{Px, UPx};
use figures::{Point, Size};
use parking_lot::{Mutex, MutexGuard};

use crate::context::{EventContext, GraphicsContext, LayoutContext};
use crate::tree::MountedWidget;
use crate::widgets::Label;
use crate::ConstraintLimit;

/// A type that makes up a graphical user interface.
///
/// This type can go by many names in other UI frameworks: View, Component,
/// Control.
pub trait Widget: Send + Debug + 'static {
    /// Redraw the contents of this widget.
    fn redraw(&mut self, context: &mut GraphicsContext<'_>);

    /// Layout this widget and returns the ideal size based on its contents and
    /// the `available_space`.
    #[allow(unused_variables)]
    fn layout(
        &mut self,
        available_space: Size<ConstraintLimit>,
        context: &mut LayoutContext<'_>,
    ) -> Size<UPx> {
        available_space.map(ConstraintLimit::min)
    }

    /// The widget has been mounted into a parent widget.
    #[allow(unused_variables)]
    fn mounted(&mut self, context: &mut EventContext<'_>) {}

    /// The widget has been removed from its parent widget.
    #[allow(unused_variables)]
    fn unmounted(&mut self, context: &mut EventContext<'_>) {}

    /// Returns true if this widget should respond to mouse input at `location`.
    #[allow(unused_variables)]
    fn hit_test(&mut self, location: Point<Px>, context: &mut EventContext<'_>) -> bool {
        false
    }

    /// The widget has received focus for user input.
    #[allow(unused_variables)]
    fn focus(&mut self, context: &mut EventContext<'_>) {}

    /// The widget is no longer focused for user input.
    #[allow(unused_variables)]
    fn blur(&mut self, context: &mut EventContext<'_>) {}

    /// The widget has become the active widget.
    #[allow(unused_variables)]
    fn activate(&mut self, context: &mut EventContext<'_>) {}

    /// The widget is no longer active.
    #[allow(unused_variables)]
    fn deactivate(&mut self, context: &mut EventContext<'_>) {}

    /// A mouse button event has occurred at `location`. Returns whether the
    /// event has been handled or not.
    ///
    /// If an event is handled, the widget will receive a callback for
    /// [`mouse_up`](Self::mouse_up).
    #[allow(unused_variables)]
    fn mouse_down(
        &mut self,
        location: Point<Px>,
        button: MouseButton,
        context: &mut EventContext<'_>,
    ) -> EventHandling {
        IGNORED
    }

    /// A mouse button is no longer being pressed.
    ///
    /// `location` is `None` when the cursor has left the window entirely.
    #[allow(unused_variables)]
    fn mouse_up(
        &mut self,
        location: Option<Point<Px>>,
        button: MouseButton,
        context: &mut EventContext<'_>,
    ) {
    }

    /// Returns the accessibility description of this widget, if it has one.
    ///
    /// This is reported to the tree once, when the widget is mounted.
    fn accessibility(&self) -> Option<Accessibility> {
        None
    }
}

/// A mouse button.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MouseButton {
    /// The primary button.
    Left,
    /// The secondary button.
    Right,
    /// The middle (wheel) button.
    Middle,
    /// Another button, identified by its index.
    Other(u16),
}

/// An accessibility description of a widget: a role and an optional label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessibility {
    /// The role of the widget, e.g. `button`.
    pub role: &'static str,
    /// A human-readable label for the widget.
    pub label: Option<String>,
}

impl Accessibility {
    /// Returns a description with `role` and no label.
    #[must_use]
    pub const fn role(role: &'static str) -> Self {
        Self { role, label: None }
    }

    /// Attaches `label` to this description.
    #[must_use]
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A type that represents whether an event has been handled or ignored.
pub type EventHandling = ControlFlow<EventHandled, EventIgnored>;

/// A marker type that represents a handled event.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventHandled;

/// A marker type that represents an ignored event.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventIgnored;

/// An [`EventHandling`] value that represents a handled event.
pub const HANDLED: EventHandling = EventHandling::Break(EventHandled);

/// An [`EventHandling`] value that represents an ignored event.
pub const IGNORED: EventHandling = EventHandling::Continue(EventIgnored);

/// The unique id of a [`WidgetInstance`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct WidgetId(u64);

impl WidgetId {
    fn unique() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A pre-allocated [`WidgetId`] that can be used when constructing a
/// [`WidgetInstance`].
#[derive(Debug)]
pub struct WidgetTag(WidgetId);

impl WidgetTag {
    /// Returns a tag with a newly allocated id.
    #[must_use]
    pub fn unique() -> Self {
        Self(WidgetId::unique())
    }

    /// Returns the id this tag wraps.
    #[must_use]
    pub const fn id(&self) -> WidgetId {
        self.0
    }
}

impl Default for WidgetTag {
    fn default() -> Self {
        Self::unique()
    }
}

/// An instance of a [`Widget`].
#[derive(Clone)]
pub struct WidgetInstance {
    data: Arc<WidgetInstanceData>,
}

struct WidgetInstanceData {
    id: WidgetId,
    widget: Mutex<Box<dyn Widget>>,
}

impl WidgetInstance {
    /// Returns a new instance containing `widget`.
    pub fn new<W>(widget: W) -> Self
    where
        W: Widget,
    {
        Self::with_tag(widget, WidgetTag::unique())
    }

    /// Returns a new instance containing `widget` with its id set from `tag`.
    pub fn with_tag<W>(widget: W, tag: WidgetTag) -> Self
    where
        W: Widget,
    {
        Self {
            data: Arc::new(WidgetInstanceData {
                id: tag.id(),
                widget: Mutex::new(Box::new(widget)),
            }),
        }
    }

    /// Returns the unique id of this widget instance.
    #[must_use]
    pub fn id(&self) -> WidgetId {
        self.data.id
    }

    /// Locks the widget for exclusive access.
    ///
    /// Widgets are only accessed through exclusive access, which is guaranteed
    /// by the event delivery model: one event is handled to completion before
    /// the next is dispatched.
    #[must_use]
    pub fn lock(&self) -> WidgetGuard<'_> {
        WidgetGuard(self.data.widget.lock())
    }
}

impl Debug for WidgetInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetInstance")
            .field("id", &self.data.id)
            .finish_non_exhaustive()
    }
}

impl Eq for WidgetInstance {}

impl PartialEq for WidgetInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

/// Exclusive access to a [`WidgetInstance`]'s widget.
pub struct WidgetGuard<'a>(MutexGuard<'a, Box<dyn Widget>>);

impl Deref for WidgetGuard<'_> {
    type Target = dyn Widget;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for WidgetGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

/// A type that can create a [`WidgetInstance`] with a preallocated
/// [`WidgetId`].
pub trait MakeWidgetWithTag: Sized {
    /// Returns a new [`WidgetInstance`] whose [`WidgetId`] comes from `tag`.
    fn make_with_tag(self, tag: WidgetTag) -> WidgetInstance;
}

impl<T> MakeWidgetWithTag for T
where
    T: Widget,
{
    fn make_with_tag(self, tag: WidgetTag) -> WidgetInstance {
        WidgetInstance::with_tag(self, tag)
    }
}

/// A type that can be converted into a [`WidgetInstance`].
pub trait MakeWidget: Sized {
    /// Returns a new widget instance.
    fn make_widget(self) -> WidgetInstance;

    /// Returns a [`WidgetRef`] for use as a child widget slot.
    fn widget_ref(self) -> WidgetRef {
        WidgetRef::new(self)
    }
}

impl<T> MakeWidget for T
where
    T: MakeWidgetWithTag,
{
    fn make_widget(self) -> WidgetInstance {
        self.make_with_tag(WidgetTag::unique())
    }
}

impl MakeWidget for WidgetInstance {
    fn make_widget(self) -> WidgetInstance {
        self
    }
}

impl MakeWidget for &str {
    fn make_widget(self) -> WidgetInstance {
        Label::new(self).make_widget()
    }
}

impl MakeWidget for String {
    fn make_widget(self) -> WidgetInstance {
        Label::new(self).make_widget()
    }
}

/// A function that can be invoked with a parameter (`T`) and returns `R`.
///
/// This type is used by widgets to signal various events.
pub struct Callback<T = (), R = ()>(Box<dyn CallbackFunction<T, R>>);

impl<T, R> Debug for Callback<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}

impl<T, R> Callback<T, R> {
    /// Returns a new instance of this type with `function`.
    pub fn new<F>(function: F) -> Self
    where
        F: FnMut(T) -> R + Send + 'static,
    {
        Self(Box::new(function))
    }

    /// Invokes the wrapped function and returns the produced value.
    pub fn invoke(&mut self, value: T) -> R {
        self.0.invoke(value)
    }
}

trait CallbackFunction<T, R>: Send {
    fn invoke(&mut self, value: T) -> R;
}

impl<T, R, F> CallbackFunction<T, R> for F
where
    F: FnMut(T) -> R + Send,
{
    fn invoke(&mut self, value: T) -> R {
        self(value)
    }
}

/// A child widget slot that is mounted into the tree on first access.
#[derive(Debug)]
pub enum WidgetRef {
    /// A widget that has not been mounted yet.
    Unmounted(WidgetInstance),
    /// A widget that has been mounted.
    Mounted(MountedWidget),
}

impl WidgetRef {
    /// Returns a new unmounted reference to `widget`.
    pub fn new(widget: impl MakeWidget) -> Self {
        Self::Unmounted(widget.make_widget())
    }

    /// Returns this child, mounting it as a child of `context`'s widget if it
    /// has not been mounted yet.
    pub fn mounted(&mut self, context: &mut EventContext<'_>) -> MountedWidget {
        if let WidgetRef::Unmounted(instance) = self {
            *self = WidgetRef::Mounted(context.push_child(instance.clone()));
        }

        match self {
            WidgetRef::Mounted(mounted) => mounted.clone(),
            WidgetRef::Unmounted(_) => unreachable!("mounted above"),
        }
    }

    /// Returns the instance this reference points to.
    #[must_use]
    pub fn widget(&self) -> &WidgetInstance {
        match self {
            WidgetRef::Unmounted(instance) => instance,
            WidgetRef::Mounted(mounted) => mounted.instance(),
        }
    }

    /// Unmounts this child, if it is mounted.
    pub fn unmount(&mut self, context: &mut EventContext<'_>) {
        if let WidgetRef::Mounted(mounted) = self {
            let mounted = mounted.clone();
            *self = WidgetRef::Unmounted(mounted.instance().clone());
            context.remove_child(&mounted);
        }
    }
}
