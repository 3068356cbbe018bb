//! The tree of mounted widgets.

use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::sync::Arc;

use alot::{LotId, Lots};
use figures::units::Px;
use figures::Rect;
use kempt::Map;
use parking_lot::Mutex;

use crate::context::EventContext;
use crate::notifications::{ListenerHandle, Notification};
use crate::styles::{Component, Styles};
use crate::value::CallbackHandle;
use crate::widget::{
    Accessibility, Callback, MakeWidget, WidgetGuard, WidgetId, WidgetInstance,
};

/// A tree of mounted widgets.
///
/// The tree owns every mounted widget, tracks parent/child edges, the active
/// widget, per-node layout and styles, and the notification listeners used for
/// event bubbling.
#[derive(Clone, Default)]
pub struct Tree {
    data: Arc<Mutex<TreeData>>,
}

#[derive(Default)]
struct TreeData {
    nodes: Lots<Node>,
    nodes_by_id: Map<WidgetId, LotId>,
    active: Option<LotId>,
    focused: Option<LotId>,
    // Listener ids are allocated tree-wide so a stale handle can never alias
    // a listener registered on a node that later reused the same slot.
    next_listener: u64,
}

struct Node {
    widget: WidgetInstance,
    parent: Option<LotId>,
    children: Vec<LotId>,
    layout: Option<Rect<Px>>,
    styles: Styles,
    accessibility: Option<Accessibility>,
    listeners: Vec<(u64, Listener)>,
    trackers: Map<usize, CallbackHandle>,
    needs_redraw: bool,
}

impl Node {
    fn new(widget: WidgetInstance, parent: Option<LotId>, accessibility: Option<Accessibility>) -> Self {
        Self {
            widget,
            parent,
            children: Vec::new(),
            layout: None,
            styles: Styles::new(),
            accessibility,
            listeners: Vec::new(),
            trackers: Map::new(),
            needs_redraw: true,
        }
    }
}

struct Listener {
    name: Cow<'static, str>,
    callback: Arc<Mutex<Callback<Notification>>>,
}

impl Tree {
    /// Returns an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `widget` into the tree as a child of `parent`, or as a root
    /// widget when `parent` is `None`.
    ///
    /// The widget's [`mounted`](crate::widget::Widget::mounted) callback is
    /// invoked before this function returns.
    pub fn mount(&self, widget: impl MakeWidget, parent: Option<&MountedWidget>) -> MountedWidget {
        let instance = widget.make_widget();
        let accessibility = instance.lock().accessibility();
        let node = {
            let mut data = self.data.lock();
            let parent_id = parent.map(|parent| parent.node);
            let node = data
                .nodes
                .push(Node::new(instance.clone(), parent_id, accessibility));
            if let Some(parent_id) = parent_id {
                if let Some(parent) = data.nodes.get_mut(parent_id) {
                    parent.children.push(node);
                }
            }
            data.nodes_by_id.insert(instance.id(), node);
            node
        };
        tracing::debug!(widget = ?instance.id(), "mounted widget");

        let mounted = MountedWidget {
            tree: self.clone(),
            node,
            instance,
        };
        let mut context = EventContext::new(mounted.clone());
        let mut widget = mounted.lock();
        widget.mounted(&mut context);
        drop(widget);
        drop(context);
        mounted
    }

    /// Unmounts `mounted` and all of its descendants.
    ///
    /// Each widget's [`unmounted`](crate::widget::Widget::unmounted) callback
    /// is invoked, children before parents, while the widgets are still in the
    /// tree.
    pub fn remove(&self, mounted: &MountedWidget) {
        let mut subtree = Vec::new();
        {
            let data = self.data.lock();
            collect_subtree(&data, mounted.node, &mut subtree);
        }

        // Children first, mirroring the order they would be torn down in.
        for &node in subtree.iter().rev() {
            if let Some(widget) = self.widget(node) {
                let target = MountedWidget {
                    tree: self.clone(),
                    node,
                    instance: widget,
                };
                let mut context = EventContext::new(target.clone());
                let mut guard = target.lock();
                guard.unmounted(&mut context);
                drop(guard);
                drop(context);
            }
        }

        let mut data = self.data.lock();
        if let Some(parent) = data
            .nodes
            .get(mounted.node)
            .and_then(|node| node.parent)
        {
            if let Some(parent) = data.nodes.get_mut(parent) {
                parent.children.retain(|&child| child != mounted.node);
            }
        }
        for node in subtree {
            if data.active == Some(node) {
                data.active = None;
            }
            if data.focused == Some(node) {
                data.focused = None;
            }
            if let Some(node) = data.nodes.remove(node) {
                data.nodes_by_id.remove(&node.widget.id());
            }
        }
    }

    pub(crate) fn widget(&self, node: LotId) -> Option<WidgetInstance> {
        self.data.lock().nodes.get(node).map(|node| node.widget.clone())
    }

    pub(crate) fn parent(&self, node: LotId) -> Option<LotId> {
        self.data.lock().nodes.get(node).and_then(|node| node.parent)
    }

    pub(crate) fn is_active(&self, node: LotId) -> bool {
        self.data.lock().active == Some(node)
    }

    /// Sets the active node. Returns `Some(previous)` if the active node
    /// changed, or `None` if `node` was already active.
    pub(crate) fn set_active(&self, node: Option<LotId>) -> Option<Option<LotId>> {
        let mut data = self.data.lock();
        if data.active == node {
            None
        } else {
            Some(std::mem::replace(&mut data.active, node))
        }
    }

    pub(crate) fn mounted_for(&self, node: LotId) -> Option<MountedWidget> {
        let instance = self.widget(node)?;
        Some(MountedWidget {
            tree: self.clone(),
            node,
            instance,
        })
    }

    pub(crate) fn is_focused(&self, node: LotId) -> bool {
        self.data.lock().focused == Some(node)
    }

    /// Sets the focused node. Returns `Some(previous)` if the focused node
    /// changed, or `None` if `node` was already focused.
    pub(crate) fn set_focused(&self, node: Option<LotId>) -> Option<Option<LotId>> {
        let mut data = self.data.lock();
        if data.focused == node {
            None
        } else {
            Some(std::mem::replace(&mut data.focused, node))
        }
    }

    pub(crate) fn invalidate(&self, node: LotId) -> bool {
        let mut data = self.data.lock();
        if data.nodes.get(node).is_none() {
            return false;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(node) = data.nodes.get_mut(id) else {
                break;
            };
            node.needs_redraw = true;
            current = node.parent;
        }
        true
    }

    pub(crate) fn reset_needs_redraw(&self, node: LotId) -> bool {
        let mut data = self.data.lock();
        data.nodes
            .get_mut(node)
            .map_or(false, |node| std::mem::replace(&mut node.needs_redraw, false))
    }

    pub(crate) fn needs_redraw(&self, node: LotId) -> bool {
        self.data
            .lock()
            .nodes
            .get(node)
            .is_some_and(|node| node.needs_redraw)
    }

    pub(crate) fn set_layout(&self, node: LotId, layout: Rect<Px>) {
        let mut data = self.data.lock();
        if let Some(node) = data.nodes.get_mut(node) {
            node.layout = Some(layout);
        }
    }

    pub(crate) fn layout(&self, node: LotId) -> Option<Rect<Px>> {
        self.data.lock().nodes.get(node).and_then(|node| node.layout)
    }

    pub(crate) fn attach_styles(&self, node: LotId, styles: Styles) {
        let mut data = self.data.lock();
        if let Some(node) = data.nodes.get_mut(node) {
            node.styles.append(styles);
        }
    }

    /// Looks up `name` on `node`, falling back to each ancestor in turn.
    pub(crate) fn query_style(&self, node: LotId, name: &str) -> Option<Component> {
        let data = self.data.lock();
        let mut current = Some(node);
        while let Some(id) = current {
            let node = data.nodes.get(id)?;
            if let Some(component) = node.styles.get(name) {
                return Some(component);
            }
            current = node.parent;
        }
        None
    }

    pub(crate) fn accessibility(&self, node: LotId) -> Option<Accessibility> {
        self.data
            .lock()
            .nodes
            .get(node)
            .and_then(|node| node.accessibility.clone())
    }

    /// Stores `handle` so the registration lives as long as the node, keyed by
    /// the address of the dynamic it observes so repeated registrations from
    /// redraws replace rather than accumulate.
    pub(crate) fn retain_tracker(&self, node: LotId, key: usize, handle: CallbackHandle) {
        let mut data = self.data.lock();
        if let Some(node) = data.nodes.get_mut(node) {
            node.trackers.insert(key, handle);
        }
    }

    pub(crate) fn add_listener(
        &self,
        node: LotId,
        name: Cow<'static, str>,
        callback: Callback<Notification>,
    ) -> ListenerHandle {
        let mut data = self.data.lock();
        let listener = data.next_listener;
        data.next_listener += 1;
        if let Some(node) = data.nodes.get_mut(node) {
            node.listeners.push((
                listener,
                Listener {
                    name,
                    callback: Arc::new(Mutex::new(callback)),
                },
            ));
        }
        ListenerHandle {
            tree: self.clone(),
            node,
            listener,
        }
    }

    pub(crate) fn remove_listener(&self, node: LotId, listener: u64) {
        let mut data = self.data.lock();
        if let Some(node) = data.nodes.get_mut(node) {
            node.listeners.retain(|(id, _)| *id != listener);
        }
    }

    /// Returns the callbacks subscribed to `name` along the bubble path from
    /// `from` to the root, nearest node first.
    pub(crate) fn listeners_for(
        &self,
        from: LotId,
        name: &str,
    ) -> Vec<Arc<Mutex<Callback<Notification>>>> {
        let data = self.data.lock();
        let mut callbacks = Vec::new();
        let mut current = Some(from);
        while let Some(id) = current {
            let Some(node) = data.nodes.get(id) else {
                break;
            };
            for (_, listener) in &node.listeners {
                if listener.name == name {
                    callbacks.push(Arc::clone(&listener.callback));
                }
            }
            current = node.parent;
        }
        callbacks
    }
}

impl Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree").finish_non_exhaustive()
    }
}

fn collect_subtree(data: &TreeData, node: LotId, into: &mut Vec<LotId>) {
    if let Some(found) = data.nodes.get(node) {
        into.push(node);
        for &child in &found.children {
            collect_subtree(data, child, into);
        }
    }
}

/// A widget that has been mounted into a [`Tree`].
#[derive(Clone)]
pub struct MountedWidget {
    pub(crate) tree: Tree,
    pub(crate) node: LotId,
    instance: WidgetInstance,
}

impl MountedWidget {
    /// The tree this widget is mounted in.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The instance this widget was mounted from.
    #[must_use]
    pub fn instance(&self) -> &WidgetInstance {
        &self.instance
    }

    /// The unique id of the underlying widget instance.
    #[must_use]
    pub fn id(&self) -> WidgetId {
        self.instance.id()
    }

    /// Locks the underlying widget for exclusive access.
    #[must_use]
    pub fn lock(&self) -> WidgetGuard<'_> {
        self.instance.lock()
    }

    /// Returns the parent of this widget, if it is not a root widget.
    #[must_use]
    pub fn parent(&self) -> Option<MountedWidget> {
        let parent = self.tree.parent(self.node)?;
        let instance = self.tree.widget(parent)?;
        Some(MountedWidget {
            tree: self.tree.clone(),
            node: parent,
            instance,
        })
    }

    /// Registers `on_notification` to be invoked whenever a notification named
    /// `name` is emitted by this widget or any of its descendants.
    pub fn on_notification<F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        on_notification: F,
    ) -> ListenerHandle
    where
        F: FnMut(Notification) + Send + 'static,
    {
        self.tree
            .add_listener(self.node, name.into(), Callback::new(on_notification))
    }

    /// The accessibility description the widget reported when it was mounted.
    #[must_use]
    pub fn accessibility(&self) -> Option<Accessibility> {
        self.tree.accessibility(self.node)
    }

    /// The region this widget occupied in its most recent layout.
    #[must_use]
    pub fn last_layout(&self) -> Option<Rect<Px>> {
        self.tree.layout(self.node)
    }

    /// Returns true if this widget has been invalidated since it was last
    /// redrawn.
    #[must_use]
    pub fn invalidated(&self) -> bool {
        self.tree.needs_redraw(self.node)
    }

    /// Unmounts this widget and its descendants.
    pub fn remove(&self) {
        self.tree.remove(self);
    }
}

impl Debug for MountedWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedWidget")
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

impl Eq for MountedWidget {}

impl PartialEq for MountedWidget {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && Arc::ptr_eq(&self.tree.data, &other.tree.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::Label;

    #[test]
    fn mounting_links_parents() {
        let tree = Tree::new();
        let root = tree.mount(Label::new("root"), None);
        let child = tree.mount(Label::new("child"), Some(&root));
        assert_eq!(child.parent().as_ref(), Some(&root));
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn removal_prunes_subtree() {
        let tree = Tree::new();
        let root = tree.mount(Label::new("root"), None);
        let child = tree.mount(Label::new("child"), Some(&root));
        root.remove();
        assert_eq!(tree.widget(child.node), None);
        assert_eq!(tree.widget(root.node), None);
    }

    #[test]
    fn listener_handles_unregister() {
        let tree = Tree::new();
        let root = tree.mount(Label::new("root"), None);
        let handle = root.on_notification("ping", |_| {});
        assert_eq!(tree.listeners_for(root.node, "ping").len(), 1);
        assert_eq!(tree.listeners_for(root.node, "pong").len(), 0);
        drop(handle);
        assert_eq!(tree.listeners_for(root.node, "ping").len(), 0);
    }

    #[test]
    fn stale_listener_handles_leave_new_nodes_alone() {
        let tree = Tree::new();
        let first = tree.mount(Label::new("first"), None);
        let stale = first.on_notification("ping", |_| {});
        first.remove();

        // A new mount may reuse the removed node's slot; dropping the stale
        // handle must not unregister the new node's listener.
        let second = tree.mount(Label::new("second"), None);
        let _live = second.on_notification("ping", |_| {});
        assert_eq!(tree.listeners_for(second.node, "ping").len(), 1);
        drop(stale);
        assert_eq!(tree.listeners_for(second.node, "ping").len(), 1);
    }

    #[test]
    fn styles_inherit_from_ancestors() {
        use crate::styles::{Color, Component, Styles, TEXT_COLOR};

        let tree = Tree::new();
        let root = tree.mount(Label::new("root"), None);
        let child = tree.mount(Label::new("child"), Some(&root));
        tree.attach_styles(
            root.node,
            Styles::new().with(TEXT_COLOR, Component::Color(Color::WHITE)),
        );
        assert_eq!(
            tree.query_style(child.node, TEXT_COLOR),
            Some(Component::Color(Color::WHITE))
        );
    }
}
