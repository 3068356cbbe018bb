//! Widget notifications that bubble to ancestor listeners.
//!
//! A widget emits a [`Notification`] through its event context. The
//! notification is delivered to listeners registered on the emitting widget
//! and then to listeners on each ancestor, root-most last. There is no
//! propagation cancellation: every listener along the path observes the
//! notification.

use std::borrow::Cow;
use std::fmt::{self, Debug};

use alot::LotId;

use crate::tree::Tree;

/// A named event with a string payload, observable by ancestor widgets.
#[derive(Clone, PartialEq, Eq)]
pub struct Notification {
    name: Cow<'static, str>,
    detail: Cow<'static, str>,
}

impl Notification {
    /// Returns a new notification.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        detail: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// The name listeners subscribe to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The payload carried by this notification.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("name", &self.name)
            .field("detail", &self.detail)
            .finish()
    }
}

/// A registered notification listener.
///
/// Dropping the handle unregisters the listener.
#[must_use = "dropping a ListenerHandle unregisters the listener"]
pub struct ListenerHandle {
    pub(crate) tree: Tree,
    pub(crate) node: LotId,
    pub(crate) listener: u64,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.tree.remove_listener(self.node, self.listener);
    }
}

impl Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("node", &self.node)
            .field("listener", &self.listener)
            .finish()
    }
}
