//! Types for storing and interacting with values in widgets.

use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use alot::{LotId, Lots};
use intentional::Assert;
use parking_lot::{Mutex, MutexGuard};

use crate::context::WidgetContext;

/// An instance of a value that provides APIs to observe and react to its
/// contents.
pub struct Dynamic<T>(Arc<DynamicData<T>>);

impl<T> Dynamic<T> {
    /// Creates a new instance wrapping `value`.
    pub fn new(value: T) -> Self {
        Self(Arc::new(DynamicData {
            state: Mutex::new(State {
                value,
                generation: Generation::default(),
                sources: Vec::new(),
            }),
            locked_by: Mutex::new(None),
            invoking: Mutex::new(None),
            callbacks: Mutex::new(Lots::new()),
        }))
    }

    /// Returns a weak reference to this dynamic.
    #[must_use]
    pub fn downgrade(&self) -> WeakDynamic<T> {
        WeakDynamic(Arc::downgrade(&self.0))
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast()
    }

    /// Locks this value for exclusive access, returning a guard.
    ///
    /// If the contents are mutated through the guard, all observers will be
    /// notified when the guard is dropped.
    ///
    /// # Panics
    ///
    /// This function panics if this value is already locked by the current
    /// thread.
    #[must_use]
    pub fn lock(&self) -> DynamicGuard<'_, T> {
        self.try_lock().expect("deadlocked")
    }

    /// Locks this value for exclusive access, returning a guard.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlockError`] if the current thread already holds a lock on
    /// this value.
    pub fn try_lock(&self) -> Result<DynamicGuard<'_, T>, DeadlockError> {
        Ok(DynamicGuard {
            guard: Some(self.0.lock()?),
            data: &self.0,
            accessed_mut: false,
        })
    }

    /// Keeps `source` alive for as long as this dynamic exists.
    ///
    /// This is used by mapped dynamics to tie the lifetime of the change
    /// callback that feeds them to the mapped value itself.
    pub fn set_source(&self, source: CallbackHandle) {
        if let Ok(mut guard) = self.0.lock() {
            guard.sources.push(source);
            self.0.unlock();
        }
    }

    fn register(&self, callback: Box<dyn ValueCallback>) -> CallbackHandle
    where
        T: Send + 'static,
    {
        let id = self.0.callbacks.lock().push(callback);
        CallbackHandle(Some(CallbackHandleData {
            id,
            owner: Arc::clone(&self.0) as Arc<dyn CallbackCollection>,
        }))
    }
}

impl Dynamic<bool> {
    /// Inverts the contained value, returning the new value.
    ///
    /// # Panics
    ///
    /// This function panics if this value is already locked by the current
    /// thread.
    pub fn toggle(&self) -> bool {
        self.map_mut(|mut value| {
            *value = !*value;
            *value
        })
    }
}

impl<T> Clone for Dynamic<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Default for Dynamic<T>
where
    T: Default,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Dynamic<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_map_ref(|value| format!("{value:?}")) {
            Ok(value) => f.debug_tuple("Dynamic").field(&value).finish(),
            Err(DeadlockError) => f.debug_tuple("Dynamic").field(&"<locked>").finish(),
        }
    }
}

impl<T> PartialEq for Dynamic<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A weak reference to a [`Dynamic`].
pub struct WeakDynamic<T>(Weak<DynamicData<T>>);

impl<T> WeakDynamic<T> {
    /// Returns the [`Dynamic`] this weak reference points to, if it still has
    /// any strong references.
    #[must_use]
    pub fn upgrade(&self) -> Option<Dynamic<T>> {
        self.0.upgrade().map(Dynamic)
    }
}

impl<T> Clone for WeakDynamic<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

struct DynamicData<T> {
    state: Mutex<State<T>>,
    // Tracks which thread holds `state`, allowing re-entrant acquisition to
    // produce a `DeadlockError` instead of blocking forever.
    locked_by: Mutex<Option<ThreadId>>,
    // Tracks which thread is currently invoking callbacks, so a callback
    // that mutates its own dynamic doesn't recurse into another invocation
    // pass.
    invoking: Mutex<Option<ThreadId>>,
    callbacks: Mutex<Lots<Box<dyn ValueCallback>>>,
}

impl<T> DynamicData<T> {
    fn lock(&self) -> Result<MutexGuard<'_, State<T>>, DeadlockError> {
        let current = thread::current().id();
        if *self.locked_by.lock() == Some(current) {
            return Err(DeadlockError);
        }
        let guard = self.state.lock();
        *self.locked_by.lock() = Some(current);
        Ok(guard)
    }

    // Must be called before the state guard is dropped, so another thread
    // can't observe a stale owner.
    fn unlock(&self) {
        *self.locked_by.lock() = None;
    }

    // Must be called after `unlock`, so callbacks can read the dynamic they
    // are attached to.
    fn invoke_callbacks(&self) {
        let current = thread::current().id();
        if *self.invoking.lock() == Some(current) {
            return;
        }
        let mut callbacks = self.callbacks.lock();
        *self.invoking.lock() = Some(current);
        callbacks.drain_filter(|callback| callback.changed().is_err());
        *self.invoking.lock() = None;
        drop(callbacks);
    }
}

trait CallbackCollection: Send + Sync {
    fn remove(&self, id: LotId);
}

impl<T> CallbackCollection for DynamicData<T>
where
    T: Send + 'static,
{
    fn remove(&self, id: LotId) {
        self.callbacks.lock().remove(id);
    }
}

trait ValueCallback: Send {
    fn changed(&mut self) -> Result<(), CallbackDisconnected>;
}

impl<F> ValueCallback for F
where
    F: FnMut() -> Result<(), CallbackDisconnected> + Send + 'static,
{
    fn changed(&mut self) -> Result<(), CallbackDisconnected> {
        self()
    }
}

struct State<T> {
    value: T,
    generation: Generation,
    sources: Vec<CallbackHandle>,
}

/// An exclusive guard over a [`Dynamic`]'s contents.
///
/// Observers are notified when this guard is dropped, if the contents were
/// accessed mutably.
pub struct DynamicGuard<'a, T> {
    guard: Option<MutexGuard<'a, State<T>>>,
    data: &'a DynamicData<T>,
    accessed_mut: bool,
}

impl<T> DynamicGuard<'_, T> {
    /// Returns the generation of the contained value.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.guard.as_ref().assert("guard present").generation
    }
}

impl<T> Deref for DynamicGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard.as_ref().assert("guard present").value
    }
}

impl<T> DerefMut for DynamicGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.accessed_mut = true;
        &mut self.guard.as_mut().assert("guard present").value
    }
}

impl<T> Drop for DynamicGuard<'_, T> {
    fn drop(&mut self) {
        let mut guard = self.guard.take().assert("guard present");
        if self.accessed_mut {
            guard.generation = guard.generation.next();
        }
        self.data.unlock();
        drop(guard);
        if self.accessed_mut {
            self.data.invoke_callbacks();
        }
    }
}

/// A source of one or more `T` values.
pub trait Source<T> {
    /// Maps the contents with read-only access.
    fn try_map_ref<R>(&self, map: impl FnOnce(&T) -> R) -> Result<R, DeadlockError>;

    /// Registers `callback` to be invoked with the contents after each
    /// update.
    ///
    /// Callbacks run after the source's lock has been released, so the
    /// callback may freely read the source it is attached to.
    fn try_for_each_subsequent<F>(&self, for_each: F) -> CallbackHandle
    where
        T: Clone + Send + 'static,
        F: FnMut(&T) -> Result<(), CallbackDisconnected> + Send + 'static;

    /// Maps the contents with read-only access.
    ///
    /// # Panics
    ///
    /// This function panics if this value is already locked by the current
    /// thread.
    fn map_ref<R>(&self, map: impl FnOnce(&T) -> R) -> R {
        self.try_map_ref(map).expect("deadlocked")
    }

    /// Returns the current generation of the value.
    fn generation(&self) -> Generation;

    /// Returns a clone of the currently contained value.
    ///
    /// # Panics
    ///
    /// This function panics if this value is already locked by the current
    /// thread.
    #[must_use]
    fn get(&self) -> T
    where
        T: Clone,
    {
        self.map_ref(T::clone)
    }

    /// Returns a clone of the currently contained value.
    fn try_get(&self) -> Result<T, DeadlockError>
    where
        T: Clone,
    {
        self.try_map_ref(T::clone)
    }

    /// Returns a clone of the currently contained value, redrawing the widget
    /// of `context` each time the value changes.
    #[must_use]
    fn get_tracking_redraw(&self, context: &WidgetContext) -> T
    where
        T: Clone + Send + 'static,
        Self: Sized,
    {
        self.redraw_when_changed(context);
        self.get()
    }

    /// Redraws the widget of `context` each time this value changes.
    fn redraw_when_changed(&self, context: &WidgetContext)
    where
        T: Send + 'static,
        Self: Sized;

    /// Executes `on_change` each time the contents of this source are updated.
    ///
    /// Returning `Err(CallbackDisconnected)` will prevent the callback from
    /// being invoked again.
    fn on_change_try<F>(&self, on_change: F) -> CallbackHandle
    where
        T: Send + 'static,
        F: FnMut() -> Result<(), CallbackDisconnected> + Send + 'static;

    /// Executes `on_change` each time the contents of this source are updated.
    fn on_change<F>(&self, mut on_change: F) -> CallbackHandle
    where
        T: Send + 'static,
        F: FnMut() + Send + 'static,
    {
        self.on_change_try(move || {
            on_change();
            Ok(())
        })
    }

    /// Attaches `for_each` to this value so that it is invoked each time the
    /// source's contents are updated.
    ///
    /// `for_each` will not be invoked with the currently stored value.
    fn for_each_subsequent<F>(&self, mut for_each: F) -> CallbackHandle
    where
        T: Clone + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        self.try_for_each_subsequent(move |value| {
            for_each(value);
            Ok(())
        })
    }

    /// Invokes `for_each` with the current contents and each time this source's
    /// contents are updated.
    fn for_each<F>(&self, mut for_each: F) -> CallbackHandle
    where
        T: Clone + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        self.map_ref(&mut for_each);
        self.for_each_subsequent(for_each)
    }

    /// Creates a new dynamic value that contains the result of invoking `map`
    /// each time this value is changed.
    fn map_each<R, F>(&self, mut map: F) -> Dynamic<R>
    where
        T: Clone + Send + 'static,
        F: FnMut(&T) -> R + Send + 'static,
        R: PartialEq + Send + 'static,
    {
        let mapped = Dynamic::new(self.map_ref(&mut map));
        let mapped_weak = mapped.downgrade();
        mapped.set_source(self.try_for_each_subsequent(move |value| {
            let mapped = mapped_weak.upgrade().ok_or(CallbackDisconnected)?;
            mapped.set(map(value));
            Ok(())
        }));
        mapped
    }
}

impl<T> Source<T> for Dynamic<T> {
    fn try_map_ref<R>(&self, map: impl FnOnce(&T) -> R) -> Result<R, DeadlockError> {
        let guard = self.0.lock()?;
        let result = map(&guard.value);
        self.0.unlock();
        drop(guard);
        Ok(result)
    }

    fn try_for_each_subsequent<F>(&self, mut for_each: F) -> CallbackHandle
    where
        T: Clone + Send + 'static,
        F: FnMut(&T) -> Result<(), CallbackDisconnected> + Send + 'static,
    {
        // The callback holds a weak reference so that it doesn't keep its own
        // dynamic alive, and reads the contents fresh when invoked.
        let weak = self.downgrade();
        self.register(Box::new(move || {
            let dynamic = weak.upgrade().ok_or(CallbackDisconnected)?;
            match dynamic.try_get() {
                Ok(value) => for_each(&value),
                Err(DeadlockError) => Ok(()),
            }
        }))
    }

    fn generation(&self) -> Generation {
        let guard = self.0.lock().expect("deadlocked");
        let generation = guard.generation;
        self.0.unlock();
        drop(guard);
        generation
    }

    fn redraw_when_changed(&self, context: &WidgetContext)
    where
        T: Send + 'static,
        Self: Sized,
    {
        context.redraw_when_changed(self);
    }

    fn on_change_try<F>(&self, on_change: F) -> CallbackHandle
    where
        T: Send + 'static,
        F: FnMut() -> Result<(), CallbackDisconnected> + Send + 'static,
    {
        self.register(Box::new(on_change))
    }
}

/// A destination for values of type `T`.
pub trait Destination<T> {
    /// Maps the contents with exclusive access. Before returning from this
    /// function, all observers will be notified that the contents have been
    /// updated.
    fn try_map_mut<R>(&self, map: impl FnOnce(Mutable<'_, T>) -> R) -> Result<R, DeadlockError>;

    /// Maps the contents with exclusive access. Before returning from this
    /// function, all observers will be notified that the contents have been
    /// updated.
    ///
    /// # Panics
    ///
    /// This function panics if this value is already locked by the current
    /// thread.
    fn map_mut<R>(&self, map: impl FnOnce(Mutable<'_, T>) -> R) -> R {
        self.try_map_mut(map).expect("deadlocked")
    }

    /// Replaces the contents with `new_value` if `new_value` is different than
    /// the currently stored value, returning the previous contents.
    fn try_replace(&self, new_value: T) -> Result<T, ReplaceError<T>>
    where
        T: PartialEq,
    {
        match self.try_map_mut(|mut value| {
            if *value == new_value {
                Err(ReplaceError::NoChange(new_value))
            } else {
                Ok(std::mem::replace(&mut *value, new_value))
            }
        }) {
            Ok(result) => result,
            Err(DeadlockError) => Err(ReplaceError::Deadlock),
        }
    }

    /// Replaces the contents with `new_value`, returning the previous contents
    /// if the value changed.
    fn replace(&self, new_value: T) -> Option<T>
    where
        T: PartialEq,
    {
        self.try_replace(new_value).ok()
    }

    /// Stores `new_value` in this dynamic. Before returning from this
    /// function, all observers will be notified that the contents have been
    /// updated.
    fn set(&self, new_value: T)
    where
        T: PartialEq,
    {
        let _old = self.replace(new_value);
    }
}

impl<T> Destination<T> for Dynamic<T> {
    fn try_map_mut<R>(&self, map: impl FnOnce(Mutable<'_, T>) -> R) -> Result<R, DeadlockError> {
        let mut guard = self.0.lock()?;
        let mut mutated = false;
        let result = map(Mutable {
            value: &mut guard.value,
            mutated: &mut mutated,
        });
        if mutated {
            guard.generation = guard.generation.next();
        }
        self.0.unlock();
        drop(guard);
        if mutated {
            self.0.invoke_callbacks();
        }
        Ok(result)
    }
}

/// An exclusive reference to the contents of a [`Dynamic`].
///
/// Observers are only notified if the contents are accessed through
/// [`DerefMut`].
pub struct Mutable<'a, T> {
    value: &'a mut T,
    mutated: &'a mut bool,
}

impl<T> Deref for Mutable<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

impl<T> DerefMut for Mutable<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        *self.mutated = true;
        self.value
    }
}

/// A value that may be either constant or dynamic.
#[derive(Debug)]
pub enum Value<T> {
    /// A value that will not ever change.
    Constant(T),
    /// A value that may be updated.
    Dynamic(Dynamic<T>),
}

impl<T> Value<T> {
    /// Maps the current contents and returns the result.
    pub fn map<R>(&self, map: impl FnOnce(&T) -> R) -> R {
        match self {
            Value::Constant(value) => map(value),
            Value::Dynamic(dynamic) => dynamic.map_ref(map),
        }
    }

    /// Returns a clone of the current contents.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.map(T::clone)
    }

    /// Returns a clone of the current contents, redrawing the widget of
    /// `context` when a dynamic value changes.
    pub fn get_tracking_redraw(&self, context: &WidgetContext) -> T
    where
        T: Clone + Send + 'static,
    {
        self.redraw_when_changed(context);
        self.get()
    }

    /// Redraws the widget of `context` when a dynamic value changes. Constant
    /// values never change.
    pub fn redraw_when_changed(&self, context: &WidgetContext)
    where
        T: Send + 'static,
    {
        if let Value::Dynamic(dynamic) = self {
            context.redraw_when_changed(dynamic);
        }
    }
}

impl<T> Clone for Value<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Value::Constant(value) => Value::Constant(value.clone()),
            Value::Dynamic(dynamic) => Value::Dynamic(dynamic.clone()),
        }
    }
}

/// A type that can be converted into a [`Value`].
pub trait IntoValue<T> {
    /// Returns this type as a [`Value`].
    fn into_value(self) -> Value<T>;
}

impl<T> IntoValue<T> for T {
    fn into_value(self) -> Value<T> {
        Value::Constant(self)
    }
}

impl<T> IntoValue<T> for Dynamic<T> {
    fn into_value(self) -> Value<T> {
        Value::Dynamic(self)
    }
}

impl<T> IntoValue<T> for &Dynamic<T> {
    fn into_value(self) -> Value<T> {
        Value::Dynamic(self.clone())
    }
}

impl<'a> IntoValue<String> for &'a str {
    fn into_value(self) -> Value<String> {
        Value::Constant(self.to_owned())
    }
}

impl<T> IntoValue<T> for Value<T> {
    fn into_value(self) -> Value<T> {
        self
    }
}

/// A type that can be converted into a [`Dynamic`].
pub trait IntoDynamic<T> {
    /// Returns this type as a [`Dynamic`].
    fn into_dynamic(self) -> Dynamic<T>;
}

impl<T> IntoDynamic<T> for Dynamic<T> {
    fn into_dynamic(self) -> Dynamic<T> {
        self
    }
}

impl<T> IntoDynamic<T> for &Dynamic<T> {
    fn into_dynamic(self) -> Dynamic<T> {
        self.clone()
    }
}

/// A marker for a change callback that no longer needs to be invoked.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CallbackDisconnected;

/// A registered change callback.
///
/// When dropped, the callback is unregistered. Use
/// [`persist()`](Self::persist) to leave the callback attached for the life of
/// its dynamic.
#[derive(Default)]
#[must_use = "dropping a CallbackHandle unregisters the callback"]
pub struct CallbackHandle(Option<CallbackHandleData>);

struct CallbackHandleData {
    id: LotId,
    owner: Arc<dyn CallbackCollection>,
}

impl CallbackHandle {
    /// Persists the callback until the dynamic it is attached to is freed.
    pub fn persist(mut self) {
        self.0 = None;
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(data) = self.0.take() {
            data.owner.remove(data.id);
        }
    }
}

impl Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallbackHandle")
            .field(&self.0.as_ref().map(|data| data.id))
            .finish()
    }
}

/// A value's generation, which is incremented each time a [`Dynamic`] is
/// mutated.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Generation(usize);

impl Generation {
    /// Returns the generation that follows `self`.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// The error produced when a dynamic is already locked by the current thread.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DeadlockError;

impl Display for DeadlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a deadlock was detected")
    }
}

impl Error for DeadlockError {}

/// The error produced when a value could not be replaced.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReplaceError<T> {
    /// The new value is equal to the current value.
    NoChange(T),
    /// The dynamic is already locked by the current thread.
    Deadlock,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn set_and_get() {
        let value = Dynamic::new(1);
        assert_eq!(value.get(), 1);
        value.set(2);
        assert_eq!(value.get(), 2);
    }

    #[test]
    fn generation_advances_only_on_change() {
        let value = Dynamic::new(1);
        let initial = value.generation();
        value.set(1);
        assert_eq!(value.generation(), initial);
        value.set(2);
        assert_eq!(value.generation(), initial.next());
    }

    #[test]
    fn for_each_observes_updates() {
        let value = Dynamic::new(0);
        let observed = Arc::new(AtomicUsize::new(0));
        let callback_observed = observed.clone();
        let _handle = value.for_each_subsequent(move |updated| {
            callback_observed.store(*updated, Ordering::Relaxed);
        });
        value.set(42);
        assert_eq!(observed.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn dropping_handle_unregisters() {
        let value = Dynamic::new(0);
        let observed = Arc::new(AtomicUsize::new(0));
        let callback_observed = observed.clone();
        let handle = value.for_each_subsequent(move |_| {
            callback_observed.fetch_add(1, Ordering::Relaxed);
        });
        value.set(1);
        drop(handle);
        value.set(2);
        assert_eq!(observed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn map_each_derives() {
        let count = Dynamic::new(0_u64);
        let caption = count.map_each(|count| count.to_string());
        assert_eq!(caption.get(), "0");
        count.set(7);
        assert_eq!(caption.get(), "7");
    }

    #[test]
    fn reentrant_access_errors() {
        let value = Dynamic::new(1);
        value.map_ref(|_| {
            assert_eq!(value.try_get(), Err(DeadlockError));
        });
        // The lock is released once map_ref returns.
        assert_eq!(value.get(), 1);
    }

    #[test]
    fn toggle_returns_new_value() {
        let value = Dynamic::new(false);
        assert!(value.toggle());
        assert!(!value.toggle());
        assert!(!value.get());
    }

    #[test]
    fn callbacks_can_read_their_own_dynamic() {
        let value = Dynamic::new(1_usize);
        let reader = value.clone();
        let observed = Arc::new(AtomicUsize::new(0));
        let sink = observed.clone();
        let _handle = value.for_each_subsequent(move |_| {
            sink.store(reader.get(), Ordering::Relaxed);
        });
        value.set(2);
        assert_eq!(observed.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn guard_drop_notifies_after_releasing() {
        let value = Dynamic::new(0_usize);
        let reader = value.clone();
        let observed = Arc::new(AtomicUsize::new(0));
        let sink = observed.clone();
        let _handle = value.for_each_subsequent(move |_| {
            sink.store(reader.get(), Ordering::Relaxed);
        });
        *value.lock() = 7;
        assert_eq!(observed.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn guard_notifies_on_mutation() {
        let value = Dynamic::new(0);
        let caption = value.map_each(|value: &i32| value.to_string());
        *value.lock() += 5;
        assert_eq!(caption.get(), "5");
    }
}
