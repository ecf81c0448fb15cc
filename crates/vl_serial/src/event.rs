//! Listeners notified around the (de)serialization of objects.
//!
//! Three events exist, each fired once per object (inline objects
//! included):
//!
//! - `pre_serialize`, before the first property of an object is written;
//! - `post_serialize`, after the last one;
//! - `post_deserialize`, after every property was read, with the dynamic
//!   object before it is converted to its Rust type.
//!
//! A listener either watches every class or a single one. Listeners run in
//! registration order; the first error aborts the call.

use core::fmt;
use std::sync::Arc;

use crate::Error;
use crate::data::{DynamicObject, Mapped};
use crate::info::ClassId;
use crate::serializer::{Context, Format};

// -----------------------------------------------------------------------------
// EventKind

/// When a listener runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    PreSerialize,
    PostSerialize,
    PostDeserialize,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreSerialize => "pre_serialize",
            Self::PostSerialize => "post_serialize",
            Self::PostDeserialize => "post_deserialize",
        })
    }
}

// -----------------------------------------------------------------------------
// ObjectEvent

/// The object an event is fired for.
pub struct ObjectEvent<'a> {
    kind: EventKind,
    class: &'a ClassId,
    path: &'a str,
    format: Format,
    context: &'a Context,
}

impl<'a> ObjectEvent<'a> {
    #[inline]
    pub(crate) fn new(kind: EventKind, class: &'a ClassId, path: &'a str, format: Format, context: &'a Context) -> Self {
        Self {
            kind,
            class,
            path,
            format,
            context,
        }
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The concrete class of the object.
    #[inline]
    pub fn class(&self) -> &ClassId {
        self.class
    }

    /// Where in the graph the object sits.
    #[inline]
    pub fn path(&self) -> &str {
        self.path
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn context(&self) -> &Context {
        self.context
    }
}

// -----------------------------------------------------------------------------
// Listeners

/// A listener of `pre_serialize` or `post_serialize`.
pub type SerializeListener = dyn Fn(&ObjectEvent<'_>, &dyn Mapped) -> Result<(), Error> + Send + Sync;

/// A listener of `post_deserialize`; it may edit the fields read.
pub type DeserializeListener = dyn Fn(&ObjectEvent<'_>, &mut DynamicObject) -> Result<(), Error> + Send + Sync;

struct Subscription<F: ?Sized> {
    class: Option<ClassId>,
    listener: Arc<F>,
}

impl<F: ?Sized> Subscription<F> {
    #[inline]
    fn matches(&self, class: &ClassId) -> bool {
        self.class.as_ref().is_none_or(|watched| watched == class)
    }
}

impl<F: ?Sized> Clone for Subscription<F> {
    fn clone(&self) -> Self {
        Self {
            class: self.class.clone(),
            listener: self.listener.clone(),
        }
    }
}

// -----------------------------------------------------------------------------
// EventDispatcher

/// Listeners by event kind.
///
/// # Examples
///
/// ```
/// use vl_serial::event::{EventDispatcher, EventKind};
/// use vl_serial::info::ClassId;
///
/// let mut events = EventDispatcher::new();
/// events
///     .on_pre_serialize(None, |event, _object| {
///         assert!(event.path().starts_with('$'));
///         Ok(())
///     })
///     .on_post_deserialize(Some(ClassId::from_static("app::User")), |_event, object| {
///         object.insert("source", vl_serial::data::Value::String("import".into()));
///         Ok(())
///     });
///
/// assert_eq!(events.len(EventKind::PreSerialize), 1);
/// assert_eq!(events.len(EventKind::PostSerialize), 0);
/// assert!(!events.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct EventDispatcher {
    pre_serialize: Vec<Subscription<SerializeListener>>,
    post_serialize: Vec<Subscription<SerializeListener>>,
    post_deserialize: Vec<Subscription<DeserializeListener>>,
}

impl EventDispatcher {
    /// Creates a dispatcher without listeners.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `listener` before an object of `class` (or any class) is written.
    pub fn on_pre_serialize<F>(&mut self, class: Option<ClassId>, listener: F) -> &mut Self
    where
        F: Fn(&ObjectEvent<'_>, &dyn Mapped) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.pre_serialize.push(Subscription {
            class,
            listener: Arc::new(listener),
        });
        self
    }

    /// Runs `listener` after an object of `class` (or any class) is written.
    pub fn on_post_serialize<F>(&mut self, class: Option<ClassId>, listener: F) -> &mut Self
    where
        F: Fn(&ObjectEvent<'_>, &dyn Mapped) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.post_serialize.push(Subscription {
            class,
            listener: Arc::new(listener),
        });
        self
    }

    /// Runs `listener` after an object of `class` (or any class) is read.
    pub fn on_post_deserialize<F>(&mut self, class: Option<ClassId>, listener: F) -> &mut Self
    where
        F: Fn(&ObjectEvent<'_>, &mut DynamicObject) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.post_deserialize.push(Subscription {
            class,
            listener: Arc::new(listener),
        });
        self
    }

    /// The number of listeners of `kind`.
    pub fn len(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::PreSerialize => self.pre_serialize.len(),
            EventKind::PostSerialize => self.post_serialize.len(),
            EventKind::PostDeserialize => self.post_deserialize.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pre_serialize.is_empty() && self.post_serialize.is_empty() && self.post_deserialize.is_empty()
    }

    /// Fires `pre_serialize` or `post_serialize`.
    pub(crate) fn dispatch_serialize(&self, event: &ObjectEvent<'_>, object: &dyn Mapped) -> Result<(), Error> {
        let subscriptions = match event.kind {
            EventKind::PreSerialize => &self.pre_serialize,
            EventKind::PostSerialize => &self.post_serialize,
            EventKind::PostDeserialize => return Ok(()),
        };
        for subscription in subscriptions.iter().filter(|sub| sub.matches(event.class)) {
            (subscription.listener)(event, object)?;
        }
        Ok(())
    }

    /// Fires `post_deserialize`.
    pub(crate) fn dispatch_deserialize(&self, event: &ObjectEvent<'_>, object: &mut DynamicObject) -> Result<(), Error> {
        for subscription in self.post_deserialize.iter().filter(|sub| sub.matches(event.class)) {
            (subscription.listener)(event, object)?;
        }
        Ok(())
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("pre_serialize", &self.pre_serialize.len())
            .field("post_serialize", &self.post_serialize.len())
            .field("post_deserialize", &self.post_deserialize.len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Tests
