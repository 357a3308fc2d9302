//! Listener chain shared by the dumper and the loader.
//!
//! Every tuple that becomes durable (dumper) or is loaded (loader) is emitted
//! to the registered listeners. Listeners run most-recently-registered first,
//! so a listener added later sees each tuple before earlier ones and may
//! rewrite its attributes for them. Output writers, progress reporting and
//! test probes are all listeners.

use crate::error::Result;
use crate::stats::Stats;
use crate::tuple::Attributes;
use crate::value::RecordId;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Observer of emitted tuples
pub trait Listener {
    /// Called once per emitted tuple. `object` is the entity the tuple was
    /// produced from (dump) or the instance it was loaded into (load).
    fn on_tuple(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attributes: &mut Attributes,
        object: &dyn Any,
    ) -> Result<()>;

    /// Called once when the session is complete.
    fn on_complete(&mut self, _stats: &Stats) -> Result<()> {
        Ok(())
    }
}

struct FnListener<F>(F);

impl<F> Listener for FnListener<F>
where
    F: FnMut(&str, &RecordId, &mut Attributes, &dyn Any) -> Result<()>,
{
    fn on_tuple(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attributes: &mut Attributes,
        object: &dyn Any,
    ) -> Result<()> {
        (self.0)(type_name, id, attributes, object)
    }
}

struct SharedListener<L>(Rc<RefCell<L>>);

impl<L: Listener> Listener for SharedListener<L> {
    fn on_tuple(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attributes: &mut Attributes,
        object: &dyn Any,
    ) -> Result<()> {
        self.0.borrow_mut().on_tuple(type_name, id, attributes, object)
    }

    fn on_complete(&mut self, stats: &Stats) -> Result<()> {
        self.0.borrow_mut().on_complete(stats)
    }
}

/// Ordered chain of listeners.
#[derive(Default)]
pub struct Emitter {
    // Registration order; dispatch walks it backwards.
    listeners: Vec<Box<dyn Listener>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn listen<L: Listener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    /// Register a closure as a listener. Closures have no completion hook.
    pub fn listen_fn<F>(&mut self, f: F)
    where
        F: FnMut(&str, &RecordId, &mut Attributes, &dyn Any) -> Result<()> + 'static,
    {
        self.listen(FnListener(f));
    }

    /// Register a listener the caller keeps a handle to, e.g. to read its
    /// state once the session is over.
    pub fn listen_shared<L: Listener + 'static>(&mut self, listener: Rc<RefCell<L>>) {
        self.listen(SharedListener(listener));
    }

    /// Dispatch one tuple to every listener. Stops at the first listener
    /// error.
    pub fn emit<'o>(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attributes: &mut Attributes,
        object: &'o dyn Any,
    ) -> Result<&'o dyn Any> {
        for listener in self.listeners.iter_mut().rev() {
            listener.on_tuple(type_name, id, attributes, object)?;
        }
        Ok(object)
    }

    /// Notify every listener that the session is complete.
    pub fn complete(&mut self, stats: &Stats) -> Result<()> {
        for listener in self.listeners.iter_mut().rev() {
            listener.on_complete(stats)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplicateError;
    use crate::tuple::attributes;
    use crate::value::AttributeValue;

    #[derive(Default)]
    struct Probe {
        seen: Vec<(String, RecordId)>,
        completed: usize,
    }

    impl Listener for Probe {
        fn on_tuple(
            &mut self,
            type_name: &str,
            id: &RecordId,
            _attributes: &mut Attributes,
            _object: &dyn Any,
        ) -> Result<()> {
            self.seen.push((type_name.to_string(), id.clone()));
            Ok(())
        }

        fn on_complete(&mut self, _stats: &Stats) -> Result<()> {
            self.completed += 1;
            Ok(())
        }
    }

    #[test]
    fn test_listeners_run_most_recent_first() -> Result<()> {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = Emitter::new();

        let first = order.clone();
        emitter.listen_fn(move |_, _, _, _| {
            first.borrow_mut().push("first");
            Ok(())
        });
        let second = order.clone();
        emitter.listen_fn(move |_, _, _, _| {
            second.borrow_mut().push("second");
            Ok(())
        });

        let mut attrs = Attributes::new();
        emitter.emit("T", &RecordId::Int(1), &mut attrs, &())?;
        assert_eq!(*order.borrow(), vec!["second", "first"]);
        Ok(())
    }

    #[test]
    fn test_later_listener_rewrites_view_of_earlier() -> Result<()> {
        let seen = Rc::new(RefCell::new(None));
        let mut emitter = Emitter::new();

        let probe = seen.clone();
        emitter.listen_fn(move |_, _, attrs, _| {
            *probe.borrow_mut() = attrs.get("password").cloned();
            Ok(())
        });
        emitter.listen_fn(|_, _, attrs, _| {
            attrs.insert("password".to_string(), AttributeValue::Null);
            Ok(())
        });

        let mut attrs = attributes(vec![("password", "hunter2")]);
        emitter.emit("User", &RecordId::Int(1), &mut attrs, &())?;
        assert_eq!(*seen.borrow(), Some(AttributeValue::Null));
        Ok(())
    }

    #[test]
    fn test_emit_returns_object() -> Result<()> {
        let mut emitter = Emitter::new();
        let object = String::from("source");
        let mut attrs = Attributes::new();
        let returned = emitter.emit("T", &RecordId::Int(1), &mut attrs, &object)?;
        assert_eq!(returned.downcast_ref::<String>(), Some(&object));
        Ok(())
    }

    #[test]
    fn test_complete_skips_closures() -> Result<()> {
        let probe = Rc::new(RefCell::new(Probe::default()));
        let mut emitter = Emitter::new();
        emitter.listen_shared(probe.clone());
        emitter.listen_fn(|_, _, _, _| Ok(()));
        assert_eq!(emitter.len(), 2);

        let mut attrs = Attributes::new();
        emitter.emit("T", &RecordId::Int(3), &mut attrs, &())?;
        assert_eq!(probe.borrow().completed, 0);

        emitter.complete(&Stats::new())?;
        assert_eq!(probe.borrow().completed, 1);
        assert_eq!(probe.borrow().seen, vec![("T".to_string(), RecordId::Int(3))]);
        Ok(())
    }

    #[test]
    fn test_listener_error_stops_dispatch() {
        let reached = Rc::new(RefCell::new(false));
        let mut emitter = Emitter::new();

        let flag = reached.clone();
        emitter.listen_fn(move |_, _, _, _| {
            *flag.borrow_mut() = true;
            Ok(())
        });
        emitter.listen_fn(|_, _, _, _| Err(ReplicateError::Listener(anyhow::anyhow!("boom"))));

        let mut attrs = Attributes::new();
        let result = emitter.emit("T", &RecordId::Int(1), &mut attrs, &());
        assert!(matches!(result, Err(ReplicateError::Listener(_))));
        assert!(!*reached.borrow());
    }
}
