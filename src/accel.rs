use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::{Context, Handler, KEY_EVENT, Propagation};
use crate::key::Key;

/// Zero-argument action bound to a key.
pub type Action = Rc<RefCell<dyn FnMut(&mut Context)>>;

pub fn action(f: impl FnMut(&mut Context) + 'static) -> Action {
    Rc::new(RefCell::new(f))
}

/// Exact-match key bindings installed as a single key-event handler.
///
/// A bound key is consumed: older key handlers do not see it. Unbound keys
/// fall through to them.
pub struct AcceleratorMap {
    bindings: Rc<RefCell<HashMap<Key, Action>>>,
    handler: Handler,
}

impl Default for AcceleratorMap {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceleratorMap {
    pub fn new() -> Self {
        let bindings: Rc<RefCell<HashMap<Key, Action>>> = Rc::default();
        let table = Rc::clone(&bindings);
        let handler = Handler::new(move |ctx, key| {
            let Some(key) = key else {
                return Propagation::Continue;
            };
            // Release the table before running the action so it may rebind.
            let found = table.borrow().get(key).cloned();
            match found {
                Some(action) => {
                    tracing::trace!(key = %key, "accelerator");
                    (&mut *action.borrow_mut())(ctx);
                    Propagation::Stop
                }
                None => Propagation::Continue,
            }
        });
        Self { bindings, handler }
    }

    pub fn with_bindings(bindings: impl IntoIterator<Item = (Key, Action)>) -> Self {
        let map = Self::new();
        map.bindings.borrow_mut().extend(bindings);
        map
    }

    pub fn add_to(&self, ctx: &mut Context) -> bool {
        ctx.add_callback(KEY_EVENT, &self.handler)
    }

    pub fn remove_from(&self, ctx: &mut Context) {
        ctx.remove_callback(KEY_EVENT, &self.handler);
    }

    /// Bind `key`. Returns false, changing nothing, if it is already bound.
    pub fn map_key(&self, key: Key, action: Action) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(&key) {
            tracing::debug!(key = %key, "key already bound");
            return false;
        }
        bindings.insert(key, action);
        true
    }

    /// Bind every key to the same action, or none of them if any is taken.
    pub fn map_keys<'a>(&self, keys: impl IntoIterator<Item = &'a Key>, action: Action) -> bool {
        let keys: Vec<&Key> = keys.into_iter().collect();
        let mut bindings = self.bindings.borrow_mut();
        if let Some(taken) = keys.iter().find(|key| bindings.contains_key(**key)) {
            tracing::debug!(key = %taken, "key already bound");
            return false;
        }
        for key in keys {
            bindings.insert(key.clone(), Rc::clone(&action));
        }
        true
    }

    pub fn unmap_key(&self, key: &Key) -> bool {
        self.bindings.borrow_mut().remove(key).is_some()
    }

    pub fn is_bound(&self, key: &Key) -> bool {
        self.bindings.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }
}
