//! Tree notifications and the listener registry.

use std::fmt;

use crate::domain::node::NodeKey;

/// Node attribute reported by [`TreeEvent::PropertyChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Caption,
    Title,
    Status,
    ShowStatus,
    DisplayIndex,
    Visible,
    Disabled,
    Expanded,
    Tag,
}

/// Pending selection change, cancelable by any listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChanging {
    pub prior: Option<NodeKey>,
    pub next: Option<NodeKey>,
    canceled: bool,
}

impl SelectionChanging {
    pub(crate) fn new(prior: Option<NodeKey>, next: Option<NodeKey>) -> Self {
        Self {
            prior,
            next,
            canceled: false,
        }
    }

    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// Fired before a selection change is committed
    SelectionChanging(SelectionChanging),
    /// Fired once per outermost selection change
    SelectionChanged {
        prior: Option<NodeKey>,
        current: Option<NodeKey>,
    },
    /// Fired once per outermost batch on `source`
    ContentChanged { source: NodeKey },
    PropertyChanged { node: NodeKey, property: Property },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&mut TreeEvent)>;

/// Synchronous fan-out of tree events, in subscription order.
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl Notifier {
    pub fn subscribe(&mut self, listener: impl FnMut(&mut TreeEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &mut TreeEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }

    /// Emit a changing event; returns whether a listener canceled it.
    pub fn emit_changing(&mut self, prior: Option<NodeKey>, next: Option<NodeKey>) -> bool {
        let mut event = TreeEvent::SelectionChanging(SelectionChanging::new(prior, next));
        self.emit(&mut event);
        matches!(event, TreeEvent::SelectionChanging(ref c) if c.is_canceled())
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn given_canceling_listener_when_emitting_changing_then_reports_cancel() {
        let mut notifier = Notifier::default();
        notifier.subscribe(|e| {
            if let TreeEvent::SelectionChanging(c) = e {
                c.cancel();
            }
        });
        assert!(notifier.emit_changing(None, None));
    }

    #[test]
    fn given_unsubscribed_listener_when_emitting_then_not_called() {
        let mut notifier = Notifier::default();
        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        let id = notifier.subscribe(move |_| *counter.borrow_mut() += 1);
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        assert!(!notifier.emit_changing(None, None));
        assert_eq!(*hits.borrow(), 0);
        assert!(notifier.is_empty());
    }
}
