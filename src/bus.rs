//! Named-channel message bus between the controller and its surfaces.

use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{ControllerError, Result};

type Handler<C> = Box<dyn Fn(&mut C, Value) -> Option<Value> + Send + Sync>;

/// Routes named channels to at most one handler each. Handlers run on the
/// single coordination thread and receive exclusive access to the controller
/// context, so a handler invocation never overlaps another.
pub struct MessageBus<C> {
    handlers: HashMap<String, Handler<C>>,
}

impl<C> Default for MessageBus<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<C> MessageBus<C> {
    /// Registers the handler for a channel. A second registration for the same
    /// channel is a programming error; the first handler is kept and the
    /// duplicate is dropped with a warning.
    pub fn register<F>(&mut self, channel: &str, handler: F)
    where
        F: Fn(&mut C, Value) -> Option<Value> + Send + Sync + 'static,
    {
        if self.handlers.contains_key(channel) {
            warn!("Ignoring duplicate handler registration for channel '{channel}'");
            return;
        }
        self.handlers.insert(channel.to_string(), Box::new(handler));
    }

    /// Delivers a payload to the channel's handler, at most once, discarding
    /// any reply. Channels without a handler are logged and dropped.
    pub fn send(&self, ctx: &mut C, channel: &str, payload: Value) {
        match self.handlers.get(channel) {
            Some(handler) => {
                handler(ctx, payload);
            }
            None => debug!("Dropping message for unhandled channel '{channel}'"),
        }
    }

    /// Delivers a payload and blocks the caller for the handler's reply.
    /// Handlers without an explicit reply answer `Null`.
    pub fn send_sync(&self, ctx: &mut C, channel: &str, payload: Value) -> Result<Value> {
        let handler = self
            .handlers
            .get(channel)
            .ok_or_else(|| ControllerError::HandlerMissing(channel.to_string()))?;
        Ok(handler(ctx, payload).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Counter {
        calls: Vec<String>,
    }

    #[test]
    fn send_dispatches_to_registered_handler() {
        let mut bus: MessageBus<Counter> = MessageBus::default();
        bus.register("ping", |ctx, payload| {
            ctx.calls.push(format!("ping:{payload}"));
            None
        });

        let mut ctx = Counter::default();
        bus.send(&mut ctx, "ping", json!(1));
        bus.send(&mut ctx, "ping", json!(2));

        assert_eq!(ctx.calls, vec!["ping:1", "ping:2"]);
    }

    #[test]
    fn send_to_unknown_channel_is_dropped() {
        let bus: MessageBus<Counter> = MessageBus::default();
        let mut ctx = Counter::default();
        bus.send(&mut ctx, "missing", Value::Null);
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn send_sync_returns_reply_or_null() {
        let mut bus: MessageBus<Counter> = MessageBus::default();
        bus.register("echo", |_, payload| Some(payload));
        bus.register("fire", |_, _| None);

        let mut ctx = Counter::default();
        let reply = bus
            .send_sync(&mut ctx, "echo", json!({ "a": 1 }))
            .expect("handler registered");
        assert_eq!(reply, json!({ "a": 1 }));

        let silent = bus
            .send_sync(&mut ctx, "fire", Value::Null)
            .expect("handler registered");
        assert_eq!(silent, Value::Null);
    }

    #[test]
    fn send_sync_without_handler_fails() {
        let bus: MessageBus<Counter> = MessageBus::default();
        let mut ctx = Counter::default();
        let err = bus.send_sync(&mut ctx, "nothing", Value::Null).unwrap_err();
        assert!(matches!(err, ControllerError::HandlerMissing(name) if name == "nothing"));
    }

    #[test]
    fn duplicate_registration_keeps_first_handler() {
        let mut bus: MessageBus<Counter> = MessageBus::default();
        bus.register("channel", |ctx, _| {
            ctx.calls.push("first".to_string());
            None
        });
        bus.register("channel", |ctx, _| {
            ctx.calls.push("second".to_string());
            None
        });

        let mut ctx = Counter::default();
        bus.send(&mut ctx, "channel", Value::Null);
        assert_eq!(ctx.calls, vec!["first"]);
    }
}
