//! Real-time fan-out to contest displays
//!
//! The hub is independent of stage and result logic. Callers hand it
//! ready-made [`HubMessage`]s and decide the audience: one class plus the
//! venue-wide screens, or the venue-wide screens alone.

mod broadcast;
mod countdown;
mod message;
mod subscriber;

pub use broadcast::{BroadcastHub, FanoutReport, SharedBroadcastHub, DEFAULT_TICK};
pub use countdown::CountdownCallback;
pub use message::{HubMessage, MessageKind};
pub use subscriber::{
    ChannelSubscriber, DeliveryError, Subscriber, SubscriberHandle, SubscriberId,
};
