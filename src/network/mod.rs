pub mod push;

pub use push::{
    ChannelEvent, DetachedChannel, InsertFilter, LocalPushChannel, PushChannel, Subscription,
};
