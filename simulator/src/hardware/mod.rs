//! Photon counting at channel and event level

pub mod channel;
pub mod event;

pub use channel::ChannelAggregator;
pub use event::EventAggregator;
