//! Framing and channels (C5): the inbound POS listener and the outbound
//! bank channel, one module each.

// Modules
pub mod bank_channel;
pub mod pos_listener;
