pub mod activity;
pub mod channel_policy;
pub mod notification;
pub mod push_subscription;
