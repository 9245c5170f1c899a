pub mod activity;
pub mod campaign;
pub mod clock;
pub mod dedup;
pub mod dispatcher;
pub mod notifications;
pub mod policy;
pub mod profiles;
pub mod push;
pub mod quiet_hours;
pub mod rate_limiter;
pub mod store;
pub mod stream_hub;
