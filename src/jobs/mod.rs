pub mod campaign_scheduler;
