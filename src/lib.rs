pub mod config;
pub mod export;
pub mod extraction;
pub mod fake_fetch;
pub mod features;
pub mod fetch;
pub mod fixture_stats;
pub mod fixtures;
pub mod h2h;
pub mod http_cache;
pub mod http_client;
pub mod leagues;
pub mod logging;
pub mod pipeline;
pub mod player_impact;
pub mod stats;
pub mod table;
pub mod team_form;
