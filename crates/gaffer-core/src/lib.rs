// Library root: the fantasy scoring and roster-lifecycle engine.
//
// Leaf to root: `scoring` (pure points rules), `events` (per-player match
// summaries), `squad` (roster composition), `gameweek` (deadline resolution),
// `roster` (transfer and lineup state machine), `pipeline` (points
// distribution). `league` is the service surface the outer HTTP layer calls.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod gameweek;
pub mod import;
pub mod jobs;
pub mod league;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod roster;
pub mod scoring;
pub mod squad;
