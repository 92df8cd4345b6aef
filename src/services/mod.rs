pub mod calendar;
pub mod normalizer;
pub mod readings;
pub mod reconcile;
pub mod schedule;
pub mod score_runner;
pub mod scoring;
pub mod store;
pub mod submission;
