pub mod contracts;
pub mod dashboard;
pub mod jobs;
pub mod notifications;
pub mod reconciler;
pub mod reviews;
pub mod threads;
pub mod view_state;
pub mod wallet;
