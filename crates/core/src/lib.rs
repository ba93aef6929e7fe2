pub mod aggregate;
pub mod alert;
pub mod civil;
pub mod classify;
pub mod score;
pub mod tracker;

pub use classify::{classify, Category};
pub use tracker::{Session, TabSnapshot, Tracker, TrackerEvent};
