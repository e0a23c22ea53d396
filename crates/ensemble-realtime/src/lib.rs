//! Realtime layer: prediction history, the observer set and the periodic
//! health loop that feeds it.

pub mod broadcaster;
pub mod events;
pub mod history;
pub mod monitor;

pub use broadcaster::{Broadcaster, ObserverId};
pub use events::{ClientCommand, PredictionRecord, ServerEvent, ToggleRequest};
pub use history::HistoryBuffer;
pub use monitor::HealthLoop;
