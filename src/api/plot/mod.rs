pub mod handlers;
pub mod service;

pub use service::{Plot, PlotService};
