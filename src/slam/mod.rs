// SLAM algorithms module

pub mod information;
pub mod online_graph_slam;

// Re-exports
pub use information::InformationForm;
pub use online_graph_slam::{OnlineGraphSlam, SlamConfig};
