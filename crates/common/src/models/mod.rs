pub mod price_bar;
pub mod signal;
pub mod summary;

pub use price_bar::PriceBar;
pub use signal::{BarAnnotation, Direction, RiskReward, Signal};
pub use summary::{BatchSummary, SummaryBuilder};
