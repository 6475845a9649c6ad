//! Domain types for quotelab

pub mod bar;
pub mod fill;
pub mod ids;
pub mod instrument;
pub mod order;
pub mod portfolio;
pub mod position;

pub use bar::Bar;
pub use fill::{Fill, Liquidity};
pub use ids::{IdGen, OrderId};
pub use instrument::Instrument;
pub use order::{Order, RestingOrder, Side};
pub use portfolio::Portfolio;
pub use position::Position;

/// Quantities with smaller magnitude than this are treated as flat.
pub const QTY_EPSILON: f64 = 1e-12;
