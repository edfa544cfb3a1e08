mod order;
mod position;
mod side;

pub use order::Order;
pub use position::PositionSide;
pub use side::Side;
