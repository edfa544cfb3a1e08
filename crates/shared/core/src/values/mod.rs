use rust_decimal::Decimal;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Signed quantity: positive = buy / long, negative = sell / short
pub type Quantity = i64;

/// Tick timestamp as supplied by the harness (monotonic, fixed steps)
pub type Timestamp = i64;

/// Minimum price increment
pub const TICK: Price = Decimal::ONE;
