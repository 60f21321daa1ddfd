mod error;
mod model;

pub use error::ExchangeError;
pub use model::{ExchangeId, OrderBook, OrderBookEntry, Quote, Symbol, TickerStat};
