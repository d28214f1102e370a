pub mod coin_market_cap;
pub mod exchange_rates;
pub mod util;

pub use coin_market_cap::CoinMarketCapProvider;
pub use exchange_rates::ExchangeRatesProvider;
