pub mod price_provider;
pub mod alphavantage;
pub mod finnhub;
pub mod multi_provider;
pub mod twelvedata;
pub mod yahoo;
pub mod yahoofinance;
