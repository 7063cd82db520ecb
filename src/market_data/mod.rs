pub mod candle_buffer;

// Re-export the bar types for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle_buffer::{run_kline_stream, Candle, CandleBuffer, CandleKey};

#[cfg(test)]
pub use candle_buffer::test_candle;
