// Market data access and position tracking
pub mod candle_cache;
pub mod gateway;
pub mod position_manager;

pub use candle_cache::{CacheConfig, CandleCache};
pub use gateway::{GatewayConfig, MarketDataGateway, RequestMeter};
pub use position_manager::{
    DiscoveryRecord, ExitReason, PerformanceRow, Position, PositionConfig, PositionEvent,
    PositionManager,
};
