//! Payload data-transfer types exchanged with the trading engine.
//!
//! Field names follow the PascalCase JSON contract of existing clients; id
//! fields keep their upper-case `ID` suffix.

pub mod market_data;
pub mod trading;

pub use market_data::{Candle, DepthMarketData, QryCandle, SpecificInstrument, SubscribeMarketData};
pub use trading::{
    Account, ActionFlag, Commission, Direction, InputOrder, Instrument, LoginRequest,
    LoginResponse, LogoutRequest, Margin, Offset, Order, OrderAction, OrderStatus, PosiDirection,
    Position, PositionDetail, QryAccount, QryInstrument, QryOrder, QryPosition, QrySettlement,
    QryTrade, SettlementConfirm, SettlementInfo, Trade,
};
