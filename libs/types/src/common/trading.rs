//! Session, order, account and position payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Offset {
    #[default]
    Open,
    Close,
    CloseToday,
    CloseYesterday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Unknown,
    Queued,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// No further fills or cancels can apply
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionFlag {
    #[default]
    Cancel,
    Modify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PosiDirection {
    #[default]
    Long,
    Short,
}

impl From<Direction> for PosiDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Buy => PosiDirection::Long,
            Direction::Sell => PosiDirection::Short,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoginRequest {
    #[serde(rename = "BrokerID")]
    pub broker_id: String,
    #[serde(rename = "UserID")]
    pub user_id: String,
    pub password: String,
    pub client_version: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoginResponse {
    #[serde(rename = "UserID")]
    pub user_id: String,
    pub trading_day: String,
    pub login_time: String,
    #[serde(rename = "SessionID")]
    pub session_id: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LogoutRequest {
    #[serde(rename = "UserID")]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InputOrder {
    pub order_ref: String,
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    #[serde(rename = "ExchangeID")]
    pub exchange_id: String,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OrderAction {
    pub order_ref: String,
    #[serde(rename = "OrderSysID")]
    pub order_sys_id: String,
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    pub action: ActionFlag,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Order {
    pub order_ref: String,
    #[serde(rename = "OrderSysID")]
    pub order_sys_id: String,
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    #[serde(rename = "ExchangeID")]
    pub exchange_id: String,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    pub volume_total_original: i64,
    pub volume_traded: i64,
    pub status: OrderStatus,
    pub status_msg: String,
    pub insert_time: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Trade {
    #[serde(rename = "TradeID")]
    pub trade_id: String,
    pub order_ref: String,
    #[serde(rename = "OrderSysID")]
    pub order_sys_id: String,
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    pub volume: i64,
    pub trade_time: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QryAccount {
    #[serde(rename = "AccountID")]
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Account {
    #[serde(rename = "AccountID")]
    pub account_id: String,
    pub pre_balance: f64,
    pub balance: f64,
    pub available: f64,
    pub curr_margin: f64,
    pub frozen_margin: f64,
    pub commission: f64,
    pub close_profit: f64,
    pub position_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QryPosition {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Position {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    pub posi_direction: PosiDirection,
    pub position: i64,
    pub today_position: i64,
    pub yd_position: i64,
    pub open_cost: f64,
    pub use_margin: f64,
    pub position_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PositionDetail {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    #[serde(rename = "TradeID")]
    pub trade_id: String,
    pub direction: Direction,
    pub open_date: String,
    pub open_price: f64,
    pub volume: i64,
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QryOrder {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    #[serde(rename = "OrderSysID")]
    pub order_sys_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QryTrade {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    #[serde(rename = "TradeID")]
    pub trade_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QryInstrument {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    #[serde(rename = "ExchangeID")]
    pub exchange_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Instrument {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    #[serde(rename = "ExchangeID")]
    pub exchange_id: String,
    #[serde(rename = "ProductID")]
    pub product_id: String,
    pub volume_multiple: i64,
    pub price_tick: f64,
    pub expire_date: String,
    pub is_trading: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Commission {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    pub open_ratio_by_money: f64,
    pub open_ratio_by_volume: f64,
    pub close_ratio_by_money: f64,
    pub close_ratio_by_volume: f64,
    pub close_today_ratio_by_money: f64,
    pub close_today_ratio_by_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Margin {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    pub long_margin_ratio_by_money: f64,
    pub long_margin_ratio_by_volume: f64,
    pub short_margin_ratio_by_money: f64,
    pub short_margin_ratio_by_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QrySettlement {
    pub trading_day: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SettlementInfo {
    pub trading_day: String,
    #[serde(rename = "SettlementID")]
    pub settlement_id: i32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SettlementConfirm {
    pub confirm_date: String,
    pub confirm_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_uses_wire_field_names() {
        let order = InputOrder {
            order_ref: "7".to_string(),
            instrument_id: "rb2410".to_string(),
            exchange_id: "SHFE".to_string(),
            direction: Direction::Sell,
            offset: Offset::CloseToday,
            price: 3650.0,
            volume: 3,
        };
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(
            value,
            json!({
                "OrderRef": "7",
                "InstrumentID": "rb2410",
                "ExchangeID": "SHFE",
                "Direction": "SELL",
                "Offset": "CLOSE_TODAY",
                "Price": 3650.0,
                "Volume": 3
            })
        );
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let login: LoginRequest =
            serde_json::from_value(json!({"UserID": "u1", "Password": "pw"})).unwrap();
        assert_eq!(login.user_id, "u1");
        assert_eq!(login.broker_id, "");
    }

    #[test]
    fn test_direction_helpers() {
        assert_eq!(Direction::Buy.opposite(), Direction::Sell);
        assert_eq!(PosiDirection::from(Direction::Sell), PosiDirection::Short);
        assert!(OrderStatus::Cancelled.is_final());
        assert!(!OrderStatus::Queued.is_final());
    }
}
