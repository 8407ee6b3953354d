//! Market-data subscription and tick payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SubscribeMarketData {
    #[serde(rename = "InstrumentIDs")]
    pub instrument_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SpecificInstrument {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
}

/// Level-1 depth snapshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DepthMarketData {
    pub trading_day: String,
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    #[serde(rename = "ExchangeID")]
    pub exchange_id: String,
    pub last_price: f64,
    pub pre_settlement_price: f64,
    pub open_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub volume: i64,
    pub turnover: f64,
    pub open_interest: f64,
    pub bid_price1: f64,
    pub bid_volume1: i64,
    pub ask_price1: f64,
    pub ask_volume1: i64,
    pub update_time: String,
    pub update_millisec: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QryCandle {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    /// Bar length in minutes
    pub period: i32,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Candle {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    pub period: i32,
    pub open_time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub open_interest: f64,
}
