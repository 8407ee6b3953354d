//! # Message Catalogue
//!
//! The single table mapping every wire `Type` name to its kind and payload
//! shape. Requests are named `REQ_X` and answered by `RSP_REQ_X`; returns
//! (`RTN_X`) are pushed by the server outside any request.
//!
//! The wire names are an interoperability contract with existing clients and
//! must not be renamed.

use crate::common::{
    Account, Candle, Commission, DepthMarketData, InputOrder, Instrument, LoginRequest,
    LoginResponse, LogoutRequest, Margin, Order, OrderAction, Position, PositionDetail, QryAccount,
    QryCandle, QryInstrument, QryOrder, QryPosition, QrySettlement, QryTrade, SettlementConfirm,
    SettlementInfo, SpecificInstrument, SubscribeMarketData, Trade,
};
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

/// Direction of a message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Client to server, answered by a response
    Request,
    /// Server to client, correlated by `RequestID`
    Response,
    /// Server to client, unsolicited
    Return,
}

/// `Type` field that matches no known message type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown message type '{0}'")]
pub struct UnknownMessageType(pub String);

fn decode_payload<T>(value: serde_json::Value) -> Result<T, serde_json::Error>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    // `{}` stands for "no body" when the payload has no object form
    let empty_object = value.as_object().is_some_and(|map| map.is_empty());
    match serde_json::from_value(value) {
        Err(_) if empty_object => Ok(T::default()),
        decoded => decoded,
    }
}

define_messages! {
    ReqLogin = "REQ_LOGIN", Request, LoginRequest;
    RspReqLogin = "RSP_REQ_LOGIN", Response, Option<LoginResponse>;
    ReqLogout = "REQ_LOGOUT", Request, LogoutRequest;
    RspReqLogout = "RSP_REQ_LOGOUT", Response, Option<LogoutRequest>;
    ReqHeartbeat = "REQ_HEARTBEAT", Request, ();
    RspReqHeartbeat = "RSP_REQ_HEARTBEAT", Response, ();

    ReqOrderInsert = "REQ_ORDER_INSERT", Request, InputOrder;
    RspReqOrderInsert = "RSP_REQ_ORDER_INSERT", Response, Option<InputOrder>;
    ReqOrderAction = "REQ_ORDER_ACTION", Request, OrderAction;
    RspReqOrderAction = "RSP_REQ_ORDER_ACTION", Response, Option<OrderAction>;

    ReqQryAccount = "REQ_QRY_ACCOUNT", Request, QryAccount;
    RspReqQryAccount = "RSP_REQ_QRY_ACCOUNT", Response, Option<Account>;
    ReqQryPosition = "REQ_QRY_POSITION", Request, QryPosition;
    RspReqQryPosition = "RSP_REQ_QRY_POSITION", Response, Option<Position>;
    ReqQryPositionDetail = "REQ_QRY_POSITION_DETAIL", Request, QryPosition;
    RspReqQryPositionDetail = "RSP_REQ_QRY_POSITION_DETAIL", Response, Option<PositionDetail>;
    ReqQryOrder = "REQ_QRY_ORDER", Request, QryOrder;
    RspReqQryOrder = "RSP_REQ_QRY_ORDER", Response, Option<Order>;
    ReqQryTrade = "REQ_QRY_TRADE", Request, QryTrade;
    RspReqQryTrade = "RSP_REQ_QRY_TRADE", Response, Option<Trade>;
    ReqQryInstrument = "REQ_QRY_INSTRUMENT", Request, QryInstrument;
    RspReqQryInstrument = "RSP_REQ_QRY_INSTRUMENT", Response, Option<Instrument>;
    ReqQryCommission = "REQ_QRY_COMMISSION", Request, QryInstrument;
    RspReqQryCommission = "RSP_REQ_QRY_COMMISSION", Response, Option<Commission>;
    ReqQryMargin = "REQ_QRY_MARGIN", Request, QryInstrument;
    RspReqQryMargin = "RSP_REQ_QRY_MARGIN", Response, Option<Margin>;
    ReqQrySettlement = "REQ_QRY_SETTLEMENT", Request, QrySettlement;
    RspReqQrySettlement = "RSP_REQ_QRY_SETTLEMENT", Response, Option<SettlementInfo>;
    ReqSettlementConfirm = "REQ_SETTLEMENT_CONFIRM", Request, SettlementConfirm;
    RspReqSettlementConfirm = "RSP_REQ_SETTLEMENT_CONFIRM", Response, Option<SettlementConfirm>;

    ReqSubscribeMd = "REQ_SUBSCRIBE_MD", Request, SubscribeMarketData;
    RspReqSubscribeMd = "RSP_REQ_SUBSCRIBE_MD", Response, Option<SpecificInstrument>;
    ReqUnsubscribeMd = "REQ_UNSUBSCRIBE_MD", Request, SubscribeMarketData;
    RspReqUnsubscribeMd = "RSP_REQ_UNSUBSCRIBE_MD", Response, Option<SpecificInstrument>;
    ReqQryCandle = "REQ_QRY_CANDLE", Request, QryCandle;
    RspReqQryCandle = "RSP_REQ_QRY_CANDLE", Response, Option<Candle>;

    RtnOrder = "RTN_ORDER", Return, Order;
    RtnTrade = "RTN_TRADE", Return, Trade;
    RtnMarketData = "RTN_MARKET_DATA", Return, DepthMarketData;
    RtnCandle = "RTN_CANDLE", Return, Candle;
    RtnAccount = "RTN_ACCOUNT", Return, Account;
    RtnPosition = "RTN_POSITION", Return, Position;
    /// Error not attributable to a specific response type; `RspInfo` only
    RspError = "RSP_ERROR", Response, ();
}

impl MessageType {
    /// Response type answering this request type
    pub fn response_type(&self) -> Option<MessageType> {
        use MessageType::*;

        let response = match self {
            ReqLogin => RspReqLogin,
            ReqLogout => RspReqLogout,
            ReqHeartbeat => RspReqHeartbeat,
            ReqOrderInsert => RspReqOrderInsert,
            ReqOrderAction => RspReqOrderAction,
            ReqQryAccount => RspReqQryAccount,
            ReqQryPosition => RspReqQryPosition,
            ReqQryPositionDetail => RspReqQryPositionDetail,
            ReqQryOrder => RspReqQryOrder,
            ReqQryTrade => RspReqQryTrade,
            ReqQryInstrument => RspReqQryInstrument,
            ReqQryCommission => RspReqQryCommission,
            ReqQryMargin => RspReqQryMargin,
            ReqQrySettlement => RspReqQrySettlement,
            ReqSettlementConfirm => RspReqSettlementConfirm,
            ReqSubscribeMd => RspReqSubscribeMd,
            ReqUnsubscribeMd => RspReqUnsubscribeMd,
            ReqQryCandle => RspReqQryCandle,
            RspReqLogin | RspReqLogout | RspReqHeartbeat | RspReqOrderInsert
            | RspReqOrderAction | RspReqQryAccount | RspReqQryPosition
            | RspReqQryPositionDetail | RspReqQryOrder | RspReqQryTrade | RspReqQryInstrument
            | RspReqQryCommission | RspReqQryMargin | RspReqQrySettlement
            | RspReqSettlementConfirm | RspReqSubscribeMd | RspReqUnsubscribeMd
            | RspReqQryCandle | RtnOrder | RtnTrade | RtnMarketData | RtnCandle | RtnAccount
            | RtnPosition | RspError => return None,
        };
        Some(response)
    }

    pub fn is_request(&self) -> bool {
        self.kind() == MessageKind::Request
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_wire_names_are_unique_and_parse_back() {
        let mut seen = HashSet::new();
        for ty in MessageType::ALL {
            assert!(seen.insert(ty.as_str()), "duplicate wire name {}", ty);
            assert_eq!(ty.as_str().parse::<MessageType>().unwrap(), *ty);
        }
        assert_eq!(MessageType::ALL.len(), 43);
    }

    #[test]
    fn test_every_request_has_a_response_named_after_it() {
        for ty in MessageType::ALL.iter().filter(|t| t.is_request()) {
            let rsp = ty.response_type().expect("request without response type");
            assert_eq!(rsp.as_str(), format!("RSP_{}", ty.as_str()));
            assert_eq!(rsp.kind(), MessageKind::Response);
        }
        for ty in MessageType::ALL.iter().filter(|t| !t.is_request()) {
            assert_eq!(ty.response_type(), None);
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = "REQ_TELEPORT".parse::<MessageType>().unwrap_err();
        assert_eq!(err, UnknownMessageType("REQ_TELEPORT".to_string()));
        // names are case sensitive
        assert!("req_login".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_null_payload_decodes_to_default() {
        let body = Body::decode(MessageType::RspReqQryPosition, serde_json::Value::Null).unwrap();
        assert_eq!(body, Body::RspReqQryPosition(None));

        let body = Body::decode(MessageType::ReqQryAccount, serde_json::Value::Null).unwrap();
        assert_eq!(body, Body::ReqQryAccount(QryAccount::default()));

        let body = Body::decode(MessageType::ReqHeartbeat, serde_json::Value::Null).unwrap();
        assert_eq!(body, Body::ReqHeartbeat(()));
    }

    #[test]
    fn test_empty_object_is_accepted_for_bodyless_types() {
        for ty in [MessageType::ReqHeartbeat, MessageType::RspReqHeartbeat, MessageType::RspError] {
            let body = Body::decode(ty, json!({})).unwrap();
            assert_eq!(body, Body::empty(ty));
        }
        // a non-empty object is still a shape error for a unit payload
        assert!(Body::decode(MessageType::ReqHeartbeat, json!({"Extra": 1})).is_err());

        let body = Body::decode(MessageType::ReqQryAccount, json!({})).unwrap();
        assert_eq!(body, Body::ReqQryAccount(QryAccount::default()));
    }

    #[test]
    fn test_payload_shape_mismatch_fails() {
        let result = Body::decode(MessageType::ReqOrderInsert, json!({"Volume": "many"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_body_matches_its_type() {
        for ty in MessageType::ALL {
            assert_eq!(Body::empty(*ty).message_type(), *ty);
        }
    }
}
