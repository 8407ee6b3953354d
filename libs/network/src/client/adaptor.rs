//! # Client Message Adaptors
//!
//! One method per response or return type, each defaulting to a no-op.
//! [`dispatch_response`] is the exhaustive type → method table.

use crate::session::Session;
use std::sync::Arc;
use types::{
    Account, Body, Candle, Commission, DepthMarketData, InputOrder, Instrument, LoginResponse,
    LogoutRequest, Margin, Message, Order, OrderAction, Position, PositionDetail,
    SettlementConfirm, SettlementInfo, SpecificInstrument, Trade,
};

pub type CallbackResult = anyhow::Result<()>;

pub trait ClientMessageAdaptor: Send + Sync {
    /// Observes every decoded message before routing
    fn on_message(&self, _session: &Arc<Session>, _message: &Message) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_login(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<LoginResponse>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_logout(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<LogoutRequest>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_heartbeat(&self, _session: &Arc<Session>, _message: &Message) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_order_insert(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<InputOrder>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_order_action(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<OrderAction>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_account(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<Account>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_position(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<Position>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_position_detail(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<PositionDetail>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_order(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<Order>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_trade(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<Trade>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_instrument(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<Instrument>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_commission(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<Commission>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_margin(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<Margin>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_settlement(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<SettlementInfo>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_settlement_confirm(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<SettlementConfirm>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_subscribe_md(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<SpecificInstrument>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_unsubscribe_md(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<SpecificInstrument>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rsp_req_qry_candle(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Option<Candle>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rtn_order(&self, _session: &Arc<Session>, _message: &Message, _payload: &Order) -> CallbackResult {
        Ok(())
    }

    fn on_rtn_trade(&self, _session: &Arc<Session>, _message: &Message, _payload: &Trade) -> CallbackResult {
        Ok(())
    }

    fn on_rtn_market_data(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &DepthMarketData,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rtn_candle(&self, _session: &Arc<Session>, _message: &Message, _payload: &Candle) -> CallbackResult {
        Ok(())
    }

    fn on_rtn_account(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Account,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_rtn_position(
        &self,
        _session: &Arc<Session>,
        _message: &Message,
        _payload: &Position,
    ) -> CallbackResult {
        Ok(())
    }

    /// Error not tied to a specific response type; details in `RspInfo`
    fn on_rsp_error(&self, _session: &Arc<Session>, _message: &Message) -> CallbackResult {
        Ok(())
    }
}

/// Route a response or return to the matching adaptor method
pub fn dispatch_response(
    adaptor: &dyn ClientMessageAdaptor,
    session: &Arc<Session>,
    message: &Message,
) -> CallbackResult {
    let m = message;
    match &message.body {
        Body::RspReqLogin(p) => adaptor.on_rsp_req_login(session, m, p),
        Body::RspReqLogout(p) => adaptor.on_rsp_req_logout(session, m, p),
        Body::RspReqHeartbeat(()) => adaptor.on_rsp_req_heartbeat(session, m),
        Body::RspReqOrderInsert(p) => adaptor.on_rsp_req_order_insert(session, m, p),
        Body::RspReqOrderAction(p) => adaptor.on_rsp_req_order_action(session, m, p),
        Body::RspReqQryAccount(p) => adaptor.on_rsp_req_qry_account(session, m, p),
        Body::RspReqQryPosition(p) => adaptor.on_rsp_req_qry_position(session, m, p),
        Body::RspReqQryPositionDetail(p) => adaptor.on_rsp_req_qry_position_detail(session, m, p),
        Body::RspReqQryOrder(p) => adaptor.on_rsp_req_qry_order(session, m, p),
        Body::RspReqQryTrade(p) => adaptor.on_rsp_req_qry_trade(session, m, p),
        Body::RspReqQryInstrument(p) => adaptor.on_rsp_req_qry_instrument(session, m, p),
        Body::RspReqQryCommission(p) => adaptor.on_rsp_req_qry_commission(session, m, p),
        Body::RspReqQryMargin(p) => adaptor.on_rsp_req_qry_margin(session, m, p),
        Body::RspReqQrySettlement(p) => adaptor.on_rsp_req_qry_settlement(session, m, p),
        Body::RspReqSettlementConfirm(p) => adaptor.on_rsp_req_settlement_confirm(session, m, p),
        Body::RspReqSubscribeMd(p) => adaptor.on_rsp_req_subscribe_md(session, m, p),
        Body::RspReqUnsubscribeMd(p) => adaptor.on_rsp_req_unsubscribe_md(session, m, p),
        Body::RspReqQryCandle(p) => adaptor.on_rsp_req_qry_candle(session, m, p),
        Body::RtnOrder(p) => adaptor.on_rtn_order(session, m, p),
        Body::RtnTrade(p) => adaptor.on_rtn_trade(session, m, p),
        Body::RtnMarketData(p) => adaptor.on_rtn_market_data(session, m, p),
        Body::RtnCandle(p) => adaptor.on_rtn_candle(session, m, p),
        Body::RtnAccount(p) => adaptor.on_rtn_account(session, m, p),
        Body::RtnPosition(p) => adaptor.on_rtn_position(session, m, p),
        Body::RspError(()) => adaptor.on_rsp_error(session, m),

        Body::ReqLogin(_)
        | Body::ReqLogout(_)
        | Body::ReqHeartbeat(_)
        | Body::ReqOrderInsert(_)
        | Body::ReqOrderAction(_)
        | Body::ReqQryAccount(_)
        | Body::ReqQryPosition(_)
        | Body::ReqQryPositionDetail(_)
        | Body::ReqQryOrder(_)
        | Body::ReqQryTrade(_)
        | Body::ReqQryInstrument(_)
        | Body::ReqQryCommission(_)
        | Body::ReqQrySettlement(_)
        | Body::ReqSettlementConfirm(_)
        | Body::ReqQryMargin(_)
        | Body::ReqSubscribeMd(_)
        | Body::ReqUnsubscribeMd(_)
        | Body::ReqQryCandle(_) => {
            anyhow::bail!("{} is not a response", message.message_type())
        }
    }
}
