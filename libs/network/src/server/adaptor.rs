//! # Server Message Adaptors
//!
//! A [`ServerMessageAdaptor`] has one method per request type. Every method
//! defaults to [`Flow::Continue`], so an adaptor only implements the requests
//! it serves and passes everything else down the chain.
//!
//! [`dispatch_request`] is the exhaustive request-type → method table.

use crate::session::{Responder, Session};
use std::sync::Arc;
use types::{
    Body, InputOrder, LoginRequest, LogoutRequest, Message, OrderAction, QryAccount, QryCandle,
    QryInstrument, QryOrder, QryPosition, QrySettlement, QryTrade, SettlementConfirm,
    SubscribeMarketData,
};

/// Continuation signal returned by adaptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Let the next adaptor see the request
    Continue,
    /// This adaptor claimed the request, possibly completing it later
    Stop,
}

pub type HandlerResult = anyhow::Result<Flow>;

/// Everything an adaptor needs to serve one request
pub struct RequestContext<'a> {
    session: &'a Arc<Session>,
    message: &'a Message,
    responder: Responder,
}

impl<'a> RequestContext<'a> {
    pub(crate) fn new(session: &'a Arc<Session>, message: &'a Message, responder: Responder) -> Self {
        Self {
            session,
            message,
            responder,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        self.session
    }

    pub fn message(&self) -> &Message {
        self.message
    }

    pub fn request_id(&self) -> &str {
        &self.message.request_id
    }

    pub fn current_count(&self) -> i32 {
        self.message.current_count
    }

    pub fn total_count(&self) -> i32 {
        self.message.total_count
    }

    /// Handle driving this request's response; clone it to answer later
    pub fn responder(&self) -> &Responder {
        &self.responder
    }
}

pub trait ServerMessageAdaptor: Send + Sync {
    /// Name used in logs and error events
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn on_req_login(&self, _ctx: &RequestContext<'_>, _req: &LoginRequest) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_logout(&self, _ctx: &RequestContext<'_>, _req: &LogoutRequest) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_heartbeat(&self, _ctx: &RequestContext<'_>) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_order_insert(&self, _ctx: &RequestContext<'_>, _req: &InputOrder) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_order_action(&self, _ctx: &RequestContext<'_>, _req: &OrderAction) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_account(&self, _ctx: &RequestContext<'_>, _req: &QryAccount) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_position(&self, _ctx: &RequestContext<'_>, _req: &QryPosition) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_position_detail(
        &self,
        _ctx: &RequestContext<'_>,
        _req: &QryPosition,
    ) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_order(&self, _ctx: &RequestContext<'_>, _req: &QryOrder) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_trade(&self, _ctx: &RequestContext<'_>, _req: &QryTrade) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_instrument(
        &self,
        _ctx: &RequestContext<'_>,
        _req: &QryInstrument,
    ) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_commission(
        &self,
        _ctx: &RequestContext<'_>,
        _req: &QryInstrument,
    ) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_margin(&self, _ctx: &RequestContext<'_>, _req: &QryInstrument) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_settlement(
        &self,
        _ctx: &RequestContext<'_>,
        _req: &QrySettlement,
    ) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_settlement_confirm(
        &self,
        _ctx: &RequestContext<'_>,
        _req: &SettlementConfirm,
    ) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_subscribe_md(
        &self,
        _ctx: &RequestContext<'_>,
        _req: &SubscribeMarketData,
    ) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_unsubscribe_md(
        &self,
        _ctx: &RequestContext<'_>,
        _req: &SubscribeMarketData,
    ) -> HandlerResult {
        Ok(Flow::Continue)
    }

    fn on_req_qry_candle(&self, _ctx: &RequestContext<'_>, _req: &QryCandle) -> HandlerResult {
        Ok(Flow::Continue)
    }
}

/// Route the context's request to the matching adaptor method
pub fn dispatch_request(
    adaptor: &dyn ServerMessageAdaptor,
    ctx: &RequestContext<'_>,
) -> HandlerResult {
    match &ctx.message().body {
        Body::ReqLogin(req) => adaptor.on_req_login(ctx, req),
        Body::ReqLogout(req) => adaptor.on_req_logout(ctx, req),
        Body::ReqHeartbeat(()) => adaptor.on_req_heartbeat(ctx),
        Body::ReqOrderInsert(req) => adaptor.on_req_order_insert(ctx, req),
        Body::ReqOrderAction(req) => adaptor.on_req_order_action(ctx, req),
        Body::ReqQryAccount(req) => adaptor.on_req_qry_account(ctx, req),
        Body::ReqQryPosition(req) => adaptor.on_req_qry_position(ctx, req),
        Body::ReqQryPositionDetail(req) => adaptor.on_req_qry_position_detail(ctx, req),
        Body::ReqQryOrder(req) => adaptor.on_req_qry_order(ctx, req),
        Body::ReqQryTrade(req) => adaptor.on_req_qry_trade(ctx, req),
        Body::ReqQryInstrument(req) => adaptor.on_req_qry_instrument(ctx, req),
        Body::ReqQryCommission(req) => adaptor.on_req_qry_commission(ctx, req),
        Body::ReqQryMargin(req) => adaptor.on_req_qry_margin(ctx, req),
        Body::ReqQrySettlement(req) => adaptor.on_req_qry_settlement(ctx, req),
        Body::ReqSettlementConfirm(req) => adaptor.on_req_settlement_confirm(ctx, req),
        Body::ReqSubscribeMd(req) => adaptor.on_req_subscribe_md(ctx, req),
        Body::ReqUnsubscribeMd(req) => adaptor.on_req_unsubscribe_md(ctx, req),
        Body::ReqQryCandle(req) => adaptor.on_req_qry_candle(ctx, req),

        Body::RspReqLogin(_)
        | Body::RspReqLogout(_)
        | Body::RspReqHeartbeat(_)
        | Body::RspReqOrderInsert(_)
        | Body::RspReqOrderAction(_)
        | Body::RspReqQryAccount(_)
        | Body::RspReqQryPosition(_)
        | Body::RspReqQryPositionDetail(_)
        | Body::RspReqQryOrder(_)
        | Body::RspReqQryTrade(_)
        | Body::RspReqQryInstrument(_)
        | Body::RspReqQryCommission(_)
        | Body::RspReqQryMargin(_)
        | Body::RspReqQrySettlement(_)
        | Body::RspReqSettlementConfirm(_)
        | Body::RspReqSubscribeMd(_)
        | Body::RspReqUnsubscribeMd(_)
        | Body::RspReqQryCandle(_)
        | Body::RtnOrder(_)
        | Body::RtnTrade(_)
        | Body::RtnMarketData(_)
        | Body::RtnCandle(_)
        | Body::RtnAccount(_)
        | Body::RtnPosition(_)
        | Body::RspError(_) => {
            anyhow::bail!("{} is not a request", ctx.message().message_type())
        }
    }
}
