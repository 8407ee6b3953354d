//! # Paper Trading
//!
//! In-memory execution against the last published price. Each user owns a
//! ledger of orders, trades, positions and an account.
//!
//! An order that crosses the last price (or any order when the instrument has
//! no price yet) fills in full immediately; otherwise it rests until
//! cancelled. Open orders freeze margin; closing orders need enough position.

use crate::login::UserIdentity;
use crate::market_data::MarketDataRouter;
use chrono::Local;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use network::{Flow, HandlerResult, RequestContext, ServerMessageAdaptor, Session};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use types::{
    Account, ActionFlag, Body, Commission, Direction, ErrorCode, InputOrder, Instrument,
    LogoutRequest, Margin, Message, Offset, Order, OrderAction, OrderStatus, PosiDirection,
    Position, PositionDetail, QryAccount, QryInstrument, QryOrder, QryPosition, QrySettlement,
    QryTrade, SettlementConfirm, SettlementInfo, Trade,
};

pub const DEFAULT_BALANCE: f64 = 1_000_000.0;
pub const MARGIN_RATIO: f64 = 0.1;
pub const COMMISSION_RATIO: f64 = 0.0001;

fn default_instruments() -> Vec<Instrument> {
    let instrument = |id: &str, exchange: &str, product: &str, multiple: i64, tick: f64| Instrument {
        instrument_id: id.to_string(),
        exchange_id: exchange.to_string(),
        product_id: product.to_string(),
        volume_multiple: multiple,
        price_tick: tick,
        expire_date: String::new(),
        is_trading: true,
    };
    vec![
        instrument("rb2410", "SHFE", "rb", 10, 1.0),
        instrument("au2412", "SHFE", "au", 1000, 0.02),
        instrument("IF2409", "CFFEX", "IF", 300, 0.2),
    ]
}

#[derive(Debug)]
struct Fill {
    order: Order,
    trade: Option<Trade>,
}

#[derive(Debug, Default)]
struct Ledger {
    account: Account,
    orders: Vec<Order>,
    trades: Vec<Trade>,
    positions: Vec<Position>,
    details: Vec<PositionDetail>,
    /// Margin frozen by resting open orders, by order sys id
    frozen: HashMap<String, f64>,
    confirmed: Option<SettlementConfirm>,
}

impl Ledger {
    fn new(account_id: &str, balance: f64) -> Self {
        Self {
            account: Account {
                account_id: account_id.to_string(),
                pre_balance: balance,
                balance,
                available: balance,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn recompute(&mut self) {
        let account = &mut self.account;
        account.frozen_margin = self.frozen.values().sum();
        account.balance = account.pre_balance + account.close_profit - account.commission;
        account.available = account.balance - account.curr_margin - account.frozen_margin;
    }

    fn position_mut(&mut self, instrument_id: &str, direction: PosiDirection) -> &mut Position {
        let index = match self
            .positions
            .iter()
            .position(|p| p.instrument_id == instrument_id && p.posi_direction == direction)
        {
            Some(index) => index,
            None => {
                self.positions.push(Position {
                    instrument_id: instrument_id.to_string(),
                    posi_direction: direction,
                    ..Default::default()
                });
                self.positions.len() - 1
            }
        };
        &mut self.positions[index]
    }

    fn held(&self, instrument_id: &str, direction: PosiDirection) -> i64 {
        self.positions
            .iter()
            .filter(|p| p.instrument_id == instrument_id && p.posi_direction == direction)
            .map(|p| p.position)
            .sum()
    }

    /// Fill `order` in full at `price`
    fn fill(&mut self, order: &mut Order, price: f64, multiple: f64, trade_id: String) -> Trade {
        let now = Local::now();
        let volume = order.volume_total_original;
        let turnover = price * volume as f64 * multiple;

        match order.offset {
            Offset::Open => {
                let margin = turnover * MARGIN_RATIO;
                let position = self.position_mut(&order.instrument_id, order.direction.into());
                position.position += volume;
                position.today_position += volume;
                position.open_cost += turnover;
                position.use_margin += margin;
                self.account.curr_margin += margin;
                self.details.push(PositionDetail {
                    instrument_id: order.instrument_id.clone(),
                    trade_id: trade_id.clone(),
                    direction: order.direction,
                    open_date: now.format("%Y%m%d").to_string(),
                    open_price: price,
                    volume,
                    margin,
                });
            }
            Offset::Close | Offset::CloseToday | Offset::CloseYesterday => {
                let direction = PosiDirection::from(order.direction.opposite());
                let position = self.position_mut(&order.instrument_id, direction);
                let held = position.position.max(1) as f64;
                let average = position.open_cost / (held * multiple);
                let released = position.use_margin * volume as f64 / held;
                let per_unit = match direction {
                    PosiDirection::Long => price - average,
                    PosiDirection::Short => average - price,
                };

                position.position -= volume;
                position.open_cost -= average * volume as f64 * multiple;
                position.use_margin -= released;
                let from_today = volume.min(position.today_position);
                position.today_position -= from_today;
                position.yd_position = (position.yd_position - (volume - from_today)).max(0);

                self.account.curr_margin -= released;
                self.account.close_profit += per_unit * volume as f64 * multiple;
                self.positions.retain(|p| p.position > 0);
                self.release_details(&order.instrument_id, order.direction.opposite(), volume);
            }
        }

        self.account.commission += turnover * COMMISSION_RATIO;
        self.recompute();

        order.volume_traded = volume;
        order.status = OrderStatus::Filled;
        order.status_msg = "filled".to_string();

        let trade = Trade {
            trade_id,
            order_ref: order.order_ref.clone(),
            order_sys_id: order.order_sys_id.clone(),
            instrument_id: order.instrument_id.clone(),
            direction: order.direction,
            offset: order.offset,
            price,
            volume,
            trade_time: now.format("%H:%M:%S").to_string(),
        };
        self.trades.push(trade.clone());
        trade
    }

    /// Consume opening details first in, first out
    fn release_details(&mut self, instrument_id: &str, opened: Direction, mut volume: i64) {
        for detail in self
            .details
            .iter_mut()
            .filter(|d| d.instrument_id == instrument_id && d.direction == opened)
        {
            if volume == 0 {
                break;
            }
            let taken = volume.min(detail.volume);
            detail.margin -= detail.margin * taken as f64 / detail.volume as f64;
            detail.volume -= taken;
            volume -= taken;
        }
        self.details.retain(|d| d.volume > 0);
    }
}

pub struct PaperTradingAdaptor {
    market: Arc<MarketDataRouter>,
    instruments: Vec<Instrument>,
    ledgers: DashMap<String, Ledger>,
    initial_balance: f64,
    next_order_id: AtomicU64,
    next_trade_id: AtomicU64,
}

impl PaperTradingAdaptor {
    pub fn new(market: Arc<MarketDataRouter>) -> Self {
        Self {
            market,
            instruments: default_instruments(),
            ledgers: DashMap::new(),
            initial_balance: DEFAULT_BALANCE,
            next_order_id: AtomicU64::new(1),
            next_trade_id: AtomicU64::new(1),
        }
    }

    pub fn with_instruments(mut self, instruments: Vec<Instrument>) -> Self {
        self.instruments = instruments;
        self
    }

    pub fn with_initial_balance(mut self, balance: f64) -> Self {
        self.initial_balance = balance;
        self
    }

    pub fn instrument(&self, instrument_id: &str) -> Option<&Instrument> {
        self.instruments
            .iter()
            .find(|i| i.instrument_id == instrument_id)
    }

    fn ledger(&self, account_id: &str) -> RefMut<'_, String, Ledger> {
        self.ledgers
            .entry(account_id.to_string())
            .or_insert_with(|| Ledger::new(account_id, self.initial_balance))
    }

    /// Apply an order to the ledger; `Err` carries the rejection reason
    fn execute(&self, ledger: &mut Ledger, instrument: &Instrument, req: &InputOrder) -> Result<Fill, String> {
        let multiple = instrument.volume_multiple as f64;
        let notional = req.price * req.volume as f64 * multiple;

        match req.offset {
            Offset::Open => {
                let required = notional * (MARGIN_RATIO + COMMISSION_RATIO);
                if ledger.account.available < required {
                    return Err(format!(
                        "insufficient funds: need {:.2}, available {:.2}",
                        required, ledger.account.available
                    ));
                }
            }
            Offset::Close | Offset::CloseToday | Offset::CloseYesterday => {
                let held = ledger.held(&req.instrument_id, req.direction.opposite().into());
                if held < req.volume {
                    return Err(format!(
                        "insufficient position: holding {}, closing {}",
                        held, req.volume
                    ));
                }
            }
        }

        let fill_price = match self.market.last_price(&req.instrument_id) {
            None => Some(req.price),
            Some(last) => match req.direction {
                Direction::Buy if req.price >= last => Some(last),
                Direction::Sell if req.price <= last => Some(last),
                _ => None,
            },
        };

        let mut order = Order {
            order_ref: req.order_ref.clone(),
            order_sys_id: format!("{:012}", self.next_order_id.fetch_add(1, Ordering::Relaxed)),
            instrument_id: req.instrument_id.clone(),
            exchange_id: instrument.exchange_id.clone(),
            direction: req.direction,
            offset: req.offset,
            price: req.price,
            volume_total_original: req.volume,
            volume_traded: 0,
            status: OrderStatus::Queued,
            status_msg: "queued".to_string(),
            insert_time: Local::now().format("%H:%M:%S").to_string(),
        };

        let trade = match fill_price {
            Some(price) => {
                let trade_id = format!("{:08}", self.next_trade_id.fetch_add(1, Ordering::Relaxed));
                Some(ledger.fill(&mut order, price, multiple, trade_id))
            }
            None => {
                if req.offset == Offset::Open {
                    ledger
                        .frozen
                        .insert(order.order_sys_id.clone(), notional * MARGIN_RATIO);
                    ledger.recompute();
                }
                None
            }
        };

        ledger.orders.push(order.clone());
        Ok(Fill { order, trade })
    }

    /// Positions with profit marked to the last price
    fn marked_positions(&self, ledger: &Ledger) -> Vec<Position> {
        ledger
            .positions
            .iter()
            .map(|p| {
                let mut position = p.clone();
                let multiple = self
                    .instrument(&p.instrument_id)
                    .map_or(1.0, |i| i.volume_multiple as f64);
                if let Some(last) = self.market.last_price(&p.instrument_id) {
                    let value = last * p.position as f64 * multiple;
                    position.position_profit = match p.posi_direction {
                        PosiDirection::Long => value - p.open_cost,
                        PosiDirection::Short => p.open_cost - value,
                    };
                }
                position
            })
            .collect()
    }

    fn instruments_matching<'a>(&'a self, req: &'a QryInstrument) -> impl Iterator<Item = &'a Instrument> + 'a {
        self.instruments.iter().filter(move |i| {
            (req.instrument_id.is_empty() || i.instrument_id == req.instrument_id)
                && (req.exchange_id.is_empty() || i.exchange_id == req.exchange_id)
        })
    }
}

/// Ledger key for the session: the logged-in user, or the session itself
fn account_id(session: &Session) -> String {
    UserIdentity::of(session)
        .map(|identity| identity.user_id.clone())
        .unwrap_or_else(|| format!("session-{}", session.id()))
}

impl ServerMessageAdaptor for PaperTradingAdaptor {
    fn name(&self) -> &str {
        "paper-trading"
    }

    fn on_req_logout(&self, ctx: &RequestContext<'_>, req: &LogoutRequest) -> HandlerResult {
        let user_id = if req.user_id.is_empty() {
            account_id(ctx.session())
        } else {
            req.user_id.clone()
        };
        ctx.responder()
            .reply(Body::RspReqLogout(Some(LogoutRequest { user_id: user_id.clone() })))?;
        ctx.session().mark_logged_out();
        info!(session = ctx.session().id(), user = %user_id, "User logged out");
        Ok(Flow::Stop)
    }

    fn on_req_heartbeat(&self, ctx: &RequestContext<'_>) -> HandlerResult {
        ctx.responder().reply(Body::RspReqHeartbeat(()))?;
        Ok(Flow::Stop)
    }

    fn on_req_order_insert(&self, ctx: &RequestContext<'_>, req: &InputOrder) -> HandlerResult {
        let responder = ctx.responder();
        if req.volume <= 0 || req.price <= 0.0 {
            responder.reply_error(ErrorCode::InvalidRequest, "price and volume must be positive")?;
            return Ok(Flow::Stop);
        }
        let Some(instrument) = self.instrument(&req.instrument_id) else {
            responder.reply_error(
                ErrorCode::InstrumentNotFound,
                format!("unknown instrument '{}'", req.instrument_id),
            )?;
            return Ok(Flow::Stop);
        };

        let account = account_id(ctx.session());
        let (outcome, snapshot) = {
            let mut ledger = self.ledger(&account);
            let outcome = self.execute(&mut ledger, instrument, req);
            (outcome, ledger.account.clone())
        };

        match outcome {
            Err(reason) => {
                debug!(session = ctx.session().id(), account = %account, "Order rejected: {}", reason);
                responder.reply_error(ErrorCode::OrderRejected, reason)?;
            }
            Ok(Fill { order, trade }) => {
                responder.reply(Body::RspReqOrderInsert(Some(req.clone())))?;
                let session = ctx.session();
                session.push(&Message::push(Body::RtnOrder(order)))?;
                if let Some(trade) = trade {
                    session.push(&Message::push(Body::RtnTrade(trade)))?;
                    session.push(&Message::push(Body::RtnAccount(snapshot)))?;
                }
            }
        }
        Ok(Flow::Stop)
    }

    fn on_req_order_action(&self, ctx: &RequestContext<'_>, req: &OrderAction) -> HandlerResult {
        let responder = ctx.responder();
        if req.action != ActionFlag::Cancel {
            responder.reply_error(ErrorCode::InvalidRequest, "only cancel is supported")?;
            return Ok(Flow::Stop);
        }

        let outcome = {
            let mut ledger = self.ledger(&account_id(ctx.session()));
            let found = ledger.orders.iter().position(|o| {
                if req.order_sys_id.is_empty() {
                    o.order_ref == req.order_ref && o.instrument_id == req.instrument_id
                } else {
                    o.order_sys_id == req.order_sys_id
                }
            });
            match found {
                None => Err((ErrorCode::OrderNotFound, "no such order".to_string())),
                Some(index) if ledger.orders[index].status.is_final() => Err((
                    ErrorCode::OrderRejected,
                    format!("order already {:?}", ledger.orders[index].status),
                )),
                Some(index) => {
                    let order = &mut ledger.orders[index];
                    order.status = OrderStatus::Cancelled;
                    order.status_msg = "cancelled".to_string();
                    let cancelled = order.clone();
                    ledger.frozen.remove(&cancelled.order_sys_id);
                    ledger.recompute();
                    Ok(cancelled)
                }
            }
        };

        match outcome {
            Err((code, reason)) => responder.reply_error(code, reason)?,
            Ok(order) => {
                responder.reply(Body::RspReqOrderAction(Some(req.clone())))?;
                ctx.session().push(&Message::push(Body::RtnOrder(order)))?;
            }
        }
        Ok(Flow::Stop)
    }

    fn on_req_qry_account(&self, ctx: &RequestContext<'_>, _req: &QryAccount) -> HandlerResult {
        let account = {
            let ledger = self.ledger(&account_id(ctx.session()));
            let mut account = ledger.account.clone();
            account.position_profit = self
                .marked_positions(&ledger)
                .iter()
                .map(|p| p.position_profit)
                .sum();
            account
        };
        ctx.responder()
            .reply_all([Body::RspReqQryAccount(Some(account))])?;
        Ok(Flow::Stop)
    }

    fn on_req_qry_position(&self, ctx: &RequestContext<'_>, req: &QryPosition) -> HandlerResult {
        let positions = {
            let ledger = self.ledger(&account_id(ctx.session()));
            self.marked_positions(&ledger)
        };
        let bodies = positions
            .into_iter()
            .filter(|p| req.instrument_id.is_empty() || p.instrument_id == req.instrument_id)
            .map(|p| Body::RspReqQryPosition(Some(p)));
        ctx.responder().reply_all(bodies)?;
        Ok(Flow::Stop)
    }

    fn on_req_qry_position_detail(&self, ctx: &RequestContext<'_>, req: &QryPosition) -> HandlerResult {
        let details = self.ledger(&account_id(ctx.session())).details.clone();
        let bodies = details
            .into_iter()
            .filter(|d| req.instrument_id.is_empty() || d.instrument_id == req.instrument_id)
            .map(|d| Body::RspReqQryPositionDetail(Some(d)));
        ctx.responder().reply_all(bodies)?;
        Ok(Flow::Stop)
    }

    fn on_req_qry_order(&self, ctx: &RequestContext<'_>, req: &QryOrder) -> HandlerResult {
        let orders = self.ledger(&account_id(ctx.session())).orders.clone();
        let bodies = orders
            .into_iter()
            .filter(|o| req.instrument_id.is_empty() || o.instrument_id == req.instrument_id)
            .filter(|o| req.order_sys_id.is_empty() || o.order_sys_id == req.order_sys_id)
            .map(|o| Body::RspReqQryOrder(Some(o)));
        ctx.responder().reply_all(bodies)?;
        Ok(Flow::Stop)
    }

    fn on_req_qry_trade(&self, ctx: &RequestContext<'_>, req: &QryTrade) -> HandlerResult {
        let trades = self.ledger(&account_id(ctx.session())).trades.clone();
        let bodies = trades
            .into_iter()
            .filter(|t| req.instrument_id.is_empty() || t.instrument_id == req.instrument_id)
            .filter(|t| req.trade_id.is_empty() || t.trade_id == req.trade_id)
            .map(|t| Body::RspReqQryTrade(Some(t)));
        ctx.responder().reply_all(bodies)?;
        Ok(Flow::Stop)
    }

    fn on_req_qry_instrument(&self, ctx: &RequestContext<'_>, req: &QryInstrument) -> HandlerResult {
        let bodies: Vec<Body> = self
            .instruments_matching(req)
            .map(|i| Body::RspReqQryInstrument(Some(i.clone())))
            .collect();
        ctx.responder().reply_all(bodies)?;
        Ok(Flow::Stop)
    }

    fn on_req_qry_commission(&self, ctx: &RequestContext<'_>, req: &QryInstrument) -> HandlerResult {
        let bodies: Vec<Body> = self
            .instruments_matching(req)
            .map(|i| {
                Body::RspReqQryCommission(Some(Commission {
                    instrument_id: i.instrument_id.clone(),
                    open_ratio_by_money: COMMISSION_RATIO,
                    close_ratio_by_money: COMMISSION_RATIO,
                    close_today_ratio_by_money: COMMISSION_RATIO,
                    ..Default::default()
                }))
            })
            .collect();
        ctx.responder().reply_all(bodies)?;
        Ok(Flow::Stop)
    }

    fn on_req_qry_margin(&self, ctx: &RequestContext<'_>, req: &QryInstrument) -> HandlerResult {
        let bodies: Vec<Body> = self
            .instruments_matching(req)
            .map(|i| {
                Body::RspReqQryMargin(Some(Margin {
                    instrument_id: i.instrument_id.clone(),
                    long_margin_ratio_by_money: MARGIN_RATIO,
                    short_margin_ratio_by_money: MARGIN_RATIO,
                    ..Default::default()
                }))
            })
            .collect();
        ctx.responder().reply_all(bodies)?;
        Ok(Flow::Stop)
    }

    fn on_req_qry_settlement(&self, ctx: &RequestContext<'_>, req: &QrySettlement) -> HandlerResult {
        let trading_day = if req.trading_day.is_empty() {
            Local::now().format("%Y%m%d").to_string()
        } else {
            req.trading_day.clone()
        };
        let content = {
            let ledger = self.ledger(&account_id(ctx.session()));
            let a = &ledger.account;
            let confirmed = ledger
                .confirmed
                .as_ref()
                .map_or_else(|| "no".to_string(), |c| format!("{} {}", c.confirm_date, c.confirm_time));
            format!(
                "Account {}\nPre-balance {:.2}\nClose profit {:.2}\nCommission {:.2}\nBalance {:.2}\nMargin {:.2}\nTrades {}\nConfirmed {}",
                a.account_id,
                a.pre_balance,
                a.close_profit,
                a.commission,
                a.balance,
                a.curr_margin,
                ledger.trades.len(),
                confirmed
            )
        };
        ctx.responder().reply(Body::RspReqQrySettlement(Some(SettlementInfo {
            trading_day,
            settlement_id: 1,
            content,
        })))?;
        Ok(Flow::Stop)
    }

    fn on_req_settlement_confirm(&self, ctx: &RequestContext<'_>, _req: &SettlementConfirm) -> HandlerResult {
        let now = Local::now();
        let confirm = SettlementConfirm {
            confirm_date: now.format("%Y%m%d").to_string(),
            confirm_time: now.format("%H:%M:%S").to_string(),
        };
        self.ledger(&account_id(ctx.session())).confirmed = Some(confirm.clone());
        ctx.responder()
            .reply(Body::RspReqSettlementConfirm(Some(confirm)))?;
        Ok(Flow::Stop)
    }
}
