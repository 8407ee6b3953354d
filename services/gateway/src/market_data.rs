//! # Market Data Distribution
//!
//! [`MarketDataRouter`] fans `RTN_MARKET_DATA` out to subscribed sessions and
//! keeps the last tick plus one-minute candles per instrument.
//!
//! A session's subscription is anchored by a [`SubscriptionGuard`] stored in
//! its attributes. The session releases its attributes when it closes, and
//! dropping the guard unregisters the session from the router.

use dashmap::DashMap;
use network::{Flow, HandlerResult, RequestContext, ServerMessageAdaptor, Session};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};
use types::{
    Body, Candle, DepthMarketData, ErrorCode, Message, QryCandle, SpecificInstrument,
    SubscribeMarketData,
};

/// Session attribute holding the [`SubscriptionGuard`]
pub const SUBSCRIPTION_KEY: &str = "gateway.md_subscription";

pub const CANDLE_PERIOD_SECS: i32 = 60;

/// Candles retained per instrument
const MAX_CANDLES: usize = 1440;

struct Subscriber {
    session: Weak<Session>,
    instruments: HashSet<String>,
}

#[derive(Default)]
pub struct MarketDataRouter {
    subscribers: DashMap<u64, Subscriber>,
    last_ticks: DashMap<String, DepthMarketData>,
    candles: DashMap<String, VecDeque<Candle>>,
}

/// Unregisters its session from the router on drop
pub struct SubscriptionGuard {
    router: Weak<MarketDataRouter>,
    session_id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(router) = self.router.upgrade() {
            router.unregister(self.session_id);
        }
    }
}

impl MarketDataRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add `instruments` to the session's subscription; returns those not already subscribed
    pub fn subscribe(self: &Arc<Self>, session: &Arc<Session>, instruments: &[String]) -> Vec<String> {
        if session.attribute::<SubscriptionGuard>(SUBSCRIPTION_KEY).is_none() {
            session.set_attribute(
                SUBSCRIPTION_KEY,
                SubscriptionGuard {
                    router: Arc::downgrade(self),
                    session_id: session.id(),
                },
            );
        }

        let mut subscriber = self
            .subscribers
            .entry(session.id())
            .or_insert_with(|| Subscriber {
                session: Arc::downgrade(session),
                instruments: HashSet::new(),
            });
        let added: Vec<String> = instruments
            .iter()
            .filter(|id| subscriber.instruments.insert((*id).clone()))
            .cloned()
            .collect();

        debug!(session = session.id(), added = added.len(), "Market data subscribed");
        added
    }

    /// Remove `instruments` from the session's subscription; returns those that were subscribed
    pub fn unsubscribe(&self, session_id: u64, instruments: &[String]) -> Vec<String> {
        let Some(mut subscriber) = self.subscribers.get_mut(&session_id) else {
            return Vec::new();
        };
        instruments
            .iter()
            .filter(|id| subscriber.instruments.remove(id.as_str()))
            .cloned()
            .collect()
    }

    /// Instruments the session is subscribed to, sorted
    pub fn subscriptions(&self, session_id: u64) -> Vec<String> {
        let mut instruments: Vec<String> = self
            .subscribers
            .get(&session_id)
            .map(|s| s.instruments.iter().cloned().collect())
            .unwrap_or_default();
        instruments.sort();
        instruments
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Record a tick and push it to every live subscriber; returns the number reached
    pub fn publish(&self, tick: DepthMarketData) -> usize {
        let prev_volume = self
            .last_ticks
            .get(&tick.instrument_id)
            .map(|t| t.volume);
        self.update_candle(&tick, prev_volume);
        self.last_ticks.insert(tick.instrument_id.clone(), tick.clone());

        let targets: Vec<Arc<Session>> = self
            .subscribers
            .iter()
            .filter(|s| s.instruments.contains(&tick.instrument_id))
            .filter_map(|s| s.session.upgrade())
            .collect();

        let message = Message::push(Body::RtnMarketData(tick));
        let mut delivered = 0;
        for session in targets {
            match session.push(&message) {
                Ok(()) => delivered += 1,
                Err(e) => trace!(session = session.id(), "Tick not delivered: {}", e),
            }
        }
        delivered
    }

    pub fn last_tick(&self, instrument_id: &str) -> Option<DepthMarketData> {
        self.last_ticks.get(instrument_id).map(|t| t.value().clone())
    }

    pub fn last_price(&self, instrument_id: &str) -> Option<f64> {
        self.last_ticks.get(instrument_id).map(|t| t.last_price)
    }

    /// One-minute candles for the instrument, oldest first
    pub fn candles(&self, instrument_id: &str) -> Vec<Candle> {
        self.candles
            .get(instrument_id)
            .map(|series| series.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn update_candle(&self, tick: &DepthMarketData, prev_volume: Option<i64>) {
        // tick volume is cumulative for the trading day
        let traded = prev_volume.map_or(0, |prev| (tick.volume - prev).max(0));
        let open_time = candle_open_time(tick);

        let mut series = self.candles.entry(tick.instrument_id.clone()).or_default();
        if let Some(candle) = series.back_mut().filter(|c| c.open_time == open_time) {
            candle.high = candle.high.max(tick.last_price);
            candle.low = candle.low.min(tick.last_price);
            candle.close = tick.last_price;
            candle.volume += traded;
            candle.open_interest = tick.open_interest;
            return;
        }

        series.push_back(Candle {
            instrument_id: tick.instrument_id.clone(),
            period: CANDLE_PERIOD_SECS,
            open_time,
            open: tick.last_price,
            high: tick.last_price,
            low: tick.last_price,
            close: tick.last_price,
            volume: traded,
            open_interest: tick.open_interest,
        });
        if series.len() > MAX_CANDLES {
            series.pop_front();
        }
    }

    fn unregister(&self, session_id: u64) {
        if let Some((_, subscriber)) = self.subscribers.remove(&session_id) {
            debug!(
                session = session_id,
                instruments = subscriber.instruments.len(),
                "Market data subscription released"
            );
        }
    }
}

/// `YYYYMMDD HH:MM:00` of the minute containing the tick
fn candle_open_time(tick: &DepthMarketData) -> String {
    let minute = tick.update_time.get(..5).unwrap_or(&tick.update_time);
    format!("{} {}:00", tick.trading_day, minute)
}

/// Answers subscription and candle requests
pub struct MarketDataAdaptor {
    router: Arc<MarketDataRouter>,
}

impl MarketDataAdaptor {
    pub fn new(router: Arc<MarketDataRouter>) -> Self {
        Self { router }
    }
}

fn instrument_bodies<F>(ids: &[String], wrap: F) -> Vec<Body>
where
    F: Fn(Option<SpecificInstrument>) -> Body,
{
    ids.iter()
        .map(|id| {
            wrap(Some(SpecificInstrument {
                instrument_id: id.clone(),
            }))
        })
        .collect()
}

impl ServerMessageAdaptor for MarketDataAdaptor {
    fn name(&self) -> &str {
        "market-data"
    }

    fn on_req_subscribe_md(&self, ctx: &RequestContext<'_>, req: &SubscribeMarketData) -> HandlerResult {
        if req.instrument_ids.is_empty() {
            ctx.responder()
                .reply_error(ErrorCode::InvalidRequest, "no instruments requested")?;
            return Ok(Flow::Stop);
        }

        self.router.subscribe(ctx.session(), &req.instrument_ids);
        ctx.responder()
            .reply_all(instrument_bodies(&req.instrument_ids, Body::RspReqSubscribeMd))?;

        // snapshot of instruments that already have a price
        for id in &req.instrument_ids {
            if let Some(tick) = self.router.last_tick(id) {
                ctx.session().push(&Message::push(Body::RtnMarketData(tick)))?;
            }
        }
        Ok(Flow::Stop)
    }

    fn on_req_unsubscribe_md(&self, ctx: &RequestContext<'_>, req: &SubscribeMarketData) -> HandlerResult {
        if req.instrument_ids.is_empty() {
            ctx.responder()
                .reply_error(ErrorCode::InvalidRequest, "no instruments requested")?;
            return Ok(Flow::Stop);
        }

        self.router.unsubscribe(ctx.session().id(), &req.instrument_ids);
        ctx.responder()
            .reply_all(instrument_bodies(&req.instrument_ids, Body::RspReqUnsubscribeMd))?;
        Ok(Flow::Stop)
    }

    fn on_req_qry_candle(&self, ctx: &RequestContext<'_>, req: &QryCandle) -> HandlerResult {
        if req.period != 0 && req.period != CANDLE_PERIOD_SECS {
            ctx.responder().reply_error(
                ErrorCode::InvalidRequest,
                format!("only {}s candles are kept", CANDLE_PERIOD_SECS),
            )?;
            return Ok(Flow::Stop);
        }

        let candles = self
            .router
            .candles(&req.instrument_id)
            .into_iter()
            .filter(|c| req.start_time.is_empty() || c.open_time >= req.start_time)
            .filter(|c| req.end_time.is_empty() || c.open_time <= req.end_time)
            .map(|c| Body::RspReqQryCandle(Some(c)));
        ctx.responder().reply_all(candles)?;
        Ok(Flow::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(instrument: &str, time: &str, price: f64, volume: i64) -> DepthMarketData {
        DepthMarketData {
            trading_day: "20240814".to_string(),
            instrument_id: instrument.to_string(),
            last_price: price,
            volume,
            update_time: time.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_candles_aggregate_by_minute() {
        let router = MarketDataRouter::new();
        router.publish(tick("rb2410", "09:00:01", 3650.0, 100));
        router.publish(tick("rb2410", "09:00:30", 3655.0, 130));
        router.publish(tick("rb2410", "09:00:59", 3648.0, 150));
        router.publish(tick("rb2410", "09:01:02", 3649.0, 155));

        let candles = router.candles("rb2410");
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, "20240814 09:00:00");
        assert_eq!(
            (candles[0].open, candles[0].high, candles[0].low, candles[0].close),
            (3650.0, 3655.0, 3648.0, 3648.0)
        );
        assert_eq!(candles[0].volume, 50);
        assert_eq!(candles[1].volume, 5);
        assert_eq!(router.last_price("rb2410"), Some(3649.0));
        assert!(router.candles("au2412").is_empty());
    }

    #[test]
    fn test_candle_history_is_bounded() {
        let router = MarketDataRouter::new();
        for minute in 0..(MAX_CANDLES + 10) {
            let time = format!("{:02}:{:02}:00", (minute / 60) % 24, minute % 60);
            let mut t = tick("IF2409", &time, 3500.0, 0);
            t.trading_day = format!("{}", 20240000 + minute / 1440);
            router.publish(t);
        }
        assert_eq!(router.candles("IF2409").len(), MAX_CANDLES);
    }

    #[test]
    fn test_unsubscribe_without_subscription() {
        let router = MarketDataRouter::new();
        assert!(router.unsubscribe(9, &["rb2410".to_string()]).is_empty());
        assert!(router.subscriptions(9).is_empty());
        assert_eq!(router.publish(tick("rb2410", "09:00:00", 1.0, 0)), 0);
    }
}
