//! Gateway behaviour through a real client connection

use gateway::{build_context, MarketDataRouter};
use gateway_config::{GatewayConfig, UserCredential};
use network::{
    CallbackResult, Client, ClientConfig, ClientHandlers, ClientMessageAdaptor, Server, Session,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use types::{
    ActionFlag, Body, DepthMarketData, Direction, ErrorCode, InputOrder, LoginRequest, Message,
    MessageType, Offset, OrderAction, OrderStatus, QryOrder, QryPosition, SubscribeMarketData,
};

const WAIT: Duration = Duration::from_secs(5);

struct Inbox(mpsc::UnboundedSender<Message>);

impl ClientMessageAdaptor for Inbox {
    fn on_message(&self, _session: &Arc<Session>, message: &Message) -> CallbackResult {
        let _ = self.0.send(message.clone());
        Ok(())
    }
}

struct Harness {
    addr: SocketAddr,
    router: Arc<MarketDataRouter>,
    shutdown: tokio_util::sync::CancellationToken,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_gateway() -> Harness {
    let mut config = GatewayConfig::default();
    config.server.bind_addr = "127.0.0.1:0".to_string();
    config.users.push(UserCredential {
        user_id: "trader".to_string(),
        password: "secret".to_string(),
        broker_id: String::new(),
    });

    let router = MarketDataRouter::new();
    let server = Server::bind(build_context(&config, router.clone())).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_token();
    tokio::spawn(server.run());
    Harness {
        addr,
        router,
        shutdown,
    }
}

async fn connect(addr: SocketAddr) -> (Client, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let config = ClientConfig {
        server_addr: addr.to_string(),
        ..Default::default()
    };
    let client = Client::connect(config, ClientHandlers::new(Arc::new(Inbox(tx))))
        .await
        .unwrap();
    (client, rx)
}

async fn next_of(rx: &mut mpsc::UnboundedReceiver<Message>, message_type: MessageType) -> Message {
    tokio::time::timeout(WAIT, async {
        loop {
            let message = rx.recv().await.expect("client stopped");
            if message.message_type() == message_type {
                return message;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no {} in time", message_type))
}

async fn login(client: &Client, rx: &mut mpsc::UnboundedReceiver<Message>, password: &str) -> Message {
    client
        .login(LoginRequest {
            user_id: "trader".to_string(),
            password: password.to_string(),
            ..Default::default()
        })
        .unwrap();
    next_of(rx, MessageType::RspReqLogin).await
}

fn order(direction: Direction, offset: Offset, price: f64, volume: i64) -> InputOrder {
    InputOrder {
        order_ref: "1".to_string(),
        instrument_id: "rb2410".to_string(),
        exchange_id: "SHFE".to_string(),
        direction,
        offset,
        price,
        volume,
    }
}

/// Collect every part of a multi-part response
async fn collect_parts(rx: &mut mpsc::UnboundedReceiver<Message>, message_type: MessageType) -> Vec<Message> {
    let mut parts = Vec::new();
    loop {
        let part = next_of(rx, message_type).await;
        let last = part.is_last();
        parts.push(part);
        if last {
            return parts;
        }
    }
}

#[tokio::test]
async fn test_wrong_password_refused() {
    let gateway = start_gateway().await;
    let (client, mut rx) = connect(gateway.addr).await;

    let reply = login(&client, &mut rx, "guess").await;
    assert_eq!(reply.error_id(), i32::from(ErrorCode::InvalidLogin));
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_order_fills_and_shows_in_queries() {
    let gateway = start_gateway().await;
    let (client, mut rx) = connect(gateway.addr).await;
    assert!(login(&client, &mut rx, "secret").await.is_success());

    let request_id = client
        .request(Body::ReqOrderInsert(order(Direction::Buy, Offset::Open, 3600.0, 2)))
        .unwrap();
    let reply = next_of(&mut rx, MessageType::RspReqOrderInsert).await;
    assert_eq!(reply.request_id, request_id);
    assert!(reply.is_success());

    let rtn = next_of(&mut rx, MessageType::RtnOrder).await;
    match rtn.body {
        Body::RtnOrder(o) => assert_eq!(o.status, OrderStatus::Filled),
        other => panic!("unexpected {:?}", other),
    }
    match next_of(&mut rx, MessageType::RtnTrade).await.body {
        Body::RtnTrade(t) => assert_eq!((t.price, t.volume), (3600.0, 2)),
        other => panic!("unexpected {:?}", other),
    }

    client
        .request(Body::ReqQryPosition(QryPosition::default()))
        .unwrap();
    let parts = collect_parts(&mut rx, MessageType::RspReqQryPosition).await;
    assert_eq!(parts.len(), 1);
    match &parts[0].body {
        Body::RspReqQryPosition(Some(p)) => assert_eq!(p.position, 2),
        other => panic!("unexpected {:?}", other),
    }

    client
        .request(Body::ReqOrderInsert(order(Direction::Sell, Offset::Close, 3610.0, 1)))
        .unwrap();
    next_of(&mut rx, MessageType::RspReqOrderInsert).await;

    client.request(Body::ReqQryOrder(QryOrder::default())).unwrap();
    let parts = collect_parts(&mut rx, MessageType::RspReqQryOrder).await;
    assert_eq!(parts.len(), 2);
    assert_eq!((parts[1].current_count, parts[1].total_count), (2, 2));
}

#[tokio::test]
async fn test_rejections_carry_error_codes() {
    let gateway = start_gateway().await;
    let (client, mut rx) = connect(gateway.addr).await;
    login(&client, &mut rx, "secret").await;

    let mut unknown = order(Direction::Buy, Offset::Open, 100.0, 1);
    unknown.instrument_id = "zz9999".to_string();
    client.request(Body::ReqOrderInsert(unknown)).unwrap();
    let reply = next_of(&mut rx, MessageType::RspReqOrderInsert).await;
    assert_eq!(reply.error_id(), i32::from(ErrorCode::InstrumentNotFound));
    assert_eq!(reply.body, Body::RspReqOrderInsert(None));

    client
        .request(Body::ReqOrderInsert(order(Direction::Sell, Offset::Close, 3600.0, 1)))
        .unwrap();
    let reply = next_of(&mut rx, MessageType::RspReqOrderInsert).await;
    assert_eq!(reply.error_id(), i32::from(ErrorCode::OrderRejected));

    client
        .request(Body::ReqOrderAction(OrderAction {
            order_sys_id: "missing".to_string(),
            action: ActionFlag::Cancel,
            ..Default::default()
        }))
        .unwrap();
    let reply = next_of(&mut rx, MessageType::RspReqOrderAction).await;
    assert_eq!(reply.error_id(), i32::from(ErrorCode::OrderNotFound));
}

#[tokio::test]
async fn test_resting_order_can_be_cancelled() {
    let gateway = start_gateway().await;
    gateway.router.publish(DepthMarketData {
        instrument_id: "rb2410".to_string(),
        last_price: 3700.0,
        ..Default::default()
    });
    let (client, mut rx) = connect(gateway.addr).await;
    login(&client, &mut rx, "secret").await;

    client
        .request(Body::ReqOrderInsert(order(Direction::Buy, Offset::Open, 3500.0, 1)))
        .unwrap();
    let resting = match next_of(&mut rx, MessageType::RtnOrder).await.body {
        Body::RtnOrder(o) => o,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(resting.status, OrderStatus::Queued);

    client
        .request(Body::ReqOrderAction(OrderAction {
            order_sys_id: resting.order_sys_id.clone(),
            action: ActionFlag::Cancel,
            ..Default::default()
        }))
        .unwrap();
    assert!(next_of(&mut rx, MessageType::RspReqOrderAction).await.is_success());
    match next_of(&mut rx, MessageType::RtnOrder).await.body {
        Body::RtnOrder(o) => assert_eq!(o.status, OrderStatus::Cancelled),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_market_data_reaches_subscriber_until_close() {
    let gateway = start_gateway().await;
    let (client, mut rx) = connect(gateway.addr).await;
    login(&client, &mut rx, "secret").await;

    client
        .request(Body::ReqSubscribeMd(SubscribeMarketData {
            instrument_ids: vec!["rb2410".to_string(), "au2412".to_string()],
        }))
        .unwrap();
    let parts = collect_parts(&mut rx, MessageType::RspReqSubscribeMd).await;
    assert_eq!(parts.len(), 2);
    assert_eq!(gateway.router.subscriber_count(), 1);

    let delivered = gateway.router.publish(DepthMarketData {
        instrument_id: "rb2410".to_string(),
        last_price: 3655.0,
        update_time: "09:30:00".to_string(),
        ..Default::default()
    });
    assert_eq!(delivered, 1);
    match next_of(&mut rx, MessageType::RtnMarketData).await.body {
        Body::RtnMarketData(tick) => assert_eq!(tick.last_price, 3655.0),
        other => panic!("unexpected {:?}", other),
    }

    client.close();
    tokio::time::timeout(WAIT, async {
        while gateway.router.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscription not released after close");
}
