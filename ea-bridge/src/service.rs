//! TradingService: typed trading operations on top of the agent bridge.
//!
//! Each operation maps to one agent command. The service picks the timeout,
//! shapes the params and decodes the agent's data into a response model.
//! Transports call into this service and only translate errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ea_bridge_wire::Params;
use serde::de::DeserializeOwned;

use crate::bridge::{BridgeError, CommandSender};
use crate::config::CommandTimeouts;
use crate::health::HealthStatus;
use crate::models::{
    AccountInfo, CloseRequest, Deal, HistoryQuery, ModifyRequest, Order, Position, SymbolInfo,
    Tick, TradeRequest, TradeResult, to_params,
};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The agent answered, but not with something the model accepts.
    #[error("unexpected data from agent for '{command}': {reason}")]
    InvalidPayload { command: String, reason: String },

    /// Rejected before anything was sent to the agent.
    #[error("{0}")]
    InvalidRequest(String),
}

pub struct TradingService {
    bridge: Arc<dyn CommandSender>,
    timeouts: CommandTimeouts,
    started_at: Instant,
}

impl TradingService {
    pub fn new(bridge: Arc<dyn CommandSender>, timeouts: CommandTimeouts) -> Self {
        Self {
            bridge,
            timeouts,
            started_at: Instant::now(),
        }
    }

    /// Send `command` and decode its data. Absent or null data decodes to
    /// the model's default.
    async fn command<T>(
        &self,
        command: &str,
        params: Option<Params>,
        timeout: Duration,
    ) -> Result<T, CommandError>
    where
        T: DeserializeOwned + Default,
    {
        let data = self.bridge.send(command, params, timeout).await?;
        if data.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(data).map_err(|e| {
            tracing::warn!(command, error = %e, "Agent returned data that does not fit the model");
            CommandError::InvalidPayload {
                command: command.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn request_params<T: serde::Serialize>(request: &T) -> Result<Params, CommandError> {
        to_params(request).map_err(|e| CommandError::InvalidRequest(e.to_string()))
    }

    pub async fn account_info(&self) -> Result<AccountInfo, CommandError> {
        self.command("account_info", None, self.timeouts.default)
            .await
    }

    pub async fn positions(&self) -> Result<Vec<Position>, CommandError> {
        self.command("positions", None, self.timeouts.default).await
    }

    pub async fn orders(&self) -> Result<Vec<Order>, CommandError> {
        self.command("orders", None, self.timeouts.default).await
    }

    pub async fn history(&self, query: &HistoryQuery) -> Result<Vec<Deal>, CommandError> {
        self.command("history", Some(query.to_params()), self.timeouts.extended)
            .await
    }

    pub async fn market_buy(&self, request: &TradeRequest) -> Result<TradeResult, CommandError> {
        self.trade("market_buy", request).await
    }

    pub async fn market_sell(&self, request: &TradeRequest) -> Result<TradeResult, CommandError> {
        self.trade("market_sell", request).await
    }

    async fn trade(
        &self,
        command: &str,
        request: &TradeRequest,
    ) -> Result<TradeResult, CommandError> {
        request.validate().map_err(CommandError::InvalidRequest)?;
        let params = Self::request_params(request)?;
        tracing::info!(command, symbol = %request.symbol, volume = request.volume, "Placing market order");
        self.command(command, Some(params), self.timeouts.default)
            .await
    }

    pub async fn close_position(
        &self,
        request: &CloseRequest,
    ) -> Result<TradeResult, CommandError> {
        let params = Self::request_params(request)?;
        tracing::info!(ticket = request.ticket, "Closing position");
        self.command("close_position", Some(params), self.timeouts.default)
            .await
    }

    pub async fn modify_position(
        &self,
        request: &ModifyRequest,
    ) -> Result<TradeResult, CommandError> {
        let params = Self::request_params(request)?;
        tracing::info!(ticket = request.ticket, "Modifying position");
        self.command("modify_position", Some(params), self.timeouts.default)
            .await
    }

    pub async fn symbol_info(&self, name: &str) -> Result<SymbolInfo, CommandError> {
        self.command("symbol_info", Some(symbol_params(name)), self.timeouts.default)
            .await
    }

    pub async fn symbols(&self) -> Result<Vec<String>, CommandError> {
        self.command("symbols_list", None, self.timeouts.extended)
            .await
    }

    pub async fn tick(&self, symbol: &str) -> Result<Tick, CommandError> {
        self.command("tick", Some(symbol_params(symbol)), self.timeouts.default)
            .await
    }

    pub async fn health(&self) -> HealthStatus {
        HealthStatus::new(
            self.bridge.connected().await,
            self.bridge.last_seen().await,
            self.started_at.elapsed().as_secs_f64(),
        )
    }
}

fn symbol_params(symbol: &str) -> Params {
    let mut params = Params::new();
    params.insert("symbol".to_string(), symbol.into());
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSender;
    use serde_json::json;

    fn service_with(sender: MockSender) -> (TradingService, Arc<MockSender>) {
        let sender = Arc::new(sender);
        let service = TradingService::new(sender.clone(), CommandTimeouts::default());
        (service, sender)
    }

    #[tokio::test]
    async fn account_info_decodes_agent_data() {
        let (service, sender) = service_with(MockSender::replying(json!({"balance": 1000})));

        let info = service.account_info().await.unwrap();
        assert_eq!(info.balance, 1000.0);

        let call = sender.last_call();
        assert_eq!(call.command, "account_info");
        assert_eq!(call.params, None);
        assert_eq!(call.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn null_data_yields_defaults() {
        let (service, _) = service_with(MockSender::replying(serde_json::Value::Null));
        assert!(service.positions().await.unwrap().is_empty());
        assert_eq!(service.tick("EURUSD").await.unwrap(), Tick::default());
    }

    #[tokio::test]
    async fn slow_queries_use_extended_timeout() {
        let (service, sender) = service_with(MockSender::replying(json!(["EURUSD", "XAUUSD"])));

        let symbols = service.symbols().await.unwrap();
        assert_eq!(symbols, vec!["EURUSD", "XAUUSD"]);
        assert_eq!(sender.last_call().timeout, Duration::from_secs(15));

        let (service, sender) = service_with(MockSender::replying(json!([])));
        service.history(&HistoryQuery::default()).await.unwrap();
        let call = sender.last_call();
        assert_eq!(call.command, "history");
        assert_eq!(call.timeout, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn symbol_commands_carry_symbol_param() {
        let (service, sender) = service_with(MockSender::replying(json!({"name": "EURUSD"})));

        let info = service.symbol_info("EURUSD").await.unwrap();
        assert_eq!(info.name, "EURUSD");

        let call = sender.last_call();
        assert_eq!(call.command, "symbol_info");
        assert_eq!(call.params.unwrap()["symbol"], json!("EURUSD"));
    }

    #[tokio::test]
    async fn invalid_trade_is_rejected_before_sending() {
        let (service, sender) = service_with(MockSender::replying(json!({"success": true})));
        let request = TradeRequest {
            symbol: "EURUSD".to_string(),
            volume: 0.0,
            sl: None,
            tp: None,
            comment: String::new(),
        };

        let err = service.market_buy(&request).await.unwrap_err();
        assert!(matches!(err, CommandError::InvalidRequest(_)));
        assert!(sender.calls().is_empty());
    }

    #[tokio::test]
    async fn trade_forwards_request_as_params() {
        let (service, sender) = service_with(MockSender::replying(
            json!({"success": true, "retcode": 10009, "order": 42}),
        ));
        let request = TradeRequest {
            symbol: "XAUUSD".to_string(),
            volume: 0.1,
            sl: Some(1900.0),
            tp: None,
            comment: String::new(),
        };

        let result = service.market_sell(&request).await.unwrap();
        assert!(result.success);
        assert_eq!(result.order, 42);

        let call = sender.last_call();
        assert_eq!(call.command, "market_sell");
        let params = call.params.unwrap();
        assert_eq!(params["symbol"], json!("XAUUSD"));
        assert_eq!(params["volume"], json!(0.1));
        assert_eq!(params["sl"], json!(1900.0));
    }

    #[tokio::test]
    async fn close_and_modify_send_ticket() {
        let (service, sender) = service_with(MockSender::replying(json!({"success": true})));

        service
            .close_position(&CloseRequest { ticket: 7 })
            .await
            .unwrap();
        assert_eq!(sender.last_call().command, "close_position");

        service
            .modify_position(&ModifyRequest {
                ticket: 7,
                sl: Some(1.05),
                tp: Some(1.2),
            })
            .await
            .unwrap();
        let call = sender.last_call();
        assert_eq!(call.command, "modify_position");
        assert_eq!(call.params.unwrap()["ticket"], json!(7));
    }

    #[tokio::test]
    async fn mismatched_payload_is_invalid() {
        let (service, _) = service_with(MockSender::replying(json!("not a list")));
        let err = service.orders().await.unwrap_err();
        assert!(matches!(err, CommandError::InvalidPayload { ref command, .. } if command == "orders"));
    }

    #[tokio::test]
    async fn bridge_errors_pass_through() {
        let (service, _) = service_with(MockSender::failing(BridgeError::Remote(
            "Market closed".to_string(),
        )));
        let err = service.account_info().await.unwrap_err();
        assert!(matches!(err, CommandError::Bridge(BridgeError::Remote(ref m)) if m == "Market closed"));
    }

    #[tokio::test]
    async fn health_reports_connection_state() {
        let (service, _) = service_with(MockSender::disconnected());
        let health = service.health().await;
        assert_eq!(health.server, "running");
        assert!(!health.ea_connected);
        assert_eq!(health.ea_last_seen, None);
        assert!(health.uptime >= 0.0);

        let (service, _) = service_with(MockSender::replying(json!({})));
        let health = service.health().await;
        assert!(health.ea_connected);
        assert!(health.ea_last_seen.is_some());
    }
}
