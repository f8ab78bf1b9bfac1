//! Request and response bodies for the HTTP API.
//!
//! Response models tolerate whatever the agent sends: missing fields take
//! their defaults and unknown fields are dropped.

use serde::{Deserialize, Serialize};

use ea_bridge_wire::Params;

// === Requests ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub volume: f64,
    #[serde(default)]
    pub sl: Option<f64>,
    #[serde(default)]
    pub tp: Option<f64>,
    #[serde(default)]
    pub comment: String,
}

impl TradeRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.trim().is_empty() {
            return Err("symbol must not be empty".to_string());
        }
        if !self.volume.is_finite() || self.volume <= 0.0 {
            return Err(format!("volume must be greater than 0, got {}", self.volume));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequest {
    pub ticket: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub ticket: u64,
    #[serde(default)]
    pub sl: Option<f64>,
    #[serde(default)]
    pub tp: Option<f64>,
}

/// Optional bounds for the deal history, as unix timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HistoryQuery {
    pub from_ts: Option<i64>,
    pub to_ts: Option<i64>,
}

impl HistoryQuery {
    /// Only the bounds that were given are forwarded.
    pub fn to_params(&self) -> Params {
        let mut params = Params::new();
        if let Some(from) = self.from_ts {
            params.insert("from_ts".to_string(), from.into());
        }
        if let Some(to) = self.to_ts {
            params.insert("to_ts".to_string(), to.into());
        }
        params
    }
}

/// Serialize a request body into the params object sent to the agent.
pub fn to_params<T: Serialize>(request: &T) -> Result<Params, serde_json::Error> {
    match serde_json::to_value(request)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        ))),
    }
}

// === Responses ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountInfo {
    pub login: i64,
    pub balance: f64,
    pub equity: f64,
    pub margin: f64,
    pub free_margin: f64,
    pub leverage: i64,
    pub currency: String,
    pub server: String,
    pub name: String,
    pub company: String,
    pub trade_allowed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub ticket: i64,
    pub symbol: String,
    /// 0 = buy, 1 = sell
    #[serde(rename = "type")]
    pub kind: i64,
    pub volume: f64,
    pub price_open: f64,
    pub price_current: f64,
    pub sl: f64,
    pub tp: f64,
    pub profit: f64,
    pub swap: f64,
    pub commission: f64,
    pub time: i64,
    pub magic: i64,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub ticket: i64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: i64,
    pub volume_initial: f64,
    pub volume_current: f64,
    pub price_open: f64,
    pub sl: f64,
    pub tp: f64,
    pub time_setup: i64,
    pub time_done: i64,
    pub state: i64,
    pub magic: i64,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deal {
    pub ticket: i64,
    pub order: i64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: i64,
    pub direction: i64,
    pub volume: f64,
    pub price: f64,
    pub commission: f64,
    pub swap: f64,
    pub profit: f64,
    pub time: i64,
    pub magic: i64,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolInfo {
    pub name: String,
    pub bid: f64,
    pub ask: f64,
    pub spread: i64,
    pub digits: i64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
    pub trade_mode: i64,
    pub point: f64,
    pub tick_size: f64,
    pub tick_value: f64,
    pub swap_long: f64,
    pub swap_short: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tick {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub volume: f64,
    pub time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeResult {
    pub success: bool,
    pub retcode: i64,
    pub order: i64,
    pub deal: i64,
    pub volume: f64,
    pub price: f64,
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trade_request_defaults_optional_fields() {
        let req: TradeRequest =
            serde_json::from_value(json!({"symbol": "EURUSD", "volume": 0.1})).unwrap();
        assert_eq!(req.sl, None);
        assert_eq!(req.tp, None);
        assert_eq!(req.comment, "");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn trade_request_rejects_non_positive_volume() {
        for volume in [0.0, -1.0, f64::NAN] {
            let req = TradeRequest {
                symbol: "EURUSD".to_string(),
                volume,
                sl: None,
                tp: None,
                comment: String::new(),
            };
            assert!(req.validate().is_err(), "volume {volume} accepted");
        }
    }

    #[test]
    fn trade_request_params_keep_null_stops() {
        let req = TradeRequest {
            symbol: "XAUUSD".to_string(),
            volume: 0.5,
            sl: Some(1900.0),
            tp: None,
            comment: "scalp".to_string(),
        };
        insta::assert_json_snapshot!(to_params(&req).unwrap(), @r#"
        {
          "comment": "scalp",
          "sl": 1900.0,
          "symbol": "XAUUSD",
          "tp": null,
          "volume": 0.5
        }
        "#);
    }

    #[test]
    fn history_query_forwards_given_bounds_only() {
        assert!(HistoryQuery::default().to_params().is_empty());

        let query = HistoryQuery {
            from_ts: Some(1_700_000_000),
            to_ts: None,
        };
        let params = query.to_params();
        assert_eq!(params.len(), 1);
        assert_eq!(params["from_ts"], json!(1_700_000_000));
    }

    #[test]
    fn partial_account_info_fills_defaults() {
        let info: AccountInfo =
            serde_json::from_value(json!({"balance": 1000, "currency": "USD", "extra": true}))
                .unwrap();
        assert_eq!(info.balance, 1000.0);
        assert_eq!(info.currency, "USD");
        assert_eq!(info.login, 0);
        assert!(!info.trade_allowed);
    }

    #[test]
    fn position_type_field_is_renamed() {
        let pos: Position =
            serde_json::from_value(json!({"ticket": 7, "symbol": "EURUSD", "type": 1})).unwrap();
        assert_eq!(pos.kind, 1);
        assert_eq!(serde_json::to_value(&pos).unwrap()["type"], json!(1));
    }
}
