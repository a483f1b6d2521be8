use async_trait::async_trait;
use serde_json::{json, Value};

use super::System;
use crate::errors::{AgentError, AgentResult};
use crate::finam::{BarsQuery, FinamClient, FinamResult};
use crate::models::tool::{Tool, ToolCall};

/// Read-only lookups against the Finam TradeAPI.
///
/// Network and API failures are reported in-band as
/// `{"status": "error", "message": ...}` so the model can react to them.
pub struct TradingSystem {
    client: FinamClient,
    tools: Vec<Tool>,
}

fn symbol_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "symbol": {
                "type": "string",
                "description": "Instrument symbol in TICKER@MIC form, e.g. SBER@MISX"
            }
        },
        "required": ["symbol"]
    })
}

fn no_params() -> Value {
    json!({"type": "object", "properties": {}})
}

impl TradingSystem {
    pub fn new(client: FinamClient) -> Self {
        let tools = vec![
            Tool::new(
                "search_instruments",
                "Find instruments whose symbol, ticker or name contains the query. \
                Use it to resolve a company name to an exact symbol.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Company name or ticker, e.g. Сбербанк or SBER"
                        }
                    },
                    "required": ["query"]
                }),
            ),
            Tool::new("get_assets", "List all tradable assets", no_params()),
            Tool::new("get_exchanges", "List exchanges and their MIC codes", no_params()),
            Tool::new(
                "get_quote",
                "Latest quote for an instrument",
                symbol_schema(),
            ),
            Tool::new(
                "get_orderbook",
                "Current order book for an instrument",
                symbol_schema(),
            ),
            Tool::new(
                "get_candles",
                "Historical bars for an instrument",
                json!({
                    "type": "object",
                    "properties": {
                        "symbol": {
                            "type": "string",
                            "description": "Instrument symbol, e.g. SBER@MISX"
                        },
                        "timeframe": {
                            "type": "string",
                            "default": "D",
                            "description": "Bar size: M1, M5, M15, M30, H1, H2, H4, H8, D, W, MN, QR"
                        },
                        "start": {
                            "type": "string",
                            "description": "Interval start, RFC 3339"
                        },
                        "end": {
                            "type": "string",
                            "description": "Interval end, RFC 3339"
                        }
                    },
                    "required": ["symbol"]
                }),
            ),
            Tool::new(
                "get_account",
                "Account details: equity, positions and cash",
                json!({
                    "type": "object",
                    "properties": {
                        "account_id": {
                            "type": "string",
                            "description": "Account identifier"
                        }
                    },
                    "required": ["account_id"]
                }),
            ),
        ];

        Self { client, tools }
    }

    async fn search_instruments(&self, params: &Value) -> AgentResult<Value> {
        let query = required_str(params, "query")?;
        let found = self.client.search_instruments(query).await;
        Ok(envelope(found.map(|instruments| {
            json!({
                "query": query,
                "count": instruments.len(),
                "instruments": instruments,
            })
        })))
    }

    async fn get_candles(&self, params: &Value) -> AgentResult<Value> {
        let symbol = required_str(params, "symbol")?;
        let query = BarsQuery {
            timeframe: optional_str(params, "timeframe"),
            start: optional_str(params, "start"),
            end: optional_str(params, "end"),
        };
        Ok(envelope(self.client.bars(symbol, &query).await))
    }
}

fn required_str<'a>(params: &'a Value, key: &str) -> AgentResult<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AgentError::InvalidParameters(format!("{} parameter required", key)))
}

fn optional_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn envelope(result: FinamResult<Value>) -> Value {
    match result {
        Ok(data) => json!({"status": "success", "data": data}),
        Err(e) => {
            tracing::warn!(error = %e, "finam call failed");
            json!({"status": "error", "message": e.to_string()})
        }
    }
}

#[async_trait]
impl System for TradingSystem {
    fn name(&self) -> &str {
        "finam"
    }

    fn description(&self) -> &str {
        "Read-only market data and account lookups from Finam TradeAPI"
    }

    fn instructions(&self) -> &str {
        "Use search_instruments to turn a company name into a symbol before \
        building instrument paths. Other tools verify that an instrument exists."
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
        let params = &tool_call.arguments;
        match tool_call.name.as_str() {
            "search_instruments" => self.search_instruments(params).await,
            "get_assets" => Ok(envelope(self.client.assets().await)),
            "get_exchanges" => Ok(envelope(self.client.exchanges().await)),
            "get_quote" => {
                let symbol = required_str(params, "symbol")?;
                Ok(envelope(self.client.quote(symbol).await))
            }
            "get_orderbook" => {
                let symbol = required_str(params, "symbol")?;
                Ok(envelope(self.client.orderbook(symbol).await))
            }
            "get_candles" => self.get_candles(params).await,
            "get_account" => {
                let account_id = required_str(params, "account_id")?;
                Ok(envelope(self.client.account(account_id).await))
            }
            _ => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}
