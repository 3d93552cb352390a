//! HTTP client for the broker's order and market-feed endpoints.

use crate::config::ClientConfig;
use crate::error::{ClientResult, PlacementError};
use crate::payload::{ForeverOrderPayload, SuperOrderPayload};
use dhan_core::{
    BracketOrderIntent, Credentials, ExchangeSegment, PlacementResult, PlacementStatus, Price,
    TriggerOrderIntent,
};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const SUPER_ORDERS_PATH: &str = "/v2/super/orders";
const FOREVER_ORDERS_PATH: &str = "/v2/forever/orders";
const LTP_PATH: &str = "/v2/marketfeed/ltp";

/// Last traded prices keyed by security id.
pub type LastPrices = HashMap<String, Price>;

/// One broker session: its own connection pool and credentials.
///
/// Not shared between workers; build one per worker through a
/// [`GatewayFactory`](crate::gateway::GatewayFactory).
pub struct BrokerClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    retry_backoff: Duration,
}

impl BrokerClient {
    /// Create a client.
    ///
    /// # Arguments
    /// * `config` - Base URL, timeout and retry backoff
    /// * `credentials` - Client id and access token sent with every call
    pub fn new(config: &ClientConfig, credentials: Credentials) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PlacementError::Setup(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            retry_backoff: config.retry_backoff(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    /// Place a bracket ("super") order.
    pub async fn place_bracket(
        &self,
        intent: &BracketOrderIntent,
        security_id: &str,
        segment: ExchangeSegment,
    ) -> ClientResult<PlacementResult> {
        let payload = SuperOrderPayload::new(self.client_id(), intent, security_id, segment);
        debug!(
            symbol = %intent.symbol,
            security_id,
            segment = %segment,
            side = %intent.side,
            qty = intent.quantity,
            "Submitting bracket order"
        );
        let (status, body) = self.post_with_retry(SUPER_ORDERS_PATH, &payload, false).await?;
        classify_placement(status, &body)
    }

    /// Place a trigger ("forever") order.
    pub async fn place_trigger(
        &self,
        intent: &TriggerOrderIntent,
        security_id: &str,
        segment: ExchangeSegment,
    ) -> ClientResult<PlacementResult> {
        let payload = ForeverOrderPayload::new(self.client_id(), intent, security_id, segment);
        debug!(
            symbol = %intent.symbol,
            security_id,
            segment = %segment,
            flag = %intent.flag.order_flag(),
            qty = intent.quantity,
            "Submitting trigger order"
        );
        let (status, body) = self.post_with_retry(FOREVER_ORDERS_PATH, &payload, false).await?;
        classify_placement(status, &body)
    }

    /// Fetch last traded prices for several instruments of one segment in one call.
    ///
    /// Ids missing from the response are simply absent from the map.
    pub async fn fetch_ltp(
        &self,
        segment: ExchangeSegment,
        security_ids: &[String],
    ) -> ClientResult<LastPrices> {
        let ids: Vec<Value> = security_ids
            .iter()
            .map(|id| match id.parse::<u64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::from(id.as_str()),
            })
            .collect();
        let mut request = serde_json::Map::new();
        request.insert(segment.as_str().to_string(), Value::Array(ids));

        let (status, body) = self
            .post_with_retry(LTP_PATH, &Value::Object(request), true)
            .await?;
        if status != StatusCode::OK {
            return Err(PlacementError::Http {
                status: status.as_u16(),
                body,
            });
        }
        parse_ltp(segment, &body)
    }

    /// POST `body`, retrying once on connect or timeout failures.
    async fn post_with_retry<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        with_client_id: bool,
    ) -> ClientResult<(StatusCode, String)> {
        let url = format!("{}{}", self.base_url, path);
        let mut retried = false;
        loop {
            match self.post_once(&url, body, with_client_id).await {
                Ok(response) => return Ok(response),
                Err(e) if !retried && (e.is_connect() || e.is_timeout()) => {
                    retried = true;
                    warn!(
                        url = %url,
                        error = %e,
                        backoff_ms = self.retry_backoff.as_millis() as u64,
                        "Transport failure, retrying once"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => return Err(PlacementError::Transport(e.to_string())),
            }
        }
    }

    async fn post_once<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        with_client_id: bool,
    ) -> Result<(StatusCode, String), reqwest::Error> {
        let mut request = self
            .client
            .post(url)
            .header("access-token", &self.credentials.access_token)
            .header("Accept", "application/json")
            .json(body);
        if with_client_id {
            request = request.header("client-id", &self.credentials.client_id);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }
}

// =============================================================================
// Response classification
// =============================================================================

/// Classify a placement response.
///
/// Order of checks: non-200 status, broker error fields, missing order id,
/// `REJECTED` status. Anything else is a successful placement.
pub fn classify_placement(status: StatusCode, body: &str) -> ClientResult<PlacementResult> {
    if status != StatusCode::OK {
        return Err(PlacementError::Http {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    let raw: Value = serde_json::from_str(body)
        .map_err(|e| PlacementError::MalformedResponse(format!("invalid JSON ({e}): {body}")))?;

    let error_code = text_field(&raw, "errorCode").or_else(|| text_field(&raw, "errorType"));
    if let Some(code) = error_code {
        let message = text_field(&raw, "errorMessage").unwrap_or_else(|| code.clone());
        return Err(PlacementError::BrokerRejected {
            code,
            message,
            order_id: None,
        });
    }

    let Some(order_id) = text_field(&raw, "orderId") else {
        return Err(PlacementError::MalformedResponse(format!(
            "missing orderId: {body}"
        )));
    };

    let status = text_field(&raw, "orderStatus")
        .map(|s| PlacementStatus::from_broker(&s))
        .unwrap_or(PlacementStatus::Unknown);
    if status.is_rejected() {
        let message = text_field(&raw, "omsErrorDescription")
            .or_else(|| text_field(&raw, "errorMessage"))
            .unwrap_or_else(|| "order rejected by broker".to_string());
        return Err(PlacementError::BrokerRejected {
            code: "REJECTED".to_string(),
            message,
            order_id: Some(order_id),
        });
    }

    info!(order_id = %order_id, status = %status, "Order accepted by broker");
    Ok(PlacementResult {
        order_id,
        status,
        raw,
        error_code: None,
    })
}

/// `data.{segment}.{id}.last_price` for every id present.
fn parse_ltp(segment: ExchangeSegment, body: &str) -> ClientResult<LastPrices> {
    let raw: Value = serde_json::from_str(body)
        .map_err(|e| PlacementError::MalformedResponse(format!("invalid LTP JSON: {e}")))?;
    let Some(quotes) = raw
        .get("data")
        .and_then(|d| d.get(segment.as_str()))
        .and_then(Value::as_object)
    else {
        return Ok(LastPrices::new());
    };

    let prices = quotes
        .iter()
        .filter_map(|(id, quote)| {
            let price = quote.get("last_price").and_then(Value::as_f64)?;
            Price::from_f64(price).map(|p| (id.clone(), p))
        })
        .collect();
    Ok(prices)
}

/// Non-empty string or number field rendered as text.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
