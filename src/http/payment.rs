//! Payment API handlers.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::payments::history::{DetailedMetrics, HistoryPage, StatusFilter, SystemMetrics};
use crate::payments::{PaymentOutcome, PaymentRequest};

pub const MISSING_PARAMETERS: &str = "Missing required parameters";
pub const PAYMENTS_NOT_ARRAY: &str = "Payments must be an array";

const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Response of `POST /api/payment/batch`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    pub results: Vec<PaymentOutcome>,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Response of `GET /api/payment/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: &'static str,
    pub metrics: SystemMetrics,
    pub uptime_secs: u64,
    /// Unix seconds.
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: HistoryPage,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub success: bool,
    pub metrics: DetailedMetrics,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub status: Option<StatusFilter>,
}

/// `POST /api/payment/execute`
pub async fn execute_payment(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PaymentOutcome>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = parse_payment(body).map_err(ApiError::bad_request)?;

    let started = Instant::now();
    let outcome = state.dispatcher.execute(&request).await;
    state
        .history
        .record(request, outcome.clone(), started.elapsed())
        .await;

    Ok(Json(outcome))
}

/// `POST /api/payment/batch`
///
/// Every item is validated before anything is dispatched.
pub async fn execute_batch(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(mut body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let items = match body.get_mut("payments").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => return Err(ApiError::bad_request(PAYMENTS_NOT_ARRAY)),
    };

    let requests = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            parse_payment(item)
                .map_err(|e| ApiError::bad_request(format!("Invalid payment at index {index}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let started = Instant::now();
    let results = state.dispatcher.execute_batch(requests.clone()).await;
    let elapsed = started.elapsed();
    for (request, outcome) in requests.into_iter().zip(&results) {
        state.history.record(request, outcome.clone(), elapsed).await;
    }

    let successful = results.iter().filter(|o| o.is_success()).count();
    Ok(Json(BatchResponse {
        success: true,
        processed: results.len(),
        successful,
        failed: results.len() - successful,
        results,
    }))
}

/// `GET /api/payment/status`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        status: "operational",
        metrics: state.history.system_metrics().await,
        uptime_secs: state.started.elapsed().as_secs(),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
    })
}

/// `GET /api/payment/history`
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let page = state
        .history
        .page(
            query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            query.offset.unwrap_or(0),
            query.status,
        )
        .await;
    Json(HistoryResponse {
        success: true,
        page,
    })
}

/// `GET /api/payment/metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        success: true,
        metrics: state.history.detailed_metrics().await,
    })
}

/// Validate one payment object.
///
/// `from`, `to` and `amount` must be present and non-empty in either
/// spelling. A plain JSON number is accepted for `amount`.
pub fn parse_payment(mut value: Value) -> Result<PaymentRequest, String> {
    let Some(fields) = value.as_object_mut() else {
        return Err("payment must be an object".to_string());
    };

    let present = |names: &[&str]| {
        names.iter().any(|name| match fields.get(*name) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        })
    };
    if !present(&["from", "fromAddress"])
        || !present(&["to", "toAddress"])
        || !present(&["amount"])
    {
        return Err(MISSING_PARAMETERS.to_string());
    }

    if let Some(Value::Number(n)) = fields.get("amount") {
        let amount = n
            .as_u64()
            .ok_or_else(|| "amount must be a non-negative integer".to_string())?;
        fields.insert("amount".to_string(), Value::String(amount.to_string()));
    }
    if fields.get("tokenContract").is_some_and(Value::is_null) {
        fields.remove("tokenContract");
    }
    if fields.get("token").is_some_and(Value::is_null) {
        fields.remove("token");
    }

    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use serde_json::json;

    const FROM: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const TO: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    #[test]
    fn test_missing_fields() {
        for body in [
            json!({ "toAddress": TO, "amount": "1" }),
            json!({ "fromAddress": FROM, "amount": "1" }),
            json!({ "fromAddress": FROM, "toAddress": TO }),
            json!({ "fromAddress": FROM, "toAddress": TO, "amount": "" }),
            json!({ "fromAddress": null, "toAddress": TO, "amount": "1" }),
        ] {
            assert_eq!(parse_payment(body).unwrap_err(), MISSING_PARAMETERS);
        }
    }

    #[test]
    fn test_numeric_amount_and_null_token() {
        let request = parse_payment(json!({
            "fromAddress": FROM,
            "toAddress": TO,
            "amount": 1000,
            "tokenContract": null
        }))
        .unwrap();
        assert_eq!(request.amount, U256::from(1000u64));
        assert!(request.token.is_none());
    }

    #[test]
    fn test_malformed_fields_rejected() {
        assert!(parse_payment(json!({ "from": "0x12", "to": TO, "amount": "1" })).is_err());
        assert!(parse_payment(json!({ "from": FROM, "to": TO, "amount": -1 })).is_err());
        assert!(parse_payment(json!(["not", "an", "object"])).is_err());
    }
}
