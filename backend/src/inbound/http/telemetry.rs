//! Local sensor ingestion.
//!
//! ```text
//! POST /log {"humidity":40,"temperature":21.5}
//! ```
//!
//! One log key is taken per request and shared by the local payload and the
//! provider snapshot relayed after it.

use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, post, web};
use serde_json::Value as JsonValue;

use crate::domain::{Document, Error, document_from_json, log_key_for};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

fn parse_payload(body: &[u8]) -> Result<Document, Error> {
    let parsed: JsonValue = serde_json::from_slice(body)
        .map_err(|err| Error::invalid_request(format!("unable to parse json: {err}")))?;
    match parsed {
        JsonValue::Object(object) => Ok(document_from_json(object)),
        _ => Err(Error::invalid_request(
            "unable to parse json: expected a JSON object",
        )),
    }
}

/// Relay a locally posted reading, then refresh every linked account.
#[post("/log")]
pub async fn post_log(state: web::Data<HttpState>, body: web::Bytes) -> ApiResult<HttpResponse> {
    let attributes = parse_payload(&body)?;
    let log_key = log_key_for(state.clock.utc());
    state.relay.relay_local_payload(&log_key, attributes).await?;
    state.relay.relay_external_snapshot(&log_key).await?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body("ack"))
}
