//! OAuth round-trip endpoints.
//!
//! ```text
//! GET /login
//! GET /oauth?code=abc&state=6f1c...
//! ```

use actix_web::http::header::{self, ContentType};
use actix_web::{HttpResponse, get, web};
use tracing::info;

use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Query parameters the provider appends to the callback.
///
/// Both are optional at the extractor level so a missing parameter reaches
/// the linker and is reported as a bad request rather than an extractor
/// error. Repeated parameters keep their first value.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl OAuthCallback {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut callback = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "code" => &mut callback.code,
                "state" => &mut callback.state,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        callback
    }
}

/// Issue a state token and redirect to the provider's consent page.
#[get("/login")]
pub async fn login(state: web::Data<HttpState>) -> ApiResult<HttpResponse> {
    let location = state.linker.begin_login().await.map_err(Error::from)?;
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .content_type(ContentType::plaintext())
        .body("Redirecting"))
}

/// Finish the OAuth flow and record the linked account.
#[get("/oauth")]
pub async fn oauth_callback(
    state: web::Data<HttpState>,
    query: web::Query<Vec<(String, String)>>,
) -> ApiResult<HttpResponse> {
    let OAuthCallback { code, state: token } = OAuthCallback::from_pairs(query.into_inner());
    let account = state
        .linker
        .complete_login(code.as_deref(), token.as_deref())
        .await?;
    info!(
        user_id = %account.user_id,
        thermostats = account.thermostat_ids.len(),
        "linked provider account"
    );
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body("Logged in successfully."))
}
