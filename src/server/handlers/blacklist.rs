use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::blacklist::{BlacklistStore, CreateOutcome, NewEntry, normalize_email};
use crate::server::{AppState, auth::BearerAuth, client_ip::ClientIp, errors::AppError};

pub const ENTRY_ADDED: &str = "Email added to global blacklist";
pub const ALREADY_BLACKLISTED: &str = "Email was already on the blacklist";

const FIELDS: [&str; 3] = ["email", "app_uuid", "blocked_reason"];

/// Body of `POST /blacklists`.
///
/// Every field is optional at the type level so that missing fields surface
/// as validation details rather than as a deserialization failure.
#[derive(Debug, Default, Validate)]
pub struct CreateEntryRequest {
    #[validate(
        required(message = "Missing data for required field."),
        email(message = "Not a valid email address."),
        length(max = 320, message = "Longer than maximum length 320.")
    )]
    pub email: Option<String>,
    #[validate(required(message = "Missing data for required field."))]
    pub app_uuid: Option<String>,
    #[validate(length(max = 255, message = "Longer than maximum length 255."))]
    pub blocked_reason: Option<String>,
    /// Fields that were present with a JSON value other than a string or null.
    #[validate(skip)]
    pub mistyped: Vec<&'static str>,
}

impl CreateEntryRequest {
    /// Parses a request body field by field.
    ///
    /// A body that is not a JSON object counts as `{}`. A field holding a
    /// non-string value is recorded in `mistyped` and reported on its own.
    pub fn from_body(body: &[u8]) -> Self {
        let fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => {
                debug!("Non-object create payload treated as empty: {other}");
                return Self::default();
            }
            Err(e) => {
                debug!("Unparsable create payload treated as empty: {e}");
                return Self::default();
            }
        };

        let mut mistyped = Vec::new();
        let email = string_field(&fields, "email", &mut mistyped);
        let app_uuid = string_field(&fields, "app_uuid", &mut mistyped);
        let blocked_reason = string_field(&fields, "blocked_reason", &mut mistyped);

        Self {
            email,
            app_uuid,
            blocked_reason,
            mistyped,
        }
    }

    /// Trims every field, lower-cases the email and drops an empty reason.
    fn normalized(self) -> Self {
        Self {
            email: self.email.map(|email| normalize_email(&email)),
            app_uuid: self.app_uuid.map(|app_uuid| app_uuid.trim().to_string()),
            blocked_reason: self
                .blocked_reason
                .map(|reason| reason.trim().to_string())
                .filter(|reason| !reason.is_empty()),
            mistyped: self.mistyped,
        }
    }

    /// Validates the request and turns it into an entry for the store.
    ///
    /// The UUID is stored in its lower-case hyphenated form whatever notation was submitted.
    pub fn into_new_entry(self, ip_address: String) -> Result<NewEntry, ValidationErrors> {
        let request = self.normalized();

        let mut errors = match request.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        for field in FIELDS.into_iter().filter(|f| request.mistyped.contains(f)) {
            errors.errors_mut().remove(field);
            errors.add(
                field,
                ValidationError::new("type").with_message("Not a valid string.".into()),
            );
        }

        let app_uuid = match request.app_uuid.as_deref().map(Uuid::try_parse) {
            Some(Ok(app_uuid)) => Some(app_uuid.hyphenated().to_string()),
            Some(Err(_)) => {
                errors.add(
                    "app_uuid",
                    ValidationError::new("uuid").with_message("Not a valid UUID.".into()),
                );
                None
            }
            None => None,
        };

        let (Some(email), Some(app_uuid)) = (request.email, app_uuid) else {
            return Err(errors);
        };
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewEntry {
            email,
            app_uuid,
            blocked_reason: request.blocked_reason,
            ip_address,
        })
    }
}

fn string_field(
    fields: &Map<String, Value>,
    name: &'static str,
    mistyped: &mut Vec<&'static str>,
) -> Option<String> {
    match fields.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            mistyped.push(name);
            None
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn json(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Body of `GET /blacklists/{email}`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LookupResponse {
    pub blocked: bool,
    pub email: String,
    pub blocked_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// `POST /blacklists`: adds an email to the global blacklist.
///
/// Re-submitting an email that is already blacklisted answers 200 instead of 201.
#[instrument(skip_all)]
pub async fn create_entry<S: BlacklistStore>(
    State(state): State<AppState<S>>,
    _auth: BearerAuth,
    ClientIp(ip_address): ClientIp,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let entry = CreateEntryRequest::from_body(&body)
        .into_new_entry(ip_address)
        .inspect_err(|errors| debug!("Rejected create payload: {errors}"))?;
    let email = entry.email.clone();

    match state.store.create(entry).await? {
        CreateOutcome::Created { id, .. } => {
            info!(id, %email, "Email added to blacklist");
            Ok((StatusCode::CREATED, MessageResponse::json(ENTRY_ADDED)))
        }
        CreateOutcome::AlreadyExists => {
            debug!(%email, "Email already blacklisted");
            Ok((StatusCode::OK, MessageResponse::json(ALREADY_BLACKLISTED)))
        }
    }
}

/// `GET /blacklists/{email}`: reports whether an email is blacklisted.
///
/// An unknown email is a regular answer with `blocked: false`.
#[instrument(skip_all)]
pub async fn lookup_entry<S: BlacklistStore>(
    State(state): State<AppState<S>>,
    _auth: BearerAuth,
    Path(email): Path<String>,
) -> Result<Json<LookupResponse>, AppError> {
    let email = normalize_email(&email);

    let response = match state.store.find_by_email(&email).await? {
        Some(entry) => LookupResponse {
            blocked: true,
            email: entry.email,
            blocked_reason: entry.blocked_reason,
            created_at: Some(entry.created_at),
        },
        None => LookupResponse {
            blocked: false,
            email,
            blocked_reason: None,
            created_at: None,
        },
    };

    Ok(Json(response))
}
