//! Responsible for the web front-end: the upload form and the generation endpoint

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::error;

use crate::generate::generate_map;
use crate::isochrone::IsochroneEngine;
use crate::loader::UploadedFile;
use crate::map::html::ExportError;
use crate::model::{DEFAULT_WALKING_SPEED_MPS, GenerationReport, IsochroneRequestParams};

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub struct AppState<E> {
    pub engine: E,
}

pub fn build_router<E>(state: Arc<AppState<E>>) -> Router
where
    E: IsochroneEngine + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate::<E>))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("server/index.html"))
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Serialize)]
struct GenerateResponse {
    map_html: String,
    report: GenerationReport,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("{e:?}");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

/// Runs one generation pass over the uploaded files and answers with the
/// exported map plus the report. Input problems come back as 400s, an
/// export failure as 500.
async fn generate<E>(
    State(state): State<Arc<AppState<E>>>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError>
where
    E: IsochroneEngine + Send + Sync + 'static,
{
    let (files, params) = read_generate_form(multipart).await?;

    let output = generate_map(&state.engine, &files, params)
        .await
        .map_err(|e| {
            if e.downcast_ref::<ExportError>().is_some() {
                ApiError::from(e)
            } else {
                ApiError::bad_request(e.to_string())
            }
        })?;

    Ok(Json(GenerateResponse {
        map_html: output.map_html,
        report: output.report,
    }))
}

async fn read_generate_form(
    mut multipart: Multipart,
) -> Result<(Vec<UploadedFile>, IsochroneRequestParams), ApiError> {
    let mut files = vec![];
    let mut walking_speed_mps = DEFAULT_WALKING_SPEED_MPS;
    let mut thresholds_min = vec![];

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart request: {e}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("files") => {
                let name = field.file_name().unwrap_or("upload.csv").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("couldn't read {name}: {e}")))?
                    .to_vec();
                files.push(UploadedFile { name, bytes });
            }
            Some("walking_speed_mps") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid walking speed: {e}")))?;
                walking_speed_mps = parse_speed(&text)?;
            }
            Some("thresholds") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid thresholds: {e}")))?;
                thresholds_min.extend(parse_thresholds(&text)?);
            }
            _ => {}
        }
    }

    Ok((
        files,
        IsochroneRequestParams::new(walking_speed_mps, thresholds_min),
    ))
}

fn parse_speed(text: &str) -> Result<f64, ApiError> {
    let speed: f64 = text
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid walking speed '{text}'")))?;

    if speed <= 0.0 || !speed.is_finite() {
        return Err(ApiError::bad_request("walking speed must be positive"));
    }

    Ok(speed)
}

fn parse_thresholds(text: &str) -> Result<Vec<u32>, ApiError> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse()
                .map_err(|_| ApiError::bad_request(format!("invalid threshold '{t}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isochrone::tests::SquareEngine;

    #[test]
    fn router_builds_for_any_engine() {
        let state = Arc::new(AppState {
            engine: SquareEngine,
        });
        let _router = build_router(state);
    }

    #[test]
    fn thresholds_parse_from_comma_separated_text() {
        assert_eq!(parse_thresholds("5, 10,30").unwrap(), vec![5, 10, 30]);
        assert_eq!(parse_thresholds("").unwrap(), Vec::<u32>::new());
        assert!(parse_thresholds("5,ten").is_err());
    }

    #[test]
    fn speed_must_be_a_positive_number() {
        assert_eq!(parse_speed(" 1.33 ").unwrap(), 1.33);
        assert!(parse_speed("0").is_err());
        assert!(parse_speed("-2").is_err());
        assert!(parse_speed("fast").is_err());
    }

    #[test]
    fn api_errors_answer_with_their_status() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
