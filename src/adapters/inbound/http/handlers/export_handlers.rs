use axum::{
    extract::State,
    http::header::{self, HeaderName},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    adapters::inbound::http::{
        dto::{api_error, ApiError, ExportFormatDto, ExportRequestDto, ExportSectionListDto},
        router::AppState,
    },
    domain::models::{ExportRequest, ExportRoute},
};

pub const EXPORT_ROUTE_HEADER: &str = "x-export-route";

/// List registered export formats
pub async fn list_formats(State(app_state): State<AppState>) -> Json<Vec<ExportFormatDto>> {
    Json(
        app_state
            .exports
            .formats()
            .formats()
            .iter()
            .map(ExportFormatDto::from)
            .collect(),
    )
}

/// List registered export sections
pub async fn list_sections(State(app_state): State<AppState>) -> Json<ExportSectionListDto> {
    Json(ExportSectionListDto {
        sections: app_state.exports.sections().sections().to_vec(),
    })
}

/// Produce an export artifact as a downloadable attachment
pub async fn create_export(
    State(app_state): State<AppState>,
    Json(request): Json<ExportRequestDto>,
) -> Result<Response, ApiError> {
    let request = ExportRequest::builder()
        .subject_id(request.subject_id)
        .section_key(request.section)
        .format_key(request.format)
        .records(request.records)
        .maybe_date(request.date)
        .build();

    let artifact = app_state.exports.export(&request).await.map_err(api_error)?;

    let route = match artifact.route {
        ExportRoute::Remote => "remote",
        ExportRoute::Local => "local",
    };
    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);

    Ok((
        [
            (header::CONTENT_TYPE, artifact.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
            (HeaderName::from_static(EXPORT_ROUTE_HEADER), route.to_string()),
        ],
        artifact.bytes,
    )
        .into_response())
}
