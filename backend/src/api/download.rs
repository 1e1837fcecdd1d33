use crate::api::params::ScrapeParams;
use crate::models::ErrorResponse;
use crate::services::csv_export::to_csv;
use crate::services::scraper::{collect_comments, ScrapeError};
use crate::utils::csv_filename;
use crate::AppState;
use log::{debug, error, info, warn};
use rocket::http::{ContentType, Header};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::{get, State};
use std::io::Cursor;

/// A finished CSV export served as an attachment.
pub struct CsvDownload {
    pub filename: String,
    pub body: String,
}

impl<'r> Responder<'r, 'static> for CsvDownload {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::CSV)
            .header(Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            ))
            .header(Header::new("Cache-Control", "no-cache"))
            .sized_body(self.body.len(), Cursor::new(self.body))
            .ok()
    }
}

#[get("/download?<params..>")]
pub async fn download_comments(
    params: ScrapeParams,
    state: &State<AppState>,
) -> Result<CsvDownload, ErrorResponse> {
    let request = params.into_request(&state.settings).map_err(|e| {
        warn!("Rejected download request: {e}");
        ErrorResponse::bad_request(e)
    })?;
    if request.resume.is_some() {
        debug!("Ignoring resume parameters on the download endpoint");
    }
    info!("Collecting comments for download of '{}'", request.session.query);

    let result = collect_comments(
        state.platform.clone(),
        &request.session,
        state.settings.download_options(),
    )
    .await
    .map_err(|e| match e {
        ScrapeError::NoData => {
            info!("No comments found for '{}'", request.session.query);
            ErrorResponse::no_data()
        }
        other => {
            error!("Download for '{}' failed: {other}", request.session.query);
            ErrorResponse::internal(other)
        }
    })?;

    info!(
        "Exporting {} comments from {} videos",
        result.records.len(),
        result.videos_scraped
    );
    Ok(CsvDownload {
        filename: csv_filename(&request.session.query, chrono::Utc::now()),
        body: to_csv(&result.records, &request.metadata.columns()),
    })
}
