//! Result page.

use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::session::ActiveJob;
use crate::views;

/// Show the session's converted job, or send the client back to the form.
pub async fn result(ActiveJob(job): ActiveJob) -> Response {
    match job {
        Some(job) => Html(views::result_page(&job)).into_response(),
        None => Redirect::to("/").into_response(),
    }
}
