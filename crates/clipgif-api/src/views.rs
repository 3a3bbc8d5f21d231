//! Minimal HTML pages.

use axum::http::StatusCode;

use clipgif_models::{Job, ALLOWED_EXTENSIONS, DEFAULT_FPS};

const STYLE: &str = "body{font-family:sans-serif;max-width:40rem;margin:2rem auto;padding:0 1rem}\
label{display:block;margin:.6rem 0}\
.flash{background:#fee;border:1px solid #c99;padding:.6rem;white-space:pre-wrap}\
img{max-width:100%}";

/// Escape text for HTML element and attribute content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <title>{}</title><style>{}</style></head>\n<body>\n{}\n</body></html>\n",
        escape(title),
        STYLE,
        body
    )
}

/// Upload form with any pending messages above it.
pub fn upload_page(messages: &[String]) -> String {
    let flashes: String = messages
        .iter()
        .map(|m| format!("<p class=\"flash\">{}</p>\n", escape(m)))
        .collect();
    let accept: Vec<String> = ALLOWED_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect();

    let body = format!(
        r#"<h1>Video to GIF</h1>
{flashes}<form method="post" action="/" enctype="multipart/form-data">
<label>Video <input type="file" name="video" accept="{accept}" required></label>
<label>Frame rate <input type="number" name="fps" value="{fps}" min="1"></label>
<label>Width (px, optional) <input type="number" name="width" min="1"></label>
<label>Start (seconds, optional) <input type="text" name="start_time" inputmode="decimal"></label>
<label>End (seconds, optional) <input type="text" name="end_time" inputmode="decimal"></label>
<button type="submit">Convert</button>
</form>"#,
        flashes = flashes,
        accept = accept.join(","),
        fps = DEFAULT_FPS,
    );
    layout("Video to GIF", &body)
}

/// Result page for a converted job.
pub fn result_page(job: &Job) -> String {
    // Artifact filenames are sanitized at allocation and need no URL escaping.
    let name = escape(&job.artifact_filename);
    let body = format!(
        r#"<h1>Your GIF is ready</h1>
<p>Converted from <strong>{display}</strong> ({size} MB)</p>
<p><img src="/preview/{name}" alt="Preview of {display}"></p>
<p><a href="/gifs/{name}" download>Download GIF</a></p>
<p><a href="/">Convert another video</a></p>"#,
        display = escape(&job.display_name),
        size = job.size_mb(),
        name = name,
    );
    layout("Your GIF", &body)
}

/// Generic error page.
pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or("Error"));
    let body = format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"/\">Back to upload</a></p>",
        escape(&title),
        escape(message)
    );
    layout(&title, &body)
}
