//! One-shot messages shown on the next render of the upload form.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const FLASH_COOKIE: &str = "clipgif_flash";

/// Longest message kept, in characters. Browsers cap cookies near 4 KiB and
/// the jar percent-encodes values, which can triple the size.
const MAX_FLASH_CHARS: usize = 1000;

/// Build the cookie carrying `message`.
///
/// Messages over the cap keep their tail, where FFmpeg puts the error.
pub fn cookie(message: &str) -> Cookie<'static> {
    let count = message.chars().count();
    let kept: String = if count > MAX_FLASH_CHARS {
        let tail: String = message.chars().skip(count - MAX_FLASH_CHARS).collect();
        format!("...{}", tail)
    } else {
        message.to_string()
    };

    Cookie::build((FLASH_COOKIE, kept))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Read and clear the pending message.
pub fn take(jar: CookieJar) -> (CookieJar, Option<String>) {
    let message = jar
        .get(FLASH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|m| !m.is_empty());

    if message.is_none() {
        return (jar, None);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), message)
}
