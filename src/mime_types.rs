pub const DEFAULT_MIME: &str = "application/octet-stream";
pub const HTML: &str = "text/html; charset=utf-8";
pub const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Content type for a request path, keyed on the text after its last `.`.
///
/// Matching is case-sensitive, so `/LOGO.PNG` is served as octet-stream.
pub fn get_content_type(path: &str) -> &'static str {
    let Some((_, extension)) = path.rsplit_once('.') else {
        return DEFAULT_MIME;
    };

    match extension {
        "html" | "htm" => HTML,
        "txt" => PLAIN_TEXT,
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "css" => "text/css; charset=utf-8",
        "ico" => "image/x-icon",
        "js" => "text/javascript; charset=utf-8",
        _ => DEFAULT_MIME,
    }
}
