//! Extension to content-type mapping.
//!
//! Backs [`Entry::content_type`](crate::tree::Entry::content_type) and the
//! download/archive surfaces. The table covers the types a file-manager
//! frontend commonly distinguishes; everything else collapses to
//! [`FALLBACK`].

/// Content type reported for unknown extensions and for directories.
pub const FALLBACK: &str = "application/octet-stream";

/// Look up the content type for a file extension (without the leading dot).
///
/// Matching is ASCII case-insensitive, so `"PNG"` and `"png"` resolve to the
/// same type. Unknown extensions return [`FALLBACK`].
pub fn from_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        // Text and web
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "md" => "text/markdown",
        "ics" => "text/calendar",
        "rtf" => "application/rtf",

        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "odt" => "application/vnd.oasis.opendocument.text",
        "epub" => "application/epub+zip",

        // Images
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "ico" => "image/vnd.microsoft.icon",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "avif" => "image/avif",

        // Audio
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "mid" | "midi" => "audio/midi",
        "mp3" => "audio/mpeg",
        "oga" | "ogg" => "audio/ogg",
        "opus" => "audio/opus",
        "wav" => "audio/wav",
        "weba" => "audio/webm",

        // Video
        "avi" => "video/x-msvideo",
        "mp4" => "video/mp4",
        "mpeg" => "video/mpeg",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "ogv" => "video/ogg",
        "webm" => "video/webm",

        // Archives
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "bz2" => "application/x-bzip2",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        "tar" => "application/x-tar",

        // Fonts
        "otf" => "font/otf",
        "ttf" => "font/ttf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",

        _ => FALLBACK,
    }
}
