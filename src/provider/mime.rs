//! Static MIME lookup tables consumed by the sync worker.
//!
//! Three deterministic lookups:
//! - file extension for a MIME type (for final-filename normalization)
//! - export format for the provider's native editable document types
//! - upload content type (the MIME type of the bytes actually stored)

/// MIME prefix of the provider's native editable document types.
pub const NATIVE_MIME_PREFIX: &str = "application/vnd.google-apps";

/// MIME type → file extension (with leading dot).
const MIME_TO_EXTENSION: &[(&str, &str)] = &[
    // Native editable types, named after their export format
    ("application/vnd.google-apps.document", ".docx"),
    ("application/vnd.google-apps.spreadsheet", ".xlsx"),
    ("application/vnd.google-apps.presentation", ".pptx"),
    ("application/vnd.google-apps.drawing", ".png"),
    ("application/vnd.google-apps.script", ".gs"),
    ("application/vnd.google-apps.site", ".html"),
    ("application/vnd.google-apps.form", ".json"),
    // Office formats
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".docx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xlsx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".pptx",
    ),
    ("application/msword", ".doc"),
    ("application/vnd.ms-excel", ".xls"),
    ("application/vnd.ms-powerpoint", ".ppt"),
    ("application/pdf", ".pdf"),
    // Images
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
    ("image/bmp", ".bmp"),
    ("image/svg+xml", ".svg"),
    ("image/webp", ".webp"),
    // Text
    ("text/plain", ".txt"),
    ("text/html", ".html"),
    ("text/css", ".css"),
    ("text/javascript", ".js"),
    ("text/csv", ".csv"),
    ("application/json", ".json"),
    ("application/xml", ".xml"),
    ("text/xml", ".xml"),
    // Archives
    ("application/zip", ".zip"),
    ("application/x-rar-compressed", ".rar"),
    ("application/x-7z-compressed", ".7z"),
    ("application/gzip", ".gz"),
    // Audio
    ("audio/mpeg", ".mp3"),
    ("audio/wav", ".wav"),
    ("audio/ogg", ".ogg"),
    ("audio/mp4", ".m4a"),
    // Video
    ("video/mp4", ".mp4"),
    ("video/avi", ".avi"),
    ("video/quicktime", ".mov"),
    ("video/webm", ".webm"),
    // Misc
    ("application/rtf", ".rtf"),
    ("application/epub+zip", ".epub"),
];

/// Native editable type → office-interchange export MIME type.
const EXPORT_FORMATS: &[(&str, &str)] = &[
    (
        "application/vnd.google-apps.document",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "application/vnd.google-apps.spreadsheet",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "application/vnd.google-apps.presentation",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("application/vnd.google-apps.drawing", "image/png"),
];

/// Returns true for the provider's native editable document types, which
/// must be exported rather than downloaded as raw bytes.
pub fn is_native_editable(mime_type: &str) -> bool {
    mime_type.starts_with(NATIVE_MIME_PREFIX)
}

/// Resolves the file extension (with leading dot) for a MIME type.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    MIME_TO_EXTENSION
        .iter()
        .find(|(m, _)| *m == mime_type)
        .map(|(_, ext)| *ext)
}

/// Resolves the export MIME type for a native editable document.
///
/// Returns `None` for native types with no supported export (e.g. forms),
/// and for non-native types, which are downloaded as-is.
pub fn export_format(mime_type: &str) -> Option<&'static str> {
    EXPORT_FORMATS
        .iter()
        .find(|(m, _)| *m == mime_type)
        .map(|(_, export)| *export)
}

/// The content type of the bytes actually uploaded to object storage.
///
/// Native editable documents are stored in their export format; everything
/// else keeps its original MIME type, defaulting to `application/octet-stream`.
pub fn upload_content_type(mime_type: &str) -> &'static str {
    if is_native_editable(mime_type) {
        return export_format(mime_type).unwrap_or("application/octet-stream");
    }
    MIME_TO_EXTENSION
        .iter()
        .find(|(m, _)| *m == mime_type)
        .map(|(m, _)| *m)
        .unwrap_or("application/octet-stream")
}

/// Appends the resolved extension to a filename unless it already ends with
/// it (case-insensitive). Falls back to the existing name when the MIME type
/// is unresolvable.
pub fn add_extension(file_name: &str, mime_type: &str) -> String {
    match extension_for_mime(mime_type) {
        Some(ext) if !file_name.to_lowercase().ends_with(&ext.to_lowercase()) => {
            format!("{file_name}{ext}")
        }
        _ => file_name.to_string(),
    }
}
