use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

/// Browser recordings without any type information
pub const DEFAULT_AUDIO_MIME: &str = "audio/webm";
/// Named uploads whose extension is not recognised
pub const FALLBACK_FILE_MIME: &str = "audio/wav";

/// One learner recording
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub data: Bytes,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Decodes a base64 upload; a `data:` URL prefix is accepted.
    pub fn from_base64(encoded: &str, mime_type: Option<&str>) -> Result<Self, base64::DecodeError> {
        let (header, payload) = match encoded.split_once(";base64,") {
            Some((header, payload)) if header.starts_with("data:") => (Some(&header[5..]), payload),
            _ => (None, encoded),
        };
        let data = STANDARD.decode(payload.trim())?;
        let mime = mime_type
            .and_then(normalize_mime)
            .or_else(|| header.and_then(normalize_mime))
            .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string());
        Ok(Self::new(data, mime))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// MIME subtype, as expected by `input_audio.format`
    pub fn format(&self) -> &str {
        self.mime_type
            .split_once('/')
            .map(|(_, subtype)| subtype)
            .unwrap_or(&self.mime_type)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

/// `audio/*` MIME types only; parameters such as `;codecs=opus` are dropped.
pub fn normalize_mime(raw: &str) -> Option<String> {
    let essence = raw.split(';').next()?.trim().to_ascii_lowercase();
    essence.starts_with("audio/").then_some(essence)
}

/// Unknown or missing extensions are treated as WAV.
pub fn mime_from_extension(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        "ogg" => "audio/ogg",
        _ => FALLBACK_FILE_MIME,
    }
}

/// Content-Type first, then the file name; webm only when neither is known
pub fn resolve_mime(content_type: Option<&str>, file_name: Option<&str>) -> String {
    content_type
        .and_then(normalize_mime)
        .or_else(|| file_name.map(|name| mime_from_extension(name).to_string()))
        .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string())
}
