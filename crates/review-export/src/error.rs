use thiserror::Error;

/// Hint appended to alerts when a format-specific renderer fails.
pub const REMEDIATION_HINT: &str = "Please try Original Format or HTML export instead.";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("{0}")]
    Validation(String),

    #[error("An export is already in progress")]
    Busy,

    #[error("Failed to decode original file: {0}")]
    Decode(String),

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("DOCX conversion failed: {0}")]
    Docx(String),

    #[error("Image could not be loaded: {0}")]
    Image(String),

    #[error("Download failed: {0}")]
    Delivery(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ExportError {
    /// Message shown to the user for this failure.
    ///
    /// Renderer failures carry a remediation hint; validation and busy
    /// failures are shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ExportError::Validation(msg) => msg.clone(),
            ExportError::Busy => {
                "An export is already running. Please wait for it to finish.".to_string()
            }
            ExportError::Parse(_) => format!(
                "The original PDF could not be read for annotation. {}",
                REMEDIATION_HINT
            ),
            ExportError::Render(_) | ExportError::Image(_) => {
                format!("Failed to generate the PDF. {}", REMEDIATION_HINT)
            }
            ExportError::Docx(_) => {
                format!("Failed to generate the Word document. {}", REMEDIATION_HINT)
            }
            ExportError::Decode(_) => {
                "The original file data is corrupted and could not be exported.".to_string()
            }
            ExportError::Delivery(e) => format!("The download could not be started ({}).", e),
            ExportError::Config(e) => format!("Export is misconfigured ({}).", e),
        }
    }

    /// Whether the error came out of a format renderer (as opposed to a gate).
    pub fn is_render_failure(&self) -> bool {
        matches!(
            self,
            ExportError::Parse(_)
                | ExportError::Render(_)
                | ExportError::Docx(_)
                | ExportError::Image(_)
        )
    }
}

impl From<lopdf::Error> for ExportError {
    fn from(err: lopdf::Error) -> Self {
        ExportError::Parse(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::Docx(err.to_string())
    }
}

impl From<base64::DecodeError> for ExportError {
    fn from(err: base64::DecodeError) -> Self {
        ExportError::Decode(err.to_string())
    }
}
