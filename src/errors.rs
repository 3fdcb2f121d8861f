use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Analysis result error: {0}")]
    Analysis(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Diagnostics export error: {0}")]
    Export(String),

    #[error("Unrecognized {kind} override: {value:?}")]
    InvalidOverride { kind: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),
}

impl serde::Serialize for CalibError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type CalibResult<T> = Result<T, CalibError>;
