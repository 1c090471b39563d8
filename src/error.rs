use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("{0}")]
    General(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

pub type Result<T> = core::result::Result<T, ReportError>;

impl ReportError {
    /// Wraps a drawing backend failure; plotters errors are generic over the backend.
    pub fn plot(err: impl std::fmt::Display) -> Self {
        ReportError::Plot(err.to_string())
    }
}
