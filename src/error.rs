use thiserror::Error;

/// Why a raw record could not be converted.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    #[error("object {object_id}: `coords` present but `value.{field}` is missing")]
    MissingBoxField {
        object_id: String,
        field: &'static str,
    },

    #[error("field `{field}` is malformed: {source}")]
    Malformed {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("schema must be a JSON object, found {0}")]
    SchemaNotObject(&'static str),
}

/// Why a translation provider did not return a usable result.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered with status {0}")]
    Status(u16),

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

/// Why frames could not be extracted from a video.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to open video {0}")]
    Open(String),

    #[error("could not determine the frame rate: {0}")]
    FrameRate(String),

    #[error("interval of {interval}s at {fps} fps is shorter than one frame")]
    StepTooSmall { fps: f64, interval: f64 },

    #[error("video is {duration:.1}s long, the limit is {limit:.0}s")]
    TooLong { duration: f64, limit: f64 },

    #[error("{tool} exited with {status}: {stderr}")]
    Tool {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
