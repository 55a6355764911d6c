/// Logs `$err` at `$level`, or returns it when `$level` is at or above the
/// configured `fail_level` of `$state`.
#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

/// Failure to decode a single frame header.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("No frame sync word at the expected position")]
    LostSync,

    #[error("Reserved layer or MPEG version in frame header")]
    BadLayer,

    #[error("Reserved bitrate index 15 in frame header")]
    BadBitrate,

    #[error("Reserved sample rate index 3 in frame header")]
    BadSampleRate,

    #[error("Frame header truncated")]
    Truncated,
}

/// Outcome of a failed frame advance on a [`StreamCursor`].
///
/// [`StreamCursor`]: crate::process::cursor::StreamCursor
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    #[error("Insufficient buffer data for the next frame")]
    NeedMoreData,

    #[error("Lost synchronization")]
    LostSync,

    #[error("Reserved layer or MPEG version in frame header")]
    BadLayer,

    #[error("Reserved bitrate index in frame header")]
    BadBitrate,

    #[error("Reserved sample rate index in frame header")]
    BadSampleRate,

    #[error("Frame CRC mismatch")]
    BadCrc,
}

impl StreamError {
    /// `true` for errors after which the cursor resynchronizes on its own.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StreamError::NeedMoreData)
    }

    pub fn is_need_more_data(&self) -> bool {
        matches!(self, StreamError::NeedMoreData)
    }
}

impl From<HeaderError> for StreamError {
    fn from(err: HeaderError) -> Self {
        match err {
            HeaderError::LostSync => StreamError::LostSync,
            HeaderError::BadLayer => StreamError::BadLayer,
            HeaderError::BadBitrate => StreamError::BadBitrate,
            HeaderError::BadSampleRate => StreamError::BadSampleRate,
            HeaderError::Truncated => StreamError::NeedMoreData,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("No seek metadata tag in the first frame")]
    NotFound,

    #[error("LAME tag CRC mismatch. Calculated {calculated:#06X}, Read {read:#06X}")]
    BadCrc { calculated: u16, read: u16 },

    #[error("Malformed {tag} tag: {reason}")]
    Malformed {
        tag: &'static str,
        reason: &'static str,
    },
}

impl TagError {
    pub(crate) fn malformed(tag: &'static str, reason: &'static str) -> Self {
        TagError::Malformed { tag, reason }
    }

    /// Maps a read past the end of the frame to [`TagError::Malformed`].
    pub(crate) fn truncated(tag: &'static str) -> impl Fn(std::io::Error) -> Self {
        move |_| TagError::malformed(tag, "truncated")
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("No MPEG audio frames found")]
    NoAudio,

    #[error("Leading tag size {declared} exceeds the {available} available bytes")]
    LeadingTagOverrun { declared: usize, available: usize },

    #[error(transparent)]
    Tag(#[from] TagError),
}

impl From<std::io::Error> for HeaderError {
    fn from(_: std::io::Error) -> Self {
        HeaderError::Truncated
    }
}
