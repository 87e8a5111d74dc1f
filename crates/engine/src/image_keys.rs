use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageKeyError {
    #[error("image key must not be empty")]
    Empty,
    #[error("image key must not start or end with '/'")]
    EdgeSlash,
    #[error("image key contains an empty path segment")]
    EmptySegment,
    #[error("image key must not contain '.' or '..' segments")]
    RelativeSegment,
    #[error("image key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Checks that `key` is a relative, forward-slash path of lowercase segments,
/// for example `tiles/grove/water_0`.
pub(crate) fn validate_image_key(key: &str) -> Result<(), ImageKeyError> {
    if key.is_empty() {
        return Err(ImageKeyError::Empty);
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(ImageKeyError::EdgeSlash);
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(ImageKeyError::EmptySegment),
            "." | ".." => return Err(ImageKeyError::RelativeSegment),
            _ => {}
        }
        if let Some(character) = segment.chars().find(|&ch| !is_key_char(ch)) {
            return Err(ImageKeyError::InvalidCharacter { character });
        }
    }
    Ok(())
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-' | '.')
}
