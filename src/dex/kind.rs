//! DEX file type detection

/// Represents the type of DEX file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DexKind {
    /// Standard DEX format (dex\n035)
    Dex,
    /// Compact DEX format (cdex)
    Cdex,
}

impl DexKind {
    /// Returns the string representation used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            DexKind::Dex => "DEX",
            DexKind::Cdex => "CDEX",
        }
    }
}

/// Detect DEX file type from header bytes
///
/// # Arguments
/// * `header` - First few bytes of the file (at least 8 bytes recommended)
///
/// # Returns
/// - `Some(DexKind::Dex)` if standard DEX format detected
/// - `Some(DexKind::Cdex)` if compact DEX format detected
/// - `None` if not a valid DEX file
pub fn detect_dex_kind(header: &[u8]) -> Option<DexKind> {
    if header.len() < 8 {
        return None;
    }

    // Standard DEX: "dex\n" followed by three version digits and a NUL
    if &header[0..4] == b"dex\n"
        && header[4..7].iter().all(|c| c.is_ascii_digit())
        && header[7] == b'\0'
    {
        return Some(DexKind::Dex);
    }

    // Compact DEX: "cdex" followed by version bytes
    if &header[0..4] == b"cdex" {
        return Some(DexKind::Cdex);
    }

    None
}

/// Parse the three-digit format version of a standard DEX header
///
/// `dex\n039\0` yields `Some(39)`.
pub fn dex_version(header: &[u8]) -> Option<u16> {
    if detect_dex_kind(header) != Some(DexKind::Dex) {
        return None;
    }
    header[4..7]
        .iter()
        .try_fold(0u16, |acc, &digit| Some(acc * 10 + u16::from(digit - b'0')))
}
