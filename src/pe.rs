//! Shallow PE check: does the file carry a CLR runtime header?
//!
//! Only the DOS, COFF and optional headers are parsed. Sections, imports,
//! relocations and the CLR metadata itself are left to the wrapped tools, so
//! a truncated assembly still reaches them.

use goblin::pe::header::Header;

use crate::AppResult;

/// Result of checking a PE image for a .NET runtime header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotnetCheck {
    Dotnet,
    NotDotnet(&'static str),
}

/// Looks in `data` for the CLR runtime header data directory (index 14).
///
/// # Errors
///
/// Returns [`crate::AppError::InvalidPe`] if the PE headers cannot be parsed.
pub fn detect_dotnet(data: &[u8]) -> AppResult<DotnetCheck> {
    let header = Header::parse(data)?;
    let Some(optional_header) = &header.optional_header else {
        return Ok(DotnetCheck::NotDotnet("File does not have an OptionalHeader"));
    };

    match optional_header.data_directories.get_clr_runtime_header() {
        Some(dir) if dir.virtual_address != 0 => Ok(DotnetCheck::Dotnet),
        _ => Ok(DotnetCheck::NotDotnet("Not a .NET assembly")),
    }
}
