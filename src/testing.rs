//! Shared helpers for unit tests: fake tools backed by shell scripts and
//! hand-built PE images.

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
#[cfg(unix)]
use std::path::{Path, PathBuf};

#[cfg(unix)]
use crate::tools::{OutputNaming, Runtime, ToolSpec};

/// CLR runtime header directory (RVA, size) inside the `.text` section.
pub const CLR_DIRECTORY: (u32, u32) = (0x2008, 0x48);

/// Writes an executable `#!/bin/sh` script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

/// A native tool that writes `<input>.out` on success.
#[cfg(unix)]
pub fn native_tool(key: &str, executable: &str, args: &[&str]) -> ToolSpec {
    ToolSpec {
        key: key.to_string(),
        display_name: format!("{key}-tool"),
        runtime: Runtime::Native,
        executable: PathBuf::from(executable),
        args: args.iter().map(|a| a.to_string()).collect(),
        stdin: None,
        output: OutputNaming::Append {
            suffix: ".out".to_string(),
        },
        failure_patterns: vec![],
    }
}

/// PE32 image with optional CLR directory. With `text`, one `.text` section
/// at RVA 0x2000 maps file offset 0x200..0x400 and the image is 0x400 bytes;
/// without it the image is headers only.
pub fn pe_image(clr: Option<(u32, u32)>, text: bool) -> Vec<u8> {
    fn put(buf: &mut [u8], at: usize, bytes: &[u8]) {
        buf[at..at + bytes.len()].copy_from_slice(bytes);
    }

    let mut buf = vec![0u8; if text { 0x400 } else { 0x200 }];
    put(&mut buf, 0, b"MZ");
    put(&mut buf, 0x3c, &0x80u32.to_le_bytes());
    put(&mut buf, 0x80, b"PE\0\0");

    let coff = 0x84;
    put(&mut buf, coff, &0x14cu16.to_le_bytes());
    put(&mut buf, coff + 2, &u16::from(text).to_le_bytes());
    put(&mut buf, coff + 16, &224u16.to_le_bytes());
    put(&mut buf, coff + 18, &0x0102u16.to_le_bytes());

    let opt = 0x98;
    put(&mut buf, opt, &0x10bu16.to_le_bytes());
    let win = opt + 28;
    put(&mut buf, win, &0x0040_0000u32.to_le_bytes());
    put(&mut buf, win + 4, &0x2000u32.to_le_bytes());
    put(&mut buf, win + 8, &0x200u32.to_le_bytes());
    put(&mut buf, win + 28, &0x4000u32.to_le_bytes());
    put(&mut buf, win + 32, &0x200u32.to_le_bytes());
    put(&mut buf, win + 40, &3u16.to_le_bytes());
    put(&mut buf, win + 64, &16u32.to_le_bytes());

    if let Some((rva, size)) = clr {
        let dir = opt + 96 + 14 * 8;
        put(&mut buf, dir, &rva.to_le_bytes());
        put(&mut buf, dir + 4, &size.to_le_bytes());
    }

    if text {
        let section = opt + 224;
        put(&mut buf, section, b".text\0\0\0");
        put(&mut buf, section + 8, &0x200u32.to_le_bytes());
        put(&mut buf, section + 12, &0x2000u32.to_le_bytes());
        put(&mut buf, section + 16, &0x200u32.to_le_bytes());
        put(&mut buf, section + 20, &0x200u32.to_le_bytes());
        put(&mut buf, section + 36, &0x6000_0020u32.to_le_bytes());
    }
    buf
}
