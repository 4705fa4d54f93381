use std::env;
use std::path::PathBuf;

// FFmpeg is linked through ffmpeg-next. Linux and macOS builds find it via
// pkg-config; on Windows the libraries usually come from vcpkg and need
// FFMPEG_DIR pointing at the install.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows")
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!(
            "cargo:warning=battlecut: FFMPEG_DIR is not set; install FFmpeg (e.g. with vcpkg) and point FFMPEG_DIR at it"
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let candidate = PathBuf::from(vcpkg_root).join("installed").join(triplet);
    if candidate.join("include").join("libavformat").exists() {
        println!(
            "cargo:warning=battlecut: found FFmpeg under {}; set FFMPEG_DIR to it",
            candidate.display()
        );
    } else {
        println!(
            "cargo:warning=battlecut: VCPKG_ROOT is set but {} has no FFmpeg headers",
            candidate.display()
        );
    }
}
