// Build script for Vulkan shader compilation

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../shaders");

    // Allow skipping shader compilation with an env var
    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            println!("cargo:rerun-if-env-changed=VULKAN_SDK");
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{vulkan_sdk}\\Bin\\glslc.exe")
    } else {
        format!("{vulkan_sdk}/bin/glslc")
    };

    if !Path::new(&glslc).exists() {
        eprintln!("warning: glslc not found at {glslc}, shader compilation skipped");
        return;
    }

    let shader_dir = PathBuf::from("../shaders");
    let target_dir = PathBuf::from("../target/shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create {target_dir:?}: {e}");
        return;
    }

    let Ok(entries) = std::fs::read_dir(&shader_dir) else {
        eprintln!("info: No shader directory found at {shader_dir:?}");
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if ext != "vert" && ext != "frag" {
            continue;
        }

        let stem = path.file_stem().unwrap().to_string_lossy();
        let output = target_dir.join(format!("{stem}_{ext}.spv"));

        let status = Command::new(&glslc)
            .arg(&path)
            .arg("-o")
            .arg(&output)
            .status();

        match status {
            Ok(s) if s.success() => {
                eprintln!("info: compiled {} -> {}", path.display(), output.display());
            }
            Ok(s) => panic!("glslc failed on {} (exit {s})", path.display()),
            Err(e) => panic!("failed to run glslc: {e}"),
        }
    }
}
