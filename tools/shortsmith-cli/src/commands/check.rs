//! Check engine and font availability.

use std::path::Path;

use shortsmith_common::config::AppConfig;
use shortsmith_render_engine::probe;
use shortsmith_render_engine::style::FontResolver;

/// Whether a configured binary can be launched: explicit paths must exist,
/// bare names are looked up on PATH.
async fn binary_available(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        binary.is_file()
    } else {
        probe::command_exists(&binary.to_string_lossy()).await
    }
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    println!("Shortsmith System Check");
    println!("{}", "=".repeat(50));

    let engine = &config.engine;
    let ffmpeg_ok = binary_available(&engine.ffmpeg_path).await;
    if ffmpeg_ok {
        let version = probe::engine_version(&engine.ffmpeg_path)
            .await
            .unwrap_or_else(|| "version unknown".to_string());
        println!("[OK] Engine: {} ({version})", engine.ffmpeg_path.display());
    } else {
        println!("[FAIL] Engine not found: {}", engine.ffmpeg_path.display());
    }

    if binary_available(&engine.ffprobe_path).await {
        println!("[OK] Probe: {}", engine.ffprobe_path.display());
    } else {
        println!(
            "[WARN] Probe not found: {} (audio presence and durations will be assumed)",
            engine.ffprobe_path.display()
        );
    }

    let fonts = FontResolver::scan(&config.style);
    for (label, bold) in [("regular", false), ("bold", true)] {
        let path = fonts.resolve(fonts.default_family(), bold, false);
        if path.is_file() {
            println!("[OK] Font {} {label}: {}", fonts.default_family(), path.display());
        } else {
            println!(
                "[WARN] Font {} {label} not found (fallback {} is missing)",
                fonts.default_family(),
                path.display()
            );
        }
    }

    println!("[OK] Color format: {:?}", config.style.color_format);
    println!("[OK] Downloads: {}", config.server.downloads_dir.display());

    println!();
    if ffmpeg_ok {
        println!("The render engine is available. Shortsmith is ready.");
    } else {
        println!("The render engine is missing. Install ffmpeg or set engine.ffmpeg_path.");
    }
    Ok(())
}
