//! Entry point for scanview: logging + CLI.

use std::time::Duration;

use anyhow::Result;
use asset::AssetManifest;
use clap::{Parser, ValueEnum};
use platform::ViewerConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Backend {
    #[default]
    Auto,
    #[value(alias = "vk")]
    Vulkan,
    #[value(alias = "d3d12")]
    Dx12,
    #[value(alias = "mtl")]
    Metal,
    #[value(alias = "opengl", alias = "gles")]
    Gl,
}

impl Backend {
    fn backends(self) -> wgpu::Backends {
        match self {
            Self::Auto => wgpu::Backends::all(),
            Self::Vulkan => wgpu::Backends::VULKAN,
            Self::Dx12 => wgpu::Backends::DX12,
            Self::Metal => wgpu::Backends::METAL,
            Self::Gl => wgpu::Backends::GL,
        }
    }
}

/// `WxH` (or `WXH`); both sides at least 1.
fn parse_size(v: &str) -> Result<(u32, u32), String> {
    let (w, h) = v
        .split_once('x')
        .or_else(|| v.split_once('X'))
        .ok_or_else(|| format!("expected WxH, got '{v}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    Ok((w.max(1), h.max(1)))
}

#[derive(Parser, Debug)]
#[command(name = "scanview")]
#[command(about = "View a scanned model, or its poster image when the model can't be shown", long_about = None)]
struct Args {
    /// Asset path or URL without extension; .glb, .obj, .fbx and .png are derived from it
    #[arg(long, default_value = AssetManifest::DEFAULT_BASE)]
    asset_base: String,

    /// Window caption
    #[arg(long, default_value = "Rubble scan")]
    caption: String,

    /// GPU backend
    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    gpu_backend: Backend,

    /// Initial window size
    #[arg(long, value_parser = parse_size, default_value = "1280x720")]
    size: (u32, u32),

    /// Log frames per second
    #[arg(long)]
    show_fps: bool,

    /// Timeout for HTTP probes and fetches, in milliseconds
    #[arg(long, default_value_t = 5000)]
    probe_timeout_ms: u64,
}

impl Args {
    fn into_config(self) -> ViewerConfig {
        let (width, height) = self.size;
        ViewerConfig {
            manifest: AssetManifest::from_base(&self.asset_base),
            caption: self.caption,
            backends: self.gpu_backend.backends(),
            width,
            height,
            show_fps: self.show_fps,
            http_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!(
        "Starting scanview. Assets: {}, backend: {:?}, show_fps={}, window_size={}x{}",
        args.asset_base,
        args.gpu_backend,
        args.show_fps,
        args.size.0,
        args.size.1
    );

    platform::run_viewer(args.into_config())?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_viewer_defaults() {
        let config = Args::parse_from(["scanview"]).into_config();
        let expected = ViewerConfig::default();
        assert_eq!(config.manifest, expected.manifest);
        assert_eq!(config.caption, expected.caption);
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.backends, wgpu::Backends::all());
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert!(!config.show_fps);
    }

    #[test]
    fn flags_are_mapped() {
        let config = Args::parse_from([
            "scanview",
            "--asset-base",
            "https://example.org/scans/rubble2",
            "--gpu-backend",
            "vk",
            "--size",
            "800X600",
            "--show-fps",
            "--probe-timeout-ms",
            "250",
        ])
        .into_config();
        assert_eq!(config.manifest.glb, "https://example.org/scans/rubble2.glb");
        assert_eq!(config.manifest.poster, "https://example.org/scans/rubble2.png");
        assert_eq!(config.backends, wgpu::Backends::VULKAN);
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.http_timeout, Duration::from_millis(250));
        assert!(config.show_fps);
    }

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("1920x1080"), Ok((1920, 1080)));
        assert_eq!(parse_size("0x10"), Ok((1, 10)));
        assert!(parse_size("1920").is_err());
        assert!(parse_size("ax1").is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Args::try_parse_from(["scanview", "--gpu-backend", "glide"]).is_err());
    }
}
