//! Entry point for Svarog3D: load a model and spin it in a window.
//!
//! Usage: app [--model=]<path> [--data-dir=<dir>] [--gpu-backend=<name>]
//!            [--size=WxH | --width=W --height=H] [--headless]

use std::path::PathBuf;

use anyhow::{Result, bail};
use platform::ViewerConfig;

const DEFAULT_MODEL: &str = "data/model.obj";
const DEFAULT_DATA_DIR: &str = "data";

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{other}', falling back to auto.");
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_size_args(args: &[String]) -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    (w.unwrap_or(1280).max(1), h.unwrap_or(720).max(1))
}

/// `--model=<path>` or the first positional argument.
fn parse_model_arg(args: &[String]) -> Result<PathBuf> {
    let mut model: Option<&str> = None;
    for arg in args {
        let value = match arg.strip_prefix("--model=") {
            Some(v) => v,
            None if !arg.starts_with("--") => arg.as_str(),
            None => continue,
        };
        if model.is_some() {
            bail!("More than one model given ('{value}')");
        }
        model = Some(value);
    }
    Ok(PathBuf::from(model.unwrap_or(DEFAULT_MODEL)))
}

fn parse_data_dir_arg(args: &[String]) -> PathBuf {
    args.iter()
        .rev()
        .find_map(|a| a.strip_prefix("--data-dir="))
        .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from)
}

fn parse_headless_arg(args: &[String]) -> bool {
    args.iter().any(|a| a == "--headless")
}

fn parse_config(args: &[String]) -> Result<ViewerConfig> {
    let (width, height) = parse_size_args(args);
    Ok(ViewerConfig {
        model_path: parse_model_arg(args)?,
        texture_dir: parse_data_dir_arg(args),
        backends: parse_backend_arg(args),
        width,
        height,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = parse_config(&args)?;
    log::info!(
        "Starting Svarog3D. Model: {}, data dir: {}, backend: {:?}, window_size={}x{}",
        cfg.model_path.display(),
        cfg.texture_dir.display(),
        cfg.backends,
        cfg.width,
        cfg.height
    );

    if parse_headless_arg(&args) {
        platform::run_headless(&cfg)?;
    } else {
        platform::run_viewer(cfg)?;
    }

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_when_no_args() {
        let cfg = parse_config(&[]).unwrap();
        assert_eq!(cfg.model_path, PathBuf::from(DEFAULT_MODEL));
        assert_eq!(cfg.texture_dir, PathBuf::from("data"));
        assert_eq!(cfg.backends, wgpu::Backends::all());
        assert_eq!((cfg.width, cfg.height), (1280, 720));
    }

    #[test]
    fn model_from_flag_or_positional() {
        let a = args(&["--model=cube.obj"]);
        assert_eq!(parse_model_arg(&a).unwrap(), PathBuf::from("cube.obj"));
        let b = args(&["--headless", "scene.gltf"]);
        assert_eq!(parse_model_arg(&b).unwrap(), PathBuf::from("scene.gltf"));
        let c = args(&["a.obj", "--model=b.obj"]);
        assert!(parse_model_arg(&c).is_err());
    }

    #[test]
    fn size_and_backend_flags() {
        let a = args(&["--size=800X600", "--gpu-backend=VK"]);
        assert_eq!(parse_size_args(&a), (800, 600));
        assert_eq!(parse_backend_arg(&a), wgpu::Backends::VULKAN);

        let b = args(&["--width=0", "--height=300", "--gpu-backend=bogus"]);
        assert_eq!(parse_size_args(&b), (1, 300));
        assert_eq!(parse_backend_arg(&b), wgpu::Backends::all());
    }

    #[test]
    fn data_dir_last_wins() {
        let a = args(&["--data-dir=a", "--data-dir=textures"]);
        assert_eq!(parse_data_dir_arg(&a), PathBuf::from("textures"));
        assert!(parse_headless_arg(&args(&["--headless"])));
    }
}
