use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{CropRegion, Resolution};

/// Minimum usable crop region after clamping, in source pixels.
const MIN_CROP_SIZE: i64 = 100;

/// Effect duality: transform filters are chained by composition, the
/// grain overlay is composited last so it is not distorted by
/// rotation/zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectPlan {
    pub transforms: Vec<String>,
    pub overlay: Option<OverlayEffect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayEffect {
    pub asset: PathBuf,
    pub opacity: f64,
}

impl EffectPlan {
    pub fn empty() -> Self {
        Self {
            transforms: Vec::new(),
            overlay: None,
        }
    }

    /// True when no filter stage should be emitted at all.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty() && self.overlay.is_none()
    }

    /// Motion raises bitrate targets; static content compresses better.
    pub fn has_motion(&self) -> bool {
        !self.is_empty()
    }

    /// Transform filters joined into a single chain fragment.
    pub fn transform_chain(&self) -> String {
        self.transforms.join(",")
    }
}

/// Validate a manual crop region against the true source-image
/// dimensions. Out-of-bounds origin and extent are clamped; a clamped
/// region smaller than the minimum usable size is rejected (caller falls
/// back to auto-crop). A region already fully within bounds is returned
/// unchanged.
pub fn validate_crop(crop: &CropRegion, image_dims: (u32, u32)) -> Option<CropRegion> {
    let (img_w, img_h) = (image_dims.0 as i64, image_dims.1 as i64);

    let x = crop.x.clamp(0, img_w);
    let y = crop.y.clamp(0, img_h);
    let width = crop.width.min(img_w - x);
    let height = crop.height.min(img_h - y);

    if width < MIN_CROP_SIZE || height < MIN_CROP_SIZE {
        warn!(
            "Crop region {}x{} at ({},{}) leaves less than {}x{} of a {}x{} image, using auto-crop",
            crop.width, crop.height, crop.x, crop.y, MIN_CROP_SIZE, MIN_CROP_SIZE, img_w, img_h
        );
        return None;
    }

    if x != crop.x || y != crop.y || width != crop.width || height != crop.height {
        warn!(
            "Crop region {}x{} at ({},{}) exceeds image dimensions {}x{}, clamped to {}x{} at ({},{})",
            crop.width, crop.height, crop.x, crop.y, img_w, img_h, width, height, x, y
        );
    }

    Some(CropRegion {
        x,
        y,
        width,
        height,
    })
}

/// Build the per-image prep filter: crop handling plus scaling to the
/// output resolution. With no crop (or no known source dimensions) the
/// image is scaled to fill and center-cropped; a validated manual crop
/// emits an exact crop-then-scale so the previewed composition is
/// reproduced pixel-for-pixel.
pub fn per_image_filter(
    crop: Option<&CropRegion>,
    image_dims: Option<(u32, u32)>,
    resolution: Resolution,
) -> String {
    let (w, h) = resolution.dimensions();
    let auto = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}"
    );

    let (crop, dims) = match (crop, image_dims) {
        (Some(crop), Some(dims)) => (crop, dims),
        _ => return auto,
    };

    match validate_crop(crop, dims) {
        Some(region) => {
            info!(
                "Using custom crop: {}x{} at ({},{})",
                region.width, region.height, region.x, region.y
            );
            format!(
                "crop={}:{}:{}:{},scale={w}:{h}:flags=lanczos",
                region.width, region.height, region.x, region.y
            )
        }
        None => auto,
    }
}

fn map_intensity(intensity: u8, lo: f64, hi: f64) -> f64 {
    lo + (intensity.min(100) as f64 / 100.0) * (hi - lo)
}

/// Build the video-level effect plan from active effect names and their
/// intensities. The plan is applied once to the concatenated stream, not
/// per image. Unknown effect names are skipped with a warning; a list
/// containing only the static effect (or nothing) collapses to an empty
/// plan so no no-op filter stage costs render time.
pub fn build_plan(
    effects: &[String],
    intensities: &std::collections::HashMap<String, u8>,
    fps: u32,
    resolution: Resolution,
    grain_asset: Option<&std::path::Path>,
) -> EffectPlan {
    let (w, h) = resolution.dimensions();
    let mut plan = EffectPlan::empty();

    for name in effects {
        let intensity = intensities.get(name).copied().unwrap_or(50);
        match name.to_lowercase().replace('-', " ").as_str() {
            "static" => {}
            "tilt" => {
                // Constant rotation; the slight zoom hides the corners
                // the rotation would otherwise expose.
                let angle = map_intensity(intensity, 0.3, 5.0);
                plan.transforms.push(format!(
                    "scale=iw*1.1:ih*1.1,rotate={angle:.3}*PI/180:ow={w}:oh={h}:c=black"
                ));
            }
            "dynamic tilt" => {
                // Oscillating rotation with coupled breathing zoom.
                let amplitude = map_intensity(intensity, 1.0, 10.0);
                let zoom_amplitude = map_intensity(intensity, 0.15, 0.30);
                let period = 6.0;
                plan.transforms.push(format!(
                    "zoompan=z='1+{zoom_amplitude:.3}*abs(sin(2*PI*on/({fps}*{period})))':\
                     x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={fps}"
                ));
                plan.transforms.push(format!(
                    "rotate={amplitude:.3}*PI/180*sin(2*PI*t/{period}):ow={w}:oh={h}:c=black"
                ));
            }
            "noise" => match grain_asset {
                Some(asset) => {
                    if plan.overlay.is_some() {
                        warn!("Multiple overlay effects selected, keeping the first");
                        continue;
                    }
                    let opacity = map_intensity(intensity, 0.1, 0.5);
                    plan.overlay = Some(OverlayEffect {
                        asset: asset.to_path_buf(),
                        opacity,
                    });
                }
                None => {
                    warn!("Noise effect selected but no grain asset is configured, skipping");
                }
            },
            other => {
                warn!("Unknown motion effect: {}, skipping", other);
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn intensities() -> HashMap<String, u8> {
        HashMap::from([
            ("Noise".to_string(), 50),
            ("Tilt".to_string(), 50),
            ("Dynamic Tilt".to_string(), 50),
        ])
    }

    #[test]
    fn test_valid_crop_untouched() {
        let crop = CropRegion {
            x: 100,
            y: 50,
            width: 800,
            height: 600,
        };
        assert_eq!(validate_crop(&crop, (1920, 1080)), Some(crop));
    }

    #[test]
    fn test_out_of_bounds_crop_clamped() {
        let crop = CropRegion {
            x: -20,
            y: 0,
            width: 2000,
            height: 1080,
        };
        let clamped = validate_crop(&crop, (1920, 1080)).unwrap();
        assert_eq!(clamped.x, 0);
        assert_eq!(clamped.width, 1920);
        assert_eq!(clamped.height, 1080);
    }

    #[test]
    fn test_corner_crop_rejected_when_too_small() {
        // 1900,1070 on a 1920x1080 source leaves 20x10.
        let crop = CropRegion {
            x: 1900,
            y: 1070,
            width: 500,
            height: 500,
        };
        assert_eq!(validate_crop(&crop, (1920, 1080)), None);
    }

    #[test]
    fn test_per_image_filter_auto_crop() {
        let filter = per_image_filter(None, None, Resolution::Hd1080);
        assert_eq!(
            filter,
            "scale=1920:1080:force_original_aspect_ratio=increase,crop=1920:1080"
        );
    }

    #[test]
    fn test_per_image_filter_exact_crop() {
        let crop = CropRegion {
            x: 10,
            y: 20,
            width: 1280,
            height: 720,
        };
        let filter = per_image_filter(Some(&crop), Some((1920, 1080)), Resolution::Hd1080);
        assert_eq!(filter, "crop=1280:720:10:20,scale=1920:1080:flags=lanczos");
    }

    #[test]
    fn test_rejected_crop_falls_back_to_auto() {
        let crop = CropRegion {
            x: 1900,
            y: 1070,
            width: 500,
            height: 500,
        };
        let filter = per_image_filter(Some(&crop), Some((1920, 1080)), Resolution::Hd1080);
        assert!(filter.starts_with("scale=1920:1080:force_original_aspect_ratio"));
    }

    #[test]
    fn test_static_only_yields_empty_plan() {
        let plan = build_plan(
            &names(&["Static"]),
            &intensities(),
            30,
            Resolution::Hd1080,
            None,
        );
        assert!(plan.is_empty());
        assert!(!plan.has_motion());

        let plan = build_plan(&[], &intensities(), 30, Resolution::Hd1080, None);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_tilt_intensity_mapping() {
        let mut map = intensities();
        map.insert("Tilt".to_string(), 0);
        let plan = build_plan(&names(&["Tilt"]), &map, 30, Resolution::Hd1080, None);
        assert_eq!(plan.transforms.len(), 1);
        assert!(plan.transforms[0].contains("rotate=0.300*PI/180"));

        map.insert("Tilt".to_string(), 100);
        let plan = build_plan(&names(&["Tilt"]), &map, 30, Resolution::Hd1080, None);
        assert!(plan.transforms[0].contains("rotate=5.000*PI/180"));
    }

    #[test]
    fn test_noise_requires_grain_asset() {
        let plan = build_plan(
            &names(&["Noise"]),
            &intensities(),
            30,
            Resolution::Hd1080,
            None,
        );
        assert!(plan.overlay.is_none());

        let asset = std::path::Path::new("/assets/grain.mp4");
        let plan = build_plan(
            &names(&["Noise"]),
            &intensities(),
            30,
            Resolution::Hd1080,
            Some(asset),
        );
        let overlay = plan.overlay.unwrap();
        assert_eq!(overlay.asset, asset);
        // intensity 50 -> 0.1 + 0.5*(0.5-0.1) = 0.3
        assert!((overlay.opacity - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_effect_ignored() {
        let plan = build_plan(
            &names(&["Vortex", "Tilt"]),
            &intensities(),
            30,
            Resolution::Hd1080,
            None,
        );
        assert_eq!(plan.transforms.len(), 1);
    }

    #[test]
    fn test_transforms_precede_overlay() {
        let asset = std::path::Path::new("/assets/grain.mp4");
        let plan = build_plan(
            &names(&["Noise", "Dynamic Tilt"]),
            &intensities(),
            30,
            Resolution::Hd1080,
            Some(asset),
        );
        // Overlay is stored apart from the transform chain; assembly
        // composites it after all transforms regardless of list order.
        assert_eq!(plan.transforms.len(), 2);
        assert!(plan.overlay.is_some());
        assert!(plan.transform_chain().contains("zoompan"));
    }
}
