use clap::Parser;
use sceneswap::{FilterKind, Orientation};
use std::path::PathBuf;

/// `sceneswap` - AR camera-effects viewer.
///
/// Renders a synthetic tracking session through the compositor: the camera
/// feed, its depth map and a backdrop mesh placed at every anchor.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory searched (recursively) for meshes and backdrop images.
    #[arg(long, env = "SCENESWAP_ASSETS", default_value = "assets")]
    pub assets: PathBuf,

    /// Mesh drawn at each anchor, by file stem.
    #[arg(long, env = "SCENESWAP_OBJECT", default_value = "Cylinderv01")]
    pub object: String,

    /// Backdrop image mapped onto the mesh, by file stem.
    #[arg(long, env = "SCENESWAP_BACKDROP", default_value = "Ballroom")]
    pub backdrop: String,

    /// Post-process filter active at startup.
    #[arg(long, env = "SCENESWAP_FILTER", default_value = "pass-through")]
    pub filter: FilterKind,

    /// Blend between the raw capture (0) and the backdrop (1).
    #[arg(long, env = "SCENESWAP_MIX", default_value_t = 1.0)]
    pub mix: f32,

    /// Interface orientation.
    #[arg(long, env = "SCENESWAP_ORIENTATION", default_value = "portrait")]
    pub orientation: Orientation,

    /// Scale lighting by the session's ambient light estimate.
    #[arg(long, env = "SCENESWAP_ESTIMATED_LIGHTING")]
    pub estimated_lighting: bool,

    /// Where captured frames are written.
    #[arg(long, env = "SCENESWAP_CAPTURE_DIR", default_value = "captures")]
    pub capture_dir: PathBuf,

    /// Rate of the synthetic tracking session.
    #[arg(long, env = "SCENESWAP_TRACKING_HZ", default_value_t = 60.0)]
    pub tracking_hz: f64,

    /// Distance in front of the camera at which a tap places an anchor.
    #[arg(long, env = "SCENESWAP_ANCHOR_DISTANCE", default_value_t = 0.2)]
    pub anchor_distance: f32,
}
