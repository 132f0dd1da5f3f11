use std::error::Error;
use std::path::PathBuf;

use log::{LevelFilter, error, info};
use nalgebra::Vector3;
use ndarray::Array3;
use reslice_view::{
    Color, ConfigMode, ContourMode, GridGeometry, Transformation, ViewMode, Viewer, Volume,
    segment_table::Segment, transform::RigidParameters,
};
use simple_logger::SimpleLogger;

const SCREEN: u32 = 512;

/// Bright sphere on a faint ramp, centred on `centre` (voxel units).
fn phantom(size: [usize; 3], centre: [f64; 3]) -> Result<Volume<f32>, Box<dyn Error>> {
    let geometry = GridGeometry::axis_aligned(size, (1.0, 1.0, 2.0))?;
    let radius = size[0] as f64 / 4.0;
    let data = Array3::from_shape_fn((size[2], size[1], size[0]), |(k, j, i)| {
        let d = Vector3::new(
            i as f64 - centre[0],
            j as f64 - centre[1],
            2.0 * (k as f64 - centre[2]),
        );
        if d.norm() < radius {
            1000.0
        } else {
            (100 * i / size[0]) as f32
        }
    });
    Ok(Volume::from_frame(data, geometry)?)
}

fn run(output: PathBuf) -> Result<(), Box<dyn Error>> {
    let size = [64, 64, 32];
    let target = phantom(size, [32.0, 32.0, 16.0])?;
    let source = phantom(size, [36.0, 30.0, 16.0])?;

    let mut viewer = Viewer::new(SCREEN, SCREEN)?;
    viewer.set_target(Some(target));
    viewer.set_source(Some(source));
    viewer.set_source_transformation(Transformation::Rigid(RigidParameters::new(
        Vector3::new(4.0, -2.0, 0.0),
        Vector3::zeros(),
    )));
    viewer.configure(ConfigMode::AbXyXzV)?;
    viewer.set_view_mode(ViewMode::Checkerboard);

    // Outline the sphere in the top left XY viewport and keep it as label 1
    viewer.segment_table_mut().set(
        1,
        Segment {
            name: "sphere".into(),
            color: Color::rgb(255, 64, 0),
            visible: true,
            transparency: 0.4,
        },
    )?;
    let (cx, cy) = (SCREEN as f64 / 4.0, SCREEN as f64 / 4.0);
    let steps = 32;
    for n in 0..=steps {
        let angle = std::f64::consts::TAU * n as f64 / steps as f64;
        let mode = match n {
            0 => ContourMode::FirstPoint,
            n if n == steps => ContourMode::LastPoint,
            _ => ContourMode::NewPoint,
        };
        viewer.add_contour_point(cx + 20.0 * angle.cos(), cy + 20.0 * angle.sin(), mode);
    }
    viewer.fill_area(cx, cy);
    let written = viewer.fill_contour(1)?;
    info!("Labelled {written} voxels");

    viewer.update();
    for k in 0..viewer.number_of_viewports() {
        let Some(image) = viewer.composited_image(k) else {
            continue;
        };
        let path = output.join(format!("viewport_{k}.png"));
        image.save(&path)?;
        info!("Saved {}", path.display());
    }
    Ok(())
}

fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).env().init() {
        eprintln!("Error: {e}");
    }

    let output = std::env::args().nth(1).map_or_else(|| PathBuf::from("."), PathBuf::from);
    if let Err(e) = run(output) {
        error!("{e}");
        std::process::exit(1);
    }
}
