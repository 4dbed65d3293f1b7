// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The CLEAN-like reconstruction loop.
//!
//! Each selected frame of the observation is reconstructed independently. An
//! iteration finds the residual's brightest pixel, asks the image-plane tracer
//! where that light comes from in the source plane, places a small Gaussian
//! (and a point source) there, has the tracers render it in both planes,
//! convolves the renderings with the beam, scales them to a fraction (`gain`)
//! of the residual peak and subtracts the model image from the residual.
//!
//! A frame finishes when its residual peak is at or below the threshold, when
//! the iteration limit is reached, when the same peak is found twice in a row
//! (a stall), when an iteration fails, or when the user interrupts. Whatever
//! accumulated for the frame is always written out.

mod error;
mod outputs;

pub use error::{PersistError, ReconstructError, StepError};
pub use outputs::Products;

use std::path::PathBuf;

use crossbeam_utils::atomic::AtomicCell;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info, trace, warn};

use crate::{
    beam::{Direction, GaussianBeam, LocalLensing, Plane},
    constants::MODEL_SOURCE_BRIGHTNESS,
    image::{Header, Image2, Image3, ImageError, Peak},
    io::write::RegionWriter,
    params::ReconstructSettings,
    tracer::{remove_scratch_files, FieldOfView, Model, ModelKind, RayTracer, TracerError},
    PROGRESS_BARS,
};

/// Why a frame stopped.
#[derive(Debug)]
pub enum Termination {
    /// The residual peak fell to (or started at) or below the threshold.
    ThresholdReached { peak: f64 },
    LimitReached,
    /// The same peak value and position were found on consecutive
    /// iterations.
    Stalled { peak: Peak },
    Interrupted,
    Failed(ReconstructError),
}

impl Termination {
    /// Did the frame end the way a reconstruction is supposed to?
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Termination::ThresholdReached { .. } | Termination::LimitReached
        )
    }
}

/// What happened to one frame.
#[derive(Debug)]
pub struct FrameReport {
    /// 1-indexed, like the frame's products.
    pub frame: usize,
    /// The number of completed iterations (models subtracted).
    pub iterations: usize,
    pub termination: Termination,
    /// The number of image positions written to the frame's region file.
    pub num_regions: usize,
}

#[derive(Debug)]
pub struct Summary {
    pub frames: Vec<FrameReport>,
    /// `None` if no frames were selected.
    pub image_cube: Option<PathBuf>,
    pub source_cube: Option<PathBuf>,
    pub interrupted: bool,
}

/// Everything a reconstruction needs besides the tracers.
pub struct Reconstruction<'a> {
    pub observation: &'a Image3,
    pub mask: Option<&'a Image2>,
    /// The source redshift.
    pub redshift: f64,
    /// Seeded with the observation's (image-plane) beam. Its source-plane
    /// beam is recomputed every iteration.
    pub beam: GaussianBeam,
    pub settings: ReconstructSettings,
    pub products: Products,
}

/// The running state of one frame.
struct FrameState {
    residual: Image2,
    /// The sum of every subtracted model image.
    model_image: Image2,
    model_source: Image2,
    /// The most recent single-iteration model image and source.
    last_image: Image2,
    last_source: Image2,
    residual_snapshots: Image3,
    image_snapshots: Image3,
    source_snapshots: Image3,
    /// Image positions of every completed iteration, with the (1-based)
    /// iteration that found them.
    regions: Vec<(f64, f64, usize)>,
}

fn grid_header(fov: &FieldOfView) -> Header {
    Header::for_grid(fov.xmin, fov.ymin, fov.pix_ext)
}

/// Give a tracer the current single-component model and serialise it.
fn place_models(tracer: &mut dyn RayTracer, gauss: &Model, point: &Model) -> Result<(), TracerError> {
    let models = tracer.models_mut();
    models.replace(ModelKind::Extend, vec![gauss.clone()])?;
    models.replace(ModelKind::Point, vec![point.clone()])?;
    tracer.write_input()
}

impl Reconstruction<'_> {
    /// Reconstruct every selected frame. `interrupted` is checked before each
    /// iteration and after each frame; once set, the current frame is written
    /// out and no further frames are started. A frame whose products can't be
    /// written is reported as failed, but its totals still go into the full
    /// cubes.
    pub fn run(
        mut self,
        image_tracer: &mut dyn RayTracer,
        source_tracer: &mut dyn RayTracer,
        interrupted: &AtomicCell<bool>,
    ) -> Result<Summary, ReconstructError> {
        let observation = self.observation;
        let fov_i = image_tracer.params().field_of_view()?;
        let fov_s = source_tracer.params().field_of_view()?;
        let shape_i = fov_i.shape();
        let shape_s = fov_s.shape();
        let (_, rows, cols) = observation.data.dim();
        if shape_i != (rows, cols) {
            return Err(ReconstructError::FieldOfView {
                frame: (rows, cols),
                tracer: shape_i,
            });
        }
        if let Some(m) = self.mask {
            if m.data.dim() != (rows, cols) {
                return Err(ReconstructError::MaskShape {
                    mask: m.data.dim(),
                    frame: (rows, cols),
                });
            }
        }

        // Scratch files go no matter how we leave.
        let mut scratch = image_tracer.scratch_files();
        scratch.extend(source_tracer.scratch_files());
        let _cleanup = scopeguard::guard(scratch, |files| remove_scratch_files(&files));

        image_tracer.write_input()?;

        let selected: Vec<usize> = (0..observation.num_frames())
            .filter(|&j| self.settings.selects_frame(j))
            .collect();
        if selected.is_empty() {
            warn!(
                "No frames of the {}-frame observation are selected (zmin = {}, zmax = {:?})",
                observation.num_frames(),
                self.settings.zmin,
                self.settings.zmax
            );
        }

        let progress = ProgressBar::with_draw_target(
            Some(selected.len() as _),
            if PROGRESS_BARS.load() {
                ProgressDrawTarget::stdout()
            } else {
                ProgressDrawTarget::hidden()
            },
        )
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} frames ({elapsed_precise}<{eta_precise})")
                .unwrap()
                .progress_chars("=> "),
        )
        .with_position(0)
        .with_message("Reconstructing");

        let mut all_images = Image3::empty(shape_i.0, shape_i.1, grid_header(&fov_i));
        let mut all_sources = Image3::empty(shape_s.0, shape_s.1, grid_header(&fov_s));
        let mut reports = vec![];
        let mut was_interrupted = false;

        for (j, frame) in observation.frames().enumerate() {
            if !self.settings.selects_frame(j) {
                continue;
            }
            let n = j + 1;
            info!("Reconstructing frame {n}");

            let mut state = FrameState {
                residual: frame,
                model_image: Image2::zeros(shape_i, grid_header(&fov_i)),
                model_source: Image2::zeros(shape_s, grid_header(&fov_s)),
                last_image: Image2::zeros(shape_i, grid_header(&fov_i)),
                last_source: Image2::zeros(shape_s, grid_header(&fov_s)),
                residual_snapshots: Image3::empty(rows, cols, Header::new()),
                image_snapshots: Image3::empty(shape_i.0, shape_i.1, Header::new()),
                source_snapshots: Image3::empty(shape_s.0, shape_s.1, Header::new()),
                regions: vec![],
            };

            let (termination, iterations) = self.reconstruct_frame(
                n,
                &mut state,
                image_tracer,
                source_tracer,
                fov_s.pix_ext,
                interrupted,
            );
            // A tracer query killed by the interrupt fails; that's still an
            // interruption.
            let termination = match termination {
                Termination::Failed(e) if interrupted.load() => {
                    debug!("{e}");
                    Termination::Interrupted
                }
                t => t,
            };
            match &termination {
                Termination::ThresholdReached { peak } => info!(
                    "Frame {n}: residual max {peak} reached the threshold after {iterations} iteration(s)"
                ),
                Termination::LimitReached => {
                    info!("Frame {n}: reached the limit of {iterations} iteration(s)")
                }
                Termination::Stalled { peak } => error!(
                    "Frame {n}: the residual max {} at ({}, {}) didn't change after iteration {iterations}; stopping this frame",
                    peak.value, peak.x, peak.y
                ),
                Termination::Interrupted => {
                    warn!("Frame {n}: interrupted after {iterations} iteration(s); writing out current results")
                }
                Termination::Failed(e) => error!("{e}"),
            }

            // The shapes of both cubes are fixed by the tracers' fields of
            // view.
            all_images.append_frame(&state.model_image)?;
            all_sources.append_frame(&state.model_source)?;
            all_images.header = state.model_image.header.clone();
            all_sources.header = state.model_source.header.clone();

            let num_regions = state.regions.len();
            let termination = match self.write_frame_products(n, state) {
                Ok(()) => termination,
                Err(err) => {
                    let err = ReconstructError::Persist { frame: n, err };
                    error!("{err}");
                    match termination {
                        Termination::Interrupted | Termination::Failed(_) => termination,
                        _ => Termination::Failed(err),
                    }
                }
            };
            progress.inc(1);

            let stop = matches!(termination, Termination::Interrupted) || interrupted.load();
            reports.push(FrameReport {
                frame: n,
                iterations,
                termination,
                num_regions,
            });
            if stop {
                was_interrupted = true;
                break;
            }
        }
        progress.abandon_with_message("Finished reconstructing");

        let (image_cube, source_cube) = if all_images.num_frames() > 0 {
            let image_cube = self.products.image_cube();
            let source_cube = self.products.source_cube();
            all_images.write_fits(&image_cube)?;
            all_sources.write_fits(&source_cube)?;
            info!("Wrote {}", image_cube.display());
            info!("Wrote {}", source_cube.display());
            (Some(image_cube), Some(source_cube))
        } else {
            (None, None)
        };

        Ok(Summary {
            frames: reports,
            image_cube,
            source_cube,
            interrupted: was_interrupted,
        })
    }

    /// Iterate on one frame until it terminates, returning why and how many
    /// iterations completed.
    fn reconstruct_frame(
        &mut self,
        n: usize,
        state: &mut FrameState,
        image_tracer: &mut dyn RayTracer,
        source_tracer: &mut dyn RayTracer,
        source_pixel_scale: f64,
        interrupted: &AtomicCell<bool>,
    ) -> (Termination, usize) {
        let threshold = self.settings.threshold;
        let mut previous: Option<Peak> = None;
        let mut i = 0;

        let termination = loop {
            if interrupted.load() {
                break Termination::Interrupted;
            }

            let peak = match state.residual.find_peak(self.mask) {
                Ok(p) => p,
                // A border or fully-masked maximum that is already below the
                // threshold means there's nothing left to do.
                Err(ImageError::PeakOnBorder { value, .. }) if value <= threshold => {
                    break Termination::ThresholdReached { peak: value }
                }
                Err(ImageError::NoUnmaskedPixels) => {
                    break Termination::ThresholdReached { peak: 0.0 }
                }
                Err(e) => {
                    break Termination::Failed(ReconstructError::Step {
                        frame: n,
                        iteration: i + 1,
                        err: e.into(),
                    })
                }
            };
            if previous == Some(peak) {
                break Termination::Stalled { peak };
            }
            if peak.value <= threshold {
                break Termination::ThresholdReached { peak: peak.value };
            }
            if self.settings.limit.map_or(false, |limit| i >= limit) {
                break Termination::LimitReached;
            }

            debug!("#{n}_{}", i + 1);
            debug!("residual max    = {}", peak.value);
            debug!("image position  = ({}, {})", peak.x, peak.y);
            if let Err(err) =
                self.iterate(i, peak, state, image_tracer, source_tracer, source_pixel_scale)
            {
                break Termination::Failed(ReconstructError::Step {
                    frame: n,
                    iteration: i + 1,
                    err,
                });
            }

            previous = Some(peak);
            i += 1;
        };

        (termination, i)
    }

    /// One iteration (`i` is 0-indexed). The frame state is only updated once
    /// everything has succeeded.
    fn iterate(
        &mut self,
        i: usize,
        peak: Peak,
        state: &mut FrameState,
        image_tracer: &mut dyn RayTracer,
        source_tracer: &mut dyn RayTracer,
        source_pixel_scale: f64,
    ) -> Result<(), StepError> {
        let z = self.redshift;
        let info = image_tracer.calc_image(z, peak.x, peak.y)?;
        debug!("phi             = {}", info.phi);
        debug!("kappa           = {}", info.kappa);
        debug!("gamma           = {}", info.gamma);
        debug!("magnification   = {}", info.mag);
        debug!("source position = ({}, {})", info.xsrc, info.ysrc);

        let gauss = Model::gauss(
            z,
            MODEL_SOURCE_BRIGHTNESS,
            info.xsrc,
            info.ysrc,
            self.settings.sigma,
        );
        let point = Model::point(z, info.xsrc, info.ysrc);

        place_models(image_tracer, &gauss, &point)?;
        let images = image_tracer.find_images()?;
        trace!("Modelling the image plane");
        let mut one_image = image_tracer.write_image()?;

        place_models(source_tracer, &gauss, &point)?;
        trace!("Modelling the source plane");
        let mut one_source = source_tracer.write_image_ori()?;

        if self.settings.convolve_image {
            trace!("Convolving the model image");
            self.beam.convolve(&mut one_image, Plane::Image)?;
        }
        let max = match one_image.max() {
            Some(m) if m > 0.0 => m,
            _ => return Err(StepError::EmptyModel("image")),
        };
        // A convolved source is scaled by the same factor as the image plane.
        let scale = peak.value / max * self.settings.gain;
        one_image *= scale;

        self.beam.project(
            Direction::ImageToSource,
            LocalLensing {
                kappa: info.kappa,
                gamma: info.gamma,
                phi: info.phi,
            },
            source_pixel_scale,
            source_pixel_scale,
        )?;
        if self.settings.convolve_source {
            trace!("Convolving the model source");
            self.beam.convolve(&mut one_source, Plane::Source)?;
            one_source *= scale;
        }

        let model_image = one_image.add(&state.model_image)?;
        let model_source = one_source.add(&state.model_source)?;
        let residual = state.residual.sub(&one_image)?;

        if i % self.settings.resstep == 0 {
            state.residual_snapshots.append_frame(&residual)?;
        }
        if i % self.settings.imgstep == 0 {
            state.image_snapshots.append_frame(&one_image)?;
            state.source_snapshots.append_frame(&one_source)?;
        }
        state.model_image = model_image;
        state.model_source = model_source;
        state.residual = residual;
        state.last_image = one_image;
        state.last_source = one_source;
        state
            .regions
            .extend(images.into_iter().map(|(x, y)| (x, y, i + 1)));
        Ok(())
    }

    /// Write one frame's snapshot cubes and region file.
    fn write_frame_products(&self, n: usize, mut state: FrameState) -> Result<(), PersistError> {
        state.residual_snapshots.append_frame(&state.residual)?;
        state.residual_snapshots.header = state.model_image.header.clone();
        state.image_snapshots.append_frame(&state.last_image)?;
        state.image_snapshots.header = state.model_image.header;
        state.source_snapshots.append_frame(&state.last_source)?;
        state.source_snapshots.header = state.model_source.header;

        for (cube, path) in [
            (&state.residual_snapshots, self.products.residuals(n)),
            (&state.image_snapshots, self.products.image_snapshots(n)),
            (&state.source_snapshots, self.products.source_snapshots(n)),
        ] {
            cube.write_fits(&path)?;
            debug!("Wrote {}", path.display());
        }

        let mut regions = RegionWriter::new(self.products.regions(n))?;
        for &(x, y, iteration) in &state.regions {
            regions.add_text(x, y, iteration)?;
        }
        let path = regions.finish()?;
        trace!("Wrote {}", path.display());
        Ok(())
    }
}
