// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Driving the `glafic` executable: one process per query.

use std::{
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
    time::Duration,
};

use crossbeam_channel::{bounded, RecvTimeoutError};
use log::{debug, trace};

use super::{
    models::ModelCatalog,
    params::TracerParams,
    protocol::{parse_calc_image, parse_find_images, SourceInfo, TracerCommand},
    script, RayTracer, TracerError,
};
use crate::{
    constants::{CRIT_SUFFIX, IMAGE_SUFFIX, LENS_SUFFIX, POINT_SUFFIX, SOURCE_SUFFIX},
    image::Image2,
};

pub struct Glafic {
    path: PathBuf,
    input: PathBuf,
    params: TracerParams,
    models: ModelCatalog,
    timeout: Duration,
}

impl Glafic {
    /// `input_name` is the name of this instance's input script; it is placed
    /// in the parameters' output directory.
    pub fn new<P: AsRef<Path>>(
        path: P,
        input_name: &str,
        params: TracerParams,
        timeout: Duration,
    ) -> Glafic {
        Glafic {
            path: path.as_ref().to_path_buf(),
            input: params.output_dir().join(input_name),
            params,
            models: ModelCatalog::new(),
            timeout,
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.input
    }

    /// Run one command in a fresh process and return everything it printed.
    fn invoke(&self, command: &TracerCommand) -> Result<String, TracerError> {
        debug!("{} {}: {command}", self.path.display(), self.input.display());
        let mut child = Command::new(&self.path)
            .arg(&self.input)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| TracerError::Spawn {
                path: self.path.clone(),
                err,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(command.script().as_bytes()) {
                // The tracer may exit without reading everything.
                Ok(()) => (),
                Err(e) if e.kind() == ErrorKind::BrokenPipe => (),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            }
            // Dropping stdin closes it.
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (tx, rx) = bounded(1);

        thread::scope(|s| {
            let stderr_reader = s.spawn(move || {
                let mut buf = String::new();
                if let Some(mut e) = stderr {
                    let _ = e.read_to_string(&mut buf);
                }
                buf
            });
            s.spawn(move || {
                let mut buf = String::new();
                let result = match stdout {
                    Some(mut o) => o.read_to_string(&mut buf).map(|_| buf),
                    None => Ok(buf),
                };
                let _ = tx.send(result);
            });

            let output = match rx.recv_timeout(self.timeout) {
                Ok(r) => r.map_err(TracerError::from),
                Err(RecvTimeoutError::Timeout) => {
                    let _ = child.kill();
                    Err(TracerError::Timeout {
                        command: command.to_string(),
                        seconds: self.timeout.as_secs_f64(),
                    })
                }
                Err(RecvTimeoutError::Disconnected) => Err(TracerError::IO(
                    std::io::Error::new(ErrorKind::Other, "tracer output reader stopped"),
                )),
            };
            // Always reap the child, even after killing it.
            let status = child.wait()?;
            let stderr = stderr_reader.join().unwrap_or_default();
            let output = output?;
            if !status.success() {
                let stderr = stderr.trim();
                return Err(TracerError::NonZeroExit {
                    command: command.to_string(),
                    status: status.to_string(),
                    stderr: if stderr.is_empty() {
                        String::new()
                    } else {
                        format!(": {stderr}")
                    },
                });
            }
            trace!("{command} output:\n{output}");
            Ok(output)
        })
    }

    /// Run a command that writes a product, and check that it appeared. Any
    /// earlier product at the same path is removed first.
    fn write_product(&self, command: TracerCommand, suffix: &str) -> Result<PathBuf, TracerError> {
        let path = self.params.product(suffix);
        match std::fs::remove_file(&path) {
            Ok(()) => trace!("Removed the previous {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => (),
            Err(e) => return Err(e.into()),
        }
        self.invoke(&command)?;
        if path.exists() {
            Ok(path)
        } else {
            Err(TracerError::MissingProduct(path))
        }
    }
}

impl RayTracer for Glafic {
    fn params(&self) -> &TracerParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut TracerParams {
        &mut self.params
    }

    fn models(&self) -> &ModelCatalog {
        &self.models
    }

    fn models_mut(&mut self) -> &mut ModelCatalog {
        &mut self.models
    }

    fn write_input(&self) -> Result<(), TracerError> {
        std::fs::write(&self.input, script::render(&self.params, &self.models))?;
        Ok(())
    }

    fn calc_image(&self, redshift: f64, x: f64, y: f64) -> Result<SourceInfo, TracerError> {
        let command = TracerCommand::CalcImage { redshift, x, y };
        let out = self.invoke(&command)?;
        parse_calc_image(&command, &out)
    }

    fn find_images(&self) -> Result<Vec<(f64, f64)>, TracerError> {
        let command = TracerCommand::FindImg;
        let out = self.invoke(&command)?;
        parse_find_images(&command, &out)
    }

    fn write_image(&self) -> Result<Image2, TracerError> {
        let command = TracerCommand::WriteImage {
            sky: 0.0,
            noise: 0.0,
        };
        let path = self.write_product(command, IMAGE_SUFFIX)?;
        Ok(Image2::read_fits(path)?)
    }

    fn write_image_ori(&self) -> Result<Image2, TracerError> {
        let command = TracerCommand::WriteImageOri {
            sky: 0.0,
            noise: 0.0,
        };
        let path = self.write_product(command, SOURCE_SUFFIX)?;
        Ok(Image2::read_fits(path)?)
    }

    fn write_lens(&self, redshift: f64) -> Result<PathBuf, TracerError> {
        self.write_product(TracerCommand::WriteLens { redshift }, LENS_SUFFIX)
    }

    fn write_crit(&self, redshift: f64) -> Result<PathBuf, TracerError> {
        self.write_product(TracerCommand::WriteCrit { redshift }, CRIT_SUFFIX)
    }

    fn scratch_files(&self) -> Vec<PathBuf> {
        vec![
            self.input.clone(),
            self.params.product(IMAGE_SUFFIX),
            self.params.product(SOURCE_SUFFIX),
            self.params.product(POINT_SUFFIX),
        ]
    }
}
