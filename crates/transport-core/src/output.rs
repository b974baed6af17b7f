// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Result Output
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Result files: a NumPy `.npz` archive of the solution arrays and a
//! pretty-printed JSON run summary next to it.
//!
//! | array        | shape              |
//! |--------------|--------------------|
//! | `flux`       | `[n_reg, ng]`      |
//! | `pin_flux`   | `[n_pin, ng]`      |
//! | `pin_powers` | `[nz, ny, nx]`     |
//! | `k_eff`      | scalar (eigenvalue runs only) |
//! | `k_history`  | `[n_outer]`        |
//! | `ang_quad`   | `[n_angle, 4]` (ox, oy, oz, w) |

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{arr0, Array1, Array2, Array3};
use ndarray_npy::NpzWriter;
use serde::{Deserialize, Serialize};
use transport_geom::core_mesh::CoreMesh;
use transport_types::config::CaseConfig;
use transport_types::error::{TransportError, TransportResult};

use crate::sweeper::Sweeper;

/// Solution arrays written to the `.npz` archive.
#[derive(Debug, Clone)]
pub struct ResultArrays {
    pub flux: Array2<f64>,
    pub pin_flux: Array2<f64>,
    pub pin_powers: Array3<f64>,
    pub k_eff: Option<f64>,
    pub k_history: Array1<f64>,
    pub ang_quad: Array2<f64>,
}

impl ResultArrays {
    pub fn from_sweeper(sweeper: &Sweeper<'_>, k_eff: Option<f64>, k_history: &[f64]) -> TransportResult<Self> {
        let cmesh = sweeper.mesh().coarse();
        let shape = (cmesh.nz(), cmesh.ny(), cmesh.nx());
        let pin_powers = Array3::from_shape_vec(shape, sweeper.pin_powers())
            .map_err(|e| TransportError::output(format!("Pin power layout: {e}")))?;
        Ok(ResultArrays {
            flux: sweeper.flux().clone(),
            pin_flux: sweeper.pin_flux(),
            pin_powers,
            k_eff,
            k_history: Array1::from_vec(k_history.to_vec()),
            ang_quad: sweeper.quadrature().to_array(),
        })
    }

    pub fn write_npz(&self, path: impl AsRef<Path>) -> TransportResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| TransportError::file(path, e))?;
        let npz_err = |e: ndarray_npy::WriteNpzError| {
            TransportError::output(format!("Failed to write npz '{}': {e}", path.display()))
        };
        let mut npz = NpzWriter::new(file);
        npz.add_array("flux", &self.flux).map_err(npz_err)?;
        npz.add_array("pin_flux", &self.pin_flux).map_err(npz_err)?;
        npz.add_array("pin_powers", &self.pin_powers).map_err(npz_err)?;
        if let Some(k) = self.k_eff {
            npz.add_array("k_eff", &arr0(k)).map_err(npz_err)?;
        }
        npz.add_array("k_history", &self.k_history).map_err(npz_err)?;
        npz.add_array("ang_quad", &self.ang_quad).map_err(npz_err)?;
        npz.finish().map_err(npz_err)?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}

/// Human-readable run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub case_name: String,
    pub sweeper: String,
    pub solver: String,
    pub n_group: usize,
    pub n_reg: usize,
    pub n_pin: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k_eff: Option<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Last Δk (eigenvalue) or flux change (fixed source).
    pub final_error: f64,
    pub error_history: Vec<f64>,
    pub cmfd_iterations: usize,
    pub max_pin_power: f64,
    pub wall_time_s: f64,
}

impl RunSummary {
    pub fn write(&self, path: impl AsRef<Path>) -> TransportResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| TransportError::file(path, e))?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> TransportResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TransportError::file(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Base path of the result files: `output.base` from the case, resolved
/// against the case directory, or the case file path without extension.
pub fn output_base(config: &CaseConfig, input: Option<&Path>) -> PathBuf {
    if let Some(base) = &config.output.base {
        return config.resolve(base);
    }
    match input {
        Some(path) => path.with_extension(""),
        None => config.base_dir.join(&config.case_name),
    }
}

/// `<base><suffix>`, keeping any dots already in the base name.
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Python/Cairo script drawing every pin mesh of the core.
pub fn write_geometry(mesh: &CoreMesh, path: impl AsRef<Path>) -> TransportResult<()> {
    let path = path.as_ref();
    std::fs::write(path, mesh.draw()).map_err(|e| TransportError::file(path, e))?;
    log::info!("Wrote geometry script {}", path.display());
    Ok(())
}

// ═══════════════════════════════ tests ═══════════════════════════════
