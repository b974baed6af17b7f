// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Materials and Cross-Section Library
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Macroscopic materials and the text library they are read from.
//!
//! Library layout (`!` starts a comment, blank lines are skipped):
//!
//! ```text
//! description line
//! ng nmat
//! bound_1 ... bound_ng
//! XSMACRO <name> <k>          (once per material)
//! σ_a νσ_f σ_f χ              (ng lines)
//! σ_s(g ← 1) ... σ_s(g ← ng)  (ng lines, one per destination group)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use transport_math::scattering::ScatteringMatrix;
use transport_types::config::CaseConfig;
use transport_types::error::{TransportError, TransportResult};

/// One homogeneous material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    name: String,
    xsab: Vec<f64>,
    xstr: Vec<f64>,
    xsnf: Vec<f64>,
    xsf: Vec<f64>,
    xsch: Vec<f64>,
    scat: ScatteringMatrix,
}

impl Material {
    /// Build a material; σ_tr is absorption plus total out-scatter and χ
    /// is normalised when it is not identically zero.
    pub fn new(
        name: impl Into<String>,
        xsab: Vec<f64>,
        xsnf: Vec<f64>,
        xsf: Vec<f64>,
        mut xsch: Vec<f64>,
        scat: ScatteringMatrix,
    ) -> TransportResult<Self> {
        let name = name.into();
        let ng = xsab.len();
        if xsnf.len() != ng || xsf.len() != ng || xsch.len() != ng || scat.n_group() != ng {
            return Err(TransportError::config(format!(
                "Material {name}: cross-section arrays disagree on the group count"
            )));
        }
        let chi_sum: f64 = xsch.iter().sum();
        if chi_sum > 0.0 {
            xsch.iter_mut().for_each(|c| *c /= chi_sum);
        }
        let xstr: Vec<f64> = (0..ng).map(|g| xsab[g] + scat.out(g)).collect();
        if let Some(g) = xstr.iter().position(|&x| !(x > 0.0)) {
            return Err(TransportError::config(format!(
                "Material {name}: transport cross section of group {g} is not positive"
            )));
        }
        Ok(Material {
            name,
            xsab,
            xstr,
            xsnf,
            xsf,
            xsch,
            scat,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_group(&self) -> usize {
        self.xsab.len()
    }

    pub fn xsab(&self) -> &[f64] {
        &self.xsab
    }

    pub fn xstr(&self) -> &[f64] {
        &self.xstr
    }

    pub fn xsnf(&self) -> &[f64] {
        &self.xsnf
    }

    pub fn xsf(&self) -> &[f64] {
        &self.xsf
    }

    pub fn xsch(&self) -> &[f64] {
        &self.xsch
    }

    pub fn scat(&self) -> &ScatteringMatrix {
        &self.scat
    }

    pub fn is_fissile(&self) -> bool {
        self.xsnf.iter().any(|&x| x > 0.0)
    }
}

/// Materials read from a library, with case material ids bound to them.
#[derive(Debug, Clone)]
pub struct MaterialLib {
    description: String,
    ng: usize,
    group_bounds: Vec<f64>,
    materials: Vec<Material>,
    by_name: HashMap<String, usize>,
    by_id: BTreeMap<u32, usize>,
}

impl MaterialLib {
    /// Load the library of a case and bind its material ids.
    pub fn from_config(config: &CaseConfig) -> TransportResult<Self> {
        let path = config.resolve(&config.material_lib.path);
        let mut lib = Self::from_file(&path)?;
        for m in &config.material_lib.materials {
            lib.assign_id(m.id, &m.name)?;
        }
        log::info!(
            "Material library {}: {} groups, {} materials, {} bound",
            path.display(),
            lib.ng,
            lib.materials.len(),
            lib.by_id.len()
        );
        Ok(lib)
    }

    pub fn from_file(path: impl AsRef<Path>) -> TransportResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TransportError::file(path, e))?;
        Self::parse(&text).map_err(|e| match e {
            TransportError::Config { message, .. } => {
                TransportError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Parse library text.
    pub fn parse(text: &str) -> TransportResult<Self> {
        let mut lines = LibLines::new(text);

        let description = lines.next_line()?.1.to_string();
        let header = lines.next_numbers::<usize>(2)?;
        let (ng, nmat) = (header[0], header[1]);
        if ng == 0 {
            return Err(TransportError::config("Library declares zero groups"));
        }
        let group_bounds = lines.next_numbers::<f64>(ng)?;

        let mut materials = Vec::with_capacity(nmat);
        let mut by_name = HashMap::new();
        for imat in 0..nmat {
            let (lineno, head) = lines.next_line()?;
            let mut tok = head.split_whitespace();
            let name = match (tok.next(), tok.next(), tok.next()) {
                (Some("XSMACRO"), Some(name), Some(_)) => name.to_string(),
                _ => {
                    return Err(TransportError::config(format!(
                        "line {lineno}: expected `XSMACRO <name> <k>`, found `{head}`"
                    )))
                }
            };

            let mut xsab = Vec::with_capacity(ng);
            let mut xsnf = Vec::with_capacity(ng);
            let mut xsf = Vec::with_capacity(ng);
            let mut xsch = Vec::with_capacity(ng);
            for _ in 0..ng {
                let v = lines.next_numbers::<f64>(4)?;
                xsab.push(v[0]);
                xsnf.push(v[1]);
                xsf.push(v[2]);
                xsch.push(v[3]);
            }
            let rows = (0..ng)
                .map(|_| lines.next_numbers::<f64>(ng))
                .collect::<TransportResult<Vec<_>>>()?;
            let scat = ScatteringMatrix::from_rows(&rows)?;

            if by_name.insert(name.clone(), imat).is_some() {
                return Err(TransportError::config(format!(
                    "Duplicate material `{name}` in library"
                )));
            }
            materials.push(Material::new(name, xsab, xsnf, xsf, xsch, scat)?);
        }

        Ok(MaterialLib {
            description,
            ng,
            group_bounds,
            materials,
            by_name,
            by_id: BTreeMap::new(),
        })
    }

    /// Bind a case material id to a library material.
    pub fn assign_id(&mut self, id: u32, name: &str) -> TransportResult<()> {
        let idx = *self.by_name.get(name).ok_or_else(|| {
            TransportError::config(format!("Material `{name}` (id {id}) is not in the library"))
        })?;
        if self.by_id.insert(id, idx).is_some() {
            return Err(TransportError::config(format!(
                "Material id {id} assigned twice"
            )));
        }
        Ok(())
    }

    pub fn get(&self, id: u32) -> TransportResult<&Material> {
        self.by_id
            .get(&id)
            .map(|&i| &self.materials[i])
            .ok_or_else(|| TransportError::config(format!("Material id {id} is not defined")))
    }

    pub fn by_name(&self, name: &str) -> Option<&Material> {
        self.by_name.get(name).map(|&i| &self.materials[i])
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn n_group(&self) -> usize {
        self.ng
    }

    pub fn group_bounds(&self) -> &[f64] {
        &self.group_bounds
    }

    /// Number of materials in the library file.
    pub fn n_material(&self) -> usize {
        self.materials.len()
    }

    /// Bound material ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_id.keys().copied()
    }
}

/// Line cursor that drops comments and blank lines.
struct LibLines<'t> {
    inner: std::iter::Enumerate<std::str::Lines<'t>>,
}

impl<'t> LibLines<'t> {
    fn new(text: &'t str) -> Self {
        LibLines {
            inner: text.lines().enumerate(),
        }
    }

    fn next_line(&mut self) -> TransportResult<(usize, &'t str)> {
        for (i, raw) in self.inner.by_ref() {
            let line = raw.split('!').next().unwrap_or("").trim();
            if !line.is_empty() {
                return Ok((i + 1, line));
            }
        }
        Err(TransportError::config("Unexpected end of library"))
    }

    fn next_numbers<T: std::str::FromStr>(&mut self, n: usize) -> TransportResult<Vec<T>> {
        let (lineno, line) = self.next_line()?;
        let values: Vec<T> = line
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| {
                TransportError::config(format!("line {lineno}: malformed number in `{line}`"))
            })?;
        if values.len() < n {
            return Err(TransportError::config(format!(
                "line {lineno}: expected {n} values, found {}",
                values.len()
            )));
        }
        Ok(values)
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_GROUP: &str = "\
Two-group test library ! trailing comment
2 2
2.0e7 0.625

! fuel
XSMACRO fuel 0
0.01 0.02 0.008 1.0
0.10 0.30 0.12 0.0
0.20 0.00
0.02 0.50
XSMACRO water 0
0.0002 0.0 0.0 0.0
0.02 0.0 0.0 0.0
0.30 0.00
0.05 1.20
";

    #[test]
    fn test_parse_two_group() {
        let lib = MaterialLib::parse(TWO_GROUP).unwrap();
        assert_eq!(lib.n_group(), 2);
        assert_eq!(lib.n_material(), 2);
        assert_eq!(lib.description(), "Two-group test library");
        assert_eq!(lib.group_bounds(), &[2.0e7, 0.625]);

        let fuel = lib.by_name("fuel").unwrap();
        // σ_tr = σ_a + out-scatter (column sums)
        assert!((fuel.xstr()[0] - (0.01 + 0.20 + 0.02)).abs() < 1e-15);
        assert!((fuel.xstr()[1] - (0.10 + 0.50)).abs() < 1e-15);
        assert!((fuel.scat().to(1).get(0) - 0.02).abs() < 1e-15);
        assert!(fuel.is_fissile());
        assert!(!lib.by_name("water").unwrap().is_fissile());
    }

    #[test]
    fn test_id_binding() {
        let mut lib = MaterialLib::parse(TWO_GROUP).unwrap();
        lib.assign_id(7, "water").unwrap();
        assert_eq!(lib.get(7).unwrap().name(), "water");
        assert!(lib.get(8).is_err());
        assert!(lib.assign_id(7, "fuel").is_err());
        assert!(lib.assign_id(9, "steel").is_err());
        assert_eq!(lib.ids().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_chi_normalised() {
        let m = Material::new(
            "m",
            vec![0.1, 0.1],
            vec![0.1, 0.0],
            vec![0.05, 0.0],
            vec![2.0, 2.0],
            ScatteringMatrix::zeros(2),
        )
        .unwrap();
        assert!((m.xsch()[0] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_malformed_library_reports_line() {
        let bad = TWO_GROUP.replace("0.10 0.30 0.12 0.0", "0.10 oops 0.12 0.0");
        let err = MaterialLib::parse(&bad).unwrap_err().to_string();
        assert!(err.contains("line 8"), "{}", err);

        let truncated: String = TWO_GROUP.lines().take(8).collect::<Vec<_>>().join("\n");
        assert!(MaterialLib::parse(&truncated).is_err());

        let bad_head = TWO_GROUP.replace("XSMACRO water 0", "MACRO water");
        assert!(MaterialLib::parse(&bad_head).is_err());
    }

    #[test]
    fn test_group_count_mismatch_rejected() {
        let res = Material::new(
            "m",
            vec![0.1, 0.1],
            vec![0.1],
            vec![0.05, 0.0],
            vec![1.0, 0.0],
            ScatteringMatrix::zeros(2),
        );
        assert!(res.is_err());
    }
}
