use super::config::ExtractionConfig;
use super::error::EngineError;
use super::result::HotspotResult;
use super::utils::partners::PartnerIndex;
use crate::core::grid::Grid;
use crate::core::models::channel::Channel;
use nalgebra::{Point3, Vector3};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const FEATURE_RADIUS: f64 = 1.0;
const SPHERE_ALPHA: f64 = 0.9;

const PYMOL_HEADER: &str = r#"from pymol import cmd
from pymol.cgo import *


def cgo_arrow(start, end, radius=0.2, color="blue red", name=""):
    from chempy import cpv
    head_length = radius * 3.0
    head_radius = head_length * 0.6
    first, second = (list(cmd.get_color_tuple(c)) for c in color.split())
    normal = cpv.normalize(cpv.sub(start, end))
    neck = cpv.add(cpv.scale(normal, head_length), end)
    return ([CYLINDER] + list(start) + list(neck) + [radius] + first + second +
            [CONE] + list(neck) + list(end) + [head_radius, 0.0] + second + second + [1.0, 0.0])

"#;

/// File formats a pharmacophore model can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pharmit query points.
    Json,
    /// One row per feature.
    Csv,
    /// PyMOL CGO script.
    PyMol,
    /// CrossMiner feature definitions.
    CrossMiner,
}

impl ExportFormat {
    /// The format named by `path`'s extension.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        extension.parse()
    }
}

impl FromStr for ExportFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "py" => Ok(ExportFormat::PyMol),
            "cm" => Ok(ExportFormat::CrossMiner),
            _ => Err(EngineError::UnsupportedExportFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PharmacophoreFeature {
    pub channel: Channel,
    pub point: Point3<f64>,
    pub score: f64,
    pub hbond_partner: Option<Point3<f64>>,
    pub radius: f64,
}

impl PharmacophoreFeature {
    /// Direction from the feature to its hydrogen-bond partner.
    pub fn vector(&self) -> Option<Vector3<f64>> {
        self.hbond_partner.map(|p| p - self.point)
    }

    fn vector_on(&self) -> u8 {
        u8::from(self.channel != Channel::Apolar)
    }

    fn pharmit_name(&self) -> &'static str {
        match self.channel {
            Channel::Apolar => "Hydrophobic",
            Channel::Donor => "HydrogenDonor",
            Channel::Acceptor => "HydrogenAcceptor",
            Channel::Negative => "NegativeIon",
            Channel::Positive => "PositiveIon",
        }
    }

    fn crossminer_name(&self) -> &'static str {
        match self.channel {
            Channel::Apolar => "hydrophobic",
            Channel::Donor => "donor_projected",
            Channel::Acceptor => "acceptor_projected",
            Channel::Positive | Channel::Negative => "",
        }
    }

    fn pymol_colour(&self) -> &'static str {
        match self.channel {
            Channel::Apolar => "1.00, 1.00, 0.00",
            Channel::Donor => "0.00, 0.00, 1.00",
            Channel::Acceptor => "1.00, 0.00, 0.00",
            Channel::Positive => "0.00, 1.00, 1.00",
            Channel::Negative => "0.60, 0.10, 0.60",
        }
    }
}

#[derive(Serialize)]
struct PharmitVector {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Serialize)]
struct PharmitPoint<'a> {
    name: &'a str,
    hasvec: bool,
    x: f64,
    y: f64,
    z: f64,
    radius: f64,
    enabled: bool,
    vector_on: u8,
    svector: PharmitVector,
    minsize: &'a str,
    maxsize: &'a str,
    selected: bool,
}

#[derive(Serialize)]
struct PharmitQuery<'a> {
    points: Vec<PharmitPoint<'a>>,
}

/// Point features summarising a (usually extracted) hotspot.
#[derive(Debug, Clone, PartialEq)]
pub struct PharmacophoreModel {
    pub identifier: String,
    pub features: Vec<PharmacophoreFeature>,
}

impl PharmacophoreModel {
    /// One apolar feature at the centroid of the apolar map, and one feature at the maximum
    /// of every island above `config.pharmacophore_cutoff` of each other channel. Donor and
    /// acceptor features are paired with the nearest complementary protein atom.
    pub fn from_result(result: &HotspotResult, identifier: &str, config: &ExtractionConfig) -> Self {
        let partners = result.protein.as_deref().map(PartnerIndex::new);
        let mut features = Vec::new();
        for (&channel, grid) in &result.super_grids {
            if channel == Channel::Apolar {
                if let Some(point) = grid.centroid() {
                    features.push(PharmacophoreFeature {
                        channel,
                        point,
                        score: grid.value_at_point(&point),
                        hbond_partner: None,
                        radius: FEATURE_RADIUS,
                    });
                }
                continue;
            }
            for island in grid.islands(config.pharmacophore_cutoff) {
                let Some((point, score)) = maximum(&island) else {
                    continue;
                };
                let hbond_partner = partners.as_ref().and_then(|index| {
                    index.nearest_partner(channel, &point, config.max_hbond_distance)
                });
                features.push(PharmacophoreFeature {
                    channel,
                    point,
                    score,
                    hbond_partner,
                    radius: FEATURE_RADIUS,
                });
            }
        }
        Self {
            identifier: identifier.to_string(),
            features,
        }
    }

    /// Writes the model in the format named by `path`'s extension.
    pub fn write(&self, path: &Path) -> Result<(), EngineError> {
        let format = ExportFormat::from_path(path)?;
        let file = File::create(path).map_err(|e| EngineError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(format, &mut writer)
            .and_then(|()| writer.flush())
            .map_err(|e| EngineError::io(path, e))?;
        info!(
            path = %path.display(),
            features = self.features.len(),
            "Wrote pharmacophore."
        );
        Ok(())
    }

    pub fn write_to(&self, format: ExportFormat, writer: &mut impl Write) -> io::Result<()> {
        match format {
            ExportFormat::Json => {
                serde_json::to_writer(&mut *writer, &self.pharmit_query())?;
                Ok(())
            }
            ExportFormat::Csv => self.write_csv(writer),
            ExportFormat::PyMol => {
                writer.write_all(PYMOL_HEADER.as_bytes())?;
                writer.write_all(self.to_pymol().as_bytes())
            }
            ExportFormat::CrossMiner => writer.write_all(self.to_crossminer().as_bytes()),
        }
    }

    fn pharmit_query(&self) -> PharmitQuery<'_> {
        let points = self
            .features
            .iter()
            .map(|f| {
                let vector = f.vector();
                let v = vector.unwrap_or_else(Vector3::zeros);
                PharmitPoint {
                    name: f.pharmit_name(),
                    hasvec: vector.is_some(),
                    x: f.point.x,
                    y: f.point.y,
                    z: f.point.z,
                    radius: f.radius,
                    enabled: true,
                    vector_on: f.vector_on(),
                    svector: PharmitVector {
                        x: v.x,
                        y: v.y,
                        z: v.z,
                    },
                    minsize: "",
                    maxsize: "",
                    selected: false,
                }
            })
            .collect();
        PharmitQuery { points }
    }

    fn write_csv(&self, writer: &mut impl Write) -> io::Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        for f in &self.features {
            let mut row = vec![
                self.identifier.clone(),
                f.channel.name().to_string(),
                f.point.x.to_string(),
                f.point.y.to_string(),
                f.point.z.to_string(),
                f.score.to_string(),
            ];
            match (f.hbond_partner, f.vector()) {
                (Some(p), Some(v)) => {
                    row.extend([p.x, p.y, p.z, v.x, v.y, v.z].map(|c| c.to_string()));
                }
                _ => row.extend(std::iter::repeat_n("0".to_string(), 6)),
            }
            csv.write_record(&row)?;
        }
        csv.flush()
    }

    /// CGO spheres for every feature and arrows towards hydrogen-bond partners, grouped as
    /// `Pharmacophore_<identifier>`.
    pub fn to_pymol(&self) -> String {
        let id = &self.identifier;
        let mut out = format!("cluster_dict = {{\"{id}\": [], \"{id}_arrows\": []}}\n");
        let mut arrows = 0;
        for f in &self.features {
            let _ = writeln!(
                out,
                "cluster_dict[\"{id}\"] += [COLOR, {}] + [ALPHA, {SPHERE_ALPHA}] + \
                 [SPHERE, float({}), float({}), float({}), float({})]",
                f.pymol_colour(),
                f.point.x,
                f.point.y,
                f.point.z,
                f.radius
            );
            let colours = match f.channel {
                Channel::Donor => "blue red",
                Channel::Acceptor => "red blue",
                _ => continue,
            };
            if let Some(p) = f.hbond_partner {
                arrows += 1;
                let _ = writeln!(
                    out,
                    "cluster_dict[\"{id}_arrows\"] += cgo_arrow([{}, {}, {}], [{}, {}, {}], \
                     color=\"{colours}\", name=\"Arrows_{id}_{arrows}\")",
                    f.point.x, f.point.y, f.point.z, p.x, p.y, p.z
                );
            }
        }
        let _ = write!(
            out,
            "cmd.load_cgo(cluster_dict[\"{id}\"], \"Features_{id}\", 1)\n\
             cmd.load_cgo(cluster_dict[\"{id}_arrows\"], \"Arrows_{id}\")\n\
             cmd.set(\"transparency\", 0.2, \"Features_{id}\")\n\
             cmd.group(\"Pharmacophore_{id}\", members=\"Features_{id}\")\n\
             cmd.group(\"Pharmacophore_{id}\", members=\"Arrows_{id}\")\n"
        );
        out
    }

    fn to_crossminer(&self) -> String {
        let mut out = String::new();
        for f in &self.features {
            let name = f.crossminer_name();
            let _ = write!(
                out,
                "\nPHARMACOPHORE_FEATURE {name}\nPHARMACOPHORE_SPHERE {} {} {} {}",
                f.point.x, f.point.y, f.point.z, f.radius
            );
            if let Some(p) = f.hbond_partner {
                let _ = write!(out, "\nPHARMACOPHORE_SPHERE {} {} {} {}", p.x, p.y, p.z, f.radius);
            }
            let _ = writeln!(
                out,
                "\nPHARMACOPHORE_FEATURE_SMALL_MOLECULE\nPHARMACOPHORE_FEATURE_DESCRIPTION {name}"
            );
        }
        out
    }
}

/// Position and value of an island's maximum; the mean position when it is shared by
/// several cells.
fn maximum(island: &Grid) -> Option<(Point3<f64>, f64)> {
    let max = island.max_value();
    let cells = island.indices_at_value(max);
    if cells.is_empty() {
        return None;
    }
    let sum = cells
        .iter()
        .fold(Vector3::zeros(), |acc, &c| acc + island.indices_to_point(c).coords);
    Some((Point3::from(sum / cells.len() as f64), max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GRID_SPACING;
    use crate::core::models::atom::Atom;
    use crate::core::models::molecule::{Molecule, Residue};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn result() -> HotspotResult {
        let mut apolar = Grid::new(Point3::origin(), GRID_SPACING, [10, 10, 10]).unwrap();
        apolar.set_value([2, 2, 2], 10.0);
        apolar.set_value([4, 2, 2], 10.0);
        let mut donor = apolar.copy_and_clear();
        donor.set_value([6, 6, 6], 12.0);
        donor.set_value([6, 6, 7], 8.0);
        let mut grids = BTreeMap::new();
        grids.insert(Channel::Apolar, apolar);
        grids.insert(Channel::Donor, donor);

        let mut protein = Molecule::new("protein");
        protein.add_residue(Residue::new("SER", 'A', 1, false));
        let mut og = Atom::new(1, "OG", "O", Point3::new(3.0, 5.0, 3.0));
        og.is_acceptor = true;
        protein.add_atom(og);
        HotspotResult::new(grids).with_protein(Arc::new(protein))
    }

    fn model() -> PharmacophoreModel {
        result().pharmacophore("hs_0", &ExtractionConfig::default())
    }

    #[test]
    fn features_sit_on_centroids_and_maxima() {
        let model = model();
        assert_eq!(model.features.len(), 2);
        let apolar = &model.features[0];
        assert_eq!(apolar.channel, Channel::Apolar);
        assert_eq!(apolar.point, Point3::new(1.5, 1.0, 1.0));
        assert_eq!(apolar.hbond_partner, None);

        let donor = &model.features[1];
        assert_eq!(donor.point, Point3::new(3.0, 3.0, 3.0));
        assert_eq!(donor.score, 12.0);
        assert_eq!(donor.hbond_partner, Some(Point3::new(3.0, 5.0, 3.0)));
        assert_eq!(donor.vector(), Some(Vector3::new(0.0, 2.0, 0.0)));
    }

    #[test]
    fn json_export_lists_pharmit_points() {
        let mut out = Vec::new();
        model().write_to(ExportFormat::Json, &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let points = json["points"].as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0]["name"], "Hydrophobic");
        assert_eq!(points[0]["hasvec"], false);
        assert_eq!(points[0]["vector_on"], 0);
        assert_eq!(points[1]["name"], "HydrogenDonor");
        assert_eq!(points[1]["hasvec"], true);
        assert_eq!(points[1]["svector"]["y"], 2.0);
    }

    #[test]
    fn csv_rows_carry_partner_and_vector() {
        let mut out = Vec::new();
        model().write_to(ExportFormat::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "hs_0,apolar,1.5,1,1,0,0,0,0,0,0,0");
        assert_eq!(rows[1], "hs_0,donor,3,3,3,12,3,5,3,0,2,0");
    }

    #[test]
    fn pymol_and_crossminer_exports_name_every_feature() {
        let model = model();
        let script = model.to_pymol();
        assert_eq!(script.matches("[SPHERE,").count(), 2);
        assert!(script.contains("color=\"blue red\""));
        assert!(script.contains("cmd.group(\"Pharmacophore_hs_0\""));

        let mut out = Vec::new();
        model.write_to(ExportFormat::CrossMiner, &mut out).unwrap();
        let cm = String::from_utf8(out).unwrap();
        assert!(cm.contains("PHARMACOPHORE_FEATURE hydrophobic"));
        assert!(cm.contains("PHARMACOPHORE_FEATURE donor_projected"));
        assert_eq!(cm.matches("PHARMACOPHORE_SPHERE").count(), 3);
    }

    #[test]
    fn export_format_follows_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model().write(&path).unwrap();
        assert!(path.is_file());

        let err = model().write(&dir.path().join("model.sdf"));
        assert!(matches!(err, Err(EngineError::UnsupportedExportFormat(ext)) if ext == "sdf"));
        assert!(!dir.path().join("model.sdf").exists());
    }
}
