use crate::core::models::atom::Atom;
use crate::core::models::channel::Channel;
use crate::core::models::molecule::Molecule;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;

/// Spatial index of a protein's hydrogen-bond donors and acceptors.
pub struct PartnerIndex {
    donors: Option<(KdTree<f64, 3>, Vec<Point3<f64>>)>,
    acceptors: Option<(KdTree<f64, 3>, Vec<Point3<f64>>)>,
}

fn index_where(
    protein: &Molecule,
    pick: impl Fn(&Atom) -> bool,
) -> Option<(KdTree<f64, 3>, Vec<Point3<f64>>)> {
    let points: Vec<Point3<f64>> = protein
        .atoms()
        .iter()
        .filter(|a| pick(a))
        .map(|a| a.position)
        .collect();
    if points.is_empty() {
        return None;
    }
    let coords: Vec<[f64; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
    let tree: KdTree<f64, 3> = (&coords).into();
    Some((tree, points))
}

impl PartnerIndex {
    pub fn new(protein: &Molecule) -> Self {
        Self {
            donors: index_where(protein, |a| a.is_donor),
            acceptors: index_where(protein, |a| a.is_acceptor),
        }
    }

    /// Nearest protein atom able to complement a `channel` feature at `point`: an acceptor
    /// for a donor feature and a donor for an acceptor feature. Other channels have no partner.
    pub fn nearest_partner(
        &self,
        channel: Channel,
        point: &Point3<f64>,
        max_distance: f64,
    ) -> Option<Point3<f64>> {
        let (tree, positions) = match channel {
            Channel::Donor => self.acceptors.as_ref()?,
            Channel::Acceptor => self.donors.as_ref()?,
            _ => return None,
        };
        let nearest = tree.nearest_one::<SquaredEuclidean>(&[point.x, point.y, point.z]);
        if nearest.distance < max_distance * max_distance {
            positions.get(nearest.item as usize).copied()
        } else {
            None
        }
    }
}
