use super::atom::Atom;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Interaction channel of a hotspot map.
///
/// The set is closed: every map, probe and extracted feature belongs to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Apolar,
    Donor,
    Acceptor,
    Positive,
    Negative,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown interaction channel: '{0}'")]
pub struct ParseChannelError(pub String);

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Apolar,
        Channel::Donor,
        Channel::Acceptor,
        Channel::Positive,
        Channel::Negative,
    ];

    /// The channels sampled for every protein.
    pub const NEUTRAL: [Channel; 3] = [Channel::Apolar, Channel::Donor, Channel::Acceptor];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Apolar => "apolar",
            Channel::Donor => "donor",
            Channel::Acceptor => "acceptor",
            Channel::Positive => "positive",
            Channel::Negative => "negative",
        }
    }

    pub fn is_charged(&self) -> bool {
        matches!(self, Channel::Positive | Channel::Negative)
    }

    pub fn is_polar(&self) -> bool {
        !matches!(self, Channel::Apolar)
    }

    /// Whether `atom` interacts through this channel.
    pub fn matches(&self, atom: &Atom) -> bool {
        let neutral = atom.formal_charge == 0;
        match self {
            Channel::Donor => atom.is_donor && neutral,
            Channel::Acceptor => atom.is_acceptor && neutral,
            Channel::Apolar => {
                !atom.is_donor && !atom.is_acceptor && neutral && atom.element != "Xe"
            }
            Channel::Positive => atom.formal_charge > 0,
            Channel::Negative => atom.formal_charge < 0,
        }
    }

    /// Interaction type of a single atom, with charge taking precedence over acceptor, and
    /// acceptor over donor.
    pub fn of_atom(atom: &Atom) -> Channel {
        match atom.formal_charge {
            c if c > 0 => Channel::Positive,
            c if c < 0 => Channel::Negative,
            _ if atom.is_acceptor => Channel::Acceptor,
            _ if atom.is_donor => Channel::Donor,
            _ => Channel::Apolar,
        }
    }

    /// Probe name understood by the propensity tool for this channel.
    pub fn propensity_probe(&self) -> &'static str {
        match self {
            Channel::Apolar => "AROMATIC CH CARBON",
            Channel::Donor => "UNCHARGED NH NITROGEN",
            Channel::Acceptor => "CARBONYL OXYGEN",
            Channel::Positive => "CHARGED NH NITROGEN",
            Channel::Negative => "CARBOXYLATE OXYGEN",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apolar" => Ok(Channel::Apolar),
            "donor" => Ok(Channel::Donor),
            "acceptor" => Ok(Channel::Acceptor),
            "positive" => Ok(Channel::Positive),
            "negative" => Ok(Channel::Negative),
            _ => Err(ParseChannelError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn atom(element: &str) -> Atom {
        Atom::new(1, element, element, Point3::origin())
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for channel in Channel::ALL {
            assert_eq!(channel.name().parse::<Channel>().unwrap(), channel);
        }
        assert!("hydrophobic".parse::<Channel>().is_err());
    }

    #[test]
    fn charged_atoms_only_match_charged_channels() {
        let mut n = atom("N");
        n.is_donor = true;
        n.formal_charge = 1;
        assert!(Channel::Positive.matches(&n));
        assert!(!Channel::Donor.matches(&n));
        assert!(!Channel::Apolar.matches(&n));
        assert_eq!(Channel::of_atom(&n), Channel::Positive);
    }

    #[test]
    fn xenon_is_never_apolar() {
        assert!(Channel::Apolar.matches(&atom("C")));
        assert!(!Channel::Apolar.matches(&atom("Xe")));
    }

    #[test]
    fn acceptor_takes_precedence_over_donor_for_atom_type() {
        let mut o = atom("O");
        o.is_donor = true;
        o.is_acceptor = true;
        assert_eq!(Channel::of_atom(&o), Channel::Acceptor);
        assert!(Channel::Donor.matches(&o));
        assert!(Channel::Acceptor.matches(&o));
    }
}
