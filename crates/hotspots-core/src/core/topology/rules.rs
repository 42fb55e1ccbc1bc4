use phf::{Map, Set, phf_map, phf_set};

/// Interaction properties of one atom in a standard residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomTyping {
    pub donor: bool,
    pub acceptor: bool,
    pub formal_charge: i8,
    pub aromatic: bool,
}

const fn typing(donor: bool, acceptor: bool, formal_charge: i8, aromatic: bool) -> AtomTyping {
    AtomTyping {
        donor,
        acceptor,
        formal_charge,
        aromatic,
    }
}

const D: AtomTyping = typing(true, false, 0, false);
const A: AtomTyping = typing(false, true, 0, false);
const DA: AtomTyping = typing(true, true, 0, false);
const POS: AtomTyping = typing(true, false, 1, false);
const NEG: AtomTyping = typing(false, true, -1, false);
const AR: AtomTyping = typing(false, false, 0, true);
const AR_D: AtomTyping = typing(true, false, 0, true);
const AR_DA: AtomTyping = typing(true, true, 0, true);

pub const BACKBONE_NITROGEN: AtomTyping = D;
pub const BACKBONE_OXYGEN: AtomTyping = A;

/// Side-chain and solvent atoms keyed by `"RES:ATOM"`. Atoms absent from the table are apolar.
#[rustfmt::skip]
pub static RESIDUE_ATOM_TYPES: Map<&'static str, AtomTyping> = phf_map! {
    // --- Hydroxyl / amide side chains ---
    "SER:OG"  => DA, "THR:OG1" => DA, "TYR:OH" => DA,
    "ASN:OD1" => A,  "ASN:ND2" => D,
    "GLN:OE1" => A,  "GLN:NE2" => D,

    // --- Charged side chains ---
    "LYS:NZ"  => POS,
    "ARG:NE"  => POS, "ARG:NH1" => POS, "ARG:NH2" => POS,
    "ASP:OD1" => NEG, "ASP:OD2" => NEG,
    "GLU:OE1" => NEG, "GLU:OE2" => NEG,

    // --- Aromatic rings ---
    "PHE:CG" => AR, "PHE:CD1" => AR, "PHE:CD2" => AR, "PHE:CE1" => AR, "PHE:CE2" => AR, "PHE:CZ" => AR,
    "TYR:CG" => AR, "TYR:CD1" => AR, "TYR:CD2" => AR, "TYR:CE1" => AR, "TYR:CE2" => AR, "TYR:CZ" => AR,
    "TRP:CG" => AR, "TRP:CD1" => AR, "TRP:CD2" => AR, "TRP:NE1" => AR_D, "TRP:CE2" => AR,
    "TRP:CE3" => AR, "TRP:CZ2" => AR, "TRP:CZ3" => AR, "TRP:CH2" => AR,
    "HIS:CG" => AR, "HIS:ND1" => AR_DA, "HIS:CD2" => AR, "HIS:CE1" => AR, "HIS:NE2" => AR_DA,

    // --- Solvent ---
    "HOH:O" => DA, "WAT:O" => DA,
};

/// Residue names treated as standard amino acids.
#[rustfmt::skip]
pub static STANDARD_RESIDUES: Set<&'static str> = phf_set! {
    "ALA", "ARG", "ASN", "ASP", "CYS",
    "GLN", "GLU", "GLY", "HIS", "ILE",
    "LEU", "LYS", "MET", "PHE", "PRO",
    "SER", "THR", "TRP", "TYR", "VAL",
};
