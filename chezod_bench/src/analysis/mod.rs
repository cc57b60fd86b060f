pub mod correlation;
pub mod figures;
pub mod per_residue;
pub mod stability;
