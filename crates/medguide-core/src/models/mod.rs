pub mod differential;
pub mod evidence;
pub mod interview;
pub mod plan;
pub mod profile;
pub mod provenance;
pub mod risk;
pub mod safety;
pub mod term;
