pub mod model;
pub mod rsc;
pub mod sstate;
pub mod tim;
