pub mod desk;
pub mod directory;
pub mod mode;
pub mod participant;
pub mod settings;
pub mod workflow;
