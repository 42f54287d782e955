// Domain layers - what the data is and what a sync does

pub mod repos;
pub mod syncs;
