mod datasets;
mod sessions;
mod setups;
